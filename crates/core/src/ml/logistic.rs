//! Binary logistic regression over sparse rows, fit with full-batch gradient descent.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ml::text::SparseVector;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientDescent {
    pub learning_rate: f64,
    pub epochs: usize,
    /// L2 penalty on coefficients; the intercept is never regularized.
    pub l2_penalty: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    pub fn zeros(dimension: usize) -> Self {
        Self { coefficients: vec![0.0; dimension], intercept: 0.0 }
    }

    /// Sigmoid activation function: 1 / (1 + e^(-z))
    pub fn sigmoid(z: f64) -> f64 {
        let z = z.clamp(-500.0, 500.0);
        1.0 / (1.0 + (-z).exp())
    }

    fn logit(&self, row: &SparseVector) -> f64 {
        self.intercept
            + row
                .iter()
                .map(|(column, value)| self.coefficients.get(*column).copied().unwrap_or(0.0) * value)
                .sum::<f64>()
    }

    pub fn probability(&self, row: &SparseVector) -> f64 {
        Self::sigmoid(self.logit(row))
    }

    pub fn fit(dimension: usize, rows: &[SparseVector], labels: &[bool], schedule: GradientDescent) -> Self {
        let mut model = Self::zeros(dimension);
        if rows.is_empty() {
            return model;
        }

        let n = rows.len() as f64;
        let targets: Vec<f64> = labels.iter().map(|label| if *label { 1.0 } else { 0.0 }).collect();

        for epoch in 0..schedule.epochs {
            let mut gradients = vec![0.0; dimension];
            let mut intercept_gradient = 0.0;

            for (row, target) in rows.iter().zip(&targets) {
                let error = model.probability(row) - target;
                for (column, value) in row {
                    if let Some(gradient) = gradients.get_mut(*column) {
                        *gradient += error * value;
                    }
                }
                intercept_gradient += error;
            }

            for (weight, gradient) in model.coefficients.iter_mut().zip(&gradients) {
                *weight -= schedule.learning_rate * (gradient / n + schedule.l2_penalty * *weight);
            }
            model.intercept -= schedule.learning_rate * intercept_gradient / n;

            if epoch % 100 == 0 {
                debug!(
                    event_name = "ml.training.epoch",
                    epoch,
                    loss = model.log_loss(rows, &targets),
                    "gradient descent progress"
                );
            }
        }

        model
    }

    /// Mean binary cross-entropy.
    fn log_loss(&self, rows: &[SparseVector], targets: &[f64]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let total: f64 = rows
            .iter()
            .zip(targets)
            .map(|(row, target)| {
                let p = self.probability(row).clamp(1e-15, 1.0 - 1e-15);
                -(target * p.ln() + (1.0 - target) * (1.0 - p).ln())
            })
            .sum();
        total / rows.len() as f64
    }
}
