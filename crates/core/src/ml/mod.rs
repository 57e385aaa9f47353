//! Return-risk classifier
//!
//! Predicts whether a product is likely to be returned from its name alone.
//! Product names are turned into TF-IDF vectors and scored with a logistic
//! regression fit by gradient descent. Training is deterministic for a given
//! dataset and split seed; every artifact records the checksum of the snapshot
//! it was trained on and refuses to vouch for any other.

pub mod logistic;
pub mod split;
pub mod text;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AppConfig, ClassifierConfig};
use crate::domain::CanonicalDataset;
use crate::errors::ClassifierError;
use crate::ml::logistic::{GradientDescent, LogisticModel};
use crate::ml::split::stratified_split;
use crate::ml::text::{tokenize, SparseVector, TfIdfVectorizer};

/// Bumped whenever the serialized artifact layout changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Probability at or above which a product is labelled high risk.
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLabel {
    /// Not expected to be returned (label 0).
    Low,
    /// Likely to be returned (label 1).
    High,
}

impl RiskLabel {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= DECISION_THRESHOLD {
            Self::High
        } else {
            Self::Low
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

impl From<RiskLabel> for u8 {
    fn from(label: RiskLabel) -> Self {
        label.as_u8()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingParameters {
    pub min_training_rows: usize,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub schedule: GradientDescent,
}

impl Default for TrainingParameters {
    fn default() -> Self {
        Self::from(&AppConfig::default().classifier)
    }
}

impl From<&ClassifierConfig> for TrainingParameters {
    fn from(config: &ClassifierConfig) -> Self {
        Self {
            min_training_rows: config.min_training_rows,
            test_fraction: config.test_fraction,
            split_seed: config.split_seed,
            schedule: GradientDescent {
                learning_rate: config.learning_rate,
                epochs: config.epochs,
                l2_penalty: config.l2_penalty,
            },
        }
    }
}

/// Model performance metrics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub sample_count: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ModelMetrics {
    /// Zero-division cases report 0 rather than NaN.
    pub fn from_predictions(actual: &[bool], predicted: &[bool]) -> Self {
        let mut metrics = Self { sample_count: actual.len(), ..Self::default() };
        for (actual, predicted) in actual.iter().zip(predicted) {
            match (*actual, *predicted) {
                (true, true) => metrics.true_positives += 1,
                (false, true) => metrics.false_positives += 1,
                (false, false) => metrics.true_negatives += 1,
                (true, false) => metrics.false_negatives += 1,
            }
        }

        let ratio = |numerator: usize, denominator: usize| {
            if denominator == 0 {
                0.0
            } else {
                numerator as f64 / denominator as f64
            }
        };
        metrics.accuracy =
            ratio(metrics.true_positives + metrics.true_negatives, metrics.sample_count);
        metrics.precision =
            ratio(metrics.true_positives, metrics.true_positives + metrics.false_positives);
        metrics.recall =
            ratio(metrics.true_positives, metrics.true_positives + metrics.false_negatives);
        metrics.f1_score = if metrics.precision + metrics.recall > 0.0 {
            2.0 * metrics.precision * metrics.recall / (metrics.precision + metrics.recall)
        } else {
            0.0
        };
        metrics
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub labelled_rows: usize,
    pub excluded_blank_names: usize,
    pub returned_rows: usize,
    pub degenerate_labels: bool,
    pub vocabulary_size: usize,
    pub train: ModelMetrics,
    pub test: ModelMetrics,
}

/// Everything needed to score product names, bound to one dataset snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub format_version: u32,
    pub snapshot_checksum: String,
    pub trained_at: DateTime<Utc>,
    pub parameters: TrainingParameters,
    pub vectorizer: TfIdfVectorizer,
    pub model: LogisticModel,
    pub report: TrainingReport,
}

impl ClassifierArtifact {
    /// Probability of return for each name, aligned to input order.
    pub fn predict_proba<S: AsRef<str>>(&self, names: &[S]) -> Vec<f64> {
        names
            .iter()
            .map(|name| self.model.probability(&self.vectorizer.transform(&tokenize(name.as_ref()))))
            .collect()
    }

    /// Exactly one label per name; unknown words contribute nothing.
    pub fn predict_batch<S: AsRef<str>>(&self, names: &[S]) -> Vec<RiskLabel> {
        self.predict_proba(names).into_iter().map(RiskLabel::from_probability).collect()
    }

    pub fn ensure_fresh(&self, dataset: &CanonicalDataset) -> Result<(), ClassifierError> {
        if self.snapshot_checksum != dataset.checksum() {
            return Err(ClassifierError::StaleArtifact {
                artifact: self.snapshot_checksum.clone(),
                dataset: dataset.checksum().to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReturnRiskClassifier {
    parameters: TrainingParameters,
}

impl ReturnRiskClassifier {
    pub fn new(parameters: TrainingParameters) -> Self {
        Self { parameters }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::new(TrainingParameters::from(config))
    }

    pub fn parameters(&self) -> &TrainingParameters {
        &self.parameters
    }

    /// Trains on the earnings table: label is 1 when the row had any return.
    ///
    /// Rows with blank product names carry no signal and are excluded.
    pub fn train(&self, dataset: &CanonicalDataset) -> Result<ClassifierArtifact, ClassifierError> {
        let (labelled, blank): (Vec<_>, Vec<_>) =
            dataset.earnings().iter().partition(|row| !row.name.trim().is_empty());
        if !blank.is_empty() {
            warn!(
                event_name = "ml.training.blank_names_excluded",
                excluded = blank.len(),
                "excluding rows without a product name from training"
            );
        }

        if labelled.len() < self.parameters.min_training_rows {
            return Err(ClassifierError::InsufficientData {
                rows: labelled.len(),
                required: self.parameters.min_training_rows,
            });
        }

        let documents: Vec<Vec<String>> = labelled.iter().map(|row| tokenize(&row.name)).collect();
        let labels: Vec<bool> = labelled.iter().map(|row| row.was_returned()).collect();
        let returned_rows = labels.iter().filter(|label| **label).count();
        let degenerate_labels = returned_rows == 0 || returned_rows == labels.len();
        if degenerate_labels {
            warn!(
                event_name = "ml.training.degenerate_labels",
                rows = labels.len(),
                returned_rows,
                "all training labels are identical; classifier will be low quality"
            );
        }

        let split =
            stratified_split(&labels, self.parameters.test_fraction, self.parameters.split_seed);
        let pick_docs = |indices: &[usize]| -> Vec<Vec<String>> {
            indices.iter().map(|i| documents[*i].clone()).collect()
        };
        let pick_labels = |indices: &[usize]| -> Vec<bool> { indices.iter().map(|i| labels[*i]).collect() };

        let train_docs = pick_docs(&split.train);
        let train_labels = pick_labels(&split.train);
        let test_docs = pick_docs(&split.test);
        let test_labels = pick_labels(&split.test);

        let vectorizer = TfIdfVectorizer::fit(&train_docs);
        let train_rows: Vec<SparseVector> =
            train_docs.iter().map(|tokens| vectorizer.transform(tokens)).collect();
        let test_rows: Vec<SparseVector> =
            test_docs.iter().map(|tokens| vectorizer.transform(tokens)).collect();

        let model =
            LogisticModel::fit(vectorizer.len(), &train_rows, &train_labels, self.parameters.schedule);

        let evaluate = |rows: &[SparseVector], actual: &[bool]| {
            let predicted: Vec<bool> = rows
                .iter()
                .map(|row| RiskLabel::from_probability(model.probability(row)) == RiskLabel::High)
                .collect();
            ModelMetrics::from_predictions(actual, &predicted)
        };
        let report = TrainingReport {
            labelled_rows: labelled.len(),
            excluded_blank_names: blank.len(),
            returned_rows,
            degenerate_labels,
            vocabulary_size: vectorizer.len(),
            train: evaluate(&train_rows, &train_labels),
            test: evaluate(&test_rows, &test_labels),
        };

        info!(
            event_name = "ml.training.completed",
            snapshot_checksum = dataset.checksum(),
            labelled_rows = report.labelled_rows,
            vocabulary_size = report.vocabulary_size,
            train_accuracy = report.train.accuracy,
            test_accuracy = report.test.accuracy,
            test_precision = report.test.precision,
            test_recall = report.test.recall,
            test_f1 = report.test.f1_score,
            "return-risk classifier trained"
        );

        Ok(ClassifierArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            snapshot_checksum: dataset.checksum().to_string(),
            trained_at: Utc::now(),
            parameters: self.parameters.clone(),
            vectorizer,
            model,
            report,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{dataset, earning, twelve_products};
    use super::{ModelMetrics, ReturnRiskClassifier, RiskLabel};
    use crate::errors::ClassifierError;

    #[test]
    fn twelve_product_training_is_reproducible() {
        let classifier = ReturnRiskClassifier::default();
        let first = classifier.train(&twelve_products()).expect("training succeeds");
        let second = classifier.train(&twelve_products()).expect("training succeeds");

        assert_eq!(first.report, second.report);
        assert_eq!(first.model, second.model);
        assert_eq!(first.report.labelled_rows, 12);
        assert_eq!(first.report.returned_rows, 2);
        assert_eq!(first.report.test.sample_count, 3);
        assert_eq!(first.report.train.sample_count, 9);
        assert!(!first.report.degenerate_labels);
    }

    #[test]
    fn fewer_than_minimum_rows_is_insufficient() {
        let rows = (0..9).map(|i| earning(i, "Yoga Mat", 0)).collect();
        let error = ReturnRiskClassifier::default().train(&dataset(rows)).expect_err("too few");
        assert_eq!(error, ClassifierError::InsufficientData { rows: 9, required: 10 });
    }

    #[test]
    fn blank_names_do_not_count_towards_minimum() {
        let mut rows: Vec<_> = (0..9).map(|i| earning(i, "Yoga Mat", 0)).collect();
        rows.push(earning(9, "   ", 1));
        let error = ReturnRiskClassifier::default().train(&dataset(rows)).expect_err("too few");
        assert_eq!(error, ClassifierError::InsufficientData { rows: 9, required: 10 });
    }

    #[test]
    fn single_class_labels_still_produce_an_artifact() {
        let rows = (0..12).map(|i| earning(i, "Kindle Paperwhite", 0)).collect();
        let artifact = ReturnRiskClassifier::default().train(&dataset(rows)).expect("trains");

        assert!(artifact.report.degenerate_labels);
        assert_eq!(artifact.predict_batch(&["Kindle Paperwhite"]), vec![RiskLabel::Low]);
    }

    #[test]
    fn predict_batch_returns_one_label_per_name() {
        let artifact = ReturnRiskClassifier::default().train(&twelve_products()).expect("trains");
        let names = ["Kindle Paperwhite", "zzz qqq never seen", "", "Knockoff Earbuds"];

        let labels = artifact.predict_batch(&names);
        assert_eq!(labels.len(), names.len());
        assert!(labels.iter().all(|label| label.as_u8() <= 1));
        assert!(artifact.predict_batch::<&str>(&[]).is_empty());
    }

    #[test]
    fn unseen_names_score_the_intercept() {
        let artifact = ReturnRiskClassifier::default().train(&twelve_products()).expect("trains");
        let probabilities = artifact.predict_proba(&["zzz qqq", ""]);
        assert!((probabilities[0] - probabilities[1]).abs() < 1e-12);
    }

    #[test]
    fn artifact_rejects_other_snapshots() {
        let trained_on = twelve_products();
        let artifact = ReturnRiskClassifier::default().train(&trained_on).expect("trains");
        assert!(artifact.ensure_fresh(&trained_on).is_ok());

        let other = dataset((0..12).map(|i| earning(i, "Yoga Mat", 0)).collect());
        assert!(matches!(
            artifact.ensure_fresh(&other),
            Err(ClassifierError::StaleArtifact { .. })
        ));
    }

    #[test]
    fn metrics_guard_zero_division() {
        let metrics = ModelMetrics::from_predictions(&[false, false], &[false, false]);
        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1_score, 0.0);

        let empty = ModelMetrics::from_predictions(&[], &[]);
        assert_eq!(empty.accuracy, 0.0);
        assert_eq!(empty.sample_count, 0);
    }

    #[test]
    fn metrics_count_confusion_cells() {
        let metrics =
            ModelMetrics::from_predictions(&[true, true, false, false], &[true, false, true, false]);
        assert_eq!(metrics.true_positives, 1);
        assert_eq!(metrics.false_negatives, 1);
        assert_eq!(metrics.false_positives, 1);
        assert_eq!(metrics.true_negatives, 1);
        assert!((metrics.f1_score - 0.5).abs() < 1e-12);
    }
}
