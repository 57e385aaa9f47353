//! Low-risk candidate selection.
//!
//! Candidates arrive from an external product feed. Each one is scored by the
//! trained [`ClassifierArtifact`]; only items predicted not to be returned are
//! kept, and the survivors are shuffled so repeated calls surface different
//! products first.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ClassifierError;
use crate::ml::{ClassifierArtifact, RiskLabel};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub detail_url: Option<String>,
}

/// State of the upstream candidate fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CandidateFeed {
    Pending,
    Ready(Vec<CandidateProduct>),
}

pub struct RecommendationFilter<R: Rng = StdRng> {
    rng: R,
}

impl RecommendationFilter<StdRng> {
    /// Same seed and inputs always give the same ordering.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng> RecommendationFilter<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn filter(
        &mut self,
        feed: CandidateFeed,
        artifact: Option<&ClassifierArtifact>,
    ) -> Result<Vec<CandidateProduct>, ClassifierError> {
        let artifact = artifact.ok_or_else(|| ClassifierError::ClassifierUnavailable {
            reason: "classifier has not been trained for this session".to_string(),
        })?;
        let candidates = match feed {
            CandidateFeed::Pending => {
                return Err(ClassifierError::ClassifierUnavailable {
                    reason: "candidate products are still being fetched".to_string(),
                })
            }
            CandidateFeed::Ready(candidates) => candidates,
        };

        let received = candidates.len();
        let mut seen = HashSet::new();
        let unique: Vec<CandidateProduct> =
            candidates.into_iter().filter(|candidate| seen.insert(candidate.id.clone())).collect();

        let names: Vec<&str> = unique.iter().map(|candidate| candidate.name.as_str()).collect();
        let labels = artifact.predict_batch(&names);
        let unique_count = names.len();

        let mut kept: Vec<CandidateProduct> = unique
            .into_iter()
            .zip(labels)
            .filter(|(_, label)| *label == RiskLabel::Low)
            .map(|(candidate, _)| candidate)
            .collect();
        kept.shuffle(&mut self.rng);

        info!(
            event_name = "recommend.filtered",
            received,
            unique = unique_count,
            kept = kept.len(),
            "candidate products filtered by return risk"
        );
        Ok(kept)
    }
}
