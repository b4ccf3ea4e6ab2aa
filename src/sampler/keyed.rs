use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::uniform::sample_uniform;
use super::weighted::sample_weighted;
use super::{Sampler, TestProfile};
use crate::error::Error;

/// Implements a uniform distribution over the interval [0, 1) using a hash
/// function. Deterministic per `(unit_id, test_name)` pair but with good
/// statistical properties across pairs.
pub(crate) fn keyed_unit_interval(unit_id: &str, test_name: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(unit_id.as_bytes());
    hasher.update(test_name.as_bytes());
    let hash_value = hasher.finalize();
    let truncated_hash =
        u32::from_be_bytes([hash_value[0], hash_value[1], hash_value[2], hash_value[3]]);
    truncated_hash as f64 / u32::MAX as f64
}

/// Deterministic sampler keyed on a caller-supplied unit id (a visitor or
/// account id). The same unit always lands on the same variant for a given
/// test, independent of which process performs the draw, so assignments stay
/// consistent across devices that share the unit id rather than the scope.
/// Respects the test's weights when present.
#[derive(Debug, Clone)]
pub struct KeyedSampler {
    unit_id: String,
}

impl KeyedSampler {
    pub fn new(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
        }
    }
}

#[async_trait]
impl Sampler for KeyedSampler {
    async fn sample(&self, test: &TestProfile) -> Result<String, Error> {
        let uniform_sample = keyed_unit_interval(&self.unit_id, test.name());
        match test.weights() {
            Some(weights) if !weights.is_empty() => {
                sample_weighted(test.name(), test.variants(), weights, uniform_sample)
            }
            _ => sample_uniform(test.name(), test.variants(), uniform_sample),
        }
    }
}
