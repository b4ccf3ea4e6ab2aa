use std::collections::HashMap;

use async_trait::async_trait;
use rand::Rng;

use super::uniform::sample_uniform;
use super::{Sampler, TestProfile};
use crate::error::Error;

/// Pure function for weighted sampling logic (a categorical distribution).
///
/// Given a uniform sample in `[0, 1)`, walks the variants in declaration
/// order accumulating weights and returns the first variant whose cumulative
/// weight exceeds the drawn threshold. Variants missing from the weight map
/// contribute zero weight and can never be selected. Falls back to uniform
/// sampling when the total weight is not positive.
pub(crate) fn sample_weighted(
    test_name: &str,
    variants: &[String],
    weights: &HashMap<String, f64>,
    uniform_sample: f64,
) -> Result<String, Error> {
    let total_weight: f64 = variants
        .iter()
        .map(|variant| weights.get(variant).copied().unwrap_or(0.0))
        .sum();

    if total_weight <= 0.0 {
        return sample_uniform(test_name, variants, uniform_sample);
    }

    let threshold = uniform_sample * total_weight;
    let mut cumulative_weight = 0.0;

    for variant in variants {
        cumulative_weight += weights.get(variant).copied().unwrap_or(0.0);
        if cumulative_weight > threshold {
            return Ok(variant.clone());
        }
    }

    // Rare numerical precision shortfall at the top of the range: fall back
    // to the last positively weighted variant.
    let last_weighted = variants
        .iter()
        .rev()
        .find(|variant| weights.get(variant.as_str()).copied().unwrap_or(0.0) > 0.0);
    match last_weighted {
        Some(variant) => Ok(variant.clone()),
        None => sample_uniform(test_name, variants, uniform_sample),
    }
}

/// Selects among the test's variants proportionally to its configured
/// weights; without weights this collapses to uniform selection, which is
/// why the catalog also registers it as `default`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedSampler;

#[async_trait]
impl Sampler for WeightedSampler {
    async fn sample(&self, test: &TestProfile) -> Result<String, Error> {
        let uniform_sample = rand::thread_rng().gen::<f64>();
        match test.weights() {
            Some(weights) if !weights.is_empty() => {
                sample_weighted(test.name(), test.variants(), weights, uniform_sample)
            }
            _ => sample_uniform(test.name(), test.variants(), uniform_sample),
        }
    }
}
