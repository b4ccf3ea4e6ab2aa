use async_trait::async_trait;
use rand::Rng;

use super::{Sampler, TestProfile};
use crate::error::{Error, ErrorDetails};

/// Pure function for uniform sampling logic.
///
/// Given a uniform sample in `[0, 1)`, selects one variant with equal
/// probability for each. The returned variant is guaranteed to come from
/// `variants`.
pub(crate) fn sample_uniform(
    test_name: &str,
    variants: &[String],
    uniform_sample: f64,
) -> Result<String, Error> {
    if variants.is_empty() {
        return Err(Error::new(ErrorDetails::NoVariantsToSample {
            test_name: test_name.to_string(),
        }));
    }

    let index = (uniform_sample * variants.len() as f64).floor() as usize;
    // Clamp to valid range: uniform_sample == 1.0 would index past the end
    let index = index.min(variants.len() - 1);
    Ok(variants[index].clone())
}

/// Selects uniformly at random among the test's variants.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformSampler;

#[async_trait]
impl Sampler for UniformSampler {
    async fn sample(&self, test: &TestProfile) -> Result<String, Error> {
        let uniform_sample = rand::thread_rng().gen::<f64>();
        sample_uniform(test.name(), test.variants(), uniform_sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn variants(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_sample_uniform_is_deterministic_given_the_sample() {
        let variants = variants(&["a", "b", "c"]);
        assert_eq!(sample_uniform("t", &variants, 0.0).unwrap(), "a");
        assert_eq!(sample_uniform("t", &variants, 0.34).unwrap(), "b");
        assert_eq!(sample_uniform("t", &variants, 0.99).unwrap(), "c");
        // Boundary clamp
        assert_eq!(sample_uniform("t", &variants, 1.0).unwrap(), "c");
    }

    #[test]
    fn test_sample_uniform_rejects_an_empty_variant_list() {
        let err = sample_uniform("t", &[], 0.5).unwrap_err();
        assert_eq!(
            *err.get_details(),
            ErrorDetails::NoVariantsToSample {
                test_name: "t".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_uniform_sampler_covers_all_variants() {
        let profile = TestProfile::new(
            "button-color".to_string(),
            variants(&["red", "green", "blue"]),
            None,
        );

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..3000 {
            let variant = UniformSampler.sample(&profile).await.unwrap();
            *counts.entry(variant).or_insert(0) += 1;
        }

        for name in ["red", "green", "blue"] {
            let count = *counts.get(name).unwrap_or(&0);
            // Expected 1000 each, generous statistical tolerance
            assert!(
                (800..=1200).contains(&count),
                "variant {name} sampled {count} times"
            );
        }
    }
}
