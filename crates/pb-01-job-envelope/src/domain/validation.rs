//! # Validation and Defaulting
//!
//! `validate` fills defaults and then checks structure. The signature covers
//! the post-default form, so this runs before signing and before verifying.

use crate::domain::errors::ValidationError;
use chrono::{SubsecRound, Utc};
use shared_types::{JobSpec, DEFAULT_MIN_REGIONS, DEFAULT_MIN_SUCCESS_RATE, DEFAULT_PROVIDER_TIMEOUT};
use uuid::Uuid;

/// Apply defaults and check structural completeness.
///
/// Defaults applied when absent:
/// - `min_success_rate` = 0.67
/// - `provider_timeout` = 2 minutes
/// - `min_regions` = 1
/// - `metadata.timestamp` = now (millisecond precision)
/// - `metadata.nonce` = random UUID
pub fn validate(spec: &mut JobSpec) -> Result<(), ValidationError> {
    apply_defaults(spec);
    check_structure(spec)
}

fn apply_defaults(spec: &mut JobSpec) {
    let constraints = &mut spec.constraints;
    constraints.min_success_rate.get_or_insert(DEFAULT_MIN_SUCCESS_RATE);
    constraints.provider_timeout.get_or_insert(DEFAULT_PROVIDER_TIMEOUT);
    constraints.min_regions.get_or_insert(DEFAULT_MIN_REGIONS);

    let metadata = &mut spec.metadata;
    if metadata.timestamp.is_none() {
        metadata.timestamp = Some(Utc::now().trunc_subsecs(3));
    }
    if metadata.nonce.as_deref().map_or(true, str::is_empty) {
        metadata.nonce = Some(Uuid::new_v4().to_string());
    }
}

/// Structural checks only; never mutates. Unset optional constraints pass.
pub fn check_structure(spec: &JobSpec) -> Result<(), ValidationError> {
    if spec.id.trim().is_empty() {
        return Err(ValidationError::MissingField("id"));
    }
    if spec.version.trim().is_empty() {
        return Err(ValidationError::MissingField("version"));
    }
    if spec.benchmark.name.trim().is_empty() {
        return Err(ValidationError::MissingField("benchmark.name"));
    }
    if spec.benchmark.container.image.trim().is_empty() {
        return Err(ValidationError::MissingField("benchmark.container.image"));
    }

    let constraints = &spec.constraints;
    if constraints.regions.is_empty() || constraints.regions.iter().any(|r| r.trim().is_empty()) {
        return Err(ValidationError::NoRegions);
    }

    if let Some(min_regions) = constraints.min_regions {
        if min_regions == 0 || min_regions as usize > constraints.regions.len() {
            return Err(ValidationError::MinRegionsOutOfRange {
                min_regions,
                regions: constraints.regions.len(),
            });
        }
    }

    if let Some(rate) = constraints.min_success_rate {
        // NaN fails both comparisons
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(ValidationError::SuccessRateOutOfRange(rate));
        }
    }

    if constraints.provider_timeout.is_some_and(|t| t.is_zero()) {
        return Err(ValidationError::ZeroProviderTimeout);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BenchmarkSpec, ContainerSpec, ExecutionConstraints};
    use std::time::Duration;

    fn spec() -> JobSpec {
        JobSpec::new(
            "job-1",
            BenchmarkSpec {
                name: "who-are-you".into(),
                container: ContainerSpec {
                    image: "beacon/hello".into(),
                    tag: None,
                },
                resources: Default::default(),
            },
            ExecutionConstraints::for_regions(["US", "EU"]),
        )
    }

    #[test]
    fn test_defaults_applied() {
        let mut s = spec();
        validate(&mut s).unwrap();

        assert_eq!(s.constraints.min_success_rate, Some(0.67));
        assert_eq!(s.constraints.provider_timeout, Some(Duration::from_secs(120)));
        assert_eq!(s.constraints.min_regions, Some(1));
        assert!(s.metadata.timestamp.is_some());
        assert!(s.metadata.nonce.is_some());
    }

    #[test]
    fn test_explicit_values_kept() {
        let mut s = spec();
        s.constraints.min_success_rate = Some(0.5);
        s.constraints.provider_timeout = Some(Duration::from_secs(30));
        s.metadata.nonce = Some("fixed".into());
        validate(&mut s).unwrap();

        assert_eq!(s.constraints.min_success_rate, Some(0.5));
        assert_eq!(s.constraints.provider_timeout, Some(Duration::from_secs(30)));
        assert_eq!(s.metadata.nonce.as_deref(), Some("fixed"));
    }

    #[test]
    fn test_validate_is_idempotent() {
        let mut s = spec();
        validate(&mut s).unwrap();
        let first = s.clone();
        validate(&mut s).unwrap();
        assert_eq!(first, s);
    }

    #[test]
    fn test_empty_regions_rejected() {
        let mut s = spec();
        s.constraints.regions.clear();
        assert_eq!(validate(&mut s), Err(ValidationError::NoRegions));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut s = spec();
        s.id = " ".into();
        assert_eq!(validate(&mut s), Err(ValidationError::MissingField("id")));

        let mut s = spec();
        s.benchmark.container.image.clear();
        assert_eq!(
            validate(&mut s),
            Err(ValidationError::MissingField("benchmark.container.image"))
        );
    }

    #[test]
    fn test_success_rate_range() {
        for bad in [0.0, -0.1, 1.01, f64::NAN] {
            let mut s = spec();
            s.constraints.min_success_rate = Some(bad);
            assert!(matches!(
                validate(&mut s),
                Err(ValidationError::SuccessRateOutOfRange(_))
            ));
        }
        let mut s = spec();
        s.constraints.min_success_rate = Some(1.0);
        assert!(validate(&mut s).is_ok());
    }

    #[test]
    fn test_min_regions_bounded_by_region_count() {
        let mut s = spec();
        s.constraints.min_regions = Some(3);
        assert_eq!(
            validate(&mut s),
            Err(ValidationError::MinRegionsOutOfRange {
                min_regions: 3,
                regions: 2
            })
        );
    }

    #[test]
    fn test_check_structure_does_not_default() {
        let s = spec();
        assert!(check_structure(&s).is_ok());
        assert!(s.constraints.min_success_rate.is_none());
    }
}
