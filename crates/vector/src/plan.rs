//! Application plan processing.
//!
//! A plan is a feature collection whose features carry a per-zone
//! application rate. The rate column name varies between farm management
//! exports, so it is detected from the first feature's properties.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, VectorError};
use crate::geojson::FeatureCollection;

/// Property names recognised as the application rate.
pub const RATE_KEYS: [&str; 4] = ["RATE", "Menge", "rate", "fertilizer"];

/// Property written with each feature's rate relative to the maximum.
pub const RELATIVE_RATE_KEY: &str = "V22RATE";

/// Foreign members carrying the rate range on a normalized collection.
pub const MIN_RATE_MEMBER: &str = "min_rate";
pub const MAX_RATE_MEMBER: &str = "max_rate";

/// Rate statistics of a normalized plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub rate_key: String,
    /// Smallest strictly positive rate.
    pub min_rate: f64,
    pub max_rate: f64,
}

/// The single rate key present in the first feature.
pub fn find_rate_key(plan: &FeatureCollection) -> Result<&'static str> {
    let first = plan.features.first().ok_or(VectorError::NoUniqueRateKey)?;
    let mut present = RATE_KEYS
        .iter()
        .copied()
        .filter(|k| first.properties.contains_key(*k));

    match (present.next(), present.next()) {
        (Some(key), None) => Ok(key),
        _ => Err(VectorError::NoUniqueRateKey),
    }
}

fn rate_of(value: Option<&Value>, key: &str) -> Result<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|r| r.is_finite())
        .ok_or_else(|| VectorError::InvalidRate(key.to_string()))
}

/// Detect the rate key, compute the positive rate range and annotate every
/// feature with `V22RATE = rate / max_rate`. The range is also written to
/// the collection as `min_rate` and `max_rate` foreign members.
pub fn normalize_rates(plan: &mut FeatureCollection) -> Result<PlanSummary> {
    let key = find_rate_key(plan)?;

    let rates = plan
        .features
        .iter()
        .map(|f| rate_of(f.properties.get(key), key))
        .collect::<Result<Vec<f64>>>()?;

    let positive = rates.iter().copied().filter(|r| *r > 0.0);
    let (min_rate, max_rate) = positive.fold(None, |acc: Option<(f64, f64)>, r| {
        Some(match acc {
            None => (r, r),
            Some((lo, hi)) => (lo.min(r), hi.max(r)),
        })
    })
    .ok_or(VectorError::NoPositiveRates)?;

    for (feature, rate) in plan.features.iter_mut().zip(rates) {
        feature
            .properties
            .insert(RELATIVE_RATE_KEY.to_string(), Value::from(rate / max_rate));
    }
    plan.foreign_members
        .insert(MIN_RATE_MEMBER.to_string(), Value::from(min_rate));
    plan.foreign_members
        .insert(MAX_RATE_MEMBER.to_string(), Value::from(max_rate));

    debug!(
        rate_key = key,
        min_rate,
        max_rate,
        features = plan.features.len(),
        "Normalized plan rates"
    );

    Ok(PlanSummary {
        rate_key: key.to_string(),
        min_rate,
        max_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson::{Feature, Geometry};

    fn plan(key: &str, rates: &[f64]) -> FeatureCollection {
        FeatureCollection::new(
            rates
                .iter()
                .enumerate()
                .map(|(i, r)| Feature::new(Geometry::point(i as f64, 0.0)).with_property(key, *r))
                .collect(),
        )
    }

    #[test]
    fn test_find_rate_key() {
        assert_eq!(find_rate_key(&plan("Menge", &[1.0])).unwrap(), "Menge");
        assert!(matches!(
            find_rate_key(&plan("dose", &[1.0])),
            Err(VectorError::NoUniqueRateKey)
        ));

        let mut ambiguous = plan("RATE", &[1.0]);
        ambiguous.features[0]
            .properties
            .insert("fertilizer".into(), Value::from(2.0));
        assert!(matches!(
            find_rate_key(&ambiguous),
            Err(VectorError::NoUniqueRateKey)
        ));

        assert!(find_rate_key(&FeatureCollection::default()).is_err());
    }

    #[test]
    fn test_normalize_rates() {
        let mut p = plan("RATE", &[0.0, 50.0, 200.0, 100.0]);
        let summary = normalize_rates(&mut p).unwrap();

        assert_eq!(summary.rate_key, "RATE");
        assert_eq!(summary.min_rate, 50.0);
        assert_eq!(summary.max_rate, 200.0);

        let relative: Vec<f64> = p
            .features
            .iter()
            .map(|f| f.properties[RELATIVE_RATE_KEY].as_f64().unwrap())
            .collect();
        assert_eq!(relative, vec![0.0, 0.25, 1.0, 0.5]);

        let json: Value = serde_json::from_slice(&p.to_vec().unwrap()).unwrap();
        assert_eq!(json[MIN_RATE_MEMBER], 50.0);
        assert_eq!(json[MAX_RATE_MEMBER], 200.0);
        assert_eq!(json["type"], "FeatureCollection");
    }

    #[test]
    fn test_no_positive_rates() {
        let mut p = plan("rate", &[0.0, -1.0]);
        assert!(matches!(
            normalize_rates(&mut p),
            Err(VectorError::NoPositiveRates)
        ));
    }

    #[test]
    fn test_non_numeric_rate() {
        let mut p = plan("rate", &[10.0, 20.0]);
        p.features[1]
            .properties
            .insert("rate".into(), Value::from("high"));
        assert!(matches!(
            normalize_rates(&mut p),
            Err(VectorError::InvalidRate(k)) if k == "rate"
        ));
    }
}
