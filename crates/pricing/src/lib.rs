//! Delivery fee and distance helpers.
//!
//! Pure functions only: a tiered fee table keyed by distance and the
//! great-circle distance between two coordinates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("fee schedule has no tiers")]
    Empty,
    #[error("tier {index}: max_km {max_km} must be greater than min_km {min_km}")]
    EmptyBand { index: usize, min_km: f64, max_km: f64 },
    #[error("tier {index}: starts at {min_km} km but previous tier ends at {expected} km")]
    Gap { index: usize, min_km: f64, expected: f64 },
    #[error("tier {index}: price {price} is lower than the previous tier")]
    DecreasingPrice { index: usize, price: i64 },
    #[error("tier {index}: negative price {price}")]
    NegativePrice { index: usize, price: i64 },
    #[error("invalid fee tier '{0}', expected '<max_km>:<price>'")]
    Syntax(String),
}

/// One distance band: `min_km < distance <= max_km`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeTier {
    pub min_km: f64,
    pub max_km: f64,
    pub price: i64,
}

/// Ordered, contiguous fee table starting at 0 km.
///
/// Serialized as a bare list of tiers; deserializing goes through [`FeeSchedule::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FeeTier>", into = "Vec<FeeTier>")]
pub struct FeeSchedule {
    tiers: Vec<FeeTier>,
}

impl TryFrom<Vec<FeeTier>> for FeeSchedule {
    type Error = PricingError;

    fn try_from(tiers: Vec<FeeTier>) -> Result<Self, Self::Error> {
        FeeSchedule::new(tiers)
    }
}

impl From<FeeSchedule> for Vec<FeeTier> {
    fn from(schedule: FeeSchedule) -> Self {
        schedule.tiers
    }
}

impl FeeSchedule {
    /// Validates and wraps a tier table.
    ///
    /// Tiers must start at 0 km, be contiguous, and have non-decreasing prices,
    /// so the fee never drops as distance grows.
    pub fn new(tiers: Vec<FeeTier>) -> Result<Self, PricingError> {
        if tiers.is_empty() {
            return Err(PricingError::Empty);
        }
        let mut expected_min = 0.0;
        let mut last_price = i64::MIN;
        for (index, tier) in tiers.iter().enumerate() {
            if tier.min_km != expected_min {
                return Err(PricingError::Gap { index, min_km: tier.min_km, expected: expected_min });
            }
            if !(tier.max_km > tier.min_km) {
                return Err(PricingError::EmptyBand { index, min_km: tier.min_km, max_km: tier.max_km });
            }
            if tier.price < 0 {
                return Err(PricingError::NegativePrice { index, price: tier.price });
            }
            if tier.price < last_price {
                return Err(PricingError::DecreasingPrice { index, price: tier.price });
            }
            expected_min = tier.max_km;
            last_price = tier.price;
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[FeeTier] {
        &self.tiers
    }

    /// Largest distance covered by an explicit tier.
    pub fn max_supported_km(&self) -> f64 {
        self.tiers.last().map_or(0.0, |tier| tier.max_km)
    }

    /// Fee for a delivery of `km` kilometres.
    ///
    /// Zero, negative, or NaN distances price as the first tier; anything past the
    /// last tier is clamped to the last tier's price.
    pub fn fee_for_distance(&self, km: f64) -> i64 {
        let km = if km.is_nan() || km < 0.0 { 0.0 } else { km };
        self.tiers
            .iter()
            .find(|tier| km <= tier.max_km)
            .or_else(|| self.tiers.last())
            .map_or(0, |tier| tier.price)
    }

    /// Fee for the great-circle distance between two points.
    pub fn fee_between(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> i64 {
        self.fee_for_distance(haversine_distance(lat1, lon1, lat2, lon2))
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        let bands = [(2.0, 1000), (5.0, 1500), (10.0, 2500), (20.0, 4000), (40.0, 6000)];
        let mut min_km = 0.0;
        let tiers = bands
            .into_iter()
            .map(|(max_km, price)| {
                let tier = FeeTier { min_km, max_km, price };
                min_km = max_km;
                tier
            })
            .collect();
        Self { tiers }
    }
}

/// Parses the compact form `"2:1000,5:1500,10:2500"`: each entry is `<max_km>:<price>`
/// and each band starts where the previous one ended.
impl FromStr for FeeSchedule {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tiers = Vec::new();
        let mut min_km = 0.0;
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (max, price) = entry
                .split_once(':')
                .ok_or_else(|| PricingError::Syntax(entry.to_string()))?;
            let max_km: f64 = max.trim().parse().map_err(|_| PricingError::Syntax(entry.to_string()))?;
            let price: i64 = price.trim().parse().map_err(|_| PricingError::Syntax(entry.to_string()))?;
            tiers.push(FeeTier { min_km, max_km, price });
            min_km = max_km;
        }
        FeeSchedule::new(tiers)
    }
}

impl fmt::Display for FeeSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tier) in self.tiers.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", tier.max_km, tier.price)?;
        }
        Ok(())
    }
}

/// Great-circle distance in kilometres between two points given in decimal degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_validates_tiers() {
        let valid = r#"[{"min_km":0.0,"max_km":3.0,"price":500},{"min_km":3.0,"max_km":8.0,"price":900}]"#;
        let schedule: FeeSchedule = serde_json::from_str(valid).unwrap();
        assert_eq!(schedule.fee_for_distance(5.0), 900);

        let cheaper_further = r#"[{"min_km":0.0,"max_km":3.0,"price":900},{"min_km":3.0,"max_km":8.0,"price":500}]"#;
        let err = serde_json::from_str::<FeeSchedule>(cheaper_further).unwrap_err();
        assert!(err.to_string().contains("lower than the previous tier"), "{err}");

        let gap = r#"[{"min_km":1.0,"max_km":3.0,"price":500}]"#;
        assert!(serde_json::from_str::<FeeSchedule>(gap).is_err());
    }

    #[test]
    fn test_zero_distance_is_first_tier() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.fee_for_distance(0.0), 1000);
    }

    #[test]
    fn test_three_km_costs_1500() {
        assert_eq!(FeeSchedule::default().fee_for_distance(3.0), 1500);
    }

    #[test]
    fn test_upper_bound_is_inclusive() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.fee_for_distance(2.0), 1000);
        assert_eq!(schedule.fee_for_distance(2.0001), 1500);
    }

    #[test]
    fn test_beyond_max_is_clamped() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.fee_for_distance(schedule.max_supported_km() + 500.0), 6000);
        assert_eq!(schedule.fee_for_distance(f64::INFINITY), 6000);
    }

    #[test]
    fn test_negative_and_nan_price_as_first_tier() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.fee_for_distance(-3.0), 1000);
        assert_eq!(schedule.fee_for_distance(f64::NAN), 1000);
    }

    #[test]
    fn test_same_tier_same_fee_and_monotonic_across_boundaries() {
        let schedule = FeeSchedule::default();
        for tier in schedule.tiers() {
            let low = schedule.fee_for_distance(tier.min_km + 0.01);
            let high = schedule.fee_for_distance(tier.max_km);
            assert_eq!(low, high);
        }
        let mut last = i64::MIN;
        let mut km = 0.0;
        while km < 60.0 {
            let fee = schedule.fee_for_distance(km);
            assert!(fee >= last, "fee dropped at {km} km");
            last = fee;
            km += 0.25;
        }
    }

    #[test]
    fn test_parse_compact_form() {
        let schedule: FeeSchedule = "3:500, 8:900".parse().unwrap();
        assert_eq!(schedule.tiers().len(), 2);
        assert_eq!(schedule.tiers()[1], FeeTier { min_km: 3.0, max_km: 8.0, price: 900 });
        assert_eq!(schedule.to_string(), "3:500,8:900");
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert_eq!("".parse::<FeeSchedule>(), Err(PricingError::Empty));
        assert!(matches!("5:900,3:1000".parse::<FeeSchedule>(), Err(PricingError::EmptyBand { .. })));
        assert!(matches!("3:900,5:100".parse::<FeeSchedule>(), Err(PricingError::DecreasingPrice { .. })));
        assert!(matches!("three:900".parse::<FeeSchedule>(), Err(PricingError::Syntax(_))));
        let gap = vec![FeeTier { min_km: 1.0, max_km: 2.0, price: 10 }];
        assert!(matches!(FeeSchedule::new(gap), Err(PricingError::Gap { .. })));
    }

    #[test]
    fn test_haversine_known_distance() {
        // Lagos to Ibadan, roughly 113 km.
        let km = haversine_distance(6.5244, 3.3792, 7.3775, 3.9470);
        assert!((km - 113.0).abs() < 3.0, "got {km}");
        assert_eq!(haversine_distance(6.5, 3.3, 6.5, 3.3), 0.0);
    }
}
