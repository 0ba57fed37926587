use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// Produces `<prefix>-<YYYYMMDD>-<NNNNNN>` numbers.
///
/// The suffix is the low six digits of a millisecond stamp that is forced strictly
/// increasing within the process. Across processes the store's unique constraint is
/// the backstop and the engine regenerates on conflict.
#[derive(Debug)]
pub struct OrderNumberGenerator {
    prefix: String,
    last_stamp: AtomicI64,
}

impl OrderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            last_stamp: AtomicI64::new(0),
        }
    }

    pub fn next(&self, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(millis.max(last + 1)))
            .unwrap_or(millis);
        let stamp = millis.max(previous + 1);
        format!(
            "{}-{}-{:06}",
            self.prefix,
            now.format("%Y%m%d"),
            stamp.rem_euclid(1_000_000)
        )
    }

    /// True if `number` has this generator's shape.
    pub fn is_well_formed(&self, number: &str) -> bool {
        let Some(rest) = number
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
        else {
            return false;
        };
        match rest.split_once('-') {
            Some((date, suffix)) => {
                date.len() == 8
                    && suffix.len() == 6
                    && date.bytes().all(|b| b.is_ascii_digit())
                    && suffix.bytes().all(|b| b.is_ascii_digit())
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_format() {
        let generator = OrderNumberGenerator::new("COD");
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        let number = generator.next(now);
        assert!(number.starts_with("COD-20240309-"), "{number}");
        assert!(generator.is_well_formed(&number));
    }

    #[test]
    fn test_same_instant_still_unique() {
        let generator = OrderNumberGenerator::new("COD");
        let now = Utc::now();
        let numbers: HashSet<String> = (0..1000).map(|_| generator.next(now)).collect();
        assert_eq!(numbers.len(), 1000);
    }

    #[test]
    fn test_rejects_malformed() {
        let generator = OrderNumberGenerator::new("COD");
        assert!(!generator.is_well_formed("COD-2024030-123456"));
        assert!(!generator.is_well_formed("POS-20240309-123456"));
        assert!(!generator.is_well_formed("COD-20240309-12345a"));
    }
}
