//! A pushdown filter over the distinct integers a hasher observed.
//!
//! Produced by [`crate::hasher::ColumnHasher::get_filter`] so the operator
//! can reject non-matching rows at the scan. The representation is picked
//! by domain shape: a dense set of values becomes a bitmask keyed by
//! offset from the minimum, a sparse one falls back to a hash set.

use hashbrown::HashSet;

use crate::bitmap::Bitmap;

/// A bitmask pays one bit per value in `[min, max]`; cap the span at this
/// multiple of the value count so sparse domains use the set instead.
const BITMASK_SPAN_PER_VALUE: i128 = 64;

#[derive(Debug)]
pub enum BigintValuesFilter {
    Bitmask {
        min: i64,
        max: i64,
        bits: Bitmap,
        null_allowed: bool,
    },
    Set {
        values: HashSet<i64>,
        min: i64,
        max: i64,
        null_allowed: bool,
    },
}

impl BigintValuesFilter {
    pub fn new(values: &[i64], null_allowed: bool) -> Self {
        if values.is_empty() {
            return Self::Set {
                values: HashSet::new(),
                min: i64::MAX,
                max: i64::MIN,
                null_allowed,
            };
        }
        let min = *values.iter().min().unwrap();
        let max = *values.iter().max().unwrap();
        let span = max as i128 - min as i128 + 1;
        if span <= values.len() as i128 * BITMASK_SPAN_PER_VALUE {
            let mut bits = Bitmap::with_len(span as usize);
            for &v in values {
                bits.set((v - min) as usize);
            }
            Self::Bitmask {
                min,
                max,
                bits,
                null_allowed,
            }
        } else {
            Self::Set {
                values: values.iter().copied().collect(),
                min,
                max,
                null_allowed,
            }
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        match self {
            Self::Bitmask { min, max, bits, .. } => {
                if value < *min || value > *max {
                    return false;
                }
                bits.get((value - min) as usize)
            }
            Self::Set {
                values, min, max, ..
            } => {
                if value < *min || value > *max {
                    return false;
                }
                values.contains(&value)
            }
        }
    }

    pub fn null_allowed(&self) -> bool {
        match self {
            Self::Bitmask { null_allowed, .. } => *null_allowed,
            Self::Set { null_allowed, .. } => *null_allowed,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dense_values_use_bitmask() {
        let filter = BigintValuesFilter::new(&[3, 5, 7, 8], true);
        assert!(matches!(filter, BigintValuesFilter::Bitmask { .. }));
        assert!(filter.contains(3));
        assert!(filter.contains(8));
        assert!(!filter.contains(4));
        assert!(!filter.contains(2));
        assert!(!filter.contains(9));
        assert!(filter.null_allowed());
    }

    #[test]
    fn sparse_values_use_set() {
        let filter = BigintValuesFilter::new(&[i64::MIN, 0, i64::MAX], false);
        assert!(matches!(filter, BigintValuesFilter::Set { .. }));
        assert!(filter.contains(i64::MIN));
        assert!(filter.contains(0));
        assert!(filter.contains(i64::MAX));
        assert!(!filter.contains(1));
        assert!(!filter.null_allowed());
    }

    #[test]
    fn empty_filter_rejects_everything() {
        let filter = BigintValuesFilter::new(&[], true);
        assert!(!filter.contains(0));
        assert!(!filter.contains(i64::MIN));
        assert!(filter.null_allowed());
    }

    #[test]
    fn single_value() {
        let filter = BigintValuesFilter::new(&[42], false);
        assert!(filter.contains(42));
        assert!(!filter.contains(41));
        assert!(!filter.contains(43));
    }
}
