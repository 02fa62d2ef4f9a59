use crate::Value;

/// Consolidation function, merging the samples that fall into one bin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cf {
    /// Smallest value
    Min,

    /// Largest value
    Max,

    /// First value seen
    First,

    /// Most recent value
    Last,

    /// Sum of values
    Sum,

    /// Change between the newest value and the value held before it
    Difference,

    /// Cumulative moving average
    Average,
}

impl Cf {
    /// All consolidation functions.
    pub const ALL: [Self; 7] = [
        Self::Min,
        Self::Max,
        Self::First,
        Self::Last,
        Self::Sum,
        Self::Difference,
        Self::Average,
    ];

    /// Canonical name, as used in keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
            Self::Sum => "sum",
            Self::Difference => "difference",
            Self::Average => "average",
        }
    }

    /// Folds `new` into a bin currently holding `current` from `count` samples.
    ///
    /// Returns the updated value and count. A missing `new` leaves the bin as is.
    #[must_use]
    pub fn fold(self, current: Option<Value>, count: u64, new: Option<Value>) -> (Option<Value>, u64) {
        let Some(new) = new else {
            return (current, count);
        };

        let Some(current) = current else {
            return (Some(new), count + 1);
        };

        let value = match self {
            Self::Min => current.min(new),
            Self::Max => current.max(new),
            Self::First => current,
            Self::Last => new,
            Self::Sum => current + new,
            Self::Difference => new - current,
            Self::Average => {
                #[allow(clippy::cast_precision_loss)]
                let n = count as Value;
                (current * n + new) / (n + 1.0)
            }
        };

        (Some(value), count + 1)
    }
}

impl std::fmt::Display for Cf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Cf {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "sum" => Ok(Self::Sum),
            "difference" => Ok(Self::Difference),
            "average" | "ave" | "avg" => Ok(Self::Average),
            _ => Err(crate::Error::InvalidKey(format!(
                "unknown consolidation function: {s:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold_all(cf: Cf, values: &[Option<Value>]) -> (Option<Value>, u64) {
        values
            .iter()
            .fold((None, 0), |(current, count), &new| cf.fold(current, count, new))
    }

    #[test_log::test]
    fn fold_average() {
        assert_eq!(
            (Some(4.0), 3),
            fold_all(Cf::Average, &[Some(2.0), Some(4.0), Some(6.0)])
        );
    }

    #[test_log::test]
    fn fold_extremes() {
        let values = [Some(3.0), Some(-1.0), Some(8.0), Some(2.0)];
        assert_eq!((Some(-1.0), 4), fold_all(Cf::Min, &values));
        assert_eq!((Some(8.0), 4), fold_all(Cf::Max, &values));
        assert_eq!((Some(3.0), 4), fold_all(Cf::First, &values));
        assert_eq!((Some(2.0), 4), fold_all(Cf::Last, &values));
        assert_eq!((Some(12.0), 4), fold_all(Cf::Sum, &values));
    }

    #[test_log::test]
    fn fold_difference() {
        assert_eq!((Some(10.0), 1), fold_all(Cf::Difference, &[Some(10.0)]));
        assert_eq!(
            (Some(5.0), 2),
            fold_all(Cf::Difference, &[Some(10.0), Some(15.0)])
        );
    }

    #[test_log::test]
    fn fold_skips_missing() {
        assert_eq!((None, 0), fold_all(Cf::Sum, &[None, None]));
        assert_eq!(
            (Some(3.0), 2),
            fold_all(Cf::Average, &[Some(2.0), None, Some(4.0)])
        );
        assert_eq!((Some(5.0), 1), fold_all(Cf::Last, &[Some(5.0), None]));
    }

    #[test_log::test]
    fn names_round_trip() {
        for cf in Cf::ALL {
            assert_eq!(Ok(cf), cf.as_str().parse::<Cf>().map_err(|e| e.to_string()));
        }
        assert!("median".parse::<Cf>().is_err());
    }
}
