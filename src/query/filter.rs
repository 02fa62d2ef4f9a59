use crate::{Point, Timestamp, Value};

/// Width of a central-difference window, in points.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stencil {
    /// 3 points
    Three,

    /// 5 points
    Five,

    /// 7 points
    Seven,

    /// 9 points
    Nine,
}

impl Stencil {
    /// Number of points in the window.
    #[must_use]
    pub const fn points(self) -> usize {
        match self {
            Self::Three => 3,
            Self::Five => 5,
            Self::Seven => 7,
            Self::Nine => 9,
        }
    }

    /// Weights of `y[+1]..y[+n]`, antisymmetric for `y[-1]..y[-n]`, and the divisor.
    const fn weights(self) -> (&'static [Value], Value) {
        match self {
            Self::Three => (&[1.0], 2.0),
            Self::Five => (&[8.0, -1.0], 12.0),
            Self::Seven => (&[45.0, -9.0, 1.0], 60.0),
            Self::Nine => (&[672.0, -168.0, 32.0, -3.0], 840.0),
        }
    }

    fn from_points(n: usize) -> Option<Self> {
        match n {
            3 => Some(Self::Three),
            5 => Some(Self::Five),
            7 => Some(Self::Seven),
            9 => Some(Self::Nine),
            _ => None,
        }
    }

    /// Derivative at the center of `window`, `None` if any value is missing.
    fn apply(self, window: &[Point], h: Value) -> Option<Value> {
        let (weights, divisor) = self.weights();
        let center = window.len() / 2;

        let mut sum = 0.0;

        for (offset, weight) in (1..).zip(weights) {
            let ahead = window.get(center + offset)?.1?;
            let behind = window.get(center - offset)?.1?;
            sum += weight * (ahead - behind);
        }

        Some(sum / (divisor * h))
    }
}

/// Post-processing step applied to query output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Drops points without a value
    SkipMissing,

    /// Replaces values with their numerical derivative per second
    Derive(Stencil),

    /// Keeps at most this many evenly spaced points, always including the newest
    Sample(usize),
}

impl Filter {
    /// Runs the filter over ascending points.
    #[must_use]
    pub fn apply(self, points: Vec<Point>) -> Vec<Point> {
        match self {
            Self::SkipMissing => points.into_iter().filter(|(_, v)| v.is_some()).collect(),
            Self::Derive(stencil) => derive(&points, stencil),
            Self::Sample(count) => sample(points, count),
        }
    }
}

impl std::str::FromStr for Filter {
    type Err = crate::Error;

    /// Parses `skipnull`, `derive`, `derive-<3|5|7|9>` or `sample-<count>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || crate::Error::InvalidKey(format!("unknown filter {s:?}"));

        match s.split_once('-') {
            None if s == "skipnull" => Ok(Self::SkipMissing),
            None if s == "derive" => Ok(Self::Derive(Stencil::Five)),
            Some(("derive", n)) => n
                .parse()
                .ok()
                .and_then(Stencil::from_points)
                .map(Self::Derive)
                .ok_or_else(unknown),
            Some(("sample", n)) => n.parse().map(Self::Sample).map_err(|_| unknown()),
            _ => Err(unknown()),
        }
    }
}

/// Central-difference derivative of ascending points.
///
/// The first and last `n / 2` points have no full window and are dropped.
#[must_use]
pub fn derive(points: &[Point], stencil: Stencil) -> Vec<Point> {
    let (Some((first, _)), Some((second, _))) = (points.first(), points.get(1)) else {
        return vec![];
    };

    #[allow(clippy::cast_precision_loss)]
    let h = (second - first).abs() as Value;

    points
        .windows(stencil.points())
        .filter_map(|window| {
            let (ts, _): (Timestamp, _) = *window.get(window.len() / 2)?;
            Some((ts, stencil.apply(window, h)))
        })
        .collect()
}

/// Keeps at most `count` evenly strided points, counting back from the newest.
#[must_use]
pub fn sample(points: Vec<Point>, count: usize) -> Vec<Point> {
    if count == 0 {
        return vec![];
    }

    let len = points.len();
    let stride = len.div_ceil(count).max(1);

    points
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| (len - 1 - idx) % stride == 0)
        .map(|(_, point)| point)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(slope: Value, n: Timestamp) -> Vec<Point> {
        #[allow(clippy::cast_precision_loss)]
        (0..n).map(|i| (i * 60, Some(slope * (i * 60) as Value))).collect()
    }

    #[test_log::test]
    fn derive_of_line_is_slope() {
        for stencil in [Stencil::Three, Stencil::Five, Stencil::Seven, Stencil::Nine] {
            let derived = derive(&line(0.5, 12), stencil);
            assert_eq!(12 - stencil.points() + 1, derived.len());

            let half = (stencil.points() / 2) as Timestamp;
            assert_eq!(half * 60, derived[0].0);

            for (_, v) in derived {
                let v = v.unwrap();
                assert!((v - 0.5).abs() < 1e-9, "{stencil:?} yielded {v}");
            }
        }
    }

    #[test_log::test]
    fn derive_propagates_missing() {
        let mut points = line(1.0, 7);
        points[3].1 = None;

        let derived = derive(&points, Stencil::Three);
        assert_eq!(
            vec![(60, Some(1.0)), (120, None), (180, Some(1.0)), (240, None), (300, Some(1.0))],
            derived
        );

        assert!(derive(&points[..1], Stencil::Three).is_empty());
    }

    #[test_log::test]
    fn sample_keeps_newest() {
        let points = line(1.0, 10);

        let sampled = sample(points.clone(), 3);
        assert_eq!(
            vec![60, 300, 540],
            sampled.iter().map(|(ts, _)| *ts).collect::<Vec<_>>()
        );

        assert_eq!(points, sample(points.clone(), 10));
        assert_eq!(points, sample(points.clone(), 100));
        assert!(sample(points, 0).is_empty());
    }

    #[test_log::test]
    fn skip_missing() {
        let points = vec![(0, Some(1.0)), (60, None), (120, Some(2.0))];
        assert_eq!(
            vec![(0, Some(1.0)), (120, Some(2.0))],
            Filter::SkipMissing.apply(points)
        );
    }

    #[test_log::test]
    fn parse_filters() -> crate::Result<()> {
        assert_eq!(Filter::SkipMissing, "skipnull".parse()?);
        assert_eq!(Filter::Derive(Stencil::Five), "derive".parse()?);
        assert_eq!(Filter::Derive(Stencil::Nine), "derive-9".parse()?);
        assert_eq!(Filter::Sample(100), "sample-100".parse()?);

        assert!("derive-4".parse::<Filter>().is_err());
        assert!("sample-x".parse::<Filter>().is_err());
        assert!("median".parse::<Filter>().is_err());

        Ok(())
    }
}
