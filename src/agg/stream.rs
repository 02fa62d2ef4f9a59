use super::{nearest, Bin, Seed};
use crate::{Cf, Timestamp, Value};

/// A streaming consolidator
///
/// Takes in an ascending stream of samples, and emits one bin per tier-width
/// boundary crossed, filling gaps with missing bins.
///
/// The final open bin is always emitted last, even if it only holds the seed.
pub struct Consolidator<I: Iterator<Item = (Timestamp, Option<Value>)>> {
    samples: I,
    width: Timestamp,
    cf: Cf,

    /// The open bin
    current: Option<Bin>,

    /// Raw timestamp of the last applied sample
    last_sample: Option<Timestamp>,

    /// Next missing bin to emit, and the bin that ends the gap
    gap: Option<(Timestamp, Timestamp)>,

    /// Longest gap to fill, in seconds
    max_gap: Option<Timestamp>,

    failed: bool,
}

impl<I: Iterator<Item = (Timestamp, Option<Value>)>> Consolidator<I> {
    pub fn new(samples: I, width: Timestamp, cf: Cf, seed: Option<Seed>) -> Self {
        debug_assert!(width > 0, "tier width must be positive");

        Self {
            samples,
            width,
            cf,
            current: seed.map(|s| s.bin),
            last_sample: seed.map(|s| s.sample),
            gap: None,
            max_gap: None,
            failed: false,
        }
    }

    /// Only fills the newest `retention` bins of a gap.
    ///
    /// Older bins would be trimmed right away, so they are never built.
    #[must_use]
    pub fn retain(mut self, retention: usize) -> Self {
        self.max_gap = Some(
            Timestamp::try_from(retention)
                .unwrap_or(Timestamp::MAX)
                .saturating_mul(self.width),
        );
        self
    }

    /// Raw timestamp of the last sample applied so far.
    pub fn last_sample(&self) -> Option<Timestamp> {
        self.last_sample
    }

    fn open(&self, timestamp: Timestamp, value: Option<Value>) -> Bin {
        let (value, count) = self.cf.fold(None, 0, value);
        Bin {
            timestamp,
            value,
            count,
        }
    }
}

impl<I: Iterator<Item = (Timestamp, Option<Value>)>> Iterator for Consolidator<I> {
    type Item = crate::Result<Bin>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if let Some((next, end)) = self.gap {
            if next < end {
                self.gap = Some((next + self.width, end));
                return Some(Ok(Bin::missing(next)));
            }
            self.gap = None;
        }

        while let Some((ts, value)) = self.samples.next() {
            if let Some(last) = self.last_sample {
                if ts == last {
                    // NOTE: Already applied
                    continue;
                }

                if ts < last {
                    self.failed = true;
                    return Some(Err(crate::Error::OutOfOrderSample {
                        timestamp: ts,
                        last,
                    }));
                }
            }

            let rounded = nearest(ts, self.width);

            let Some(current) = self.current.as_mut() else {
                self.current = Some(self.open(rounded, value));
                self.last_sample = Some(ts);
                continue;
            };

            if rounded < current.timestamp {
                self.failed = true;
                return Some(Err(crate::Error::OutOfOrderSample {
                    timestamp: ts,
                    last: current.timestamp,
                }));
            }

            self.last_sample = Some(ts);

            if rounded == current.timestamp {
                let (value, count) = self.cf.fold(current.value, current.count, value);
                current.value = value;
                current.count = count;
                continue;
            }

            // NOTE: Crossed at least one boundary, close the current bin
            let closed = *current;

            if rounded - closed.timestamp > self.width {
                let mut next = closed.timestamp + self.width;

                if let Some(max_gap) = self.max_gap {
                    next = next.max(rounded.saturating_sub(max_gap));
                }

                self.gap = Some((next, rounded));
            }
            self.current = Some(self.open(rounded, value));

            return Some(Ok(closed));
        }

        // NOTE: Return last bin
        self.current.take().map(Ok)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn run(
        samples: &[(Timestamp, Option<Value>)],
        width: Timestamp,
        cf: Cf,
        seed: Option<Seed>,
    ) -> crate::Result<Vec<(Timestamp, Option<Value>)>> {
        Consolidator::new(samples.iter().copied(), width, cf, seed)
            .map(|bin| bin.map(|b| (b.timestamp, b.value)))
            .collect()
    }

    #[test_log::test]
    fn consolidate_last() -> crate::Result<()> {
        let samples = (1..20)
            .step_by(3)
            .map(|t: Timestamp| (t, Some(((t / 5) * (t / 5)) as Value)))
            .collect::<Vec<_>>();

        assert_eq!(
            vec![
                (0, Some(0.0)),
                (5, Some(1.0)),
                (10, Some(4.0)),
                (15, Some(9.0)),
                (20, Some(9.0)),
            ],
            run(&samples, 5, Cf::Last, None)?,
        );

        Ok(())
    }

    #[test_log::test]
    fn consolidate_fills_gaps() -> crate::Result<()> {
        let t0 = 600;

        assert_eq!(
            vec![(600, Some(1.0)), (660, None), (720, None), (780, Some(2.0))],
            run(&[(t0, Some(1.0)), (t0 + 180, Some(2.0))], 60, Cf::Last, None)?,
        );

        Ok(())
    }

    #[test_log::test]
    fn consolidate_caps_long_gaps() -> crate::Result<()> {
        let bins = Consolidator::new(
            [(60, Some(1.0)), (6_000, Some(2.0))].into_iter(),
            60,
            Cf::Last,
            None,
        )
        .retain(3)
        .map(|bin| bin.map(|b| (b.timestamp, b.value)))
        .collect::<crate::Result<Vec<_>>>()?;

        assert_eq!(
            vec![
                (60, Some(1.0)),
                (5_820, None),
                (5_880, None),
                (5_940, None),
                (6_000, Some(2.0)),
            ],
            bins,
        );

        // NOTE: Short gaps are filled completely
        let bins = Consolidator::new(
            [(600, Some(1.0)), (780, Some(2.0))].into_iter(),
            60,
            Cf::Last,
            None,
        )
        .retain(3)
        .count();

        assert_eq!(4, bins);

        Ok(())
    }

    #[test_log::test]
    fn consolidate_folds_within_bin() -> crate::Result<()> {
        let samples = [(100, Some(5.0)), (130, Some(7.0)), (200, Some(9.0))];

        assert_eq!(
            vec![(120, Some(7.0)), (180, Some(9.0))],
            run(&samples, 60, Cf::Last, None)?,
        );

        let bins = Consolidator::new(
            [(3_600, Some(2.0)), (3_601, Some(4.0)), (3_602, Some(6.0))].into_iter(),
            60,
            Cf::Average,
            None,
        )
        .collect::<crate::Result<Vec<_>>>()?;

        assert_eq!(
            vec![Bin {
                timestamp: 3_600,
                value: Some(4.0),
                count: 3
            }],
            bins
        );

        Ok(())
    }

    #[test_log::test]
    fn consolidate_continues_from_seed() -> crate::Result<()> {
        let seed = Seed {
            bin: Bin {
                timestamp: 120,
                value: Some(4.0),
                count: 2,
            },
            sample: 125,
        };

        let mut consolidator =
            Consolidator::new([(130, Some(7.0))].into_iter(), 60, Cf::Average, Some(seed));

        assert_eq!(
            Some(Bin {
                timestamp: 120,
                value: Some(5.0),
                count: 3
            }),
            consolidator.next().transpose()?
        );
        assert!(consolidator.next().is_none());
        assert_eq!(Some(130), consolidator.last_sample());

        Ok(())
    }

    #[test_log::test]
    fn consolidate_emits_seed_alone() -> crate::Result<()> {
        let seed = Seed {
            bin: Bin {
                timestamp: 120,
                value: Some(4.0),
                count: 1,
            },
            sample: 125,
        };

        // NOTE: Replay of the applied sample is skipped
        assert_eq!(
            vec![(120, Some(4.0))],
            run(&[(125, Some(4.0))], 60, Cf::Sum, Some(seed))?
        );
        assert_eq!(vec![(120, Some(4.0))], run(&[], 60, Cf::Sum, Some(seed))?);

        Ok(())
    }

    #[test_log::test]
    fn consolidate_rejects_out_of_order() {
        let result = run(&[(200, Some(1.0)), (100, Some(2.0))], 60, Cf::Last, None);
        assert!(matches!(
            result,
            Err(crate::Error::OutOfOrderSample {
                timestamp: 100,
                last: 200
            })
        ));

        let seed = Seed {
            bin: Bin {
                timestamp: 1_278_508_740,
                value: Some(10.0),
                count: 1,
            },
            sample: 1_278_508_719,
        };
        let result = run(&[(1_278_508_619, Some(11.0))], 60, Cf::Last, Some(seed));
        assert!(matches!(
            result,
            Err(crate::Error::OutOfOrderSample { .. })
        ));
    }
}
