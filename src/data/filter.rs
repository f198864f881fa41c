use crate::config::OutlierMethod;
use crate::error::{CorrectionError, Result};
use crate::stats;

use super::model::{Comment, CommentTag, CycleTable};

// ---------------------------------------------------------------------------
// Tail – which side(s) of the distribution get trimmed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    High,
    Low,
    Both,
}

impl Tail {
    /// Build from independent high/low flags; at least one must be set.
    pub fn from_flags(high: bool, low: bool) -> Result<Tail> {
        match (high, low) {
            (true, true) => Ok(Tail::Both),
            (true, false) => Ok(Tail::High),
            (false, true) => Ok(Tail::Low),
            (false, false) => Err(CorrectionError::config(
                "outlier filter needs at least one bound (high or low)",
            )),
        }
    }

    fn high(self) -> bool {
        matches!(self, Tail::High | Tail::Both)
    }

    fn low(self) -> bool {
        matches!(self, Tail::Low | Tail::Both)
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Acceptance interval `[lower, upper]` for one channel, or `None` when the
/// channel has too few values to estimate a spread.
fn limits(values: &[f64], method: OutlierMethod) -> Option<(f64, f64)> {
    match method {
        OutlierMethod::Sigma { k } => {
            let m = stats::mean(values)?;
            let sd = stats::sample_sd(values)?;
            Some((m - k * sd, m + k * sd))
        }
        OutlierMethod::Iqr { k } => {
            let q1 = stats::quantile(values, 0.25)?;
            let q3 = stats::quantile(values, 0.75)?;
            let iqr = q3 - q1;
            Some((q1 - k * iqr, q3 + k * iqr))
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Drop every cycle that is an outlier in any channel.
///
/// Thresholds are computed per channel from the whole block, then a row is
/// removed if any of its values falls outside the requested tail(s). Each
/// removed row yields one [`Comment`] carrying `sample_label`, `tag` and the
/// cycle index.
///
/// Returns [`CorrectionError::NoUsableCycles`] when nothing survives.
pub fn remove_outliers(
    block: &CycleTable,
    sample_label: &str,
    tag: CommentTag,
    tail: Tail,
    method: OutlierMethod,
) -> Result<(Vec<Comment>, CycleTable)> {
    let bounds: Vec<Option<(f64, f64)>> = (0..block.channels().len())
        .map(|ch| limits(&block.column(ch), method))
        .collect();

    let is_outlier = |values: &[f64]| {
        values.iter().zip(&bounds).any(|(&v, b)| match b {
            Some((lower, upper)) => (tail.high() && v > *upper) || (tail.low() && v < *lower),
            None => false,
        })
    };

    let comments: Vec<Comment> = block
        .cycles()
        .iter()
        .filter(|c| is_outlier(&c.values))
        .map(|c| Comment {
            sample: sample_label.to_string(),
            tag,
            cycle: c.index,
        })
        .collect();

    let mut cleaned = block.clone();
    cleaned.retain(|c| !is_outlier(&c.values));

    if cleaned.is_empty() {
        return Err(CorrectionError::NoUsableCycles {
            sample: sample_label.to_string(),
            tag: tag.to_string(),
        });
    }

    if !comments.is_empty() {
        log::debug!(
            "{sample_label}: {tag} dropped {} of {} cycles",
            comments.len(),
            block.len()
        );
    }

    Ok((comments, cleaned))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const SIGMA2: OutlierMethod = OutlierMethod::Sigma { k: 2.0 };

    fn block(rows: &[[f64; 2]]) -> CycleTable {
        let mut t = CycleTable::new(vec!["202Hg".into(), "204Pb".into()]);
        for (i, r) in rows.iter().enumerate() {
            t.push(i as u32 + 1, r.to_vec()).unwrap();
        }
        t
    }

    fn flat_with(spike_at: usize, spike: [f64; 2]) -> CycleTable {
        let mut rows = vec![[100.0, 50.0]; 10];
        for (i, r) in rows.iter_mut().enumerate() {
            r[0] += (i % 2) as f64;
            r[1] += (i % 2) as f64;
        }
        rows[spike_at] = spike;
        block(&rows)
    }

    #[test]
    fn flags_need_a_bound() {
        assert!(Tail::from_flags(false, false).is_err());
        assert_eq!(Tail::from_flags(true, true).unwrap(), Tail::Both);
        assert_eq!(Tail::from_flags(false, true).unwrap(), Tail::Low);
    }

    #[test]
    fn high_spike_dropped_and_logged() {
        let t = flat_with(3, [100.0, 500.0]);
        let (comments, cleaned) =
            remove_outliers(&t, "S1 (blank)", CommentTag::OutlierBlankCycles, Tail::High, SIGMA2)
                .unwrap();
        assert_eq!(
            comments,
            vec![Comment {
                sample: "S1 (blank)".into(),
                tag: CommentTag::OutlierBlankCycles,
                cycle: 4,
            }]
        );
        assert_eq!(cleaned.len(), 9);
        assert!(cleaned.cycles().iter().all(|c| c.index != 4));
        assert_eq!(cleaned.channels(), t.channels());
    }

    #[test]
    fn low_spike_ignored_by_high_bound() {
        let t = flat_with(3, [100.0, -400.0]);
        let (comments, cleaned) =
            remove_outliers(&t, "S1", CommentTag::OutlierBlankCycles, Tail::High, SIGMA2).unwrap();
        assert!(comments.is_empty());
        assert_eq!(cleaned, t);

        let (comments, _) =
            remove_outliers(&t, "S1", CommentTag::OutlierSignalCycles, Tail::Low, SIGMA2).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].cycle, 4);
    }

    #[test]
    fn outlier_in_one_channel_drops_whole_row() {
        let t = flat_with(6, [900.0, 50.0]);
        let (comments, cleaned) =
            remove_outliers(&t, "S1", CommentTag::OutlierBlankCycles, Tail::Both, SIGMA2).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(cleaned.len(), 9);
        assert!(cleaned.cycles().iter().all(|c| c.values.len() == 2));
    }

    #[test]
    fn iqr_fences() {
        let t = flat_with(0, [100.0, 80.0]);
        let (comments, _) = remove_outliers(
            &t,
            "S1",
            CommentTag::OutlierSignalCycles,
            Tail::High,
            OutlierMethod::Iqr { k: 1.5 },
        )
        .unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].cycle, 1);
    }

    #[test]
    fn single_cycle_is_never_an_outlier() {
        let t = block(&[[1.0, 2.0]]);
        let (comments, cleaned) =
            remove_outliers(&t, "S1", CommentTag::OutlierBlankCycles, Tail::Both, SIGMA2).unwrap();
        assert!(comments.is_empty());
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn emptied_block_is_an_error() {
        let t = block(&[[1.0, 1.0], [3.0, 3.0], [1.0, 1.0], [3.0, 3.0]]);
        let err = remove_outliers(
            &t,
            "S1 (signal)",
            CommentTag::OutlierSignalCycles,
            Tail::Both,
            OutlierMethod::Sigma { k: 1e-9 },
        )
        .unwrap_err();
        assert_eq!(
            err,
            CorrectionError::NoUsableCycles {
                sample: "S1 (signal)".into(),
                tag: "outlier_signal_cycles".into(),
            }
        );
    }

    fn arb_block() -> impl Strategy<Value = CycleTable> {
        (1usize..4, 3usize..25).prop_flat_map(|(width, rows)| {
            prop::collection::vec(prop::collection::vec(0.0f64..1000.0, width), rows).prop_map(
                move |rows| {
                    let channels = (0..width).map(|i| format!("c{i}")).collect();
                    let mut t = CycleTable::new(channels);
                    for (i, r) in rows.into_iter().enumerate() {
                        t.push(i as u32 + 1, r).unwrap();
                    }
                    t
                },
            )
        })
    }

    proptest! {
        #[test]
        fn balanced_two_level_blocks_are_untouched(
            lo in 0.0f64..500.0,
            gap in 0.0f64..500.0,
            pairs in 2usize..15,
        ) {
            let rows: Vec<[f64; 2]> = (0..pairs * 2)
                .map(|i| if i % 2 == 0 { [lo, lo] } else { [lo + gap, lo + gap] })
                .collect();
            let t = block(&rows);
            for method in [SIGMA2, OutlierMethod::Iqr { k: 1.5 }] {
                let (comments, cleaned) =
                    remove_outliers(&t, "S", CommentTag::OutlierBlankCycles, Tail::Both, method)
                        .unwrap();
                prop_assert!(comments.is_empty());
                prop_assert_eq!(&cleaned, &t);
            }
        }

        #[test]
        fn bound_direction_is_respected(t in arb_block()) {
            let means = t.channel_means().unwrap();
            for (tail, tag) in [
                (Tail::High, CommentTag::OutlierBlankCycles),
                (Tail::Low, CommentTag::OutlierSignalCycles),
            ] {
                if let Ok((comments, cleaned)) = remove_outliers(&t, "S", tag, tail, SIGMA2) {
                    prop_assert_eq!(comments.len() + cleaned.len(), t.len());
                    for comment in &comments {
                        let row = t.cycles().iter().find(|c| c.index == comment.cycle).unwrap();
                        let beyond = row.values.iter().zip(&means).any(|(v, m)| match tail {
                            Tail::High => v > m,
                            _ => v < m,
                        });
                        prop_assert!(beyond);
                    }
                }
            }
        }
    }
}
