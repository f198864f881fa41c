//! Mass-bias correction by sample-standard bracketing.
//!
//! A single forward pass over the run table decides, for every sample or
//! control, which standard(s) it is normalised against:
//!
//! ```text
//!   S1  A  B  S2  C  S3  D
//!       └──┴── mean(S1, S2)
//!                 └─ mean(S2, S3)
//!                        └─ trailing: dropped, reported
//! ```
//!
//! `corrected = raw / reference * accepted`, applied to central values only.

use std::fmt;

use crate::config::ReferenceStandard;
use crate::data::model::{Ratios, RunRow, SampleKind};
use crate::error::{CorrectionError, Result};

// ---------------------------------------------------------------------------
// Bracketing plan
// ---------------------------------------------------------------------------

/// Standard row(s) a measurement is normalised against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// One standard used on its own.
    Single(usize),
    /// Element-wise mean of the preceding and following standard.
    Pair(usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekingFirstStandard,
    Bracketing { prev: usize },
    Terminal,
}

/// Bracketing decisions for a run, independent of the measured values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketPlan {
    /// `(row, reference)` for every row that will be corrected, in run order.
    pub corrections: Vec<(usize, Reference)>,
    /// First row after the final standard, when such rows are discarded.
    pub trailing_from: Option<usize>,
}

/// Walk the run once and assign a [`Reference`] to every non-standard row.
///
/// - Rows before the first standard use the first standard alone.
/// - Rows between two standards use the mean of both.
/// - With a single standard in the run, every row is normalised to it.
/// - Otherwise rows after the final standard end the pass; they are
///   reported through [`BracketPlan::trailing_from`].
pub fn plan(kinds: &[SampleKind]) -> Result<BracketPlan> {
    let standards: Vec<usize> = kinds
        .iter()
        .enumerate()
        .filter(|(_, k)| **k == SampleKind::Standard)
        .map(|(i, _)| i)
        .collect();
    let (first, last) = match (standards.first(), standards.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return Err(CorrectionError::NoReferenceStandard),
    };
    let next_standard = |i: usize| {
        let pos = standards.partition_point(|&s| s <= i);
        standards.get(pos).copied()
    };

    let mut state = State::SeekingFirstStandard;
    let mut corrections = Vec::new();
    let mut trailing_from = None;

    for (i, kind) in kinds.iter().enumerate() {
        if *kind == SampleKind::Standard {
            state = State::Bracketing { prev: i };
            continue;
        }
        if i > last && standards.len() > 1 {
            state = State::Terminal;
        }

        let reference = match state {
            State::SeekingFirstStandard => Reference::Single(first),
            State::Bracketing { prev } => match next_standard(i) {
                Some(next) => Reference::Pair(prev, next),
                None => Reference::Single(prev),
            },
            State::Terminal => {
                trailing_from = Some(i);
                break;
            }
        };
        corrections.push((i, reference));
    }

    Ok(BracketPlan {
        corrections,
        trailing_from,
    })
}

// ---------------------------------------------------------------------------
// Trailing data warning
// ---------------------------------------------------------------------------

/// Rows discarded because no standard follows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailingDataWarning {
    /// Name of the last standard in the run.
    pub last_standard: String,
    /// Names of the dropped samples/controls, in run order.
    pub dropped: Vec<String>,
}

impl fmt::Display for TrailingDataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ignoring {} sample(s) or control(s) after the last standard {}: {}",
            self.dropped.len(),
            self.last_standard,
            self.dropped.join(", ")
        )
    }
}

// ---------------------------------------------------------------------------
// Corrector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MassBiasOutput {
    /// Corrected samples and controls; standards are not emitted.
    pub rows: Vec<RunRow>,
    pub trailing: Option<TrailingDataWarning>,
}

/// Normalises samples to the accepted values of a reference standard.
#[derive(Debug, Clone, Copy)]
pub struct MassBiasCorrector<'a> {
    standard: &'a ReferenceStandard,
}

impl<'a> MassBiasCorrector<'a> {
    pub fn new(standard: &'a ReferenceStandard) -> Self {
        Self { standard }
    }

    /// Correct a whole run. `run` must be in acquisition order.
    pub fn correct(&self, run: &[RunRow]) -> Result<MassBiasOutput> {
        let kinds: Vec<SampleKind> = run.iter().map(|r| r.kind).collect();
        let plan = plan(&kinds)?;

        let rows = plan
            .corrections
            .iter()
            .map(|&(i, reference)| {
                let s = match reference {
                    Reference::Single(j) => run[j].ratios,
                    Reference::Pair(a, b) => Ratios::midpoint(&run[a].ratios, &run[b].ratios),
                };
                RunRow {
                    sample_name: run[i].sample_name.clone(),
                    kind: run[i].kind,
                    ratios: self.normalise(&run[i].ratios, &s),
                }
            })
            .collect();

        let trailing = plan.trailing_from.map(|from| {
            let last_standard = run[..from]
                .iter()
                .rev()
                .find(|r| r.kind == SampleKind::Standard)
                .map(|r| r.sample_name.clone())
                .unwrap_or_default();
            TrailingDataWarning {
                last_standard,
                dropped: run[from..].iter().map(|r| r.sample_name.clone()).collect(),
            }
        });
        if let Some(warning) = &trailing {
            log::warn!("{warning}");
        }

        Ok(MassBiasOutput { rows, trailing })
    }

    /// `raw / reference * accepted` for every central value. Errors and
    /// `Pb8_mean` pass through.
    fn normalise(&self, raw: &Ratios, s: &Ratios) -> Ratios {
        let v = self.standard;
        Ratios {
            pb6_4: raw.pb6_4 / s.pb6_4 * v.pb_6_4,
            pb7_4: raw.pb7_4 / s.pb7_4 * v.pb_7_4,
            pb8_4: raw.pb8_4 / s.pb8_4 * v.pb_8_4,
            pb7_6: raw.pb7_6 / s.pb7_6 * v.pb_7_6,
            pb8_6: raw.pb8_6 / s.pb8_6 * v.pb_8_6,
            pb6_7: raw.pb6_7 / s.pb6_7 * v.pb_6_7(),
            pb8_7: raw.pb8_7 / s.pb8_7 * v.pb_8_7(),
            ..*raw
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::SampleKind::{Control, Sample, Standard};

    const ACCEPTED: ReferenceStandard = ReferenceStandard {
        pb_6_4: 20.0,
        pb_7_4: 16.0,
        pb_8_4: 40.0,
        pb_7_6: 0.8,
        pb_8_6: 2.0,
    };

    fn row(name: &str, kind: SampleKind, base: f64) -> RunRow {
        let mut values = [base; 16];
        for (i, v) in values.iter_mut().enumerate() {
            if i % 2 == 1 {
                *v = 0.01 * (i as f64);
            }
        }
        RunRow {
            sample_name: name.to_string(),
            kind,
            ratios: Ratios::from_array(values),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-12 * b.abs().max(1.0)
    }

    #[test]
    fn sample_between_standards_uses_their_mean() {
        let run = vec![row("S1", Standard, 2.0), row("A", Sample, 3.0), row("S2", Standard, 4.0)];
        let out = MassBiasCorrector::new(&ACCEPTED).correct(&run).unwrap();
        assert!(out.trailing.is_none());
        assert_eq!(out.rows.len(), 1);
        let a = &out.rows[0];
        assert_eq!(a.sample_name, "A");
        assert!(close(a.ratios.pb6_4, 3.0 / ((2.0 + 4.0) / 2.0) * ACCEPTED.pb_6_4));
        assert!(close(a.ratios.pb8_6, 3.0 / 3.0 * ACCEPTED.pb_8_6));
    }

    #[test]
    fn derived_ratios_use_ratio_of_constants() {
        let run = vec![row("S1", Standard, 2.0), row("A", Sample, 5.0), row("S2", Standard, 6.0)];
        let out = MassBiasCorrector::new(&ACCEPTED).correct(&run).unwrap();
        let a = &out.rows[0].ratios;
        assert!(close(a.pb6_7, 5.0 / 4.0 * (ACCEPTED.pb_6_4 / ACCEPTED.pb_7_4)));
        assert!(close(a.pb8_7, 5.0 / 4.0 * (ACCEPTED.pb_8_4 / ACCEPTED.pb_7_4)));
        // direct constants differ from the derived ones here
        assert!(!close(a.pb6_7, 5.0 / 4.0 * ACCEPTED.pb_7_6));
    }

    #[test]
    fn errors_and_pb8_mean_pass_through() {
        let run = vec![row("S1", Standard, 2.0), row("A", Control, 3.0), row("S2", Standard, 4.0)];
        let raw = run[1].ratios;
        let out = MassBiasCorrector::new(&ACCEPTED).correct(&run).unwrap();
        let a = &out.rows[0].ratios;
        assert_eq!(a.pb8_mean, raw.pb8_mean);
        assert_eq!(a.pb8_mean_err, raw.pb8_mean_err);
        for (i, (corrected, original)) in a.to_array().iter().zip(raw.to_array()).enumerate() {
            if i % 2 == 1 {
                assert_eq!(*corrected, original, "field {}", Ratios::FIELDS[i]);
            }
        }
        assert_eq!(out.rows[0].kind, Control);
    }

    #[test]
    fn last_row_after_sole_standard_uses_it_alone() {
        let run = vec![row("S1", Standard, 2.0), row("A", Sample, 3.0)];
        let out = MassBiasCorrector::new(&ACCEPTED).correct(&run).unwrap();
        assert!(out.trailing.is_none());
        assert_eq!(out.rows.len(), 1);
        assert!(close(out.rows[0].ratios.pb6_4, 3.0 / 2.0 * ACCEPTED.pb_6_4));
    }

    #[test]
    fn rows_after_final_standard_are_dropped_with_warning() {
        let run = vec![
            row("S1", Standard, 2.0),
            row("A", Sample, 3.0),
            row("S2", Standard, 4.0),
            row("B", Sample, 5.0),
            row("C", Control, 5.0),
        ];
        let out = MassBiasCorrector::new(&ACCEPTED).correct(&run).unwrap();
        assert_eq!(
            out.rows.iter().map(|r| r.sample_name.as_str()).collect::<Vec<_>>(),
            vec!["A"]
        );
        assert_eq!(
            out.trailing,
            Some(TrailingDataWarning {
                last_standard: "S2".into(),
                dropped: vec!["B".into(), "C".into()],
            })
        );
    }

    #[test]
    fn no_standards_is_an_error() {
        let run = vec![row("A", Sample, 3.0), row("B", Control, 3.0)];
        let err = MassBiasCorrector::new(&ACCEPTED).correct(&run).unwrap_err();
        assert_eq!(err, CorrectionError::NoReferenceStandard);
        assert_eq!(plan(&[]), Err(CorrectionError::NoReferenceStandard));
    }

    #[test]
    fn plan_walks_the_run_in_order() {
        let kinds = [Sample, Standard, Sample, Control, Standard, Standard, Sample, Standard, Sample];
        let p = plan(&kinds).unwrap();
        assert_eq!(
            p.corrections,
            vec![
                (0, Reference::Single(1)),
                (2, Reference::Pair(1, 4)),
                (3, Reference::Pair(1, 4)),
                (6, Reference::Pair(5, 7)),
            ]
        );
        assert_eq!(p.trailing_from, Some(8));
    }

    #[test]
    fn standards_only_run_emits_nothing() {
        let run = vec![row("S1", Standard, 2.0), row("S2", Standard, 4.0)];
        let out = MassBiasCorrector::new(&ACCEPTED).correct(&run).unwrap();
        assert!(out.rows.is_empty());
        assert!(out.trailing.is_none());
    }

    #[test]
    fn missing_ratio_in_one_standard_falls_back_to_the_other() {
        let mut s1 = row("S1", Standard, 2.0);
        s1.ratios.pb6_4 = f64::NAN;
        let run = vec![s1, row("A", Sample, 3.0), row("S2", Standard, 4.0)];
        let out = MassBiasCorrector::new(&ACCEPTED).correct(&run).unwrap();
        let a = &out.rows[0].ratios;
        assert!(close(a.pb6_4, 3.0 / 4.0 * ACCEPTED.pb_6_4));
        assert!(close(a.pb8_6, 3.0 / 3.0 * ACCEPTED.pb_8_6));
    }

    #[test]
    fn every_row_after_a_sole_standard_uses_it_alone() {
        let p = plan(&[Standard, Sample, Control]).unwrap();
        assert_eq!(
            p.corrections,
            vec![(1, Reference::Single(0)), (2, Reference::Single(0))]
        );
        assert_eq!(p.trailing_from, None);
    }
}
