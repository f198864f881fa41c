//! Per-sample internal correction: blank subtraction and removal of the
//! 204Hg isobaric interference on 204Pb.
//!
//! ```text
//!  cycles 1..=blank_end        signal_start..=signal_end
//!        │                              │
//!   remove_outliers(High)         remove_outliers(Low)
//!        │                              │
//!        └──── channel means ──► signal − blank mean
//!                                       │
//!                      204Pb −= 202Hg · Hg_4_2
//! ```

use crate::config::Settings;
use crate::data::filter::{remove_outliers, Tail};
use crate::data::model::{channel, Comment, CommentTag, CycleTable, SampleInfo};
use crate::error::{CorrectionError, Result};

/// Applies blank and interference corrections with fixed settings.
#[derive(Debug, Clone, Copy)]
pub struct InternalCorrector<'a> {
    settings: &'a Settings,
}

impl<'a> InternalCorrector<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Correct one sample's raw cycles.
    ///
    /// Returns the blank-stage comments followed by the signal-stage
    /// comments, and the corrected signal window with the same channels as
    /// `data` (204Pb overwritten). Blank-subtracted values may be negative.
    pub fn correct(
        &self,
        data: &CycleTable,
        info: &SampleInfo,
    ) -> Result<(Vec<Comment>, CycleTable)> {
        let hg = require_channel(data, info, channel::HG202)?;
        let pb = require_channel(data, info, channel::PB204)?;

        let (blank_start, blank_end) = self.settings.blank_window();
        let (signal_start, signal_end) = self.settings.signal_window();

        let blank_raw = data.window(blank_start, blank_end);
        if blank_raw.is_empty() {
            return Err(CorrectionError::EmptyWindow {
                sample: info.name.clone(),
                window: "blank",
                start: blank_start,
                end: blank_end,
            });
        }
        let signal_raw = data.window(signal_start, signal_end);
        if signal_raw.is_empty() {
            return Err(CorrectionError::EmptyWindow {
                sample: info.name.clone(),
                window: "signal",
                start: signal_start,
                end: signal_end,
            });
        }

        // spikes matter in the blank, burn-through dips in the signal
        let (mut comments, blank) = remove_outliers(
            &blank_raw,
            &format!("{} (blank)", info.name),
            CommentTag::OutlierBlankCycles,
            Tail::High,
            self.settings.outlier,
        )?;
        let (signal_comments, mut signal) = remove_outliers(
            &signal_raw,
            &format!("{} (signal)", info.name),
            CommentTag::OutlierSignalCycles,
            Tail::Low,
            self.settings.outlier,
        )?;
        comments.extend(signal_comments);

        let blank_mean = blank
            .channel_means()
            .ok_or_else(|| CorrectionError::NoUsableCycles {
                sample: format!("{} (blank)", info.name),
                tag: CommentTag::OutlierBlankCycles.to_string(),
            })?;
        subtract_blank(&mut signal, &blank_mean);
        correct_hg_interference(&mut signal, hg, pb, self.settings.hg_4_2);

        log::debug!(
            "{}: {} blank / {} signal cycles kept, {} dropped",
            info.name,
            blank.len(),
            signal.len(),
            comments.len()
        );

        Ok((comments, signal))
    }
}

fn require_channel(data: &CycleTable, info: &SampleInfo, name: &str) -> Result<usize> {
    data.channel_index(name)
        .ok_or_else(|| CorrectionError::MissingChannel {
            sample: info.name.clone(),
            channel: name.to_string(),
        })
}

/// Subtract `blank_mean[ch]` from every cycle's channel `ch`.
pub fn subtract_blank(signal: &mut CycleTable, blank_mean: &[f64]) {
    for cycle in signal.cycles_mut() {
        for (v, b) in cycle.values.iter_mut().zip(blank_mean) {
            *v -= b;
        }
    }
}

/// `204Pb ← 204Pb − 202Hg · hg_4_2`, in place.
///
/// Not idempotent: every call subtracts the mercury contribution again, so
/// this must run exactly once per sample.
pub fn correct_hg_interference(signal: &mut CycleTable, hg202: usize, pb204: usize, hg_4_2: f64) {
    for cycle in signal.cycles_mut() {
        cycle.values[pb204] -= cycle.values[hg202] * hg_4_2;
    }
}
