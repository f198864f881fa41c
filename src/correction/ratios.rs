use crate::data::model::{channel, CycleTable, Ratios, RunRow, SampleInfo};
use crate::error::{CorrectionError, Result};
use crate::stats;

/// Mean and standard error of the finite values; NaN for both if none are.
fn summarize(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let finite: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    match (stats::mean(&finite), stats::std_error(&finite)) {
        (Some(m), Some(se)) => (m, se),
        _ => (f64::NAN, f64::NAN),
    }
}

/// Collapse a corrected signal block into one run-table row.
///
/// Ratios are formed cycle by cycle and then averaged; `_err` fields hold
/// the standard error of that mean. `Pb8_mean` is the mean 208Pb intensity.
pub fn reduce(info: &SampleInfo, signal: &CycleTable) -> Result<RunRow> {
    let idx = |name: &str| {
        signal
            .channel_index(name)
            .ok_or_else(|| CorrectionError::MissingChannel {
                sample: info.name.clone(),
                channel: name.to_string(),
            })
    };
    let (p4, p6, p7, p8) = (
        idx(channel::PB204)?,
        idx(channel::PB206)?,
        idx(channel::PB207)?,
        idx(channel::PB208)?,
    );

    let ratio = |num: usize, den: usize| {
        summarize(signal.cycles().iter().map(|c| c.values[num] / c.values[den]))
    };

    let (pb6_4, pb6_4_err) = ratio(p6, p4);
    let (pb7_4, pb7_4_err) = ratio(p7, p4);
    let (pb8_4, pb8_4_err) = ratio(p8, p4);
    let (pb7_6, pb7_6_err) = ratio(p7, p6);
    let (pb8_6, pb8_6_err) = ratio(p8, p6);
    let (pb6_7, pb6_7_err) = ratio(p6, p7);
    let (pb8_7, pb8_7_err) = ratio(p8, p7);
    let (pb8_mean, pb8_mean_err) = summarize(signal.cycles().iter().map(|c| c.values[p8]));

    Ok(RunRow {
        sample_name: info.name.clone(),
        kind: info.kind,
        ratios: Ratios {
            pb6_4,
            pb6_4_err,
            pb7_4,
            pb7_4_err,
            pb8_4,
            pb8_4_err,
            pb7_6,
            pb7_6_err,
            pb8_6,
            pb8_6_err,
            pb6_7,
            pb6_7_err,
            pb8_7,
            pb8_7_err,
            pb8_mean,
            pb8_mean_err,
        },
    })
}
