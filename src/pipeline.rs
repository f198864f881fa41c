use rayon::prelude::*;

use crate::config::Config;
use crate::correction::ratios::reduce;
use crate::correction::{InternalCorrector, MassBiasCorrector, MassBiasOutput};
use crate::data::model::{Comment, RawSample, RunRow};
use crate::error::{CorrectionError, Result};

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// A sample that could not be internally corrected and was left out of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFailure {
    pub sample: String,
    pub error: CorrectionError,
}

/// Everything produced for one analytical run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Dropped cycles of every corrected sample, in acquisition order.
    pub comments: Vec<Comment>,
    /// Internally corrected run table (standards included).
    pub internal: Vec<RunRow>,
    pub failures: Vec<SampleFailure>,
    /// Mass-bias result; an error here leaves the fields above valid.
    pub calibration: Result<MassBiasOutput>,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Run both correction stages over one analytical run.
///
/// Samples are internally corrected in parallel; a sample that fails is
/// recorded in [`RunReport::failures`] and skipped without affecting the
/// others. Only an invalid `config` aborts the whole run.
pub fn process_run(config: &Config, samples: &[RawSample]) -> Result<RunReport> {
    config.validate()?;
    let internal = InternalCorrector::new(&config.settings);

    let results: Vec<Result<(Vec<Comment>, RunRow)>> = samples
        .par_iter()
        .map(|sample| -> Result<(Vec<Comment>, RunRow)> {
            let (comments, signal) = internal.correct(&sample.cycles, &sample.info)?;
            let row = reduce(&sample.info, &signal)?;
            Ok((comments, row))
        })
        .collect();

    let mut comments = Vec::new();
    let mut rows = Vec::with_capacity(samples.len());
    let mut failures = Vec::new();
    for (sample, result) in samples.iter().zip(results) {
        match result {
            Ok((sample_comments, row)) => {
                comments.extend(sample_comments);
                rows.push(row);
            }
            Err(error) => {
                log::warn!("skipping {}: {error}", sample.info.name);
                failures.push(SampleFailure {
                    sample: sample.info.name.clone(),
                    error,
                });
            }
        }
    }

    let calibration = MassBiasCorrector::new(&config.standard).correct(&rows);
    match &calibration {
        Ok(out) => log::info!(
            "run: {} samples in, {} calibrated, {} failed, {} cycles dropped",
            samples.len(),
            out.rows.len(),
            failures.len(),
            comments.len()
        ),
        Err(e) => log::error!("mass-bias correction failed: {e}"),
    }

    Ok(RunReport {
        comments,
        internal: rows,
        failures,
        calibration,
    })
}
