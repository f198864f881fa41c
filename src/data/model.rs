use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CorrectionError, Result};

/// Isotope channel names as they appear in instrument exports.
pub mod channel {
    pub const HG202: &str = "202Hg";
    pub const PB204: &str = "204Pb";
    pub const PB206: &str = "206Pb";
    pub const PB207: &str = "207Pb";
    pub const PB208: &str = "208Pb";
}

// ---------------------------------------------------------------------------
// SampleKind / SampleInfo – per-sample metadata
// ---------------------------------------------------------------------------

/// Role of a measurement within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Standard,
    Sample,
    Control,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleKind::Standard => "standard",
            SampleKind::Sample => "sample",
            SampleKind::Control => "control",
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(SampleKind::Standard),
            "sample" => Ok(SampleKind::Sample),
            "control" => Ok(SampleKind::Control),
            other => Err(format!("unknown sample type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleInfo {
    pub name: String,
    pub kind: SampleKind,
}

impl SampleInfo {
    pub fn new(name: impl Into<String>, kind: SampleKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// CycleTable – cycle-indexed intensities for one sample
// ---------------------------------------------------------------------------

/// One measurement cycle: its 1-based index and one intensity per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub index: u32,
    pub values: Vec<f64>,
}

/// Ordered cycles sharing one channel layout.
///
/// Cycle indices are strictly ascending and every row carries exactly one
/// value per channel, so filtering whole rows keeps channels aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleTable {
    channels: Vec<String>,
    cycles: Vec<Cycle>,
}

impl CycleTable {
    pub fn new(channels: Vec<String>) -> Self {
        Self {
            channels,
            cycles: Vec::new(),
        }
    }

    /// Append a cycle, enforcing row width and ascending indices.
    pub fn push(&mut self, index: u32, values: Vec<f64>) -> Result<()> {
        if values.len() != self.channels.len() {
            return Err(CorrectionError::MalformedTable {
                reason: format!(
                    "cycle {index} has {} values for {} channels",
                    values.len(),
                    self.channels.len()
                ),
            });
        }
        if let Some(last) = self.cycles.last() {
            if index <= last.index {
                return Err(CorrectionError::MalformedTable {
                    reason: format!("cycle {index} follows cycle {}", last.index),
                });
            }
        }
        self.cycles.push(Cycle { index, values });
        Ok(())
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == name)
    }

    /// All values of one channel, in cycle order.
    pub fn column(&self, channel: usize) -> Vec<f64> {
        self.cycles.iter().map(|c| c.values[channel]).collect()
    }

    /// Cycles whose index falls in `start..=end`.
    pub fn window(&self, start: u32, end: u32) -> CycleTable {
        CycleTable {
            channels: self.channels.clone(),
            cycles: self
                .cycles
                .iter()
                .filter(|c| (start..=end).contains(&c.index))
                .cloned()
                .collect(),
        }
    }

    /// Keep only the cycles for which `keep` returns true.
    pub fn retain<F: FnMut(&Cycle) -> bool>(&mut self, keep: F) {
        self.cycles.retain(keep);
    }

    /// Per-channel mean; `None` when the table has no cycles.
    pub fn channel_means(&self) -> Option<Vec<f64>> {
        if self.cycles.is_empty() {
            return None;
        }
        let n = self.cycles.len() as f64;
        let mut sums = vec![0.0; self.channels.len()];
        for cycle in &self.cycles {
            for (sum, v) in sums.iter_mut().zip(&cycle.values) {
                *sum += v;
            }
        }
        Some(sums.into_iter().map(|s| s / n).collect())
    }

    pub(crate) fn cycles_mut(&mut self) -> &mut [Cycle] {
        &mut self.cycles
    }
}

/// Raw cycles of one sample together with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub info: SampleInfo,
    pub cycles: CycleTable,
}

// ---------------------------------------------------------------------------
// Comment – audit record of a dropped cycle
// ---------------------------------------------------------------------------

/// Stage that dropped a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentTag {
    OutlierBlankCycles,
    OutlierSignalCycles,
}

impl CommentTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentTag::OutlierBlankCycles => "outlier_blank_cycles",
            CommentTag::OutlierSignalCycles => "outlier_signal_cycles",
        }
    }
}

impl fmt::Display for CommentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cycle removed from a sample, e.g. `("NIST610_1 (blank)", outlier_blank_cycles, 7)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub sample: String,
    #[serde(rename = "comment")]
    pub tag: CommentTag,
    pub cycle: u32,
}

// ---------------------------------------------------------------------------
// Ratios / RunRow – one line of the run table
// ---------------------------------------------------------------------------

/// Mean isotope ratios of one sample with their uncertainties.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Ratios {
    pub pb6_4: f64,
    pub pb6_4_err: f64,
    pub pb7_4: f64,
    pub pb7_4_err: f64,
    pub pb8_4: f64,
    pub pb8_4_err: f64,
    pub pb7_6: f64,
    pub pb7_6_err: f64,
    pub pb8_6: f64,
    pub pb8_6_err: f64,
    pub pb6_7: f64,
    pub pb6_7_err: f64,
    pub pb8_7: f64,
    pub pb8_7_err: f64,
    pub pb8_mean: f64,
    pub pb8_mean_err: f64,
}

impl Ratios {
    /// Column names, in output order.
    pub const FIELDS: [&'static str; 16] = [
        "Pb6_4",
        "Pb6_4_err",
        "Pb7_4",
        "Pb7_4_err",
        "Pb8_4",
        "Pb8_4_err",
        "Pb7_6",
        "Pb7_6_err",
        "Pb8_6",
        "Pb8_6_err",
        "Pb6_7",
        "Pb6_7_err",
        "Pb8_7",
        "Pb8_7_err",
        "Pb8_mean",
        "Pb8_mean_err",
    ];

    pub fn to_array(&self) -> [f64; 16] {
        [
            self.pb6_4,
            self.pb6_4_err,
            self.pb7_4,
            self.pb7_4_err,
            self.pb8_4,
            self.pb8_4_err,
            self.pb7_6,
            self.pb7_6_err,
            self.pb8_6,
            self.pb8_6_err,
            self.pb6_7,
            self.pb6_7_err,
            self.pb8_7,
            self.pb8_7_err,
            self.pb8_mean,
            self.pb8_mean_err,
        ]
    }

    pub fn from_array(v: [f64; 16]) -> Self {
        Self {
            pb6_4: v[0],
            pb6_4_err: v[1],
            pb7_4: v[2],
            pb7_4_err: v[3],
            pb8_4: v[4],
            pb8_4_err: v[5],
            pb7_6: v[6],
            pb7_6_err: v[7],
            pb8_6: v[8],
            pb8_6_err: v[9],
            pb6_7: v[10],
            pb6_7_err: v[11],
            pb8_7: v[12],
            pb8_7_err: v[13],
            pb8_mean: v[14],
            pb8_mean_err: v[15],
        }
    }

    /// Element-wise mean of two rows over every numeric field, skipping
    /// non-finite operands; NaN only where both are non-finite.
    pub fn midpoint(a: &Ratios, b: &Ratios) -> Ratios {
        let (a, b) = (a.to_array(), b.to_array());
        let mut out = [0.0; 16];
        for (o, (&x, &y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
            *o = match (x.is_finite(), y.is_finite()) {
                (true, true) => (x + y) / 2.0,
                (true, false) => x,
                (false, true) => y,
                (false, false) => f64::NAN,
            };
        }
        Ratios::from_array(out)
    }
}

/// One sample's reduced result inside a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub sample_name: String,
    pub kind: SampleKind,
    pub ratios: Ratios,
}
