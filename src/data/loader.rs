use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;

use super::model::{Comment, CycleTable, RawSample, Ratios, RunRow, SampleInfo, SampleKind};

const NAME_COL: &str = "sample_name";
const TYPE_COL: &str = "type";
const CYCLE_COL: &str = "cycle";
const COMMENT_HEADER: [&str; 3] = ["sample", "comment", "cycle"];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the raw cycles of one run.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`  – long format, one line per cycle
/// * `.json` – the same rows as an array of records
///
/// Every row carries `sample_name`, `type`, `cycle` and one value per
/// isotope channel. Samples are split where the name changes or the cycle
/// counter restarts, so repeated standard names are fine.
pub fn load_run(path: &Path) -> Result<Vec<RawSample>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Write the calibrated (or internal) run table.
pub fn write_run_table(path: &Path, rows: &[RunRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec![NAME_COL, TYPE_COL];
    header.extend(Ratios::FIELDS);
    writer.write_record(&header).context("writing header")?;

    for row in rows {
        let mut record = vec![row.sample_name.clone(), row.kind.to_string()];
        record.extend(row.ratios.to_array().iter().map(|v| v.to_string()));
        writer
            .write_record(&record)
            .with_context(|| format!("writing row for {}", row.sample_name))?;
    }
    writer.flush().context("flushing run table")?;
    Ok(())
}

/// Write the dropped-cycle audit trail. The header is written even when
/// nothing was dropped.
pub fn write_comments(path: &Path, comments: &[Comment]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(COMMENT_HEADER)
        .context("writing header")?;
    for comment in comments {
        let cycle = comment.cycle.to_string();
        writer
            .write_record([comment.sample.as_str(), comment.tag.as_str(), cycle.as_str()])
            .context("writing comment")?;
    }
    writer.flush().context("flushing comments")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Grouping rows into samples
// ---------------------------------------------------------------------------

/// Accumulates consecutive rows into [`RawSample`]s.
struct RunBuilder {
    channels: Vec<String>,
    samples: Vec<RawSample>,
}

impl RunBuilder {
    fn new(channels: Vec<String>) -> Self {
        Self {
            channels,
            samples: Vec::new(),
        }
    }

    fn push(&mut self, name: &str, kind: SampleKind, cycle: u32, values: Vec<f64>) -> Result<()> {
        let starts_new = match self.samples.last() {
            Some(current) => {
                current.info.name != name
                    || current
                        .cycles
                        .cycles()
                        .last()
                        .is_some_and(|last| cycle <= last.index)
            }
            None => true,
        };
        if starts_new {
            self.samples.push(RawSample {
                info: SampleInfo::new(name, kind),
                cycles: CycleTable::new(self.channels.clone()),
            });
        }
        let current = self
            .samples
            .last_mut()
            .context("no sample to append to")?;
        if current.info.kind != kind {
            bail!("{name}: type changes from {} to {kind} mid-sample", current.info.kind);
        }
        current.cycles.push(cycle, values)?;
        Ok(())
    }

    fn finish(self) -> Vec<RawSample> {
        self.samples
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with `sample_name,type,cycle` followed by the
/// isotope channels, e.g. `202Hg,204Pb,206Pb,207Pb,208Pb`.
fn load_csv(path: &Path) -> Result<Vec<RawSample>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("CSV missing '{name}' column"))
    };
    let name_idx = find(NAME_COL)?;
    let type_idx = find(TYPE_COL)?;
    let cycle_idx = find(CYCLE_COL)?;

    let channel_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| ![name_idx, type_idx, cycle_idx].contains(i))
        .map(|(i, h)| (i, h.clone()))
        .collect();
    if channel_cols.is_empty() {
        bail!("CSV has no isotope channel columns");
    }

    let mut run = RunBuilder::new(channel_cols.iter().map(|(_, h)| h.clone()).collect());

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let name = field(name_idx);
        if name.is_empty() {
            bail!("CSV row {row_no}: empty sample_name");
        }
        let kind: SampleKind = field(type_idx)
            .parse()
            .map_err(|e: String| anyhow::anyhow!("CSV row {row_no}: {e}"))?;
        let cycle: u32 = field(cycle_idx)
            .parse()
            .with_context(|| format!("CSV row {row_no}: bad cycle '{}'", field(cycle_idx)))?;

        let values = channel_cols
            .iter()
            .map(|(idx, col)| {
                field(*idx)
                    .parse::<f64>()
                    .with_context(|| format!("Row {row_no}, {col}: '{}' is not a number", field(*idx)))
            })
            .collect::<Result<Vec<f64>>>()?;

        run.push(name, kind, cycle, values)
            .with_context(|| format!("CSV row {row_no}"))?;
    }

    Ok(run.finish())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "sample_name": "NIST610", "type": "standard", "cycle": 1,
///     "202Hg": 310.0, "204Pb": 12.5, "206Pb": 220.1, ... },
///   ...
/// ]
/// ```
///
/// Channels are the remaining keys of the first record, in key order.
fn load_json(path: &Path) -> Result<Vec<RawSample>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let channels: Vec<String> = match records.first().and_then(|r| r.as_object()) {
        Some(obj) => obj
            .keys()
            .filter(|k| ![NAME_COL, TYPE_COL, CYCLE_COL].contains(&k.as_str()))
            .cloned()
            .collect(),
        None => return Ok(Vec::new()),
    };

    let mut run = RunBuilder::new(channels.clone());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let name = obj
            .get(NAME_COL)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .with_context(|| format!("Row {i}: missing '{NAME_COL}'"))?;
        let kind: SampleKind = obj
            .get(TYPE_COL)
            .and_then(|v| v.as_str())
            .with_context(|| format!("Row {i}: missing '{TYPE_COL}'"))?
            .parse()
            .map_err(|e: String| anyhow::anyhow!("Row {i}: {e}"))?;
        let cycle = obj
            .get(CYCLE_COL)
            .and_then(|v| v.as_u64())
            .and_then(|c| u32::try_from(c).ok())
            .with_context(|| format!("Row {i}: missing or invalid '{CYCLE_COL}'"))?;

        let values = channels
            .iter()
            .map(|ch| {
                obj.get(ch)
                    .and_then(|v| v.as_f64())
                    .with_context(|| format!("Row {i}, {ch}: not a number"))
            })
            .collect::<Result<Vec<f64>>>()?;

        run.push(name, kind, cycle, values)
            .with_context(|| format!("Row {i}"))?;
    }

    Ok(run.finish())
}
