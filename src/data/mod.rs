/// Data layer: core types, loading, and outlier filtering.
///
/// Architecture:
/// ```text
///  run.csv / run.json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse rows → Vec<RawSample>
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ CycleTable  │  cycle-indexed intensities per channel
///   └────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  per-channel thresholds → cleaned block + comments
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
