use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{CorrectionError, Result};

// ---------------------------------------------------------------------------
// Outlier threshold
// ---------------------------------------------------------------------------

/// How the per-channel rejection threshold is computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum OutlierMethod {
    /// Reject beyond `mean ± k·sd` (sample standard deviation).
    Sigma { k: f64 },
    /// Reject beyond the Tukey fences `Q1 − k·IQR` / `Q3 + k·IQR`.
    Iqr { k: f64 },
}

impl Default for OutlierMethod {
    fn default() -> Self {
        OutlierMethod::Sigma { k: 2.0 }
    }
}

impl OutlierMethod {
    fn multiplier(&self) -> f64 {
        match self {
            OutlierMethod::Sigma { k } | OutlierMethod::Iqr { k } => *k,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings – cycle windows and interference coefficient
// ---------------------------------------------------------------------------

/// Processing settings for the internal correction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Last cycle of the blank window; the window always starts at cycle 1.
    pub blank_cycles: u32,
    /// Inclusive `(start, end)` of the signal window.
    pub signal_cycles: (u32, u32),
    /// 204Hg / 202Hg used to strip the mercury contribution from mass 204.
    #[serde(rename = "Hg_4_2")]
    pub hg_4_2: f64,
    /// Optional; sigma clipping at `k = 2` when absent.
    #[serde(default)]
    pub outlier: OutlierMethod,
}

impl Settings {
    /// Inclusive blank window.
    pub fn blank_window(&self) -> (u32, u32) {
        (1, self.blank_cycles)
    }

    pub fn signal_window(&self) -> (u32, u32) {
        self.signal_cycles
    }
}

// ---------------------------------------------------------------------------
// ReferenceStandard – accepted ratios of the bracketing material
// ---------------------------------------------------------------------------

/// Accepted isotope ratios of the reference standard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStandard {
    #[serde(rename = "Pb_6_4")]
    pub pb_6_4: f64,
    #[serde(rename = "Pb_7_4")]
    pub pb_7_4: f64,
    #[serde(rename = "Pb_8_4")]
    pub pb_8_4: f64,
    #[serde(rename = "Pb_7_6")]
    pub pb_7_6: f64,
    #[serde(rename = "Pb_8_6")]
    pub pb_8_6: f64,
}

impl ReferenceStandard {
    /// NIST SRM 610 (Baker et al. 2004).
    pub const NIST610: ReferenceStandard = ReferenceStandard {
        pb_6_4: 17.052,
        pb_7_4: 15.515,
        pb_8_4: 36.991,
        pb_7_6: 0.90986,
        pb_8_6: 2.1694,
    };

    /// Accepted 206/207, derived from the 204-normalised constants.
    pub fn pb_6_7(&self) -> f64 {
        self.pb_6_4 / self.pb_7_4
    }

    /// Accepted 208/207, derived from the 204-normalised constants.
    pub fn pb_8_7(&self) -> f64 {
        self.pb_8_4 / self.pb_7_4
    }
}

// ---------------------------------------------------------------------------
// Config – everything a run needs, loaded once
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub settings: Settings,
    pub standard: ReferenceStandard,
}

/// Keys a configuration file must spell out; only `settings.outlier` may be omitted.
const REQUIRED_KEYS: [(&str, &[&str]); 2] = [
    ("settings", &["blank_cycles", "signal_cycles", "Hg_4_2"]),
    ("standard", &["Pb_6_4", "Pb_7_4", "Pb_8_4", "Pb_7_6", "Pb_8_6"]),
];

impl Config {
    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Ok(Self::from_json(&text)?)
    }

    /// Parse and validate a configuration document.
    ///
    /// Cycle windows, `Hg_4_2` and the accepted values have no fallback: a
    /// missing key is a [`CorrectionError::Configuration`] naming it.
    pub fn from_json(text: &str) -> Result<Config> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| CorrectionError::config(format!("config is not valid JSON: {e}")))?;

        for (section, keys) in REQUIRED_KEYS {
            let Some(block) = value.get(section) else {
                return Err(CorrectionError::config(format!("missing key `{section}`")));
            };
            if let Some(key) = keys.iter().find(|key| block.get(**key).is_none()) {
                return Err(CorrectionError::config(format!(
                    "missing key `{section}.{key}`"
                )));
            }
        }

        let config: Config = serde_json::from_value(value)
            .map_err(|e| CorrectionError::config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make either correction meaningless.
    pub fn validate(&self) -> Result<()> {
        let s = &self.settings;
        if s.blank_cycles < 1 {
            return Err(CorrectionError::config("blank_cycles must be at least 1"));
        }
        let (start, end) = s.signal_cycles;
        if start < 1 || start > end {
            return Err(CorrectionError::config(format!(
                "signal_cycles ({start}, {end}) is not an ascending 1-based range"
            )));
        }
        if !s.hg_4_2.is_finite() || s.hg_4_2 <= 0.0 {
            return Err(CorrectionError::config(format!(
                "Hg_4_2 must be a positive number, got {}",
                s.hg_4_2
            )));
        }
        let k = s.outlier.multiplier();
        if !k.is_finite() || k <= 0.0 {
            return Err(CorrectionError::config(format!(
                "outlier multiplier must be positive, got {k}"
            )));
        }

        let std = &self.standard;
        for (name, value) in [
            ("Pb_6_4", std.pb_6_4),
            ("Pb_7_4", std.pb_7_4),
            ("Pb_8_4", std.pb_8_4),
            ("Pb_7_6", std.pb_7_6),
            ("Pb_8_6", std.pb_8_6),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(CorrectionError::config(format!(
                    "accepted value {name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn nist610_config() -> Config {
        Config {
            settings: Settings {
                blank_cycles: 20,
                signal_cycles: (25, 60),
                hg_4_2: 0.2301,
                outlier: OutlierMethod::default(),
            },
            standard: ReferenceStandard::NIST610,
        }
    }

    const FULL: &str = r#"{
        "settings": {
            "blank_cycles": 15,
            "signal_cycles": [20, 50],
            "Hg_4_2": 0.23,
            "outlier": { "method": "iqr", "k": 1.5 }
        },
        "standard": {
            "Pb_6_4": 17.052, "Pb_7_4": 15.515, "Pb_8_4": 36.991,
            "Pb_7_6": 0.90986, "Pb_8_6": 2.1694
        }
    }"#;

    fn missing_key(err: CorrectionError) -> String {
        match err {
            CorrectionError::Configuration { reason } => reason,
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn nist610_is_a_valid_standard() {
        assert!(nist610_config().validate().is_ok());
    }

    #[test]
    fn derived_ratios_come_from_204_constants() {
        let std = ReferenceStandard::NIST610;
        assert_eq!(std.pb_6_7(), std.pb_6_4 / std.pb_7_4);
        assert_eq!(std.pb_8_7(), std.pb_8_4 / std.pb_7_4);
    }

    #[test]
    fn rejects_inverted_signal_window() {
        let mut config = nist610_config();
        config.settings.signal_cycles = (40, 30);
        assert!(matches!(
            config.validate(),
            Err(CorrectionError::Configuration { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_constants() {
        let mut config = nist610_config();
        config.settings.hg_4_2 = 0.0;
        assert!(config.validate().is_err());

        let mut config = nist610_config();
        config.standard.pb_8_6 = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_a_complete_document() {
        let config = Config::from_json(FULL).unwrap();
        assert_eq!(config.settings.blank_window(), (1, 15));
        assert_eq!(config.settings.signal_window(), (20, 50));
        assert_eq!(config.settings.outlier, OutlierMethod::Iqr { k: 1.5 });
        assert_eq!(config.standard, ReferenceStandard::NIST610);
    }

    #[test]
    fn outlier_method_is_optional() {
        let text = FULL.replace(r#""outlier": { "method": "iqr", "k": 1.5 }"#, r#""unused": 0"#);
        let config = Config::from_json(&text).unwrap();
        assert_eq!(config.settings.outlier, OutlierMethod::Sigma { k: 2.0 });
    }

    #[test]
    fn partial_settings_are_rejected_not_defaulted() {
        let err = Config::from_json(r#"{ "settings": { "blank_cycles": 15 } }"#).unwrap_err();
        assert_eq!(missing_key(err), "missing key `settings.signal_cycles`");
    }

    #[test]
    fn missing_standard_is_rejected() {
        let settings_only = r#"{
            "settings": { "blank_cycles": 15, "signal_cycles": [20, 50], "Hg_4_2": 0.23 }
        }"#;
        let err = Config::from_json(settings_only).unwrap_err();
        assert_eq!(missing_key(err), "missing key `standard`");

        let text = FULL.replace(r#""Pb_8_6": 2.1694"#, r#""Pb_8_6x": 2.1694"#);
        let err = Config::from_json(&text).unwrap_err();
        assert_eq!(missing_key(err), "missing key `standard.Pb_8_6`");
    }

    #[test]
    fn load_reports_missing_keys_as_configuration_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "settings": {{ "blank_cycles": 15 }} }}"#).unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CorrectionError>(),
            Some(CorrectionError::Configuration { .. })
        ));
    }

    #[test]
    fn load_surfaces_validation_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", FULL.replace(r#""blank_cycles": 15"#, r#""blank_cycles": 0"#)).unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("blank_cycles must be at least 1"));
    }
}
