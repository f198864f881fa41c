/// Errors raised by the correction stages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CorrectionError {
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("sample {sample}: {window} window (cycles {start}..={end}) selects no rows")]
    EmptyWindow {
        sample: String,
        window: &'static str,
        start: u32,
        end: u32,
    },

    #[error("{sample}: no usable cycles left after {tag} filtering")]
    NoUsableCycles { sample: String, tag: String },

    #[error("sample {sample}: missing isotope channel {channel}")]
    MissingChannel { sample: String, channel: String },

    #[error("malformed cycle table: {reason}")]
    MalformedTable { reason: String },

    #[error("run contains no reference standard rows")]
    NoReferenceStandard,
}

impl CorrectionError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        CorrectionError::Configuration {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CorrectionError>;
