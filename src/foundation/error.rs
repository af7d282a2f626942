pub type ReelResult<T> = Result<T, ReelError>;

/// Error taxonomy for loading, scheduling, compositing and encoding a timeline.
///
/// `AssetDecode` and `AssetLoad` are normally absorbed by the asset cache (the affected layer is
/// simply not drawn); they surface only from the low-level decode helpers.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("asset decode error: {0}")]
    AssetDecode(String),

    #[error("asset load error: {0}")]
    AssetLoad(String),

    /// The platform refused to activate audio output. The controller stays stopped; calling
    /// `play` again from a user gesture may succeed.
    #[error("audio context blocked: {0}")]
    AudioContextBlocked(String),

    #[error("audio graph error: {0}")]
    AudioGraph(String),

    #[error("encoder init error: {0}")]
    EncoderInit(String),

    #[error(
        "export exceeded the wall-time limit after {elapsed_secs:.1}s \
         ({frames_done}/{frames_total} frames)"
    )]
    EncodeTimeout {
        elapsed_secs: f64,
        frames_done: u64,
        frames_total: u64,
    },

    #[error("export clock stalled at {at_secs:.3}s")]
    EncodeStall { at_secs: f64 },

    #[error("export cancelled")]
    Cancelled,

    #[error("encode error: {0}")]
    Encode(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn asset_decode(msg: impl Into<String>) -> Self {
        Self::AssetDecode(msg.into())
    }

    pub fn asset_load(msg: impl Into<String>) -> Self {
        Self::AssetLoad(msg.into())
    }

    pub fn audio_blocked(msg: impl Into<String>) -> Self {
        Self::AudioContextBlocked(msg.into())
    }

    pub fn audio_graph(msg: impl Into<String>) -> Self {
        Self::AudioGraph(msg.into())
    }

    pub fn encoder_init(msg: impl Into<String>) -> Self {
        Self::EncoderInit(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
