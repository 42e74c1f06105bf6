/// Convenience result type used across mr-radar.
pub type RadarResult<T> = Result<T, RadarError>;

/// Top-level error taxonomy.
///
/// Every variant propagates to the caller; nothing in the library swallows errors.
#[derive(thiserror::Error, Debug)]
pub enum RadarError {
    /// Malformed input, rejected before any I/O.
    #[error("validation error: {0}")]
    Validation(String),

    /// The derived-state store was used before being bound to a file.
    #[error("store not loaded: {0}")]
    NotLoaded(String),

    /// Geometry was requested before any radius was recorded.
    #[error("radius not set")]
    RadiusNotSet,

    /// The external lookup returned no usable data.
    #[error("upstream data error: {0}")]
    Upstream(String),

    /// Writing the backing store file failed.
    #[error("durability error: {0}")]
    Durability(String),

    /// A filesystem operation on output artifacts failed.
    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// A cached value could not be decoded into the expected shape.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Escape hatch for collaborator errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RadarError {
    /// Build a [`RadarError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`RadarError::NotLoaded`].
    pub fn not_loaded(msg: impl Into<String>) -> Self {
        Self::NotLoaded(msg.into())
    }

    /// Build a [`RadarError::Upstream`].
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Build a [`RadarError::Durability`].
    pub fn durability(msg: impl Into<String>) -> Self {
        Self::Durability(msg.into())
    }

    /// Build a [`RadarError::Filesystem`].
    pub fn filesystem(msg: impl Into<String>) -> Self {
        Self::Filesystem(msg.into())
    }

    /// Build a [`RadarError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for failures caused by caller input or missing upstream data rather than a bug.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Upstream(_) | Self::RadiusNotSet
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
