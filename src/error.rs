pub type FxResult<T> = Result<T, FxError>;

#[derive(thiserror::Error, Debug)]
pub enum FxError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("text error: {0}")]
    Text(String),

    #[error("validation error: {0}")]
    Validation(String),

    /// Catch-all presented to callers when no typed cause is recognizable.
    #[error("unknown error")]
    Unknown,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FxError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn text(msg: impl Into<String>) -> Self {
        Self::Text(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Collapses untyped failures at the call boundary. Typed variants pass
    /// through verbatim; anything else becomes [`FxError::Unknown`] so the
    /// caller never sees an unstructured internal fault.
    pub fn classify(self) -> Self {
        match self {
            Self::Other(_) => Self::Unknown,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(FxError::decode("x").to_string().contains("decode error:"));
        assert!(FxError::encode("x").to_string().contains("encode error:"));
        assert!(FxError::text("x").to_string().contains("text error:"));
        assert!(
            FxError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert_eq!(FxError::Unknown.to_string(), "unknown error");
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = FxError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn classify_collapses_untyped_and_keeps_typed() {
        let untyped = FxError::Other(anyhow::anyhow!("internal detail"));
        assert!(matches!(untyped.classify(), FxError::Unknown));

        let typed = FxError::decode("bad header").classify();
        assert!(typed.to_string().contains("bad header"));
    }
}
