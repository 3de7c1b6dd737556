//! Pipeline error taxonomy.
//!
//! Every fallible operation in the crate reports a [`PipelineError`].
//! The variants map to the failure domains a caller can react to
//! differently: bad input, an upstream model capability, or the vector
//! store. Transport-backed variants carry a `timed_out` flag so an
//! expired deadline stays distinguishable from a hard failure without
//! multiplying variants.
//!
//! [`PipelineError::code`] yields the stable machine-readable string
//! used in HTTP error bodies and ingestion reports.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The caller's input was rejected before any external call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The embedding capability failed or could not be reached.
    #[error("embedding service error: {message}")]
    EmbeddingService { message: String, timed_out: bool },

    /// The generation capability failed or could not be reached.
    #[error("generation error: {message}")]
    Generation { message: String, timed_out: bool },

    /// The vector store could not be reached or queried.
    #[error("store connection error: {message}")]
    StoreConnection { message: String, timed_out: bool },

    /// The store rejected a specific document write.
    #[error("store write error for {doc_id:?}: {message}")]
    StoreWrite { doc_id: String, message: String },
}

impl PipelineError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingService {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn embedding_timeout(message: impl Into<String>) -> Self {
        Self::EmbeddingService {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn generation_timeout(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn store_connection(message: impl Into<String>) -> Self {
        Self::StoreConnection {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn store_connection_timeout(message: impl Into<String>) -> Self {
        Self::StoreConnection {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn store_write(doc_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreWrite {
            doc_id: doc_id.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code, used in HTTP error bodies and
    /// ingestion failure reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::EmbeddingService { .. } => "embedding_service",
            Self::Generation { .. } => "generation",
            Self::StoreConnection { .. } => "store_connection",
            Self::StoreWrite { .. } => "store_write",
        }
    }

    /// Whether the failure was an expired deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingService { timed_out: true, .. }
                | Self::Generation { timed_out: true, .. }
                | Self::StoreConnection { timed_out: true, .. }
        )
    }

    /// Whether retrying the same operation unmodified could succeed.
    /// Input and write rejections are deterministic; transport-backed
    /// failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingService { .. } | Self::Generation { .. } | Self::StoreConnection { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(PipelineError::invalid_input("x").code(), "invalid_input");
        assert_eq!(PipelineError::embedding("x").code(), "embedding_service");
        assert_eq!(PipelineError::generation("x").code(), "generation");
        assert_eq!(
            PipelineError::store_connection("x").code(),
            "store_connection"
        );
        assert_eq!(PipelineError::store_write("d1", "x").code(), "store_write");
    }

    #[test]
    fn test_timeout_flag_is_a_specialization() {
        let timeout = PipelineError::embedding_timeout("deadline elapsed");
        assert!(timeout.is_timeout());
        assert_eq!(timeout.code(), "embedding_service");

        let plain = PipelineError::embedding("connection refused");
        assert!(!plain.is_timeout());
        assert_eq!(plain.code(), timeout.code());
    }

    #[test]
    fn test_retryability() {
        assert!(PipelineError::embedding("x").is_retryable());
        assert!(PipelineError::generation_timeout("x").is_retryable());
        assert!(PipelineError::store_connection_timeout("x").is_retryable());
        assert!(!PipelineError::invalid_input("x").is_retryable());
        assert!(!PipelineError::store_write("d1", "x").is_retryable());
    }

    #[test]
    fn test_display_includes_the_message() {
        let err = PipelineError::store_write("d1", "dimension mismatch");
        assert!(err.to_string().contains("dimension mismatch"));
        assert!(err.to_string().contains("d1"));
    }
}
