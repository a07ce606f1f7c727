pub mod models;
pub mod repository;
pub mod stats;
pub mod verification;

pub use models::{
    DomainOffer, DomainStat, LedgerAck, Offer, OfferSubmission, RequestCount, SubmittedOffer,
    VisitCount,
};
pub use repository::{DomainCatalog, KvStore, OfferLedger};
pub use verification::TokenVerifier;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Storage backend error: {0}")]
    Storage(#[source] BoxError),
    #[error("Corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("Domain actor unavailable: {0}")]
    ActorUnavailable(String),
    #[error("Token verification unavailable: {0}")]
    Verification(String),
}

impl CoreError {
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Storage(err.into())
    }

    pub fn corrupt(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_error_names_key() {
        let err = CoreError::corrupt("offers:example.com", "expected value at line 1");
        assert_eq!(
            err.to_string(),
            "Corrupt record at offers:example.com: expected value at line 1"
        );
    }

    #[test]
    fn test_storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = CoreError::storage(io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("refused"));
    }
}
