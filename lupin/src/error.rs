use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors. Wrapped into `anyhow::Error` by the operations that
/// raise them; recover the category with `downcast_ref::<NetworkError>()`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NetworkError {
    /// Schema mismatch, duplicate ids, dimension mismatch
    #[error("validation error: {0}")]
    Validation(String),

    /// Overlapping intervals inside a collapsed cluster, dangling ids
    #[error("data integrity error: {0}")]
    DataIntegrity(String),
}

impl NetworkError {
    pub fn validation(msg: impl Into<String>) -> anyhow::Error {
        NetworkError::Validation(msg.into()).into()
    }

    pub fn data_integrity(msg: impl Into<String>) -> anyhow::Error {
        NetworkError::DataIntegrity(msg.into()).into()
    }
}

/// A unit of work skipped for statistical reasons; the computation
/// carries on without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalWarning {
    pub unit: Box<str>,
    pub reason: Box<str>,
}

impl StatisticalWarning {
    /// Record a warning and emit it to the log
    pub fn new(unit: impl Into<Box<str>>, reason: impl Into<Box<str>>) -> Self {
        let ret = Self {
            unit: unit.into(),
            reason: reason.into(),
        };
        warn!("{}: {}", ret.unit, ret.reason);
        ret
    }
}

impl std::fmt::Display for StatisticalWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}", self.unit, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_category() {
        let err = NetworkError::validation("duplicate id: a");
        assert_eq!(
            err.downcast_ref::<NetworkError>(),
            Some(&NetworkError::Validation("duplicate id: a".into()))
        );
        assert!(err.to_string().contains("duplicate id"));
    }
}
