//! Safety verdict type.
//!
//! The verdict is advisory: classification must never block the system on
//! its own failure, so every failure path folds into a default-safe verdict
//! that still explains what went wrong.

use serde::{Deserialize, Serialize};

/// Pre-flight classification of the latest user turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyVerdict {
    /// Whether the message is considered safe
    pub safe: bool,
    /// Human-readable explanation
    pub reason: String,
    /// Short category label ("benign", "data_exfiltration", "error", ...)
    pub category: String,
}

impl SafetyVerdict {
    /// Verdict for a message the classifier accepted
    pub fn safe(reason: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            safe: true,
            reason: reason.into(),
            category: category.into(),
        }
    }

    /// Fail-open verdict used when classification itself failed
    pub fn fail_open(reason: impl Into<String>) -> Self {
        Self {
            safe: true,
            reason: reason.into(),
            category: "error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_open_is_safe_with_error_category() {
        let verdict = SafetyVerdict::fail_open("classifier transport error");
        assert!(verdict.safe);
        assert_eq!(verdict.category, "error");
        assert!(!verdict.reason.is_empty());
    }
}
