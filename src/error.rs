//! Cartograph error classification
//!
//! Error codes follow the pattern: CG-{CATEGORY}-{3-digit number}
//!
//! Categories:
//! - GOV: governor/budget errors
//! - EXT: extraction provider errors
//!
//! Fatal errors are recognized by a stable sentinel code embedded in the
//! error text. They always unwind to the task caller; everything else is
//! aggregated into the task result as a recoverable per-file error. Each
//! code is stable and must not be reused.

use thiserror::Error;

/// Token/request budget exhausted. Halts the task after the current file.
pub const CG_GOV_001_BUDGET_EXHAUSTED: &str = "CG-GOV-001";

/// Extraction provider unavailable (network down, service unreachable).
pub const CG_EXT_001_PROVIDER_UNAVAILABLE: &str = "CG-EXT-001";

/// Extraction provider returned output that could not be interpreted.
pub const CG_EXT_002_PROVIDER_INVALID_OUTPUT: &str = "CG-EXT-002";

/// All sentinel codes that classify an error as fatal/systemic.
const FATAL_SENTINELS: &[&str] = &[
    CG_GOV_001_BUDGET_EXHAUSTED,
    CG_EXT_001_PROVIDER_UNAVAILABLE,
    CG_EXT_002_PROVIDER_INVALID_OUTPUT,
];

/// Structured errors raised by the indexing core itself.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A file index attempt lost the race against its timeout timer.
    #[error("file index attempt timed out after {timeout_ms} ms: {path}")]
    Timeout { path: String, timeout_ms: u64 },
}

/// Check whether an error carries a fatal sentinel anywhere in its chain.
///
/// Fatal errors (budget exhausted, provider unavailable, provider invalid
/// output) must propagate unmodified; callers check this before wrapping
/// an error with per-file context.
pub fn is_fatal_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let text = cause.to_string();
        FATAL_SENTINELS.iter().any(|code| text.contains(code))
    })
}

/// Check whether an error chain carries the budget-exhaustion sentinel.
///
/// Budget exhaustion halts the task immediately: the offending file is
/// recorded as a non-recoverable error and remaining files are not
/// attempted.
pub fn is_budget_exhausted(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.to_string().contains(CG_GOV_001_BUDGET_EXHAUSTED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_sentinel_codes_are_unique() {
        let mut codes = FATAL_SENTINELS.to_vec();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), FATAL_SENTINELS.len());
    }

    #[test]
    fn test_plain_error_is_not_fatal() {
        let err = anyhow!("parse failure in foo.ts");
        assert!(!is_fatal_error(&err));
        assert!(!is_budget_exhausted(&err));
    }

    #[test]
    fn test_budget_sentinel_detected_through_context_chain() {
        let err = anyhow!("{}: token budget exhausted", CG_GOV_001_BUDGET_EXHAUSTED)
            .context("indexing src/a.ts");
        assert!(is_fatal_error(&err));
        assert!(is_budget_exhausted(&err));
    }

    #[test]
    fn test_provider_sentinels_are_fatal_but_not_budget() {
        let unavailable = anyhow!("{}: provider unreachable", CG_EXT_001_PROVIDER_UNAVAILABLE);
        let invalid = anyhow!("{}: bad payload", CG_EXT_002_PROVIDER_INVALID_OUTPUT);
        assert!(is_fatal_error(&unavailable));
        assert!(is_fatal_error(&invalid));
        assert!(!is_budget_exhausted(&unavailable));
        assert!(!is_budget_exhausted(&invalid));
    }

    #[test]
    fn test_timeout_error_message() {
        let err = IndexError::Timeout {
            path: "src/slow.ts".to_string(),
            timeout_ms: 2500,
        };
        let text = err.to_string();
        assert!(text.contains("2500 ms"));
        assert!(text.contains("src/slow.ts"));
    }
}
