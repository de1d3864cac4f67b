//! Change detection
//!
//! Decides skip vs. reindex for each file before any extraction work:
//! path rules, size limit, binary heuristic, then checksum comparison
//! against stored artifacts. The checksum is a change-detection signal,
//! not cryptographic integrity: a stored checksum only ever advances
//! inside a successful atomic commit, so a match always implies the
//! file's artifacts are consistent with that exact content, unless the
//! artifact set is incomplete, in which case the file is re-indexed
//! anyway (self-repair).

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};

use crate::config::IndexingConfig;
use crate::storage::GraphStore;

/// Number of leading bytes sampled by the binary heuristic.
const BINARY_SAMPLE_BYTES: usize = 8000;

/// Suspicious-byte fraction above which a file is treated as binary.
const BINARY_SUSPICIOUS_FRACTION: f64 = 0.3;

/// Why a file was skipped without extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Path matched an exclude pattern or has an unindexed extension.
    Excluded,
    /// File exceeds the configured size limit.
    TooLarge { size: u64, limit: u64 },
    /// Binary content heuristic fired.
    Binary,
    /// Checksum unchanged and artifacts complete; only the last-accessed
    /// timestamp is touched.
    Unchanged,
    /// Final-attempt timeout under the `skip` policy.
    TimedOut,
}

/// Why a file is being (re)indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexReason {
    New,
    Forced,
    Changed,
    /// Checksum unchanged but stored artifacts are incomplete.
    IncompleteArtifacts,
}

/// Outcome of the pre-extraction decision table.
#[derive(Debug)]
pub enum ChangeDecision {
    Skip(SkipReason),
    Reindex {
        content: String,
        checksum: String,
        reason: ReindexReason,
    },
}

/// Pre-extraction gate for one file.
///
/// Holds the compiled exclusion rules; all state it consults lives in
/// storage, so the detector itself is safe to clone across attempt
/// threads.
#[derive(Clone)]
pub struct ChangeDetector {
    exclude: GlobSet,
    extensions: Vec<String>,
    max_file_size: u64,
    force_reindex: bool,
    embeddings_required: bool,
    context_packs_required: bool,
}

impl ChangeDetector {
    pub fn new(config: &IndexingConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude_patterns {
            let glob = Glob::new(pattern)
                .with_context(|| format!("invalid exclude pattern: {}", pattern))?;
            builder.add(glob);
        }
        Ok(Self {
            exclude: builder.build()?,
            extensions: config.included_extensions.clone(),
            max_file_size: config.max_file_size_bytes,
            force_reindex: config.force_reindex,
            embeddings_required: config.embeddings_required,
            context_packs_required: config.context_packs_required,
        })
    }

    /// Run the decision table for one file.
    ///
    /// # Behavior
    /// 1. Excluded path or unindexed extension -> skip
    /// 2. Size over limit -> skip
    /// 3. Binary heuristic over the first 8000 bytes -> skip
    /// 4. Checksum vs stored state: force -> reindex; no prior checksum
    ///    -> reindex (new); unchanged + complete -> skip; unchanged +
    ///    incomplete -> reindex (self-repair); changed -> reindex
    ///
    /// Read failures propagate; the orchestrator records them as
    /// recoverable per-file errors.
    pub fn evaluate(&self, path: &str, store: &dyn GraphStore) -> Result<ChangeDecision> {
        if !self.path_is_indexable(path) {
            return Ok(ChangeDecision::Skip(SkipReason::Excluded));
        }

        let metadata =
            std::fs::metadata(path).with_context(|| format!("failed to stat {}", path))?;
        if metadata.len() > self.max_file_size {
            return Ok(ChangeDecision::Skip(SkipReason::TooLarge {
                size: metadata.len(),
                limit: self.max_file_size,
            }));
        }

        let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path))?;
        if looks_binary(&bytes) {
            return Ok(ChangeDecision::Skip(SkipReason::Binary));
        }

        let checksum = compute_checksum(&bytes);
        let content = String::from_utf8_lossy(&bytes).into_owned();

        if self.force_reindex {
            return Ok(ChangeDecision::Reindex {
                content,
                checksum,
                reason: ReindexReason::Forced,
            });
        }

        match store.get_checksum(path)? {
            None => Ok(ChangeDecision::Reindex {
                content,
                checksum,
                reason: ReindexReason::New,
            }),
            Some(stored) if stored == checksum => {
                if self.artifacts_complete(path, store)? {
                    Ok(ChangeDecision::Skip(SkipReason::Unchanged))
                } else {
                    Ok(ChangeDecision::Reindex {
                        content,
                        checksum,
                        reason: ReindexReason::IncompleteArtifacts,
                    })
                }
            }
            Some(_) => Ok(ChangeDecision::Reindex {
                content,
                checksum,
                reason: ReindexReason::Changed,
            }),
        }
    }

    fn path_is_indexable(&self, path: &str) -> bool {
        if self.exclude.is_match(path) {
            return false;
        }
        let extension = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        self.extensions.iter().any(|e| e == extension)
    }

    /// Compare stored artifact counts against what the last commit
    /// recorded on the file row. Functions are compared with `>=`
    /// because update-in-place identity can leave records from earlier
    /// versions of the file alive alongside the current set.
    fn artifacts_complete(&self, path: &str, store: &dyn GraphStore) -> Result<bool> {
        let counts = match store.artifact_counts(path)? {
            Some(counts) => counts,
            None => return Ok(false),
        };
        // A truncated extraction is incomplete no matter what landed.
        if counts.partial {
            return Ok(false);
        }
        if counts.functions < counts.recorded_functions {
            return Ok(false);
        }
        if counts.modules < counts.recorded_modules {
            return Ok(false);
        }
        if self.embeddings_required && counts.embeddings < counts.recorded_functions {
            return Ok(false);
        }
        if self.context_packs_required && counts.context_packs < counts.recorded_packs {
            return Ok(false);
        }
        Ok(true)
    }
}

/// Binary heuristic: sample up to the first 8000 bytes and count bytes
/// that are 0, below 9, or strictly between 13 and 32. A suspicious
/// fraction above 0.3 marks the file binary.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(BINARY_SAMPLE_BYTES)];
    if sample.is_empty() {
        return false;
    }
    let suspicious = sample
        .iter()
        .filter(|&&b| b == 0 || b < 9 || (b > 13 && b < 32))
        .count();
    suspicious as f64 / sample.len() as f64 > BINARY_SUSPICIOUS_FRACTION
}

/// SHA-256 content checksum, hex-encoded.
pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_binary() {
        assert!(!looks_binary(b"fn main() {\n    println!(\"hi\");\n}\n"));
        assert!(!looks_binary(b""));
    }

    #[test]
    fn test_nul_heavy_content_is_binary() {
        let mut bytes = vec![0u8; 400];
        bytes.extend_from_slice(&[b'a'; 600]);
        assert!(looks_binary(&bytes));
    }

    #[test]
    fn test_tabs_and_newlines_are_not_suspicious() {
        // 9 (tab), 10 (newline), 13 (CR) are all allowed control bytes
        let bytes = vec![9u8, 10, 13].repeat(500);
        assert!(!looks_binary(&bytes));
    }

    #[test]
    fn test_heuristic_only_samples_leading_bytes() {
        // Clean 8000-byte prefix followed by garbage: still text
        let mut bytes = vec![b'x'; BINARY_SAMPLE_BYTES];
        bytes.extend_from_slice(&vec![0u8; 4000]);
        assert!(!looks_binary(&bytes));
    }

    #[test]
    fn test_checksum_is_stable_and_content_sensitive() {
        let a = compute_checksum(b"hello");
        let b = compute_checksum(b"hello");
        let c = compute_checksum(b"hello!");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_extension_and_exclude_gates() {
        let config = IndexingConfig {
            included_extensions: vec!["rs".to_string()],
            exclude_patterns: vec!["**/generated/**".to_string()],
            ..Default::default()
        };
        let detector = ChangeDetector::new(&config).unwrap();
        assert!(detector.path_is_indexable("src/main.rs"));
        assert!(!detector.path_is_indexable("src/main.py"));
        assert!(!detector.path_is_indexable("src/generated/main.rs"));
        assert!(!detector.path_is_indexable("Makefile"));
    }
}
