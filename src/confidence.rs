//! Edge confidence scoring
//!
//! Maps extraction-quality factors to a bounded confidence scalar.
//! All scoring is pure function: same inputs always produce same output.
//!
//! The model starts from a neutral base and adds bonuses for stronger
//! extraction sources and corroborating evidence, then subtracts
//! penalties for ambiguity and for verified call sites whose target could
//! not be found in the codebase (likely an external dependency).

use serde::{Deserialize, Serialize};

/// Lower clamp for any edge confidence.
pub const MIN_CONFIDENCE: f64 = 0.15;

/// Upper clamp for any edge confidence.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Neutral starting point before bonuses and penalties.
pub const BASE_CONFIDENCE: f64 = 0.5;

/// Ceiling applied when cross-file resolution had to pick among multiple
/// same-name candidates. Applied after the formula, regardless of output.
pub const AMBIGUOUS_RESOLUTION_CAP: f64 = 0.75;

/// Parser name reported by the extraction adapter when it fell back to
/// LLM-based extraction instead of AST parsing.
pub const LLM_FALLBACK_PARSER: &str = "llm_fallback";

/// How an edge was derived from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    /// AST parse found an unambiguous call or import site.
    AstVerified,
    /// AST parse found the site but had to pick among overloads.
    AstInferred,
    /// Relationship came from LLM fallback extraction.
    LlmFallback,
}

impl EdgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeSource::AstVerified => "ast_verified",
            EdgeSource::AstInferred => "ast_inferred",
            EdgeSource::LlmFallback => "llm_fallback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ast_verified" => Some(EdgeSource::AstVerified),
            "ast_inferred" => Some(EdgeSource::AstInferred),
            "llm_fallback" => Some(EdgeSource::LlmFallback),
            _ => None,
        }
    }
}

/// Evidence factors for one edge.
#[derive(Debug, Clone, Copy)]
pub struct EdgeEvidence {
    pub source: EdgeSource,
    /// A concrete source line was captured for the relationship.
    pub has_line: bool,
    /// The target resolved to a known function/module id.
    pub resolved: bool,
    /// More than one candidate matched the site or the by-name lookup.
    pub ambiguous: bool,
}

/// Score an edge from its evidence.
///
/// `confidence = 0.5 + source bonus + evidence bonuses - penalties`,
/// clamped to [0.15, 0.95]. The external-dependency penalty applies only
/// to `ast_verified` edges with an unresolved target: a verified call
/// site that points outside the indexed codebase is most likely a
/// third-party call, not a miss.
pub fn score(evidence: &EdgeEvidence) -> f64 {
    let mut confidence = BASE_CONFIDENCE;

    confidence += match evidence.source {
        EdgeSource::AstVerified => 0.35,
        EdgeSource::AstInferred => 0.20,
        EdgeSource::LlmFallback => 0.10,
    };

    if evidence.has_line {
        confidence += 0.05;
    }
    if evidence.resolved {
        confidence += 0.05;
    }
    if evidence.ambiguous {
        confidence -= 0.10;
    }
    if !evidence.resolved && evidence.source == EdgeSource::AstVerified {
        confidence -= 0.15;
    }

    confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Classify a raw call edge's source and ambiguity.
///
/// - LLM fallback parser -> `llm_fallback`
/// - overload count > 1 -> `ast_inferred`, ambiguous
/// - otherwise -> `ast_verified`
///
/// The adapter's own ambiguity flag is honored in all cases.
pub fn classify_call_source(
    parser_name: &str,
    overload_count: u32,
    adapter_ambiguous: bool,
) -> (EdgeSource, bool) {
    let ambiguous = adapter_ambiguous || overload_count > 1;
    let source = if parser_name == LLM_FALLBACK_PARSER {
        EdgeSource::LlmFallback
    } else if overload_count > 1 {
        EdgeSource::AstInferred
    } else {
        EdgeSource::AstVerified
    };
    (source, ambiguous)
}

/// Classify an import edge's source.
///
/// Import edges are never ambiguous and never `ast_inferred`: an import
/// statement has no overloads.
pub fn classify_import_source(parser_name: &str) -> EdgeSource {
    if parser_name == LLM_FALLBACK_PARSER {
        EdgeSource::LlmFallback
    } else {
        EdgeSource::AstVerified
    }
}
