//! Keyword-based query classification for the multi-source planner.
//!
//! Classification is a pure function of the lower-cased query, so a route
//! can be decided (and tested) without touching the network.

use serde::Serialize;

/// Terms that mark a query as clinical.
pub const CLINICAL_KEYWORDS: &[&str] = &[
    "disease",
    "treatment",
    "drug",
    "symptom",
    "therapy",
    "cancer",
    "vaccine",
    "covid19",
    "diabetes",
    "tumor",
];

/// Terms that mark a query as general knowledge.
pub const GENERAL_KEYWORDS: &[&str] = &[
    "history",
    "definition",
    "overview",
    "explain",
    "who is",
    "what is",
];

/// Logical role a live source plays in routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// Peer-reviewed biomedical literature.
    Biomedical,
    Preprint,
    Encyclopedic,
}

/// Query class decided by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryClass {
    Clinical,
    General,
    Mixed,
}

/// One planned source invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteStep {
    pub role: SourceRole,
    pub k: usize,
}

/// Classify a query. Clinical terms take precedence over general ones.
pub fn classify(query: &str) -> QueryClass {
    let lower = query.to_lowercase();
    if CLINICAL_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        QueryClass::Clinical
    } else if GENERAL_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        QueryClass::General
    } else {
        QueryClass::Mixed
    }
}

/// Ordered source invocations for a query class.
pub fn plan(class: QueryClass) -> Vec<RouteStep> {
    use SourceRole::*;
    let steps: &[(SourceRole, usize)] = match class {
        QueryClass::Clinical => &[(Biomedical, 5), (Preprint, 5)],
        QueryClass::General => &[(Encyclopedic, 3)],
        QueryClass::Mixed => &[(Biomedical, 3), (Preprint, 3), (Encyclopedic, 2)],
    };
    steps
        .iter()
        .map(|&(role, k)| RouteStep { role, k })
        .collect()
}
