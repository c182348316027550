//! Answer assembly: context block, prompts, confidence, and disclaimer.
//!
//! Everything here is deterministic; the completion call itself happens in
//! the app crate. Every [`AnswerResult`] built by this module carries the
//! disclaimer, whatever its status.

use crate::models::{AnswerResult, AnswerStatus, Citation, RetrievalHit};

/// Prepended to every answer.
pub const DISCLAIMER: &str =
    "_This is not medical advice. Consult a licensed clinician for diagnosis or treatment._";

/// Instruction sent as the system message to the completion service.
pub const SYSTEM_INSTRUCTION: &str = "You are a clinical research assistant. \
Answer strictly using the CONTEXT. Cite sources with bracket numbers [1], [2], etc. \
If the question is not answerable from the context, say you don't know.";

pub const NO_EVIDENCE_MESSAGE: &str =
    "No supporting evidence was found in the indexed corpus for this question.";

pub const UNAVAILABLE_MESSAGE: &str =
    "Unable to generate an answer right now. The retrieved evidence is listed below.";

/// Number of top hits averaged into the confidence score.
const CONFIDENCE_TOP_N: usize = 3;

/// One line per hit: `[rank] SOURCE origin_id — snippet`, blank-line separated.
pub fn build_context(hits: &[RetrievalHit]) -> String {
    hits.iter()
        .map(|h| {
            format!(
                "[{}] {} {} — {}",
                h.rank,
                h.source_tag.to_uppercase(),
                h.origin_id,
                h.text_snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_user_prompt(question: &str, context: &str) -> String {
    format!(
        "QUESTION:\n{}\n\nCONTEXT:\n{}\n\nReturn a concise, evidence-grounded answer with citations.",
        question, context
    )
}

/// Mean score of the top three hits, clamped to `[0, 1]`, 3 decimals.
pub fn confidence(hits: &[RetrievalHit]) -> f32 {
    let top: Vec<f32> = hits
        .iter()
        .take(CONFIDENCE_TOP_N)
        .map(|h| h.score.unwrap_or(0.0))
        .collect();
    if top.is_empty() {
        return 0.0;
    }
    let mean = top.iter().sum::<f32>() / top.len() as f32;
    (mean.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

pub fn with_disclaimer(answer: &str) -> String {
    format!("{}\n\n{}", DISCLAIMER, answer)
}

fn citations(hits: &[RetrievalHit]) -> Vec<Citation> {
    hits.iter().map(Citation::from).collect()
}

/// The completion service answered.
pub fn answered(hits: Vec<RetrievalHit>, completion: &str) -> AnswerResult {
    AnswerResult {
        answer_text: with_disclaimer(completion.trim()),
        citations: citations(&hits),
        confidence: confidence(&hits),
        status: AnswerStatus::Answered,
        hits,
    }
}

/// Retrieval came back empty; nothing was sent to the completion service.
pub fn no_evidence() -> AnswerResult {
    AnswerResult {
        answer_text: with_disclaimer(NO_EVIDENCE_MESSAGE),
        citations: Vec::new(),
        confidence: 0.0,
        status: AnswerStatus::NoEvidence,
        hits: Vec::new(),
    }
}

/// The completion service failed; the evidence is still returned.
pub fn unavailable(hits: Vec<RetrievalHit>, reason: impl Into<String>) -> AnswerResult {
    AnswerResult {
        answer_text: with_disclaimer(UNAVAILABLE_MESSAGE),
        citations: citations(&hits),
        confidence: 0.0,
        status: AnswerStatus::Unavailable {
            reason: reason.into(),
        },
        hits,
    }
}
