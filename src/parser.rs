//! Parsers for the remote model's free-text responses.
//!
//! The model's output is an external contract we do not control: a
//! literal-list construct for generation and marker-delimited free text for
//! evaluation. Both parsers return tagged results instead of panicking so the
//! one genuinely risky boundary in this system stays isolated here.

use thiserror::Error;
use tracing::debug;

use crate::models::Evaluation;

pub const CRITIQUE_MARKER: &str = "CRITICA:";
pub const SCORE_MARKER: &str = "NOTA:";
pub const EXPECTED_ANSWER_MARKER: &str = "RESPOSTA_ESPERADA:";

/// Failure modes of the evaluator-response parser.
#[derive(Debug, Error, PartialEq)]
pub enum EvaluationParseError {
    #[error("missing '{0}' marker in evaluator response")]
    MissingMarker(&'static str),

    #[error("score field is not a number: '{0}'")]
    InvalidScore(String),
}

/// Strip markdown code fences and locate the outermost list construct in a
/// generation response.
pub fn extract_list_from_response(content: &str) -> String {
    // Fenced blocks first: ```json ... ``` or plain ``` ... ```
    for fence in ["```json", "```"] {
        if let Some(start) = content.find(fence) {
            let body_start = start + fence.len();
            if let Some(end) = content[body_start..].find("```") {
                let candidate = content[body_start..body_start + end].trim();
                if candidate.starts_with('[') {
                    return candidate.to_string();
                }
            }
        }
    }

    // Standalone list: widest [ ... ] span.
    if let Some(start) = content.find('[') {
        if let Some(end) = content.rfind(']') {
            if end > start {
                return content[start..=end].to_string();
            }
        }
    }

    content.trim().to_string()
}

/// Parse a generation response into at most `max_questions` question strings.
///
/// Tries the literal-list construct first (a JSON array of strings); if that
/// fails, falls back to line-splitting that skips lines looking like list or
/// string delimiters. Never fails: a hopeless response yields an empty list.
pub fn parse_question_list(raw: &str, max_questions: usize) -> Vec<String> {
    let cleaned = extract_list_from_response(raw);

    let mut questions = match serde_json::from_str::<Vec<String>>(&cleaned) {
        Ok(list) => list,
        Err(e) => {
            debug!(
                error = %e,
                "Generation response is not a literal list, using line extraction fallback"
            );
            fallback_line_extraction(&cleaned)
        }
    };

    questions.truncate(max_questions);
    questions
}

/// Line-splitting heuristic for responses that are not a literal list: keep
/// non-empty lines that do not start with a list or string delimiter.
fn fallback_line_extraction(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with(['[', ']', '"', '\'']))
        .map(str::to_string)
        .collect()
}

/// Extract (critique, score, expected answer) from an evaluator response by
/// locating the three fixed markers in order and slicing the text between
/// them.
pub fn parse_evaluation(raw: &str) -> Result<Evaluation, EvaluationParseError> {
    let critique_at = raw
        .find(CRITIQUE_MARKER)
        .ok_or(EvaluationParseError::MissingMarker(CRITIQUE_MARKER))?;
    let after_critique = critique_at + CRITIQUE_MARKER.len();

    let score_rel = raw[after_critique..]
        .find(SCORE_MARKER)
        .ok_or(EvaluationParseError::MissingMarker(SCORE_MARKER))?;
    let score_at = after_critique + score_rel;
    let after_score = score_at + SCORE_MARKER.len();

    let expected_rel = raw[after_score..]
        .find(EXPECTED_ANSWER_MARKER)
        .ok_or(EvaluationParseError::MissingMarker(EXPECTED_ANSWER_MARKER))?;
    let expected_at = after_score + expected_rel;
    let after_expected = expected_at + EXPECTED_ANSWER_MARKER.len();

    let critique = raw[after_critique..score_at].trim().to_string();
    let score_text = raw[after_score..expected_at].trim();
    let expected_answer = raw[after_expected..].trim().to_string();

    let score = score_text
        .parse::<f64>()
        .map_err(|_| EvaluationParseError::InvalidScore(score_text.to_string()))?;

    Ok(Evaluation {
        critique,
        score,
        expected_answer,
    })
}
