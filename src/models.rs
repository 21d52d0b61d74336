use serde::{Deserialize, Serialize};

/// One uploaded study file: the core only needs a name plus raw byte content.
#[derive(Debug, Clone)]
pub struct StudyFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl StudyFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }
}

/// Handle for a file stored on the remote model service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFileHandle {
    /// Resource name used for deletion, e.g. `files/abc123`.
    pub name: String,
    /// Download URI referenced from generation requests.
    pub uri: String,
    pub mime_type: String,
}

/// The three fields extracted from a well-formed evaluator response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub critique: String,
    pub score: f64,
    pub expected_answer: String,
}

/// Outcome of grading one answer. Always well-formed: when the remote call or
/// the parse failed, `degraded` is set and sentinel text is substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub critique: String,
    pub score: f64,
    pub expected_answer: String,
    pub degraded: bool,
}

/// Stored outcome of grading one question, appended in answering order and
/// never mutated within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: String,
    pub answer: String,
    pub critique: String,
    pub expected_answer: String,
    pub score: f64,
}

/// Sentinel critique used when evaluation fails (remote error or unparseable
/// response).
pub const SENTINEL_CRITIQUE: &str = "Erro na API/Formatação durante a avaliação.";

/// Sentinel expected answer used when evaluation fails.
pub const SENTINEL_EXPECTED_ANSWER: &str =
    "Não foi possível gerar a resposta esperada devido a um erro na API.";

pub const SENTINEL_SCORE: f64 = 0.0;

impl GradedAnswer {
    /// Degraded-but-valid grading result: the caller still receives a
    /// well-formed triple.
    pub fn sentinel() -> Self {
        Self {
            critique: SENTINEL_CRITIQUE.to_string(),
            score: SENTINEL_SCORE,
            expected_answer: SENTINEL_EXPECTED_ANSWER.to_string(),
            degraded: true,
        }
    }
}

impl From<Evaluation> for GradedAnswer {
    fn from(eval: Evaluation) -> Self {
        Self {
            critique: eval.critique,
            score: eval.score,
            expected_answer: eval.expected_answer,
            degraded: false,
        }
    }
}
