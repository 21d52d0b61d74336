//! Exam session state machine.
//!
//! The session is an explicit, passed-around state object. Transitions are a
//! pure reducer over (phase, event) so the flow can be unit tested without
//! any UI or network: `NotStarted -> Answering(0) -> ... -> Finished`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AnswerRecord;

/// Where the exam flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "index", rename_all = "snake_case")]
pub enum ExamPhase {
    NotStarted,
    Answering(usize),
    Finished,
}

/// Rejected transitions. None of these mutate the session.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("cannot start an exam without questions")]
    NoQuestions,

    #[error("a resposta está vazia")]
    EmptyAnswer,

    #[error("no exam in progress")]
    NotAnswering,

    #[error("the exam changed while the answer was being graded")]
    StaleSubmission,
}

/// One interactive exam: ordered questions, an index cursor, and the ordered
/// per-question results.
///
/// Invariants: the cursor stays in `[0, N]`, `records.len() == cursor`, and
/// no record ever exists for an ungraded question. All mutation goes through
/// [`ExamSession::begin`] and [`ExamSession::record_answer`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExamSession {
    questions: Vec<String>,
    cursor: usize,
    records: Vec<AnswerRecord>,
    started: bool,
}

impl ExamSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ExamPhase {
        if !self.started {
            ExamPhase::NotStarted
        } else if self.cursor < self.questions.len() {
            ExamPhase::Answering(self.cursor)
        } else {
            ExamPhase::Finished
        }
    }

    /// Start (or restart) the exam with a freshly generated question list.
    ///
    /// Resets the result list; the previous session's questions and records
    /// are destroyed. Works from `NotStarted` and from `Finished`, which is
    /// terminal until this explicit restart.
    pub fn begin(&mut self, questions: Vec<String>) -> Result<(), SessionError> {
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        self.questions = questions;
        self.cursor = 0;
        self.records.clear();
        self.started = true;
        Ok(())
    }

    /// Validate a submitted answer before any remote call is made.
    pub fn check_submission(&self, answer: &str) -> Result<(), SessionError> {
        if !matches!(self.phase(), ExamPhase::Answering(_)) {
            return Err(SessionError::NotAnswering);
        }
        if answer.trim().is_empty() {
            return Err(SessionError::EmptyAnswer);
        }
        Ok(())
    }

    /// Append the graded record for the current question and advance the
    /// cursor by one. Returns the phase after the transition.
    pub fn record_answer(&mut self, record: AnswerRecord) -> Result<ExamPhase, SessionError> {
        self.check_submission(&record.answer)?;
        self.records.push(record);
        self.cursor += 1;
        Ok(self.phase())
    }

    /// Like [`ExamSession::record_answer`], but for a grade produced while
    /// the session lock was released. Rejected when the session advanced or
    /// was restarted in the meantime: the cursor must still sit at `index`
    /// and the question there must be the one that was graded.
    pub fn record_answer_at(
        &mut self,
        index: usize,
        record: AnswerRecord,
    ) -> Result<ExamPhase, SessionError> {
        if self.cursor != index || self.questions.get(index) != Some(&record.question) {
            return Err(SessionError::StaleSubmission);
        }
        self.record_answer(record)
    }

    pub fn current_question(&self) -> Option<&str> {
        match self.phase() {
            ExamPhase::Answering(i) => self.questions.get(i).map(String::as_str),
            _ => None,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn records(&self) -> &[AnswerRecord] {
        &self.records
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == ExamPhase::Finished
    }

    /// Arithmetic mean over the recorded scores. `None` until at least one
    /// answer has been graded.
    pub fn average_score(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        let sum: f64 = self.records.iter().map(|r| r.score).sum();
        Some(sum / self.records.len() as f64)
    }
}
