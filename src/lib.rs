pub mod api;
pub mod config;
pub mod errors;
pub mod exam_service;
pub mod export;
pub mod gemini;
pub mod generation_cache;
pub mod logging;
pub mod models;
pub mod parser;
pub mod prompts;
pub mod session;

pub use config::Config;
pub use errors::*;
pub use exam_service::ExamService;
pub use export::{build_report, summary_csv, ExamReport};
pub use gemini::{GeminiClient, RemoteModel};
pub use generation_cache::{generation_key, GenerationCache};
pub use models::*;
pub use parser::{parse_evaluation, parse_question_list, EvaluationParseError};
pub use session::{ExamPhase, ExamSession, SessionError};
