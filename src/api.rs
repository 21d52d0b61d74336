use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::{
    errors::{ApiError, ErrorContext},
    exam_service::ExamService,
    export,
    models::{AnswerRecord, GradedAnswer, StudyFile},
    session::{ExamPhase, ExamSession, SessionError},
};

// Import logging macros
use crate::{log_api_start, log_api_success, log_api_warn};

#[derive(Clone)]
pub struct AppState {
    pub exam_service: ExamService,
    pub session: Arc<Mutex<ExamSession>>,
}

#[derive(Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
    /// Rigor slider value read at grading time.
    pub rigor: u8,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Read-only view of the session for the UI.
#[derive(Serialize)]
pub struct ExamSnapshot {
    #[serde(flatten)]
    pub phase: ExamPhase,
    pub total_questions: usize,
    pub answered: usize,
    pub current_question: Option<String>,
}

impl ExamSnapshot {
    fn of(session: &ExamSession) -> Self {
        Self {
            phase: session.phase(),
            total_questions: session.total_questions(),
            answered: session.cursor(),
            current_question: session.current_question().map(str::to_string),
        }
    }
}

#[derive(Serialize)]
pub struct AnswerResponse {
    pub graded: GradedAnswer,
    pub question_index: usize,
    pub finished: bool,
    pub snapshot: ExamSnapshot,
    /// Set when grading degraded to sentinel values; never silently swallowed.
    pub evaluation_error: Option<String>,
}

// Exam endpoints

/// Accept the study-material upload plus the difficulty slider and start a
/// new exam. The session is reset only when generation succeeds.
pub async fn generate_exam(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ExamSnapshot>>, (StatusCode, Json<ApiResponse<()>>)> {
    log_api_start!("generate_exam");

    let mut files: Vec<StudyFile> = Vec::new();
    let mut difficulty: u8 = 5;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                let error = ApiError::BadRequest(format!("malformed multipart upload: {}", e));
                let context = ErrorContext::new("generate_exam", "exam");
                return Err(error.to_response_with_context(context));
            }
        };

        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        match (field_name.as_str(), file_name) {
            ("difficulty", _) => {
                let text = field.text().await.unwrap_or_default();
                difficulty = match text.trim().parse::<u8>() {
                    Ok(level) if level <= 10 => level,
                    _ => {
                        let error = ApiError::BadRequest(format!(
                            "difficulty must be an integer in [0,10], got '{}'",
                            text
                        ));
                        let context = ErrorContext::new("generate_exam", "exam");
                        return Err(error.to_response_with_context(context));
                    }
                };
            }
            (_, Some(name)) => {
                let content = match field.bytes().await {
                    Ok(bytes) => bytes.to_vec(),
                    Err(e) => {
                        let error =
                            ApiError::BadRequest(format!("failed to read upload '{}': {}", name, e));
                        let context = ErrorContext::new("generate_exam", "exam");
                        return Err(error.to_response_with_context(context));
                    }
                };
                files.push(StudyFile::new(name, content));
            }
            _ => {
                warn!(field = %field_name, "Ignoring unrecognized multipart field");
            }
        }
    }

    if files.is_empty() {
        let error = ApiError::ValidationError("no study files in the upload".to_string());
        let context = ErrorContext::new("generate_exam", "exam")
            .with_user_message("Por favor, faça o upload dos materiais de estudo.");
        return Err(error.to_response_with_context(context));
    }

    info!(
        file_count = files.len(),
        difficulty = difficulty,
        "Generating exam from uploaded study material"
    );

    let questions = state.exam_service.generate_questions(&files, difficulty).await;

    if questions.is_empty() {
        // Session stays as it was: a failed generation never consumes state.
        let error = ApiError::LLMError("question generation returned no questions".to_string());
        let context = ErrorContext::new("generate_exam", "exam").with_user_message(
            "Falha ao gerar questões. Verifique o conteúdo dos arquivos.",
        );
        return Err(error.to_response_with_context(context));
    }

    let snapshot = {
        let mut session = state.session.lock().unwrap();
        if let Err(e) = session.begin(questions) {
            let error = ApiError::InternalError(e.to_string());
            let context = ErrorContext::new("generate_exam", "exam");
            return Err(error.to_response_with_context(context));
        }
        ExamSnapshot::of(&session)
    };

    log_api_success!(
        "generate_exam",
        count = snapshot.total_questions,
        "exam started with generated questions"
    );
    Ok(Json(ApiResponse::success(snapshot)))
}

/// Current session state: phase, cursor, and the question being answered.
pub async fn get_exam(
    State(state): State<AppState>,
) -> Json<ApiResponse<ExamSnapshot>> {
    let session = state.session.lock().unwrap();
    Json(ApiResponse::success(ExamSnapshot::of(&session)))
}

/// Grade the current question against the submitted answer and advance.
pub async fn submit_answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<ApiResponse<AnswerResponse>>, (StatusCode, Json<ApiResponse<()>>)> {
    if request.rigor > 10 {
        let error = ApiError::BadRequest(format!(
            "rigor must be an integer in [0,10], got {}",
            request.rigor
        ));
        let context = ErrorContext::new("submit_answer", "exam");
        return Err(error.to_response_with_context(context));
    }

    // Validate before any remote call: an empty answer or a session that is
    // not answering must not trigger an evaluation.
    let (question, question_index) = {
        let session = state.session.lock().unwrap();
        match session.check_submission(&request.answer) {
            Ok(()) => (
                session.current_question().unwrap_or_default().to_string(),
                session.cursor(),
            ),
            Err(SessionError::EmptyAnswer) => {
                log_api_warn!("submit_answer", "empty answer rejected before grading");
                let error = ApiError::ValidationError("submitted answer is empty".to_string());
                let context = ErrorContext::new("submit_answer", "exam")
                    .with_user_message("Sua resposta está vazia.");
                return Err(error.to_response_with_context(context));
            }
            Err(e) => {
                let error = ApiError::SessionState(e.to_string());
                let context = ErrorContext::new("submit_answer", "exam");
                return Err(error.to_response_with_context(context));
            }
        }
    };

    log_api_start!("submit_answer", question_index = question_index);

    let graded = state
        .exam_service
        .evaluate_answer(&question, &request.answer, request.rigor)
        .await;

    if graded.degraded {
        log_api_warn!(
            "submit_answer",
            question_index = question_index,
            "evaluation degraded to sentinel result; question is still consumed"
        );
    }

    let record = AnswerRecord {
        question,
        answer: request.answer,
        critique: graded.critique.clone(),
        expected_answer: graded.expected_answer.clone(),
        score: graded.score,
    };

    // The lock was released during the remote call; `record_answer_at`
    // rejects the grade if the session advanced or was regenerated meanwhile.
    let (phase, snapshot) = {
        let mut session = state.session.lock().unwrap();
        match session.record_answer_at(question_index, record) {
            Ok(phase) => (phase, ExamSnapshot::of(&session)),
            Err(e) => {
                let error = ApiError::SessionState(e.to_string());
                let context = ErrorContext::new("submit_answer", "exam");
                return Err(error.to_response_with_context(context));
            }
        }
    };

    log_api_success!("submit_answer", question_index = question_index, "answer graded");

    let evaluation_error = graded
        .degraded
        .then(|| "Erro na avaliação: resultado degradado registrado.".to_string());

    Ok(Json(ApiResponse::success(AnswerResponse {
        graded,
        question_index,
        finished: phase == ExamPhase::Finished,
        snapshot,
        evaluation_error,
    })))
}

/// Final report for a finished session.
pub async fn get_report(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<export::ExamReport>>, (StatusCode, Json<ApiResponse<()>>)> {
    log_api_start!("get_report");

    let session = state.session.lock().unwrap();
    match export::build_report(&session) {
        Some(report) => Ok(Json(ApiResponse::success(report))),
        None => {
            let error = ApiError::SessionState("the exam is not finished yet".to_string());
            let context = ErrorContext::new("get_report", "exam");
            Err(error.to_response_with_context(context))
        }
    }
}

/// Download the finished-session result table as a CSV artifact.
pub async fn export_report(
    State(state): State<AppState>,
) -> Result<(StatusCode, [(&'static str, &'static str); 2], Vec<u8>), (StatusCode, Json<ApiResponse<()>>)>
{
    log_api_start!("export_report");

    let records = {
        let session = state.session.lock().unwrap();
        if !session.is_finished() {
            let error = ApiError::SessionState("the exam is not finished yet".to_string());
            let context = ErrorContext::new("export_report", "exam");
            return Err(error.to_response_with_context(context));
        }
        session.records().to_vec()
    };

    match export::summary_csv(&records) {
        Ok(bytes) => Ok((
            StatusCode::OK,
            [
                ("content-type", "text/csv; charset=utf-8"),
                (
                    "content-disposition",
                    "attachment; filename=\"Relatorio_Prova.csv\"",
                ),
            ],
            bytes,
        )),
        Err(e) => {
            let error = ApiError::InternalError(e.to_string());
            let context = ErrorContext::new("export_report", "exam");
            Err(error.to_response_with_context(context))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/exam/generate", post(generate_exam))
        .route("/api/exam", get(get_exam))
        .route("/api/exam/answer", post(submit_answer))
        .route("/api/exam/report", get(get_report))
        .route("/api/exam/export", get(export_report))
        .with_state(state)
}
