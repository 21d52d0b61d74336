//! Service-level tests of the generation and evaluation steps against a
//! recording mock of the remote model service, plus the full exam scenario.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use exam_grader::exam_service::ExamService;
use exam_grader::export;
use exam_grader::gemini::RemoteModel;
use exam_grader::models::{
    AnswerRecord, RemoteFileHandle, StudyFile, SENTINEL_CRITIQUE, SENTINEL_EXPECTED_ANSWER,
};
use exam_grader::session::{ExamPhase, ExamSession};

/// A recording mock of the remote service: configurable responses and
/// failure injection, with full visibility into uploads and deletions.
struct MockModel {
    /// Response returned by `generate`, or an error message to fail with.
    generate_result: Mutex<std::result::Result<String, String>>,
    /// Fail the upload with this index (0-based) if set.
    fail_upload_at: Option<usize>,
    generate_calls: AtomicUsize,
    uploads: Mutex<Vec<PathBuf>>,
    /// Whether each staged file existed on disk at upload time.
    uploads_existed: Mutex<Vec<bool>>,
    deletions: Mutex<Vec<String>>,
}

impl Default for MockModel {
    fn default() -> Self {
        Self {
            generate_result: Mutex::new(Ok(String::new())),
            fail_upload_at: None,
            generate_calls: AtomicUsize::default(),
            uploads: Mutex::default(),
            uploads_existed: Mutex::default(),
            deletions: Mutex::default(),
        }
    }
}

impl MockModel {
    fn replying(response: &str) -> Self {
        Self {
            generate_result: Mutex::new(Ok(response.to_string())),
            ..Self::default()
        }
    }

    fn failing_generation(message: &str) -> Self {
        Self {
            generate_result: Mutex::new(Err(message.to_string())),
            ..Self::default()
        }
    }

    fn failing_upload_at(index: usize) -> Self {
        Self {
            generate_result: Mutex::new(Ok("[]".to_string())),
            fail_upload_at: Some(index),
            ..Self::default()
        }
    }

    fn uploads(&self) -> Vec<PathBuf> {
        self.uploads.lock().unwrap().clone()
    }

    fn deletions(&self) -> Vec<String> {
        self.deletions.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteModel for MockModel {
    async fn upload_file(&self, path: &Path, _display_name: &str) -> Result<RemoteFileHandle> {
        let index = self.uploads.lock().unwrap().len();
        if self.fail_upload_at == Some(index) {
            return Err(anyhow::anyhow!("injected upload failure"));
        }

        self.uploads.lock().unwrap().push(path.to_path_buf());
        self.uploads_existed.lock().unwrap().push(path.exists());

        Ok(RemoteFileHandle {
            name: format!("files/mock-{}", index),
            uri: format!("https://mock.example/files/mock-{}", index),
            mime_type: "application/octet-stream".to_string(),
        })
    }

    async fn generate(
        &self,
        _system_instruction: &str,
        _prompt: &str,
        _files: &[RemoteFileHandle],
    ) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        match &*self.generate_result.lock().unwrap() {
            Ok(response) => Ok(response.clone()),
            Err(message) => Err(anyhow::anyhow!("{}", message)),
        }
    }

    async fn delete_file(&self, handle: &RemoteFileHandle) -> Result<()> {
        self.deletions.lock().unwrap().push(handle.name.clone());
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "Mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

fn study_files() -> Vec<StudyFile> {
    vec![
        StudyFile::new("apostila.pdf", b"conteudo da apostila".to_vec()),
        StudyFile::new("resumo.txt", b"resumo da materia".to_vec()),
    ]
}

fn ten_questions_response() -> String {
    let questions: Vec<String> = (1..=10).map(|i| format!("Questão {} aqui.", i)).collect();
    serde_json::to_string(&questions).unwrap()
}

#[tokio::test]
async fn test_generation_returns_list_and_cleans_up_everything() {
    let model = Arc::new(MockModel::replying(&ten_questions_response()));
    let service = ExamService::new(model.clone(), 10);

    let questions = service.generate_questions(&study_files(), 5).await;
    assert_eq!(questions.len(), 10);
    assert_eq!(questions[0], "Questão 1 aqui.");

    // Both files were staged on disk, uploaded, and every remote handle was
    // deleted afterwards.
    assert_eq!(model.uploads().len(), 2);
    assert!(model.uploads_existed.lock().unwrap().iter().all(|e| *e));
    assert_eq!(
        model.deletions(),
        vec!["files/mock-0".to_string(), "files/mock-1".to_string()]
    );
    for path in model.uploads() {
        assert!(!path.exists(), "transient file should be removed after generation");
    }
}

#[tokio::test]
async fn test_failed_generation_returns_empty_and_still_cleans_up() {
    let model = Arc::new(MockModel::failing_generation("upstream 500"));
    let service = ExamService::new(model.clone(), 10);

    let questions = service.generate_questions(&study_files(), 5).await;
    assert!(questions.is_empty());

    // Cleanup still ran: all uploaded handles deleted, transient files gone.
    assert_eq!(model.uploads().len(), 2);
    assert_eq!(model.deletions().len(), 2);
    for path in model.uploads() {
        assert!(!path.exists(), "transient file should be removed after a failing run");
    }
}

#[tokio::test]
async fn test_mid_upload_failure_deletes_partial_uploads() {
    let model = Arc::new(MockModel::failing_upload_at(1));
    let service = ExamService::new(model.clone(), 10);

    let questions = service.generate_questions(&study_files(), 5).await;
    assert!(questions.is_empty());

    // The first file made it to the remote service before the failure and
    // must still be deleted.
    assert_eq!(model.uploads().len(), 1);
    assert_eq!(model.deletions(), vec!["files/mock-0".to_string()]);
    assert_eq!(model.generate_calls.load(Ordering::SeqCst), 0);
    for path in model.uploads() {
        assert!(!path.exists(), "transient file should be removed after a failing run");
    }
}

#[tokio::test]
async fn test_generation_is_memoized_on_input_identity() {
    let model = Arc::new(MockModel::replying(&ten_questions_response()));
    let service = ExamService::new(model.clone(), 10);

    let first = service.generate_questions(&study_files(), 5).await;
    let second = service.generate_questions(&study_files(), 5).await;
    assert_eq!(first, second);
    assert_eq!(model.generate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(model.uploads().len(), 2);

    // A different difficulty is a different identity.
    let _ = service.generate_questions(&study_files(), 8).await;
    assert_eq!(model.generate_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_generation_is_not_memoized() {
    let model = Arc::new(MockModel::failing_generation("upstream 500"));
    let service = ExamService::new(model.clone(), 10);

    assert!(service.generate_questions(&study_files(), 5).await.is_empty());
    assert!(service.generate_questions(&study_files(), 5).await.is_empty());
    assert_eq!(model.generate_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_question_count_mismatch_is_tolerated() {
    let short: Vec<String> = (1..=7).map(|i| format!("Q{}", i)).collect();
    let model = Arc::new(MockModel::replying(&serde_json::to_string(&short).unwrap()));
    let service = ExamService::new(model, 10);

    let questions = service.generate_questions(&study_files(), 5).await;
    assert_eq!(questions.len(), 7);
}

#[tokio::test]
async fn test_generation_without_files_makes_no_remote_calls() {
    let model = Arc::new(MockModel::replying(&ten_questions_response()));
    let service = ExamService::new(model.clone(), 10);

    assert!(service.generate_questions(&[], 5).await.is_empty());
    assert_eq!(model.generate_calls.load(Ordering::SeqCst), 0);
    assert!(model.uploads().is_empty());
}

#[tokio::test]
async fn test_evaluation_extracts_the_three_fields() {
    let model = Arc::new(MockModel::replying(
        "CRITICA: Resposta completa e precisa.\nNOTA: 8.0\nRESPOSTA_ESPERADA: A resposta esperada.",
    ));
    let service = ExamService::new(model, 10);

    let graded = service.evaluate_answer("Questão?", "Minha resposta", 5).await;
    assert!(!graded.degraded);
    assert_eq!(graded.critique, "Resposta completa e precisa.");
    assert!((graded.score - 8.0).abs() < 1e-9);
    assert_eq!(graded.expected_answer, "A resposta esperada.");
}

#[tokio::test]
async fn test_evaluation_failure_yields_sentinels_not_errors() {
    let remote_failure = Arc::new(MockModel::failing_generation("timeout"));
    let service = ExamService::new(remote_failure, 10);
    let graded = service.evaluate_answer("Questão?", "Resposta", 5).await;
    assert!(graded.degraded);
    assert_eq!(graded.critique, SENTINEL_CRITIQUE);
    assert_eq!(graded.score, 0.0);
    assert_eq!(graded.expected_answer, SENTINEL_EXPECTED_ANSWER);

    let malformed = Arc::new(MockModel::replying("Nota final: oito"));
    let service = ExamService::new(malformed, 10);
    let graded = service.evaluate_answer("Questão?", "Resposta", 5).await;
    assert!(graded.degraded);
    assert_eq!(graded.score, 0.0);
}

#[tokio::test]
async fn test_full_exam_scenario_average_and_export() {
    let generation_model = Arc::new(MockModel::replying(&ten_questions_response()));
    let generation = ExamService::new(generation_model, 10);
    let questions = generation.generate_questions(&study_files(), 5).await;
    assert_eq!(questions.len(), 10);

    let grading_model = Arc::new(MockModel::replying(
        "CRITICA: Boa resposta.\nNOTA: 8.0\nRESPOSTA_ESPERADA: Resposta modelo.",
    ));
    let grading = ExamService::new(grading_model, 10);

    let mut session = ExamSession::new();
    session.begin(questions).unwrap();

    for i in 0..10 {
        let question = session.current_question().unwrap().to_string();
        let answer = format!("Resposta do aluno {}", i + 1);
        let graded = grading.evaluate_answer(&question, &answer, 5).await;
        let phase = session
            .record_answer(AnswerRecord {
                question,
                answer,
                critique: graded.critique,
                expected_answer: graded.expected_answer,
                score: graded.score,
            })
            .unwrap();
        if i < 9 {
            assert_eq!(phase, ExamPhase::Answering(i + 1));
        } else {
            assert_eq!(phase, ExamPhase::Finished);
        }
    }

    let report = export::build_report(&session).expect("finished session must report");
    assert_eq!(report.average_display, "8.00/10");
    assert_eq!(report.records.len(), 10);

    let csv_text = String::from_utf8(export::summary_csv(session.records()).unwrap()).unwrap();
    let mut lines = csv_text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Questão,Nota,Resposta_Aluno,Critica_Avaliador"
    );
    assert_eq!(lines.count(), 10);
}
