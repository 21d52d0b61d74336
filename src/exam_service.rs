//! Orchestration of the two remote steps: question generation and answer
//! evaluation.
//!
//! Both steps degrade instead of propagating remote failures: generation
//! yields an empty list, evaluation yields a sentinel triple. The generation
//! step owns the cleanup-always contract for remote file handles and
//! transient local files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::gemini::RemoteModel;
use crate::generation_cache::{generation_key, GenerationCache};
use crate::models::{GradedAnswer, RemoteFileHandle, StudyFile};
use crate::parser::{parse_evaluation, parse_question_list};
use crate::prompts;

#[derive(Clone)]
pub struct ExamService {
    model: Arc<dyn RemoteModel>,
    cache: GenerationCache,
    num_questions: usize,
}

impl ExamService {
    pub fn new(model: Arc<dyn RemoteModel>, num_questions: usize) -> Self {
        Self {
            model,
            cache: GenerationCache::default(),
            num_questions,
        }
    }

    pub fn with_cache(mut self, cache: GenerationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn num_questions(&self) -> usize {
        self.num_questions
    }

    pub fn provider_name(&self) -> &'static str {
        self.model.provider_name()
    }

    /// Generate the session's question list from uploaded study files.
    ///
    /// Returns an empty list on any remote failure; remote file handles and
    /// transient local files are cleaned up regardless of the outcome.
    /// Results are memoized on (file names, content bytes, difficulty).
    pub async fn generate_questions(&self, files: &[StudyFile], difficulty_level: u8) -> Vec<String> {
        if files.is_empty() {
            warn!("Generation requested without any study files");
            return Vec::new();
        }

        let key = generation_key(files, difficulty_level);
        if let Some(cached) = self.cache.get(key).await {
            info!(
                question_count = cached.len(),
                difficulty = difficulty_level,
                "Serving question list from generation cache"
            );
            return cached;
        }

        info!(
            file_count = files.len(),
            difficulty = difficulty_level,
            provider = self.model.provider_name(),
            "Starting question generation"
        );

        let staged = match stage_transient_files(files) {
            Ok(staged) => staged,
            Err(e) => {
                error!(error = %e, "Failed to stage uploads as transient files");
                return Vec::new();
            }
        };

        let mut remote_files: Vec<RemoteFileHandle> = Vec::new();
        let result = self
            .upload_and_generate(&staged.paths, difficulty_level, &mut remote_files)
            .await;

        // Cleanup-always: remote handles first, then the transient local
        // files. Failures here are best-effort and intentionally ignored.
        for handle in &remote_files {
            if let Err(e) = self.model.delete_file(handle).await {
                debug!(remote_name = %handle.name, error = %e, "Ignoring remote file cleanup failure");
            }
        }
        if let Err(e) = staged.dir.close() {
            debug!(error = %e, "Ignoring transient file cleanup failure");
        }

        match result {
            Ok(questions) => {
                if questions.len() != self.num_questions {
                    warn!(
                        generated = questions.len(),
                        expected = self.num_questions,
                        "Model generated an unexpected question count, proceeding with what was produced"
                    );
                }
                if !questions.is_empty() {
                    self.cache.store(key, questions.clone()).await;
                }
                info!(
                    question_count = questions.len(),
                    "Question generation completed"
                );
                questions
            }
            Err(e) => {
                error!(error = %e, "Question generation failed");
                Vec::new()
            }
        }
    }

    async fn upload_and_generate(
        &self,
        staged: &[(PathBuf, String)],
        difficulty_level: u8,
        remote_files: &mut Vec<RemoteFileHandle>,
    ) -> Result<Vec<String>> {
        for (path, name) in staged {
            let handle = self.model.upload_file(path, name).await?;
            remote_files.push(handle);
        }

        let file_names: Vec<String> = staged.iter().map(|(_, name)| name.clone()).collect();
        let system_instruction = prompts::generator_prompt(difficulty_level, self.num_questions);
        let prompt = prompts::generation_request_prompt(&file_names, self.num_questions);

        let raw = self
            .model
            .generate(&system_instruction, &prompt, remote_files)
            .await?;

        debug!(response_length = raw.len(), "Raw generation response received");
        Ok(parse_question_list(&raw, self.num_questions))
    }

    /// Grade one question/answer pair against the rigor level.
    ///
    /// Never fails: remote or parse errors yield the sentinel triple with
    /// `degraded` set, and the error is logged for the caller to surface.
    pub async fn evaluate_answer(
        &self,
        question: &str,
        answer: &str,
        rigor_level: u8,
    ) -> GradedAnswer {
        let system_instruction = prompts::evaluator_prompt(rigor_level);
        let prompt = prompts::evaluation_request_prompt(question, answer);

        info!(
            rigor = rigor_level,
            answer_length = answer.len(),
            provider = self.model.provider_name(),
            "Evaluating submitted answer"
        );

        let raw = match self.model.generate(&system_instruction, &prompt, &[]).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Remote evaluation request failed, returning sentinel grading");
                return GradedAnswer::sentinel();
            }
        };

        match parse_evaluation(&raw) {
            Ok(evaluation) => {
                info!(score = evaluation.score, "Answer evaluated");
                evaluation.into()
            }
            Err(e) => {
                error!(
                    error = %e,
                    response_length = raw.len(),
                    "Evaluator response did not match the expected format, returning sentinel grading"
                );
                GradedAnswer::sentinel()
            }
        }
    }
}

/// Uploads written out as transient local files, removed when `dir` goes
/// away.
pub(crate) struct StagedFiles {
    pub dir: TempDir,
    pub paths: Vec<(PathBuf, String)>,
}

/// Persist each upload into a fresh temporary directory, keeping only the
/// final path component of the submitted name.
pub(crate) fn stage_transient_files(files: &[StudyFile]) -> Result<StagedFiles> {
    let dir = TempDir::new()?;
    let mut paths = Vec::with_capacity(files.len());

    for file in files {
        let safe_name = Path::new(&file.name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        let path = dir.path().join(&safe_name);
        std::fs::write(&path, &file.content)?;
        paths.push((path, safe_name));
    }

    Ok(StagedFiles { dir, paths })
}
