//! Finished-session reporting and the tabular export artifact.
//!
//! The summary table carries the four mandated columns (question label,
//! score, submitted answer, critique); the artifact is built entirely in
//! memory before being offered as a download.

use anyhow::Result;
use serde::Serialize;

use crate::models::AnswerRecord;
use crate::session::ExamSession;

/// JSON report for a finished session.
#[derive(Debug, Clone, Serialize)]
pub struct ExamReport {
    pub total_questions: usize,
    pub average_score: f64,
    /// Formatted as `"{:.2}/10"`, e.g. `"8.00/10"`.
    pub average_display: String,
    pub records: Vec<AnswerRecord>,
}

/// One row of the exported summary table.
#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    #[serde(rename = "Questão")]
    question_label: String,
    #[serde(rename = "Nota")]
    score: f64,
    #[serde(rename = "Resposta_Aluno")]
    answer: &'a str,
    #[serde(rename = "Critica_Avaliador")]
    critique: &'a str,
}

pub fn format_average(average: f64) -> String {
    format!("{:.2}/10", average)
}

/// Build the final report. Only available once the session is finished.
pub fn build_report(session: &ExamSession) -> Option<ExamReport> {
    if !session.is_finished() {
        return None;
    }
    let average = session.average_score()?;
    Some(ExamReport {
        total_questions: session.total_questions(),
        average_score: average,
        average_display: format_average(average),
        records: session.records().to_vec(),
    })
}

/// Serialize the result list into an in-memory CSV artifact with one row per
/// answered question.
pub fn summary_csv(records: &[AnswerRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for (index, record) in records.iter().enumerate() {
        writer.serialize(SummaryRow {
            question_label: format!("Q{}", index + 1),
            score: record.score,
            answer: &record.answer,
            critique: &record.critique,
        })?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to finalize CSV artifact: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(score: f64) -> AnswerRecord {
        AnswerRecord {
            question: "Explique a fotossíntese.".to_string(),
            answer: "A planta converte luz em energia.".to_string(),
            critique: "Correto, mas superficial.".to_string(),
            expected_answer: "Conversão de luz em energia química.".to_string(),
            score,
        }
    }

    #[test]
    fn test_average_display_formatting() {
        assert_eq!(format_average(8.0), "8.00/10");
        assert_eq!(format_average(7.125), "7.13/10");
        assert_eq!(format_average(0.0), "0.00/10");
    }

    #[test]
    fn test_report_only_for_finished_sessions() {
        let mut session = ExamSession::new();
        assert!(build_report(&session).is_none());

        session
            .begin(vec!["Q1?".to_string(), "Q2?".to_string()])
            .unwrap();
        assert!(build_report(&session).is_none());

        session.record_answer(record(8.0)).unwrap();
        session.record_answer(record(8.0)).unwrap();

        let report = build_report(&session).unwrap();
        assert_eq!(report.total_questions, 2);
        assert_eq!(report.average_display, "8.00/10");
        assert_eq!(report.records.len(), 2);
    }

    #[test]
    fn test_csv_has_mandated_columns_and_one_row_per_record() {
        let records: Vec<AnswerRecord> = (0..10).map(|_| record(8.0)).collect();
        let bytes = summary_csv(&records).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Questão,Nota,Resposta_Aluno,Critica_Avaliador"
        );
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 10);
        assert!(rows[0].starts_with("Q1,8.0,"));
        assert!(rows[9].starts_with("Q10,8.0,"));
    }

    #[test]
    fn test_csv_escapes_fields_with_commas() {
        let mut r = record(5.5);
        r.critique = "Boa ideia, mas faltou precisão.".to_string();
        let text = String::from_utf8(summary_csv(&[r]).unwrap()).unwrap();
        assert!(text.contains("\"Boa ideia, mas faltou precisão.\""));
    }
}
