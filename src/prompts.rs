//! Prompt templates for the question generator and the answer evaluator.
//!
//! Both builders are pure functions of a single 0-10 scalar. The evaluator
//! additionally encodes a per-error point deduction that grows linearly with
//! the rigor level.

/// Per-error point deduction for a given rigor level.
pub fn deduction_per_error(rigor_level: u8) -> f64 {
    0.05 + (rigor_level as f64 / 10.0) * 0.15
}

/// Difficulty description bucket: 0-3 easy, 4-7 moderate, 8-10 advanced.
pub fn difficulty_description(difficulty_level: u8) -> &'static str {
    if difficulty_level <= 3 {
        "perguntas FÁCEIS e diretas."
    } else if difficulty_level <= 7 {
        "perguntas de dificuldade MODERADA e específicas."
    } else {
        "perguntas AVANÇADAS, específicas e que exijam análise crítica."
    }
}

/// Content strictness description: lenient up to 5, strict above.
pub fn rigor_description(rigor_level: u8) -> &'static str {
    if rigor_level <= 5 {
        "um critério de correção focado na ideia principal e menos rigoroso no conteúdo."
    } else {
        "um critério de correção rigoroso, exigindo precisão total no conteúdo."
    }
}

/// System instruction for the question generator, parameterized by the
/// difficulty slider and the number of questions requested.
pub fn generator_prompt(difficulty_level: u8, num_questions: usize) -> String {
    format!(
        r#"Você é um gerador de questões de prova. Sua função é ler o conteúdo de estudo fornecido e criar **EXATAMENTE {num_questions} questões abertas** baseadas no material. Crie {difficulty}
É obrigatório que sua saída seja APENAS e ESTREITAMENTE uma lista JSON de strings. NÃO inclua nenhum texto introdutório, cabeçalho, explicação, ou formatação de código Markdown.
Formato Exigido: ["Questão 1 aqui.", "Questão 2 aqui.", ..., "Questão {num_questions} aqui."]"#,
        difficulty = difficulty_description(difficulty_level),
    )
}

/// System instruction for the answer evaluator, parameterized by the rigor
/// slider. Demands the three fixed output markers the parser relies on.
pub fn evaluator_prompt(rigor_level: u8) -> String {
    format!(
        r#"Você é o Avaliador Crítico de Prova. Sua única função é receber uma resposta digitada e, com base em critérios de precisão, profundidade e coerência com o material de estudo:
1. Fazer uma crítica breve e objetiva (máximo 3 frases) sobre a resposta.
2. Corrigir erros de Português e ortografia na resposta digitada. Para cada erro encontrado, retire **{deduction:.2} ponto** da nota final.
3. Atribuir uma nota final estrita de 0 a 10, considerando a profundidade do conteúdo E a dedução dos erros de escrita. Utilize {rigor}
4. Gerar uma resposta sucinta, mas completa, que seria a resposta esperada para a pergunta.
5. Formatar sua saída APENAS da seguinte maneira:
   CRITICA: [Sua crítica aqui, incluindo menção explícita aos erros de escrita e à dedução.]
   NOTA: [A nota numérica final atribuída após todas as deduções]
   RESPOSTA_ESPERADA: [A resposta completa e sucinta]"#,
        deduction = deduction_per_error(rigor_level),
        rigor = rigor_description(rigor_level),
    )
}

/// User-facing prompt sent alongside the uploaded file handles.
pub fn generation_request_prompt(file_names: &[String], num_questions: usize) -> String {
    format!(
        "Com base no conteúdo de todos estes arquivos ({}), gere **exatamente {} questões abertas**, estritamente como uma lista JSON de strings. Use apenas o conteúdo dos anexos.",
        file_names.join(", "),
        num_questions,
    )
}

/// User-facing prompt for grading one question/answer pair.
pub fn evaluation_request_prompt(question: &str, answer: &str) -> String {
    format!(
        r#"Questão: "{question}"
Resposta Digitada: "{answer}"

Avalie a resposta digitada para a questão e gere a resposta esperada."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduction_formula_across_full_range() {
        for rigor in 0..=10u8 {
            let expected = 0.05 + (rigor as f64 / 10.0) * 0.15;
            assert!(
                (deduction_per_error(rigor) - expected).abs() < 1e-9,
                "deduction mismatch at rigor {}",
                rigor
            );
        }
        assert!((deduction_per_error(0) - 0.05).abs() < 1e-9);
        assert!((deduction_per_error(10) - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_difficulty_buckets() {
        for level in 0..=3u8 {
            assert!(difficulty_description(level).contains("FÁCEIS"));
        }
        for level in 4..=7u8 {
            assert!(difficulty_description(level).contains("MODERADA"));
        }
        for level in 8..=10u8 {
            assert!(difficulty_description(level).contains("AVANÇADAS"));
        }
    }

    #[test]
    fn test_rigor_flips_exactly_after_five() {
        for level in 0..=5u8 {
            assert!(rigor_description(level).contains("menos rigoroso"));
        }
        for level in 6..=10u8 {
            assert!(rigor_description(level).contains("precisão total"));
        }
    }

    #[test]
    fn test_generator_prompt_requests_exact_question_count() {
        for difficulty in 0..=10u8 {
            let prompt = generator_prompt(difficulty, 10);
            assert!(prompt.contains("EXATAMENTE 10 questões abertas"));
            assert!(prompt.contains(difficulty_description(difficulty)));
        }
        let prompt = generator_prompt(5, 7);
        assert!(prompt.contains("EXATAMENTE 7 questões abertas"));
    }

    #[test]
    fn test_evaluator_prompt_carries_markers_and_deduction() {
        let prompt = evaluator_prompt(10);
        assert!(prompt.contains("CRITICA:"));
        assert!(prompt.contains("NOTA:"));
        assert!(prompt.contains("RESPOSTA_ESPERADA:"));
        assert!(prompt.contains("0.20 ponto"));

        let prompt = evaluator_prompt(0);
        assert!(prompt.contains("0.05 ponto"));
    }

    #[test]
    fn test_generation_request_lists_file_names() {
        let names = vec!["notes.pdf".to_string(), "slides.pptx".to_string()];
        let prompt = generation_request_prompt(&names, 10);
        assert!(prompt.contains("notes.pdf, slides.pptx"));
        assert!(prompt.contains("exatamente 10 questões"));
    }
}
