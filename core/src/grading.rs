use crate::lang::Language;

/// Letter grade for a 0.0–1.0 score. Thresholds form a fixed monotonic table.
pub fn grade_for_score(score: f64) -> &'static str {
    if score >= 0.97 {
        "A+"
    } else if score >= 0.93 {
        "A"
    } else if score >= 0.90 {
        "A-"
    } else if score >= 0.87 {
        "B+"
    } else if score >= 0.83 {
        "B"
    } else if score >= 0.80 {
        "B-"
    } else if score >= 0.77 {
        "C+"
    } else if score >= 0.73 {
        "C"
    } else if score >= 0.70 {
        "C-"
    } else if score >= 0.67 {
        "D+"
    } else if score >= 0.60 {
        "D"
    } else {
        "F"
    }
}

/// Motivational line for a quiz result, chosen from four score bands in the
/// detected response language. Spanish and Portuguese ship localized copy;
/// every other language falls back to English.
pub fn motivation_text(language: Language, score: f64) -> &'static str {
    match language {
        Language::Spanish => {
            if score >= 0.9 {
                "¡Trabajo excepcional! Dominaste este material."
            } else if score >= 0.7 {
                "¡Muy bien! Enfocate en las áreas que fallaste para mejorar aún más."
            } else if score >= 0.5 {
                "¡Buen comienzo! Repasá los temas que fallaste e intentá de nuevo."
            } else {
                "¡Seguí estudiando! Revisá los materiales y practicá más."
            }
        }
        Language::Portuguese => {
            if score >= 0.9 {
                "Trabalho excelente! Você dominou este material."
            } else if score >= 0.7 {
                "Ótimo esforço! Foque nas áreas que errou para melhorar ainda mais."
            } else if score >= 0.5 {
                "Bom começo! Revise os tópicos e tente novamente."
            } else {
                "Continue estudando! Revise os materiais e pratique mais."
            }
        }
        _ => {
            if score >= 0.9 {
                "Outstanding work! You've mastered this material."
            } else if score >= 0.7 {
                "Great effort! Focus on the areas you missed to improve even more."
            } else if score >= 0.5 {
                "Good start! Review the missed topics and try again."
            } else {
                "Keep studying! Review the materials and practice more."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{grade_for_score, motivation_text};
    use crate::lang::Language;

    #[test]
    fn grade_table_boundaries() {
        assert_eq!(grade_for_score(1.0), "A+");
        assert_eq!(grade_for_score(0.97), "A+");
        assert_eq!(grade_for_score(0.965), "A");
        assert_eq!(grade_for_score(0.95), "A");
        assert_eq!(grade_for_score(0.90), "A-");
        assert_eq!(grade_for_score(0.80), "B-");
        assert_eq!(grade_for_score(0.70), "C-");
        assert_eq!(grade_for_score(0.60), "D");
        assert_eq!(grade_for_score(0.599), "F");
        assert_eq!(grade_for_score(0.0), "F");
    }

    #[test]
    fn motivation_bands_cover_all_scores() {
        assert!(motivation_text(Language::English, 0.95).starts_with("Outstanding"));
        assert!(motivation_text(Language::English, 0.75).starts_with("Great effort"));
        assert!(motivation_text(Language::English, 0.55).starts_with("Good start"));
        assert!(motivation_text(Language::English, 0.1).starts_with("Keep studying"));
    }

    #[test]
    fn motivation_is_localized_for_spanish_and_portuguese() {
        assert!(motivation_text(Language::Spanish, 0.95).contains("excepcional"));
        assert!(motivation_text(Language::Portuguese, 0.95).contains("excelente"));
        // French has no localized copy; English is the fallback.
        assert!(motivation_text(Language::French, 0.95).starts_with("Outstanding"));
    }
}
