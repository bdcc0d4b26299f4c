//! Lexical language guesser for steering generated content into the user's
//! apparent language. A heuristic, not a classifier — short or mixed-language
//! samples default to English.

use crate::sanitize::truncate_chars;

/// How many characters of the sample are inspected.
const SAMPLE_PREFIX_CHARS: usize = 500;

/// Score bonus when any of a language's diagnostic diacritics appear.
const DIACRITIC_BONUS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Spanish,
    Portuguese,
    French,
    German,
}

impl Language {
    /// Display name used inside prompts ("respond in Spanish").
    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
            Language::Portuguese => "Portuguese",
            Language::French => "French",
            Language::German => "German",
        }
    }
}

struct Candidate {
    language: Language,
    stopwords: &'static [&'static str],
    diacritics: &'static str,
}

// Candidate order is the tie-break order: among equal top scores the
// first-listed language wins.
const CANDIDATES: [Candidate; 4] = [
    Candidate {
        language: Language::Spanish,
        stopwords: &[
            "que", "los", "las", "del", "una", "con", "por", "para", "como", "más", "esta",
            "pero", "sobre", "entre", "cuando", "también", "puede", "tiene", "desde", "todo",
            "según", "donde", "después", "porque", "cada", "hacer", "sin", "ser", "este", "así",
        ],
        diacritics: "áéíóúñ¿¡",
    },
    Candidate {
        language: Language::Portuguese,
        stopwords: &[
            "não", "uma", "com", "são", "mais", "para", "como", "está", "pode", "isso", "pelo",
            "muito", "também", "onde", "quando", "ainda", "então", "sobre", "depois",
        ],
        diacritics: "ãõç",
    },
    Candidate {
        language: Language::French,
        stopwords: &[
            "les", "des", "une", "que", "dans", "pour", "avec", "sur", "sont", "pas", "plus",
            "mais", "comme", "cette", "tout", "être", "fait", "aussi", "nous", "même",
        ],
        diacritics: "àâêëîïôùûüÿçœæ",
    },
    Candidate {
        language: Language::German,
        stopwords: &[
            "und", "die", "der", "das", "ist", "ein", "eine", "mit", "auf", "für", "nicht",
            "auch", "sich", "von", "sind", "werden", "hat", "wird", "dass", "oder",
        ],
        diacritics: "äöüß",
    },
];

/// Guess the natural language of `text`.
///
/// Samples the lowercased first 500 characters, counts whitespace-separated
/// tokens that belong to each candidate's stopword list, and adds a fixed
/// bonus when the candidate's diagnostic diacritics appear anywhere in the
/// sample. Inputs shorter than `min_chars`, or samples where no candidate
/// reaches `min_score`, resolve to English. Thresholds vary by call site:
/// free-form user messages use (10, 2), course material samples (20, 3).
pub fn detect_language(text: &str, min_chars: usize, min_score: u32) -> Language {
    if text.chars().count() < min_chars {
        return Language::English;
    }

    let sample = truncate_chars(text, SAMPLE_PREFIX_CHARS).to_lowercase();

    let mut best = Language::English;
    let mut best_score = 0u32;
    for candidate in &CANDIDATES {
        let mut score = sample
            .split_whitespace()
            .filter(|token| candidate.stopwords.contains(token))
            .count() as u32;
        if sample.chars().any(|c| candidate.diacritics.contains(c)) {
            score += DIACRITIC_BONUS;
        }
        // Strict comparison keeps the first-listed candidate on ties.
        if score > best_score {
            best = candidate.language;
            best_score = score;
        }
    }

    if best_score >= min_score { best } else { Language::English }
}

#[cfg(test)]
mod tests {
    use super::{Language, detect_language};

    #[test]
    fn spanish_sample_with_diacritics_resolves_to_spanish() {
        let text = "¿Qué es la mitocondria? Es una parte de la célula que produce energía";
        assert_eq!(detect_language(text, 20, 3), Language::Spanish);
    }

    #[test]
    fn short_input_defaults_to_english() {
        assert_eq!(detect_language("hola", 10, 2), Language::English);
        assert_eq!(detect_language("", 10, 2), Language::English);
    }

    #[test]
    fn plain_english_text_stays_english() {
        let text = "The mitochondria is the powerhouse of the cell and produces energy";
        assert_eq!(detect_language(text, 20, 3), Language::English);
    }

    #[test]
    fn german_stopwords_and_umlauts_resolve_to_german() {
        let text = "und die der das ist für die Schüler nicht einfach";
        assert_eq!(detect_language(text, 20, 3), Language::German);
    }

    #[test]
    fn ties_resolve_to_first_listed_candidate() {
        // "para", "como" and "sobre" sit in both the Spanish and Portuguese
        // stopword lists; Spanish is listed first.
        let text = "para como sobre para como sobre";
        assert_eq!(detect_language(text, 10, 2), Language::Spanish);
    }

    #[test]
    fn scores_below_threshold_default_to_english() {
        // One stopword hit, no diacritics: score 1 < 3.
        let text = "the report covers les results in detail today";
        assert_eq!(detect_language(text, 20, 3), Language::English);
    }
}
