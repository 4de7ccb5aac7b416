//! Prompt shaping and response scoring for the estimation service.
//!
//! Both helpers are pure functions of their input.

use serde::{Deserialize, Serialize};

use crate::pricing::PricingContext;

/// Prompts longer than this many characters are cut before the suffix is added.
pub const MAX_PROMPT_CHARS: usize = 4000;

/// Appended to a prompt that had to be cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Appended to every optimised prompt.
pub const INSTRUCTION_SUFFIX: &str = "\n\nRespond with clear headings and bullet points, \
     and give concrete quantities and prices in SAR wherever possible.";

/// Build the prompt actually sent to the estimation service.
///
/// The serialised `context` (if any) goes first, the combined text is cut to
/// [`MAX_PROMPT_CHARS`] characters with [`TRUNCATION_MARKER`] appended, and
/// [`INSTRUCTION_SUFFIX`] always comes last.
pub fn optimize_prompt(prompt: &str, context: Option<&PricingContext>) -> String {
    let mut body = match context.and_then(|c| serde_json::to_string(c).ok()) {
        Some(json) => format!("Context: {json}\n\n{prompt}"),
        None => prompt.to_string(),
    };

    if let Some((cut, _)) = body.char_indices().nth(MAX_PROMPT_CHARS) {
        body.truncate(cut);
        body.push_str(TRUNCATION_MARKER);
    }

    body.push_str(INSTRUCTION_SUFFIX);
    body
}

/// Heuristic quality scores for a service response, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseScore {
    pub quality: f64,
    pub completeness: f64,
    pub relevance: f64,
}

/// Score a response by length, structure and the presence of figures.
///
/// - `quality = min(100, len / 100 * (1.2 if structured else 1))`
/// - `completeness = min(100, len / 50)`
/// - `relevance = 90` if the text contains a digit, else `70`
///
/// `len` counts characters. Text is structured when any line starts with a
/// markdown heading or a bullet/numbered list marker.
pub fn score_response(text: &str) -> ResponseScore {
    let len = text.chars().count() as f64;
    let structure_bonus = if has_structure(text) { 1.2 } else { 1.0 };

    ResponseScore {
        quality: (len / 100.0 * structure_bonus).min(100.0),
        completeness: (len / 50.0).min(100.0),
        relevance: if text.chars().any(is_digit) { 90.0 } else { 70.0 },
    }
}

fn has_structure(text: &str) -> bool {
    text.lines().map(str::trim_start).any(|line| {
        line.starts_with('#')
            || line.starts_with("- ")
            || line.starts_with("* ")
            || line.starts_with("• ")
            || is_numbered_item(line)
    })
}

fn is_numbered_item(line: &str) -> bool {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    rest.len() < line.len() && (rest.starts_with(". ") || rest.starts_with(") "))
}

/// ASCII and Arabic-Indic digits.
fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || ('\u{0660}'..='\u{0669}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_prompt_is_kept_whole() {
        let out = optimize_prompt("estimate a villa", None);
        assert_eq!(out, format!("estimate a villa{INSTRUCTION_SUFFIX}"));
    }

    #[test]
    fn context_is_prepended() {
        let out = optimize_prompt("estimate a villa", Some(&PricingContext::default()));
        assert!(out.starts_with("Context: {"));
        assert!(out.contains("\"region\":\"riyadh\""));
        assert!(out.contains("\n\nestimate a villa"));
        assert!(out.ends_with(INSTRUCTION_SUFFIX));
    }

    #[test]
    fn long_prompt_is_truncated_before_suffix() {
        let prompt = "x".repeat(MAX_PROMPT_CHARS + 500);
        let out = optimize_prompt(&prompt, None);
        let body = out.strip_suffix(INSTRUCTION_SUFFIX).unwrap();
        assert_eq!(body.chars().count(), MAX_PROMPT_CHARS + TRUNCATION_MARKER.len());
        assert!(body.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn prompt_at_limit_is_not_truncated() {
        let prompt = "y".repeat(MAX_PROMPT_CHARS);
        let out = optimize_prompt(&prompt, None);
        assert!(!out.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        // Arabic letters are two bytes each in UTF-8.
        let prompt = "ب".repeat(MAX_PROMPT_CHARS + 1);
        let out = optimize_prompt(&prompt, None);
        let body = out.strip_suffix(INSTRUCTION_SUFFIX).unwrap();
        assert_eq!(body.chars().filter(|c| *c == 'ب').count(), MAX_PROMPT_CHARS);
    }

    #[test]
    fn plain_text_scores() {
        let text = "a".repeat(500);
        let score = score_response(&text);
        assert!((score.quality - 5.0).abs() < 1e-9);
        assert!((score.completeness - 10.0).abs() < 1e-9);
        assert_eq!(score.relevance, 70.0);
    }

    #[test]
    fn structured_text_gets_quality_bonus() {
        let text = format!("# Estimate\n- concrete: 120 m3\n{}", "b".repeat(975));
        let len = text.chars().count() as f64;
        let score = score_response(&text);
        assert!((score.quality - len / 100.0 * 1.2).abs() < 1e-9);
        assert_eq!(score.relevance, 90.0);
    }

    #[test]
    fn scores_are_capped() {
        let text = "z".repeat(20_000);
        let score = score_response(&text);
        assert_eq!(score.quality, 100.0);
        assert_eq!(score.completeness, 100.0);
    }

    #[test]
    fn numbered_lists_count_as_structure() {
        assert!(has_structure("intro\n  12. first item"));
        assert!(has_structure("1) first"));
        assert!(!has_structure("2024 was a good year"));
    }

    #[test]
    fn arabic_indic_digits_count() {
        assert_eq!(score_response("السعر ١٥٠ ريال").relevance, 90.0);
    }
}
