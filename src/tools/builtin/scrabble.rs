use crate::tools::traits::{Tool, ToolFuture};
use crate::tools::types::{ParamType, ParameterSchema};
use serde_json::{Map, Value, json};

/// Words longer than this earn one bonus point per extra character.
const BONUS_LENGTH_THRESHOLD: usize = 9;

/// Scores a candidate word with standard Scrabble tile values.
pub struct ScrabbleScoreTool;

impl ScrabbleScoreTool {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for ScrabbleScoreTool {
    fn default() -> Self {
        Self::new()
    }
}

fn letter_value(letter: char) -> u32 {
    match letter.to_ascii_uppercase() {
        'A' | 'E' | 'I' | 'L' | 'N' | 'O' | 'R' | 'S' | 'T' | 'U' => 1,
        'D' | 'G' => 2,
        'B' | 'C' | 'M' | 'P' => 3,
        'F' | 'H' | 'V' | 'W' | 'Y' => 4,
        'K' => 5,
        'J' | 'X' => 8,
        'Q' | 'Z' => 10,
        _ => 0,
    }
}

/// Minimum score for `word`. Any non-ASCII character makes the whole word
/// score 0; other non-letters score nothing.
pub fn min_word_score(word: &str) -> u32 {
    if !word.is_ascii() {
        return 0;
    }
    let base: u32 = word.chars().map(letter_value).sum();
    let bonus = word.len().saturating_sub(BONUS_LENGTH_THRESHOLD);
    base + u32::try_from(bonus).unwrap_or(u32::MAX)
}

impl Tool for ScrabbleScoreTool {
    fn name(&self) -> &str {
        "get_min_scrabble_word_score"
    }

    fn description(&self) -> &str {
        "Calculates the minimum Scrabble score for a word from standard letter values, \
         with one bonus point for each character beyond nine."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().required("candidate", ParamType::String, "The word to score")
    }

    fn execute<'a>(&'a self, args: &'a Map<String, Value>) -> ToolFuture<'a> {
        Box::pin(async move {
            let candidate = args
                .get("candidate")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("Missing 'candidate' parameter"))?;
            Ok(json!(min_word_score(candidate)))
        })
    }
}
