//! Canned request payloads (`fn-*.json`) used to seed exchanges.
//!
//! A payload is a Gemini `generateContent` body. Its first user text becomes
//! the prompt; its system instruction and generation config become request
//! options. Declared tools are informational only: the registry decides what
//! the model is offered.

pub mod placeholders;

pub use placeholders::{DEFAULT_REPLACEMENTS, fill_placeholders};

use crate::error::ScenarioError;
use crate::llm::types::{GenerationConfig, RequestOptions};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "fn-";
const FILE_SUFFIX: &str = ".json";

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub path: PathBuf,
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub generation_config: Option<GenerationConfig>,
    /// Function names the payload declares, in order.
    pub declared_tools: Vec<String>,
}

impl Scenario {
    /// Extract a scenario from an already placeholder-filled payload.
    pub fn from_payload(path: &Path, payload: &Value) -> Result<Self, ScenarioError> {
        let invalid = |message: &str| ScenarioError::Invalid {
            path: path.display().to_string(),
            message: message.to_string(),
        };

        let prompt = payload
            .get("contents")
            .and_then(Value::as_array)
            .and_then(|contents| {
                contents
                    .iter()
                    .find(|content| content.get("role").and_then(Value::as_str) != Some("model"))
            })
            .and_then(first_text)
            .ok_or_else(|| invalid("no user text in contents"))?;

        let system_instruction = field(payload, "systemInstruction", "system_instruction")
            .and_then(first_text);

        let generation_config = match field(payload, "generationConfig", "generation_config") {
            None | Some(Value::Null) => None,
            Some(Value::Object(config)) => Some(config.clone()),
            Some(_) => return Err(invalid("generation config is not an object")),
        };

        let declared_tools = payload
            .get("tools")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|tool| field(tool, "functionDeclarations", "function_declarations"))
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(|declaration| declaration.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            prompt,
            system_instruction,
            generation_config,
            declared_tools,
        })
    }

    /// Request options from the payload, falling back to `defaults` for
    /// anything it does not set.
    pub fn request_options(&self, defaults: &RequestOptions) -> RequestOptions {
        RequestOptions {
            system_instruction: self
                .system_instruction
                .clone()
                .or_else(|| defaults.system_instruction.clone()),
            generation_config: self
                .generation_config
                .clone()
                .or_else(|| defaults.generation_config.clone()),
        }
    }
}

/// Gemini accepts both camelCase and snake_case field names.
fn field<'a>(value: &'a Value, camel: &str, snake: &str) -> Option<&'a Value> {
    value.get(camel).or_else(|| value.get(snake))
}

fn first_text(content: &Value) -> Option<String> {
    content
        .get("parts")?
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::to_string)
}

/// Scenario files in `dir`, sorted by name.
pub fn find_scenarios(dir: &Path) -> Result<Vec<PathBuf>, ScenarioError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Pick one scenario at random, optionally restricted to file names
/// containing `filter`.
pub fn select_scenario<R: Rng + ?Sized>(
    dir: &Path,
    filter: Option<&str>,
    rng: &mut R,
) -> Result<PathBuf, ScenarioError> {
    let files = find_scenarios(dir)?;
    let candidates: Vec<PathBuf> = match filter {
        Some(filter) => files
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.contains(filter))
            })
            .collect(),
        None => files,
    };

    candidates
        .choose(rng)
        .cloned()
        .ok_or_else(|| ScenarioError::NotFound {
            dir: dir.display().to_string(),
            pattern: match filter {
                Some(filter) => format!("{FILE_PREFIX}*{filter}*{FILE_SUFFIX}"),
                None => format!("{FILE_PREFIX}*{FILE_SUFFIX}"),
            },
        })
}

/// Read a payload, fill its placeholders and extract the scenario.
pub fn load_scenario<R: Rng + ?Sized>(path: &Path, rng: &mut R) -> Result<Scenario, ScenarioError> {
    let raw = fs::read_to_string(path)?;
    let filled = fill_placeholders(&raw, DEFAULT_REPLACEMENTS, rng);
    let payload: Value = serde_json::from_str(&filled).map_err(|e| ScenarioError::Invalid {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let scenario = Scenario::from_payload(path, &payload)?;
    tracing::info!(path = %path.display(), tools = scenario.declared_tools.len(), "Loaded scenario");
    Ok(scenario)
}
