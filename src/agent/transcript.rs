use crate::llm::types::{ContentPart, Role, Turn};
use serde::Serialize;
use thiserror::Error;

/// Why a turn was refused by [`ConversationTranscript::append`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("{role} turn cannot carry a {kind} part")]
    PartNotAllowed { role: Role, kind: &'static str },

    #[error("{next} turn cannot follow {}", describe_previous(.previous))]
    OutOfOrder { previous: Option<Role>, next: Role },

    #[error("tool turn answers {got} calls, model requested {expected}")]
    UnansweredCalls { expected: usize, got: usize },

    #[error("response #{index} is for {got}, call was {expected}")]
    MismatchedResponse {
        index: usize,
        expected: String,
        got: String,
    },
}

fn describe_previous(previous: &Option<Role>) -> String {
    previous.map_or_else(|| "an empty transcript".to_string(), |r| format!("a {r} turn"))
}

/// Ordered, append-only record of one exchange.
///
/// Appends are checked so the history always reads
/// user → model → [tool → model]* and every function call in a model turn is
/// answered, in order, by the tool turn that follows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationTranscript {
    turns: Vec<Turn>,
}

impl ConversationTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript seeded with the user's prompt.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(prompt)],
        }
    }

    pub fn append(&mut self, turn: Turn) -> Result<(), TranscriptError> {
        if let Some(part) = turn.parts.iter().find(|part| !turn.role.accepts(part)) {
            return Err(TranscriptError::PartNotAllowed {
                role: turn.role,
                kind: part.kind(),
            });
        }

        let previous = self.turns.last();
        let in_order = match (previous.map(|t| (t.role, t.has_function_calls())), turn.role) {
            (None | Some((Role::Model, false)), Role::User)
            | (Some((Role::User | Role::Tool, _)), Role::Model)
            | (Some((Role::Model, true)), Role::Tool) => true,
            _ => false,
        };
        if !in_order {
            return Err(TranscriptError::OutOfOrder {
                previous: previous.map(|t| t.role),
                next: turn.role,
            });
        }

        if turn.role == Role::Tool
            && let Some(model_turn) = previous
        {
            Self::check_answers(model_turn, &turn)?;
        }

        self.turns.push(turn);
        Ok(())
    }

    fn check_answers(model_turn: &Turn, tool_turn: &Turn) -> Result<(), TranscriptError> {
        let calls: Vec<&ContentPart> = model_turn.function_calls().collect();
        if calls.len() != tool_turn.parts.len() {
            return Err(TranscriptError::UnansweredCalls {
                expected: calls.len(),
                got: tool_turn.parts.len(),
            });
        }

        for (index, (call, response)) in calls.iter().zip(&tool_turn.parts).enumerate() {
            let (
                ContentPart::FunctionCall {
                    name: call_name,
                    id: call_id,
                    ..
                },
                ContentPart::FunctionResponse {
                    name: response_name,
                    id: response_id,
                    ..
                },
            ) = (call, response)
            else {
                continue;
            };

            let id_mismatch = call_id.is_some() && call_id != response_id;
            if call_name != response_name || id_mismatch {
                return Err(TranscriptError::MismatchedResponse {
                    index,
                    expected: call_name.clone(),
                    got: response_name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }

    pub fn model_turn_count(&self) -> usize {
        self.count_role(Role::Model)
    }
}
