//! Prompt assembly for the generation call.
//!
//! A payload is one `system` message (operating instructions plus the
//! retrieved context) followed by one `user` message carrying the query
//! verbatim.

use serde::Serialize;

use crate::models::SimilarityResult;

/// Operating instructions used when `[generation] system_prompt` is unset.
pub const DEFAULT_INSTRUCTIONS: &str = "You are an assistant for HR recruiters and hiring managers. \
You receive a user query asking for a job posting for a new hire. \
Use the given context to include company-specific information such as pay range and employee benefits. \
Consider all of the input before responding, especially recruiter information, application deadline, \
company name, location, salary, hiring bonus and other benefits.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptPayload {
    pub messages: Vec<PromptMessage>,
}

/// Build the role-tagged payload for one query.
///
/// Chunk texts are appended to the instructions in the order given (the
/// retriever's descending-score order), separated by blank lines. With no
/// chunks the system message carries the instructions alone.
pub fn assemble(
    system_instructions: &str,
    context_chunks: &[SimilarityResult],
    user_query: &str,
) -> PromptPayload {
    let mut system = system_instructions.to_string();
    if !context_chunks.is_empty() {
        let context = context_chunks
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        system.push_str("\n\ncontext:\n");
        system.push_str(&context);
    }

    PromptPayload {
        messages: vec![
            PromptMessage {
                role: Role::System,
                content: system,
            },
            PromptMessage {
                role: Role::User,
                content: user_query.to_string(),
            },
        ],
    }
}
