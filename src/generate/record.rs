//! Completion outcomes and the JSONL row shape.

use serde::{Deserialize, Serialize};

use crate::gateway::{ChatResponse, Message, ProviderError, TokenUsage};

/// Successful completion payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub reasoning: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Terminal result of one prompt. Provider errors are folded into `Failure`
/// so they never leave the task.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Success(Completion),
    Failure { message: String },
}

impl From<Result<ChatResponse, ProviderError>> for CompletionOutcome {
    fn from(result: Result<ChatResponse, ProviderError>) -> Self {
        match result {
            Ok(resp) => CompletionOutcome::Success(Completion {
                content: resp.content,
                reasoning: resp.reasoning,
                usage: resp.usage,
            }),
            Err(err) => {
                let message = match err.request_id() {
                    Some(id) => format!("{}: {err} (request {id})", err.code()),
                    None => format!("{}: {err}", err.code()),
                };
                CompletionOutcome::Failure { message }
            }
        }
    }
}

/// Wrap reasoning ahead of the answer: `<think>\n{reasoning}\n</think>\n\n{answer}`.
pub fn assistant_content(content: &str, reasoning: Option<&str>) -> String {
    match reasoning.filter(|r| !r.is_empty()) {
        Some(reasoning) => format!("<think>\n{reasoning}\n</think>\n\n{content}"),
        None => content.to_string(),
    }
}

/// One dataset row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub messages: Vec<Message>,
}

impl OutputRecord {
    /// `system` is written only when `store_system` is set and it is non-blank.
    pub fn build(
        system: Option<&str>,
        store_system: bool,
        prompt: &str,
        completion: &Completion,
    ) -> Self {
        let mut messages = Vec::with_capacity(3);
        if store_system {
            if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
                messages.push(Message::system(system));
            }
        }
        messages.push(Message::user(prompt));
        messages.push(Message::assistant(assistant_content(
            &completion.content,
            completion.reasoning.as_deref(),
        )));
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ErrorContext, Role};

    fn completion(reasoning: Option<&str>) -> Completion {
        Completion {
            content: "42".into(),
            reasoning: reasoning.map(String::from),
            usage: None,
        }
    }

    #[test]
    fn system_message_requires_store_flag() {
        let c = completion(None);
        let rec = OutputRecord::build(Some("be terse"), false, "q", &c);
        let roles: Vec<Role> = rec.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);

        let rec = OutputRecord::build(Some("be terse"), true, "q", &c);
        assert_eq!(rec.messages[0], Message::system("be terse"));
        assert_eq!(rec.messages.len(), 3);

        let rec = OutputRecord::build(Some(""), true, "q", &c);
        assert_eq!(rec.messages.len(), 2);
    }

    #[test]
    fn reasoning_is_prefixed_in_a_think_block() {
        let rec = OutputRecord::build(None, false, "q", &completion(Some("let me see")));
        assert_eq!(
            rec.messages[1].content,
            "<think>\nlet me see\n</think>\n\n42"
        );

        let rec = OutputRecord::build(None, false, "q", &completion(Some("")));
        assert_eq!(rec.messages[1].content, "42");
    }

    #[test]
    fn whitespace_reasoning_is_kept_verbatim() {
        let rec = OutputRecord::build(None, false, "q", &completion(Some("  ")));
        assert_eq!(rec.messages[1].content, "<think>\n  \n</think>\n\n42");

        let rec = OutputRecord::build(None, false, "q", &completion(Some("\nstep one\n")));
        assert_eq!(
            rec.messages[1].content,
            "<think>\n\nstep one\n\n</think>\n\n42"
        );
    }

    #[test]
    fn serializes_to_messages_object() {
        let rec = OutputRecord::build(None, false, "hi", &completion(None));
        let line = serde_json::to_string(&rec).unwrap();
        assert_eq!(
            line,
            r#"{"messages":[{"role":"user","content":"hi"},{"role":"assistant","content":"42"}]}"#
        );
    }

    #[test]
    fn provider_error_becomes_failure_message() {
        let err = ProviderError::empty_content(ErrorContext::new().with_request_id("r1"));
        let outcome = CompletionOutcome::from(Err(err));
        assert_eq!(
            outcome,
            CompletionOutcome::Failure {
                message: "empty_content: empty completion content (request r1)".into()
            }
        );
    }
}
