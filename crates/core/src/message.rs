//! Message domain types.
//!
//! A [`Message`] is one turn exchanged with a model. Rendering a section
//! tree in message mode produces an ordered `Vec<Message>`.

use serde::{Deserialize, Serialize};

/// Well-known role tags. Roles are open strings, so anything else is allowed.
pub mod role {
    pub const SYSTEM: &str = "system";
    pub const USER: &str = "user";
    pub const ASSISTANT: &str = "assistant";
    pub const FUNCTION: &str = "function";
}

/// A message sent to or received from a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message (`system`, `user`, `assistant`, `function`, ...)
    pub role: String,

    /// The text content. Absent for function-call-only messages.
    #[serde(default)]
    pub content: Option<String>,

    /// A function the assistant asked to call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,

    /// Name of the function whose result this message carries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Create a message with the given role and content.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            function_call: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(role::SYSTEM, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(role::USER, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(role::ASSISTANT, content)
    }

    /// Create a function result message.
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(role::FUNCTION, content)
        }
    }

    /// Create an assistant message that only carries a function call.
    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            role: role::ASSISTANT.into(),
            content: None,
            function_call: Some(call),
            name: None,
        }
    }

    /// The text used when counting tokens or flattening to text.
    ///
    /// - function calls render as their JSON form
    /// - named function results render as `"{name} returned {content}"`
    /// - everything else renders its content, or nothing
    pub fn text(&self) -> String {
        let content = self.content.as_deref().unwrap_or_default();
        if let Some(call) = &self.function_call {
            return serde_json::to_string(call).unwrap_or_default();
        }
        match &self.name {
            Some(name) => format!("{name} returned {content}"),
            None => content.to_string(),
        }
    }
}

/// A named function to call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function to call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Arguments as a JSON string (not yet deserialized)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            arguments: Some(arguments.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_assistant_message() {
        let msg = Message::assistant("Hello World");
        assert_eq!(msg.role, "assistant");
        assert_eq!(msg.content.as_deref(), Some("Hello World"));
        assert!(msg.function_call.is_none());
        assert_eq!(msg.text(), "Hello World");
    }

    #[test]
    fn function_result_text_names_the_function() {
        let msg = Message::function("lookup", "42");
        assert_eq!(msg.role, role::FUNCTION);
        assert_eq!(msg.text(), "lookup returned 42");
    }

    #[test]
    fn function_call_text_is_json() {
        let msg = Message::function_call(FunctionCall::new("lookup", "{\"id\":1}"));
        assert!(msg.content.is_none());
        assert_eq!(
            msg.text(),
            r#"{"name":"lookup","arguments":"{\"id\":1}"}"#
        );
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);

        let parsed: Message = serde_json::from_str(r#"{"role":"tool"}"#).unwrap();
        assert_eq!(parsed.role, "tool");
        assert!(parsed.content.is_none());
    }
}
