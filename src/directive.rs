//! Function-call directives embedded in model output.
//!
//! The model asks for a function by writing
//!
//! ```text
//! <function_call>
//! {"name": "get_showtimes", "arguments": {"title": "Dune", "location": "Seattle"}}
//! </function_call>
//! ```
//!
//! anywhere in its reply. Only the first complete region counts.

use crate::core::error::CinechatError;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<function_call>(.*?)</function_call>").expect("directive pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Map::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.to_string(), value.into());
        self
    }

    /// Scalar argument rendered as text. Missing, null and nested values
    /// yield `None`.
    pub fn string_arg(&self, key: &str) -> Option<String> {
        match self.arguments.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Outcome of scanning one assistant message.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Call(FunctionCall),
    Absent,
    Malformed(String),
}

/// Scans `text` for the first `<function_call>` region and parses its payload.
pub fn extract(text: &str) -> Directive {
    let Some(captures) = DIRECTIVE.captures(text) else {
        return Directive::Absent;
    };
    let payload = captures.get(1).map_or("", |m| m.as_str()).trim();

    match parse_payload(payload) {
        Ok(call) => Directive::Call(call),
        Err(reason) => Directive::Malformed(reason),
    }
}

/// [`extract`] with malformed payloads surfaced as errors.
pub fn extract_function_call(text: &str) -> Result<Option<FunctionCall>, CinechatError> {
    match extract(text) {
        Directive::Call(call) => Ok(Some(call)),
        Directive::Absent => Ok(None),
        Directive::Malformed(reason) => Err(CinechatError::MalformedDirective(reason)),
    }
}

fn parse_payload(payload: &str) -> Result<FunctionCall, String> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| format!("payload is not valid JSON: {}", e))?;

    let Value::Object(mut object) = value else {
        return Err("payload is not a JSON object".to_string());
    };

    let name = match object.remove("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(Value::String(_)) => return Err("`name` is empty".to_string()),
        Some(_) => return Err("`name` is not a string".to_string()),
        None => return Err("missing required field `name`".to_string()),
    };

    let arguments = match object.remove("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(arguments)) => arguments,
        Some(_) => return Err("`arguments` is not an object".to_string()),
    };

    Ok(FunctionCall { name, arguments })
}
