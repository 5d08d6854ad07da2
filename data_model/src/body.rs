//! Normalization of upstream response bodies.
//!
//! The controller answers with JSON documents, error objects carrying either
//! `msg` or `message`, or plain text. Every shape is reduced to a JSON value
//! clients can rely on; classification never fails.

use serde_json::{json, Map, Value};

use crate::{
    manifest::{SOURCE_CODE_ANNOTATION, TEST_ANNOTATION},
    split_function_name,
};

/// A body as received from upstream or produced internally.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBody {
    Missing,
    Text(String),
    Json(Value),
}

impl From<&str> for RawBody {
    fn from(text: &str) -> Self {
        RawBody::Text(text.to_string())
    }
}

impl From<String> for RawBody {
    fn from(text: String) -> Self {
        RawBody::Text(text)
    }
}

impl From<Option<String>> for RawBody {
    fn from(text: Option<String>) -> Self {
        text.map(RawBody::Text).unwrap_or(RawBody::Missing)
    }
}

impl From<Value> for RawBody {
    fn from(value: Value) -> Self {
        RawBody::Json(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedBody {
    Empty,
    ErrorShaped {
        message: String,
        code: Option<Value>,
        stack: Option<Value>,
    },
    ParsedJson(Value),
    RawText(String),
}

impl ClassifiedBody {
    pub fn classify(raw: RawBody) -> Self {
        match raw {
            RawBody::Missing | RawBody::Json(Value::Null) => ClassifiedBody::Empty,
            RawBody::Text(text) | RawBody::Json(Value::String(text)) => {
                if text.is_empty() {
                    return ClassifiedBody::Empty;
                }
                match serde_json::from_str::<Value>(&text) {
                    Ok(value) => ClassifiedBody::ParsedJson(value),
                    Err(_) => ClassifiedBody::RawText(text),
                }
            }
            RawBody::Json(Value::Object(map)) => match error_message(&map) {
                Some(message) => ClassifiedBody::ErrorShaped {
                    message,
                    code: present(&map, "code"),
                    stack: present(&map, "stack"),
                },
                None => ClassifiedBody::ParsedJson(Value::Object(map)),
            },
            RawBody::Json(other) => ClassifiedBody::ParsedJson(other),
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            ClassifiedBody::Empty => json!({ "message": "" }),
            ClassifiedBody::ErrorShaped {
                message,
                code,
                stack,
            } => json!({ "message": compose_message(&message, code.as_ref(), stack.as_ref()) }),
            ClassifiedBody::ParsedJson(value) => value,
            ClassifiedBody::RawText(text) => json!({ "message": text }),
        }
    }
}

fn error_message(map: &Map<String, Value>) -> Option<String> {
    ["message", "msg"]
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn present(map: &Map<String, Value>, key: &str) -> Option<Value> {
    map.get(key).filter(|value| !value.is_null()).cloned()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn compose_message(message: &str, code: Option<&Value>, stack: Option<&Value>) -> String {
    let mut composed = message.to_string();
    if let Some(code) = code {
        composed.push_str(&format!(" code: {}", render(code)));
    }
    if let Some(stack) = stack {
        composed.push_str(&format!(" stack: {}", render(stack)));
    }
    composed
}

pub fn process_body(raw: impl Into<RawBody>) -> Value {
    ClassifiedBody::classify(raw.into()).into_json()
}

/// Composite names of the functions in a controller listing, in listing
/// order. Anything that is not a list of named functions lists nothing.
pub fn listed_function_names(listing: &Value) -> Vec<String> {
    listing
        .as_array()
        .map(|functions| {
            functions
                .iter()
                .filter_map(|function| function.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Replaces composite `name` and `service` fields with the bare function
/// name.
pub fn strip_composite_names(value: &mut Value) {
    let Some(object) = value.as_object_mut() else {
        return;
    };
    for key in ["name", "service"] {
        if let Some(Value::String(composite)) = object.get(key) {
            let bare = split_function_name(Some(composite.as_str())).name;
            object.insert(key.to_string(), Value::String(bare));
        }
    }
}

/// Adds `namespace` and the bare `name` to every function of a list,
/// keeping all other fields and the list order.
pub fn annotate_function_list(list: Value) -> Value {
    match list {
        Value::Array(functions) => {
            Value::Array(functions.into_iter().map(annotate_function).collect())
        }
        other => other,
    }
}

/// Only objects carrying a string `name` are functions; anything else is
/// left untouched.
fn annotate_function(mut function: Value) -> Value {
    let split = match function.get("name").and_then(Value::as_str) {
        Some(composite) => split_function_name(Some(composite)),
        None => return function,
    };
    if let Some(object) = function.as_object_mut() {
        object.insert("namespace".to_string(), Value::String(split.namespace));
        object.insert("name".to_string(), Value::String(split.name));
    }
    function
}

/// Shapes a function read back from the controller: source code and test
/// fixture move from the annotations to the top level, and the composite
/// name is split.
pub fn lift_function_detail(function: Value) -> Value {
    if !function.get("name").is_some_and(Value::is_string) {
        return function;
    }
    let mut function = annotate_function(function);
    let Some(object) = function.as_object_mut() else {
        return function;
    };
    if let Some(annotations) = object.get_mut("annotations").and_then(Value::as_object_mut) {
        let source_code = annotations.remove(SOURCE_CODE_ANNOTATION);
        let test = annotations.remove(TEST_ANNOTATION);
        if let Some(source_code) = source_code {
            object.insert("sourcecode".to_string(), source_code);
        }
        if let Some(test) = test {
            object.insert("test".to_string(), test);
        }
    }
    strip_composite_names(&mut function);
    function
}
