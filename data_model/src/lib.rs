pub mod body;
pub mod manifest;
pub mod test_objects;

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

pub use body::{process_body, ClassifiedBody, RawBody};
pub use manifest::{
    build_manifest,
    DatabaseConnection,
    FunctionDefaults,
    FunctionManifest,
    FunctionResources,
    TestFixture,
};

/// Token joining a namespace and a function name into the single flat name
/// the upstream controller knows about. It can never occur inside a valid
/// namespace or name, see [`is_name_correct`].
pub const NAME_SEPARATOR: &str = "___";

/// A function identity as seen by clients of the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct FunctionName {
    pub namespace: String,
    pub name: String,
}

impl FunctionName {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn composite(&self) -> String {
        compose_function_name(&self.namespace, &self.name)
    }
}

impl Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Builds the upstream function name. No validation happens here.
pub fn compose_function_name(namespace: &str, name: &str) -> String {
    format!("{namespace}{NAME_SEPARATOR}{name}")
}

/// Recovers namespace and name from an upstream function name.
///
/// Splits on the first occurrence of [`NAME_SEPARATOR`]; anything after it,
/// including further separators, belongs to the name. A missing name or one
/// without a separator has an empty namespace.
pub fn split_function_name(composite: Option<&str>) -> FunctionName {
    let composite = composite.unwrap_or_default();
    match composite.split_once(NAME_SEPARATOR) {
        Some((namespace, name)) => FunctionName::new(namespace, name),
        None => FunctionName::new("", composite),
    }
}

/// True when the candidate is a non-empty run of lowercase ASCII letters and
/// digits. Applies to both namespaces and function names.
pub fn is_name_correct(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}
