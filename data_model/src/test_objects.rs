pub mod tests {
    use serde_json::{json, Value};

    use crate::{
        build_manifest,
        compose_function_name,
        DatabaseConnection,
        FunctionDefaults,
        TestFixture,
    };

    pub const TEST_NAMESPACE: &str = "simple";
    pub const TEST_FUNCTION: &str = "pgfaasexpress";

    pub const PLUS_SOURCE_CODE: &str = r#"module.exports = {
  echo: (sqlexec, req, callback) => {
    return callback(null, req.body);
  },
  plus: (sqlexec, req, callback) => {
    return callback(null, {c: req.body.a + req.body.b});
  }
};
"#;

    pub fn plus_fixture() -> Value {
        json!({"verb": "plus", "a": 1, "b": 2})
    }

    /// A function entry as listed by the controller.
    pub fn mock_function_entry(namespace: &str, name: &str) -> Value {
        json!({
            "name": compose_function_name(namespace, name),
            "image": FunctionDefaults::default().image,
            "invocationCount": 0,
            "replicas": 1,
            "availableReplicas": 1,
            "envProcess": "",
            "labels": {"function": "true"},
        })
    }

    /// A function as returned by the controller when read by name, with the
    /// annotations the gateway stored when creating it.
    pub fn mock_function_detail(namespace: &str, name: &str, test: Value) -> Value {
        let manifest = build_manifest(
            &compose_function_name(namespace, name),
            PLUS_SOURCE_CODE,
            &TestFixture::from(test),
            &FunctionDefaults::default(),
            &DatabaseConnection::default(),
        )
        .unwrap();
        let mut detail = mock_function_entry(namespace, name);
        detail["annotations"] = json!(manifest.annotations);
        detail
    }

    pub fn mock_function_list() -> Value {
        json!([
            mock_function_entry(TEST_NAMESPACE, "inception"),
            mock_function_entry("complex", "stats"),
            mock_function_entry(TEST_NAMESPACE, "echo"),
            mock_function_entry(TEST_NAMESPACE, TEST_FUNCTION),
            mock_function_entry("", "orphan"),
        ])
    }
}
