use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool must be able to describe its parameters as a json schema
pub trait ToolDescription: Send + Sync {

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn parameters_schema(&self) -> serde_json::Value;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Owned snapshot of a tool declaration, this is what travels with a model request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Names of the declared parameters, in schema order
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// JSON schema of a parameter struct in the dialect chat-completion APIs accept:
/// no `$schema`/`title` metadata and `["integer", "null"]` collapsed to `"integer"`.
pub fn parameters_schema_for<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
    simplify_schema(&mut schema);
    schema
}

fn simplify_schema(schema: &mut Value) {
    match schema {
        Value::Object(obj) => {
            obj.remove("$schema");
            obj.remove("title");

            if let Some(Value::Array(types)) = obj.get("type") {
                let non_null: Vec<Value> = types.iter().filter(|t| *t != "null").cloned().collect();
                if non_null.len() == 1 {
                    obj.insert("type".to_string(), non_null[0].clone());
                }
            }

            for value in obj.values_mut() {
                simplify_schema(value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(simplify_schema),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Params {
        /// left operand
        a: i64,
        b: Option<i64>,
    }

    #[test]
    fn test_schema_is_simplified() {
        let schema = parameters_schema_for::<Params>();
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "integer");
        assert_eq!(schema["properties"]["a"]["description"], "left operand");
        assert_eq!(schema["properties"]["b"]["type"], "integer");
        assert_eq!(schema["required"], serde_json::json!(["a"]));
    }

    #[test]
    fn test_descriptor_parameter_names() {
        let descriptor = ToolDescriptor::new("add", "adds", parameters_schema_for::<Params>());
        assert_eq!(descriptor.parameter_names(), vec!["a".to_string(), "b".to_string()]);
    }
}
