use serde::Serialize;
use serde_json::Value;

use crate::openai::StructuredOutput;

/// A function the model can be told to call. `parameters` is a JSON schema.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    /// Describe a function whose arguments are `T`.
    pub fn for_output<T: StructuredOutput>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: T::openai_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoArgs {
        message: String,
    }

    #[test]
    fn test_for_output_uses_openai_schema() {
        let def = ToolDefinition::for_output::<EchoArgs>("echo", "Echo back the input");
        assert_eq!(def.name, "echo");
        assert_eq!(def.description, "Echo back the input");
        assert_eq!(def.parameters["properties"]["message"]["type"], "string");
        assert_eq!(def.parameters["required"], serde_json::json!(["message"]));
        assert_eq!(def.parameters["additionalProperties"], Value::Bool(false));
    }
}
