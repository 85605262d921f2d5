use schemars::gen::SchemaSettings;
use schemars::schema::{Schema, SchemaObject};
use schemars::visit::{visit_schema_object, Visitor};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// Types whose JSON schema is handed to OpenAI as a function's `parameters`.
///
/// Strict function calling wants every object closed
/// (`additionalProperties: false`) with every property listed in `required`,
/// and no `$ref`s. Nested types are inlined by the generator, then every
/// object schema is closed on the way out.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    fn openai_schema() -> serde_json::Value {
        let settings = SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        });
        let mut root = settings
            .with_visitor(StrictObjects)
            .into_generator()
            .into_root_schema_for::<Self>();

        // The Rust type name means nothing to the model.
        if let Some(metadata) = root.schema.metadata.as_mut() {
            metadata.title = None;
        }

        serde_json::to_value(root.schema).unwrap_or_default()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Closes every object schema and marks all of its properties required.
#[derive(Debug, Clone)]
struct StrictObjects;

impl Visitor for StrictObjects {
    fn visit_schema_object(&mut self, schema: &mut SchemaObject) {
        if let Some(object) = schema.object.as_mut() {
            object.additional_properties = Some(Box::new(Schema::Bool(false)));
            object.required = object.properties.keys().cloned().collect();
        }
        visit_schema_object(self, schema);
    }
}
