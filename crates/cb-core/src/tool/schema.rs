//! Tool schema helpers

use serde_json::{json, Map, Value as JsonValue};

/// Builder for a tool's JSON object schema
///
/// # Example
/// ```ignore
/// let schema = SchemaBuilder::object()
///     .string("start", "Slot start, ISO 8601", true)
///     .string_array("attendees", "Attendee emails", false)
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    properties: Map<String, JsonValue>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Start an empty object schema
    pub fn object() -> Self {
        Self::default()
    }

    /// Add a property with an arbitrary schema
    pub fn property(mut self, name: &str, schema: JsonValue, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Add a string property
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            json!({"type": "string", "description": description}),
            required,
        )
    }

    /// Add an array-of-strings property
    pub fn string_array(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            json!({
                "type": "array",
                "items": {"type": "string"},
                "description": description
            }),
            required,
        )
    }

    pub fn build(self) -> JsonValue {
        json!({
            "type": "object",
            "properties": self.properties,
            "required": self.required
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_schema() {
        let schema = SchemaBuilder::object()
            .string("start", "start time", true)
            .string("title", "title", false)
            .string_array("attendees", "emails", false)
            .build();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["start"]["type"], "string");
        assert_eq!(schema["properties"]["attendees"]["items"]["type"], "string");
        assert_eq!(schema["required"], json!(["start"]));
    }

    #[test]
    fn test_empty_schema() {
        let schema = SchemaBuilder::object().build();
        assert_eq!(schema["required"], json!([]));
        assert!(schema["properties"].as_object().unwrap().is_empty());
    }
}
