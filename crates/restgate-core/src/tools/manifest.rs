use serde::Deserialize;
use serde_json::Value;

use super::{JsonObject, ToolMetadata};

/// Kind used when a manifest does not name one
pub const DEFAULT_KIND: &str = "rest";

/// One tool entry from a manifest file
///
/// Fields that are not part of the metadata block are kept in `settings` and
/// interpreted by the factory registered for `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolManifest {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub input_schema: JsonObject,
    #[serde(default)]
    pub output_schema: Option<JsonObject>,
    #[serde(flatten)]
    pub settings: JsonObject,
}

impl ToolManifest {
    pub fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
        }
    }

    /// Parse a manifest file holding one entry or an array of entries
    pub fn parse_document(raw: &str) -> Result<Vec<ToolManifest>, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        match value {
            Value::Array(_) => serde_json::from_value(value),
            other => Ok(vec![serde_json::from_value(other)?]),
        }
    }
}

fn default_kind() -> String {
    DEFAULT_KIND.to_string()
}

fn empty_object_schema() -> JsonObject {
    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema
}
