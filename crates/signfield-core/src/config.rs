//! Field-layout config document (`{ documentName, fields }`)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::ConfigParseError;
use crate::field::Field;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    #[serde(default)]
    pub document_name: String,
    pub fields: Vec<Field>,
}

impl ConfigDocument {
    pub fn new(document_name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            document_name: document_name.into(),
            fields,
        }
    }

    /// Parse a config, validating every field before anything is returned.
    ///
    /// Only the `fields` key is significant; other keys are ignored. A
    /// missing or non-array `fields`, a field that does not match the field
    /// shape, out-of-range geometry, `page < 1`, or a repeated id all fail
    /// the whole document.
    pub fn from_json(json: &str) -> Result<Self, ConfigParseError> {
        let root: Value =
            serde_json::from_str(json).map_err(|e| ConfigParseError(e.to_string()))?;

        let obj = root
            .as_object()
            .ok_or_else(|| ConfigParseError("config must be a JSON object".to_string()))?;

        let fields_value = obj
            .get("fields")
            .ok_or_else(|| ConfigParseError("missing `fields` key".to_string()))?;
        if !fields_value.is_array() {
            return Err(ConfigParseError("`fields` must be an array".to_string()));
        }

        let fields: Vec<Field> = serde_json::from_value(fields_value.clone())
            .map_err(|e| ConfigParseError(format!("invalid field: {}", e)))?;

        let mut seen = HashSet::new();
        for field in &fields {
            if !field.is_well_formed() {
                return Err(ConfigParseError(format!(
                    "field {} has page < 1 or geometry outside [0, 1]",
                    field.id
                )));
            }
            if !seen.insert(field.id.clone()) {
                return Err(ConfigParseError(format!("duplicate field id {}", field.id)));
            }
        }

        let document_name = obj
            .get("documentName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            document_name,
            fields,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
