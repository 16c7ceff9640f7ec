//! Field lookup for JSON APIs such as PoetryDB.

use crate::config::JsonFields;
use crate::error::{ConfigError, PipelineError};
use crate::models::{BodyMarkup, RawFields, SourceDocument};
use crate::utils::clean_inline;
use serde_json::Value;

#[derive(Debug)]
pub struct JsonExtractor {
    fields: JsonFields,
}

impl JsonExtractor {
    pub fn new(fields: &JsonFields) -> Result<Self, ConfigError> {
        if let Some(pointer) = &fields.collection {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(ConfigError::Pointer {
                    field: "collection",
                    value: pointer.clone(),
                });
            }
        }
        Ok(Self {
            fields: fields.clone(),
        })
    }

    pub fn extract(&self, doc: &SourceDocument) -> Result<RawFields, PipelineError> {
        let root: Value = serde_json::from_str(&doc.body)
            .map_err(|e| PipelineError::Extraction(format!("invalid JSON document: {e}")))?;

        let entry = match &self.fields.collection {
            Some(pointer) => root.pointer(pointer).ok_or_else(|| {
                PipelineError::Extraction(format!("collection `{pointer}` not found"))
            })?,
            None => &root,
        };
        if !entry.is_object() {
            return Err(PipelineError::Extraction(
                "poem entry is not an object".to_string(),
            ));
        }

        let text_field = |key: &str| entry.get(key).and_then(Value::as_str).and_then(clean_inline);

        let body = match entry.get(&self.fields.lines) {
            Some(Value::Array(items)) => BodyMarkup::Lines(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            Some(Value::String(text)) => BodyMarkup::Text(text.clone()),
            _ => {
                return Err(PipelineError::Extraction(format!(
                    "field `{}` not found",
                    self.fields.lines
                )));
            }
        };

        Ok(RawFields {
            title: text_field(&self.fields.title),
            author: text_field(&self.fields.author),
            body,
        })
    }
}
