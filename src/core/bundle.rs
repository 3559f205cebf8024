//! Purpose: Model and persist the JSON export bundle.
//! Exports: `ExportBundle`, `ProductRecord`.
//! Role: File boundary between `collection export` and `import`.
//! Invariants: `id` and `handle` are always written (null when unknown).
//! Invariants: Optional strings and empty field lists are omitted, never null.
//! Invariants: Output is two-space indented JSON with a trailing newline.
use crate::core::error::{Error, ErrorKind};
use crate::core::grid::GridField;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    #[serde(default)]
    pub products: Vec<ProductRecord>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: Option<u64>,
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metafields_global_title_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metafields_global_description_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<GridField>,
}

impl ProductRecord {
    /// Human label used in logs and notices.
    pub fn label(&self) -> String {
        match (&self.handle, self.id) {
            (Some(handle), _) => handle.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => self.title.clone().unwrap_or_else(|| "<unnamed>".to_string()),
        }
    }
}

impl ExportBundle {
    pub fn read_from(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read export bundle")
                .with_path(path)
                .with_source(err)
        })?;
        serde_json::from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!("invalid export bundle: {err}"))
                .with_hint("The file must hold a JSON object with a \"products\" array.")
                .with_path(path)
                .with_source(err)
        })
    }

    pub fn write_to(&self, path: &Path) -> Result<(), Error> {
        let mut text = serde_json::to_string_pretty(self).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode export bundle")
                .with_source(err)
        })?;
        text.push('\n');
        std::fs::write(path, text).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write export bundle")
                .with_path(path)
                .with_source(err)
        })
    }
}
