//! Health reporting for optional external engines.

use std::collections::BTreeMap;

use schemars::JsonSchema;

use crate::prelude::*;

/// Whether an optional collaborator (PDF backend, OCR engine) is usable.
#[derive(Clone, Debug, JsonSchema, PartialEq, Serialize)]
pub struct ComponentStatus {
    /// Is the component active?
    pub active: bool,

    /// The name of the active implementation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Why the component is inactive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ComponentStatus {
    pub fn active(name: &str) -> Self {
        Self {
            active: true,
            name: Some(name.to_owned()),
            reason: None,
        }
    }

    pub fn inactive(reason: impl Into<String>) -> Self {
        Self {
            active: false,
            name: None,
            reason: Some(reason.into()),
        }
    }
}

/// Output of the `health` probe.
#[derive(Clone, Debug, JsonSchema, Serialize)]
pub struct HealthReport {
    /// Always `"ok"` if we could answer at all.
    pub status: String,

    /// The native PDF backend. When inactive, documents are synthetic
    /// placeholders and all output is degraded.
    pub pdf_backend: ComponentStatus,

    /// The OCR engine used to augment native-text extraction.
    pub ocr: ComponentStatus,

    /// The engines a caller may select.
    pub engines: Vec<String>,

    /// Which engines have a model pipeline configured for their preferred
    /// tier.
    pub pipelines: BTreeMap<String, bool>,
}
