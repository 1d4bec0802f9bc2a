//! AcroForm access: enumerate fillable fields and write values back.
//!
//! The rest of the crate never touches `lopdf` types. It sees
//! [`FormField`] records with an explicit [`FieldKind`], and a
//! [`FieldValueMap`] going the other way. All PDF object-graph
//! walking is confined to this module.
//!
//! ```text
//! PDF bytes ──▶ read::read_fields ──▶ Vec<FormField>
//!                                         │ (enrich, reconcile)
//! PDF bytes + FieldValueMap ──▶ write::fill_form ──▶ filled PDF bytes
//! ```

pub mod read;
mod text;
pub mod write;

#[cfg(test)]
pub(crate) mod fixtures;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use read::{page_count, read_fields};
pub use write::{fill_form, FilledForm};

/// Field name → value produced by the reconciler.
///
/// `"Yes"` / `"No"` for buttons; an empty string clears the field.
/// A `BTreeMap` keeps log output and serialised maps deterministic.
pub type FieldValueMap = BTreeMap<String, String>;

/// The widget type of a form field.
///
/// Resolved once at the reader boundary so downstream code never compares
/// raw `/FT` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Checkbox,
    Radio,
    /// Choice lists, push buttons, signatures.
    Other,
}

impl FieldKind {
    /// Buttons carry a name-valued state (`/Yes`, `/Off`) instead of text.
    pub fn is_button(&self) -> bool {
        matches!(self, FieldKind::Checkbox | FieldKind::Radio)
    }
}

/// One fillable field of a PDF form.
///
/// Created by the reader, given a `description` once by the enricher, and
/// read (never mutated) by the reconciler. Serialised as the JSON the model
/// sees, so field names here are part of the prompt contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// Fully-qualified field name (`parent.child`), unique within a form.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// 1-based page of the field's first widget.
    pub page: usize,
    /// `[x0, y0, x1, y1]` in PDF user space, normalised so x0 ≤ x1, y0 ≤ y1.
    pub bbox: [f32; 4],
    /// Tooltip / alternate name (`/TU`), empty when the form has none.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current value as stored in the PDF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// On-states of button widgets and `/Opt` export values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl FormField {
    /// A field with no description, value or choices.
    pub fn new(name: impl Into<String>, kind: FieldKind, page: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            page,
            bbox: [0.0; 4],
            label: String::new(),
            description: None,
            value: None,
            choices: Vec::new(),
        }
    }
}
