//! Form Writer: apply a [`FieldValueMap`] to a form and serialise it.
//!
//! The whole pass runs on an in-memory `lopdf::Document`; bytes are only
//! produced after every edit succeeded, so callers never see a partially
//! filled file.
//!
//! ## Per-field rules
//!
//! | value            | text / other     | checkbox                         | radio                    |
//! |------------------|------------------|----------------------------------|--------------------------|
//! | `""`             | `/V ()`          | `/V /Off`, widgets `/AS /Off`    | same as checkbox         |
//! | exact choice     | `/V (value)`     | that state                       | that state               |
//! | `/Opt` export    | `/V (value)`     | the state it stands for          | the state it stands for  |
//! | truthy word      | `/V (value)`     | the widget's on-state            | untouched (not a choice) |
//! | anything else    | `/V (value)`     | `Off`                            | untouched                |
//!
//! Fields whose name is not in the map are left alone.

use super::read::{collect_fields, FieldNode, OFF_STATE};
use super::text;
use super::{FieldKind, FieldValueMap};
use crate::error::PaFillError;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

/// Case-insensitive words that check a checkbox.
const TRUTHY: [&str; 5] = ["yes", "true", "1", "on", "checked"];

/// On-state used when a checkbox widget has no appearance dictionary.
const DEFAULT_ON_STATE: &str = "Yes";

/// Result of [`fill_form`].
#[derive(Debug, Clone)]
pub struct FilledForm {
    /// The serialised, filled PDF.
    pub bytes: Vec<u8>,
    /// Number of fields whose value was changed.
    pub fields_written: usize,
}

/// Does this value check a checkbox?
pub fn is_checked_value(value: &str) -> bool {
    let lower = value.to_lowercase();
    TRUTHY.contains(&lower.as_str())
}

/// A planned change to one field.
#[derive(Debug)]
enum Edit {
    /// Set `/V` to a text string on every field dictionary.
    Text {
        field_ids: Vec<ObjectId>,
        value: String,
    },
    /// Set `/V` to a state name and each widget's `/AS`.
    Button {
        field_ids: Vec<ObjectId>,
        state: String,
        widgets: Vec<(ObjectId, String)>,
    },
}

/// Write `values` into the form's widgets and return the new PDF.
///
/// # Errors
/// [`PaFillError::DocumentWrite`] when the source cannot be reopened or the
/// filled document cannot be serialised.
pub fn fill_form(pdf: &[u8], values: &FieldValueMap) -> Result<FilledForm, PaFillError> {
    let mut doc = Document::load_mem(pdf)
        .map_err(|e| PaFillError::write(format!("cannot reopen form: {e}")))?;
    let nodes = collect_fields(&doc).map_err(|e| PaFillError::write(e.to_string()))?;

    let mut edits = Vec::new();
    for node in &nodes {
        let Some(value) = values.get(&node.field.name) else {
            continue;
        };
        match plan_edit(node, value) {
            Some(edit) => edits.push(edit),
            None => debug!(
                "Leaving '{}' untouched: '{}' is not one of {:?}",
                node.field.name, value, node.field.choices
            ),
        }
    }

    let unknown = values
        .keys()
        .filter(|name| !nodes.iter().any(|n| &n.field.name == *name))
        .count();
    if unknown > 0 {
        debug!("{} mapped names match no field in the form", unknown);
    }

    let fields_written = edits.len();
    for edit in edits {
        apply(&mut doc, edit)?;
    }
    if fields_written > 0 {
        request_appearance_regeneration(&mut doc)?;
    }

    doc.prune_objects();
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| PaFillError::write(format!("save failed: {e}")))?;

    debug!(
        "Filled {} fields, output {} bytes",
        fields_written,
        bytes.len()
    );
    Ok(FilledForm {
        bytes,
        fields_written,
    })
}

fn plan_edit(node: &FieldNode, value: &str) -> Option<Edit> {
    let field = &node.field;

    if value.is_empty() {
        return Some(if field.kind.is_button() {
            button_edit(node, OFF_STATE)
        } else {
            text_edit(node, "")
        });
    }

    match field.kind {
        FieldKind::Checkbox => Some(button_edit(node, &checkbox_state(node, value))),
        FieldKind::Radio => node
            .state_for(value)
            .map(|state| button_edit(node, &state)),
        FieldKind::Text | FieldKind::Other => Some(text_edit(node, value)),
    }
}

/// A literal choice wins over the boolean reading (hybrid checkbox widgets).
fn checkbox_state(node: &FieldNode, value: &str) -> String {
    if let Some(state) = node.state_for(value) {
        return state;
    }
    if is_checked_value(value) {
        return node
            .widgets
            .iter()
            .find_map(|w| w.on_state.clone())
            .unwrap_or_else(|| DEFAULT_ON_STATE.to_string());
    }
    OFF_STATE.to_string()
}

fn text_edit(node: &FieldNode, value: &str) -> Edit {
    Edit::Text {
        field_ids: node.field_ids.clone(),
        value: value.to_string(),
    }
}

fn button_edit(node: &FieldNode, state: &str) -> Edit {
    let widgets = node
        .widgets
        .iter()
        .map(|widget| {
            let appearance = match widget.on_state.as_deref() {
                Some(on) if on == state => state,
                None if state != OFF_STATE => state,
                _ => OFF_STATE,
            };
            (widget.id, appearance.to_string())
        })
        .collect();
    Edit::Button {
        field_ids: node.field_ids.clone(),
        state: state.to_string(),
        widgets,
    }
}

fn apply(doc: &mut Document, edit: Edit) -> Result<(), PaFillError> {
    match edit {
        Edit::Text { field_ids, value } => {
            for id in field_ids {
                set_key(doc, id, "V", text::encode(&value))?;
            }
        }
        Edit::Button {
            field_ids,
            state,
            widgets,
        } => {
            for id in field_ids {
                set_key(doc, id, "V", Object::Name(state.clone().into_bytes()))?;
            }
            for (id, appearance) in widgets {
                set_key(doc, id, "AS", Object::Name(appearance.into_bytes()))?;
            }
        }
    }
    Ok(())
}

fn set_key(doc: &mut Document, id: ObjectId, key: &str, value: Object) -> Result<(), PaFillError> {
    doc.get_object_mut(id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| PaFillError::write(format!("object {} {}: {e}", id.0, id.1)))?
        .set(key, value);
    Ok(())
}

/// Ask viewers to rebuild widget appearances from the new `/V` values.
fn request_appearance_regeneration(doc: &mut Document) -> Result<(), PaFillError> {
    let acroform = doc
        .catalog()
        .ok()
        .and_then(|catalog| catalog.get(b"AcroForm").ok())
        .cloned();

    match acroform {
        Some(Object::Reference(id)) => set_key(doc, id, "NeedAppearances", Object::Boolean(true)),
        Some(Object::Dictionary(_)) => {
            doc.catalog_mut()
                .and_then(|catalog| catalog.get_mut(b"AcroForm"))
                .and_then(Object::as_dict_mut)
                .map_err(|e| PaFillError::write(format!("AcroForm: {e}")))?
                .set("NeedAppearances", Object::Boolean(true));
            Ok(())
        }
        _ => Ok(()),
    }
}
