//! Form Field Reader: enumerate the widgets of an AcroForm.
//!
//! Widgets are visited in document order (pages in order, then each page's
//! `/Annots` in order). A widget either *is* its field (it carries `/T`) or
//! hangs off a field through `/Parent`. Several widgets can belong to one
//! field (radio groups, mirrored checkboxes); they collapse into one
//! [`FormField`] positioned at the first widget, with their on-states
//! collected into `choices`.
//!
//! When a button field carries `/Opt`, entry *i* is the export value of
//! the field's *i*-th kid, whose appearance state may be an opaque name
//! such as `0` or `1`. `choices` then lists the export values, and
//! [`FieldNode::state_for`] translates them back into appearance states.

use super::text::object_text;
use super::{FieldKind, FormField};
use crate::error::PaFillError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::debug;

/// `/Ff` bit 16: radio button group.
const FF_RADIO: i64 = 1 << 15;
/// `/Ff` bit 17: push button.
const FF_PUSHBUTTON: i64 = 1 << 16;
/// Guards `/Parent` walks against cyclic object graphs.
const MAX_PARENT_DEPTH: usize = 32;

/// Appearance state name of an unchecked button.
pub(crate) const OFF_STATE: &str = "Off";

/// One widget annotation of a field.
#[derive(Debug, Clone)]
pub(crate) struct WidgetNode {
    pub id: ObjectId,
    /// The non-`Off` key of the widget's normal appearance dictionary.
    pub on_state: Option<String>,
}

/// A field plus the object ids the writer needs to update it.
#[derive(Debug, Clone)]
pub(crate) struct FieldNode {
    /// Field dictionaries carrying this name (normally exactly one).
    pub field_ids: Vec<ObjectId>,
    pub widgets: Vec<WidgetNode>,
    /// `(export value, appearance state)` pairs from `/Opt`.
    pub exports: Vec<(String, String)>,
    pub field: FormField,
}

impl FieldNode {
    /// The appearance state `value` selects: a widget's own on-state, or
    /// the state an `/Opt` export value stands for.
    pub fn state_for(&self, value: &str) -> Option<String> {
        if self
            .widgets
            .iter()
            .any(|w| w.on_state.as_deref() == Some(value))
        {
            return Some(value.to_string());
        }
        self.exports
            .iter()
            .find(|(export, _)| export == value)
            .map(|(_, state)| state.clone())
    }

    /// The export value shown for an appearance state, else the state itself.
    fn display_state(&self, state: &str) -> String {
        self.exports
            .iter()
            .find(|(_, s)| s == state)
            .map_or_else(|| state.to_string(), |(export, _)| export.clone())
    }
}

/// Enumerate the fillable fields of a PDF form, in document order.
///
/// A PDF without an AcroForm yields an empty list; bytes that are not a
/// readable PDF yield [`PaFillError::DocumentParse`].
pub fn read_fields(pdf: &[u8]) -> Result<Vec<FormField>, PaFillError> {
    let doc = load(pdf)?;
    let nodes = collect_fields(&doc)?;
    debug!("Read {} form fields", nodes.len());
    Ok(nodes.into_iter().map(|node| node.field).collect())
}

/// Number of pages in the document.
pub fn page_count(pdf: &[u8]) -> Result<usize, PaFillError> {
    Ok(load(pdf)?.get_pages().len())
}

fn load(pdf: &[u8]) -> Result<Document, PaFillError> {
    Document::load_mem(pdf).map_err(|e| PaFillError::parse(e.to_string()))
}

/// Walk every page's widgets and group them into fields.
pub(crate) fn collect_fields(doc: &Document) -> Result<Vec<FieldNode>, PaFillError> {
    let mut nodes: Vec<FieldNode> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for (page_num, page_id) in doc.get_pages() {
        let page = doc
            .get_dictionary(page_id)
            .map_err(|e| PaFillError::parse(format!("page {page_num}: {e}")))?;

        for widget_id in annotation_ids(doc, page) {
            let Ok(widget) = doc.get_dictionary(widget_id) else {
                continue;
            };
            if !is_widget(widget) {
                continue;
            }
            let Some(field_id) = terminal_field(widget_id, widget) else {
                debug!("Skipping widget {:?}: no /T and no /Parent", widget_id);
                continue;
            };
            let name = qualified_name(doc, field_id);
            if name.is_empty() {
                debug!("Skipping widget {:?}: empty field name", widget_id);
                continue;
            }

            let on_state = on_state(doc, widget);
            let widget_node = WidgetNode {
                id: widget_id,
                on_state: on_state.clone(),
            };

            if let Some(&idx) = by_name.get(&name) {
                let node = &mut nodes[idx];
                if !node.field_ids.contains(&field_id) {
                    node.field_ids.push(field_id);
                }
                if let Some(state) = on_state {
                    push_unique(&mut node.field.choices, state);
                }
                node.widgets.push(widget_node);
                continue;
            }

            let kind = field_kind(doc, field_id);
            let mut field = FormField::new(name.clone(), kind, page_num as usize);
            field.bbox = rect(widget);
            field.label = doc
                .get_dictionary(field_id)
                .ok()
                .and_then(|d| d.get(b"TU").ok())
                .and_then(object_text)
                .unwrap_or_default();
            field.value = inherited(doc, field_id, b"V").and_then(object_text);
            if let Some(state) = on_state {
                push_unique(&mut field.choices, state);
            }

            by_name.insert(name, nodes.len());
            nodes.push(FieldNode {
                field_ids: vec![field_id],
                widgets: vec![widget_node],
                exports: Vec::new(),
                field,
            });
        }
    }

    for node in &mut nodes {
        link_options(doc, node);
    }
    Ok(nodes)
}

/// Pair `/Opt` entries with the on-states of the field's kids, then show
/// export values in place of the states they stand for.
///
/// Options of a non-button field (or with no widget to pair with) are
/// appended to `choices` as they are.
fn link_options(doc: &Document, node: &mut FieldNode) {
    let options = options(doc, node.field_ids[0]);
    if options.is_empty() {
        return;
    }

    let mut unpaired = Vec::new();
    if node.field.kind.is_button() {
        let states = kid_states(doc, node);
        for (i, export) in options.into_iter().enumerate() {
            match states.get(i).cloned().flatten() {
                Some(state) => node.exports.push((export, state)),
                None => unpaired.push(export),
            }
        }
    } else {
        unpaired = options;
    }

    let mut choices = Vec::new();
    for state in node.widgets.iter().filter_map(|w| w.on_state.as_deref()) {
        push_unique(&mut choices, node.display_state(state));
    }
    for export in unpaired {
        push_unique(&mut choices, export);
    }
    node.field.choices = choices;

    if let Some(value) = node.field.value.take() {
        node.field.value = Some(node.display_state(&value));
    }
}

/// On-states of the field's widgets in `/Kids` order; a field that is its
/// own widget has just its one state.
fn kid_states(doc: &Document, node: &FieldNode) -> Vec<Option<String>> {
    let kids: Vec<ObjectId> = doc
        .get_dictionary(node.field_ids[0])
        .ok()
        .and_then(|field| field.get(b"Kids").ok())
        .and_then(|kids| doc.dereference(kids).ok())
        .and_then(|(_, kids)| kids.as_array().ok())
        .map(|items| items.iter().filter_map(|k| k.as_reference().ok()).collect())
        .unwrap_or_default();

    if kids.is_empty() {
        return node.widgets.iter().map(|w| w.on_state.clone()).collect();
    }
    kids.iter()
        .filter_map(|id| node.widgets.iter().find(|w| w.id == *id))
        .map(|w| w.on_state.clone())
        .collect()
}

fn annotation_ids(doc: &Document, page: &Dictionary) -> Vec<ObjectId> {
    let Ok(annots) = page.get(b"Annots") else {
        return Vec::new();
    };
    let Ok((_, annots)) = doc.dereference(annots) else {
        return Vec::new();
    };
    match annots.as_array() {
        Ok(items) => items
            .iter()
            .filter_map(|item| item.as_reference().ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn is_widget(annot: &Dictionary) -> bool {
    annot
        .get(b"Subtype")
        .and_then(Object::as_name)
        .map(|name| name == b"Widget")
        .unwrap_or(false)
}

/// The field a widget belongs to: itself when it carries `/T`, else its parent.
fn terminal_field(widget_id: ObjectId, widget: &Dictionary) -> Option<ObjectId> {
    if widget.has(b"T") {
        return Some(widget_id);
    }
    widget.get(b"Parent").and_then(Object::as_reference).ok()
}

/// `/T` of the field and all its ancestors, joined with `.`.
fn qualified_name(doc: &Document, field_id: ObjectId) -> String {
    let mut parts = Vec::new();
    let mut current = Some(field_id);
    for _ in 0..MAX_PARENT_DEPTH {
        let Some(id) = current else { break };
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        if let Some(part) = dict.get(b"T").ok().and_then(object_text) {
            parts.push(part);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    parts.reverse();
    parts.join(".")
}

/// Look up an inheritable field attribute through the `/Parent` chain.
fn inherited<'a>(doc: &'a Document, field_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(field_id);
    for _ in 0..MAX_PARENT_DEPTH {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(obj) = dict.get(key) {
            return doc.dereference(obj).ok().map(|(_, obj)| obj);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn field_kind(doc: &Document, field_id: ObjectId) -> FieldKind {
    let field_type = inherited(doc, field_id, b"FT").and_then(|obj| obj.as_name().ok());
    let flags = inherited(doc, field_id, b"Ff")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0);

    match field_type {
        Some(name) if name == b"Tx" => FieldKind::Text,
        Some(name) if name == b"Btn" => {
            if flags & FF_PUSHBUTTON != 0 {
                FieldKind::Other
            } else if flags & FF_RADIO != 0 {
                FieldKind::Radio
            } else {
                FieldKind::Checkbox
            }
        }
        _ => FieldKind::Other,
    }
}

fn rect(widget: &Dictionary) -> [f32; 4] {
    let Ok(values) = widget.get(b"Rect").and_then(Object::as_array) else {
        return [0.0; 4];
    };
    let nums: Vec<f32> = values.iter().filter_map(|v| v.as_float().ok()).collect();
    if nums.len() != 4 {
        return [0.0; 4];
    }
    [
        nums[0].min(nums[2]),
        nums[1].min(nums[3]),
        nums[0].max(nums[2]),
        nums[1].max(nums[3]),
    ]
}

fn on_state(doc: &Document, widget: &Dictionary) -> Option<String> {
    let appearance = widget.get(b"AP").ok().and_then(|obj| as_dict(doc, obj))?;
    let normal = appearance.get(b"N").ok().and_then(|obj| as_dict(doc, obj))?;
    normal
        .iter()
        .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
        .find(|key| key != OFF_STATE)
}

/// `/Opt` export values; `[export display]` pairs contribute the export value.
fn options(doc: &Document, field_id: ObjectId) -> Vec<String> {
    let Some(Ok(items)) = inherited(doc, field_id, b"Opt").map(Object::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Object::Array(pair) => pair.first().and_then(object_text),
            other => object_text(other),
        })
        .collect()
}

fn as_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    doc.dereference(obj).ok()?.1.as_dict().ok()
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}
