//! In-memory AcroForm fixtures for unit tests.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

#[derive(Debug, Clone)]
enum Kind {
    Text,
    /// One widget per on-state; more than one makes a kids group.
    Checkbox(Vec<String>),
    Radio(Vec<String>),
}

#[derive(Debug, Clone)]
pub(crate) struct FixtureField {
    name: String,
    page: usize,
    kind: Kind,
    rect: [f32; 4],
    label: Option<String>,
    value: Option<String>,
    options: Vec<String>,
}

impl FixtureField {
    fn new(name: &str, page: usize, kind: Kind) -> Self {
        Self {
            name: name.to_string(),
            page,
            kind,
            rect: [100.0, 700.0, 300.0, 720.0],
            label: None,
            value: None,
            options: Vec::new(),
        }
    }

    pub fn text(name: &str, page: usize) -> Self {
        Self::new(name, page, Kind::Text)
    }

    pub fn checkbox(name: &str, page: usize) -> Self {
        Self::new(name, page, Kind::Checkbox(vec!["Yes".to_string()]))
    }

    /// A checkbox whose widgets use these on-states.
    pub fn checkbox_states(name: &str, page: usize, states: &[&str]) -> Self {
        let states = states.iter().map(|s| s.to_string()).collect();
        Self::new(name, page, Kind::Checkbox(states))
    }

    pub fn radio(name: &str, page: usize, choices: &[&str]) -> Self {
        let choices = choices.iter().map(|c| c.to_string()).collect();
        Self::new(name, page, Kind::Radio(choices))
    }

    pub fn rect(mut self, rect: [f32; 4]) -> Self {
        self.rect = rect;
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// `/Opt` export values, one per widget in kid order.
    pub fn options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }
}

/// Builds a form PDF with `pages` blank pages and the given fields.
pub(crate) struct FormBuilder {
    pages: usize,
    fields: Vec<FixtureField>,
}

impl FormBuilder {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FixtureField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut page_annots: Vec<Vec<Object>> = vec![Vec::new(); self.pages];
        let mut page_ids: Vec<ObjectId> = Vec::new();
        for _ in 0..self.pages {
            page_ids.push(doc.new_object_id());
        }

        let mut acro_fields = Vec::new();
        for field in &self.fields {
            let page_id = page_ids[field.page - 1];
            let rect: Vec<Object> = field.rect.iter().map(|&v| Object::Real(v.into())).collect();
            match &field.kind {
                Kind::Text => {
                    let mut dict = dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Widget",
                        "FT" => "Tx",
                        "T" => Object::string_literal(field.name.as_str()),
                        "Rect" => rect,
                        "P" => page_id,
                    };
                    if let Some(label) = &field.label {
                        dict.set("TU", Object::string_literal(label.as_str()));
                    }
                    if let Some(value) = &field.value {
                        dict.set("V", Object::string_literal(value.as_str()));
                    }
                    let id = doc.add_object(dict);
                    page_annots[field.page - 1].push(id.into());
                    acro_fields.push(Object::Reference(id));
                }
                Kind::Checkbox(states) if states.len() == 1 => {
                    let normal = appearance_states(&mut doc, &[states[0].as_str()]);
                    let mut dict = dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Widget",
                        "FT" => "Btn",
                        "T" => Object::string_literal(field.name.as_str()),
                        "Rect" => rect,
                        "P" => page_id,
                        "V" => "Off",
                        "AS" => "Off",
                        "AP" => dictionary! { "N" => normal },
                    };
                    if !field.options.is_empty() {
                        dict.set("Opt", option_array(&field.options));
                    }
                    let id = doc.add_object(dict);
                    page_annots[field.page - 1].push(id.into());
                    acro_fields.push(Object::Reference(id));
                }
                Kind::Checkbox(states) => {
                    let id = add_group(&mut doc, field, states, 0, page_id, &rect, &mut page_annots[field.page - 1]);
                    acro_fields.push(Object::Reference(id));
                }
                Kind::Radio(states) => {
                    let id = add_group(&mut doc, field, states, 1 << 15, page_id, &rect, &mut page_annots[field.page - 1]);
                    acro_fields.push(Object::Reference(id));
                }
            }
        }

        for (idx, page_id) in page_ids.iter().enumerate() {
            let annots = std::mem::take(&mut page_annots[idx]);
            doc.objects.insert(
                *page_id,
                Object::Dictionary(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
                    "Annots" => annots,
                }),
            );
        }

        let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.pages as i64,
            }),
        );

        let acroform_id = doc.add_object(dictionary! { "Fields" => acro_fields });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => acroform_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("fixture PDF must serialise");
        buffer
    }
}

/// A button field with one kid widget per state; returns the field id.
fn add_group(
    doc: &mut Document,
    field: &FixtureField,
    states: &[String],
    flags: i64,
    page_id: ObjectId,
    rect: &[Object],
    annots: &mut Vec<Object>,
) -> ObjectId {
    let parent_id = doc.new_object_id();
    let mut kids = Vec::new();
    for state in states {
        let normal = appearance_states(doc, &[state.as_str()]);
        let kid = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Parent" => parent_id,
            "Rect" => rect.to_vec(),
            "P" => page_id,
            "AS" => "Off",
            "AP" => dictionary! { "N" => normal },
        });
        annots.push(kid.into());
        kids.push(Object::Reference(kid));
    }
    let mut dict = dictionary! {
        "FT" => "Btn",
        "Ff" => flags,
        "T" => Object::string_literal(field.name.as_str()),
        "V" => "Off",
        "Kids" => kids,
    };
    if !field.options.is_empty() {
        dict.set("Opt", option_array(&field.options));
    }
    doc.objects.insert(parent_id, Object::Dictionary(dict));
    parent_id
}

fn option_array(options: &[String]) -> Vec<Object> {
    options
        .iter()
        .map(|o| Object::string_literal(o.as_str()))
        .collect()
}

/// `/N` appearance dictionary with one empty stream per on-state plus `Off`.
fn appearance_states(doc: &mut Document, on_states: &[&str]) -> lopdf::Dictionary {
    let mut normal = lopdf::Dictionary::new();
    for state in on_states.iter().copied().chain(std::iter::once("Off")) {
        let stream = doc.add_object(Stream::new(lopdf::Dictionary::new(), Vec::new()));
        normal.set(state, stream);
    }
    normal
}
