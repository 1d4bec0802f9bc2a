//! Shared fixtures for the integration tests: lopdf-built forms and
//! scripted in-process stand-ins for the OCR service and the model.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pafill::{OcrEngine, PaFillError, PageText, TextCompletion};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ── Form builder ─────────────────────────────────────────────────────────────

pub enum Widget {
    Text { name: &'static str, label: &'static str },
    Checkbox { name: &'static str, on: &'static str },
    Radio { name: &'static str, choices: &'static [&'static str] },
}

/// A one-field-per-row form; every widget sits on `page` (1-based).
pub fn build_form(pages: usize, widgets: &[(usize, Widget)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_ids: Vec<ObjectId> = (0..pages).map(|_| doc.new_object_id()).collect();
    let mut annots: Vec<Vec<Object>> = vec![Vec::new(); pages];
    let mut fields = Vec::new();

    for (row, (page, widget)) in widgets.iter().enumerate() {
        let page_id = page_ids[page - 1];
        let y = 700.0 - 30.0 * row as f32;
        let rect = || -> Vec<Object> {
            [100.0, y, 300.0, y + 20.0]
                .iter()
                .map(|&v: &f32| Object::Real(v.into()))
                .collect()
        };
        match widget {
            Widget::Text { name, label } => {
                let id = doc.add_object(dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Widget",
                    "FT" => "Tx",
                    "T" => Object::string_literal(*name),
                    "TU" => Object::string_literal(*label),
                    "Rect" => rect(),
                    "P" => page_id,
                });
                annots[page - 1].push(id.into());
                fields.push(Object::Reference(id));
            }
            Widget::Checkbox { name, on } => {
                let normal = states(&mut doc, on);
                let id = doc.add_object(dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Widget",
                    "FT" => "Btn",
                    "T" => Object::string_literal(*name),
                    "Rect" => rect(),
                    "P" => page_id,
                    "V" => "Off",
                    "AS" => "Off",
                    "AP" => dictionary! { "N" => normal },
                });
                annots[page - 1].push(id.into());
                fields.push(Object::Reference(id));
            }
            Widget::Radio { name, choices } => {
                let parent = doc.new_object_id();
                let mut kids = Vec::new();
                for choice in choices.iter() {
                    let normal = states(&mut doc, choice);
                    let kid = doc.add_object(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Widget",
                        "Parent" => parent,
                        "Rect" => rect(),
                        "P" => page_id,
                        "AS" => "Off",
                        "AP" => dictionary! { "N" => normal },
                    });
                    annots[page - 1].push(kid.into());
                    kids.push(Object::Reference(kid));
                }
                doc.objects.insert(
                    parent,
                    Object::Dictionary(dictionary! {
                        "FT" => "Btn",
                        "Ff" => 1i64 << 15,
                        "T" => Object::string_literal(*name),
                        "V" => "Off",
                        "Kids" => kids,
                    }),
                );
                fields.push(Object::Reference(parent));
            }
        }
    }

    for (idx, page_id) in page_ids.iter().enumerate() {
        doc.objects.insert(
            *page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
                "Annots" => std::mem::take(&mut annots[idx]),
            }),
        );
    }
    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let acroform = doc.add_object(dictionary! { "Fields" => fields });
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform,
    });
    doc.trailer.set("Root", catalog);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("fixture PDF must serialise");
    out
}

fn states(doc: &mut Document, on: &str) -> Dictionary {
    let mut normal = Dictionary::new();
    for state in [on, "Off"] {
        let stream = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        normal.set(state, stream);
    }
    normal
}

/// The PA form used across the scenario tests.
pub fn pa_form() -> Vec<u8> {
    build_form(
        2,
        &[
            (1, Widget::Text { name: "patient_name", label: "Patient name" }),
            (1, Widget::Checkbox { name: "smoker", on: "Yes" }),
            (2, Widget::Radio { name: "prior_treatment", choices: &["Yes", "No"] }),
            (2, Widget::Text { name: "physician", label: "Referring physician" }),
        ],
    )
}

// ── OCR stand-in ─────────────────────────────────────────────────────────────

/// Returns fixed pages; chooses the set by whether the PDF has a form.
pub struct StaticOcr {
    pub form_pages: Vec<&'static str>,
    pub referral_pages: Vec<&'static str>,
    pub calls: AtomicUsize,
}

impl StaticOcr {
    pub fn new(form_pages: Vec<&'static str>, referral_pages: Vec<&'static str>) -> Self {
        Self {
            form_pages,
            referral_pages,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OcrEngine for StaticOcr {
    async fn pages(&self, pdf: &[u8]) -> Result<Vec<PageText>, PaFillError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let is_form = edgequake_pafill::read_fields(pdf)
            .map(|fields| !fields.is_empty())
            .unwrap_or(false);
        let pages = if is_form { &self.form_pages } else { &self.referral_pages };
        Ok(pages
            .iter()
            .enumerate()
            .map(|(i, text)| PageText {
                page_number: i + 1,
                markdown: text.to_string(),
            })
            .collect())
    }
}

pub struct FailingOcr;

#[async_trait]
impl OcrEngine for FailingOcr {
    async fn pages(&self, _: &[u8]) -> Result<Vec<PageText>, PaFillError> {
        Err(PaFillError::OcrService {
            detail: "service returned 503 Service Unavailable".into(),
        })
    }
}

// ── Model stand-in ───────────────────────────────────────────────────────────

/// Describes every field in a description prompt; answers reconciliation
/// prompts with a fixed text.
pub struct ScriptedModel {
    pub reconcile_answer: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(reconcile_answer: impl Into<String>) -> Self {
        Self {
            reconcile_answer: reconcile_answer.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextCompletion for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, PaFillError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !prompt.starts_with("Prior Authorization document fields") {
            return Ok(self.reconcile_answer.clone());
        }
        let start = prompt.find('[').unwrap();
        let end = prompt.find("\n]").unwrap() + 2;
        let mut fields: Vec<serde_json::Value> = serde_json::from_str(&prompt[start..end]).unwrap();
        for field in &mut fields {
            let name = field["name"].as_str().unwrap().replace('_', " ");
            field["description"] = serde_json::json!(format!("The {name}"));
        }
        Ok(serde_json::to_string_pretty(&fields).unwrap())
    }
}
