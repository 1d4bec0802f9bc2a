//! Prompts for the two language-model stages, plus the referral summary
//! used by the diagnostic endpoint.
//!
//! Every instruction the model sees is built here, so prompt changes never
//! touch batching, parsing or error handling, and tests can inspect the
//! exact text without a provider.
//!
//! Both prompts are single user messages. The field JSON is embedded
//! pretty-printed; the document context follows it, marked with a trailing
//! `...` because it is usually a truncated excerpt.

/// Closing instruction of the description prompt.
pub const DESCRIBE_INSTRUCTIONS: &str = "Please return a JSON array of fields as is with filling the description value with a meaningful short description based on the document content. The output should be a valid JSON array and nothing else.";

/// Closing instructions of the reconciliation prompt.
pub const RECONCILE_INSTRUCTIONS: &str = r#"Instructions:
- Map each Prior Authorization field to its value from the referral document.
- For checkboxes and radio buttons, use "Yes" or "No" only.
- Use the "bbox" property to match fields spatially if needed.
- Use an empty string for fields the referral does not answer.
- Return only a valid JSON object mapping field names to values. Do NOT include comments or explanations, just the JSON."#;

/// Prompt asking the model to describe one batch of fields.
///
/// `batch_index` is 0-based; the prompt shows it 1-based as the group number.
pub fn describe_prompt(batch_index: usize, fields_json: &str, context: &str) -> String {
    format!(
        "Prior Authorization document fields (Group {}):\n{}\n\nDocument content:\n{}...\n\n{}",
        batch_index + 1,
        fields_json,
        context,
        DESCRIBE_INSTRUCTIONS
    )
}

/// Prompt asking the model to map every field to a value from the referral.
pub fn reconcile_prompt(fields_json: &str, referral_excerpt: &str) -> String {
    format!(
        "Insurance Prior Authorization PDF fields (with bounding boxes):\n{}\n\nReferral document excerpts:\n{}...\n\n{}\n",
        fields_json, referral_excerpt, RECONCILE_INSTRUCTIONS
    )
}

/// Fields the referral summary asks for, one per line.
pub const REFERRAL_SUMMARY_FIELDS: &str = "- patient_name\n- date_of_birth\n- diagnosis\n- cpt_codes (if any)";

/// Prompt asking the model to summarise a referral as JSON.
///
/// Used by [`crate::fill::inspect`]; the answer is returned verbatim and
/// never parsed.
pub fn referral_summary_prompt(document_text: &str) -> String {
    format!(
        "Extract the following fields from this medical referral document as JSON:\n{}\n\nDocument Text:\n{}",
        REFERRAL_SUMMARY_FIELDS, document_text
    )
}
