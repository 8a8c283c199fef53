//! Instruction text sent to the vision model alongside a receipt image.
//!
//! Centralising the prompt here keeps the wording in one place and lets unit
//! tests inspect it without a model in the loop. The schema skeleton and the
//! category taxonomy come from [`crate::templates::TemplateStore`] and are
//! embedded verbatim.

use crate::templates::TemplateStore;

/// Opening paragraph, followed by the schema skeleton.
pub const PROMPT_HEADER: &str =
    "Analyse this receipt image and extract its contents in the following XML format:";

/// Sentence introducing the category taxonomy.
pub const TAXONOMY_INTRO: &str =
    "Use the following classification when assigning product categories:";

/// Closing rules appended after the taxonomy.
pub const PROMPT_RULES: &str = r#"For each item, choose the most appropriate category and subcategory.
If a piece of information cannot be read, leave the element empty or omit it.
Write numbers as digits only, without currency symbols.
Output only the XML tags, with no other explanatory text."#;

/// Build the extraction instruction from a schema skeleton and a taxonomy.
///
/// Both inputs are opaque: they are neither parsed nor escaped.
pub fn build_prompt(schema: &str, taxonomy: &str) -> String {
    format!("{PROMPT_HEADER}\n\n{schema}\n\n{TAXONOMY_INTRO}\n\n{taxonomy}\n\n{PROMPT_RULES}\n")
}

/// [`build_prompt`] over the resources held by `store`.
pub fn build_prompt_from_store(store: &TemplateStore) -> String {
    build_prompt(store.schema(), store.taxonomy())
}
