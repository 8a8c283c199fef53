//! Template resources embedded into the extraction prompt.
//!
//! Two UTF-8 resources drive the prompt: a receipt schema skeleton whose
//! element names match [`crate::document`], and a product-category taxonomy
//! that the model picks `<category>`/`<subcategory>` values from. Neither is
//! parsed here; both are embedded verbatim by [`crate::prompts::build_prompt`].
//!
//! The process-wide store is loaded at most once and is immutable afterwards.
//! Built-in copies ship inside the binary; a directory override can replace
//! them before first use.

use crate::error::HarinaError;
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing::{debug, info};

/// File name of the schema skeleton inside a templates directory.
pub const SCHEMA_FILE: &str = "receipt_template.xml";

/// File name of the category taxonomy inside a templates directory.
pub const TAXONOMY_FILE: &str = "product_categories.xml";

const BUILTIN_SCHEMA: &str = include_str!("../templates/receipt_template.xml");
const BUILTIN_TAXONOMY: &str = include_str!("../templates/product_categories.xml");

static GLOBAL: OnceCell<TemplateStore> = OnceCell::new();

/// The schema skeleton and taxonomy listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateStore {
    schema: String,
    taxonomy: String,
}

impl TemplateStore {
    /// Construct a store from in-memory text.
    pub fn new(schema: impl Into<String>, taxonomy: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            taxonomy: taxonomy.into(),
        }
    }

    /// The resources compiled into the crate.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_SCHEMA, BUILTIN_TAXONOMY)
    }

    /// Read [`SCHEMA_FILE`] and [`TAXONOMY_FILE`] from `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, HarinaError> {
        let dir = dir.as_ref();
        let schema = read_resource(&dir.join(SCHEMA_FILE))?;
        let taxonomy = read_resource(&dir.join(TAXONOMY_FILE))?;
        info!("Loaded templates from {}", dir.display());
        Ok(Self::new(schema, taxonomy))
    }

    /// The process-wide store, falling back to [`TemplateStore::builtin`]
    /// when nothing was installed with [`TemplateStore::init_from_dir`].
    pub fn global() -> &'static TemplateStore {
        GLOBAL.get_or_init(|| {
            debug!("Using built-in templates");
            Self::builtin()
        })
    }

    /// Load templates from `dir` into the process-wide store.
    ///
    /// The first successful initialisation wins; later calls (and calls made
    /// after [`TemplateStore::global`] already fell back to the built-ins)
    /// return the existing store without touching the filesystem.
    pub fn init_from_dir(dir: impl AsRef<Path>) -> Result<&'static TemplateStore, HarinaError> {
        GLOBAL.get_or_try_init(|| Self::load_dir(dir))
    }

    /// Document-schema skeleton text.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Category taxonomy text.
    pub fn taxonomy(&self) -> &str {
        &self.taxonomy
    }
}

fn read_resource(path: &Path) -> Result<String, HarinaError> {
    std::fs::read_to_string(path).map_err(|source| HarinaError::TemplateLoad {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_names_every_section() {
        let store = TemplateStore::builtin();
        for tag in [
            "<receipt>",
            "<store_info>",
            "<transaction_info>",
            "<receipt_number>",
            "<items>",
            "<unit_price>",
            "<total_price>",
            "<totals>",
            "<payment_info>",
            "<amount_paid>",
            "<change>",
        ] {
            assert!(store.schema().contains(tag), "schema lacks {tag}");
        }
    }

    #[test]
    fn builtin_taxonomy_is_not_empty() {
        assert!(TemplateStore::builtin().taxonomy().contains("<category"));
    }

    #[test]
    fn global_is_stable() {
        let a = TemplateStore::global() as *const TemplateStore;
        let b = TemplateStore::global() as *const TemplateStore;
        assert_eq!(a, b);
    }

    #[test]
    fn load_dir_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SCHEMA_FILE), "<receipt/>").unwrap();
        std::fs::write(dir.path().join(TAXONOMY_FILE), "Food\nDrinks").unwrap();
        let store = TemplateStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.schema(), "<receipt/>");
        assert_eq!(store.taxonomy(), "Food\nDrinks");
    }

    #[test]
    fn load_dir_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SCHEMA_FILE), "<receipt/>").unwrap();
        let err = TemplateStore::load_dir(dir.path()).unwrap_err();
        match err {
            HarinaError::TemplateLoad { path, .. } => {
                assert!(path.ends_with(TAXONOMY_FILE));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
