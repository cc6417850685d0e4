#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

//! # ts-catalog
//!
//! - **Loader**: streaming TS parser with line/column errors
//! - **Lookup**: `(context, source, disambiguation)` keys, plural forms
//!   chosen by per-language rules, `%1`-style placeholders
//! - **Fallback**: anything missing, unfinished or empty resolves to the
//!   source text; lookups never fail for missing translations
//! - **Serializer**: writes catalogs back out as TS documents
//! - **Translator**: configuration, catalog discovery and an atomically
//!   swappable active catalog

pub mod catalog;
pub mod error;
mod loader;
mod locales;
pub mod placeholder;
pub mod plural;
pub mod translator;
mod writer;

pub use catalog::{
    Catalog, CatalogBuilder, CatalogStats, Context, Location, Message, Request, Translation,
    TranslationStatus,
};
pub use error::{CatalogError, LookupError};
pub use loader::ParseOptions;
pub use locales::locale_exists_as_international_standard;
pub use plural::{PluralCategory, PluralRule, plural_category};
pub use translator::{
    CatalogSource, Selection, Translator, TranslatorConfig, global, init_global, tr,
};
