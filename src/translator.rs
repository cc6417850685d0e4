//! Runtime facade: configuration, catalog discovery and the swappable
//! active selection.
//!
//! A [`Translator`] owns its [`CatalogSource`] and the currently active
//! [`Selection`] behind one `RwLock`. Readers clone the selection `Arc` and
//! resolve against a complete snapshot; [`Translator::set_language`] and
//! [`Translator::reconfigure`] build the replacement first and swap it in
//! with a single write, so no reader ever observes a partially loaded
//! catalog.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::OnceCell;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::catalog::{Catalog, Request};
use crate::error::{CatalogError, LookupError};
use crate::loader::ParseOptions;
use crate::locales::locale_exists_as_international_standard;
use crate::placeholder;

const CATALOG_EXTENSION: &str = "ts";

/// Configuration for a [`Translator`].
///
/// ```
/// use ts_catalog::TranslatorConfig;
///
/// let config = TranslatorConfig::from_json_str(
///     r#"{ "catalog_dir": "share/translations", "file_prefix": "keepassxc_", "language": "cs" }"#,
/// ).unwrap();
/// assert_eq!(config.language, "cs");
/// assert_eq!(config.fallback_language, None);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Load catalogs embedded at build time instead of reading
    /// `catalog_dir`. Forced on for wasm32 and the `bundle-only` feature.
    pub use_bundled_catalogs: bool,
    /// Directory holding `<file_prefix><language>.ts` files.
    /// Default: "translations"
    pub catalog_dir: PathBuf,
    /// Default: ""
    pub file_prefix: String,
    /// Language to activate at start.
    /// Default: "en"
    pub language: String,
    /// Catalog consulted when the primary one lacks a translation.
    pub fallback_language: Option<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            use_bundled_catalogs: cfg!(target_arch = "wasm32") || cfg!(feature = "bundle-only"),
            catalog_dir: PathBuf::from("translations"),
            file_prefix: String::new(),
            language: "en".to_string(),
            fallback_language: None,
        }
    }
}

impl TranslatorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.use_bundled_catalogs |= cfg!(target_arch = "wasm32") || cfg!(feature = "bundle-only");
        Ok(config)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

// ---------- Sources ----------

/// Where catalogs for a language come from.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// No catalogs; every language resolves to source text.
    Empty,
    /// `<dir>/<prefix><language>.ts` on the filesystem.
    Directory { dir: PathBuf, prefix: String },
    /// Catalog documents keyed by file stem (`<prefix><language>`).
    Bundled {
        files: HashMap<String, String>,
        prefix: String,
    },
}

impl CatalogSource {
    fn from_config(config: &TranslatorConfig) -> Self {
        if config.use_bundled_catalogs {
            match bundled_catalogs() {
                Ok(files) if !files.is_empty() => {
                    return CatalogSource::Bundled {
                        files,
                        prefix: config.file_prefix.clone(),
                    };
                }
                Ok(_) => debug!("no bundled catalogs, reading catalog directory"),
                Err(e) => warn!("failed to read bundled catalogs: {e}"),
            }
        }
        CatalogSource::Directory {
            dir: config.catalog_dir.clone(),
            prefix: config.file_prefix.clone(),
        }
    }

    /// Load the catalog for `language`, trying `cs_CZ` before `cs`.
    ///
    /// Plural messages whose form count disagrees with the language's rule
    /// are served as source text rather than failing the whole catalog.
    pub fn load(&self, language: &str) -> Result<Catalog, CatalogError> {
        for candidate in candidate_languages(language) {
            match self {
                CatalogSource::Empty => break,
                CatalogSource::Directory { dir, prefix } => {
                    let path = dir.join(format!("{prefix}{candidate}.{CATALOG_EXTENSION}"));
                    if path.is_file() {
                        return ParseOptions::new().lenient_plurals(true).parse_path(&path);
                    }
                }
                CatalogSource::Bundled { files, prefix } => {
                    if let Some(text) = files.get(&format!("{prefix}{candidate}")) {
                        return ParseOptions::new().lenient_plurals(true).parse(text.as_bytes());
                    }
                }
            }
        }
        Err(CatalogError::NotFound(language.to_string()))
    }

    /// Languages with a catalog, sorted.
    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = match self {
            CatalogSource::Empty => Vec::new(),
            CatalogSource::Directory { dir, prefix } => match fs::read_dir(dir) {
                Ok(entries) => entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .filter(|path| {
                        path.is_file()
                            && path.extension().and_then(|e| e.to_str()) == Some(CATALOG_EXTENSION)
                    })
                    .filter_map(|path| {
                        let stem = path.file_stem()?.to_str()?;
                        stem.strip_prefix(prefix.as_str()).map(str::to_string)
                    })
                    .collect(),
                Err(e) => {
                    warn!(dir = %dir.display(), "failed to list catalogs: {e}");
                    Vec::new()
                }
            },
            CatalogSource::Bundled { files, prefix } => files
                .keys()
                .filter_map(|stem| stem.strip_prefix(prefix.as_str()).map(str::to_string))
                .collect(),
        };
        languages.retain(|l| !l.is_empty());
        languages.sort();
        languages
    }
}

/// `"cs-CZ"` → `["cs_CZ", "cs"]`.
pub fn candidate_languages(language: &str) -> Vec<String> {
    let mut current = language.replace('-', "_");
    let mut candidates = Vec::new();
    while !current.is_empty() {
        candidates.push(current.clone());
        match current.rfind('_') {
            Some(i) => current.truncate(i),
            None => break,
        }
    }
    candidates
}

/// Catalogs embedded by the build script, keyed by file stem.
pub fn bundled_catalogs() -> Result<HashMap<String, String>, CatalogError> {
    const BUNDLED_CATALOGS: &str = include_str!(concat!(env!("OUT_DIR"), "/bundled_catalogs.json"));
    Ok(serde_json::from_str(BUNDLED_CATALOGS)?)
}

// ---------- Selection ----------

/// Active catalogs: primary, then an optional fallback, then source text.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    primary: Option<Arc<Catalog>>,
    fallback: Option<Arc<Catalog>>,
}

impl Selection {
    pub fn new(primary: Catalog) -> Self {
        Self {
            primary: Some(Arc::new(primary)),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Catalog) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    pub fn primary(&self) -> Option<&Catalog> {
        self.primary.as_deref()
    }

    pub fn fallback(&self) -> Option<&Catalog> {
        self.fallback.as_deref()
    }

    pub fn resolve(&self, request: &Request<'_>) -> Result<String, LookupError> {
        let count = request.checked_count()?;
        for catalog in self.primary.iter().chain(self.fallback.iter()) {
            if let Some(template) = catalog.lookup(request)? {
                return Ok(placeholder::substitute(template, request.args, count));
            }
        }
        Ok(request.fallback(count))
    }
}

// ---------- Translator ----------

/// Where catalogs come from and what is currently selected from it. Both
/// are replaced under one lock so a reconfigured source never pairs with a
/// stale selection.
#[derive(Debug, Clone)]
struct State {
    source: Arc<CatalogSource>,
    selection: Arc<Selection>,
}

/// Swappable translation front end shared by the UI.
#[derive(Debug)]
pub struct Translator {
    state: RwLock<State>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(CatalogSource::Empty)
    }
}

impl Translator {
    /// A translator with nothing selected yet.
    pub fn new(source: CatalogSource) -> Self {
        Self {
            state: RwLock::new(State {
                source: Arc::new(source),
                selection: Arc::new(Selection::default()),
            }),
        }
    }

    /// Build from configuration and activate the configured language.
    ///
    /// A catalog that fails to load is logged and skipped; the translator
    /// then serves source text.
    pub fn from_config(config: &TranslatorConfig) -> Self {
        let translator = Self::default();
        if let Err(e) = translator.reconfigure(config) {
            warn!(language = %config.language, "using source text: {e}");
        }
        translator
    }

    /// A translator serving a single in-memory catalog.
    pub fn with_catalog(catalog: Catalog) -> Self {
        let translator = Self::default();
        translator.install(Selection::new(catalog));
        translator
    }

    fn state(&self) -> State {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current selection. Holding the snapshot keeps its catalogs alive
    /// across later swaps.
    pub fn snapshot(&self) -> Arc<Selection> {
        self.state().selection
    }

    /// Replace the active selection.
    pub fn install(&self, selection: Selection) {
        let selection = Arc::new(selection);
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .selection = selection;
    }

    /// Switch to the catalog source described by `config` and activate its
    /// language.
    ///
    /// The new source is adopted even when the language fails to load; the
    /// previous selection then stays active and the error is returned.
    pub fn reconfigure(&self, config: &TranslatorConfig) -> Result<(), CatalogError> {
        let source = Arc::new(CatalogSource::from_config(config));
        let loaded = load_selection(
            &source,
            &config.language,
            config.fallback_language.as_deref(),
        );
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.source = source;
        let selection = loaded?;
        state.selection = Arc::new(selection);
        debug!(language = %config.language, "reconfigured catalogs");
        Ok(())
    }

    /// Load catalogs for `language` (and `fallback`) and make them active.
    ///
    /// On error the previous selection stays in place. A missing fallback
    /// catalog is only logged.
    pub fn set_language(&self, language: &str, fallback: Option<&str>) -> Result<(), CatalogError> {
        let source = self.state().source;
        let selection = load_selection(&source, language, fallback)?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !Arc::ptr_eq(&state.source, &source) {
            debug!(language, "catalog source changed while loading, discarding");
            return Ok(());
        }
        state.selection = Arc::new(selection);
        debug!(language, "activated catalog");
        Ok(())
    }

    /// Drop every catalog; all strings become source text.
    pub fn clear(&self) {
        self.install(Selection::default());
    }

    /// Language of the active primary catalog.
    pub fn language(&self) -> Option<String> {
        self.snapshot()
            .primary()
            .and_then(|c| c.language().map(str::to_string))
    }

    pub fn available_languages(&self) -> Vec<String> {
        self.state().source.languages()
    }

    /// Resolve a request. Never fails: malformed requests are logged and
    /// answered with the source text.
    pub fn translate(&self, request: &Request<'_>) -> String {
        match self.snapshot().resolve(request) {
            Ok(text) => text,
            Err(e) => {
                warn!(context = request.context, source = request.source, "{e}");
                request.fallback(None)
            }
        }
    }

    pub fn tr(&self, context: &str, source: &str) -> String {
        self.translate(&Request::new(context, source))
    }
}

fn load_selection(
    source: &CatalogSource,
    language: &str,
    fallback: Option<&str>,
) -> Result<Selection, CatalogError> {
    if !locale_exists_as_international_standard(language) {
        warn!(language, "language is not an ISO 639-1 code");
    }
    let mut selection = Selection::new(source.load(language)?);
    if let Some(fallback) = fallback.filter(|f| *f != language) {
        match source.load(fallback) {
            Ok(catalog) => selection = selection.with_fallback(catalog),
            Err(e) => warn!(fallback, "fallback catalog unavailable: {e}"),
        }
    }
    Ok(selection)
}

// ---------- Process-wide accessor ----------

static GLOBAL: OnceCell<Translator> = OnceCell::new();

/// Initialize the process-wide translator. Returns `false` when it was
/// already initialized (for instance by an earlier [`tr`] call), in which
/// case the existing instance is reconfigured instead.
pub fn init_global(config: &TranslatorConfig) -> bool {
    let mut created = false;
    let translator = GLOBAL.get_or_init(|| {
        created = true;
        Translator::from_config(config)
    });
    if !created {
        if let Err(e) = translator.reconfigure(config) {
            warn!(language = %config.language, "keeping previous catalog: {e}");
        }
    }
    created
}

/// The process-wide translator; serves source text until initialized.
pub fn global() -> &'static Translator {
    GLOBAL.get_or_init(Translator::default)
}

/// Translate through the process-wide translator.
pub fn tr(context: &str, source: &str) -> String {
    global().tr(context, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogBuilder, Message};

    fn catalog(language: &str, source: &str, text: &str) -> Catalog {
        let mut b = CatalogBuilder::new(Some(language));
        b.context("Database").unwrap();
        b.message(Message::new(source, text)).unwrap();
        b.build()
    }

    #[test]
    fn candidates_strip_region() {
        assert_eq!(candidate_languages("cs-CZ"), vec!["cs_CZ", "cs"]);
        assert_eq!(candidate_languages("zh_Hant_TW"), vec!["zh_Hant_TW", "zh_Hant", "zh"]);
        assert_eq!(candidate_languages("cs"), vec!["cs"]);
        assert!(candidate_languages("").is_empty());
    }

    #[test]
    fn fallback_catalog_is_consulted() {
        let selection = Selection::new(catalog("cs", "Recycle Bin", "Koš"))
            .with_fallback(catalog("sk", "Root", "Koreň"));
        let translator = Translator::default();
        translator.install(selection);
        assert_eq!(translator.tr("Database", "Recycle Bin"), "Koš");
        assert_eq!(translator.tr("Database", "Root"), "Koreň");
        assert_eq!(translator.tr("Database", "Missing"), "Missing");
    }

    #[test]
    fn invalid_count_yields_source_text() {
        let translator = Translator::with_catalog(catalog("cs", "Recycle Bin", "Koš"));
        let req = Request::new("Database", "Recycle Bin").count(-3);
        assert_eq!(translator.translate(&req), "Recycle Bin");
    }

    #[test]
    fn swap_keeps_old_snapshot_alive() {
        let translator = Translator::with_catalog(catalog("cs", "Recycle Bin", "Koš"));
        let before = translator.snapshot();
        translator.install(Selection::new(catalog("sk", "Recycle Bin", "Kôš")));
        assert_eq!(before.resolve(&Request::new("Database", "Recycle Bin")).unwrap(), "Koš");
        assert_eq!(translator.tr("Database", "Recycle Bin"), "Kôš");
        assert_eq!(translator.language().as_deref(), Some("sk"));
        translator.clear();
        assert_eq!(translator.tr("Database", "Recycle Bin"), "Recycle Bin");
        assert_eq!(translator.language(), None);
    }

    #[test]
    fn readers_never_see_a_partial_swap() {
        let translator = Translator::with_catalog(catalog("cs", "Recycle Bin", "Koš"));
        let cs = Selection::new(catalog("cs", "Recycle Bin", "Koš"));
        let sk = Selection::new(catalog("sk", "Recycle Bin", "Kôš"));

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..2_000 {
                        let text = translator.tr("Database", "Recycle Bin");
                        assert!(text == "Koš" || text == "Kôš", "unexpected {text:?}");
                    }
                });
            }
            for i in 0..500 {
                let next = if i % 2 == 0 { sk.clone() } else { cs.clone() };
                translator.install(next);
            }
        });
        assert!(matches!(translator.language().as_deref(), Some("cs" | "sk")));
    }

    #[test]
    fn reconfigure_swaps_source_and_selection() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("app_cs.ts"),
            r#"<TS language="cs"><context><name>Database</name>
<message><source>Recycle Bin</source><translation>Koš</translation></message>
</context></TS>"#,
        )
        .unwrap();

        let translator = Translator::default();
        assert_eq!(translator.tr("Database", "Recycle Bin"), "Recycle Bin");

        let config = TranslatorConfig {
            use_bundled_catalogs: false,
            catalog_dir: dir.path().to_path_buf(),
            file_prefix: "app_".into(),
            language: "cs".into(),
            fallback_language: None,
        };
        translator.reconfigure(&config).unwrap();
        assert_eq!(translator.tr("Database", "Recycle Bin"), "Koš");
        assert_eq!(translator.available_languages(), vec!["cs"]);

        let missing = TranslatorConfig {
            language: "sk".into(),
            ..config
        };
        assert!(matches!(
            translator.reconfigure(&missing),
            Err(CatalogError::NotFound(_))
        ));
        assert_eq!(translator.tr("Database", "Recycle Bin"), "Koš");
    }

    #[test]
    fn bad_plural_message_keeps_rest_of_locale() {
        let mut files = HashMap::new();
        files.insert(
            "cs".to_string(),
            r#"<TS language="cs"><context><name>Database</name>
<message><source>Recycle Bin</source><translation>Koš</translation></message>
<message numerus="yes"><source>%n Entry(s)</source>
<translation><numerusform>%n položka</numerusform><numerusform>%n položky</numerusform><numerusform>%n položek</numerusform></translation>
</message></context></TS>"#
                .to_string(),
        );
        let translator = Translator::new(CatalogSource::Bundled {
            files,
            prefix: String::new(),
        });
        translator.set_language("cs", None).unwrap();
        assert_eq!(translator.tr("Database", "Recycle Bin"), "Koš");
        let req = Request::new("Database", "%n Entry(s)").count(3);
        assert_eq!(translator.translate(&req), "3 Entry(s)");
    }

    #[test]
    fn empty_source_has_nothing_to_load() {
        let translator = Translator::default();
        assert!(matches!(
            translator.set_language("cs", None),
            Err(CatalogError::NotFound(_))
        ));
        assert!(translator.available_languages().is_empty());
    }

    #[test]
    fn bundled_source_looks_up_by_stem() {
        let mut files = HashMap::new();
        files.insert(
            "app_cs".to_string(),
            r#"<TS language="cs"><context><name>Database</name>
<message><source>Recycle Bin</source><translation>Koš</translation></message>
</context></TS>"#
                .to_string(),
        );
        let source = CatalogSource::Bundled {
            files,
            prefix: "app_".into(),
        };
        assert_eq!(source.languages(), vec!["cs"]);
        let translator = Translator::new(source);
        translator.set_language("cs_CZ", None).unwrap();
        assert_eq!(translator.tr("Database", "Recycle Bin"), "Koš");
    }

    #[test]
    fn config_defaults_and_json() {
        let config = TranslatorConfig::default();
        assert_eq!(config.catalog_dir, PathBuf::from("translations"));
        assert_eq!(config.language, "en");

        let config =
            TranslatorConfig::from_json_str(r#"{ "language": "cs", "fallback_language": "sk" }"#)
                .unwrap();
        assert_eq!(config.fallback_language.as_deref(), Some("sk"));
        assert_eq!(config.file_prefix, "");

        assert!(matches!(
            TranslatorConfig::from_json_str("{ not json"),
            Err(CatalogError::Config(_))
        ));
    }

    #[test]
    fn bundled_catalogs_parse() {
        for (stem, text) in bundled_catalogs().unwrap() {
            let parsed = ParseOptions::new().lenient_plurals(true).parse(text.as_bytes());
            assert!(parsed.is_ok(), "{stem} is not a TS catalog");
        }
    }
}
