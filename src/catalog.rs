//! In-memory catalog and the lookup engine.
//!
//! # Invariants
//!
//! 1. Within a context, `(source, disambiguation)` is unique among live
//!    (finished or unfinished) messages. An empty disambiguation is the same
//!    key as none.
//! 2. Obsolete and vanished messages are kept for serialization only and
//!    never take part in lookup.
//! 3. A loaded catalog is never mutated; `Catalog` is `Send + Sync`.
//!
//! # Fallback
//!
//! | Condition | Result |
//! |-----------|--------|
//! | No matching message | source text |
//! | Unfinished / obsolete / vanished | source text |
//! | Empty translation | source text |
//! | Empty plural form | most populated non-empty form, then source text |
//! | Negative plural count | `LookupError::InvalidPluralCount` |

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::error::{CatalogError, LookupError};
use crate::placeholder;
use crate::plural::PluralRule;

/// Completion state of a message, from the `type` attribute of
/// `<translation>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStatus {
    #[default]
    Finished,
    Unfinished,
    /// Source string no longer present in the program.
    Obsolete,
    /// Removed by a newer extraction run; treated like obsolete.
    Vanished,
}

impl TranslationStatus {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "unfinished" => Some(Self::Unfinished),
            "obsolete" => Some(Self::Obsolete),
            "vanished" => Some(Self::Vanished),
            _ => None,
        }
    }

    /// Attribute value, or `None` for finished messages.
    pub fn as_attr(self) -> Option<&'static str> {
        match self {
            Self::Finished => None,
            Self::Unfinished => Some("unfinished"),
            Self::Obsolete => Some("obsolete"),
            Self::Vanished => Some("vanished"),
        }
    }

    /// Whether the message participates in lookup.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Finished | Self::Unfinished)
    }
}

/// Translated text of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Single(String),
    /// One form per plural category of the catalog language, in rule order.
    Plural(Vec<String>),
}

impl Default for Translation {
    fn default() -> Self {
        Translation::Single(String::new())
    }
}

impl Translation {
    pub fn is_empty(&self) -> bool {
        match self {
            Translation::Single(s) => s.is_empty(),
            Translation::Plural(forms) => forms.iter().all(String::is_empty),
        }
    }
}

/// A source-code location a message was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub filename: Option<String>,
    pub line: Option<String>,
}

/// One translatable unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub source: String,
    /// Disambiguating comment (`<comment>`).
    pub disambiguation: Option<String>,
    pub translation: Translation,
    pub status: TranslationStatus,
    /// Developer comment for translators (`<extracomment>`).
    pub extra_comment: Option<String>,
    pub translator_comment: Option<String>,
    pub old_source: Option<String>,
    pub locations: Vec<Location>,
}

impl Message {
    /// Finished message with a single translation.
    pub fn new(source: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            translation: Translation::Single(translation.into()),
            ..Default::default()
        }
    }

    /// Finished message with plural forms.
    pub fn plural(source: impl Into<String>, forms: Vec<String>) -> Self {
        Self {
            source: source.into(),
            translation: Translation::Plural(forms),
            ..Default::default()
        }
    }

    pub fn with_disambiguation(mut self, comment: impl Into<String>) -> Self {
        self.disambiguation = Some(comment.into()).filter(|c: &String| !c.is_empty());
        self
    }

    pub fn with_status(mut self, status: TranslationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_plural(&self) -> bool {
        matches!(self.translation, Translation::Plural(_))
    }

    fn key(&self) -> MessageKey {
        (self.source.clone(), self.disambiguation.clone())
    }
}

type MessageKey = (String, Option<String>);

/// Named group of messages, usually a dialog or class name.
#[derive(Debug, Clone, Default)]
pub struct Context {
    name: String,
    messages: Vec<Message>,
    index: HashMap<MessageKey, usize>,
}

impl Context {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages in document order, including obsolete ones.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Live message for `(source, disambiguation)`.
    pub fn get(&self, source: &str, disambiguation: Option<&str>) -> Option<&Message> {
        let key = (
            source.to_string(),
            disambiguation.filter(|d| !d.is_empty()).map(str::to_string),
        );
        self.index.get(&key).map(|&i| &self.messages[i])
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Incremental construction of a [`Catalog`], enforcing its invariants.
///
/// Used by the loader; also handy for building catalogs in code.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    version: Option<String>,
    source_language: Option<String>,
    language: Option<String>,
    rule: Option<PluralRule>,
    lenient_plurals: bool,
    contexts: Vec<Context>,
    context_index: HashMap<String, usize>,
}

impl CatalogBuilder {
    pub fn new(language: Option<&str>) -> Self {
        let language = language.filter(|l| !l.is_empty()).map(str::to_string);
        let rule = language.as_deref().and_then(PluralRule::for_language);
        Self {
            language,
            rule,
            ..Default::default()
        }
    }

    pub fn version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn source_language(mut self, language: Option<String>) -> Self {
        self.source_language = language.filter(|l| !l.is_empty());
        self
    }

    /// Demote plural messages with the wrong form count to unfinished
    /// instead of rejecting them.
    pub fn lenient_plurals(mut self, lenient: bool) -> Self {
        self.lenient_plurals = lenient;
        self
    }

    /// Form slots each plural message must carry.
    pub fn plural_form_count(&self) -> usize {
        self.rule.unwrap_or(PluralRule::DEFAULT).form_count()
    }

    /// Whether the declared language has an entry in the rule table.
    pub fn has_known_rule(&self) -> bool {
        self.rule.is_some()
    }

    /// Open a new context. Names must be unique.
    pub fn context(&mut self, name: impl Into<String>) -> Result<&mut Self, CatalogError> {
        let name = name.into();
        if self.context_index.contains_key(&name) {
            return Err(CatalogError::DuplicateContext(name));
        }
        self.context_index.insert(name.clone(), self.contexts.len());
        self.contexts.push(Context {
            name,
            ..Default::default()
        });
        Ok(self)
    }

    /// Append a message to the most recently opened context. A message
    /// added before any context opens an unnamed one.
    pub fn message(&mut self, mut message: Message) -> Result<&mut Self, CatalogError> {
        if self.contexts.is_empty() {
            self.context("")?;
        }
        let rule = self.rule.unwrap_or(PluralRule::DEFAULT);
        let language = self.language.clone().unwrap_or_default();
        let last = self.contexts.len() - 1;
        let context = &mut self.contexts[last];

        if let Translation::Plural(forms) = &message.translation {
            if forms.len() != rule.form_count() {
                let err = CatalogError::PluralRuleMismatch {
                    language,
                    context: context.name.clone(),
                    source_text: message.source.clone(),
                    expected: rule.form_count(),
                    found: forms.len(),
                };
                if !self.lenient_plurals {
                    return Err(err);
                }
                warn!("{err}, serving source text");
                if message.status == TranslationStatus::Finished {
                    message.status = TranslationStatus::Unfinished;
                }
            }
        }

        if message.status.is_live() {
            let key = message.key();
            if context.index.contains_key(&key) {
                return Err(CatalogError::DuplicateMessage {
                    context: context.name.clone(),
                    source_text: message.source,
                });
            }
            context.index.insert(key, context.messages.len());
        }
        context.messages.push(message);
        Ok(self)
    }

    pub fn build(self) -> Catalog {
        Catalog {
            version: self.version,
            source_language: self.source_language,
            language: self.language,
            rule: self.rule.unwrap_or(PluralRule::DEFAULT),
            contexts: self.contexts,
            context_index: self.context_index,
        }
    }
}

/// Immutable translation catalog for one language.
#[derive(Debug, Clone)]
pub struct Catalog {
    version: Option<String>,
    source_language: Option<String>,
    language: Option<String>,
    rule: PluralRule,
    contexts: Vec<Context>,
    context_index: HashMap<String, usize>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::empty()
    }
}

/// A request for a display string.
///
/// ```
/// use ts_catalog::Request;
///
/// let args: [&dyn ToString; 1] = [&3];
/// let req = Request::new("MainWindow", "%1 Entry(s)").count(3).args(&args);
/// assert_eq!(req.count, Some(3));
/// ```
#[derive(Clone, Copy)]
pub struct Request<'a> {
    pub context: &'a str,
    pub source: &'a str,
    pub disambiguation: Option<&'a str>,
    pub args: &'a [&'a dyn ToString],
    pub count: Option<i64>,
}

impl std::fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("context", &self.context)
            .field("source", &self.source)
            .field("disambiguation", &self.disambiguation)
            .field("args", &self.args.len())
            .field("count", &self.count)
            .finish()
    }
}

impl<'a> Request<'a> {
    pub fn new(context: &'a str, source: &'a str) -> Self {
        Self {
            context,
            source,
            disambiguation: None,
            args: &[],
            count: None,
        }
    }

    pub fn disambiguation(mut self, comment: &'a str) -> Self {
        self.disambiguation = Some(comment);
        self
    }

    pub fn args(mut self, args: &'a [&'a dyn ToString]) -> Self {
        self.args = args;
        self
    }

    pub fn count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }

    /// The count as an unsigned quantity, rejecting negative values.
    pub fn checked_count(&self) -> Result<Option<u64>, LookupError> {
        match self.count {
            Some(n) if n < 0 => Err(LookupError::InvalidPluralCount(n)),
            Some(n) => Ok(Some(n.unsigned_abs())),
            None => Ok(None),
        }
    }

    /// Source text with placeholders substituted; the universal fallback.
    pub fn fallback(&self, count: Option<u64>) -> String {
        placeholder::substitute(self.source, self.args, count)
    }
}

impl Catalog {
    /// A catalog with no messages; every lookup yields source text.
    pub fn empty() -> Self {
        CatalogBuilder::new(None).build()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn source_language(&self) -> Option<&str> {
        self.source_language.as_deref()
    }

    /// Target language code, e.g. `"cs"`.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn plural_rule(&self) -> PluralRule {
        self.rule
    }

    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn context(&self, name: &str) -> Option<&Context> {
        self.context_index.get(name).map(|&i| &self.contexts[i])
    }

    /// Live message for a key, regardless of its completion state.
    pub fn message(
        &self,
        context: &str,
        source: &str,
        disambiguation: Option<&str>,
    ) -> Option<&Message> {
        self.context(context)
            .and_then(|ctx| ctx.get(source, disambiguation))
    }

    /// Raw translated template for a request, before substitution.
    ///
    /// `Ok(None)` means the caller should fall back (to another catalog or
    /// the source text).
    pub fn lookup(&self, request: &Request<'_>) -> Result<Option<&str>, LookupError> {
        let count = request.checked_count()?;
        let Some(message) = self.message(request.context, request.source, request.disambiguation)
        else {
            return Ok(None);
        };
        if message.status != TranslationStatus::Finished {
            return Ok(None);
        }

        let text = match &message.translation {
            Translation::Single(s) => Some(s.as_str()).filter(|s| !s.is_empty()),
            Translation::Plural(forms) => self.select_form(forms, count),
        };
        Ok(text)
    }

    /// Resolve a request to a display string.
    ///
    /// Only fails for malformed requests; a missing or untranslated message
    /// yields the source text.
    pub fn resolve(&self, request: &Request<'_>) -> Result<String, LookupError> {
        let count = request.checked_count()?;
        let text = match self.lookup(request)? {
            Some(template) => placeholder::substitute(template, request.args, count),
            None => request.fallback(count),
        };
        Ok(text)
    }

    /// Shorthand for a plain `(context, source)` lookup.
    pub fn tr(&self, context: &str, source: &str) -> String {
        self.resolve(&Request::new(context, source))
            .unwrap_or_else(|_| source.to_string())
    }

    fn select_form<'s>(&self, forms: &'s [String], count: Option<u64>) -> Option<&'s str> {
        if let Some(n) = count {
            let chosen = forms.get(self.rule.form_index(n)).filter(|f| !f.is_empty());
            if let Some(form) = chosen {
                return Some(form.as_str());
            }
        }
        most_populated_form(forms, self.rule)
    }

    /// Counts of messages per state, for translation progress reports.
    pub fn statistics(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            language: self.language.clone(),
            contexts: self.contexts.len(),
            ..Default::default()
        };
        for message in self.contexts.iter().flat_map(|c| c.messages.iter()) {
            stats.messages += 1;
            match message.status {
                TranslationStatus::Finished => stats.finished += 1,
                TranslationStatus::Unfinished => stats.unfinished += 1,
                TranslationStatus::Obsolete => stats.obsolete += 1,
                TranslationStatus::Vanished => stats.vanished += 1,
            }
            if message.is_plural() {
                stats.plural += 1;
            }
            if message.status == TranslationStatus::Finished && has_marker_mismatch(message) {
                stats.placeholder_mismatches += 1;
            }
        }
        let live = stats.finished + stats.unfinished;
        stats.completion = if live == 0 {
            1.0
        } else {
            stats.finished as f32 / live as f32
        };
        stats
    }
}

/// Prefer the `other` slot, which covers the most counts, then the
/// remaining slots from last to first.
fn most_populated_form(forms: &[String], rule: PluralRule) -> Option<&str> {
    let other = rule.other_index().min(forms.len().saturating_sub(1));
    std::iter::once(other)
        .chain((0..forms.len()).rev())
        .filter_map(|i| forms.get(i))
        .find(|f| !f.is_empty())
        .map(String::as_str)
}

fn has_marker_mismatch(message: &Message) -> bool {
    let expected = placeholder::highest_marker(&message.source);
    let texts: Vec<&str> = match &message.translation {
        Translation::Single(s) => vec![s.as_str()],
        Translation::Plural(forms) => forms.iter().map(String::as_str).collect(),
    };
    texts
        .into_iter()
        .filter(|t| !t.is_empty())
        .any(|t| placeholder::highest_marker(t) > expected)
}

/// Translation progress for one catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogStats {
    pub language: Option<String>,
    pub contexts: usize,
    pub messages: usize,
    pub finished: usize,
    pub unfinished: usize,
    pub obsolete: usize,
    pub vanished: usize,
    pub plural: usize,
    /// Finished messages whose translation uses a `%N` marker beyond those
    /// in the source text.
    pub placeholder_mismatches: usize,
    /// Finished share of live messages, `0.0..=1.0`.
    pub completion: f32,
}
