//! TS catalog parser.
//!
//! Streams XML events so that every failure can report the 1-based line and
//! column it happened at. Layout accepted:
//!
//! ```text
//! TS (version, language, sourcelanguage)
//! ├── defaultcodec?, dependencies?, extra-*
//! └── context*
//!     ├── name
//!     ├── comment?
//!     └── message* (numerus="yes"?)
//!         ├── location*, source, oldsource?, comment?, oldcomment?
//!         ├── extracomment?, translatorcomment?
//!         ├── translation (type=unfinished|obsolete|vanished)?
//!         │   └── text | numerusform* | lengthvariant*
//!         └── userdata?, extra-*
//! ```

use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, warn};
use xml::attribute::OwnedAttribute;
use xml::common::{Position, TextPosition};
use xml::reader::{EventReader, ParserConfig, XmlEvent};

use crate::catalog::{
    Catalog, CatalogBuilder, Location, Message, Translation, TranslationStatus,
};
use crate::error::CatalogError;

/// Options controlling how strictly a catalog is parsed.
///
/// By default every violation is an error. With `lenient_plurals`, a plural
/// message whose form count does not match the language's rule is logged
/// and demoted to unfinished, so it resolves to source text while the rest
/// of the catalog stays usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    lenient_plurals: bool,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demote plural messages with the wrong form count instead of failing.
    #[must_use]
    pub fn lenient_plurals(mut self, lenient: bool) -> Self {
        self.lenient_plurals = lenient;
        self
    }

    pub fn parse<R: Read>(self, reader: R) -> Result<Catalog, CatalogError> {
        TsReader::new(reader, self).read_catalog()
    }

    /// Read and parse a catalog file.
    pub fn parse_path(self, path: impl AsRef<Path>) -> Result<Catalog, CatalogError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = self.parse(bytes.as_slice())?;
        debug!(
            path = %path.display(),
            language = catalog.language().unwrap_or_default(),
            contexts = catalog.contexts().len(),
            "loaded catalog"
        );
        Ok(catalog)
    }
}

impl Catalog {
    /// Parse a catalog from a byte stream.
    ///
    /// Calling this method is equivalent to calling
    /// `ParseOptions::new().parse(reader)`.
    ///
    /// # Example
    ///
    /// ```
    /// use ts_catalog::Catalog;
    ///
    /// let ts = r#"<TS version="2.1" language="cs">
    ///   <context><name>AboutDialog</name>
    ///     <message><source>About</source><translation>O aplikaci</translation></message>
    ///   </context>
    /// </TS>"#;
    /// let catalog = Catalog::parse(ts.as_bytes()).unwrap();
    /// assert_eq!(catalog.tr("AboutDialog", "About"), "O aplikaci");
    /// ```
    pub fn parse<R: Read>(reader: R) -> Result<Self, CatalogError> {
        ParseOptions::new().parse(reader)
    }

    /// Read and parse a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        ParseOptions::new().parse_path(path)
    }
}

impl FromStr for Catalog {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

enum Event {
    Start {
        name: String,
        attributes: Vec<OwnedAttribute>,
    },
    End(String),
    Text(String),
    Eof,
}

struct TsReader<R: Read> {
    events: EventReader<R>,
    options: ParseOptions,
}

impl<R: Read> TsReader<R> {
    fn new(reader: R, options: ParseOptions) -> Self {
        let events = ParserConfig::new()
            .trim_whitespace(false)
            .whitespace_to_characters(true)
            .cdata_to_characters(true)
            .ignore_comments(true)
            .create_reader(reader);
        Self { events, options }
    }

    fn next(&mut self) -> Result<Event, CatalogError> {
        loop {
            match self.events.next() {
                Ok(XmlEvent::StartElement {
                    name, attributes, ..
                }) => {
                    return Ok(Event::Start {
                        name: name.local_name,
                        attributes,
                    });
                }
                Ok(XmlEvent::EndElement { name }) => return Ok(Event::End(name.local_name)),
                Ok(XmlEvent::Characters(s) | XmlEvent::CData(s) | XmlEvent::Whitespace(s)) => {
                    return Ok(Event::Text(s));
                }
                Ok(XmlEvent::EndDocument) => return Ok(Event::Eof),
                Ok(_) => continue,
                Err(e) => return Err(parse_error(e.position(), e.msg())),
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> CatalogError {
        parse_error(self.events.position(), message)
    }

    fn unexpected(&self, name: &str, parent: &str) -> CatalogError {
        self.error(format!("unexpected element <{name}> inside <{parent}>"))
    }

    fn read_catalog(mut self) -> Result<Catalog, CatalogError> {
        let attributes = loop {
            match self.next()? {
                Event::Start { name, attributes } if name == "TS" => break attributes,
                Event::Start { name, .. } => {
                    return Err(self.error(format!("expected root element <TS>, found <{name}>")));
                }
                Event::Text(t) if t.trim().is_empty() => {}
                Event::Text(_) => return Err(self.error("text outside the root element")),
                Event::End(_) | Event::Eof => return Err(self.error("missing root element <TS>")),
            }
        };

        let language = attr(&attributes, "language");
        let mut builder = CatalogBuilder::new(language.as_deref())
            .version(attr(&attributes, "version"))
            .source_language(attr(&attributes, "sourcelanguage"))
            .lenient_plurals(self.options.lenient_plurals);
        if let Some(language) = language.as_deref().filter(|_| !builder.has_known_rule()) {
            warn!(language, "no plural rule for catalog language, using default");
        }

        loop {
            match self.next()? {
                Event::Start { name, .. } if name == "context" => {
                    self.read_context(&mut builder)?;
                }
                Event::Start { name, .. } if is_ignored(&name) => {
                    self.skip(&name)?;
                }
                Event::Start { name, .. } => return Err(self.unexpected(&name, "TS")),
                Event::End(name) if name == "TS" => break,
                Event::End(name) => {
                    return Err(self.error(format!("unexpected closing tag </{name}>")));
                }
                Event::Text(t) if t.trim().is_empty() => {}
                Event::Text(_) => return Err(self.error("unexpected text inside <TS>")),
                Event::Eof => return Err(self.error("unterminated element <TS>")),
            }
        }

        Ok(builder.build())
    }

    fn read_context(&mut self, builder: &mut CatalogBuilder) -> Result<(), CatalogError> {
        let mut named = false;
        loop {
            match self.next()? {
                Event::Start { name, .. } if name == "name" => {
                    if named {
                        return Err(self.error("context has more than one <name>"));
                    }
                    let context_name = self.read_text("name")?;
                    builder.context(context_name)?;
                    named = true;
                }
                Event::Start { name, attributes } if name == "message" => {
                    if !named {
                        return Err(self.error("<message> before the context <name>"));
                    }
                    let message = self.read_message(&attributes, builder.plural_form_count())?;
                    builder.message(message)?;
                }
                Event::Start { name, .. } if name == "comment" || is_ignored(&name) => {
                    self.skip(&name)?;
                }
                Event::Start { name, .. } => return Err(self.unexpected(&name, "context")),
                Event::End(name) if name == "context" => break,
                Event::End(name) => {
                    return Err(self.error(format!("unexpected closing tag </{name}>")));
                }
                Event::Text(t) if t.trim().is_empty() => {}
                Event::Text(_) => return Err(self.error("unexpected text inside <context>")),
                Event::Eof => return Err(self.error("unterminated element <context>")),
            }
        }
        if !named {
            return Err(self.error("context without <name>"));
        }
        Ok(())
    }

    fn read_message(
        &mut self,
        attributes: &[OwnedAttribute],
        form_count: usize,
    ) -> Result<Message, CatalogError> {
        let numerus = attr(attributes, "numerus").as_deref() == Some("yes");
        let mut source = None;
        let mut message = Message::default();
        let mut translation = None;

        loop {
            match self.next()? {
                Event::Start { name, attributes } => match name.as_str() {
                    "source" => source = Some(self.read_text("source")?),
                    "comment" => {
                        let comment = self.read_text("comment")?;
                        message.disambiguation = Some(comment).filter(|c| !c.is_empty());
                    }
                    "oldsource" => message.old_source = Some(self.read_text("oldsource")?),
                    "extracomment" => {
                        message.extra_comment = Some(self.read_text("extracomment")?);
                    }
                    "translatorcomment" => {
                        message.translator_comment = Some(self.read_text("translatorcomment")?);
                    }
                    "location" => {
                        message.locations.push(Location {
                            filename: attr(&attributes, "filename"),
                            line: attr(&attributes, "line"),
                        });
                        self.skip("location")?;
                    }
                    "translation" => {
                        let status = match attr(&attributes, "type") {
                            None => TranslationStatus::Finished,
                            Some(kind) => TranslationStatus::from_attr(&kind).ok_or_else(|| {
                                self.error(format!("unknown translation type '{kind}'"))
                            })?,
                        };
                        message.status = status;
                        translation = Some(if numerus {
                            self.read_numerus(form_count)?
                        } else {
                            Translation::Single(self.read_text("translation")?)
                        });
                    }
                    "oldcomment" | "userdata" => self.skip(&name)?,
                    other if is_ignored(other) => self.skip(other)?,
                    other => return Err(self.unexpected(other, "message")),
                },
                Event::End(name) if name == "message" => break,
                Event::End(name) => {
                    return Err(self.error(format!("unexpected closing tag </{name}>")));
                }
                Event::Text(t) if t.trim().is_empty() => {}
                Event::Text(_) => return Err(self.error("unexpected text inside <message>")),
                Event::Eof => return Err(self.error("unterminated element <message>")),
            }
        }

        message.source = source.ok_or_else(|| self.error("<message> without <source>"))?;
        message.translation = match translation {
            Some(t) => t,
            None => {
                message.status = TranslationStatus::Unfinished;
                if numerus {
                    Translation::Plural(vec![String::new(); form_count])
                } else {
                    Translation::default()
                }
            }
        };
        Ok(message)
    }

    /// Plural forms of a numerus translation. An empty translation without
    /// any `<numerusform>` stands for all forms untranslated.
    fn read_numerus(&mut self, form_count: usize) -> Result<Translation, CatalogError> {
        let mut forms = Vec::new();
        loop {
            match self.next()? {
                Event::Start { name, .. } if name == "numerusform" => {
                    forms.push(self.read_text("numerusform")?);
                }
                Event::Start { name, .. } => return Err(self.unexpected(&name, "translation")),
                Event::End(name) if name == "translation" => break,
                Event::End(name) => {
                    return Err(self.error(format!("unexpected closing tag </{name}>")));
                }
                Event::Text(t) if t.trim().is_empty() => {}
                Event::Text(_) => {
                    return Err(self.error("plural translation text outside <numerusform>"));
                }
                Event::Eof => return Err(self.error("unterminated element <translation>")),
            }
        }
        if forms.is_empty() {
            forms = vec![String::new(); form_count];
        }
        Ok(Translation::Plural(forms))
    }

    /// Text content of `tag`, decoding `<byte>` escapes. When the content is
    /// split into `<lengthvariant>`s the first one wins.
    fn read_text(&mut self, tag: &str) -> Result<String, CatalogError> {
        let mut text = String::new();
        let mut variants: Vec<String> = Vec::new();
        loop {
            match self.next()? {
                Event::Text(t) => text.push_str(&t),
                Event::Start { name, attributes } if name == "byte" => {
                    let value = attr(&attributes, "value")
                        .ok_or_else(|| self.error("<byte> without value"))?;
                    match decode_byte(&value) {
                        Some(Some(c)) => text.push(c),
                        Some(None) => {}
                        None => {
                            return Err(self.error(format!("invalid <byte> value '{value}'")));
                        }
                    }
                    self.skip("byte")?;
                }
                Event::Start { name, .. } if name == "lengthvariant" => {
                    variants.push(self.read_text("lengthvariant")?);
                }
                Event::Start { name, .. } => return Err(self.unexpected(&name, tag)),
                Event::End(name) if name == tag => break,
                Event::End(name) => {
                    return Err(self.error(format!("unexpected closing tag </{name}>")));
                }
                Event::Eof => return Err(self.error(format!("unterminated element <{tag}>"))),
            }
        }
        match variants.into_iter().next() {
            Some(first) => Ok(first),
            None => Ok(text),
        }
    }

    /// Consume everything up to and including the end of `tag`.
    fn skip(&mut self, tag: &str) -> Result<(), CatalogError> {
        let mut depth = 0usize;
        loop {
            match self.next()? {
                Event::Start { .. } => depth += 1,
                Event::End(_) if depth > 0 => depth -= 1,
                Event::End(_) => return Ok(()),
                Event::Text(_) => {}
                Event::Eof => return Err(self.error(format!("unterminated element <{tag}>"))),
            }
        }
    }
}

fn attr(attributes: &[OwnedAttribute], key: &str) -> Option<String> {
    attributes
        .iter()
        .find(|a| a.name.local_name == key)
        .map(|a| a.value.clone())
}

/// Elements preserved by Qt tooling that carry nothing needed for lookup.
fn is_ignored(name: &str) -> bool {
    name.starts_with("extra-") || name == "defaultcodec" || name == "dependencies"
}

/// Decode a `<byte value>`: decimal (`1000`) or hex (`x3e8`, `0x3e8`).
/// `Some(None)` is the NUL character, which is dropped.
fn decode_byte(value: &str) -> Option<Option<char>> {
    let (radix, digits) = if let Some(hex) = value.strip_prefix("0x") {
        (16, hex)
    } else if let Some(hex) = value.strip_prefix('x') {
        (16, hex)
    } else {
        (10, value)
    };
    let n = u32::from_str_radix(digits, radix).ok()?;
    if n == 0 {
        Some(None)
    } else {
        char::from_u32(n).map(Some)
    }
}

fn parse_error(position: TextPosition, message: impl Into<String>) -> CatalogError {
    CatalogError::Parse {
        line: position.row + 1,
        column: position.column + 1,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE TS>
"#;

    fn parse(body: &str) -> Result<Catalog, CatalogError> {
        format!("{HEADER}{body}").parse()
    }

    #[test]
    fn reads_messages_and_metadata() {
        let catalog = parse(
            r#"<TS version="2.1" language="cs" sourcelanguage="en">
<context>
    <name>AboutDialog</name>
    <message>
        <location filename="../src/gui/AboutDialog.ui" line="20"/>
        <source>About</source>
        <extracomment>Window title</extracomment>
        <translation>O aplikaci</translation>
    </message>
</context>
</TS>"#,
        )
        .unwrap();

        assert_eq!(catalog.version(), Some("2.1"));
        assert_eq!(catalog.language(), Some("cs"));
        assert_eq!(catalog.source_language(), Some("en"));
        let message = catalog.message("AboutDialog", "About", None).unwrap();
        assert_eq!(message.translation, Translation::Single("O aplikaci".into()));
        assert_eq!(message.extra_comment.as_deref(), Some("Window title"));
        assert_eq!(message.locations[0].line.as_deref(), Some("20"));
        assert_eq!(message.status, TranslationStatus::Finished);
    }

    #[test]
    fn decodes_entities_and_bytes() {
        let catalog = parse(
            r#"<TS language="cs"><context><name>Tools</name>
<message><source>&lt;b&gt;Note&lt;/b&gt; &amp; more</source><translation>&lt;b&gt;Pozn.&lt;/b&gt; &amp; další</translation></message>
<message><source>Tab<byte value="x9"/>stop</source><translation>Tab<byte value="9"/>zarážka</translation></message>
</context></TS>"#,
        )
        .unwrap();
        assert_eq!(
            catalog.tr("Tools", "<b>Note</b> & more"),
            "<b>Pozn.</b> & další"
        );
        assert_eq!(catalog.tr("Tools", "Tab\tstop"), "Tab\tzarážka");
    }

    #[test]
    fn numerus_forms() {
        let catalog = parse(
            r#"<TS language="cs"><context><name>MainWindow</name>
<message numerus="yes">
    <source>%n Entry(s)</source>
    <translation>
        <numerusform>%n záznam</numerusform>
        <numerusform>%n záznamy</numerusform>
        <numerusform>%n záznamů</numerusform>
        <numerusform>%n záznamů</numerusform>
    </translation>
</message>
<message numerus="yes">
    <source>%n group(s)</source>
    <translation type="unfinished"></translation>
</message>
</context></TS>"#,
        )
        .unwrap();
        let entries = catalog.message("MainWindow", "%n Entry(s)", None).unwrap();
        assert!(matches!(&entries.translation, Translation::Plural(f) if f.len() == 4));
        let groups = catalog.message("MainWindow", "%n group(s)", None).unwrap();
        assert_eq!(groups.translation, Translation::Plural(vec![String::new(); 4]));
    }

    #[test]
    fn wrong_form_count_is_a_plural_mismatch() {
        let err = parse(
            r#"<TS language="cs"><context><name>MainWindow</name>
<message numerus="yes"><source>%n Entry(s)</source>
<translation><numerusform>a</numerusform><numerusform>b</numerusform></translation>
</message></context></TS>"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::PluralRuleMismatch {
                expected: 4,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn lenient_plurals_demote_only_the_bad_message() {
        let ts = r#"<TS language="cs"><context><name>Database</name>
<message><source>Recycle Bin</source><translation>Koš</translation></message>
<message numerus="yes"><source>%n Entry(s)</source>
<translation><numerusform>a</numerusform><numerusform>b</numerusform><numerusform>c</numerusform></translation>
</message></context></TS>"#;
        assert!(matches!(
            Catalog::parse(ts.as_bytes()),
            Err(CatalogError::PluralRuleMismatch { found: 3, .. })
        ));

        let catalog = ParseOptions::new()
            .lenient_plurals(true)
            .parse(ts.as_bytes())
            .unwrap();
        assert_eq!(catalog.tr("Database", "Recycle Bin"), "Koš");
        let entries = catalog.message("Database", "%n Entry(s)", None).unwrap();
        assert_eq!(entries.status, TranslationStatus::Unfinished);
        assert_eq!(catalog.tr("Database", "%n Entry(s)"), "%n Entry(s)");
    }

    #[test]
    fn first_length_variant_wins() {
        let catalog = parse(
            r#"<TS language="cs"><context><name>EntryView</name>
<message><source>Username</source>
<translation><lengthvariant>Uživatelské jméno</lengthvariant><lengthvariant>Uživatel</lengthvariant></translation>
</message></context></TS>"#,
        )
        .unwrap();
        assert_eq!(catalog.tr("EntryView", "Username"), "Uživatelské jméno");
    }

    #[test]
    fn unterminated_context_reports_position() {
        let err = parse(
            r#"<TS language="cs">
<context>
    <name>AboutDialog</name>
    <message><source>About</source><translation>O aplikaci</translation></message>
"#,
        )
        .unwrap_err();
        match err {
            CatalogError::Parse { line, .. } => assert!(line >= 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_entity_is_a_parse_error() {
        let err = parse(
            r#"<TS language="cs"><context><name>X</name>
<message><source>a &bogus; b</source></message></context></TS>"#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::Parse { line, .. } if line >= 3));
    }

    #[test]
    fn structural_errors() {
        let missing_source = parse(
            r#"<TS><context><name>X</name><message><translation>y</translation></message></context></TS>"#,
        );
        assert!(matches!(missing_source, Err(CatalogError::Parse { .. })));

        let bad_type = parse(
            r#"<TS><context><name>X</name><message><source>a</source><translation type="done">y</translation></message></context></TS>"#,
        );
        assert!(matches!(bad_type, Err(CatalogError::Parse { .. })));

        let wrong_root = parse("<html></html>");
        assert!(matches!(wrong_root, Err(CatalogError::Parse { .. })));

        let stray = parse(r#"<TS><context><name>X</name><widget/></context></TS>"#);
        assert!(matches!(stray, Err(CatalogError::Parse { .. })));
    }

    #[test]
    fn extra_elements_are_skipped() {
        let catalog = parse(
            r#"<TS language="de"><extra-po-header>x</extra-po-header><context><name>X</name>
<message><source>a</source><translation>b</translation><extra-loc-blank>1</extra-loc-blank></message>
</context></TS>"#,
        )
        .unwrap();
        assert_eq!(catalog.tr("X", "a"), "b");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Catalog::from_path("/nonexistent/keepassxc_cs.ts").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn byte_values() {
        assert_eq!(decode_byte("x41"), Some(Some('A')));
        assert_eq!(decode_byte("0x41"), Some(Some('A')));
        assert_eq!(decode_byte("65"), Some(Some('A')));
        assert_eq!(decode_byte("0"), Some(None));
        assert_eq!(decode_byte("zz"), None);
    }
}
