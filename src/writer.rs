//! TS catalog serializer.
//!
//! Builds an `xmltree` element tree and emits it without automatic
//! indentation: indentation is inserted only between structural children so
//! that text content is written byte for byte. Characters XML 1.0 cannot
//! carry are written as `<byte value="xN"/>`, which the loader decodes.

use std::io::Write;

use xml::writer::EmitterConfig;
use xmltree::{Element, XMLNode};

use crate::catalog::{Catalog, Context, Message, Translation};
use crate::error::CatalogError;

const INDENT: &str = "    ";

#[derive(Clone, Debug, PartialEq, Eq)]
struct ElementBuilder(Element);

impl ElementBuilder {
    fn new(tag: &str) -> Self {
        Self(Element::new(tag))
    }

    fn build(self) -> Element {
        self.0
    }

    fn attr(mut self, key: &str, value: &str) -> Self {
        self.0.attributes.insert(key.to_owned(), value.to_owned());
        self
    }

    fn attr_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.attr(key, value),
            None => self,
        }
    }

    fn child(mut self, child: Element) -> Self {
        self.0.children.push(XMLNode::Element(child));
        self
    }

    fn child_opt(self, child: Option<Element>) -> Self {
        match child {
            Some(child) => self.child(child),
            None => self,
        }
    }

    fn children<I: IntoIterator<Item = Element>>(mut self, iter: I) -> Self {
        self.0
            .children
            .extend(iter.into_iter().map(XMLNode::Element));
        self
    }

    fn text(mut self, s: &str) -> Self {
        self.0.children.extend(escape_text(s));
        self
    }
}

impl Catalog {
    /// Serialize the catalog as a TS document.
    pub fn write<W: Write>(&self, w: W) -> Result<(), CatalogError> {
        let mut root = ElementBuilder::new("TS")
            .attr_opt("version", self.version())
            .attr_opt("language", self.language())
            .attr_opt("sourcelanguage", self.source_language())
            .children(self.contexts().iter().map(context_element))
            .build();
        indent(&mut root, 0);

        let config = EmitterConfig::new()
            .perform_indent(false)
            .write_document_declaration(true);
        root.write_with_config(w, config)
            .map_err(|e| CatalogError::Write(e.to_string()))
    }

    pub fn to_xml_string(&self) -> Result<String, CatalogError> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        String::from_utf8(buf).map_err(|e| CatalogError::Write(e.to_string()))
    }
}

fn context_element(context: &Context) -> Element {
    ElementBuilder::new("context")
        .child(text_element("name", context.name()))
        .children(context.messages().iter().map(message_element))
        .build()
}

fn message_element(message: &Message) -> Element {
    let mut builder = ElementBuilder::new("message");
    if message.is_plural() {
        builder = builder.attr("numerus", "yes");
    }
    for location in &message.locations {
        builder = builder.child(
            ElementBuilder::new("location")
                .attr_opt("filename", location.filename.as_deref())
                .attr_opt("line", location.line.as_deref())
                .build(),
        );
    }

    let translation = ElementBuilder::new("translation").attr_opt("type", message.status.as_attr());
    let translation = match &message.translation {
        Translation::Single(text) => translation.text(text),
        Translation::Plural(forms) => {
            translation.children(forms.iter().map(|f| text_element("numerusform", f)))
        }
    };

    builder
        .child(text_element("source", &message.source))
        .child_opt(opt_text_element("oldsource", message.old_source.as_deref()))
        .child_opt(opt_text_element("comment", message.disambiguation.as_deref()))
        .child_opt(opt_text_element("extracomment", message.extra_comment.as_deref()))
        .child_opt(opt_text_element(
            "translatorcomment",
            message.translator_comment.as_deref(),
        ))
        .child(translation.build())
        .build()
}

fn text_element(tag: &str, text: &str) -> Element {
    ElementBuilder::new(tag).text(text).build()
}

fn opt_text_element(tag: &str, text: Option<&str>) -> Option<Element> {
    text.map(|t| text_element(tag, t))
}

/// Split text into runs XML can carry and `<byte>` escapes for the rest.
/// `\r` is escaped too, since parsers normalize it away.
fn escape_text(s: &str) -> Vec<XMLNode> {
    let mut nodes = Vec::new();
    let mut run = String::new();
    for c in s.chars() {
        if is_xml_char(c) && c != '\r' {
            run.push(c);
            continue;
        }
        if !run.is_empty() {
            nodes.push(XMLNode::Text(std::mem::take(&mut run)));
        }
        nodes.push(XMLNode::Element(
            ElementBuilder::new("byte")
                .attr("value", &format!("x{:x}", u32::from(c)))
                .build(),
        ));
    }
    if !run.is_empty() {
        nodes.push(XMLNode::Text(run));
    }
    nodes
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Insert newline and indentation between the children of structural
/// elements. Text-bearing elements are left untouched.
fn indent(element: &mut Element, depth: usize) {
    let structural = !element.children.is_empty()
        && element.children.iter().all(|node| match node {
            XMLNode::Element(child) => child.name != "byte",
            _ => false,
        });
    if !structural {
        return;
    }

    let inner = format!("\n{}", INDENT.repeat(depth + 1));
    let outer = format!("\n{}", INDENT.repeat(depth));
    let children = std::mem::take(&mut element.children);
    for mut node in children {
        if let XMLNode::Element(child) = &mut node {
            indent(child, depth + 1);
        }
        element.children.push(XMLNode::Text(inner.clone()));
        element.children.push(node);
    }
    element.children.push(XMLNode::Text(outer));
}
