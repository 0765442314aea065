//! Markup field codec.
//!
//! Pure extraction and rewriting of form fields embedded in Confluence
//! storage-format markup. No I/O, no protocol knowledge.
//!
//! Three field constructs are recognized:
//!
//! - `text`: any tag carrying both `name="..."` and `value="..."` attributes
//!   (form-input style). The value attribute holds the field value.
//! - `macro-parameter`: `<ac:parameter ac:name="NAME">VALUE</ac:parameter>`.
//! - `structured-block`: an `<ac:structured-macro>` declaring its field name
//!   via a parameter literally named `name`, with the value held in its
//!   `<ac:rich-text-body>`.
//!
//! Recognition is structural: a tag lexer that understands quoted attributes,
//! comments, CDATA sections, and self-closing tags feeds a scanner that tracks
//! balanced macro nesting. The body of a named macro is an opaque value
//! region, so updating a block can never touch a sibling field. Duplicate
//! field names resolve to the first occurrence in document order, both for
//! extraction and for update targeting.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// How a field is represented in the markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    /// `name`/`value` attribute pair on a form-input style tag.
    Text,
    /// `<ac:parameter ac:name="...">` element text.
    MacroParameter,
    /// `<ac:rich-text-body>` of a named structured macro.
    StructuredBlock,
}

/// One form field recognized in a page's markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Field name, unique within one extraction (first occurrence wins).
    pub name: String,
    /// Current value with markup entities decoded.
    pub current_value: String,
    /// Which construct the field was recognized from.
    pub kind: FieldKind,
}

/// Result of applying field values to markup.
///
/// `markup` is always a complete document: either the input unchanged or the
/// input with exactly the matched value regions replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    /// The re-serialized markup.
    pub markup: String,
    /// Names whose value regions were rewritten.
    pub updated: Vec<String>,
    /// Requested names with no matching field in the markup.
    pub unmatched: Vec<String>,
}

/// Extract all recognized form fields from storage-format markup,
/// in document order. Unrecognized markup is skipped.
pub fn extract_fields(markup: &str) -> Vec<FormField> {
    let mut fields: Vec<FormField> = Vec::new();
    for site in scan(markup) {
        if fields.iter().any(|f| f.name == site.name) {
            continue;
        }
        fields.push(FormField {
            current_value: html_escape::decode_html_entities(&markup[site.value_span.clone()])
                .into_owned(),
            name: site.name,
            kind: site.kind,
        });
    }
    fields
}

/// Rewrite the value regions of the named fields, escaping each value per its
/// construct's rules. Names not present in the markup are reported back in
/// [`FieldUpdate::unmatched`].
///
/// Replacements are planned against the original byte offsets and spliced
/// back-to-front: the function always returns a full document and never
/// partially writes, and all bytes outside the matched value regions are
/// preserved exactly.
pub fn apply_field_values(markup: &str, values: &BTreeMap<String, String>) -> FieldUpdate {
    let sites = scan(markup);

    let mut plan: Vec<(Range<usize>, String)> = Vec::new();
    let mut updated = Vec::new();
    let mut unmatched = Vec::new();

    for (name, value) in values {
        match sites.iter().find(|s| &s.name == name) {
            Some(site) => {
                let replacement = match site.kind {
                    FieldKind::Text => {
                        html_escape::encode_double_quoted_attribute(value).into_owned()
                    }
                    FieldKind::MacroParameter | FieldKind::StructuredBlock => {
                        html_escape::encode_text(value).into_owned()
                    }
                };
                plan.push((site.value_span.clone(), replacement));
                updated.push(name.clone());
            }
            None => unmatched.push(name.clone()),
        }
    }

    plan.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut out = markup.to_string();
    for (span, replacement) in plan {
        out.replace_range(span, &replacement);
    }

    FieldUpdate {
        markup: out,
        updated,
        unmatched,
    }
}

/// A recognized field occurrence and the byte range of its value.
struct FieldSite {
    name: String,
    kind: FieldKind,
    /// Offset of the construct's opening tag, for document ordering.
    doc_pos: usize,
    value_span: Range<usize>,
}

/// An open structured macro awaiting its close tag.
struct MacroFrame {
    open_pos: usize,
    field_name: Option<String>,
    body_span: Option<Range<usize>>,
}

/// Scan markup for field sites. All returned value spans are disjoint.
fn scan(markup: &str) -> Vec<FieldSite> {
    let mut sites: Vec<FieldSite> = Vec::new();
    let mut stack: Vec<MacroFrame> = Vec::new();
    let mut lexer = Lexer::new(markup);

    while let Some(event) = lexer.next_event() {
        match event {
            Event::Open(tag) => {
                let tag_name = &markup[tag.name.clone()];
                if tag_name == "ac:structured-macro" {
                    if !tag.self_closing {
                        stack.push(MacroFrame {
                            open_pos: tag.start,
                            field_name: None,
                            body_span: None,
                        });
                    }
                } else if tag_name == "ac:parameter" {
                    if tag.self_closing {
                        continue;
                    }
                    let Some(name_attr) = tag.attr_value(markup, "ac:name") else {
                        continue;
                    };
                    let mark = lexer.pos;
                    let Some(close_start) = lexer.matching_close("ac:parameter") else {
                        // Unclosed parameter: rewind and scan its content normally.
                        lexer.pos = mark;
                        continue;
                    };
                    let param_name = html_escape::decode_html_entities(name_attr).into_owned();
                    let inner = tag.end..close_start;
                    match stack.last_mut() {
                        // A parameter literally named "name" declares its
                        // macro's field name; it is not a field itself.
                        Some(frame) if param_name == "name" && frame.field_name.is_none() => {
                            frame.field_name = Some(
                                html_escape::decode_html_entities(&markup[inner])
                                    .trim()
                                    .to_string(),
                            );
                        }
                        _ => sites.push(FieldSite {
                            name: param_name,
                            kind: FieldKind::MacroParameter,
                            doc_pos: tag.start,
                            value_span: inner,
                        }),
                    }
                } else if tag_name == "ac:rich-text-body" {
                    if tag.self_closing {
                        continue;
                    }
                    if let Some(frame) = stack.last_mut() {
                        if frame.field_name.is_some() {
                            // Opaque value region: nothing inside a named body is
                            // recognized, so block and sibling updates stay disjoint.
                            let mark = lexer.pos;
                            match lexer.matching_close("ac:rich-text-body") {
                                Some(close_start) => {
                                    if frame.body_span.is_none() {
                                        frame.body_span = Some(tag.end..close_start);
                                    }
                                }
                                None => lexer.pos = mark,
                            }
                        }
                    }
                } else if let (Some(name), Some(value_span)) =
                    (tag.attr_value(markup, "name"), tag.attr_span(markup, "value"))
                {
                    sites.push(FieldSite {
                        name: html_escape::decode_html_entities(name).into_owned(),
                        kind: FieldKind::Text,
                        doc_pos: tag.start,
                        value_span,
                    });
                }
            }
            Event::Close { name, .. } => {
                if &markup[name] == "ac:structured-macro" {
                    if let Some(frame) = stack.pop() {
                        if let (Some(field_name), Some(body_span)) =
                            (frame.field_name, frame.body_span)
                        {
                            if !field_name.is_empty() {
                                sites.push(FieldSite {
                                    name: field_name,
                                    kind: FieldKind::StructuredBlock,
                                    doc_pos: frame.open_pos,
                                    value_span: body_span,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    sites.sort_by_key(|s| s.doc_pos);
    sites
}

/// Lexer events: open and close tags. Comments, CDATA, doctype and
/// processing instructions are skipped internally.
enum Event {
    Open(OpenTag),
    Close { name: Range<usize>, start: usize },
}

struct OpenTag {
    start: usize,
    /// Byte range of the tag name.
    name: Range<usize>,
    attrs: Vec<Attr>,
    /// Offset just past the closing `>`.
    end: usize,
    self_closing: bool,
}

struct Attr {
    name: Range<usize>,
    value: Option<Range<usize>>,
}

impl OpenTag {
    /// Span of the first attribute with the given name, if it has a value.
    fn attr_span(&self, src: &str, name: &str) -> Option<Range<usize>> {
        self.attrs
            .iter()
            .find(|a| &src[a.name.clone()] == name)
            .and_then(|a| a.value.clone())
    }

    fn attr_value<'a>(&self, src: &'a str, name: &str) -> Option<&'a str> {
        self.attr_span(src, name).map(|span| &src[span])
    }
}

/// Cursor-driven tag lexer over storage-format markup.
///
/// Never fails: malformed constructs are skipped and scanning resumes at the
/// next plausible tag start.
struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b':' | b'-' | b'_' | b'.')
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn next_event(&mut self) -> Option<Event> {
        let bytes = self.src.as_bytes();
        loop {
            let lt = self.pos + self.src[self.pos..].find('<')?;
            let rest = &self.src[lt..];

            if rest.starts_with("<!--") {
                self.pos = match rest.find("-->") {
                    Some(i) => lt + i + 3,
                    None => self.src.len(),
                };
                continue;
            }
            if rest.starts_with("<![CDATA[") {
                self.pos = match rest.find("]]>") {
                    Some(i) => lt + i + 3,
                    None => self.src.len(),
                };
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                self.pos = match rest.find('>') {
                    Some(i) => lt + i + 1,
                    None => self.src.len(),
                };
                continue;
            }
            if rest.starts_with("</") {
                let name_start = lt + 2;
                let mut i = name_start;
                while i < bytes.len() && is_name_byte(bytes[i]) {
                    i += 1;
                }
                let name = name_start..i;
                match self.src[i..].find('>') {
                    Some(j) => {
                        self.pos = i + j + 1;
                        if name.is_empty() {
                            continue;
                        }
                        return Some(Event::Close { name, start: lt });
                    }
                    None => {
                        self.pos = self.src.len();
                        return None;
                    }
                }
            }

            // Open tag: must start with a name character, otherwise it's a
            // bare '<' in text.
            if lt + 1 >= bytes.len() || !bytes[lt + 1].is_ascii_alphabetic() {
                self.pos = lt + 1;
                continue;
            }
            let name_start = lt + 1;
            let mut i = name_start;
            while i < bytes.len() && is_name_byte(bytes[i]) {
                i += 1;
            }
            let name = name_start..i;

            let mut attrs = Vec::new();
            let mut self_closing = false;
            loop {
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                if i >= bytes.len() {
                    // Truncated tag: nothing more to lex.
                    self.pos = self.src.len();
                    return None;
                }
                if bytes[i] == b'>' {
                    i += 1;
                    break;
                }
                if bytes[i] == b'/' {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'>' {
                        self_closing = true;
                        i += 2;
                        break;
                    }
                    i += 1;
                    continue;
                }

                let attr_start = i;
                while i < bytes.len() && is_name_byte(bytes[i]) {
                    i += 1;
                }
                if i == attr_start {
                    // Stray byte inside the tag; step over it.
                    i += 1;
                    continue;
                }
                let attr_name = attr_start..i;
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'=' {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                        let quote = bytes[i];
                        let value_start = i + 1;
                        match self.src[value_start..].find(quote as char) {
                            Some(j) => {
                                attrs.push(Attr {
                                    name: attr_name,
                                    value: Some(value_start..value_start + j),
                                });
                                i = value_start + j + 1;
                            }
                            None => {
                                self.pos = self.src.len();
                                return None;
                            }
                        }
                    } else {
                        let value_start = i;
                        while i < bytes.len()
                            && !bytes[i].is_ascii_whitespace()
                            && bytes[i] != b'>'
                            && bytes[i] != b'/'
                        {
                            i += 1;
                        }
                        attrs.push(Attr {
                            name: attr_name,
                            value: Some(value_start..i),
                        });
                    }
                } else {
                    attrs.push(Attr {
                        name: attr_name,
                        value: None,
                    });
                }
            }

            self.pos = i;
            return Some(Event::Open(OpenTag {
                start: lt,
                name,
                attrs,
                end: i,
                self_closing,
            }));
        }
    }

    /// Advance past the matching close tag for an already-consumed open tag,
    /// tracking same-name nesting. Returns the close tag's start offset, or
    /// None if the element never closes.
    fn matching_close(&mut self, tag_name: &str) -> Option<usize> {
        let mut depth = 1usize;
        while let Some(event) = self.next_event() {
            match event {
                Event::Open(tag) => {
                    if &self.src[tag.name.clone()] == tag_name && !tag.self_closing {
                        depth += 1;
                    }
                }
                Event::Close { name, start } => {
                    if &self.src[name] == tag_name {
                        depth -= 1;
                        if depth == 0 {
                            return Some(start);
                        }
                    }
                }
            }
        }
        None
    }
}
