//! Streaming structural matcher.
//!
//! Walks HTML left to right as a flat stream of open / close / text events
//! and keeps a stack of open elements with their class sets. No tree is
//! built: a close tag unwinds to the nearest open element with the same name,
//! discarding anything left unclosed above it, and a close tag with no match
//! leaves the stack untouched. Markup the tokenizer cannot read is passed on
//! as text, and `script` / `style` bodies are never parsed as markup.

use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashSet;
use tracing::{debug, trace};

// ── Frames & tags ─────────────────────────────────────────────────────────────

/// One entry of the open-element stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementFrame {
    pub tag: String,
    pub classes: HashSet<String>,
}

impl ElementFrame {
    /// True when this is a `tag` element carrying every one of `classes`.
    pub fn is(&self, tag: &str, classes: &[&str]) -> bool {
        self.tag == tag && self.has_classes(classes)
    }

    pub fn has_classes(&self, classes: &[&str]) -> bool {
        classes.iter().all(|c| self.classes.contains(*c))
    }
}

/// An element-open event: lowercased tag name plus attributes in source order.
/// Attribute names are lowercased, values have entities decoded.
#[derive(Debug, Clone, Default)]
pub struct OpenTag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl OpenTag {
    /// First non-empty value of `key`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    /// Value of `key` if present at all, even when empty.
    pub fn raw_attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn frame(&self) -> ElementFrame {
        let classes = self
            .attr("class")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        ElementFrame {
            tag: self.name.clone(),
            classes,
        }
    }
}

// ── Listener seam ─────────────────────────────────────────────────────────────

/// Receives matcher events in document order.
///
/// On `open`, `stack` already ends with the frame for `tag`. On `close`,
/// `matched` says whether an open element with that name was found (and
/// unwound); `stack` is the state after unwinding.
pub trait TagListener {
    fn open(&mut self, tag: &OpenTag, stack: &[ElementFrame]);

    fn close(&mut self, _tag: &str, _matched: bool, _stack: &[ElementFrame]) {}

    fn text(&mut self, _text: &str, _stack: &[ElementFrame]) {}
}

// ── Stack ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TagMatcher {
    stack: Vec<ElementFrame>,
}

impl TagMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stack(&self) -> &[ElementFrame] {
        &self.stack
    }

    pub fn push(&mut self, tag: &OpenTag) -> &[ElementFrame] {
        self.stack.push(tag.frame());
        &self.stack
    }

    /// Tolerant unwind: drop the nearest frame named `tag` and everything
    /// above it. Returns false (and leaves the stack alone) on a stray close.
    pub fn pop(&mut self, tag: &str) -> bool {
        match self.stack.iter().rposition(|f| f.tag == tag) {
            Some(idx) => {
                self.stack.truncate(idx);
                true
            }
            None => false,
        }
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

/// Elements whose content is raw text, never markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];
/// Longest reference name looked up between `&` and `;`.
const MAX_REFERENCE_LEN: usize = 32;

/// Feed every element and text event of `html` to `listener`.
pub fn scan<L: TagListener>(html: &str, listener: &mut L) {
    let lower = html.to_ascii_lowercase();
    let mut matcher = TagMatcher::new();
    let mut offset = 0;

    // every segment consumes at least one byte
    while offset < html.len() {
        offset = scan_segment(html, &lower, offset, &mut matcher, listener);
    }

    trace!("Scan finished with {} unclosed elements", matcher.stack().len());
}

fn lenient_reader(input: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(input);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.check_comments = false;
    config.trim_text(false);
    reader
}

/// Read events from `offset` until the input ends, a raw-text element needs
/// skipping, or the tokenizer trips. Returns where the next segment starts.
fn scan_segment<L: TagListener>(
    html: &str,
    lower: &str,
    offset: usize,
    matcher: &mut TagMatcher,
    listener: &mut L,
) -> usize {
    let mut reader = lenient_reader(&html[offset..]);

    loop {
        let before = offset + reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = open_tag(&e);
                let stack = matcher.push(&tag);
                listener.open(&tag, stack);

                if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                    let body = offset + reader.buffer_position() as usize;
                    let end = lower[body..]
                        .find(&format!("</{}", tag.name))
                        .map_or(html.len(), |i| body + i);
                    if end > body {
                        listener.text(&html[body..end], matcher.stack());
                    }
                    return end;
                }
            }
            Ok(Event::Empty(e)) => {
                let tag = open_tag(&e);
                let stack = matcher.push(&tag);
                listener.open(&tag, stack);
                let matched = matcher.pop(&tag.name);
                listener.close(&tag.name, matched, matcher.stack());
            }
            Ok(Event::End(e)) => {
                let name = lowercase_name(e.name().as_ref());
                let matched = matcher.pop(&name);
                listener.close(&name, matched, matcher.stack());
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                listener.text(&decode_entities(&raw), matcher.stack());
            }
            Ok(Event::CData(e)) => {
                let raw = String::from_utf8_lossy(&e.into_inner()).into_owned();
                listener.text(&raw, matcher.stack());
            }
            Ok(Event::Eof) => return html.len(),
            Ok(_) => {}
            Err(e) => {
                // The `<` that opened the bad markup is plain text; resume right after it.
                let Some(lt) = markup_start(html, offset, before) else {
                    listener.text(html.get(before..).unwrap_or_default(), matcher.stack());
                    return html.len();
                };
                debug!("Skipping malformed markup at byte {}: {}", lt, e);
                listener.text("<", matcher.stack());
                return lt + 1;
            }
        }
    }
}

/// Byte index of the `<` that starts the markup being read at `before`. The
/// reader may or may not have consumed it already.
fn markup_start(html: &str, offset: usize, before: usize) -> Option<usize> {
    if html.as_bytes().get(before) == Some(&b'<') {
        return Some(before);
    }
    html.get(offset..before)
        .and_then(|s| s.rfind('<'))
        .map(|i| offset + i)
        .or_else(|| html.get(before..)?.find('<').map(|i| before + i))
}

fn open_tag(e: &BytesStart<'_>) -> OpenTag {
    let attrs = e
        .html_attributes()
        .flatten()
        .map(|a| {
            let key = lowercase_name(a.key.as_ref());
            let value = decode_entities(&String::from_utf8_lossy(&a.value));
            (key, value)
        })
        .collect();

    OpenTag {
        name: lowercase_name(e.name().as_ref()),
        attrs,
    }
}

fn lowercase_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Best-effort entity decoding, one reference at a time: unknown or
/// dangling references keep their raw text.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail[1..]
            .find(';')
            .filter(|&end| end <= MAX_REFERENCE_LEN)
            .and_then(|end| resolve_reference(&tail[1..end + 1]).map(|s| (end, s)));
        match decoded {
            Some((end, text)) => {
                out.push_str(&text);
                rest = &tail[end + 2..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// `name` is the text between `&` and `;`.
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_html5_entity(name).map(str::to_string)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
