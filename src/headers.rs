//! Raw response header parsing.
//!
//! The engine hands over the header block exactly as it came off the wire.
//! [`parse_headers`] turns it into a [`HeaderMap`]:
//!
//! - names are title-cased per word (`content-type` becomes `Content-Type`),
//! - the first occurrence of a name stores a single value, later ones turn it
//!   into a list,
//! - lines starting with a tab continue the previous header (joined by `"\r\n\t"`),
//! - the status line (no colon, before any header) is stored under
//!   [`HeaderKey::StatusLine`].
//!
//! A continuation line that follows a header which already holds several
//! values cannot be attributed safely. The strict entry point reports it as
//! [`HeaderParseError::FoldedMultiValue`]; [`parse_headers_lenient`] drops the
//! line and returns the error next to the map.

use std::fmt;

/// Key of one parsed header entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeaderKey {
    /// The response status line, e.g. `HTTP/1.1 200 OK`.
    StatusLine,
    Name(String),
}

impl fmt::Display for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderKey::StatusLine => f.write_str("0"),
            HeaderKey::Name(name) => f.write_str(name),
        }
    }
}

/// Value of one parsed header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderValue {
    /// The value if the header appeared exactly once.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Single(s) => Some(s),
            HeaderValue::Multiple(_) => None,
        }
    }

    /// The first value, whatever the multiplicity.
    pub fn first(&self) -> Option<&str> {
        self.iter().next()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            HeaderValue::Single(s) => std::slice::from_ref(s),
            HeaderValue::Multiple(list) => list,
        };
        values.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        match self {
            HeaderValue::Single(_) => 1,
            HeaderValue::Multiple(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(first) => {
                let first = std::mem::take(first);
                *self = HeaderValue::Multiple(vec![first, value]);
            }
            HeaderValue::Multiple(list) => list.push(value),
        }
    }
}

/// Order preserving header map produced by [`parse_headers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(HeaderKey, HeaderValue)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a header up by name. The name is title-cased first.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.get_key(&HeaderKey::Name(title_case(name)))
    }

    pub fn get_key(&self, key: &HeaderKey) -> Option<&HeaderValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn status_line(&self) -> Option<&str> {
        self.get_key(&HeaderKey::StatusLine).and_then(HeaderValue::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderKey, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces (or adds) an entry wholesale.
    pub(crate) fn insert(&mut self, key: HeaderKey, value: HeaderValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    fn append(&mut self, name: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| matches!(k, HeaderKey::Name(n) if *n == name)) {
            Some((_, existing)) => existing.push(value),
            None => self.entries.push((HeaderKey::Name(name), HeaderValue::Single(value))),
        }
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut HeaderValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| matches!(k, HeaderKey::Name(n) if n == name))
            .map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderParseError {
    #[error("continuation line {line:?} follows header {name} which already holds several values")]
    FoldedMultiValue { name: String, line: String },
}

/// Line fed header parser. Keeps track of the header a continuation belongs to.
#[derive(Debug, Default)]
pub struct HeaderParser {
    headers: HeaderMap,
    current_key: Option<String>,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line (without the trailing `\n`).
    ///
    /// On error the parser state is left untouched, so feeding can go on.
    pub fn feed_line(&mut self, line: &str) -> Result<(), HeaderParseError> {
        if let Some((name, value)) = line.split_once(':') {
            let name = title_case(name.trim());
            self.headers.append(name.clone(), value.trim().to_string());
            self.current_key = Some(name);
            return Ok(());
        }

        match self.current_key.as_deref() {
            Some(key) if line.starts_with('\t') => {
                let continuation = line.trim();
                match self.headers.get_mut(key) {
                    Some(HeaderValue::Single(value)) => {
                        value.push_str("\r\n\t");
                        value.push_str(continuation);
                    }
                    Some(HeaderValue::Multiple(_)) => {
                        return Err(HeaderParseError::FoldedMultiValue {
                            name: key.to_string(),
                            line: continuation.to_string(),
                        });
                    }
                    None => {}
                }
            }
            None => {
                let status = line.trim();
                if !status.is_empty() {
                    self.headers.insert(HeaderKey::StatusLine, HeaderValue::Single(status.to_string()));
                }
            }
            // Blank separators and stray lines after the first header.
            Some(_) => {}
        }

        Ok(())
    }

    pub fn finish(self) -> HeaderMap {
        self.headers
    }
}

/// Parses a raw header block, failing on the first line that cannot be attributed.
pub fn parse_headers(raw: &str) -> Result<HeaderMap, HeaderParseError> {
    let mut parser = HeaderParser::new();
    for line in raw.split('\n') {
        parser.feed_line(line)?;
    }
    Ok(parser.finish())
}

/// Parses a raw header block, skipping lines that cannot be attributed.
pub fn parse_headers_lenient(raw: &str) -> (HeaderMap, Vec<HeaderParseError>) {
    let mut parser = HeaderParser::new();
    let mut errors = Vec::new();
    for line in raw.split('\n') {
        if let Err(e) = parser.feed_line(line) {
            log::warn!("Dropping header line: {e}");
            errors.push(e);
        }
    }
    (parser.finish(), errors)
}

/// Upper-cases the first letter of every word. Words are separated by `-`,
/// space or tab; all other characters keep their case.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut word_start = true;
    for c in name.chars() {
        if word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        word_start = matches!(c, '-' | ' ' | '\t');
    }
    out
}
