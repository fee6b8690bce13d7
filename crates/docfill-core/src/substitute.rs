//! Value substitution.
//!
//! A [`TokenTable`] is compiled once per template: the text is split into literal
//! runs and token spans, and each placeholder name maps to the spans it occupies.
//! Rendering a record is a single pass over the segments with no regex work.
//!
//! Substituted values are inserted verbatim and never rescanned. A value that itself
//! contains `{{ other }}` therefore stays as written, and the result does not depend
//! on the order in which record keys are visited.

use std::collections::HashMap;
use std::ops::Range;

use crate::record::Record;
use crate::scanner::TOKEN;

#[derive(Debug, Clone)]
enum Segment {
    Literal(Range<usize>),
    Token { name: String, span: Range<usize> },
}

/// Precompiled token layout of one template.
#[derive(Debug, Clone)]
pub struct TokenTable {
    source: String,
    segments: Vec<Segment>,
    /// Placeholder name -> indices into `segments`.
    by_name: HashMap<String, Vec<usize>>,
}

impl TokenTable {
    pub fn new(text: impl Into<String>) -> Self {
        let source = text.into();
        let mut segments = Vec::new();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut cursor = 0;

        for caps in TOKEN.captures_iter(&source) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > cursor {
                segments.push(Segment::Literal(cursor..whole.start()));
            }
            let name = caps[1].to_string();
            by_name.entry(name.clone()).or_default().push(segments.len());
            segments.push(Segment::Token {
                name,
                span: whole.range(),
            });
            cursor = whole.end();
        }
        if cursor < source.len() {
            segments.push(Segment::Literal(cursor..source.len()));
        }

        Self {
            source,
            segments,
            by_name,
        }
    }

    /// Number of token occurrences.
    pub fn token_count(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    /// Whether the template contains at least one token named `name`.
    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Placeholder names that `record` does not supply, in first-appearance order.
    pub fn missing<'a>(&'a self, record: &Record) -> Vec<&'a str> {
        let mut out: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Token { name, .. } = segment {
                if !record.contains(name) && !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
        }
        out
    }

    /// Fill every token whose name is a key of `record`; leave the rest as written.
    pub fn render(&self, record: &Record) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(range) => out.push_str(&self.source[range.clone()]),
                Segment::Token { name, span } => match record.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&self.source[span.clone()]),
                },
            }
        }
        out
    }
}

/// Substitute `record` into `text` in one shot.
///
/// Prefer building a [`TokenTable`] when the same template is filled repeatedly.
pub fn substitute(text: &str, record: &Record) -> String {
    TokenTable::new(text).render(record)
}
