//! Placeholder templates
//!
//! A template is literal text with placeholder tokens. Each token names a
//! source property by ID, alias or GUID inside braces; `{{` and `}}` stand
//! for literal braces.
//!
//! ```text
//! Famous city of {PD.Country} is Florida
//! Ref {1020}-{{draft}}
//! ```
//!
//! Parsing happens in two steps. [`RawTemplate::parse`] checks syntax and
//! keeps the selectors as written; [`RawTemplate::resolve`] maps every
//! selector to a [`PropertyId`] against the vocabulary, once, at load time.

use crate::error::TemplateError;
use metacard_model::{ModelResult, PropertyId, Selector, Vocabulary};
use std::fmt::{self, Display, Formatter};

/// Unresolved template segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSegment {
    /// Literal text
    Literal(String),
    /// Placeholder as written
    Placeholder(Selector),
}

/// Template with selectors not yet resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTemplate {
    source: String,
    segments: Vec<RawSegment>,
}

impl RawTemplate {
    /// Parse template syntax
    ///
    /// # Errors
    /// Unclosed or empty placeholders, and unmatched closing braces.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '{' if chars.peek().is_some_and(|&(_, next)| next == '{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().is_some_and(|&(_, next)| next == '}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut token = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(TemplateError::new(pos, "nested placeholder")),
                            other => token.push(other),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::new(pos, "unclosed placeholder"));
                    }
                    let token = token.trim();
                    if token.is_empty() {
                        return Err(TemplateError::new(pos, "empty placeholder"));
                    }
                    if !literal.is_empty() {
                        segments.push(RawSegment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(RawSegment::Placeholder(Selector::from(token)));
                }
                '}' => return Err(TemplateError::new(pos, "unmatched '}'")),
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(RawSegment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Segments as parsed
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[RawSegment] {
        &self.segments
    }

    /// Resolve every placeholder selector
    ///
    /// # Errors
    /// The first selector that names no property.
    pub fn resolve(&self, vocabulary: &Vocabulary) -> ModelResult<Template> {
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment {
                RawSegment::Literal(text) => Ok(Segment::Literal(text.clone())),
                RawSegment::Placeholder(selector) => {
                    vocabulary.resolve_property(selector).map(Segment::Placeholder)
                }
            })
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(Template {
            source: self.source.clone(),
            segments,
        })
    }
}

/// Resolved template segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// Placeholder bound to a source property
    Placeholder(PropertyId),
}

/// Template with every placeholder bound to a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Template made of literal text only
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            source: escape_literal(&text),
            segments: if text.is_empty() {
                Vec::new()
            } else {
                vec![Segment::Literal(text)]
            },
        }
    }

    /// Source text as written
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Resolved segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Properties referenced by placeholders, in template order
    pub fn sources(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(id) => Some(*id),
            Segment::Literal(_) => None,
        })
    }

    /// True when the template has no placeholders
    #[inline]
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.sources().next().is_none()
    }
}

impl Display for Template {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Escape braces so `text` parses back as a single literal
#[must_use]
pub fn escape_literal(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}
