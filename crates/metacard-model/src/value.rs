//! Property values
//!
//! A card property holds nothing, a single scalar rendered as text, or an
//! ordered collection of lookup items. Empty text and empty collections are
//! normalized to [`PropertyValue::Empty`] so that "is the value empty" has a
//! single answer everywhere.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Current value of one property on a card
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// No value
    #[default]
    Empty,
    /// Scalar value rendered as text
    Single(String),
    /// Ordered multi-value lookup items, in slot order
    Multi(Vec<String>),
}

impl PropertyValue {
    /// Scalar text value; empty text becomes [`PropertyValue::Empty`]
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Single(value)
        }
    }

    /// Multi-value collection; empty items are dropped, an empty collection
    /// becomes [`PropertyValue::Empty`]
    #[must_use]
    pub fn multi<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = items
            .into_iter()
            .map(Into::into)
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            Self::Empty
        } else {
            Self::Multi(items)
        }
    }

    /// Normalize a value that may have been deserialized with empty content
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Single(text) => Self::text(text),
            Self::Multi(items) => Self::multi(items),
        }
    }

    /// Fit the value to a property's cardinality
    ///
    /// A scalar becomes the only item of a multi-value property; items
    /// written to a scalar property are joined with `delimiter`.
    #[must_use]
    pub fn fitted(self, multi_value: bool, delimiter: &str) -> Self {
        match self.normalized() {
            Self::Single(text) if multi_value => Self::multi([text]),
            Self::Multi(items) if !multi_value => Self::text(items.join(delimiter)),
            other => other,
        }
    }

    /// True when nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Single(text) => text.is_empty(),
            Self::Multi(items) => items.iter().all(String::is_empty),
        }
    }

    /// Individual items in display order
    pub fn items(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Self::Empty => &[],
            Self::Single(text) => std::slice::from_ref(text),
            Self::Multi(items) => items,
        };
        slice.iter().map(String::as_str).filter(|item| !item.is_empty())
    }

    /// Number of items
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items().count()
    }

    /// True when `item` is one of the stored items
    #[must_use]
    pub fn contains(&self, item: &str) -> bool {
        self.items().any(|present| present == item)
    }

    /// Render as a single string, joining multi-value items with `delimiter`
    #[must_use]
    pub fn render(&self, delimiter: &str) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Single(text) => text.clone(),
            Self::Multi(_) => self.items().collect::<Vec<_>>().join(delimiter),
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render("; "))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        Self::multi(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_text_normalizes() {
        assert_eq!(PropertyValue::text(""), PropertyValue::Empty);
        assert!(PropertyValue::multi(Vec::<String>::new()).is_empty());
        assert!(PropertyValue::Single(String::new()).is_empty());
    }

    #[test]
    fn multi_render_preserves_order() {
        let value = PropertyValue::multi(["Beta", "Alpha", "Gamma"]);
        assert_eq!(value.render("; "), "Beta; Alpha; Gamma");
        assert_eq!(value.render(""), "BetaAlphaGamma");
        assert_eq!(value.len(), 3);
    }

    #[test]
    fn fitted_follows_cardinality() {
        assert_eq!(PropertyValue::text("A").fitted(true, "; "), PropertyValue::multi(["A"]));
        assert_eq!(
            PropertyValue::multi(["A", "", "B"]).fitted(false, " + "),
            PropertyValue::text("A + B")
        );
        assert_eq!(PropertyValue::Single(String::new()).fitted(true, "; "), PropertyValue::Empty);
    }

    #[test]
    fn contains_checks_items() {
        let value = PropertyValue::multi(["USA", "Canada"]);
        assert!(value.contains("Canada"));
        assert!(!value.contains("Mexico"));
        assert!(PropertyValue::text("USA").contains("USA"));
        assert!(!PropertyValue::Empty.contains(""));
    }

    #[test]
    fn deserialize_untagged() {
        let v: PropertyValue = serde_json::from_str("null").unwrap();
        assert_eq!(v, PropertyValue::Empty);
        let v: PropertyValue = serde_json::from_str("\"x\"").unwrap();
        assert_eq!(v, PropertyValue::text("x"));
        let v: PropertyValue = serde_json::from_str("[\"a\", \"\"]").unwrap();
        assert_eq!(v.normalized(), PropertyValue::multi(["a"]));
    }

    proptest! {
        #[test]
        fn prop_normalized_emptiness_agrees(items in prop::collection::vec("[a-c]{0,2}", 0..5)) {
            let value = PropertyValue::Multi(items.clone()).normalized();
            prop_assert_eq!(value.is_empty(), value == PropertyValue::Empty);
            prop_assert_eq!(value.is_empty(), value.len() == 0);
            prop_assert_eq!(value.len(), items.iter().filter(|item| !item.is_empty()).count());
        }
    }
}
