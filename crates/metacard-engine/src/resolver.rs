//! Placeholder resolver
//!
//! Expands a [`Template`] against the card's current values. Placeholders
//! whose source property is absent or empty render as empty text; a
//! multi-value source renders its items in slot order, joined with the
//! rule's delimiter.

use crate::card::CardState;
use metacard_model::{PropertyId, PropertyValue};
use metacard_rules::{Payload, Segment, Template};
use tracing::trace;

/// Resolved template text plus the properties it read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Substituted text
    pub text: String,
    /// Source properties consulted, in template order
    pub consulted: Vec<PropertyId>,
}

/// Template expander
#[derive(Debug, Clone)]
pub struct PlaceholderResolver<'d> {
    delimiter: &'d str,
}

impl<'d> PlaceholderResolver<'d> {
    /// Create resolver joining multi-value sources with `delimiter`
    #[inline]
    #[must_use]
    pub fn new(delimiter: &'d str) -> Self {
        Self { delimiter }
    }

    /// Expand a template
    #[must_use]
    pub fn resolve(&self, template: &Template, card: &CardState) -> Resolution {
        let mut resolution = Resolution::default();
        for segment in template.segments() {
            match segment {
                Segment::Literal(text) => resolution.text.push_str(text),
                Segment::Placeholder(source) => {
                    if let Some(value) = card.value(*source) {
                        resolution.text.push_str(&value.render(self.delimiter));
                    }
                    resolution.consulted.push(*source);
                }
            }
        }
        trace!(template = %template, resolved = %resolution.text, "template resolved");
        resolution
    }

    /// Compute the value a `SetValue` payload produces for a target, and
    /// the properties it read
    ///
    /// The value is fitted to the target's cardinality, joining items for a
    /// scalar target with this resolver's delimiter. Empty output is
    /// [`PropertyValue::Empty`].
    #[must_use]
    pub fn value_of(
        &self,
        payload: &Payload,
        card: &CardState,
        multi_value: bool,
    ) -> (PropertyValue, Vec<PropertyId>) {
        match payload {
            Payload::Literal(value) => (value.clone().fitted(multi_value, self.delimiter), Vec::new()),
            Payload::Template(template) => {
                let Resolution { text, consulted } = self.resolve(template, card);
                (PropertyValue::text(text).fitted(multi_value, self.delimiter), consulted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::PropertySlot;
    use metacard_model::{ClassId, DataType, ObjectTypeId, PropertyDef, Vocabulary};
    use metacard_rules::RawTemplate;
    use pretty_assertions::assert_eq;

    const COUNTRY: PropertyId = PropertyId(1);
    const TAGS: PropertyId = PropertyId(2);
    const CITY: PropertyId = PropertyId(3);

    fn vocabulary() -> Vocabulary {
        Vocabulary::builder()
            .property(PropertyDef::new(1, "Country", DataType::Text).with_alias("PD.Country"))
            .property(PropertyDef::new(2, "Tags", DataType::MultiLookup).with_alias("PD.Tags"))
            .property(PropertyDef::new(3, "City", DataType::Text).with_alias("PD.City"))
            .build()
            .unwrap()
    }

    fn template(text: &str) -> Template {
        RawTemplate::parse(text).unwrap().resolve(&vocabulary()).unwrap()
    }

    fn card() -> CardState {
        let mut card = CardState::new(ObjectTypeId(0), Some(ClassId(1)));
        let mut country = PropertySlot::new("Country");
        country.value = PropertyValue::text("USA");
        let mut tags = PropertySlot::new("Tags");
        tags.value = PropertyValue::multi(["A", "B"]);
        card.properties.insert(COUNTRY, country);
        card.properties.insert(TAGS, tags);
        card.properties.insert(CITY, PropertySlot::new("City"));
        card
    }

    #[test]
    fn substitutes_current_values() {
        let resolver = PlaceholderResolver::new("; ");
        let resolution = resolver.resolve(&template("Famous city of {PD.Country} is Florida"), &card());
        assert_eq!(resolution.text, "Famous city of USA is Florida");
        assert_eq!(resolution.consulted, vec![COUNTRY]);
    }

    #[test]
    fn multi_value_uses_delimiter() {
        let card = card();
        let t = template("[{PD.Tags}]");
        assert_eq!(PlaceholderResolver::new("; ").resolve(&t, &card).text, "[A; B]");
        assert_eq!(PlaceholderResolver::new("").resolve(&t, &card).text, "[AB]");
    }

    #[test]
    fn empty_and_absent_sources_render_empty() {
        let mut card = card();
        card.properties.shift_remove(&COUNTRY);
        let resolution = PlaceholderResolver::new("; ").resolve(&template("{PD.Country}-{PD.City}"), &card);
        assert_eq!(resolution.text, "-");
        assert_eq!(resolution.consulted, vec![COUNTRY, CITY]);
    }

    #[test]
    fn payload_values() {
        let card = card();
        let resolver = PlaceholderResolver::new("; ");
        let payload = Payload::Template(template("{PD.City}"));
        assert_eq!(resolver.value_of(&payload, &card, false), (PropertyValue::Empty, vec![CITY]));

        let payload = Payload::Template(template("{PD.Country}"));
        assert_eq!(
            resolver.value_of(&payload, &card, true),
            (PropertyValue::multi(["USA"]), vec![COUNTRY])
        );

        let payload = Payload::Literal(PropertyValue::multi(["A", "B"]));
        assert_eq!(resolver.value_of(&payload, &card, false), (PropertyValue::text("A; B"), Vec::new()));
        assert_eq!(
            PlaceholderResolver::new("").value_of(&payload, &card, false),
            (PropertyValue::text("AB"), Vec::new())
        );
    }
}
