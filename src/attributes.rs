//! Typed, bounded configuration attributes for file I/O plugins and algorithms.
//!
//! An [`AttributeDescriptor`] declares one named parameter (kind, default, bounds, options);
//! an [`AttributeSet`] is a plugin's ordered declaration of its parameters. Turning declared
//! parameters plus caller-supplied values into resolved parameters follows a copy-on-combine
//! discipline: [`combine_attributes_with_values`] clones the declaration and overlays values
//! onto the clone, so a resolved overlay can never corrupt a plugin's canonical declaration.
//! [`extract_values`] is the inverse projection from descriptors to a plain [`ValueMap`].

mod descriptor;
mod value;

pub use descriptor::{AttributeDescriptor, AttributeParseError};
pub use value::{AttributeValue, ValueKind, ValueParseError};

use std::collections::BTreeMap;

use derive_more::{Deref, From};

/// An untyped name→value map exchanged between callers and plugins.
pub type ValueMap = BTreeMap<String, AttributeValue>;

/// An ordered collection of [`AttributeDescriptor`]s with unique names.
#[derive(Clone, Debug, Default, PartialEq, Deref, From)]
pub struct AttributeSet(Vec<AttributeDescriptor>);

impl AttributeSet {
    /// Create an empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a descriptor; a duplicate name is logged and ignored (the earlier
    /// declaration wins).
    pub fn add(&mut self, descriptor: AttributeDescriptor) {
        if let Some(existing) = self.find(descriptor.name()) {
            log::warn!(
                "Attribute '{}' already declared (kind {}); keeping the first declaration.",
                existing.name(),
                existing.kind()
            );
            return;
        }
        self.0.push(descriptor);
    }

    /// Finds a descriptor by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.0.iter().find(|descriptor| descriptor.name() == name)
    }

    /// Finds a descriptor by name, mutably.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut AttributeDescriptor> {
        self.0
            .iter_mut()
            .find(|descriptor| descriptor.name() == name)
    }

    /// Appends all descriptors of `other` whose names are not yet present.
    pub fn merge(&mut self, other: &Self) {
        for descriptor in other.iter() {
            if self.find(descriptor.name()).is_none() {
                self.0.push(descriptor.clone());
            }
        }
    }

    /// Serializes the set, one descriptor per line.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.0
            .iter()
            .map(AttributeDescriptor::to_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parses a set serialized with [`AttributeSet::to_text`].
    ///
    /// # Errors
    ///
    /// Returns the [`AttributeParseError`] of the first malformed line.
    pub fn from_text(text: &str) -> Result<Self, AttributeParseError> {
        let mut set = Self::new();
        for line in text.lines().filter(|line| !line.is_empty()) {
            set.add(AttributeDescriptor::from_line(line)?);
        }
        Ok(set)
    }
}

/// Clones `attributes` and overlays `values` onto matching-name descriptors' default values,
/// leaving unmatched descriptors untouched.
///
/// This is the canonical way to turn "declared parameters + user input" into "resolved
/// parameters". String values are coerced to the declared kind where necessary (so values
/// read back from a stored project file overlay correctly); a value that cannot be coerced is
/// logged and the declared default kept. Value-map keys without a matching descriptor are
/// ignored. Neither input is mutated.
#[must_use]
pub fn combine_attributes_with_values(attributes: &AttributeSet, values: &ValueMap) -> AttributeSet {
    let mut combined = attributes.clone();
    for descriptor in &mut combined.0 {
        let Some(value) = values.get(descriptor.name()) else {
            continue;
        };
        match coerce_value(descriptor, value) {
            Some(value) => descriptor.set_default_value(value),
            None => log::warn!(
                "Invalid value '{}' for parameter '{}' ({}); default '{}' is applied.",
                value,
                descriptor.name(),
                descriptor.kind(),
                descriptor.default_value()
            ),
        }
    }
    combined
}

/// Projects descriptors to a plain value map; the inverse of
/// [`combine_attributes_with_values`].
///
/// Categorical descriptors resolve to their currently selected option, not the option list.
#[must_use]
pub fn extract_values(attributes: &AttributeSet) -> ValueMap {
    attributes
        .iter()
        .map(|descriptor| {
            (
                descriptor.name().to_string(),
                descriptor.default_value().clone(),
            )
        })
        .collect()
}

/// Coerces `value` to the kind declared by `descriptor`, or [`None`] if it does not fit.
pub(crate) fn coerce_value(
    descriptor: &AttributeDescriptor,
    value: &AttributeValue,
) -> Option<AttributeValue> {
    let coerced = if value.matches_kind(descriptor.kind()) {
        value.clone()
    } else if let AttributeValue::String(text) = value {
        AttributeValue::parse_as(descriptor.kind(), text).ok()?
    } else {
        return None;
    };
    if descriptor.kind() == ValueKind::Categorical {
        let selected = coerced.as_str()?;
        if !descriptor.options().iter().any(|option| option == selected) {
            return None;
        }
    }
    Some(coerced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_like_attributes() -> AttributeSet {
        let mut attributes = AttributeSet::new();
        attributes.add(AttributeDescriptor::new(
            "Size",
            ValueKind::Vector3i,
            AttributeValue::Vector3i([1, 1, 1]),
        ));
        attributes.add(
            AttributeDescriptor::new_bounded(
                "Headersize",
                ValueKind::Discrete,
                AttributeValue::Int(0),
                0.0,
                f64::INFINITY,
            )
            .unwrap(),
        );
        attributes.add(
            AttributeDescriptor::new_categorical(
                "Byte Order",
                vec!["Big Endian".to_string(), "Little Endian".to_string()],
                "Little Endian",
            )
            .unwrap(),
        );
        attributes
    }

    #[test]
    fn combine_overlays_without_mutating_inputs() {
        let attributes = raw_like_attributes();
        let mut values = ValueMap::new();
        values.insert("Headersize".to_string(), AttributeValue::Int(1024));
        values.insert("Byte Order".to_string(), AttributeValue::from("Big Endian"));
        values.insert("Unrelated".to_string(), AttributeValue::Bool(true));

        let combined = combine_attributes_with_values(&attributes, &values);
        assert_eq!(
            combined.find("Headersize").unwrap().default_value(),
            &AttributeValue::Int(1024)
        );
        assert_eq!(
            combined.find("Byte Order").unwrap().selected_option(),
            Some("Big Endian")
        );
        // the canonical declaration is untouched
        assert_eq!(
            attributes.find("Headersize").unwrap().default_value(),
            &AttributeValue::Int(0)
        );
        assert!(combined.find("Unrelated").is_none());
    }

    #[test]
    fn combine_coerces_stored_string_values() {
        let attributes = raw_like_attributes();
        let mut values = ValueMap::new();
        values.insert("Size".to_string(), AttributeValue::from("64 64 128"));
        values.insert("Headersize".to_string(), AttributeValue::from("2048"));

        let combined = combine_attributes_with_values(&attributes, &values);
        assert_eq!(
            combined.find("Size").unwrap().default_value(),
            &AttributeValue::Vector3i([64, 64, 128])
        );
        assert_eq!(
            combined.find("Headersize").unwrap().default_value(),
            &AttributeValue::Int(2048)
        );
    }

    #[test]
    fn combine_keeps_default_on_invalid_value() {
        let attributes = raw_like_attributes();
        let mut values = ValueMap::new();
        values.insert("Headersize".to_string(), AttributeValue::from("lots"));
        values.insert("Byte Order".to_string(), AttributeValue::from("PDP Endian"));

        let combined = combine_attributes_with_values(&attributes, &values);
        assert_eq!(
            combined.find("Headersize").unwrap().default_value(),
            &AttributeValue::Int(0)
        );
        assert_eq!(
            combined.find("Byte Order").unwrap().selected_option(),
            Some("Little Endian")
        );
    }

    #[test]
    fn extract_inverts_combine() {
        let attributes = raw_like_attributes();
        let mut values = ValueMap::new();
        values.insert("Size".to_string(), AttributeValue::Vector3i([2, 4, 8]));
        values.insert("Byte Order".to_string(), AttributeValue::from("Big Endian"));
        values.insert("Ignored".to_string(), AttributeValue::Int(1));

        let extracted = extract_values(&combine_attributes_with_values(&attributes, &values));
        // equals `values` restricted to keys present in `attributes`, defaults filled in
        assert_eq!(extracted.len(), attributes.len());
        assert_eq!(extracted["Size"], AttributeValue::Vector3i([2, 4, 8]));
        assert_eq!(extracted["Byte Order"], AttributeValue::from("Big Endian"));
        assert_eq!(extracted["Headersize"], AttributeValue::Int(0));
        assert!(!extracted.contains_key("Ignored"));
    }

    #[test]
    fn set_text_round_trip() {
        let attributes = raw_like_attributes();
        let reparsed = AttributeSet::from_text(&attributes.to_text()).unwrap();
        assert_eq!(reparsed, attributes);
    }

    #[test]
    fn duplicate_names_keep_first_declaration() {
        let mut attributes = AttributeSet::new();
        attributes.add(AttributeDescriptor::new(
            "Spacing",
            ValueKind::Vector3,
            AttributeValue::Vector3([1.0, 1.0, 1.0]),
        ));
        attributes.add(AttributeDescriptor::new(
            "Spacing",
            ValueKind::Continuous,
            AttributeValue::Float(2.0),
        ));
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes.find("Spacing").unwrap().kind(), ValueKind::Vector3);
    }

    #[test]
    fn merge_appends_only_new_names() {
        let mut base = raw_like_attributes();
        let mut extra = AttributeSet::new();
        extra.add(AttributeDescriptor::new(
            "Spacing",
            ValueKind::Vector3,
            AttributeValue::Vector3([1.0, 1.0, 1.0]),
        ));
        extra.add(AttributeDescriptor::new(
            "Headersize",
            ValueKind::Discrete,
            AttributeValue::Int(99),
        ));
        base.merge(&extra);
        assert_eq!(base.len(), 4);
        assert_eq!(
            base.find("Headersize").unwrap().default_value(),
            &AttributeValue::Int(0)
        );
    }
}
