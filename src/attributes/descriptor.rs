use thiserror::Error;

use super::{AttributeValue, ValueKind, ValueParseError};

/// Token separating the fields of a serialized attribute descriptor.
const FIELD_SEPARATOR: char = '\t';
/// Token separating the options of a serialized categorical descriptor.
///
/// The ASCII unit separator: option text is free-form and may contain commas (the readable
/// scalar-type names do), so the separator must be a character that never occurs in it.
const OPTION_SEPARATOR: char = '\u{1f}';

/// Describes one named, typed configuration value with default, bounds and options.
///
/// Identity (name and kind) is immutable for the lifetime of a descriptor; the default
/// value and the categorical selection reflect the current choice and may change.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeDescriptor {
    name: String,
    kind: ValueKind,
    default_value: AttributeValue,
    min: f64,
    max: f64,
    options: Vec<String>,
}

/// An attribute descriptor parse failure.
#[derive(Debug, Error)]
pub enum AttributeParseError {
    /// Too few fields for the declared kind.
    #[error("not enough tokens in attribute descriptor '{_0}'")]
    NotEnoughTokens(String),
    /// The kind token matched no [`ValueKind`].
    #[error("unknown value kind '{_0}' in attribute descriptor")]
    UnknownKind(String),
    /// A field failed to parse as a value of the declared kind.
    #[error(transparent)]
    Value(#[from] ValueParseError),
    /// A categorical default value missing from the option list.
    #[error("categorical default '{selected}' is not among the options of '{name}'")]
    UnknownOption {
        /// The descriptor name.
        name: String,
        /// The requested selection.
        selected: String,
    },
    /// A minimum bound exceeding the maximum.
    #[error("minimum {min} exceeds maximum {max} in attribute descriptor '{name}'")]
    InvalidBounds {
        /// The descriptor name.
        name: String,
        /// The requested minimum.
        min: f64,
        /// The requested maximum.
        max: f64,
    },
}

impl AttributeDescriptor {
    /// Create a descriptor without bounds; numeric kinds get the full range.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind, default_value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            kind,
            default_value,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            options: Vec::new(),
        }
    }

    /// Create a numeric descriptor with bounds.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeParseError::InvalidBounds`] if `min > max`.
    pub fn new_bounded(
        name: impl Into<String>,
        kind: ValueKind,
        default_value: AttributeValue,
        min: f64,
        max: f64,
    ) -> Result<Self, AttributeParseError> {
        let name = name.into();
        if min > max {
            return Err(AttributeParseError::InvalidBounds { name, min, max });
        }
        Ok(Self {
            name,
            kind,
            default_value,
            min,
            max,
            options: Vec::new(),
        })
    }

    /// Create a categorical descriptor with `selected` as the default option.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeParseError::UnknownOption`] if `selected` is not in `options`.
    pub fn new_categorical(
        name: impl Into<String>,
        options: Vec<String>,
        selected: &str,
    ) -> Result<Self, AttributeParseError> {
        let name = name.into();
        if !options.iter().any(|option| option == selected) {
            return Err(AttributeParseError::UnknownOption {
                name,
                selected: selected.to_string(),
            });
        }
        Ok(Self {
            name,
            kind: ValueKind::Categorical,
            default_value: AttributeValue::from(selected),
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            options,
        })
    }

    /// Parses one descriptor from its serialized line.
    ///
    /// The line format is the exact inverse of [`AttributeDescriptor::to_line`]:
    /// tab-separated fields `name`, kind token, then per kind either
    /// `default min max` (numeric), `options selected` (categorical, options separated by
    /// the ASCII unit separator) or `default` (all other kinds).
    ///
    /// # Errors
    ///
    /// Returns an [`AttributeParseError`] describing the first malformed field.
    pub fn from_line(line: &str) -> Result<Self, AttributeParseError> {
        let tokens: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if tokens.len() < 3 || tokens[0].is_empty() {
            return Err(AttributeParseError::NotEnoughTokens(line.to_string()));
        }
        let name = tokens[0];
        let kind = ValueKind::from_str_token(tokens[1])
            .ok_or_else(|| AttributeParseError::UnknownKind(tokens[1].to_string()))?;
        match kind {
            ValueKind::Discrete | ValueKind::Continuous => {
                if tokens.len() < 5 {
                    return Err(AttributeParseError::NotEnoughTokens(line.to_string()));
                }
                let default_value = AttributeValue::parse_as(kind, tokens[2])?;
                let min = parse_bound(tokens[3])?;
                let max = parse_bound(tokens[4])?;
                Self::new_bounded(name, kind, default_value, min, max)
            }
            ValueKind::Categorical => {
                if tokens.len() < 4 {
                    return Err(AttributeParseError::NotEnoughTokens(line.to_string()));
                }
                let options = tokens[2]
                    .split(OPTION_SEPARATOR)
                    .map(str::to_string)
                    .collect();
                Self::new_categorical(name, options, tokens[3])
            }
            _ => Ok(Self::new(
                name,
                kind,
                AttributeValue::parse_as(kind, tokens[2])?,
            )),
        }
    }

    /// Serializes the descriptor to one line; the exact inverse of
    /// [`AttributeDescriptor::from_line`].
    #[must_use]
    pub fn to_line(&self) -> String {
        let sep = FIELD_SEPARATOR;
        match self.kind {
            ValueKind::Discrete | ValueKind::Continuous => format!(
                "{}{sep}{}{sep}{}{sep}{}{sep}{}",
                self.name, self.kind, self.default_value, self.min, self.max
            ),
            ValueKind::Categorical => format!(
                "{}{sep}{}{sep}{}{sep}{}",
                self.name,
                self.kind,
                self.options.join(&OPTION_SEPARATOR.to_string()),
                self.default_value
            ),
            _ => format!("{}{sep}{}{sep}{}", self.name, self.kind, self.default_value),
        }
    }

    /// The descriptor name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value kind.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The current default value; for categorical descriptors, the selected option.
    #[must_use]
    pub const fn default_value(&self) -> &AttributeValue {
        &self.default_value
    }

    /// Replaces the default value.
    ///
    /// Identity is immutable, so the value should fit the descriptor kind; callers overlaying
    /// user input go through
    /// [`combine_attributes_with_values`](super::combine_attributes_with_values), which
    /// coerces and validates.
    pub fn set_default_value(&mut self, value: AttributeValue) {
        self.default_value = value;
    }

    /// The minimum bound (numeric kinds; negative infinity when unbounded).
    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// The maximum bound (numeric kinds; positive infinity when unbounded).
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// The ordered option list (categorical kinds).
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// The selected option of a categorical descriptor.
    #[must_use]
    pub fn selected_option(&self) -> Option<&str> {
        match self.kind {
            ValueKind::Categorical => self.default_value.as_str(),
            _ => None,
        }
    }

    /// Selects `option` on a categorical descriptor; returns false (and leaves the selection
    /// unchanged) if the option does not exist.
    pub fn select_option(&mut self, option: &str) -> bool {
        if self.kind == ValueKind::Categorical && self.options.iter().any(|o| o == option) {
            self.default_value = AttributeValue::from(option);
            true
        } else {
            false
        }
    }
}

fn parse_bound(token: &str) -> Result<f64, AttributeParseError> {
    token
        .parse::<f64>()
        .map_err(|_| ValueParseError::new(ValueKind::Continuous, token).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_round_trip() {
        let descriptors = [
            AttributeDescriptor::new_bounded(
                "Headersize",
                ValueKind::Discrete,
                AttributeValue::Int(0),
                0.0,
                f64::INFINITY,
            )
            .unwrap(),
            AttributeDescriptor::new_bounded(
                "Sample Distance",
                ValueKind::Continuous,
                AttributeValue::Float(0.5),
                0.01,
                10.0,
            )
            .unwrap(),
            AttributeDescriptor::new_categorical(
                "Byte Order",
                vec!["Big Endian".to_string(), "Little Endian".to_string()],
                "Little Endian",
            )
            .unwrap(),
            // option text is free-form and may itself contain commas
            AttributeDescriptor::new_categorical(
                "Data Type",
                vec![
                    "16 bit unsigned integer (0 to 65,535, unsigned short)".to_string(),
                    "32 bit float (float)".to_string(),
                ],
                "16 bit unsigned integer (0 to 65,535, unsigned short)",
            )
            .unwrap(),
            AttributeDescriptor::new("Swap XY", ValueKind::Boolean, AttributeValue::Bool(false)),
            AttributeDescriptor::new(
                "Spacing",
                ValueKind::Vector3,
                AttributeValue::Vector3([1.0, 1.0, 1.0]),
            ),
            AttributeDescriptor::new(
                "Size",
                ValueKind::Vector3i,
                AttributeValue::Vector3i([1, 1, 1]),
            ),
        ];
        for descriptor in descriptors {
            let line = descriptor.to_line();
            let reparsed = AttributeDescriptor::from_line(&line).unwrap();
            assert_eq!(reparsed, descriptor, "{line}");
        }
    }

    #[test]
    fn malformed_lines_fail() {
        assert!(matches!(
            AttributeDescriptor::from_line(""),
            Err(AttributeParseError::NotEnoughTokens(_))
        ));
        assert!(matches!(
            AttributeDescriptor::from_line("Size\tVector3i"),
            Err(AttributeParseError::NotEnoughTokens(_))
        ));
        assert!(matches!(
            AttributeDescriptor::from_line("Size\tMatrix\t1 1 1"),
            Err(AttributeParseError::UnknownKind(_))
        ));
        assert!(matches!(
            AttributeDescriptor::from_line("Headersize\tDiscrete\t0\t0"),
            Err(AttributeParseError::NotEnoughTokens(_))
        ));
        assert!(AttributeDescriptor::from_line("Headersize\tDiscrete\tzero\t0\t1").is_err());
    }

    #[test]
    fn bounds_are_validated() {
        let err = AttributeDescriptor::new_bounded(
            "Threshold",
            ValueKind::Continuous,
            AttributeValue::Float(0.0),
            1.0,
            -1.0,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "minimum 1 exceeds maximum -1 in attribute descriptor 'Threshold'"
        );
    }

    #[test]
    fn categorical_selection() {
        let mut descriptor = AttributeDescriptor::new_categorical(
            "Data Type",
            vec!["a".to_string(), "b".to_string()],
            "a",
        )
        .unwrap();
        assert_eq!(descriptor.selected_option(), Some("a"));
        assert!(descriptor.select_option("b"));
        assert_eq!(descriptor.selected_option(), Some("b"));
        assert!(!descriptor.select_option("c"));
        assert_eq!(descriptor.selected_option(), Some("b"));
        assert!(AttributeDescriptor::new_categorical(
            "Data Type",
            vec!["a".to_string()],
            "missing"
        )
        .is_err());
    }
}
