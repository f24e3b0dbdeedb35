//! Named-field element trees.
//!
//! Service schemas on the wire are trees of named elements. The client only
//! needs to read and write fields by logical name and type, so the tree is
//! modelled as an ordered map of field name to [`Value`], where a value may
//! itself be a nested [`Element`], a sequence of elements, or a choice.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from typed field access on an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("field `{field}` is missing from element `{element}`")]
    Missing { element: String, field: String },
    #[error("field `{field}` has type {found}, expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("field `{field}` value {value} does not fit in {target}")]
    OutOfRange {
        field: String,
        value: i64,
        target: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A field value inside an [`Element`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Element(Element),
    Sequence(Vec<Element>),
    /// A schema choice: exactly one named alternative is selected.
    Choice { selected: String, value: Box<Value> },
}

impl Value {
    /// Short type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Element(_) => "element",
            Self::Sequence(_) => "sequence",
            Self::Choice { .. } => "choice",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Element> for Value {
    fn from(e: Element) -> Self {
        Self::Element(e)
    }
}

impl From<Vec<Element>> for Value {
    fn from(items: Vec<Element>) -> Self {
        Self::Sequence(items)
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// A named node holding named fields.
///
/// Uses `BTreeMap` so rendering and serialization are deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Element {
    name: String,
    fields: BTreeMap<String, Value>,
}

impl Element {
    /// Creates an empty element with the given schema name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of direct fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn require(&self, field: &str) -> Result<&Value, FieldError> {
        self.fields.get(field).ok_or_else(|| FieldError::Missing {
            element: self.name.clone(),
            field: field.to_string(),
        })
    }

    /// Reads a string field.
    ///
    /// # Errors
    ///
    /// Returns `FieldError::Missing` if absent, `FieldError::WrongType` if the
    /// field is not a string.
    pub fn get_str(&self, field: &str) -> Result<&str, FieldError> {
        match self.require(field)? {
            Value::String(s) => Ok(s),
            other => Err(wrong_type(field, "string", other)),
        }
    }

    /// Reads an integer field. Numeric strings are accepted and parsed, since
    /// schema fields such as `sequenceNumber` are sometimes set as text.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` if the field is absent or not integral.
    pub fn get_i64(&self, field: &str) -> Result<i64, FieldError> {
        match self.require(field)? {
            Value::Int(n) => Ok(*n),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| wrong_type(field, "int", &Value::String(s.clone()))),
            other => Err(wrong_type(field, "int", other)),
        }
    }

    /// Reads an integer field that must fit in 32 bits.
    ///
    /// # Errors
    ///
    /// Returns `FieldError::OutOfRange` if the value overflows `i32`.
    pub fn get_i32(&self, field: &str) -> Result<i32, FieldError> {
        let value = self.get_i64(field)?;
        i32::try_from(value).map_err(|_| FieldError::OutOfRange {
            field: field.to_string(),
            value,
            target: "i32",
        })
    }

    /// Reads a nested element field.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` if the field is absent or not an element.
    pub fn get_element(&self, field: &str) -> Result<&Element, FieldError> {
        match self.require(field)? {
            Value::Element(e) => Ok(e),
            other => Err(wrong_type(field, "element", other)),
        }
    }

    /// Reads a sequence-of-elements field.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` if the field is absent or not a sequence.
    pub fn get_sequence(&self, field: &str) -> Result<&[Element], FieldError> {
        match self.require(field)? {
            Value::Sequence(items) => Ok(items),
            other => Err(wrong_type(field, "sequence", other)),
        }
    }

    /// Reads a dotted path such as `status.statusCode` as a string.
    ///
    /// # Errors
    ///
    /// Returns the first `FieldError` encountered along the path.
    pub fn get_path_str(&self, path: &str) -> Result<&str, FieldError> {
        let mut segments = path.split('.').peekable();
        let mut current = self;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                return current.get_str(segment);
            }
            current = current.get_element(segment)?;
        }
        Err(FieldError::Missing {
            element: self.name.clone(),
            field: path.to_string(),
        })
    }
}

fn wrong_type(field: &str, expected: &'static str, found: &Value) -> FieldError {
    FieldError::WrongType {
        field: field.to_string(),
        expected,
        found: found.type_name(),
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Element(e) => write!(f, "{e}"),
            Self::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Choice { selected, value } => write!(f, "{selected} = {value}"),
        }
    }
}

impl fmt::Display for Element {
    /// Renders as `name { field = value ... }` on a single line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.name)?;
        for (field, value) in &self.fields {
            write!(f, " {field} = {value}")?;
        }
        f.write_str(" }")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn response() -> Element {
        Element::new("dataOperationResponse")
            .with("channelId", "chnlid2")
            .with("sequenceNumber", 7_867_672_i64)
            .with("status", Element::new("status").with("statusCode", "SUCCESS"))
    }

    #[test]
    fn typed_reads() {
        let e = response();
        assert_eq!(e.get_str("channelId").unwrap(), "chnlid2");
        assert_eq!(e.get_i64("sequenceNumber").unwrap(), 7_867_672);
        assert_eq!(e.get_path_str("status.statusCode").unwrap(), "SUCCESS");
    }

    #[test]
    fn numeric_string_reads_as_int() {
        let e = Element::new("header").with("sequenceNumber", "7867672");
        assert_eq!(e.get_i64("sequenceNumber").unwrap(), 7_867_672);
    }

    #[test]
    fn missing_field_names_element_and_field() {
        let err = response().get_str("nope").unwrap_err();
        assert_eq!(
            err,
            FieldError::Missing {
                element: "dataOperationResponse".to_string(),
                field: "nope".to_string(),
            }
        );
    }

    #[test]
    fn wrong_type_reports_both_types() {
        let err = response().get_str("sequenceNumber").unwrap_err();
        assert!(matches!(
            err,
            FieldError::WrongType { expected: "string", found: "int", .. }
        ));
    }

    #[test]
    fn i32_overflow_is_out_of_range() {
        let e = Element::new("ErrorInfo").with("ERROR_CODE", i64::from(i32::MAX) + 1);
        assert!(matches!(
            e.get_i32("ERROR_CODE"),
            Err(FieldError::OutOfRange { target: "i32", .. })
        ));
    }

    #[test]
    fn path_through_non_element_fails() {
        let e = response();
        assert!(e.get_path_str("channelId.inner").is_err());
    }

    #[test]
    fn display_is_deterministic() {
        let e = Element::new("a").with("z", 1_i64).with("b", "x");
        assert_eq!(e.to_string(), "a { b = \"x\" z = 1 }");
    }

    proptest! {
        #[test]
        fn get_i32_accepts_exactly_the_i32_range(n in any::<i64>()) {
            let e = Element::new("ErrorInfo").with("ERROR_CODE", n);
            match i32::try_from(n) {
                Ok(expected) => prop_assert_eq!(e.get_i32("ERROR_CODE").unwrap(), expected),
                Err(_) => prop_assert!(e.get_i32("ERROR_CODE").is_err()),
            }
        }

        #[test]
        fn numeric_strings_read_back_as_ints(n in any::<i64>()) {
            let e = Element::new("header").with("sequenceNumber", n.to_string());
            prop_assert_eq!(e.get_i64("sequenceNumber").unwrap(), n);
        }
    }
}
