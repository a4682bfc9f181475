//! Format elements: kinds, wire form and validation.
//!
//! Elements travel over the wire as loosely-typed [`RawFormatElement`]s so that
//! an unknown kind can be reported as a validation failure instead of a
//! deserialization error. [`FormatElement`] is the validated form the
//! generators operate on.

use serde::{Deserialize, Serialize};

use crate::error::ElementError;

/// The eight element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Literal,
    Random20,
    Random32,
    RandomDigits6,
    RandomDigits9,
    Guid,
    DateTime,
    Sequence,
}

impl ElementKind {
    pub const ALL: [ElementKind; 8] = [
        ElementKind::Literal,
        ElementKind::Random20,
        ElementKind::Random32,
        ElementKind::RandomDigits6,
        ElementKind::RandomDigits9,
        ElementKind::Guid,
        ElementKind::DateTime,
        ElementKind::Sequence,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Literal => "literal",
            ElementKind::Random20 => "random20",
            ElementKind::Random32 => "random32",
            ElementKind::RandomDigits6 => "randomDigits6",
            ElementKind::RandomDigits9 => "randomDigits9",
            ElementKind::Guid => "guid",
            ElementKind::DateTime => "datetime",
            ElementKind::Sequence => "sequence",
        }
    }

    /// Parses a wire name. The short names used by older clients
    /// (`text`, `rand20`, `rand32`, `rand6d`, `rand9d`) are accepted too.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "literal" | "text" => Some(ElementKind::Literal),
            "random20" | "rand20" => Some(ElementKind::Random20),
            "random32" | "rand32" => Some(ElementKind::Random32),
            "randomDigits6" | "rand6d" => Some(ElementKind::RandomDigits6),
            "randomDigits9" | "rand9d" => Some(ElementKind::RandomDigits9),
            "guid" => Some(ElementKind::Guid),
            "datetime" => Some(ElementKind::DateTime),
            "sequence" => Some(ElementKind::Sequence),
            _ => None,
        }
    }

    /// Whether two renders of this kind can differ for the same sequence value.
    pub fn is_random(&self) -> bool {
        matches!(
            self,
            ElementKind::Random20
                | ElementKind::Random32
                | ElementKind::RandomDigits6
                | ElementKind::RandomDigits9
                | ElementKind::Guid
        )
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated element as received from (and returned to) clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFormatElement {
    #[serde(alias = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<i64>,
}

impl RawFormatElement {
    /// An element of the given kind with no parameters.
    pub fn of(kind: ElementKind) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            value: None,
            min_width: None,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::of(ElementKind::Literal)
        }
    }

    pub fn sequence(min_width: i64) -> Self {
        Self {
            min_width: Some(min_width),
            ..Self::of(ElementKind::Sequence)
        }
    }
}

/// A validated element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawFormatElement", into = "RawFormatElement")]
pub enum FormatElement {
    /// Emitted verbatim; may be empty.
    Literal { value: String },
    Random20,
    Random32,
    RandomDigits6,
    RandomDigits9,
    Guid,
    DateTime,
    /// The inventory's sequence value, left-padded with zeros to `min_width`.
    Sequence { min_width: u32 },
}

impl FormatElement {
    pub fn literal(value: impl Into<String>) -> Self {
        FormatElement::Literal {
            value: value.into(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            FormatElement::Literal { .. } => ElementKind::Literal,
            FormatElement::Random20 => ElementKind::Random20,
            FormatElement::Random32 => ElementKind::Random32,
            FormatElement::RandomDigits6 => ElementKind::RandomDigits6,
            FormatElement::RandomDigits9 => ElementKind::RandomDigits9,
            FormatElement::Guid => ElementKind::Guid,
            FormatElement::DateTime => ElementKind::DateTime,
            FormatElement::Sequence { .. } => ElementKind::Sequence,
        }
    }

    pub fn to_raw(&self) -> RawFormatElement {
        match self {
            FormatElement::Literal { value } => RawFormatElement::literal(value.clone()),
            FormatElement::Sequence { min_width } => {
                RawFormatElement::sequence(i64::from(*min_width))
            }
            other => RawFormatElement::of(other.kind()),
        }
    }
}

impl TryFrom<RawFormatElement> for FormatElement {
    type Error = ElementError;

    fn try_from(raw: RawFormatElement) -> Result<Self, Self::Error> {
        let Some(kind) = ElementKind::parse(&raw.kind) else {
            return Err(ElementError::InvalidElement { kind: raw.kind });
        };

        // Parameters that don't belong to the kind are ignored, matching what
        // the editor leaves behind when an element's kind is switched.
        let element = match kind {
            ElementKind::Literal => {
                let value = raw.value.ok_or(ElementError::InvalidLiteral)?;
                FormatElement::Literal { value }
            }
            ElementKind::Sequence => {
                let min_width = raw.min_width.unwrap_or(1);
                // Any positive width that fits the stored u32 is accepted.
                let width = u32::try_from(min_width)
                    .ok()
                    .filter(|w| *w >= 1)
                    .ok_or(ElementError::InvalidSequenceWidth { min_width })?;
                FormatElement::Sequence { min_width: width }
            }
            ElementKind::Random20 => FormatElement::Random20,
            ElementKind::Random32 => FormatElement::Random32,
            ElementKind::RandomDigits6 => FormatElement::RandomDigits6,
            ElementKind::RandomDigits9 => FormatElement::RandomDigits9,
            ElementKind::Guid => FormatElement::Guid,
            ElementKind::DateTime => FormatElement::DateTime,
        };

        Ok(element)
    }
}

impl From<FormatElement> for RawFormatElement {
    fn from(element: FormatElement) -> Self {
        element.to_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("literal", ElementKind::Literal)]
    #[case("text", ElementKind::Literal)]
    #[case("random20", ElementKind::Random20)]
    #[case("rand20", ElementKind::Random20)]
    #[case("rand32", ElementKind::Random32)]
    #[case("randomDigits6", ElementKind::RandomDigits6)]
    #[case("rand6d", ElementKind::RandomDigits6)]
    #[case("rand9d", ElementKind::RandomDigits9)]
    #[case("guid", ElementKind::Guid)]
    #[case("datetime", ElementKind::DateTime)]
    #[case("sequence", ElementKind::Sequence)]
    fn parses_canonical_and_legacy_kind_names(#[case] name: &str, #[case] kind: ElementKind) {
        assert_eq!(ElementKind::parse(name), Some(kind));
    }

    #[test]
    fn canonical_names_round_trip() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[rstest]
    #[case("")]
    #[case("Literal")]
    #[case("uuid")]
    #[case("counter")]
    fn unknown_kind_is_invalid_element(#[case] name: &str) {
        let raw = RawFormatElement {
            kind: name.to_string(),
            value: None,
            min_width: None,
        };
        assert_eq!(
            FormatElement::try_from(raw),
            Err(ElementError::InvalidElement {
                kind: name.to_string()
            })
        );
    }

    #[test]
    fn literal_requires_value_but_allows_empty() {
        let missing = RawFormatElement::of(ElementKind::Literal);
        assert_eq!(
            FormatElement::try_from(missing),
            Err(ElementError::InvalidLiteral)
        );

        let empty = RawFormatElement::literal("");
        assert_eq!(
            FormatElement::try_from(empty),
            Ok(FormatElement::literal(""))
        );
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    #[case(i64::from(u32::MAX) + 1)]
    fn sequence_width_out_of_range(#[case] width: i64) {
        let err = FormatElement::try_from(RawFormatElement::sequence(width)).unwrap_err();
        assert!(matches!(
            err,
            ElementError::InvalidSequenceWidth { min_width, .. } if min_width == width
        ));
        assert_eq!(err.code(), "invalid_sequence_width");
    }

    #[rstest]
    #[case(1)]
    #[case(33)]
    #[case(120)]
    fn sequence_width_has_no_small_upper_bound(#[case] width: i64) {
        let element = FormatElement::try_from(RawFormatElement::sequence(width));
        assert_eq!(
            element,
            Ok(FormatElement::Sequence {
                min_width: width as u32
            })
        );
    }

    #[test]
    fn sequence_width_defaults_to_one() {
        let element = FormatElement::try_from(RawFormatElement::of(ElementKind::Sequence));
        assert_eq!(element, Ok(FormatElement::Sequence { min_width: 1 }));
    }

    #[test]
    fn accepts_legacy_type_key_and_serializes_canonically() {
        let element: FormatElement =
            serde_json::from_str(r#"{"type":"rand6d","value":"ignored"}"#).unwrap();
        assert_eq!(element, FormatElement::RandomDigits6);
        assert_eq!(
            serde_json::to_value(&element).unwrap(),
            serde_json::json!({"kind": "randomDigits6"})
        );

        let sequence: FormatElement =
            serde_json::from_str(r#"{"kind":"sequence","minWidth":4}"#).unwrap();
        assert_eq!(
            serde_json::to_value(&sequence).unwrap(),
            serde_json::json!({"kind": "sequence", "minWidth": 4})
        );
    }
}
