//! The ordered identifier format owned by an inventory.

use serde::{Deserialize, Serialize};

use crate::element::{ElementKind, FormatElement, RawFormatElement};
use crate::error::FormatError;

/// Soft ceiling on the number of elements. Longer formats are accepted.
pub const RECOMMENDED_MAX_ELEMENTS: usize = 10;

/// Soft ceiling on a sequence element's `minWidth`. Wider padding is accepted.
pub const RECOMMENDED_MAX_SEQUENCE_WIDTH: u32 = 32;

/// A validated, ordered list of format elements.
///
/// Element order is the concatenation order. The list may be empty, in which
/// case every generated identifier is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<RawFormatElement>", into = "Vec<RawFormatElement>")]
pub struct IdentifierFormat {
    elements: Vec<FormatElement>,
}

impl IdentifierFormat {
    /// Validates a candidate list. Either every element is accepted or the
    /// whole list is rejected with the index of the first offending element.
    pub fn validate(raw: Vec<RawFormatElement>) -> Result<Self, FormatError> {
        let elements = raw
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                FormatElement::try_from(element).map_err(|source| FormatError { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { elements })
    }

    pub fn new(elements: Vec<FormatElement>) -> Self {
        Self { elements }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[FormatElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn to_raw(&self) -> Vec<RawFormatElement> {
        self.elements.iter().map(FormatElement::to_raw).collect()
    }

    pub fn has_sequence(&self) -> bool {
        self.elements
            .iter()
            .any(|e| e.kind() == ElementKind::Sequence)
    }

    /// Whether regenerating can yield a different identifier.
    ///
    /// True when the format contains a random element or a sequence element
    /// (each attempt consumes a fresh counter value). Literal-only, empty and
    /// datetime-only formats reproduce the same candidate within a retry burst.
    pub fn is_regenerable(&self) -> bool {
        self.elements
            .iter()
            .any(|e| e.kind().is_random() || e.kind() == ElementKind::Sequence)
    }

    pub fn exceeds_recommended_length(&self) -> bool {
        self.elements.len() > RECOMMENDED_MAX_ELEMENTS
    }

    pub fn exceeds_recommended_sequence_width(&self) -> bool {
        self.elements.iter().any(|e| {
            matches!(e, FormatElement::Sequence { min_width } if *min_width > RECOMMENDED_MAX_SEQUENCE_WIDTH)
        })
    }
}

impl TryFrom<Vec<RawFormatElement>> for IdentifierFormat {
    type Error = FormatError;

    fn try_from(raw: Vec<RawFormatElement>) -> Result<Self, Self::Error> {
        Self::validate(raw)
    }
}

impl From<IdentifierFormat> for Vec<RawFormatElement> {
    fn from(format: IdentifierFormat) -> Self {
        format.to_raw()
    }
}

impl From<Vec<FormatElement>> for IdentifierFormat {
    fn from(elements: Vec<FormatElement>) -> Self {
        Self::new(elements)
    }
}
