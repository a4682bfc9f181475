//! Element generators.
//!
//! Each element renders to a string fragment from its own parameters and a
//! [`GenerationContext`]. Random kinds make no attempt to avoid collisions;
//! duplicates are caught when the item is committed.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use stockroom_id::SequenceValue;

use crate::element::FormatElement;

/// Inputs shared by every element of one generation call.
pub struct GenerationContext<'a, R: ?Sized> {
    /// Value rendered by `sequence` elements.
    pub sequence_value: SequenceValue,
    /// Instant rendered by `datetime` elements. Captured once per call so
    /// repeated datetime elements agree.
    pub now: DateTime<Utc>,
    pub rng: &'a mut R,
}

impl<'a, R: Rng + ?Sized> GenerationContext<'a, R> {
    pub fn new(sequence_value: SequenceValue, now: DateTime<Utc>, rng: &'a mut R) -> Self {
        Self {
            sequence_value,
            now,
            rng,
        }
    }
}

impl FormatElement {
    /// Renders this element's fragment.
    pub fn render<R: Rng + ?Sized>(&self, ctx: &mut GenerationContext<'_, R>) -> String {
        match self {
            FormatElement::Literal { value } => value.clone(),
            FormatElement::Random20 => ctx.rng.random_range(0..1u32 << 20).to_string(),
            FormatElement::Random32 => ctx.rng.random::<u32>().to_string(),
            FormatElement::RandomDigits6 => {
                format!("{:06}", ctx.rng.random_range(0..1_000_000u32))
            }
            FormatElement::RandomDigits9 => {
                format!("{:09}", ctx.rng.random_range(0..1_000_000_000u32))
            }
            FormatElement::Guid => {
                let mut bytes = [0u8; 16];
                ctx.rng.fill_bytes(&mut bytes);
                uuid::Builder::from_random_bytes(bytes)
                    .into_uuid()
                    .hyphenated()
                    .to_string()
            }
            FormatElement::DateTime => ctx.now.to_rfc3339_opts(SecondsFormat::Millis, true),
            FormatElement::Sequence { min_width } => {
                pad_sequence(ctx.sequence_value, *min_width)
            }
        }
    }
}

/// Decimal rendering of `value`, left-padded with zeros to `min_width` digits.
pub fn pad_sequence(value: SequenceValue, min_width: u32) -> String {
    format!("{:0width$}", value.value(), width = min_width as usize)
}
