//! Preview engine: renders a whole format into one identifier.
//!
//! Two entry points share the same core:
//!
//! - [`preview_trial`] is for live feedback while editing. It takes a
//!   sequence *hint*, draws from a throwaway RNG, and its output must never be
//!   treated as assigned.
//! - [`generate_authoritative`] runs once per item-creation attempt with a
//!   sequence value already consumed from the inventory's counter.

use chrono::{DateTime, Utc};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use stockroom_id::SequenceValue;

use crate::format::IdentifierFormat;
use crate::generate::GenerationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Trial,
    Authoritative,
}

/// Concatenates every element's fragment in list order.
pub fn generate<R: Rng + ?Sized>(
    format: &IdentifierFormat,
    ctx: &mut GenerationContext<'_, R>,
) -> String {
    let mut out = String::new();
    for element in format.elements() {
        out.push_str(&element.render(ctx));
    }
    out
}

/// Illustrative rendering for editors. Touches no shared state.
pub fn preview_trial(format: &IdentifierFormat, sequence_hint: SequenceValue) -> String {
    let mut rng = SmallRng::from_rng(&mut rand::rng());
    let mut ctx = GenerationContext::new(sequence_hint, Utc::now(), &mut rng);
    generate(format, &mut ctx)
}

/// The candidate identifier for one item-creation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritativeId {
    pub custom_id: String,
    pub sequence_value: SequenceValue,
    pub generated_at: DateTime<Utc>,
}

/// Renders `format` with a committed sequence value.
///
/// Random elements draw from the thread-local CSPRNG, which is seeded from
/// the operating system and periodically reseeded.
pub fn generate_authoritative(
    format: &IdentifierFormat,
    committed: SequenceValue,
) -> AuthoritativeId {
    generate_authoritative_with(format, committed, &mut rand::rng())
}

/// [`generate_authoritative`] drawing from a caller-supplied random source.
pub fn generate_authoritative_with<R: Rng + ?Sized>(
    format: &IdentifierFormat,
    committed: SequenceValue,
    rng: &mut R,
) -> AuthoritativeId {
    let generated_at = Utc::now();
    let mut ctx = GenerationContext::new(committed, generated_at, rng);
    AuthoritativeId {
        custom_id: generate(format, &mut ctx),
        sequence_value: committed,
        generated_at,
    }
}
