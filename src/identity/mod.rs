//! Identity normalization
//!
//! Identifiers reach this crate as free text, legacy exports, typeahead
//! option objects and JSON-encoded form fields. Everything downstream
//! works on [`CanonicalId`] and [`EntityRef`] only.

mod canonical;
mod normalize;
mod reference;

pub use canonical::CanonicalId;
pub use normalize::{normalize_id, normalize_ids, normalize_str};
pub use reference::{EntityKind, EntityRef};
