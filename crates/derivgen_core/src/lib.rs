//! Provide the canonical vocabulary shared by every derivgen stage.
//!
//! The analysis core, the emission drivers and the CLI all need to agree on the same spellings:
//! which attribute names count as markers, which interfaces carry capability type arguments, what the
//! generated text calls into, and which stable code each diagnostic carries. Keeping those tables here
//! avoids stringly-typed comparisons scattered across the generator.
//!
//! ## Notes
//!
//! - This is a pure vocabulary crate: **no IO**, no global state, and no host-model types.
//! - Registries are `const` tables so they can be inspected by tooling and tests.

pub mod diagnostics;
pub mod idents;
pub mod vocab;

pub use diagnostics::{DiagnosticCode, Severity};
pub use vocab::interfaces::WellKnownInterface;
pub use vocab::markers::MarkerId;
