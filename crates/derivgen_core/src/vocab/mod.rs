//! Generator vocabulary registries.
//!
//! Callers work with **stable IDs** (`MarkerId`, `WellKnownInterface`) and look up spellings and metadata
//! through the registry tables instead of comparing raw strings.
//!
//! ## Examples
//! ```rust
//! use derivgen_core::vocab::markers::{self, MarkerId};
//!
//! assert_eq!(markers::from_str("Track"), Some(MarkerId::Track));
//! assert_eq!(markers::from_str("TrackAttribute"), Some(MarkerId::Track));
//! assert_eq!(markers::as_str(MarkerId::Singleton), "Singleton");
//! ```

pub mod interfaces;
pub mod markers;
pub mod registry;
pub mod runtime;
pub mod unity;
