//! The analysis core shared by every emission driver.
//!
//! ## Overview
//!
//! - [`aggregate`]: one pass over all declarations building the cross-declaration [`MarkerIndex`].
//! - [`facts`]: per-declaration [`DeclarationFacts`] (inheritance chain, capability interfaces).
//! - [`resolver`]: types for expressions the host cannot bind on its own.
//! - [`ids`]: deterministic small-integer ids for union variants.
//! - [`cache`]: fingerprints and the incremental [`CacheGate`].
//! - [`layout`]: unmanaged-ness and size estimates.
//! - [`scratch`]: thread-local pooled collections.
//!
//! Everything here is pure over a [`SymbolOracle`](crate::host::SymbolOracle); nothing touches the
//! filesystem.

pub mod aggregate;
pub mod cache;
pub mod facts;
pub mod ids;
pub mod layout;
pub mod options;
pub mod resolver;
pub mod scratch;

pub use aggregate::{LookupTable, MarkerIndex, UnionFamily, UnionVariant};
pub use cache::{CacheGate, CacheStats, Fingerprint};
pub use facts::{DeclarationFacts, FactError};
pub use ids::{IdCandidate, IdError};
pub use resolver::{ExpressionResolver, Resolution, ResolveError};

use tokio_util::sync::CancellationToken;

/// The pass was cancelled through its [`CancellationToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("generation was cancelled")]
pub struct Cancelled;

/// Bail out of a traversal once cancellation has been requested.
pub fn check_cancelled(cancel: &CancellationToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() { Err(Cancelled) } else { Ok(()) }
}
