#![forbid(unsafe_code)]
//! derivgen: attribute-driven source generation for Unity C# projects
//!
//! The generator reads a declaration graph through the [`SymbolOracle`](host::SymbolOracle) trait, finds
//! marker attributes (`[Track]`, `[Singleton]`, `[Inject]`, `[UnionHeader]`, `[Union]`,
//! `[UnmanagedAccess]`, `[assembly: GenerateUnityConstants]`) and produces partial C# declarations plus
//! diagnostics. The [`pipeline`] runs one pass; [`pipeline::GeneratorSession`] keeps results across passes.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli`, `emit` and
//!   `pipeline` modules enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Generated code**: Emitted C# is built from string literals; a `throw` in the output is text, not a
//!   Rust panic.
//!
//! - **True invariants**: If a panic represents a generator bug (logic error), use
//!   `.expect("INVARIANT: reason")` with a clear explanation.

pub mod analysis;
pub mod cli;
pub mod diagnostics;
pub mod emit;
pub mod host;
pub mod pipeline;
pub mod settings;

pub use diagnostics::{Diagnostic, Location};
pub use emit::GeneratedSource;
pub use host::{ModelHost, SymbolKey, SymbolOracle};
pub use pipeline::{GenerateError, GenerationOutput, GeneratorSession, PassInputs, generate};
pub use settings::GeneratorSettings;
