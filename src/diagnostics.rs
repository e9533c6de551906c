//! Diagnostics reported by the analysis core and the emission drivers.
//!
//! Every diagnostic is scoped to one declaration (and optionally one member and span within it). Codes
//! and default severities come from [`derivgen_core::diagnostics`].

use std::fmt;

use derivgen_core::{DiagnosticCode, Severity};
use derivgen_syntax::Span;

/// Where a diagnostic points: a declaration, optionally narrowed to a member and a span in that member's
/// statement text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    /// Qualified declaration name, or `<assembly>` for assembly-level attributes.
    pub symbol: String,
    pub member: Option<String>,
    pub file: Option<String>,
    pub span: Option<Span>,
}

impl Location {
    pub fn symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            member: None,
            file: None,
            span: None,
        }
    }

    pub fn assembly() -> Self {
        Self::symbol("<assembly>")
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{file}: ")?;
        }
        write!(f, "{}", self.symbol)?;
        if let Some(member) = &self.member {
            write!(f, ".{member}")?;
        }
        if let Some(span) = self.span {
            write!(f, " [{}..{}]", span.start, span.end)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, thiserror::Error)]
#[error("{message}")]
pub struct Diagnostic {
    pub location: Location,
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic with the code's default severity.
    pub fn new(code: DiagnosticCode, message: impl Into<String>, location: Location) -> Self {
        Self {
            location,
            code,
            severity: code.default_severity(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl miette::Diagnostic for Diagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code.id()))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(match self.severity {
            Severity::Info => miette::Severity::Advice,
            Severity::Warning => miette::Severity::Warning,
            Severity::Error => miette::Severity::Error,
        })
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("at {}", self.location)))
    }
}

/// Sort diagnostics into their reporting order and drop exact duplicates.
pub fn normalize(diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.sort();
    diagnostics.dedup();
}
