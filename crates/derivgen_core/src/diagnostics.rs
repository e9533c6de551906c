//! Stable diagnostic codes.
//!
//! Codes are compiler-visible and must never be renumbered. New conditions get new codes; retired
//! conditions keep their number reserved.

use std::fmt;

/// Severity of a reported diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Stable identifier for every diagnostic the generator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticCode {
    RegistrationModeMismatch,
    DuplicateGeneratedAccessor,
    UndeterminedExpressionType,
    MissingProjectSettings,
    InvalidMarkerTarget,
    DuplicateForcedUnionId,
    UnionCapacityExceeded,
    MalformedMarkerAttribute,
    UnionVariantWithoutHeader,
    GenerationCancelled,
    InjectedExpressionHasNoValue,
}

/// Registry entry for a diagnostic code.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticInfo {
    pub code: DiagnosticCode,
    pub id: &'static str,
    pub severity: Severity,
    pub title: &'static str,
}

pub const DIAGNOSTICS: &[DiagnosticInfo] = &[
    DiagnosticInfo {
        code: DiagnosticCode::RegistrationModeMismatch,
        id: "DG0001",
        severity: Severity::Error,
        title: "mismatched manual/automatic registration in inheritance chain",
    },
    DiagnosticInfo {
        code: DiagnosticCode::DuplicateGeneratedAccessor,
        id: "DG0002",
        severity: Severity::Error,
        title: "duplicate generated property name collision between two storage types",
    },
    DiagnosticInfo {
        code: DiagnosticCode::UndeterminedExpressionType,
        id: "DG0003",
        severity: Severity::Error,
        title: "could not determine expression type",
    },
    DiagnosticInfo {
        code: DiagnosticCode::MissingProjectSettings,
        id: "DG0004",
        severity: Severity::Warning,
        title: "project settings asset not found",
    },
    DiagnosticInfo {
        code: DiagnosticCode::InvalidMarkerTarget,
        id: "DG0005",
        severity: Severity::Error,
        title: "marker attribute applied to an unsupported declaration",
    },
    DiagnosticInfo {
        code: DiagnosticCode::DuplicateForcedUnionId,
        id: "DG0006",
        severity: Severity::Error,
        title: "two union variants force the same type id",
    },
    DiagnosticInfo {
        code: DiagnosticCode::UnionCapacityExceeded,
        id: "DG0007",
        severity: Severity::Error,
        title: "union family has more variants than type ids",
    },
    DiagnosticInfo {
        code: DiagnosticCode::MalformedMarkerAttribute,
        id: "DG0008",
        severity: Severity::Error,
        title: "marker attribute arguments could not be read",
    },
    DiagnosticInfo {
        code: DiagnosticCode::UnionVariantWithoutHeader,
        id: "DG0009",
        severity: Severity::Error,
        title: "union variant does not start with a union header field",
    },
    DiagnosticInfo {
        code: DiagnosticCode::GenerationCancelled,
        id: "DG0010",
        severity: Severity::Info,
        title: "generation was cancelled",
    },
    DiagnosticInfo {
        code: DiagnosticCode::InjectedExpressionHasNoValue,
        id: "DG0011",
        severity: Severity::Error,
        title: "injected expression does not produce a value",
    },
];

impl DiagnosticCode {
    pub fn info(self) -> &'static DiagnosticInfo {
        DIAGNOSTICS
            .iter()
            .find(|d| d.code == self)
            .expect("INVARIANT: every DiagnosticCode has a registry entry")
    }

    /// The stable short identifier, e.g. `DG0003`.
    pub fn id(self) -> &'static str {
        self.info().id
    }

    pub fn default_severity(self) -> Severity {
        self.info().severity
    }

    pub fn title(self) -> &'static str {
        self.info().title
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
