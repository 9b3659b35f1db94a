//! Build-scoped diagnostics.
//!
//! Errors and warnings accumulate on the [`Compilation`](crate::Compilation)
//! instead of aborting traversal; a finished build always carries both lists
//! next to whatever it managed to produce. This module defines the structured
//! record those lists hold.

use serde::{Deserialize, Serialize};

use weft_graph::ModuleId;

/// Diagnostic kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A dependency request could not be mapped to a module.
    Resolution,
    /// A module's own build step failed.
    ModuleBuild,
    /// Two chunks resolved to the same output path.
    AssetConflict,
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A single error or warning recorded during a build.
///
/// `module` is the module the problem is attributed to: the requester for
/// resolution failures, the failing module itself for build failures, the
/// emitting chunk's entry for asset conflicts. `requests` carries the
/// triggering dependency request strings for diagnostics that have them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationDiagnostic {
    pub kind: DiagnosticKind,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub module: Option<ModuleId>,
    pub requests: Vec<String>,
    pub help: Option<String>,
}

impl CompilationDiagnostic {
    /// A failed resolution, attributed to the requesting module.
    pub fn resolution(
        severity: DiagnosticSeverity,
        requester: Option<ModuleId>,
        request: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: DiagnosticKind::Resolution,
            severity,
            message: message.into(),
            module: requester,
            requests: vec![request.into()],
            help: None,
        }
    }

    /// A failed or noisy module build, attributed to the module itself.
    pub fn module_build(
        severity: DiagnosticSeverity,
        module: ModuleId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: DiagnosticKind::ModuleBuild,
            severity,
            message: message.into(),
            module: Some(module),
            requests: Vec::new(),
            help: None,
        }
    }

    /// An output path collision between two chunks.
    pub fn asset_conflict(path: &str, first: &str, second: &str) -> Self {
        Self {
            kind: DiagnosticKind::AssetConflict,
            severity: DiagnosticSeverity::Error,
            message: format!(
                "Conflict: multiple chunks emit to the same path '{path}' ({first} and {second})"
            ),
            module: None,
            requests: Vec::new(),
            help: Some(
                "Give the chunks distinct names or include [id]/[chunkhash] in the filename template.".to_string(),
            ),
        }
    }

    /// Attach the triggering dependency requests for diagnostics.
    pub fn with_requests(mut self, requests: Vec<String>) -> Self {
        self.requests = requests;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl std::fmt::Display for CompilationDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}: {}", module, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
