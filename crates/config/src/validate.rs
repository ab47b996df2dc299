//! Configuration validation diagnostics.
//!
//! Unlike a fail-fast validator, [`run`] collects every problem it finds so
//! the `validate` CLI command (and a future GUI) can show them all at once.

use crate::Config;

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The configuration cannot be built as-is.
    Error,
    /// The configuration is usable, but likely not what the author intended.
    Warning,
}

/// A single configuration problem, pointing at the offending field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    /// How serious this diagnostic is.
    pub severity: Severity,
    /// Dotted path of the offending field, e.g. `compression.level`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl Diagnostic {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:?}] {}: {}",
            self.severity, self.field, self.message
        )
    }
}

pub(crate) fn run(config: &Config) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    if !crate::SUPPORTED_SCHEMA_VERSIONS.contains(&config.schema_version) {
        out.push(Diagnostic::error(
            "schema_version",
            format!(
                "unsupported schema_version {} (supported: {:?})",
                config.schema_version,
                crate::SUPPORTED_SCHEMA_VERSIONS
            ),
        ));
    }

    if config.product.name.trim().is_empty() {
        out.push(Diagnostic::error("product.name", "must not be empty"));
    }
    if config.product.version.trim().is_empty() {
        out.push(Diagnostic::error("product.version", "must not be empty"));
    }

    if config.install.default_path.trim().is_empty() {
        out.push(Diagnostic::error(
            "install.default_path",
            "must not be empty",
        ));
    }
    if !config.install.silent_allowed && !config.install.allow_user_path {
        out.push(Diagnostic::warning(
            "install",
            "silent install is disabled and the user cannot change the install path; \
             interactive installs will always use default_path",
        ));
    }

    if matches!(config.compression.algo, crate::CompressionAlgo::Zstd)
        && !(1..=22).contains(&config.compression.level)
    {
        out.push(Diagnostic::error(
            "compression.level",
            format!(
                "zstd level must be in 1..=22, got {}",
                config.compression.level
            ),
        ));
    }

    if config.inputs.is_empty() {
        out.push(Diagnostic::warning(
            "inputs",
            "no input roots configured; the built installer will have an empty payload",
        ));
    }

    for (i, action) in config.post_actions.iter().enumerate() {
        if action.command.trim().is_empty() {
            out.push(Diagnostic::error(
                format!("post_actions[{i}].command"),
                "must not be empty",
            ));
        }
        if action.timeout_sec == 0 {
            out.push(Diagnostic::warning(
                format!("post_actions[{i}].timeout_sec"),
                "a zero timeout kills the action immediately",
            ));
        }
    }

    if config.env.system_scope && !config.install.require_admin {
        out.push(Diagnostic::warning(
            "env.system_scope",
            "system-scope environment writes typically require elevation, \
             but install.require_admin is false",
        ));
    }

    out
}
