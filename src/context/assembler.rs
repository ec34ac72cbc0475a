//! Response assembly
//!
//! Renders the context response as a browser script: the `digitalData`
//! preamble, the context object assigned to a global, then the bootstrap
//! script for the identity kind.
//!
//! Scripts refer to the context global as `$CONTEXT_VARIABLE`; the
//! assembler substitutes the configured name once, at construction.

use crate::config::ScriptConfig;
use crate::context::types::ContextResponse;
use crate::error::{Error, Result};
use crate::identity::IdentityKind;
use std::fmt::Write;
use std::path::Path;

const BASE_SCRIPT: &str = include_str!("../../assets/base.js");
const IMPERSONATE_SCRIPT: &str = include_str!("../../assets/impersonate_base.js");

/// Placeholder for the context global inside bootstrap scripts
pub const VARIABLE_PLACEHOLDER: &str = "$CONTEXT_VARIABLE";

/// The two bootstrap script variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSet {
    pub base: String,
    pub impersonate: String,
}

impl Default for ScriptSet {
    fn default() -> Self {
        Self {
            base: BASE_SCRIPT.to_string(),
            impersonate: IMPERSONATE_SCRIPT.to_string(),
        }
    }
}

impl ScriptSet {
    /// Embedded scripts, replaced by any override files in `config`
    pub fn from_config(config: &ScriptConfig) -> Result<Self> {
        let mut scripts = Self::default();
        if let Some(path) = &config.base_script {
            scripts.base = read_script(path)?;
        }
        if let Some(path) = &config.impersonate_script {
            scripts.impersonate = read_script(path)?;
        }
        Ok(scripts)
    }

    /// Replace the variable placeholder in both variants
    fn bind_variable(self, variable: &str) -> Self {
        Self {
            base: self.base.replace(VARIABLE_PLACEHOLDER, variable),
            impersonate: self.impersonate.replace(VARIABLE_PLACEHOLDER, variable),
        }
    }

    /// Script variant for the acting identity
    pub fn for_kind(&self, kind: IdentityKind) -> &str {
        match kind {
            IdentityKind::Persona => &self.impersonate,
            IdentityKind::Profile => &self.base,
        }
    }
}

fn read_script(path: &Path) -> Result<String> {
    let script = std::fs::read_to_string(path)?;
    tracing::info!(path = %path.display(), "Loaded bootstrap script override");
    Ok(script)
}

/// Renders `ContextResponse` into the served script
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    variable: String,
    scripts: ScriptSet,
}

impl ResponseAssembler {
    pub fn new(variable: impl Into<String>, scripts: ScriptSet) -> Self {
        let variable = variable.into();
        Self {
            scripts: scripts.bind_variable(&variable),
            variable,
        }
    }

    pub fn from_config(config: &ScriptConfig) -> Result<Self> {
        if !is_js_identifier(&config.variable) {
            return Err(Error::Config(format!(
                "scripts.variable '{}' is not a JavaScript identifier",
                config.variable
            )));
        }
        Ok(Self::new(config.variable.clone(), ScriptSet::from_config(config)?))
    }

    pub fn render(&self, response: &ContextResponse, kind: IdentityKind) -> Result<String> {
        let json = serde_json::to_string(response)?;
        let script = self.scripts.for_kind(kind);

        let mut out = String::with_capacity(json.len() + script.len() + 64);
        out.push_str("window.digitalData = window.digitalData || {};\n");
        // Writing into a String cannot fail
        let _ = writeln!(out, "var {} = {};", self.variable, json);
        out.push_str(script);
        Ok(out)
    }
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}
