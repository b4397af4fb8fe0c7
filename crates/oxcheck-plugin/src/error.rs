use crate::rate::GetRateError;

/// Errors raised while building the plugin registry.
///
/// All of them surface at load time; a registry that was built successfully
/// never fails a lookup during evaluation.
///
/// # Examples
///
/// ```rust
/// use oxcheck_plugin::error::RegistryError;
///
/// let err = RegistryError::DuplicateCheckPlugin("tsm_drives".to_string());
/// assert!(err.to_string().contains("tsm_drives"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry: check plugin '{0}' registered twice")]
    DuplicateCheckPlugin(String),

    #[error("Registry: section '{0}' registered twice")]
    DuplicateSection(String),

    #[error("Registry: parameter transform for ruleset '{0}' registered twice")]
    DuplicateTransform(String),

    #[error("Registry: invalid plugin name '{name}': {reason}")]
    InvalidPluginName { name: String, reason: &'static str },

    #[error("Registry: invalid service name '{template}' for plugin '{plugin}'")]
    InvalidServiceName { plugin: String, template: String },
}

/// Errors a check function can yield instead of a partial result.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Results of this cycle must be ignored (e.g., a remote login failed
    /// transiently). The previous result stays valid; this is not a crash.
    #[error("{0}")]
    IgnoreResults(String),

    /// A rate could not be computed yet; handled like `IgnoreResults`.
    #[error(transparent)]
    Rate(#[from] GetRateError),

    /// Any other failure. Reported as a crash of the plugin.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CheckError {
    pub fn ignore(reason: impl Into<String>) -> Self {
        Self::IgnoreResults(reason.into())
    }

    pub fn is_ignore_results(&self) -> bool {
        matches!(self, Self::IgnoreResults(_) | Self::Rate(_))
    }
}
