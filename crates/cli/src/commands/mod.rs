//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use contracts::PipelineBlueprint;
use tracing::info;

use crate::error::{CliError, Result};

/// Load and validate a blueprint, or fall back to the built-in defaults
pub(crate) fn load_blueprint(path: Option<&Path>) -> Result<PipelineBlueprint> {
    let Some(path) = path else {
        info!("No configuration file given, using built-in defaults");
        return Ok(PipelineBlueprint::with_log_sink());
    };

    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    config_loader::ConfigLoader::load_from_path(path).map_err(CliError::Config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_uses_defaults() {
        let blueprint = load_blueprint(None).unwrap();
        assert_eq!(blueprint.sinks.len(), 1);
    }

    #[test]
    fn missing_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_blueprint(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, CliError::ConfigNotFound { .. }));
    }

    #[test]
    fn invalid_file_reported_as_config_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[sync]\nsync_window_ms = -1.0").unwrap();
        let err = load_blueprint(Some(file.path())).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
