//! Init command implementation.

use crate::cli::{GlobalArgs, InitArgs};
use crate::commands::utils;
use crate::config::{CONFIG_FILE, NovaConfig};
use crate::error::{ConfigError, Result, ResultExt};
use crate::ui;
use std::path::{Path, PathBuf};

/// File name of the schema written by `nova init --schema`.
pub const SCHEMA_FILE: &str = "nova.config.schema.json";

/// Execute the init command.
///
/// Writes the default configuration into the project root, or the start
/// directory when it is not inside a Go module yet. Refuses to overwrite.
pub async fn execute(args: InitArgs, global: &GlobalArgs) -> Result<()> {
    let start = utils::start_dir(global)?;
    let root = crate::project::ProjectInfo::discover(&start)
        .map(|p| p.root().to_path_buf())
        .unwrap_or(start);

    let path = write_config(&root)?;
    ui::success(&format!("Created {}", path.display()));

    if args.schema {
        let schema = write_schema(&root)?;
        ui::success(&format!("Created {}", schema.display()));
    }
    Ok(())
}

pub fn write_config(root: &Path) -> Result<PathBuf> {
    let path = root.join(CONFIG_FILE);
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path).into());
    }
    let mut json = NovaConfig::default_json()?;
    json.push('\n');
    std::fs::write(&path, json).with_path(&path)?;
    Ok(path)
}

pub fn write_schema(root: &Path) -> Result<PathBuf> {
    let path = root.join(SCHEMA_FILE);
    let mut json = serde_json::to_string_pretty(&NovaConfig::json_schema())?;
    json.push('\n');
    std::fs::write(&path, json).with_path(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use tempfile::TempDir;

    #[test]
    fn test_write_config_round_trips() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path()).unwrap();
        let config = NovaConfig::load(temp.path(), None).unwrap();
        assert_eq!(config, NovaConfig::default());
        assert_eq!(path, temp.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_write_config_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path()).unwrap();
        let err = write_config(temp.path()).unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::AlreadyExists(_))));
    }

    #[test]
    fn test_write_schema() {
        let temp = TempDir::new().unwrap();
        let path = write_schema(temp.path()).unwrap();
        let schema: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert!(schema["properties"]["server"].is_object());
    }
}
