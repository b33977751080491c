//! Helpers shared by project-level commands.

use crate::bundler::{Esbuild, context};
use crate::cli::GlobalArgs;
use crate::config::NovaConfig;
use crate::error::{CliError, Result};
use crate::project::ProjectInfo;
use std::path::PathBuf;

/// Directory discovery starts from: `--cwd` or the current directory.
pub fn start_dir(global: &GlobalArgs) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(match &global.cwd {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => path_clean::clean(cwd.join(dir)),
        None => cwd,
    })
}

/// Discover the project and load its configuration.
pub fn load_project(global: &GlobalArgs) -> Result<(ProjectInfo, NovaConfig)> {
    let start = start_dir(global)?;
    if !start.is_dir() {
        return Err(CliError::FileNotFound(start));
    }
    let project = ProjectInfo::discover(&start)?;
    let config = NovaConfig::load(project.root(), global.config.as_deref())?;
    Ok((project, config))
}

/// The esbuild driver configured for `project`.
pub fn esbuild(project: &ProjectInfo, config: &NovaConfig) -> Esbuild {
    let out_dir = project.abs(&config.codegen.out_dir);
    Esbuild::new(
        config.bundler.esbuild.clone(),
        project.root(),
        project.abs(&config.router.pages),
        out_dir.join("cache"),
        project.abs(&config.bundler.node_modules).join(".nova"),
    )
    .with_context_command(context::node_command(&config.bundler.node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_project_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.mod"), "module example.com/site\n\ngo 1.22\n").unwrap();
        std::fs::create_dir_all(temp.path().join("src/pages")).unwrap();

        let global = GlobalArgs {
            config: None,
            cwd: Some(temp.path().join("src/pages")),
        };
        let (project, config) = load_project(&global).unwrap();
        assert_eq!(project.root(), temp.path());
        assert_eq!(project.module_name(), "example.com/site");
        assert_eq!(config, NovaConfig::default());
    }

    #[test]
    fn test_load_project_missing_dir() {
        let temp = TempDir::new().unwrap();
        let global = GlobalArgs {
            config: None,
            cwd: Some(temp.path().join("nope")),
        };
        assert!(matches!(load_project(&global), Err(CliError::FileNotFound(_))));
    }
}
