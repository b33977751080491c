//! esbuild driven through its command-line interface for production and
//! vendoring, and through an incremental [`EsbuildContext`] in development.

use super::context::{self, EsbuildContext, RebuildRequest};
use super::metafile::Metafile;
use super::{BuildOptions, Bundler, DevBuild, EntryMap};
use crate::error::{BuildError, CliError, Result, ResultExt};
use crate::hmr::HMR_CLIENT_PATH;
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::Mutex;

/// Runs esbuild from the project root.
#[derive(Debug)]
pub struct Esbuild {
    program: String,
    cwd: PathBuf,
    pages_root: PathBuf,
    /// `outdir` of development builds; kept in memory, never written
    dev_out_dir: PathBuf,
    vendor_dir: PathBuf,
    context_command: Vec<String>,
    context: Mutex<Option<EsbuildContext>>,
}

impl Esbuild {
    pub fn new(
        program: impl Into<String>,
        cwd: impl Into<PathBuf>,
        pages_root: impl Into<PathBuf>,
        dev_out_dir: impl Into<PathBuf>,
        vendor_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            cwd: cwd.into(),
            pages_root: pages_root.into(),
            dev_out_dir: dev_out_dir.into(),
            vendor_dir: vendor_dir.into(),
            context_command: context::node_command("node"),
            context: Mutex::new(None),
        }
    }

    /// Command starting the development context process.
    pub fn with_context_command(mut self, command: Vec<String>) -> Self {
        self.context_command = command;
        self
    }

    pub fn vendor_dir(&self) -> &Path {
        &self.vendor_dir
    }

    async fn exec(&self, args: Vec<String>) -> Result<()> {
        tracing::debug!("{} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BuildError::Bundler(format!("{}: {}", self.program, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let err = BuildError::join(parse_diagnostics(&stderr))
            .unwrap_or_else(|| BuildError::Bundler(format!("exited with {}", output.status)));
        Err(err.into())
    }
}

fn path_arg(flag: &str, path: &Path) -> String {
    format!("--{}={}", flag, path.display())
}

fn common_args() -> [String; 2] {
    ["--log-level=error".to_string(), "--color=false".to_string()]
}

/// Arguments of a one-shot production build.
pub fn build_args(options: &BuildOptions) -> Vec<String> {
    let entry_names = if options.hashing {
        "[dir]/[name].[hash]"
    } else {
        "[dir]/[name]"
    };

    let mut args: Vec<String> = options
        .entry_points
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    args.extend([
        "--bundle".to_string(),
        "--format=esm".to_string(),
        "--splitting".to_string(),
        "--minify".to_string(),
        "--legal-comments=external".to_string(),
        format!("--entry-names={}", entry_names),
        path_arg("outdir", &options.out_dir),
        path_arg("outbase", &options.outbase),
        path_arg("metafile", &options.metafile),
    ]);
    args.extend(common_args());
    args
}

/// Build options of the development context.
///
/// Bare imports stay external and every script pulls in the HMR client.
pub fn dev_options(outbase: &Path, out_dir: &Path) -> serde_json::Value {
    json!({
        "bundle": true,
        "format": "esm",
        "splitting": true,
        "packages": "external",
        "sourcemap": "inline",
        "banner": { "js": format!("import \"{}\";", HMR_CLIENT_PATH) },
        "outdir": out_dir,
        "outbase": outbase,
    })
}

/// Arguments bundling each package into `<out_dir>/<package>.js`.
pub fn vendor_args(packages: &[String], out_dir: &Path) -> Vec<String> {
    let mut args: Vec<String> = packages.iter().map(|p| format!("{}={}", p, p)).collect();
    args.extend([
        "--bundle".to_string(),
        "--format=esm".to_string(),
        "--minify".to_string(),
        path_arg("outdir", out_dir),
    ]);
    args.extend(common_args());
    args
}

/// Turn esbuild's stderr report into `file:line: message` lines.
///
/// A report looks like:
///
/// ```text
/// ✘ [ERROR] Could not resolve "missing"
///
///     src/pages/app.ts:1:7:
///       1 │ import "missing";
/// ```
pub fn parse_diagnostics(stderr: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Option<(String, Option<String>)> = None;

    for line in stderr.lines() {
        let trimmed = line.trim();
        if let Some((_, message)) = trimmed.split_once("[ERROR]") {
            if let Some(done) = current.take() {
                out.push(format_diagnostic(done));
            }
            current = Some((message.trim().to_string(), None));
            continue;
        }
        if let Some((_, location @ None)) = current.as_mut() {
            *location = parse_location(trimmed);
        }
    }
    if let Some(done) = current.take() {
        out.push(format_diagnostic(done));
    }

    if out.is_empty() {
        let rest = stderr.trim();
        if !rest.is_empty() {
            out.push(rest.to_string());
        }
    }
    out
}

fn format_diagnostic((message, location): (String, Option<String>)) -> String {
    match location {
        Some(location) => format!("{}: {}", location, message),
        None => message,
    }
}

/// `src/app.ts:3:9:` becomes `src/app.ts:3`.
fn parse_location(line: &str) -> Option<String> {
    let line = line.strip_suffix(':')?;
    let mut parts = line.rsplitn(3, ':');
    let column = parts.next()?;
    let row = parts.next()?;
    let file = parts.next()?;
    if file.is_empty() || row.parse::<u32>().is_err() || column.parse::<u32>().is_err() {
        return None;
    }
    Some(format!("{}:{}", file, row))
}

fn reset_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(CliError::Io(e)).with_path(dir),
    }
    std::fs::create_dir_all(dir).with_path(dir)
}

#[async_trait]
impl Bundler for Esbuild {
    async fn build(&self, options: &BuildOptions) -> Result<EntryMap> {
        reset_dir(&options.out_dir)?;

        if options.entry_points.is_empty() {
            let empty = serde_json::to_string_pretty(&Metafile::default())?;
            std::fs::write(&options.metafile, empty).with_path(&options.metafile)?;
            return Ok(EntryMap::new());
        }

        self.exec(build_args(options)).await?;
        let meta = Metafile::load(&options.metafile)?;
        Ok(meta.entry_map(&self.cwd, &options.out_dir))
    }

    async fn build_dev(&self, entries: &[PathBuf]) -> Result<DevBuild> {
        if entries.is_empty() {
            return Ok(DevBuild::default());
        }

        let options = dev_options(&self.pages_root, &self.dev_out_dir);
        let request = RebuildRequest {
            entry_points: entries,
            options: &options,
        };

        // A context that failed mid-request is dropped and the next rebuild
        // starts a fresh one.
        let mut slot = self.context.lock().await;
        let mut running = match slot.take() {
            Some(running) => running,
            None => EsbuildContext::spawn(&self.context_command, &self.cwd)?,
        };
        let reply = running.rebuild(&request).await?;
        *slot = Some(running);
        drop(slot);

        reply.into_dev_build(&self.cwd, &self.dev_out_dir)
    }

    async fn vendor(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        tracing::info!("Bundling packages: {}", packages.join(", "));
        self.exec(vendor_args(packages, &self.vendor_dir)).await
    }
}
