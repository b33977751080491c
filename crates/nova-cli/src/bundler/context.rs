//! Incremental esbuild context kept alive across development rebuilds.
//!
//! A `node` child runs the embedded driver script, which owns an esbuild
//! `context()` and answers one rebuild per request line. Outputs come back in
//! memory, base64 encoded, together with the build's metafile.

use super::metafile::Metafile;
use super::{DevBuild, OutputFiles};
use crate::error::{BuildError, Result};
use crate::hmr::message::base64_bytes;
use crate::project::to_slash;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Script run by the context process.
pub const DRIVER: &str = include_str!("../../assets/esbuild/context.mjs");

/// Command line running [`DRIVER`] with `node`.
pub fn node_command(node: &str) -> Vec<String> {
    vec![
        node.to_string(),
        "--input-type=module".to_string(),
        "--eval".to_string(),
        DRIVER.to_string(),
    ]
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildRequest<'a> {
    pub entry_points: &'a [PathBuf],
    pub options: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RebuildReply {
    #[serde(default)]
    pub outputs: Vec<OutputFile>,
    #[serde(default)]
    pub metafile: Option<Metafile>,
    #[serde(default)]
    pub errors: Vec<Diagnostic>,
}

#[derive(Debug, Deserialize)]
pub struct OutputFile {
    /// Absolute, under the build's `outdir`
    pub path: PathBuf,
    #[serde(with = "base64_bytes")]
    pub contents: Bytes,
}

#[derive(Debug, Deserialize)]
pub struct Diagnostic {
    pub text: String,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}:{}: {}", loc.file, loc.line, self.text),
            None => f.write_str(&self.text),
        }
    }
}

impl RebuildReply {
    /// Output names relative to `out_dir`; metafile paths are relative to `cwd`.
    pub fn into_dev_build(self, cwd: &Path, out_dir: &Path) -> Result<DevBuild> {
        if let Some(err) = BuildError::join(&self.errors) {
            return Err(err.into());
        }

        let meta = self.metafile.unwrap_or_default();
        let mut outputs = OutputFiles::new();
        for file in self.outputs {
            let path = path_clean::clean(cwd.join(&file.path));
            match path.strip_prefix(out_dir) {
                Ok(name) => {
                    outputs.insert(to_slash(name), file.contents);
                }
                Err(_) => tracing::debug!("Ignoring output outside {}: {}", out_dir.display(), path.display()),
            }
        }

        Ok(DevBuild {
            outputs,
            entries: meta.entry_map(cwd, out_dir),
            externals: meta.external_packages(),
        })
    }
}

/// The running driver process.
#[derive(Debug)]
pub struct EsbuildContext {
    child: Child,
    stdin: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
}

fn closed(e: std::io::Error) -> BuildError {
    BuildError::Bundler(format!("esbuild context: {}", e))
}

impl EsbuildContext {
    pub fn spawn(command: &[String], cwd: &Path) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            return Err(BuildError::Bundler("empty esbuild context command".to_string()).into());
        };
        tracing::debug!("Starting esbuild context with {}", program);

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildError::Bundler(format!("{}: {}", program, e)))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(BuildError::Bundler("esbuild context pipes unavailable".to_string()).into());
        };

        Ok(Self {
            child,
            stdin,
            replies: BufReader::new(stdout).lines(),
        })
    }

    /// Send one request and wait for its reply.
    pub async fn rebuild(&mut self, request: &RebuildRequest<'_>) -> Result<RebuildReply> {
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        self.stdin.write_all(&line).await.map_err(closed)?;
        self.stdin.flush().await.map_err(closed)?;

        let reply = self
            .replies
            .next_line()
            .await
            .map_err(closed)?
            .ok_or_else(|| BuildError::Bundler("esbuild context exited".to_string()))?;
        Ok(serde_json::from_str(&reply)?)
    }
}
