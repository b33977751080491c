//! One-shot production build.

use crate::bundler::{self, BuildOptions, Bundler, EntryMap};
use crate::codegen::{Codegen, Mode};
use crate::config::NovaConfig;
use crate::error::{BuildError, CliError, Result, ResultExt};
use crate::project::ProjectInfo;
use crate::router::RouteTable;
use crate::runner::run_once;
use crate::scanner::{self, FileClass, Scan};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Directories embedded by the production program.
pub const EMBEDDED_DIRS: [&str; 3] = ["static", "pages", "templates"];

/// What a build produced.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub routes: RouteTable,
    pub entries: EntryMap,
    /// Files copied into `pages` and `templates`
    pub documents: Vec<PathBuf>,
    pub main: PathBuf,
}

/// Everything up to and including `main.go`.
///
/// Parse failures abort the build, unlike in development.
pub async fn prepare(
    project: &ProjectInfo,
    config: &NovaConfig,
    bundler: &dyn Bundler,
) -> Result<BuildSummary> {
    let pages_root = project.abs(&config.router.pages);
    let out_dir = project.abs(&config.codegen.out_dir);
    let scan = scanner::scan(&pages_root)?;

    let (routes, errors) = RouteTable::from_files(project, &config.router, &scan.handlers);
    if let Some(err) = BuildError::join(errors) {
        return Err(err.into());
    }
    routes.warn_conflicts();

    let entries = bundler
        .build(&BuildOptions {
            entry_points: scan.scripts.clone(),
            out_dir: out_dir.join("static"),
            outbase: pages_root.clone(),
            metafile: out_dir.join("meta.json"),
            hashing: true,
        })
        .await?;

    let documents = write_documents(&scan, &pages_root, &out_dir, &entries)?;
    for dir in EMBEDDED_DIRS {
        let keep = out_dir.join(dir).join(".gitkeep");
        std::fs::write(&keep, "").with_path(&keep)?;
    }

    let codegen = Codegen::new(project, config)?;
    let main = codegen
        .generate(&routes, Mode::Production)?
        .into_iter()
        .next()
        .unwrap_or_else(|| out_dir.join("main.go"));

    Ok(BuildSummary {
        routes,
        entries,
        documents,
        main,
    })
}

/// Compile the generated program into `<outDir>/app`.
pub async fn compile(project: &ProjectInfo, config: &NovaConfig, main: &Path) -> Result<PathBuf> {
    let binary = project.abs(&config.codegen.out_dir).join("app");
    run_once(
        "go",
        [
            OsStr::new("build"),
            OsStr::new("-o"),
            binary.as_os_str(),
            main.as_os_str(),
        ],
        project.root(),
    )
    .await?;
    Ok(binary)
}

/// Copy pages and templates, pointing their references at the hashed bundle.
///
/// Other assets are copied into `pages` unchanged so the file server finds them.
fn write_documents(
    scan: &Scan,
    pages_root: &Path,
    out_dir: &Path,
    entries: &EntryMap,
) -> Result<Vec<PathBuf>> {
    let pages_dir = out_dir.join("pages");
    let templates_dir = out_dir.join("templates");
    for dir in [&pages_dir, &templates_dir] {
        reset_dir(dir)?;
    }

    let mut written = Vec::new();
    for file in scan.markup.iter().chain(&scan.assets) {
        let Ok(rel) = file.strip_prefix(pages_root) else {
            continue;
        };
        let target = if scan.templates.contains(file) {
            templates_dir.join(rel)
        } else {
            pages_dir.join(rel)
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }

        if FileClass::of(file) == FileClass::Markup {
            let source = std::fs::read_to_string(file).with_path(file)?;
            let html = bundler::production_page(&source, file, pages_root, entries);
            std::fs::write(&target, html).with_path(&target)?;
        } else {
            std::fs::copy(file, &target).with_path(file)?;
        }
        written.push(target);
    }
    Ok(written)
}

fn reset_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(CliError::Io(e)).with_path(dir),
    }
    std::fs::create_dir_all(dir).with_path(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::DevBuild;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Pretends every entry was bundled to `<stem>.HASH.js`.
    struct HashingBundler;

    #[async_trait]
    impl Bundler for HashingBundler {
        async fn build(&self, options: &BuildOptions) -> Result<EntryMap> {
            std::fs::create_dir_all(&options.out_dir)?;
            Ok(options
                .entry_points
                .iter()
                .map(|p| {
                    let stem = p.file_stem().unwrap().to_string_lossy();
                    (p.clone(), format!("{}.HASH.js", stem))
                })
                .collect())
        }

        async fn build_dev(&self, _entries: &[PathBuf]) -> Result<DevBuild> {
            Ok(DevBuild::default())
        }

        async fn vendor(&self, _packages: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_prepare_lays_out_output() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "src/pages/index.go", "package pages\n\n//nova:template layout.html\nfunc Render() {}\n");
        write(root, "src/pages/layout.html", "<html><head><script src=\"app.ts\"></script></head></html>");
        write(root, "src/pages/about.html", "<html><head><script src=\"/app.ts\"></script></head></html>");
        write(root, "src/pages/app.ts", "console.log(1)\n");
        write(root, "src/pages/logo.png", "png");

        let project = ProjectInfo::new(root, "example.com/site");
        let summary = prepare(&project, &NovaConfig::default(), &HashingBundler)
            .await
            .unwrap();

        assert_eq!(summary.main, root.join(".nova/main.go"));
        assert_eq!(summary.routes.patterns().len(), 1);
        for dir in EMBEDDED_DIRS {
            assert!(root.join(".nova").join(dir).join(".gitkeep").is_file());
        }

        let layout = std::fs::read_to_string(root.join(".nova/templates/layout.html")).unwrap();
        assert!(layout.contains(r#"src="/static/app.HASH.js""#));
        let about = std::fs::read_to_string(root.join(".nova/pages/about.html")).unwrap();
        assert!(about.contains(r#"src="/static/app.HASH.js""#));
        assert!(root.join(".nova/pages/logo.png").is_file());
        assert!(!root.join(".nova/pages/layout.html").exists());
    }

    #[tokio::test]
    async fn test_prepare_fails_on_parse_errors() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/pages/a/a.go", "package a\n\nfunc Get( {\n");
        write(temp.path(), "src/pages/b/b.go", "package b\n\nfunc Post( {\n");

        let project = ProjectInfo::new(temp.path(), "example.com/site");
        let err = prepare(&project, &NovaConfig::default(), &HashingBundler)
            .await
            .unwrap_err();
        match err {
            CliError::Build(BuildError::Joined(lines)) => assert_eq!(lines.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
