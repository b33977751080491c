//! Build command implementation.

use crate::cli::{BuildArgs, GlobalArgs};
use crate::commands::utils;
use crate::error::Result;
use crate::project;
use crate::ui::{self, Spinner};
use std::time::Instant;

/// Execute the build command.
///
/// # Build Process
///
/// 1. Discover the project and load configuration
/// 2. Scan and parse the pages directory; any parse error fails the build
/// 3. Bundle scripts with hashed names into `<outDir>/static`
/// 4. Copy pages and templates with rewritten references
/// 5. Generate `<outDir>/main.go`
/// 6. Compile it to `<outDir>/app` unless `--no-compile`
pub async fn execute(args: BuildArgs, global: &GlobalArgs) -> Result<()> {
    let start = Instant::now();
    let (project, config) = utils::load_project(global)?;
    let bundler = utils::esbuild(&project, &config);

    let spinner = Spinner::new("Generating...");
    let summary = match project::prepare(&project, &config, &bundler).await {
        Ok(summary) => summary,
        Err(e) => {
            spinner.fail("Generation failed");
            return Err(e);
        }
    };
    spinner.finish(&format!(
        "Bundled {} entries, copied {} files",
        summary.entries.len(),
        summary.documents.len()
    ));
    ui::print_route_summary(&summary.routes);

    if args.no_compile {
        ui::success(&format!("Generated {}", summary.main.display()));
        return Ok(());
    }

    let spinner = Spinner::new("Compiling...");
    match project::compile(&project, &config, &summary.main).await {
        Ok(binary) => {
            spinner.finish(&format!("Built {}", binary.display()));
            ui::success(&format!("Done in {}", ui::format_duration(start.elapsed())));
            Ok(())
        }
        Err(e) => {
            spinner.fail("go build failed");
            Err(e)
        }
    }
}
