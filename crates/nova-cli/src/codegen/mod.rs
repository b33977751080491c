//! Code generation for the Go side of a project.
//!
//! Production builds get one `main.go` that registers every route and embeds
//! the bundled assets. Development gets a dev server `main.go` that applies
//! control messages from stdin, a [`DevManifest`] for the built-in runtime,
//! and one route module per handler directory, each a small program that
//! serves a single request over stdin and stdout.

mod manifest;
mod templates;

pub use manifest::{DevManifest, MANIFEST_FILE};
pub use templates::{DEV_MAIN_TEMPLATE, MAIN_TEMPLATE, ROUTE_MODULE_TEMPLATE};

use crate::config::NovaConfig;
use crate::error::{BuildError, CliError, Result};
use crate::project::ProjectInfo;
use crate::router::{Route, RouteInfo, RouteTable, module_alias, module_aliases};
use minijinja::{Environment, context};
use templates::HMR_CLIENT;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Which program set to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

#[derive(Debug, Serialize)]
struct ImportData {
    alias: String,
    package: String,
}

#[derive(Debug, Serialize)]
struct RenderData {
    pattern: String,
    root: String,
    templates: Vec<String>,
    alias: String,
    handler: String,
}

#[derive(Debug, Serialize)]
struct RestData {
    pattern: String,
    alias: String,
    handler: String,
}

/// Split routes into the template's render and REST lists.
fn route_data<'a>(
    routes: impl IntoIterator<Item = &'a RouteInfo>,
    aliases: &BTreeMap<String, String>,
) -> (Vec<RenderData>, Vec<RestData>) {
    let mut render = Vec::new();
    let mut rest = Vec::new();
    for info in routes {
        let alias = aliases.get(&info.module).cloned().unwrap_or_else(|| info.alias());
        match info.to_route() {
            Route::Render(r) => render.push(RenderData {
                pattern: r.pattern,
                root: r.root,
                templates: r.templates,
                alias,
                handler: r.handler,
            }),
            Route::Rest(r) => rest.push(RestData {
                pattern: r.pattern,
                alias,
                handler: r.handler,
            }),
        }
    }
    (render, rest)
}

/// Renders and writes generated programs under `codegen.outDir`.
pub struct Codegen {
    env: Environment<'static>,
    out_dir: PathBuf,
    pages_root: PathBuf,
    manifest: DevManifest,
    addr: String,
}

impl Codegen {
    pub fn new(project: &ProjectInfo, config: &NovaConfig) -> Result<Self> {
        Ok(Self {
            env: templates::environment()?,
            out_dir: project.abs(&config.codegen.out_dir),
            pages_root: project.abs(&config.router.pages),
            manifest: DevManifest::new(project, config),
            addr: config.server.addr(),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn manifest(&self) -> &DevManifest {
        &self.manifest
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.out_dir.join(MANIFEST_FILE)
    }

    /// Path of the route module serving `module`.
    pub fn route_module_path(&self, module: &str) -> PathBuf {
        let dir = self.manifest.pages_dir.clone();
        let dir = if module.is_empty() { dir } else { dir.join(module) };
        dir.join("main.go")
    }

    /// Where the development server program is written.
    pub fn dev_server_path(&self) -> PathBuf {
        self.out_dir.join("main.go")
    }

    /// Source of the development server.
    pub fn render_dev_main(&self) -> Result<String> {
        let m = &self.manifest;
        self.render(
            DEV_MAIN_TEMPLATE,
            context! {
                addr => m.addr(),
                root => m.root.to_string_lossy(),
                pages_dir => m.pages_dir.to_string_lossy(),
                vendor_dir => m.vendor_dir.to_string_lossy(),
                go => m.go,
                concurrency => m.route_module_concurrency.max(1),
                hmr_client => HMR_CLIENT,
            },
        )
    }

    /// Source of the production server.
    pub fn render_main(&self, table: &RouteTable) -> Result<String> {
        let routes = table.routes();
        let aliases = module_aliases(routes.iter().map(|r| r.module.as_str()));
        let imports: BTreeMap<&str, &str> = routes
            .iter()
            .filter_map(|r| Some((aliases.get(&r.module)?.as_str(), r.package.as_str())))
            .collect();
        let imports: Vec<ImportData> = imports
            .into_iter()
            .map(|(alias, package)| ImportData {
                alias: alias.to_string(),
                package: package.to_string(),
            })
            .collect();
        let (render_routes, rest_routes) = route_data(routes.iter().copied(), &aliases);

        self.render(
            MAIN_TEMPLATE,
            context! {
                production => true,
                imports,
                render_routes,
                rest_routes,
                addr => self.addr,
            },
        )
    }

    /// Source of the route module for the handlers in `module`.
    pub fn render_route_module(&self, module: &str, routes: &[&RouteInfo]) -> Result<String> {
        let package = routes
            .first()
            .map(|r| r.package.clone())
            .ok_or_else(|| BuildError::Custom(format!("no routes in module '{}'", module)))?;
        let aliases = module_aliases([module]);
        let (render_routes, rest_routes) = route_data(routes.iter().copied(), &aliases);

        self.render(
            ROUTE_MODULE_TEMPLATE,
            context! {
                production => false,
                alias => module_alias(module),
                package,
                pages_root => self.pages_root.to_string_lossy(),
                render_routes,
                rest_routes,
            },
        )
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| templates::template_error(name, e))?;
        let mut source = template
            .render(ctx)
            .map_err(|e| templates::template_error(name, e))?;
        source.push('\n');
        Ok(source)
    }

    /// Write every program for `mode`.
    ///
    /// Failures are collected across files and returned together; files
    /// written before a failure stay on disk.
    pub fn generate(&self, table: &RouteTable, mode: Mode) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        let mut errors: Vec<CliError> = Vec::new();

        match mode {
            Mode::Production => match self.write_main(table) {
                Ok(path) => written.push(path),
                Err(e) => errors.push(e),
            },
            Mode::Development => {
                for result in [self.write_manifest(), self.write_dev_main()] {
                    match result {
                        Ok(path) => written.push(path),
                        Err(e) => errors.push(e),
                    }
                }
                for (module, routes) in table.modules() {
                    match self.write_route_module(&module, &routes) {
                        Ok(path) => written.push(path),
                        Err(e) => errors.push(e),
                    }
                }
            }
        }

        match BuildError::join(errors) {
            Some(err) => Err(err.into()),
            None => Ok(written),
        }
    }

    pub fn write_main(&self, table: &RouteTable) -> Result<PathBuf> {
        let source = self.render_main(table)?;
        let path = self.out_dir.join("main.go");
        write_file(&path, source.as_bytes())?;
        Ok(path)
    }

    pub fn write_dev_main(&self) -> Result<PathBuf> {
        let source = self.render_dev_main()?;
        let path = self.dev_server_path();
        write_file(&path, source.as_bytes())?;
        Ok(path)
    }

    pub fn write_manifest(&self) -> Result<PathBuf> {
        let path = self.manifest_path();
        write_file(&path, self.manifest.to_json()?.as_bytes())?;
        Ok(path)
    }

    /// Write or remove the route module of `module` to match `routes`.
    pub fn sync_route_module(&self, module: &str, routes: &[&RouteInfo]) -> Result<Option<PathBuf>> {
        if routes.is_empty() {
            self.remove_route_module(module)?;
            Ok(None)
        } else {
            self.write_route_module(module, routes).map(Some)
        }
    }

    pub fn write_route_module(&self, module: &str, routes: &[&RouteInfo]) -> Result<PathBuf> {
        let source = self.render_route_module(module, routes)?;
        let path = self.route_module_path(module);
        write_file(&path, source.as_bytes())?;
        tracing::debug!("Generated {}", path.display());
        Ok(path)
    }

    pub fn remove_route_module(&self, module: &str) -> Result<()> {
        let path = self.route_module_path(module);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CliError::Io(e)),
        }
    }
}

/// Create parent directories and write `contents`, naming the file on error.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let result = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| std::fs::write(path, contents));
    result.map_err(|e| CliError::Custom(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RouteKind;
    use tempfile::TempDir;

    fn route(kind: RouteKind, method: &str, pattern: &str, module: &str, handler: &str) -> RouteInfo {
        let dir = if module.is_empty() {
            PathBuf::from("/site/src/pages")
        } else {
            PathBuf::from("/site/src/pages").join(module)
        };
        RouteInfo {
            method: method.to_string(),
            pattern: pattern.to_string(),
            package: if module.is_empty() {
                "example.com/site/src/pages".to_string()
            } else {
                format!("example.com/site/src/pages/{}", module)
            },
            module: module.to_string(),
            handler: handler.to_string(),
            kind,
            templates: if kind == RouteKind::Render {
                vec![dir.join("layout.html"), dir.join("index.html")]
            } else {
                vec![]
            },
            file: dir.join("page.go"),
        }
    }

    fn table() -> RouteTable {
        let mut table = RouteTable::new();
        table.replace(
            PathBuf::from("/site/src/pages/page.go"),
            vec![route(RouteKind::Render, "RENDER", "GET /{$}", "", "Render")],
        );
        table.replace(
            PathBuf::from("/site/src/pages/users/page.go"),
            vec![
                route(RouteKind::Rest, "GET", "GET /api/users", "users", "Get"),
                route(RouteKind::Rest, "POST", "POST /api/users", "users", "Post"),
            ],
        );
        table
    }

    fn codegen(root: &Path) -> Codegen {
        Codegen::new(&ProjectInfo::new(root, "example.com/site"), &NovaConfig::default()).unwrap()
    }

    #[test]
    fn test_render_main() {
        let source = codegen(Path::new("/site")).render_main(&table()).unwrap();
        assert!(source.contains(r#"pages "example.com/site/src/pages""#));
        assert!(source.contains(r#"pages_users "example.com/site/src/pages/users""#));
        assert!(source.contains(
            r#"mux.Handle("GET /{$}", renderHandler("", []string{"layout.html", "index.html"}, pages.Render))"#
        ));
        assert!(source.contains(r#"mux.HandleFunc("POST /api/users", pages_users.Post)"#));
        assert!(source.contains(r#"Addr:    "localhost:8080","#));
        assert!(source.contains("templatesFS"));
    }

    #[test]
    fn test_render_main_registrations() {
        let source = codegen(Path::new("/site")).render_main(&table()).unwrap();
        let registrations: Vec<&str> = source
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with("mux.Handle"))
            .collect();
        insta::assert_snapshot!(registrations.join("\n"), @r#"
        mux.Handle("GET /{$}", renderHandler("", []string{"layout.html", "index.html"}, pages.Render))
        mux.HandleFunc("GET /api/users", pages_users.Get)
        mux.HandleFunc("POST /api/users", pages_users.Post)
        mux.Handle("/static/", http.FileServerFS(staticFS))
        mux.Handle("/", http.FileServerFS(pagesFS))
        "#);

        let table = table();
        let source = codegen(Path::new("/site"))
            .render_route_module("users", &table.module_routes("users"))
            .unwrap();
        let registrations: Vec<&str> = source
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with("mux.Handle"))
            .collect();
        insta::assert_snapshot!(registrations.join("\n"), @r#"
        mux.HandleFunc("GET /api/users", pages_users.Get)
        mux.HandleFunc("POST /api/users", pages_users.Post)
        "#);
    }

    #[test]
    fn test_render_route_without_templates() {
        let mut index = route(RouteKind::Render, "RENDER", "GET /{$}", "", "Render");
        index.templates.clear();
        let mut table = RouteTable::new();
        table.replace(PathBuf::from("/site/src/pages/page.go"), vec![index]);

        let codegen = codegen(Path::new("/site"));
        let main = codegen.render_main(&table).unwrap();
        assert!(main.contains(r#"renderHandler("", []string{}, pages.Render)"#));
        let guarded: Vec<&str> = main
            .lines()
            .map(str::trim)
            .skip_while(|l| !l.starts_with("var t *template.Template"))
            .take(4)
            .collect();
        insta::assert_snapshot!(guarded.join("\n"), @r"
        var t *template.Template
        if len(names) > 0 {
        t = template.Must(template.ParseFS(templatesFS, names...))
        }
        ");

        let module = codegen.render_route_module("", &table.module_routes("")).unwrap();
        assert!(module.contains("if len(names) > 0 {"));
        assert!(!module.contains("template.Must"));
    }

    #[test]
    fn test_colliding_modules_get_distinct_imports() {
        let mut table = RouteTable::new();
        table.replace(
            PathBuf::from("/site/src/pages/a-b/page.go"),
            vec![route(RouteKind::Rest, "GET", "GET /api/a-b", "a-b", "Get")],
        );
        table.replace(
            PathBuf::from("/site/src/pages/a_b/page.go"),
            vec![route(RouteKind::Rest, "GET", "GET /api/a_b", "a_b", "Get")],
        );

        let source = codegen(Path::new("/site")).render_main(&table).unwrap();
        assert!(source.contains(r#"pages_a_b "example.com/site/src/pages/a-b""#));
        assert!(source.contains(r#"pages_a_b_2 "example.com/site/src/pages/a_b""#));
        assert!(source.contains(r#"mux.HandleFunc("GET /api/a-b", pages_a_b.Get)"#));
        assert!(source.contains(r#"mux.HandleFunc("GET /api/a_b", pages_a_b_2.Get)"#));
    }

    #[test]
    fn test_render_route_module() {
        let table = table();
        let routes = table.module_routes("users");
        let source = codegen(Path::new("/site"))
            .render_route_module("users", &routes)
            .unwrap();
        assert!(source.contains(r#"pages_users "example.com/site/src/pages/users""#));
        assert!(source.contains(r#"mux.HandleFunc("GET /api/users", pages_users.Get)"#));
        assert!(source.contains(r#"os.DirFS("/site/src/pages")"#));
        assert!(!source.contains("templatesFS"));
    }

    #[test]
    fn test_generate_development() {
        let temp = TempDir::new().unwrap();
        let codegen = codegen(temp.path());
        let written = codegen.generate(&table(), Mode::Development).unwrap();

        assert_eq!(written.len(), 4);
        assert!(codegen.manifest_path().is_file());
        assert_eq!(codegen.dev_server_path(), temp.path().join(".nova/main.go"));
        assert!(codegen.dev_server_path().is_file());
        assert!(temp.path().join(".nova/pages/main.go").is_file());
        assert!(temp.path().join(".nova/pages/users/main.go").is_file());

        codegen.sync_route_module("users", &[]).unwrap();
        assert!(!temp.path().join(".nova/pages/users/main.go").exists());
        codegen.remove_route_module("users").unwrap();
    }

    #[test]
    fn test_render_dev_main() {
        let source = codegen(Path::new("/site")).render_dev_main().unwrap();
        let constants: Vec<&str> = source
            .lines()
            .skip_while(|l| !l.starts_with("const ("))
            .skip(1)
            .take_while(|l| !l.starts_with(')'))
            .map(str::trim)
            .collect();
        insta::assert_snapshot!(constants.join("\n"), @r#"
        addr        = "localhost:8080"
        root        = "/site"
        pagesDir    = "/site/.nova/pages"
        vendorDir   = "/site/node_modules/.nova"
        goTool      = "go"
        concurrency = 8
        "#);

        assert!(source.contains("const hmrClient = \"// Nova development client.\\n"));
        assert!(source.contains(r#"mux.Handle("/@nova/hmr", hr.hub)"#));
        assert!(source.contains(r#"fmt.Fprintf(w, "event: change\ndata: %s\n\n", data)"#));
        assert!(source.contains(r#"case "createRoute":"#));
        assert!(!source.contains("{{"));
    }

    #[test]
    fn test_generate_production() {
        let temp = TempDir::new().unwrap();
        let written = codegen(temp.path()).generate(&table(), Mode::Production).unwrap();
        assert_eq!(written, vec![temp.path().join(".nova/main.go")]);
    }

    #[test]
    fn test_empty_module_is_an_error() {
        assert!(codegen(Path::new("/site")).render_route_module("x", &[]).is_err());
    }
}
