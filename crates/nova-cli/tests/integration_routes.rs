//! Integration tests for scanning and route parsing.
//!
//! These tests lay out small projects on disk and check the route table and
//! generated code that come out of them.

use nova_cli::codegen::{Codegen, Mode};
use nova_cli::config::NovaConfig;
use nova_cli::project::{ProjectInfo, route_targets};
use nova_cli::router::{RouteKind, RouteTable};
use nova_cli::scanner;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project(temp: &TempDir) -> (ProjectInfo, NovaConfig) {
    write(temp.path(), "go.mod", "module example.com/site\n\ngo 1.22\n");
    let project = ProjectInfo::discover(temp.path()).unwrap();
    (project, NovaConfig::default())
}

fn table(project: &ProjectInfo, config: &NovaConfig) -> RouteTable {
    let scan = scanner::scan(&project.abs(&config.router.pages)).unwrap();
    let (table, errors) = RouteTable::from_files(project, &config.router, &scan.handlers);
    assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
    table
}

#[test]
fn test_root_render_handler() {
    let temp = TempDir::new().unwrap();
    let (project, config) = project(&temp);
    write(
        temp.path(),
        "src/pages/index.go",
        "package pages\n\nimport \"net/http\"\n\nfunc Render(w http.ResponseWriter, r *http.Request) {}\n",
    );

    let table = table(&project, &config);
    let routes = table.routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].pattern, "GET /{$}");
    assert_eq!(routes[0].kind, RouteKind::Render);
    assert_eq!(routes[0].module, "");
    assert_eq!(routes[0].package, "example.com/site/src/pages");
}

#[test]
fn test_nested_rest_handler_gets_api_base() {
    let temp = TempDir::new().unwrap();
    let (project, config) = project(&temp);
    write(
        temp.path(),
        "src/pages/users/get.go",
        "package users\n\nimport \"net/http\"\n\nfunc Get(w http.ResponseWriter, r *http.Request) {}\n\nfunc helper() {}\n",
    );

    let table = table(&project, &config);
    let targets = route_targets(&table);
    assert_eq!(targets.len(), 1);
    assert_eq!(targets.get("GET /api/users").map(String::as_str), Some("users"));
}

#[test]
fn test_template_directive_marks_template() {
    let temp = TempDir::new().unwrap();
    let (project, config) = project(&temp);
    write(
        temp.path(),
        "src/pages/about/index.go",
        "package about\n\n//nova:template layout.html\n\nimport \"net/http\"\n\nfunc Render(w http.ResponseWriter, r *http.Request) {}\n",
    );
    write(temp.path(), "src/pages/about/layout.html", "<html><head></head></html>");
    write(temp.path(), "src/pages/landing.html", "<html><head></head></html>");

    let pages_root = project.abs(&config.router.pages);
    let scan = scanner::scan(&pages_root).unwrap();
    assert!(scan.templates.contains(&pages_root.join("about/layout.html")));

    let pages: Vec<_> = scan.html_pages().cloned().collect();
    assert_eq!(pages, vec![pages_root.join("landing.html")]);

    let table = table(&project, &config);
    let users = table.render_routes_using(&pages_root.join("about/layout.html"));
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].pattern, "GET /about");
}

#[test]
fn test_generate_development_writes_route_modules() {
    let temp = TempDir::new().unwrap();
    let (project, config) = project(&temp);
    write(
        temp.path(),
        "src/pages/index.go",
        "package pages\n\nimport \"net/http\"\n\nfunc Render(w http.ResponseWriter, r *http.Request) {}\n",
    );
    write(
        temp.path(),
        "src/pages/users/get.go",
        "package users\n\nimport \"net/http\"\n\nfunc Get(w http.ResponseWriter, r *http.Request) {}\n",
    );

    let table = table(&project, &config);
    let codegen = Codegen::new(&project, &config).unwrap();
    codegen.generate(&table, Mode::Development).unwrap();

    let users = fs::read_to_string(codegen.route_module_path("users")).unwrap();
    assert!(users.contains("example.com/site/src/pages/users"));
    assert!(codegen.manifest_path().is_file());

    // The dev server serves whatever the control stream registers; it
    // imports no page package itself.
    let server = fs::read_to_string(codegen.out_dir().join("main.go")).unwrap();
    assert!(server.contains("Code generated by nova dev"));
    assert!(!server.contains("example.com/site/src/pages"));
}
