//! State of a running `nova dev`.
//!
//! The session owns the route table, the last scan, the development bundle
//! and the HTML pages handed to the runtime. Watcher callbacks lock it, work
//! out what changed and queue one bulk [`Message`] per batch; the dev command
//! forwards the queue to the runtime child.

use crate::bundler::{self, Bundler, DevContext, EntryMap, OutputFiles};
use crate::codegen::{Codegen, Mode};
use crate::config::NovaConfig;
use crate::error::{CliError, Result, ResultExt};
use crate::hmr::Message;
use crate::project::{ProjectInfo, to_slash};
use crate::router::{self, RouteInfo, RouteTable};
use crate::scanner::{self, SCRIPT_EXTENSIONS, Scan};
use crate::watcher::{Callbacks, Event};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Watch key for handler sources.
pub const HANDLER_KEY: &str = "*.go";
/// Watch key for markup.
pub const MARKUP_KEY: &str = "*.html";

/// Watch key for everything the bundler takes as an entry point.
pub fn script_key() -> String {
    SCRIPT_EXTENSIONS
        .iter()
        .map(|ext| format!("*.{}", ext))
        .collect::<Vec<_>>()
        .join(",")
}

/// Pattern to route-module map of everything in `table`.
pub fn route_targets(table: &RouteTable) -> BTreeMap<String, String> {
    table
        .routes()
        .into_iter()
        .map(|r| (r.pattern.clone(), r.module.clone()))
        .collect()
}

/// Route messages turning `before` into `after`.
///
/// Patterns in `touched` that survive the change are reported as updated;
/// a surviving pattern served by a different module is created again.
pub fn route_messages(
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
    touched: &BTreeSet<String>,
) -> Vec<Message> {
    let mut messages = Vec::new();
    for pattern in before.keys().filter(|p| !after.contains_key(*p)) {
        messages.push(Message::delete_route(pattern.clone()));
    }
    for (pattern, module) in after {
        match before.get(pattern) {
            None => messages.push(Message::create_route(pattern.clone(), module.clone())),
            Some(old) if old != module => {
                messages.push(Message::create_route(pattern.clone(), module.clone()))
            }
            Some(_) if touched.contains(pattern) => {
                messages.push(Message::update_route(pattern.clone()))
            }
            Some(_) => {}
        }
    }
    messages
}

struct State {
    scan: Scan,
    table: RouteTable,
    bundle: DevContext,
    /// Served HTML pages by name
    pages: OutputFiles,
}

/// Shared handle on a dev session.
#[derive(Clone)]
pub struct DevSession {
    project: Arc<ProjectInfo>,
    config: Arc<NovaConfig>,
    codegen: Arc<Codegen>,
    state: Arc<Mutex<State>>,
    outbox: mpsc::UnboundedSender<Message>,
}

impl DevSession {
    /// Scan, parse, generate and bundle everything, then queue the initial
    /// bulk message.
    ///
    /// Parse, generation and bundling failures are logged; the session still
    /// starts so that fixing the file brings it back.
    pub async fn start(
        project: ProjectInfo,
        config: NovaConfig,
        bundler: Arc<dyn Bundler>,
        outbox: mpsc::UnboundedSender<Message>,
    ) -> Result<Self> {
        let pages_root = project.abs(&config.router.pages);
        let scan = scan_pages(&pages_root).await?;

        let (table, errors) = RouteTable::from_files(&project, &config.router, &scan.handlers);
        for err in errors {
            tracing::warn!("{}", err);
        }
        table.warn_conflicts();

        let codegen = Codegen::new(&project, &config)?;
        if let Err(e) = codegen.generate(&table, Mode::Development) {
            tracing::error!("{}", e);
        }

        let mut bundle = DevContext::new(bundler, scan.scripts.iter().cloned());
        let mut messages = match bundle.rebuild().await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("{}", e);
                Vec::new()
            }
        };

        let pages = render_pages(&scan, &pages_root, &bundle).await;
        messages.extend(bundler::diff_outputs(&OutputFiles::new(), &pages));
        messages.extend(
            route_targets(&table)
                .into_iter()
                .map(|(pattern, module)| Message::create_route(pattern, module)),
        );

        tracing::info!(
            "{} routes, {} bundled files, {} pages",
            table.patterns().len(),
            bundle.outputs().len(),
            pages.len()
        );

        let session = Self {
            project: Arc::new(project),
            config: Arc::new(config),
            codegen: Arc::new(codegen),
            state: Arc::new(Mutex::new(State {
                scan,
                table,
                bundle,
                pages,
            })),
            outbox,
        };
        session.publish(messages);
        Ok(session)
    }

    pub fn project(&self) -> &ProjectInfo {
        &self.project
    }

    pub fn config(&self) -> &NovaConfig {
        &self.config
    }

    pub fn pages_root(&self) -> PathBuf {
        self.project.abs(&self.config.router.pages)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.codegen.manifest_path()
    }

    pub fn dev_server_path(&self) -> PathBuf {
        self.codegen.dev_server_path()
    }

    /// Go toolchain the dev server and route modules run with.
    pub fn go(&self) -> String {
        self.codegen.manifest().go.clone()
    }

    pub async fn patterns(&self) -> BTreeSet<String> {
        self.state.lock().await.table.patterns()
    }

    /// Queue `messages` as one bulk. Callers hold the state lock so that
    /// bulks reach the runtime in the order their diffs were taken.
    fn publish(&self, messages: Vec<Message>) {
        let Some(message) = Message::bulk(messages) else {
            return;
        };
        tracing::debug!("Queued {} control messages", message.len());
        if self.outbox.send(message).is_err() {
            tracing::debug!("Control queue closed; dropping messages");
        }
    }

    /// Watcher callbacks for the pages root.
    pub fn callbacks(&self) -> Result<Callbacks> {
        let handlers = self.clone();
        let scripts = self.clone();
        let markup = self.clone();
        Callbacks::new()
            .on(HANDLER_KEY, move |event: Event, files: Vec<PathBuf>| {
                let session = handlers.clone();
                async move { session.on_handlers(event, files).await }
            })?
            .on(&script_key(), move |event: Event, files: Vec<PathBuf>| {
                let session = scripts.clone();
                async move { session.on_scripts(event, files).await }
            })?
            .on(MARKUP_KEY, move |event: Event, files: Vec<PathBuf>| {
                let session = markup.clone();
                async move { session.on_markup(event, files).await }
            })
    }

    /// Re-parse changed handler files and update their route modules.
    pub async fn on_handlers(&self, event: Event, files: Vec<PathBuf>) -> Result<()> {
        let pages_root = self.pages_root();
        let mut state = self.state.lock().await;
        let before = route_targets(&state.table);

        let mut touched = BTreeSet::new();
        let mut modules = BTreeSet::new();
        for file in &files {
            let dir = file.parent().unwrap_or(&pages_root);
            modules.insert(dir.strip_prefix(&pages_root).map(to_slash).unwrap_or_default());

            let old = match event {
                Event::Delete => state.table.remove(file),
                Event::Create | Event::Update => {
                    match router::parse_file(&self.project, &self.config.router, file) {
                        Ok(routes) => state.table.replace(file.clone(), routes),
                        Err(e) => {
                            tracing::warn!("{}", e);
                            continue;
                        }
                    }
                }
            };
            touched.extend(old.iter().map(|r| r.pattern.clone()));
            touched.extend(state.table.get(file).iter().map(|r| r.pattern.clone()));
        }
        state.table.warn_conflicts();

        for module in &modules {
            let routes: Vec<&RouteInfo> = state.table.module_routes(module);
            if let Err(e) = self.codegen.sync_route_module(module, &routes) {
                tracing::error!("{}", e);
            }
        }

        let after = route_targets(&state.table);
        tracing::info!("{} {} handler file(s)", event, files.len());
        self.publish(route_messages(&before, &after, &touched));
        Ok(())
    }

    /// Rebuild the bundle after scripts changed.
    pub async fn on_scripts(&self, event: Event, files: Vec<PathBuf>) -> Result<()> {
        let pages_root = self.pages_root();
        let mut state = self.state.lock().await;
        for file in files {
            match event {
                Event::Create => state.bundle.add_entry(file),
                Event::Delete => state.bundle.remove_entry(&file),
                Event::Update => false,
            };
        }

        let import_map = state.bundle.import_map();
        let entry_map = state.bundle.entry_map().clone();
        let mut messages = state.bundle.rebuild().await?;

        if state.bundle.import_map() != import_map || *state.bundle.entry_map() != entry_map {
            let pages = render_pages(&state.scan, &pages_root, &state.bundle).await;
            messages.extend(bundler::diff_outputs(&state.pages, &pages));
            state.pages = pages;
        }

        tracing::info!("Rebuilt bundle ({} changed file(s))", messages.len());
        self.publish(messages);
        Ok(())
    }

    /// Re-render pages and notify routes whose templates changed.
    pub async fn on_markup(&self, _event: Event, files: Vec<PathBuf>) -> Result<()> {
        let pages_root = self.pages_root();
        let scan = scan_pages(&pages_root).await?;

        let mut state = self.state.lock().await;
        let pages = render_pages(&scan, &pages_root, &state.bundle).await;
        let mut messages = bundler::diff_outputs(&state.pages, &pages);

        let templates: BTreeSet<String> = files
            .iter()
            .filter(|f| scan.templates.contains(*f) || state.scan.templates.contains(*f))
            .flat_map(|f| state.table.render_routes_using(f))
            .map(|r| r.pattern.clone())
            .collect();
        messages.extend(templates.into_iter().map(Message::update_route));

        state.scan = scan;
        state.pages = pages;
        self.publish(messages);
        Ok(())
    }
}

/// Walk the pages root on the blocking pool.
async fn scan_pages(pages_root: &Path) -> Result<Scan> {
    let root = pages_root.to_path_buf();
    tokio::task::spawn_blocking(move || scanner::scan(&root))
        .await
        .map_err(|e| CliError::Scan {
            root: pages_root.to_path_buf(),
            message: e.to_string(),
        })?
}

/// Development rendition of every HTML page, keyed by its served name.
///
/// Pages are read on the blocking pool.
async fn render_pages(scan: &Scan, pages_root: &Path, bundle: &DevContext) -> OutputFiles {
    let documents: Vec<PathBuf> = scan.html_pages().cloned().collect();
    let pages_root = pages_root.to_path_buf();
    let entry_map = bundle.entry_map().clone();
    let import_map = bundle.import_map();
    let rendered = tokio::task::spawn_blocking(move || {
        read_pages(&documents, &pages_root, &entry_map, import_map.as_deref())
    })
    .await;
    rendered.unwrap_or_else(|e| {
        tracing::error!("Rendering pages failed: {}", e);
        OutputFiles::new()
    })
}

fn read_pages(
    documents: &[PathBuf],
    pages_root: &Path,
    entry_map: &EntryMap,
    import_map: Option<&str>,
) -> OutputFiles {
    let mut pages = OutputFiles::new();
    for page in documents {
        let source = match std::fs::read_to_string(page).with_path(page) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("{}", e);
                continue;
            }
        };
        let Ok(rel) = page.strip_prefix(pages_root) else {
            continue;
        };
        let html = bundler::development_page(&source, page, pages_root, entry_map, import_map);
        pages.insert(to_slash(rel), Bytes::from(html));
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{BuildOptions, DevBuild};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StaticBundler;

    #[async_trait]
    impl Bundler for StaticBundler {
        async fn build(&self, _options: &BuildOptions) -> Result<EntryMap> {
            Ok(EntryMap::new())
        }

        async fn build_dev(&self, entries: &[PathBuf]) -> Result<DevBuild> {
            let mut build = DevBuild::default();
            for entry in entries {
                let name = entry.file_stem().unwrap().to_string_lossy().to_string() + ".js";
                build.entries.insert(entry.clone(), name.clone());
                build.outputs.insert(name, Bytes::from_static(b"// bundle"));
            }
            Ok(build)
        }

        async fn vendor(&self, _packages: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn messages(bulk: Message) -> Vec<Message> {
        match bulk {
            Message::Bulk { messages } => messages,
            other => vec![other],
        }
    }

    async fn session(temp: &TempDir) -> (DevSession, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let project = ProjectInfo::new(temp.path(), "example.com/site");
        let session = DevSession::start(project, NovaConfig::default(), Arc::new(StaticBundler), tx)
            .await
            .unwrap();
        (session, rx)
    }

    #[test]
    fn test_route_messages() {
        let before = BTreeMap::from([
            ("GET /a".to_string(), "a".to_string()),
            ("GET /b".to_string(), "b".to_string()),
            ("GET /c".to_string(), "c".to_string()),
        ]);
        let after = BTreeMap::from([
            ("GET /a".to_string(), "a".to_string()),
            ("GET /c".to_string(), "moved".to_string()),
            ("GET /d".to_string(), "d".to_string()),
        ]);
        let touched = BTreeSet::from(["GET /a".to_string()]);
        assert_eq!(
            route_messages(&before, &after, &touched),
            vec![
                Message::delete_route("GET /b"),
                Message::update_route("GET /a"),
                Message::create_route("GET /c", "moved"),
                Message::create_route("GET /d", "d"),
            ]
        );
    }

    #[test]
    fn test_script_key() {
        assert_eq!(script_key(), "*.js,*.mjs,*.jsx,*.mjsx,*.ts,*.tsx,*.css");
    }

    #[tokio::test]
    async fn test_initial_bulk() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/pages/index.go", "package pages\n\nfunc Render() {}\n");
        write(temp.path(), "src/pages/app.ts", "console.log(1)\n");
        write(
            temp.path(),
            "src/pages/about.html",
            "<html><head><script src=\"app.ts\"></script></head></html>",
        );

        let (_session, mut rx) = session(&temp).await;
        let initial = messages(rx.try_recv().unwrap());

        assert!(initial.contains(&Message::create_route("GET /{$}", "")));
        assert!(initial.iter().any(|m| matches!(m, Message::CreateFile { filename, .. } if filename == "app.js")));
        let about = initial
            .iter()
            .find_map(|m| match m {
                Message::CreateFile { filename, contents } if filename == "about.html" => {
                    Some(String::from_utf8_lossy(contents).to_string())
                }
                _ => None,
            })
            .unwrap();
        assert!(about.contains(r#"src="/app.js""#));
        assert!(about.contains("/@nova/hmr.js"));
        assert!(temp.path().join(".nova/dev.json").is_file());
        assert!(temp.path().join(".nova/pages/main.go").is_file());
    }

    #[tokio::test]
    async fn test_deleting_a_handler_deletes_its_routes() {
        let temp = TempDir::new().unwrap();
        let users = write(
            temp.path(),
            "src/pages/users/users.go",
            "package users\n\nfunc Get() {}\nfunc Post() {}\n",
        );
        let (session, mut rx) = session(&temp).await;
        rx.try_recv().unwrap();

        std::fs::remove_file(&users).unwrap();
        session.on_handlers(Event::Delete, vec![users]).await.unwrap();

        assert_eq!(
            messages(rx.try_recv().unwrap()),
            vec![
                Message::delete_route("GET /api/users"),
                Message::delete_route("POST /api/users"),
            ]
        );
        assert!(session.patterns().await.is_empty());
        assert!(!temp.path().join(".nova/pages/users/main.go").exists());
    }

    #[tokio::test]
    async fn test_updating_a_handler() {
        let temp = TempDir::new().unwrap();
        let file = write(temp.path(), "src/pages/a/a.go", "package a\n\nfunc Get() {}\n");
        let (session, mut rx) = session(&temp).await;
        rx.try_recv().unwrap();

        write(temp.path(), "src/pages/a/a.go", "package a\n\nfunc Get() {}\nfunc Put() {}\n");
        session.on_handlers(Event::Update, vec![file.clone()]).await.unwrap();
        assert_eq!(
            messages(rx.try_recv().unwrap()),
            vec![
                Message::update_route("GET /api/a"),
                Message::create_route("PUT /api/a", "a"),
            ]
        );

        write(temp.path(), "src/pages/a/a.go", "package a\n\nfunc Get( {\n");
        session.on_handlers(Event::Update, vec![file]).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(session.patterns().await.len(), 2);
    }

    #[tokio::test]
    async fn test_template_change_updates_render_route() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "src/pages/blog/blog.go",
            "package blog\n\n//nova:template post.html\nfunc Render() {}\n",
        );
        let template = write(temp.path(), "src/pages/blog/post.html", "<h1>{{ .Title }}</h1>");
        let (session, mut rx) = session(&temp).await;
        let initial = messages(rx.try_recv().unwrap());
        assert!(!initial.iter().any(|m| matches!(m, Message::CreateFile { filename, .. } if filename == "blog/post.html")));

        session.on_markup(Event::Update, vec![template]).await.unwrap();
        assert_eq!(messages(rx.try_recv().unwrap()), vec![Message::update_route("GET /blog")]);
    }

    #[tokio::test]
    async fn test_new_script_is_bundled() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/pages/index.go", "package pages\n\nfunc Render() {}\n");
        let (session, mut rx) = session(&temp).await;
        rx.try_recv().unwrap();

        let script = write(temp.path(), "src/pages/extra.ts", "export {}\n");
        session.on_scripts(Event::Create, vec![script]).await.unwrap();
        assert_eq!(
            messages(rx.try_recv().unwrap()),
            vec![Message::create_file("extra.js", Bytes::from_static(b"// bundle"))]
        );
    }
}
