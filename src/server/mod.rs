//! Development server
//!
//! Serves the development build with:
//! - Build output and shared dependency directories as static roots
//! - WebSocket-based hot reload notifications
//! - File watching with serialized rebuilds

mod hmr;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, error, info, warn};

use crate::config::{ProjectSettings, RouterHook, StaticMount};
use crate::descriptor::BuildDescriptor;
use crate::engine::{BuildEngine, BuildStats};
use crate::paths::ToolPaths;
use crate::staging::{staged_name, OUTPUT_DIR, SERVER_OUTPUT_DIR, TEMPLATE_DIR};

pub use hmr::{HmrHub, HmrMessage};

/// Route of the hot-reload WebSocket; the path `webpack-dev-server/client` connects to
pub const HMR_ROUTE: &str = "/ws";

/// Quiet period before a batch of file changes triggers a rebuild
pub const WATCH_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Development server options
#[derive(Clone)]
pub struct DevServerOptions {
    pub host: String,
    pub port: u16,
    pub hot: bool,

    /// Served under `/<file name>`
    pub favicon: Option<PathBuf>,

    /// Searched in order after the build output
    pub static_dirs: Vec<PathBuf>,

    pub output_dir: PathBuf,
    pub mounts: Vec<StaticMount>,
    pub before: Option<RouterHook>,

    /// Directory watched for rebuilds
    pub watch_root: PathBuf,

    /// Top-level entries of `watch_root` that never trigger a rebuild
    pub ignored: Vec<String>,
}

impl DevServerOptions {
    /// Options for serving `settings` from the project in `paths`
    pub fn from_settings(settings: &ProjectSettings, paths: &ToolPaths, port: u16) -> Self {
        let root = &paths.project_root;
        let mut ignored: Vec<String> = [OUTPUT_DIR, SERVER_OUTPUT_DIR, TEMPLATE_DIR]
            .iter()
            .flat_map(|dir| [dir.to_string(), staged_name(dir)])
            .collect();
        ignored.push(settings.engine.descriptor_dir.clone());
        ignored.push("node_modules".to_string());

        Self {
            host: settings
                .dev_server
                .host
                .clone()
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            hot: settings.dev_server.hot,
            favicon: settings.favicon.as_ref().map(|f| root.join(f)),
            static_dirs: paths.static_dirs(),
            output_dir: root.join(OUTPUT_DIR),
            mounts: settings
                .dev_server
                .mounts
                .iter()
                .map(|mount| StaticMount {
                    route: mount.route.clone(),
                    dir: root.join(&mount.dir).display().to_string(),
                })
                .collect(),
            before: settings.dev_server.before.clone(),
            watch_root: root.clone(),
            ignored,
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.watch_root) else {
            return true;
        };
        match relative.components().next() {
            Some(Component::Normal(first)) => {
                let first = first.to_string_lossy();
                self.ignored.iter().any(|name| *name == first)
            }
            _ => false,
        }
    }
}

/// Shared server state
struct ServerState {
    /// Static roots, searched in order
    roots: Vec<PathBuf>,

    hub: Arc<HmrHub>,
}

/// Development server
pub struct DevServer {
    options: DevServerOptions,
    hub: Arc<HmrHub>,
}

impl DevServer {
    pub fn new(options: DevServerOptions) -> Self {
        let hub = Arc::new(HmrHub::new(options.hot));
        Self { options, hub }
    }

    /// All routes of the server.
    ///
    /// The `before` hook sees an empty router; the built-in routes are merged
    /// after it, so a hook must not install its own fallback.
    pub fn router(&self) -> Router {
        let mut roots = vec![self.options.output_dir.clone()];
        roots.extend(self.options.static_dirs.iter().cloned());

        let state = Arc::new(ServerState {
            roots,
            hub: self.hub.clone(),
        });

        let mut app = Router::new();
        if let Some(before) = &self.options.before {
            app = before(app);
        }

        if let Some(favicon) = &self.options.favicon {
            match favicon.file_name().and_then(|n| n.to_str()) {
                Some(name) => {
                    app = app.route_service(&format!("/{}", name), ServeFile::new(favicon));
                }
                None => warn!("Ignoring favicon without a file name: {}", favicon.display()),
            }
        }

        for mount in &self.options.mounts {
            let route = format!("/{}", mount.route.trim_matches('/'));
            if route == "/" {
                warn!("Ignoring static mount of {} at the site root", mount.dir);
                continue;
            }
            app = app.nest_service(&route, ServeDir::new(&mount.dir));
        }

        let builtin = Router::new()
            .route(HMR_ROUTE, get(hmr::hmr_websocket))
            .fallback(serve_static)
            .with_state(state);

        app.merge(builtin).layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(SetResponseHeaderLayer::overriding(
                    header::ACCESS_CONTROL_ALLOW_ORIGIN,
                    HeaderValue::from_static("*"),
                )),
        )
    }

    /// Serve until the process is stopped.
    ///
    /// `initial` is the result of the build that ran before the server started.
    pub async fn start(
        self,
        engine: Arc<dyn BuildEngine>,
        descriptor: BuildDescriptor,
        initial: BuildStats,
    ) -> Result<()> {
        self.hub.publish(&initial);

        let (changes_tx, changes_rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
        let _debouncer = self.watch(changes_tx)?;
        tokio::spawn(rebuild_loop(changes_rx, engine, descriptor, self.hub.clone()));

        let app = self.router();
        let listener =
            tokio::net::TcpListener::bind((self.options.host.as_str(), self.options.port)).await?;

        info!("DevServer on http://{}:{}", self.options.host, self.options.port);
        eprintln!(
            "  {} DevServer on {}",
            "➜".green(),
            format!("http://{}:{}", self.options.host, self.options.port).cyan()
        );

        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Watch the project, forwarding relevant change batches to `changes`.
    ///
    /// The returned debouncer stops watching when dropped.
    fn watch(
        &self,
        changes: mpsc::UnboundedSender<Vec<PathBuf>>,
    ) -> Result<notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>> {
        let options = self.options.clone();

        let mut debouncer = new_debouncer(WATCH_DEBOUNCE, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let paths: Vec<PathBuf> = events
                        .into_iter()
                        .map(|event| event.path)
                        .filter(|path| !options.is_ignored(path))
                        .collect();
                    if !paths.is_empty() {
                        let _ = changes.send(paths);
                    }
                }
                Err(e) => error!("Watch error: {:?}", e),
            }
        })?;

        debouncer
            .watcher()
            .watch(&self.options.watch_root, RecursiveMode::Recursive)?;
        debug!("Watching {}", self.options.watch_root.display());

        Ok(debouncer)
    }
}

/// Runs one build per change batch; batches queued during a build are merged
async fn rebuild_loop(
    mut changes: mpsc::UnboundedReceiver<Vec<PathBuf>>,
    engine: Arc<dyn BuildEngine>,
    descriptor: BuildDescriptor,
    hub: Arc<HmrHub>,
) {
    while let Some(mut paths) = changes.recv().await {
        while let Ok(more) = changes.try_recv() {
            paths.extend(more);
        }
        paths.sort();
        paths.dedup();

        for path in &paths {
            eprintln!(
                "  {} File changed: {}",
                "↻".yellow(),
                path.display().to_string().dimmed()
            );
        }

        hub.invalidate();
        match engine.run(&descriptor).await {
            Ok(stats) => {
                info!("Rebuilt after {} change(s)", paths.len());
                hub.publish(&stats);
            }
            Err(e) => {
                error!("Rebuild failed: {}", e);
                hub.fail(vec![e.to_string()]);
            }
        }
    }
}

/// Serve a file from the first static root that has it
async fn serve_static(State(state): State<Arc<ServerState>>, uri: Uri) -> Response {
    let Some(relative) = request_path(uri.path()) else {
        return (StatusCode::BAD_REQUEST, "Invalid path").into_response();
    };

    for root in &state.roots {
        let file_path = root.join(&relative);
        if !file_path.is_file() {
            continue;
        }

        return match tokio::fs::read(&file_path).await {
            Ok(content) => (
                [(header::CONTENT_TYPE, HeaderValue::from_static(get_content_type(&file_path)))],
                content,
            )
                .into_response(),
            Err(e) => {
                error!("Failed to read file {}: {}", file_path.display(), e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file").into_response()
            }
        };
    }

    (StatusCode::NOT_FOUND, format!("File not found: {}", uri.path())).into_response()
}

/// Map a URL path to a relative file path; `None` when it escapes the root
fn request_path(path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') => return None,
            s => relative.push(s),
        }
    }
    if path.ends_with('/') || relative.as_os_str().is_empty() {
        relative.push("index.html");
    }
    Some(relative)
}

/// Get content type for a file
fn get_content_type(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match extension {
        "html" | "htm" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" | "map" => "application/json; charset=utf-8",
        "ejs" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}
