//! Development server with live reload (CLI task `server`).
//!
//! Serves the output tree over HTTP:
//!
//! - static files through `tower_http::services::ServeDir`, `index.html`
//!   for directories;
//! - HTML responses get a small client injected before `</body>` that
//!   listens on [`LIVERELOAD_PATH`];
//! - `GET /__livereload` is a server-sent-events stream that emits a
//!   `reload` event whenever the output tree changes (debounced), including
//!   after the tree was removed and rebuilt;
//! - unknown paths get a 404 page listing the pages that do exist.
//!
//! The server only watches the output. Rebuilding is the job of
//! [`watch`](crate::watch).

use crate::context::BuildContext;
use crate::watch::FsWatcher;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::handler::Handler;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{StatusCode, Uri};
use axum::middleware;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use futures_util::Stream;
use maud::{DOCTYPE, Markup, html};
use notify::RecursiveMode;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub const LIVERELOAD_PATH: &str = "/__livereload";

const RELOAD_CLIENT: &str = concat!(
    "<script>(function(){",
    "var s=new EventSource(\"/__livereload\");",
    "s.addEventListener(\"reload\",function(){location.reload();});",
    "})();</script>"
);

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),
}

#[derive(Clone)]
struct ServerState {
    output: PathBuf,
    reload: broadcast::Sender<()>,
}

/// Router serving `output`; every message on `reload` is pushed to the
/// connected live-reload clients.
pub fn router(output: &Path, reload: broadcast::Sender<()>) -> Router {
    let state = ServerState {
        output: output.to_path_buf(),
        reload,
    };
    let static_files =
        ServeDir::new(output).not_found_service(not_found.with_state(state.clone()));

    Router::new()
        .route(LIVERELOAD_PATH, get(livereload))
        .fallback_service(static_files)
        .layer(middleware::map_response(inject_reload_client))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the output tree until the process is stopped.
pub async fn serve(ctx: &BuildContext) -> Result<(), ServerError> {
    let output = ctx.layout.output_dir().to_path_buf();
    std::fs::create_dir_all(&output)?;

    let (reload, _) = broadcast::channel(16);
    let debounce = Duration::from_millis(ctx.config.watch.debounce_ms);
    spawn_reload_watcher(&output, debounce, reload.clone())?;

    let addr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!(
        "serving {} at http://{addr}",
        ctx.layout.display(&output)
    );
    axum::serve(listener, router(&output, reload)).await?;
    Ok(())
}

/// Broadcast on `reload` whenever something under `output` changes, at most
/// once per `debounce` window.
///
/// The parent of `output` is watched too, so a `clean` or `build` that
/// removes and recreates the output directory is seen and the recursive
/// watch on it is re-armed.
pub fn spawn_reload_watcher(
    output: &Path,
    debounce: Duration,
    reload: broadcast::Sender<()>,
) -> Result<JoinHandle<()>, ServerError> {
    let output = output.canonicalize()?;
    let mut watcher = FsWatcher::unwatched()?;
    if let Some(parent) = output.parent() {
        watcher.watch(parent, RecursiveMode::NonRecursive)?;
    }
    watcher.watch(&output, RecursiveMode::Recursive)?;

    Ok(tokio::spawn(async move {
        while let Some(first) = watcher.next_path().await {
            tokio::time::sleep(debounce).await;
            let mut paths = watcher.drain();
            paths.push(first);
            if !paths.iter().any(|p| p.starts_with(&output)) {
                continue;
            }
            if paths.iter().any(|p| *p == output)
                && output.is_dir()
                && let Err(e) = watcher.watch(&output, RecursiveMode::Recursive)
            {
                tracing::warn!("could not re-watch {}: {e}", output.display());
            }
            tracing::debug!("output changed, reloading clients");
            // No receivers just means no browser is connected.
            let _ = reload.send(());
        }
    }))
}

async fn livereload(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.reload.subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(()) => return Some((Ok(Event::default().event("reload").data("reload")), rx)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn not_found(State(state): State<ServerState>, uri: Uri) -> impl IntoResponse {
    let pages = list_pages(&state.output).unwrap_or_default();
    (
        StatusCode::NOT_FOUND,
        Html(render_not_found(uri.path(), &pages).into_string()),
    )
}

/// Top-level `*.html` files in the output tree, sorted.
pub fn list_pages(output: &Path) -> std::io::Result<Vec<String>> {
    let mut pages: Vec<String> = crate::files::top_level_files(output, &["html"])?
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    pages.sort();
    Ok(pages)
}

pub fn render_not_found(path: &str, pages: &[String]) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { "Not found" }
            }
            body {
                h1 { "Not found: " code { (path) } }
                @if pages.is_empty() {
                    p { "No pages have been built yet." }
                } @else {
                    p { "Pages:" }
                    ul {
                        @for page in pages {
                            li { a href={ "/" (page) } { (page) } }
                        }
                    }
                }
            }
        }
    }
}

/// Insert the live-reload client before the last `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    match html.rfind("</body>") {
        Some(idx) => format!("{}{}{}", &html[..idx], RELOAD_CLIENT, &html[idx..]),
        None => format!("{html}{RELOAD_CLIENT}"),
    }
}

async fn inject_reload_client(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    let status = response.status();
    if !is_html || !(status == StatusCode::OK || status == StatusCode::NOT_FOUND) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("reading response body failed: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let html = inject_client(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}
