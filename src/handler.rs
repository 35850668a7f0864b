use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::StreamBody,
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use reqwest::Client;

use crate::config::Config;
use crate::drive::DriveClient;
use crate::error::{AppError, Result};
use crate::pagination::{self, CursorCache};
use crate::render::{folder_href, render_listing, ListingView};
use crate::route::{self, Route};
use crate::token::{TokenCache, TokenProvider};

/// Upstream headers that describe the upstream connection, not the payload.
const HOP_BY_HOP: [header::HeaderName; 5] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::STRICT_TRANSPORT_SECURITY,
    header::CONTENT_SECURITY_POLICY,
    header::SET_COOKIE,
];

pub struct AppState {
    pub env: HashMap<String, String>,
    pub http: Client,
    pub tokens: Arc<TokenCache>,
    pub cursors: CursorCache,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().fallback(serve).with_state(state)
}

pub async fn serve(State(state): State<Arc<AppState>>, headers: HeaderMap, uri: Uri) -> Response {
    match handle(&state, &headers, &uri).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

#[tracing::instrument(skip_all, fields(path = %uri.path()))]
async fn handle(state: &AppState, headers: &HeaderMap, uri: &Uri) -> Result<Response> {
    let config = Config::resolve(&state.env)?;

    let raw = uri.path().strip_prefix('/').unwrap_or(uri.path());
    let path = percent_decode_str(raw)
        .decode_utf8()
        .map_err(AppError::InvalidPath)?;

    let route = route::parse(&path, &config.folders);
    tracing::debug!(?route, "routed");

    let tokens = TokenProvider::new(
        state.http.clone(),
        state.tokens.clone(),
        config.credentials.clone(),
        config.endpoints.token.clone(),
    );
    let drive = DriveClient::new(state.http.clone(), config.endpoints.clone(), tokens);

    match route {
        Route::Redirect { alias } => Ok(found(&folder_href(&alias))),
        Route::File { alias, filename } => serve_file(&drive, &config, headers, &alias, &filename).await,
        Route::Listing { alias, page } => serve_listing(state, &drive, &config, &alias, page).await,
    }
}

async fn serve_file(
    drive: &DriveClient,
    config: &Config,
    headers: &HeaderMap,
    alias: &str,
    filename: &str,
) -> Result<Response> {
    let Some(folder_id) = config.folders.get(alias) else {
        return Ok(found(&folder_href(config.folders.default_alias())));
    };
    let Some(file) = drive.find_file(filename, folder_id).await? else {
        tracing::info!(alias, filename, "file not found");
        return Ok(found(&folder_href(alias)));
    };
    if file.is_folder() {
        return Ok(found(&folder_href(alias)));
    }

    let target = drive.resolve_download_target(&file.id).await?;
    let upstream = drive.download(&target, headers.get(header::RANGE)).await?;

    let status = upstream.status();
    let mut out_headers = upstream.headers().clone();
    for name in HOP_BY_HOP {
        out_headers.remove(name);
    }
    Ok((status, out_headers, StreamBody::new(upstream.bytes_stream())).into_response())
}

async fn serve_listing(
    state: &AppState,
    drive: &DriveClient,
    config: &Config,
    alias: &str,
    page: u32,
) -> Result<Response> {
    let Some(folder_id) = config.folders.get(alias) else {
        return Ok(found(&folder_href(config.folders.default_alias())));
    };
    let replayed = pagination::replay(drive, &state.cursors, folder_id, page).await?;
    let has_next = replayed.list.next_cursor.is_some();
    let view = ListingView::build(&replayed.list.files, &config.folders, alias, replayed.page, has_next);
    Ok(Html(render_listing(&view)).into_response())
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
