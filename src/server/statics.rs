/// Static script serving for the embedded chart assets

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use rust_embed::RustEmbed;
use tracing::debug;

use crate::utils::{ECHARTS_ASSET, ECHARTS_CDN, STATIC_ASSETS};

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Assets;

/// One fixed route per known asset under `statics_path`
pub fn routes(statics_path: &str) -> Router {
    STATIC_ASSETS.iter().fold(Router::new(), |router, &asset| {
        router.route(
            &asset_path(statics_path, asset),
            get(move || async move { asset_response(asset) }),
        )
    })
}

pub fn asset_path(statics_path: &str, asset: &str) -> String {
    format!("{}/{}", statics_path, asset)
}

/// Serve an embedded asset; the charting library falls back to its CDN
pub fn asset_response(path: &str) -> Response {
    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                content.data,
            )
                .into_response()
        }
        None if path == ECHARTS_ASSET => {
            let url = format!("{}{}", ECHARTS_CDN, path);
            debug!(asset = %path, url = %url, "asset not embedded, redirecting");
            Redirect::temporary(&url).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            format!("{} is not bundled - place it under assets/ and rebuild", path),
        )
            .into_response(),
    }
}
