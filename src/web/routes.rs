//! HTTP route handlers for the upload page.

use super::templates::{self, Notice};
use crate::canvas::{Palette, RenderError};
use crate::config::Config;
use crate::image_proc::{self, PrepareError, PreparedBackground};
use crate::scheduler::PanelCommand;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Stem of the persisted upload; the extension follows the upload
pub const UPLOAD_STEM: &str = "bg_uploaded";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub config_path: PathBuf,
    pub commands: mpsc::Sender<PanelCommand>,
    /// Last prepared background as PNG in the panel palette
    pub preview: Arc<RwLock<Option<Vec<u8>>>>,
}

/// Reasons an upload is turned down
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Brak pliku w formularzu")]
    MissingFile,

    #[error("Wgraj obrazek, a nie jakiś szajs ({0} ???)")]
    NotAnImage(String),

    #[error("Błędny formularz: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Tego zdjęcia nie da się użyć: {0}")]
    Prepare(#[from] PrepareError),

    #[error("Panel odrzucił tło: {0}")]
    Rejected(#[from] RenderError),

    #[error("Zapis nie powiódł się: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Panel nie odpowiada")]
    PanelGone,

    #[error("Przygotowanie przerwane: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl UploadError {
    fn status(&self) -> StatusCode {
        match self {
            UploadError::MissingFile | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
            UploadError::NotAnImage(_) | UploadError::Prepare(_) | UploadError::Rejected(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            UploadError::PanelGone => StatusCode::SERVICE_UNAVAILABLE,
            UploadError::Storage(_) | UploadError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// GET / - Upload page
pub async fn index(State(state): State<AppState>) -> Html<String> {
    page(&state, None).await
}

/// POST /background - Prepare an uploaded photo and put it on the panel
pub async fn upload_background(State(state): State<AppState>, multipart: Multipart) -> Response {
    match store_upload(&state, multipart).await {
        Ok(path) => {
            tracing::info!("Background uploaded to {}", path.display());
            page(&state, Some(Notice::Success("Tło ustawione"))).await.into_response()
        }
        Err(e) => {
            tracing::warn!("Upload rejected: {}", e);
            let message = e.to_string();
            (e.status(), page(&state, Some(Notice::Failure(&message))).await).into_response()
        }
    }
}

/// POST /background/clear - Back to the solid fill
pub async fn clear_background(State(state): State<AppState>) -> Response {
    let (reply, done) = oneshot::channel();
    let sent = state
        .commands
        .send(PanelCommand::ClearBackground { reply })
        .await
        .is_ok();
    if !sent || done.await.is_err() {
        let message = UploadError::PanelGone.to_string();
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            page(&state, Some(Notice::Failure(&message))).await,
        )
            .into_response();
    }

    *state.preview.write().await = None;
    update_config(&state, None).await;

    page(&state, Some(Notice::Success("Tło usunięte"))).await.into_response()
}

/// GET /background/preview.png - Prepared background as the panel will show it
pub async fn background_preview(State(state): State<AppState>) -> Response {
    match state.preview.read().await.as_ref() {
        Some(png) => ([(header::CONTENT_TYPE, "image/png")], png.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn page(state: &AppState, notice: Option<Notice<'_>>) -> Html<String> {
    let has_preview = state.preview.read().await.is_some();
    let config = state.config.read().await;
    Html(templates::render_upload_page(&config, notice, has_preview))
}

async fn store_upload(state: &AppState, mut multipart: Multipart) -> Result<PathBuf, UploadError> {
    let (extension, bytes) = read_image_field(&mut multipart).await?;
    tracing::debug!("Received {} byte upload (.{})", bytes.len(), extension);

    let options = state.config.read().await.prepare_options();
    let photo = bytes.clone();
    let (prepared, preview) =
        tokio::task::spawn_blocking(move || prepare_upload(&photo, &options)).await??;

    let (reply, accepted) = oneshot::channel();
    state
        .commands
        .send(PanelCommand::SetBackground {
            background: prepared,
            reply,
        })
        .await
        .map_err(|_| UploadError::PanelGone)?;
    accepted.await.map_err(|_| UploadError::PanelGone)??;

    // Only a background the panel took replaces the stored one
    let upload_dir = state.config.read().await.upload_dir.clone();
    let path = persist_upload(&upload_dir, &extension, &bytes)?;

    *state.preview.write().await = Some(preview);
    update_config(state, Some(path.clone())).await;
    Ok(path)
}

/// Find the `file` field and check it is an image
async fn read_image_field(multipart: &mut Multipart) -> Result<(String, Bytes), UploadError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let mime = field.content_type().unwrap_or("application/octet-stream");
        let (kind, subtype) = mime.split_once('/').unwrap_or((mime, ""));
        if kind != "image" {
            return Err(UploadError::NotAnImage(subtype.to_string()));
        }

        let extension = field
            .file_name()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| is_safe_extension(ext))
            .unwrap_or(subtype)
            .to_ascii_lowercase();
        let extension = if is_safe_extension(&extension) {
            extension
        } else {
            "img".to_string()
        };

        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(UploadError::MissingFile);
        }
        return Ok((extension, bytes));
    }
    Err(UploadError::MissingFile)
}

fn is_safe_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Run the pipeline and render its result as a preview PNG
fn prepare_upload(
    bytes: &[u8],
    options: &image_proc::PrepareOptions,
) -> Result<(PreparedBackground, Vec<u8>), PrepareError> {
    let photo = image_proc::decode_image(bytes)?;
    let prepared = image_proc::prepare_background(&photo, options)?;

    let mut png = Vec::new();
    prepared
        .image
        .to_rgb(&Palette::PANEL)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;

    Ok((prepared, png))
}

/// Keep the original upload as `bg_uploaded.<ext>`, replacing any earlier one
fn persist_upload(dir: &Path, extension: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.file_stem().and_then(|s| s.to_str()) == Some(UPLOAD_STEM) {
            std::fs::remove_file(&path)?;
        }
    }

    let path = dir.join(format!("{UPLOAD_STEM}.{extension}"));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

async fn update_config(state: &AppState, background: Option<PathBuf>) {
    let mut config = state.config.write().await;
    config.background_image = background;

    match config.save(&state.config_path) {
        Ok(()) => tracing::info!("Configuration saved to {}", state.config_path.display()),
        Err(e) => tracing::warn!("Failed to save configuration: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::build_router;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use image::{Rgb, RgbImage};
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const BOUNDARY: &str = "papierek-test-boundary";

    struct TestApp {
        router: axum::Router,
        state: AppState,
        dir: TempDir,
    }

    fn app() -> TestApp {
        app_with_panel(true)
    }

    /// Router plus a stand-in panel owner that accepts every command, or
    /// none at all when `panel_alive` is false
    fn app_with_panel(panel_alive: bool) -> TestApp {
        let dir = tempdir().unwrap();
        let config = Config {
            upload_dir: dir.path().join("uploads"),
            ..Default::default()
        };

        let (commands, mut rx) = mpsc::channel(4);
        if !panel_alive {
            drop(rx);
        } else {
            tokio::spawn(async move {
                while let Some(command) = rx.recv().await {
                    match command {
                        PanelCommand::SetBackground { reply, .. } => {
                            let _ = reply.send(Ok(()));
                        }
                        PanelCommand::ClearBackground { reply } => {
                            let _ = reply.send(());
                        }
                    }
                }
            });
        }

        let state = AppState {
            config: Arc::new(RwLock::new(config)),
            config_path: dir.path().join("config.json"),
            commands,
            preview: Arc::new(RwLock::new(None)),
        };

        TestApp {
            router: build_router(state.clone()),
            state,
            dir,
        }
    }

    fn multipart(filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/background")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn dark_photo_png() -> Vec<u8> {
        let img = RgbImage::from_fn(640, 480, |x, y| {
            let v = 20 + ((x / 8 + y / 8) % 40) as u8;
            Rgb([v, v, v / 2])
        });
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        png
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let response = app
            .router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_sets_background() {
        let app = app();
        let response = app
            .router
            .clone()
            .oneshot(multipart("Wakacje.PNG", "image/png", &dark_photo_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Tło ustawione"));

        let stored = app.dir.path().join("uploads").join("bg_uploaded.png");
        assert!(stored.exists());
        assert_eq!(app.state.config.read().await.background_image, Some(stored.clone()));
        assert_eq!(
            Config::load(&app.state.config_path).unwrap().background_image,
            Some(stored)
        );

        let preview = app
            .router
            .oneshot(
                Request::get("/background/preview.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(preview.status(), StatusCode::OK);
        assert_eq!(preview.headers()[header::CONTENT_TYPE], "image/png");

        let png = preview.into_body().collect().await.unwrap().to_bytes();
        let shown = image::load_from_memory(&png).unwrap().to_rgb8();
        let panel_colours: Vec<[u8; 3]> = (0..3).map(|i| Palette::PANEL.rgb(i)).collect();
        assert!(shown.pixels().all(|p| panel_colours.contains(&p.0)));
    }

    #[tokio::test]
    async fn test_upload_without_panel_keeps_previous_background() {
        let app = app_with_panel(false);
        let uploads = app.dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        let previous = uploads.join("bg_uploaded.jpg");
        std::fs::write(&previous, b"old photo").unwrap();
        app.state.config.write().await.background_image = Some(previous.clone());

        let response = app
            .router
            .oneshot(multipart("nowe.png", "image/png", &dark_photo_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(std::fs::read(&previous).unwrap(), b"old photo");
        assert!(!uploads.join("bg_uploaded.png").exists());
        assert_eq!(app.state.config.read().await.background_image, Some(previous));
        assert!(app.state.preview.read().await.is_none());
    }

    #[tokio::test]
    async fn test_non_image_is_rejected() {
        let app = app();
        let response = app
            .router
            .oneshot(multipart("notes.txt", "text/plain", b"hello"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("plain ???"));
        assert!(!app.dir.path().join("uploads").exists());
        assert_eq!(app.state.config.read().await.background_image, None);
    }

    #[tokio::test]
    async fn test_undecodable_image_is_rejected() {
        let app = app();
        let response = app
            .router
            .oneshot(multipart("broken.jpg", "image/jpeg", b"definitely not a jpeg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(app.state.preview.read().await.is_none());
    }

    #[tokio::test]
    async fn test_clear_background() {
        let app = app();
        app.state.config.write().await.background_image = Some(PathBuf::from("/tmp/old.jpg"));
        *app.state.preview.write().await = Some(vec![1, 2, 3]);

        let response = app
            .router
            .oneshot(Request::post("/background/clear").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.state.config.read().await.background_image, None);
        assert!(app.state.preview.read().await.is_none());
    }

    #[test]
    fn test_persist_replaces_previous_upload() {
        let dir = tempdir().unwrap();
        let first = persist_upload(dir.path(), "jpg", b"one").unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"x").unwrap();
        let second = persist_upload(dir.path(), "png", b"two").unwrap();

        assert!(!first.exists());
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn test_extension_filter() {
        assert!(is_safe_extension("jpeg"));
        assert!(!is_safe_extension("../x"));
        assert!(!is_safe_extension(""));
        assert!(!is_safe_extension("toolong"));
    }
}
