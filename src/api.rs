//! HTTP controllers. These translate request data into core inputs; the
//! rendering logic itself lives below in `render`/`style`/`matrix`/`compose`.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::compose::RenderInfo;
use crate::model::{Payload, QrRecord};
use crate::render::{render, RenderError};
use crate::state::AppState;
use crate::store::StoreError;
use crate::style::{QrStyle, StyleOverrides};
use crate::templates;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("user id required; provide the X-User-Id header")]
    Unauthorized,
    #[error("not allowed on this plan: {0}")]
    Forbidden(&'static str),
    #[error("payload type does not match the stored qr_type")]
    TypeMismatch,
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<crate::style::StyleError> for ApiError {
    fn from(e: crate::style::StyleError) -> Self {
        ApiError::Render(RenderError::Style(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::TypeMismatch => StatusCode::BAD_REQUEST,
            ApiError::Render(RenderError::Compose(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Render(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

fn owner_from(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(ApiError::Unauthorized)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[utoipa::path(get, path = "/health", tag = "qrdada", responses((status = 200, body = HealthResponse)))]
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateQrRequest {
    pub name: String,
    pub payload: Payload,
    #[serde(default)]
    pub is_dynamic: bool,
    #[serde(default)]
    pub style: QrStyle,
    pub template: Option<String>,
}

#[utoipa::path(
    post,
    path = "/qr",
    tag = "qrdada",
    request_body = CreateQrRequest,
    responses(
        (status = 201, description = "Created", body = QrRecord),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Plan limit")
    )
)]
pub async fn create_qr(
    State(st): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateQrRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_from(&headers)?;
    if !st.gate.may_create_qr(owner) {
        return Err(ApiError::Forbidden("qr quota reached"));
    }
    if req.is_dynamic && !st.gate.may_create_dynamic(owner) {
        return Err(ApiError::Forbidden("dynamic qrs"));
    }
    if let Some(name) = req.template.as_deref() {
        if templates::lookup(name).is_none() {
            return Err(crate::style::StyleError::UnknownTemplate(name.to_string()).into());
        }
        if !st.gate.may_use_template(owner, name) {
            return Err(ApiError::Forbidden("template"));
        }
    }

    let mut qr = QrRecord::new(owner, req.name, req.payload, req.is_dynamic);
    qr.style = req.style;
    qr.style.template = req.template;
    st.store.save_qr(qr.clone())?;
    info!(qr = %qr.id, qr_type = ?qr.qr_type, "created qr");
    Ok((StatusCode::CREATED, Json(qr)))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EditQrRequest {
    pub name: Option<String>,
    /// Full replacement payload; its type must match the stored one.
    pub payload: Option<Payload>,
    pub style: Option<QrStyle>,
    pub template: Option<String>,
}

#[utoipa::path(
    put,
    path = "/qr/{id}",
    tag = "qrdada",
    request_body = EditQrRequest,
    responses(
        (status = 200, body = QrRecord),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Not found")
    )
)]
pub async fn edit_qr(
    State(st): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<EditQrRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_from(&headers)?;
    let mut qr = st.store.load_qr(id)?;
    if qr.owner != owner {
        return Err(StoreError::NotFound(id).into());
    }
    if let Some(payload) = req.payload {
        if payload.qr_type() != qr.qr_type {
            return Err(ApiError::TypeMismatch);
        }
        qr.payload = payload;
    }
    if let Some(name) = req.name {
        qr.name = name;
    }
    if let Some(style) = req.style {
        qr.style = style;
    }
    if let Some(template) = req.template {
        if templates::lookup(&template).is_none() {
            return Err(crate::style::StyleError::UnknownTemplate(template).into());
        }
        qr.style.template = Some(template);
    }
    qr.updated_at = Utc::now();
    st.store.save_qr(qr.clone())?;
    Ok(Json(qr))
}

#[utoipa::path(
    delete,
    path = "/qr/{id}",
    tag = "qrdada",
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not found"))
)]
pub async fn delete_qr(
    State(st): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_from(&headers)?;
    let qr = st.store.load_qr(id)?;
    if qr.owner != owner {
        return Err(StoreError::NotFound(id).into());
    }
    let removed = st.store.delete_qr(id)?;
    // The record owns its logo file; deletion cascades to disk.
    if let Some(path) = removed.style.logo_path.as_deref() {
        st.files.delete_logo(path)?;
    }
    info!(qr = %id, "deleted qr");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/qr/{id}/image",
    tag = "qrdada",
    responses(
        (status = 200, description = "Rendered PNG", content_type = "image/png"),
        (status = 404, description = "Not found")
    )
)]
pub async fn qr_image(
    State(st): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let qr = st.store.load_qr(id)?;
    let template = qr.style.template.clone();
    let (png, _info) = render(
        &qr,
        &StyleOverrides::default(),
        template.as_deref(),
        &st.config,
    )?;
    Ok(png_response(png))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RenderRequest {
    #[serde(default)]
    pub overrides: StyleOverrides,
    pub template: Option<String>,
}

#[utoipa::path(
    post,
    path = "/qr/{id}/render",
    tag = "qrdada",
    request_body = RenderRequest,
    responses(
        (status = 200, description = "Rendered PNG", content_type = "image/png"),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Not found")
    )
)]
pub async fn render_qr(
    State(st): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let qr = st.store.load_qr(id)?;
    let template = req.template.or_else(|| qr.style.template.clone());
    if let Some(name) = template.as_deref() {
        if templates::lookup(name).is_some() && !st.gate.may_use_template(qr.owner, name) {
            return Err(ApiError::Forbidden("template"));
        }
    }
    let (png, _info) = render(&qr, &req.overrides, template.as_deref(), &st.config)?;
    Ok(png_response(png))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewRequest {
    pub payload: Payload,
    #[serde(default)]
    pub is_dynamic: bool,
    #[serde(default)]
    pub overrides: StyleOverrides,
    pub template: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviewResponse {
    /// `data:image/png;base64,` URI, ready for an img tag.
    pub image: String,
    pub info: RenderInfo,
}

#[utoipa::path(
    post,
    path = "/preview",
    tag = "qrdada",
    request_body = PreviewRequest,
    responses((status = 200, body = PreviewResponse), (status = 400, description = "Bad request"))
)]
pub async fn preview(
    State(st): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let qr = QrRecord::new(Uuid::nil(), "preview", req.payload, req.is_dynamic);
    let (png, info) = render(&qr, &req.overrides, req.template.as_deref(), &st.config)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(&png);
    Ok(Json(PreviewResponse {
        image: format!("data:image/png;base64,{b64}"),
        info,
    }))
}

fn png_response(png: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], png).into_response()
}
