use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health,
        api::create_qr,
        api::edit_qr,
        api::delete_qr,
        api::qr_image,
        api::render_qr,
        api::preview,
    ),
    tags((name = "qrdada", description = "QR creation and rendering"))
)]
pub struct ApiDoc;
