//! The composite pipeline: payload -> style -> modules -> composition.

use thiserror::Error;

use crate::compose::{compose_image, ComposeError, RenderInfo, RenderWarning};
use crate::config::RenderConfig;
use crate::matrix::{render_modules, MatrixError};
use crate::model::QrRecord;
use crate::payload::{encode_payload, EncodeError};
use crate::store::FileStore;
use crate::style::{resolve_style, StyleError, StyleOverrides};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Style(#[from] StyleError),
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// Render one stored QR to PNG bytes.
///
/// The steps are strictly ordered and pure except for the logo read, which
/// degrades to a warning: a missing or unreadable logo never fails a render.
pub fn render(
    qr: &QrRecord,
    overrides: &StyleOverrides,
    template_name: Option<&str>,
    config: &RenderConfig,
) -> Result<(Vec<u8>, RenderInfo), RenderError> {
    let scannable = encode_payload(
        &qr.payload,
        qr.is_dynamic,
        qr.id,
        &config.redirect_base_url,
    )?;
    let spec = resolve_style(&qr.style, overrides, template_name)?;
    let modules = render_modules(&scannable, &spec)?;

    let mut logo_warning = None;
    let logo_bytes = spec.logo.as_ref().and_then(|logo| {
        let files = FileStore::new(&config.upload_root, config.max_logo_bytes);
        match files.open_logo(&logo.path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                logo_warning = Some(RenderWarning::LogoLoad {
                    reason: e.to_string(),
                });
                None
            }
        }
    });

    let (png, mut info) = compose_image(modules, &spec, logo_bytes.as_deref(), config)?;
    if let Some(w) = logo_warning {
        info.warnings.insert(0, w);
    }
    Ok((png, info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Payload;
    use uuid::Uuid;

    #[test]
    fn missing_logo_file_warns_but_renders() {
        let mut qr = QrRecord::new(
            Uuid::new_v4(),
            "logo test",
            Payload::Link {
                url: "https://example.com/".into(),
            },
            false,
        );
        qr.style.logo_path = Some("logos/nope.png".into());

        let dir = tempfile::tempdir().unwrap();
        let config = RenderConfig {
            upload_root: dir.path().to_path_buf(),
            ..RenderConfig::default()
        };
        let (png, info) =
            render(&qr, &StyleOverrides::default(), None, &config).unwrap();
        assert!(!png.is_empty());
        assert!(!info.logo_applied);
        assert!(matches!(
            info.warnings.first(),
            Some(RenderWarning::LogoLoad { .. })
        ));
    }
}
