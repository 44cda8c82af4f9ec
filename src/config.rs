use std::path::PathBuf;

use serde::Deserialize;

/// Caller-supplied configuration for the rendering core.
///
/// The core itself reads no environment; the binary assembles this at startup
/// and hands it down with every render.
#[derive(Clone, Debug, Deserialize)]
pub struct RenderConfig {
    /// Root directory for uploaded files; logo paths are relative to it.
    pub upload_root: PathBuf,
    /// Base URL the dynamic redirect service is reachable under.
    pub redirect_base_url: String,
    /// Preferred TTF for watermarks and frame captions.
    pub default_font_path: Option<PathBuf>,
    /// Upper bound on logo files read from disk.
    pub max_logo_bytes: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from("uploads"),
            redirect_base_url: "http://localhost:8080".to_string(),
            default_font_path: None,
            max_logo_bytes: 5 * 1024 * 1024,
        }
    }
}
