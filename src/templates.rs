//! Fixed styling presets. These are data, not logic: the values mirror the
//! preset table the create form has always offered.

use crate::style::{EyeStyle, ExportType, FrameType, ModuleShape, QrStyle};

pub const NAMES: [&str; 5] = ["modern", "corporate", "playful", "minimal", "high_contrast"];

/// Look up a preset by name. Only `corporate` carries a frame; applying any
/// of the others clears a previously selected frame (handled by the
/// resolver).
pub fn lookup(name: &str) -> Option<QrStyle> {
    let style = match name {
        "modern" => QrStyle {
            shape: Some(ModuleShape::Rounded),
            foreground_color: Some("#2c5282".into()),
            background_color: Some("#FFFFFF".into()),
            export_type: Some(ExportType::Png),
            custom_eyes: Some(true),
            inner_eye_style: Some(EyeStyle::Circle),
            outer_eye_style: Some(EyeStyle::Rounded),
            inner_eye_color: Some("#2c5282".into()),
            outer_eye_color: Some("#2c5282".into()),
            ..QrStyle::default()
        },
        "corporate" => QrStyle {
            shape: Some(ModuleShape::Square),
            foreground_color: Some("#1a365d".into()),
            background_color: Some("#FFFFFF".into()),
            export_type: Some(ExportType::Png),
            frame_type: Some(FrameType::Square),
            frame_color: Some("#000000".into()),
            frame_text: Some("SCAN ME".into()),
            custom_eyes: Some(false),
            ..QrStyle::default()
        },
        "playful" => QrStyle {
            shape: Some(ModuleShape::Circle),
            export_type: Some(ExportType::Gradient),
            gradient_start: Some("#3182ce".into()),
            gradient_end: Some("#90cdf4".into()),
            background_color: Some("#FFFFFF".into()),
            custom_eyes: Some(true),
            inner_eye_style: Some(EyeStyle::Circle),
            outer_eye_style: Some(EyeStyle::Circle),
            inner_eye_color: Some("#3182ce".into()),
            outer_eye_color: Some("#3182ce".into()),
            ..QrStyle::default()
        },
        "minimal" => QrStyle {
            shape: Some(ModuleShape::Square),
            foreground_color: Some("#2d3748".into()),
            background_color: Some("#FFFFFF".into()),
            export_type: Some(ExportType::Png),
            custom_eyes: Some(false),
            ..QrStyle::default()
        },
        "high_contrast" => QrStyle {
            shape: Some(ModuleShape::Square),
            foreground_color: Some("#000000".into()),
            background_color: Some("#FFFFFF".into()),
            export_type: Some(ExportType::Png),
            module_size: Some(12),
            quiet_zone: Some(4),
            custom_eyes: Some(false),
            ..QrStyle::default()
        },
        _ => return None,
    };
    Some(style)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_listed_names_resolve() {
        for name in NAMES {
            assert!(lookup(name).is_some(), "missing template {name}");
        }
        assert!(lookup("neon").is_none());
    }

    #[test]
    fn only_corporate_sets_a_frame() {
        for name in NAMES {
            let tpl = lookup(name).unwrap();
            assert_eq!(tpl.frame_type.is_some(), name == "corporate");
        }
    }
}
