//! Style resolver: stored styling + template + overrides -> a fully
//! specified `RenderSpec`. Pure, no I/O.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::templates;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StyleError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("invalid color: {0}")]
    InvalidColor(String),
}

/// An opaque sRGB color, parsed from `#RRGGBB`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0]);
    pub const WHITE: Color = Color([255, 255, 255]);

    pub fn parse(s: &str) -> Result<Self, StyleError> {
        let t = s.trim();
        let hexpart = t.strip_prefix('#').unwrap_or(t);
        if t.len() != 7 || hexpart.len() != 6 {
            return Err(StyleError::InvalidColor(s.to_string()));
        }
        let bytes =
            hex::decode(hexpart).map_err(|_| StyleError::InvalidColor(s.to_string()))?;
        Ok(Color([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }

    /// Relative luminance, for picking contrasting caption ink.
    pub fn luminance(self) -> f32 {
        let [r, g, b] = self.0;
        0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32
    }
}

impl std::fmt::Debug for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Color({})", self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModuleShape {
    Square,
    Rounded,
    Circle,
    VerticalBars,
    HorizontalBars,
    GappedSquare,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EyeStyle {
    Square,
    Rounded,
    Circle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    None,
    Square,
    Rounded,
    Circle,
    ScanMe,
}

/// A frame kind that is actually drawn; `FrameType::None` has no counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Square,
    Rounded,
    Circle,
    ScanMe,
}

impl FrameType {
    pub fn to_kind(self) -> Option<FrameKind> {
        match self {
            FrameType::None => None,
            FrameType::Square => Some(FrameKind::Square),
            FrameType::Rounded => Some(FrameKind::Rounded),
            FrameType::Circle => Some(FrameKind::Circle),
            FrameType::ScanMe => Some(FrameKind::ScanMe),
        }
    }
}

impl From<FrameKind> for FrameType {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Square => FrameType::Square,
            FrameKind::Rounded => FrameType::Rounded,
            FrameKind::Circle => FrameType::Circle,
            FrameKind::ScanMe => FrameType::ScanMe,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ErrorCorrection {
    L,
    M,
    Q,
    H,
}

impl From<ErrorCorrection> for qrcode::EcLevel {
    fn from(ec: ErrorCorrection) -> Self {
        match ec {
            ErrorCorrection::L => qrcode::EcLevel::L,
            ErrorCorrection::M => qrcode::EcLevel::M,
            ErrorCorrection::Q => qrcode::EcLevel::Q,
            ErrorCorrection::H => qrcode::EcLevel::H,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GradientType {
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum GradientDirection {
    #[serde(rename = "to-right")]
    ToRight,
    #[serde(rename = "to-bottom")]
    ToBottom,
    #[serde(rename = "diagonal")]
    Diagonal,
}

/// Accepted for compatibility; everything encodes as PNG.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExportType {
    Png,
    Gradient,
    Svg,
    Gif,
}

/// The stored (or override) styling block. Every field optional; absent
/// fields fall through to earlier resolution steps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct QrStyle {
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
    pub shape: Option<ModuleShape>,
    pub module_size: Option<u32>,
    pub quiet_zone: Option<u32>,
    pub error_correction: Option<ErrorCorrection>,
    pub gradient: Option<bool>,
    pub gradient_start: Option<String>,
    pub gradient_end: Option<String>,
    pub gradient_type: Option<GradientType>,
    pub gradient_direction: Option<GradientDirection>,
    pub custom_eyes: Option<bool>,
    pub inner_eye_style: Option<EyeStyle>,
    pub outer_eye_style: Option<EyeStyle>,
    pub inner_eye_color: Option<String>,
    pub outer_eye_color: Option<String>,
    pub frame_type: Option<FrameType>,
    pub frame_color: Option<String>,
    pub frame_text: Option<String>,
    pub logo_path: Option<String>,
    pub logo_size_percentage: Option<u32>,
    pub round_logo: Option<bool>,
    pub template: Option<String>,
    pub watermark_text: Option<String>,
    pub export_type: Option<ExportType>,
}

/// Request-time overrides, translated from form data by the caller.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct StyleOverrides {
    #[serde(flatten)]
    pub style: QrStyle,
    /// Form-level gradient toggle; one of the three gradient signals.
    pub using_gradient: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GradientSpec {
    pub start: Color,
    pub end: Color,
    pub kind: GradientType,
    pub direction: GradientDirection,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EyeSpec {
    pub inner_style: EyeStyle,
    pub outer_style: EyeStyle,
    pub inner_color: Color,
    pub outer_color: Color,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameSpec {
    pub kind: FrameKind,
    pub color: Color,
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogoSpec {
    pub path: String,
    pub size_percentage: u32,
    pub round: bool,
}

/// Fully resolved styling. Coupling invariants are carried by the type:
/// gradient colors exist iff gradient is on, eye fields exist iff custom
/// eyes are on, frame color/text exist iff a frame is drawn.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderSpec {
    pub foreground: Color,
    pub background: Color,
    pub shape: ModuleShape,
    pub module_size: u32,
    pub quiet_zone: u32,
    pub error_correction: ErrorCorrection,
    pub gradient: Option<GradientSpec>,
    pub eyes: Option<EyeSpec>,
    pub frame: Option<FrameSpec>,
    pub logo: Option<LogoSpec>,
    pub watermark_text: Option<String>,
    pub export_type: ExportType,
}

const DEFAULT_GRADIENT_START: &str = "#f97316";
const DEFAULT_GRADIENT_END: &str = "#fbbf24";

macro_rules! merge_fields {
    ($dst:expr, $src:expr, [$($f:ident),* $(,)?]) => {
        $(if $src.$f.is_some() { $dst.$f = $src.$f.clone(); })*
    };
}

fn merge_into(dst: &mut QrStyle, src: &QrStyle) {
    merge_fields!(
        dst,
        src,
        [
            foreground_color,
            background_color,
            shape,
            module_size,
            quiet_zone,
            error_correction,
            gradient,
            gradient_start,
            gradient_end,
            gradient_type,
            gradient_direction,
            custom_eyes,
            inner_eye_style,
            outer_eye_style,
            inner_eye_color,
            outer_eye_color,
            frame_type,
            frame_color,
            frame_text,
            logo_path,
            logo_size_percentage,
            round_logo,
            watermark_text,
            export_type,
        ]
    );
}

/// Documented defaults, step 1 of resolution.
fn defaults() -> QrStyle {
    QrStyle {
        foreground_color: Some("#000000".into()),
        background_color: Some("#FFFFFF".into()),
        shape: Some(ModuleShape::Square),
        module_size: Some(10),
        quiet_zone: Some(4),
        error_correction: Some(ErrorCorrection::H),
        gradient: Some(false),
        custom_eyes: Some(false),
        frame_type: Some(FrameType::None),
        logo_size_percentage: Some(25),
        round_logo: Some(false),
        export_type: Some(ExportType::Png),
        ..QrStyle::default()
    }
}

/// Resolve the effective style for one render.
///
/// Later steps override earlier ones: defaults, stored record, template,
/// caller overrides, then the normalization pass. A recognized template
/// dictates the whole frame block -- a template without a frame clears any
/// frame picked up earlier.
pub fn resolve_style(
    stored: &QrStyle,
    overrides: &StyleOverrides,
    template_name: Option<&str>,
) -> Result<RenderSpec, StyleError> {
    let mut merged = defaults();
    merge_into(&mut merged, stored);

    if let Some(name) = template_name {
        let tpl = templates::lookup(name)
            .ok_or_else(|| StyleError::UnknownTemplate(name.to_string()))?;
        let sets_frame = tpl.frame_type.is_some();
        merge_into(&mut merged, &tpl);
        if !sets_frame {
            merged.frame_type = Some(FrameType::None);
            merged.frame_color = None;
            merged.frame_text = None;
        }
    }

    merge_into(&mut merged, &overrides.style);
    normalize(merged, overrides.using_gradient)
}

fn normalize(merged: QrStyle, using_gradient: Option<bool>) -> Result<RenderSpec, StyleError> {
    // a. canonicalize colors; blank-ish values fall back to slot defaults
    let foreground = color_or(&merged.foreground_color, Color::BLACK)?;
    let background = color_or(&merged.background_color, Color::WHITE)?;

    // b. three gradient signals, one switch
    let gradient_on = merged.gradient == Some(true)
        || merged.export_type == Some(ExportType::Gradient)
        || using_gradient == Some(true);
    let gradient = if gradient_on {
        Some(GradientSpec {
            start: color_or(&merged.gradient_start, Color::parse(DEFAULT_GRADIENT_START)?)?,
            end: color_or(&merged.gradient_end, Color::parse(DEFAULT_GRADIENT_END)?)?,
            kind: merged.gradient_type.unwrap_or(GradientType::Linear),
            direction: merged
                .gradient_direction
                .unwrap_or(GradientDirection::ToRight),
        })
    } else {
        None
    };

    // c + d. gradient forces custom eyes; fill eye defaults
    let custom_eyes = gradient.is_some() || merged.custom_eyes == Some(true);
    let eyes = if custom_eyes {
        let (inner_default, outer_default) = match &gradient {
            Some(g) => (g.start, g.end),
            None => (foreground, foreground),
        };
        Some(EyeSpec {
            inner_style: merged.inner_eye_style.unwrap_or(EyeStyle::Square),
            outer_style: merged.outer_eye_style.unwrap_or(EyeStyle::Rounded),
            inner_color: opt_color(&merged.inner_eye_color)?.unwrap_or(inner_default),
            outer_color: opt_color(&merged.outer_eye_color)?.unwrap_or(outer_default),
        })
    } else {
        None
    };

    // e. frame block, or nothing at all
    let frame = match merged.frame_type.unwrap_or(FrameType::None).to_kind() {
        None => None,
        Some(kind) => {
            let color = opt_color(&merged.frame_color)?.unwrap_or(foreground);
            let mut text = merged
                .frame_text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string);
            if kind == FrameKind::ScanMe && text.is_none() {
                text = Some("SCAN ME".to_string());
            }
            Some(FrameSpec { kind, color, text })
        }
    };

    let logo = merged
        .logo_path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(|path| LogoSpec {
            path: path.to_string(),
            size_percentage: merged.logo_size_percentage.unwrap_or(25).clamp(10, 40),
            round: merged.round_logo.unwrap_or(false),
        });

    // f. numeric clamps
    Ok(RenderSpec {
        foreground,
        background,
        shape: merged.shape.unwrap_or(ModuleShape::Square),
        module_size: merged.module_size.unwrap_or(10).clamp(1, 40),
        quiet_zone: merged.quiet_zone.unwrap_or(4).min(16),
        error_correction: merged.error_correction.unwrap_or(ErrorCorrection::H),
        gradient,
        eyes,
        frame,
        logo,
        watermark_text: merged
            .watermark_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string),
        export_type: merged.export_type.unwrap_or(ExportType::Png),
    })
}

impl RenderSpec {
    /// Project the resolved spec back into stored-record shape. Resolving
    /// that projection with no overrides yields the same spec again.
    pub fn to_style(&self) -> QrStyle {
        QrStyle {
            foreground_color: Some(self.foreground.to_hex()),
            background_color: Some(self.background.to_hex()),
            shape: Some(self.shape),
            module_size: Some(self.module_size),
            quiet_zone: Some(self.quiet_zone),
            error_correction: Some(self.error_correction),
            gradient: Some(self.gradient.is_some()),
            gradient_start: self.gradient.map(|g| g.start.to_hex()),
            gradient_end: self.gradient.map(|g| g.end.to_hex()),
            gradient_type: self.gradient.map(|g| g.kind),
            gradient_direction: self.gradient.map(|g| g.direction),
            custom_eyes: Some(self.eyes.is_some()),
            inner_eye_style: self.eyes.map(|e| e.inner_style),
            outer_eye_style: self.eyes.map(|e| e.outer_style),
            inner_eye_color: self.eyes.map(|e| e.inner_color.to_hex()),
            outer_eye_color: self.eyes.map(|e| e.outer_color.to_hex()),
            frame_type: Some(
                self.frame
                    .as_ref()
                    .map(|f| f.kind.into())
                    .unwrap_or(FrameType::None),
            ),
            frame_color: self.frame.as_ref().map(|f| f.color.to_hex()),
            frame_text: self.frame.as_ref().and_then(|f| f.text.clone()),
            logo_path: self.logo.as_ref().map(|l| l.path.clone()),
            logo_size_percentage: self.logo.as_ref().map(|l| l.size_percentage),
            round_logo: self.logo.as_ref().map(|l| l.round),
            template: None,
            watermark_text: self.watermark_text.clone(),
            export_type: Some(self.export_type),
        }
    }
}

/// `''`, `undefined` and `null` are what browser form layers send for "no
/// choice"; they canonicalize to the slot default rather than erroring.
fn is_blankish(s: &str) -> bool {
    let t = s.trim();
    t.is_empty() || t.eq_ignore_ascii_case("undefined") || t.eq_ignore_ascii_case("null")
}

fn color_or(value: &Option<String>, default: Color) -> Result<Color, StyleError> {
    Ok(opt_color(value)?.unwrap_or(default))
}

fn opt_color(value: &Option<String>) -> Result<Option<Color>, StyleError> {
    match value.as_deref() {
        None => Ok(None),
        Some(s) if is_blankish(s) => Ok(None),
        Some(s) => Color::parse(s).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(stored: &QrStyle) -> RenderSpec {
        resolve_style(stored, &StyleOverrides::default(), None).unwrap()
    }

    #[test]
    fn defaults_fill_every_slot() {
        let spec = resolve(&QrStyle::default());
        assert_eq!(spec.foreground, Color::BLACK);
        assert_eq!(spec.background, Color::WHITE);
        assert_eq!(spec.shape, ModuleShape::Square);
        assert_eq!(spec.module_size, 10);
        assert_eq!(spec.quiet_zone, 4);
        assert_eq!(spec.error_correction, ErrorCorrection::H);
        assert!(spec.gradient.is_none());
        assert!(spec.eyes.is_none());
        assert!(spec.frame.is_none());
    }

    #[test]
    fn blankish_colors_fall_back() {
        let stored = QrStyle {
            foreground_color: Some("undefined".into()),
            background_color: Some("".into()),
            ..QrStyle::default()
        };
        let spec = resolve(&stored);
        assert_eq!(spec.foreground, Color::BLACK);
        assert_eq!(spec.background, Color::WHITE);
    }

    #[test]
    fn malformed_color_is_rejected() {
        let stored = QrStyle {
            foreground_color: Some("#12345".into()),
            ..QrStyle::default()
        };
        let err = resolve_style(&stored, &StyleOverrides::default(), None).unwrap_err();
        assert_eq!(err, StyleError::InvalidColor("#12345".into()));
    }

    #[test]
    fn gradient_forces_custom_eyes_and_inherits_colors() {
        let overrides = StyleOverrides {
            style: QrStyle {
                gradient: Some(true),
                gradient_start: Some("#ff0000".into()),
                gradient_end: Some("#0000ff".into()),
                ..QrStyle::default()
            },
            ..StyleOverrides::default()
        };
        let spec = resolve_style(&QrStyle::default(), &overrides, None).unwrap();
        let eyes = spec.eyes.expect("custom eyes forced on");
        assert_eq!(eyes.inner_color, Color([255, 0, 0]));
        assert_eq!(eyes.outer_color, Color([0, 0, 255]));
        assert_eq!(eyes.inner_style, EyeStyle::Square);
        assert_eq!(eyes.outer_style, EyeStyle::Rounded);
    }

    #[test]
    fn gradient_signals_are_equivalent() {
        let via_flag = StyleOverrides {
            using_gradient: Some(true),
            ..StyleOverrides::default()
        };
        let via_export = StyleOverrides {
            style: QrStyle {
                export_type: Some(ExportType::Gradient),
                ..QrStyle::default()
            },
            ..StyleOverrides::default()
        };
        for overrides in [via_flag, via_export] {
            let spec = resolve_style(&QrStyle::default(), &overrides, None).unwrap();
            let g = spec.gradient.expect("gradient on");
            assert_eq!(g.start, Color::parse("#f97316").unwrap());
            assert_eq!(g.end, Color::parse("#fbbf24").unwrap());
            assert_eq!(g.direction, GradientDirection::ToRight);
        }
    }

    #[test]
    fn frameless_templates_clear_a_stored_frame() {
        let stored = QrStyle {
            frame_type: Some(FrameType::Rounded),
            frame_color: Some("#ff0000".into()),
            frame_text: Some("hello".into()),
            ..QrStyle::default()
        };
        for name in ["modern", "playful", "minimal", "high_contrast"] {
            let spec = resolve_style(&stored, &StyleOverrides::default(), Some(name)).unwrap();
            assert!(spec.frame.is_none(), "template {name} should clear frame");
        }
    }

    #[test]
    fn corporate_template_sets_scan_me_frame() {
        let spec =
            resolve_style(&QrStyle::default(), &StyleOverrides::default(), Some("corporate"))
                .unwrap();
        let frame = spec.frame.expect("corporate has a frame");
        assert_eq!(frame.kind, FrameKind::Square);
        assert_eq!(frame.text.as_deref(), Some("SCAN ME"));
        assert_eq!(frame.color, Color::BLACK);
    }

    #[test]
    fn unknown_template_is_an_error() {
        let err =
            resolve_style(&QrStyle::default(), &StyleOverrides::default(), Some("neon"))
                .unwrap_err();
        assert_eq!(err, StyleError::UnknownTemplate("neon".into()));
    }

    #[test]
    fn numeric_fields_are_clamped() {
        let stored = QrStyle {
            module_size: Some(500),
            quiet_zone: Some(99),
            logo_size_percentage: Some(95),
            logo_path: Some("logos/a.png".into()),
            ..QrStyle::default()
        };
        let spec = resolve(&stored);
        assert_eq!(spec.module_size, 40);
        assert_eq!(spec.quiet_zone, 16);
        assert_eq!(spec.logo.unwrap().size_percentage, 40);

        let stored = QrStyle {
            module_size: Some(0),
            logo_size_percentage: Some(1),
            logo_path: Some("logos/a.png".into()),
            ..QrStyle::default()
        };
        let spec = resolve(&stored);
        assert_eq!(spec.module_size, 1);
        assert_eq!(spec.logo.unwrap().size_percentage, 10);
    }

    #[test]
    fn scan_me_frame_defaults_its_caption() {
        let stored = QrStyle {
            frame_type: Some(FrameType::ScanMe),
            ..QrStyle::default()
        };
        let spec = resolve(&stored);
        assert_eq!(spec.frame.unwrap().text.as_deref(), Some("SCAN ME"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let stored = QrStyle {
            shape: Some(ModuleShape::Circle),
            gradient: Some(true),
            gradient_start: Some("#ff0000".into()),
            gradient_end: Some("#0000ff".into()),
            frame_type: Some(FrameType::ScanMe),
            watermark_text: Some("hello".into()),
            logo_path: Some("logos/a.png".into()),
            ..QrStyle::default()
        };
        let once = resolve_style(&stored, &StyleOverrides::default(), None).unwrap();
        let twice =
            resolve_style(&once.to_style(), &StyleOverrides::default(), None).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn template_fields_lose_to_explicit_overrides() {
        let overrides = StyleOverrides {
            style: QrStyle {
                foreground_color: Some("#111111".into()),
                ..QrStyle::default()
            },
            ..StyleOverrides::default()
        };
        let spec = resolve_style(&QrStyle::default(), &overrides, Some("minimal")).unwrap();
        assert_eq!(spec.foreground, Color([0x11, 0x11, 0x11]));
    }
}
