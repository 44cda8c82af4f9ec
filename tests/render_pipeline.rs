//! End-to-end pipeline scenarios: stored record + overrides -> PNG bytes.

use qrdada::compose::RenderWarning;
use qrdada::config::RenderConfig;
use qrdada::matrix::MatrixError;
use qrdada::model::{Payload, QrRecord, VcardPayload, WifiEncryption};
use qrdada::payload::encode_payload;
use qrdada::render::{render, RenderError};
use qrdada::style::{
    resolve_style, Color, ErrorCorrection, FrameKind, ModuleShape, QrStyle, StyleError,
    StyleOverrides,
};
use uuid::Uuid;

fn record(payload: Payload) -> QrRecord {
    QrRecord::new(Uuid::new_v4(), "test", payload, false)
}

fn link_record() -> QrRecord {
    record(Payload::Link {
        url: "https://example.com/".into(),
    })
}

#[test]
fn static_link_under_defaults() {
    let qr = link_record();
    let (png, info) = render(
        &qr,
        &StyleOverrides::default(),
        None,
        &RenderConfig::default(),
    )
    .unwrap();

    assert_eq!(info.version, 1);
    assert_eq!(info.matrix_size, 21);
    assert_eq!((info.image_width, info.image_height), (290, 290));
    assert!(info.warnings.is_empty());

    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!(decoded.width(), 290);
    assert_eq!(decoded.height(), 290);
}

#[test]
fn dynamic_link_with_corporate_template() {
    let mut qr = link_record();
    qr.id = Uuid::parse_str("0123456789abcdef0123456789abcdef").unwrap();
    qr.is_dynamic = true;

    let scannable =
        encode_payload(&qr.payload, qr.is_dynamic, qr.id, "https://q.example/").unwrap();
    assert_eq!(
        scannable,
        "https://q.example/r/0123456789abcdef0123456789abcdef"
    );

    let spec = resolve_style(&qr.style, &StyleOverrides::default(), Some("corporate")).unwrap();
    let frame = spec.frame.as_ref().expect("corporate sets a frame");
    assert_eq!(frame.kind, FrameKind::Square);
    assert_eq!(frame.text.as_deref(), Some("SCAN ME"));
    assert_eq!(frame.color, Color::BLACK);

    let config = RenderConfig {
        redirect_base_url: "https://q.example/".into(),
        ..RenderConfig::default()
    };
    let (png, info) = render(&qr, &StyleOverrides::default(), Some("corporate"), &config).unwrap();
    assert!(!png.is_empty());
    // framed: border plus caption band on top of the module image
    assert!(info.image_height > info.image_width);
}

#[test]
fn wifi_with_gradient_circle_modules_and_custom_eyes() {
    let qr = record(Payload::Wifi {
        ssid: "Guest".into(),
        password: Some("p@ss".into()),
        encryption: WifiEncryption::Wpa,
    });
    let scannable = encode_payload(&qr.payload, false, qr.id, "").unwrap();
    assert_eq!(scannable, "WIFI:T:WPA;S:Guest;P:p@ss;H:false;;");

    let overrides = StyleOverrides {
        style: QrStyle {
            shape: Some(ModuleShape::Circle),
            gradient: Some(true),
            gradient_start: Some("#ff0000".into()),
            gradient_end: Some("#0000ff".into()),
            ..QrStyle::default()
        },
        ..StyleOverrides::default()
    };
    let spec = resolve_style(&qr.style, &overrides, None).unwrap();
    let eyes = spec.eyes.expect("gradient forces custom eyes");
    assert_eq!(eyes.inner_color, Color([255, 0, 0]));
    assert_eq!(eyes.outer_color, Color([0, 0, 255]));

    let (png, info) = render(&qr, &overrides, None, &RenderConfig::default()).unwrap();
    assert!(!png.is_empty());
    assert!(info.warnings.is_empty());
}

#[test]
fn vcard_with_round_logo_at_quarter_size() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("logos")).unwrap();
    let logo = image::RgbaImage::from_pixel(512, 512, image::Rgba([0, 0, 255, 255]));
    logo.save(dir.path().join("logos/logo.png")).unwrap();

    let mut qr = record(Payload::Vcard(VcardPayload {
        full_name: "Ada".into(),
        phone: Some("+15551234".into()),
        email: None,
        company: None,
        title: None,
        address: None,
        website: None,
        logo_path: None,
        primary_color: None,
        secondary_color: None,
        social_media: Default::default(),
    }));
    qr.style.logo_path = Some("logos/logo.png".into());
    qr.style.round_logo = Some(true);

    let config = RenderConfig {
        upload_root: dir.path().to_path_buf(),
        ..RenderConfig::default()
    };
    let (png, info) = render(&qr, &StyleOverrides::default(), None, &config).unwrap();
    assert!(info.logo_applied);
    assert!(info.warnings.is_empty());

    let img = image::load_from_memory(&png).unwrap().to_rgba8();
    let (w, h) = img.dimensions();
    let is_blue = |p: &image::Rgba<u8>| p.0[2] > 200 && p.0[0] < 60 && p.0[1] < 60;
    assert!(is_blue(img.get_pixel(w / 2, h / 2)), "logo covers the center");

    // The blue disc diameter on the center row tracks the 25% sizing.
    let target = w * 25 / 100;
    let blue_run = (0..w)
        .filter(|&x| is_blue(img.get_pixel(x, h / 2)))
        .count() as u32;
    assert!(
        blue_run.abs_diff(target) <= 4,
        "logo run {blue_run}px vs expected ~{target}px"
    );

    // White patch ring between the round logo and the modules.
    let patch = ((target as f32) * 1.2).round() as u32;
    let probe_x = w / 2 + target / 2 + (patch - target) / 4;
    assert_eq!(
        img.get_pixel(probe_x, h / 2).0[..3],
        [255, 255, 255],
        "background patch visible beneath the logo"
    );
}

#[test]
fn oversize_payload_fails_at_h_and_recovers_at_l() {
    let qr = record(Payload::Text {
        text: "A".repeat(4000),
    });
    let err = render(
        &qr,
        &StyleOverrides::default(),
        None,
        &RenderConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Matrix(MatrixError::PayloadTooLong(ErrorCorrection::H))
    ));

    let retry = StyleOverrides {
        style: QrStyle {
            error_correction: Some(ErrorCorrection::L),
            ..QrStyle::default()
        },
        ..StyleOverrides::default()
    };
    let (png, info) = render(&qr, &retry, None, &RenderConfig::default()).unwrap();
    assert!(!png.is_empty());
    assert!((39..=40).contains(&info.version), "near-capacity version");
}

#[test]
fn unknown_template_is_rejected() {
    let qr = link_record();
    let err = render(
        &qr,
        &StyleOverrides::default(),
        Some("neon"),
        &RenderConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Style(StyleError::UnknownTemplate(name)) if name == "neon"
    ));
}

#[test]
fn every_single_axis_variation_still_renders() {
    let axes: Vec<QrStyle> = vec![
        QrStyle {
            shape: Some(ModuleShape::Rounded),
            ..QrStyle::default()
        },
        QrStyle {
            shape: Some(ModuleShape::VerticalBars),
            ..QrStyle::default()
        },
        QrStyle {
            gradient: Some(true),
            ..QrStyle::default()
        },
        QrStyle {
            custom_eyes: Some(true),
            ..QrStyle::default()
        },
        QrStyle {
            frame_type: Some(qrdada::style::FrameType::ScanMe),
            ..QrStyle::default()
        },
        QrStyle {
            watermark_text: Some("QR DADA".into()),
            ..QrStyle::default()
        },
    ];
    for style in axes {
        let mut qr = link_record();
        qr.style = style.clone();
        let (png, info) = render(
            &qr,
            &StyleOverrides::default(),
            None,
            &RenderConfig::default(),
        )
        .unwrap();
        assert!(!png.is_empty(), "axis {style:?} produced no bytes");
        assert!(
            !info.warnings.iter().any(|w| matches!(w, RenderWarning::LogoLoad { .. })),
            "axis {style:?} warned about a logo it does not have"
        );
    }
}

#[test]
fn logo_percentage_is_capped_at_forty() {
    let stored = QrStyle {
        logo_path: Some("logos/a.png".into()),
        logo_size_percentage: Some(90),
        ..QrStyle::default()
    };
    let spec = resolve_style(&stored, &StyleOverrides::default(), None).unwrap();
    assert_eq!(spec.logo.unwrap().size_percentage, 40);
}
