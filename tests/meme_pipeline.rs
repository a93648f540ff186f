use std::io::Cursor;

use framefx::{
    DecodeHints, Decoder, FontSpec, FxResult, ImageCodec, MemeParams, OutputFormat, TextLayer,
    TextRenderer, meme,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Deterministic stand-in for the system font renderer: every non-empty
/// caption becomes a solid white square, so pipeline assertions do not
/// depend on fonts installed on the host.
struct SquareGlyphs;

impl TextRenderer for SquareGlyphs {
    fn render(
        &self,
        text: &str,
        _font: &FontSpec,
        _size_px: u32,
        _max_width: u32,
    ) -> FxResult<Option<TextLayer>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let side = 6u32;
        Ok(Some(TextLayer {
            width: side,
            height: side,
            data: [255u8, 255, 255, 255].repeat((side * side) as usize),
        }))
    }
}

fn png_bytes(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(px));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn gif_bytes(width: u32, height: u32, pages: u32) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = image::codecs::gif::GifEncoder::new(&mut out);
        encoder
            .set_repeat(image::codecs::gif::Repeat::Infinite)
            .unwrap();
        for p in 0..pages {
            let shade = 40 * (p as u8 + 1);
            let img = image::RgbaImage::from_pixel(
                width,
                height,
                image::Rgba([shade, shade, shade, 255]),
            );
            let frame =
                image::Frame::from_parts(img, 0, 0, image::Delay::from_numer_denom_ms(40, 1));
            encoder.encode_frame(frame).unwrap();
        }
    }
    out
}

#[test]
fn top_caption_on_still_png_keeps_format_and_bottom_rows() {
    init_tracing();
    let input = png_bytes(60, 40, [0, 0, 255, 255]);
    let params = MemeParams {
        top: "HELLO".to_string(),
        bottom: String::new(),
        font: "impact".to_string(),
        output: OutputFormat::Png,
        frame_delay_ms: None,
    };

    let out = meme(&input, &params, &ImageCodec, &SquareGlyphs, &ImageCodec).unwrap();
    assert_eq!(out.format, OutputFormat::Png);

    let decoded = ImageCodec.decode(&out.data, DecodeHints::default()).unwrap();
    assert_eq!(decoded.page_count(), 1);
    assert_eq!(decoded.width(), 60);
    assert_eq!(decoded.page_height(), 40);

    // The stamp (6px glyph square + 22px padding = 28x28, centered at
    // x=16) left a white core near the top center.
    assert_eq!(decoded.pixel(30, 13), [255, 255, 255, 255]);
    // Bottom rows stay the source blue.
    for y in 30..40 {
        for x in 0..60 {
            assert_eq!(decoded.pixel(x, y), [0, 0, 255, 255]);
        }
    }
}

#[test]
fn animated_gif_keeps_every_frame() {
    let input = gif_bytes(32, 24, 3);
    let params = MemeParams {
        top: "LOOP".to_string(),
        bottom: "FOREVER".to_string(),
        font: "futura".to_string(),
        output: OutputFormat::Gif,
        frame_delay_ms: None,
    };

    let out = meme(&input, &params, &ImageCodec, &SquareGlyphs, &ImageCodec).unwrap();
    assert_eq!(out.format, OutputFormat::Gif);

    let decoded = ImageCodec
        .decode(
            &out.data,
            DecodeHints {
                animated_format: true,
                all_frames: true,
            },
        )
        .unwrap();
    assert_eq!(decoded.page_count(), 3);
    assert_eq!(decoded.page_height(), 24);
}

#[test]
fn explicit_delay_overrides_frame_timing() {
    let input = gif_bytes(20, 20, 2);
    let params = MemeParams {
        top: "X".to_string(),
        bottom: String::new(),
        font: "impact".to_string(),
        output: OutputFormat::Gif,
        frame_delay_ms: Some(80),
    };

    let out = meme(&input, &params, &ImageCodec, &SquareGlyphs, &ImageCodec).unwrap();
    let decoded = ImageCodec
        .decode(
            &out.data,
            DecodeHints {
                animated_format: true,
                all_frames: true,
            },
        )
        .unwrap();
    assert_eq!(decoded.delays_ms(), &[80, 80]);
}

#[test]
fn malformed_input_surfaces_a_decode_error() {
    let params = MemeParams {
        top: "T".to_string(),
        bottom: String::new(),
        font: "impact".to_string(),
        output: OutputFormat::Png,
        frame_delay_ms: None,
    };
    let err = meme(b"garbage", &params, &ImageCodec, &SquareGlyphs, &ImageCodec).unwrap_err();
    assert!(matches!(err, framefx::FxError::Decode(_)));
}

#[test]
fn params_round_trip_the_wire_shape() {
    let json = r#"{"top":"A","bottom":"B","font":"impact","type":"gif","delay":30}"#;
    let params: MemeParams = serde_json::from_str(json).unwrap();
    assert_eq!(params.output, OutputFormat::Gif);
    assert_eq!(params.frame_delay_ms, Some(30));

    let wire = serde_json::to_value(&params).unwrap();
    assert_eq!(wire["delay"], 30);
    assert!(wire.get("frame_delay_ms").is_none());

    let json_no_delay = r#"{"top":"A","bottom":"","font":"roboto","type":"png"}"#;
    let params: MemeParams = serde_json::from_str(json_no_delay).unwrap();
    assert_eq!(params.frame_delay_ms, None);
}
