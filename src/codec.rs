use std::io::Cursor;

use anyhow::Context as _;
use image::{
    AnimationDecoder, ImageFormat,
    codecs::{
        gif::{GifDecoder, GifEncoder, Repeat},
        webp::WebPDecoder,
    },
};

use crate::{
    error::{FxError, FxResult},
    raster::{FrameKind, RasterImage},
};

/// Delay stamped on encoded GIF frames when the source carried no timing
/// metadata.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// Encode target, parsed from the caller's declared type string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Gif,
    Png,
    Jpeg,
    Webp,
}

impl OutputFormat {
    pub fn from_extension(ext: &str) -> FxResult<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "gif" => Ok(Self::Gif),
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            other => Err(FxError::validation(format!(
                "unsupported output type '{other}'"
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }
}

/// Decode guidance derived from the caller's declared input type.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeHints {
    /// The declared container is an animated format.
    pub animated_format: bool,
    /// Decode every frame instead of the first.
    pub all_frames: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EncodeOptions {
    /// Request error-diffusion dithering during palette quantization.
    pub dither: bool,
}

/// Byte buffer to raster. Implementations must normalize to RGBA8 with a
/// real alpha channel (opaque where the source had none) and premultiply.
pub trait Decoder {
    fn decode(&self, bytes: &[u8], hints: DecodeHints) -> FxResult<RasterImage>;
}

/// Raster to byte buffer.
pub trait Encoder {
    fn encode(
        &self,
        image: &RasterImage,
        format: OutputFormat,
        opts: &EncodeOptions,
    ) -> FxResult<Vec<u8>>;
}

/// Outcome of slide-specific normalization: either a uniform-geometry
/// raster, or the distinguished "this input cannot produce frames" signal.
/// `NoFrames` is a successful outcome, never an error.
#[derive(Debug)]
pub enum Normalized {
    Image(RasterImage),
    NoFrames,
}

pub trait Normalizer {
    fn normalize(&self, image: RasterImage) -> FxResult<Normalized>;
}

/// Codec backed by the `image` crate: animated GIF decode/encode, static
/// PNG/JPEG/WebP.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCodec;

impl Decoder for ImageCodec {
    fn decode(&self, bytes: &[u8], hints: DecodeHints) -> FxResult<RasterImage> {
        if hints.all_frames && hints.animated_format {
            if bytes.starts_with(b"GIF8") {
                let decoder = GifDecoder::new(Cursor::new(bytes))
                    .map_err(|e| FxError::decode(format!("open gif stream: {e}")))?;
                return stack_animation_frames(decoder);
            }
            if is_webp(bytes) {
                let decoder = WebPDecoder::new(Cursor::new(bytes))
                    .map_err(|e| FxError::decode(format!("open webp stream: {e}")))?;
                // Still WebP carries no frame sequence; fall through to the
                // static path below.
                if decoder.has_animation() {
                    return stack_animation_frames(decoder);
                }
            }
        }

        let dyn_img = image::load_from_memory(bytes)
            .map_err(|e| FxError::decode(format!("decode image from memory: {e}")))?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let mut data = rgba.into_raw();
        premultiply_rgba8_in_place(&mut data);
        RasterImage::single(width, height, data)
    }
}

fn is_webp(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

fn stack_animation_frames<'a>(decoder: impl AnimationDecoder<'a>) -> FxResult<RasterImage> {
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| FxError::decode(format!("decode animation frames: {e}")))?;
    if frames.is_empty() {
        return Err(FxError::decode("animation contained no frames"));
    }

    let first = frames[0].buffer();
    let (width, page_height) = first.dimensions();
    let pages = frames.len() as u32;

    let mut delays_ms = Vec::with_capacity(frames.len());
    let mut data = Vec::with_capacity(frames.len() * first.as_raw().len());
    for frame in &frames {
        let buf = frame.buffer();
        if buf.dimensions() != (width, page_height) {
            return Err(FxError::decode("animation frames disagree on geometry"));
        }
        let (numer, denom) = frame.delay().numer_denom_ms();
        delays_ms.push(if denom == 0 { numer } else { numer / denom });
        data.extend_from_slice(buf.as_raw());
    }
    premultiply_rgba8_in_place(&mut data);

    RasterImage::new(
        width,
        page_height,
        FrameKind::Animated(pages),
        delays_ms,
        data,
    )
}

impl Encoder for ImageCodec {
    fn encode(
        &self,
        image: &RasterImage,
        format: OutputFormat,
        opts: &EncodeOptions,
    ) -> FxResult<Vec<u8>> {
        match format {
            OutputFormat::Gif => encode_gif(image, opts),
            _ => encode_static(image, format),
        }
    }
}

fn encode_gif(image: &RasterImage, _opts: &EncodeOptions) -> FxResult<Vec<u8>> {
    // The quantizer used here never dithers, so `dither: false` (the only
    // request the pipelines make) is honored as-is.
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| FxError::encode(format!("set gif repeat: {e}")))?;

        for i in 0..image.page_count() {
            let page = image.frame(i)?;
            let delay_ms = image
                .delays_ms()
                .get(i as usize)
                .copied()
                .unwrap_or(DEFAULT_FRAME_DELAY_MS);

            let mut data = page.into_data();
            unpremultiply_rgba8_in_place(&mut data);
            let buffer = image::RgbaImage::from_raw(image.width(), image.page_height(), data)
                .ok_or_else(|| FxError::encode("gif frame buffer size mismatch"))?;

            let frame = image::Frame::from_parts(
                buffer,
                0,
                0,
                image::Delay::from_numer_denom_ms(delay_ms, 1),
            );
            encoder
                .encode_frame(frame)
                .map_err(|e| FxError::encode(format!("encode gif frame {i}: {e}")))?;
        }
    }
    Ok(out)
}

fn encode_static(image: &RasterImage, format: OutputFormat) -> FxResult<Vec<u8>> {
    if image.page_count() > 1 {
        return Err(FxError::encode(format!(
            "multi-frame output requires gif, not {}",
            format.extension()
        )));
    }

    let mut data = image.data().to_vec();
    unpremultiply_rgba8_in_place(&mut data);
    let buffer = image::RgbaImage::from_raw(image.width(), image.height(), data)
        .ok_or_else(|| FxError::encode("frame buffer size mismatch"))?;

    let (dyn_img, target) = match format {
        OutputFormat::Png => (image::DynamicImage::ImageRgba8(buffer), ImageFormat::Png),
        OutputFormat::Webp => (image::DynamicImage::ImageRgba8(buffer), ImageFormat::WebP),
        // JPEG carries no alpha; flatten before encoding.
        OutputFormat::Jpeg => (
            image::DynamicImage::ImageRgb8(image::DynamicImage::ImageRgba8(buffer).to_rgb8()),
            ImageFormat::Jpeg,
        ),
        OutputFormat::Gif => unreachable!("gif handled by encode_gif"),
    };

    let mut out = Cursor::new(Vec::new());
    dyn_img
        .write_to(&mut out, target)
        .with_context(|| format!("encode {} output", format.extension()))
        .map_err(|e| FxError::encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// Normalizer for rasters produced by [`ImageCodec`]: re-checks that the
/// buffer really slices into whole, uniform pages and signals `NoFrames`
/// for any geometry that cannot yield at least one frame. The signal is a
/// successful outcome; it never turns into an error.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameNormalizer;

impl Normalizer for FrameNormalizer {
    fn normalize(&self, image: RasterImage) -> FxResult<Normalized> {
        if !frames_producible(
            image.width(),
            image.page_height(),
            image.height(),
            image.data().len(),
        ) {
            return Ok(Normalized::NoFrames);
        }
        Ok(Normalized::Image(image))
    }
}

/// True when a `width` x `height` RGBA8 buffer of `len` bytes slices into
/// one or more whole pages of `page_height` rows.
fn frames_producible(width: u32, page_height: u32, height: u32, len: usize) -> bool {
    width > 0
        && page_height > 0
        && height >= page_height
        && height.is_multiple_of(page_height)
        && len == width as usize * height as usize * 4
}

pub fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        if a == 255 {
            continue;
        }
        px[0] = ((u16::from(px[0]) * a + 127) / 255) as u8;
        px[1] = ((u16::from(px[1]) * a + 127) / 255) as u8;
        px[2] = ((u16::from(px[2]) * a + 127) / 255) as u8;
    }
}

pub fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in 0..3 {
            px[c] = ((u32::from(px[c]) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_fixture(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(px));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn output_format_parses_extensions() {
        assert_eq!(OutputFormat::from_extension("gif").unwrap(), OutputFormat::Gif);
        assert_eq!(OutputFormat::from_extension(".PNG").unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormat::from_extension("jpeg").unwrap(), OutputFormat::Jpeg);
        assert!(OutputFormat::from_extension("tiff").is_err());
    }

    #[test]
    fn decode_png_premultiplies_and_keeps_geometry() {
        let bytes = png_fixture(2, 3, [100, 50, 200, 128]);
        let img = ImageCodec.decode(&bytes, DecodeHints::default()).unwrap();

        assert_eq!(img.width(), 2);
        assert_eq!(img.page_height(), 3);
        assert_eq!(img.page_count(), 1);
        assert!(!img.is_animated());
        assert_eq!(
            img.pixel(0, 0),
            [
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128
            ]
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = ImageCodec.decode(b"not an image", DecodeHints::default());
        assert!(matches!(err, Err(FxError::Decode(_))));
    }

    #[test]
    fn gif_round_trip_preserves_frame_count_and_geometry() {
        // Two solid 4x3 frames.
        let mut data = [255u8, 0, 0, 255].repeat(12);
        data.extend_from_slice(&[0u8, 255, 0, 255].repeat(12));
        let src =
            RasterImage::new(4, 3, FrameKind::Animated(2), vec![40, 60], data).unwrap();

        let bytes = ImageCodec
            .encode(&src, OutputFormat::Gif, &EncodeOptions::default())
            .unwrap();
        let back = ImageCodec
            .decode(
                &bytes,
                DecodeHints {
                    animated_format: true,
                    all_frames: true,
                },
            )
            .unwrap();

        assert_eq!(back.page_count(), 2);
        assert_eq!(back.width(), 4);
        assert_eq!(back.page_height(), 3);
        assert_eq!(back.delays_ms(), &[40, 60]);
    }

    #[test]
    fn static_encode_refuses_multi_frame() {
        let data = [0u8, 0, 0, 255].repeat(8);
        let src = RasterImage::new(2, 2, FrameKind::Animated(2), Vec::new(), data).unwrap();
        let err = ImageCodec.encode(&src, OutputFormat::Png, &EncodeOptions::default());
        assert!(matches!(err, Err(FxError::Encode(_))));
    }

    #[test]
    fn unpremultiply_inverts_premultiply_for_opaque_and_half() {
        let mut px = vec![200u8, 100, 40, 255, 200, 100, 40, 128];
        let original = px.clone();
        premultiply_rgba8_in_place(&mut px);
        unpremultiply_rgba8_in_place(&mut px);
        for (got, want) in px.iter().zip(original.iter()) {
            assert!((i16::from(*got) - i16::from(*want)).abs() <= 1);
        }
    }

    #[test]
    fn normalizer_passes_whole_frame_geometry_through() {
        let data = [1u8, 2, 3, 255].repeat(4);
        let img = RasterImage::single(2, 2, data).unwrap();
        match FrameNormalizer.normalize(img).unwrap() {
            Normalized::Image(out) => assert_eq!(out.width(), 2),
            Normalized::NoFrames => panic!("expected an image"),
        }
    }

    #[test]
    fn degenerate_geometry_cannot_produce_frames() {
        // Whole-page slicing of a valid two-page stack.
        assert!(frames_producible(4, 3, 6, 4 * 6 * 4));
        // Zero extents, partial pages, or a short buffer cannot.
        assert!(!frames_producible(0, 3, 6, 0));
        assert!(!frames_producible(4, 0, 6, 4 * 6 * 4));
        assert!(!frames_producible(4, 4, 6, 4 * 6 * 4));
        assert!(!frames_producible(4, 3, 0, 0));
        assert!(!frames_producible(4, 3, 6, 7));
    }

    #[test]
    fn still_webp_decodes_on_the_static_path_under_animated_hints() {
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::WebP)
            .unwrap();

        let decoded = ImageCodec
            .decode(
                &buf.into_inner(),
                DecodeHints {
                    animated_format: true,
                    all_frames: true,
                },
            )
            .unwrap();
        assert_eq!(decoded.page_count(), 1);
        assert_eq!(decoded.width(), 3);
        assert!(!decoded.is_animated());
    }
}
