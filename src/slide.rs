use crate::{
    cancel::CancelToken,
    codec::{DecodeHints, Decoder, EncodeOptions, Encoder, Normalized, Normalizer, OutputFormat},
    error::FxResult,
    raster::{FrameKind, RasterImage},
};

/// Synthetic frame count when the source is a still image.
pub const STILL_FRAME_COUNT: u32 = 15;

/// Uniform per-frame delay stamped on synthesized animations, in ms.
pub const STILL_FRAME_DELAY_MS: u32 = 50;

/// Per-call slide configuration. Immutable once the call begins.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SlideParams {
    pub vertical: bool,
    pub reverse: bool,
    /// Declared type of the input buffer, doubling as the requested output
    /// type. Anything but WebP is normalized to GIF on the way out.
    #[serde(rename = "type")]
    pub output: OutputFormat,
}

/// Slide results the caller must distinguish. `NoFrames` and `Cancelled`
/// are successful outcomes, not failures; no partial buffer accompanies
/// either.
#[derive(Clone, Debug)]
pub enum SlideOutput {
    /// The input cannot be animated (normalizer sentinel). Kind "frames",
    /// empty buffer.
    NoFrames,
    /// The watchdog fired before the animation was finished; nothing was
    /// encoded.
    Cancelled,
    Encoded { format: OutputFormat, data: Vec<u8> },
}

/// Toroidal offset of synthetic frame `i` of `n` along an axis of the given
/// extent. Integer division, truncated toward zero, matching the frame
/// positions of the continuous loop.
pub fn shift_offset(i: u32, n: u32, extent: u32, reverse: bool) -> i64 {
    let mult: i64 = if reverse { -1 } else { 1 };
    i64::from(extent) * mult * i64::from(i) / i64::from(n)
}

/// Cyclically shifts a single frame by `(dx, dy)`: pixels pushed past an
/// edge reappear at the opposite edge. Any integer offset is accepted;
/// shifting by `k` then `extent - k` restores the original.
pub fn wrap_frame(frame: &RasterImage, dx: i64, dy: i64) -> FxResult<RasterImage> {
    let w = i64::from(frame.width());
    let h = i64::from(frame.height());
    let src = frame.data();
    let mut out = vec![0u8; src.len()];

    for y in 0..h {
        let sy = (y - dy).rem_euclid(h);
        for x in 0..w {
            let sx = (x - dx).rem_euclid(w);
            let si = ((sy * w + sx) as usize) * 4;
            let di = ((y * w + x) as usize) * 4;
            out[di..di + 4].copy_from_slice(&src[si..si + 4]);
        }
    }
    RasterImage::single(frame.width(), frame.height(), out)
}

/// Outcome of the frame-synthesis loop, before any encode.
#[derive(Debug)]
pub enum Animated {
    Frames(RasterImage),
    Cancelled,
}

/// Synthesizes the sliding animation. Multi-page sources shift each page by
/// its own fraction of the extent; still sources are expanded to
/// [`STILL_FRAME_COUNT`] frames at [`STILL_FRAME_DELAY_MS`] each. The token
/// is polled once per frame; a set token abandons the remaining frames.
pub fn animate(
    source: &RasterImage,
    vertical: bool,
    reverse: bool,
    token: &CancelToken,
) -> FxResult<Animated> {
    let still = source.page_count() == 1;
    let n = if still {
        STILL_FRAME_COUNT
    } else {
        source.page_count()
    };

    let mut frames = Vec::with_capacity(n as usize);
    for i in 0..n {
        if token.is_cancelled() {
            tracing::debug!(produced = frames.len(), total = n, "slide cancelled");
            return Ok(Animated::Cancelled);
        }
        let page = if still { source.frame(0)? } else { source.frame(i)? };
        let (dx, dy) = if vertical {
            (0, shift_offset(i, n, source.page_height(), reverse))
        } else {
            (shift_offset(i, n, source.width(), reverse), 0)
        };
        frames.push(wrap_frame(&page, dx, dy)?);
    }

    let delays = if still {
        vec![STILL_FRAME_DELAY_MS; n as usize]
    } else {
        source.delays_ms().to_vec()
    };
    let stacked = RasterImage::from_frames(&frames, FrameKind::Animated(n), delays)?;
    Ok(Animated::Frames(stacked))
}

/// Full slide transform: decode, normalize, synthesize the shifted frames,
/// encode. Output is WebP only when explicitly requested; every other
/// request is normalized to GIF. Classification boundary as in
/// [`crate::meme::meme`].
#[tracing::instrument(
    skip_all,
    fields(vertical = params.vertical, reverse = params.reverse, output = params.output.extension())
)]
pub fn slide(
    bytes: &[u8],
    params: &SlideParams,
    token: &CancelToken,
    decoder: &dyn Decoder,
    normalizer: &dyn Normalizer,
    encoder: &dyn Encoder,
) -> FxResult<SlideOutput> {
    slide_inner(bytes, params, token, decoder, normalizer, encoder).map_err(|e| e.classify())
}

/// Every declared type that can hold an animation is decoded with all
/// frames; still-only formats keep single-frame decode. (Formats like AVIF
/// that declare pages the slide cannot use would also land on the
/// single-frame side.)
fn decode_hints_for(declared: OutputFormat) -> DecodeHints {
    let animated = matches!(declared, OutputFormat::Gif | OutputFormat::Webp);
    DecodeHints {
        animated_format: animated,
        all_frames: animated,
    }
}

fn slide_inner(
    bytes: &[u8],
    params: &SlideParams,
    token: &CancelToken,
    decoder: &dyn Decoder,
    normalizer: &dyn Normalizer,
    encoder: &dyn Encoder,
) -> FxResult<SlideOutput> {
    let decoded = decoder.decode(bytes, decode_hints_for(params.output))?;

    let source = match normalizer.normalize(decoded)? {
        Normalized::Image(img) => img,
        Normalized::NoFrames => return Ok(SlideOutput::NoFrames),
    };

    let stacked = match animate(&source, params.vertical, params.reverse, token)? {
        Animated::Frames(stacked) => stacked,
        Animated::Cancelled => return Ok(SlideOutput::Cancelled),
    };

    // Last poll before committing to the encode.
    if token.is_cancelled() {
        return Ok(SlideOutput::Cancelled);
    }

    let format = if params.output == OutputFormat::Webp {
        OutputFormat::Webp
    } else {
        OutputFormat::Gif
    };
    let data = encoder.encode(&stacked, format, &EncodeOptions::default())?;
    Ok(SlideOutput::Encoded { format, data })
}
