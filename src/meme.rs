use crate::{
    codec::{DecodeHints, Decoder, EncodeOptions, Encoder, OutputFormat},
    composite_cpu::blit_over,
    error::FxResult,
    raster::RasterImage,
    stamp::{TextStamp, build_stamp},
    text::{FontSpec, TextRenderer},
};

/// Per-call caption configuration. Immutable once the call begins.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MemeParams {
    pub top: String,
    pub bottom: String,
    /// Requested font family name ("impact", "roboto", ...).
    pub font: String,
    #[serde(rename = "type")]
    pub output: OutputFormat,
    /// Uniform per-frame delay override in ms; `None` preserves source
    /// timing. Named `delay` on the wire.
    #[serde(rename = "delay", default)]
    pub frame_delay_ms: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct MemeOutput {
    pub data: Vec<u8>,
    pub format: OutputFormat,
}

/// Caption placement: each extent is halved before subtracting, so an even
/// surface with an odd stamp lands one pixel right of `(w - sw) / 2`.
fn centered_x(surface_width: u32, stamp_width: u32) -> i64 {
    i64::from(surface_width / 2) - i64::from(stamp_width / 2)
}

/// Stamps the caption layers onto every frame of `source`: top caption
/// centered and flush to the top edge, bottom caption centered and flush to
/// the bottom edge of each page. Stamps wider or taller than a page are
/// clipped by the blit.
pub fn composite_captions(
    source: &RasterImage,
    top: Option<&TextStamp>,
    bottom: Option<&TextStamp>,
    frame_delay_ms: Option<u32>,
) -> FxResult<RasterImage> {
    let width = source.width();
    let page_height = source.page_height();
    let pages = source.page_count();

    let mut frames = Vec::with_capacity(pages as usize);
    for i in 0..pages {
        let mut frame = source.frame(i)?;
        if let Some(stamp) = top {
            let x = centered_x(width, stamp.width);
            blit_over(
                frame.data_mut(),
                width,
                page_height,
                &stamp.data,
                stamp.width,
                stamp.height,
                x,
                0,
            )?;
        }
        if let Some(stamp) = bottom {
            let x = centered_x(width, stamp.width);
            let y = i64::from(page_height) - i64::from(stamp.height);
            blit_over(
                frame.data_mut(),
                width,
                page_height,
                &stamp.data,
                stamp.width,
                stamp.height,
                x,
                y,
            )?;
        }
        frames.push(frame);
    }

    let delays = match frame_delay_ms {
        Some(ms) => vec![ms; pages as usize],
        None => source.delays_ms().to_vec(),
    };
    RasterImage::from_frames(&frames, source.frame_kind(), delays)
}

/// Full meme transform: decode, build both caption stamps once, composite
/// them onto every frame, re-encode as the requested format.
///
/// This is a classification boundary: internal stages propagate typed
/// errors untouched, and anything untyped collapses to the generic unknown
/// kind before reaching the caller.
#[tracing::instrument(
    skip_all,
    fields(output = params.output.extension(), top = !params.top.is_empty(), bottom = !params.bottom.is_empty())
)]
pub fn meme(
    bytes: &[u8],
    params: &MemeParams,
    decoder: &dyn Decoder,
    renderer: &dyn TextRenderer,
    encoder: &dyn Encoder,
) -> FxResult<MemeOutput> {
    meme_inner(bytes, params, decoder, renderer, encoder).map_err(|e| e.classify())
}

fn meme_inner(
    bytes: &[u8],
    params: &MemeParams,
    decoder: &dyn Decoder,
    renderer: &dyn TextRenderer,
    encoder: &dyn Encoder,
) -> FxResult<MemeOutput> {
    // All frames only when the caller declared a GIF; static sources keep
    // single-frame decode even if the container could hold more.
    let animated = params.output == OutputFormat::Gif;
    let source = decoder.decode(
        bytes,
        DecodeHints {
            animated_format: animated,
            all_frames: animated,
        },
    )?;

    let font = FontSpec::for_family(&params.font);
    let top = build_stamp(renderer, &params.top, &font, source.width())?;
    let bottom = build_stamp(renderer, &params.bottom, &font, source.width())?;
    tracing::debug!(
        pages = source.page_count(),
        top_stamp = top.is_some(),
        bottom_stamp = bottom.is_some(),
        "captions built"
    );

    let composed = composite_captions(
        &source,
        top.as_ref(),
        bottom.as_ref(),
        params.frame_delay_ms,
    )?;

    let data = encoder.encode(
        &composed,
        params.output,
        &EncodeOptions { dither: false },
    )?;
    Ok(MemeOutput {
        data,
        format: params.output,
    })
}
