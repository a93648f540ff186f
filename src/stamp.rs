use crate::{
    blur_cpu::gaussblur_rgba8,
    composite_cpu::over_in_place,
    error::FxResult,
    morph::{DiskMask, dilate_rgba8},
    text::{FontSpec, TextRenderer},
};

/// Caption size is the target width divided by this factor.
const SIZE_DIVISOR: u32 = 9;

/// Fixed halo radius; the padding leaves `HALO_RADIUS + 10` pixels of room
/// on each side for the outline to grow into.
const HALO_RADIUS: u32 = 1;

/// Image width per extra pixel of proportional outline thickness.
const PROPORTIONAL_STEP: u32 = 1000;

/// Outlined caption layer: white glyphs over an opaque black silhouette,
/// premultiplied RGBA8. Built once per caption string and reused across
/// every frame of the target image.
#[derive(Clone, Debug)]
pub struct TextStamp {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Renders `text` and wraps it in a dilated, blurred black outline sized
/// for an image of `target_width`. Returns `None` for captions that render
/// to nothing (empty or whitespace-only strings); callers skip compositing
/// entirely in that case.
pub fn build_stamp(
    renderer: &dyn TextRenderer,
    text: &str,
    font: &FontSpec,
    target_width: u32,
) -> FxResult<Option<TextStamp>> {
    if text.is_empty() {
        return Ok(None);
    }

    let size_px = (target_width / SIZE_DIVISOR).max(1);
    let Some(layer) = renderer.render(text, font, size_px, target_width)? else {
        return Ok(None);
    };

    // Pad the glyph layer so the halo never touches the stamp edge.
    let pad = HALO_RADIUS + 10;
    let width = layer.width + 2 * pad;
    let height = layer.height + 2 * pad;
    let mut glyphs = vec![0u8; width as usize * height as usize * 4];
    for y in 0..layer.height {
        let src = (y * layer.width * 4) as usize;
        let dst = (((y + pad) * width + pad) * 4) as usize;
        glyphs[dst..dst + layer.width as usize * 4]
            .copy_from_slice(&layer.data[src..src + layer.width as usize * 4]);
    }

    // Silhouette: dilate by the fixed disk, then soften the edge.
    let mut silhouette = dilate_rgba8(&glyphs, width, height, &DiskMask::new(HALO_RADIUS))?;
    silhouette = gaussblur_rgba8(&silhouette, width, height, 0.5, 0.1)?;

    // Thicken proportionally so thin outlines survive on large images.
    let proportional = target_width / PROPORTIONAL_STEP;
    if proportional >= 1 {
        silhouette = dilate_rgba8(&silhouette, width, height, &DiskMask::new(proportional))?;
    }

    // Pixels the silhouette reached become opaque black; exact zero in all
    // channels marks untouched background. Integer blur output makes the
    // exact-zero test stable.
    let mut outline = vec![0u8; silhouette.len()];
    for (out_px, sil_px) in outline.chunks_exact_mut(4).zip(silhouette.chunks_exact(4)) {
        if sil_px != [0, 0, 0, 0] {
            out_px[3] = 255;
        }
    }

    over_in_place(&mut outline, &glyphs)?;
    Ok(Some(TextStamp {
        width,
        height,
        data: outline,
    }))
}
