use crate::error::{FxError, FxResult};

pub type PremulRgba8 = [u8; 4];

/// Standard "over" blend of one premultiplied source pixel onto a
/// premultiplied destination pixel.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = src[i].saturating_add(dc);
    }
    out
}

/// Blends `src` over `dst` pixel-for-pixel. Both buffers must be RGBA8 of
/// identical length.
pub fn over_in_place(dst: &mut [u8], src: &[u8]) -> FxResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(FxError::validation(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Blends a positioned `src` layer over a `dst` surface. The placement
/// `(x, y)` may be negative or run past the surface edge; out-of-bounds
/// source pixels are clipped, never wrapped.
pub fn blit_over(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    x: i64,
    y: i64,
) -> FxResult<()> {
    if dst.len() != dst_w as usize * dst_h as usize * 4 {
        return Err(FxError::validation("blit_over dst length mismatch"));
    }
    if src.len() != src_w as usize * src_h as usize * 4 {
        return Err(FxError::validation("blit_over src length mismatch"));
    }

    for sy in 0..src_h as i64 {
        let dy = y + sy;
        if dy < 0 || dy >= dst_h as i64 {
            continue;
        }
        for sx in 0..src_w as i64 {
            let dx = x + sx;
            if dx < 0 || dx >= dst_w as i64 {
                continue;
            }
            let si = (sy as usize * src_w as usize + sx as usize) * 4;
            let di = (dy as usize * dst_w as usize + dx as usize) * 4;
            let out = over(
                [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]],
                [src[si], src[si + 1], src[si + 2], src[si + 3]],
            );
            dst[di..di + 4].copy_from_slice(&out);
        }
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
