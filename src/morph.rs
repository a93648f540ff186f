use crate::error::{FxError, FxResult};

pub const MASK_BACKGROUND: u8 = 128;
pub const MASK_FOREGROUND: u8 = 255;

/// Square binary structuring element holding a filled disk: side `2r + 1`,
/// background 128, foreground 255. Only foreground taps participate in
/// dilation.
#[derive(Clone, Debug)]
pub struct DiskMask {
    radius: u32,
    data: Vec<u8>,
}

impl DiskMask {
    pub fn new(radius: u32) -> Self {
        let side = (2 * radius + 1) as usize;
        let mut data = vec![MASK_BACKGROUND; side * side];
        let r = radius as i64;
        for y in 0..side as i64 {
            for x in 0..side as i64 {
                let dx = x - r;
                let dy = y - r;
                if dx * dx + dy * dy <= r * r {
                    data[(y * side as i64 + x) as usize] = MASK_FOREGROUND;
                }
            }
        }
        Self { radius, data }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn side(&self) -> u32 {
        2 * self.radius + 1
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.side() + x) as usize] == MASK_FOREGROUND
    }
}

/// Binary morphological dilation of an RGBA8 buffer: each output channel is
/// the max of that channel over the mask's foreground footprint. Taps that
/// fall outside the image contribute nothing, so content only grows from
/// real pixels.
pub fn dilate_rgba8(src: &[u8], width: u32, height: u32, mask: &DiskMask) -> FxResult<Vec<u8>> {
    if src.len() != width as usize * height as usize * 4 {
        return Err(FxError::validation(
            "dilate_rgba8 expects src matching width*height*4",
        ));
    }

    let r = mask.radius() as i64;
    let w = width as i64;
    let h = height as i64;
    let mut out = vec![0u8; src.len()];

    for y in 0..h {
        for x in 0..w {
            let mut best = [0u8; 4];
            for my in 0..mask.side() {
                for mx in 0..mask.side() {
                    if !mask.is_foreground(mx, my) {
                        continue;
                    }
                    let sx = x + i64::from(mx) - r;
                    let sy = y + i64::from(my) - r;
                    if sx < 0 || sx >= w || sy < 0 || sy >= h {
                        continue;
                    }
                    let idx = ((sy * w + sx) as usize) * 4;
                    for c in 0..4 {
                        best[c] = best[c].max(src[idx + c]);
                    }
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            out[out_idx..out_idx + 4].copy_from_slice(&best);
        }
    }
    Ok(out)
}
