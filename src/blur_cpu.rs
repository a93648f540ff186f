use crate::error::{FxError, FxResult};

/// Separable Gaussian blur over a premultiplied RGBA8 buffer, with the
/// kernel truncated where the tail amplitude drops below `min_ampl`
/// relative to the peak. `min_ampl` in `(0, 1)`; smaller values keep more
/// of the tail.
pub fn gaussblur_rgba8(
    src: &[u8],
    width: u32,
    height: u32,
    sigma: f32,
    min_ampl: f32,
) -> FxResult<Vec<u8>> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| FxError::validation("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(FxError::validation(
            "gaussblur_rgba8 expects src matching width*height*4",
        ));
    }

    let radius = radius_for_min_ampl(sigma, min_ampl)?;
    if radius == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected_len];
    let mut out = vec![0u8; expected_len];

    separable_pass(src, &mut tmp, width, height, &kernel, Axis::X);
    separable_pass(&tmp, &mut out, width, height, &kernel, Axis::Y);
    Ok(out)
}

/// Smallest kernel radius whose dropped tail has relative amplitude below
/// `min_ampl`: the first integer `r` with `exp(-r^2 / 2 sigma^2) < min_ampl`.
pub fn radius_for_min_ampl(sigma: f32, min_ampl: f32) -> FxResult<u32> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(FxError::validation("blur sigma must be > 0"));
    }
    if !min_ampl.is_finite() || min_ampl <= 0.0 || min_ampl >= 1.0 {
        return Err(FxError::validation("blur min_ampl must be in (0, 1)"));
    }
    let r = (f64::from(sigma) * (-2.0 * f64::from(min_ampl).ln()).sqrt()).ceil();
    Ok(r as u32)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> FxResult<Vec<u32>> {
    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;

    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(FxError::validation("gaussian kernel sum is zero"));
    }

    // Normalize into Q16 and push any rounding residue onto the center tap
    // so the weights sum to exactly 1.0.
    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = (((wf / sum) * 65536.0).round() as i64).clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    Ok(weights)
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

fn separable_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32], axis: Axis) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;

    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let d = ki as i32 - radius;
                // Edges extend (clamp) rather than wrap or zero.
                let (sx, sy) = match axis {
                    Axis::X => ((x + d).clamp(0, w - 1), y),
                    Axis::Y => (x, (y + d).clamp(0, h - 1)),
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    (((acc + 32768) >> 16).min(255)) as u8
}
