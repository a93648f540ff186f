use crate::error::{FxError, FxResult};

/// Distinguishes a genuinely single-frame source from an animated one,
/// replacing the usual "-1 means all frames" and "1 really means still"
/// sentinels with a tagged variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Single,
    Animated(u32),
}

impl FrameKind {
    pub fn page_count(self) -> u32 {
        match self {
            Self::Single => 1,
            Self::Animated(n) => n,
        }
    }
}

/// Decoded multi-frame raster: premultiplied RGBA8, frames stacked
/// vertically in one buffer. A frame is the horizontal slice
/// `[0, i * page_height, width, page_height]`.
///
/// Invariant: `height == page_height * page_count` and
/// `data.len() == width * height * 4`. Pipeline stages consume a
/// `RasterImage` and produce a new one; buffers are never aliased across
/// stages.
#[derive(Clone, Debug)]
pub struct RasterImage {
    width: u32,
    height: u32,
    page_height: u32,
    frame_kind: FrameKind,
    /// Per-frame display delays in milliseconds. Empty when the source
    /// carried no animation metadata.
    delays_ms: Vec<u32>,
    data: Vec<u8>,
}

impl RasterImage {
    pub fn new(
        width: u32,
        page_height: u32,
        frame_kind: FrameKind,
        delays_ms: Vec<u32>,
        data: Vec<u8>,
    ) -> FxResult<Self> {
        if width == 0 || page_height == 0 {
            return Err(FxError::validation("raster dimensions must be non-zero"));
        }
        let pages = frame_kind.page_count();
        if pages == 0 {
            return Err(FxError::validation("raster must have at least one page"));
        }
        let height = page_height
            .checked_mul(pages)
            .ok_or_else(|| FxError::validation("raster height overflow"))?;
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| FxError::validation("raster buffer size overflow"))?;
        if data.len() != expected {
            return Err(FxError::validation(format!(
                "raster buffer length {} does not match {width}x{height} rgba8",
                data.len()
            )));
        }
        if !delays_ms.is_empty() && delays_ms.len() != pages as usize {
            return Err(FxError::validation(
                "delay list must be empty or one entry per page",
            ));
        }
        Ok(Self {
            width,
            height,
            page_height,
            frame_kind,
            delays_ms,
            data,
        })
    }

    /// Builds a single-frame raster from a raw premultiplied RGBA8 buffer.
    pub fn single(width: u32, height: u32, data: Vec<u8>) -> FxResult<Self> {
        Self::new(width, height, FrameKind::Single, Vec::new(), data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn page_height(&self) -> u32 {
        self.page_height
    }

    pub fn page_count(&self) -> u32 {
        self.frame_kind.page_count()
    }

    pub fn frame_kind(&self) -> FrameKind {
        self.frame_kind
    }

    pub fn is_animated(&self) -> bool {
        matches!(self.frame_kind, FrameKind::Animated(_))
    }

    pub fn delays_ms(&self) -> &[u32] {
        &self.delays_ms
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Copies frame `i` out as a standalone single-frame raster.
    pub fn frame(&self, i: u32) -> FxResult<RasterImage> {
        if i >= self.page_count() {
            return Err(FxError::validation(format!(
                "frame index {i} out of range (pages: {})",
                self.page_count()
            )));
        }
        let row_bytes = self.width as usize * 4;
        let start = i as usize * self.page_height as usize * row_bytes;
        let end = start + self.page_height as usize * row_bytes;
        RasterImage::single(self.width, self.page_height, self.data[start..end].to_vec())
    }

    /// Restacks per-frame rasters vertically into one buffer, in order.
    /// Every frame must share the first frame's geometry.
    pub fn from_frames(
        frames: &[RasterImage],
        frame_kind: FrameKind,
        delays_ms: Vec<u32>,
    ) -> FxResult<Self> {
        let Some(first) = frames.first() else {
            return Err(FxError::validation("cannot restack zero frames"));
        };
        if frames.len() != frame_kind.page_count() as usize {
            return Err(FxError::validation(
                "frame count does not match declared frame kind",
            ));
        }
        let mut data = Vec::with_capacity(first.data.len() * frames.len());
        for frame in frames {
            if frame.width != first.width || frame.height != first.height {
                return Err(FxError::validation("restacked frames must share geometry"));
            }
            data.extend_from_slice(&frame.data);
        }
        Self::new(first.width, first.height, frame_kind, delays_ms, data)
    }

    /// Test/debug accessor for one pixel of one frame.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }
}
