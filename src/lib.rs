#![forbid(unsafe_code)]

pub mod blur_cpu;
pub mod cancel;
pub mod codec;
pub mod composite_cpu;
pub mod error;
pub mod meme;
pub mod morph;
pub mod raster;
pub mod slide;
pub mod stamp;
pub mod text;

pub use cancel::CancelToken;
pub use codec::{
    DecodeHints, Decoder, EncodeOptions, Encoder, FrameNormalizer, ImageCodec, Normalized,
    Normalizer, OutputFormat,
};
pub use error::{FxError, FxResult};
pub use meme::{MemeOutput, MemeParams, meme};
pub use raster::{FrameKind, RasterImage};
pub use slide::{SlideOutput, SlideParams, slide};
pub use stamp::{TextStamp, build_stamp};
pub use text::{FontSpec, SystemFontRenderer, TextLayer, TextRenderer};
