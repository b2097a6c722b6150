//! Raw-frame conversion and the encoder process contract.

pub mod ffmpeg;
pub mod frame;

pub use ffmpeg::EncoderProfile;
pub use frame::RgbFrame;
