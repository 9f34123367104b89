//! Domain errors

mod codec_error;

pub use codec_error::CodecError;
