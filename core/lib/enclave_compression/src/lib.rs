pub mod brotli_codec;
pub mod cbor;
pub mod codec;

pub use codec::{batch_to_ext, ext_to_batch, ext_to_rollup, rollup_to_ext};
