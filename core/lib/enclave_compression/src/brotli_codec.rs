use std::io::{Cursor, Read, Write};

const QUALITY: i32 = 9;
const LG_WINDOW_SIZE: i32 = 22;

pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut reader = Cursor::new(data);
    brotli::BrotliCompress(
        &mut reader,
        &mut out,
        &brotli::enc::BrotliEncoderParams {
            quality: QUALITY,
            lgwin: LG_WINDOW_SIZE,
            ..Default::default()
        },
    )
    .expect("in-memory brotli compression cannot fail");
    out
}

pub fn decompress(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut decompressed = Vec::new();
    let mut decompressor = brotli::Decompressor::new(data, 4096);
    decompressor
        .read_to_end(&mut decompressed)
        .map_err(|e| anyhow::anyhow!("brotli decompression failed: {e}"))?;
    Ok(decompressed)
}
