//! Transport-safe embedding serialization.
//!
//! Embeddings travel and persist as base64 text over the little-endian
//! IEEE-754 bytes of each element, in order. The encoding is byte-exact:
//! `decode(encode(v)) == v` for every finite or non-finite double.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use crate::types::Embedding;

/// Bytes per embedding element (IEEE double).
const ELEMENT_BYTES: usize = std::mem::size_of::<f64>();

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("token is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("decoded payload is {len} bytes, not a multiple of the 8-byte element width")]
    TruncatedPayload { len: usize },
}

/// Encode an embedding into a base64 token.
pub fn encode(embedding: &Embedding) -> String {
    let mut bytes = Vec::with_capacity(embedding.len() * ELEMENT_BYTES);
    for value in &embedding.values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Decode a base64 token back into an embedding.
pub fn decode(token: &str) -> Result<Embedding, CodecError> {
    let bytes = STANDARD.decode(token)?;
    if bytes.len() % ELEMENT_BYTES != 0 {
        return Err(CodecError::TruncatedPayload { len: bytes.len() });
    }

    let values = bytes
        .chunks_exact(ELEMENT_BYTES)
        .map(|chunk| {
            let mut raw = [0u8; ELEMENT_BYTES];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    Ok(Embedding::new(values))
}
