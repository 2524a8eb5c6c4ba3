/// Pluggable value serialization + optional compression for the
/// "object storage" surface (§4.4, §6).
///
/// The wire layout produced by `encode` is `[flag byte][payload]`, where bit
/// 0 of the flag byte indicates the payload is compressed; when set, the
/// payload itself is `[4-byte big-endian original length][lzf bytes]` so
/// `decode` can size the decompression buffer exactly rather than guessing a
/// compression ratio. This layout is internal to reef and is **not**
/// wire-interoperable with any other Redis
/// client's object-serialization format (see DESIGN.md, Open Question 1) —
/// a deployment that needs to interoperate with another client's stored
/// values should use [`RawCodec`], which never compresses and never adds the
/// flag byte distinction beyond "always raw".
use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

const FLAG_COMPRESSED: u8 = 0b0000_0001;

/// Encode/decode contract for opaque stored values.
pub trait ValueCodec: Send + Sync {
    fn encode(&self, value: &[u8]) -> Result<Bytes>;
    fn decode(&self, bytes: &[u8]) -> Result<Bytes>;
}

/// Always-raw codec: no flag byte, no compression. Use this when
/// interoperating with deployments that read the stored bytes directly
/// (e.g. from another client or from `redis-cli`).
pub struct RawCodec;

impl ValueCodec for RawCodec {
    fn encode(&self, value: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(value))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(bytes))
    }
}

/// Flag-byte + LZF-class compression codec. Payloads at or under
/// `threshold_bytes` are stored with the flag byte cleared and passed
/// through unchanged; larger payloads are compressed and the flag byte is
/// set, followed by the original (uncompressed) length as a 4-byte
/// big-endian `u32` so `decode` can size `lzf::decompress`'s output buffer
/// exactly rather than guessing a compression ratio.
pub struct CompressingCodec {
    threshold_bytes: usize,
}

impl CompressingCodec {
    pub fn new(threshold_bytes: usize) -> Self {
        CompressingCodec { threshold_bytes }
    }
}

impl Default for CompressingCodec {
    fn default() -> Self {
        CompressingCodec::new(16 * 1024)
    }
}

impl ValueCodec for CompressingCodec {
    fn encode(&self, value: &[u8]) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(value.len() + 5);

        if value.len() > self.threshold_bytes {
            match lzf::compress(value) {
                Ok(compressed) if compressed.len() < value.len() => {
                    out.extend_from_slice(&[FLAG_COMPRESSED]);
                    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
                    out.extend_from_slice(&compressed);
                    return Ok(out.freeze());
                }
                _ => {
                    // Incompressible payload (or lzf declined); fall through
                    // to storing it raw rather than paying the expansion.
                }
            }
        }

        out.extend_from_slice(&[0u8]);
        out.extend_from_slice(value);
        Ok(out.freeze())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Bytes> {
        let (flag, rest) = bytes
            .split_first()
            .ok_or_else(|| Error::unexpected("value codec payload missing flag byte"))?;

        if flag & FLAG_COMPRESSED != 0 {
            if rest.len() < 4 {
                return Err(Error::unexpected("value codec payload missing length header"));
            }
            let (len_bytes, payload) = rest.split_at(4);
            let original_len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
            let decompressed = lzf::decompress(payload, original_len)
                .map_err(|e| Error::unexpected(format!("lzf decompression failed: {:?}", e)))?;
            Ok(Bytes::from(decompressed))
        } else {
            Ok(Bytes::copy_from_slice(rest))
        }
    }
}
