//! Blowfish stripe decryption for Deezer audio.
//!
//! Deezer serves `BF_CBC_STRIPE` streams: the audio is cut into 2048-byte
//! segments and every third segment (0, 3, 6, ...) is Blowfish-CBC encrypted
//! with a key derived from the track id. All other segments, and a trailing
//! partial segment, are plain.

use blowfish::Blowfish;
use bytes::{Bytes, BytesMut};
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, KeyInit};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use md5::{Digest, Md5};

use crate::error::{ProviderError, Result};

/// Deezer's secret key for Blowfish key derivation.
const SECRET_KEY: &[u8; 16] = b"g4el58wc0zvf9na1";

/// Blowfish initialization vector.
const BLOWFISH_IV: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

/// Size of one stripe segment.
pub const SEGMENT_SIZE: usize = 2048;

/// Blowfish cipher block size.
const BF_BLOCK_SIZE: usize = 8;

/// Compute MD5 hash of a string and return as hex string.
pub fn md5_hex(data: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive the Blowfish key for a track.
///
/// XOR of the two halves of the hex MD5 of the track id with the secret key.
pub fn blowfish_key(track_id: &str) -> [u8; 16] {
    let hash = md5_hex(track_id);
    let hash = hash.as_bytes();

    let mut key = [0u8; 16];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = hash[i] ^ hash[i + 16] ^ SECRET_KEY[i];
    }
    key
}

/// Whether the segment at `index` is encrypted.
pub fn is_encrypted_segment(index: u64) -> bool {
    index % 3 == 0
}

/// Decrypt one segment with Blowfish CBC and the fixed IV.
///
/// Trailing bytes that do not fill a cipher block are left untouched.
pub fn decrypt_chunk(data: &[u8], key: &[u8; 16]) -> Result<Vec<u8>> {
    let cipher: Blowfish<byteorder::BE> = Blowfish::new_from_slice(key)
        .map_err(|e| ProviderError::Crypto(format!("invalid Blowfish key: {}", e)))?;

    let mut result = data.to_vec();
    let mut prev_block = BLOWFISH_IV;

    for chunk in result.chunks_exact_mut(BF_BLOCK_SIZE) {
        let mut ciphertext = [0u8; BF_BLOCK_SIZE];
        ciphertext.copy_from_slice(chunk);

        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));

        for (byte, prev) in chunk.iter_mut().zip(prev_block.iter()) {
            *byte ^= prev;
        }
        prev_block = ciphertext;
    }

    Ok(result)
}

/// First segment to request when seeking to `seek_position` seconds.
///
/// Assumes constant bitrate: `floor(size / 2048 / duration) * seek_position`.
/// Returns 0 when size or duration is unknown. Saturates instead of
/// overflowing on out-of-range input.
pub fn seek_segment_index(size: u64, duration: u64, seek_position: u64) -> u64 {
    if size == 0 || duration == 0 {
        return 0;
    }
    (size / (SEGMENT_SIZE as u64).saturating_mul(duration)).saturating_mul(seek_position)
}

/// Byte offset of segment `index`.
pub fn segment_offset(index: u64) -> u64 {
    index.saturating_mul(SEGMENT_SIZE as u64)
}

struct StripeState {
    input: BoxStream<'static, Result<Bytes>>,
    buffer: BytesMut,
    index: u64,
    finished: bool,
}

/// Rechunk `input` into stripe segments and decrypt the encrypted ones.
///
/// `first_segment` is the index of the first segment in `input`, non-zero
/// when the download started at a byte offset. The concatenated output has
/// exactly the length of the input.
pub fn decrypt_stream<S, E>(
    input: S,
    key: [u8; 16],
    first_segment: u64,
) -> BoxStream<'static, Result<Bytes>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<ProviderError> + 'static,
{
    let state = StripeState {
        input: input.map(|chunk| chunk.map_err(Into::into)).boxed(),
        buffer: BytesMut::with_capacity(SEGMENT_SIZE * 2),
        index: first_segment,
        finished: false,
    };

    stream::try_unfold(state, move |mut state| async move {
        loop {
            if state.buffer.len() >= SEGMENT_SIZE {
                let segment = state.buffer.split_to(SEGMENT_SIZE);
                let out = if is_encrypted_segment(state.index) {
                    Bytes::from(decrypt_chunk(&segment, &key)?)
                } else {
                    segment.freeze()
                };
                state.index += 1;
                return Ok(Some((out, state)));
            }

            if state.finished {
                if state.buffer.is_empty() {
                    return Ok(None);
                }
                let rest = state.buffer.split().freeze();
                return Ok(Some((rest, state)));
            }

            match state.input.next().await {
                Some(chunk) => state.buffer.extend_from_slice(&chunk?),
                None => state.finished = true,
            }
        }
    })
    .boxed()
}

/// Encryption side of the stripe scheme, for building test fixtures.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use cipher::BlockEncrypt;

    pub fn encrypt_chunk(data: &[u8], key: &[u8; 16]) -> Vec<u8> {
        let cipher: Blowfish<byteorder::BE> = Blowfish::new_from_slice(key).unwrap();
        let mut result = data.to_vec();
        let mut prev = BLOWFISH_IV;
        for chunk in result.chunks_exact_mut(BF_BLOCK_SIZE) {
            for (byte, p) in chunk.iter_mut().zip(prev.iter()) {
                *byte ^= p;
            }
            cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
            prev.copy_from_slice(chunk);
        }
        result
    }

    pub fn sample_audio(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Encrypt like the CDN does: every third full segment.
    pub fn stripe_encrypt(plain: &[u8], key: &[u8; 16]) -> Vec<u8> {
        let mut out = Vec::with_capacity(plain.len());
        for (i, chunk) in plain.chunks(SEGMENT_SIZE).enumerate() {
            if chunk.len() == SEGMENT_SIZE && is_encrypted_segment(i as u64) {
                out.extend(encrypt_chunk(chunk, key));
            } else {
                out.extend_from_slice(chunk);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{encrypt_chunk, sample_audio, stripe_encrypt};
    use super::*;

    async fn collect(stream: BoxStream<'static, Result<Bytes>>) -> Vec<u8> {
        let parts: Vec<Bytes> = stream
            .map(|chunk| chunk.unwrap())
            .collect::<Vec<_>>()
            .await;
        parts.concat()
    }

    #[test]
    fn test_md5_hex() {
        assert_eq!(md5_hex("test"), "098f6bcd4621d373cade4e832627b4f6");
    }

    #[test]
    fn test_blowfish_key_is_deterministic() {
        let key = blowfish_key("3135556");
        assert_eq!(key, blowfish_key("3135556"));
        assert_ne!(key, blowfish_key("3135557"));
    }

    #[test]
    fn test_encrypted_segment_selection() {
        let encrypted: Vec<u64> = (0..10).filter(|i| is_encrypted_segment(*i)).collect();
        assert_eq!(encrypted, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_decrypt_chunk_inverts_encryption() {
        let key = blowfish_key("3135556");
        let plain = sample_audio(SEGMENT_SIZE);
        let encrypted = encrypt_chunk(&plain, &key);
        assert_ne!(encrypted, plain);
        assert_eq!(decrypt_chunk(&encrypted, &key).unwrap(), plain);
    }

    #[test]
    fn test_seek_segment_index() {
        // 320 kbps for 200 s
        let size = 8_000_000;
        assert_eq!(seek_segment_index(size, 200, 0), 0);
        assert_eq!(seek_segment_index(size, 200, 10), 19 * 10);
        assert_eq!(seek_segment_index(0, 200, 10), 0);
        assert_eq!(seek_segment_index(size, 0, 10), 0);
    }

    #[test]
    fn test_seek_saturates_on_huge_input() {
        assert_eq!(seek_segment_index(u64::MAX, 1, u64::MAX), u64::MAX);
        assert_eq!(seek_segment_index(1 << 40, u64::MAX, 10), 0);
        assert_eq!(segment_offset(u64::MAX), u64::MAX);
        assert_eq!(segment_offset(6), 12288);
    }

    #[tokio::test]
    async fn test_decrypt_stream_restores_audio_and_length() {
        let key = blowfish_key("42");
        let plain = sample_audio(SEGMENT_SIZE * 7 + 1000);
        let encrypted = stripe_encrypt(&plain, &key);

        // Uneven network chunks must not affect segment boundaries.
        let chunks: Vec<std::result::Result<Bytes, ProviderError>> = encrypted
            .chunks(777)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        let output = collect(decrypt_stream(stream::iter(chunks), key, 0)).await;

        assert_eq!(output.len(), plain.len());
        assert_eq!(output, plain);
    }

    #[tokio::test]
    async fn test_decrypt_stream_from_seek_offset() {
        let key = blowfish_key("42");
        let plain = sample_audio(SEGMENT_SIZE * 9);
        let encrypted = stripe_encrypt(&plain, &key);

        let start = 4;
        let tail = encrypted[start * SEGMENT_SIZE..].to_vec();
        let chunks = vec![Ok::<_, ProviderError>(Bytes::from(tail))];
        let output = collect(decrypt_stream(stream::iter(chunks), key, start as u64)).await;

        assert_eq!(output, plain[start * SEGMENT_SIZE..].to_vec());
    }

    #[tokio::test]
    async fn test_decrypt_stream_short_input_passes_through() {
        let key = blowfish_key("42");
        let data = sample_audio(100);
        let chunks = vec![Ok::<_, ProviderError>(Bytes::from(data.clone()))];
        let output = collect(decrypt_stream(stream::iter(chunks), key, 0)).await;
        assert_eq!(output, data);
    }

    #[tokio::test]
    async fn test_decrypt_stream_propagates_transport_error() {
        let key = blowfish_key("42");
        let chunks = vec![
            Ok(Bytes::from(vec![0u8; 10])),
            Err(ProviderError::Api("connection reset".into())),
        ];
        let results: Vec<Result<Bytes>> =
            decrypt_stream(stream::iter(chunks), key, 0).collect().await;
        assert!(matches!(results.last(), Some(Err(ProviderError::Api(_)))));
    }
}
