//! AES-256-GCM sealing of object payloads.
//!
//! Objects at rest are opaque sealed payloads: `nonce || ciphertext`, where
//! the ciphertext carries the GCM authentication tag. Decryption verifies the
//! tag; a tampered payload or wrong key is a hard failure, never silently
//! corrupted plaintext.

use aes_gcm::{Aes256Gcm, KeyInit, Nonce, aead::Aead};
use rand::{RngCore, rngs::OsRng};
use std::io::{self, ErrorKind};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// Plaintext chunk size for the streaming variant.
const STREAM_CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption key must be {KEY_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("sealed payload shorter than the {NONCE_SIZE}-byte nonce prefix")]
    TruncatedPayload,
    #[error("sealed payload failed authentication")]
    Authentication,
    #[error("encryption failed")]
    Encrypt,
    #[error("malformed chunk framing in sealed stream")]
    MalformedFrame,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Symmetric encryption of object payloads under a single static key.
///
/// The key comes from configuration; there is no rotation or per-object key
/// derivation.
#[derive(Clone)]
pub struct CryptoStore {
    cipher: Aes256Gcm,
}

impl CryptoStore {
    /// Build a store from raw key material. Fails unless the key is exactly
    /// [`KEY_SIZE`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` under a fresh random nonce and return
    /// `nonce || ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = fresh_nonce();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Split the leading nonce off `sealed` and decrypt the remainder.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_SIZE {
            return Err(CryptoError::TruncatedPayload);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Authentication)
    }

    /// Encrypt a stream as a sequence of independently sealed chunks.
    ///
    /// Every chunk gets its own fresh nonce; framing on the wire is
    /// `nonce || u32-be ciphertext length || ciphertext` per chunk. Returns
    /// the number of plaintext bytes consumed.
    pub async fn seal_stream<R, W>(&self, mut reader: R, mut writer: W) -> Result<u64, CryptoError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let mut total: u64 = 0;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            total += n as u64;

            let nonce = fresh_nonce();
            let ciphertext = self
                .cipher
                .encrypt(Nonce::from_slice(&nonce), &buf[..n])
                .map_err(|_| CryptoError::Encrypt)?;

            writer.write_all(&nonce).await?;
            writer.write_all(&(ciphertext.len() as u32).to_be_bytes()).await?;
            writer.write_all(&ciphertext).await?;
        }
        writer.flush().await?;
        Ok(total)
    }

    /// Decrypt a stream produced by [`seal_stream`](Self::seal_stream).
    /// Returns the number of plaintext bytes recovered.
    pub async fn open_stream<R, W>(&self, mut reader: R, mut writer: W) -> Result<u64, CryptoError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut total: u64 = 0;
        loop {
            let mut nonce = [0u8; NONCE_SIZE];
            if !read_exact_or_eof(&mut reader, &mut nonce).await? {
                break;
            }

            let mut len_buf = [0u8; 4];
            reader
                .read_exact(&mut len_buf)
                .await
                .map_err(frame_error)?;
            let mut ciphertext = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            reader
                .read_exact(&mut ciphertext)
                .await
                .map_err(frame_error)?;

            let plaintext = self
                .cipher
                .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
                .map_err(|_| CryptoError::Authentication)?;
            total += plaintext.len() as u64;
            writer.write_all(&plaintext).await?;
        }
        writer.flush().await?;
        Ok(total)
    }
}

fn fresh_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Fill `buf` completely, distinguishing a clean end-of-stream (Ok(false))
/// from a frame cut off mid-nonce.
async fn read_exact_or_eof<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<bool, CryptoError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(CryptoError::MalformedFrame);
        }
        filled += n;
    }
    Ok(true)
}

fn frame_error(err: io::Error) -> CryptoError {
    if err.kind() == ErrorKind::UnexpectedEof {
        CryptoError::MalformedFrame
    } else {
        CryptoError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CryptoStore {
        CryptoStore::new(&[7u8; KEY_SIZE]).unwrap()
    }

    #[test]
    fn rejects_bad_key_length() {
        assert!(matches!(
            CryptoStore::new(&[0u8; 16]),
            Err(CryptoError::InvalidKeyLength(16))
        ));
    }

    #[test]
    fn seal_open_round_trip() {
        let store = store();
        let sealed = store.seal(b"hello world").unwrap();
        assert_eq!(store.open(&sealed).unwrap(), b"hello world");
    }

    #[test]
    fn sealed_payloads_differ_per_call() {
        let store = store();
        let a = store.seal(b"same input").unwrap();
        let b = store.seal(b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let store = store();
        let mut sealed = store.seal(b"sensitive").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(store.open(&sealed), Err(CryptoError::Authentication)));
    }

    #[test]
    fn tampered_nonce_fails_authentication() {
        let store = store();
        let mut sealed = store.seal(b"sensitive").unwrap();
        sealed[0] ^= 0x80;
        assert!(matches!(store.open(&sealed), Err(CryptoError::Authentication)));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = store().seal(b"sensitive").unwrap();
        let other = CryptoStore::new(&[8u8; KEY_SIZE]).unwrap();
        assert!(matches!(other.open(&sealed), Err(CryptoError::Authentication)));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let store = store();
        assert!(matches!(
            store.open(&[0u8; NONCE_SIZE - 1]),
            Err(CryptoError::TruncatedPayload)
        ));
    }

    #[tokio::test]
    async fn stream_round_trip() {
        let store = store();
        let plaintext: Vec<u8> = (0..3 * STREAM_CHUNK_SIZE / 2).map(|i| i as u8).collect();

        let mut sealed = Vec::new();
        let written = store
            .seal_stream(plaintext.as_slice(), &mut sealed)
            .await
            .unwrap();
        assert_eq!(written, plaintext.len() as u64);

        let mut recovered = Vec::new();
        let read = store
            .open_stream(sealed.as_slice(), &mut recovered)
            .await
            .unwrap();
        assert_eq!(read, plaintext.len() as u64);
        assert_eq!(recovered, plaintext);
    }

    #[tokio::test]
    async fn stream_uses_a_fresh_nonce_per_chunk() {
        let store = store();
        let plaintext = vec![0u8; 2 * STREAM_CHUNK_SIZE];

        let mut sealed = Vec::new();
        store
            .seal_stream(plaintext.as_slice(), &mut sealed)
            .await
            .unwrap();

        let first_nonce = &sealed[..NONCE_SIZE];
        let first_len =
            u32::from_be_bytes(sealed[NONCE_SIZE..NONCE_SIZE + 4].try_into().unwrap()) as usize;
        let second_frame = NONCE_SIZE + 4 + first_len;
        let second_nonce = &sealed[second_frame..second_frame + NONCE_SIZE];
        assert_ne!(first_nonce, second_nonce);
    }

    #[tokio::test]
    async fn tampered_stream_chunk_fails() {
        let store = store();
        let mut sealed = Vec::new();
        store
            .seal_stream(&b"chunked secret"[..], &mut sealed)
            .await
            .unwrap();
        let mid = sealed.len() / 2;
        sealed[mid] ^= 0x01;

        let mut recovered = Vec::new();
        let result = store.open_stream(sealed.as_slice(), &mut recovered).await;
        assert!(matches!(
            result,
            Err(CryptoError::Authentication) | Err(CryptoError::MalformedFrame)
        ));
    }

    #[tokio::test]
    async fn truncated_stream_frame_is_rejected() {
        let store = store();
        let mut sealed = Vec::new();
        store
            .seal_stream(&b"chunked secret"[..], &mut sealed)
            .await
            .unwrap();
        sealed.truncate(sealed.len() - 3);

        let mut recovered = Vec::new();
        let result = store.open_stream(sealed.as_slice(), &mut recovered).await;
        assert!(matches!(result, Err(CryptoError::MalformedFrame)));
    }
}
