// src/hash.rs

//! Content digests for package verification
//!
//! Packages are verified bit-for-bit against the catalog with SHA-256. The
//! [`DigestEngine`] trait is the seam the resolver hashes through, so tests
//! and other platforms can substitute their own primitive; [`Sha256Engine`]
//! is the streaming implementation used everywhere else.

use crate::error::{Error, Result};
use crate::progress::ProgressTracker;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

/// Digest length in bytes
pub const DIGEST_LEN: usize = 32;

/// Default block size for streaming reads (1 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// A 32-byte content digest
///
/// Serialized as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != DIGEST_LEN * 2 {
            return Err(Error::Catalog(format!(
                "invalid digest length: expected {}, got {}",
                DIGEST_LEN * 2,
                s.len()
            )));
        }
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::Catalog(format!("invalid hex in digest '{}': {}", s, e)))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Digest {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_hex()
    }
}

/// Streaming digest primitive
pub trait DigestEngine {
    /// Hash `reader` to the end, reporting bytes consumed after every block
    ///
    /// `progress` is called on the calling thread; its length is set to
    /// `len` before the first block.
    fn digest(
        &self,
        reader: &mut dyn Read,
        len: u64,
        progress: &dyn ProgressTracker,
    ) -> io::Result<Digest>;
}

/// SHA-256 over fixed-size blocks
#[derive(Debug, Clone, Copy)]
pub struct Sha256Engine {
    block_size: usize,
}

impl Sha256Engine {
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Use a specific read block size (clamped to at least one byte)
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl Default for Sha256Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestEngine for Sha256Engine {
    fn digest(
        &self,
        reader: &mut dyn Read,
        len: u64,
        progress: &dyn ProgressTracker,
    ) -> io::Result<Digest> {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.block_size];
        progress.set_length(len);

        loop {
            let n = read_block(reader, &mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            progress.increment(n as u64);
        }

        Ok(Digest(hasher.finalize().into()))
    }
}

/// Fill `buffer` as far as the reader allows; short only at end of stream
fn read_block(reader: &mut dyn Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// SHA-256 of a byte slice
pub fn sha256(data: &[u8]) -> Digest {
    Digest(Sha256::digest(data).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{CallbackProgress, ProgressEvent, SilentProgress};
    use std::io::Cursor;
    use std::sync::Mutex;

    #[test]
    fn test_sha256_known_value() {
        let digest = sha256(b"Hello, World!");
        assert_eq!(
            digest.to_hex(),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
    }

    #[test]
    fn test_engine_matches_one_shot() {
        let data = vec![0xA5u8; 10_000];
        let engine = Sha256Engine::with_block_size(1024);
        let streamed = engine
            .digest(&mut Cursor::new(&data), data.len() as u64, &SilentProgress::new())
            .unwrap();
        assert_eq!(streamed, sha256(&data));
    }

    #[test]
    fn test_engine_reports_every_block() {
        let data = vec![1u8; 2500];
        let engine = Sha256Engine::with_block_size(1000);
        let positions = Mutex::new(Vec::new());
        let progress = CallbackProgress::new(0, |event| {
            if let ProgressEvent::Position { current, total } = event {
                positions.lock().unwrap().push((current, total));
            }
        });

        engine
            .digest(&mut Cursor::new(&data), data.len() as u64, &progress)
            .unwrap();

        assert_eq!(
            *positions.lock().unwrap(),
            vec![(1000, 2500), (2000, 2500), (2500, 2500)]
        );
    }

    #[test]
    fn test_digest_hex_round_trip_and_validation() {
        let digest = sha256(b"abc");
        let parsed: Digest = digest.to_hex().parse().unwrap();
        assert_eq!(parsed, digest);

        assert!("abcd".parse::<Digest>().is_err());
        assert!("zz".repeat(32).parse::<Digest>().is_err());
    }

    #[test]
    fn test_one_byte_difference_changes_digest() {
        let mut data = b"firmware image".to_vec();
        let before = sha256(&data);
        data[3] ^= 0x01;
        assert_ne!(before, sha256(&data));
    }
}
