//! Binary formats for embedding artifacts.
//!
//! Every format is little-endian and starts with a four-byte magic, a `u32`
//! format version and the `u64` extraction-profile stamp.
//!
//! ```text
//! cache entry  (TMBE): magic | version | stamp | dim:u32 | dim x f32
//! index matrix (TMBI): magic | version | stamp | dim:u32 | count:u32 | count x dim x f32
//! ```

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

pub const EMBEDDING_MAGIC: [u8; 4] = *b"TMBE";
pub const INDEX_MAGIC: [u8; 4] = *b"TMBI";
pub const FORMAT_VERSION: u32 = 1;

/// A decoded cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEmbedding {
    pub stamp: u64,
    pub values: Vec<f32>,
}

/// A decoded index matrix, rows stored contiguously.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMatrix {
    pub stamp: u64,
    pub dim: usize,
    pub count: usize,
    pub data: Vec<f32>,
}

pub fn encode_embedding(stamp: u64, values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(20 + values.len() * 4);
    out.extend_from_slice(&EMBEDDING_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&stamp.to_le_bytes());
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_embedding(path: &Path, bytes: &[u8]) -> Result<StoredEmbedding> {
    let mut reader = ByteReader::new(path, bytes);
    let stamp = reader.header(EMBEDDING_MAGIC)?;
    let dim = reader.u32()? as usize;
    let values = reader.f32s(dim)?;
    reader.finish()?;
    Ok(StoredEmbedding { stamp, values })
}

/// Encode `data.len() / dim` rows of width `dim`.
pub fn encode_matrix(stamp: u64, dim: usize, data: &[f32]) -> Result<Vec<u8>> {
    if dim == 0 || data.len() % dim != 0 {
        return Err(Error::Internal(format!(
            "matrix of {} values is not a whole number of {dim}-wide rows",
            data.len()
        )));
    }
    let count = data.len() / dim;
    let mut out = Vec::with_capacity(24 + data.len() * 4);
    out.extend_from_slice(&INDEX_MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&stamp.to_le_bytes());
    out.extend_from_slice(&(dim as u32).to_le_bytes());
    out.extend_from_slice(&(count as u32).to_le_bytes());
    for value in data {
        out.extend_from_slice(&value.to_le_bytes());
    }
    Ok(out)
}

pub fn decode_matrix(path: &Path, bytes: &[u8]) -> Result<StoredMatrix> {
    let mut reader = ByteReader::new(path, bytes);
    let stamp = reader.header(INDEX_MAGIC)?;
    let dim = reader.u32()? as usize;
    let count = reader.u32()? as usize;
    let len = dim
        .checked_mul(count)
        .ok_or_else(|| Error::corrupt(path, "row count overflows"))?;
    let data = reader.f32s(len)?;
    reader.finish()?;
    Ok(StoredMatrix {
        stamp,
        dim,
        count,
        data,
    })
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `bytes` to `path` through a sibling temporary file and a rename, so
/// readers see either the old or the new content, never a partial file.
///
/// Creates the parent directory when it does not exist.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("not a file path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(
        ".{}.tmp-{}-{}",
        file_name.to_string_lossy(),
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp)?;
        std::io::Write::write_all(&mut file, bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if result.is_err() {
        if let Err(e) = fs::remove_file(&tmp) {
            log::debug!("Could not remove temp file {}: {}", tmp.display(), e);
        }
    }
    result
}

struct ByteReader<'a> {
    path: &'a Path,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(path: &'a Path, bytes: &'a [u8]) -> Self {
        Self { path, bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::corrupt(self.path, "unexpected end of data"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Checks magic and format version, returns the profile stamp.
    fn header(&mut self, magic: [u8; 4]) -> Result<u64> {
        if self.array::<4>()? != magic {
            return Err(Error::corrupt(self.path, "bad magic"));
        }
        let version = self.u32()?;
        if version != FORMAT_VERSION {
            return Err(Error::corrupt(
                self.path,
                format!("unsupported format version {version}"),
            ));
        }
        self.u64()
    }

    fn f32s(&mut self, n: usize) -> Result<Vec<f32>> {
        let len = n
            .checked_mul(4)
            .ok_or_else(|| Error::corrupt(self.path, "length overflows"))?;
        Ok(self
            .take(len)?
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(Error::corrupt(
                self.path,
                format!("{} trailing bytes", self.bytes.len() - self.pos),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_embedding_roundtrip_preserves_bits() {
        let values = vec![0.1_f32, -2.5, f32::MIN_POSITIVE, 1e30];
        let bytes = encode_embedding(42, &values);
        let decoded = decode_embedding(Path::new("x.emb"), &bytes).unwrap();
        assert_eq!(decoded.stamp, 42);
        let bits: Vec<u32> = decoded.values.iter().map(|v| v.to_bits()).collect();
        let expected: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, expected);
    }

    #[test]
    fn test_truncated_embedding_is_corrupt() {
        let bytes = encode_embedding(7, &[1.0, 2.0, 3.0]);
        let err = decode_embedding(Path::new("x.emb"), &bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn test_matrix_rejects_wrong_magic() {
        let bytes = encode_embedding(7, &[1.0]);
        let err = decode_matrix(Path::new("index.bin"), &bytes).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_matrix_shape() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let bytes = encode_matrix(9, 3, &data).unwrap();
        let matrix = decode_matrix(Path::new("index.bin"), &bytes).unwrap();
        assert_eq!(matrix.dim, 3);
        assert_eq!(matrix.count, 2);
        assert_eq!(matrix.data, data);
        assert!(encode_matrix(9, 4, &data).is_err());
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("file.bin");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1, "temporary files must not be left behind");
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
