use sha2::{Digest, Sha256};
use std::io::Write;

/// Compute SHA256(SHA256(data))
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Compute SHA256(data)
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// HashWriter wraps a Sha256 hasher to implement Write trait
#[derive(Clone)]
pub struct HashWriter(Sha256);

impl HashWriter {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    /// Single SHA256 of everything written so far
    pub fn finalize(self) -> [u8; 32] {
        self.0.finalize().into()
    }

    /// SHA256(SHA256(..)) of everything written so far
    pub fn finalize_double(self) -> [u8; 32] {
        let first = self.0.finalize();
        Sha256::digest(first).into()
    }
}

impl Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Default for HashWriter {
    fn default() -> Self {
        Self::new()
    }
}
