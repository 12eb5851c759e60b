//! SHA256d, the doubled SHA-256 hash Bitcoin uses everywhere.

use std::{fmt, io};

use sha2::{Digest, Sha256};

/// Compute SHA256(SHA256(data)).
pub fn double(data: &[u8]) -> [u8; 32] {
    let once = Sha256::digest(data);
    let twice = Sha256::digest(&once);
    twice.into()
}

/// An `io::Write` sink that computes the SHA256d of everything written to
/// it, so structures can hash themselves through their serialization impl
/// without an intermediate buffer.
#[derive(Default)]
pub struct Writer {
    hash: Sha256,
}

impl Writer {
    /// Consume the writer and return its hash.
    pub fn finish(self) -> [u8; 32] {
        let first = self.hash.finalize();
        let second = Sha256::digest(&first);
        second.into()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hash.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The first four bytes of a SHA256d digest, used as the frame checksum in
/// message headers.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Checksum(pub [u8; 4]);

impl<'a> From<&'a [u8]> for Checksum {
    fn from(bytes: &'a [u8]) -> Self {
        let digest = double(bytes);
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&digest[0..4]);
        Self(checksum)
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Checksum")
            .field(&hex::encode(&self.0))
            .finish()
    }
}
