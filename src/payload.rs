//! Shared random payload.

use bytes::Bytes;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::params;

/// Random bytes sent by every flood of a round.
///
/// Generated once and never written again; clones and slices share the
/// same allocation, so concurrent floods read it without coordination.
#[derive(Debug, Clone)]
pub struct Payload {
    data: Bytes,
}

impl Payload {
    /// Fill a payload of `len` bytes from the OS-seeded RNG.
    pub fn random(len: usize) -> Self {
        let mut rng = StdRng::from_os_rng();
        let mut buf = vec![0u8; len];
        rng.fill_bytes(&mut buf);
        Payload { data: buf.into() }
    }

    /// A payload large enough for the default sweep.
    pub fn for_sweep() -> Self {
        Self::random(params::FINAL_MESSAGE_SIZE)
    }

    /// Length of the payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for a zero-length payload.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow `len` bytes starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range is outside the payload.
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// The first `size` bytes as an owned, reference-counted slice.
    pub fn prefix(&self, size: usize) -> Bytes {
        self.data.slice(..size)
    }
}
