//! Endpoint cache buffers
//!
//! The driver stages every IN packet in a buffer that it owns, and drains
//! every control OUT packet into one. Buffers are fixed size and reused;
//! nothing is allocated per transfer.

/// Capacity of each cache buffer, in bytes
///
/// Matches the 64 byte control endpoint bank.
pub const CACHE_LEN: usize = 64;

/// The number of endpoints, including the control endpoint
pub const ENDPOINT_COUNT: usize = 7;

/// A fixed-capacity byte buffer
pub struct Cache<const N: usize> {
    bytes: [u8; N],
    len: usize,
}

impl<const N: usize> Cache<N> {
    pub const fn new() -> Self {
        Cache {
            bytes: [0; N],
            len: 0,
        }
    }

    /// Copy `data` into the buffer
    ///
    /// Returns the number of bytes copied, which is clamped to the buffer
    /// capacity.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(N);
        self.bytes[..len].copy_from_slice(&data[..len]);
        self.len = len;
        len
    }

    /// Fill the buffer with at most `count` bytes produced by `byte`
    ///
    /// Returns the number of bytes produced, which is clamped to the buffer
    /// capacity.
    pub fn fill_with(&mut self, count: usize, mut byte: impl FnMut() -> u8) -> usize {
        let len = count.min(N);
        self.bytes[..len].iter_mut().for_each(|b| *b = byte());
        self.len = len;
        len
    }

    /// Returns the bytes placed by the last fill
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// All cache buffers for one USB peripheral
pub struct Caches {
    /// EP0 IN
    pub control: Cache<CACHE_LEN>,
    /// EP0 OUT
    pub control_out: Cache<CACHE_LEN>,
    /// IN buffers for all endpoints. Index 0 is unused; EP0 stages
    /// data in `control`.
    pub ep_in: [Cache<CACHE_LEN>; ENDPOINT_COUNT],
}

impl Caches {
    pub const fn new() -> Self {
        const CACHE: Cache<CACHE_LEN> = Cache::new();
        Caches {
            control: CACHE,
            control_out: CACHE,
            ep_in: [CACHE; ENDPOINT_COUNT],
        }
    }

    /// Returns the IN cache for `endpoint`
    ///
    /// Returns `None` if the endpoint doesn't exist.
    pub fn for_in(&mut self, endpoint: usize) -> Option<&mut Cache<CACHE_LEN>> {
        match endpoint {
            0 => Some(&mut self.control),
            _ => self.ep_in.get_mut(endpoint),
        }
    }
}
