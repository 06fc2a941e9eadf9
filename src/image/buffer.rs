//! Growable image buffer with positional little-endian writes.
//!
//! Sections reserve their full extent up front (zero-filled) and then fill
//! fields at offsets computed by their dry-run plan.

/// Image bytes under construction.
#[derive(Debug, Default)]
pub struct ImageBuf {
    bytes: Vec<u8>,
}

impl ImageBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length, which is also the offset the next section starts at.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append `len` zero bytes and return the offset of the first one.
    pub fn reserve(&mut self, len: usize) -> usize {
        let start = self.bytes.len();
        self.bytes.resize(start + len, 0);
        start
    }

    pub fn put_u16(&mut self, at: usize, value: u16) {
        self.put_bytes(at, &value.to_le_bytes());
    }

    pub fn put_u32(&mut self, at: usize, value: u32) {
        self.put_bytes(at, &value.to_le_bytes());
    }

    /// Overwrite already reserved bytes.
    ///
    /// Panics when the range was never reserved; that is a layout bug.
    pub fn put_bytes(&mut self, at: usize, data: &[u8]) {
        self.bytes[at..at + data.len()].copy_from_slice(data);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_is_zero_filled_and_monotonic() {
        let mut buf = ImageBuf::new();
        assert_eq!(buf.reserve(4), 0);
        assert_eq!(buf.reserve(8), 4);
        assert_eq!(buf.len(), 12);
        assert!(buf.as_slice().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_little_endian_writes() {
        let mut buf = ImageBuf::new();
        buf.reserve(6);
        buf.put_u16(0, 0x8000);
        buf.put_u32(2, 0x0030_000C);
        assert_eq!(buf.as_slice(), &[0x00, 0x80, 0x0C, 0x00, 0x30, 0x00]);
    }

    #[test]
    #[should_panic]
    fn test_write_outside_reservation_panics() {
        let mut buf = ImageBuf::new();
        buf.reserve(2);
        buf.put_u32(0, 1);
    }
}
