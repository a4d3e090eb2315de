use std::fmt;

/// Owned byte payload handed across the bridge boundary.
///
/// The protocol has no null buffer: "no payload" is the empty payload.
/// Ownership moves with the value, so release happens exactly once, on
/// drop, on every exit path.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Canonical empty payload. Allocates nothing.
    pub const fn empty() -> Self {
        Payload(Vec::new())
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Payload(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload(text.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::Payload;

    #[test]
    fn empty_allocates_nothing() {
        let empty = Payload::empty();
        assert_eq!(empty.0.capacity(), 0);
        assert!(empty.is_empty());
        drop(empty);
    }

    #[test]
    fn from_vec_keeps_exact_bytes() {
        let payload = Payload::from_vec(vec![0x01, 0x02, 0x03]);
        assert_eq!(payload.len(), 3);
        assert_eq!(payload.as_slice(), &[0x01, 0x02, 0x03]);
        assert_eq!(payload.into_vec(), vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn empty_equals_default() {
        assert_eq!(Payload::empty(), Payload::default());
        assert_eq!(Payload::empty(), Payload::from_vec(Vec::new()));
    }
}
