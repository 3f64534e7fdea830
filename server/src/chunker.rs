//! Fixed offset chunking and content fingerprinting.
//!
//! Chunk boundaries are byte offsets only, so the same input always produces
//! the same chunk sequence and the same fingerprints. Deduplication across
//! files relies entirely on this determinism.

/// One chunk of a file: its position, its bytes and its content fingerprint.
pub struct Chunk<'a> {
    /// Zero based position of the chunk within the file
    pub order: usize,
    /// The chunk bytes, borrowed from the input
    pub data: &'a [u8],
    /// blake3 hex digest of `data`, the deduplication key
    pub fingerprint: String,
}

/// Splits byte sequences into fixed size chunks.
///
/// All chunks are exactly `chunk_size` bytes except the last one, which may
/// be shorter. Empty input yields no chunks at all.
#[derive(Clone, Copy)]
pub struct FixedChunker {
    chunk_size: usize,
}

impl FixedChunker {
    /// `chunk_size` must be positive, callers validate before chunking starts.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    pub fn split<'a>(&self, data: &'a [u8]) -> impl Iterator<Item = Chunk<'a>> + 'a {
        data.chunks(self.chunk_size)
            .enumerate()
            .map(|(order, data)| Chunk {
                order,
                data,
                fingerprint: fingerprint(data),
            })
    }
}

/// Content fingerprint of a byte block: lowercase blake3 hex digest.
///
/// Digest equality is treated as byte equality everywhere in the store, which
/// is only sound with a collision resistant hash.
#[must_use]
pub fn fingerprint(data: &[u8]) -> String {
    blake3::hash(data).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 4, 0)]
    #[case(1, 4, 1)]
    #[case(4, 4, 1)]
    #[case(5, 4, 2)]
    #[case(8, 4, 2)]
    #[case(9, 4, 3)]
    #[case(1, 1, 1)]
    #[case(10, 1024, 1)]
    #[trace]
    fn split_chunk_count(#[case] len: usize, #[case] chunk_size: usize, #[case] expected: usize) {
        // Arrange
        let data = vec![0xABu8; len];
        let chunker = FixedChunker::new(chunk_size);

        // Act
        let chunks: Vec<_> = chunker.split(&data).collect();

        // Assert
        assert_eq!(chunks.len(), expected);
    }

    #[test]
    fn split_sizes_and_order() {
        // Arrange
        let data = b"ABCDEFGHIJ"; // 10 bytes
        let chunker = FixedChunker::new(4);

        // Act
        let chunks: Vec<_> = chunker.split(data).collect();

        // Assert
        let orders: Vec<usize> = chunks.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(chunks[0].data, b"ABCD");
        assert_eq!(chunks[1].data, b"EFGH");
        assert_eq!(chunks[2].data, b"IJ");
    }

    #[test]
    fn split_is_deterministic() {
        // Arrange
        let data = b"the same input must always chunk the same way";
        let chunker = FixedChunker::new(8);

        // Act
        let first: Vec<String> = chunker.split(data).map(|c| c.fingerprint).collect();
        let second: Vec<String> = chunker.split(data).map(|c| c.fingerprint).collect();

        // Assert
        assert_eq!(first, second);
    }

    #[test]
    fn shared_prefix_shares_fingerprint() {
        // Arrange
        let chunker = FixedChunker::new(4);

        // Act
        let a: Vec<_> = chunker.split(b"ABCDEFGH").collect();
        let b: Vec<_> = chunker.split(b"ABCDXYZQ").collect();

        // Assert
        assert_eq!(a[0].fingerprint, b[0].fingerprint);
        assert_ne!(a[1].fingerprint, b[1].fingerprint);
    }

    #[test]
    fn fingerprint_is_hex_of_fixed_length() {
        // Arrange

        // Act
        let digest = fingerprint(b"ABCD");

        // Assert
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_differs_for_different_blocks() {
        // Arrange

        // Act
        let first = fingerprint(b"ABCD");
        let second = fingerprint(b"ABCE");

        // Assert
        assert_ne!(first, second);
    }
}
