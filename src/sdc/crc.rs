use crc32fast::Hasher;

/// Seed for a fresh CRC computation.
pub(crate) const CRC32_START_VALUE: u32 = 0xFFFF_FFFF;

/// Computes the reflected IEEE CRC-32 (polynomial `0xEDB88320`) of `buf`.
///
/// `start` is the running value: [`CRC32_START_VALUE`] for a fresh
/// computation, the previous result when chaining over multiple chunks. When
/// `invert` is set the running value is XORed with all-ones at the end;
/// incremental callers set it only on the final chunk.
pub(crate) fn crc32(buf: &[u8], start: u32, invert: bool) -> u32 {
    // crc32fast keeps its state pre-inverted relative to the raw shift
    // register and folds the final XOR into finalize(), hence the two
    // complements bridging the conventions.
    let mut hasher = Hasher::new_with_initial(!start);
    hasher.update(buf);
    let crc = hasher.finalize();
    if invert {
        crc
    } else {
        !crc
    }
}
