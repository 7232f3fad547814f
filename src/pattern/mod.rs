/// Number of patterns driven through each port pair.
pub const PATTERN_COUNT: usize = 24;

/// The fixed pattern sequence, in the order it is driven:
/// solid and alternating bytes, walking 1s, walking 0s, then nibble and
/// bit-pair patterns.
pub fn test_patterns() -> Vec<u8> {
    let mut patterns = Vec::with_capacity(PATTERN_COUNT);

    patterns.extend_from_slice(&[0x00, 0xFF, 0xAA, 0x55]);
    patterns.extend((0..8).map(|bit| 1u8 << bit));
    patterns.extend((0..8).map(|bit| !(1u8 << bit)));
    patterns.extend_from_slice(&[0x0F, 0xF0, 0x33, 0xCC]);

    patterns
}
