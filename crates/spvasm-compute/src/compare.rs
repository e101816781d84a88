//! Byte comparison of read-back output buffers.

/// Returns true if the leading `expected.len()` bytes of `actual` equal `expected`.
pub fn outputs_match(expected: &[u8], actual: &[u8]) -> bool {
    actual.get(..expected.len()) == Some(expected)
}

/// Index of the first output whose device contents differ from what was expected.
pub fn first_mismatch<E, A>(expected: &[E], actual: &[A]) -> Option<usize>
where
    E: AsRef<[u8]>,
    A: AsRef<[u8]>,
{
    if actual.len() < expected.len() {
        return Some(actual.len());
    }
    expected
        .iter()
        .zip(actual)
        .position(|(e, a)| !outputs_match(e.as_ref(), a.as_ref()))
}
