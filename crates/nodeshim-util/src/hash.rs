/// Compute a BLAKE3 digest over an ordered list of string parts.
///
/// Each part is length-prefixed, so `["ab", "c"]` and `["a", "bc"]` produce
/// different keys.
#[must_use]
pub fn blake3_key<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        let bytes = part.as_ref().as_bytes();
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hasher.finalize().to_hex().to_string()
}
