// SECTION: Value codec helpers (C5)

/// Hex-encodes `bytes` as lowercase, two digits per byte.
///
/// Binary payloads are never embedded directly in a SQL literal, only
/// their hex form, since the wire protocol has no bound-parameter channel.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Hex-decodes `s` back into bytes.
///
/// Rejects odd-length input and non-hex-digit characters rather than
/// silently truncating or substituting a default byte.
pub fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    for chunk in bytes.chunks(2) {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

/// Prefix-match an error string against a known SQL error phrase.
///
/// This is a true prefix test, not a substring search: `candidate` must
/// match the start of `error`. In practice rqlite's error strings always
/// begin with the phrase being matched (`"no such table: foo"`,
/// `"UNIQUE constraint failed: foo.key"`), so the distinction is moot for
/// real traffic (see `DESIGN.md` for the reasoning).
#[must_use]
pub fn match_error(error: &str, candidate: &str) -> bool {
    error.starts_with(candidate)
}

/// Known error phrase for a missing table, classified as
/// [`crate::StoreStatus::NotFound`].
pub const NO_SUCH_TABLE: &str = "no such table";

/// Known error phrase for a lost provisioning race, classified as
/// [`crate::StoreStatus::VersionMismatch`] (VCS) or
/// [`crate::StoreStatus::Failed`] (Epoch Store).
pub const UNIQUE_CONSTRAINT_FAILED: &str = "UNIQUE constraint failed";
