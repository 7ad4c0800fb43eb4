//! Opaque invalidation tokens and version fingerprints.

use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A fresh salt. Uniqueness is all that matters, not secrecy.
pub(crate) fn new_salt(now_millis: i64) -> String {
    let mut bytes = [0u8; 8];
    match getrandom::fill(&mut bytes) {
        Ok(()) => to_hex(&bytes),
        Err(error) => {
            tracing::warn!(%error, "no OS randomness for salt; using a time-based token");
            let n = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("{now_millis:x}{n:04x}")
        }
    }
}

/// SHA-256 hex over `parts`, each terminated by a NUL so that
/// `["ab", "c"]` and `["a", "bc"]` differ.
pub(crate) fn fingerprint<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    to_hex(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salts_differ() {
        assert_ne!(new_salt(1), new_salt(1));
        assert_eq!(new_salt(1).len(), 16);
    }

    #[test]
    fn fingerprint_separates_parts() {
        assert_ne!(fingerprint(["ab", "c"]), fingerprint(["a", "bc"]));
        assert_eq!(fingerprint(["x"]), fingerprint(["x"]));
        assert_eq!(fingerprint(["x"]).len(), 64);
    }
}
