// src/telemetry.rs
//! Tracing setup and log-safe fingerprints.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_FILTER: &str = "trust=info,warn";

/// Lowercase hex encoding of `bytes`.
pub fn hex_digest(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Short SHA-256 fingerprint (6 bytes, hex). Raw user text is never logged.
pub fn anon_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex_digest(&digest[..6])
}

/// Install a global subscriber: `RUST_LOG` filter (default [`DEFAULT_FILTER`]),
/// compact text output, or JSON lines when `TRUST_LOG_JSON=1`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("TRUST_LOG_JSON")
        .map(|v| v.trim() == "1" || v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anon_hash_is_short_and_stable() {
        let h = anon_hash("Can I get a refund after 90 days?");
        assert_eq!(h.len(), 12);
        assert_eq!(h, anon_hash("Can I get a refund after 90 days?"));
        assert_ne!(h, anon_hash("something else"));
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, hex_digest(&Sha256::digest(b"Can I get a refund after 90 days?")[..6]));
    }

    #[test]
    fn hex_digest_pads_each_byte() {
        assert_eq!(hex_digest(&[0x00, 0x0f, 0xa0, 0xff]), "000fa0ff");
        assert_eq!(hex_digest(&[]), "");
    }
}
