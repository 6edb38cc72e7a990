#![deny(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use sha2::{Digest, Sha256};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a fresh identifier for a mapping node.
///
/// The identifier is the first 16 bytes of a SHA-256 digest over a
/// process-wide counter, the current UTC timestamp and the process id,
/// rendered as lowercase hex (32 characters).
pub fn generate_identifier() -> String {
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(count.to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}
