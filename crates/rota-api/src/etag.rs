//! ETag computation for an effective day.
//!
//! ETags are SHA-256 hashes over each entry's composite key and serialised
//! fields, taken in composite-key order so row order never matters.

use rota_core::{entry::ScheduleEntry, normalize::Slot};
use sha2::{Digest, Sha256};

/// Compute an ETag for a day's effective entries.
///
/// Stable: same entries in any order → same ETag.
pub fn compute_etag(entries: &[ScheduleEntry]) -> String {
  let mut keyed: Vec<_> = entries.iter().map(|e| (e.composite_key(), e)).collect();
  keyed.sort_by(|a, b| a.0.cmp(&b.0));

  let mut hasher = Sha256::new();
  for (key, entry) in keyed {
    hasher.update(key.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(serde_json::to_vec(entry).unwrap_or_default());
    hasher.update([0]);
  }
  format!("\"{}\"", hex::encode(hasher.finalize()))
}
