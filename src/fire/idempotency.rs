//! Idempotency key derivation for fire submissions (spec §3 "Fire":
//! `idem_key` — client-supplied or derived as
//! `hash(user_id, signal_id, lot, ts_bucket)`).
//!
//! Deterministic across restarts (unlike `std::collections::hash`'s
//! randomly-seeded `DefaultHasher`), so a client retry after a process
//! restart still dedupes correctly. Plain FNV-1a rather than a crypto
//! hash — this key only needs to be a stable, collision-resistant
//! bucket id, not a security boundary.

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(input: &str) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in input.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Buckets the timestamp to the minute so rapid accidental double-clicks
/// within the same window dedupe, while a deliberate resubmission a
/// minute later gets a fresh key.
pub fn ts_bucket(now: chrono::DateTime<chrono::Utc>) -> i64 {
    now.timestamp() / 60
}

pub fn derive(user_id: &str, signal_id: Option<&str>, lot: f64, bucket: i64) -> String {
    let composite = format!("{}:{}:{}:{}", user_id, signal_id.unwrap_or(""), lot, bucket);
    format!("{:016x}", fnv1a(&composite))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_key() {
        let a = derive("42", Some("EG-1"), 0.1, 100);
        let b = derive("42", Some("EG-1"), 0.1, 100);
        assert_eq!(a, b);
    }

    #[test]
    fn different_bucket_different_key() {
        let a = derive("42", Some("EG-1"), 0.1, 100);
        let b = derive("42", Some("EG-1"), 0.1, 101);
        assert_ne!(a, b);
    }

    #[test]
    fn manual_fire_without_signal_id() {
        let key = derive("42", None, 0.5, 5);
        assert_eq!(key.len(), 16);
    }
}
