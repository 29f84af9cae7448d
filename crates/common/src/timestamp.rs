//! Hybrid-logical-clock timestamps.
//!
//! A timestamp packs a physical wall-clock reading in milliseconds into the
//! high bits and an 18-bit logical counter into the low bits. Gateways only
//! ever mint physical readings (logical part zero); the logical suffix
//! belongs to the cluster's timestamp oracle and is carried through opaquely.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Hybrid-logical-clock value used as a consistency barrier across nodes.
pub type Timestamp = u64;

/// The zero timestamp; used as "unset" for deadlines and guarantees.
pub const ZERO_TIMESTAMP: Timestamp = 0;

/// Number of low bits reserved for the logical counter.
pub const LOGICAL_BITS: u32 = 18;

const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;

/// Pack a physical millisecond reading and a logical counter into one value.
pub fn compose(physical_ms: u64, logical: u64) -> Timestamp {
    (physical_ms << LOGICAL_BITS) | (logical & LOGICAL_MASK)
}

/// Physical millisecond part of a timestamp.
pub fn physical_ms(ts: Timestamp) -> u64 {
    ts >> LOGICAL_BITS
}

/// Logical counter part of a timestamp.
pub fn logical(ts: Timestamp) -> u64 {
    ts & LOGICAL_MASK
}

/// Current wall-clock reading as a timestamp with a zero logical part.
pub fn now() -> Timestamp {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    compose(ms, 0)
}

/// Deadline timestamp for a caller-supplied timeout, measured from now.
pub fn deadline_after(timeout: Duration) -> Timestamp {
    let ms = physical_ms(now()).saturating_add(timeout.as_millis() as u64);
    compose(ms, 0)
}

/// Wall-clock time remaining until `deadline`.
///
/// Returns `None` for the zero timestamp (no deadline). A deadline already in
/// the past yields `Some(Duration::ZERO)` so callers can fail fast.
pub fn remaining_until(deadline: Timestamp) -> Option<Duration> {
    if deadline == ZERO_TIMESTAMP {
        return None;
    }
    let now_ms = physical_ms(now());
    let deadline_ms = physical_ms(deadline);
    Some(Duration::from_millis(deadline_ms.saturating_sub(now_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_roundtrips_physical_and_logical() {
        let ts = compose(1_690_000_000_123, 42);
        assert_eq!(physical_ms(ts), 1_690_000_000_123);
        assert_eq!(logical(ts), 42);
    }

    #[test]
    fn logical_part_is_masked() {
        let ts = compose(7, LOGICAL_MASK + 5);
        assert_eq!(physical_ms(ts), 7);
        assert_eq!(logical(ts), 4);
    }

    #[test]
    fn deadline_after_is_in_the_future() {
        let deadline = deadline_after(Duration::from_secs(5));
        let left = remaining_until(deadline).expect("deadline set");
        assert!(left <= Duration::from_secs(5));
        assert!(left >= Duration::from_secs(4));
    }

    #[test]
    fn zero_deadline_means_unbounded() {
        assert_eq!(remaining_until(ZERO_TIMESTAMP), None);
    }

    #[test]
    fn expired_deadline_reports_zero_remaining() {
        let past = compose(physical_ms(now()).saturating_sub(10_000), 0);
        assert_eq!(remaining_until(past), Some(Duration::ZERO));
    }
}
