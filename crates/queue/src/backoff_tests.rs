// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    first = { 1, 1_000 },
    second = { 2, 2_000 },
    third = { 3, 4_000 },
    fourth = { 4, 8_000 },
    capped = { 10, 60_000 },
)]
fn doubles_until_cap(attempt: u32, expected_ms: u64) {
    let backoff = Backoff::new(1_000, 60_000);
    assert_eq!(backoff.delay_for_attempt(attempt), expected_ms);
}

#[test]
fn zero_attempt_treated_as_first() {
    let backoff = Backoff::new(1_000, 60_000);
    assert_eq!(backoff.delay_for_attempt(0), 1_000);
}

#[test]
fn huge_attempt_does_not_overflow() {
    let backoff = Backoff::new(u64::MAX / 2, u64::MAX);
    assert_eq!(backoff.delay_for_attempt(u32::MAX), u64::MAX);
}

proptest::proptest! {
    /// The schedule never exceeds the cap and never shrinks as the
    /// attempt count grows.
    #[test]
    fn capped_and_monotonic(base_ms in 1u64..10_000, max_ms in 1u64..10_000_000, attempt in 1u32..64) {
        let backoff = Backoff::new(base_ms, max_ms);
        let delay = backoff.delay_for_attempt(attempt);
        proptest::prop_assert!(delay <= max_ms);
        proptest::prop_assert!(delay >= backoff.delay_for_attempt(attempt - 1));
    }
}
