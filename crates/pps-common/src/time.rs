//! Fixed-point timestamps for PPS events.
//!
//! Kernel PPS timestamps carry whole seconds plus nanoseconds. They are
//! kept in that form and only converted to floating point once a delta
//! has been taken, so no precision is lost across long runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A point in time with second and nanosecond components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    sec: i64,
    nsec: u32,
}

impl Timestamp {
    /// Create a timestamp, carrying excess nanoseconds into the seconds field.
    #[must_use]
    pub fn new(sec: i64, nsec: u32) -> Self {
        let carry = i64::from(nsec) / NANOS_PER_SEC;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nsec = (i64::from(nsec) % NANOS_PER_SEC) as u32;
        Self {
            sec: sec.saturating_add(carry),
            nsec,
        }
    }

    /// Build a timestamp from a kernel `(sec, nsec)` pair where `nsec` is signed.
    ///
    /// Negative nanoseconds borrow from the seconds field.
    #[must_use]
    pub fn from_parts(sec: i64, nsec: i32) -> Self {
        let total = i64::from(nsec);
        let sec = sec.saturating_add(total.div_euclid(NANOS_PER_SEC));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nsec = total.rem_euclid(NANOS_PER_SEC) as u32;
        Self { sec, nsec }
    }

    /// Timestamp expressed as nanoseconds since the epoch of its clock.
    #[must_use]
    pub fn from_nanos(nanos: i64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nsec = nanos.rem_euclid(NANOS_PER_SEC) as u32;
        Self {
            sec: nanos.div_euclid(NANOS_PER_SEC),
            nsec,
        }
    }

    /// Whole seconds.
    #[must_use]
    pub fn sec(&self) -> i64 {
        self.sec
    }

    /// Nanoseconds within the second.
    #[must_use]
    pub fn nsec(&self) -> u32 {
        self.nsec
    }

    /// Signed nanoseconds from `earlier` to `self`, saturating on overflow.
    #[must_use]
    pub fn nanos_since(&self, earlier: Timestamp) -> i64 {
        let secs = self.sec.saturating_sub(earlier.sec);
        let nanos = i64::from(self.nsec) - i64::from(earlier.nsec);
        secs.saturating_mul(NANOS_PER_SEC).saturating_add(nanos)
    }
}

impl Sub for Timestamp {
    type Output = i64;

    fn sub(self, rhs: Timestamp) -> i64 {
        self.nanos_since(rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtraction_is_signed() {
        let a = Timestamp::new(10, 500);
        let b = Timestamp::new(11, 0);
        assert_eq!(b - a, 999_999_500);
        assert_eq!(a - b, -999_999_500);
        assert_eq!(a - a, 0);
    }

    #[test]
    fn test_nanosecond_carry() {
        let ts = Timestamp::new(1, 1_500_000_000);
        assert_eq!(ts.sec(), 2);
        assert_eq!(ts.nsec(), 500_000_000);
    }

    #[test]
    fn test_from_parts_borrows_negative_nanos() {
        let ts = Timestamp::from_parts(5, -1);
        assert_eq!(ts.sec(), 4);
        assert_eq!(ts.nsec(), 999_999_999);
    }

    #[test]
    fn test_from_nanos() {
        let ts = Timestamp::from_nanos(1_000_010_000);
        assert_eq!(ts, Timestamp::new(1, 10_000));
        assert_eq!(Timestamp::from_nanos(-1), Timestamp::new(-1, 999_999_999));
    }

    #[test]
    fn test_display() {
        assert_eq!(Timestamp::new(3, 42).to_string(), "3.000000042");
    }

    #[test]
    fn test_large_span_saturates() {
        let a = Timestamp::new(i64::MIN, 0);
        let b = Timestamp::new(i64::MAX, 0);
        assert_eq!(b - a, i64::MAX);
    }
}
