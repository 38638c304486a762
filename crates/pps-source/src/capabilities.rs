//! PPS capability and mode flags.
//!
//! Values follow the kernel's `linux/pps.h`, which in turn follows RFC 2783.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Set of capability/mode bits reported by `PPS_GETCAP` and used in `PPS_SETPARAMS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(i32);

impl Capabilities {
    /// Capture assert events.
    pub const CAPTURE_ASSERT: Self = Self(0x01);
    /// Capture clear events.
    pub const CAPTURE_CLEAR: Self = Self(0x02);
    /// Apply an offset to assert timestamps.
    pub const OFFSET_ASSERT: Self = Self(0x10);
    /// Apply an offset to clear timestamps.
    pub const OFFSET_CLEAR: Self = Self(0x20);
    /// Echo assert events on an output line.
    pub const ECHO_ASSERT: Self = Self(0x40);
    /// Echo clear events on an output line.
    pub const ECHO_CLEAR: Self = Self(0x80);
    /// Fetch can block until the next event.
    pub const CAN_WAIT: Self = Self(0x100);
    /// Source can be polled.
    pub const CAN_POLL: Self = Self(0x200);
    /// Timestamps in `timespec` format.
    pub const TSFMT_TSPEC: Self = Self(0x1000);
    /// Timestamps in NTP fixed-point format.
    pub const TSFMT_NTPFP: Self = Self(0x2000);

    const NAMES: [(Self, &'static str); 10] = [
        (Self::CAPTURE_ASSERT, "CAPTUREASSERT"),
        (Self::CAPTURE_CLEAR, "CAPTURECLEAR"),
        (Self::OFFSET_ASSERT, "OFFSETASSERT"),
        (Self::OFFSET_CLEAR, "OFFSETCLEAR"),
        (Self::ECHO_ASSERT, "ECHOASSERT"),
        (Self::ECHO_CLEAR, "ECHOCLEAR"),
        (Self::CAN_WAIT, "CANWAIT"),
        (Self::CAN_POLL, "CANPOLL"),
        (Self::TSFMT_TSPEC, "TSFMT_TSPEC"),
        (Self::TSFMT_NTPFP, "TSFMT_NTPFP"),
    ];

    /// No capabilities.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Wrap raw kernel bits.
    #[must_use]
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// Raw kernel bits.
    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// True if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Shorthand for [`Self::CAN_WAIT`].
    #[must_use]
    pub const fn can_wait(self) -> bool {
        self.contains(Self::CAN_WAIT)
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}
