//! Linux PPS character device ABI (`linux/pps.h`).
//!
//! The ioctl request numbers encode the size of a *pointer* to the
//! argument, not the argument itself, which is why they are built with
//! `size_of::<*mut T>()`.

use libc::c_int;
use std::mem::size_of;
use std::time::Duration;

/// API version written into `pps_kparams.api_version`.
pub const PPS_API_VERS: c_int = 1;

/// Timeout flag: ignore the timeout and wait forever.
pub const PPS_TIME_INVALID: u32 = 1 << 0;

/// `struct pps_ktime`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PpsKTime {
    /// Seconds.
    pub sec: i64,
    /// Nanoseconds.
    pub nsec: i32,
    /// `PPS_TIME_*` flags.
    pub flags: u32,
}

impl PpsKTime {
    /// Kernel timeout for a bounded wait.
    #[must_use]
    pub fn from_duration(duration: Duration) -> Self {
        #[allow(clippy::cast_possible_wrap)]
        let nsec = duration.subsec_nanos() as i32;
        Self {
            sec: i64::try_from(duration.as_secs()).unwrap_or(i64::MAX),
            nsec,
            flags: 0,
        }
    }
}

/// `struct pps_kinfo`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PpsKInfo {
    /// Assert event sequence number.
    pub assert_sequence: u32,
    /// Clear event sequence number.
    pub clear_sequence: u32,
    /// Time of the last assert event.
    pub assert_tu: PpsKTime,
    /// Time of the last clear event.
    pub clear_tu: PpsKTime,
    /// Current mode bits.
    pub current_mode: c_int,
}

/// `struct pps_kparams`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PpsKParams {
    /// API version (`PPS_API_VERS`).
    pub api_version: c_int,
    /// Mode bits.
    pub mode: c_int,
    /// Offset added to assert timestamps.
    pub assert_off_tu: PpsKTime,
    /// Offset added to clear timestamps.
    pub clear_off_tu: PpsKTime,
}

/// `struct pps_fdata`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PpsFData {
    /// Event information filled in by the kernel.
    pub info: PpsKInfo,
    /// How long to block.
    pub timeout: PpsKTime,
}

static_assertions::assert_eq_size!(PpsKTime, [u8; 16]);
static_assertions::assert_eq_size!(PpsKParams, [u8; 40]);
#[cfg(target_pointer_width = "64")]
static_assertions::assert_eq_size!(PpsFData, [u8; 64]);

nix::ioctl_read_bad!(
    /// `PPS_GETPARAMS`
    pps_getparams,
    nix::request_code_read!(b'p', 0xa1, size_of::<*mut PpsKParams>()),
    PpsKParams
);

nix::ioctl_write_ptr_bad!(
    /// `PPS_SETPARAMS`
    pps_setparams,
    nix::request_code_write!(b'p', 0xa2, size_of::<*mut PpsKParams>()),
    PpsKParams
);

nix::ioctl_read_bad!(
    /// `PPS_GETCAP`
    pps_getcap,
    nix::request_code_read!(b'p', 0xa3, size_of::<*mut c_int>()),
    c_int
);

nix::ioctl_readwrite_bad!(
    /// `PPS_FETCH`
    pps_fetch,
    nix::request_code_readwrite!(b'p', 0xa4, size_of::<*mut PpsFData>()),
    PpsFData
);
