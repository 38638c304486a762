//! Kernel PPS device (`/dev/ppsN`).
//!
//! Acquisition is the three-step RFC 2783 dance: open and verify the device,
//! read its capabilities, then switch on assert capture (with a zero assert
//! offset where the driver allows one). None of these steps are retried.

use crate::{Capabilities, PpsSource, PulseEvent};
use pps_common::error::{PpsError, PpsResult};
#[cfg(target_os = "linux")]
use std::path::PathBuf;
use std::path::Path;
use std::time::Duration;
use tracing::error;
#[cfg(target_os = "linux")]
use tracing::{debug, info};

/// Open, verify, and configure the PPS device at `path`.
///
/// # Errors
///
/// Returns the first setup error encountered.
pub fn acquire(path: &Path) -> PpsResult<PpsDevice> {
    let mut device = PpsDevice::open(path)?;
    let caps = device.query_capabilities()?;
    device.configure(caps)?;
    Ok(device)
}

/// Handle to an opened kernel PPS source.
#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct PpsDevice {
    file: std::fs::File,
    path: PathBuf,
    capabilities: Capabilities,
}

#[cfg(target_os = "linux")]
impl PpsDevice {
    /// Open the device read/write and check that it answers PPS ioctls.
    ///
    /// # Errors
    ///
    /// Returns [`PpsError::Open`] if the path cannot be opened or is not a
    /// PPS source.
    pub fn open(path: &Path) -> PpsResult<Self> {
        use crate::kernel::{pps_getparams, PpsKParams};
        use std::os::unix::io::AsRawFd;

        info!(path = %path.display(), "Trying PPS source");

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| {
                error!(path = %path.display(), error = %source, "Unable to open device");
                PpsError::Open {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        let mut params = PpsKParams::default();
        // SAFETY: fd is open for the lifetime of `file`, params is a valid PpsKParams.
        if let Err(errno) = unsafe { pps_getparams(file.as_raw_fd(), &mut params) } {
            error!(path = %path.display(), error = %errno, "Cannot create a PPS source from device");
            return Err(PpsError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::Error::from(errno).kind(),
                    format!("not a PPS source: {errno}"),
                ),
            });
        }

        info!(path = %path.display(), mode = params.mode, "Found PPS source");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            capabilities: Capabilities::empty(),
        })
    }

    /// Ask the driver which modes it supports.
    ///
    /// # Errors
    ///
    /// Returns [`PpsError::Capability`] if `PPS_GETCAP` fails.
    pub fn query_capabilities(&mut self) -> PpsResult<Capabilities> {
        use crate::kernel::pps_getcap;
        use std::os::unix::io::AsRawFd;

        let mut bits: libc::c_int = 0;
        // SAFETY: fd is valid, bits is a valid c_int.
        unsafe { pps_getcap(self.file.as_raw_fd(), &mut bits) }.map_err(|errno| {
            error!(error = %errno, "Cannot get capabilities");
            PpsError::Capability {
                source: errno.into(),
            }
        })?;

        self.capabilities = Capabilities::from_bits(bits);
        info!(capabilities = %self.capabilities, "PPS capabilities");
        Ok(self.capabilities)
    }

    /// Enable assert capture and clear any assert offset.
    ///
    /// # Errors
    ///
    /// Returns [`PpsError::MissingCapability`] if the source cannot capture
    /// assert edges, or [`PpsError::Configure`] if the parameters cannot be
    /// read back or applied.
    pub fn configure(&mut self, caps: Capabilities) -> PpsResult<()> {
        use crate::kernel::{pps_getparams, pps_setparams, PpsKParams, PpsKTime, PPS_API_VERS};
        use std::os::unix::io::AsRawFd;

        if !caps.contains(Capabilities::CAPTURE_ASSERT) {
            error!("Cannot CAPTUREASSERT");
            return Err(PpsError::MissingCapability {
                capability: "CAPTUREASSERT",
            });
        }

        let fd = self.file.as_raw_fd();
        let mut params = PpsKParams::default();
        // SAFETY: fd is valid, params is a valid PpsKParams.
        unsafe { pps_getparams(fd, &mut params) }.map_err(|errno| {
            error!(error = %errno, "Cannot get parameters");
            PpsError::Configure {
                source: errno.into(),
            }
        })?;

        params.api_version = PPS_API_VERS;
        params.mode |= Capabilities::CAPTURE_ASSERT.bits();
        if caps.contains(Capabilities::OFFSET_ASSERT) {
            params.mode |= Capabilities::OFFSET_ASSERT.bits();
            params.assert_off_tu = PpsKTime::default();
            debug!("Assert offset overridden to zero");
        }

        // SAFETY: fd is valid, params is a valid PpsKParams.
        unsafe { pps_setparams(fd, &params) }.map_err(|errno| {
            error!(error = %errno, "Cannot set parameters");
            PpsError::Configure {
                source: errno.into(),
            }
        })?;

        self.capabilities = caps;
        info!(path = %self.path.display(), mode = params.mode, "PPS source configured");
        Ok(())
    }

    /// Device path this handle was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(target_os = "linux")]
impl PpsSource for PpsDevice {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn fetch(&mut self, timeout: Duration) -> PpsResult<PulseEvent> {
        use crate::kernel::{pps_fetch, PpsFData, PpsKTime};
        use nix::errno::Errno;
        use pps_common::time::Timestamp;
        use std::os::unix::io::AsRawFd;

        let mut data = PpsFData {
            timeout: PpsKTime::from_duration(timeout),
            ..PpsFData::default()
        };

        // SAFETY: fd is valid, data is a valid PpsFData the kernel fills in.
        match unsafe { pps_fetch(self.file.as_raw_fd(), &mut data) } {
            Ok(_) => Ok(PulseEvent {
                timestamp: Timestamp::from_parts(
                    data.info.assert_tu.sec,
                    data.info.assert_tu.nsec,
                ),
                sequence: data.info.assert_sequence,
            }),
            Err(Errno::EINTR) => Err(PpsError::InterruptedFetch),
            Err(Errno::ETIMEDOUT) => Err(PpsError::FetchTimeout { timeout }),
            Err(errno) => Err(PpsError::Fetch {
                source: errno.into(),
            }),
        }
    }
}

/// Placeholder for non-Linux systems.
#[cfg(not(target_os = "linux"))]
#[derive(Debug)]
pub struct PpsDevice {
    _private: (),
}

#[cfg(not(target_os = "linux"))]
impl PpsDevice {
    /// Kernel PPS devices are not available on this platform.
    ///
    /// # Errors
    ///
    /// Always returns [`PpsError::Config`].
    pub fn open(path: &Path) -> PpsResult<Self> {
        error!(path = %path.display(), "Kernel PPS sources require Linux");
        Err(PpsError::Config(format!(
            "kernel PPS source {} not available on this platform",
            path.display()
        )))
    }

    /// Unreachable on non-Linux.
    ///
    /// # Errors
    ///
    /// Always returns [`PpsError::Config`].
    pub fn query_capabilities(&mut self) -> PpsResult<Capabilities> {
        Err(PpsError::Config("PPS not available on this platform".into()))
    }

    /// Unreachable on non-Linux.
    ///
    /// # Errors
    ///
    /// Always returns [`PpsError::Config`].
    pub fn configure(&mut self, _caps: Capabilities) -> PpsResult<()> {
        Err(PpsError::Config("PPS not available on this platform".into()))
    }
}

#[cfg(not(target_os = "linux"))]
impl PpsSource for PpsDevice {
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn fetch(&mut self, _timeout: Duration) -> PpsResult<PulseEvent> {
        Err(PpsError::Config("PPS not available on this platform".into()))
    }
}
