//! Device control surface abstraction.
//!
//! Defines the traits the tuner core drives, allowing different
//! implementations (Linux DVB chardevs, mock, etc.).

use std::time::Duration;

use thiserror::Error;

use super::types::{
    DeliverySystem, FilterFlags, FrontendEvent, FrontendInfo, FrontendStatus,
    LegacyTuneParameters, PesType, PropertyValue,
};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("failed to open device: {0}")]
    OpenFailed(String),

    #[error("operation not supported by this device: {0}")]
    Unsupported(&'static str),

    #[error("device rejected command: {0}")]
    Rejected(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("poll failed: {0}")]
    PollFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of raw device handles. Ownership transfers to the core on
/// success; the core sets non-blocking mode on every handle it obtains.
pub trait ResourceProvider: Send + Sync {
    fn open_frontend(&self) -> Result<Box<dyn FrontendDevice>, DeviceError>;
    fn open_demux(&self) -> Result<Box<dyn DemuxDevice>, DeviceError>;
    fn open_dvr(&self) -> Result<Box<dyn DvrDevice>, DeviceError>;
}

/// RF demodulator control surface.
///
/// The two tuning dialects are separate entry points; which one a given
/// frontend honors is decided by probing `enumerate_delivery_systems`
/// once per handle.
pub trait FrontendDevice: Send {
    /// Capability query. Frontends predating the typed-property dialect
    /// fail this call, which the probe treats as a v3 verdict.
    fn enumerate_delivery_systems(&self) -> Result<Vec<DeliverySystem>, DeviceError>;

    /// Batched typed property write, terminated by the commit token.
    fn set_properties(&self, props: &[PropertyValue]) -> Result<(), DeviceError>;

    /// Legacy single-struct tune submission.
    fn set_legacy_parameters(&self, params: &LegacyTuneParameters) -> Result<(), DeviceError>;

    /// Static device description (legacy dialect).
    fn device_info(&self) -> Result<FrontendInfo, DeviceError>;

    /// Direct lock-status query (property dialect).
    fn read_status(&self) -> Result<FrontendStatus, DeviceError>;

    /// Bounded wait for the next frontend event (legacy dialect).
    /// `Ok(None)` means the sub-timeout elapsed with no event pending.
    fn poll_event(&self, timeout: Duration) -> Result<Option<FrontendEvent>, DeviceError>;

    /// Currently configured delivery system (property dialect).
    fn current_delivery_system(&self) -> Result<DeliverySystem, DeviceError>;

    fn set_nonblocking(&self, nonblocking: bool) -> Result<(), DeviceError>;
}

/// One demux filter handle. Dropping the handle closes the filter.
pub trait DemuxDevice: Send {
    fn configure_pes_filter(
        &self,
        pid: u16,
        pes_type: PesType,
        flags: FilterFlags,
    ) -> Result<(), DeviceError>;

    /// Explicit start, required by the newer demux generation; the older
    /// one starts on configure when immediate start is requested.
    fn start(&self) -> Result<(), DeviceError>;

    fn set_nonblocking(&self, nonblocking: bool) -> Result<(), DeviceError>;
}

/// Bulk transport-stream read channel.
pub trait DvrDevice: Send + Sync {
    /// Bounded readability wait. `Ok(false)` means the timeout elapsed.
    fn poll_readable(&self, timeout: Duration) -> Result<bool, DeviceError>;

    /// One bounded read into the caller's buffer.
    fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError>;

    fn set_nonblocking(&self, nonblocking: bool) -> Result<(), DeviceError>;
}
