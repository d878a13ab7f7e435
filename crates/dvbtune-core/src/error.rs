//! Session-level error taxonomy.

use thiserror::Error;

use crate::device::{DeliverySystem, DeviceError, Modulation};

#[derive(Error, Debug)]
pub enum TunerError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("modulation {modulation} is not valid for delivery system {delivery}")]
    InvalidModulation {
        modulation: Modulation,
        delivery: DeliverySystem,
    },

    #[error("no lock within {timeout_ms}ms")]
    LockTimeout { timeout_ms: u64 },

    #[error("frontend is not locked")]
    NotLocked,

    #[error("a retune is pending; refusing to start a filter")]
    RetunePending,
}
