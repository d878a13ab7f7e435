//! DVBtune-Core: DVB tuner-control state machine in Rust.
//!
//! This crate drives a DVB frontend through a complete tune cycle:
//! probing the control dialect, submitting a generation-specific tune
//! command, debouncing the lock condition, managing pid filters and the
//! bulk transport-stream read path, with cooperative cancellation.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Device**: the black-box control surface (Linux chardevs, mock)
//! - **Command**: generation-specific tune command rendering
//! - **Frontend**: owned handle with memoized probe results
//! - **Filter**: mutex-guarded pid filter table with a PAT slot
//! - **Events**: observer pattern for UI decoupling
//! - **Session**: high-level orchestrator and state machine
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use dvbtune_core::{Modulation, TuneRequest, TunerConfig, TunerSession};
//! use dvbtune_core::device::ChardevProvider;
//!
//! let config = TunerConfig::default();
//! let provider = ChardevProvider::from_config(&config);
//! let mut session = TunerSession::new(Box::new(provider), config);
//! session.tune(TuneRequest {
//!     frequency_hz: 195_000_000,
//!     modulation: Modulation::Vsb8,
//!     timeout: Duration::from_millis(2000),
//! }).expect("tune failed");
//! ```

pub mod cancel;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod filter;
pub mod frontend;
pub mod session;
pub mod state;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use command::TuneCommand;
pub use config::{ConfigError, TunerConfig};
pub use device::{
    ApiGeneration, DeliverySystem, DeviceError, Modulation, ResourceProvider, StreamType,
    TuneRequest, PAT_PID,
};
pub use error::TunerError;
pub use events::{NullObserver, TracingObserver, TunerEvent, TunerObserver};
pub use filter::PidFilterTable;
pub use frontend::FrontendHandle;
pub use session::{TuneOutcome, TunerSession};
pub use state::TuneState;
