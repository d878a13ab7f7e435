//! Event system for UI decoupling.
//!
//! Lets a CLI or UI subscribe to session progress without tight coupling
//! to the tuner core.

use crate::device::{ApiGeneration, DeliverySystem, Modulation, StreamType};
use crate::state::TuneState;

/// Events emitted by the tuner session.
#[derive(Debug, Clone)]
pub enum TunerEvent {
    /// Frontend handle obtained from the resource provider.
    FrontendOpened,
    /// Control dialect and delivery system determined for this handle.
    Probed {
        generation: ApiGeneration,
        delivery: DeliverySystem,
    },
    /// Session state transition.
    StateChanged { from: TuneState, to: TuneState },
    /// Tune command accepted by the device.
    TuneSubmitted {
        frequency_hz: u32,
        modulation: Modulation,
    },
    /// Stable lock confirmed after the debounce threshold.
    LockAcquired { polls: u32, elapsed_ms: u64 },
    /// Lock not achieved; frontend kept open for a retry.
    TuneFailed { reason: String },
    /// Tune aborted cooperatively.
    Cancelled,
    /// A pid filter was opened and configured.
    FilterStarted { pid: u16, stream_type: StreamType },
    /// All non-PAT filters (and the dvr handle) were closed.
    FiltersClosed { count: usize },
    /// The PAT filter was closed.
    PatClosed,
    /// Dvr handle opened for bulk reads.
    DvrOpened,
    /// Dvr poll/read failure; the handle was dropped for a lazy reopen.
    DvrError { message: String },
    /// Full teardown finished.
    TeardownComplete,
}

/// Observer trait for receiving tuner events.
///
/// Implement this in the UI layer to receive updates.
pub trait TunerObserver: Send + Sync {
    fn on_event(&self, event: &TunerEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl TunerObserver for NullObserver {
    fn on_event(&self, _event: &TunerEvent) {
        // Do nothing
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl TunerObserver for TracingObserver {
    fn on_event(&self, event: &TunerEvent) {
        match event {
            TunerEvent::FrontendOpened => {
                tracing::info!("Frontend opened");
            }
            TunerEvent::Probed {
                generation,
                delivery,
            } => {
                tracing::info!(generation = %generation, delivery = %delivery, "Frontend probed");
            }
            TunerEvent::StateChanged { from, to } => {
                tracing::debug!(from = %from, to = %to, "State changed");
            }
            TunerEvent::TuneSubmitted {
                frequency_hz,
                modulation,
            } => {
                tracing::info!(frequency_hz, modulation = %modulation, "Tune submitted");
            }
            TunerEvent::LockAcquired { polls, elapsed_ms } => {
                tracing::info!(polls, elapsed_ms, "Lock acquired");
            }
            TunerEvent::TuneFailed { reason } => {
                tracing::warn!(reason = %reason, "Tune failed");
            }
            TunerEvent::Cancelled => {
                tracing::info!("Tune cancelled");
            }
            TunerEvent::FilterStarted { pid, stream_type } => {
                tracing::info!(pid = %format!("0x{pid:04X}"), stream_type = %stream_type, "Filter started");
            }
            TunerEvent::FiltersClosed { count } => {
                tracing::debug!(count, "Filters closed");
            }
            TunerEvent::PatClosed => {
                tracing::debug!("PAT filter closed");
            }
            TunerEvent::DvrOpened => {
                tracing::debug!("Dvr opened");
            }
            TunerEvent::DvrError { message } => {
                tracing::warn!(message = %message, "Dvr error");
            }
            TunerEvent::TeardownComplete => {
                tracing::debug!("Teardown complete");
            }
        }
    }
}
