//! Device layer: the black-box control surface and its implementations.

#[cfg(target_os = "linux")]
pub mod linux;
pub mod mock;
pub mod traits;
pub mod types;

#[cfg(target_os = "linux")]
pub use linux::ChardevProvider;
pub use mock::{MockProvider, TuneSubmission};
pub use traits::{DemuxDevice, DeviceError, DvrDevice, FrontendDevice, ResourceProvider};
pub use types::{
    ApiGeneration, DeliverySystem, FilterFlags, FrontendEvent, FrontendInfo, FrontendKind,
    FrontendStatus, LegacyTuneParameters, Modulation, PesType, PropertyValue, SpectralInversion,
    StreamType, TuneRequest, UnknownModulation, PAT_PID,
};
