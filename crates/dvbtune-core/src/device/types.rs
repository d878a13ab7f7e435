//! Shared vocabulary of the device control surface.
//!
//! These types are deliberately device-neutral: the session and the
//! `TuneCommand` builder speak only in terms of them, and each backend
//! maps them onto its own register/ioctl encoding.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Program Association Table pid. The PAT filter occupies a dedicated
/// slot outside the keyed filter table.
pub const PAT_PID: u16 = 0x0000;

/// Frontend control dialect, probed once per handle and cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiGeneration {
    /// Legacy single-struct tuning (`set_legacy_parameters`).
    V3,
    /// Typed property-list tuning (`set_properties`).
    V5,
}

impl fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiGeneration::V3 => write!(f, "v3"),
            ApiGeneration::V5 => write!(f, "v5"),
        }
    }
}

/// Broadcast standard family the frontend demodulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliverySystem {
    #[default]
    Undefined,
    Atsc,
    DvbC,
    DvbS,
    DvbS2,
    DvbT,
    DvbT2,
}

impl DeliverySystem {
    /// Whether this is one of the terrestrial OFDM systems.
    pub fn is_ofdm(&self) -> bool {
        matches!(self, DeliverySystem::DvbT | DeliverySystem::DvbT2)
    }
}

impl fmt::Display for DeliverySystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliverySystem::Undefined => write!(f, "UNDEFINED"),
            DeliverySystem::Atsc => write!(f, "ATSC"),
            DeliverySystem::DvbC => write!(f, "DVB-C"),
            DeliverySystem::DvbS => write!(f, "DVB-S"),
            DeliverySystem::DvbS2 => write!(f, "DVB-S2"),
            DeliverySystem::DvbT => write!(f, "DVB-T"),
            DeliverySystem::DvbT2 => write!(f, "DVB-T2"),
        }
    }
}

/// Modulation vocabulary accepted by `tune()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Vsb8,
    Qam16,
    Qam64,
    Qam256,
    QamAuto,
    Qpsk,
}

impl Modulation {
    /// Delivery system implied by the modulation family, used for the
    /// property-list dialect when the frontend reports no current system.
    pub fn implied_delivery_system(&self) -> DeliverySystem {
        match self {
            Modulation::Vsb8 => DeliverySystem::Atsc,
            Modulation::Qam16 | Modulation::Qam64 | Modulation::Qam256 | Modulation::QamAuto => {
                DeliverySystem::DvbC
            }
            Modulation::Qpsk => DeliverySystem::DvbT,
        }
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modulation::Vsb8 => write!(f, "8VSB"),
            Modulation::Qam16 => write!(f, "QAM16"),
            Modulation::Qam64 => write!(f, "QAM64"),
            Modulation::Qam256 => write!(f, "QAM256"),
            Modulation::QamAuto => write!(f, "QAM-AUTO"),
            Modulation::Qpsk => write!(f, "QPSK"),
        }
    }
}

impl FromStr for Modulation {
    type Err = UnknownModulation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "8VSB" | "VSB8" => Ok(Modulation::Vsb8),
            "QAM16" | "QAM-16" => Ok(Modulation::Qam16),
            "QAM64" | "QAM-64" => Ok(Modulation::Qam64),
            "QAM256" | "QAM-256" => Ok(Modulation::Qam256),
            "QAM-AUTO" | "QAMAUTO" => Ok(Modulation::QamAuto),
            "QPSK" => Ok(Modulation::Qpsk),
            _ => Err(UnknownModulation(s.to_string())),
        }
    }
}

/// Parse error for the modulation vocabulary.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown modulation name: {0}")]
pub struct UnknownModulation(pub String);

/// Caller-facing classification of a pid filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Audio,
    Video,
    Pcr,
    Other,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Audio => write!(f, "audio"),
            StreamType::Video => write!(f, "video"),
            StreamType::Pcr => write!(f, "pcr"),
            StreamType::Other => write!(f, "other"),
        }
    }
}

/// PES filter class on the demux side. Stream types without a dedicated
/// demux class map to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PesType {
    Audio,
    Video,
    Pcr,
    Other,
}

impl From<StreamType> for PesType {
    fn from(value: StreamType) -> Self {
        match value {
            StreamType::Audio => PesType::Audio,
            StreamType::Video => PesType::Video,
            StreamType::Pcr => PesType::Pcr,
            StreamType::Other => PesType::Other,
        }
    }
}

/// Spectral inversion mode for the legacy tuning dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralInversion {
    Off,
    On,
    Auto,
}

/// Frontend hardware class reported by the legacy device-info query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendKind {
    Qpsk,
    Qam,
    Ofdm,
    Atsc,
}

impl FrontendKind {
    /// Delivery system implied by the legacy type code.
    pub fn delivery_system(&self) -> DeliverySystem {
        match self {
            FrontendKind::Qpsk => DeliverySystem::DvbS,
            FrontendKind::Qam => DeliverySystem::DvbC,
            FrontendKind::Ofdm => DeliverySystem::DvbT,
            FrontendKind::Atsc => DeliverySystem::Atsc,
        }
    }
}

/// Static frontend description (legacy device-info query).
#[derive(Debug, Clone, Copy)]
pub struct FrontendInfo {
    pub kind: FrontendKind,
    /// Whether the hardware can resolve spectral inversion by itself.
    pub can_auto_inversion: bool,
}

/// Snapshot of the frontend lock condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontendStatus {
    pub has_signal: bool,
    pub has_lock: bool,
}

/// One frontend event, as delivered by the legacy event queue.
#[derive(Debug, Clone, Copy)]
pub struct FrontendEvent {
    pub status: FrontendStatus,
}

/// One typed property write in the batched tuning dialect. The terminal
/// `Tune` entry commits the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    DeliverySystem(DeliverySystem),
    Frequency(u32),
    Modulation(Modulation),
    Tune,
}

/// Parameter struct for the legacy single-call tuning dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyTuneParameters {
    pub frequency_hz: u32,
    pub inversion: SpectralInversion,
    /// Modulation/constellation field; interpretation depends on the
    /// probed delivery system.
    pub constellation: Modulation,
}

/// Demux PES filter setup flags.
#[derive(Debug, Clone, Copy)]
pub struct FilterFlags {
    pub check_crc: bool,
    pub immediate_start: bool,
}

/// A tune request, constructed and consumed within one `tune()` call.
#[derive(Debug, Clone, Copy)]
pub struct TuneRequest {
    pub frequency_hz: u32,
    pub modulation: Modulation,
    pub timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulation_round_trips_through_names() {
        for name in ["8VSB", "QAM16", "QAM64", "QAM256", "QAM-AUTO", "QPSK"] {
            let m: Modulation = name.parse().unwrap();
            assert_eq!(m.to_string(), name);
        }
    }

    #[test]
    fn modulation_rejects_unknown_names() {
        assert!("16VSB".parse::<Modulation>().is_err());
        assert!("".parse::<Modulation>().is_err());
    }

    #[test]
    fn legacy_kind_maps_to_delivery_system() {
        assert_eq!(FrontendKind::Atsc.delivery_system(), DeliverySystem::Atsc);
        assert_eq!(FrontendKind::Ofdm.delivery_system(), DeliverySystem::DvbT);
        assert_eq!(FrontendKind::Qam.delivery_system(), DeliverySystem::DvbC);
        assert_eq!(FrontendKind::Qpsk.delivery_system(), DeliverySystem::DvbS);
    }
}
