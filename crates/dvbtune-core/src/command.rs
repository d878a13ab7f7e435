//! Generation-specific tune commands.
//!
//! The two control dialects are one tagged union: each variant knows how
//! to render itself into the black-box device calls, so no
//! generation-checking branches leak into the rest of the session.

use crate::device::{
    ApiGeneration, DeliverySystem, DeviceError, FrontendDevice, FrontendInfo,
    LegacyTuneParameters, Modulation, PropertyValue, SpectralInversion, TuneRequest,
};
use crate::error::TunerError;

#[derive(Debug, Clone, PartialEq)]
pub enum TuneCommand {
    /// Batched typed property writes, terminated by the commit token.
    Properties(Vec<PropertyValue>),
    /// Legacy single-struct submission.
    Legacy(LegacyTuneParameters),
}

impl TuneCommand {
    /// Build the command for the probed dialect. Rejects a modulation the
    /// probed delivery system cannot carry before any device call.
    pub fn build(
        generation: ApiGeneration,
        delivery: DeliverySystem,
        info: Option<FrontendInfo>,
        request: &TuneRequest,
    ) -> Result<Self, TunerError> {
        match generation {
            ApiGeneration::V5 => {
                let delivery = if delivery == DeliverySystem::Undefined {
                    request.modulation.implied_delivery_system()
                } else {
                    delivery
                };
                Ok(TuneCommand::Properties(vec![
                    PropertyValue::DeliverySystem(delivery),
                    PropertyValue::Frequency(request.frequency_hz),
                    PropertyValue::Modulation(request.modulation),
                    PropertyValue::Tune,
                ]))
            }
            ApiGeneration::V3 => {
                if !legacy_constellation_allowed(delivery, request.modulation) {
                    return Err(TunerError::InvalidModulation {
                        modulation: request.modulation,
                        delivery,
                    });
                }
                let inversion = if info.is_none_or(|i| i.can_auto_inversion) {
                    SpectralInversion::Auto
                } else {
                    SpectralInversion::Off
                };
                Ok(TuneCommand::Legacy(LegacyTuneParameters {
                    frequency_hz: request.frequency_hz,
                    inversion,
                    constellation: request.modulation,
                }))
            }
        }
    }

    /// Submit the command through the matching device entry point.
    pub fn submit(&self, dev: &dyn FrontendDevice) -> Result<(), DeviceError> {
        match self {
            TuneCommand::Properties(props) => dev.set_properties(props),
            TuneCommand::Legacy(params) => dev.set_legacy_parameters(params),
        }
    }
}

/// Constellations the legacy dialect accepts per delivery system.
fn legacy_constellation_allowed(delivery: DeliverySystem, modulation: Modulation) -> bool {
    match delivery {
        DeliverySystem::Atsc => {
            matches!(modulation, Modulation::Vsb8 | Modulation::QamAuto)
        }
        d if d.is_ofdm() => matches!(
            modulation,
            Modulation::Vsb8
                | Modulation::Qam16
                | Modulation::Qam64
                | Modulation::Qam256
                | Modulation::Qpsk
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::device::FrontendKind;

    fn request(modulation: Modulation) -> TuneRequest {
        TuneRequest {
            frequency_hz: 195_000_000,
            modulation,
            timeout: Duration::from_millis(2000),
        }
    }

    #[test]
    fn v5_renders_the_batch_in_commit_order() {
        let cmd = TuneCommand::build(
            ApiGeneration::V5,
            DeliverySystem::Atsc,
            None,
            &request(Modulation::Vsb8),
        )
        .unwrap();

        let TuneCommand::Properties(props) = cmd else {
            panic!("expected property batch");
        };
        assert_eq!(
            props,
            vec![
                PropertyValue::DeliverySystem(DeliverySystem::Atsc),
                PropertyValue::Frequency(195_000_000),
                PropertyValue::Modulation(Modulation::Vsb8),
                PropertyValue::Tune,
            ]
        );
    }

    #[test]
    fn v5_infers_delivery_from_modulation_when_undefined() {
        let cmd = TuneCommand::build(
            ApiGeneration::V5,
            DeliverySystem::Undefined,
            None,
            &request(Modulation::Qam256),
        )
        .unwrap();

        let TuneCommand::Properties(props) = cmd else {
            panic!("expected property batch");
        };
        assert_eq!(
            props[0],
            PropertyValue::DeliverySystem(DeliverySystem::DvbC)
        );
    }

    #[test]
    fn v3_atsc_accepts_vsb_and_qam_auto_only() {
        for modulation in [Modulation::Vsb8, Modulation::QamAuto] {
            assert!(
                TuneCommand::build(
                    ApiGeneration::V3,
                    DeliverySystem::Atsc,
                    None,
                    &request(modulation),
                )
                .is_ok()
            );
        }
        let err = TuneCommand::build(
            ApiGeneration::V3,
            DeliverySystem::Atsc,
            None,
            &request(Modulation::Qam64),
        )
        .unwrap_err();
        assert!(matches!(err, TunerError::InvalidModulation { .. }));
    }

    #[test]
    fn v3_ofdm_accepts_the_constellation_set() {
        for modulation in [
            Modulation::Vsb8,
            Modulation::Qam16,
            Modulation::Qam64,
            Modulation::Qam256,
            Modulation::Qpsk,
        ] {
            assert!(
                TuneCommand::build(
                    ApiGeneration::V3,
                    DeliverySystem::DvbT,
                    None,
                    &request(modulation),
                )
                .is_ok()
            );
        }
        assert!(
            TuneCommand::build(
                ApiGeneration::V3,
                DeliverySystem::DvbT,
                None,
                &request(Modulation::QamAuto),
            )
            .is_err()
        );
    }

    #[test]
    fn v3_inversion_falls_back_when_auto_is_unsupported() {
        let info = FrontendInfo {
            kind: FrontendKind::Atsc,
            can_auto_inversion: false,
        };
        let cmd = TuneCommand::build(
            ApiGeneration::V3,
            DeliverySystem::Atsc,
            Some(info),
            &request(Modulation::Vsb8),
        )
        .unwrap();

        let TuneCommand::Legacy(params) = cmd else {
            panic!("expected legacy parameters");
        };
        assert_eq!(params.inversion, SpectralInversion::Off);
    }
}
