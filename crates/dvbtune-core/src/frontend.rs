//! Owned frontend handle with memoized probe results.

use tracing::debug;

use crate::device::{
    ApiGeneration, DeliverySystem, DeviceError, FrontendDevice, FrontendInfo,
};

/// An open frontend plus everything probed about it.
///
/// Generation and delivery system are fields on the handle, not
/// process-wide state, so multiple tuner instances never interfere.
/// Both are probed at most once per handle lifetime.
pub struct FrontendHandle {
    dev: Box<dyn FrontendDevice>,
    generation: Option<ApiGeneration>,
    delivery: Option<DeliverySystem>,
    info: Option<FrontendInfo>,
    pub locked: bool,
}

impl FrontendHandle {
    pub fn new(dev: Box<dyn FrontendDevice>) -> Self {
        Self {
            dev,
            generation: None,
            delivery: None,
            info: None,
            locked: false,
        }
    }

    pub fn device(&self) -> &dyn FrontendDevice {
        self.dev.as_ref()
    }

    /// Probe the control dialect. A frontend that rejects the capability
    /// query predates the typed-property interface.
    pub fn generation(&mut self) -> ApiGeneration {
        if let Some(generation) = self.generation {
            return generation;
        }
        let generation = match self.dev.enumerate_delivery_systems() {
            Ok(systems) => {
                debug!(?systems, "frontend supports property interface");
                ApiGeneration::V5
            }
            Err(err) => {
                debug!(error = %err, "capability query rejected, assuming legacy interface");
                ApiGeneration::V3
            }
        };
        self.generation = Some(generation);
        generation
    }

    /// Probed-once view of the frontend's delivery system.
    pub fn delivery_system(&mut self) -> Result<DeliverySystem, DeviceError> {
        if let Some(delivery) = self.delivery {
            return Ok(delivery);
        }
        let delivery = match self.generation() {
            ApiGeneration::V5 => self.dev.current_delivery_system()?,
            ApiGeneration::V3 => self.info()?.kind.delivery_system(),
        };
        self.delivery = Some(delivery);
        Ok(delivery)
    }

    /// Static device description, fetched once (legacy dialect only needs
    /// it for the type code and the inversion capability bit).
    pub fn info(&mut self) -> Result<FrontendInfo, DeviceError> {
        if let Some(info) = self.info {
            return Ok(info);
        }
        let info = self.dev.device_info()?;
        self.info = Some(info);
        Ok(info)
    }

    /// Generation without probing, for callers that must not touch the
    /// device (filter start on an unprobed handle takes the legacy path).
    pub fn cached_generation(&self) -> Option<ApiGeneration> {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{FrontendKind, MockProvider, ResourceProvider};

    #[test]
    fn generation_is_probed_exactly_once() {
        let mock = MockProvider::new();
        let mut fe = FrontendHandle::new(mock.open_frontend().unwrap());

        assert_eq!(fe.generation(), ApiGeneration::V5);
        assert_eq!(fe.generation(), ApiGeneration::V5);
        assert_eq!(fe.generation(), ApiGeneration::V5);
        assert_eq!(mock.delsys_queries(), 1);
    }

    #[test]
    fn legacy_frontend_falls_back_to_v3() {
        let mock = MockProvider::new();
        mock.set_legacy_only(true);
        mock.set_frontend_info(FrontendKind::Ofdm, true);
        let mut fe = FrontendHandle::new(mock.open_frontend().unwrap());

        assert_eq!(fe.generation(), ApiGeneration::V3);
        assert_eq!(fe.delivery_system().unwrap(), DeliverySystem::DvbT);
    }

    #[test]
    fn v5_delivery_comes_from_the_property_read() {
        let mock = MockProvider::new();
        mock.set_delivery_system(DeliverySystem::DvbT2);
        let mut fe = FrontendHandle::new(mock.open_frontend().unwrap());

        assert_eq!(fe.delivery_system().unwrap(), DeliverySystem::DvbT2);
    }
}
