//! Mock device backend for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{DemuxDevice, DeviceError, DvrDevice, FrontendDevice, ResourceProvider};
use super::types::{
    DeliverySystem, FilterFlags, FrontendEvent, FrontendInfo, FrontendKind, FrontendStatus,
    LegacyTuneParameters, PesType, PropertyValue,
};

/// A tune submission captured by the mock frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuneSubmission {
    Properties(Vec<PropertyValue>),
    Legacy(LegacyTuneParameters),
}

#[derive(Debug, Default)]
struct MockState {
    /// Scripted lock readings, consumed one per poll.
    lock_readings: Mutex<VecDeque<bool>>,
    /// Re-queue consumed readings (for alternating-signal scripts).
    lock_cycling: AtomicBool,
    /// Reading reported once the script is exhausted.
    steady_lock: AtomicBool,

    /// Captured tune submissions.
    submissions: Mutex<Vec<TuneSubmission>>,
    /// Captured PES filter configurations.
    filter_configs: Mutex<Vec<(u16, PesType)>>,
    explicit_starts: AtomicUsize,

    /// Queued dvr payloads; `poll_readable` reports true while non-empty.
    dvr_data: Mutex<VecDeque<Vec<u8>>>,

    frontend_opens: AtomicUsize,
    demux_opens: AtomicUsize,
    dvr_opens: AtomicUsize,
    delsys_queries: AtomicUsize,

    fail_frontend_open: AtomicBool,
    fail_demux_open: AtomicBool,
    fail_dvr_open: AtomicBool,
    fail_filter_configure: AtomicBool,
    fail_dvr_poll: AtomicBool,
    fail_tune: AtomicBool,
    /// Pretend the typed-property dialect is absent (v3 hardware).
    legacy_only: AtomicBool,

    delivery: Mutex<Option<DeliverySystem>>,
    info: Mutex<Option<FrontendInfo>>,
}

/// Mock resource provider for unit testing the tuner state machine.
///
/// All handles it produces share one scripted state, so a test can
/// inspect everything the core did through the provider it passed in.
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue lock readings to be consumed one per poll.
    pub fn script_lock_readings(&self, readings: &[bool]) {
        self.state
            .lock_readings
            .lock()
            .unwrap()
            .extend(readings.iter().copied());
    }

    /// Re-queue consumed readings so the script repeats forever.
    pub fn set_lock_cycling(&self, on: bool) {
        self.state.lock_cycling.store(on, Ordering::SeqCst);
    }

    /// Reading reported once the script is exhausted.
    pub fn set_steady_lock(&self, locked: bool) {
        self.state.steady_lock.store(locked, Ordering::SeqCst);
    }

    /// Pretend the frontend predates the typed-property dialect.
    pub fn set_legacy_only(&self, on: bool) {
        self.state.legacy_only.store(on, Ordering::SeqCst);
    }

    pub fn set_delivery_system(&self, delivery: DeliverySystem) {
        *self.state.delivery.lock().unwrap() = Some(delivery);
    }

    pub fn set_frontend_info(&self, kind: FrontendKind, can_auto_inversion: bool) {
        *self.state.info.lock().unwrap() = Some(FrontendInfo {
            kind,
            can_auto_inversion,
        });
    }

    pub fn set_fail_frontend_open(&self, on: bool) {
        self.state.fail_frontend_open.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_demux_open(&self, on: bool) {
        self.state.fail_demux_open.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_dvr_open(&self, on: bool) {
        self.state.fail_dvr_open.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_filter_configure(&self, on: bool) {
        self.state.fail_filter_configure.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_dvr_poll(&self, on: bool) {
        self.state.fail_dvr_poll.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_tune(&self, on: bool) {
        self.state.fail_tune.store(on, Ordering::SeqCst);
    }

    /// Queue a payload to be delivered by the next dvr read.
    pub fn push_dvr_data(&self, data: &[u8]) {
        self.state.dvr_data.lock().unwrap().push_back(data.to_vec());
    }

    pub fn submissions(&self) -> Vec<TuneSubmission> {
        self.state.submissions.lock().unwrap().clone()
    }

    pub fn filter_configs(&self) -> Vec<(u16, PesType)> {
        self.state.filter_configs.lock().unwrap().clone()
    }

    pub fn explicit_starts(&self) -> usize {
        self.state.explicit_starts.load(Ordering::SeqCst)
    }

    pub fn frontend_opens(&self) -> usize {
        self.state.frontend_opens.load(Ordering::SeqCst)
    }

    pub fn demux_opens(&self) -> usize {
        self.state.demux_opens.load(Ordering::SeqCst)
    }

    pub fn dvr_opens(&self) -> usize {
        self.state.dvr_opens.load(Ordering::SeqCst)
    }

    /// How many capability queries the core issued (memoization check).
    pub fn delsys_queries(&self) -> usize {
        self.state.delsys_queries.load(Ordering::SeqCst)
    }
}

impl MockState {
    fn next_lock_reading(&self) -> bool {
        let mut queue = self.lock_readings.lock().unwrap();
        match queue.pop_front() {
            Some(reading) => {
                if self.lock_cycling.load(Ordering::SeqCst) {
                    queue.push_back(reading);
                }
                reading
            }
            None => self.steady_lock.load(Ordering::SeqCst),
        }
    }

    fn status(&self) -> FrontendStatus {
        let locked = self.next_lock_reading();
        FrontendStatus {
            has_signal: locked,
            has_lock: locked,
        }
    }
}

impl ResourceProvider for MockProvider {
    fn open_frontend(&self) -> Result<Box<dyn FrontendDevice>, DeviceError> {
        if self.state.fail_frontend_open.load(Ordering::SeqCst) {
            return Err(DeviceError::OpenFailed("mock frontend".into()));
        }
        self.state.frontend_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockFrontend {
            state: self.state.clone(),
        }))
    }

    fn open_demux(&self) -> Result<Box<dyn DemuxDevice>, DeviceError> {
        if self.state.fail_demux_open.load(Ordering::SeqCst) {
            return Err(DeviceError::OpenFailed("mock demux".into()));
        }
        self.state.demux_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDemux {
            state: self.state.clone(),
        }))
    }

    fn open_dvr(&self) -> Result<Box<dyn DvrDevice>, DeviceError> {
        if self.state.fail_dvr_open.load(Ordering::SeqCst) {
            return Err(DeviceError::OpenFailed("mock dvr".into()));
        }
        self.state.dvr_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDvr {
            state: self.state.clone(),
        }))
    }
}

struct MockFrontend {
    state: Arc<MockState>,
}

impl FrontendDevice for MockFrontend {
    fn enumerate_delivery_systems(&self) -> Result<Vec<DeliverySystem>, DeviceError> {
        self.state.delsys_queries.fetch_add(1, Ordering::SeqCst);
        if self.state.legacy_only.load(Ordering::SeqCst) {
            return Err(DeviceError::Unsupported("delivery system enumeration"));
        }
        let delivery = self
            .state
            .delivery
            .lock()
            .unwrap()
            .unwrap_or(DeliverySystem::Atsc);
        Ok(vec![delivery])
    }

    fn set_properties(&self, props: &[PropertyValue]) -> Result<(), DeviceError> {
        if self.state.fail_tune.load(Ordering::SeqCst) {
            return Err(DeviceError::Rejected("mock tune".into()));
        }
        self.state
            .submissions
            .lock()
            .unwrap()
            .push(TuneSubmission::Properties(props.to_vec()));
        Ok(())
    }

    fn set_legacy_parameters(&self, params: &LegacyTuneParameters) -> Result<(), DeviceError> {
        if self.state.fail_tune.load(Ordering::SeqCst) {
            return Err(DeviceError::Rejected("mock tune".into()));
        }
        self.state
            .submissions
            .lock()
            .unwrap()
            .push(TuneSubmission::Legacy(*params));
        Ok(())
    }

    fn device_info(&self) -> Result<FrontendInfo, DeviceError> {
        Ok(self.state.info.lock().unwrap().unwrap_or(FrontendInfo {
            kind: FrontendKind::Atsc,
            can_auto_inversion: true,
        }))
    }

    fn read_status(&self) -> Result<FrontendStatus, DeviceError> {
        Ok(self.state.status())
    }

    fn poll_event(&self, _timeout: Duration) -> Result<Option<FrontendEvent>, DeviceError> {
        Ok(Some(FrontendEvent {
            status: self.state.status(),
        }))
    }

    fn current_delivery_system(&self) -> Result<DeliverySystem, DeviceError> {
        Ok(self
            .state
            .delivery
            .lock()
            .unwrap()
            .unwrap_or(DeliverySystem::Atsc))
    }

    fn set_nonblocking(&self, _nonblocking: bool) -> Result<(), DeviceError> {
        Ok(())
    }
}

struct MockDemux {
    state: Arc<MockState>,
}

impl DemuxDevice for MockDemux {
    fn configure_pes_filter(
        &self,
        pid: u16,
        pes_type: PesType,
        _flags: FilterFlags,
    ) -> Result<(), DeviceError> {
        if self.state.fail_filter_configure.load(Ordering::SeqCst) {
            return Err(DeviceError::Rejected("mock filter configure".into()));
        }
        self.state
            .filter_configs
            .lock()
            .unwrap()
            .push((pid, pes_type));
        Ok(())
    }

    fn start(&self) -> Result<(), DeviceError> {
        self.state.explicit_starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_nonblocking(&self, _nonblocking: bool) -> Result<(), DeviceError> {
        Ok(())
    }
}

struct MockDvr {
    state: Arc<MockState>,
}

impl DvrDevice for MockDvr {
    fn poll_readable(&self, _timeout: Duration) -> Result<bool, DeviceError> {
        if self.state.fail_dvr_poll.load(Ordering::SeqCst) {
            return Err(DeviceError::PollFailed("mock dvr poll".into()));
        }
        Ok(!self.state.dvr_data.lock().unwrap().is_empty())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let mut queue = self.state.dvr_data.lock().unwrap();
        match queue.pop_front() {
            Some(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn set_nonblocking(&self, _nonblocking: bool) -> Result<(), DeviceError> {
        Ok(())
    }
}
