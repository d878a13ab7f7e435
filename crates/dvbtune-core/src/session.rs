//! Tuner session - drives the tune state machine and owns the resources.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::cancel::CancelToken;
use crate::command::TuneCommand;
use crate::config::TunerConfig;
use crate::device::{
    ApiGeneration, DeliverySystem, DeviceError, FrontendInfo, ResourceProvider, StreamType,
    TuneRequest,
};
use crate::error::TunerError;
use crate::events::{TracingObserver, TunerEvent, TunerObserver};
use crate::filter::PidFilterTable;
use crate::frontend::FrontendHandle;
use crate::state::TuneState;

/// Terminal result of a completed `tune()` call.
///
/// Cancellation is its own outcome, not a fake success: a cancelled tune
/// never reports a lock it did not confirm, and the caller decides what
/// to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneOutcome {
    Locked,
    Cancelled,
}

enum LockWait {
    Locked { polls: u32 },
    Cancelled,
    TimedOut,
    Device(DeviceError),
}

/// Tuner session - one frontend, its filter table, and the state machine
/// driving them. Core logic is single-threaded: one caller thread drives
/// every method taking `&mut self`. The filter table and the cancel
/// token are the only structures a second thread may touch.
pub struct TunerSession<O: TunerObserver> {
    provider: Box<dyn ResourceProvider>,
    config: TunerConfig,
    observer: Arc<O>,
    frontend: Option<FrontendHandle>,
    filters: Arc<PidFilterTable>,
    cancel: CancelToken,
    state: TuneState,
}

impl TunerSession<TracingObserver> {
    /// Create a session with the default tracing observer.
    pub fn new(provider: Box<dyn ResourceProvider>, config: TunerConfig) -> Self {
        Self::with_observer(provider, config, Arc::new(TracingObserver))
    }
}

impl<O: TunerObserver + 'static> TunerSession<O> {
    /// Create a session with a custom observer.
    pub fn with_observer(
        provider: Box<dyn ResourceProvider>,
        config: TunerConfig,
        observer: Arc<O>,
    ) -> Self {
        Self {
            provider,
            config,
            observer,
            frontend: None,
            filters: Arc::new(PidFilterTable::new()),
            cancel: CancelToken::new(),
            state: TuneState::Idle,
        }
    }

    pub fn state(&self) -> TuneState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.frontend.as_ref().is_some_and(|fe| fe.locked)
    }

    /// Token a controlling thread can use to abort an in-flight tune.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Flag an abort for the in-flight (or next) tune. Filter starts are
    /// refused while the flag is set.
    pub fn set_pending_cancellation(&self, pending: bool) {
        self.cancel.set(pending);
    }

    /// Shared filter table, for a concurrent teardown caller.
    pub fn filter_table(&self) -> Arc<PidFilterTable> {
        self.filters.clone()
    }

    fn emit(&self, event: TunerEvent) {
        self.observer.on_event(&event);
    }

    fn goto_state(&mut self, to: TuneState) {
        if self.state == to {
            return;
        }
        info!(from = %self.state, to = %to, "state transition");
        let from = std::mem::replace(&mut self.state, to);
        self.emit(TunerEvent::StateChanged { from, to });
    }

    fn open_frontend_if_needed(&mut self) -> Result<(), DeviceError> {
        if self.frontend.is_some() {
            return Ok(());
        }
        let dev = self.provider.open_frontend()?;
        dev.set_nonblocking(true)?;
        self.frontend = Some(FrontendHandle::new(dev));
        self.emit(TunerEvent::FrontendOpened);
        Ok(())
    }

    /// Tune to `request` and debounce the lock condition.
    ///
    /// Starts by releasing everything except the frontend so a fresh
    /// tune never inherits stale demux state. On timeout the frontend is
    /// left open, so the caller can retry without reopening it.
    #[instrument(skip(self), fields(frequency_hz = request.frequency_hz, modulation = %request.modulation))]
    pub fn tune(&mut self, request: TuneRequest) -> Result<TuneOutcome, TunerError> {
        self.reset_except_frontend();

        if let Err(err) = self.open_frontend_if_needed() {
            self.goto_state(TuneState::Failed);
            return Err(err.into());
        }

        self.goto_state(TuneState::Probing);
        let probed = match self.frontend.as_mut() {
            Some(fe) => probe_frontend(fe),
            None => Err(DeviceError::OpenFailed("frontend not open".into())),
        };
        let (generation, delivery, info) = match probed {
            Ok(probed) => probed,
            Err(err) => {
                self.goto_state(TuneState::Failed);
                self.emit(TunerEvent::TuneFailed {
                    reason: err.to_string(),
                });
                return Err(err.into());
            }
        };
        self.emit(TunerEvent::Probed {
            generation,
            delivery,
        });

        self.goto_state(TuneState::Tuning);
        let command = match TuneCommand::build(generation, delivery, info, &request) {
            Ok(command) => command,
            Err(err) => {
                self.goto_state(TuneState::Failed);
                return Err(err);
            }
        };

        // Last exit before the device call: an already-set flag means the
        // caller retuned underneath us and nothing should reach the device.
        if self.cancel.is_set() {
            self.goto_state(TuneState::Cancelled);
            self.emit(TunerEvent::Cancelled);
            return Ok(TuneOutcome::Cancelled);
        }

        let submitted = match self.frontend.as_ref() {
            Some(fe) => command.submit(fe.device()),
            None => Err(DeviceError::OpenFailed("frontend not open".into())),
        };
        if let Err(err) = submitted {
            self.goto_state(TuneState::Failed);
            self.emit(TunerEvent::TuneFailed {
                reason: err.to_string(),
            });
            return Err(err.into());
        }
        self.emit(TunerEvent::TuneSubmitted {
            frequency_hz: request.frequency_hz,
            modulation: request.modulation,
        });

        self.goto_state(TuneState::WaitingForLock);
        let started = Instant::now();
        let outcome = self.wait_for_lock(generation, request.timeout);
        match outcome {
            LockWait::Locked { polls } => {
                // Eager dvr open; a failure here is recoverable through the
                // lazy reopen in `read_ts_stream`.
                match self.filters.ensure_dvr(self.provider.as_ref()) {
                    Ok(_) => self.emit(TunerEvent::DvrOpened),
                    Err(err) => {
                        warn!(error = %err, "eager dvr open failed");
                        self.emit(TunerEvent::DvrError {
                            message: err.to_string(),
                        });
                    }
                }
                if let Some(fe) = self.frontend.as_mut() {
                    fe.locked = true;
                }
                self.goto_state(TuneState::Locked);
                self.emit(TunerEvent::LockAcquired {
                    polls,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
                Ok(TuneOutcome::Locked)
            }
            LockWait::Cancelled => {
                self.goto_state(TuneState::Cancelled);
                self.emit(TunerEvent::Cancelled);
                Ok(TuneOutcome::Cancelled)
            }
            LockWait::TimedOut => {
                let timeout_ms = request.timeout.as_millis() as u64;
                self.goto_state(TuneState::Failed);
                self.emit(TunerEvent::TuneFailed {
                    reason: format!("no lock within {timeout_ms}ms"),
                });
                Err(TunerError::LockTimeout { timeout_ms })
            }
            LockWait::Device(err) => {
                self.goto_state(TuneState::Failed);
                self.emit(TunerEvent::TuneFailed {
                    reason: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    /// Wall-clock-bounded lock debounce loop.
    ///
    /// A poll that yields no reading (legacy event sub-timeout) leaves
    /// the consecutive-success counter untouched; any unlocked reading
    /// resets it.
    fn wait_for_lock(&mut self, generation: ApiGeneration, timeout: Duration) -> LockWait {
        let poll_interval = Duration::from_millis(self.config.lock_poll_interval_ms);
        let debounce = self.config.lock_debounce_count.max(1);
        let deadline = Instant::now() + timeout;
        let mut consecutive = 0u32;
        let mut polls = 0u32;

        loop {
            if self.cancel.is_set() {
                return LockWait::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                return LockWait::TimedOut;
            }
            let slice = poll_interval.min(deadline - now);

            let reading = {
                let Some(fe) = self.frontend.as_ref() else {
                    return LockWait::Device(DeviceError::OpenFailed("frontend not open".into()));
                };
                match generation {
                    ApiGeneration::V5 => match fe.device().read_status() {
                        Ok(status) => Some(status.has_lock),
                        Err(err) => return LockWait::Device(err),
                    },
                    ApiGeneration::V3 => match fe.device().poll_event(slice) {
                        Ok(Some(event)) => Some(event.status.has_lock),
                        Ok(None) => None,
                        Err(err) => return LockWait::Device(err),
                    },
                }
            };

            match reading {
                Some(true) => {
                    polls += 1;
                    consecutive += 1;
                    if consecutive >= debounce {
                        return LockWait::Locked { polls };
                    }
                }
                Some(false) => {
                    polls += 1;
                    consecutive = 0;
                }
                None => {}
            }

            // The status query returns immediately; pace it. The legacy
            // event poll already blocked for the slice.
            if generation == ApiGeneration::V5 {
                thread::sleep(slice);
            }
        }
    }

    /// Full teardown plus a settle delay, returning the session to idle.
    pub fn stop_tune(&mut self) {
        self.reset();
        thread::sleep(Duration::from_millis(self.config.tune_stop_delay_ms));
        self.goto_state(TuneState::Idle);
    }

    /// Tear everything down, innermost first: dvr, non-PAT filters, PAT
    /// filter, frontend. Safe to call with nothing open.
    pub fn reset(&mut self) {
        if let Some(fe) = self.frontend.as_mut() {
            fe.locked = false;
        }
        self.filters.teardown();
        self.frontend = None;
        self.emit(TunerEvent::TeardownComplete);
    }

    /// Same teardown but the frontend stays open; a channel change need
    /// not reopen it.
    pub fn reset_except_frontend(&mut self) {
        if let Some(fe) = self.frontend.as_mut() {
            fe.locked = false;
        }
        self.filters.teardown();
    }

    /// Open a pid filter. Idempotent per pid; refused while a retune is
    /// pending.
    pub fn start_pid_filter(&self, pid: u16, stream_type: StreamType) -> Result<(), TunerError> {
        let explicit_start = matches!(
            self.frontend.as_ref().and_then(|fe| fe.cached_generation()),
            Some(ApiGeneration::V5)
        );
        let started = self.filters.start_filter(
            self.provider.as_ref(),
            pid,
            stream_type,
            explicit_start,
            &self.cancel,
        )?;
        if started {
            self.emit(TunerEvent::FilterStarted { pid, stream_type });
        }
        Ok(())
    }

    /// Close every non-PAT filter (and the dvr handle with them).
    pub fn close_all_pid_filters(&self) {
        let count = self.filters.close_all_except_pat();
        self.emit(TunerEvent::FiltersClosed { count });
    }

    /// Close the PAT filter independently of the per-stream filters.
    pub fn close_pat_filter(&self) {
        if self.filters.close_pat() {
            self.emit(TunerEvent::PatClosed);
        }
    }

    /// One bounded transport-stream read.
    ///
    /// Returns `Ok(0)` when `timeout` elapses with nothing readable;
    /// callers are expected to loop. Failures drop the dvr handle for a
    /// lazy reopen and are rate-limited by a fixed backoff.
    pub fn read_ts_stream(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TunerError> {
        let backoff = Duration::from_millis(self.config.read_backoff_ms);
        if !self.is_locked() {
            thread::sleep(backoff);
            return Err(TunerError::NotLocked);
        }

        let dvr = match self.filters.ensure_dvr(self.provider.as_ref()) {
            Ok(dvr) => dvr,
            Err(err) => {
                self.emit(TunerEvent::DvrError {
                    message: err.to_string(),
                });
                thread::sleep(backoff);
                return Err(err.into());
            }
        };

        match dvr.poll_readable(timeout) {
            Ok(true) => {}
            Ok(false) => return Ok(0),
            Err(err) => {
                self.filters.close_dvr();
                self.emit(TunerEvent::DvrError {
                    message: err.to_string(),
                });
                thread::sleep(backoff);
                return Err(err.into());
            }
        }

        match dvr.read(buf) {
            Ok(n) => Ok(n),
            Err(err) => {
                self.filters.close_dvr();
                self.emit(TunerEvent::DvrError {
                    message: err.to_string(),
                });
                thread::sleep(backoff);
                Err(err.into())
            }
        }
    }

    /// Delivery system of the frontend, probing it on first use.
    /// `Undefined` if the frontend cannot be opened at all.
    pub fn delivery_system_type(&mut self) -> DeliverySystem {
        if let Err(err) = self.open_frontend_if_needed() {
            warn!(error = %err, "cannot open frontend for delivery system probe");
            return DeliverySystem::Undefined;
        }
        match self.frontend.as_mut().map(|fe| fe.delivery_system()) {
            Some(Ok(delivery)) => delivery,
            Some(Err(err)) => {
                warn!(error = %err, "delivery system probe failed");
                DeliverySystem::Undefined
            }
            None => DeliverySystem::Undefined,
        }
    }
}

fn probe_frontend(
    fe: &mut FrontendHandle,
) -> Result<(ApiGeneration, DeliverySystem, Option<FrontendInfo>), DeviceError> {
    let generation = fe.generation();
    match generation {
        ApiGeneration::V5 => {
            let delivery = fe.delivery_system().unwrap_or_else(|err| {
                warn!(error = %err, "delivery system probe failed, will infer from modulation");
                DeliverySystem::Undefined
            });
            Ok((generation, delivery, None))
        }
        ApiGeneration::V3 => {
            let info = fe.info()?;
            Ok((generation, info.kind.delivery_system(), Some(info)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{
        FrontendKind, LegacyTuneParameters, MockProvider, Modulation, PropertyValue,
        SpectralInversion, TuneSubmission, PAT_PID,
    };
    use crate::events::NullObserver;

    fn fast_config() -> TunerConfig {
        TunerConfig {
            lock_poll_interval_ms: 2,
            lock_debounce_count: 3,
            tune_stop_delay_ms: 1,
            read_backoff_ms: 1,
            ..TunerConfig::default()
        }
    }

    fn session(mock: &MockProvider) -> TunerSession<NullObserver> {
        TunerSession::with_observer(Box::new(mock.clone()), fast_config(), Arc::new(NullObserver))
    }

    fn request(timeout_ms: u64) -> TuneRequest {
        TuneRequest {
            frequency_hz: 195_000_000,
            modulation: Modulation::Vsb8,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[test]
    fn tune_locks_after_three_consecutive_polls_and_opens_dvr() {
        let mock = MockProvider::new();
        mock.script_lock_readings(&[true, true, true]);
        mock.set_steady_lock(true);
        let mut session = session(&mock);

        let outcome = session.tune(request(2000)).unwrap();
        assert_eq!(outcome, TuneOutcome::Locked);
        assert_eq!(session.state(), TuneState::Locked);
        assert!(session.is_locked());
        // Dvr opened eagerly on lock.
        assert_eq!(mock.dvr_opens(), 1);
        assert!(session.filter_table().has_dvr());
    }

    #[test]
    fn tune_times_out_and_leaves_the_frontend_open() {
        let mock = MockProvider::new();
        let mut session = session(&mock);

        let started = Instant::now();
        let err = session.tune(request(120)).unwrap_err();
        assert!(matches!(err, TunerError::LockTimeout { timeout_ms: 120 }));
        assert!(started.elapsed() >= Duration::from_millis(120));
        assert_eq!(session.state(), TuneState::Failed);
        assert!(!session.is_locked());

        // Frontend was preserved: the probe succeeds without reopening.
        assert_ne!(session.delivery_system_type(), DeliverySystem::Undefined);
        assert_eq!(mock.frontend_opens(), 1);
    }

    #[test]
    fn alternating_lock_readings_never_debounce() {
        let mock = MockProvider::new();
        mock.script_lock_readings(&[true, false]);
        mock.set_lock_cycling(true);
        let mut session = session(&mock);

        let err = session.tune(request(100)).unwrap_err();
        assert!(matches!(err, TunerError::LockTimeout { .. }));
        assert!(!session.is_locked());
    }

    #[test]
    fn pending_cancellation_prevents_any_device_call() {
        let mock = MockProvider::new();
        mock.set_steady_lock(true);
        let mut session = session(&mock);
        session.set_pending_cancellation(true);

        let outcome = session.tune(request(2000)).unwrap();
        assert_eq!(outcome, TuneOutcome::Cancelled);
        assert_eq!(session.state(), TuneState::Cancelled);
        assert!(mock.submissions().is_empty());
        assert!(!session.is_locked());
    }

    #[test]
    fn cancel_during_lock_wait_ends_without_a_confirmed_lock() {
        let mock = MockProvider::new();
        let mut session = session(&mock);
        let token = session.cancel_token();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            token.set(true);
        });

        let started = Instant::now();
        let outcome = session.tune(request(2000)).unwrap();
        canceller.join().unwrap();

        assert_eq!(outcome, TuneOutcome::Cancelled);
        // Returned on the flag, not the timeout.
        assert!(started.elapsed() < Duration::from_millis(1000));
        // The command had already reached the device, but no lock was
        // ever confirmed.
        assert_eq!(mock.submissions().len(), 1);
        assert!(!session.is_locked());
    }

    #[test]
    fn v5_tune_submits_the_property_batch() {
        let mock = MockProvider::new();
        mock.set_delivery_system(DeliverySystem::Atsc);
        mock.set_steady_lock(true);
        let mut session = session(&mock);

        session.tune(request(2000)).unwrap();
        let submissions = mock.submissions();
        assert_eq!(
            submissions,
            vec![TuneSubmission::Properties(vec![
                PropertyValue::DeliverySystem(DeliverySystem::Atsc),
                PropertyValue::Frequency(195_000_000),
                PropertyValue::Modulation(Modulation::Vsb8),
                PropertyValue::Tune,
            ])]
        );
    }

    #[test]
    fn v3_tune_submits_the_legacy_struct() {
        let mock = MockProvider::new();
        mock.set_legacy_only(true);
        mock.set_frontend_info(FrontendKind::Atsc, true);
        mock.set_steady_lock(true);
        let mut session = session(&mock);

        let outcome = session.tune(request(2000)).unwrap();
        assert_eq!(outcome, TuneOutcome::Locked);
        assert_eq!(
            mock.submissions(),
            vec![TuneSubmission::Legacy(LegacyTuneParameters {
                frequency_hz: 195_000_000,
                inversion: SpectralInversion::Auto,
                constellation: Modulation::Vsb8,
            })]
        );
    }

    #[test]
    fn v3_rejects_an_invalid_modulation_before_the_device() {
        let mock = MockProvider::new();
        mock.set_legacy_only(true);
        mock.set_frontend_info(FrontendKind::Atsc, true);
        let mut session = session(&mock);

        let err = session
            .tune(TuneRequest {
                frequency_hz: 195_000_000,
                modulation: Modulation::Qam64,
                timeout: Duration::from_millis(2000),
            })
            .unwrap_err();
        assert!(matches!(err, TunerError::InvalidModulation { .. }));
        assert!(mock.submissions().is_empty());
        assert_eq!(session.state(), TuneState::Failed);
    }

    #[test]
    fn device_rejection_fails_the_session_immediately() {
        let mock = MockProvider::new();
        mock.set_fail_tune(true);
        let mut session = session(&mock);

        let started = Instant::now();
        let err = session.tune(request(2000)).unwrap_err();
        assert!(matches!(err, TunerError::Device(_)));
        // No lock wait happened.
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(session.state(), TuneState::Failed);

        // The frontend survives for a retry.
        mock.set_fail_tune(false);
        mock.set_steady_lock(true);
        assert_eq!(session.tune(request(2000)).unwrap(), TuneOutcome::Locked);
        assert_eq!(mock.frontend_opens(), 1);
    }

    #[test]
    fn a_fresh_tune_releases_stale_demux_state() {
        let mock = MockProvider::new();
        mock.set_steady_lock(true);
        let mut session = session(&mock);

        session.tune(request(2000)).unwrap();
        session.start_pid_filter(PAT_PID, StreamType::Other).unwrap();
        session.start_pid_filter(0x31, StreamType::Audio).unwrap();
        session.start_pid_filter(0x34, StreamType::Video).unwrap();

        session.tune(request(2000)).unwrap();
        let table = session.filter_table();
        assert_eq!(table.active_filters(), 0);
        assert!(!table.has_pat());
    }

    #[test]
    fn probe_results_are_cached_across_retunes() {
        let mock = MockProvider::new();
        mock.set_steady_lock(true);
        let mut session = session(&mock);

        session.tune(request(2000)).unwrap();
        session.tune(request(2000)).unwrap();
        session.tune(request(2000)).unwrap();
        assert_eq!(mock.delsys_queries(), 1);
    }

    #[test]
    fn reset_is_safe_from_idle() {
        let mock = MockProvider::new();
        let mut session = session(&mock);
        session.reset();
        assert_eq!(session.state(), TuneState::Idle);
        assert!(!session.is_locked());
    }

    #[test]
    fn stop_tune_closes_the_frontend_too() {
        let mock = MockProvider::new();
        mock.set_steady_lock(true);
        let mut session = session(&mock);

        session.tune(request(2000)).unwrap();
        session.stop_tune();
        assert_eq!(session.state(), TuneState::Idle);
        assert!(!session.is_locked());
        assert!(!session.filter_table().has_dvr());

        // The next probe has to reopen the frontend.
        session.delivery_system_type();
        assert_eq!(mock.frontend_opens(), 2);
    }

    #[test]
    fn read_fails_fast_when_not_locked() {
        let mock = MockProvider::new();
        let mut session = session(&mock);

        let mut buf = [0u8; 188];
        let err = session
            .read_ts_stream(&mut buf, Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, TunerError::NotLocked));
        // The dvr handle was never touched.
        assert_eq!(mock.dvr_opens(), 0);
    }

    #[test]
    fn read_returns_zero_on_poll_timeout() {
        let mock = MockProvider::new();
        mock.set_steady_lock(true);
        let mut session = session(&mock);
        session.tune(request(2000)).unwrap();

        let mut buf = [0u8; 188];
        let n = session
            .read_ts_stream(&mut buf, Duration::from_millis(5))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn read_delivers_queued_stream_bytes() {
        let mock = MockProvider::new();
        mock.set_steady_lock(true);
        let mut session = session(&mock);
        session.tune(request(2000)).unwrap();

        mock.push_dvr_data(&[0x47, 0x1F, 0xFB, 0x10]);
        let mut buf = [0u8; 188];
        let n = session
            .read_ts_stream(&mut buf, Duration::from_millis(10))
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf[0], 0x47);
    }

    #[test]
    fn poll_error_drops_the_dvr_for_a_lazy_reopen() {
        let mock = MockProvider::new();
        mock.set_steady_lock(true);
        let mut session = session(&mock);
        session.tune(request(2000)).unwrap();
        assert_eq!(mock.dvr_opens(), 1);

        mock.set_fail_dvr_poll(true);
        let mut buf = [0u8; 188];
        assert!(
            session
                .read_ts_stream(&mut buf, Duration::from_millis(5))
                .is_err()
        );
        assert!(!session.filter_table().has_dvr());

        // Recovered on the next read through a fresh handle.
        mock.set_fail_dvr_poll(false);
        let n = session
            .read_ts_stream(&mut buf, Duration::from_millis(5))
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(mock.dvr_opens(), 2);
    }

    #[test]
    fn filter_start_is_refused_while_cancellation_is_pending() {
        let mock = MockProvider::new();
        let session = session(&mock);
        session.set_pending_cancellation(true);

        let err = session
            .start_pid_filter(0x31, StreamType::Audio)
            .unwrap_err();
        assert!(matches!(err, TunerError::RetunePending));
        assert_eq!(mock.demux_opens(), 0);
    }

    #[test]
    fn v5_filters_get_an_explicit_start() {
        let mock = MockProvider::new();
        mock.set_steady_lock(true);
        let mut session = session(&mock);
        session.tune(request(2000)).unwrap();

        session.start_pid_filter(0x31, StreamType::Audio).unwrap();
        assert_eq!(mock.explicit_starts(), 1);
    }

    #[test]
    fn unprobed_filters_take_the_implicit_start_path() {
        let mock = MockProvider::new();
        let session = session(&mock);

        session.start_pid_filter(0x31, StreamType::Audio).unwrap();
        assert_eq!(mock.explicit_starts(), 0);
    }

    #[test]
    fn delivery_system_is_undefined_when_the_frontend_cannot_open() {
        let mock = MockProvider::new();
        mock.set_fail_frontend_open(true);
        let mut session = session(&mock);

        assert_eq!(session.delivery_system_type(), DeliverySystem::Undefined);
    }
}
