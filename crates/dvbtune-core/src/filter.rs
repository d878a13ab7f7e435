//! Mutex-guarded pid→filter table with a dedicated PAT slot.
//!
//! The PAT filter usually stays open across channel changes while
//! per-stream filters churn on every change, so it lives outside the
//! keyed map and is closed independently. The dvr handle shares the
//! same lock: a demux topology change invalidates any in-flight bulk
//! read, so dropping the filters must atomically drop the dvr too.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::cancel::CancelToken;
use crate::device::{
    DemuxDevice, DeviceError, DvrDevice, FilterFlags, ResourceProvider, StreamType, PAT_PID,
};
use crate::error::TunerError;

struct PidFilterEntry {
    stream_type: StreamType,
    _dev: Box<dyn DemuxDevice>,
}

#[derive(Default)]
struct TableInner {
    filters: HashMap<u16, PidFilterEntry>,
    pat: Option<Box<dyn DemuxDevice>>,
    dvr: Option<Arc<dyn DvrDevice>>,
}

/// Filter table shared between the session thread and a concurrent
/// teardown caller. One mutex guards every mutation; it is held across
/// the configure-and-insert section only.
#[derive(Default)]
pub struct PidFilterTable {
    inner: Mutex<TableInner>,
}

impl PidFilterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open and configure a filter for `pid`.
    ///
    /// Returns `Ok(false)` without touching the device if the pid (or
    /// the PAT slot) is already open. Fails fast, allocating nothing,
    /// while a retune is pending. An entry is inserted only after the
    /// device accepted the configuration.
    pub fn start_filter(
        &self,
        provider: &dyn ResourceProvider,
        pid: u16,
        stream_type: StreamType,
        explicit_start: bool,
        cancel: &CancelToken,
    ) -> Result<bool, TunerError> {
        let mut inner = self.inner.lock().unwrap();

        if pid == PAT_PID {
            if inner.pat.is_some() {
                return Ok(false);
            }
        } else if inner.filters.contains_key(&pid) {
            return Ok(false);
        }

        if cancel.is_set() {
            return Err(TunerError::RetunePending);
        }

        let dev = provider.open_demux()?;
        dev.set_nonblocking(true)?;
        dev.configure_pes_filter(
            pid,
            stream_type.into(),
            FilterFlags {
                check_crc: true,
                immediate_start: true,
            },
        )?;
        if explicit_start {
            dev.start()?;
        }

        if pid == PAT_PID {
            inner.pat = Some(dev);
        } else {
            inner.filters.insert(
                pid,
                PidFilterEntry {
                    stream_type,
                    _dev: dev,
                },
            );
        }
        debug!(pid = %format!("0x{pid:04X}"), stream_type = %stream_type, "pid filter started");
        Ok(true)
    }

    /// Close every non-PAT filter and drop the dvr handle, atomically
    /// under the table lock. Returns the number of filters closed.
    pub fn close_all_except_pat(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.dvr = None;
        let count = inner.filters.len();
        inner.filters.clear();
        count
    }

    /// Close the PAT filter if open.
    pub fn close_pat(&self) -> bool {
        self.inner.lock().unwrap().pat.take().is_some()
    }

    /// Drop the dvr handle; the next reader reopens it lazily.
    pub fn close_dvr(&self) {
        self.inner.lock().unwrap().dvr = None;
    }

    /// Current dvr handle, if open.
    pub fn dvr_handle(&self) -> Option<Arc<dyn DvrDevice>> {
        self.inner.lock().unwrap().dvr.clone()
    }

    /// Dvr handle, opened through the provider if currently closed.
    pub fn ensure_dvr(
        &self,
        provider: &dyn ResourceProvider,
    ) -> Result<Arc<dyn DvrDevice>, DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(dvr) = &inner.dvr {
            return Ok(dvr.clone());
        }
        let dvr: Arc<dyn DvrDevice> = Arc::from(provider.open_dvr()?);
        dvr.set_nonblocking(true)?;
        inner.dvr = Some(dvr.clone());
        Ok(dvr)
    }

    /// Full teardown in resource-dependency order: dvr, then non-PAT
    /// filters, then the PAT filter. Returns the closed filter count.
    pub fn teardown(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.dvr = None;
        let count = inner.filters.len();
        inner.filters.clear();
        inner.pat = None;
        count
    }

    pub fn active_filters(&self) -> usize {
        self.inner.lock().unwrap().filters.len()
    }

    pub fn has_pat(&self) -> bool {
        self.inner.lock().unwrap().pat.is_some()
    }

    pub fn has_dvr(&self) -> bool {
        self.inner.lock().unwrap().dvr.is_some()
    }

    /// Stream type recorded for an active filter (diagnostics).
    pub fn stream_type(&self, pid: u16) -> Option<StreamType> {
        self.inner
            .lock()
            .unwrap()
            .filters
            .get(&pid)
            .map(|entry| entry.stream_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockProvider;

    #[test]
    fn second_start_for_same_pid_is_a_noop_success() {
        let mock = MockProvider::new();
        let table = PidFilterTable::new();
        let cancel = CancelToken::new();

        assert!(
            table
                .start_filter(&mock, 0x1FFB, StreamType::Video, false, &cancel)
                .unwrap()
        );
        assert!(
            !table
                .start_filter(&mock, 0x1FFB, StreamType::Video, false, &cancel)
                .unwrap()
        );
        // Exactly one handle allocation.
        assert_eq!(mock.demux_opens(), 1);
        assert_eq!(table.active_filters(), 1);
    }

    #[test]
    fn pending_retune_fails_fast_without_allocating() {
        let mock = MockProvider::new();
        let table = PidFilterTable::new();
        let cancel = CancelToken::new();
        cancel.set(true);

        let err = table
            .start_filter(&mock, 0x31, StreamType::Audio, false, &cancel)
            .unwrap_err();
        assert!(matches!(err, TunerError::RetunePending));
        assert_eq!(mock.demux_opens(), 0);
        assert_eq!(table.active_filters(), 0);
    }

    #[test]
    fn configure_failure_leaves_the_table_untouched() {
        let mock = MockProvider::new();
        mock.set_fail_filter_configure(true);
        let table = PidFilterTable::new();
        let cancel = CancelToken::new();

        assert!(
            table
                .start_filter(&mock, 0x31, StreamType::Audio, false, &cancel)
                .is_err()
        );
        assert_eq!(table.active_filters(), 0);
    }

    #[test]
    fn explicit_start_is_issued_on_request() {
        let mock = MockProvider::new();
        let table = PidFilterTable::new();
        let cancel = CancelToken::new();

        table
            .start_filter(&mock, 0x31, StreamType::Audio, true, &cancel)
            .unwrap();
        table
            .start_filter(&mock, 0x34, StreamType::Video, false, &cancel)
            .unwrap();
        assert_eq!(mock.explicit_starts(), 1);
    }

    #[test]
    fn close_all_keeps_pat_but_drops_dvr() {
        let mock = MockProvider::new();
        let table = PidFilterTable::new();
        let cancel = CancelToken::new();

        table
            .start_filter(&mock, PAT_PID, StreamType::Other, false, &cancel)
            .unwrap();
        table
            .start_filter(&mock, 0x31, StreamType::Audio, false, &cancel)
            .unwrap();
        table.ensure_dvr(&mock).unwrap();

        assert_eq!(table.close_all_except_pat(), 1);
        assert!(table.has_pat());
        assert!(!table.has_dvr());
        assert_eq!(table.active_filters(), 0);
    }

    #[test]
    fn close_all_then_close_pat_is_a_cold_start() {
        let mock = MockProvider::new();
        let table = PidFilterTable::new();
        let cancel = CancelToken::new();

        table
            .start_filter(&mock, PAT_PID, StreamType::Other, false, &cancel)
            .unwrap();
        table
            .start_filter(&mock, 0x31, StreamType::Audio, false, &cancel)
            .unwrap();

        table.close_all_except_pat();
        assert!(table.close_pat());
        assert_eq!(table.active_filters(), 0);
        assert!(!table.has_pat());

        // Any pid starts again as from a cold table.
        assert!(
            table
                .start_filter(&mock, 0x31, StreamType::Audio, false, &cancel)
                .unwrap()
        );
        assert!(
            table
                .start_filter(&mock, PAT_PID, StreamType::Other, false, &cancel)
                .unwrap()
        );
    }

    #[test]
    fn ensure_dvr_reuses_the_open_handle() {
        let mock = MockProvider::new();
        let table = PidFilterTable::new();

        table.ensure_dvr(&mock).unwrap();
        table.ensure_dvr(&mock).unwrap();
        assert_eq!(mock.dvr_opens(), 1);

        table.close_dvr();
        table.ensure_dvr(&mock).unwrap();
        assert_eq!(mock.dvr_opens(), 2);
    }
}
