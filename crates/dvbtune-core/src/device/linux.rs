//! Linux DVB chardev backend.
//!
//! Renders the device-surface traits onto the classic frontend/demux/dvr
//! character devices under `/dev/dvb/adapterN/`. Every handle is opened
//! non-blocking; ioctl request numbers are computed with the generic
//! `_IOC` encoding so no bindgen step is needed.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::mem;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use super::traits::{DemuxDevice, DeviceError, DvrDevice, FrontendDevice, ResourceProvider};
use super::types::{
    DeliverySystem, FilterFlags, FrontendEvent, FrontendInfo, FrontendKind, FrontendStatus,
    LegacyTuneParameters, Modulation, PesType, PropertyValue, SpectralInversion,
};

// ============================================================================
// ioctl request encoding (asm-generic)
// ============================================================================

const IOC_NONE: libc::c_ulong = 0;
const IOC_WRITE: libc::c_ulong = 1;
const IOC_READ: libc::c_ulong = 2;

const fn ioc(dir: libc::c_ulong, ty: u8, nr: u8, size: usize) -> libc::c_ulong {
    (dir << 30) | ((size as libc::c_ulong) << 16) | ((ty as libc::c_ulong) << 8) | nr as libc::c_ulong
}

const DVB_IOC_TYPE: u8 = b'o';

const FE_GET_INFO: libc::c_ulong =
    ioc(IOC_READ, DVB_IOC_TYPE, 61, mem::size_of::<DvbFrontendInfo>());
const FE_READ_STATUS: libc::c_ulong = ioc(IOC_READ, DVB_IOC_TYPE, 69, mem::size_of::<u32>());
const FE_SET_FRONTEND: libc::c_ulong = ioc(
    IOC_WRITE,
    DVB_IOC_TYPE,
    76,
    mem::size_of::<DvbFrontendParameters>(),
);
const FE_GET_EVENT: libc::c_ulong = ioc(
    IOC_READ,
    DVB_IOC_TYPE,
    78,
    mem::size_of::<DvbFrontendEvent>(),
);
const FE_SET_PROPERTY: libc::c_ulong =
    ioc(IOC_WRITE, DVB_IOC_TYPE, 82, mem::size_of::<DtvProperties>());
const FE_GET_PROPERTY: libc::c_ulong =
    ioc(IOC_READ, DVB_IOC_TYPE, 83, mem::size_of::<DtvProperties>());

const DMX_START: libc::c_ulong = ioc(IOC_NONE, DVB_IOC_TYPE, 41, 0);
const DMX_STOP: libc::c_ulong = ioc(IOC_NONE, DVB_IOC_TYPE, 42, 0);
const DMX_SET_PES_FILTER: libc::c_ulong = ioc(
    IOC_WRITE,
    DVB_IOC_TYPE,
    44,
    mem::size_of::<DmxPesFilterParams>(),
);

// ============================================================================
// Raw structures and enum codes (linux/dvb/frontend.h, linux/dvb/dmx.h)
// ============================================================================

const FE_HAS_SIGNAL: u32 = 0x01;
const FE_HAS_LOCK: u32 = 0x10;

const FE_CAN_INVERSION_AUTO: u32 = 0x1;

const FE_TYPE_QPSK: u32 = 0;
const FE_TYPE_QAM: u32 = 1;
const FE_TYPE_OFDM: u32 = 2;
const FE_TYPE_ATSC: u32 = 3;

const INVERSION_OFF: u32 = 0;
const INVERSION_ON: u32 = 1;
const INVERSION_AUTO: u32 = 2;

const MOD_QPSK: u32 = 0;
const MOD_QAM_16: u32 = 1;
const MOD_QAM_64: u32 = 3;
const MOD_QAM_256: u32 = 5;
const MOD_QAM_AUTO: u32 = 6;
const MOD_VSB_8: u32 = 7;

const SYS_DVBC_ANNEX_A: u32 = 1;
const SYS_DVBT: u32 = 3;
const SYS_DVBS: u32 = 5;
const SYS_DVBS2: u32 = 6;
const SYS_ATSC: u32 = 11;
const SYS_DVBT2: u32 = 16;

const DTV_TUNE: u32 = 1;
const DTV_FREQUENCY: u32 = 3;
const DTV_MODULATION: u32 = 4;
const DTV_DELIVERY_SYSTEM: u32 = 17;
const DTV_ENUM_DELSYS: u32 = 44;

const BANDWIDTH_AUTO: u32 = 3;
const FEC_AUTO: u32 = 9;
const TRANSMISSION_MODE_AUTO: u32 = 2;
const GUARD_INTERVAL_AUTO: u32 = 4;
const HIERARCHY_AUTO: u32 = 4;

const DMX_IN_FRONTEND: u32 = 0;
const DMX_OUT_TS_TAP: u32 = 2;
const DMX_PES_AUDIO0: u32 = 0;
const DMX_PES_VIDEO0: u32 = 1;
const DMX_PES_PCR0: u32 = 4;
const DMX_PES_OTHER: u32 = 20;
const DMX_CHECK_CRC: u32 = 1;
const DMX_IMMEDIATE_START: u32 = 4;

#[repr(C)]
#[derive(Clone, Copy)]
struct DvbFrontendInfo {
    name: [u8; 128],
    fe_type: u32,
    frequency_min: u32,
    frequency_max: u32,
    frequency_stepsize: u32,
    frequency_tolerance: u32,
    symbol_rate_min: u32,
    symbol_rate_max: u32,
    symbol_rate_tolerance: u32,
    notifier_delay: u32,
    caps: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct DvbQpskParameters {
    symbol_rate: u32,
    fec_inner: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct DvbQamParameters {
    symbol_rate: u32,
    fec_inner: u32,
    modulation: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct DvbOfdmParameters {
    bandwidth: u32,
    code_rate_hp: u32,
    code_rate_lp: u32,
    constellation: u32,
    transmission_mode: u32,
    guard_interval: u32,
    hierarchy_information: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct DvbVsbParameters {
    modulation: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
union DvbFrontendParametersUnion {
    qpsk: DvbQpskParameters,
    qam: DvbQamParameters,
    ofdm: DvbOfdmParameters,
    vsb: DvbVsbParameters,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct DvbFrontendParameters {
    frequency: u32,
    inversion: u32,
    u: DvbFrontendParametersUnion,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct DvbFrontendEvent {
    status: u32,
    parameters: DvbFrontendParameters,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct DtvPropertyBuffer {
    data: [u8; 32],
    len: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
union DtvPropertyData {
    data: u32,
    buffer: DtvPropertyBuffer,
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct DtvProperty {
    cmd: u32,
    reserved: [u32; 3],
    u: DtvPropertyData,
    result: i32,
}

#[repr(C)]
struct DtvProperties {
    num: u32,
    props: *mut DtvProperty,
}

fn dtv_prop(cmd: u32, data: u32) -> DtvProperty {
    DtvProperty {
        cmd,
        reserved: [0; 3],
        u: DtvPropertyData { data },
        result: 0,
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
struct DmxPesFilterParams {
    pid: u16,
    input: u32,
    output: u32,
    pes_type: u32,
    flags: u32,
}

// ============================================================================
// Code mapping
// ============================================================================

fn modulation_code(m: Modulation) -> u32 {
    match m {
        Modulation::Qpsk => MOD_QPSK,
        Modulation::Qam16 => MOD_QAM_16,
        Modulation::Qam64 => MOD_QAM_64,
        Modulation::Qam256 => MOD_QAM_256,
        Modulation::QamAuto => MOD_QAM_AUTO,
        Modulation::Vsb8 => MOD_VSB_8,
    }
}

fn delivery_code(d: DeliverySystem) -> u32 {
    match d {
        DeliverySystem::Undefined => 0,
        DeliverySystem::DvbC => SYS_DVBC_ANNEX_A,
        DeliverySystem::DvbT => SYS_DVBT,
        DeliverySystem::DvbS => SYS_DVBS,
        DeliverySystem::DvbS2 => SYS_DVBS2,
        DeliverySystem::Atsc => SYS_ATSC,
        DeliverySystem::DvbT2 => SYS_DVBT2,
    }
}

fn delivery_from_code(code: u32) -> DeliverySystem {
    match code {
        SYS_DVBC_ANNEX_A => DeliverySystem::DvbC,
        SYS_DVBT => DeliverySystem::DvbT,
        SYS_DVBS => DeliverySystem::DvbS,
        SYS_DVBS2 => DeliverySystem::DvbS2,
        SYS_ATSC => DeliverySystem::Atsc,
        SYS_DVBT2 => DeliverySystem::DvbT2,
        _ => DeliverySystem::Undefined,
    }
}

fn inversion_code(i: SpectralInversion) -> u32 {
    match i {
        SpectralInversion::Off => INVERSION_OFF,
        SpectralInversion::On => INVERSION_ON,
        SpectralInversion::Auto => INVERSION_AUTO,
    }
}

fn pes_type_code(t: PesType) -> u32 {
    match t {
        PesType::Audio => DMX_PES_AUDIO0,
        PesType::Video => DMX_PES_VIDEO0,
        PesType::Pcr => DMX_PES_PCR0,
        PesType::Other => DMX_PES_OTHER,
    }
}

fn status_from_bits(bits: u32) -> FrontendStatus {
    FrontendStatus {
        has_signal: bits & FE_HAS_SIGNAL != 0,
        has_lock: bits & FE_HAS_LOCK != 0,
    }
}

// ============================================================================
// fd helpers
// ============================================================================

fn open_node(path: &Path, write: bool) -> Result<File, DeviceError> {
    OpenOptions::new()
        .read(true)
        .write(write)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|e| DeviceError::OpenFailed(format!("{}: {e}", path.display())))
}

fn set_nonblocking_fd(file: &File, nonblocking: bool) -> Result<(), DeviceError> {
    let fd = file.as_raw_fd();
    // SAFETY: fd is owned by `file` and stays open for both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(DeviceError::Io(std::io::Error::last_os_error()));
    }
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    // SAFETY: see above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        return Err(DeviceError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

/// Bounded POLLIN wait. `Ok(false)` means the timeout elapsed.
fn poll_readable_fd(file: &File, timeout: Duration) -> Result<bool, DeviceError> {
    let mut pfd = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    // SAFETY: pfd points at a valid pollfd for the duration of the call.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        return Err(DeviceError::PollFailed(
            std::io::Error::last_os_error().to_string(),
        ));
    }
    Ok(rc > 0 && pfd.revents & libc::POLLIN != 0)
}

// ============================================================================
// Provider
// ============================================================================

/// Resource provider backed by the DVB character devices of one adapter.
pub struct ChardevProvider {
    frontend_path: PathBuf,
    demux_path: PathBuf,
    dvr_path: PathBuf,
}

impl ChardevProvider {
    pub fn new(
        frontend_path: impl Into<PathBuf>,
        demux_path: impl Into<PathBuf>,
        dvr_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            frontend_path: frontend_path.into(),
            demux_path: demux_path.into(),
            dvr_path: dvr_path.into(),
        }
    }

    pub fn from_config(config: &crate::config::TunerConfig) -> Self {
        Self::new(
            config.frontend_path.clone(),
            config.demux_path.clone(),
            config.dvr_path.clone(),
        )
    }
}

impl ResourceProvider for ChardevProvider {
    fn open_frontend(&self) -> Result<Box<dyn FrontendDevice>, DeviceError> {
        let file = open_node(&self.frontend_path, true)?;
        debug!(path = %self.frontend_path.display(), "opened frontend");
        Ok(Box::new(ChardevFrontend { file }))
    }

    fn open_demux(&self) -> Result<Box<dyn DemuxDevice>, DeviceError> {
        let file = open_node(&self.demux_path, true)?;
        debug!(path = %self.demux_path.display(), "opened demux");
        Ok(Box::new(ChardevDemux { file }))
    }

    fn open_dvr(&self) -> Result<Box<dyn DvrDevice>, DeviceError> {
        let file = open_node(&self.dvr_path, false)?;
        debug!(path = %self.dvr_path.display(), "opened dvr");
        Ok(Box::new(ChardevDvr { file }))
    }
}

// ============================================================================
// Frontend
// ============================================================================

struct ChardevFrontend {
    file: File,
}

impl ChardevFrontend {
    fn raw_info(&self) -> Result<DvbFrontendInfo, DeviceError> {
        let mut info = mem::MaybeUninit::<DvbFrontendInfo>::zeroed();
        // SAFETY: FE_GET_INFO fills exactly one DvbFrontendInfo.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), FE_GET_INFO, info.as_mut_ptr()) };
        if rc < 0 {
            return Err(DeviceError::Io(std::io::Error::last_os_error()));
        }
        // SAFETY: initialized by the successful ioctl above.
        Ok(unsafe { info.assume_init() })
    }
}

impl FrontendDevice for ChardevFrontend {
    fn enumerate_delivery_systems(&self) -> Result<Vec<DeliverySystem>, DeviceError> {
        let mut prop = dtv_prop(DTV_ENUM_DELSYS, 0);
        let mut props = DtvProperties {
            num: 1,
            props: &mut prop,
        };
        // SAFETY: props points at one valid DtvProperty for the call.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), FE_GET_PROPERTY, &mut props) };
        if rc < 0 {
            // Kernels predating the property API reject this outright.
            return Err(DeviceError::Unsupported("delivery system enumeration"));
        }
        // SAFETY: the kernel filled the buffer variant of the union.
        let buffer = unsafe { prop.u.buffer };
        let len = (buffer.len as usize).min(buffer.data.len());
        Ok(buffer.data[..len]
            .iter()
            .map(|&code| delivery_from_code(code as u32))
            .collect())
    }

    fn set_properties(&self, values: &[PropertyValue]) -> Result<(), DeviceError> {
        let mut raw: Vec<DtvProperty> = values
            .iter()
            .map(|v| match v {
                PropertyValue::DeliverySystem(d) => {
                    dtv_prop(DTV_DELIVERY_SYSTEM, delivery_code(*d))
                }
                PropertyValue::Frequency(hz) => dtv_prop(DTV_FREQUENCY, *hz),
                PropertyValue::Modulation(m) => dtv_prop(DTV_MODULATION, modulation_code(*m)),
                PropertyValue::Tune => dtv_prop(DTV_TUNE, 0),
            })
            .collect();
        let mut props = DtvProperties {
            num: raw.len() as u32,
            props: raw.as_mut_ptr(),
        };
        // SAFETY: props points at raw.len() valid DtvProperty entries.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), FE_SET_PROPERTY, &mut props) };
        if rc < 0 {
            return Err(DeviceError::Rejected(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(())
    }

    fn set_legacy_parameters(&self, params: &LegacyTuneParameters) -> Result<(), DeviceError> {
        let info = self.raw_info()?;
        let constellation = modulation_code(params.constellation);
        let u = match info.fe_type {
            FE_TYPE_ATSC => DvbFrontendParametersUnion {
                vsb: DvbVsbParameters {
                    modulation: constellation,
                },
            },
            FE_TYPE_OFDM => DvbFrontendParametersUnion {
                ofdm: DvbOfdmParameters {
                    bandwidth: BANDWIDTH_AUTO,
                    code_rate_hp: FEC_AUTO,
                    code_rate_lp: FEC_AUTO,
                    constellation,
                    transmission_mode: TRANSMISSION_MODE_AUTO,
                    guard_interval: GUARD_INTERVAL_AUTO,
                    hierarchy_information: HIERARCHY_AUTO,
                },
            },
            _ => return Err(DeviceError::Unsupported("legacy tuning for this frontend")),
        };
        let raw = DvbFrontendParameters {
            frequency: params.frequency_hz,
            inversion: inversion_code(params.inversion),
            u,
        };
        // SAFETY: raw is a fully initialized parameter struct.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), FE_SET_FRONTEND, &raw) };
        if rc < 0 {
            return Err(DeviceError::Rejected(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(())
    }

    fn device_info(&self) -> Result<FrontendInfo, DeviceError> {
        let raw = self.raw_info()?;
        let kind = match raw.fe_type {
            FE_TYPE_QPSK => FrontendKind::Qpsk,
            FE_TYPE_QAM => FrontendKind::Qam,
            FE_TYPE_OFDM => FrontendKind::Ofdm,
            FE_TYPE_ATSC => FrontendKind::Atsc,
            other => {
                warn!(fe_type = other, "unknown frontend type code");
                return Err(DeviceError::Unsupported("unknown frontend type"));
            }
        };
        Ok(FrontendInfo {
            kind,
            can_auto_inversion: raw.caps & FE_CAN_INVERSION_AUTO != 0,
        })
    }

    fn read_status(&self) -> Result<FrontendStatus, DeviceError> {
        let mut bits: u32 = 0;
        // SAFETY: FE_READ_STATUS writes one u32 status word.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), FE_READ_STATUS, &mut bits) };
        if rc < 0 {
            return Err(DeviceError::Io(std::io::Error::last_os_error()));
        }
        Ok(status_from_bits(bits))
    }

    fn poll_event(&self, timeout: Duration) -> Result<Option<FrontendEvent>, DeviceError> {
        if !poll_readable_fd(&self.file, timeout)? {
            return Ok(None);
        }
        let mut event = mem::MaybeUninit::<DvbFrontendEvent>::zeroed();
        // SAFETY: FE_GET_EVENT fills exactly one DvbFrontendEvent.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), FE_GET_EVENT, event.as_mut_ptr()) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            // The event queue can overflow during retune; treat as no event.
            if err.raw_os_error() == Some(libc::EOVERFLOW) {
                return Ok(None);
            }
            return Err(DeviceError::Io(err));
        }
        // SAFETY: initialized by the successful ioctl above.
        let event = unsafe { event.assume_init() };
        Ok(Some(FrontendEvent {
            status: status_from_bits(event.status),
        }))
    }

    fn current_delivery_system(&self) -> Result<DeliverySystem, DeviceError> {
        let mut prop = dtv_prop(DTV_DELIVERY_SYSTEM, 0);
        let mut props = DtvProperties {
            num: 1,
            props: &mut prop,
        };
        // SAFETY: props points at one valid DtvProperty for the call.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), FE_GET_PROPERTY, &mut props) };
        if rc < 0 {
            return Err(DeviceError::Io(std::io::Error::last_os_error()));
        }
        // SAFETY: the kernel filled the scalar variant of the union.
        let code = unsafe { prop.u.data };
        Ok(delivery_from_code(code))
    }

    fn set_nonblocking(&self, nonblocking: bool) -> Result<(), DeviceError> {
        set_nonblocking_fd(&self.file, nonblocking)
    }
}

// ============================================================================
// Demux
// ============================================================================

struct ChardevDemux {
    file: File,
}

impl DemuxDevice for ChardevDemux {
    fn configure_pes_filter(
        &self,
        pid: u16,
        pes_type: PesType,
        flags: FilterFlags,
    ) -> Result<(), DeviceError> {
        let mut raw_flags = 0;
        if flags.check_crc {
            raw_flags |= DMX_CHECK_CRC;
        }
        if flags.immediate_start {
            raw_flags |= DMX_IMMEDIATE_START;
        }
        let params = DmxPesFilterParams {
            pid,
            input: DMX_IN_FRONTEND,
            output: DMX_OUT_TS_TAP,
            pes_type: pes_type_code(pes_type),
            flags: raw_flags,
        };
        // SAFETY: params is a fully initialized filter struct.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), DMX_SET_PES_FILTER, &params) };
        if rc < 0 {
            return Err(DeviceError::Rejected(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(())
    }

    fn start(&self) -> Result<(), DeviceError> {
        // SAFETY: DMX_START takes no argument.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), DMX_START) };
        if rc < 0 {
            return Err(DeviceError::Rejected(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        Ok(())
    }

    fn set_nonblocking(&self, nonblocking: bool) -> Result<(), DeviceError> {
        set_nonblocking_fd(&self.file, nonblocking)
    }
}

impl Drop for ChardevDemux {
    fn drop(&mut self) {
        // SAFETY: DMX_STOP takes no argument; failure on close is ignorable.
        unsafe {
            libc::ioctl(self.file.as_raw_fd(), DMX_STOP);
        }
    }
}

// ============================================================================
// Dvr
// ============================================================================

struct ChardevDvr {
    file: File,
}

impl DvrDevice for ChardevDvr {
    fn poll_readable(&self, timeout: Duration) -> Result<bool, DeviceError> {
        poll_readable_fd(&self.file, timeout)
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        match (&self.file).read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(DeviceError::ReadFailed(e.to_string())),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> Result<(), DeviceError> {
        set_nonblocking_fd(&self.file, nonblocking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ioctl_numbers_match_the_kernel_encoding() {
        // Spot-checked against linux/dvb headers: _IO('o', 41) and
        // _IOR('o', 69, fe_status_t).
        assert_eq!(DMX_START, 0x6F29);
        assert_eq!(FE_READ_STATUS, (2 << 30) | (4 << 16) | (0x6F << 8) | 69);
    }

    #[test]
    fn dtv_property_is_packed_to_spec_size() {
        assert_eq!(mem::size_of::<DtvProperty>(), 56);
        assert_eq!(mem::size_of::<DvbFrontendParameters>(), 36);
    }
}
