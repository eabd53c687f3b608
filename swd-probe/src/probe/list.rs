//! Listing and selecting attached probes.

use crate::probe::{
    stlink::{tools, usb_interface::StLinkUsbDevice},
    DebugProbeError, DebugProbeInfo, ProbeCreationError,
};

/// Struct to list all attached debug probes
#[derive(Debug)]
pub struct Lister {
    lister: Box<dyn ProbeLister>,
}

impl Lister {
    /// Create a new lister with the default lister implementation.
    pub fn new() -> Self {
        Self {
            lister: Box::new(UsbLister),
        }
    }

    /// Create a new lister with a custom lister implementation.
    pub fn with_lister(lister: Box<dyn ProbeLister>) -> Self {
        Self { lister }
    }

    /// List all available debug probes
    pub fn list_all(&self) -> Result<Vec<DebugProbeInfo>, ProbeCreationError> {
        self.lister.list()
    }

    /// Pick the one probe whose serial number starts or ends with `serial_filter`.
    ///
    /// An empty filter keeps every probe.
    pub fn select(&self, serial_filter: &str) -> Result<DebugProbeInfo, ProbeCreationError> {
        select_probe(self.list_all()?, serial_filter)
    }

    /// Select a probe like [`Lister::select`] and open it.
    pub fn open(&self, serial_filter: &str) -> Result<StLinkUsbDevice, DebugProbeError> {
        let info = self.select(serial_filter)?;

        tracing::debug!("Opening {:?}", info);

        Ok(StLinkUsbDevice::open(&info)?)
    }
}

impl Default for Lister {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for a probe lister implementation.
///
/// This trait can be used to implement custom probe listers.
pub trait ProbeLister: std::fmt::Debug {
    /// List all probes found by the lister, in discovery order.
    fn list(&self) -> Result<Vec<DebugProbeInfo>, ProbeCreationError>;
}

/// Default lister, enumerating the ST-Links attached over USB.
#[derive(Debug, PartialEq, Eq)]
pub struct UsbLister;

impl ProbeLister for UsbLister {
    fn list(&self) -> Result<Vec<DebugProbeInfo>, ProbeCreationError> {
        tools::list_stlink_devices()
    }
}

/// Resolve `candidates` to exactly one probe.
pub fn select_probe(
    candidates: Vec<DebugProbeInfo>,
    serial_filter: &str,
) -> Result<DebugProbeInfo, ProbeCreationError> {
    let mut candidates: Vec<_> = if serial_filter.is_empty() {
        candidates
    } else {
        candidates
            .into_iter()
            .filter(|probe| probe.matches_serial(serial_filter))
            .collect()
    };

    match candidates.len() {
        0 => Err(ProbeCreationError::NotFound),
        1 => Ok(candidates.remove(0)),
        _ => Err(ProbeCreationError::Ambiguous {
            serial_numbers: candidates
                .into_iter()
                .map(|probe| probe.serial_number)
                .collect(),
        }),
    }
}
