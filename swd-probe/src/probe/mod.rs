//! Probe discovery, selection and the USB command transport.

#[cfg(any(test, feature = "test"))]
pub mod fake_probe;
pub mod list;
pub mod stlink;

use self::stlink::usb_interface::{StLinkInfo, CMD_LEN};

/// Low target voltages may cause the probe to be unable to communicate with the target.
pub(crate) const LOW_TARGET_VOLTAGE_WARNING_THRESHOLD: f32 = 1.5;

/// This sum type enumerates all the possible errors of a debug probe.
#[derive(thiserror::Error, Debug)]
pub enum DebugProbeError {
    /// The USB transfer failed. The device handle has been dropped.
    #[error("USB communication error")]
    Usb(#[source] rusb::Error),
    /// A command header exceeded the fixed command frame.
    #[error("Command of {0} bytes does not fit into the {} byte command frame", CMD_LEN)]
    FrameTooLarge(usize),
    /// The device accepted fewer bytes than were sent.
    #[error("Not enough bytes written: {is} of {should}")]
    NotEnoughBytesWritten { is: usize, should: usize },
    /// The device returned fewer bytes than expected.
    #[error("Not enough bytes read: {is} of {should}")]
    NotEnoughBytesRead { is: usize, should: usize },
    /// An earlier transport fault closed the device handle.
    #[error("The USB device handle was closed after an earlier transport fault")]
    HandleInvalidated,
    #[error("The firmware on the probe is outdated")]
    ProbeFirmwareOutdated,
    #[error("Probe could not be created")]
    ProbeCouldNotBeCreated(#[from] ProbeCreationError),
    #[error("The requested speed setting ({0} kHz) is not supported by the probe")]
    UnsupportedSpeed(u32),
    #[error("Command not supported by probe")]
    CommandNotSupportedByProbe,
    #[error("An error specific to the ST-Link occurred")]
    ProbeSpecific(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DebugProbeError {
    /// Returns `true` for faults of the USB transport itself, as opposed to
    /// errors reported by the probe firmware.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DebugProbeError::Usb(_)
                | DebugProbeError::NotEnoughBytesWritten { .. }
                | DebugProbeError::NotEnoughBytesRead { .. }
                | DebugProbeError::HandleInvalidated
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProbeCreationError {
    #[error("Probe was not found.")]
    NotFound,
    /// More than one probe is left after filtering by serial number.
    #[error("More than one probe found: {}", serial_numbers.join(", "))]
    Ambiguous { serial_numbers: Vec<String> },
    #[error("USB device could not be opened. Please check the permissions.")]
    CouldNotOpen(#[source] rusb::Error),
    #[error("USB endpoint {0:#04x} not found")]
    EndpointNotFound(u8),
    #[error("{0}")]
    Rusb(#[from] rusb::Error),
}

/// Gathers some information about an attached ST-Link.
///
/// The serial number is stored in its canonical form, see
/// [`stlink::tools::canonical_serial_number`].
#[derive(Clone, PartialEq, Eq)]
pub struct DebugProbeInfo {
    /// A human readable name, e.g. `STLink V2-1`.
    pub identifier: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: String,
    /// Bus the device is attached to, used to reopen exactly this device.
    pub bus_number: u8,
    /// Device address on the bus.
    pub address: u8,
    /// Endpoint layout of the hardware profile the device matched.
    pub profile: &'static StLinkInfo,
}

impl std::fmt::Debug for DebugProbeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} (VID: {:04x}, PID: {:04x}, Serial: {}, Bus {:03} Device {:03})",
            self.identifier,
            self.vendor_id,
            self.product_id,
            self.serial_number,
            self.bus_number,
            self.address,
        )
    }
}

impl DebugProbeInfo {
    /// Creates a new info struct that uniquely identifies a probe.
    pub fn new<S: Into<String>>(
        identifier: S,
        serial_number: String,
        bus_number: u8,
        address: u8,
        profile: &'static StLinkInfo,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            vendor_id: stlink::usb_interface::USB_VID,
            product_id: profile.usb_pid,
            serial_number,
            bus_number,
            address,
            profile,
        }
    }

    /// Check whether the serial number starts or ends with `filter`.
    ///
    /// The comparison is case-sensitive on the canonical serial number.
    pub fn matches_serial(&self, filter: &str) -> bool {
        self.serial_number.starts_with(filter) || self.serial_number.ends_with(filter)
    }
}
