use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;

use crate::probe::{DebugProbeError, DebugProbeInfo, ProbeCreationError};

/// The USB Command packet size.
pub(crate) const CMD_LEN: usize = 16;

/// The USB VendorID.
pub const USB_VID: u16 = 0x0483;

pub const TIMEOUT: Duration = Duration::from_millis(1000);

/// Firmware version name and device endpoints per USB PID.
///
/// Devices are enumerated in the order of this table.
pub static USB_PID_EP_MAP: &[StLinkInfo] = &[
    StLinkInfo::new("V2", 0x3748, 0x02, 0x81),
    StLinkInfo::new("V2-1", 0x374b, 0x01, 0x81),
    StLinkInfo::new("V2-1", 0x374a, 0x01, 0x81), // Audio
    StLinkInfo::new("V2-1", 0x3742, 0x01, 0x81), // No MSD
    StLinkInfo::new("V2-1", 0x3752, 0x01, 0x81), // Unproven
    StLinkInfo::new("V3", 0x374e, 0x01, 0x81),
    StLinkInfo::new("V3", 0x374f, 0x01, 0x81), // Bridge
    StLinkInfo::new("V3", 0x3753, 0x01, 0x81), // 2VCP
];

/// A helper struct to match STLink deviceinfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StLinkInfo {
    pub version_name: &'static str,
    pub usb_pid: u16,
    pub ep_out: u8,
    pub ep_in: u8,
}

impl StLinkInfo {
    pub const fn new(version_name: &'static str, usb_pid: u16, ep_out: u8, ep_in: u8) -> Self {
        Self {
            version_name,
            usb_pid,
            ep_out,
            ep_in,
        }
    }
}

/// A bulk IN/OUT pipe pair of an opened USB device.
pub trait UsbPipe {
    fn write_bulk(&mut self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize>;
    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration)
        -> rusb::Result<usize>;
    /// Release the claimed interface. Called once when the session ends.
    fn release(&mut self) -> rusb::Result<()>;
}

impl UsbPipe for DeviceHandle<Context> {
    fn write_bulk(&mut self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize> {
        DeviceHandle::write_bulk(self, endpoint, buf, timeout)
    }

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        DeviceHandle::read_bulk(self, endpoint, buf, timeout)
    }

    fn release(&mut self) -> rusb::Result<()> {
        self.release_interface(0)
    }
}

/// The command transport the ST-Link driver talks through.
pub trait StLinkUsb: std::fmt::Debug {
    /// Writes to the out EP and reads back data if needed.
    /// First the `cmd` is sent.
    /// In a second step `write_data` is transmitted.
    /// And lastly, data will be read back until `read_data` is filled.
    fn write(
        &mut self,
        cmd: &[u8],
        write_data: &[u8],
        read_data: &mut [u8],
        timeout: Duration,
    ) -> Result<(), DebugProbeError>;
}

/// The session with exactly one opened ST-Link.
///
/// The interface is claimed when the device is opened and released when
/// this value is dropped. After any USB fault the handle is dropped and
/// every further transfer fails with [`DebugProbeError::HandleInvalidated`].
pub struct StLinkUsbDevice<P: UsbPipe = DeviceHandle<Context>> {
    handle: Option<P>,
    pub(crate) info: StLinkInfo,
    timeout: Duration,
}

impl<P: UsbPipe> std::fmt::Debug for StLinkUsbDevice<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StLinkUsbDevice")
            .field("info", &self.info)
            .field("open", &self.handle.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StLinkUsbDevice {
    /// Opens the device described by `probe_info` and claims its debug interface.
    pub fn open(probe_info: &DebugProbeInfo) -> Result<Self, ProbeCreationError> {
        let context = Context::new()?;

        tracing::debug!("Acquired libusb context.");

        let device = context
            .devices()?
            .iter()
            .find(|device| {
                device.bus_number() == probe_info.bus_number
                    && device.address() == probe_info.address
            })
            .ok_or(ProbeCreationError::NotFound)?;

        let device_handle = device.open().map_err(ProbeCreationError::CouldNotOpen)?;

        tracing::debug!("Aquired handle for probe");

        let config = device.active_config_descriptor()?;

        tracing::debug!("Active config descriptor: {:?}", &config);

        let info = probe_info.profile.clone();

        device_handle.claim_interface(0)?;

        tracing::debug!("Claimed interface 0 of USB device.");

        let mut endpoint_out = false;
        let mut endpoint_in = false;

        if let Some(interface) = config.interfaces().next() {
            if let Some(descriptor) = interface.descriptors().next() {
                for endpoint in descriptor.endpoint_descriptors() {
                    if endpoint.address() == info.ep_out {
                        endpoint_out = true;
                    } else if endpoint.address() == info.ep_in {
                        endpoint_in = true;
                    }
                }
            }
        }

        let missing = if !endpoint_out {
            Some(info.ep_out)
        } else if !endpoint_in {
            Some(info.ep_in)
        } else {
            None
        };

        if let Some(endpoint) = missing {
            // Nothing sensible to do if releasing fails as well.
            let _ = device_handle.release_interface(0);
            return Err(ProbeCreationError::EndpointNotFound(endpoint));
        }

        tracing::debug!("Succesfully attached to STLink {}.", info.version_name);

        Ok(Self::from_pipe(device_handle, info))
    }
}

impl<P: UsbPipe> StLinkUsbDevice<P> {
    /// Wraps an already opened pipe.
    pub fn from_pipe(pipe: P, info: StLinkInfo) -> Self {
        Self {
            handle: Some(pipe),
            info,
            timeout: TIMEOUT,
        }
    }

    /// Sets the timeout used by [`Self::exchange`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The hardware profile this device was opened with.
    pub fn info(&self) -> &StLinkInfo {
        &self.info
    }

    /// Returns `false` once a transport fault has closed the handle.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Exchanges one command frame.
    ///
    /// The command is zero padded to the frame size, `payload` follows as a
    /// separate transfer and exactly `response_length` bytes are read back.
    /// Returns `None` when no response was requested.
    pub fn exchange(
        &mut self,
        command: &[u8],
        payload: Option<&[u8]>,
        response_length: usize,
    ) -> Result<Option<Vec<u8>>, DebugProbeError> {
        let mut response = vec![0; response_length];
        let timeout = self.timeout;

        self.transfer(command, payload.unwrap_or(&[]), &mut response, timeout)?;

        Ok(if response_length > 0 {
            Some(response)
        } else {
            None
        })
    }

    fn transfer(
        &mut self,
        cmd: &[u8],
        write_data: &[u8],
        read_data: &mut [u8],
        timeout: Duration,
    ) -> Result<(), DebugProbeError> {
        if cmd.len() > CMD_LEN {
            return Err(DebugProbeError::FrameTooLarge(cmd.len()));
        }

        tracing::trace!(
            "Sending command {:x?} to STLink, timeout: {:?}",
            cmd,
            timeout
        );

        // Command phase.
        let mut frame = [0u8; CMD_LEN];
        frame[..cmd.len()].copy_from_slice(cmd);

        let ep_out = self.info.ep_out;
        let ep_in = self.info.ep_in;

        let written_bytes = self.with_pipe(|pipe| pipe.write_bulk(ep_out, &frame, timeout))?;

        if written_bytes != CMD_LEN {
            return Err(DebugProbeError::NotEnoughBytesWritten {
                is: written_bytes,
                should: CMD_LEN,
            });
        }

        // Optional data out phase.
        if !write_data.is_empty() {
            tracing::trace!("Sending data {:x?}", write_data);

            let written_bytes =
                self.with_pipe(|pipe| pipe.write_bulk(ep_out, write_data, timeout))?;

            if written_bytes != write_data.len() {
                return Err(DebugProbeError::NotEnoughBytesWritten {
                    is: written_bytes,
                    should: write_data.len(),
                });
            }
        }

        // Optional data in phase.
        if !read_data.is_empty() {
            let read_bytes = self.with_pipe(|pipe| pipe.read_bulk(ep_in, read_data, timeout))?;

            if read_bytes != read_data.len() {
                return Err(DebugProbeError::NotEnoughBytesRead {
                    is: read_bytes,
                    should: read_data.len(),
                });
            }

            tracing::trace!("Received {:x?}", read_data);
        }

        Ok(())
    }

    /// Runs `op` on the open pipe. A USB fault drops the handle.
    fn with_pipe<T>(
        &mut self,
        op: impl FnOnce(&mut P) -> rusb::Result<T>,
    ) -> Result<T, DebugProbeError> {
        let result = match self.handle.as_mut() {
            Some(pipe) => op(pipe),
            None => return Err(DebugProbeError::HandleInvalidated),
        };

        result.map_err(|e| {
            tracing::debug!("USB fault ({}), closing device handle", e);
            self.close();
            DebugProbeError::Usb(e)
        })
    }

    /// Closes the USB interface gracefully.
    /// Internal helper.
    fn close(&mut self) {
        if let Some(mut pipe) = self.handle.take() {
            // We ignore the error case as we can't do much about it anyways.
            let _ = pipe.release();
        }
    }
}

impl<P: UsbPipe> StLinkUsb for StLinkUsbDevice<P> {
    fn write(
        &mut self,
        cmd: &[u8],
        write_data: &[u8],
        read_data: &mut [u8],
        timeout: Duration,
    ) -> Result<(), DebugProbeError> {
        self.transfer(cmd, write_data, read_data, timeout)
    }
}

impl<P: UsbPipe> Drop for StLinkUsbDevice<P> {
    fn drop(&mut self) {
        self.close();
    }
}
