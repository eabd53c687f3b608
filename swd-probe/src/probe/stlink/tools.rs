use rusb::{Device, UsbContext};
use std::fmt::Write;
use std::time::Duration;

use crate::probe::{DebugProbeInfo, ProbeCreationError};

use super::usb_interface::{StLinkInfo, USB_PID_EP_MAP, USB_VID};

pub(super) fn is_stlink_device<T: UsbContext>(device: &Device<T>, profile: &StLinkInfo) -> bool {
    // Check the VID/PID.
    if let Ok(descriptor) = device.device_descriptor() {
        descriptor.vendor_id() == USB_VID && descriptor.product_id() == profile.usb_pid
    } else {
        false
    }
}

/// Lists all attached ST-Links, one hardware profile after the other.
#[tracing::instrument(skip_all)]
pub fn list_stlink_devices() -> Result<Vec<DebugProbeInfo>, ProbeCreationError> {
    let context = rusb::Context::new()?;
    let devices = context.devices()?;

    let mut probes = vec![];

    for profile in USB_PID_EP_MAP {
        probes.extend(
            devices
                .iter()
                .filter(|device| is_stlink_device(device, profile))
                .filter_map(|device| {
                    let serial_number = match read_serial_number(&device) {
                        Ok(serial_number) => serial_number,
                        Err(e) => {
                            tracing::warn!(
                                "Skipping STLink {} at bus {:03} device {:03}: {}",
                                profile.version_name,
                                device.bus_number(),
                                device.address(),
                                e
                            );
                            return None;
                        }
                    };

                    Some(DebugProbeInfo::new(
                        format!("STLink {}", profile.version_name),
                        canonical_serial_number(&serial_number),
                        device.bus_number(),
                        device.address(),
                        profile,
                    ))
                }),
        );
    }

    tracing::debug!("Found {} STLink devices", probes.len());

    Ok(probes)
}

fn read_serial_number<T: UsbContext>(device: &Device<T>) -> rusb::Result<String> {
    let timeout = Duration::from_millis(100);
    let descriptor = device.device_descriptor()?;
    let handle = device.open()?;
    let language = handle
        .read_languages(timeout)?
        .first()
        .copied()
        .ok_or(rusb::Error::NotFound)?;
    handle.read_serial_number_string(language, &descriptor, timeout)
}

/// Renders a USB serial number string as uppercase hex, two digits per character.
///
/// ST-Link/V2 probes report a binary serial number with non printable
/// characters; the hex form makes every serial printable and comparable.
pub fn canonical_serial_number(raw: &str) -> String {
    raw.chars().fold(String::new(), |mut s, c| {
        let _ = write!(s, "{:02X}", c as u32); // Writing a String never fails
        s
    })
}
