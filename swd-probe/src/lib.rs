//! # ST-Link SWD access
//!
//! Host side access to Cortex-M targets through an ST-Link/V2, V2-1 or V3
//! debug probe.
//!
//! # Prerequisites
//!
//! - Udev rules
//! - libusb
//!
//! # Examples
//!
//! ## Halting the attached core
//! ```no_run
//! # use swd_probe::Error;
//! use swd_probe::{CortexM, DebugCore, Lister, StLink};
//!
//! // Select the only attached ST-Link, or the one whose serial
//! // number starts or ends with the given filter.
//! let device = Lister::new().open("")?;
//!
//! let mut stlink = StLink::new(device)?;
//! stlink.attach(1_800)?;
//!
//! let mut core = CortexM::new(stlink);
//! core.halt()?;
//!
//! let pc = core.get_reg("PC")?;
//! println!("PC: {:08x}", pc);
//! # Ok::<(), Error>(())
//! ```
//!
//! The crate is built in three layers: the USB transport in [`probe`]
//! (device discovery, selection and fixed-size command framing), the
//! ST-Link protocol driver [`StLink`] and the Cortex-M debug core
//! [`CortexM`] implementing the [`DebugCore`] capability surface.

pub mod core;
mod error;
pub mod memory;
pub mod probe;

pub use crate::core::{cortex_m::CortexM, registers::CoreRegister, DebugCore};
pub use crate::error::Error;
pub use crate::memory::ArmProbe;
pub use crate::probe::{
    list::Lister,
    stlink::{usb_interface::StLinkUsbDevice, StLink},
    DebugProbeError, DebugProbeInfo, ProbeCreationError,
};

#[cfg(any(test, feature = "test"))]
pub use crate::probe::fake_probe::{CoreEvent, FakeProbe, Operation};
