//! Raw memory and core register access of a probe.

use crate::probe::DebugProbeError;

/// Memory and core register access as offered by a debug probe.
///
/// Addresses are target addresses. `read_8`/`write_8` accept any address
/// and length, the word accessors require a 4 byte aligned address.
pub trait ArmProbe {
    fn read_8(&mut self, address: u32, data: &mut [u8]) -> Result<(), DebugProbeError>;
    fn write_8(&mut self, address: u32, data: &[u8]) -> Result<(), DebugProbeError>;

    /// Read a single 32 bit word, e.g. a memory mapped register.
    fn read_word_32(&mut self, address: u32) -> Result<u32, DebugProbeError>;
    /// Write a single 32 bit word, e.g. a memory mapped register.
    fn write_word_32(&mut self, address: u32, value: u32) -> Result<(), DebugProbeError>;

    /// Read the core register with the given index. The core must be halted.
    fn read_core_reg(&mut self, index: u8) -> Result<u32, DebugProbeError>;
    fn write_core_reg(&mut self, index: u8, value: u32) -> Result<(), DebugProbeError>;
}
