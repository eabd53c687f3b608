//! The debug core capability surface.

pub mod cortex_m;
pub mod registers;

use crate::Error;

/// Run control, memory and register access of a single core.
///
/// Memory accesses take target addresses. Register names are resolved
/// through [`registers::CoreRegister::from_name`], so `Error::UnknownRegister`
/// is returned for anything that is not a core register.
pub trait DebugCore {
    /// Read `size` bytes starting at `address`. No alignment is required.
    fn read_mem(&mut self, address: u32, size: usize) -> Result<Vec<u8>, Error>;
    /// Write `data` starting at `address`. No alignment is required.
    fn write_mem(&mut self, address: u32, data: &[u8]) -> Result<(), Error>;

    /// Read a single aligned 32 bit word.
    fn get_mem32(&mut self, address: u32) -> Result<u32, Error>;
    /// Write a single aligned 32 bit word.
    fn set_mem32(&mut self, address: u32, value: u32) -> Result<(), Error>;

    /// Fill `size` bytes at `address` by repeating `pattern`.
    ///
    /// The last repetition is cut off once `size` bytes are written. An
    /// empty pattern writes nothing.
    fn fill_mem(&mut self, address: u32, pattern: &[u8], size: usize) -> Result<(), Error>;

    fn get_reg(&mut self, name: &str) -> Result<u32, Error>;
    fn set_reg(&mut self, name: &str, value: u32) -> Result<(), Error>;
    /// Read every core register, as `(name, value)` pairs in register order.
    fn get_reg_all(&mut self) -> Result<Vec<(&'static str, u32)>, Error>;

    /// Halt the core and wait until it is halted.
    fn halt(&mut self) -> Result<(), Error>;
    /// Resume execution with halting debug still enabled.
    fn run(&mut self) -> Result<(), Error>;
    /// Resume execution and disable halting debug.
    fn nodebug(&mut self) -> Result<(), Error>;
    /// Request a system reset, the core runs afterwards.
    fn reset(&mut self) -> Result<(), Error>;
    /// Reset the system and halt the core at the reset vector.
    fn reset_halt(&mut self) -> Result<(), Error>;
    /// Execute a single instruction and halt again.
    fn step(&mut self) -> Result<(), Error>;

    fn is_halted(&mut self) -> Result<bool, Error>;
}
