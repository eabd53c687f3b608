#![allow(missing_docs)] // Don't require docs for test code
use std::collections::HashMap;

use crate::{
    core::cortex_m::{Aircr, Demcr, Dhcsr},
    memory::ArmProbe,
    probe::DebugProbeError,
};

/// Number of core registers reachable through the core register selector.
const CORE_REGISTER_COUNT: usize = 19;

/// A probe backed by sparse in-memory target state, for tests and dry runs.
///
/// The Cortex-M debug registers DHCSR and AIRCR are emulated so that run
/// control behaves like a real core: halting, stepping and resetting are
/// recorded as [`CoreEvent`]s, every probe call as an [`Operation`].
#[derive(Debug, Default)]
pub struct FakeProbe {
    memory: HashMap<u32, u8>,
    registers: [u32; CORE_REGISTER_COUNT],

    /// Control bits [15:0] of the last effective DHCSR write.
    dhcsr_control: u32,
    is_halted: bool,

    /// Ignore halt requests, as a core stuck with debug disabled would.
    ignore_halt: bool,
    /// Make every core register access fail.
    fail_register_access: bool,

    events: Vec<CoreEvent>,
    operations: Vec<Operation>,
}

/// A run state change of the emulated core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreEvent {
    Halt,
    Run,
    Step,
    NoDebug,
    /// A system reset, `halted` if the reset vector catch stopped the core.
    Reset { halted: bool },
}

/// A single call into the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Read8 { address: u32, len: usize },
    Write8 { address: u32, data: Vec<u8> },
    ReadWord { address: u32 },
    WriteWord { address: u32, value: u32 },
    ReadReg { index: u8 },
    WriteReg { index: u8, value: u32 },
}

impl FakeProbe {
    /// Creates a new [`FakeProbe`] with a running core and zeroed memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new [`FakeProbe`] whose core is already halted.
    pub fn halted() -> Self {
        let mut probe = Self::new();
        let mut dhcsr = Dhcsr(0);
        dhcsr.set_c_halt(true);
        dhcsr.set_c_debugen(true);
        probe.dhcsr_control = dhcsr.into();
        probe.is_halted = true;
        probe
    }

    pub fn is_halted(&self) -> bool {
        self.is_halted
    }

    pub fn set_ignore_halt(&mut self, ignore: bool) {
        self.ignore_halt = ignore;
    }

    pub fn set_register_fault(&mut self, fail: bool) {
        self.fail_register_access = fail;
    }

    /// Run state changes, oldest first.
    pub fn events(&self) -> Vec<CoreEvent> {
        self.events.clone()
    }

    /// All probe calls, oldest first.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Place `data` into target memory without logging an operation.
    pub fn load(&mut self, address: u32, data: &[u8]) {
        for (offset, byte) in data.iter().enumerate() {
            self.memory
                .insert(address.wrapping_add(offset as u32), *byte);
        }
    }

    /// Inspect target memory without logging an operation.
    pub fn memory(&self, address: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|offset| self.byte(address.wrapping_add(offset as u32)))
            .collect()
    }

    pub fn register(&self, index: u8) -> u32 {
        self.registers[index as usize]
    }

    pub fn set_register(&mut self, index: u8, value: u32) {
        self.registers[index as usize] = value;
    }

    fn byte(&self, address: u32) -> u8 {
        self.memory.get(&address).copied().unwrap_or(0)
    }

    fn read_word(&self, address: u32) -> u32 {
        match address {
            Dhcsr::ADDRESS => {
                let mut dhcsr = self.dhcsr_control;

                if self.is_halted {
                    dhcsr |= 1 << 17;
                }

                // Always set S_REGRDY, and say that a register value can
                // be read.
                dhcsr |= 1 << 16;

                tracing::trace!("[read_word] <DHCSR> = {:#010x}", dhcsr);
                dhcsr
            }
            _ => {
                let mut bytes = [0; 4];
                for (offset, byte) in bytes.iter_mut().enumerate() {
                    *byte = self.byte(address.wrapping_add(offset as u32));
                }
                u32::from_le_bytes(bytes)
            }
        }
    }

    fn write_word(&mut self, address: u32, value: u32) {
        match address {
            Dhcsr::ADDRESS => self.write_dhcsr(Dhcsr(value)),
            Aircr::ADDRESS => {
                let aircr = Aircr(value);
                if aircr.has_vectkey() && aircr.sysresetreq() {
                    let demcr = Demcr(self.read_word(Demcr::ADDRESS));
                    let halted = demcr.vc_corereset() && !self.ignore_halt;

                    tracing::debug!("FakeProbe: System reset, halted: {}", halted);
                    self.registers = [0; CORE_REGISTER_COUNT];
                    self.is_halted = halted;
                    self.events.push(CoreEvent::Reset { halted });
                }
            }
            _ => self.load(address, &value.to_le_bytes()),
        }
    }

    fn write_dhcsr(&mut self, value: Dhcsr) {
        if !value.is_write_enabled() {
            tracing::trace!("FakeProbe: DHCSR write without debug key ignored");
            return;
        }

        // Mask out dbg key
        let dhcsr = Dhcsr(u32::from(value) & 0xffff);
        self.dhcsr_control = dhcsr.into();

        if !dhcsr.c_debugen() {
            self.is_halted = false;
            self.events.push(CoreEvent::NoDebug);
        } else if dhcsr.c_halt() {
            if !self.is_halted && !self.ignore_halt {
                self.is_halted = true;
                self.events.push(CoreEvent::Halt);
            }
        } else if dhcsr.c_step() {
            tracing::debug!("FakeProbe: Single step requested, setting s_halt");
            self.is_halted = true;
            self.events.push(CoreEvent::Step);
        } else if self.is_halted {
            self.is_halted = false;
            self.events.push(CoreEvent::Run);
        }
    }

    fn check_register_access(&self) -> Result<(), DebugProbeError> {
        if self.fail_register_access {
            Err(DebugProbeError::ProbeSpecific(
                "injected register access fault".into(),
            ))
        } else if !self.is_halted {
            Err(DebugProbeError::ProbeSpecific("core is not halted".into()))
        } else {
            Ok(())
        }
    }
}

impl ArmProbe for FakeProbe {
    fn read_8(&mut self, address: u32, data: &mut [u8]) -> Result<(), DebugProbeError> {
        self.operations.push(Operation::Read8 {
            address,
            len: data.len(),
        });
        for (offset, byte) in data.iter_mut().enumerate() {
            *byte = self.byte(address.wrapping_add(offset as u32));
        }
        Ok(())
    }

    fn write_8(&mut self, address: u32, data: &[u8]) -> Result<(), DebugProbeError> {
        self.operations.push(Operation::Write8 {
            address,
            data: data.to_vec(),
        });
        self.load(address, data);
        Ok(())
    }

    fn read_word_32(&mut self, address: u32) -> Result<u32, DebugProbeError> {
        self.operations.push(Operation::ReadWord { address });
        Ok(self.read_word(address))
    }

    fn write_word_32(&mut self, address: u32, value: u32) -> Result<(), DebugProbeError> {
        self.operations.push(Operation::WriteWord { address, value });
        self.write_word(address, value);
        Ok(())
    }

    fn read_core_reg(&mut self, index: u8) -> Result<u32, DebugProbeError> {
        self.operations.push(Operation::ReadReg { index });
        self.check_register_access()?;
        Ok(self.registers[usize::from(index) % CORE_REGISTER_COUNT])
    }

    fn write_core_reg(&mut self, index: u8, value: u32) -> Result<(), DebugProbeError> {
        self.operations.push(Operation::WriteReg { index, value });
        self.check_register_access()?;
        self.registers[usize::from(index) % CORE_REGISTER_COUNT] = value;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dhcsr_write_without_key_is_ignored() {
        let mut probe = FakeProbe::new();
        probe.write_word_32(Dhcsr::ADDRESS, 0b11).unwrap();

        assert!(!probe.is_halted());
        assert!(probe.events().is_empty());
    }

    #[test]
    fn word_and_byte_views_agree() {
        let mut probe = FakeProbe::new();
        probe.write_word_32(0x2000_0000, 0x0403_0201).unwrap();
        probe.write_8(0x2000_0004, &[5, 6, 7, 8]).unwrap();

        assert_eq!(probe.memory(0x2000_0000, 8), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(probe.read_word_32(0x2000_0004).unwrap(), 0x0807_0605);
    }

    #[test]
    fn halted_probe_reports_s_halt() {
        let mut probe = FakeProbe::halted();
        let dhcsr = Dhcsr(probe.read_word_32(Dhcsr::ADDRESS).unwrap());

        assert!(dhcsr.s_halt());
        assert!(dhcsr.s_regrdy());
        assert!(dhcsr.c_debugen());
    }

    #[test]
    fn register_fault_injection() {
        let mut probe = FakeProbe::halted();
        probe.set_register_fault(true);

        assert!(probe.read_core_reg(0).is_err());
        assert!(probe.write_core_reg(0, 1).is_err());
        assert_eq!(probe.register(0), 0);
    }
}
