//! Cortex-M run control through the debug registers of the System Control Space.

use crate::{
    core::{
        registers::{CoreRegister, CORTEX_M_CORE_REGISTERS},
        DebugCore,
    },
    memory::ArmProbe,
    Error,
};

use bitfield::bitfield;
use std::time::{Duration, Instant};

bitfield! {
    /// Debug Halting Control and Status Register, DHCSR (see armv7-M Architecture Reference Manual C1.6.2)
    ///
    /// To write this register successfully, you need to set the debug key via [`Dhcsr::enable_write`] first!
    #[derive(Copy, Clone)]
    pub struct Dhcsr(u32);
    impl Debug;
    /// The processor is locked up because of an unrecoverable exception.
    pub s_lockup, _: 19;
    /// The processor is sleeping.
    pub s_sleep, _: 18;
    /// The processor is in Debug state.
    pub s_halt, _: 17;
    /// The last core register transfer is complete.
    pub s_regrdy, _: 16;
    /// Mask PendSV, SysTick and external interrupts while stepping.
    pub c_maskints, set_c_maskints: 3;
    pub c_step, set_c_step: 2;
    pub c_halt, set_c_halt: 1;
    pub c_debugen, set_c_debugen: 0;
}

impl Dhcsr {
    pub const ADDRESS: u32 = 0xE000_EDF0;

    /// This function sets the bit to enable writes to this register.
    ///
    /// C1.6.3 Debug Halting Control and Status Register, DHCSR:
    /// Debug key:
    /// Software must write 0xA05F to this field to enable write accesses to bits
    /// [15:0], otherwise the processor ignores the write access.
    pub fn enable_write(&mut self) {
        self.0 &= !(0xffff << 16);
        self.0 |= 0xa05f << 16;
    }

    /// Whether the debug key is present, i.e. a write of this value takes effect.
    pub fn is_write_enabled(&self) -> bool {
        self.0 >> 16 == 0xa05f
    }
}

impl From<u32> for Dhcsr {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Dhcsr> for u32 {
    fn from(value: Dhcsr) -> Self {
        value.0
    }
}

bitfield! {
    /// Application Interrupt and Reset Control Register, AIRCR (see armv7-M Architecture Reference Manual B3.2.6)
    ///
    /// [`Aircr::vectkey`] must be called before this register can effectively be written!
    #[derive(Copy, Clone)]
    pub struct Aircr(u32);
    impl Debug;
    get_vectkeystat, set_vectkey: 31,16;
    pub sysresetreq, set_sysresetreq: 2;
}

impl Aircr {
    pub const ADDRESS: u32 = 0xE000_ED0C;

    /// Must be called before writing the register.
    pub fn vectkey(&mut self) {
        self.set_vectkey(0x05FA);
    }

    /// Whether the vector key of a written value is correct (see [`Aircr::vectkey`])
    pub fn has_vectkey(&self) -> bool {
        self.get_vectkeystat() == 0x05FA
    }
}

impl From<u32> for Aircr {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Aircr> for u32 {
    fn from(value: Aircr) -> Self {
        value.0
    }
}

bitfield! {
    /// Debug Exception and Monitor Control Register, DEMCR (see armv7-M Architecture Reference Manual C1.6.5)
    #[derive(Copy, Clone)]
    pub struct Demcr(u32);
    impl Debug;
    /// Enable Reset Vector Catch
    pub vc_corereset, set_vc_corereset: 0;
}

impl Demcr {
    pub const ADDRESS: u32 = 0xE000_EDFC;
}

impl From<u32> for Demcr {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Demcr> for u32 {
    fn from(value: Demcr) -> Self {
        value.0
    }
}

/// Fill writes are issued in pieces of this many bytes.
const FILL_CHUNK_SIZE: usize = 4096;

/// A Cortex-M core behind a probe.
///
/// The core owns the probe for as long as it lives; dropping it drops the
/// probe and with it the USB session.
#[derive(Debug)]
pub struct CortexM<P: ArmProbe> {
    probe: P,
    timeout: Duration,
}

impl<P: ArmProbe> CortexM<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            timeout: Duration::from_millis(500),
        }
    }

    /// How long [`DebugCore::halt`] and friends wait for the core.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn probe_mut(&mut self) -> &mut P {
        &mut self.probe
    }

    fn read_dhcsr(&mut self) -> Result<Dhcsr, Error> {
        Ok(Dhcsr(self.probe.read_word_32(Dhcsr::ADDRESS)?))
    }

    fn write_dhcsr(&mut self, mut value: Dhcsr) -> Result<(), Error> {
        value.enable_write();
        tracing::trace!("DHCSR <- {:08x}", value.0);
        self.probe.write_word_32(Dhcsr::ADDRESS, value.into())?;
        Ok(())
    }

    fn wait_for_core_halted(&mut self, operation: &'static str) -> Result<(), Error> {
        // Wait until halted state is active again.
        let start = Instant::now();

        while !self.is_halted()? {
            if start.elapsed() >= self.timeout {
                return Err(Error::Timeout(operation));
            }
            // Wait a bit before polling again.
            std::thread::sleep(Duration::from_millis(1));
        }

        Ok(())
    }

    fn set_reset_catch(&mut self, enabled: bool) -> Result<(), Error> {
        let mut demcr = Demcr(self.probe.read_word_32(Demcr::ADDRESS)?);
        demcr.set_vc_corereset(enabled);
        self.probe.write_word_32(Demcr::ADDRESS, demcr.into())?;
        Ok(())
    }

    fn request_system_reset(&mut self) -> Result<(), Error> {
        let mut aircr = Aircr(0);
        aircr.vectkey();
        aircr.set_sysresetreq(true);

        self.probe.write_word_32(Aircr::ADDRESS, aircr.into())?;
        Ok(())
    }
}

impl<P: ArmProbe> DebugCore for CortexM<P> {
    fn read_mem(&mut self, address: u32, size: usize) -> Result<Vec<u8>, Error> {
        let mut data = vec![0; size];
        self.probe.read_8(address, &mut data)?;
        Ok(data)
    }

    fn write_mem(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        self.probe.write_8(address, data)?;
        Ok(())
    }

    fn get_mem32(&mut self, address: u32) -> Result<u32, Error> {
        Ok(self.probe.read_word_32(address)?)
    }

    fn set_mem32(&mut self, address: u32, value: u32) -> Result<(), Error> {
        self.probe.write_word_32(address, value)?;
        Ok(())
    }

    fn fill_mem(&mut self, address: u32, pattern: &[u8], size: usize) -> Result<(), Error> {
        if pattern.is_empty() {
            return Ok(());
        }

        let mut offset = 0;
        while offset < size {
            let end = size.min(offset + FILL_CHUNK_SIZE);
            let chunk: Vec<u8> = (offset..end).map(|i| pattern[i % pattern.len()]).collect();

            self.probe
                .write_8(address.wrapping_add(offset as u32), &chunk)?;

            offset = end;
        }

        Ok(())
    }

    fn get_reg(&mut self, name: &str) -> Result<u32, Error> {
        let register = CoreRegister::from_name(name)?;
        Ok(self.probe.read_core_reg(register.id)?)
    }

    fn set_reg(&mut self, name: &str, value: u32) -> Result<(), Error> {
        let register = CoreRegister::from_name(name)?;
        self.probe.write_core_reg(register.id, value)?;
        Ok(())
    }

    fn get_reg_all(&mut self) -> Result<Vec<(&'static str, u32)>, Error> {
        CORTEX_M_CORE_REGISTERS
            .iter()
            .map(|register| -> Result<_, Error> {
                Ok((register.name, self.probe.read_core_reg(register.id)?))
            })
            .collect()
    }

    fn halt(&mut self) -> Result<(), Error> {
        let mut value = Dhcsr(0);
        value.set_c_halt(true);
        value.set_c_debugen(true);
        self.write_dhcsr(value)?;

        self.wait_for_core_halted("halt")
    }

    fn run(&mut self) -> Result<(), Error> {
        let dhcsr = self.read_dhcsr()?;

        // C_MASKINTS may only change while C_HALT stays set.
        if dhcsr.c_maskints() {
            let mut value = Dhcsr(0);
            value.set_c_halt(true);
            value.set_c_debugen(true);
            self.write_dhcsr(value)?;
        }

        let mut value = Dhcsr(0);
        value.set_c_debugen(true);
        self.write_dhcsr(value)
    }

    fn nodebug(&mut self) -> Result<(), Error> {
        self.write_dhcsr(Dhcsr(0))
    }

    fn reset(&mut self) -> Result<(), Error> {
        tracing::debug!("Requesting system reset");
        self.request_system_reset()
    }

    fn reset_halt(&mut self) -> Result<(), Error> {
        self.halt()?;

        // Set the vc_corereset bit in the DEMCR register.
        // This will halt the core after reset.
        self.set_reset_catch(true)?;
        self.request_system_reset()?;

        let halted = self.wait_for_core_halted("halt after reset");

        self.set_reset_catch(false)?;
        halted
    }

    fn step(&mut self) -> Result<(), Error> {
        let dhcsr = self.read_dhcsr()?;

        if !dhcsr.c_debugen() {
            tracing::warn!("Attempting to STEP while DHCSR->C_DEBUGEN is false");
        }

        // Interrupts stay masked while stepping, run() clears this again.
        if !dhcsr.c_maskints() {
            let mut value = Dhcsr(0);
            value.set_c_halt(true);
            value.set_c_debugen(true);
            value.set_c_maskints(true);
            self.write_dhcsr(value)?;
        }

        let mut value = Dhcsr(0);
        value.set_c_step(true);
        value.set_c_debugen(true);
        value.set_c_maskints(true);
        self.write_dhcsr(value)?;

        self.wait_for_core_halted("step")
    }

    fn is_halted(&mut self) -> Result<bool, Error> {
        let dhcsr = self.read_dhcsr()?;

        if dhcsr.s_lockup() {
            tracing::warn!("The core is in locked up status as a result of an unrecoverable exception");
        } else if dhcsr.s_sleep() {
            tracing::debug!("The core is sleeping");
        }

        Ok(dhcsr.s_halt())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::probe::fake_probe::{CoreEvent, FakeProbe, Operation};
    use pretty_assertions::assert_eq;

    fn core() -> CortexM<FakeProbe> {
        CortexM::new(FakeProbe::new())
    }

    #[test]
    fn dhcsr_key() {
        let mut dhcsr = Dhcsr(0x1234_0003);
        assert!(!dhcsr.is_write_enabled());
        dhcsr.enable_write();
        assert_eq!(dhcsr.0, 0xA05F_0003);
        assert!(dhcsr.is_write_enabled());
    }

    #[test]
    fn aircr_reset_request() {
        let mut aircr = Aircr(0);
        aircr.vectkey();
        aircr.set_sysresetreq(true);
        assert_eq!(u32::from(aircr), 0x05FA_0004);
        assert!(aircr.has_vectkey());
    }

    #[test]
    fn halt_and_run() {
        let mut core = core();
        assert!(!core.is_halted().unwrap());

        core.halt().unwrap();
        assert!(core.is_halted().unwrap());

        core.run().unwrap();
        assert!(!core.is_halted().unwrap());

        assert_eq!(core.probe().events(), vec![CoreEvent::Halt, CoreEvent::Run]);
    }

    #[test]
    fn step_leaves_core_halted() {
        let mut core = CortexM::new(FakeProbe::halted());

        core.step().unwrap();
        core.step().unwrap();

        assert!(core.is_halted().unwrap());
        assert_eq!(
            core.probe().events(),
            vec![CoreEvent::Step, CoreEvent::Step]
        );
    }

    #[test]
    fn run_after_step_unmasks_interrupts() {
        let mut core = CortexM::new(FakeProbe::halted());
        core.step().unwrap();
        core.run().unwrap();

        let dhcsr = Dhcsr(core.probe_mut().read_word_32(Dhcsr::ADDRESS).unwrap());
        assert!(!dhcsr.c_maskints());
        assert!(dhcsr.c_debugen());
        assert!(!core.is_halted().unwrap());
    }

    #[test]
    fn nodebug_disables_debug() {
        let mut core = CortexM::new(FakeProbe::halted());
        core.nodebug().unwrap();

        assert!(!core.is_halted().unwrap());
        assert_eq!(core.probe().events(), vec![CoreEvent::NoDebug]);
    }

    #[test]
    fn reset_halt_catches_reset_vector() {
        let mut core = core();
        core.reset_halt().unwrap();

        assert!(core.is_halted().unwrap());
        assert_eq!(
            core.probe().events(),
            vec![CoreEvent::Halt, CoreEvent::Reset { halted: true }]
        );
        // Reset catch is cleared again.
        let demcr = Demcr(core.probe_mut().read_word_32(Demcr::ADDRESS).unwrap());
        assert!(!demcr.vc_corereset());
    }

    #[test]
    fn reset_lets_core_run() {
        let mut core = CortexM::new(FakeProbe::halted());
        core.reset().unwrap();

        assert!(!core.is_halted().unwrap());
        assert_eq!(
            core.probe().events(),
            vec![CoreEvent::Reset { halted: false }]
        );
    }

    #[test]
    fn memory_roundtrip_unaligned() {
        let mut core = core();
        core.write_mem(0x2000_0001, &[1, 2, 3]).unwrap();

        assert_eq!(core.read_mem(0x2000_0000, 5).unwrap(), vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn word_access_uses_single_transfer() {
        let mut core = core();
        core.set_mem32(0x2000_0000, 0xdead_beef).unwrap();

        assert_eq!(core.get_mem32(0x2000_0000).unwrap(), 0xdead_beef);
        assert_eq!(
            core.read_mem(0x2000_0000, 4).unwrap(),
            vec![0xef, 0xbe, 0xad, 0xde]
        );
        assert_eq!(
            &core.probe().operations()[..2],
            &[
                Operation::WriteWord {
                    address: 0x2000_0000,
                    value: 0xdead_beef
                },
                Operation::ReadWord {
                    address: 0x2000_0000
                },
            ]
        );
    }

    #[test]
    fn fill_repeats_pattern() {
        let mut core = core();
        core.fill_mem(0x2000_0000, &[0xaa, 0xbb, 0xcc], 7).unwrap();

        assert_eq!(
            core.read_mem(0x2000_0000, 8).unwrap(),
            vec![0xaa, 0xbb, 0xcc, 0xaa, 0xbb, 0xcc, 0xaa, 0x00]
        );
    }

    #[test]
    fn fill_larger_than_one_chunk() {
        let mut core = core();
        let size = FILL_CHUNK_SIZE + 3;
        core.fill_mem(0x2000_0000, &[1, 2], size).unwrap();

        let data = core.read_mem(0x2000_0000, size).unwrap();
        assert!(data.iter().enumerate().all(|(i, b)| *b == [1, 2][i % 2]));
    }

    #[test]
    fn registers_by_name() {
        let mut core = CortexM::new(FakeProbe::halted());
        core.set_reg("r3", 0x42).unwrap();

        assert_eq!(core.get_reg("R3").unwrap(), 0x42);
        assert!(matches!(
            core.get_reg("R99"),
            Err(Error::UnknownRegister(_))
        ));

        let all = core.get_reg_all().unwrap();
        assert_eq!(all.len(), 19);
        assert_eq!(all[3], ("R3", 0x42));
        assert_eq!(all[18].0, "PSP");
    }

    #[test]
    fn register_access_needs_halted_core() {
        let mut core = core();
        assert!(core.get_reg("PC").is_err());
    }

    #[test]
    fn halt_times_out_on_stuck_core() {
        let mut probe = FakeProbe::new();
        probe.set_ignore_halt(true);
        let mut core = CortexM::new(probe).with_timeout(Duration::from_millis(5));

        assert!(matches!(core.halt(), Err(Error::Timeout("halt"))));
    }
}
