//! Cortex-M core register names and their debug register selectors.

use crate::Error;

/// A core register as addressed through the probe's core register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreRegister {
    pub name: &'static str,
    /// Register selector used by the probe, see DCRSR.REGSEL.
    pub id: u8,
}

pub(crate) const PC: CoreRegister = CoreRegister { name: "PC", id: 15 };

/// All registers printed by `reg:all`, in selector order.
pub static CORTEX_M_CORE_REGISTERS: &[CoreRegister] = &[
    CoreRegister { name: "R0", id: 0 },
    CoreRegister { name: "R1", id: 1 },
    CoreRegister { name: "R2", id: 2 },
    CoreRegister { name: "R3", id: 3 },
    CoreRegister { name: "R4", id: 4 },
    CoreRegister { name: "R5", id: 5 },
    CoreRegister { name: "R6", id: 6 },
    CoreRegister { name: "R7", id: 7 },
    CoreRegister { name: "R8", id: 8 },
    CoreRegister { name: "R9", id: 9 },
    CoreRegister { name: "R10", id: 10 },
    CoreRegister { name: "R11", id: 11 },
    CoreRegister { name: "R12", id: 12 },
    CoreRegister { name: "SP", id: 13 },
    CoreRegister { name: "LR", id: 14 },
    PC,
    CoreRegister { name: "PSR", id: 16 },
    CoreRegister { name: "MSP", id: 17 },
    CoreRegister { name: "PSP", id: 18 },
];

impl CoreRegister {
    /// Looks up a register by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Result<&'static CoreRegister, Error> {
        CORTEX_M_CORE_REGISTERS
            .iter()
            .find(|register| register.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownRegister(name.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test_case("R0", 0)]
    #[test_case("r12", 12)]
    #[test_case("sp", 13)]
    #[test_case("Lr", 14)]
    #[test_case("PC", 15)]
    #[test_case("psr", 16)]
    #[test_case("PSP", 18)]
    fn lookup(name: &str, id: u8) {
        assert_eq!(CoreRegister::from_name(name).unwrap().id, id);
    }

    #[test]
    fn unknown_register() {
        assert!(matches!(
            CoreRegister::from_name("R13"),
            Err(Error::UnknownRegister(name)) if name == "R13"
        ));
        assert!(CoreRegister::from_name("all").is_err());
    }

    #[test]
    fn selectors_are_in_order() {
        for (index, register) in CORTEX_M_CORE_REGISTERS.iter().enumerate() {
            assert_eq!(register.id as usize, index);
        }
    }
}
