//! The action language: `dump32:0x20000000:64`, `set8:0x20000000:1:2:3`,
//! `reg:all`, `reset:halt` and friends.
//!
//! Every action of a batch is run in order. The first failing action stops
//! the batch, later actions are never attempted.

use std::{collections::HashMap, io::Write, time::Duration};

use swd_probe::DebugCore;

use crate::util::{
    hexdump::{HexDump, Width},
    parse::{parse_number, parse_size, parse_u32, parse_u8, ParseError},
};

/// Separates the action name and its parameters.
const DELIMITER: char = ':';

/// Help text listing all actions, shown by `swd --help`.
pub const ACTIONS_HELP: &str = "\
list of available actions:
  dump8:{addr}[:{size}]     print content of memory 8 bit register or dump
  dump16:{addr}[:{size}]    print content of memory 16 bit register or dump
  dump32:{addr}[:{size}]    print content of memory 32 bit register or dump
  dump:{addr}[:{size}]      print content of memory 32 bit register or 8 bit dump

  set8:{addr}:{data}[:{data}..]     set 8 bit memory
  set16:{addr}:{data}[:{data}..]    set 16 bit memory
  set32:{addr}:{data}[:{data}..]    set 32 bit memory
  set:{addr}:{data}[:{data}..]      set 32 bit memory register or 8 bit memory area

  fill8:{addr}:{size}:{pattern}     fill memory with 8 bit pattern

  reg:all                   print all core register
  reg:{reg}                 print content of core register
  reg:{reg}:{data}          set core register

  sleep:{seconds}           sleep (float) - insert delay between commands

  reset[:halt]              reset core or halt after reset
  run[:nodebug]             run core
  step[:{n}]                step core (n-times)
  halt                      halt core

  (numerical values can be in different formats, like: 42, 0x2a, 0o52, 0b101010, 32K, 1M, ..)
  (reg: R0, R1, ..., R12, SP, LR, PC, PSR, MSP, PSP)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Arity {
    #[error("no parameters")]
    Missing,
    #[error("too many parameters")]
    TooMany,
    #[error("require at least {0} parameters")]
    AtLeast(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Arity(#[from] Arity),
    #[error("action '{0}' is not implemented")]
    UnknownAction(String),
    #[error("{name} must be aligned to {align} Bytes")]
    Alignment { name: &'static str, align: usize },
    #[error("Wrong parameter '{0}'")]
    InvalidParameter(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Failed to access the target")]
    Core(#[from] swd_probe::Error),
    #[error("Failed to write the output")]
    Output(#[from] std::io::Error),
}

/// An action of a batch failed.
#[derive(Debug, thiserror::Error)]
#[error("Action '{action}' failed")]
pub struct BatchError {
    /// Name of the failed action.
    pub action: String,
    /// Position of the failed action in the batch.
    pub index: usize,
    pub source: ActionError,
}

/// Everything an action works with.
pub struct ActionContext<'a> {
    pub core: &'a mut dyn DebugCore,
    pub out: &'a mut dyn Write,
    /// Verbosity of memory dumps, see [`HexDump`].
    pub verbose: u8,
}

impl<'a> ActionContext<'a> {
    pub fn new(core: &'a mut dyn DebugCore, out: &'a mut dyn Write, verbose: u8) -> Self {
        Self { core, out, verbose }
    }
}

trait Action {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionTag {
    Dump,
    Dump8,
    Dump16,
    Dump32,
    Set,
    Set8,
    Set16,
    Set32,
    Fill8,
    Reg,
    Reset,
    Run,
    Step,
    Halt,
    Sleep,
}

impl ActionTag {
    pub const ALL: [Self; 15] = [
        Self::Dump,
        Self::Dump8,
        Self::Dump16,
        Self::Dump32,
        Self::Set,
        Self::Set8,
        Self::Set16,
        Self::Set32,
        Self::Fill8,
        Self::Reg,
        Self::Reset,
        Self::Run,
        Self::Step,
        Self::Halt,
        Self::Sleep,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Dump => "dump",
            Self::Dump8 => "dump8",
            Self::Dump16 => "dump16",
            Self::Dump32 => "dump32",
            Self::Set => "set",
            Self::Set8 => "set8",
            Self::Set16 => "set16",
            Self::Set32 => "set32",
            Self::Fill8 => "fill8",
            Self::Reg => "reg",
            Self::Reset => "reset",
            Self::Run => "run",
            Self::Step => "step",
            Self::Halt => "halt",
            Self::Sleep => "sleep",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.name() == name)
    }

    fn handler(self) -> Box<dyn Action> {
        match self {
            Self::Dump => Box::new(DumpAny),
            Self::Dump8 => Box::new(Dump(Width::B8)),
            Self::Dump16 => Box::new(Dump(Width::B16)),
            Self::Dump32 => Box::new(Dump(Width::B32)),
            Self::Set => Box::new(SetAny),
            Self::Set8 => Box::new(Set(Width::B8)),
            Self::Set16 => Box::new(Set(Width::B16)),
            Self::Set32 => Box::new(Set(Width::B32)),
            Self::Fill8 => Box::new(Fill8),
            Self::Reg => Box::new(Reg),
            Self::Reset => Box::new(Reset),
            Self::Run => Box::new(Run),
            Self::Step => Box::new(Step),
            Self::Halt => Box::new(Halt),
            Self::Sleep => Box::new(Sleep),
        }
    }
}

/// Runs batches of actions against a core.
pub struct Engine {
    registry: HashMap<ActionTag, Box<dyn Action>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        let registry = ActionTag::ALL
            .into_iter()
            .map(|tag| (tag, tag.handler()))
            .collect();

        Self { registry }
    }

    /// Runs `actions` in order and returns how many were run.
    pub fn process<S: AsRef<str>>(
        &self,
        ctx: &mut ActionContext<'_>,
        actions: &[S],
    ) -> Result<usize, BatchError> {
        for (index, action) in actions.iter().enumerate() {
            let action = action.as_ref();
            tracing::debug!("{}", action);

            let mut parts = action.split(DELIMITER);
            let name = parts.next().unwrap_or_default();
            let params: Vec<&str> = parts.collect();

            let result = match ActionTag::from_name(name).and_then(|tag| self.registry.get(&tag)) {
                Some(handler) => handler.run(ctx, &params),
                None => Err(ActionError::UnknownAction(action.to_string())),
            };

            if let Err(source) = result {
                return Err(BatchError {
                    action: name.to_string(),
                    index,
                    source,
                });
            }
        }

        Ok(actions.len())
    }
}

fn check_alignment(value: usize, name: &'static str, width: Width) -> Result<(), ActionError> {
    let align = width.bytes();
    if value % align != 0 {
        return Err(ActionError::Alignment { name, align });
    }
    Ok(())
}

fn read_value(ctx: &mut ActionContext<'_>, address: u32, width: Width) -> Result<u32, ActionError> {
    let value = match width {
        Width::B32 if address % 4 == 0 => ctx.core.get_mem32(address)?,
        _ => ctx
            .core
            .read_mem(address, width.bytes())?
            .iter()
            .rev()
            .fold(0, |value, byte| value << 8 | u32::from(*byte)),
    };
    Ok(value)
}

/// `dump8`, `dump16` and `dump32`.
struct Dump(Width);

impl Action for Dump {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        let width = self.0;

        match params {
            [] => Err(Arity::Missing.into()),
            [address] => {
                let address = parse_u32(address)?;
                let value = read_value(ctx, address, width)?;

                let digits = 2 * width.bytes();
                writeln!(ctx.out, "{address:08x}: {value:0digits$x}")?;
                Ok(())
            }
            [address, size] => {
                let address = parse_u32(address)?;
                let size = parse_size(size)?;
                check_alignment(size, "Size", width)?;

                let data = ctx.core.read_mem(address, size)?;
                for line in HexDump::new(address, &data, width, ctx.verbose) {
                    writeln!(ctx.out, "{line}")?;
                }
                Ok(())
            }
            _ => Err(Arity::TooMany.into()),
        }
    }
}

/// `dump`: a single word, or a byte dump when a size is given.
struct DumpAny;

impl Action for DumpAny {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        match params.len() {
            0 => Err(Arity::Missing.into()),
            1 => Dump(Width::B32).run(ctx, params),
            2 => Dump(Width::B8).run(ctx, params),
            _ => Err(Arity::TooMany.into()),
        }
    }
}

/// `set8`, `set16` and `set32`.
struct Set(Width);

impl Action for Set {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        let width = self.0;

        let [address, values @ ..] = params else {
            return Err(Arity::AtLeast(2).into());
        };
        if values.is_empty() {
            return Err(Arity::AtLeast(2).into());
        }

        let address = parse_u32(address)?;

        if let (Width::B32, [value]) = (width, values) {
            if address % 4 == 0 {
                ctx.core.set_mem32(address, parse_u32(value)?)?;
                return Ok(());
            }
        }

        let mut data = Vec::with_capacity(values.len() * width.bytes());
        for value in values {
            let value = parse_number(value, width.bits())?;
            data.extend_from_slice(&value.to_le_bytes()[..width.bytes()]);
        }

        ctx.core.write_mem(address, &data)?;
        Ok(())
    }
}

/// `set`: a single word, or bytes when more than one value is given.
struct SetAny;

impl Action for SetAny {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        match params.len() {
            0 => Err(Arity::Missing.into()),
            1 => Err(Arity::AtLeast(2).into()),
            2 => Set(Width::B32).run(ctx, params),
            _ => Set(Width::B8).run(ctx, params),
        }
    }
}

struct Fill8;

impl Action for Fill8 {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        let [address, size, pattern @ ..] = params else {
            return Err(Arity::AtLeast(3).into());
        };
        if pattern.is_empty() {
            return Err(Arity::AtLeast(3).into());
        }

        let address = parse_u32(address)?;
        let size = parse_size(size)?;
        let pattern = pattern
            .iter()
            .map(|value| parse_u8(value))
            .collect::<Result<Vec<_>, _>>()?;

        ctx.core.fill_mem(address, &pattern, size)?;
        Ok(())
    }
}

/// `reg`: register access, halting a running core for the time of the
/// access.
struct Reg;

enum RegAccess<'a> {
    All,
    Read(&'a str),
    Write(&'a str, &'a str),
}

impl<'a> RegAccess<'a> {
    fn from_params(params: &[&'a str]) -> Result<Self, ActionError> {
        match *params {
            [] => Err(Arity::Missing.into()),
            ["all"] => Ok(Self::All),
            [name] => Ok(Self::Read(name)),
            [name, value] => Ok(Self::Write(name, value)),
            _ => Err(Arity::TooMany.into()),
        }
    }
}

impl Reg {
    fn access(ctx: &mut ActionContext<'_>, access: RegAccess<'_>) -> Result<(), ActionError> {
        match access {
            RegAccess::All => {
                for (name, value) in ctx.core.get_reg_all()? {
                    writeln!(ctx.out, "{name}: {value:08x}")?;
                }
            }
            RegAccess::Read(name) => {
                let value = ctx.core.get_reg(name)?;
                writeln!(ctx.out, "{name}: {value:08x}")?;
            }
            RegAccess::Write(name, value) => {
                let value = parse_u32(value)?;
                ctx.core.set_reg(name, value)?;
            }
        }
        Ok(())
    }
}

impl Action for Reg {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        let access = RegAccess::from_params(params)?;

        let was_halted = ctx.core.is_halted()?;
        if !was_halted {
            ctx.core.halt()?;
        }

        let result = Self::access(ctx, access);

        // Only resume a core halted here, the user may have halted it on purpose.
        let resumed = if was_halted {
            Ok(())
        } else {
            ctx.core.run().map_err(ActionError::from)
        };

        result.and(resumed)
    }
}

struct Reset;

impl Action for Reset {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        match params {
            [] => ctx.core.reset()?,
            ["halt"] => ctx.core.reset_halt()?,
            [other] => return Err(ActionError::InvalidParameter(other.to_string())),
            _ => return Err(Arity::TooMany.into()),
        }
        Ok(())
    }
}

struct Run;

impl Action for Run {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        match params {
            [] => ctx.core.run()?,
            ["nodebug"] => ctx.core.nodebug()?,
            [other] => return Err(ActionError::InvalidParameter(other.to_string())),
            _ => return Err(Arity::TooMany.into()),
        }
        Ok(())
    }
}

struct Step;

impl Action for Step {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        let count = match params {
            [] => 1,
            [count] => parse_u32(count)?,
            _ => return Err(Arity::TooMany.into()),
        };

        for _ in 0..count {
            ctx.core.step()?;
        }
        Ok(())
    }
}

struct Halt;

impl Action for Halt {
    fn run(&self, ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        if !params.is_empty() {
            return Err(Arity::TooMany.into());
        }
        ctx.core.halt()?;
        Ok(())
    }
}

/// `sleep`: blocks the batch, one second if no duration is given.
struct Sleep;

impl Sleep {
    fn duration(text: &str) -> Result<Duration, ParseError> {
        text.parse::<f64>()
            .ok()
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
            .ok_or_else(|| ParseError::Format(text.to_string()))
    }
}

impl Action for Sleep {
    fn run(&self, _ctx: &mut ActionContext<'_>, params: &[&str]) -> Result<(), ActionError> {
        let duration = match params {
            [] => Duration::from_secs(1),
            [seconds] => Self::duration(seconds)?,
            _ => return Err(Arity::TooMany.into()),
        };

        tracing::debug!("Sleeping for {:?}", duration);
        std::thread::sleep(duration);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use swd_probe::{CoreEvent, CortexM, FakeProbe, Operation};
    use test_case::test_case;

    struct Harness {
        core: CortexM<FakeProbe>,
        out: Vec<u8>,
        verbose: u8,
    }

    impl Harness {
        fn new(probe: FakeProbe) -> Self {
            Self {
                core: CortexM::new(probe),
                out: Vec::new(),
                verbose: 0,
            }
        }

        fn process(&mut self, actions: &[&str]) -> Result<usize, BatchError> {
            let mut ctx = ActionContext::new(&mut self.core, &mut self.out, self.verbose);
            Engine::new().process(&mut ctx, actions)
        }

        fn output(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.out)
                .lines()
                .map(str::to_string)
                .collect()
        }

        fn probe(&self) -> &FakeProbe {
            self.core.probe()
        }
    }

    fn harness() -> Harness {
        Harness::new(FakeProbe::halted())
    }

    #[test]
    fn every_tag_has_a_name() {
        for tag in ActionTag::ALL {
            assert_eq!(ActionTag::from_name(tag.name()), Some(tag));
        }
        assert_eq!(ActionTag::from_name("Dump"), None);
    }

    #[test]
    fn set_and_read_back_word() {
        let mut harness = harness();

        let count = harness
            .process(&[
                "dump32:0x20000000:16",
                "set32:0x20000000:0xdeadbeef",
                "dump32:0x20000000",
            ])
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(
            harness.output(),
            vec![
                format!("20000000  {:<35}  {}", ["00000000"; 4].join(" "), ".".repeat(16)),
                "20000000: deadbeef".to_string(),
            ]
        );
        assert!(harness.probe().operations().contains(&Operation::WriteWord {
            address: 0x2000_0000,
            value: 0xdead_beef
        }));
    }

    #[test]
    fn unaligned_word_dump_reads_bytes() {
        let mut probe = FakeProbe::halted();
        probe.load(0x2000_0001, &[0x11, 0x22, 0x33, 0x44]);
        let mut harness = Harness::new(probe);

        harness.process(&["dump32:0x20000001"]).unwrap();

        assert_eq!(harness.output(), vec!["20000001: 44332211"]);
        assert_eq!(
            harness.probe().operations(),
            &[Operation::Read8 {
                address: 0x2000_0001,
                len: 4
            }]
        );
    }

    #[test]
    fn narrow_dumps() {
        let mut probe = FakeProbe::halted();
        probe.load(0x2000_0000, &[0x34, 0x12]);
        let mut harness = Harness::new(probe);

        harness
            .process(&["dump16:0x20000000", "dump8:0x20000001", "dump:0x20000000"])
            .unwrap();

        assert_eq!(
            harness.output(),
            vec![
                "20000000: 1234",
                "20000001: 12",
                "20000000: 00001234"
            ]
        );
    }

    #[test]
    fn dump_with_size_is_a_byte_dump() {
        let mut probe = FakeProbe::halted();
        probe.load(0x2000_0000, b"ABCD");
        let mut harness = Harness::new(probe);

        harness.process(&["dump:0x20000000:4"]).unwrap();

        assert_eq!(
            harness.output(),
            vec![format!("20000000  {:<47}  ABCD", "41 42 43 44")]
        );
    }

    #[test]
    fn verbose_dump_prints_every_line() {
        let mut harness = harness();
        harness.verbose = 2;

        harness.process(&["dump8:0:32"]).unwrap();

        let output = harness.output();
        assert_eq!(output.len(), 3);
        assert_eq!(output[2], "00000020");
    }

    #[test_case("dump32:0x20000000:6", "Size", 4)]
    #[test_case("dump16:0x20000000:3", "Size", 2)]
    fn dump_size_alignment(action: &str, expected_name: &str, expected_align: usize) {
        let err = harness().process(&[action]).unwrap_err();

        assert!(matches!(
            err.source,
            ActionError::Alignment { name, align } if name == expected_name && align == expected_align
        ));
    }

    #[test]
    fn byte_dump_needs_no_alignment() {
        assert!(harness().process(&["dump8:0x20000001:3"]).is_ok());
    }

    #[test]
    fn set_widths() {
        let mut harness = harness();

        harness
            .process(&[
                "set8:0x20000000:1:2:0x3",
                "set16:0x20000004:0x1234:0x5678",
                "set32:0x20000009:0xaabbccdd",
            ])
            .unwrap();

        assert_eq!(
            harness.probe().memory(0x2000_0000, 13),
            vec![1, 2, 3, 0, 0x34, 0x12, 0x78, 0x56, 0, 0xdd, 0xcc, 0xbb, 0xaa]
        );
    }

    #[test]
    fn set32_with_several_values_writes_bytes() {
        let mut harness = harness();

        harness.process(&["set32:0x20000000:1:2"]).unwrap();

        assert_eq!(
            harness.probe().operations(),
            &[Operation::Write8 {
                address: 0x2000_0000,
                data: vec![1, 0, 0, 0, 2, 0, 0, 0]
            }]
        );
    }

    #[test]
    fn set_dispatches_by_value_count() {
        let mut harness = harness();

        harness
            .process(&["set:0x20000000:0x12345678", "set:0x20000010:1:2"])
            .unwrap();

        assert_eq!(
            harness.probe().operations(),
            &[
                Operation::WriteWord {
                    address: 0x2000_0000,
                    value: 0x1234_5678
                },
                Operation::Write8 {
                    address: 0x2000_0010,
                    data: vec![1, 2]
                },
            ]
        );
    }

    #[test_case("set8:0x20000000:256", 8)]
    #[test_case("set16:0x20000000:0x10000", 16)]
    #[test_case("set:0x20000000:1:0x100", 8)]
    fn set_value_range(action: &str, expected_bits: u32) {
        let err = harness().process(&[action]).unwrap_err();

        assert!(matches!(
            err.source,
            ActionError::Parse(ParseError::Range { max_bits, .. }) if max_bits == expected_bits
        ));
    }

    #[test_case("set8:0x20000000:-1"; "negative value")]
    #[test_case("dump:-4"; "negative address")]
    #[test_case("dump8:0x20000000:-0"; "negative zero size")]
    fn negative_numbers_are_rejected(action: &str) {
        let mut harness = harness();
        let err = harness.process(&[action]).unwrap_err();

        assert!(
            matches!(err.source, ActionError::Parse(ParseError::Format(_))),
            "{err:?}"
        );
        assert!(harness.probe().operations().is_empty());
    }

    #[test]
    fn fill_pattern() {
        let mut harness = harness();

        harness.process(&["fill8:0x20000000:5:0xaa:0x55"]).unwrap();

        assert_eq!(
            harness.probe().memory(0x2000_0000, 6),
            vec![0xaa, 0x55, 0xaa, 0x55, 0xaa, 0]
        );
    }

    #[test_case("dump"; "dump")]
    #[test_case("dump32"; "dump32")]
    #[test_case("dump8:0:1:2"; "dump too many")]
    #[test_case("set"; "set")]
    #[test_case("set:0x20000000"; "set single")]
    #[test_case("set8:0x20000000"; "set8 single")]
    #[test_case("fill8:0x20000000:4"; "fill8 without pattern")]
    #[test_case("reg"; "reg")]
    #[test_case("reg:R0:1:2"; "reg too many")]
    #[test_case("reset:halt:now"; "reset too many")]
    #[test_case("step:1:2"; "step too many")]
    #[test_case("halt:1"; "halt with parameter")]
    #[test_case("sleep:1:2"; "sleep too many")]
    fn arity_errors(action: &str) {
        let mut harness = harness();
        let err = harness.process(&[action]).unwrap_err();

        assert!(matches!(err.source, ActionError::Arity(_)), "{err:?}");
        assert!(harness.probe().events().is_empty());
    }

    #[test]
    fn reg_on_running_core_halts_and_resumes() {
        let mut harness = Harness::new(FakeProbe::new());

        harness.process(&["reg:R0"]).unwrap();

        assert_eq!(harness.output(), vec!["R0: 00000000"]);
        assert_eq!(
            harness.probe().events(),
            vec![CoreEvent::Halt, CoreEvent::Run]
        );
        assert!(!harness.probe().is_halted());
    }

    #[test]
    fn reg_on_halted_core_leaves_it_halted() {
        let mut probe = FakeProbe::halted();
        probe.set_register(15, 0x0800_0100);
        let mut harness = Harness::new(probe);

        harness.process(&["reg:pc"]).unwrap();

        assert_eq!(harness.output(), vec!["pc: 08000100"]);
        assert!(harness.probe().events().is_empty());
        assert!(harness.probe().is_halted());
    }

    #[test]
    fn reg_all_and_write() {
        let mut harness = harness();

        harness.process(&["reg:R12:0x42", "reg:all"]).unwrap();

        let output = harness.output();
        assert_eq!(output.len(), 19);
        assert_eq!(output[0], "R0: 00000000");
        assert_eq!(output[12], "R12: 00000042");
        assert_eq!(output[18], "PSP: 00000000");
        assert_eq!(harness.probe().register(12), 0x42);
    }

    #[test]
    fn reg_resumes_core_after_failed_access() {
        let mut probe = FakeProbe::new();
        probe.set_register_fault(true);
        let mut harness = Harness::new(probe);

        let err = harness.process(&["reg:R0"]).unwrap_err();

        assert!(matches!(err.source, ActionError::Core(_)));
        assert_eq!(
            harness.probe().events(),
            vec![CoreEvent::Halt, CoreEvent::Run]
        );
    }

    #[test]
    fn unknown_register() {
        let err = harness().process(&["reg:R42"]).unwrap_err();

        assert!(matches!(
            err.source,
            ActionError::Core(swd_probe::Error::UnknownRegister(name)) if name == "R42"
        ));
    }

    #[test]
    fn run_control() {
        let mut harness = Harness::new(FakeProbe::new());

        harness
            .process(&["halt", "step", "step:3", "run", "reset:halt", "run:nodebug", "reset"])
            .unwrap();

        assert_eq!(
            harness.probe().events(),
            vec![
                CoreEvent::Halt,
                CoreEvent::Step,
                CoreEvent::Step,
                CoreEvent::Step,
                CoreEvent::Step,
                CoreEvent::Run,
                CoreEvent::Halt,
                CoreEvent::Reset { halted: true },
                CoreEvent::NoDebug,
                CoreEvent::Reset { halted: false },
            ]
        );
    }

    #[test_case("reset:soft", "soft")]
    #[test_case("run:fast", "fast")]
    fn invalid_parameters(action: &str, expected: &str) {
        let err = harness().process(&[action]).unwrap_err();

        assert!(matches!(
            err.source,
            ActionError::InvalidParameter(parameter) if parameter == expected
        ));
    }

    #[test]
    fn sleep_accepts_fractions() {
        assert!(harness().process(&["sleep:0.01", "sleep:0"]).is_ok());
    }

    #[test_case("sleep:soon")]
    #[test_case("sleep:-1")]
    fn sleep_rejects_bad_durations(action: &str) {
        let err = harness().process(&[action]).unwrap_err();

        assert!(matches!(err.source, ActionError::Parse(ParseError::Format(_))));
    }

    #[test]
    fn unknown_action_aborts_batch() {
        let mut harness = harness();

        let err = harness
            .process(&["set8:0x20000000:1", "erase:all", "set8:0x20000000:2"])
            .unwrap_err();

        assert_eq!(err.action, "erase");
        assert_eq!(err.index, 1);
        assert!(matches!(
            err.source,
            ActionError::UnknownAction(ref action) if action == "erase:all"
        ));
        assert_eq!(harness.probe().memory(0x2000_0000, 1), vec![1]);
    }

    #[test]
    fn failure_aborts_remaining_actions() {
        let mut harness = harness();

        let err = harness
            .process(&["dump8:0x20000000", "dump8:zzz", "dump8:0x20000000"])
            .unwrap_err();

        assert_eq!(err.action, "dump8");
        assert_eq!(err.index, 1);
        assert_eq!(err.to_string(), "Action 'dump8' failed");
        assert_eq!(harness.output(), vec!["20000000: 00"]);
    }

    #[test]
    fn empty_batch() {
        assert_eq!(harness().process(&[]).unwrap(), 0);
    }
}
