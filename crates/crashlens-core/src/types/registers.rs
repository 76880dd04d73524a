//! Canonical register snapshot built from debugger text output.

use std::collections::BTreeMap;

use super::Architecture;

/// Architecture-neutral role of a special-purpose register
///
/// Register dumps name the same role differently per architecture:
///
/// | Role           | x86-64   | x86      | ARM64        |
/// |----------------|----------|----------|--------------|
/// | FramePointer   | `rbp`    | `ebp`    | `fp` / `x29` |
/// | LinkRegister   | n/a      | n/a      | `lr` / `x30` |
/// | StackPointer   | `rsp`    | `esp`    | `sp`         |
/// | ProgramCounter | `rip`    | `eip`    | `pc`         |
/// | Status         | `rflags` | `eflags` | `cpsr`       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterRole
{
    FramePointer,
    LinkRegister,
    StackPointer,
    ProgramCounter,
    Status,
}

impl RegisterRole
{
    /// Classify a register name into its canonical role and the architecture
    /// family that uses that name.
    ///
    /// Returns `None` for general-purpose registers.
    #[must_use]
    pub fn classify(name: &str) -> Option<(Self, Architecture)>
    {
        let role = match name.to_ascii_lowercase().as_str() {
            "rbp" => (Self::FramePointer, Architecture::X64),
            "rsp" => (Self::StackPointer, Architecture::X64),
            "rip" => (Self::ProgramCounter, Architecture::X64),
            "rflags" => (Self::Status, Architecture::X64),
            "ebp" => (Self::FramePointer, Architecture::X86),
            "esp" => (Self::StackPointer, Architecture::X86),
            "eip" => (Self::ProgramCounter, Architecture::X86),
            "eflags" => (Self::Status, Architecture::X86),
            "fp" | "x29" => (Self::FramePointer, Architecture::Arm64),
            "lr" | "x30" => (Self::LinkRegister, Architecture::Arm64),
            "sp" => (Self::StackPointer, Architecture::Arm64),
            "pc" => (Self::ProgramCounter, Architecture::Arm64),
            "cpsr" | "pstate" => (Self::Status, Architecture::Arm64),
            _ => return None,
        };
        Some(role)
    }
}

/// Register values of one thread, normalized across architectures
///
/// Values are kept as bare lowercase hex digits and rendered with a `0x`
/// prefix by every accessor, which is the form collaborators print and feed
/// back into debugger commands.
///
/// ## Example
///
/// ```rust
/// use crashlens_core::output::parse_registers;
///
/// let regs = parse_registers("    rip = 0x00007F10AA001234\n    rax = 0x0000000000000001");
/// assert_eq!(regs.program_counter().as_deref(), Some("0x00007f10aa001234"));
/// assert_eq!(regs.general("rax").as_deref(), Some("0x0000000000000001"));
/// assert!(regs.link_register().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterSet
{
    frame_pointer: Option<String>,
    link_register: Option<String>,
    stack_pointer: Option<String>,
    program_counter: Option<String>,
    status_register: Option<String>,
    general: BTreeMap<String, String>,
    architecture: Architecture,
}

impl RegisterSet
{
    /// Create an empty register set.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Record one register value given as hex digits (with or without `0x`).
    ///
    /// Special registers are stored under their canonical role; every other
    /// name goes into the general-purpose map under its lowercase name.
    pub fn insert(&mut self, name: &str, hex: &str)
    {
        let digits = hex
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X")
            .to_ascii_lowercase();

        match RegisterRole::classify(name) {
            Some((role, family)) => {
                if self.architecture == Architecture::Unknown {
                    self.architecture = family;
                }
                *self.slot_mut(role) = Some(digits);
            }
            None => {
                self.general.insert(name.to_ascii_lowercase(), digits);
            }
        }
    }

    fn slot_mut(&mut self, role: RegisterRole) -> &mut Option<String>
    {
        match role {
            RegisterRole::FramePointer => &mut self.frame_pointer,
            RegisterRole::LinkRegister => &mut self.link_register,
            RegisterRole::StackPointer => &mut self.stack_pointer,
            RegisterRole::ProgramCounter => &mut self.program_counter,
            RegisterRole::Status => &mut self.status_register,
        }
    }

    fn slot(&self, role: RegisterRole) -> Option<&String>
    {
        match role {
            RegisterRole::FramePointer => self.frame_pointer.as_ref(),
            RegisterRole::LinkRegister => self.link_register.as_ref(),
            RegisterRole::StackPointer => self.stack_pointer.as_ref(),
            RegisterRole::ProgramCounter => self.program_counter.as_ref(),
            RegisterRole::Status => self.status_register.as_ref(),
        }
    }

    /// Rendered value (`0x…`) of a canonical register.
    #[must_use]
    pub fn get(&self, role: RegisterRole) -> Option<String>
    {
        self.slot(role).map(|digits| render(digits))
    }

    #[must_use]
    pub fn frame_pointer(&self) -> Option<String>
    {
        self.get(RegisterRole::FramePointer)
    }

    /// Only present for ARM64-style register dumps.
    #[must_use]
    pub fn link_register(&self) -> Option<String>
    {
        self.get(RegisterRole::LinkRegister)
    }

    #[must_use]
    pub fn stack_pointer(&self) -> Option<String>
    {
        self.get(RegisterRole::StackPointer)
    }

    #[must_use]
    pub fn program_counter(&self) -> Option<String>
    {
        self.get(RegisterRole::ProgramCounter)
    }

    #[must_use]
    pub fn status_register(&self) -> Option<String>
    {
        self.get(RegisterRole::Status)
    }

    /// Rendered value of a general-purpose register by name (case-insensitive).
    #[must_use]
    pub fn general(&self, name: &str) -> Option<String>
    {
        self.general.get(&name.to_ascii_lowercase()).map(|digits| render(digits))
    }

    /// All general-purpose registers, rendered, ordered by name.
    #[must_use]
    pub fn general_registers(&self) -> BTreeMap<String, String>
    {
        self.general
            .iter()
            .map(|(name, digits)| (name.clone(), render(digits)))
            .collect()
    }

    /// Architecture family implied by the special register names seen.
    #[must_use]
    pub const fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    /// True when no register was recognised.
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.general.is_empty()
            && [
                RegisterRole::FramePointer,
                RegisterRole::LinkRegister,
                RegisterRole::StackPointer,
                RegisterRole::ProgramCounter,
                RegisterRole::Status,
            ]
            .iter()
            .all(|role| self.slot(*role).is_none())
    }
}

fn render(digits: &str) -> String
{
    format!("0x{digits}")
}
