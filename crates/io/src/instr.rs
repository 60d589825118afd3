use std::fmt;

use crate::index::{ClassIndex, FieldIndex, MethodIndex, StringIndex, TypeIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr<Loc = Offset> {
    Nop,
    Null,
    LoadArg(u16),
    LoadArgShort(u8),
    LoadLocal(u16),
    LoadLocalShort(u8),
    StoreLocal(u16),
    StoreLocalShort(u8),
    StringConst(StringIndex),
    Dup,
    Pop,
    LoadField(FieldIndex),
    StoreField(FieldIndex),
    Call(Invoke),
    CallVirtual(Invoke),
    New { class: ClassIndex, arg_count: u8 },
    Throw,
    Return,
    IsInstance(TypeIndex),
    Cast(TypeIndex),
    Concat(u8),
    Jump(Loc),
    JumpShort(Loc),
    JumpIfTrue(Loc),
    JumpIfTrueShort(Loc),
    JumpIfFalse(Loc),
    JumpIfFalseShort(Loc),
}

impl<L> Instr<L> {
    pub(crate) fn opcode(&self) -> u8 {
        match self {
            Instr::Nop => 0x00,
            Instr::Null => 0x01,
            Instr::LoadArg(_) => 0x02,
            Instr::LoadArgShort(_) => 0x03,
            Instr::LoadLocal(_) => 0x04,
            Instr::LoadLocalShort(_) => 0x05,
            Instr::StoreLocal(_) => 0x06,
            Instr::StoreLocalShort(_) => 0x07,
            Instr::StringConst(_) => 0x08,
            Instr::Dup => 0x09,
            Instr::Pop => 0x0A,
            Instr::LoadField(_) => 0x0B,
            Instr::StoreField(_) => 0x0C,
            Instr::Call(_) => 0x0D,
            Instr::CallVirtual(_) => 0x0E,
            Instr::New { .. } => 0x0F,
            Instr::Throw => 0x10,
            Instr::Return => 0x11,
            Instr::IsInstance(_) => 0x12,
            Instr::Cast(_) => 0x13,
            Instr::Concat(_) => 0x14,
            Instr::Jump(_) => 0x15,
            Instr::JumpShort(_) => 0x16,
            Instr::JumpIfTrue(_) => 0x17,
            Instr::JumpIfTrueShort(_) => 0x18,
            Instr::JumpIfFalse(_) => 0x19,
            Instr::JumpIfFalseShort(_) => 0x1A,
        }
    }

    /// Encoded size in bytes, including the opcode.
    pub fn size(&self) -> u32 {
        let op_size = match self {
            Instr::Call(invoke) | Instr::CallVirtual(invoke) => {
                5 + 4 * invoke.type_args.len() as u32
            }
            Instr::New { .. } => 5,
            Instr::StringConst(_)
            | Instr::LoadField(_)
            | Instr::StoreField(_)
            | Instr::IsInstance(_)
            | Instr::Cast(_)
            | Instr::Jump(_)
            | Instr::JumpIfTrue(_)
            | Instr::JumpIfFalse(_) => 4,
            Instr::LoadArg(_) | Instr::LoadLocal(_) | Instr::StoreLocal(_) => 2,
            Instr::LoadArgShort(_)
            | Instr::LoadLocalShort(_)
            | Instr::StoreLocalShort(_)
            | Instr::Concat(_)
            | Instr::JumpShort(_)
            | Instr::JumpIfTrueShort(_)
            | Instr::JumpIfFalseShort(_) => 1,
            Instr::Nop
            | Instr::Null
            | Instr::Dup
            | Instr::Pop
            | Instr::Throw
            | Instr::Return => 0,
        };
        1 + op_size
    }

    #[inline]
    pub fn branch_target(&self) -> Option<&L> {
        match self {
            Instr::Jump(loc)
            | Instr::JumpShort(loc)
            | Instr::JumpIfTrue(loc)
            | Instr::JumpIfTrueShort(loc)
            | Instr::JumpIfFalse(loc)
            | Instr::JumpIfFalseShort(loc) => Some(loc),
            _ => None,
        }
    }

    #[inline]
    pub fn is_short_branch(&self) -> bool {
        matches!(
            self,
            Instr::JumpShort(_) | Instr::JumpIfTrueShort(_) | Instr::JumpIfFalseShort(_)
        )
    }

    /// Replaces every short form with its long equivalent.
    pub fn expanded(self) -> Self {
        match self {
            Instr::LoadArgShort(n) => Instr::LoadArg(n.into()),
            Instr::LoadLocalShort(n) => Instr::LoadLocal(n.into()),
            Instr::StoreLocalShort(n) => Instr::StoreLocal(n.into()),
            Instr::JumpShort(loc) => Instr::Jump(loc),
            Instr::JumpIfTrueShort(loc) => Instr::JumpIfTrue(loc),
            Instr::JumpIfFalseShort(loc) => Instr::JumpIfFalse(loc),
            other => other,
        }
    }

    /// Selects the short form of slot instructions whose operand fits in a byte
    /// and the short form of every branch. Branch distances are checked on assembly.
    pub fn shortened(self) -> Self {
        match self {
            Instr::LoadArg(n) => u8::try_from(n).map_or(Instr::LoadArg(n), Instr::LoadArgShort),
            Instr::LoadLocal(n) => {
                u8::try_from(n).map_or(Instr::LoadLocal(n), Instr::LoadLocalShort)
            }
            Instr::StoreLocal(n) => {
                u8::try_from(n).map_or(Instr::StoreLocal(n), Instr::StoreLocalShort)
            }
            Instr::Jump(loc) => Instr::JumpShort(loc),
            Instr::JumpIfTrue(loc) => Instr::JumpIfTrueShort(loc),
            Instr::JumpIfFalse(loc) => Instr::JumpIfFalseShort(loc),
            other => other,
        }
    }

    pub fn map_labels<L2>(self, mut f: impl FnMut(L) -> Option<L2>) -> Option<Instr<L2>> {
        let res = match self {
            Instr::Nop => Instr::Nop,
            Instr::Null => Instr::Null,
            Instr::LoadArg(n) => Instr::LoadArg(n),
            Instr::LoadArgShort(n) => Instr::LoadArgShort(n),
            Instr::LoadLocal(n) => Instr::LoadLocal(n),
            Instr::LoadLocalShort(n) => Instr::LoadLocalShort(n),
            Instr::StoreLocal(n) => Instr::StoreLocal(n),
            Instr::StoreLocalShort(n) => Instr::StoreLocalShort(n),
            Instr::StringConst(idx) => Instr::StringConst(idx),
            Instr::Dup => Instr::Dup,
            Instr::Pop => Instr::Pop,
            Instr::LoadField(idx) => Instr::LoadField(idx),
            Instr::StoreField(idx) => Instr::StoreField(idx),
            Instr::Call(invoke) => Instr::Call(invoke),
            Instr::CallVirtual(invoke) => Instr::CallVirtual(invoke),
            Instr::New { class, arg_count } => Instr::New { class, arg_count },
            Instr::Throw => Instr::Throw,
            Instr::Return => Instr::Return,
            Instr::IsInstance(idx) => Instr::IsInstance(idx),
            Instr::Cast(idx) => Instr::Cast(idx),
            Instr::Concat(n) => Instr::Concat(n),
            Instr::Jump(loc) => Instr::Jump(f(loc)?),
            Instr::JumpShort(loc) => Instr::JumpShort(f(loc)?),
            Instr::JumpIfTrue(loc) => Instr::JumpIfTrue(f(loc)?),
            Instr::JumpIfTrueShort(loc) => Instr::JumpIfTrueShort(f(loc)?),
            Instr::JumpIfFalse(loc) => Instr::JumpIfFalse(f(loc)?),
            Instr::JumpIfFalseShort(loc) => Instr::JumpIfFalseShort(f(loc)?),
        };
        Some(res)
    }
}

impl<L: fmt::Display> fmt::Display for Instr<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Nop => write!(f, "nop"),
            Instr::Null => write!(f, "ref.null"),
            Instr::LoadArg(n) => write!(f, "arg.load {}", n),
            Instr::LoadArgShort(n) => write!(f, "arg.load.s {}", n),
            Instr::LoadLocal(n) => write!(f, "local.load {}", n),
            Instr::LoadLocalShort(n) => write!(f, "local.load.s {}", n),
            Instr::StoreLocal(n) => write!(f, "local.store {}", n),
            Instr::StoreLocalShort(n) => write!(f, "local.store.s {}", n),
            Instr::StringConst(idx) => write!(f, "string.const {}", idx),
            Instr::Dup => write!(f, "dup"),
            Instr::Pop => write!(f, "pop"),
            Instr::LoadField(idx) => write!(f, "field.load {}", idx),
            Instr::StoreField(idx) => write!(f, "field.store {}", idx),
            Instr::Call(invoke) => write!(f, "invoke.static {}", invoke),
            Instr::CallVirtual(invoke) => write!(f, "invoke.virtual {}", invoke),
            Instr::New { class, arg_count } => write!(f, "object.new {} {}", class, arg_count),
            Instr::Throw => write!(f, "throw"),
            Instr::Return => write!(f, "return"),
            Instr::IsInstance(idx) => write!(f, "ref.isinst {}", idx),
            Instr::Cast(idx) => write!(f, "ref.cast {}", idx),
            Instr::Concat(n) => write!(f, "string.concat {}", n),
            Instr::Jump(loc) => write!(f, "jump {}", loc),
            Instr::JumpShort(loc) => write!(f, "jump.s {}", loc),
            Instr::JumpIfTrue(loc) => write!(f, "jump.if {}", loc),
            Instr::JumpIfTrueShort(loc) => write!(f, "jump.if.s {}", loc),
            Instr::JumpIfFalse(loc) => write!(f, "jump.if_not {}", loc),
            Instr::JumpIfFalseShort(loc) => write!(f, "jump.if_not.s {}", loc),
        }
    }
}

/// A call target together with the generic arguments of this call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoke {
    method: MethodIndex,
    type_args: Vec<TypeIndex>,
}

impl Invoke {
    #[inline]
    pub fn new(method: MethodIndex, type_args: impl Into<Vec<TypeIndex>>) -> Self {
        Self {
            method,
            type_args: type_args.into(),
        }
    }

    #[inline]
    pub fn method(&self) -> MethodIndex {
        self.method
    }

    #[inline]
    pub fn type_args(&self) -> &[TypeIndex] {
        &self.type_args
    }
}

impl fmt::Display for Invoke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method)?;
        if !self.type_args.is_empty() {
            write!(f, " <")?;
            for (i, arg) in self.type_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// Relative branch distance in bytes, measured from the start of the branching instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset {
    value: i32,
}

impl Offset {
    #[inline]
    pub fn fits_short(self) -> bool {
        i8::try_from(self.value).is_ok()
    }
}

impl From<Offset> for i32 {
    #[inline]
    fn from(offset: Offset) -> Self {
        offset.value
    }
}

impl From<i32> for Offset {
    #[inline]
    fn from(value: i32) -> Self {
        Offset { value }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
