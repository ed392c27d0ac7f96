//! Instruction definitions for kiln IR.

use crate::function::CallConv;
use crate::value::{BlockRef, MdRef, TypeRef, ValueRef};

/// Origin tracks where an instruction came from (source entity ids).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origin {
    /// Source entities this was derived from.
    pub sources: Vec<u32>,
}

impl Origin {
    /// Create a synthetic origin (no source).
    pub fn synthetic() -> Self {
        Self { sources: vec![] }
    }

    /// Create an origin from a single source.
    pub fn from_source(id: u32) -> Self {
        Self { sources: vec![id] }
    }
}

/// An instruction in the kiln IR.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: Op,
    /// Result type; `void` for instructions without a value.
    pub ty: TypeRef,
    pub name: Option<String>,
    pub origin: Origin,
    /// `!dbg` location node.
    pub debug_loc: Option<MdRef>,
    /// Attached metadata by kind (`llvm.loop`, `alias.scope`, ...).
    pub metadata: Vec<(String, MdRef)>,
    /// Owning block; `None` once erased.
    pub parent: Option<BlockRef>,
}

impl Instruction {
    /// Get attached metadata of the given kind.
    pub fn metadata(&self, kind: &str) -> Option<MdRef> {
        self.metadata
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, md)| *md)
    }

    /// Attach or replace metadata of the given kind.
    pub fn set_metadata(&mut self, kind: &str, md: MdRef) {
        match self.metadata.iter_mut().find(|(k, _)| k == kind) {
            Some(slot) => slot.1 = md,
            None => self.metadata.push((kind.to_string(), md)),
        }
    }

    pub fn is_erased(&self) -> bool {
        self.parent.is_none()
    }
}

/// Two-operand arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

impl BinaryOp {
    pub fn is_float(self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv | BinaryOp::FRem
        )
    }
}

/// Integer overflow flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WrapFlags {
    pub nsw: bool,
    pub nuw: bool,
}

impl WrapFlags {
    pub const NONE: WrapFlags = WrapFlags {
        nsw: false,
        nuw: false,
    };
    pub const NSW: WrapFlags = WrapFlags {
        nsw: true,
        nuw: false,
    };
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ICmpOp {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

/// Floating point comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FCmpOp {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

/// Conversion operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FpTrunc,
    FpExt,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    PtrToInt,
    IntToPtr,
    Bitcast,
    AddrSpaceCast,
}

/// Alignment and access flags on loads and stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemFlags {
    pub align: Option<u32>,
    pub volatile: bool,
    pub nontemporal: bool,
}

impl MemFlags {
    pub fn aligned(align: u32) -> Self {
        Self {
            align: Some(align),
            ..Self::default()
        }
    }
}

/// Instruction opcodes.
#[derive(Debug, Clone)]
pub enum Op {
    Binary {
        op: BinaryOp,
        lhs: ValueRef,
        rhs: ValueRef,
        flags: WrapFlags,
    },
    FNeg(ValueRef),
    ICmp(ICmpOp, ValueRef, ValueRef),
    FCmp(FCmpOp, ValueRef, ValueRef),
    Select {
        cond: ValueRef,
        on_true: ValueRef,
        on_false: ValueRef,
    },
    /// Conversion to the instruction's result type.
    Cast(CastOp, ValueRef),

    // -- Memory --
    Alloca {
        ty: TypeRef,
        align: Option<u32>,
    },
    Load {
        ptr: ValueRef,
        flags: MemFlags,
    },
    Store {
        value: ValueRef,
        ptr: ValueRef,
        flags: MemFlags,
    },
    MemCpy {
        dst: ValueRef,
        src: ValueRef,
        size: ValueRef,
        align: Option<u32>,
        volatile: bool,
    },
    MemSet {
        dst: ValueRef,
        byte: ValueRef,
        size: ValueRef,
        align: Option<u32>,
        volatile: bool,
    },
    /// Address computation over `source_ty` elements.
    Gep {
        source_ty: TypeRef,
        base: ValueRef,
        indices: Vec<ValueRef>,
        inbounds: bool,
    },
    LifetimeStart {
        size: u64,
        ptr: ValueRef,
    },
    LifetimeEnd {
        size: u64,
        ptr: ValueRef,
    },

    // -- Vectors and aggregates --
    ExtractElement {
        vector: ValueRef,
        index: ValueRef,
    },
    InsertElement {
        vector: ValueRef,
        element: ValueRef,
        index: ValueRef,
    },
    /// `None` mask lanes are undefined.
    ShuffleVector {
        lhs: ValueRef,
        rhs: ValueRef,
        mask: Vec<Option<u32>>,
    },
    ExtractValue {
        aggregate: ValueRef,
        indices: Vec<u32>,
    },
    InsertValue {
        aggregate: ValueRef,
        value: ValueRef,
        indices: Vec<u32>,
    },

    // -- Calls --
    Call {
        callee: ValueRef,
        fn_ty: TypeRef,
        args: Vec<ValueRef>,
        call_conv: CallConv,
    },
    Phi(Vec<(ValueRef, BlockRef)>),

    // -- Debug intrinsics --
    DbgDeclare {
        address: ValueRef,
        variable: MdRef,
        expr: MdRef,
    },
    DbgValue {
        value: ValueRef,
        variable: MdRef,
        expr: MdRef,
    },

    // -- Terminators (placed last in a basic block) --
    Br(BlockRef),
    CondBr {
        cond: ValueRef,
        then_bb: BlockRef,
        else_bb: BlockRef,
    },
    Switch {
        value: ValueRef,
        default: BlockRef,
        cases: Vec<(u64, BlockRef)>,
    },
    Ret(Option<ValueRef>),
    Unreachable,
}

impl Op {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Br(_) | Op::CondBr { .. } | Op::Switch { .. } | Op::Ret(_) | Op::Unreachable
        )
    }

    /// Value operands in order.
    pub fn operands(&self) -> Vec<ValueRef> {
        let mut out = Vec::new();
        self.visit_operands(|v| out.push(v));
        out
    }

    fn visit_operands(&self, mut f: impl FnMut(ValueRef)) {
        match self {
            Op::Binary { lhs, rhs, .. } | Op::ICmp(_, lhs, rhs) | Op::FCmp(_, lhs, rhs) => {
                f(*lhs);
                f(*rhs);
            }
            Op::FNeg(v) | Op::Cast(_, v) => f(*v),
            Op::Select {
                cond,
                on_true,
                on_false,
            } => {
                f(*cond);
                f(*on_true);
                f(*on_false);
            }
            Op::Alloca { .. } | Op::Br(_) | Op::Unreachable => {}
            Op::Load { ptr, .. } => f(*ptr),
            Op::Store { value, ptr, .. } => {
                f(*value);
                f(*ptr);
            }
            Op::MemCpy { dst, src, size, .. } => {
                f(*dst);
                f(*src);
                f(*size);
            }
            Op::MemSet {
                dst, byte, size, ..
            } => {
                f(*dst);
                f(*byte);
                f(*size);
            }
            Op::Gep { base, indices, .. } => {
                f(*base);
                indices.iter().for_each(|v| f(*v));
            }
            Op::LifetimeStart { ptr, .. } | Op::LifetimeEnd { ptr, .. } => f(*ptr),
            Op::ExtractElement { vector, index } => {
                f(*vector);
                f(*index);
            }
            Op::InsertElement {
                vector,
                element,
                index,
            } => {
                f(*vector);
                f(*element);
                f(*index);
            }
            Op::ShuffleVector { lhs, rhs, .. } => {
                f(*lhs);
                f(*rhs);
            }
            Op::ExtractValue { aggregate, .. } => f(*aggregate),
            Op::InsertValue {
                aggregate, value, ..
            } => {
                f(*aggregate);
                f(*value);
            }
            Op::Call { callee, args, .. } => {
                f(*callee);
                args.iter().for_each(|v| f(*v));
            }
            Op::Phi(incoming) => incoming.iter().for_each(|(v, _)| f(*v)),
            Op::DbgDeclare { address, .. } => f(*address),
            Op::DbgValue { value, .. } => f(*value),
            Op::CondBr { cond, .. } => f(*cond),
            Op::Switch { value, .. } => f(*value),
            Op::Ret(v) => {
                if let Some(v) = v {
                    f(*v);
                }
            }
        }
    }

    /// Mutable access to every value operand.
    pub fn operands_mut(&mut self) -> Vec<&mut ValueRef> {
        match self {
            Op::Binary { lhs, rhs, .. } | Op::ICmp(_, lhs, rhs) | Op::FCmp(_, lhs, rhs) => {
                vec![lhs, rhs]
            }
            Op::FNeg(v) | Op::Cast(_, v) => vec![v],
            Op::Select {
                cond,
                on_true,
                on_false,
            } => vec![cond, on_true, on_false],
            Op::Alloca { .. } | Op::Br(_) | Op::Unreachable => vec![],
            Op::Load { ptr, .. } => vec![ptr],
            Op::Store { value, ptr, .. } => vec![value, ptr],
            Op::MemCpy { dst, src, size, .. } => vec![dst, src, size],
            Op::MemSet {
                dst, byte, size, ..
            } => vec![dst, byte, size],
            Op::Gep { base, indices, .. } => {
                let mut out = vec![base];
                out.extend(indices.iter_mut());
                out
            }
            Op::LifetimeStart { ptr, .. } | Op::LifetimeEnd { ptr, .. } => vec![ptr],
            Op::ExtractElement { vector, index } => vec![vector, index],
            Op::InsertElement {
                vector,
                element,
                index,
            } => vec![vector, element, index],
            Op::ShuffleVector { lhs, rhs, .. } => vec![lhs, rhs],
            Op::ExtractValue { aggregate, .. } => vec![aggregate],
            Op::InsertValue {
                aggregate, value, ..
            } => vec![aggregate, value],
            Op::Call { callee, args, .. } => {
                let mut out = vec![callee];
                out.extend(args.iter_mut());
                out
            }
            Op::Phi(incoming) => incoming.iter_mut().map(|(v, _)| v).collect(),
            Op::DbgDeclare { address, .. } => vec![address],
            Op::DbgValue { value, .. } => vec![value],
            Op::CondBr { cond, .. } => vec![cond],
            Op::Switch { value, .. } => vec![value],
            Op::Ret(v) => v.iter_mut().collect(),
        }
    }

    /// Successor blocks of a terminator; empty for other instructions.
    pub fn successors(&self) -> Vec<BlockRef> {
        match self {
            Op::Br(b) => vec![*b],
            Op::CondBr {
                then_bb, else_bb, ..
            } => vec![*then_bb, *else_bb],
            Op::Switch { default, cases, .. } => {
                let mut out = vec![*default];
                out.extend(cases.iter().map(|(_, b)| *b));
                out
            }
            _ => vec![],
        }
    }
}
