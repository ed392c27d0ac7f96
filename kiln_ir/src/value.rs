//! Opaque handles for IR entities.
//!
//! All references into the IR are u32 indices, not pointers.
//! Instructions and blocks are indexed per function; types, constants,
//! globals, functions and metadata nodes are indexed per module.

macro_rules! entity_ref {
    ($(#[$doc:meta])* $name:ident, $what:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[doc = concat!("Raw index into the ", $what, " arena.")]
            pub fn index(self) -> u32 {
                self.0
            }
        }
    };
}

entity_ref!(
    /// Reference to an instruction in a function's arena.
    InstRef,
    "instruction"
);
entity_ref!(
    /// Reference to a basic block.
    BlockRef,
    "block"
);
entity_ref!(
    /// Reference to an interned type.
    TypeRef,
    "type"
);
entity_ref!(
    /// Reference to an interned constant.
    ConstRef,
    "constant"
);
entity_ref!(
    /// Reference to a global variable.
    GlobalRef,
    "global"
);
entity_ref!(
    /// Reference to a function.
    FuncRef,
    "function"
);
entity_ref!(
    /// Reference to a metadata node.
    MdRef,
    "metadata"
);

/// Reference to any SSA value usable as an operand.
///
/// `Inst` and `Arg` are only meaningful inside the function that owns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueRef {
    /// Result of an instruction.
    Inst(InstRef),
    /// Function argument by position.
    Arg(u32),
    /// Module-level constant.
    Const(ConstRef),
    /// Address of a global variable.
    Global(GlobalRef),
    /// Address of a function.
    Func(FuncRef),
}

impl ValueRef {
    pub fn as_inst(self) -> Option<InstRef> {
        match self {
            ValueRef::Inst(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_const(self) -> Option<ConstRef> {
        match self {
            ValueRef::Const(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_global(self) -> Option<GlobalRef> {
        match self {
            ValueRef::Global(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_func(self) -> Option<FuncRef> {
        match self {
            ValueRef::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Whether the value is function-local (instruction or argument).
    pub fn is_local(self) -> bool {
        matches!(self, ValueRef::Inst(_) | ValueRef::Arg(_))
    }
}

impl From<InstRef> for ValueRef {
    fn from(i: InstRef) -> Self {
        ValueRef::Inst(i)
    }
}

impl From<ConstRef> for ValueRef {
    fn from(c: ConstRef) -> Self {
        ValueRef::Const(c)
    }
}

impl From<GlobalRef> for ValueRef {
    fn from(g: GlobalRef) -> Self {
        ValueRef::Global(g)
    }
}

impl From<FuncRef> for ValueRef {
    fn from(f: FuncRef) -> Self {
        ValueRef::Func(f)
    }
}
