//! Metadata nodes: generic tuples and debug-info records.
//!
//! Nodes live in a module arena and may reference each other freely,
//! including themselves (loop ids) and in cycles (recursive composite
//! types), because edges are `MdRef` indices.

use crate::value::{ConstRef, FuncRef, GlobalRef, MdRef};

/// Operand of a generic metadata tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdOperand {
    Null,
    Node(MdRef),
    String(String),
    Const(ConstRef),
    Func(FuncRef),
    Global(GlobalRef),
}

impl MdOperand {
    pub fn string(s: impl Into<String>) -> Self {
        MdOperand::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MdOperand::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<MdRef> {
        match self {
            MdOperand::Node(n) => Some(*n),
            _ => None,
        }
    }
}

/// DWARF base type encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwarfEncoding {
    Address,
    Boolean,
    Float,
    Signed,
    SignedChar,
    Unsigned,
    UnsignedChar,
    Unspecified,
}

/// Tags for derived qualifier types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualifierTag {
    Const,
    Volatile,
    Restrict,
    Atomic,
}

/// Tags for composite types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeTag {
    Class,
    Structure,
    Union,
}

/// Debug-info flags, bit-compatible with the DWARF emitter's encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiFlags(pub u32);

impl DiFlags {
    pub const ZERO: DiFlags = DiFlags(0);
    pub const PRIVATE: DiFlags = DiFlags(1);
    pub const PROTECTED: DiFlags = DiFlags(2);
    pub const PUBLIC: DiFlags = DiFlags(3);
    pub const FWD_DECL: DiFlags = DiFlags(1 << 2);
    pub const ARTIFICIAL: DiFlags = DiFlags(1 << 6);
    pub const EXPLICIT: DiFlags = DiFlags(1 << 7);
    pub const PROTOTYPED: DiFlags = DiFlags(1 << 8);
    pub const OBJECT_POINTER: DiFlags = DiFlags(1 << 10);
    pub const STATIC_MEMBER: DiFlags = DiFlags(1 << 12);
    pub const LVALUE_REFERENCE: DiFlags = DiFlags(1 << 13);
    pub const RVALUE_REFERENCE: DiFlags = DiFlags(1 << 14);

    pub fn contains(self, other: DiFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for DiFlags {
    type Output = DiFlags;

    fn bitor(self, rhs: DiFlags) -> DiFlags {
        DiFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for DiFlags {
    fn bitor_assign(&mut self, rhs: DiFlags) {
        self.0 |= rhs.0;
    }
}

/// Debug-info records.
#[derive(Debug, Clone, PartialEq)]
pub enum DiNode {
    File {
        filename: String,
        directory: String,
    },
    CompileUnit {
        language: u32,
        file: MdRef,
        producer: String,
        optimized: bool,
    },
    BasicType {
        name: String,
        size_bits: u64,
        encoding: DwarfEncoding,
    },
    PointerType {
        base: Option<MdRef>,
        size_bits: u64,
        addr_space: Option<u32>,
    },
    QualifiedType {
        tag: QualifierTag,
        base: Option<MdRef>,
    },
    /// One subrange count per dimension.
    ArrayType {
        base: Option<MdRef>,
        size_bits: u64,
        counts: Vec<i64>,
    },
    VectorType {
        base: Option<MdRef>,
        size_bits: u64,
        count: u64,
    },
    Typedef {
        name: String,
        base: Option<MdRef>,
        file: Option<MdRef>,
        line: u32,
        scope: Option<MdRef>,
    },
    Enumerator {
        name: String,
        value: i64,
    },
    EnumType {
        name: String,
        base: Option<MdRef>,
        file: Option<MdRef>,
        line: u32,
        scope: Option<MdRef>,
        size_bits: u64,
        elements: Vec<MdRef>,
        flags: DiFlags,
    },
    /// `elements` is filled after creation so members may refer back.
    CompositeType {
        tag: CompositeTag,
        name: String,
        file: Option<MdRef>,
        line: u32,
        scope: Option<MdRef>,
        size_bits: u64,
        flags: DiFlags,
        identifier: String,
        elements: Vec<MdRef>,
    },
    Member {
        name: String,
        file: Option<MdRef>,
        line: u32,
        scope: Option<MdRef>,
        base: Option<MdRef>,
        size_bits: u64,
        offset_bits: u64,
        flags: DiFlags,
    },
    Inheritance {
        derived: Option<MdRef>,
        base: Option<MdRef>,
        offset_bits: u64,
        flags: DiFlags,
    },
    PtrToMember {
        pointee: Option<MdRef>,
        class: Option<MdRef>,
        size_bits: u64,
    },
    /// First entry is the return type; `None` is `void`.
    SubroutineType {
        types: Vec<Option<MdRef>>,
        flags: DiFlags,
    },
    TemplateTypeParameter {
        name: String,
        ty: Option<MdRef>,
    },
    TemplateValueParameter {
        name: String,
        ty: Option<MdRef>,
        value: Option<ConstRef>,
    },
    TemplateTemplateParameter {
        name: String,
        template: String,
    },
    TemplateParameterPack {
        name: String,
        elements: Vec<MdRef>,
    },
    GlobalVariable {
        name: String,
        linkage_name: String,
        scope: Option<MdRef>,
        file: Option<MdRef>,
        line: u32,
        ty: Option<MdRef>,
        local: bool,
        definition: bool,
        static_member: Option<MdRef>,
    },
    GlobalVariableExpression {
        var: MdRef,
        expr: MdRef,
    },
    Subprogram {
        name: String,
        linkage_name: String,
        scope: Option<MdRef>,
        file: Option<MdRef>,
        line: u32,
        ty: Option<MdRef>,
        scope_line: u32,
        flags: DiFlags,
        local: bool,
        definition: bool,
        optimized: bool,
        unit: Option<MdRef>,
        declaration: Option<MdRef>,
        template_params: Vec<MdRef>,
    },
    LexicalBlock {
        scope: Option<MdRef>,
        file: Option<MdRef>,
        line: u32,
        column: u32,
    },
    LexicalBlockFile {
        scope: Option<MdRef>,
        file: Option<MdRef>,
        discriminator: u32,
    },
    Namespace {
        scope: Option<MdRef>,
        name: String,
        export_symbols: bool,
    },
    Location {
        line: u32,
        column: u32,
        scope: MdRef,
        inlined_at: Option<MdRef>,
    },
    /// `arg == 0` for automatic variables, otherwise the 1-based parameter.
    LocalVariable {
        name: String,
        scope: Option<MdRef>,
        file: Option<MdRef>,
        line: u32,
        ty: Option<MdRef>,
        arg: u32,
        flags: DiFlags,
    },
    Expression(Vec<u64>),
}

impl DiNode {
    /// Whether the node can serve as a lexical scope.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            DiNode::File { .. }
                | DiNode::CompileUnit { .. }
                | DiNode::CompositeType { .. }
                | DiNode::Subprogram { .. }
                | DiNode::LexicalBlock { .. }
                | DiNode::LexicalBlockFile { .. }
                | DiNode::Namespace { .. }
        )
    }
}

/// A metadata node.
#[derive(Debug, Clone, PartialEq)]
pub enum MdNode {
    Tuple(Vec<MdOperand>),
    Di(DiNode),
}

impl MdNode {
    pub fn as_tuple(&self) -> Option<&[MdOperand]> {
        match self {
            MdNode::Tuple(ops) => Some(ops),
            MdNode::Di(_) => None,
        }
    }

    pub fn as_di(&self) -> Option<&DiNode> {
        match self {
            MdNode::Di(di) => Some(di),
            MdNode::Tuple(_) => None,
        }
    }
}

/// Module flag merge behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagBehavior {
    Error = 1,
    Warning = 2,
}

/// A `llvm.module.flags` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFlag {
    pub behavior: FlagBehavior,
    pub key: String,
    pub value: u32,
}
