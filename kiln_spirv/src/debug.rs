//! OpenCL.DebugInfo.100 record numbering.
//!
//! Debug records are `OpExtInst`s of a debug import; the instruction number
//! selects the record kind and the arguments follow the layouts below.

word_enum!(
    /// Debug record kinds.
    DebugOp {
        InfoNone = 0,
        CompilationUnit = 1,
        TypeBasic = 2,
        TypePointer = 3,
        TypeQualifier = 4,
        TypeArray = 5,
        TypeVector = 6,
        Typedef = 7,
        TypeFunction = 8,
        TypeEnum = 9,
        TypeComposite = 10,
        TypeMember = 11,
        TypeInheritance = 12,
        TypePtrToMember = 13,
        TypeTemplate = 14,
        TypeTemplateParameter = 15,
        TypeTemplateParameterPack = 16,
        TypeTemplateTemplateParameter = 17,
        GlobalVariable = 18,
        FunctionDeclaration = 19,
        Function = 20,
        LexicalBlock = 21,
        LexicalBlockDiscriminator = 22,
        Scope = 23,
        NoScope = 24,
        InlinedAt = 25,
        LocalVariable = 26,
        InlinedVariable = 27,
        Declare = 28,
        Value = 29,
        Operation = 30,
        Expression = 31,
        MacroDef = 32,
        MacroUndef = 33,
        ImportedEntity = 34,
        Source = 35,
    }
);

impl DebugOp {
    /// Whether the record describes a type.
    pub fn is_type(self) -> bool {
        (DebugOp::TypeBasic.word()..=DebugOp::TypeTemplateTemplateParameter.word())
            .contains(&self.word())
    }
}

/// `DebugInfoFlags` bits.
pub mod flags {
    pub const IS_PRIVATE: u32 = 1 << 0;
    pub const IS_PROTECTED: u32 = 1 << 1;
    pub const IS_PUBLIC: u32 = IS_PRIVATE | IS_PROTECTED;
    pub const IS_LOCAL: u32 = 1 << 2;
    pub const IS_DEFINITION: u32 = 1 << 3;
    pub const IS_FWD_DECL: u32 = 1 << 4;
    pub const IS_ARTIFICIAL: u32 = 1 << 5;
    pub const IS_EXPLICIT: u32 = 1 << 6;
    pub const IS_PROTOTYPED: u32 = 1 << 7;
    pub const IS_OBJECT_POINTER: u32 = 1 << 8;
    pub const IS_STATIC_MEMBER: u32 = 1 << 9;
    pub const IS_INDIRECT_VARIABLE: u32 = 1 << 10;
    pub const IS_LVALUE_REFERENCE: u32 = 1 << 11;
    pub const IS_RVALUE_REFERENCE: u32 = 1 << 12;
    pub const IS_OPTIMIZED: u32 = 1 << 13;
    pub const ACCESS_MASK: u32 = IS_PUBLIC;
}

word_enum!(
    /// `DebugBaseTypeAttributeEncoding`.
    Encoding {
        Unspecified = 0,
        Address = 1,
        Boolean = 2,
        Float = 3,
        Signed = 4,
        SignedChar = 5,
        Unsigned = 6,
        UnsignedChar = 7,
    }
);

word_enum!(
    CompositeKind {
        Class = 0,
        Structure = 1,
        Union = 2,
    }
);

word_enum!(
    TypeQualifier {
        Const = 0,
        Volatile = 1,
        Restrict = 2,
        Atomic = 3,
    }
);

/// `DebugOperation` opcodes for expressions.
pub mod operation {
    pub const DEREF: u32 = 0;
    pub const PLUS: u32 = 1;
    pub const MINUS: u32 = 2;
    pub const PLUS_UCONST: u32 = 3;
    pub const BIT_PIECE: u32 = 4;
    pub const SWAP: u32 = 5;
    pub const XDEREF: u32 = 6;
    pub const STACK_VALUE: u32 = 7;
    pub const CONSTU: u32 = 8;
    pub const FRAGMENT: u32 = 9;
}

/// Argument positions, relative to the first extended-instruction argument.
pub mod args {
    pub mod compile_unit {
        pub const SPIRV_VERSION: usize = 0;
        pub const DWARF_VERSION: usize = 1;
        pub const SOURCE: usize = 2;
        pub const LANGUAGE: usize = 3;
    }

    pub mod source {
        pub const FILE: usize = 0;
    }

    pub mod basic {
        pub const NAME: usize = 0;
        pub const SIZE: usize = 1;
        pub const ENCODING: usize = 2;
    }

    pub mod pointer {
        pub const BASE: usize = 0;
        pub const STORAGE_CLASS: usize = 1;
        pub const FLAGS: usize = 2;
    }

    pub mod qualifier {
        pub const BASE: usize = 0;
        pub const QUALIFIER: usize = 1;
    }

    pub mod array {
        pub const BASE: usize = 0;
        pub const FIRST_COUNT: usize = 1;
    }

    pub mod typedef {
        pub const NAME: usize = 0;
        pub const BASE: usize = 1;
        pub const SOURCE: usize = 2;
        pub const LINE: usize = 3;
        pub const COLUMN: usize = 4;
        pub const PARENT: usize = 5;
    }

    pub mod function_type {
        pub const FLAGS: usize = 0;
        pub const RETURN: usize = 1;
        pub const FIRST_PARAM: usize = 2;
    }

    pub mod enumeration {
        pub const NAME: usize = 0;
        pub const UNDERLYING: usize = 1;
        pub const SOURCE: usize = 2;
        pub const LINE: usize = 3;
        pub const COLUMN: usize = 4;
        pub const PARENT: usize = 5;
        pub const SIZE: usize = 6;
        pub const FLAGS: usize = 7;
        pub const FIRST_ENUMERATOR: usize = 8;
    }

    pub mod composite {
        pub const NAME: usize = 0;
        pub const TAG: usize = 1;
        pub const SOURCE: usize = 2;
        pub const LINE: usize = 3;
        pub const COLUMN: usize = 4;
        pub const PARENT: usize = 5;
        pub const LINKAGE_NAME: usize = 6;
        pub const SIZE: usize = 7;
        pub const FLAGS: usize = 8;
        pub const FIRST_MEMBER: usize = 9;
    }

    pub mod member {
        pub const NAME: usize = 0;
        pub const TYPE: usize = 1;
        pub const SOURCE: usize = 2;
        pub const LINE: usize = 3;
        pub const COLUMN: usize = 4;
        pub const PARENT: usize = 5;
        pub const OFFSET: usize = 6;
        pub const SIZE: usize = 7;
        pub const FLAGS: usize = 8;
    }

    pub mod inheritance {
        pub const CHILD: usize = 0;
        pub const PARENT: usize = 1;
        pub const OFFSET: usize = 2;
        pub const SIZE: usize = 3;
        pub const FLAGS: usize = 4;
    }

    pub mod ptr_to_member {
        pub const MEMBER_TYPE: usize = 0;
        pub const PARENT: usize = 1;
    }

    pub mod template {
        pub const TARGET: usize = 0;
        pub const FIRST_PARAM: usize = 1;
    }

    pub mod template_param {
        pub const NAME: usize = 0;
        pub const TYPE: usize = 1;
        pub const VALUE: usize = 2;
        pub const SOURCE: usize = 3;
        pub const LINE: usize = 4;
        pub const COLUMN: usize = 5;
    }

    pub mod template_template_param {
        pub const NAME: usize = 0;
        pub const TEMPLATE_NAME: usize = 1;
    }

    pub mod template_param_pack {
        pub const NAME: usize = 0;
        pub const SOURCE: usize = 1;
        pub const LINE: usize = 2;
        pub const COLUMN: usize = 3;
        pub const FIRST_PARAM: usize = 4;
    }

    pub mod global_variable {
        pub const NAME: usize = 0;
        pub const TYPE: usize = 1;
        pub const SOURCE: usize = 2;
        pub const LINE: usize = 3;
        pub const COLUMN: usize = 4;
        pub const PARENT: usize = 5;
        pub const LINKAGE_NAME: usize = 6;
        pub const VARIABLE: usize = 7;
        pub const FLAGS: usize = 8;
        pub const STATIC_MEMBER: usize = 9;
    }

    pub mod function_decl {
        pub const NAME: usize = 0;
        pub const TYPE: usize = 1;
        pub const SOURCE: usize = 2;
        pub const LINE: usize = 3;
        pub const COLUMN: usize = 4;
        pub const PARENT: usize = 5;
        pub const LINKAGE_NAME: usize = 6;
        pub const FLAGS: usize = 7;
    }

    pub mod function {
        pub const NAME: usize = 0;
        pub const TYPE: usize = 1;
        pub const SOURCE: usize = 2;
        pub const LINE: usize = 3;
        pub const COLUMN: usize = 4;
        pub const PARENT: usize = 5;
        pub const LINKAGE_NAME: usize = 6;
        pub const FLAGS: usize = 7;
        pub const SCOPE_LINE: usize = 8;
        pub const FUNCTION: usize = 9;
        pub const DECLARATION: usize = 10;
    }

    pub mod lexical_block {
        pub const SOURCE: usize = 0;
        pub const LINE: usize = 1;
        pub const COLUMN: usize = 2;
        pub const PARENT: usize = 3;
        pub const NAME: usize = 4;
    }

    pub mod lexical_block_discriminator {
        pub const SOURCE: usize = 0;
        pub const DISCRIMINATOR: usize = 1;
        pub const PARENT: usize = 2;
    }

    pub mod scope {
        pub const SCOPE: usize = 0;
        pub const INLINED_AT: usize = 1;
    }

    pub mod inlined_at {
        pub const LINE: usize = 0;
        pub const SCOPE: usize = 1;
        pub const INLINED: usize = 2;
    }

    pub mod local_variable {
        pub const NAME: usize = 0;
        pub const TYPE: usize = 1;
        pub const SOURCE: usize = 2;
        pub const LINE: usize = 3;
        pub const COLUMN: usize = 4;
        pub const PARENT: usize = 5;
        pub const FLAGS: usize = 6;
        pub const ARG_NUMBER: usize = 7;
    }

    pub mod declare {
        pub const LOCAL_VAR: usize = 0;
        pub const VARIABLE: usize = 1;
        pub const EXPRESSION: usize = 2;
    }

    pub mod value {
        pub const LOCAL_VAR: usize = 0;
        pub const VALUE: usize = 1;
        pub const EXPRESSION: usize = 2;
    }
}
