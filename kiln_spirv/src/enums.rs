//! Operand enumerations: decorations, storage classes, image properties,
//! execution modes and friends.

word_enum!(
    /// Decorations the reader acts on.
    Decoration {
        SpecId = 1,
        BuiltIn = 11,
        Restrict = 19,
        Aliased = 20,
        Volatile = 21,
        Constant = 22,
        Coherent = 23,
        NonWritable = 24,
        NonReadable = 25,
        SaturatedConversion = 28,
        FuncParamAttr = 38,
        FPRoundingMode = 39,
        LinkageAttributes = 41,
        Alignment = 44,
        MaxByteOffset = 45,
        NoSignedWrap = 4469,
        NoUnsignedWrap = 4470,
        ReferencedIndirectlyINTEL = 5602,
        UserSemantic = 5635,
        AliasScopeINTEL = 5914,
        NoAliasINTEL = 5915,
    }
);

word_enum!(
    StorageClass {
        UniformConstant = 0,
        Input = 1,
        Uniform = 2,
        Output = 3,
        Workgroup = 4,
        CrossWorkgroup = 5,
        Private = 6,
        Function = 7,
        Generic = 8,
    }
);

word_enum!(
    /// Image dimensionality.
    Dim {
        Dim1D = 0,
        Dim2D = 1,
        Dim3D = 2,
        Cube = 3,
        Rect = 4,
        Buffer = 5,
        SubpassData = 6,
    }
);

word_enum!(
    AccessQualifier {
        ReadOnly = 0,
        WriteOnly = 1,
        ReadWrite = 2,
    }
);

impl AccessQualifier {
    /// OpenCL spelling used in type names and kernel metadata.
    pub fn ocl_name(self) -> &'static str {
        match self {
            AccessQualifier::ReadOnly => "read_only",
            AccessQualifier::WriteOnly => "write_only",
            AccessQualifier::ReadWrite => "read_write",
        }
    }
}

word_enum!(
    BuiltIn {
        NumWorkgroups = 24,
        WorkgroupSize = 25,
        WorkgroupId = 26,
        LocalInvocationId = 27,
        GlobalInvocationId = 28,
        LocalInvocationIndex = 29,
        WorkDim = 30,
        GlobalSize = 31,
        EnqueuedWorkgroupSize = 32,
        GlobalOffset = 33,
        GlobalLinearId = 34,
        SubgroupSize = 36,
        SubgroupMaxSize = 37,
        NumSubgroups = 38,
        NumEnqueuedSubgroups = 39,
        SubgroupId = 40,
        SubgroupLocalInvocationId = 41,
    }
);

word_enum!(
    FuncParamAttr {
        Zext = 0,
        Sext = 1,
        ByVal = 2,
        Sret = 3,
        NoAlias = 4,
        NoCapture = 5,
        NoWrite = 6,
        NoReadWrite = 7,
    }
);

word_enum!(
    /// Floating point rounding mode of a conversion.
    RoundingMode {
        Rte = 0,
        Rtz = 1,
        Rtp = 2,
        Rtn = 3,
    }
);

impl RoundingMode {
    /// Builtin name suffix, e.g. `_RTE`.
    pub fn suffix(self) -> &'static str {
        match self {
            RoundingMode::Rte => "_RTE",
            RoundingMode::Rtz => "_RTZ",
            RoundingMode::Rtp => "_RTP",
            RoundingMode::Rtn => "_RTN",
        }
    }
}

word_enum!(
    LinkageType {
        Export = 0,
        Import = 1,
    }
);

word_enum!(
    ExecutionModel {
        Vertex = 0,
        Fragment = 4,
        GLCompute = 5,
        Kernel = 6,
    }
);

word_enum!(
    ExecutionMode {
        LocalSize = 17,
        LocalSizeHint = 18,
        VecTypeHint = 30,
        ContractionOff = 31,
        Initializer = 33,
        Finalizer = 34,
        SubgroupSize = 35,
        SubgroupsPerWorkgroup = 36,
    }
);

word_enum!(
    AddressingModel {
        Logical = 0,
        Physical32 = 1,
        Physical64 = 2,
    }
);

word_enum!(
    SourceLanguage {
        Unknown = 0,
        Essl = 1,
        Glsl = 2,
        OpenClC = 3,
        OpenClCpp = 4,
        Hlsl = 5,
    }
);

word_enum!(
    Capability {
        Addresses = 4,
        Linkage = 5,
        Kernel = 6,
        Vector16 = 7,
        Float16Buffer = 8,
        Float16 = 9,
        Float64 = 10,
        Int64 = 11,
        Int64Atomics = 12,
        ImageBasic = 13,
        ImageReadWrite = 14,
        ImageMipmap = 15,
        Pipes = 17,
        Groups = 18,
        DeviceEnqueue = 19,
        LiteralSampler = 20,
        Int16 = 22,
        GenericPointer = 38,
        Int8 = 39,
        Sampled1D = 43,
        Image1D = 44,
        SampledBuffer = 46,
        ImageBuffer = 47,
        SubgroupDispatch = 58,
        NamedBarrier = 59,
        PipeStorage = 60,
    }
);

impl Capability {
    /// OpenCL extension or optional core feature implied by the capability.
    pub fn ocl_extension(self) -> Option<&'static str> {
        match self {
            Capability::ImageBasic => Some("cl_images"),
            Capability::Float64 => Some("cl_doubles"),
            Capability::Float16 => Some("cl_khr_fp16"),
            Capability::Int64Atomics => Some("cl_khr_int64_base_atomics"),
            Capability::ImageReadWrite => Some("cl_khr_3d_image_writes"),
            Capability::Groups => Some("cl_khr_subgroups"),
            Capability::ImageMipmap => Some("cl_khr_mipmap_image"),
            _ => None,
        }
    }
}

/// Function control mask bits of `OpFunction`.
pub mod function_control {
    pub const INLINE: u32 = 0x1;
    pub const DONT_INLINE: u32 = 0x2;
    pub const PURE: u32 = 0x4;
    pub const CONST: u32 = 0x8;
}

/// Memory access mask bits of loads, stores and copies.
pub mod memory_access {
    pub const VOLATILE: u32 = 0x1;
    pub const ALIGNED: u32 = 0x2;
    pub const NONTEMPORAL: u32 = 0x4;
}

/// Loop control mask bits of `OpLoopMerge`.
pub mod loop_control {
    pub const UNROLL: u32 = 0x1;
    pub const DONT_UNROLL: u32 = 0x2;
    pub const DEPENDENCY_INFINITE: u32 = 0x4;
    pub const DEPENDENCY_LENGTH: u32 = 0x8;
    pub const MIN_ITERATIONS: u32 = 0x10;
    pub const MAX_ITERATIONS: u32 = 0x20;
    pub const ITERATION_MULTIPLE: u32 = 0x40;
    pub const PEEL_COUNT: u32 = 0x80;
    pub const PARTIAL_COUNT: u32 = 0x100;
}

/// Extended instruction sets known to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtInstSet {
    OpenClStd,
    DebugInfo,
    OpenClDebugInfo100,
}

impl ExtInstSet {
    pub fn from_name(name: &str) -> Option<ExtInstSet> {
        match name {
            "OpenCL.std" => Some(ExtInstSet::OpenClStd),
            "DebugInfo" => Some(ExtInstSet::DebugInfo),
            "OpenCL.DebugInfo.100" => Some(ExtInstSet::OpenClDebugInfo100),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExtInstSet::OpenClStd => "OpenCL.std",
            ExtInstSet::DebugInfo => "DebugInfo",
            ExtInstSet::OpenClDebugInfo100 => "OpenCL.DebugInfo.100",
        }
    }

    pub fn is_debug(self) -> bool {
        !matches!(self, ExtInstSet::OpenClStd)
    }
}

/// Properties of an `OpTypeImage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDescriptor {
    pub dim: Dim,
    /// 0 = not depth, 1 = depth, 2 = unknown.
    pub depth: u32,
    pub arrayed: bool,
    pub multisampled: bool,
    /// 0 = runtime, 1 = sampled, 2 = storage.
    pub sampled: u32,
    pub format: u32,
}

impl ImageDescriptor {
    /// Base OpenCL image type name, e.g. `image2d_array_depth_t`.
    pub fn ocl_type_name(&self) -> String {
        let mut name = String::from("image");
        name.push_str(match self.dim {
            Dim::Dim1D => "1d",
            Dim::Dim2D | Dim::Rect | Dim::SubpassData => "2d",
            Dim::Dim3D => "3d",
            Dim::Cube => "cube",
            Dim::Buffer => "1d_buffer",
        });
        if self.arrayed {
            name.push_str("_array");
        }
        if self.multisampled {
            name.push_str("_msaa");
        }
        if self.depth == 1 {
            name.push_str("_depth");
        }
        name.push_str("_t");
        name
    }
}
