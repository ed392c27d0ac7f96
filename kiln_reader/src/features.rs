//! Target capabilities the translator consults while lowering.

/// Optional target features that change how a construct is lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFeature {
    /// `native_*` math builtins are available.
    NativeMath,
    /// `half_*` math builtins are available.
    HalfPrecisionMath,
    /// `lifetime.start` / `lifetime.end` markers are understood.
    LifetimeIntrinsics,
    /// Zero-filling copies may be emitted as `memset`.
    MemSetIntrinsic,
    /// `OpSMod` is left to a builtin instead of being expanded inline.
    SignedModuloBuiltin,
}

/// Answers whether the compilation target supports a feature.
pub trait CapabilityQuery {
    fn supports(&self, feature: TargetFeature) -> bool;
}

impl<F: Fn(TargetFeature) -> bool> CapabilityQuery for F {
    fn supports(&self, feature: TargetFeature) -> bool {
        self(feature)
    }
}
