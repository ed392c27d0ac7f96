//! IR verifier: structural integrity and type-safety checks.
//!
//! Collects all errors rather than stopping at the first one.
//! Entry points: `verify_module()` and `verify_function()`.

use std::collections::HashSet;
use std::fmt;

use crate::function::Function;
use crate::instruction::{BinaryOp, Instruction, Op};
use crate::module::Module;
use crate::types::Type;
use crate::value::{BlockRef, FuncRef, TypeRef, ValueRef};

/// Name prefix of the private globals that stand in for forward references
/// during translation. None may survive into a finished module.
pub const PLACEHOLDER_PREFIX: &str = "placeholder.";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Location context for a verification error.
#[derive(Debug, Clone)]
pub enum Location {
    Module,
    Global(String),
    Function(String),
    Block(String, u32),
    Instruction(String, u32, u32),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Module => write!(f, "module"),
            Location::Global(name) => write!(f, "global @{name}"),
            Location::Function(name) => write!(f, "func @{name}"),
            Location::Block(name, bi) => write!(f, "func @{name}, bb{bi}"),
            Location::Instruction(name, bi, ii) => {
                write!(f, "func @{name}, bb{bi}, inst {ii}")
            }
        }
    }
}

/// A single verification error.
#[derive(Debug, Clone)]
pub struct VerifyError {
    pub location: Location,
    pub message: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.location, self.message)
    }
}

/// Collected verification results.
#[derive(Debug, Default)]
pub struct VerifyResult {
    pub errors: Vec<VerifyError>,
}

impl VerifyResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, location: Location, message: impl Into<String>) {
        self.errors.push(VerifyError {
            location,
            message: message.into(),
        });
    }
}

impl fmt::Display for VerifyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "verification passed");
        }
        writeln!(
            f,
            "verification failed with {} error(s):",
            self.errors.len()
        )?;
        for e in &self.errors {
            writeln!(f, "  {e}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-function verification context
// ---------------------------------------------------------------------------

struct FuncVerifier<'a> {
    module: &'a Module,
    fref: FuncRef,
    func: &'a Function,
    func_name: String,
    result: &'a mut VerifyResult,
}

impl<'a> FuncVerifier<'a> {
    fn new(module: &'a Module, fref: FuncRef, result: &'a mut VerifyResult) -> Self {
        let func = module.function(fref);
        Self {
            module,
            fref,
            func,
            func_name: func.name.clone(),
            result,
        }
    }

    fn func_loc(&self) -> Location {
        Location::Function(self.func_name.clone())
    }

    fn block_loc(&self, bi: u32) -> Location {
        Location::Block(self.func_name.clone(), bi)
    }

    fn inst_loc(&self, bi: u32, ii: u32) -> Location {
        Location::Instruction(self.func_name.clone(), bi, ii)
    }

    fn is_valid_value(&self, v: ValueRef) -> bool {
        match v {
            ValueRef::Inst(i) => self
                .func
                .instructions
                .get(i.index() as usize)
                .is_some_and(|inst| !inst.is_erased()),
            ValueRef::Arg(n) => (n as usize) < self.func.params.len(),
            ValueRef::Const(_) | ValueRef::Func(_) => true,
            ValueRef::Global(g) => self
                .module
                .globals
                .get(g.index() as usize)
                .is_some_and(|gv| !gv.erased),
        }
    }

    fn is_valid_block(&self, b: BlockRef) -> bool {
        (b.index() as usize) < self.func.blocks.len()
    }

    fn value_type(&self, v: ValueRef) -> Option<TypeRef> {
        self.is_valid_value(v)
            .then(|| self.module.value_type(self.fref, v))
    }

    fn check_operands(&mut self, inst: &Instruction, loc: &Location) {
        for v in inst.op.operands() {
            if !self.is_valid_value(v) {
                self.result
                    .error(loc.clone(), format!("dangling reference {v:?}"));
            } else if let ValueRef::Global(g) = v {
                let name = &self.module.global(g).name;
                if name.starts_with(PLACEHOLDER_PREFIX) {
                    self.result
                        .error(loc.clone(), format!("unresolved placeholder @{name}"));
                }
            }
        }
    }

    fn expect_same_type(&mut self, a: ValueRef, b: ValueRef, ctx: &str, loc: &Location) {
        if let (Some(ta), Some(tb)) = (self.value_type(a), self.value_type(b)) {
            if ta != tb {
                self.result.error(
                    loc.clone(),
                    format!("{ctx}: type mismatch {} vs {}", self.ty_name(ta), self.ty_name(tb)),
                );
            }
        }
    }

    fn expect_ptr(&mut self, v: ValueRef, ctx: &str, loc: &Location) {
        if let Some(ty) = self.value_type(v) {
            if !self.module.types.is_ptr(ty) {
                self.result.error(
                    loc.clone(),
                    format!("{ctx}: expected pointer, got {}", self.ty_name(ty)),
                );
            }
        }
    }

    fn expect_i1(&mut self, v: ValueRef, ctx: &str, loc: &Location) {
        if let Some(ty) = self.value_type(v) {
            let scalar = self.module.types.scalar(ty);
            if self.module.types.int_width(scalar) != Some(1) {
                self.result.error(
                    loc.clone(),
                    format!("{ctx}: expected i1, got {}", self.ty_name(ty)),
                );
            }
        }
    }

    fn check_branch_target(&mut self, target: BlockRef, loc: &Location) {
        if !self.is_valid_block(target) {
            self.result.error(
                loc.clone(),
                format!("branch target bb{} out of bounds", target.index()),
            );
        }
    }

    fn ty_name(&self, ty: TypeRef) -> String {
        crate::display::type_to_string(&self.module.types, ty)
    }
}

// ---------------------------------------------------------------------------
// Instruction-level type checking
// ---------------------------------------------------------------------------

impl FuncVerifier<'_> {
    fn verify_instruction(&mut self, inst: &Instruction, bi: u32, ii: u32) {
        let loc = self.inst_loc(bi, ii);
        self.check_operands(inst, &loc);

        match &inst.op {
            Op::Binary { op, lhs, rhs, .. } => {
                self.expect_same_type(*lhs, *rhs, "binary operands", &loc);
                if let Some(ty) = self.value_type(*lhs) {
                    let scalar = self.module.types.scalar(ty);
                    let is_float = self.module.types.is_float(scalar);
                    if op.is_float() != is_float {
                        self.result.error(
                            loc.clone(),
                            format!("{op:?} applied to {}", self.ty_name(ty)),
                        );
                    }
                    if matches!(op, BinaryOp::Shl | BinaryOp::LShr | BinaryOp::AShr)
                        && !self.module.types.is_int(scalar)
                    {
                        self.result.error(loc.clone(), "shift of non-integer");
                    }
                }
            }
            Op::ICmp(_, a, b) | Op::FCmp(_, a, b) => {
                self.expect_same_type(*a, *b, "compare operands", &loc);
            }
            Op::Select {
                cond,
                on_true,
                on_false,
            } => {
                self.expect_i1(*cond, "select condition", &loc);
                self.expect_same_type(*on_true, *on_false, "select arms", &loc);
            }
            Op::Load { ptr, .. } => self.expect_ptr(*ptr, "load", &loc),
            Op::Store { value, ptr, .. } => {
                self.expect_ptr(*ptr, "store", &loc);
                if let (Some(vt), Some(pt)) = (self.value_type(*value), self.value_type(*ptr)) {
                    if let Some(pointee) = self.module.types.pointee(pt) {
                        if pointee != vt {
                            self.result.error(
                                loc.clone(),
                                format!(
                                    "store of {} through {}",
                                    self.ty_name(vt),
                                    self.ty_name(pt)
                                ),
                            );
                        }
                    }
                }
            }
            Op::MemCpy { dst, src, .. } => {
                self.expect_ptr(*dst, "memcpy destination", &loc);
                self.expect_ptr(*src, "memcpy source", &loc);
            }
            Op::MemSet { dst, .. } => self.expect_ptr(*dst, "memset destination", &loc),
            Op::Gep { base, .. } => self.expect_ptr(*base, "getelementptr base", &loc),
            Op::Call { callee, args, .. } => {
                if let ValueRef::Func(f) = callee {
                    let module = self.module;
                    let target = module.function(*f);
                    let vararg = self
                        .module
                        .types
                        .signature(target.ty)
                        .is_some_and(|(_, _, va)| va);
                    let arity_ok = if vararg {
                        args.len() >= target.params.len()
                    } else {
                        args.len() == target.params.len()
                    };
                    if !arity_ok {
                        self.result.error(
                            loc.clone(),
                            format!(
                                "call to @{} passes {} args, expected {}",
                                target.name,
                                args.len(),
                                target.params.len()
                            ),
                        );
                    }
                    for (i, (arg, param)) in args.iter().zip(&target.params).enumerate() {
                        if let Some(at) = self.value_type(*arg) {
                            if at != param.ty {
                                self.result.error(
                                    loc.clone(),
                                    format!(
                                        "call to @{} arg {i}: expected {}, got {}",
                                        target.name,
                                        self.ty_name(param.ty),
                                        self.ty_name(at)
                                    ),
                                );
                            }
                        }
                    }
                }
            }
            Op::Phi(incoming) => {
                if ii as usize >= self.func.first_non_phi(BlockRef(bi)) {
                    self.result.error(loc.clone(), "phi after non-phi instruction");
                }
                let preds: HashSet<BlockRef> =
                    self.func.predecessors(BlockRef(bi)).into_iter().collect();
                let from: HashSet<BlockRef> = incoming.iter().map(|(_, b)| *b).collect();
                if preds != from {
                    self.result.error(
                        loc.clone(),
                        format!(
                            "phi has {} incoming block(s), block has {} predecessor(s)",
                            from.len(),
                            preds.len()
                        ),
                    );
                }
                for (v, _) in incoming {
                    if let Some(vt) = self.value_type(*v) {
                        if vt != inst.ty {
                            self.result.error(
                                loc.clone(),
                                format!(
                                    "phi incoming {} does not match {}",
                                    self.ty_name(vt),
                                    self.ty_name(inst.ty)
                                ),
                            );
                        }
                    }
                }
            }
            Op::Br(target) => self.check_branch_target(*target, &loc),
            Op::CondBr {
                cond,
                then_bb,
                else_bb,
            } => {
                self.expect_i1(*cond, "branch condition", &loc);
                self.check_branch_target(*then_bb, &loc);
                self.check_branch_target(*else_bb, &loc);
            }
            Op::Switch { default, cases, .. } => {
                self.check_branch_target(*default, &loc);
                for (_, b) in cases {
                    self.check_branch_target(*b, &loc);
                }
            }
            Op::Ret(v) => {
                let ret_ty = self.func.ret_ty;
                match v {
                    Some(v) => {
                        if let Some(vt) = self.value_type(*v) {
                            if vt != ret_ty {
                                self.result.error(
                                    loc.clone(),
                                    format!(
                                        "return of {} from function returning {}",
                                        self.ty_name(vt),
                                        self.ty_name(ret_ty)
                                    ),
                                );
                            }
                        }
                    }
                    None => {
                        if !matches!(self.module.types.get(ret_ty), Type::Void) {
                            self.result.error(loc.clone(), "ret void in non-void function");
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn verify_blocks(&mut self) {
        let func = self.func;
        for (bi, bb) in func.blocks.iter().enumerate() {
            let bi = bi as u32;
            let loc = self.block_loc(bi);

            // Block must have at least one instruction.
            let Some(&last) = bb.insts.last() else {
                self.result.error(loc.clone(), "block has no instructions");
                continue;
            };

            // Last instruction must be a terminator.
            if !func.inst(last).op.is_terminator() {
                self.result.error(
                    loc.clone(),
                    format!(
                        "block does not end with a terminator (last op: {:?})",
                        func.inst(last).op
                    ),
                );
            }

            // Non-last instructions must NOT be terminators.
            for (i, &inst) in bb.insts.iter().enumerate().take(bb.insts.len() - 1) {
                if func.inst(inst).op.is_terminator() {
                    self.result
                        .error(self.inst_loc(bi, i as u32), "terminator in non-terminal position");
                }
            }

            for (i, &inst) in bb.insts.iter().enumerate() {
                let inst = func.inst(inst);
                if inst.parent != Some(BlockRef(bi)) {
                    self.result
                        .error(self.inst_loc(bi, i as u32), "instruction parent mismatch");
                }
                self.verify_instruction(inst, bi, i as u32);
            }
        }
    }

    fn verify_all(&mut self) {
        let module = self.module;
        if let Some((ret, params, _)) = module.types.signature(self.func.ty) {
            if ret != self.func.ret_ty || params.len() != self.func.params.len() {
                self.result
                    .error(self.func_loc(), "signature does not match function type");
            } else if params
                .iter()
                .zip(&self.func.params)
                .any(|(t, p)| *t != p.ty)
            {
                self.result
                    .error(self.func_loc(), "parameter types do not match function type");
            }
        } else {
            self.result.error(self.func_loc(), "function type is not a function");
        }
        self.verify_blocks();
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Verify a single function.
pub fn verify_function(module: &Module, func: FuncRef) -> VerifyResult {
    let mut result = VerifyResult::default();
    let mut v = FuncVerifier::new(module, func, &mut result);
    v.verify_all();
    result
}

/// Verify an entire module.
pub fn verify_module(module: &Module) -> VerifyResult {
    let mut result = VerifyResult::default();

    // Check for duplicate symbol names.
    let mut seen_names = HashSet::new();
    for func in &module.functions {
        if !seen_names.insert(func.name.clone()) {
            result.error(Location::Module, format!("duplicate function name @{}", func.name));
        }
    }
    for (_, g) in module.live_globals() {
        if !seen_names.insert(g.name.clone()) {
            result.error(Location::Module, format!("duplicate global name @{}", g.name));
        }
        if g.name.starts_with(PLACEHOLDER_PREFIX) {
            result.error(Location::Global(g.name.clone()), "unresolved placeholder global");
        }
    }

    for func in module.func_refs() {
        let mut v = FuncVerifier::new(module, func, &mut result);
        v.verify_all();
    }

    result
}

impl Module {
    /// Shorthand for [`verify_module`].
    pub fn verify(&self) -> VerifyResult {
        verify_module(self)
    }
}
