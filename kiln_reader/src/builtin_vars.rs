//! Builtin variables become calls to readnone builtin functions.

use tracing::debug;

use kiln_ir::builder::Builder;
use kiln_ir::function::FnAttr;
use kiln_ir::instruction::{CastOp, Op};
use kiln_ir::value::{FuncRef, InstRef, ValueRef};

use crate::error::{Result, TranslateError};
use crate::mangle::builtin_variable;
use crate::translator::Translator;

impl<'a> Translator<'a> {
    /// Replace every load of a builtin-decorated global with a call and
    /// erase the global.
    pub(crate) fn lower_builtin_variables(&mut self) -> Result<()> {
        let vars = std::mem::take(&mut self.builtin_vars);
        for (g, builtin) in vars {
            let value_ty = self.module.global(g).value_ty;
            let fn_ty = self.module.types.function(value_ty, Vec::new(), false);
            let name = builtin_variable(builtin.name());
            let callee = self.builtin_function(&name, fn_ty, &[FnAttr::ReadNone, FnAttr::NoUnwind]);
            let funcs: Vec<FuncRef> = self.module.func_refs().collect();
            for f in funcs {
                self.lower_builtin_uses(f, ValueRef::Global(g), callee, &name)?;
            }
            self.module.erase_global(g);
            debug!(builtin = %name, "lowered builtin variable");
        }
        Ok(())
    }

    fn lower_builtin_uses(&mut self, f: FuncRef, addr: ValueRef, callee: FuncRef, name: &str) -> Result<()> {
        for user in self.module.function(f).uses(addr) {
            let op = self.module.function(f).inst(user).op.clone();
            match op {
                Op::Load { .. } => self.replace_with_call(f, user, callee, None),
                Op::Cast(CastOp::AddrSpaceCast | CastOp::Bitcast, _) => {
                    self.lower_builtin_uses(f, ValueRef::Inst(user), callee, name)?;
                    self.erase_if_dead(f, user);
                }
                Op::Gep { indices, .. } if indices.len() == 2 && self.is_zero(indices[0]) => {
                    let lane = indices[1];
                    for load in self.module.function(f).uses(ValueRef::Inst(user)) {
                        if !matches!(self.module.function(f).inst(load).op, Op::Load { .. }) {
                            return Err(TranslateError::not_implemented(format!(
                                "non-load use of an element of {name}"
                            )));
                        }
                        self.replace_with_call(f, load, callee, Some(lane));
                    }
                    self.erase_if_dead(f, user);
                }
                _ => {
                    return Err(TranslateError::not_implemented(format!(
                        "non-load use of builtin variable {name}"
                    )))
                }
            }
        }
        Ok(())
    }

    /// Replace `load` with a call of `callee`, extracting `lane` from a
    /// vector result.
    fn replace_with_call(&mut self, f: FuncRef, load: InstRef, callee: FuncRef, lane: Option<ValueRef>) {
        let inst = self.module.function(f).inst(load);
        let (origin, loc) = (inst.origin.clone(), inst.debug_loc);
        let mut b = Builder::new(&mut self.module, f);
        b.position_before(load);
        b.set_origin(origin);
        b.set_debug_loc(loc);
        let mut v = b.call(callee, Vec::new(), None);
        if let Some(lane) = lane {
            v = b.extract_element(v, lane, None);
        }
        let func = self.module.function_mut(f);
        func.replace_all_uses(ValueRef::Inst(load), v);
        func.erase_inst(load);
    }

    fn is_zero(&self, v: ValueRef) -> bool {
        v.as_const()
            .and_then(|c| self.module.constant(c).as_u64(64))
            .is_some_and(|n| n == 0)
    }

    fn erase_if_dead(&mut self, f: FuncRef, inst: InstRef) {
        let func = self.module.function_mut(f);
        if func.uses(ValueRef::Inst(inst)).is_empty() {
            func.erase_inst(inst);
        }
    }
}
