//! Calling-convention legalization.
//!
//! Aggregates never cross a call boundary by value in the output: a
//! struct result is returned through a leading `sret` pointer and an
//! aggregate argument is passed as a pointer to a caller-owned copy.

use tracing::debug;

use kiln_ir::builder::Builder;
use kiln_ir::function::{Param, ParamAttr};
use kiln_ir::global::Linkage;
use kiln_ir::instruction::{CastOp, MemFlags, Op};
use kiln_ir::value::{FuncRef, InstRef, TypeRef, ValueRef};

use crate::error::Result;
use crate::translator::Translator;

impl<'a> Translator<'a> {
    pub(crate) fn legalize_abi(&mut self) -> Result<()> {
        let funcs: Vec<FuncRef> = self.module.func_refs().collect();
        for &f in &funcs {
            let by_value: Vec<u32> = self
                .module
                .function(f)
                .params
                .iter()
                .enumerate()
                .filter(|(_, p)| self.module.types.is_aggregate(p.ty))
                .map(|(i, _)| i as u32)
                .collect();
            if !by_value.is_empty() {
                self.pass_by_pointer(f, &funcs, &by_value);
            }
        }
        for &f in &funcs {
            let ret = self.module.function(f).ret_ty;
            if self.module.types.is_struct(ret) {
                self.return_through_pointer(f, &funcs, ret);
            }
        }
        for &caller in &funcs {
            for call in self.indirect_calls(caller) {
                self.legalize_indirect_call(caller, call);
            }
        }
        Ok(())
    }

    /// Signature of `f` rebuilt from its current parameter list.
    fn refresh_signature(&mut self, f: FuncRef, ret: TypeRef) {
        let func = self.module.function(f);
        let params: Vec<TypeRef> = func.params.iter().map(|p| p.ty).collect();
        let vararg = self
            .module
            .types
            .signature(func.ty)
            .is_some_and(|(_, _, vararg)| vararg);
        let fn_ty = self.module.types.function(ret, params, vararg);
        self.module.set_function_type(f, fn_ty);
    }

    fn pass_by_pointer(&mut self, f: FuncRef, funcs: &[FuncRef], params: &[u32]) {
        let align = self.module.layout.pointer_size;
        let mut pointees = Vec::with_capacity(params.len());
        for &index in params {
            let ty = self.module.function(f).params[index as usize].ty;
            let ptr = self.module.ptr_to(ty, 0);
            self.module.function_mut(f).params[index as usize].ty = ptr;
            pointees.push((index, ty));
        }
        let ret = self.module.function(f).ret_ty;
        self.refresh_signature(f, ret);

        if !self.module.function(f).is_declaration() {
            for &(index, ty) in &pointees {
                self.copy_in_argument(f, index, ty, align);
            }
        }
        for &caller in funcs {
            for call in self.direct_calls(caller, f) {
                for &(index, ty) in &pointees {
                    self.spill_argument(caller, call, index, ty, align);
                }
                let fn_ty = self.module.function(f).ty;
                if let Op::Call { fn_ty: call_ty, .. } = &mut self.module.function_mut(caller).inst_mut(call).op {
                    *call_ty = fn_ty;
                }
            }
        }
        debug!(function = %self.module.function(f).name, params = params.len(), "aggregate parameters passed by pointer");
    }

    /// In the callee: copy the pointee of argument `index` into a local and
    /// use the loaded copy in place of the argument.
    fn copy_in_argument(&mut self, f: FuncRef, index: u32, ty: TypeRef, align: u32) {
        let arg = ValueRef::Arg(index);
        let users = self.module.function(f).uses(arg);
        let size = self.module.layout.alloc_size(&self.module.types, ty);
        let size = ValueRef::Const(self.module.const_i64(size as i64));

        let mut b = Builder::new(&mut self.module, f);
        let tmp = b.entry_alloca(ty, Some(align), None);
        let func = b.module().function(f);
        let anchor = func
            .entry_block()
            .and_then(|entry| func.block(entry).insts.get(func.entry_alloca_end()).copied());
        match anchor {
            Some(inst) => b.position_before(inst),
            None => {
                if let Some(entry) = b.module().function(f).entry_block() {
                    b.switch_to_block(entry);
                }
            }
        }
        b.memcpy(tmp, arg, size, Some(align), false);
        let copy = b.load(ty, tmp, MemFlags::aligned(align), None);

        let func = self.module.function_mut(f);
        for user in users {
            for operand in func.inst_mut(user).op.operands_mut() {
                if *operand == arg {
                    *operand = copy;
                }
            }
        }
    }

    /// In the caller: replace argument `index` of `call` with a pointer to
    /// a copy of the value.
    fn spill_argument(&mut self, caller: FuncRef, call: InstRef, index: u32, ty: TypeRef, align: u32) {
        let inst = self.module.function(caller).inst(call);
        let Op::Call { args, .. } = &inst.op else {
            return;
        };
        let Some(&value) = args.get(index as usize) else {
            return;
        };
        let (origin, loc) = (inst.origin.clone(), inst.debug_loc);

        let pointer = match value {
            ValueRef::Const(c) => {
                let name = format!("{}.byval", self.module.function(caller).name);
                let g = self.module.add_global(&name, ty, 0, Linkage::Internal);
                let global = self.module.global_mut(g);
                global.initializer = Some(c);
                global.constant = true;
                global.align = Some(align);
                ValueRef::Global(g)
            }
            _ => {
                let mut b = Builder::new(&mut self.module, caller);
                b.set_origin(origin);
                b.set_debug_loc(loc);
                let tmp = b.entry_alloca(ty, Some(align), None);
                b.position_before(call);
                b.store(value, tmp, MemFlags::aligned(align));
                tmp
            }
        };
        if let Op::Call { args, .. } = &mut self.module.function_mut(caller).inst_mut(call).op {
            args[index as usize] = pointer;
        }
    }

    fn return_through_pointer(&mut self, f: FuncRef, funcs: &[FuncRef], ty: TypeRef) {
        let align = self.module.layout.pointer_size;
        let sret = self.module.ptr_to(ty, 0);
        self.module.function_mut(f).insert_param(
            0,
            Param {
                ty: sret,
                name: Some("agg.result".to_string()),
                attrs: vec![ParamAttr::StructRet, ParamAttr::NoAlias],
            },
        );
        let void = self.module.types.void();
        self.refresh_signature(f, void);

        let size = self.module.layout.alloc_size(&self.module.types, ty);
        let size = ValueRef::Const(self.module.const_i64(size as i64));
        let returns: Vec<(InstRef, ValueRef)> = self
            .module
            .function(f)
            .live_insts()
            .filter_map(|(r, inst)| match inst.op {
                Op::Ret(Some(v)) => Some((r, v)),
                _ => None,
            })
            .collect();
        for (ret, value) in returns {
            let inst = self.module.function(f).inst(ret);
            let (origin, loc) = (inst.origin.clone(), inst.debug_loc);
            let mut b = Builder::new(&mut self.module, f);
            b.set_origin(origin);
            b.set_debug_loc(loc);
            let tmp = b.entry_alloca(ty, Some(align), None);
            b.position_before(ret);
            b.store(value, tmp, MemFlags::aligned(align));
            b.memcpy(ValueRef::Arg(0), tmp, size, Some(align), false);
            b.ret(None);
            self.module.function_mut(f).erase_inst(ret);
        }

        for &caller in funcs {
            for call in self.direct_calls(caller, f) {
                let inst = self.module.function(caller).inst(call);
                let Op::Call { args, .. } = &inst.op else {
                    continue;
                };
                let mut args = args.clone();
                let (origin, loc) = (inst.origin.clone(), inst.debug_loc);
                let mut b = Builder::new(&mut self.module, caller);
                b.set_origin(origin);
                b.set_debug_loc(loc);
                let tmp = b.entry_alloca(ty, Some(align), None);
                args.insert(0, tmp);
                b.position_before(call);
                b.call(f, args, None);
                let result = b.load(ty, tmp, MemFlags::aligned(align), None);
                let func = self.module.function_mut(caller);
                func.replace_all_uses(ValueRef::Inst(call), result);
                func.erase_inst(call);
            }
        }
        debug!(function = %self.module.function(f).name, "struct result returned through pointer");
    }

    /// Calls through a function pointer whose signature still moves an
    /// aggregate by value.
    fn indirect_calls(&self, caller: FuncRef) -> Vec<InstRef> {
        let types = &self.module.types;
        self.module
            .function(caller)
            .live_insts()
            .filter(|(_, inst)| match &inst.op {
                Op::Call { callee, fn_ty, .. } if !matches!(callee, ValueRef::Func(_)) => types
                    .signature(*fn_ty)
                    .is_some_and(|(ret, params, _)| {
                        types.is_struct(ret) || params.iter().any(|&p| types.is_aggregate(p))
                    }),
                _ => false,
            })
            .map(|(r, _)| r)
            .collect()
    }

    /// Give an indirect call the pointer-passing signature its callee was
    /// legalized to. The callee pointer is cast to the new function type.
    fn legalize_indirect_call(&mut self, caller: FuncRef, call: InstRef) {
        let align = self.module.layout.pointer_size;
        let inst = self.module.function(caller).inst(call);
        let Op::Call {
            callee,
            fn_ty,
            call_conv,
            ..
        } = inst.op.clone()
        else {
            return;
        };
        let (origin, loc) = (inst.origin.clone(), inst.debug_loc);
        let Some((ret, params, vararg)) = self
            .module
            .types
            .signature(fn_ty)
            .map(|(ret, params, vararg)| (ret, params.to_vec(), vararg))
        else {
            return;
        };

        let mut new_params = Vec::with_capacity(params.len() + 1);
        for (index, &ty) in params.iter().enumerate() {
            if self.module.types.is_aggregate(ty) {
                self.spill_argument(caller, call, index as u32, ty, align);
                new_params.push(self.module.ptr_to(ty, 0));
            } else {
                new_params.push(ty);
            }
        }
        let sret = self.module.types.is_struct(ret);
        let new_ret = if sret {
            new_params.insert(0, self.module.ptr_to(ret, 0));
            self.module.types.void()
        } else {
            ret
        };
        let new_fn_ty = self.module.types.function(new_ret, new_params, vararg);
        let callee_ty = self.module.value_type(caller, callee);
        let space = self.module.types.addr_space(callee_ty).unwrap_or(0);
        let new_ptr_ty = self.module.ptr_to(new_fn_ty, space);

        let Op::Call { args, .. } = &self.module.function(caller).inst(call).op else {
            return;
        };
        let mut args = args.clone();
        let mut b = Builder::new(&mut self.module, caller);
        b.set_origin(origin);
        b.set_debug_loc(loc);
        let tmp = sret.then(|| b.entry_alloca(ret, Some(align), None));
        b.position_before(call);
        let target = b.cast(CastOp::Bitcast, callee, new_ptr_ty, None);
        match tmp {
            Some(tmp) => {
                args.insert(0, tmp);
                b.call_indirect(new_fn_ty, target, args, call_conv, None);
                let result = b.load(ret, tmp, MemFlags::aligned(align), None);
                let func = self.module.function_mut(caller);
                func.replace_all_uses(ValueRef::Inst(call), result);
                func.erase_inst(call);
            }
            None => {
                if let Op::Call {
                    callee, fn_ty, args: old, ..
                } = &mut self.module.function_mut(caller).inst_mut(call).op
                {
                    *callee = target;
                    *fn_ty = new_fn_ty;
                    *old = args;
                }
            }
        }
        debug!(caller = %self.module.function(caller).name, sret, "legalized indirect call");
    }

    /// Live calls in `caller` whose callee is `f` itself.
    fn direct_calls(&self, caller: FuncRef, f: FuncRef) -> Vec<InstRef> {
        self.module
            .function(caller)
            .live_insts()
            .filter(|(_, inst)| matches!(inst.op, Op::Call { callee: ValueRef::Func(c), .. } if c == f))
            .map(|(r, _)| r)
            .collect()
    }
}
