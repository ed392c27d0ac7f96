//! Control flow, calls and loop hints.

use kiln_ir::function::CallConv;
use kiln_ir::metadata::MdOperand;
use kiln_ir::value::{BlockRef, MdRef, ValueRef};
use kiln_spirv::{loop_control, Entity, Id, Opcode};

use crate::error::{Result, TranslateError};
use crate::translator::{LoopHint, Translator};
use crate::values::BoolMode;

impl<'a> Translator<'a> {
    pub(super) fn translate_control_flow(&mut self, e: &'a Entity) -> Result<Option<ValueRef>> {
        match e.opcode {
            Opcode::Branch => {
                let target = self.block_ref(self.operand_id(e, 0)?)?;
                self.builder(e.id)?.br(target);
            }
            Opcode::BranchConditional => {
                let cond = self.value(self.operand_id(e, 0)?, BoolMode::Truncate)?;
                let then_bb = self.block_ref(self.operand_id(e, 1)?)?;
                let else_bb = self.block_ref(self.operand_id(e, 2)?)?;
                self.builder(e.id)?.cond_br(cond, then_bb, else_bb);
            }
            Opcode::Switch => self.translate_switch(e)?,
            Opcode::Phi => self.translate_phi(e)?,
            Opcode::Return => {
                self.builder(e.id)?.ret(None);
            }
            Opcode::ReturnValue => {
                let v = self.value(self.operand_id(e, 0)?, BoolMode::Promote)?;
                self.builder(e.id)?.ret(Some(v));
            }
            Opcode::Unreachable | Opcode::Kill => {
                self.builder(e.id)?.unreachable();
            }
            Opcode::LoopMerge => {
                let fs = self.state_mut(e.id)?;
                let header = fs.block.ok_or(TranslateError::OutsideFunction(e.id))?;
                fs.loops.push(LoopHint {
                    header,
                    control: e.word_at(2).unwrap_or(0),
                    params: e.words_from(3),
                    merge: e.id_at(0).unwrap_or(e.id),
                });
            }
            Opcode::SelectionMerge => {}
            other => {
                return Err(TranslateError::malformed(
                    e.id,
                    format!("{} is not a control flow instruction", other.name()),
                ))
            }
        }
        Ok(None)
    }

    /// Case literals take one word, or two (low first) for 64-bit selectors.
    fn translate_switch(&mut self, e: &'a Entity) -> Result<()> {
        let selector = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
        let default = self.block_ref(self.operand_id(e, 1)?)?;
        let width = self.module.types.int_width(self.type_of(selector)?).unwrap_or(32);
        let stride = if width > 32 { 3 } else { 2 };
        let mut cases = Vec::new();
        for chunk in e.operands[2..].chunks(stride) {
            let word = |i: usize| {
                chunk
                    .get(i)
                    .and_then(|op| op.as_word())
                    .ok_or_else(|| TranslateError::malformed(e.id, "truncated switch case"))
            };
            let value = if stride == 3 {
                u64::from(word(0)?) | (u64::from(word(1)?) << 32)
            } else {
                u64::from(word(0)?)
            };
            let label = chunk
                .get(stride - 1)
                .and_then(|op| op.as_id())
                .ok_or_else(|| TranslateError::malformed(e.id, "switch target is not a label"))?;
            cases.push((value, self.block_ref(label)?));
        }
        self.builder(e.id)?.switch(selector, default, cases);
        Ok(())
    }

    /// The phi is bound before its incoming values are translated so that
    /// loop-carried references to it resolve.
    fn translate_phi(&mut self, e: &'a Entity) -> Result<()> {
        let ty = self.translate_type(self.result_type(e)?)?;
        let phi = self.builder(e.id)?.phi(ty, Vec::new(), None);
        self.map_value(e.id, ValueRef::Inst(phi))?;
        for pair in e.operands.chunks(2) {
            let (Some(value), Some(parent)) = (pair[0].as_id(), pair.get(1).and_then(|p| p.as_id())) else {
                return Err(TranslateError::malformed(e.id, "phi operand is not a (value, block) pair"));
            };
            let v = self.translate_value(value, BoolMode::Promote, true)?;
            let block = self.block_ref(parent)?;
            self.builder(e.id)?.add_incoming(phi, v, block);
        }
        Ok(())
    }

    pub(super) fn translate_call(&mut self, e: &'a Entity) -> Result<ValueRef> {
        match e.opcode {
            Opcode::FunctionCall => {
                let callee = self.translate_value_noop(self.operand_id(e, 0)?)?;
                let f = callee
                    .as_func()
                    .ok_or_else(|| TranslateError::malformed(e.id, "callee is not a function"))?;
                let args = self.call_args(e, 1)?;
                Ok(self.builder(e.id)?.call(f, args, None))
            }
            Opcode::FunctionPointerINTEL => {
                let target = self.translate_value_noop(self.operand_id(e, 0)?)?;
                let ty = self.translate_type(self.result_type(e)?)?;
                Ok(self
                    .builder(e.id)?
                    .cast(kiln_ir::instruction::CastOp::Bitcast, target, ty, None))
            }
            Opcode::FunctionPointerCallINTEL => {
                let callee = self.value(self.operand_id(e, 0)?, BoolMode::Noop)?;
                let ptr_ty = self.type_of(callee)?;
                let fn_ty = self
                    .module
                    .types
                    .pointee(ptr_ty)
                    .ok_or_else(|| TranslateError::malformed(e.id, "indirect callee is not a pointer"))?;
                let args = self.call_args(e, 1)?;
                Ok(self
                    .builder(e.id)?
                    .call_indirect(fn_ty, callee, args, CallConv::SpirFunc, None))
            }
            other => Err(TranslateError::malformed(
                e.id,
                format!("{} is not a call", other.name()),
            )),
        }
    }

    fn call_args(&mut self, e: &'a Entity, from: usize) -> Result<Vec<ValueRef>> {
        let mut args = Vec::new();
        for arg in e.ids_from(from) {
            args.push(self.value(arg, BoolMode::Promote)?);
        }
        Ok(args)
    }

    // -- Loop metadata --

    /// Attach the queued loop hints of the current function to the back
    /// edges of their headers.
    pub(crate) fn finalize_loop_metadata(&mut self) -> Result<()> {
        let fs = self.fs.as_mut().ok_or(TranslateError::OutsideFunction(Id(0)))?;
        let func = fs.func;
        let loops = std::mem::take(&mut fs.loops);
        for hint in loops {
            let f = self.module.function(func);
            let layout: Vec<BlockRef> = f.block_refs().collect();
            let position = |b: BlockRef| layout.iter().position(|&x| x == b);
            let header_pos = position(hint.header);
            let mut latches: Vec<BlockRef> = f
                .predecessors(hint.header)
                .into_iter()
                .filter(|&p| position(p) >= header_pos)
                .collect();
            if latches.is_empty() {
                latches.push(hint.header);
            }
            let md = self.loop_metadata(&hint)?;
            for block in latches {
                if let Some(term) = self.module.function(func).terminator(block) {
                    self.module
                        .function_mut(func)
                        .inst_mut(term)
                        .set_metadata("llvm.loop", md);
                }
            }
        }
        Ok(())
    }

    /// Self-referential `llvm.loop` node for a loop control mask.
    /// Parameters are consumed in mask-bit order.
    fn loop_metadata(&mut self, hint: &LoopHint) -> Result<MdRef> {
        let control = hint.control;
        let mut params = hint.params.iter().copied();
        let mut next = |what: &str| {
            params.next().ok_or_else(|| {
                TranslateError::malformed(hint.merge, format!("loop control {what} is missing its parameter"))
            })
        };
        let mut hints = Vec::new();
        if control & loop_control::UNROLL != 0 {
            hints.push(self.loop_hint("llvm.loop.unroll.enable", None));
        } else if control & loop_control::DONT_UNROLL != 0 {
            hints.push(self.loop_hint("llvm.loop.unroll.disable", None));
        }
        if control & loop_control::DEPENDENCY_INFINITE != 0 {
            hints.push(self.loop_hint("llvm.loop.ivdep.enable", None));
        }
        if control & loop_control::DEPENDENCY_LENGTH != 0 {
            let len = next("DependencyLength")?;
            hints.push(self.loop_hint("llvm.loop.ivdep.safelen", Some(len)));
        }
        for (bit, what) in [
            (loop_control::MIN_ITERATIONS, "MinIterations"),
            (loop_control::MAX_ITERATIONS, "MaxIterations"),
            (loop_control::ITERATION_MULTIPLE, "IterationMultiple"),
            (loop_control::PEEL_COUNT, "PeelCount"),
        ] {
            if control & bit != 0 {
                next(what)?;
            }
        }
        if control & loop_control::PARTIAL_COUNT != 0 && control & loop_control::DONT_UNROLL == 0 {
            match next("PartialCount")? {
                1 => hints.push(self.loop_hint("llvm.loop.unroll.disable", None)),
                count => hints.push(self.loop_hint("llvm.loop.unroll.count", Some(count))),
            }
        }
        Ok(self
            .module
            .md_self_ref(hints.into_iter().map(MdOperand::Node).collect()))
    }

    fn loop_hint(&mut self, name: &str, value: Option<u32>) -> MdRef {
        let mut ops = vec![MdOperand::string(name)];
        if let Some(value) = value {
            ops.push(MdOperand::Const(self.module.const_i32(i64::from(value))));
        }
        self.module.md_tuple(ops)
    }
}
