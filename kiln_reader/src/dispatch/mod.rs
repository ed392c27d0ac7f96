//! Instruction dispatch.
//!
//! `translate_instruction` lowers one record at the end of the current
//! block and binds its result. The opcode set is closed, so routing is a
//! single `match`; each concern lives in its own submodule.

mod arith;
mod builtin;
mod memory;
mod structural;

use tracing::trace;

use kiln_ir::value::ValueRef;
use kiln_spirv::{Entity, Opcode};

use crate::error::{Result, TranslateError};
use crate::features::TargetFeature;
use crate::translator::Translator;

pub(crate) use arith::{binary_op, fcmp_op, icmp_op};

impl<'a> Translator<'a> {
    /// Lower `e` and bind its result id. Returns the bound value, if any.
    pub(crate) fn translate_instruction(&mut self, e: &'a Entity) -> Result<Option<ValueRef>> {
        let loc = self.instruction_location(e)?;
        let fs = self.state_mut(e.id)?;
        let saved_origin = fs.origin.replace(e.id);
        let saved_loc = std::mem::replace(&mut fs.debug_loc, loc);

        let result = self.dispatch(e);

        let fs = self.state_mut(e.id)?;
        fs.origin = saved_origin;
        fs.debug_loc = saved_loc;
        match result? {
            Some(v) => self.map_value(e.id, v).map(Some),
            None => Ok(self.state(e.id)?.values.get(&e.id).copied()),
        }
    }

    fn dispatch(&mut self, e: &'a Entity) -> Result<Option<ValueRef>> {
        trace!(id = e.id.0, opcode = e.opcode.name(), "translating instruction");
        match e.opcode {
            Opcode::Nop | Opcode::Line | Opcode::NoLine | Opcode::Name | Opcode::MemberName => Ok(None),

            Opcode::Branch
            | Opcode::BranchConditional
            | Opcode::Switch
            | Opcode::Phi
            | Opcode::Return
            | Opcode::ReturnValue
            | Opcode::Unreachable
            | Opcode::Kill
            | Opcode::LoopMerge
            | Opcode::SelectionMerge => self.translate_control_flow(e),

            Opcode::FunctionCall | Opcode::FunctionPointerINTEL | Opcode::FunctionPointerCallINTEL => {
                self.translate_call(e).map(Some)
            }

            Opcode::Variable => self.translate_variable(e).map(Some),
            Opcode::Load
            | Opcode::Store
            | Opcode::CopyMemory
            | Opcode::CopyMemorySized
            | Opcode::AccessChain
            | Opcode::InBoundsAccessChain
            | Opcode::PtrAccessChain
            | Opcode::InBoundsPtrAccessChain
            | Opcode::LifetimeStart
            | Opcode::LifetimeStop
            | Opcode::SizeOf
            | Opcode::ArrayLength
            | Opcode::CreatePipeFromPipeStorage => self.translate_memory(e),

            Opcode::CompositeConstruct
            | Opcode::CompositeExtract
            | Opcode::CompositeInsert
            | Opcode::VectorExtractDynamic
            | Opcode::VectorInsertDynamic
            | Opcode::VectorShuffle
            | Opcode::CopyObject => self.translate_composite(e).map(Some),

            Opcode::SMod if !self.caps.supports(TargetFeature::SignedModuloBuiltin) => {
                self.expand_smod(e).map(Some)
            }
            Opcode::SNegate
            | Opcode::FNegate
            | Opcode::Not
            | Opcode::LogicalNot
            | Opcode::Select
            | Opcode::VectorTimesScalar => self.translate_unary(e).map(Some),
            op if binary_op(op).is_some() => self.translate_binary(e).map(Some),
            op if icmp_op(op).is_some() || fcmp_op(op).is_some() => self.translate_compare(e).map(Some),
            op if op.is_conversion() => self.translate_conversion(e),

            Opcode::ExtInst => self.translate_ext_inst(e),

            op if op.is_type() || op.is_constant() || op == Opcode::Undef => Err(TranslateError::malformed(
                e.id,
                format!("{} inside a function body", op.name()),
            )),
            Opcode::Function | Opcode::FunctionParameter | Opcode::FunctionEnd | Opcode::Label => Err(
                TranslateError::malformed(e.id, format!("{} inside a block", e.opcode.name())),
            ),
            _ => self.translate_builtin(e, ""),
        }
    }
}
