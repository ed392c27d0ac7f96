//! Builder API for constructing kiln IR.
//!
//! The builder borrows the whole module so it can intern types and
//! constants while emitting instructions into one function. Every emitted
//! instruction carries the builder's current `Origin` and debug location.

use crate::function::CallConv;
use crate::instruction::{
    BinaryOp, CastOp, FCmpOp, ICmpOp, Instruction, MemFlags, Op, Origin, WrapFlags,
};
use crate::module::Module;
use crate::value::{BlockRef, FuncRef, InstRef, MdRef, TypeRef, ValueRef};

/// Where the next instruction goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Append at the end of the block.
    End(BlockRef),
    /// Insert immediately before this instruction.
    Before(InstRef),
}

/// Builder for constructing a function's IR.
pub struct Builder<'a> {
    module: &'a mut Module,
    func: FuncRef,
    cursor: Option<Cursor>,
    origin: Origin,
    debug_loc: Option<MdRef>,
}

impl<'a> Builder<'a> {
    pub fn new(module: &'a mut Module, func: FuncRef) -> Self {
        Self {
            module,
            func,
            cursor: None,
            origin: Origin::synthetic(),
            debug_loc: None,
        }
    }

    /// The module being built.
    pub fn module(&mut self) -> &mut Module {
        &mut *self.module
    }

    pub fn func(&self) -> FuncRef {
        self.func
    }

    /// Create a new basic block at the end of the function.
    pub fn create_block(&mut self, name: Option<String>) -> BlockRef {
        self.module.function_mut(self.func).add_block(name)
    }

    /// Set the current block for subsequent instructions.
    pub fn switch_to_block(&mut self, block: BlockRef) {
        self.cursor = Some(Cursor::End(block));
    }

    /// Insert subsequent instructions before `inst`.
    pub fn position_before(&mut self, inst: InstRef) {
        self.cursor = Some(Cursor::Before(inst));
    }

    /// Insert subsequent instructions right after `inst`.
    pub fn position_after(&mut self, inst: InstRef) {
        let func = self.module.function(self.func);
        self.cursor = func.position(inst).map(|(block, pos)| {
            match func.block(block).insts.get(pos + 1) {
                Some(&next) => Cursor::Before(next),
                None => Cursor::End(block),
            }
        });
    }

    /// Block the builder currently inserts into.
    pub fn current_block(&self) -> Option<BlockRef> {
        match self.cursor? {
            Cursor::End(b) => Some(b),
            Cursor::Before(i) => self.module.function(self.func).inst(i).parent,
        }
    }

    pub fn set_origin(&mut self, origin: Origin) {
        self.origin = origin;
    }

    pub fn set_debug_loc(&mut self, loc: Option<MdRef>) {
        self.debug_loc = loc;
    }

    /// Type of a value in the function being built.
    pub fn value_type(&self, v: ValueRef) -> TypeRef {
        self.module.value_type(self.func, v)
    }

    fn make_inst(&self, op: Op, ty: TypeRef, name: Option<&str>) -> Instruction {
        Instruction {
            op,
            ty,
            name: name.filter(|n| !n.is_empty()).map(str::to_string),
            origin: self.origin.clone(),
            debug_loc: self.debug_loc,
            metadata: Vec::new(),
            parent: None,
        }
    }

    /// Emit an instruction at the cursor. Without a cursor the instruction
    /// goes to the end of the last block.
    pub fn push(&mut self, op: Op, ty: TypeRef, name: Option<&str>) -> InstRef {
        let inst = self.make_inst(op, ty, name);
        let func = self.module.function_mut(self.func);
        let (block, index) = match self.cursor {
            Some(Cursor::End(b)) => (b, None),
            Some(Cursor::Before(anchor)) => match func.position(anchor) {
                Some((b, pos)) => (b, Some(pos)),
                None => (BlockRef(func.blocks.len().saturating_sub(1) as u32), None),
            },
            None => (BlockRef(func.blocks.len().saturating_sub(1) as u32), None),
        };
        func.insert_inst(block, index, inst)
    }

    fn value(&mut self, op: Op, ty: TypeRef, name: Option<&str>) -> ValueRef {
        ValueRef::Inst(self.push(op, ty, name))
    }

    fn void_inst(&mut self, op: Op) -> InstRef {
        let void = self.module.types.void();
        self.push(op, void, None)
    }

    /// Emit an alloca after the leading allocas of the entry block,
    /// independently of the cursor.
    pub fn entry_alloca(&mut self, ty: TypeRef, align: Option<u32>, name: Option<&str>) -> ValueRef {
        let addr_space = 0;
        let ptr_ty = self.module.types.ptr(ty, addr_space);
        let inst = self.make_inst(Op::Alloca { ty, align }, ptr_ty, name);
        let func = self.module.function_mut(self.func);
        let index = func.entry_alloca_end();
        let entry = func.entry_block().unwrap_or(BlockRef(0));
        ValueRef::Inst(func.insert_inst(entry, Some(index), inst))
    }

    // -- Arithmetic --

    /// Binary operator; the result has the type of `lhs`.
    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: ValueRef,
        rhs: ValueRef,
        flags: WrapFlags,
        name: Option<&str>,
    ) -> ValueRef {
        let ty = self.value_type(lhs);
        self.value(
            Op::Binary {
                op,
                lhs,
                rhs,
                flags,
            },
            ty,
            name,
        )
    }

    /// Integer addition.
    pub fn add(&mut self, a: ValueRef, b: ValueRef) -> ValueRef {
        self.binary(BinaryOp::Add, a, b, WrapFlags::NONE, None)
    }

    /// Integer subtraction.
    pub fn sub(&mut self, a: ValueRef, b: ValueRef) -> ValueRef {
        self.binary(BinaryOp::Sub, a, b, WrapFlags::NONE, None)
    }

    /// Bitwise AND.
    pub fn and(&mut self, a: ValueRef, b: ValueRef) -> ValueRef {
        self.binary(BinaryOp::And, a, b, WrapFlags::NONE, None)
    }

    /// Bitwise XOR.
    pub fn xor(&mut self, a: ValueRef, b: ValueRef) -> ValueRef {
        self.binary(BinaryOp::Xor, a, b, WrapFlags::NONE, None)
    }

    /// Floating point negation.
    pub fn fneg(&mut self, v: ValueRef, name: Option<&str>) -> ValueRef {
        let ty = self.value_type(v);
        self.value(Op::FNeg(v), ty, name)
    }

    fn cmp_result_type(&mut self, operand: ValueRef) -> TypeRef {
        let ty = self.value_type(operand);
        self.module.types.with_scalar_int(ty, 1)
    }

    /// Integer comparison producing `i1` (or a vector of `i1`).
    pub fn icmp(&mut self, op: ICmpOp, a: ValueRef, b: ValueRef, name: Option<&str>) -> ValueRef {
        let ty = self.cmp_result_type(a);
        self.value(Op::ICmp(op, a, b), ty, name)
    }

    /// Floating point comparison producing `i1` (or a vector of `i1`).
    pub fn fcmp(&mut self, op: FCmpOp, a: ValueRef, b: ValueRef, name: Option<&str>) -> ValueRef {
        let ty = self.cmp_result_type(a);
        self.value(Op::FCmp(op, a, b), ty, name)
    }

    /// Conditional select.
    pub fn select(
        &mut self,
        cond: ValueRef,
        on_true: ValueRef,
        on_false: ValueRef,
        name: Option<&str>,
    ) -> ValueRef {
        let ty = self.value_type(on_true);
        self.value(
            Op::Select {
                cond,
                on_true,
                on_false,
            },
            ty,
            name,
        )
    }

    /// Conversion to `ty`. Identity casts return the operand unchanged.
    pub fn cast(&mut self, op: CastOp, v: ValueRef, ty: TypeRef, name: Option<&str>) -> ValueRef {
        if self.value_type(v) == ty {
            return v;
        }
        if let ValueRef::Const(c) = v {
            return ValueRef::Const(self.module.const_cast(op, c, ty));
        }
        self.value(Op::Cast(op, v), ty, name)
    }

    // -- Memory --

    /// Stack allocation at the cursor.
    pub fn alloca(&mut self, ty: TypeRef, align: Option<u32>, name: Option<&str>) -> ValueRef {
        let ptr_ty = self.module.types.ptr(ty, 0);
        self.value(Op::Alloca { ty, align }, ptr_ty, name)
    }

    /// Load a value of type `ty` from `ptr`.
    pub fn load(&mut self, ty: TypeRef, ptr: ValueRef, flags: MemFlags, name: Option<&str>) -> ValueRef {
        self.value(Op::Load { ptr, flags }, ty, name)
    }

    /// Store `value` to `ptr`.
    pub fn store(&mut self, value: ValueRef, ptr: ValueRef, flags: MemFlags) -> InstRef {
        self.void_inst(Op::Store { value, ptr, flags })
    }

    /// Copy `size` bytes from `src` to `dst`.
    pub fn memcpy(
        &mut self,
        dst: ValueRef,
        src: ValueRef,
        size: ValueRef,
        align: Option<u32>,
        volatile: bool,
    ) -> InstRef {
        self.void_inst(Op::MemCpy {
            dst,
            src,
            size,
            align,
            volatile,
        })
    }

    /// Fill `size` bytes at `dst` with `byte`.
    pub fn memset(
        &mut self,
        dst: ValueRef,
        byte: ValueRef,
        size: ValueRef,
        align: Option<u32>,
        volatile: bool,
    ) -> InstRef {
        self.void_inst(Op::MemSet {
            dst,
            byte,
            size,
            align,
            volatile,
        })
    }

    /// Address of an element. The first index steps over `base`; the rest
    /// walk into aggregates. Struct indices must be constants.
    pub fn gep(
        &mut self,
        base: ValueRef,
        indices: Vec<ValueRef>,
        inbounds: bool,
        name: Option<&str>,
    ) -> ValueRef {
        let base_ty = self.value_type(base);
        let source_ty = self.module.types.pointee(base_ty).unwrap_or(base_ty);
        let addr_space = self.module.types.addr_space(base_ty).unwrap_or(0);
        let mut cur = source_ty;
        for idx in indices.iter().skip(1) {
            let member = match idx {
                ValueRef::Const(c) => self.module.constant(*c).as_u64(64).unwrap_or(0),
                _ => 0,
            };
            cur = self.module.types.member(cur, member).unwrap_or(cur);
        }
        let ty = self.module.types.ptr(cur, addr_space);
        self.value(
            Op::Gep {
                source_ty,
                base,
                indices,
                inbounds,
            },
            ty,
            name,
        )
    }

    pub fn lifetime_start(&mut self, size: u64, ptr: ValueRef) -> InstRef {
        self.void_inst(Op::LifetimeStart { size, ptr })
    }

    pub fn lifetime_end(&mut self, size: u64, ptr: ValueRef) -> InstRef {
        self.void_inst(Op::LifetimeEnd { size, ptr })
    }

    // -- Vectors and aggregates --

    pub fn extract_element(&mut self, vector: ValueRef, index: ValueRef, name: Option<&str>) -> ValueRef {
        let vec_ty = self.value_type(vector);
        let ty = self.module.types.elem(vec_ty).unwrap_or(vec_ty);
        self.value(Op::ExtractElement { vector, index }, ty, name)
    }

    pub fn insert_element(
        &mut self,
        vector: ValueRef,
        element: ValueRef,
        index: ValueRef,
        name: Option<&str>,
    ) -> ValueRef {
        let ty = self.value_type(vector);
        self.value(
            Op::InsertElement {
                vector,
                element,
                index,
            },
            ty,
            name,
        )
    }

    /// Shuffle two vectors; the result has `mask.len()` lanes.
    pub fn shuffle_vector(
        &mut self,
        lhs: ValueRef,
        rhs: ValueRef,
        mask: Vec<Option<u32>>,
        name: Option<&str>,
    ) -> ValueRef {
        let src_ty = self.value_type(lhs);
        let elem = self.module.types.elem(src_ty).unwrap_or(src_ty);
        let ty = self.module.types.vector(elem, mask.len() as u32);
        self.value(Op::ShuffleVector { lhs, rhs, mask }, ty, name)
    }

    pub fn extract_value(&mut self, aggregate: ValueRef, indices: Vec<u32>, name: Option<&str>) -> ValueRef {
        let mut ty = self.value_type(aggregate);
        for &i in &indices {
            ty = self.module.types.member(ty, u64::from(i)).unwrap_or(ty);
        }
        self.value(Op::ExtractValue { aggregate, indices }, ty, name)
    }

    pub fn insert_value(
        &mut self,
        aggregate: ValueRef,
        value: ValueRef,
        indices: Vec<u32>,
        name: Option<&str>,
    ) -> ValueRef {
        let ty = self.value_type(aggregate);
        self.value(
            Op::InsertValue {
                aggregate,
                value,
                indices,
            },
            ty,
            name,
        )
    }

    // -- Calls --

    /// Direct call; inherits the callee's calling convention.
    pub fn call(&mut self, callee: FuncRef, args: Vec<ValueRef>, name: Option<&str>) -> ValueRef {
        let func = self.module.function(callee);
        let (fn_ty, ret, call_conv) = (func.ty, func.ret_ty, func.call_conv);
        let name = if self.module.types.is_void(ret) { None } else { name };
        self.value(
            Op::Call {
                callee: ValueRef::Func(callee),
                fn_ty,
                args,
                call_conv,
            },
            ret,
            name,
        )
    }

    /// Call through a function pointer of function type `fn_ty`.
    pub fn call_indirect(
        &mut self,
        fn_ty: TypeRef,
        callee: ValueRef,
        args: Vec<ValueRef>,
        call_conv: CallConv,
        name: Option<&str>,
    ) -> ValueRef {
        let ret = match self.module.types.signature(fn_ty).map(|(ret, _, _)| ret) {
            Some(ret) => ret,
            None => self.module.types.void(),
        };
        self.value(
            Op::Call {
                callee,
                fn_ty,
                args,
                call_conv,
            },
            ret,
            name,
        )
    }

    /// Phi node, placed after the existing phis of the current block.
    pub fn phi(&mut self, ty: TypeRef, incoming: Vec<(ValueRef, BlockRef)>, name: Option<&str>) -> InstRef {
        let inst = self.make_inst(Op::Phi(incoming), ty, name);
        let func = self.module.function_mut(self.func);
        let block = match self.cursor {
            Some(Cursor::End(b)) => b,
            Some(Cursor::Before(i)) => func.inst(i).parent.unwrap_or(BlockRef(0)),
            None => BlockRef(func.blocks.len().saturating_sub(1) as u32),
        };
        let index = func.first_non_phi(block);
        func.insert_inst(block, Some(index), inst)
    }

    /// Append an incoming edge to an existing phi.
    pub fn add_incoming(&mut self, phi: InstRef, value: ValueRef, block: BlockRef) {
        if let Op::Phi(incoming) = &mut self.module.function_mut(self.func).inst_mut(phi).op {
            incoming.push((value, block));
        }
    }

    // -- Debug intrinsics --

    pub fn dbg_declare(&mut self, address: ValueRef, variable: MdRef, expr: MdRef) -> InstRef {
        self.void_inst(Op::DbgDeclare {
            address,
            variable,
            expr,
        })
    }

    pub fn dbg_value(&mut self, value: ValueRef, variable: MdRef, expr: MdRef) -> InstRef {
        self.void_inst(Op::DbgValue {
            value,
            variable,
            expr,
        })
    }

    // -- Terminators --

    /// Unconditional branch.
    pub fn br(&mut self, target: BlockRef) -> InstRef {
        self.void_inst(Op::Br(target))
    }

    /// Conditional branch on an `i1`.
    pub fn cond_br(&mut self, cond: ValueRef, then_bb: BlockRef, else_bb: BlockRef) -> InstRef {
        self.void_inst(Op::CondBr {
            cond,
            then_bb,
            else_bb,
        })
    }

    pub fn switch(&mut self, value: ValueRef, default: BlockRef, cases: Vec<(u64, BlockRef)>) -> InstRef {
        self.void_inst(Op::Switch {
            value,
            default,
            cases,
        })
    }

    /// Return from function.
    pub fn ret(&mut self, val: Option<ValueRef>) -> InstRef {
        self.void_inst(Op::Ret(val))
    }

    pub fn unreachable(&mut self) -> InstRef {
        self.void_inst(Op::Unreachable)
    }
}
