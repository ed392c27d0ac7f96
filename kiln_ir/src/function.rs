//! Function and basic block definitions.
//!
//! Instructions live in a per-function arena; each block keeps an ordered
//! list of `InstRef`s so instructions can be inserted anywhere and erased
//! without renumbering.

use crate::global::Linkage;
use crate::instruction::{Instruction, Op};
use crate::value::{BlockRef, InstRef, MdRef, TypeRef, ValueRef};

/// Calling convention of a function or call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallConv {
    /// Device kernel entry point.
    SpirKernel,
    /// Ordinary device function.
    SpirFunc,
}

/// Function-level attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FnAttr {
    NoUnwind,
    ReadNone,
    ReadOnly,
    AlwaysInline,
    NoInline,
    Convergent,
    ReferencedIndirectly,
}

/// Parameter attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamAttr {
    ZExt,
    SExt,
    ByVal,
    StructRet,
    NoAlias,
    NoCapture,
    ReadOnly,
    ReadNone,
}

/// A formal parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub ty: TypeRef,
    pub name: Option<String>,
    pub attrs: Vec<ParamAttr>,
}

/// A basic block: an ordered list of instructions in the function arena.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub name: Option<String>,
    pub insts: Vec<InstRef>,
}

/// A function in the kiln IR. A function without blocks is a declaration.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// Function type.
    pub ty: TypeRef,
    /// Type of the function's address.
    pub ptr_ty: TypeRef,
    pub ret_ty: TypeRef,
    pub params: Vec<Param>,
    pub linkage: Linkage,
    pub call_conv: CallConv,
    pub attrs: Vec<FnAttr>,
    /// Instruction arena.
    pub instructions: Vec<Instruction>,
    /// Basic blocks in layout order.
    pub blocks: Vec<BasicBlock>,
    /// Attached debug subprogram.
    pub subprogram: Option<MdRef>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        ty: TypeRef,
        ptr_ty: TypeRef,
        ret_ty: TypeRef,
        param_tys: Vec<TypeRef>,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            ptr_ty,
            ret_ty,
            params: param_tys
                .into_iter()
                .map(|ty| Param {
                    ty,
                    name: None,
                    attrs: Vec::new(),
                })
                .collect(),
            linkage: Linkage::External,
            call_conv: CallConv::SpirFunc,
            attrs: Vec::new(),
            instructions: Vec::new(),
            blocks: Vec::new(),
            subprogram: None,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn has_attr(&self, attr: FnAttr) -> bool {
        self.attrs.contains(&attr)
    }

    pub fn add_attr(&mut self, attr: FnAttr) {
        if !self.has_attr(attr) {
            self.attrs.push(attr);
        }
    }

    /// Get an instruction by reference.
    pub fn inst(&self, r: InstRef) -> &Instruction {
        &self.instructions[r.0 as usize]
    }

    pub fn inst_mut(&mut self, r: InstRef) -> &mut Instruction {
        &mut self.instructions[r.0 as usize]
    }

    /// Get a basic block by reference.
    pub fn block(&self, r: BlockRef) -> &BasicBlock {
        &self.blocks[r.0 as usize]
    }

    /// All blocks in layout order.
    pub fn block_refs(&self) -> impl Iterator<Item = BlockRef> {
        (0..self.blocks.len() as u32).map(BlockRef)
    }

    /// Reference to the entry block.
    pub fn entry_block(&self) -> Option<BlockRef> {
        if self.blocks.is_empty() {
            None
        } else {
            Some(BlockRef(0))
        }
    }

    /// Iterate (InstRef, &Instruction) pairs in a basic block.
    pub fn block_insts(&self, r: BlockRef) -> impl Iterator<Item = (InstRef, &Instruction)> {
        self.block(r).insts.iter().map(move |&i| (i, self.inst(i)))
    }

    /// Iterate every live instruction in layout order.
    pub fn live_insts(&self) -> impl Iterator<Item = (InstRef, &Instruction)> {
        self.blocks
            .iter()
            .flat_map(move |bb| bb.insts.iter().map(move |&i| (i, self.inst(i))))
    }

    /// Append a block and return its reference.
    pub fn add_block(&mut self, name: Option<String>) -> BlockRef {
        let r = BlockRef(self.blocks.len() as u32);
        self.blocks.push(BasicBlock {
            name,
            insts: Vec::new(),
        });
        r
    }

    /// Place a new instruction into `block` at `index` (or at the end).
    pub fn insert_inst(
        &mut self,
        block: BlockRef,
        index: Option<usize>,
        mut inst: Instruction,
    ) -> InstRef {
        let r = InstRef(self.instructions.len() as u32);
        inst.parent = Some(block);
        self.instructions.push(inst);
        let insts = &mut self.blocks[block.0 as usize].insts;
        match index {
            Some(i) if i <= insts.len() => insts.insert(i, r),
            _ => insts.push(r),
        }
        r
    }

    /// Position of an instruction inside its parent block.
    pub fn position(&self, r: InstRef) -> Option<(BlockRef, usize)> {
        let block = self.inst(r).parent?;
        let pos = self.block(block).insts.iter().position(|&i| i == r)?;
        Some((block, pos))
    }

    /// Index after the leading allocas of the entry block.
    pub fn entry_alloca_end(&self) -> usize {
        match self.entry_block() {
            Some(entry) => self
                .block(entry)
                .insts
                .iter()
                .take_while(|&&i| matches!(self.inst(i).op, Op::Alloca { .. }))
                .count(),
            None => 0,
        }
    }

    /// Index after the leading phis of a block.
    pub fn first_non_phi(&self, block: BlockRef) -> usize {
        self.block(block)
            .insts
            .iter()
            .take_while(|&&i| matches!(self.inst(i).op, Op::Phi(_)))
            .count()
    }

    /// Unlink an instruction from its block. Its arena slot stays but is dead.
    pub fn erase_inst(&mut self, r: InstRef) {
        if let Some(block) = self.instructions[r.0 as usize].parent.take() {
            self.blocks[block.0 as usize].insts.retain(|&i| i != r);
        }
    }

    /// Last instruction of a block if it is a terminator.
    pub fn terminator(&self, block: BlockRef) -> Option<InstRef> {
        let last = *self.block(block).insts.last()?;
        self.inst(last).op.is_terminator().then_some(last)
    }

    pub fn successors(&self, block: BlockRef) -> Vec<BlockRef> {
        match self.terminator(block) {
            Some(t) => self.inst(t).op.successors(),
            None => Vec::new(),
        }
    }

    /// Distinct predecessors of a block, in layout order.
    pub fn predecessors(&self, block: BlockRef) -> Vec<BlockRef> {
        self.block_refs()
            .filter(|&b| self.successors(b).contains(&block))
            .collect()
    }

    /// Live instructions that use `v` as an operand.
    pub fn uses(&self, v: ValueRef) -> Vec<InstRef> {
        self.live_insts()
            .filter(|(_, inst)| inst.op.operands().contains(&v))
            .map(|(r, _)| r)
            .collect()
    }

    /// Redirect every use of `old` to `new`. Returns the number of rewritten operands.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) -> usize {
        let mut count = 0;
        for inst in self.instructions.iter_mut().filter(|i| !i.is_erased()) {
            for operand in inst.op.operands_mut() {
                if *operand == old {
                    *operand = new;
                    count += 1;
                }
            }
        }
        count
    }

    /// Insert a parameter at `index`, renumbering argument uses at or after it.
    pub fn insert_param(&mut self, index: u32, param: Param) {
        for inst in self.instructions.iter_mut() {
            for operand in inst.op.operands_mut() {
                if let ValueRef::Arg(n) = operand {
                    if *n >= index {
                        *n += 1;
                    }
                }
            }
        }
        self.params.insert(index as usize, param);
    }
}
