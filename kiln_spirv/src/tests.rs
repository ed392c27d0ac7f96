//! Tests for the entity store and its builder.

use crate::builder::StoreBuilder;
use crate::debug::DebugOp;
use crate::entity::{Id, Operand};
use crate::enums::{
    AccessQualifier, Capability, Decoration, Dim, ExecutionMode, ExecutionModel, ExtInstSet,
    ImageDescriptor, StorageClass,
};
use crate::ocl_std;
use crate::opcode::Opcode;

#[test]
fn opcode_words_round_trip() {
    assert_eq!(Opcode::from_word(128), Some(Opcode::IAdd));
    assert_eq!(Opcode::IAdd.word(), 128);
    assert_eq!(Opcode::IAdd.name(), "IAdd");
    assert_eq!(Opcode::from_word(2), None);
    assert!(Opcode::Bitcast.is_conversion());
    assert!(!Opcode::SNegate.is_conversion());
    assert!(Opcode::AtomicFlagClear.is_atomic());
    assert!(Opcode::ReturnValue.is_terminator());
}

#[test]
fn scalar_types_are_deduplicated() {
    let mut b = StoreBuilder::new();
    let a = b.type_int(32);
    let c = b.type_int(32);
    let d = b.type_int(64);
    assert_eq!(a, c);
    assert_ne!(a, d);
    let s1 = b.type_struct(&[a]);
    let s2 = b.type_struct(&[a]);
    assert_ne!(s1, s2);
}

#[test]
fn function_layout() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let fn_ty = b.type_function(i32_ty, &[i32_ty, i32_ty]);
    let f = b.begin_function(fn_ty, 0);
    let x = b.param(i32_ty);
    let y = b.param(i32_ty);
    let entry = b.block();
    let sum = b.inst(Opcode::IAdd, Some(i32_ty), vec![x.into(), y.into()]);
    b.inst(Opcode::ReturnValue, None, vec![sum.into()]);
    b.end_function();
    b.name(f, "add");
    let store = b.finish();

    let def = store.function(f).unwrap();
    assert_eq!(def.params, vec![x, y]);
    assert_eq!(def.blocks.len(), 1);
    assert_eq!(def.blocks[0].label, entry);
    assert_eq!(def.blocks[0].insts.len(), 2);
    assert_eq!(store.get(f).unwrap().ty, Some(i32_ty));
    assert_eq!(store.name(f), Some("add"));
    assert_eq!(store.get(sum).unwrap().id_at(1), Some(y));
    assert!(store.bound > sum.0);
}

#[test]
fn decorations_and_modes() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let void = b.type_void();
    let fn_ty = b.type_function(void, &[i32_ty]);
    let f = b.begin_function(fn_ty, 0);
    let p = b.param(i32_ty);
    b.block();
    b.inst(Opcode::Return, None, vec![]);
    b.end_function();
    b.entry_point(ExecutionModel::Kernel, f, "k")
        .execution_mode(f, ExecutionMode::LocalSize, vec![8, 4, 1])
        .decorate(p, Decoration::FuncParamAttr, vec![Operand::Literal(0)])
        .decorate(p, Decoration::FuncParamAttr, vec![Operand::Literal(4)])
        .decorate(p, Decoration::Alignment, vec![Operand::Literal(16)]);
    let store = b.finish();

    assert!(store.is_kernel(f));
    assert_eq!(store.execution_mode(f, ExecutionMode::LocalSize), Some(&[8, 4, 1][..]));
    assert_eq!(store.execution_mode(f, ExecutionMode::VecTypeHint), None);
    assert_eq!(store.decoration_words(p, Decoration::FuncParamAttr), vec![0, 4]);
    assert_eq!(store.decoration_word(p, Decoration::Alignment), Some(16));
    assert!(!store.has_decoration(p, Decoration::Volatile));
}

#[test]
fn debug_records_are_indexed() {
    let mut b = StoreBuilder::new();
    let dbg = b.ext_inst_import(ExtInstSet::OpenClDebugInfo100);
    let std = b.ext_inst_import(ExtInstSet::OpenClStd);
    let file = b.string("/tmp/a.cl");
    let src = b.debug_record(dbg, DebugOp::Source, vec![file.into()]);
    let cu = b.debug_record(
        dbg,
        DebugOp::CompilationUnit,
        vec![Operand::Literal(65536), Operand::Literal(4), src.into(), Operand::Literal(3)],
    );
    let gv = b.debug_record(dbg, DebugOp::GlobalVariable, vec![]);
    b.ext_record(std, 0, vec![]);
    let store = b.finish();

    assert_eq!(store.compile_unit, Some(cu));
    assert_eq!(store.debug_globals, vec![gv]);
    assert_eq!(store.debug_records, vec![src, cu, gv]);
    assert_eq!(store.ext_set(dbg), Some(ExtInstSet::OpenClDebugInfo100));
    assert_eq!(store.string(file), Some("/tmp/a.cl"));
    let cu_entity = store.get(cu).unwrap();
    assert_eq!(cu_entity.ext_op(), Some(DebugOp::CompilationUnit.word()));
    assert_eq!(cu_entity.ext_arg_id(2), Some(src));
    assert_eq!(store.ext_set_of(cu_entity), Some(ExtInstSet::OpenClDebugInfo100));
}

#[test]
fn lines_attach_inside_functions_only() {
    let mut b = StoreBuilder::new();
    let file = b.string("k.cl");
    let void = b.type_void();
    let fn_ty = b.type_function(void, &[]);
    b.line(file, 3, 7);
    let outside = b.type_int(8);
    b.begin_function(fn_ty, 0);
    b.block();
    b.line(file, 4, 1);
    let ret = b.inst(Opcode::Return, None, vec![]);
    b.end_function();
    let store = b.finish();

    assert_eq!(store.get(outside).unwrap().line, None);
    let line = store.get(ret).unwrap().line.unwrap();
    assert_eq!((line.file, line.line, line.column), (file, 4, 1));
}

#[test]
fn image_type_names() {
    let desc = ImageDescriptor {
        dim: Dim::Dim2D,
        depth: 1,
        arrayed: true,
        multisampled: false,
        sampled: 0,
        format: 0,
    };
    assert_eq!(desc.ocl_type_name(), "image2d_array_depth_t");
    let buffer = ImageDescriptor {
        dim: Dim::Buffer,
        depth: 0,
        arrayed: false,
        ..desc
    };
    assert_eq!(buffer.ocl_type_name(), "image1d_buffer_t");
    assert_eq!(AccessQualifier::ReadWrite.ocl_name(), "read_write");
}

#[test]
fn capability_extensions() {
    assert_eq!(Capability::Float64.ocl_extension(), Some("cl_doubles"));
    assert_eq!(Capability::Float16.ocl_extension(), Some("cl_khr_fp16"));
    assert_eq!(Capability::Kernel.ocl_extension(), None);
}

#[test]
fn ocl_std_names() {
    assert_eq!(ocl_std::name(0), Some("acos"));
    assert_eq!(ocl_std::name(94), Some("native_tan"));
    assert_eq!(ocl_std::name(95), Some("fclamp"));
    assert_eq!(ocl_std::name(111), None);
    assert_eq!(ocl_std::name(141), Some("s_abs"));
    assert_eq!(ocl_std::name(ocl_std::PRINTF), Some("printf"));
    assert_eq!(ocl_std::name(204), Some("u_mad_hi"));
    assert_eq!(ocl_std::op_of("vstore_halfn_r"), Some(178));
    assert_eq!(ocl_std::op_of("nope"), None);
}

#[test]
fn strings_by_prefix() {
    let mut b = StoreBuilder::new();
    b.string("unrelated");
    b.string("kernel_arg_type.k.int*,float,");
    let store = b.finish();
    assert_eq!(store.find_string("kernel_arg_type.k."), Some("kernel_arg_type.k.int*,float,"));
    assert_eq!(store.find_string("kernel_arg_type.q."), None);
}

#[test]
fn global_variables_are_recorded() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let ptr = b.type_pointer(StorageClass::CrossWorkgroup, i32_ty);
    let zero = b.constant_u32(i32_ty, 0);
    let g = b.global_variable(ptr, StorageClass::CrossWorkgroup, Some(zero));
    let store = b.finish();
    assert_eq!(store.global_vars, vec![g]);
    let e = store.get(g).unwrap();
    assert_eq!(e.word_at(0), Some(StorageClass::CrossWorkgroup.word()));
    assert_eq!(e.id_at(1), Some(zero));
    assert_eq!(Id(3).to_string(), "%3");
}
