//! End-to-end tests: entity store → kiln IR module.

use kiln_ir::constant::ConstKind;
use kiln_ir::function::{CallConv, ParamAttr};
use kiln_ir::global::Linkage;
use kiln_ir::instruction::{BinaryOp, CastOp, ICmpOp, Op};
use kiln_ir::metadata::{DiNode, MdNode, MdOperand};
use kiln_ir::module::Module;
use kiln_ir::types::Type;
use kiln_ir::value::{FuncRef, ValueRef};
use kiln_reader::{translate, translate_with, CollectingSink, TranslateError, Translation, TranslatorOptions};
use kiln_spirv::debug::{flags, DebugOp, Encoding};
use kiln_spirv::{
    loop_control, AccessQualifier, BuiltIn, Decoration, Dim, EntityStore, ExecutionMode, ExecutionModel, ExtInstSet,
    FuncParamAttr, ImageDescriptor, Opcode, SourceLanguage, StorageClass, StoreBuilder,
};

fn run(store: &EntityStore) -> Translation {
    translate(store, &TranslatorOptions::default()).expect("translation should succeed")
}

fn function(module: &Module, name: &str) -> FuncRef {
    module
        .get_function(name)
        .unwrap_or_else(|| panic!("no function @{name}"))
}

fn ops(module: &Module, f: FuncRef) -> Vec<Op> {
    module
        .function(f)
        .live_insts()
        .map(|(_, inst)| inst.op.clone())
        .collect()
}

fn callee_names(module: &Module, f: FuncRef) -> Vec<String> {
    ops(module, f)
        .into_iter()
        .filter_map(|op| match op {
            Op::Call {
                callee: ValueRef::Func(c),
                ..
            } => Some(module.function(c).name.clone()),
            _ => None,
        })
        .collect()
}

/// `i32 add(i32 a, i32 b) { return a + b; }`
fn add_store() -> EntityStore {
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
    b.name(f, "add").name(x, "a").name(y, "b").name(entry, "entry").name(sum, "sum");
    b.finish()
}

#[test]
fn scenario_a_add() {
    let Translation { module, .. } = run(&add_store());
    let f = function(&module, "add");
    let body = ops(&module, f);
    assert_eq!(body.len(), 2);
    let Op::Binary { lhs, rhs, .. } = body[0] else {
        panic!("expected an add, got {:?}", body[0]);
    };
    assert_eq!((lhs, rhs), (ValueRef::Arg(0), ValueRef::Arg(1)));
    let add = module.function(f).live_insts().next().map(|(r, _)| r);
    assert!(matches!(body[1], Op::Ret(Some(ValueRef::Inst(r))) if Some(r) == add));

    insta::assert_snapshot!(module.display_function(f).to_string(), @r###"
    define internal spir_func i32 @add(i32 %a, i32 %b) nounwind {
    entry:
      %sum = add i32 %a, %b
      ret i32 %sum
    }
    "###);
}

/// A counting loop whose phi uses the value defined later in the loop body.
fn loop_store() -> EntityStore {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let bool_ty = b.type_bool();
    let zero = b.constant_u32(i32_ty, 0);
    let one = b.constant_u32(i32_ty, 1);
    let fn_ty = b.type_function(i32_ty, &[i32_ty]);

    let f = b.begin_function(fn_ty, 0);
    let n = b.param(i32_ty);
    let entry = b.block();
    let header = b.reserve_id();
    let exit = b.reserve_id();
    let next = b.reserve_id();
    b.inst(Opcode::Branch, None, vec![header.into()]);

    b.block_with_id(header);
    let i = b.inst(
        Opcode::Phi,
        Some(i32_ty),
        vec![zero.into(), entry.into(), next.into(), header.into()],
    );
    b.inst_with_id(next, Opcode::IAdd, Some(i32_ty), vec![i.into(), one.into()]);
    let more = b.inst(Opcode::SLessThan, Some(bool_ty), vec![next.into(), n.into()]);
    b.inst(
        Opcode::LoopMerge,
        None,
        vec![exit.into(), header.into(), loop_control::UNROLL.into()],
    );
    b.inst(
        Opcode::BranchConditional,
        None,
        vec![more.into(), header.into(), exit.into()],
    );

    b.block_with_id(exit);
    b.inst(Opcode::ReturnValue, None, vec![next.into()]);
    b.end_function();
    b.name(f, "count").name(next, "next");
    b.finish()
}

#[test]
fn scenario_b_loop_phi() {
    let Translation { module, .. } = run(&loop_store());
    let f = function(&module, "count");
    let func = module.function(f);
    let layout: Vec<_> = func.block_refs().collect();
    assert_eq!(layout.len(), 3);

    assert_eq!(module.live_globals().count(), 0, "placeholder globals must be erased");
    assert!(!ops(&module, f).iter().any(|op| matches!(op, Op::Load { .. })));

    let phis: Vec<_> = func
        .live_insts()
        .filter_map(|(_, inst)| match &inst.op {
            Op::Phi(incoming) => Some(incoming.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(phis.len(), 1);
    let incoming = &phis[0];
    assert_eq!(incoming.len(), 2);
    assert_eq!(incoming[0].1, layout[0]);
    assert_eq!(incoming[1].1, layout[1]);
    assert!(matches!(incoming[0].0, ValueRef::Const(_)));
    let ValueRef::Inst(carried) = incoming[1].0 else {
        panic!("loop-carried value should be an instruction");
    };
    assert!(matches!(func.inst(carried).op, Op::Binary { .. }));

    let latch = func.terminator(layout[1]).expect("loop block has a terminator");
    let (kind, md) = &func.inst(latch).metadata[0];
    assert_eq!(kind, "llvm.loop");
    let loop_id = module.md(*md).as_tuple().expect("loop id is a tuple");
    assert_eq!(loop_id[0], MdOperand::Node(*md));
    assert_eq!(loop_id.len(), 2);
}

fn dot_store() -> EntityStore {
    let mut b = StoreBuilder::new();
    let f32_ty = b.type_float(32);
    for (width, name) in [(4, "dot4"), (8, "dot8")] {
        let vec = b.type_vector(f32_ty, width);
        let fn_ty = b.type_function(f32_ty, &[vec, vec]);
        let f = b.begin_function(fn_ty, 0);
        let x = b.param(vec);
        let y = b.param(vec);
        b.block();
        let d = b.inst(Opcode::Dot, Some(f32_ty), vec![x.into(), y.into()]);
        b.inst(Opcode::ReturnValue, None, vec![d.into()]);
        b.end_function();
        b.name(f, name);
    }
    b.finish()
}

#[test]
fn scenario_c_vector_widths_get_distinct_builtins() {
    let Translation { module, .. } = run(&dot_store());
    let four = callee_names(&module, function(&module, "dot4"));
    let eight = callee_names(&module, function(&module, "dot8"));
    assert_eq!(four, vec!["__builtin_spirv_OpDot_v4f32_v4f32"]);
    assert_eq!(eight, vec!["__builtin_spirv_OpDot_v8f32_v8f32"]);

    let decl = module.function(function(&module, "__builtin_spirv_OpDot_v4f32_v4f32"));
    assert!(decl.is_declaration());
    assert_eq!(decl.linkage, Linkage::External);
}

/// `struct S make(i32 x)` returning `{x, x, x}` and a caller reading field 0.
fn struct_return_store() -> EntityStore {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let s = b.type_struct(&[i32_ty, i32_ty, i32_ty]);
    b.name(s, "struct.S");

    let make_ty = b.type_function(s, &[i32_ty]);
    let make = b.begin_function(make_ty, 0);
    let x = b.param(i32_ty);
    b.block();
    let v = b.inst(Opcode::CompositeConstruct, Some(s), vec![x.into(), x.into(), x.into()]);
    b.inst(Opcode::ReturnValue, None, vec![v.into()]);
    b.end_function();

    let user_ty = b.type_function(i32_ty, &[i32_ty]);
    let user = b.begin_function(user_ty, 0);
    let y = b.param(i32_ty);
    b.block();
    let r = b.inst(Opcode::FunctionCall, Some(s), vec![make.into(), y.into()]);
    let first = b.inst(Opcode::CompositeExtract, Some(i32_ty), vec![r.into(), 0u32.into()]);
    b.inst(Opcode::ReturnValue, None, vec![first.into()]);
    b.end_function();

    b.name(make, "make").name(user, "first_of_make");
    b.finish()
}

#[test]
fn scenario_d_struct_return_uses_sret_pointer() {
    let Translation { module, .. } = run(&struct_return_store());
    let make = function(&module, "make");
    let func = module.function(make);
    assert!(module.types.is_void(func.ret_ty));
    assert_eq!(func.params.len(), 2);
    assert!(module.types.is_ptr(func.params[0].ty));
    assert!(func.params[0].attrs.contains(&ParamAttr::StructRet));
    let body = ops(&module, make);
    assert!(body.iter().any(|op| matches!(op, Op::MemCpy { dst: ValueRef::Arg(0), .. })));
    assert!(body.iter().all(|op| !matches!(op, Op::Ret(Some(_)))));

    let user = function(&module, "first_of_make");
    let ufunc = module.function(user);
    let calls: Vec<_> = ufunc
        .live_insts()
        .filter_map(|(_, inst)| match &inst.op {
            Op::Call { args, .. } => Some(args.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 2);
    let ValueRef::Inst(tmp) = calls[0][0] else {
        panic!("sret argument should be a local temporary");
    };
    assert!(matches!(ufunc.inst(tmp).op, Op::Alloca { .. }));
    assert_eq!(calls[0][1], ValueRef::Arg(0));
    assert!(module.verify().is_ok());
}

#[test]
fn aggregate_arguments_pass_by_pointer() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let pair = b.type_struct(&[i32_ty, i32_ty]);
    let c1 = b.constant_u32(i32_ty, 1);
    let c2 = b.constant_u32(i32_ty, 2);
    let konst = b.constant_composite(pair, &[c1, c2]);

    let sum_ty = b.type_function(i32_ty, &[pair]);
    let sum = b.begin_function(sum_ty, 0);
    let p = b.param(pair);
    b.block();
    let a = b.inst(Opcode::CompositeExtract, Some(i32_ty), vec![p.into(), 0u32.into()]);
    let c = b.inst(Opcode::CompositeExtract, Some(i32_ty), vec![p.into(), 1u32.into()]);
    let s = b.inst(Opcode::IAdd, Some(i32_ty), vec![a.into(), c.into()]);
    b.inst(Opcode::ReturnValue, None, vec![s.into()]);
    b.end_function();

    let caller_ty = b.type_function(i32_ty, &[i32_ty]);
    let caller = b.begin_function(caller_ty, 0);
    let x = b.param(i32_ty);
    b.block();
    let built = b.inst(Opcode::CompositeConstruct, Some(pair), vec![x.into(), x.into()]);
    let r1 = b.inst(Opcode::FunctionCall, Some(i32_ty), vec![sum.into(), konst.into()]);
    let r2 = b.inst(Opcode::FunctionCall, Some(i32_ty), vec![sum.into(), built.into()]);
    let total = b.inst(Opcode::IAdd, Some(i32_ty), vec![r1.into(), r2.into()]);
    b.inst(Opcode::ReturnValue, None, vec![total.into()]);
    b.end_function();
    b.name(sum, "sum_pair").name(caller, "caller");
    let store = b.finish();

    let Translation { module, .. } = run(&store);
    let callee = module.function(function(&module, "sum_pair"));
    assert!(module.types.is_ptr(callee.params[0].ty));
    let body = ops(&module, function(&module, "sum_pair"));
    assert!(body.iter().any(|op| matches!(op, Op::MemCpy { src: ValueRef::Arg(0), .. })));

    let caller = function(&module, "caller");
    let args: Vec<ValueRef> = ops(&module, caller)
        .into_iter()
        .filter_map(|op| match op {
            Op::Call { args, .. } => args.first().copied(),
            _ => None,
        })
        .collect();
    assert_eq!(args.len(), 2);
    let ValueRef::Global(g) = args[0] else {
        panic!("constant aggregate should be passed through a global");
    };
    let global = module.global(g);
    assert!(global.constant);
    assert_eq!(global.linkage, Linkage::Internal);
    assert!(global.initializer.is_some());
    let ValueRef::Inst(slot) = args[1] else {
        panic!("computed aggregate should be spilled to a local");
    };
    assert!(matches!(module.function(caller).inst(slot).op, Op::Alloca { .. }));
    assert!(module.verify().is_ok());
}

#[test]
fn recursive_struct_translates() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let void = b.type_void();
    let node = b.reserve_id();
    let node_ptr = b.type_pointer(StorageClass::CrossWorkgroup, node);
    b.type_struct_with_id(node, &[i32_ty, node_ptr]);
    b.name(node, "struct.Node");
    let fn_ty = b.type_function(void, &[node_ptr]);
    let f = b.begin_function(fn_ty, 0);
    b.param(node_ptr);
    b.block();
    b.inst(Opcode::Return, None, vec![]);
    b.end_function();
    b.name(f, "visit");
    let store = b.finish();

    let Translation { module, .. } = run(&store);
    let func = module.function(function(&module, "visit"));
    let ptr = func.params[0].ty;
    let st = module.types.pointee(ptr).expect("parameter is a pointer");
    let fields = module.types.struct_fields(st);
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[1], ptr);
}

#[test]
fn kernel_metadata() {
    let mut b = StoreBuilder::new();
    let void = b.type_void();
    let f32_ty = b.type_float(32);
    let u32_ty = b.type_int(32);
    let gptr = b.type_pointer(StorageClass::CrossWorkgroup, f32_ty);
    let fn_ty = b.type_function(void, &[gptr, u32_ty]);
    let k = b.begin_function(fn_ty, 0);
    let out = b.param(gptr);
    let n = b.param(u32_ty);
    b.block();
    b.inst(Opcode::Return, None, vec![]);
    b.end_function();
    b.string("kernel_arg_type.scale.real*,uint,");
    b.entry_point(ExecutionModel::Kernel, k, "scale")
        .execution_mode(k, ExecutionMode::LocalSize, vec![8, 4, 1])
        .name(out, "out")
        .name(n, "n")
        .decorate(out, Decoration::FuncParamAttr, vec![FuncParamAttr::NoAlias.word().into()])
        .decorate(n, Decoration::FuncParamAttr, vec![FuncParamAttr::Zext.word().into()])
        .decorate(k, Decoration::UserSemantic, vec!["hot".into()]);
    let store = b.finish();

    let Translation { module, metadata } = run(&store);
    let f = module.function(function(&module, "scale"));
    assert_eq!(f.call_conv, CallConv::SpirKernel);
    assert_eq!(f.linkage, Linkage::External);
    assert_eq!(module.named_metadata("opencl.kernels").len(), 1);

    let info = metadata.function("scale").expect("kernel metadata");
    assert!(info.is_kernel);
    assert_eq!(info.annotations, vec!["hot"]);
    assert_eq!(info.reqd_work_group_size, Some([8, 4, 1]));
    assert_eq!(info.work_group_size_hint, None);
    assert_eq!(info.args.len(), 2);

    let out = &info.args[0];
    assert_eq!(out.addr_space, 1);
    assert_eq!(out.access_qual, "none");
    assert_eq!(out.type_name, "real*");
    assert_eq!(out.base_type, "float*");
    assert_eq!(out.type_qual, "restrict");
    assert_eq!(out.name.as_deref(), Some("out"));

    let n = &info.args[1];
    assert_eq!(n.addr_space, 0);
    assert_eq!(n.type_name, "uint");
    assert_eq!(n.base_type, "uint");

    assert_eq!(metadata.spir_version, Some((2, 0)));
    assert_eq!(metadata.ocl_version, Some((2, 0)));
    assert!(metadata.fp_contract);
    assert_eq!(module.named_metadata("opencl.enable.FP_CONTRACT").len(), 1);
    assert_eq!(metadata.kernels().count(), 1);
}

#[test]
fn builtin_variables_become_calls() {
    let mut b = StoreBuilder::new();
    let u64_ty = b.type_int(64);
    let v3 = b.type_vector(u64_ty, 3);
    let ptr = b.type_pointer(StorageClass::Input, v3);
    let gid = b.global_variable(ptr, StorageClass::Input, None);
    b.decorate(gid, Decoration::BuiltIn, vec![BuiltIn::GlobalInvocationId.word().into()]);
    let fn_ty = b.type_function(u64_ty, &[]);
    let f = b.begin_function(fn_ty, 0);
    b.block();
    let v = b.inst(Opcode::Load, Some(v3), vec![gid.into()]);
    let x = b.inst(Opcode::CompositeExtract, Some(u64_ty), vec![v.into(), 0u32.into()]);
    b.inst(Opcode::ReturnValue, None, vec![x.into()]);
    b.end_function();
    b.name(f, "global_x");
    let store = b.finish();

    let Translation { module, .. } = run(&store);
    assert_eq!(module.live_globals().count(), 0);
    let f = function(&module, "global_x");
    assert_eq!(callee_names(&module, f), vec!["__builtin_spirv_BuiltInGlobalInvocationId"]);
    assert!(!ops(&module, f).iter().any(|op| matches!(op, Op::Load { .. })));
    let accessor = module.function(function(&module, "__builtin_spirv_BuiltInGlobalInvocationId"));
    assert!(accessor.params.is_empty());
    assert!(accessor.is_declaration());
    assert_eq!(module.types.vector_len(accessor.ret_ty), Some(3));
    assert!(ops(&module, f).iter().any(|op| matches!(op, Op::ExtractElement { .. })));
}

#[test]
fn alias_scopes_attach_to_memory_accesses() {
    let mut b = StoreBuilder::new();
    let f32_ty = b.type_float(32);
    let gptr = b.type_pointer(StorageClass::CrossWorkgroup, f32_ty);

    let domain = b.reserve_id();
    b.define(domain, Opcode::AliasDomainDeclINTEL, None, vec![]);
    let scope = b.reserve_id();
    b.define(scope, Opcode::AliasScopeDeclINTEL, None, vec![domain.into()]);
    let list = b.reserve_id();
    b.define(list, Opcode::AliasScopeListDeclINTEL, None, vec![scope.into()]);

    let fn_ty = b.type_function(f32_ty, &[gptr]);
    let f = b.begin_function(fn_ty, 0);
    let p = b.param(gptr);
    b.block();
    let v = b.inst(Opcode::Load, Some(f32_ty), vec![p.into()]);
    b.inst(Opcode::ReturnValue, None, vec![v.into()]);
    b.end_function();
    b.name(f, "read")
        .decorate(v, Decoration::AliasScopeINTEL, vec![list.into()])
        .decorate(v, Decoration::NoAliasINTEL, vec![list.into()]);
    let store = b.finish();

    let Translation { module, .. } = run(&store);
    let func = module.function(function(&module, "read"));
    let (_, load) = func
        .live_insts()
        .find(|(_, inst)| matches!(inst.op, Op::Load { .. }))
        .expect("load survives");
    let kinds: Vec<&str> = load.metadata.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(kinds, vec!["alias.scope", "noalias"]);
    assert_eq!(load.metadata[0].1, load.metadata[1].1, "lists are translated once");

    let scopes = module.md(load.metadata[0].1).as_tuple().expect("scope list");
    assert_eq!(scopes.len(), 1);
    let MdOperand::Node(scope) = scopes[0] else {
        panic!("scope list holds nodes");
    };
    let scope_ops = module.md(scope).as_tuple().expect("scope node");
    assert_eq!(scope_ops[0], MdOperand::Node(scope));
    let MdOperand::Node(domain) = scope_ops[1] else {
        panic!("scope names its domain");
    };
    assert_eq!(module.md(domain).as_tuple(), Some(&[MdOperand::Node(domain)][..]));
}

#[test]
fn debug_info_locations_and_subprograms() {
    let mut b = StoreBuilder::new();
    let di = b.ext_inst_import(ExtInstSet::OpenClDebugInfo100);
    let path = b.string("/src/kernels/add.cl");
    let src = b.debug_record(di, DebugOp::Source, vec![path.into()]);
    let cu = b.debug_record(di, DebugOp::CompilationUnit, vec![65536u32.into(), 4u32.into(), src.into(), 3u32.into()]);
    let int_name = b.string("int");
    let int_di = b.debug_record(
        di,
        DebugOp::TypeBasic,
        vec![int_name.into(), 32u32.into(), Encoding::Signed.word().into()],
    );
    let sig = b.debug_record(di, DebugOp::TypeFunction, vec![0u32.into(), int_di.into(), int_di.into()]);

    let i32_ty = b.type_int(32);
    let fn_ty = b.type_function(i32_ty, &[i32_ty]);
    let f = b.reserve_id();
    let fn_name = b.string("twice");
    let sp = b.debug_record(
        di,
        DebugOp::Function,
        vec![
            fn_name.into(),
            sig.into(),
            src.into(),
            2u32.into(),
            1u32.into(),
            cu.into(),
            fn_name.into(),
            flags::IS_DEFINITION.into(),
            2u32.into(),
            f.into(),
        ],
    );
    let scope = b.debug_record(di, DebugOp::Scope, vec![sp.into()]);

    b.begin_function_with_id(f, fn_ty, 0);
    let x = b.param(i32_ty);
    b.block();
    b.debug_scope(Some(scope)).line(path, 3, 7);
    let sum = b.inst(Opcode::IAdd, Some(i32_ty), vec![x.into(), x.into()]);
    b.inst(Opcode::ReturnValue, None, vec![sum.into()]);
    b.end_function();
    b.name(f, "twice");
    let store = b.finish();

    let Translation { module, .. } = run(&store);
    assert_eq!(module.module_flag("Dwarf Version"), Some(4));
    assert_eq!(module.module_flag("Debug Info Version"), Some(3));
    let units = module.named_metadata("llvm.dbg.cu");
    assert_eq!(units.len(), 1);

    let func = module.function(function(&module, "twice"));
    let sp = func.subprogram.expect("subprogram attached");
    let Some(DiNode::Subprogram { name, unit, definition, file, .. }) = module.md(sp).as_di() else {
        panic!("expected a subprogram");
    };
    assert_eq!(name, "twice");
    assert!(*definition);
    assert_eq!(*unit, Some(units[0]));
    let file = file.expect("subprogram file");
    assert!(matches!(
        module.md(file),
        MdNode::Di(DiNode::File { filename, directory }) if filename == "add.cl" && directory == "/src/kernels"
    ));

    let (_, add) = func
        .live_insts()
        .find(|(_, inst)| matches!(inst.op, Op::Binary { .. }))
        .expect("add survives");
    let loc = add.debug_loc.expect("add has a location");
    let Some(DiNode::Location { line, column, scope, inlined_at }) = module.md(loc).as_di() else {
        panic!("expected a location");
    };
    assert_eq!((*line, *column), (3, 7));
    assert_eq!(*scope, sp);
    assert!(inlined_at.is_none());
}

#[test]
fn non_opencl_source_is_advised() {
    let mut b = StoreBuilder::new();
    b.source(SourceLanguage::Glsl, 450);
    let store = b.finish();

    let options = TranslatorOptions::default();
    let mut sink = CollectingSink::default();
    let Translation { metadata, .. } =
        translate_with(&store, &options, &options.capabilities, &mut sink).expect("translation succeeds");
    assert_eq!(sink.advisories.len(), 1);
    assert!(sink.advisories[0].message.contains("carries no OpenCL version"));
    assert_eq!(metadata.spir_version, None);
}

#[test]
fn module_is_dumped_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("add.ll");
    let options = TranslatorOptions {
        dump_path: Some(path.clone()),
        ..TranslatorOptions::default()
    };
    let translation = translate(&add_store(), &options).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, translation.module.to_string());
    assert!(text.contains("define internal spir_func i32 @add(i32 %a, i32 %b)"));
    assert!(text.contains("!opencl.ocl.version"));
}

#[test]
fn dump_to_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let options = TranslatorOptions {
        dump_path: Some(dir.path().join("missing").join("add.ll")),
        ..TranslatorOptions::default()
    };
    let err = translate(&add_store(), &options).unwrap_err();
    assert!(matches!(err, TranslateError::Io { .. }));
}

#[test]
fn missing_operand_is_fatal() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let fn_ty = b.type_function(i32_ty, &[i32_ty]);
    let f = b.begin_function(fn_ty, 0);
    let x = b.param(i32_ty);
    b.block();
    let ghost = b.reserve_id();
    let sum = b.inst(Opcode::IAdd, Some(i32_ty), vec![x.into(), ghost.into()]);
    b.inst(Opcode::ReturnValue, None, vec![sum.into()]);
    b.end_function();
    b.name(f, "broken");
    let store = b.finish();

    let err = translate(&store, &TranslatorOptions::default()).unwrap_err();
    assert!(matches!(err, TranslateError::MissingEntity(id) if id == ghost));
    assert_eq!(err.to_string(), format!("entity {} is missing from the store", ghost));
}

#[test]
fn unsupported_instruction_reports_not_implemented() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let rt = b.type_pointer(StorageClass::CrossWorkgroup, i32_ty);
    let fn_ty = b.type_function(i32_ty, &[rt]);
    let f = b.begin_function(fn_ty, 0);
    let p = b.param(rt);
    b.block();
    let len = b.inst(Opcode::ArrayLength, Some(i32_ty), vec![p.into(), 0u32.into()]);
    b.inst(Opcode::ReturnValue, None, vec![len.into()]);
    b.end_function();
    b.name(f, "length");
    let store = b.finish();

    let err = translate(&store, &TranslatorOptions::default()).unwrap_err();
    assert!(matches!(err, TranslateError::NotImplemented { .. }));
    assert!(err.to_string().ends_with("not implemented"));
}

#[test]
fn indirect_calls_pass_aggregates_by_pointer() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let pair = b.type_struct(&[i32_ty, i32_ty]);
    b.name(pair, "struct.pair");

    let swap_ty = b.type_function(pair, &[pair]);
    let swap_ptr = b.type_pointer(StorageClass::Function, swap_ty);
    let swap = b.begin_function(swap_ty, 0);
    let p = b.param(pair);
    b.block();
    let lo = b.inst(Opcode::CompositeExtract, Some(i32_ty), vec![p.into(), 0u32.into()]);
    let hi = b.inst(Opcode::CompositeExtract, Some(i32_ty), vec![p.into(), 1u32.into()]);
    let swapped = b.inst(Opcode::CompositeConstruct, Some(pair), vec![hi.into(), lo.into()]);
    b.inst(Opcode::ReturnValue, None, vec![swapped.into()]);
    b.end_function();

    let caller_ty = b.type_function(i32_ty, &[swap_ptr, i32_ty, i32_ty]);
    let caller = b.begin_function(caller_ty, 0);
    let fp = b.param(swap_ptr);
    let x = b.param(i32_ty);
    let y = b.param(i32_ty);
    b.block();
    let arg = b.inst(Opcode::CompositeConstruct, Some(pair), vec![x.into(), y.into()]);
    let r = b.inst(Opcode::FunctionPointerCallINTEL, Some(pair), vec![fp.into(), arg.into()]);
    let first = b.inst(Opcode::CompositeExtract, Some(i32_ty), vec![r.into(), 0u32.into()]);
    b.inst(Opcode::ReturnValue, None, vec![first.into()]);
    b.end_function();
    b.name(swap, "swap").name(caller, "call_swap");
    let store = b.finish();

    let Translation { module, .. } = run(&store);
    let swap = module.function(function(&module, "swap"));
    assert!(module.types.is_void(swap.ret_ty));
    assert_eq!(swap.params.len(), 2);

    let caller = function(&module, "call_swap");
    let func = module.function(caller);
    let calls: Vec<_> = func
        .live_insts()
        .filter_map(|(_, inst)| match &inst.op {
            Op::Call { callee, fn_ty, args, .. } => Some((*callee, *fn_ty, args.clone(), inst.ty)),
            _ => None,
        })
        .collect();
    assert_eq!(calls.len(), 1);
    let (callee, fn_ty, args, ty) = &calls[0];
    assert!(!matches!(callee, ValueRef::Func(_)), "call should stay indirect");
    let ValueRef::Inst(cast) = *callee else {
        panic!("callee should be cast to the legalized signature");
    };
    assert!(matches!(func.inst(cast).op, Op::Cast(_, ValueRef::Arg(0))));
    assert!(module.types.is_void(*ty));
    let (ret, params, _) = module.types.signature(*fn_ty).expect("call has a function type");
    assert!(module.types.is_void(ret));
    assert_eq!(params.len(), 2);
    assert!(params.iter().all(|&p| module.types.is_ptr(p)));
    assert_eq!(args.len(), 2);
    for arg in args {
        let ValueRef::Inst(slot) = *arg else {
            panic!("indirect call arguments should be local temporaries");
        };
        assert!(matches!(func.inst(slot).op, Op::Alloca { .. }));
    }
    assert!(module.verify().is_ok());
}

fn pipe_storage_store(capacity: u32) -> EntityStore {
    let mut b = StoreBuilder::new();
    let ps_ty = b.type_pipe_storage();
    let storage = b.constant_pipe_storage(ps_ty, 16, 4, capacity);
    let fn_ty = b.type_function(ps_ty, &[]);
    let f = b.begin_function(fn_ty, 0);
    b.block();
    b.inst(Opcode::ReturnValue, None, vec![storage.into()]);
    b.end_function();
    b.name(f, "pipe");
    b.finish()
}

#[test]
fn pipe_storage_header_counts_slots() {
    let Translation { module, .. } = run(&pipe_storage_store(4));
    let (_, buf) = module
        .live_globals()
        .find(|(_, g)| g.name.starts_with("pipebuf"))
        .expect("pipe buffer global");
    assert_eq!(buf.addr_space, 1);
    let fields = module.types.struct_fields(buf.value_ty);
    assert_eq!(fields.len(), 2);
    assert!(matches!(module.types.get(fields[1]), Type::Array { len, .. } if *len == 16 * 5 + 128 - 4));

    let init = module.constant(buf.initializer.expect("pipe buffer is initialized"));
    let ConstKind::Aggregate(parts) = &init.kind else {
        panic!("pipe buffer should be an aggregate, got {:?}", init.kind);
    };
    assert_eq!(module.constant(parts[0]).as_u64(32), Some(5));
    assert!(module.constant(parts[1]).is_null());
}

#[test]
fn pipe_storage_capacity_overflow_is_malformed() {
    let err = translate(&pipe_storage_store(u32::MAX), &TranslatorOptions::default()).unwrap_err();
    assert!(matches!(err, TranslateError::Malformed { .. }), "got {err}");
}

/// `i32 smod(i32 a, i32 b) { return a smod b; }`
fn smod_store() -> EntityStore {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let fn_ty = b.type_function(i32_ty, &[i32_ty, i32_ty]);
    let f = b.begin_function(fn_ty, 0);
    let x = b.param(i32_ty);
    let y = b.param(i32_ty);
    b.block();
    let m = b.inst(Opcode::SMod, Some(i32_ty), vec![x.into(), y.into()]);
    b.inst(Opcode::ReturnValue, None, vec![m.into()]);
    b.end_function();
    b.name(f, "smod");
    b.finish()
}

#[test]
fn signed_modulo_expands_over_srem() {
    let Translation { module, .. } = run(&smod_store());
    let f = function(&module, "smod");
    let body = ops(&module, f);
    assert!(callee_names(&module, f).is_empty());
    assert!(matches!(
        body[0],
        Op::Binary { op: BinaryOp::SRem, lhs: ValueRef::Arg(0), rhs: ValueRef::Arg(1), .. }
    ));
    let shifts = body
        .iter()
        .filter(|op| matches!(op, Op::Binary { op: BinaryOp::AShr, .. }))
        .count();
    assert_eq!(shifts, 2);
    let compares = body
        .iter()
        .filter(|op| matches!(op, Op::ICmp(ICmpOp::Ne, ..)))
        .count();
    assert_eq!(compares, 2);
    assert!(body.iter().any(|op| matches!(op, Op::Binary { op: BinaryOp::And, .. })));
    assert!(body.iter().any(|op| matches!(op, Op::Binary { op: BinaryOp::Add, .. })));
    let select = module
        .function(f)
        .live_insts()
        .find(|(_, inst)| matches!(inst.op, Op::Select { .. }))
        .map(|(r, _)| r)
        .expect("result is selected");
    assert!(matches!(body.last(), Some(Op::Ret(Some(ValueRef::Inst(r)))) if *r == select));
    assert!(module.verify().is_ok());
}

#[test]
fn signed_modulo_calls_builtin_when_supported() {
    let mut options = TranslatorOptions::default();
    options.capabilities.signed_modulo_builtin = true;
    let Translation { module, .. } = translate(&smod_store(), &options).expect("translation succeeds");
    let f = function(&module, "smod");
    assert_eq!(callee_names(&module, f), vec!["__builtin_spirv_OpSMod_i32_i32"]);
    assert!(!ops(&module, f)
        .iter()
        .any(|op| matches!(op, Op::Binary { op: BinaryOp::SRem, .. })));
}

#[test]
fn struct_constant_store_goes_through_temporary() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let pair = b.type_struct(&[i32_ty, i32_ty]);
    b.name(pair, "struct.pair");
    let c1 = b.constant_u32(i32_ty, 1);
    let c2 = b.constant_u32(i32_ty, 2);
    let konst = b.constant_composite(pair, &[c1, c2]);
    let void = b.type_void();
    let ptr_ty = b.type_pointer(StorageClass::CrossWorkgroup, pair);
    let fn_ty = b.type_function(void, &[ptr_ty]);
    let f = b.begin_function(fn_ty, 0);
    let p = b.param(ptr_ty);
    b.block();
    b.inst(Opcode::Store, None, vec![p.into(), konst.into()]);
    b.inst(Opcode::Return, None, vec![]);
    b.end_function();
    b.name(f, "init_pair");
    let store = b.finish();

    let Translation { module, .. } = run(&store);
    let f = function(&module, "init_pair");
    let func = module.function(f);
    let (tmp, _) = func
        .live_insts()
        .find(|(_, inst)| inst.name.as_deref().is_some_and(|n| n.starts_with("CS.tmpstore")))
        .expect("temporary for the constant");
    assert!(matches!(func.inst(tmp).op, Op::Alloca { .. }));

    let body = ops(&module, f);
    let leaf_stores = body
        .iter()
        .filter(|op| matches!(op, Op::Store { value: ValueRef::Const(_), .. }))
        .count();
    assert_eq!(leaf_stores, 2);
    let copies: Vec<_> = body
        .iter()
        .filter_map(|op| match op {
            Op::MemCpy { dst, src, size, .. } => Some((*dst, *src, *size)),
            _ => None,
        })
        .collect();
    assert_eq!(copies.len(), 1);
    let (dst, src, size) = copies[0];
    assert_eq!(dst, ValueRef::Arg(0));
    assert_eq!(src, ValueRef::Inst(tmp));
    let ValueRef::Const(size) = size else {
        panic!("copy size should be a constant");
    };
    assert_eq!(module.constant(size).as_i64(), Some(8));
    assert!(module.verify().is_ok());
}

#[test]
fn image_read_lowers_to_builtin_call() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let f32_ty = b.type_float(32);
    let int2 = b.type_vector(i32_ty, 2);
    let float4 = b.type_vector(f32_ty, 4);
    let desc = ImageDescriptor {
        dim: Dim::Dim2D,
        depth: 0,
        arrayed: false,
        multisampled: false,
        sampled: 0,
        format: 0,
    };
    let image = b.type_image(desc, AccessQualifier::ReadOnly);
    let fn_ty = b.type_function(float4, &[image, int2]);
    let f = b.begin_function(fn_ty, 0);
    let img = b.param(image);
    let coord = b.param(int2);
    b.block();
    let texel = b.inst(Opcode::ImageRead, Some(float4), vec![img.into(), coord.into()]);
    b.inst(Opcode::ReturnValue, None, vec![texel.into()]);
    b.end_function();
    b.name(f, "read");
    let store = b.finish();

    let Translation { module, .. } = run(&store);
    let f = function(&module, "read");
    let func = module.function(f);
    assert_eq!(
        callee_names(&module, f),
        vec!["__builtin_spirv_OpImageRead_v4f32_i64_i64_v4i32_p0S10ImageDummy"]
    );
    let args = func
        .live_insts()
        .find_map(|(_, inst)| match &inst.op {
            Op::Call { args, .. } => Some(args.clone()),
            _ => None,
        })
        .expect("image read call");
    assert_eq!(args.len(), 4);

    let ValueRef::Inst(handle) = args[0] else {
        panic!("image handle should be converted to an integer");
    };
    assert!(matches!(func.inst(handle).op, Op::Cast(CastOp::PtrToInt, ValueRef::Arg(0))));
    let ValueRef::Const(word) = args[1] else {
        panic!("image type word should be a constant");
    };
    assert_eq!(module.constant(word).as_u64(64), Some(1 << 59));

    let ValueRef::Inst(wide) = args[2] else {
        panic!("coordinate should be widened");
    };
    let Type::Vector { elem, len: 4 } = *module.types.get(func.inst(wide).ty) else {
        panic!("coordinate should have four lanes");
    };
    assert_eq!(*module.types.get(elem), Type::Int(32));

    let ValueRef::Const(dummy) = args[3] else {
        panic!("trailing argument should be a null pointer");
    };
    let dummy = module.constant(dummy);
    assert!(dummy.is_null());
    let pointee = module.types.pointee(dummy.ty).expect("dummy is a pointer");
    assert!(matches!(module.types.get(pointee), Type::Struct(s) if s.name.as_deref() == Some("struct.ImageDummy")));
}

#[test]
fn cyclic_debug_scopes_are_rejected() {
    let mut b = StoreBuilder::new();
    let di = b.ext_inst_import(ExtInstSet::OpenClDebugInfo100);
    let path = b.string("/src/loop.cl");
    let src = b.debug_record(di, DebugOp::Source, vec![path.into()]);
    b.debug_record(di, DebugOp::CompilationUnit, vec![65536u32.into(), 4u32.into(), src.into(), 3u32.into()]);

    let outer = b.reserve_id();
    let inner = b.debug_record(
        di,
        DebugOp::LexicalBlock,
        vec![src.into(), 4u32.into(), 1u32.into(), outer.into()],
    );
    let void = b.type_void();
    b.define(
        outer,
        Opcode::ExtInst,
        Some(void),
        vec![
            di.into(),
            DebugOp::LexicalBlock.word().into(),
            src.into(),
            2u32.into(),
            1u32.into(),
            inner.into(),
        ],
    );
    let scope = b.debug_record(di, DebugOp::Scope, vec![inner.into()]);

    let i32_ty = b.type_int(32);
    let fn_ty = b.type_function(i32_ty, &[i32_ty]);
    let f = b.begin_function(fn_ty, 0);
    let x = b.param(i32_ty);
    b.block();
    b.debug_scope(Some(scope)).line(path, 4, 3);
    let sum = b.inst(Opcode::IAdd, Some(i32_ty), vec![x.into(), x.into()]);
    b.inst(Opcode::ReturnValue, None, vec![sum.into()]);
    b.end_function();
    b.name(f, "cyclic");
    let store = b.finish();

    let err = translate(&store, &TranslatorOptions::default()).unwrap_err();
    assert!(
        matches!(err, TranslateError::DebugScopeCycle(id) if id == inner || id == outer),
        "got {err}"
    );
}

#[test]
fn phi_of_foreign_value_is_unresolved() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let fn_ty = b.type_function(i32_ty, &[i32_ty]);

    let g = b.begin_function(fn_ty, 0);
    let x = b.param(i32_ty);
    b.block();
    let foreign = b.inst(Opcode::IAdd, Some(i32_ty), vec![x.into(), x.into()]);
    b.inst(Opcode::ReturnValue, None, vec![foreign.into()]);
    b.end_function();

    let f = b.begin_function(fn_ty, 0);
    b.param(i32_ty);
    let entry = b.block();
    let next = b.reserve_id();
    b.inst(Opcode::Branch, None, vec![next.into()]);
    b.block_with_id(next);
    let v = b.inst(Opcode::Phi, Some(i32_ty), vec![foreign.into(), entry.into()]);
    b.inst(Opcode::ReturnValue, None, vec![v.into()]);
    b.end_function();
    b.name(g, "owner").name(f, "borrower");
    let store = b.finish();

    let err = translate(&store, &TranslatorOptions::default()).unwrap_err();
    match err {
        TranslateError::UnresolvedPlaceholder { id, function } => {
            assert_eq!(id, foreign);
            assert_eq!(function, "borrower");
        }
        other => panic!("expected an unresolved placeholder, got {other}"),
    }
}

#[test]
fn conversions_cast_or_call_builtins() {
    let mut b = StoreBuilder::new();
    let i32_ty = b.type_int(32);
    let f32_ty = b.type_float(32);
    let fn_ty = b.type_function(i32_ty, &[i32_ty]);
    let f = b.begin_function(fn_ty, 0);
    let x = b.param(i32_ty);
    b.block();
    let wide = b.inst(Opcode::ConvertSToF, Some(f32_ty), vec![x.into()]);
    let back = b.inst(Opcode::ConvertFToS, Some(i32_ty), vec![wide.into()]);
    b.inst(Opcode::ReturnValue, None, vec![back.into()]);
    b.end_function();
    b.name(f, "round_trip");
    b.decorate(back, Decoration::SaturatedConversion, vec![]);
    let store = b.finish();

    let Translation { module, .. } = run(&store);
    let f = function(&module, "round_trip");
    let body = ops(&module, f);
    assert!(matches!(body[0], Op::Cast(CastOp::SiToFp, ValueRef::Arg(0))));
    assert_eq!(callee_names(&module, f), vec!["__builtin_spirv_OpConvertFToS_Sat_i32_f32"]);
    assert!(module.verify().is_ok());
}
