//! Unit tests for the translator's helpers and caches.

use proptest::prelude::*;

use kiln_ir::types::{FloatType, TypeTable};
use kiln_ir::value::ValueRef;
use kiln_spirv::{Id, StoreBuilder};

use crate::config::{Capabilities, TranslatorOptions};
use crate::debuginfo::split_path;
use crate::diag::CollectingSink;
use crate::error::TranslateError;
use crate::features::{CapabilityQuery, TargetFeature};
use crate::kernel_md::{decode_version, split_type_list};
use crate::mangle::{builtin_variable, mangle, mangle_builtin, mangle_ext_inst, type_code};
use crate::module_md::ModuleMetadata;
use crate::translator::{FunctionState, Translator};

#[test]
fn split_path_uses_last_separator() {
    assert_eq!(
        split_path("/src/kernels/add.cl"),
        ("add.cl".to_string(), "/src/kernels".to_string())
    );
    assert_eq!(
        split_path("C:\\work\\k.cl"),
        ("k.cl".to_string(), "C:\\work".to_string())
    );
    assert_eq!(split_path("k.cl"), ("k.cl".to_string(), ".".to_string()));
}

#[test]
fn type_list_splits_on_top_level_commas() {
    assert_eq!(split_type_list("int,float*,image2d_t"), vec!["int", "float*", "image2d_t"]);
    assert_eq!(split_type_list("pair<int,int>,char"), vec!["pair<int,int>", "char"]);
    assert_eq!(split_type_list("int,"), vec!["int"]);
    assert!(split_type_list("").is_empty());
}

#[test]
fn versions_decode_major_and_minor() {
    assert_eq!(decode_version(200_000), (2, 0));
    assert_eq!(decode_version(102_000), (1, 2));
    assert_eq!(decode_version(120_000), (1, 20));
}

#[test]
fn type_codes() {
    let mut types = TypeTable::new();
    let i32_ty = types.int(32);
    let f16 = types.float(FloatType::F16);
    let v4 = types.vector(f16, 4);
    let ptr = types.ptr(i32_ty, 1);
    let image = types.named_struct("opencl.image2d_ro_t");
    let anon = types.literal_struct(vec![i32_ty, i32_ty], false);

    assert_eq!(type_code(&types, v4), "v4f16");
    assert_eq!(type_code(&types, ptr), "p1i32");
    assert_eq!(type_code(&types, image), "o12image2d_ro_t");
    assert_eq!(type_code(&types, anon), "s2_i32_i32_e");
}

#[test]
fn struct_codes_keep_names_apart() {
    let mut types = TypeTable::new();
    let event = types.named_struct("opencl.event_t");
    let user_event = types.named_struct("struct.event_t");
    let bare_event = types.named_struct("event_t");
    let dotted = types.named_struct("struct.a.b");
    let underscored = types.named_struct("struct.a_b");
    let codes: Vec<String> = [event, user_event, bare_event, dotted, underscored]
        .into_iter()
        .map(|ty| {
            let ptr = types.ptr(ty, 0);
            mangle("f", &types, &[ptr])
        })
        .collect();
    assert_eq!(codes[0], "f_p0o7event_t");
    assert_eq!(codes[1], "f_p0S7event_t");
    assert_eq!(codes[3], "f_p0S6a$2e$b");
    assert_eq!(codes[4], "f_p0S3a_b");
    for (i, a) in codes.iter().enumerate() {
        for b in &codes[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn builtin_names() {
    let mut types = TypeTable::new();
    let f32_ty = types.float(FloatType::F32);
    let v4 = types.vector(f32_ty, 4);
    assert_eq!(
        mangle_builtin(kiln_spirv::Opcode::Dot, "", &types, &[v4, v4]),
        "__builtin_spirv_OpDot_v4f32_v4f32"
    );
    assert_eq!(
        mangle_builtin(kiln_spirv::Opcode::ConvertFToS, "_rte", &types, &[f32_ty]),
        "__builtin_spirv_OpConvertFToS_rte_f32"
    );
    assert_eq!(mangle_ext_inst("fmax", &types, &[f32_ty, f32_ty]), "__builtin_spirv_OpenCL_fmax_f32_f32");
    assert_eq!(builtin_variable("GlobalInvocationId"), "__builtin_spirv_BuiltInGlobalInvocationId");
}

fn element_width() -> impl Strategy<Value = u32> {
    prop::sample::select(vec![8u32, 16, 32, 64])
}

proptest! {
    #[test]
    fn mangling_is_deterministic(len in 2u32..=16, bits in element_width()) {
        let mut types = TypeTable::new();
        let elem = types.int(bits);
        let vec = types.vector(elem, len);
        let first = mangle("base", &types, &[vec, elem]);
        let second = mangle("base", &types, &[vec, elem]);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn vector_widths_mangle_apart(a in 2u32..=16, b in 2u32..=16, bits in element_width()) {
        prop_assume!(a != b);
        let mut types = TypeTable::new();
        let elem = types.int(bits);
        let va = types.vector(elem, a);
        let vb = types.vector(elem, b);
        prop_assert_ne!(mangle("f", &types, &[va, va]), mangle("f", &types, &[vb, vb]));
    }

    #[test]
    fn element_types_mangle_apart(x in element_width(), y in element_width(), len in 2u32..=16) {
        prop_assume!(x != y);
        let mut types = TypeTable::new();
        let ex = types.int(x);
        let ey = types.int(y);
        let vx = types.vector(ex, len);
        let vy = types.vector(ey, len);
        prop_assert_ne!(mangle("f", &types, &[vx]), mangle("f", &types, &[vy]));
    }

    #[test]
    fn struct_names_mangle_apart(
        a in "(opencl\\.|struct\\.)?[a-z_.]{1,6}",
        b in "(opencl\\.|struct\\.)?[a-z_.]{1,6}",
    ) {
        prop_assume!(a != b);
        let mut types = TypeTable::new();
        let sa = types.named_struct(&a);
        let sb = types.named_struct(&b);
        prop_assert_ne!(mangle("f", &types, &[sa]), mangle("f", &types, &[sb]));
    }

    #[test]
    fn bool_constants_round_trip(value: bool) {
        let store = StoreBuilder::new().finish();
        let options = TranslatorOptions::default();
        let caps = Capabilities::default();
        let mut sink = CollectingSink::default();
        let mut t = Translator::new(&store, &options, &caps, &mut sink);

        let c = ValueRef::Const(t.module.const_bool(value));
        let wide = t.promote_bool(c).unwrap();
        let i8_ty = t.module.types.int(8);
        prop_assert_eq!(t.type_of(wide).unwrap(), i8_ty);
        let narrow = t.truncate_bool(wide).unwrap();
        prop_assert_eq!(narrow, c);
    }
}

#[test]
fn bool_instructions_round_trip() {
    let store = StoreBuilder::new().finish();
    let options = TranslatorOptions::default();
    let caps = Capabilities::default();
    let mut sink = CollectingSink::default();
    let mut t = Translator::new(&store, &options, &caps, &mut sink);

    let i1 = t.module.types.int(1);
    let i8_ty = t.module.types.int(8);
    let fn_ty = t.module.types.function(i1, vec![i1], false);
    let f = t.module.add_function("f", fn_ty);
    let entry = t.module.function_mut(f).add_block(None);
    let mut state = FunctionState::new(Id(1), f);
    state.block = Some(entry);
    t.fs = Some(state);

    let arg = ValueRef::Arg(0);
    let wide = t.promote_bool(arg).unwrap();
    assert_ne!(wide, arg);
    assert_eq!(t.type_of(wide).unwrap(), i8_ty);
    assert_eq!(t.promote_bool(arg).unwrap(), wide, "promotion is cached");
    assert_eq!(t.truncate_bool(wide).unwrap(), arg);
    assert_eq!(t.module.function(f).live_insts().count(), 1);
}

#[test]
fn values_are_mapped_once() {
    let store = StoreBuilder::new().finish();
    let options = TranslatorOptions::default();
    let caps = Capabilities::default();
    let mut sink = CollectingSink::default();
    let mut t = Translator::new(&store, &options, &caps, &mut sink);

    let i32_ty = t.module.types.int(32);
    let fn_ty = t.module.types.function(i32_ty, vec![i32_ty], false);
    let f = t.module.add_function("f", fn_ty);
    let entry = t.module.function_mut(f).add_block(None);
    let mut state = FunctionState::new(Id(1), f);
    state.block = Some(entry);
    t.fs = Some(state);

    assert_eq!(t.map_value(Id(7), ValueRef::Arg(0)).unwrap(), ValueRef::Arg(0));
    let zero = ValueRef::Const(t.module.const_i32(0));
    let err = t.map_value(Id(7), zero).unwrap_err();
    assert!(matches!(err, TranslateError::TranslatedTwice(Id(7))));
    assert_eq!(err.to_string(), "entity %7 translated twice");
}

#[test]
fn options_default_from_empty_json() {
    let options = TranslatorOptions::from_json("{}").unwrap();
    assert_eq!(options, TranslatorOptions::default());
    assert!(options.verify);
    assert!(options.dump_path.is_none());
}

#[test]
fn options_read_spec_constants_and_capabilities() {
    let options = TranslatorOptions::from_json(
        r#"{"spec_constants": {"3": 42}, "capabilities": {"native_math": false}}"#,
    )
    .unwrap();
    assert_eq!(options.spec_constant(3), Some(42));
    assert_eq!(options.spec_constant(4), None);
    assert!(!options.capabilities.supports(TargetFeature::NativeMath));
    assert!(options.capabilities.supports(TargetFeature::LifetimeIntrinsics));
}

#[test]
fn options_reject_unknown_fields() {
    let err = TranslatorOptions::from_json(r#"{"optimize": true}"#).unwrap_err();
    assert!(err.to_string().starts_with("invalid translator options"));
}

#[test]
fn options_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiln.json");
    std::fs::write(&path, r#"{"module_name": "kernels", "verify": false}"#).unwrap();
    let options = TranslatorOptions::from_file(&path).unwrap();
    assert_eq!(options.module_name, "kernels");
    assert!(!options.verify);

    let missing = TranslatorOptions::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(missing.to_string().contains("absent.json"));
}

#[test]
fn closures_answer_capability_queries() {
    let only_memset = |f: TargetFeature| f == TargetFeature::MemSetIntrinsic;
    assert!(only_memset.supports(TargetFeature::MemSetIntrinsic));
    assert!(!only_memset.supports(TargetFeature::NativeMath));
}

#[test]
fn metadata_record_serializes() {
    let mut md = ModuleMetadata::default();
    md.function_mut("k").is_kernel = true;
    md.function_mut("helper").annotations.push("hot".to_string());
    assert_eq!(md.kernels().map(|(n, _)| n).collect::<Vec<_>>(), vec!["k"]);

    let json = md.to_json().unwrap();
    let back: ModuleMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(back, md);
}
