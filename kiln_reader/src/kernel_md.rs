//! Kernel argument metadata and module-level OpenCL metadata.

use tracing::debug;

use kiln_ir::metadata::MdOperand;
use kiln_ir::types::FloatType;
use kiln_ir::value::{FuncRef, MdRef, TypeRef};
use kiln_spirv::{
    AccessQualifier, Decoration, ExecutionMode, FuncParamAttr, FunctionDef, Id, Opcode, SourceLanguage,
};

use crate::error::{Result, TranslateError};
use crate::module_md::{ArgInfo, FunctionMetadata};
use crate::translator::Translator;
use crate::types::address_space;

/// Prefix of the `OpString` that spells out the kernel argument types.
const ARG_TYPE_PREFIX: &str = "kernel_arg_type";

/// Extensions reported as optional core features instead.
const OPTIONAL_CORE_FEATURES: [&str; 2] = ["cl_images", "cl_doubles"];

/// Split on commas that are not nested in `<>`. A trailing comma does not
/// produce an empty entry.
pub(crate) fn split_type_list(list: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            ',' if depth == 0 => {
                out.push(list[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < list.len() {
        out.push(list[start..].to_string());
    }
    out
}

/// `major*100000 + minor*1000 + rev` to `(major, minor)`.
pub(crate) fn decode_version(version: u32) -> (u32, u32) {
    (version / 100_000, (version % 100_000) / 1000)
}

impl<'a> Translator<'a> {
    /// Fill the module-metadata record and emit `opencl.kernels`.
    pub(crate) fn emit_kernel_metadata(&mut self) -> Result<()> {
        let store = self.store;
        for def in &store.functions {
            let f = self.func_ref(def.id)?;
            let name = self.module.function(f).name.clone();
            let annotations: Vec<String> = store
                .decorations(def.id)
                .iter()
                .filter(|d| d.decoration == Decoration::UserSemantic)
                .filter_map(|d| d.args.first().and_then(|a| a.as_str()).map(str::to_string))
                .collect();
            if !annotations.is_empty() {
                self.md.function_mut(&name).annotations = annotations;
            }
            if !store.is_kernel(def.id) || def.is_declaration() {
                continue;
            }
            let info = self.kernel_info(def, f)?;
            let node = self.kernel_node(f, &info)?;
            self.module.add_named_metadata("opencl.kernels", node);
            debug!(kernel = %name, args = info.args.len(), "emitted kernel metadata");
            let annotations = std::mem::take(&mut self.md.function_mut(&name).annotations);
            *self.md.function_mut(&name) = FunctionMetadata { annotations, ..info };
        }
        Ok(())
    }

    fn kernel_info(&mut self, def: &'a FunctionDef, f: FuncRef) -> Result<FunctionMetadata> {
        let store = self.store;
        let kernel_name = self.module.function(f).name.clone();
        let listed = store
            .find_string(&format!("{ARG_TYPE_PREFIX}.{kernel_name}."))
            .map(|s| split_type_list(&s[ARG_TYPE_PREFIX.len() + kernel_name.len() + 2..]));

        let mut args = Vec::with_capacity(def.params.len());
        for (i, &param) in def.params.iter().enumerate() {
            let mut arg = self.arg_info(f, i, param)?;
            if let Some(name) = listed.as_ref().and_then(|l| l.get(i)) {
                arg.type_name = name.clone();
            }
            args.push(arg);
        }

        let mode = |m: ExecutionMode| store.execution_mode(def.id, m);
        let triple = |m: ExecutionMode| {
            mode(m).map(|w| {
                [
                    w.first().copied().unwrap_or(1),
                    w.get(1).copied().unwrap_or(1),
                    w.get(2).copied().unwrap_or(1),
                ]
            })
        };
        let vec_type_hint = match mode(ExecutionMode::VecTypeHint).and_then(|w| w.first().copied()) {
            Some(code) => Some(self.vec_type_hint_name(def.id, code)?),
            None => None,
        };
        let offsets: Vec<Option<u32>> = def
            .params
            .iter()
            .map(|&p| store.decoration_word(p, Decoration::MaxByteOffset))
            .collect();
        let max_byte_offsets = if offsets.iter().any(Option::is_some) {
            offsets.into_iter().map(|o| o.unwrap_or(0)).collect()
        } else {
            Vec::new()
        };

        Ok(FunctionMetadata {
            is_kernel: true,
            annotations: Vec::new(),
            is_initializer: mode(ExecutionMode::Initializer).is_some(),
            is_finalizer: mode(ExecutionMode::Finalizer).is_some(),
            compiled_subgroups: mode(ExecutionMode::SubgroupsPerWorkgroup).and_then(|w| w.first().copied()),
            max_byte_offsets,
            args,
            reqd_work_group_size: triple(ExecutionMode::LocalSize),
            work_group_size_hint: triple(ExecutionMode::LocalSizeHint),
            vec_type_hint,
            required_sub_group_size: mode(ExecutionMode::SubgroupSize).and_then(|w| w.first().copied()),
        })
    }

    fn arg_info(&mut self, f: FuncRef, index: usize, param: Id) -> Result<ArgInfo> {
        let store = self.store;
        let e = self.entity(param)?;
        let ty_id = self.result_type(e)?;
        let ty = self.entity(ty_id)?;
        let attrs: Vec<FuncParamAttr> = store
            .decoration_words(param, Decoration::FuncParamAttr)
            .into_iter()
            .filter_map(FuncParamAttr::from_word)
            .collect();

        let (addr_space, access_qual) = match ty.opcode {
            Opcode::TypePointer => (address_space(self.storage_class(ty, 0)?), "none".to_string()),
            Opcode::TypeImage => (1, self.image_descriptor(ty_id)?.1.ocl_name().to_string()),
            Opcode::TypePipe => {
                let access = ty
                    .word_at(0)
                    .and_then(AccessQualifier::from_word)
                    .map_or("none", |a| a.ocl_name());
                (1, access.to_string())
            }
            _ => (0, "none".to_string()),
        };

        let mut quals = Vec::new();
        if store.has_decoration(param, Decoration::Volatile) {
            quals.push("volatile");
        }
        for attr in &attrs {
            match attr {
                FuncParamAttr::NoAlias => quals.push("restrict"),
                FuncParamAttr::NoWrite => quals.push("const"),
                _ => {}
            }
        }
        if ty.opcode == Opcode::TypePipe {
            quals.push("pipe");
        }

        let unsigned = attrs.contains(&FuncParamAttr::Zext);
        let by_value = attrs.contains(&FuncParamAttr::ByVal) && ty.opcode == Opcode::TypePointer;
        let named_ty = if by_value { self.operand_id(ty, 1)? } else { ty_id };
        let type_name = self.ocl_type_name(named_ty, unsigned)?;
        let name = self.module.function(f).params.get(index).and_then(|p| p.name.clone());

        Ok(ArgInfo {
            addr_space,
            access_qual,
            base_type: type_name.clone(),
            type_name,
            type_qual: quals.join(" "),
            name: name.filter(|n| !n.is_empty()),
        })
    }

    /// OpenCL spelling of a source type.
    pub(crate) fn ocl_type_name(&mut self, id: Id, unsigned: bool) -> Result<String> {
        let e = self.entity(id)?;
        Ok(match e.opcode {
            Opcode::TypeVoid => "void".to_string(),
            Opcode::TypeBool => "bool".to_string(),
            Opcode::TypeInt => {
                let base = match self.operand_word(e, 0)? {
                    8 => "char",
                    16 => "short",
                    32 => "int",
                    64 => "long",
                    w => return Err(TranslateError::unsupported_type(id, format!("{w}-bit integer argument"))),
                };
                if unsigned {
                    format!("u{base}")
                } else {
                    base.to_string()
                }
            }
            Opcode::TypeFloat => match self.operand_word(e, 0)? {
                16 => "half".to_string(),
                32 => "float".to_string(),
                64 => "double".to_string(),
                w => return Err(TranslateError::unsupported_type(id, format!("{w}-bit float argument"))),
            },
            Opcode::TypePointer => format!("{}*", self.ocl_type_name(self.operand_id(e, 1)?, unsigned)?),
            Opcode::TypeVector => format!(
                "{}{}",
                self.ocl_type_name(self.operand_id(e, 0)?, unsigned)?,
                self.operand_word(e, 1)?
            ),
            Opcode::TypeArray => {
                let len = self.literal_constant(self.operand_id(e, 1)?)?;
                format!("{}[{len}]", self.ocl_type_name(self.operand_id(e, 0)?, unsigned)?)
            }
            Opcode::TypeStruct => {
                let st = self.translate_type(id)?;
                let name = self.module.types.struct_name(st).unwrap_or("anon");
                format!("struct {}", name.strip_prefix("struct.").unwrap_or(name))
            }
            Opcode::TypeImage | Opcode::TypeSampledImage => self.image_descriptor(id)?.0.ocl_type_name(),
            Opcode::TypeSampler => "sampler_t".to_string(),
            Opcode::TypePipe => "pipe".to_string(),
            _ => {
                let ty = self.translate_type(id)?;
                let pointee = self.module.types.pointee(ty).unwrap_or(ty);
                let name = self.module.types.struct_name(pointee).unwrap_or("");
                name.strip_prefix("opencl.").unwrap_or(name).to_string()
            }
        })
    }

    fn vec_type_hint_type(&mut self, func: Id, code: u32) -> Result<TypeRef> {
        let width = code >> 16;
        let types = &mut self.module.types;
        let scalar = match code & 0xffff {
            s @ 0..=3 => types.int(8 << s),
            4 => types.float(FloatType::F16),
            5 => types.float(FloatType::F32),
            6 => types.float(FloatType::F64),
            other => {
                return Err(TranslateError::malformed(
                    func,
                    format!("invalid vec_type_hint code {other}"),
                ))
            }
        };
        Ok(if width == 0 { scalar } else { types.vector(scalar, width) })
    }

    fn vec_type_hint_name(&self, func: Id, code: u32) -> Result<String> {
        let width = code >> 16;
        let scalar = match code & 0xffff {
            0 => "char",
            1 => "short",
            2 => "int",
            3 => "long",
            4 => "half",
            5 => "float",
            6 => "double",
            other => {
                return Err(TranslateError::malformed(
                    func,
                    format!("invalid vec_type_hint code {other}"),
                ))
            }
        };
        Ok(if width == 0 {
            scalar.to_string()
        } else {
            format!("{scalar}{width}")
        })
    }

    fn kernel_node(&mut self, f: FuncRef, info: &FunctionMetadata) -> Result<MdRef> {
        let args = &info.args;
        let mut ops = vec![MdOperand::Func(f)];

        let mut row = vec![MdOperand::string("kernel_arg_addr_space")];
        for a in args {
            row.push(MdOperand::Const(self.module.const_i32(i64::from(a.addr_space))));
        }
        ops.push(MdOperand::Node(self.module.md_tuple(row)));

        let string_rows: [(&str, fn(&ArgInfo) -> String); 4] = [
            ("kernel_arg_access_qual", |a| a.access_qual.clone()),
            ("kernel_arg_type", |a| a.type_name.clone()),
            ("kernel_arg_type_qual", |a| a.type_qual.clone()),
            ("kernel_arg_base_type", |a| a.base_type.clone()),
        ];
        for (key, field) in string_rows {
            let mut row = vec![MdOperand::string(key)];
            row.extend(args.iter().map(|a| MdOperand::String(field(a))));
            ops.push(MdOperand::Node(self.module.md_tuple(row)));
        }
        if args.iter().all(|a| a.name.is_some()) {
            let mut row = vec![MdOperand::string("kernel_arg_name")];
            row.extend(args.iter().filter_map(|a| a.name.clone()).map(MdOperand::String));
            ops.push(MdOperand::Node(self.module.md_tuple(row)));
        }

        for (key, size) in [
            ("reqd_work_group_size", info.reqd_work_group_size),
            ("work_group_size_hint", info.work_group_size_hint),
        ] {
            if let Some(size) = size {
                let mut row = vec![MdOperand::string(key)];
                for dim in size {
                    row.push(MdOperand::Const(self.module.const_i32(i64::from(dim))));
                }
                ops.push(MdOperand::Node(self.module.md_tuple(row)));
            }
        }

        let func_id = self.function_id(f);
        let hint_code = func_id.and_then(|id| {
            self.store
                .execution_mode(id, ExecutionMode::VecTypeHint)
                .and_then(|w| w.first().copied())
                .map(|code| (id, code))
        });
        if let Some((id, code)) = hint_code {
            let ty = self.vec_type_hint_type(id, code)?;
            let undef = self.module.const_undef(ty);
            let zero = self.module.const_i32(0);
            let row = vec![
                MdOperand::string("vec_type_hint"),
                MdOperand::Const(undef),
                MdOperand::Const(zero),
            ];
            ops.push(MdOperand::Node(self.module.md_tuple(row)));
        }

        if let Some(size) = info.required_sub_group_size {
            let row = vec![
                MdOperand::string("intel_reqd_sub_group_size"),
                MdOperand::Const(self.module.const_i32(i64::from(size))),
            ];
            ops.push(MdOperand::Node(self.module.md_tuple(row)));
        }
        Ok(self.module.md_tuple(ops))
    }

    fn function_id(&self, f: FuncRef) -> Option<Id> {
        self.funcs.iter().find(|(_, &r)| r == f).map(|(&id, _)| id)
    }

    /// `opencl.enable.FP_CONTRACT` unless a kernel turns contraction off.
    pub(crate) fn emit_fp_contract(&mut self) {
        let store = self.store;
        let contraction_off = store.functions.iter().any(|def| {
            store.is_kernel(def.id) && store.execution_mode(def.id, ExecutionMode::ContractionOff).is_some()
        });
        self.md.fp_contract = !contraction_off;
        if !contraction_off {
            let node = self.module.md_tuple(Vec::new());
            self.module.add_named_metadata("opencl.enable.FP_CONTRACT", node);
        }
    }

    /// `opencl.spir.version` and `opencl.ocl.version`.
    pub(crate) fn emit_source_language(&mut self) {
        if !matches!(
            self.store.source_language,
            SourceLanguage::OpenClC | SourceLanguage::OpenClCpp
        ) {
            self.advise(
                None,
                format!(
                    "source language {} carries no OpenCL version",
                    self.store.source_language.name()
                ),
            );
            return;
        }
        let (major, minor) = decode_version(self.store.source_version);
        for key in ["opencl.spir.version", "opencl.ocl.version"] {
            let ops = vec![
                MdOperand::Const(self.module.const_i32(i64::from(major))),
                MdOperand::Const(self.module.const_i32(i64::from(minor))),
            ];
            let node = self.module.md_tuple(ops);
            self.module.add_named_metadata(key, node);
        }
        self.md.spir_version = Some((major, minor));
        self.md.ocl_version = Some((major, minor));
    }

    /// `opencl.used.extensions` and `opencl.used.optional.core.features`.
    pub(crate) fn emit_extensions(&mut self) {
        let store = self.store;
        let mut extensions: Vec<String> = Vec::new();
        let from_caps = store.capabilities.iter().filter_map(|c| c.ocl_extension());
        for ext in store.extensions.iter().map(String::as_str).chain(from_caps) {
            if !extensions.iter().any(|e| e == ext) {
                extensions.push(ext.to_string());
            }
        }
        let (features, extensions): (Vec<String>, Vec<String>) = extensions
            .into_iter()
            .partition(|e| OPTIONAL_CORE_FEATURES.contains(&e.as_str()));

        for (key, list) in [
            ("opencl.used.extensions", &extensions),
            ("opencl.used.optional.core.features", &features),
        ] {
            let ops = list.iter().cloned().map(MdOperand::String).collect();
            let node = self.module.md_tuple(ops);
            self.module.add_named_metadata(key, node);
        }
        self.md.used_extensions = extensions;
        self.md.used_optional_core_features = features;
    }
}
