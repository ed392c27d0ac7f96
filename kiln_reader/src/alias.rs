//! `alias.scope` / `noalias` metadata from the INTEL aliasing decorations.

use rustc_hash::FxHashMap;

use kiln_ir::metadata::MdOperand;
use kiln_ir::value::{InstRef, MdRef};
use kiln_spirv::{Decoration, Id, Opcode};

use crate::error::{Result, TranslateError};
use crate::translator::Translator;

/// Translated scope-list, scope and domain declarations.
#[derive(Debug, Default)]
pub(crate) struct AliasMetadata {
    memo: FxHashMap<Id, MdRef>,
}

impl<'a> Translator<'a> {
    /// Attach the aliasing lists decorating `id` to `inst`.
    pub(crate) fn attach_alias_metadata(&mut self, id: Id, inst: InstRef) -> Result<()> {
        for (decoration, kind) in [
            (Decoration::AliasScopeINTEL, "alias.scope"),
            (Decoration::NoAliasINTEL, "noalias"),
        ] {
            let Some(list) = self
                .store
                .decoration(id, decoration)
                .and_then(|d| d.args.first())
                .and_then(|a| a.as_id())
            else {
                continue;
            };
            let md = self.alias_node(list)?;
            let func = self.state(id)?.func;
            self.module.function_mut(func).inst_mut(inst).set_metadata(kind, md);
        }
        Ok(())
    }

    /// Lists become tuples of scopes; scopes and domains are distinct
    /// self-referencing nodes.
    fn alias_node(&mut self, id: Id) -> Result<MdRef> {
        if let Some(&md) = self.alias.memo.get(&id) {
            return Ok(md);
        }
        let e = self.entity(id)?;
        let name = |i: usize| {
            e.id_at(i)
                .and_then(|s| self.store.string(s))
                .map(MdOperand::string)
        };
        let md = match e.opcode {
            Opcode::AliasDomainDeclINTEL => {
                let rest = name(0).into_iter().collect();
                self.module.md_self_ref(rest)
            }
            Opcode::AliasScopeDeclINTEL => {
                let label = name(1);
                let domain = self.alias_node(self.operand_id(e, 0)?)?;
                let mut rest = vec![MdOperand::Node(domain)];
                rest.extend(label);
                self.module.md_self_ref(rest)
            }
            Opcode::AliasScopeListDeclINTEL => {
                let mut scopes = Vec::new();
                for scope in e.ids_from(0) {
                    scopes.push(MdOperand::Node(self.alias_node(scope)?));
                }
                self.module.md_tuple(scopes)
            }
            other => {
                return Err(TranslateError::malformed(
                    id,
                    format!("{} is not an aliasing declaration", other.name()),
                ))
            }
        };
        self.alias.memo.insert(id, md);
        Ok(md)
    }
}
