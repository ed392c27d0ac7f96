//! Ids, operands and entity records.

use std::fmt;

use crate::opcode::Opcode;

/// Result id of a SPIR-V record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(pub u32);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// One operand of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Id(Id),
    Literal(u32),
    String(String),
}

impl Operand {
    pub fn as_id(&self) -> Option<Id> {
        match self {
            Operand::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// Raw word of an id or literal operand.
    pub fn as_word(&self) -> Option<u32> {
        match self {
            Operand::Id(id) => Some(id.0),
            Operand::Literal(w) => Some(*w),
            Operand::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Operand::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Id> for Operand {
    fn from(id: Id) -> Self {
        Operand::Id(id)
    }
}

impl From<u32> for Operand {
    fn from(w: u32) -> Self {
        Operand::Literal(w)
    }
}

impl From<&str> for Operand {
    fn from(s: &str) -> Self {
        Operand::String(s.to_string())
    }
}

/// Source position from `OpLine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineInfo {
    /// `OpString` holding the file name.
    pub file: Id,
    pub line: u32,
    pub column: u32,
}

/// An immutable SPIR-V record.
///
/// Operands follow the SPIR-V layout of the opcode with the result type and
/// result id removed. Records without a result still get a unique id so
/// every instruction can be addressed.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: Id,
    pub opcode: Opcode,
    /// Result type, if the record has one.
    pub ty: Option<Id>,
    pub operands: Vec<Operand>,
    pub line: Option<LineInfo>,
    /// `DebugScope` record in effect for this record.
    pub scope: Option<Id>,
}

impl Entity {
    pub fn new(id: Id, opcode: Opcode, ty: Option<Id>, operands: Vec<Operand>) -> Self {
        Self {
            id,
            opcode,
            ty,
            operands,
            line: None,
            scope: None,
        }
    }

    pub fn id_at(&self, i: usize) -> Option<Id> {
        self.operands.get(i)?.as_id()
    }

    pub fn word_at(&self, i: usize) -> Option<u32> {
        self.operands.get(i)?.as_word()
    }

    pub fn str_at(&self, i: usize) -> Option<&str> {
        self.operands.get(i)?.as_str()
    }

    /// Id operands from position `i` on; non-id operands are skipped.
    pub fn ids_from(&self, i: usize) -> Vec<Id> {
        self.operands
            .iter()
            .skip(i)
            .filter_map(Operand::as_id)
            .collect()
    }

    /// Words of the operands from position `i` on.
    pub fn words_from(&self, i: usize) -> Vec<u32> {
        self.operands
            .iter()
            .skip(i)
            .filter_map(Operand::as_word)
            .collect()
    }

    // -- Extended instructions --

    /// Import id of an `OpExtInst`.
    pub fn ext_set(&self) -> Option<Id> {
        match self.opcode {
            Opcode::ExtInst => self.id_at(0),
            _ => None,
        }
    }

    /// Instruction number inside the extended set.
    pub fn ext_op(&self) -> Option<u32> {
        match self.opcode {
            Opcode::ExtInst => self.word_at(1),
            _ => None,
        }
    }

    /// Arguments of an `OpExtInst`.
    pub fn ext_args(&self) -> &[Operand] {
        match self.opcode {
            Opcode::ExtInst if self.operands.len() >= 2 => &self.operands[2..],
            _ => &[],
        }
    }

    pub fn ext_arg_id(&self, i: usize) -> Option<Id> {
        self.ext_args().get(i)?.as_id()
    }

    pub fn ext_arg_word(&self, i: usize) -> Option<u32> {
        self.ext_args().get(i)?.as_word()
    }
}
