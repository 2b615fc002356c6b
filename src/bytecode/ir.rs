use crate::bytecode::Op;
use crate::bytecode::compile_error::{CompileError, CompileResult};
use serde::{Deserialize, Serialize};

/// Stable handle to an instruction. Survives inserts and splices, so jumps
/// can point at instructions whose final index is not known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InsId(u32);

impl std::fmt::Display for InsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InsId,
    pub op: Op,
    /// Destination of `Jmp`, `Jsr`, `Jz` and `Jnz`.
    pub jump: Option<InsId>,
}

/// An editable instruction stream.
///
/// Jump targets are resolved to indices only when the stream is written out,
/// which lets the compiler insert the entry trampoline and splice deferred
/// function bodies after the fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ncs {
    instructions: Vec<Instruction>,
    next_id: u32,
}

impl Ncs {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> InsId {
        let id = InsId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append an instruction.
    pub fn add(&mut self, op: Op) -> InsId {
        let ins = self.detached(op);
        self.push(ins)
    }

    /// Append a jump to `target`.
    pub fn add_jump(&mut self, op: Op, target: InsId) -> InsId {
        let mut ins = self.detached(op);
        ins.jump = Some(target);
        self.push(ins)
    }

    /// Allocate an instruction without placing it. Used for labels that are
    /// jumped to before they are emitted.
    pub fn detached(&mut self, op: Op) -> Instruction {
        Instruction {
            id: self.allocate(),
            op,
            jump: None,
        }
    }

    /// Append an instruction made by [`Ncs::detached`].
    pub fn push(&mut self, ins: Instruction) -> InsId {
        let id = ins.id;
        self.instructions.push(ins);
        id
    }

    pub fn insert(&mut self, index: usize, op: Op) -> InsId {
        let ins = self.detached(op);
        let id = ins.id;
        self.instructions.insert(index, ins);
        id
    }

    pub fn insert_jump(&mut self, index: usize, op: Op, target: InsId) -> InsId {
        let mut ins = self.detached(op);
        ins.jump = Some(target);
        let id = ins.id;
        self.instructions.insert(index, ins);
        id
    }

    pub fn index_of(&self, id: InsId) -> Option<usize> {
        self.instructions.iter().position(|ins| ins.id == id)
    }

    /// An empty stream that keeps allocating ids where this one left off,
    /// for code that is spliced back in later.
    pub fn fork(&self) -> Ncs {
        Ncs {
            instructions: Vec::new(),
            next_id: self.next_id,
        }
    }

    /// Move every instruction of `other` in directly after `marker`.
    pub fn splice_after(&mut self, marker: InsId, other: Ncs) -> CompileResult<()> {
        let index = self.index_of(marker).ok_or_else(|| {
            CompileError::internal(format!("splice marker {} is not in the stream", marker))
        })?;
        self.next_id = self.next_id.max(other.next_id);
        self.instructions
            .splice(index + 1..index + 1, other.instructions);
        Ok(())
    }

    pub fn set_jump(&mut self, id: InsId, target: InsId) -> CompileResult<()> {
        let ins = self
            .instructions
            .iter_mut()
            .find(|ins| ins.id == id)
            .ok_or_else(|| CompileError::internal(format!("no instruction {}", id)))?;
        ins.jump = Some(target);
        Ok(())
    }

    /// Index that the jump of `ins` lands on.
    pub fn jump_index(&self, ins: &Instruction) -> Option<usize> {
        ins.jump.and_then(|target| self.index_of(target))
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn ops(&self) -> impl Iterator<Item = &Op> {
        self.instructions.iter().map(|ins| &ins.op)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
