use crate::bytecode::Op;
use crate::bytecode::compile_error::{CompileError, CompileResult};
use crate::bytecode::ir::Ncs;
use crate::lang::data_type::DataType;
use crate::lang::identifier::Identifier;
use crate::lang::node::StructDef;
use std::collections::HashMap;

/// A struct layout: members in declaration order, each at a fixed slot
/// offset from the start of the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    pub name: Identifier,
    members: Vec<Member>,
    size: i32,
}

#[derive(Debug, Clone, PartialEq)]
struct Member {
    name: Identifier,
    ty: DataType,
    offset: i32,
}

impl Struct {
    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn member_names(&self) -> Vec<Identifier> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }

    fn member(&self, name: &str) -> CompileResult<&Member> {
        self.members
            .iter()
            .find(|m| m.name.label() == name)
            .ok_or_else(|| {
                CompileError::unknown_member(
                    &format!("struct {}", self.name),
                    &Identifier::new(name),
                    &self.member_names(),
                )
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructRegistry {
    structs: HashMap<Identifier, Struct>,
}

impl StructRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a struct. Member types must already be known, so the size
    /// and member offsets are fixed here.
    pub fn define(&mut self, def: &StructDef) -> CompileResult<()> {
        if def.members.is_empty() {
            return Err(CompileError::empty_struct(&def.name));
        }
        if self.structs.contains_key(&def.name) {
            return Err(CompileError::duplicate_struct(&def.name));
        }

        let mut members: Vec<Member> = Vec::with_capacity(def.members.len());
        let mut offset = 0;
        for member in &def.members {
            if !member.ty.is_storable() {
                return Err(CompileError::unstorable_variable(&member.name, &member.ty));
            }
            if members.iter().any(|m| m.name == member.name) {
                return Err(CompileError::semantic(format!(
                    "struct '{}' declares member '{}' twice",
                    def.name, member.name
                )));
            }
            self.check(&member.ty)?;
            let size = self.size_of(&member.ty)?;
            members.push(Member {
                name: member.name.clone(),
                ty: member.ty.clone(),
                offset,
            });
            offset += size;
        }

        tracing::trace!(name = %def.name, size = offset, "struct defined");
        self.structs.insert(
            def.name.clone(),
            Struct {
                name: def.name.clone(),
                members,
                size: offset,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Struct> {
        self.structs.get(name)
    }

    /// Reject struct types that were never defined.
    pub fn check(&self, ty: &DataType) -> CompileResult<()> {
        match ty {
            DataType::Struct(name) if !self.structs.contains_key(name) => {
                Err(CompileError::unknown_struct(name))
            }
            _ => Ok(()),
        }
    }

    pub fn size(&self, name: &Identifier) -> CompileResult<i32> {
        self.get(name.label())
            .map(Struct::size)
            .ok_or_else(|| CompileError::internal(format!("size of undefined struct '{}'", name)))
    }

    pub fn size_of(&self, ty: &DataType) -> CompileResult<i32> {
        match ty {
            DataType::Struct(name) => self.size(name),
            builtin => builtin
                .builtin_size()
                .ok_or_else(|| CompileError::internal(format!("no size for {}", builtin))),
        }
    }

    fn lookup(&self, name: &Identifier) -> CompileResult<&Struct> {
        self.get(name.label()).ok_or_else(|| CompileError::unknown_struct(name))
    }

    /// Slot offset of `member` from the start of the struct.
    pub fn member_offset(&self, name: &Identifier, member: &str) -> CompileResult<i32> {
        Ok(self.lookup(name)?.member(member)?.offset)
    }

    pub fn member_type(&self, name: &Identifier, member: &str) -> CompileResult<&DataType> {
        Ok(&self.lookup(name)?.member(member)?.ty)
    }

    /// Emit the zeroed reservation for one value of `ty`.
    pub fn reserve(&self, ncs: &mut Ncs, ty: &DataType) -> CompileResult<()> {
        let op = match ty {
            DataType::Int => Op::RsAddI,
            DataType::Float => Op::RsAddF,
            DataType::String => Op::RsAddS,
            DataType::Object => Op::RsAddO,
            DataType::Effect => Op::RsAddEff,
            DataType::Event => Op::RsAddEvt,
            DataType::Location => Op::RsAddLoc,
            DataType::Talent => Op::RsAddTal,
            DataType::Void | DataType::Action => return Ok(()),
            DataType::Vector => {
                for _ in 0..3 {
                    ncs.add(Op::RsAddF);
                }
                return Ok(());
            }
            DataType::Struct(name) => return self.initialize(name, ncs),
        };
        ncs.add(op);
        Ok(())
    }

    /// Reserve every member of a struct in declaration order, nested
    /// structs recursively.
    pub fn initialize(&self, name: &Identifier, ncs: &mut Ncs) -> CompileResult<()> {
        let def = self
            .get(name.label())
            .ok_or_else(|| CompileError::internal(format!("initializing undefined struct '{}'", name)))?;
        for member in &def.members {
            self.reserve(ncs, &member.ty)?;
        }
        Ok(())
    }
}
