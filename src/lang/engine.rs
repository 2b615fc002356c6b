use super::data_type::DataType;
use super::identifier::Identifier;
use super::node::Param;
use super::value::Value;
use std::collections::HashMap;

/// Built-in routine implemented by the host; called through `ACTION`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineFunction {
    pub name: Identifier,
    pub return_type: DataType,
    pub params: Vec<Param>,
}

/// Named constant from the host's script definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConstant {
    pub name: Identifier,
    pub ty: DataType,
    pub value: Value,
}

/// Engine routines and constants for one game.
///
/// A routine's `ACTION` index is its position in the list it was built from.
#[derive(Debug, Clone, Default)]
pub struct ScriptDefs {
    functions: Vec<EngineFunction>,
    constants: Vec<EngineConstant>,
    function_index: HashMap<Identifier, usize>,
    constant_index: HashMap<Identifier, usize>,
}

impl ScriptDefs {
    pub fn new(functions: Vec<EngineFunction>, constants: Vec<EngineConstant>) -> Self {
        let function_index = functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        let constant_index = constants
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self {
            functions,
            constants,
            function_index,
            constant_index,
        }
    }

    /// Routine index and signature.
    pub fn function(&self, name: &str) -> Option<(usize, &EngineFunction)> {
        let index = *self.function_index.get(name)?;
        Some((index, &self.functions[index]))
    }

    pub fn constant(&self, name: &str) -> Option<&EngineConstant> {
        self.constant_index.get(name).map(|&i| &self.constants[i])
    }

    pub fn functions(&self) -> &[EngineFunction] {
        &self.functions
    }

    pub fn constants(&self) -> &[EngineConstant] {
        &self.constants
    }
}
