use crate::bytecode::compile::CodeRoot;
use crate::bytecode::compile_error::CompileResult;
use crate::bytecode::ir::InsId;
use crate::lang::data_type::DataType;
use crate::lang::identifier::Identifier;
use std::collections::HashMap;

/// One named value living on the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedValue {
    pub name: Identifier,
    pub ty: DataType,
}

/// Where an identifier lives, as seen from the current top of the stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub ty: DataType,
    /// SP-relative, or BP-relative when `is_global`.
    pub offset: i32,
    pub is_global: bool,
    pub is_const: bool,
}

/// A named local and the slot it was allocated at within its block.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub ty: DataType,
    pub offset: i32,
}

/// A lexical block being compiled.
///
/// Blocks form a chain through borrowed parents; a function body is the
/// root of its chain and resolves past it into the globals.
#[derive(Debug)]
pub struct BlockScope<'p> {
    parent: Option<&'p BlockScope<'p>>,
    /// Stack-resident values in push order; the last one is on top.
    scoped: Vec<ScopedValue>,
    locals: HashMap<Identifier, Local>,
    cursor: i32,
    /// Slots pushed mid-expression and not yet consumed.
    pub temp_stack: i32,
    break_target: Option<InsId>,
    continue_target: Option<InsId>,
}

impl BlockScope<'static> {
    pub fn new() -> Self {
        BlockScope {
            parent: None,
            scoped: Vec::new(),
            locals: HashMap::new(),
            cursor: 0,
            temp_stack: 0,
            break_target: None,
            continue_target: None,
        }
    }
}

impl Default for BlockScope<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p> BlockScope<'p> {
    pub fn child(parent: &'p BlockScope<'p>) -> Self {
        BlockScope {
            parent: Some(parent),
            scoped: Vec::new(),
            locals: HashMap::new(),
            cursor: 0,
            temp_stack: 0,
            break_target: None,
            continue_target: None,
        }
    }

    /// Make this block the target of `break` (and `continue`, if given).
    pub fn with_targets(mut self, break_target: InsId, continue_target: Option<InsId>) -> Self {
        self.break_target = Some(break_target);
        self.continue_target = continue_target;
        self
    }

    pub fn add_scoped(&mut self, name: Identifier, ty: DataType) {
        self.scoped.push(ScopedValue { name, ty });
    }

    /// Record a local at the block's allocation cursor. A name declared
    /// twice shadows the earlier one.
    pub fn declare_local(&mut self, name: Identifier, ty: DataType, root: &CodeRoot) -> CompileResult<()> {
        let size = root.size_of(&ty)?;
        self.locals.insert(
            name.clone(),
            Local {
                ty: ty.clone(),
                offset: self.cursor,
            },
        );
        self.cursor += size;
        self.add_scoped(name, ty);
        Ok(())
    }

    pub fn local(&self, name: &str) -> Option<&Local> {
        self.locals.get(name)
    }

    pub fn resolve(&self, name: &str, root: &CodeRoot) -> CompileResult<Resolved> {
        self.resolve_from(name, root, 0)
    }

    /// Walk this block's values newest-first, then the parents, then the
    /// globals. `offset` accumulates everything stacked above the match.
    pub fn resolve_from(&self, name: &str, root: &CodeRoot, offset: i32) -> CompileResult<Resolved> {
        let mut offset = offset - self.temp_stack;
        for value in self.scoped.iter().rev() {
            offset -= root.size_of(&value.ty)?;
            if value.name.label() == name {
                return Ok(Resolved {
                    ty: value.ty.clone(),
                    offset,
                    is_global: false,
                    is_const: false,
                });
            }
        }
        match self.parent {
            Some(parent) => parent.resolve_from(name, root, offset),
            None => root.resolve_global(name, offset),
        }
    }

    /// Slots owned by this block alone.
    pub fn scope_size(&self, root: &CodeRoot) -> CompileResult<i32> {
        self.scoped
            .iter()
            .try_fold(0, |total, value| Ok(total + root.size_of(&value.ty)?))
    }

    /// Everything between the top of the stack and the function's frame,
    /// pending temporaries of enclosing blocks included.
    pub fn full_scope_size(&self, root: &CodeRoot) -> CompileResult<i32> {
        let own = self.scope_size(root)? + self.temp_stack;
        match self.parent {
            Some(parent) => Ok(own + parent.full_scope_size(root)?),
            None => Ok(own),
        }
    }

    /// Jump target for `break` and the slots to pop before taking it.
    pub fn break_scope_size(&self, root: &CodeRoot) -> CompileResult<Option<(InsId, i32)>> {
        self.unwind_to(root, |block| block.break_target)
    }

    /// Jump target for `continue` and the slots to pop before taking it.
    pub fn continue_scope_size(&self, root: &CodeRoot) -> CompileResult<Option<(InsId, i32)>> {
        self.unwind_to(root, |block| block.continue_target)
    }

    fn unwind_to(
        &self,
        root: &CodeRoot,
        target: impl Fn(&BlockScope<'_>) -> Option<InsId>,
    ) -> CompileResult<Option<(InsId, i32)>> {
        let mut size = 0;
        let mut block = Some(self);
        while let Some(current) = block {
            size += current.scope_size(root)? + current.temp_stack;
            if let Some(id) = target(current) {
                return Ok(Some((id, size)));
            }
            block = current.parent;
        }
        Ok(None)
    }
}
