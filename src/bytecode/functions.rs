use crate::bytecode::Op;
use crate::bytecode::compile::CodeRoot;
use crate::bytecode::compile_error::{CompileError, CompileResult};
use crate::bytecode::ir::{InsId, Ncs};
use crate::bytecode::scope::BlockScope;
use crate::lang::data_type::DataType;
use crate::lang::engine::ScriptDefs;
use crate::lang::identifier::Identifier;
use crate::lang::node::{Expr, FunctionDecl, Param};
use std::cell::Cell;
use std::collections::HashMap;

/// A script function bound to the instruction its body starts at.
#[derive(Debug)]
pub struct FunctionReference {
    pub entry: InsId,
    pub decl: FunctionDecl,
    defined: bool,
    called: Cell<bool>,
}

impl FunctionReference {
    pub fn is_defined(&self) -> bool {
        self.defined
    }

    fn mark_called(&self) {
        self.called.set(true);
    }
}

/// At most one prototype and one definition per name.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<Identifier, FunctionReference>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FunctionReference> {
        self.functions.get(name)
    }

    /// The function if it has a body; prototypes are skipped.
    pub fn defined(&self, name: &str) -> Option<&FunctionReference> {
        self.get(name).filter(|f| f.defined)
    }

    pub fn declare_prototype(&mut self, decl: FunctionDecl, stub: InsId) -> CompileResult<()> {
        if self.functions.contains_key(&decl.name) {
            return Err(CompileError::duplicate_prototype(&decl.name));
        }
        tracing::trace!(name = %decl.name, %stub, "prototype declared");
        self.functions.insert(
            decl.name.clone(),
            FunctionReference {
                entry: stub,
                decl,
                defined: false,
                called: Cell::new(false),
            },
        );
        Ok(())
    }

    /// Match a definition against the registry.
    ///
    /// Returns the prototype's stub and the signature to register (the
    /// definition with defaults inherited from the prototype), or `None`
    /// when there is no prototype.
    pub fn reconcile(&self, decl: &FunctionDecl) -> CompileResult<Option<(InsId, FunctionDecl)>> {
        let Some(existing) = self.get(decl.name.label()) else {
            return Ok(None);
        };
        if existing.defined {
            return Err(CompileError::redefinition(&decl.name));
        }

        let proto = &existing.decl;
        let mut mismatches = Vec::new();
        if proto.return_type != decl.return_type {
            mismatches.push(format!(
                "return type: expected {}, found {}",
                proto.return_type, decl.return_type
            ));
        }
        if proto.params.len() != decl.params.len() {
            mismatches.push(format!(
                "parameter count: expected {}, found {}",
                proto.params.len(),
                decl.params.len()
            ));
        }
        for (i, (expected, found)) in proto.params.iter().zip(&decl.params).enumerate() {
            if expected.ty != found.ty {
                mismatches.push(format!(
                    "parameter {} ('{}'): expected {}, found {}",
                    i + 1,
                    found.name,
                    expected.ty,
                    found.ty
                ));
            }
        }
        if !mismatches.is_empty() {
            return Err(CompileError::prototype_mismatch(&decl.name, &mismatches));
        }

        let mut merged = decl.clone();
        for (param, proto_param) in merged.params.iter_mut().zip(&proto.params) {
            if param.default.is_none() {
                param.default = proto_param.default.clone();
            }
        }
        Ok(Some((existing.entry, merged)))
    }

    /// Register a compiled body. A prototype of the same name is replaced,
    /// keeping its entry.
    pub fn define(&mut self, decl: FunctionDecl, entry: InsId) {
        let called = self
            .functions
            .get(&decl.name)
            .is_some_and(|f| f.called.get());
        self.functions.insert(
            decl.name.clone(),
            FunctionReference {
                entry,
                decl,
                defined: true,
                called: Cell::new(called),
            },
        );
    }

    /// Prototypes that a call refers to but that never got a body.
    pub fn undefined_but_called(&self) -> Vec<Identifier> {
        let mut names: Vec<Identifier> = self
            .functions
            .values()
            .filter(|f| !f.defined && f.called.get())
            .map(|f| f.decl.name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Defaults must be trailing and built only from literals and engine
/// constants.
pub fn check_defaults(decl: &FunctionDecl, defs: &ScriptDefs) -> CompileResult<()> {
    let mut seen_default = false;
    for param in &decl.params {
        match param.default {
            Some(_) => seen_default = true,
            None if seen_default => return Err(CompileError::default_order(&decl.name, &param.name)),
            None => {}
        }
    }
    for param in &decl.params {
        if let Some(default) = &param.default {
            if !is_constant(default, defs) {
                return Err(CompileError::non_constant_default(&decl.name, &param.name));
            }
        }
    }
    Ok(())
}

fn is_constant(expr: &Expr, defs: &ScriptDefs) -> bool {
    match expr {
        Expr::Literal(_) => true,
        Expr::Vector(parts) => parts.iter().all(|p| is_constant(p, defs)),
        Expr::Access(access) => access
            .as_identifier()
            .is_some_and(|name| defs.constant(name.label()).is_some()),
        Expr::Unary { operand, .. } => is_constant(operand, defs),
        Expr::Binary { lhs, rhs, .. } => is_constant(lhs, defs) && is_constant(rhs, defs),
        Expr::Assign { .. } | Expr::Step { .. } | Expr::Call { .. } => false,
    }
}

/// Pair every parameter with the expression that supplies it: the
/// argument at its position, or its default.
fn bind_arguments<'a>(
    function: &Identifier,
    params: &'a [Param],
    args: &'a [Expr],
) -> CompileResult<Vec<&'a Expr>> {
    if args.len() > params.len() {
        return Err(CompileError::too_many_arguments(function, params.len(), args.len()));
    }
    let missing: Vec<Identifier> = params[args.len()..]
        .iter()
        .filter(|p| p.default.is_none())
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(CompileError::missing_arguments(function, &missing));
    }

    let mut bound: Vec<&Expr> = args.iter().collect();
    for param in &params[args.len()..] {
        let default = param.default.as_ref().ok_or_else(|| {
            CompileError::internal(format!("parameter '{}' of '{}' has no value", param.name, function))
        })?;
        bound.push(default);
    }
    Ok(bound)
}

impl CodeRoot {
    /// Compile a call to a script function or, failing that, an engine
    /// routine. The return value is left on the stack.
    pub(crate) fn compile_call(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        name: &Identifier,
        args: &[Expr],
    ) -> CompileResult<DataType> {
        if let Some(function) = self.functions.get(name.label()) {
            function.mark_called();
            let decl = &function.decl;
            let bound = bind_arguments(name, &decl.params, args)?;

            self.structs.reserve(ncs, &decl.return_type)?;
            block.temp_stack += self.size_of(&decl.return_type)?;

            self.push_arguments(ncs, block, name, &decl.params, &bound)?;
            ncs.add_jump(Op::Jsr, function.entry);
            return Ok(decl.return_type.clone());
        }

        if let Some((index, function)) = self.defs.function(name.label()) {
            let bound = bind_arguments(name, &function.params, args)?;
            self.push_arguments(ncs, block, name, &function.params, &bound)?;

            let routine = u16::try_from(index)
                .map_err(|_| CompileError::internal(format!("routine index {} out of range", index)))?;
            let argc = u8::try_from(bound.len())
                .map_err(|_| CompileError::internal(format!("too many arguments for '{}'", name)))?;
            ncs.add(Op::Action { routine, argc });
            block.temp_stack += self.size_of(&function.return_type)?;
            return Ok(function.return_type.clone());
        }

        Err(CompileError::undefined_function(name.label()))
    }

    /// Push arguments in parameter order. The callee consumes them, so the
    /// temp counter is rolled back once they are all on the stack.
    fn push_arguments(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        function: &Identifier,
        params: &[Param],
        args: &[&Expr],
    ) -> CompileResult<()> {
        let mut pushed = 0;
        for (param, arg) in params.iter().zip(args) {
            if param.ty == DataType::Action {
                self.compile_deferred(ncs, block, arg)?;
                continue;
            }
            let actual = self.compile_expr(ncs, block, arg)?;
            if actual != param.ty {
                return Err(CompileError::argument_mismatch(
                    function, &param.name, &param.ty, &actual,
                ));
            }
            pushed += self.size_of(&actual)?;
        }
        block.temp_stack -= pushed;
        Ok(())
    }

    /// Compile an action argument in place: snapshot the frame, skip over
    /// the command, and end the command with its own `RETN`. The command
    /// runs later against the snapshot, so it sees the same offsets.
    fn compile_deferred(&self, ncs: &mut Ncs, block: &mut BlockScope<'_>, command: &Expr) -> CompileResult<()> {
        let globals = -self.scope_size()?;
        let locals = block.full_scope_size(self)?;
        ncs.add(Op::StoreState { globals, locals });
        let resume = ncs.detached(Op::Nop);
        ncs.add_jump(Op::Jmp, resume.id);

        let ty = self.compile_expr(ncs, block, command)?;
        let size = self.size_of(&ty)?;
        if size > 0 {
            ncs.add(Op::MovSp(-size));
        }
        block.temp_stack -= size;
        ncs.add(Op::Retn);
        ncs.push(resume);
        tracing::trace!(globals, locals, "deferred command compiled");
        Ok(())
    }
}
