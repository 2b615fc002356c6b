use std::collections::HashSet;
use std::sync::Arc;

use crate::bytecode::compile_error::{CompileError, CompileResult};
use crate::bytecode::disasm;
use crate::bytecode::functions::{FunctionRegistry, check_defaults};
use crate::bytecode::include::IncludeLoader;
use crate::bytecode::ir::Ncs;
use crate::bytecode::scope::{BlockScope, Resolved, ScopedValue};
use crate::bytecode::stmt::Frame;
use crate::bytecode::structs::StructRegistry;
use crate::bytecode::Op;
use crate::lang::data_type::DataType;
use crate::lang::engine::ScriptDefs;
use crate::lang::identifier::Identifier;
use crate::lang::node::{FunctionDecl, FunctionDef, GlobalVar, TopLevel};
use crate::lang::program::Program;
use crate::options::CompileOptions;

const MAIN: &str = "main";
const STARTING_CONDITIONAL: &str = "StartingConditional";

#[derive(Debug)]
struct Global {
    value: ScopedValue,
    is_const: bool,
}

/// Compilation root for one script file.
///
/// Owns everything that outlives a single function body: the struct and
/// function registries, the globals, and the include bookkeeping. Phases run
/// in a fixed order: includes, then globals and structs, then functions,
/// then the entry trampoline.
#[derive(Debug)]
pub struct CodeRoot {
    pub(crate) defs: Arc<ScriptDefs>,
    pub(crate) structs: StructRegistry,
    pub(crate) functions: FunctionRegistry,

    /// Global values in declaration order.
    globals: Vec<Global>,

    /// Set once `SAVEBP` is emitted. Globals are BP-relative from then on.
    bp_saved: bool,

    /// Where the entry trampoline goes: just after the globals.
    entry_index: usize,

    includes: Option<IncludeLoader>,

    /// Include keys already expanded (prevents duplicates and cycles)
    included: HashSet<String>,

    options: CompileOptions,
}

impl Default for CodeRoot {
    fn default() -> Self {
        Self::new(Arc::new(ScriptDefs::default()), CompileOptions::default())
    }
}

impl CodeRoot {
    pub fn new(defs: Arc<ScriptDefs>, options: CompileOptions) -> Self {
        CodeRoot {
            defs,
            structs: StructRegistry::new(),
            functions: FunctionRegistry::new(),
            globals: Vec::new(),
            bp_saved: false,
            entry_index: 0,
            includes: None,
            included: HashSet::new(),
            options,
        }
    }

    pub fn with_includes(mut self, loader: IncludeLoader) -> Self {
        self.includes = Some(loader);
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn entry_index(&self) -> usize {
        self.entry_index
    }

    pub fn structs(&self) -> &StructRegistry {
        &self.structs
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn size_of(&self, ty: &DataType) -> CompileResult<i32> {
        self.structs.size_of(ty)
    }

    /// Slots taken by the globals, negated: they sit below the frame the
    /// entry trampoline sets up.
    pub fn scope_size(&self) -> CompileResult<i32> {
        self.globals
            .iter()
            .try_fold(0, |total, global| Ok(total - self.size_of(&global.value.ty)?))
    }

    /// Last stop of identifier resolution. `offset` is what the blocks in
    /// between have accumulated; it only matters before `SAVEBP`.
    pub fn resolve_global(&self, name: &str, offset: i32) -> CompileResult<Resolved> {
        let mut global_offset = 0;
        for global in self.globals.iter().rev() {
            global_offset -= self.size_of(&global.value.ty)?;
            if global.value.name.label() == name {
                let offset = if self.bp_saved {
                    global_offset
                } else {
                    offset + global_offset
                };
                return Ok(Resolved {
                    ty: global.value.ty.clone(),
                    offset,
                    is_global: self.bp_saved,
                    is_const: global.is_const,
                });
            }
        }

        let names: Vec<Identifier> = self.globals.iter().map(|g| g.value.name.clone()).collect();
        Err(CompileError::undefined_identifier(name, &names))
    }

    // =========================================================================
    // Driver
    // =========================================================================

    /// Compile a whole file into a fresh instruction stream.
    pub fn compile(mut self, program: &Program) -> CompileResult<Ncs> {
        let mut ncs = Ncs::new();
        self.compile_into(program, &mut ncs)?;
        Ok(ncs)
    }

    /// Compile into `ncs`, leaving the root available for inspection.
    pub fn compile_into(&mut self, program: &Program, ncs: &mut Ncs) -> CompileResult<()> {
        let items = self.expand_includes(program.items.clone())?;
        tracing::debug!(items = items.len(), includes = self.included.len(), "includes processed");

        for item in &items {
            match item {
                TopLevel::Global(global) => self.compile_global(ncs, global)?,
                TopLevel::Struct(def) => self.structs.define(def)?,
                _ => {}
            }
        }
        if !self.globals.is_empty() {
            ncs.add(Op::SaveBp);
            self.bp_saved = true;
        }
        self.entry_index = ncs.len();
        tracing::debug!(globals = self.globals.len(), entry_index = self.entry_index, "globals compiled");

        for item in &items {
            match item {
                TopLevel::Prototype(decl) => self.compile_prototype(ncs, decl)?,
                TopLevel::Function(def) => self.compile_function(ncs, def)?,
                TopLevel::Include(path) => {
                    return Err(CompileError::internal(format!("include '{}' survived expansion", path)));
                }
                TopLevel::Global(_) | TopLevel::Struct(_) => {}
            }
        }

        let missing = self.functions.undefined_but_called();
        if !missing.is_empty() {
            return Err(CompileError::prototype_never_defined(&missing));
        }

        self.insert_trampoline(ncs)?;
        if self.options.trace_listing {
            tracing::debug!(listing = %disasm::listing(ncs), "instruction listing");
        }
        Ok(())
    }

    /// Replace include directives with the items they load until none are
    /// left. The last directive is expanded first and its items go to the
    /// front of the list.
    fn expand_includes(&mut self, mut pending: Vec<TopLevel>) -> CompileResult<Vec<TopLevel>> {
        while let Some(pos) = pending
            .iter()
            .rposition(|item| matches!(item, TopLevel::Include(_)))
        {
            let TopLevel::Include(path) = pending.remove(pos) else {
                return Err(CompileError::internal("include position moved during expansion"));
            };

            let key = self.options.include_key(&path);
            if !self.included.insert(key) {
                tracing::trace!(include = %path, "include already expanded");
                continue;
            }
            let loader = self
                .includes
                .as_ref()
                .ok_or_else(|| CompileError::missing_include(&path, Vec::new()))?;
            let loaded = loader.load(&path, &self.options)?;
            tracing::trace!(include = %path, items = loaded.items.len(), "include expanded");
            pending.splice(0..0, loaded.items);
        }
        Ok(pending)
    }

    fn compile_global(&mut self, ncs: &mut Ncs, global: &GlobalVar) -> CompileResult<()> {
        let name = &global.name;
        if !global.ty.is_storable() {
            return Err(CompileError::unstorable_variable(name, &global.ty));
        }
        self.structs.check(&global.ty)?;
        if self.globals.iter().any(|g| &g.value.name == name) {
            return Err(CompileError::duplicate_global(name));
        }
        if global.is_const && global.init.is_none() {
            return Err(CompileError::semantic(format!(
                "const global '{}' needs an initializer",
                name
            )));
        }

        self.structs.reserve(ncs, &global.ty)?;
        self.globals.push(Global {
            value: ScopedValue {
                name: name.clone(),
                ty: global.ty.clone(),
            },
            is_const: global.is_const,
        });

        if let Some(init) = &global.init {
            let mut block = BlockScope::new();
            let actual = self.compile_expr(ncs, &mut block, init)?;
            if actual != global.ty {
                return Err(CompileError::type_mismatch(
                    format_args!("initialization of '{}'", name),
                    &global.ty,
                    &actual,
                ));
            }
            let size = self.size_of(&global.ty)?;
            let target = block.resolve(name.label(), self)?;
            ncs.add(Op::CpDownSp {
                offset: target.offset,
                size,
            });
            ncs.add(Op::MovSp(-size));
            block.temp_stack -= size;
        }
        tracing::trace!(global = %name, ty = %global.ty, "global compiled");
        Ok(())
    }

    /// Types in a signature must exist. Parameters cannot be void, and only
    /// engine routines take actions.
    fn check_signature(&self, decl: &FunctionDecl) -> CompileResult<()> {
        self.structs.check(&decl.return_type)?;
        if decl.return_type == DataType::Action {
            return Err(CompileError::unstorable_variable(&decl.name, &decl.return_type));
        }
        for param in &decl.params {
            if !param.ty.is_storable() {
                return Err(CompileError::unstorable_variable(&param.name, &param.ty));
            }
            self.structs.check(&param.ty)?;
        }
        Ok(())
    }

    fn compile_prototype(&mut self, ncs: &mut Ncs, decl: &FunctionDecl) -> CompileResult<()> {
        check_defaults(decl, &self.defs)?;
        self.check_signature(decl)?;
        if self.functions.get(decl.name.label()).is_some() {
            return Err(CompileError::duplicate_prototype(&decl.name));
        }
        let stub = ncs.add(Op::Nop);
        self.functions.declare_prototype(decl.clone(), stub)
    }

    /// A definition with a prototype is compiled on the side and spliced in
    /// after the prototype's stub, which stays the entry. Otherwise the body
    /// goes at the end of the stream behind a fresh entry marker.
    fn compile_function(&mut self, ncs: &mut Ncs, def: &FunctionDef) -> CompileResult<()> {
        match self.functions.reconcile(&def.decl)? {
            Some((stub, signature)) => {
                check_defaults(&signature, &self.defs)?;
                self.check_signature(&signature)?;

                let mut body = ncs.fork();
                self.compile_body(&mut body, &signature, def)?;
                ncs.splice_after(stub, body)?;
                tracing::trace!(function = %signature.name, entry = %stub, "body spliced after prototype");
                self.functions.define(signature, stub);
            }
            None => {
                check_defaults(&def.decl, &self.defs)?;
                self.check_signature(&def.decl)?;

                let entry = ncs.add(Op::Nop);
                self.compile_body(ncs, &def.decl, def)?;
                tracing::trace!(function = %def.decl.name, %entry, "function compiled");
                self.functions.define(def.decl.clone(), entry);
            }
        }
        Ok(())
    }

    /// Parameters are the bottom of the body's block; the caller pushed
    /// them and the block end pops them.
    fn compile_body(&self, ncs: &mut Ncs, signature: &FunctionDecl, def: &FunctionDef) -> CompileResult<()> {
        let retn = ncs.detached(Op::Retn);
        let frame = Frame {
            name: &signature.name,
            return_type: &signature.return_type,
            retn: retn.id,
        };

        let mut block = BlockScope::new();
        for param in &signature.params {
            if block.local(param.name.label()).is_some() {
                return Err(CompileError::redeclaration(&param.name));
            }
            block.declare_local(param.name.clone(), param.ty.clone(), self)?;
        }
        self.compile_block(ncs, &mut block, &def.body.stmts, &frame)?;
        ncs.push(retn);
        Ok(())
    }

    /// Put the call to the entry function at the entry index, so it runs
    /// right after the globals are set up.
    fn insert_trampoline(&self, ncs: &mut Ncs) -> CompileResult<()> {
        let at = self.entry_index;
        if let Some(main) = self.functions.defined(MAIN) {
            ncs.insert(at, Op::Retn);
            ncs.insert_jump(at, Op::Jsr, main.entry);
            tracing::debug!(entry = MAIN, index = at, "entry trampoline inserted");
            return Ok(());
        }
        if let Some(conditional) = self.functions.defined(STARTING_CONDITIONAL) {
            ncs.insert(at, Op::Retn);
            ncs.insert_jump(at, Op::Jsr, conditional.entry);
            ncs.insert(at, Op::RsAddI);
            tracing::debug!(entry = STARTING_CONDITIONAL, index = at, "entry trampoline inserted");
            return Ok(());
        }
        Err(CompileError::entry_point())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::include::tests::LineParser;
    use crate::lang::engine::{EngineConstant, EngineFunction};
    use crate::lang::node::{
        BinaryOp, Block, Declarator, Expr, FieldAccess, Param, Stmt, StructDef, StructMember,
    };
    use crate::lang::value::Value;

    fn defs() -> Arc<ScriptDefs> {
        Arc::new(ScriptDefs::new(
            vec![
                EngineFunction {
                    name: "PrintInteger".into(),
                    return_type: DataType::Void,
                    params: vec![Param::new(DataType::Int, "nInteger")],
                },
                EngineFunction {
                    name: "DelayCommand".into(),
                    return_type: DataType::Void,
                    params: vec![
                        Param::new(DataType::Float, "fSeconds"),
                        Param::new(DataType::Action, "aActionToDelay"),
                    ],
                },
            ],
            vec![EngineConstant {
                name: "TRUE".into(),
                ty: DataType::Int,
                value: Value::Int(1),
            }],
        ))
    }

    fn root() -> CodeRoot {
        CodeRoot::new(defs(), CompileOptions::default())
    }

    fn global(ty: DataType, name: &str, init: Option<Expr>) -> TopLevel {
        TopLevel::Global(GlobalVar {
            is_const: false,
            ty,
            name: name.into(),
            init,
        })
    }

    fn decl(return_type: DataType, name: &str, params: Vec<Param>) -> FunctionDecl {
        FunctionDecl {
            return_type,
            name: name.into(),
            params,
        }
    }

    fn function(return_type: DataType, name: &str, params: Vec<Param>, stmts: Vec<Stmt>) -> TopLevel {
        TopLevel::Function(FunctionDef {
            decl: decl(return_type, name, params),
            body: Block::new(stmts),
        })
    }

    fn main(stmts: Vec<Stmt>) -> TopLevel {
        function(DataType::Void, "main", vec![], stmts)
    }

    fn ops(ncs: &Ncs) -> Vec<Op> {
        ncs.ops().cloned().collect()
    }

    fn jump_at(ncs: &Ncs, index: usize) -> Option<usize> {
        ncs.jump_index(&ncs.instructions()[index])
    }

    #[test]
    fn test_global_increment_end_to_end() {
        let program = Program::new(vec![
            global(DataType::Int, "g", Some(Expr::int(5))),
            main(vec![Stmt::Expr(Expr::assign(
                FieldAccess::new("g"),
                Expr::binary(BinaryOp::Add, Expr::ident("g"), Expr::int(1)),
            ))]),
        ]);
        let ncs = root().compile(&program).unwrap();

        assert_eq!(
            ops(&ncs),
            vec![
                Op::RsAddI,
                Op::ConstI(5),
                Op::CpDownSp { offset: -2, size: 1 },
                Op::MovSp(-1),
                Op::SaveBp,
                Op::Jsr,
                Op::Retn,
                Op::Nop,
                Op::CpTopBp { offset: -1, size: 1 },
                Op::ConstI(1),
                Op::AddII,
                Op::CpDownBp { offset: -1, size: 1 },
                Op::MovSp(-1),
                Op::MovSp(0),
                Op::Retn,
            ]
        );
        assert_eq!(jump_at(&ncs, 5), Some(7));
    }

    #[test]
    fn test_globals_compiled_before_functions() {
        let program = Program::new(vec![
            main(vec![]),
            global(DataType::Int, "a", Some(Expr::int(1))),
            global(DataType::String, "s", None),
        ]);
        let mut root = root();
        let mut ncs = Ncs::new();
        root.compile_into(&program, &mut ncs).unwrap();

        let ops = ops(&ncs);
        assert_eq!(ops.iter().filter(|op| **op == Op::SaveBp).count(), 1);
        assert_eq!(
            &ops[..7],
            &[
                Op::RsAddI,
                Op::ConstI(1),
                Op::CpDownSp { offset: -2, size: 1 },
                Op::MovSp(-1),
                Op::RsAddS,
                Op::SaveBp,
                Op::Jsr,
            ]
        );
        assert_eq!(root.entry_index(), 6);
        assert_eq!(root.scope_size().unwrap(), -2);
    }

    #[test]
    fn test_no_globals_no_savebp() {
        let ncs = root().compile(&Program::new(vec![main(vec![])])).unwrap();
        assert_eq!(
            ops(&ncs),
            vec![Op::Jsr, Op::Retn, Op::Nop, Op::MovSp(0), Op::Retn]
        );
        assert_eq!(jump_at(&ncs, 0), Some(2));
    }

    #[test]
    fn test_global_initializer_reads_earlier_global() {
        let program = Program::new(vec![
            global(DataType::Int, "a", Some(Expr::int(1))),
            global(DataType::Int, "b", Some(Expr::ident("a"))),
            main(vec![]),
        ]);
        let ncs = root().compile(&program).unwrap();
        assert_eq!(
            &ops(&ncs)[4..8],
            &[
                Op::RsAddI,
                Op::CpTopSp { offset: -2, size: 1 },
                Op::CpDownSp { offset: -2, size: 1 },
                Op::MovSp(-1),
            ]
        );
    }

    #[test]
    fn test_globals_bp_relative_after_savebp() {
        let program = Program::new(vec![
            global(DataType::Int, "a", None),
            global(DataType::Vector, "v", None),
            main(vec![Stmt::Expr(Expr::ident("a"))]),
        ]);
        let mut root = root();
        let mut ncs = Ncs::new();
        root.compile_into(&program, &mut ncs).unwrap();

        let a = root.resolve_global("a", -3).unwrap();
        assert_eq!(a.offset, -4);
        assert!(a.is_global);
        assert!(ops(&ncs).contains(&Op::CpTopBp { offset: -4, size: 1 }));
    }

    #[test]
    fn test_starting_conditional_trampoline() {
        let program = Program::new(vec![function(
            DataType::Int,
            "StartingConditional",
            vec![],
            vec![Stmt::Return(Some(Expr::ident("TRUE")))],
        )]);
        let ncs = root().compile(&program).unwrap();

        assert_eq!(
            ops(&ncs),
            vec![
                Op::RsAddI,
                Op::Jsr,
                Op::Retn,
                Op::Nop,
                Op::ConstI(1),
                Op::CpDownSp { offset: -2, size: 1 },
                Op::MovSp(-1),
                Op::MovSp(0),
                Op::Jmp,
                Op::Retn,
            ]
        );
        assert_eq!(jump_at(&ncs, 1), Some(3));
        assert_eq!(jump_at(&ncs, 8), Some(9));
    }

    #[test]
    fn test_main_preferred_over_starting_conditional() {
        let program = Program::new(vec![
            function(
                DataType::Int,
                "StartingConditional",
                vec![],
                vec![Stmt::Return(Some(Expr::int(0)))],
            ),
            main(vec![]),
        ]);
        let ncs = root().compile(&program).unwrap();
        assert_eq!(&ops(&ncs)[..2], &[Op::Jsr, Op::Retn]);
    }

    #[test]
    fn test_missing_entry_point_is_distinct() {
        let program = Program::new(vec![function(DataType::Void, "Helper", vec![], vec![])]);
        let err = root().compile(&program).unwrap_err();
        assert!(err.is_entry_point());
        assert!(!err.is_internal());
        assert!(matches!(err, CompileError::EntryPoint { .. }));
    }

    #[test]
    fn test_prototype_body_spliced_after_stub() {
        let program = Program::new(vec![
            TopLevel::Prototype(decl(DataType::Void, "Helper", vec![Param::new(DataType::Int, "n")])),
            main(vec![Stmt::Expr(Expr::call("Helper", vec![Expr::int(3)]))]),
            function(
                DataType::Void,
                "Helper",
                vec![Param::new(DataType::Int, "n")],
                vec![],
            ),
        ]);
        let mut root = root();
        let mut ncs = Ncs::new();
        root.compile_into(&program, &mut ncs).unwrap();

        assert_eq!(
            ops(&ncs),
            vec![
                Op::Jsr,
                Op::Retn,
                Op::Nop,
                Op::MovSp(-1),
                Op::Retn,
                Op::Nop,
                Op::ConstI(3),
                Op::Jsr,
                Op::MovSp(0),
                Op::Retn,
            ]
        );
        let helper = root.functions().defined("Helper").unwrap();
        assert_eq!(ncs.index_of(helper.entry), Some(2));
        assert_eq!(jump_at(&ncs, 7), Some(2));
        assert_eq!(jump_at(&ncs, 0), Some(5));
    }

    #[test]
    fn test_prototype_mismatch_names_position() {
        let program = Program::new(vec![
            TopLevel::Prototype(decl(DataType::Void, "F", vec![Param::new(DataType::Int, "a")])),
            function(DataType::Void, "F", vec![Param::new(DataType::Float, "a")], vec![]),
            main(vec![]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("parameter 1 ('a'): expected int, found float"));
    }

    #[test]
    fn test_redefinition_rejected() {
        let program = Program::new(vec![
            function(DataType::Void, "F", vec![], vec![]),
            function(DataType::Void, "F", vec![], vec![]),
            main(vec![]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("function 'F' is already defined"));
    }

    #[test]
    fn test_prototype_after_definition_rejected() {
        let program = Program::new(vec![
            function(DataType::Void, "F", vec![], vec![]),
            TopLevel::Prototype(decl(DataType::Void, "F", vec![])),
            main(vec![]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("'F' is already declared"));
    }

    #[test]
    fn test_called_prototype_never_defined() {
        let program = Program::new(vec![
            TopLevel::Prototype(decl(DataType::Void, "Later", vec![])),
            main(vec![Stmt::Expr(Expr::call("Later", vec![]))]),
        ]);
        let err = root().compile(&program).unwrap_err();
        assert!(!err.is_entry_point());
        assert!(err.to_string().contains("never defined: Later"));
    }

    #[test]
    fn test_call_fills_defaults_and_returns_value() {
        let program = Program::new(vec![
            function(
                DataType::Int,
                "Add",
                vec![
                    Param::new(DataType::Int, "a"),
                    Param::new(DataType::Int, "b").with_default(Expr::int(2)),
                ],
                vec![Stmt::Return(Some(Expr::binary(
                    BinaryOp::Add,
                    Expr::ident("a"),
                    Expr::ident("b"),
                )))],
            ),
            main(vec![Stmt::Expr(Expr::call("Add", vec![Expr::int(1)]))]),
        ]);
        let ncs = root().compile(&program).unwrap();

        assert_eq!(
            ops(&ncs),
            vec![
                Op::Jsr,
                Op::Retn,
                Op::Nop,
                Op::CpTopSp { offset: -2, size: 1 },
                Op::CpTopSp { offset: -2, size: 1 },
                Op::AddII,
                Op::CpDownSp { offset: -4, size: 1 },
                Op::MovSp(-1),
                Op::MovSp(-2),
                Op::Jmp,
                Op::Retn,
                Op::Nop,
                Op::RsAddI,
                Op::ConstI(1),
                Op::ConstI(2),
                Op::Jsr,
                Op::MovSp(-1),
                Op::MovSp(0),
                Op::Retn,
            ]
        );
        assert_eq!(jump_at(&ncs, 15), Some(2));
        assert_eq!(jump_at(&ncs, 9), Some(10));
    }

    #[test]
    fn test_missing_required_argument() {
        let program = Program::new(vec![
            function(DataType::Void, "F", vec![Param::new(DataType::Int, "nCount")], vec![]),
            main(vec![Stmt::Expr(Expr::call("F", vec![]))]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("missing required arguments: nCount"));
    }

    #[test]
    fn test_engine_call_from_main() {
        let program = Program::new(vec![main(vec![Stmt::Expr(Expr::call(
            "PrintInteger",
            vec![Expr::int(4)],
        ))])]);
        let ncs = root().compile(&program).unwrap();
        assert_eq!(
            &ops(&ncs)[3..5],
            &[Op::ConstI(4), Op::Action { routine: 0, argc: 1 }]
        );
    }

    #[test]
    fn test_delayed_command_is_deferred() {
        let program = Program::new(vec![main(vec![Stmt::Expr(Expr::call(
            "DelayCommand",
            vec![Expr::float(1.0), Expr::call("PrintInteger", vec![Expr::int(1)])],
        ))])]);
        let ncs = root().compile(&program).unwrap();

        assert_eq!(
            ops(&ncs),
            vec![
                Op::Jsr,
                Op::Retn,
                Op::Nop,
                Op::ConstF(1.0),
                Op::StoreState { globals: 0, locals: 1 },
                Op::Jmp,
                Op::ConstI(1),
                Op::Action { routine: 0, argc: 1 },
                Op::Retn,
                Op::Nop,
                Op::Action { routine: 1, argc: 2 },
                Op::MovSp(0),
                Op::Retn,
            ]
        );
        assert_eq!(jump_at(&ncs, 5), Some(9));
    }

    #[test]
    fn test_delayed_command_snapshots_globals_and_locals() {
        let program = Program::new(vec![
            global(DataType::Int, "g", None),
            main(vec![
                Stmt::Declare {
                    ty: DataType::Int,
                    declarators: vec![Declarator::new("n", None)],
                },
                Stmt::Expr(Expr::call(
                    "DelayCommand",
                    vec![Expr::float(1.0), Expr::call("PrintInteger", vec![Expr::ident("n")])],
                )),
            ]),
        ]);
        let ncs = root().compile(&program).unwrap();

        assert_eq!(
            &ops(&ncs)[5..],
            &[
                Op::RsAddI,
                Op::ConstF(1.0),
                Op::StoreState { globals: 1, locals: 2 },
                Op::Jmp,
                Op::CpTopSp { offset: -2, size: 1 },
                Op::Action { routine: 0, argc: 1 },
                Op::Retn,
                Op::Nop,
                Op::Action { routine: 1, argc: 2 },
                Op::MovSp(-1),
                Op::Retn,
            ]
        );
        assert_eq!(jump_at(&ncs, 8), Some(12));
    }

    #[test]
    fn test_script_function_cannot_take_action() {
        let program = Program::new(vec![
            function(DataType::Void, "F", vec![Param::new(DataType::Action, "a")], vec![]),
            main(vec![]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("'a' cannot have type action"));
    }

    #[test]
    fn test_vector_return_and_call() {
        let program = Program::new(vec![
            function(
                DataType::Vector,
                "V",
                vec![Param::new(DataType::Int, "n")],
                vec![Stmt::Return(Some(Expr::Literal(Value::Vector([1.0, 2.0, 3.0]))))],
            ),
            main(vec![
                Stmt::Declare {
                    ty: DataType::Int,
                    declarators: vec![Declarator::new("k", Some(Expr::int(2)))],
                },
                Stmt::Declare {
                    ty: DataType::Vector,
                    declarators: vec![Declarator::new("v", Some(Expr::call("V", vec![Expr::ident("k")])))],
                },
            ]),
        ]);
        let ncs = root().compile(&program).unwrap();

        assert_eq!(
            ops(&ncs),
            vec![
                Op::Jsr,
                Op::Retn,
                // V
                Op::Nop,
                Op::ConstF(1.0),
                Op::ConstF(2.0),
                Op::ConstF(3.0),
                Op::CpDownSp { offset: -7, size: 3 },
                Op::MovSp(-3),
                Op::MovSp(-1),
                Op::Jmp,
                Op::Retn,
                // main
                Op::Nop,
                Op::RsAddI,
                Op::ConstI(2),
                Op::CpDownSp { offset: -2, size: 1 },
                Op::MovSp(-1),
                Op::RsAddF,
                Op::RsAddF,
                Op::RsAddF,
                Op::RsAddF,
                Op::RsAddF,
                Op::RsAddF,
                Op::CpTopSp { offset: -7, size: 1 },
                Op::Jsr,
                Op::CpDownSp { offset: -6, size: 3 },
                Op::MovSp(-3),
                Op::MovSp(-4),
                Op::Retn,
            ]
        );
        assert_eq!(jump_at(&ncs, 0), Some(11));
        assert_eq!(jump_at(&ncs, 9), Some(10));
        assert_eq!(jump_at(&ncs, 23), Some(2));
    }

    #[test]
    fn test_struct_return_and_call() {
        let pair = DataType::Struct("Pair".into());
        let declare_pair = |name: &str, init: Option<Expr>| Stmt::Declare {
            ty: pair.clone(),
            declarators: vec![Declarator::new(name, init)],
        };
        let program = Program::new(vec![
            TopLevel::Struct(StructDef {
                name: "Pair".into(),
                members: vec![
                    StructMember {
                        ty: DataType::Int,
                        name: "a".into(),
                    },
                    StructMember {
                        ty: DataType::Float,
                        name: "b".into(),
                    },
                ],
            }),
            function(
                pair.clone(),
                "MakePair",
                vec![],
                vec![declare_pair("p", None), Stmt::Return(Some(Expr::ident("p")))],
            ),
            main(vec![declare_pair("q", Some(Expr::call("MakePair", vec![])))]),
        ]);
        let ncs = root().compile(&program).unwrap();

        assert_eq!(
            ops(&ncs),
            vec![
                Op::Jsr,
                Op::Retn,
                // MakePair
                Op::Nop,
                Op::RsAddI,
                Op::RsAddF,
                Op::CpTopSp { offset: -2, size: 2 },
                Op::CpDownSp { offset: -6, size: 2 },
                Op::MovSp(-2),
                Op::MovSp(-2),
                Op::Jmp,
                Op::Retn,
                // main
                Op::Nop,
                Op::RsAddI,
                Op::RsAddF,
                Op::RsAddI,
                Op::RsAddF,
                Op::Jsr,
                Op::CpDownSp { offset: -4, size: 2 },
                Op::MovSp(-2),
                Op::MovSp(-2),
                Op::Retn,
            ]
        );
        assert_eq!(jump_at(&ncs, 16), Some(2));
    }

    #[test]
    fn test_direct_recursion_needs_prototype() {
        let program = Program::new(vec![
            function(
                DataType::Void,
                "Loop",
                vec![],
                vec![Stmt::Expr(Expr::call("Loop", vec![]))],
            ),
            main(vec![]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("undefined function 'Loop'"));

        let with_prototype = Program::new(vec![
            TopLevel::Prototype(decl(DataType::Void, "Loop", vec![])),
            function(
                DataType::Void,
                "Loop",
                vec![],
                vec![Stmt::Expr(Expr::call("Loop", vec![]))],
            ),
            main(vec![]),
        ]);
        assert!(root().compile(&with_prototype).is_ok());
    }

    #[test]
    fn test_duplicate_parameter_names() {
        let program = Program::new(vec![
            function(
                DataType::Void,
                "F",
                vec![Param::new(DataType::Int, "a"), Param::new(DataType::Float, "a")],
                vec![],
            ),
            main(vec![]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("'a' is already declared"));
    }

    #[test]
    fn test_const_global_cannot_be_assigned() {
        let program = Program::new(vec![
            TopLevel::Global(GlobalVar {
                is_const: true,
                ty: DataType::Int,
                name: "K".into(),
                init: Some(Expr::int(3)),
            }),
            main(vec![Stmt::Expr(Expr::assign(FieldAccess::new("K"), Expr::int(4)))]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("cannot assign to const variable 'K'"));
    }

    #[test]
    fn test_const_global_needs_initializer() {
        let program = Program::new(vec![
            TopLevel::Global(GlobalVar {
                is_const: true,
                ty: DataType::Int,
                name: "K".into(),
                init: None,
            }),
            main(vec![]),
        ]);
        assert!(root().compile(&program).is_err());
    }

    #[test]
    fn test_duplicate_global() {
        let program = Program::new(vec![
            global(DataType::Int, "n", None),
            global(DataType::Float, "n", None),
            main(vec![]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("global 'n' is already declared"));
    }

    #[test]
    fn test_undefined_identifier_lists_globals() {
        let program = Program::new(vec![
            global(DataType::Int, "nAlpha", None),
            global(DataType::Int, "nBeta", None),
            main(vec![Stmt::Expr(Expr::ident("nGamma"))]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("undefined identifier 'nGamma'"));
        assert!(msg.contains("nAlpha, nBeta"));
    }

    #[test]
    fn test_struct_global_reserved_member_wise() {
        let program = Program::new(vec![
            TopLevel::Struct(StructDef {
                name: "Pair".into(),
                members: vec![
                    StructMember {
                        ty: DataType::Int,
                        name: "a".into(),
                    },
                    StructMember {
                        ty: DataType::String,
                        name: "b".into(),
                    },
                ],
            }),
            global(DataType::Struct("Pair".into()), "p", None),
            main(vec![]),
        ]);
        let ncs = root().compile(&program).unwrap();
        assert_eq!(&ops(&ncs)[..3], &[Op::RsAddI, Op::RsAddS, Op::SaveBp]);
    }

    #[test]
    fn test_unknown_struct_parameter() {
        let program = Program::new(vec![
            function(
                DataType::Void,
                "F",
                vec![Param::new(DataType::Struct("Ghost".into()), "g")],
                vec![],
            ),
            main(vec![]),
        ]);
        let msg = root().compile(&program).unwrap_err().to_string();
        assert!(msg.contains("unknown struct 'Ghost'"));
    }

    #[test]
    fn test_includes_expand_last_first_and_once() {
        let loader = IncludeLoader::new(LineParser)
            .with_library("inc_a", "#include \"inc_b\"\nint nA = 1;")
            .with_library("inc_b", "int nB = 2;");
        let program = Program::new(vec![
            TopLevel::Include("inc_a".to_string()),
            TopLevel::Include("inc_b".to_string()),
            main(vec![]),
        ]);
        let mut root = root().with_includes(loader);
        let mut ncs = Ncs::new();
        root.compile_into(&program, &mut ncs).unwrap();

        // inc_b is expanded first; inc_a's nested include of it is skipped
        assert_eq!(
            &ops(&ncs)[..9],
            &[
                Op::RsAddI,
                Op::ConstI(1),
                Op::CpDownSp { offset: -2, size: 1 },
                Op::MovSp(-1),
                Op::RsAddI,
                Op::ConstI(2),
                Op::CpDownSp { offset: -2, size: 1 },
                Op::MovSp(-1),
                Op::SaveBp,
            ]
        );
        assert_eq!(root.resolve_global("nA", 0).unwrap().offset, -2);
    }

    #[test]
    fn test_include_without_loader() {
        let program = Program::new(vec![TopLevel::Include("nw_i0_spells".to_string()), main(vec![])]);
        let err = root().compile(&program).unwrap_err();
        assert!(matches!(err, CompileError::MissingInclude { .. }));
    }

    #[test]
    fn test_trace_listing_option_does_not_change_output() {
        let program = Program::new(vec![main(vec![])]);
        let options = CompileOptions {
            trace_listing: true,
            ..CompileOptions::default()
        };
        let traced = CodeRoot::new(defs(), options).compile(&program).unwrap();
        let plain = root().compile(&program).unwrap();
        assert_eq!(ops(&traced), ops(&plain));
    }
}
