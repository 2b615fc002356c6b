use crate::bytecode::Op;
use crate::bytecode::compile::CodeRoot;
use crate::bytecode::compile_error::{CompileError, CompileResult};
use crate::bytecode::ir::{InsId, Instruction, Ncs};
use crate::bytecode::scope::BlockScope;
use crate::lang::data_type::DataType;
use crate::lang::identifier::Identifier;
use crate::lang::node::{Block, Declarator, Expr, Stmt, SwitchArm, SwitchLabel};

/// The function whose body is being compiled.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub name: &'a Identifier,
    pub return_type: &'a DataType,
    /// Shared `RETN` every `return` jumps to.
    pub retn: InsId,
}

/// Whether control can reach the statement after the one just compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Next,
    Returned,
}

impl CodeRoot {
    /// Compile a statement list into `block`, then pop the block's own
    /// slots. A `return` pops everything itself, so statements after it
    /// are dropped along with the trailing pop.
    pub(crate) fn compile_block(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        stmts: &[Stmt],
        frame: &Frame<'_>,
    ) -> CompileResult<Flow> {
        let mut flow = Flow::Next;
        for (i, stmt) in stmts.iter().enumerate() {
            flow = self.compile_stmt(ncs, block, stmt, frame)?;
            if flow == Flow::Returned {
                let skipped = stmts.len() - i - 1;
                if skipped > 0 {
                    tracing::warn!(function = %frame.name, skipped, "unreachable statements after return");
                }
                break;
            }
        }

        if flow == Flow::Next {
            let size = block.scope_size(self)?;
            ncs.add(Op::MovSp(-size));
        }
        self.check_balanced(block)?;
        Ok(flow)
    }

    fn check_balanced(&self, block: &BlockScope<'_>) -> CompileResult<()> {
        if block.temp_stack != 0 {
            return Err(CompileError::internal(format!(
                "temp stack is {} at end of block",
                block.temp_stack
            )));
        }
        Ok(())
    }

    pub(crate) fn compile_stmt(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        stmt: &Stmt,
        frame: &Frame<'_>,
    ) -> CompileResult<Flow> {
        match stmt {
            Stmt::Expr(expr) => self.compile_discarded(ncs, block, expr)?,

            Stmt::Declare { ty, declarators } => self.compile_declaration(ncs, block, ty, declarators)?,

            Stmt::Block(inner) => {
                let mut child = BlockScope::child(block);
                return self.compile_block(ncs, &mut child, &inner.stmts, frame);
            }

            Stmt::If {
                condition,
                then,
                otherwise,
            } => self.compile_if(ncs, block, condition, then, otherwise.as_ref(), frame)?,

            Stmt::While { condition, body } => {
                let start = ncs.add(Op::Nop);
                self.compile_condition(ncs, block, condition, "while")?;
                let end = ncs.detached(Op::Nop);
                ncs.add_jump(Op::Jz, end.id);
                block.temp_stack -= 1;

                let mut inner = BlockScope::child(block).with_targets(end.id, Some(start));
                self.compile_block(ncs, &mut inner, &body.stmts, frame)?;
                ncs.add_jump(Op::Jmp, start);
                ncs.push(end);
            }

            Stmt::DoWhile { body, condition } => {
                let start = ncs.add(Op::Nop);
                let end = ncs.detached(Op::Nop);
                let next = ncs.detached(Op::Nop);

                {
                    let mut inner = BlockScope::child(block).with_targets(end.id, Some(next.id));
                    self.compile_block(ncs, &mut inner, &body.stmts, frame)?;
                }
                ncs.push(next);

                self.compile_condition(ncs, block, condition, "do-while")?;
                ncs.add_jump(Op::Jnz, start);
                block.temp_stack -= 1;
                ncs.push(end);
            }

            Stmt::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.compile_discarded(ncs, block, init)?;
                }
                let start = ncs.add(Op::Nop);
                let end = ncs.detached(Op::Nop);
                let next = ncs.detached(Op::Nop);
                if let Some(condition) = condition {
                    self.compile_condition(ncs, block, condition, "for")?;
                    ncs.add_jump(Op::Jz, end.id);
                    block.temp_stack -= 1;
                }

                {
                    let mut inner = BlockScope::child(block).with_targets(end.id, Some(next.id));
                    self.compile_block(ncs, &mut inner, &body.stmts, frame)?;
                }
                ncs.push(next);
                if let Some(step) = step {
                    self.compile_discarded(ncs, block, step)?;
                }
                ncs.add_jump(Op::Jmp, start);
                ncs.push(end);
            }

            Stmt::Switch { value, arms } => self.compile_switch(ncs, block, value, arms, frame)?,

            Stmt::Break => {
                let (target, size) = block
                    .break_scope_size(self)?
                    .ok_or_else(|| CompileError::outside_loop("break"))?;
                ncs.add(Op::MovSp(-size));
                ncs.add_jump(Op::Jmp, target);
            }

            Stmt::Continue => {
                let (target, size) = block
                    .continue_scope_size(self)?
                    .ok_or_else(|| CompileError::outside_loop("continue"))?;
                ncs.add(Op::MovSp(-size));
                ncs.add_jump(Op::Jmp, target);
            }

            Stmt::Return(value) => {
                self.compile_return(ncs, block, value.as_ref(), frame)?;
                return Ok(Flow::Returned);
            }
        }
        Ok(Flow::Next)
    }

    /// Evaluate for side effects and pop the result.
    fn compile_discarded(&self, ncs: &mut Ncs, block: &mut BlockScope<'_>, expr: &Expr) -> CompileResult<()> {
        let ty = self.compile_expr(ncs, block, expr)?;
        let size = self.size_of(&ty)?;
        if size > 0 {
            ncs.add(Op::MovSp(-size));
        }
        block.temp_stack -= size;
        Ok(())
    }

    /// Push a condition; the caller's jump consumes it.
    fn compile_condition(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        condition: &Expr,
        keyword: &str,
    ) -> CompileResult<()> {
        let ty = self.compile_expr(ncs, block, condition)?;
        if ty != DataType::Int {
            return Err(CompileError::type_mismatch(
                format_args!("{} condition", keyword),
                &DataType::Int,
                &ty,
            ));
        }
        Ok(())
    }

    fn compile_declaration(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        ty: &DataType,
        declarators: &[Declarator],
    ) -> CompileResult<()> {
        for declarator in declarators {
            let name = &declarator.name;
            if !ty.is_storable() {
                return Err(CompileError::unstorable_variable(name, ty));
            }
            self.structs.check(ty)?;
            if block.local(name.label()).is_some() {
                return Err(CompileError::redeclaration(name));
            }

            self.structs.reserve(ncs, ty)?;
            block.declare_local(name.clone(), ty.clone(), self)?;

            if let Some(init) = &declarator.init {
                let actual = self.compile_expr(ncs, block, init)?;
                if &actual != ty {
                    return Err(CompileError::type_mismatch(
                        format_args!("initialization of '{}'", name),
                        ty,
                        &actual,
                    ));
                }
                let size = self.size_of(ty)?;
                let target = block.resolve(name.label(), self)?;
                ncs.add(Op::CpDownSp {
                    offset: target.offset,
                    size,
                });
                ncs.add(Op::MovSp(-size));
                block.temp_stack -= size;
            }
        }
        Ok(())
    }

    fn compile_if(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        condition: &Expr,
        then: &Block,
        otherwise: Option<&Block>,
        frame: &Frame<'_>,
    ) -> CompileResult<()> {
        self.compile_condition(ncs, block, condition, "if")?;
        let else_label = ncs.detached(Op::Nop);
        ncs.add_jump(Op::Jz, else_label.id);
        block.temp_stack -= 1;

        let mut then_block = BlockScope::child(block);
        self.compile_block(ncs, &mut then_block, &then.stmts, frame)?;

        match otherwise {
            Some(otherwise) => {
                let end = ncs.detached(Op::Nop);
                ncs.add_jump(Op::Jmp, end.id);
                ncs.push(else_label);
                let mut else_block = BlockScope::child(block);
                self.compile_block(ncs, &mut else_block, &otherwise.stmts, frame)?;
                ncs.push(end);
            }
            None => {
                ncs.push(else_label);
            }
        }
        Ok(())
    }

    /// The switch value stays on the stack for the whole statement, as a
    /// temporary of the enclosing block. Each `case` compares a copy of it
    /// and jumps into the arm; the arms share one breakable block.
    fn compile_switch(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        value: &Expr,
        arms: &[SwitchArm],
        frame: &Frame<'_>,
    ) -> CompileResult<()> {
        let ty = self.compile_expr(ncs, block, value)?;
        let equal = match ty {
            DataType::Int => Op::EqualII,
            DataType::String => Op::EqualSS,
            ref other => {
                return Err(CompileError::semantic(format!(
                    "cannot switch on a value of type {}; expected int or string",
                    other
                )));
            }
        };

        let end = ncs.detached(Op::Nop);
        let labels: Vec<Instruction> = arms.iter().map(|_| ncs.detached(Op::Nop)).collect();
        let mut default = None;

        for (arm, label) in arms.iter().zip(&labels) {
            for case in &arm.labels {
                match case {
                    SwitchLabel::Case(expr) => {
                        ncs.add(Op::CpTopSp { offset: -1, size: 1 });
                        block.temp_stack += 1;
                        let case_ty = self.compile_expr(ncs, block, expr)?;
                        if case_ty != ty {
                            return Err(CompileError::type_mismatch("case label", &ty, &case_ty));
                        }
                        ncs.add(equal.clone());
                        block.temp_stack -= 1;
                        ncs.add_jump(Op::Jnz, label.id);
                        block.temp_stack -= 1;
                    }
                    SwitchLabel::Default => {
                        if default.is_some() {
                            return Err(CompileError::semantic("switch has more than one default label"));
                        }
                        default = Some(label.id);
                    }
                }
            }
        }
        ncs.add_jump(Op::Jmp, default.unwrap_or(end.id));

        {
            let mut body = BlockScope::child(block).with_targets(end.id, None);
            for (arm, label) in arms.iter().zip(labels) {
                ncs.push(label);
                for stmt in &arm.body {
                    if let Stmt::Declare { declarators, .. } = stmt {
                        let name = declarators
                            .first()
                            .map(|d| d.name.clone())
                            .unwrap_or_else(|| Identifier::new("?"));
                        return Err(CompileError::declaration_in_switch_arm(&name));
                    }
                    if self.compile_stmt(ncs, &mut body, stmt, frame)? == Flow::Returned {
                        break;
                    }
                }
            }
            self.check_balanced(&body)?;
        }

        ncs.push(end);
        let size = self.size_of(&ty)?;
        ncs.add(Op::MovSp(-size));
        block.temp_stack -= size;
        Ok(())
    }

    /// Move the value into the caller's reserved slot, pop every slot of
    /// the function, and jump to its `RETN`.
    fn compile_return(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        value: Option<&Expr>,
        frame: &Frame<'_>,
    ) -> CompileResult<()> {
        let scope = block.full_scope_size(self)?;
        let returned = match value {
            Some(expr) => self.compile_expr(ncs, block, expr)?,
            None => DataType::Void,
        };
        if &returned != frame.return_type {
            return Err(CompileError::type_mismatch(
                format_args!("return from '{}'", frame.name),
                frame.return_type,
                &returned,
            ));
        }

        let size = self.size_of(&returned)?;
        if size > 0 {
            ncs.add(Op::CpDownSp {
                offset: -(scope + 2 * size),
                size,
            });
            ncs.add(Op::MovSp(-size));
            block.temp_stack -= size;
        }
        ncs.add(Op::MovSp(-scope));
        ncs.add_jump(Op::Jmp, frame.retn);
        Ok(())
    }
}
