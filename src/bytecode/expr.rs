use crate::bytecode::Op;
use crate::bytecode::compile::CodeRoot;
use crate::bytecode::compile_error::{CompileError, CompileResult};
use crate::bytecode::ir::Ncs;
use crate::bytecode::operators;
use crate::bytecode::scope::{BlockScope, Resolved};
use crate::lang::data_type::DataType;
use crate::lang::identifier::Identifier;
use crate::lang::node::{AssignOp, BinaryOp, Expr, FieldAccess, Fix, StepOp, UnaryOp};
use crate::lang::value::Value;

const VECTOR_MEMBERS: [&str; 3] = ["x", "y", "z"];

// Every expression pushes its result and adds exactly the result's size to
// the block's temp stack. Whoever consumes the value takes it back off.
impl CodeRoot {
    pub(crate) fn compile_expr(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        expr: &Expr,
    ) -> CompileResult<DataType> {
        match expr {
            Expr::Literal(value) => {
                push_literal(ncs, value);
                let ty = value.data_type();
                block.temp_stack += self.size_of(&ty)?;
                Ok(ty)
            }

            Expr::Vector(parts) => {
                for (part, axis) in parts.iter().zip(VECTOR_MEMBERS) {
                    let ty = self.compile_expr(ncs, block, part)?;
                    if ty != DataType::Float {
                        return Err(CompileError::type_mismatch(
                            format_args!("vector component '{}'", axis),
                            &DataType::Float,
                            &ty,
                        ));
                    }
                }
                Ok(DataType::Vector)
            }

            Expr::Access(access) => self.compile_access(ncs, block, access),

            Expr::Assign { op, target, value } => match op.arithmetic() {
                None => self.compile_assign(ncs, block, target, value),
                Some(arithmetic) => self.compile_compound_assign(ncs, block, *op, arithmetic, target, value),
            },

            Expr::Binary { op, lhs, rhs } => self.compile_binary(ncs, block, *op, lhs, rhs),

            Expr::Unary { op, operand } => self.compile_unary(ncs, block, *op, operand),

            Expr::Step { op, fix, target } => self.compile_step(ncs, block, *op, *fix, target),

            Expr::Call { name, args } => self.compile_call(ncs, block, name, args),
        }
    }

    /// Locate a variable and walk its member chain.
    pub(crate) fn resolve_access(&self, block: &BlockScope<'_>, access: &FieldAccess) -> CompileResult<Resolved> {
        let mut resolved = block.resolve(access.head.label(), self)?;
        for member in &access.members {
            match &resolved.ty {
                DataType::Vector => {
                    let index = VECTOR_MEMBERS
                        .iter()
                        .position(|axis| *axis == member.label())
                        .ok_or_else(|| {
                            let available: Vec<Identifier> =
                                VECTOR_MEMBERS.iter().map(|axis| Identifier::new(axis)).collect();
                            CompileError::unknown_member("vector", member, &available)
                        })?;
                    resolved.offset += index as i32;
                    resolved.ty = DataType::Float;
                }
                DataType::Struct(name) => {
                    let offset = self.structs.member_offset(name, member.label())?;
                    let ty = self.structs.member_type(name, member.label())?.clone();
                    resolved.offset += offset;
                    resolved.ty = ty;
                }
                other => return Err(CompileError::not_composite(access, other)),
            }
        }
        Ok(resolved)
    }

    fn compile_access(&self, ncs: &mut Ncs, block: &mut BlockScope<'_>, access: &FieldAccess) -> CompileResult<DataType> {
        if let Some(constant) = access
            .as_identifier()
            .and_then(|name| self.defs.constant(name.label()))
        {
            push_literal(ncs, &constant.value);
            block.temp_stack += self.size_of(&constant.ty)?;
            return Ok(constant.ty.clone());
        }

        let resolved = self.resolve_access(block, access)?;
        let size = self.size_of(&resolved.ty)?;
        let op = if resolved.is_global {
            Op::CpTopBp {
                offset: resolved.offset,
                size,
            }
        } else {
            Op::CpTopSp {
                offset: resolved.offset,
                size,
            }
        };
        ncs.add(op);
        block.temp_stack += size;
        Ok(resolved.ty)
    }

    fn compile_assign(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        target: &FieldAccess,
        value: &Expr,
    ) -> CompileResult<DataType> {
        let actual = self.compile_expr(ncs, block, value)?;
        // resolved after the value is pushed, so the offset already skips it
        let resolved = self.resolve_access(block, target)?;
        if resolved.is_const {
            return Err(CompileError::const_assignment(target));
        }
        if actual != resolved.ty {
            return Err(CompileError::type_mismatch(
                format_args!("assignment to '{}'", target),
                &resolved.ty,
                &actual,
            ));
        }
        let size = self.size_of(&resolved.ty)?;
        ncs.add(copy_down(&resolved, size));
        Ok(actual)
    }

    fn compile_compound_assign(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        op: AssignOp,
        arithmetic: BinaryOp,
        target: &FieldAccess,
        value: &Expr,
    ) -> CompileResult<DataType> {
        let resolved = self.resolve_access(block, target)?;
        if resolved.is_const {
            return Err(CompileError::const_assignment(target));
        }
        let target_size = self.size_of(&resolved.ty)?;
        ncs.add(copy_top(&resolved, target_size));
        block.temp_stack += target_size;

        let actual = self.compile_expr(ncs, block, value)?;
        let mapping = operators::lookup_binary(arithmetic, &resolved.ty, &actual)
            .filter(|m| m.result == resolved.ty)
            .ok_or_else(|| {
                let symbol = match op {
                    AssignOp::Add => "+=",
                    AssignOp::Sub => "-=",
                    AssignOp::Mul => "*=",
                    AssignOp::Div => "/=",
                    AssignOp::Set => "=",
                };
                CompileError::no_operator(
                    symbol,
                    &[&resolved.ty, &actual],
                    &operators::describe_binary(arithmetic),
                )
            })?;
        ncs.add(mapping.op.clone());
        block.temp_stack -= target_size + self.size_of(&actual)?;
        block.temp_stack += target_size;

        let updated = self.resolve_access(block, target)?;
        ncs.add(copy_down(&updated, target_size));
        Ok(resolved.ty)
    }

    fn compile_binary(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> CompileResult<DataType> {
        let left = self.compile_expr(ncs, block, lhs)?;
        let right = self.compile_expr(ncs, block, rhs)?;
        let left_size = self.size_of(&left)?;
        let right_size = self.size_of(&right)?;

        let (instruction, result) =
            match operators::composite_comparison(op, &left, &right, left_size) {
                Some(instruction) => (instruction, DataType::Int),
                None => {
                    let mapping = operators::lookup_binary(op, &left, &right).ok_or_else(|| {
                        CompileError::no_operator(
                            op.symbol(),
                            &[&left, &right],
                            &operators::describe_binary(op),
                        )
                    })?;
                    (mapping.op.clone(), mapping.result.clone())
                }
            };

        ncs.add(instruction);
        block.temp_stack -= left_size + right_size;
        block.temp_stack += self.size_of(&result)?;
        Ok(result)
    }

    fn compile_unary(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        op: UnaryOp,
        operand: &Expr,
    ) -> CompileResult<DataType> {
        let ty = self.compile_expr(ncs, block, operand)?;
        let mapping = operators::lookup_unary(op, &ty).ok_or_else(|| {
            CompileError::no_operator(op.symbol(), &[&ty], &operators::describe_unary(op))
        })?;
        ncs.add(mapping.op.clone());
        Ok(ty)
    }

    /// `++`/`--` adjust the variable in place; the value pushed is the new
    /// one for prefix and the old one for postfix.
    fn compile_step(
        &self,
        ncs: &mut Ncs,
        block: &mut BlockScope<'_>,
        op: StepOp,
        fix: Fix,
        target: &FieldAccess,
    ) -> CompileResult<DataType> {
        let resolved = self.resolve_access(block, target)?;
        if resolved.is_const {
            return Err(CompileError::const_assignment(target));
        }
        if resolved.ty != DataType::Int {
            let symbol = match op {
                StepOp::Inc => "++",
                StepOp::Dec => "--",
            };
            return Err(CompileError::no_operator(symbol, &[&resolved.ty], &[format!("{}int", symbol)]));
        }

        let offset = resolved.offset;
        let step = |offset: i32| match (op, resolved.is_global) {
            (StepOp::Inc, false) => Op::IncISp(offset),
            (StepOp::Dec, false) => Op::DecISp(offset),
            (StepOp::Inc, true) => Op::IncIBp(offset),
            (StepOp::Dec, true) => Op::DecIBp(offset),
        };
        match fix {
            Fix::Prefix => {
                ncs.add(step(offset));
                ncs.add(copy_top(&resolved, 1));
            }
            Fix::Postfix => {
                ncs.add(copy_top(&resolved, 1));
                // the copy just pushed moves SP-relative slots down by one
                let shifted = if resolved.is_global { offset } else { offset - 1 };
                ncs.add(step(shifted));
            }
        }
        block.temp_stack += 1;
        Ok(DataType::Int)
    }
}

fn push_literal(ncs: &mut Ncs, value: &Value) {
    match value {
        Value::Int(n) => {
            ncs.add(Op::ConstI(*n));
        }
        Value::Float(n) => {
            ncs.add(Op::ConstF(*n));
        }
        Value::String(s) => {
            ncs.add(Op::ConstS(s.clone()));
        }
        Value::Object(n) => {
            ncs.add(Op::ConstO(*n));
        }
        Value::Vector(parts) => {
            for part in parts {
                ncs.add(Op::ConstF(*part));
            }
        }
    }
}

fn copy_top(resolved: &Resolved, size: i32) -> Op {
    if resolved.is_global {
        Op::CpTopBp {
            offset: resolved.offset,
            size,
        }
    } else {
        Op::CpTopSp {
            offset: resolved.offset,
            size,
        }
    }
}

pub(crate) fn copy_down(resolved: &Resolved, size: i32) -> Op {
    if resolved.is_global {
        Op::CpDownBp {
            offset: resolved.offset,
            size,
        }
    } else {
        Op::CpDownSp {
            offset: resolved.offset,
            size,
        }
    }
}
