use crate::bytecode::Op;
use crate::bytecode::ir::{InsId, Instruction, Ncs};
use std::collections::HashMap;

/// Render an instruction stream one instruction per line.
///
/// Jump destinations are shown as indices, and every instruction that is
/// jumped to gets a `►` marker and a rule above it.
pub fn listing(ncs: &Ncs) -> String {
    let index: HashMap<InsId, usize> = ncs
        .instructions()
        .iter()
        .enumerate()
        .map(|(i, ins)| (ins.id, i))
        .collect();
    let targets = collect_jump_targets(ncs, &index);

    let mut output = String::new();
    output.push_str(&format!("=== NCS ({} instructions) ===\n", ncs.len()));
    for (ip, ins) in ncs.instructions().iter().enumerate() {
        let marked = targets.contains(&ip);
        if marked {
            output.push_str("      ┌──────────────────────────────────\n");
        }
        let marker = if marked { "► " } else { "  " };
        output.push_str(&format!("{:04} {}{}\n", ip, marker, format_instruction(ins, ip, &index)));
    }
    output
}

fn collect_jump_targets(ncs: &Ncs, index: &HashMap<InsId, usize>) -> Vec<usize> {
    let mut targets = Vec::new();
    for ins in ncs.instructions() {
        if let Some(target) = ins.jump.and_then(|id| index.get(&id)) {
            if !targets.contains(target) {
                targets.push(*target);
            }
        }
    }
    targets
}

fn format_instruction(ins: &Instruction, ip: usize, index: &HashMap<InsId, usize>) -> String {
    let name = ins.op.mnemonic();
    if ins.op.is_jump() {
        return match ins.jump.and_then(|id| index.get(&id)) {
            Some(&target) => {
                let direction = if target <= ip { "↑" } else { "↓" };
                format!("{:<11} {:04} {}", name, target, direction)
            }
            None => format!("{:<11} ????", name),
        };
    }

    match operands(&ins.op) {
        Some(operands) => format!("{:<11} {}", name, operands),
        None => name.to_string(),
    }
}

fn operands(op: &Op) -> Option<String> {
    let text = match op {
        Op::ConstI(n) | Op::ConstO(n) => n.to_string(),
        Op::ConstF(f) => format!("{:?}", f),
        Op::ConstS(s) => format!("{:?}", s),
        Op::CpDownSp { offset, size }
        | Op::CpTopSp { offset, size }
        | Op::CpDownBp { offset, size }
        | Op::CpTopBp { offset, size } => format!("{}, {}", offset, size),
        Op::MovSp(n) | Op::IncISp(n) | Op::DecISp(n) | Op::IncIBp(n) | Op::DecIBp(n) => n.to_string(),
        Op::EqualTT(size) | Op::NEqualTT(size) => size.to_string(),
        Op::Action { routine, argc } => format!("{}, {}", routine, argc),
        Op::StoreState { globals, locals } => format!("{}, {}", globals, locals),
        _ => return None,
    };
    Some(text)
}
