use std::collections::BTreeMap;

use slab::Slab;
use thiserror::Error;

use crate::instr::{Instr, Offset};

const UNBOUND: usize = usize::MAX;

/// A handle to a position in an instruction sequence under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

impl From<Label> for usize {
    #[inline]
    fn from(label: Label) -> usize {
        label.0 as usize
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// An instruction sequence whose branches refer to labels instead of byte offsets.
///
/// Labels are bound to instruction positions, so code can be inserted anywhere
/// without invalidating them. Offsets are only computed by [`CodeBuilder::into_code`].
#[derive(Debug, Default, Clone)]
pub struct CodeBuilder {
    code: Vec<Instr<Label>>,
    labels: Slab<usize>,
}

impl CodeBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes an assembled sequence: offsets become labels and short forms are expanded.
    pub fn from_code(code: &[Instr]) -> Result<Self, CodeError> {
        let mut starts = BTreeMap::new();
        let mut offset = 0i64;
        for (pos, instr) in code.iter().enumerate() {
            starts.insert(offset, pos);
            offset += i64::from(instr.size());
        }
        starts.insert(offset, code.len());

        let mut builder = Self::new();
        let mut targets: BTreeMap<usize, Label> = BTreeMap::new();
        let mut start = 0i64;
        for instr in code {
            let size = instr.size();
            let instr = instr
                .clone()
                .map_labels(|offset| {
                    let pos = *starts.get(&(start + i64::from(i32::from(offset))))?;
                    let label = *targets.entry(pos).or_insert_with(|| {
                        let idx = builder.labels.insert(pos);
                        Label(idx as u32)
                    });
                    Some(label)
                })
                .ok_or_else(|| CodeError::InvalidBranchTarget {
                    offset: start as u32,
                })?;
            builder.code.push(instr.expanded());
            start += i64::from(size);
        }
        Ok(builder)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    #[inline]
    pub fn code(&self) -> &[Instr<Label>] {
        &self.code
    }

    #[inline]
    pub fn emit(&mut self, instr: Instr<Label>) {
        self.code.push(instr);
    }

    pub fn new_label(&mut self) -> Label {
        Label(self.labels.insert(UNBOUND) as u32)
    }

    /// Binds the label to the next emitted instruction.
    #[inline]
    pub fn mark_label(&mut self, label: Label) {
        self.labels[usize::from(label)] = self.code.len();
    }

    /// Inserts another sequence before every instruction of this one.
    pub fn prepend(&mut self, block: CodeBuilder) {
        let shift = block.code.len();
        for (_, pos) in self.labels.iter_mut() {
            if *pos != UNBOUND {
                *pos += shift;
            }
        }

        let mut remap = Vec::with_capacity(block.labels.capacity());
        remap.resize(block.labels.capacity(), None);
        for (idx, &pos) in block.labels.iter() {
            remap[idx] = Some(Label(self.labels.insert(pos) as u32));
        }

        let mut code = Vec::with_capacity(block.code.len() + self.code.len());
        code.extend(
            block
                .code
                .into_iter()
                .filter_map(|instr| instr.map_labels(|label| remap[usize::from(label)])),
        );
        code.append(&mut self.code);
        self.code = code;
    }

    /// Resolves labels to offsets, picking short forms wherever the operand fits.
    ///
    /// Branches start out short and are widened one round at a time until no
    /// distance changes, since widening one branch can push another out of range.
    pub fn into_code(self) -> Result<Vec<Instr>, CodeError> {
        let mut targets = Vec::with_capacity(self.code.len());
        for instr in &self.code {
            let target = match instr.branch_target() {
                Some(&label) => match self.labels.get(usize::from(label)) {
                    Some(&pos) if pos <= self.code.len() => Some(pos),
                    _ => return Err(CodeError::UnboundLabel(label)),
                },
                None => None,
            };
            targets.push(target);
        }

        let mut code: Vec<Instr<Label>> = self.code.into_iter().map(Instr::shortened).collect();
        let starts = loop {
            let starts = code_starts(&code);
            let mut changed = false;
            for (pos, instr) in code.iter_mut().enumerate() {
                let Some(target) = targets[pos] else {
                    continue;
                };
                let distance = starts[target] - starts[pos];
                let fits = i32::try_from(distance).is_ok_and(|d| Offset::from(d).fits_short());
                if instr.is_short_branch() && !fits {
                    *instr = instr.clone().expanded();
                    changed = true;
                }
            }
            if !changed {
                break starts;
            }
        };

        code.into_iter()
            .enumerate()
            .map(|(pos, instr)| {
                instr
                    .map_labels(|_| {
                        let distance = starts[targets[pos]?] - starts[pos];
                        Some(Offset::from(i32::try_from(distance).ok()?))
                    })
                    .ok_or(CodeError::LabelTooDistant)
            })
            .collect()
    }
}

/// Start offset of every instruction, followed by the end offset of the sequence.
fn code_starts<L>(code: &[Instr<L>]) -> Vec<i64> {
    let mut starts = Vec::with_capacity(code.len() + 1);
    let mut offset = 0;
    for instr in code {
        starts.push(offset);
        offset += i64::from(instr.size());
    }
    starts.push(offset);
    starts
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeError {
    #[error("label too distant")]
    LabelTooDistant,
    #[error("label {0} is not bound to an instruction")]
    UnboundLabel(Label),
    #[error("branch at offset {offset} does not target the start of an instruction")]
    InvalidBranchTarget { offset: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_forward_and_backward_branches() {
        let mut builder = CodeBuilder::new();
        let start = builder.new_label();
        let end = builder.new_label();
        builder.mark_label(start);
        builder.emit(Instr::LoadArg(0));
        builder.emit(Instr::JumpIfFalse(end));
        builder.emit(Instr::Jump(start));
        builder.mark_label(end);
        builder.emit(Instr::Return);

        let code = builder.into_code().unwrap();
        assert_eq!(
            code,
            vec![
                Instr::LoadArgShort(0),
                Instr::JumpIfFalseShort(Offset::from(4)),
                Instr::JumpShort(Offset::from(-4)),
                Instr::Return,
            ]
        );
    }

    #[test]
    fn widens_branches_that_do_not_fit() {
        let mut builder = CodeBuilder::new();
        let end = builder.new_label();
        builder.emit(Instr::Jump(end));
        for _ in 0..200 {
            builder.emit(Instr::Nop);
        }
        builder.mark_label(end);
        builder.emit(Instr::Return);

        let code = builder.into_code().unwrap();
        assert_eq!(code[0], Instr::Jump(Offset::from(205)));
    }

    #[test]
    fn short_branch_range_ends_at_127() {
        let jump_over = |nops: usize| {
            let mut builder = CodeBuilder::new();
            let end = builder.new_label();
            builder.emit(Instr::Jump(end));
            for _ in 0..nops {
                builder.emit(Instr::Nop);
            }
            builder.mark_label(end);
            builder.emit(Instr::Return);
            builder.into_code().unwrap().remove(0)
        };

        assert_eq!(jump_over(125), Instr::JumpShort(Offset::from(127)));
        assert_eq!(jump_over(126), Instr::Jump(Offset::from(131)));
    }

    #[test]
    fn round_trips_through_labels() {
        let code = vec![
            Instr::LoadArgShort(0),
            Instr::JumpIfTrue(Offset::from(6)),
            Instr::Null,
            Instr::Return,
        ];
        let builder = CodeBuilder::from_code(&code).unwrap();
        assert_eq!(builder.code()[0], Instr::LoadArg(0));
        assert!(matches!(builder.code()[1], Instr::JumpIfTrue(_)));

        let code = builder.into_code().unwrap();
        assert_eq!(code[1], Instr::JumpIfTrueShort(Offset::from(3)));
    }

    #[test]
    fn prepend_keeps_existing_targets() {
        let code = vec![
            Instr::JumpShort(Offset::from(3)),
            Instr::Nop,
            Instr::Return,
        ];
        let mut builder = CodeBuilder::from_code(&code).unwrap();
        let mut block = CodeBuilder::new();
        block.emit(Instr::LoadArg(0));
        block.emit(Instr::Pop);
        builder.prepend(block);

        let code = builder.into_code().unwrap();
        assert_eq!(
            code,
            vec![
                Instr::LoadArgShort(0),
                Instr::Pop,
                Instr::JumpShort(Offset::from(3)),
                Instr::Nop,
                Instr::Return,
            ]
        );
    }

    #[test]
    fn rejects_branch_into_instruction() {
        let code = vec![Instr::Jump(Offset::from(2)), Instr::LoadArg(1), Instr::Return];
        assert_eq!(
            CodeBuilder::from_code(&code).unwrap_err(),
            CodeError::InvalidBranchTarget { offset: 0 }
        );
    }

    #[test]
    fn rejects_unbound_label() {
        let mut builder = CodeBuilder::new();
        let label = builder.new_label();
        builder.emit(Instr::Jump(label));
        assert_eq!(builder.into_code().unwrap_err(), CodeError::UnboundLabel(label));
    }
}
