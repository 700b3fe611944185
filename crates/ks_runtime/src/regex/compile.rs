//! Node tree to backtracking program.

use smallvec::SmallVec;

use super::class::ByteClass;
use super::parse::{Ast, Node};
use super::{MAX_PROGRAM_LEN, PatternError, PatternErrorKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Inst {
    Byte(u8),
    Class(usize),
    Any,
    Start,
    End,
    /// Try `first`, then `second`. `id` indexes the visited table.
    Split {
        first: usize,
        second: usize,
        id: usize,
    },
    Jmp(usize),
    Save(usize),
    Match,
}

#[derive(Debug)]
pub(crate) struct Program {
    pub(crate) insts: Vec<Inst>,
    pub(crate) classes: Vec<ByteClass>,
    pub(crate) splits: usize,
    /// Two per group, group 0 included.
    pub(crate) slots: usize,
}

pub(crate) fn compile(ast: &Ast) -> Result<Program, PatternError> {
    let mut c = Compiler {
        insts: Vec::new(),
        classes: Vec::new(),
        splits: 0,
    };
    c.emit(Inst::Save(0))?;
    c.node(&ast.root)?;
    c.emit(Inst::Save(1))?;
    c.emit(Inst::Match)?;
    Ok(Program {
        insts: c.insts,
        classes: c.classes,
        splits: c.splits,
        slots: 2 * (ast.groups + 1),
    })
}

struct Compiler {
    insts: Vec<Inst>,
    classes: Vec<ByteClass>,
    splits: usize,
}

impl Compiler {
    #[inline]
    fn pc(&self) -> usize {
        self.insts.len()
    }

    fn emit(&mut self, inst: Inst) -> Result<usize, PatternError> {
        if self.insts.len() >= MAX_PROGRAM_LEN {
            return Err(PatternError {
                offset: 0,
                kind: PatternErrorKind::TooLarge,
            });
        }
        self.insts.push(inst);
        Ok(self.insts.len() - 1)
    }

    /// Emits a split whose targets are filled in by `patch_split`.
    fn emit_split(&mut self) -> Result<usize, PatternError> {
        let id = self.splits;
        self.splits += 1;
        self.emit(Inst::Split {
            first: 0,
            second: 0,
            id,
        })
    }

    fn patch_split(&mut self, at: usize, body: usize, out: usize, greedy: bool) {
        if let Inst::Split { first, second, .. } = &mut self.insts[at] {
            (*first, *second) = if greedy { (body, out) } else { (out, body) };
        }
    }

    fn node(&mut self, node: &Node) -> Result<(), PatternError> {
        match node {
            Node::Empty => {}
            Node::Byte(b) => {
                self.emit(Inst::Byte(*b))?;
            }
            Node::Class(class) => {
                let idx = match self.classes.iter().position(|c| c == class) {
                    Some(idx) => idx,
                    None => {
                        self.classes.push(*class);
                        self.classes.len() - 1
                    }
                };
                self.emit(Inst::Class(idx))?;
            }
            Node::Any => {
                self.emit(Inst::Any)?;
            }
            Node::Start => {
                self.emit(Inst::Start)?;
            }
            Node::End => {
                self.emit(Inst::End)?;
            }
            Node::Group { index, inner } => {
                self.emit(Inst::Save(2 * index))?;
                self.node(inner)?;
                self.emit(Inst::Save(2 * index + 1))?;
            }
            Node::Concat(items) => {
                for item in items {
                    self.node(item)?;
                }
            }
            Node::Alt(branches) => self.alternation(branches)?,
            Node::Repeat {
                inner,
                min,
                max,
                greedy,
            } => self.repeat(inner, *min, *max, *greedy)?,
        }
        Ok(())
    }

    fn alternation(&mut self, branches: &[Node]) -> Result<(), PatternError> {
        let mut exits: SmallVec<[usize; 4]> = SmallVec::with_capacity(branches.len());
        let last = branches.len() - 1;
        for (i, branch) in branches.iter().enumerate() {
            if i == last {
                self.node(branch)?;
                break;
            }
            let split = self.emit_split()?;
            self.node(branch)?;
            exits.push(self.emit(Inst::Jmp(0))?);
            let next = self.pc();
            self.patch_split(split, split + 1, next, true);
        }
        let end = self.pc();
        for at in exits {
            self.insts[at] = Inst::Jmp(end);
        }
        Ok(())
    }

    fn repeat(&mut self, inner: &Node, min: u32, max: Option<u32>, greedy: bool) -> Result<(), PatternError> {
        for _ in 0..min {
            self.node(inner)?;
        }
        match max {
            None => {
                let split = self.emit_split()?;
                self.node(inner)?;
                self.emit(Inst::Jmp(split))?;
                let out = self.pc();
                self.patch_split(split, split + 1, out, greedy);
            }
            Some(max) => {
                let mut holes: SmallVec<[usize; 8]> = SmallVec::with_capacity((max - min) as usize);
                for _ in min..max {
                    holes.push(self.emit_split()?);
                    self.node(inner)?;
                }
                let out = self.pc();
                for at in holes {
                    self.patch_split(at, at + 1, out, greedy);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::parse::parse;

    fn program(src: &str) -> Program {
        compile(&parse(src.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn star_loops_back_to_its_split() {
        let p = program("a*");
        assert_eq!(
            p.insts,
            vec![
                Inst::Save(0),
                Inst::Split { first: 2, second: 4, id: 0 },
                Inst::Byte(b'a'),
                Inst::Jmp(1),
                Inst::Save(1),
                Inst::Match,
            ]
        );
        assert_eq!(p.slots, 2);
    }

    #[test]
    fn lazy_prefers_exit() {
        let p = program("a??");
        assert_eq!(p.insts[1], Inst::Split { first: 3, second: 2, id: 0 });
    }

    #[test]
    fn counted_repeat_expands() {
        let p = program("a{2,4}");
        let bytes = p.insts.iter().filter(|i| matches!(i, Inst::Byte(b'a'))).count();
        assert_eq!(bytes, 4);
        assert_eq!(p.splits, 2);
    }

    #[test]
    fn classes_are_shared() {
        let p = program(r"\d\d[0-9]");
        assert_eq!(p.classes.len(), 1);
    }

    #[test]
    fn oversized_programs_are_rejected() {
        let err = compile(&parse(b"(a{1000}){1000}").unwrap()).unwrap_err();
        assert_eq!(err.kind, PatternErrorKind::TooLarge);
    }
}
