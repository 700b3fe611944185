//! Backtracking matcher.
//!
//! Runs the program depth-first with an explicit job stack. Every
//! `(split, position)` state is explored at most once: a state that failed
//! once fails again regardless of how it was reached, so the visited set
//! bounds the work to `splits * (len + 1)` and makes empty loops terminate.
//!
//! A `Searcher` lives for one top-level operation. Failed states stay
//! marked across successive searches, so `find_all` over a text pays for
//! each state once. Only the column at a match's end can hold states on
//! the successful path; it is cleared before the next search.
//!
//! The visited set is a dense bitmap while it fits in `MAX_VISITED_BYTES`.
//! Beyond that it becomes a hash set capped at `MAX_SPARSE_STATES`; a
//! search that exhausts the cap gives up and reports no match.

use ks_core::FastHashSet;

use super::compile::{Inst, Program};
use super::{MAX_SPARSE_STATES, MAX_VISITED_BYTES};

enum Job {
    Explore { pc: usize, pos: usize },
    Restore { slot: usize, old: Option<usize> },
}

enum Visited {
    Dense(Vec<u64>),
    Sparse(FastHashSet<usize>),
}

pub(crate) struct Searcher<'a> {
    prog: &'a Program,
    text: &'a [u8],
    visited: Visited,
    stack: Vec<Job>,
    budget: usize,
    exhausted: bool,
}

impl<'a> Searcher<'a> {
    pub(crate) fn new(prog: &'a Program, text: &'a [u8]) -> Self {
        let bits = prog.splits.saturating_mul(text.len() + 1);
        let visited = if bits / 8 <= MAX_VISITED_BYTES {
            Visited::Dense(vec![0; bits.div_ceil(64)])
        } else {
            log::debug!(
                "regex: {} splits over {} bytes, using a sparse visited set",
                prog.splits,
                text.len()
            );
            Visited::Sparse(FastHashSet::default())
        };
        Self {
            prog,
            text,
            visited,
            stack: Vec::new(),
            budget: MAX_SPARSE_STATES,
            exhausted: false,
        }
    }

    /// Leftmost-first search from `start`. On success `slots` holds the
    /// capture positions (group 0 in slots 0 and 1).
    pub(crate) fn search(&mut self, start: usize, slots: &mut [Option<usize>]) -> bool {
        debug_assert_eq!(slots.len(), self.prog.slots);
        if start > self.text.len() || self.exhausted {
            return false;
        }
        for at in start..=self.text.len() {
            if self.run(at, slots) {
                if let Some(end) = slots[1] {
                    self.forget(end);
                }
                return true;
            }
            if self.exhausted {
                log::warn!(
                    "regex: gave up after {} states on a {}-byte text",
                    self.budget,
                    self.text.len()
                );
                return false;
            }
        }
        false
    }

    /// Marks `(id, pos)`; false when it was already explored or the state
    /// budget is spent.
    #[inline]
    fn mark(&mut self, id: usize, pos: usize) -> bool {
        let bit = id * (self.text.len() + 1) + pos;
        match &mut self.visited {
            Visited::Dense(words) => {
                let (word, mask) = (bit / 64, 1u64 << (bit % 64));
                if words[word] & mask != 0 {
                    return false;
                }
                words[word] |= mask;
                true
            }
            Visited::Sparse(set) => {
                if set.len() >= self.budget {
                    self.exhausted = true;
                    return false;
                }
                set.insert(bit)
            }
        }
    }

    /// Unmarks every split at `pos`.
    fn forget(&mut self, pos: usize) {
        let positions = self.text.len() + 1;
        for id in 0..self.prog.splits {
            let bit = id * positions + pos;
            match &mut self.visited {
                Visited::Dense(words) => words[bit / 64] &= !(1u64 << (bit % 64)),
                Visited::Sparse(set) => {
                    set.remove(&bit);
                }
            }
        }
    }

    fn run(&mut self, at: usize, slots: &mut [Option<usize>]) -> bool {
        slots.fill(None);
        self.stack.clear();
        self.stack.push(Job::Explore { pc: 0, pos: at });
        while let Some(job) = self.stack.pop() {
            match job {
                Job::Restore { slot, old } => slots[slot] = old,
                Job::Explore { pc, pos } => {
                    if self.step(pc, pos, slots) {
                        return true;
                    }
                    if self.exhausted {
                        return false;
                    }
                }
            }
        }
        false
    }

    /// Follows one thread until it matches or dies, queueing alternatives.
    fn step(&mut self, mut pc: usize, mut pos: usize, slots: &mut [Option<usize>]) -> bool {
        let text = self.text;
        loop {
            match self.prog.insts[pc] {
                Inst::Byte(b) => {
                    if text.get(pos) != Some(&b) {
                        return false;
                    }
                    pc += 1;
                    pos += 1;
                }
                Inst::Class(idx) => match text.get(pos) {
                    Some(&c) if self.prog.classes[idx].contains(c) => {
                        pc += 1;
                        pos += 1;
                    }
                    _ => return false,
                },
                Inst::Any => match text.get(pos) {
                    Some(&c) if c != b'\n' => {
                        pc += 1;
                        pos += 1;
                    }
                    _ => return false,
                },
                Inst::Start => {
                    if pos != 0 {
                        return false;
                    }
                    pc += 1;
                }
                Inst::End => {
                    if pos != text.len() {
                        return false;
                    }
                    pc += 1;
                }
                Inst::Split { first, second, id } => {
                    if !self.mark(id, pos) {
                        return false;
                    }
                    self.stack.push(Job::Explore { pc: second, pos });
                    pc = first;
                }
                Inst::Jmp(target) => pc = target,
                Inst::Save(slot) => {
                    self.stack.push(Job::Restore {
                        slot,
                        old: slots[slot],
                    });
                    slots[slot] = Some(pos);
                    pc += 1;
                }
                Inst::Match => return true,
            }
        }
    }
}
