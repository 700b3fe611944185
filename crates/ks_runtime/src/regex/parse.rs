//! Pattern source to node tree.

use super::class::ByteClass;
use super::{MAX_NESTING, MAX_REPEAT, PatternError, PatternErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Node {
    Empty,
    Byte(u8),
    Class(ByteClass),
    /// `.`: any byte but `\n`.
    Any,
    Start,
    End,
    Group {
        index: usize,
        inner: Box<Node>,
    },
    Concat(Vec<Node>),
    Alt(Vec<Node>),
    Repeat {
        inner: Box<Node>,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    },
}

#[derive(Debug)]
pub(crate) struct Ast {
    pub(crate) root: Node,
    pub(crate) groups: usize,
}

enum Item {
    Byte(u8),
    Class(ByteClass),
}

pub(crate) fn parse(src: &[u8]) -> Result<Ast, PatternError> {
    let mut p = Parser {
        src,
        pos: 0,
        groups: 0,
        depth: 0,
    };
    let root = p.alternation()?;
    if p.pos < src.len() {
        // `alternation` only stops early on a stray `)`.
        return Err(p.error(p.pos, PatternErrorKind::UnmatchedParen));
    }
    Ok(Ast {
        root,
        groups: p.groups,
    })
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    groups: usize,
    depth: usize,
}

impl Parser<'_> {
    fn error(&self, offset: usize, kind: PatternErrorKind) -> PatternError {
        PatternError { offset, kind }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    #[inline]
    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    fn alternation(&mut self) -> Result<Node, PatternError> {
        let mut branches = vec![self.concat()?];
        while self.peek() == Some(b'|') {
            self.pos += 1;
            branches.push(self.concat()?);
        }
        Ok(if branches.len() == 1 {
            branches.swap_remove(0)
        } else {
            Node::Alt(branches)
        })
    }

    fn concat(&mut self) -> Result<Node, PatternError> {
        let mut items = Vec::new();
        while let Some(c) = self.peek() {
            if c == b'|' || c == b')' {
                break;
            }
            items.push(self.repeat()?);
        }
        Ok(match items.len() {
            0 => Node::Empty,
            1 => items.swap_remove(0),
            _ => Node::Concat(items),
        })
    }

    fn repeat(&mut self) -> Result<Node, PatternError> {
        let atom = self.atom()?;
        let Some((min, max)) = self.quantifier()? else {
            return Ok(atom);
        };
        let greedy = if self.peek() == Some(b'?') {
            self.pos += 1;
            false
        } else {
            true
        };
        let at = self.pos;
        if self.quantifier()?.is_some() {
            return Err(self.error(at, PatternErrorKind::NothingToRepeat));
        }
        Ok(Node::Repeat {
            inner: Box::new(atom),
            min,
            max,
            greedy,
        })
    }

    /// Consumes a quantifier if one starts here. A `{` that does not form a
    /// counted repetition is left alone and later read as a literal.
    fn quantifier(&mut self) -> Result<Option<(u32, Option<u32>)>, PatternError> {
        let q = match self.peek() {
            Some(b'*') => (0, None),
            Some(b'+') => (1, None),
            Some(b'?') => (0, Some(1)),
            Some(b'{') => return self.counted(),
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(q))
    }

    fn counted(&mut self) -> Result<Option<(u32, Option<u32>)>, PatternError> {
        let start = self.pos;
        let mut i = self.pos + 1;
        let Some((min, next)) = self.number(i) else {
            return Ok(None);
        };
        i = next;
        let max = match self.src.get(i) {
            Some(b'}') => Some(min),
            Some(b',') => match self.number(i + 1) {
                Some((m, next)) => {
                    i = next;
                    Some(m)
                }
                None => {
                    i += 1;
                    None
                }
            },
            _ => return Ok(None),
        };
        if self.src.get(i) != Some(&b'}') {
            return Ok(None);
        }
        if min > MAX_REPEAT || max.is_some_and(|m| m > MAX_REPEAT) {
            return Err(self.error(start, PatternErrorKind::RepeatTooLarge));
        }
        if max.is_some_and(|m| m < min) {
            return Err(self.error(start, PatternErrorKind::InvalidBounds));
        }
        self.pos = i + 1;
        Ok(Some((min, max)))
    }

    /// Decimal digits at `i`, saturating. Returns the value and the index
    /// past the last digit.
    fn number(&self, mut i: usize) -> Option<(u32, usize)> {
        let begin = i;
        let mut n: u32 = 0;
        while let Some(d) = self.src.get(i).filter(|d| d.is_ascii_digit()) {
            n = n.saturating_mul(10).saturating_add(u32::from(d - b'0'));
            i += 1;
        }
        (i > begin).then_some((n, i))
    }

    fn atom(&mut self) -> Result<Node, PatternError> {
        let at = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Node::Empty);
        };
        self.pos += 1;
        Ok(match c {
            b'(' => {
                if self.depth >= MAX_NESTING {
                    return Err(self.error(at, PatternErrorKind::TooDeep));
                }
                self.groups += 1;
                let index = self.groups;
                self.depth += 1;
                let inner = self.alternation()?;
                self.depth -= 1;
                if self.peek() != Some(b')') {
                    return Err(self.error(at, PatternErrorKind::UnclosedGroup));
                }
                self.pos += 1;
                Node::Group {
                    index,
                    inner: Box::new(inner),
                }
            }
            b'*' | b'+' | b'?' => return Err(self.error(at, PatternErrorKind::NothingToRepeat)),
            b'[' => self.class(at)?,
            b'.' => Node::Any,
            b'^' => Node::Start,
            b'$' => Node::End,
            b'\\' => match self.escape(at)? {
                Item::Byte(b) => Node::Byte(b),
                Item::Class(class) => Node::Class(class),
            },
            _ => Node::Byte(c),
        })
    }

    /// Reads the byte after a backslash at `at`.
    fn escape(&mut self, at: usize) -> Result<Item, PatternError> {
        let Some(e) = self.peek() else {
            return Err(self.error(at, PatternErrorKind::TrailingBackslash));
        };
        self.pos += 1;
        Ok(match e {
            b'n' => Item::Byte(b'\n'),
            b'r' => Item::Byte(b'\r'),
            b't' => Item::Byte(b'\t'),
            b'f' => Item::Byte(0x0C),
            b'v' => Item::Byte(0x0B),
            _ => match ByteClass::shorthand(e) {
                Some(class) => Item::Class(class),
                None => Item::Byte(e),
            },
        })
    }

    fn class_item(&mut self, open: usize) -> Result<Item, PatternError> {
        match self.peek() {
            None => Err(self.error(open, PatternErrorKind::UnclosedClass)),
            Some(b'\\') => {
                let at = self.pos;
                self.pos += 1;
                if self.peek().is_none() {
                    return Err(self.error(open, PatternErrorKind::UnclosedClass));
                }
                self.escape(at)
            }
            Some(c) => {
                self.pos += 1;
                Ok(Item::Byte(c))
            }
        }
    }

    /// Parses a bracket class; the opening `[` at `open` is consumed.
    fn class(&mut self, open: usize) -> Result<Node, PatternError> {
        let negated = matches!(self.peek(), Some(b'^' | b'!'));
        if negated {
            self.pos += 1;
        }
        let mut class = ByteClass::empty();
        let mut first = true;
        loop {
            match self.peek() {
                None => return Err(self.error(open, PatternErrorKind::UnclosedClass)),
                Some(b']') if !first => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }
            first = false;
            let lo = match self.class_item(open)? {
                Item::Byte(b) => b,
                Item::Class(set) => {
                    class.union(&set);
                    continue;
                }
            };
            let is_range = self.peek() == Some(b'-') && self.peek_at(1).is_some_and(|n| n != b']');
            if !is_range {
                class.add(lo);
                continue;
            }
            let dash = self.pos;
            self.pos += 1;
            match self.class_item(open)? {
                Item::Byte(hi) if hi >= lo => class.add_range(lo, hi),
                _ => return Err(self.error(dash, PatternErrorKind::InvalidRange)),
            }
        }
        if negated {
            class.negate();
        }
        Ok(Node::Class(class))
    }
}
