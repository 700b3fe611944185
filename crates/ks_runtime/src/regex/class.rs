/// A set of bytes, one bit per value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ByteClass([u64; 4]);

impl ByteClass {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// The class for a shorthand escape letter (`d D w W s S`).
    pub(crate) fn shorthand(letter: u8) -> Option<Self> {
        let mut class = Self::empty();
        match letter.to_ascii_lowercase() {
            b'd' => class.add_range(b'0', b'9'),
            b'w' => {
                class.add_range(b'a', b'z');
                class.add_range(b'A', b'Z');
                class.add_range(b'0', b'9');
                class.add(b'_');
            }
            b's' => {
                for b in [b' ', b'\t', b'\n', b'\r', 0x0C, 0x0B] {
                    class.add(b);
                }
            }
            _ => return None,
        }
        if letter.is_ascii_uppercase() {
            class.negate();
        }
        Some(class)
    }

    #[inline]
    pub(crate) fn add(&mut self, b: u8) {
        self.0[usize::from(b >> 6)] |= 1 << (b & 63);
    }

    pub(crate) fn add_range(&mut self, lo: u8, hi: u8) {
        for b in lo..=hi {
            self.add(b);
        }
    }

    pub(crate) fn union(&mut self, other: &ByteClass) {
        for (w, o) in self.0.iter_mut().zip(other.0) {
            *w |= o;
        }
    }

    pub(crate) fn negate(&mut self) {
        for w in &mut self.0 {
            *w = !*w;
        }
    }

    #[inline]
    pub(crate) fn contains(&self, b: u8) -> bool {
        self.0[usize::from(b >> 6)] & (1 << (b & 63)) != 0
    }
}
