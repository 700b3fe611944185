/// Source position supplied by a frontend. Opaque to the IL except for storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceLoc {
    pub file_id: u32,
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub const UNKNOWN: SourceLoc = SourceLoc {
        file_id: 0,
        line: 0,
        column: 0,
    };

    pub fn new(file_id: u32, line: u32, column: u32) -> Self {
        Self {
            file_id,
            line,
            column,
        }
    }

    /// Line 0 marks an unknown location.
    #[inline]
    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}
