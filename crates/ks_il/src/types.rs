use std::fmt;

/// IL value types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    I1,
    I16,
    I32,
    I64,
    F64,
    Ptr,
    Str,
    Error,
    ResumeTok,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I16 => "i16",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F64 => "f64",
            Type::Ptr => "ptr",
            Type::Str => "str",
            Type::Error => "error",
            Type::ResumeTok => "resume_tok",
        }
    }

    pub fn parse(name: &str) -> Option<Type> {
        Some(match name {
            "void" => Type::Void,
            "i1" => Type::I1,
            "i16" => Type::I16,
            "i32" => Type::I32,
            "i64" => Type::I64,
            "f64" => Type::F64,
            "ptr" => Type::Ptr,
            "str" => Type::Str,
            "error" => Type::Error,
            "resume_tok" => Type::ResumeTok,
            _ => return None,
        })
    }

    #[inline]
    pub fn is_void(self) -> bool {
        self == Type::Void
    }

    #[inline]
    pub fn is_integer(self) -> bool {
        matches!(self, Type::I1 | Type::I16 | Type::I32 | Type::I64)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
