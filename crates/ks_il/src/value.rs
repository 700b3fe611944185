use std::fmt;

/// Instruction operand.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    ConstInt(i64),
    ConstFloat(f64),
    /// Address of a global or function symbol.
    GlobalAddr(String),
    /// SSA temporary by id.
    Temp(u32),
}

impl Value {
    #[inline]
    pub fn temp(id: u32) -> Self {
        Value::Temp(id)
    }

    #[inline]
    pub fn const_int(v: i64) -> Self {
        Value::ConstInt(v)
    }

    #[inline]
    pub fn const_float(v: f64) -> Self {
        Value::ConstFloat(v)
    }

    pub fn global(name: impl Into<String>) -> Self {
        Value::GlobalAddr(name.into())
    }

    #[inline]
    pub fn as_temp(&self) -> Option<u32> {
        match self {
            Value::Temp(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::ConstInt(v) => write!(f, "{v}"),
            Value::ConstFloat(v) => write!(f, "{v:?}"),
            Value::GlobalAddr(name) => write!(f, "@{name}"),
            Value::Temp(id) => write!(f, "%t{id}"),
        }
    }
}
