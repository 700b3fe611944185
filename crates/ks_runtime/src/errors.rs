//! Trap messages raised by the runtime exports.

pub mod messages {
    pub const TEXT_TOO_LONG: &str = "Pattern: text length exceeds the int range";
    pub const NULL_PATTERN: &str = "Pattern: null pattern";
    pub const NOT_A_PATTERN: &str = "Pattern: object is not a compiled pattern";
    pub const UNWRAP_NONE: &str = "Option: unwrap of none";
    pub const UNWRAP_ERR: &str = "Result: unwrap of err";
    pub const UNWRAP_ERR_OF_OK: &str = "Result: unwrap_err of ok";
    pub const NOT_AN_OPTION: &str = "Option: object is not an option";
    pub const NOT_A_RESULT: &str = "Result: object is not a result";
    pub const NOT_A_BITSET: &str = "Bitset: object is not a bitset";
    pub const BIT_OUT_OF_RANGE: &str = "Bitset: bit index out of range";
    pub const BITSET_LEN_MISMATCH: &str = "Bitset: operands differ in length";
    pub const NEGATIVE_LENGTH: &str = "negative length";
    pub const BAD_HEAP_KIND: &str = "rt_heap_alloc: unknown heap or element kind";
    pub const NOT_A_VEC3: &str = "Vec3: object is not a vector";
    pub const NOT_A_QUAT: &str = "Quat: object is not a quaternion";
    pub const NOT_A_MAT4: &str = "Mat4: object is not a matrix";
    pub const MAT4_INDEX: &str = "Mat4: element index out of range";
}
