//! Instruction set.

use phf::phf_map;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Integer arithmetic
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    SDivChk0,
    UDivChk0,
    SRemChk0,
    URemChk0,
    IAddOvf,
    ISubOvf,
    IMulOvf,
    // Bitwise
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    // Float arithmetic
    FAdd,
    FSub,
    FMul,
    FDiv,
    // Comparisons
    ICmpEq,
    ICmpNe,
    SCmpLT,
    SCmpLE,
    SCmpGT,
    SCmpGE,
    UCmpLT,
    UCmpLE,
    UCmpGT,
    UCmpGE,
    FCmpEQ,
    FCmpNE,
    FCmpLT,
    FCmpLE,
    FCmpGT,
    FCmpGE,
    // Conversions
    Sitofp,
    Fptosi,
    Zext1,
    Trunc1,
    // Memory
    Alloca,
    GEP,
    Load,
    Store,
    AddrOf,
    ConstStr,
    ConstNull,
    // Calls
    Call,
    CallIndirect,
    // Exception handling
    TrapFromErr,
    EhPush,
    EhPop,
    EhEntry,
    // Terminators
    Br,
    CBr,
    SwitchI32,
    Ret,
    Trap,
    ResumeSame,
    ResumeNext,
    ResumeLabel,
}

static MNEMONICS: phf::Map<&'static str, Opcode> = phf_map! {
    "add" => Opcode::Add,
    "sub" => Opcode::Sub,
    "mul" => Opcode::Mul,
    "sdiv" => Opcode::SDiv,
    "udiv" => Opcode::UDiv,
    "srem" => Opcode::SRem,
    "urem" => Opcode::URem,
    "sdiv.chk0" => Opcode::SDivChk0,
    "udiv.chk0" => Opcode::UDivChk0,
    "srem.chk0" => Opcode::SRemChk0,
    "urem.chk0" => Opcode::URemChk0,
    "iadd.ovf" => Opcode::IAddOvf,
    "isub.ovf" => Opcode::ISubOvf,
    "imul.ovf" => Opcode::IMulOvf,
    "and" => Opcode::And,
    "or" => Opcode::Or,
    "xor" => Opcode::Xor,
    "shl" => Opcode::Shl,
    "lshr" => Opcode::LShr,
    "ashr" => Opcode::AShr,
    "fadd" => Opcode::FAdd,
    "fsub" => Opcode::FSub,
    "fmul" => Opcode::FMul,
    "fdiv" => Opcode::FDiv,
    "icmp_eq" => Opcode::ICmpEq,
    "icmp_ne" => Opcode::ICmpNe,
    "scmp_lt" => Opcode::SCmpLT,
    "scmp_le" => Opcode::SCmpLE,
    "scmp_gt" => Opcode::SCmpGT,
    "scmp_ge" => Opcode::SCmpGE,
    "ucmp_lt" => Opcode::UCmpLT,
    "ucmp_le" => Opcode::UCmpLE,
    "ucmp_gt" => Opcode::UCmpGT,
    "ucmp_ge" => Opcode::UCmpGE,
    "fcmp_eq" => Opcode::FCmpEQ,
    "fcmp_ne" => Opcode::FCmpNE,
    "fcmp_lt" => Opcode::FCmpLT,
    "fcmp_le" => Opcode::FCmpLE,
    "fcmp_gt" => Opcode::FCmpGT,
    "fcmp_ge" => Opcode::FCmpGE,
    "sitofp" => Opcode::Sitofp,
    "fptosi" => Opcode::Fptosi,
    "zext1" => Opcode::Zext1,
    "trunc1" => Opcode::Trunc1,
    "alloca" => Opcode::Alloca,
    "gep" => Opcode::GEP,
    "load" => Opcode::Load,
    "store" => Opcode::Store,
    "addr_of" => Opcode::AddrOf,
    "const_str" => Opcode::ConstStr,
    "const_null" => Opcode::ConstNull,
    "call" => Opcode::Call,
    "call.indirect" => Opcode::CallIndirect,
    "trap.from_err" => Opcode::TrapFromErr,
    "eh.push" => Opcode::EhPush,
    "eh.pop" => Opcode::EhPop,
    "eh.entry" => Opcode::EhEntry,
    "br" => Opcode::Br,
    "cbr" => Opcode::CBr,
    "switch.i32" => Opcode::SwitchI32,
    "ret" => Opcode::Ret,
    "trap" => Opcode::Trap,
    "resume.same" => Opcode::ResumeSame,
    "resume.next" => Opcode::ResumeNext,
    "resume.label" => Opcode::ResumeLabel,
};

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::SDiv => "sdiv",
            Opcode::UDiv => "udiv",
            Opcode::SRem => "srem",
            Opcode::URem => "urem",
            Opcode::SDivChk0 => "sdiv.chk0",
            Opcode::UDivChk0 => "udiv.chk0",
            Opcode::SRemChk0 => "srem.chk0",
            Opcode::URemChk0 => "urem.chk0",
            Opcode::IAddOvf => "iadd.ovf",
            Opcode::ISubOvf => "isub.ovf",
            Opcode::IMulOvf => "imul.ovf",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shl => "shl",
            Opcode::LShr => "lshr",
            Opcode::AShr => "ashr",
            Opcode::FAdd => "fadd",
            Opcode::FSub => "fsub",
            Opcode::FMul => "fmul",
            Opcode::FDiv => "fdiv",
            Opcode::ICmpEq => "icmp_eq",
            Opcode::ICmpNe => "icmp_ne",
            Opcode::SCmpLT => "scmp_lt",
            Opcode::SCmpLE => "scmp_le",
            Opcode::SCmpGT => "scmp_gt",
            Opcode::SCmpGE => "scmp_ge",
            Opcode::UCmpLT => "ucmp_lt",
            Opcode::UCmpLE => "ucmp_le",
            Opcode::UCmpGT => "ucmp_gt",
            Opcode::UCmpGE => "ucmp_ge",
            Opcode::FCmpEQ => "fcmp_eq",
            Opcode::FCmpNE => "fcmp_ne",
            Opcode::FCmpLT => "fcmp_lt",
            Opcode::FCmpLE => "fcmp_le",
            Opcode::FCmpGT => "fcmp_gt",
            Opcode::FCmpGE => "fcmp_ge",
            Opcode::Sitofp => "sitofp",
            Opcode::Fptosi => "fptosi",
            Opcode::Zext1 => "zext1",
            Opcode::Trunc1 => "trunc1",
            Opcode::Alloca => "alloca",
            Opcode::GEP => "gep",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::AddrOf => "addr_of",
            Opcode::ConstStr => "const_str",
            Opcode::ConstNull => "const_null",
            Opcode::Call => "call",
            Opcode::CallIndirect => "call.indirect",
            Opcode::TrapFromErr => "trap.from_err",
            Opcode::EhPush => "eh.push",
            Opcode::EhPop => "eh.pop",
            Opcode::EhEntry => "eh.entry",
            Opcode::Br => "br",
            Opcode::CBr => "cbr",
            Opcode::SwitchI32 => "switch.i32",
            Opcode::Ret => "ret",
            Opcode::Trap => "trap",
            Opcode::ResumeSame => "resume.same",
            Opcode::ResumeNext => "resume.next",
            Opcode::ResumeLabel => "resume.label",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Opcode> {
        MNEMONICS.get(s).copied()
    }

    /// Ends control flow in its block.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Br
                | Opcode::CBr
                | Opcode::SwitchI32
                | Opcode::Ret
                | Opcode::Trap
                | Opcode::ResumeSame
                | Opcode::ResumeNext
                | Opcode::ResumeLabel
        )
    }

    /// Transfers control to labelled successors.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Br | Opcode::CBr | Opcode::SwitchI32 | Opcode::ResumeLabel
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Opcode::ICmpEq
                | Opcode::ICmpNe
                | Opcode::SCmpLT
                | Opcode::SCmpLE
                | Opcode::SCmpGT
                | Opcode::SCmpGE
                | Opcode::UCmpLT
                | Opcode::UCmpLE
                | Opcode::UCmpGT
                | Opcode::UCmpGE
                | Opcode::FCmpEQ
                | Opcode::FCmpNE
                | Opcode::FCmpLT
                | Opcode::FCmpLE
                | Opcode::FCmpGT
                | Opcode::FCmpGE
        )
    }

    /// Two-operand value-producing instruction accepted by `IrBuilder::emit_binary`.
    pub fn is_binary(self) -> bool {
        self.is_comparison()
            || matches!(
                self,
                Opcode::Add
                    | Opcode::Sub
                    | Opcode::Mul
                    | Opcode::SDiv
                    | Opcode::UDiv
                    | Opcode::SRem
                    | Opcode::URem
                    | Opcode::SDivChk0
                    | Opcode::UDivChk0
                    | Opcode::SRemChk0
                    | Opcode::URemChk0
                    | Opcode::IAddOvf
                    | Opcode::ISubOvf
                    | Opcode::IMulOvf
                    | Opcode::And
                    | Opcode::Or
                    | Opcode::Xor
                    | Opcode::Shl
                    | Opcode::LShr
                    | Opcode::AShr
                    | Opcode::FAdd
                    | Opcode::FSub
                    | Opcode::FMul
                    | Opcode::FDiv
            )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
