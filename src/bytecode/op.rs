use serde::{Deserialize, Serialize};

/// Width of one stack slot in bytes. Operands below are counted in slots;
/// the binary writer scales them by this.
pub const SLOT_BYTES: i32 = 4;

// =============================================================================
// OP - VM instructions
// =============================================================================

/// One VM instruction without its jump target.
///
/// `Jmp`, `Jsr`, `Jz` and `Jnz` carry their destination on the owning
/// [`Instruction`](super::ir::Instruction) rather than as an operand, so the
/// stream can be edited after they are emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Nop,

    // ==========================================================================
    // Reserve a zeroed slot
    // ==========================================================================
    RsAddI,
    RsAddF,
    RsAddS,
    RsAddO,
    RsAddEff,
    RsAddEvt,
    RsAddLoc,
    RsAddTal,

    // constants
    ConstI(i32),
    ConstF(f32),
    ConstS(String),
    ConstO(i32),

    // ==========================================================================
    // Stack addressing. Offsets are negative, relative to SP or BP.
    // ==========================================================================
    /// Copy `size` slots from the top of the stack down to `SP + offset`.
    CpDownSp { offset: i32, size: i32 },
    /// Push a copy of `size` slots found at `SP + offset`.
    CpTopSp { offset: i32, size: i32 },
    /// Copy `size` slots from the top of the stack down to `BP + offset`.
    CpDownBp { offset: i32, size: i32 },
    /// Push a copy of `size` slots found at `BP + offset`.
    CpTopBp { offset: i32, size: i32 },
    /// Move SP; negative values pop.
    MovSp(i32),
    IncISp(i32),
    DecISp(i32),
    IncIBp(i32),
    DecIBp(i32),
    /// Push BP and point BP at the current top. Marks the end of globals.
    SaveBp,
    RestoreBp,

    // arithmetic
    AddII,
    AddIF,
    AddFI,
    AddFF,
    AddSS,
    AddVV,
    SubII,
    SubIF,
    SubFI,
    SubFF,
    SubVV,
    MulII,
    MulIF,
    MulFI,
    MulFF,
    MulVF,
    MulFV,
    DivII,
    DivIF,
    DivFI,
    DivFF,
    DivVF,
    ModII,
    NegI,
    NegF,

    // comparison
    EqualII,
    EqualFF,
    EqualSS,
    EqualOO,
    /// Compare two composite values of `size` slots each.
    EqualTT(i32),
    NEqualII,
    NEqualFF,
    NEqualSS,
    NEqualOO,
    NEqualTT(i32),
    GtII,
    GtFF,
    LtII,
    LtFF,
    GeqII,
    GeqFF,
    LeqII,
    LeqFF,

    // logic and bits
    LogAndII,
    LogOrII,
    InclOrII,
    ExclOrII,
    BoolAndII,
    ShLeftII,
    ShRightII,
    UShRightII,
    CompI,
    NotI,

    // ==========================================================================
    // Control flow
    // ==========================================================================
    Jmp,
    /// Call a script subroutine.
    Jsr,
    /// Pop an int, jump if it is zero.
    Jz,
    /// Pop an int, jump if it is non-zero.
    Jnz,
    Retn,
    /// Call engine routine `routine` with `argc` arguments on the stack.
    Action { routine: u16, argc: u8 },
    /// Snapshot `globals` slots from BP and `locals` slots from SP for the
    /// deferred command that follows; the next `ACTION` takes it.
    StoreState { globals: i32, locals: i32 },
}

impl Op {
    pub fn is_jump(&self) -> bool {
        matches!(self, Op::Jmp | Op::Jsr | Op::Jz | Op::Jnz)
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Nop => "NOP",
            Op::RsAddI => "RSADDI",
            Op::RsAddF => "RSADDF",
            Op::RsAddS => "RSADDS",
            Op::RsAddO => "RSADDO",
            Op::RsAddEff => "RSADDEFF",
            Op::RsAddEvt => "RSADDEVT",
            Op::RsAddLoc => "RSADDLOC",
            Op::RsAddTal => "RSADDTAL",
            Op::ConstI(_) => "CONSTI",
            Op::ConstF(_) => "CONSTF",
            Op::ConstS(_) => "CONSTS",
            Op::ConstO(_) => "CONSTO",
            Op::CpDownSp { .. } => "CPDOWNSP",
            Op::CpTopSp { .. } => "CPTOPSP",
            Op::CpDownBp { .. } => "CPDOWNBP",
            Op::CpTopBp { .. } => "CPTOPBP",
            Op::MovSp(_) => "MOVSP",
            Op::IncISp(_) => "INCISP",
            Op::DecISp(_) => "DECISP",
            Op::IncIBp(_) => "INCIBP",
            Op::DecIBp(_) => "DECIBP",
            Op::SaveBp => "SAVEBP",
            Op::RestoreBp => "RESTOREBP",
            Op::AddII => "ADDII",
            Op::AddIF => "ADDIF",
            Op::AddFI => "ADDFI",
            Op::AddFF => "ADDFF",
            Op::AddSS => "ADDSS",
            Op::AddVV => "ADDVV",
            Op::SubII => "SUBII",
            Op::SubIF => "SUBIF",
            Op::SubFI => "SUBFI",
            Op::SubFF => "SUBFF",
            Op::SubVV => "SUBVV",
            Op::MulII => "MULII",
            Op::MulIF => "MULIF",
            Op::MulFI => "MULFI",
            Op::MulFF => "MULFF",
            Op::MulVF => "MULVF",
            Op::MulFV => "MULFV",
            Op::DivII => "DIVII",
            Op::DivIF => "DIVIF",
            Op::DivFI => "DIVFI",
            Op::DivFF => "DIVFF",
            Op::DivVF => "DIVVF",
            Op::ModII => "MODII",
            Op::NegI => "NEGI",
            Op::NegF => "NEGF",
            Op::EqualII => "EQUALII",
            Op::EqualFF => "EQUALFF",
            Op::EqualSS => "EQUALSS",
            Op::EqualOO => "EQUALOO",
            Op::EqualTT(_) => "EQUALTT",
            Op::NEqualII => "NEQUALII",
            Op::NEqualFF => "NEQUALFF",
            Op::NEqualSS => "NEQUALSS",
            Op::NEqualOO => "NEQUALOO",
            Op::NEqualTT(_) => "NEQUALTT",
            Op::GtII => "GTII",
            Op::GtFF => "GTFF",
            Op::LtII => "LTII",
            Op::LtFF => "LTFF",
            Op::GeqII => "GEQII",
            Op::GeqFF => "GEQFF",
            Op::LeqII => "LEQII",
            Op::LeqFF => "LEQFF",
            Op::LogAndII => "LOGANDII",
            Op::LogOrII => "LOGORII",
            Op::InclOrII => "INCORII",
            Op::ExclOrII => "EXCORII",
            Op::BoolAndII => "BOOLANDII",
            Op::ShLeftII => "SHLEFTII",
            Op::ShRightII => "SHRIGHTII",
            Op::UShRightII => "USHRIGHTII",
            Op::CompI => "COMPI",
            Op::NotI => "NOTI",
            Op::Jmp => "JMP",
            Op::Jsr => "JSR",
            Op::Jz => "JZ",
            Op::Jnz => "JNZ",
            Op::Retn => "RETN",
            Op::Action { .. } => "ACTION",
            Op::StoreState { .. } => "STORE_STATE",
        }
    }
}
