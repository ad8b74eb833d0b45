//! Common types used across the coverage model
//!
//! Scope and cover-item type tags carry the numeric values used in every
//! persisted format, so the tags round-trip through any backend unchanged.

use std::fmt;
use std::ops::BitOr;

/// Declares a closed tag enum with a fixed wire value and display name per variant
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident : $repr:ty {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Numeric value stored on disk
            pub const fn bits(self) -> $repr {
                match self {
                    $( Self::$variant => $value, )+
                }
            }

            /// Look up a variant from its numeric value
            pub fn from_bits(value: $repr) -> Option<Self> {
                match value {
                    $( v if v == $value => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Canonical upper-case name
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }

            /// Look up a variant from its canonical name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $label => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// All variants in declaration order
            pub fn all() -> &'static [Self] {
                &[ $( Self::$variant, )+ ]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

/// Declares a bitset newtype with named constants
macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        pub struct $name:ident : $repr:ty {
            $( $(#[$vmeta:meta])* const $flag:ident = $value:expr; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name($repr);

        impl $name {
            $( $(#[$vmeta])* pub const $flag: Self = Self($value); )+

            /// The empty set
            pub const fn empty() -> Self {
                Self(0)
            }

            /// Wrap raw bits, keeping unknown bits intact
            pub const fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// True if every bit of `other` is set
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// True if any bit of `other` is set
            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

code_enum! {
    /// Scope type tag
    ///
    /// Values are single bits so a set of types can be expressed as a [`ScopeMask`].
    pub enum ScopeType: u64 {
        Toggle = 0x1 => "TOGGLE",
        Branch = 0x2 => "BRANCH",
        Expr = 0x4 => "EXPR",
        Cond = 0x8 => "COND",
        Instance = 0x10 => "INSTANCE",
        Process = 0x20 => "PROCESS",
        Block = 0x40 => "BLOCK",
        Function = 0x80 => "FUNCTION",
        ForkJoin = 0x100 => "FORKJOIN",
        Generate = 0x200 => "GENERATE",
        Generic = 0x400 => "GENERIC",
        Class = 0x800 => "CLASS",
        Covergroup = 0x1000 => "COVERGROUP",
        CoverInstance = 0x2000 => "COVERINSTANCE",
        Coverpoint = 0x4000 => "COVERPOINT",
        Cross = 0x8000 => "CROSS",
        Cover = 0x10000 => "COVER",
        Assert = 0x20000 => "ASSERT",
        Program = 0x40000 => "PROGRAM",
        Package = 0x80000 => "PACKAGE",
        Task = 0x100000 => "TASK",
        Interface = 0x200000 => "INTERFACE",
        Fsm = 0x400000 => "FSM",
        DuModule = 0x1000000 => "DU_MODULE",
        DuArch = 0x2000000 => "DU_ARCH",
        DuPackage = 0x4000000 => "DU_PACKAGE",
        DuProgram = 0x8000000 => "DU_PROGRAM",
        DuInterface = 0x10000000 => "DU_INTERFACE",
        FsmStates = 0x20000000 => "FSM_STATES",
        FsmTrans = 0x40000000 => "FSM_TRANS",
        CovBlock = 0x80000000 => "COVBLOCK",
        CvgBinScope = 0x100000000 => "CVGBINSCOPE",
        IllegalBinScope = 0x200000000 => "ILLEGALBINSCOPE",
        IgnoreBinScope = 0x400000000 => "IGNOREBINSCOPE",
    }
}

impl ScopeType {
    /// Design-unit scope types
    pub fn is_design_unit(self) -> bool {
        ScopeMask::DU_ANY.matches(self)
    }

    /// Covergroup family scope types (covergroup, instance, coverpoint, cross)
    pub fn is_functional(self) -> bool {
        ScopeMask::FUNC_COV.matches(self)
    }

    /// Code-coverage scope types
    pub fn is_code_coverage(self) -> bool {
        ScopeMask::CODE_COV.matches(self)
    }
}

/// Filter for scope iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeMask(u64);

impl ScopeMask {
    pub const ALL: Self = Self(0x0000_FFFF_FFFF_FFFF);
    pub const DU_ANY: Self = Self(0x1F00_0000);
    pub const FUNC_COV: Self = Self(0xF000);
    pub const CODE_COV: Self = Self(0x1 | 0x2 | 0x4 | 0x8 | 0x40 | 0x40_0000 | 0x8000_0000);
    pub const HDL_ANY: Self = Self(0x10 | 0x20 | 0x80 | 0x100 | 0x200 | 0x40000 | 0x80000 | 0x100000 | 0x200000);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// True if scopes of `scope_type` pass this filter
    pub const fn matches(self, scope_type: ScopeType) -> bool {
        self.0 & scope_type.bits() != 0
    }
}

impl Default for ScopeMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<ScopeType> for ScopeMask {
    fn from(value: ScopeType) -> Self {
        Self(value.bits())
    }
}

impl BitOr for ScopeMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr for ScopeType {
    type Output = ScopeMask;

    fn bitor(self, rhs: Self) -> ScopeMask {
        ScopeMask(self.bits() | rhs.bits())
    }
}

code_enum! {
    /// Cover item (bin) type tag
    pub enum CoverType: u64 {
        CvgBin = 0x1 => "CVGBIN",
        CoverBin = 0x2 => "COVERBIN",
        AssertBin = 0x4 => "ASSERTBIN",
        StmtBin = 0x20 => "STMTBIN",
        BranchBin = 0x40 => "BRANCHBIN",
        ExprBin = 0x80 => "EXPRBIN",
        CondBin = 0x100 => "CONDBIN",
        ToggleBin = 0x200 => "TOGGLEBIN",
        PassBin = 0x400 => "PASSBIN",
        FsmBin = 0x800 => "FSMBIN",
        UserBin = 0x1000 => "USERBIN",
        Count = 0x2000 => "COUNT",
        FailBin = 0x4000 => "FAILBIN",
        VacuousBin = 0x8000 => "VACUOUSBIN",
        DisabledBin = 0x10000 => "DISABLEDBIN",
        AttemptBin = 0x20000 => "ATTEMPTBIN",
        ActiveBin = 0x40000 => "ACTIVEBIN",
        IgnoreBin = 0x80000 => "IGNOREBIN",
        IllegalBin = 0x100000 => "ILLEGALBIN",
        DefaultBin = 0x200000 => "DEFAULTBIN",
        PeakActiveBin = 0x400000 => "PEAKACTIVEBIN",
        BlockBin = 0x1000000 => "BLOCKBIN",
    }
}

impl CoverType {
    /// Default at-least threshold for a freshly created item of this type
    pub const fn default_goal(self) -> i64 {
        match self {
            CoverType::CvgBin => 1,
            _ => 0,
        }
    }

    /// Ignore and illegal bins never accumulate coverage
    pub const fn is_passive(self) -> bool {
        matches!(self, CoverType::IgnoreBin | CoverType::IllegalBin)
    }
}

/// Filter for cover item iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoverMask(u64);

impl CoverMask {
    pub const ALL: Self = Self(0x0000_FFFF_FFFF_FFFF);
    pub const FUNC_COV: Self = Self(0x1 | 0x80000 | 0x100000 | 0x200000);
    pub const CODE_COV: Self = Self(0x20 | 0x40 | 0x80 | 0x100 | 0x200 | 0x800 | 0x1000000);
    pub const ASSERTION: Self = Self(0x2 | 0x4 | 0x400 | 0x4000 | 0x8000 | 0x10000 | 0x20000 | 0x40000 | 0x400000);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn matches(self, cover_type: CoverType) -> bool {
        self.0 & cover_type.bits() != 0
    }
}

impl Default for CoverMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<CoverType> for CoverMask {
    fn from(value: CoverType) -> Self {
        Self(value.bits())
    }
}

impl BitOr for CoverMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

flag_set! {
    /// Scope flag bits
    pub struct ScopeFlags: u32 {
        const INST_ONCE = 0x0000_0001;
        const ENABLED_STMT = 0x0000_0002;
        const ENABLED_BRANCH = 0x0000_0004;
        const ENABLED_COND = 0x0000_0008;
        const ENABLED_EXPR = 0x0000_0010;
        const ENABLED_FSM = 0x0000_0020;
        const ENABLED_TOGGLE = 0x0000_0040;
        const SCOPE_UNDER_DU = 0x0000_0100;
        const SCOPE_EXCLUDED = 0x0000_0200;
        const SCOPE_PRAGMA_EXCLUDED = 0x0000_0400;
        const SCOPE_PRAGMA_CLEARED = 0x0000_0800;
        const SCOPE_SPECIALIZED = 0x0000_1000;
        const IS_TOP_NODE = 0x0001_0000;
        const SCOPE_CVG_SCALAR = 0x0002_0000;
        const SCOPE_CVG_VECTOR = 0x0004_0000;
        const SCOPE_CVG_TRANSITION = 0x0008_0000;
        const ENABLED_BLOCK = 0x0080_0000;
        const SCOPE_BLOCK_ISBRANCH = 0x0100_0000;
    }
}

flag_set! {
    /// Cover item flag bits
    pub struct CoverFlags: u32 {
        const IS_32BIT = 0x0000_0001;
        const IS_64BIT = 0x0000_0002;
        const IS_VECTOR = 0x0000_0004;
        const HAS_GOAL = 0x0000_0008;
        const HAS_WEIGHT = 0x0000_0010;
        const EXCLUDE_PRAGMA = 0x0000_0020;
        const EXCLUDE_FILE = 0x0000_0040;
        const EXCLUDE_INST = 0x0000_0080;
        const EXCLUDE_AUTO = 0x0000_0100;
        const HAS_LIMIT = 0x0000_0400;
    }
}

impl CoverFlags {
    /// Any of the exclusion bits
    pub const EXCLUDED: Self = Self(0x20 | 0x40 | 0x80 | 0x100);

    pub const fn is_excluded(self) -> bool {
        self.intersects(Self::EXCLUDED)
    }
}

code_enum! {
    /// HDL source language of a scope
    #[derive(Default)]
    pub enum SourceLanguage: u32 {
        Vhdl = 0 => "VHDL",
        Verilog = 1 => "VLOG",
        SystemVerilog = 2 => "SV",
        SystemC = 3 => "SYSTEMC",
        PslVhdl = 4 => "PSL_VHDL",
        PslVerilog = 5 => "PSL_VLOG",
        PslSystemVerilog = 6 => "PSL_SV",
        PslSystemC = 7 => "PSL_SYSTEMC",
        E = 8 => "E",
        Vera = 9 => "VERA",
        #[default]
        None = 10 => "NONE",
        Other = 11 => "OTHER",
    }
}

code_enum! {
    /// Outcome of one test run
    #[derive(Default)]
    pub enum TestStatus: u32 {
        #[default]
        Ok = 1 => "OK",
        Warning = 2 => "WARNING",
        Error = 3 => "ERROR",
        Fatal = 4 => "FATAL",
        Missing = 5 => "MISSING",
        MergeError = 6 => "MERGE_ERROR",
    }
}

code_enum! {
    /// History node kind
    pub enum HistoryKind: i32 {
        Test = 1 => "TEST",
        Merge = 2 => "MERGE",
    }
}

code_enum! {
    /// Toggle metric
    #[derive(Default)]
    pub enum ToggleMetric: u32 {
        #[default]
        NoBins = 1 => "NOBINS",
        Enum = 2 => "ENUM",
        Transition = 3 => "TRANSITION",
        TwoState = 4 => "2STOGGLE",
        ZToggle = 5 => "ZTOGGLE",
        XToggle = 6 => "XTOGGLE",
    }
}

code_enum! {
    /// Toggle object kind
    #[derive(Default)]
    pub enum ToggleType: u32 {
        #[default]
        Net = 1 => "NET",
        Reg = 2 => "REG",
    }
}

code_enum! {
    /// Toggle port direction
    #[derive(Default)]
    pub enum ToggleDir: u32 {
        #[default]
        Internal = 1 => "INTERNAL",
        In = 2 => "IN",
        Out = 3 => "OUT",
        InOut = 4 => "INOUT",
    }
}
