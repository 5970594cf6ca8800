// src/ir/node.rs

use super::entity::EntityRef;
use super::tarval::Tarval;
use std::cmp::Ordering;
use std::fmt;

/// Projection numbers for the outputs of a `Cond` node.
pub const PN_COND_FALSE: u32 = 0;
pub const PN_COND_TRUE: u32 = 1;

/// Projection number of the default output of a `Switch` node.
pub const PN_SWITCH_DEFAULT: u32 = 0;

/// Projection number of the memory output of Start, Call and Load tuples.
pub const PN_MEM: u32 = 0;
/// Projection number of the loaded value of a `Load` tuple.
pub const PN_LOAD_RES: u32 = 1;

/// Comparison relation attached to `Cmp` and `Confirm` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Relation {
    /// Whether the relation holds for a concrete ordering of two values.
    #[must_use]
    pub const fn holds(self, ord: Ordering) -> bool {
        match self {
            Relation::Equal => matches!(ord, Ordering::Equal),
            Relation::NotEqual => !matches!(ord, Ordering::Equal),
            Relation::Less => matches!(ord, Ordering::Less),
            Relation::LessEqual => !matches!(ord, Ordering::Greater),
            Relation::Greater => matches!(ord, Ordering::Greater),
            Relation::GreaterEqual => !matches!(ord, Ordering::Less),
        }
    }

    /// Whether `x <rel> x` holds for every x of a non-float mode.
    #[must_use]
    pub const fn is_reflexive(self) -> bool {
        matches!(self, Relation::Equal | Relation::LessEqual | Relation::GreaterEqual)
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Relation> {
        Some(match text {
            "eq" => Relation::Equal,
            "ne" => Relation::NotEqual,
            "lt" => Relation::Less,
            "le" => Relation::LessEqual,
            "gt" => Relation::Greater,
            "ge" => Relation::GreaterEqual,
            _ => return None,
        })
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Equal => f.write_str("eq"),
            Relation::NotEqual => f.write_str("ne"),
            Relation::Less => f.write_str("lt"),
            Relation::LessEqual => f.write_str("le"),
            Relation::Greater => f.write_str("gt"),
            Relation::GreaterEqual => f.write_str("ge"),
        }
    }
}

/// One case of a `Switch` table, mapping a selector value to an output
/// projection number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchEntry {
    pub value: Tarval,
    pub pn: u32,
}

/// The jump table of a `Switch` node. Projection number
/// [`PN_SWITCH_DEFAULT`] is taken when no entry matches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SwitchTable {
    pub entries: Vec<SwitchEntry>,
}

impl SwitchTable {
    /// The output projection selected by a concrete selector value.
    #[must_use]
    pub fn lookup(&self, value: &Tarval) -> u32 {
        self.entries.iter().find(|e| e.value == *value).map_or(PN_SWITCH_DEFAULT, |e| e.pn)
    }
}

/// The meaning of a `SymConst` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymKind {
    /// The address of an entity; stays symbolic until link time.
    Address(EntityRef),
    /// The size of an entity in bytes; folds to an integer constant.
    Size(EntityRef),
    /// The alignment of an entity in bytes; folds to an integer constant.
    Align(EntityRef),
}

/// The operation a node performs, together with its opcode-specific
/// attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A basic block; its inputs are the control edges entering it.
    /// `labeled` blocks are address-taken and stay reachable.
    Block { labeled: bool },
    Start,
    End,
    /// Dead value of any mode.
    Bad,
    /// An unknown value of a data mode.
    Unknown,
    Jmp,
    /// Two-way branch on a boolean selector; produces X projections.
    Cond,
    /// Multi-way branch over a jump table.
    Switch { table: SwitchTable },
    /// Projection of one result out of a tuple-producing node.
    Proj { pn: u32 },
    Phi,
    Const { value: Tarval },
    SymConst { kind: SymKind },
    Add,
    Sub,
    Mul,
    And,
    Or,
    Eor,
    Shl,
    Shr,
    Shrs,
    Rotl,
    Cmp { relation: Relation },
    /// Value refinement: asserts `value <relation> bound` on its first input.
    Confirm { relation: Relation },
    /// `Mux(sel, if_false, if_true)`.
    Mux,
    Call { callee: EntityRef },
    Return,
    /// Joins several memory values into one.
    Sync,
    Load,
    Store,
    /// Mode conversion of its single operand.
    Conv,
}

/// Fieldless opcode, used for dispatch tables and congruence keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Block,
    Start,
    End,
    Bad,
    Unknown,
    Jmp,
    Cond,
    Switch,
    Proj,
    Phi,
    Const,
    SymConst,
    Add,
    Sub,
    Mul,
    And,
    Or,
    Eor,
    Shl,
    Shr,
    Shrs,
    Rotl,
    Cmp,
    Confirm,
    Mux,
    Call,
    Return,
    Sync,
    Load,
    Store,
    Conv,
}

impl NodeKind {
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            NodeKind::Block { .. } => Opcode::Block,
            NodeKind::Start => Opcode::Start,
            NodeKind::End => Opcode::End,
            NodeKind::Bad => Opcode::Bad,
            NodeKind::Unknown => Opcode::Unknown,
            NodeKind::Jmp => Opcode::Jmp,
            NodeKind::Cond => Opcode::Cond,
            NodeKind::Switch { .. } => Opcode::Switch,
            NodeKind::Proj { .. } => Opcode::Proj,
            NodeKind::Phi => Opcode::Phi,
            NodeKind::Const { .. } => Opcode::Const,
            NodeKind::SymConst { .. } => Opcode::SymConst,
            NodeKind::Add => Opcode::Add,
            NodeKind::Sub => Opcode::Sub,
            NodeKind::Mul => Opcode::Mul,
            NodeKind::And => Opcode::And,
            NodeKind::Or => Opcode::Or,
            NodeKind::Eor => Opcode::Eor,
            NodeKind::Shl => Opcode::Shl,
            NodeKind::Shr => Opcode::Shr,
            NodeKind::Shrs => Opcode::Shrs,
            NodeKind::Rotl => Opcode::Rotl,
            NodeKind::Cmp { .. } => Opcode::Cmp,
            NodeKind::Confirm { .. } => Opcode::Confirm,
            NodeKind::Mux => Opcode::Mux,
            NodeKind::Call { .. } => Opcode::Call,
            NodeKind::Return => Opcode::Return,
            NodeKind::Sync => Opcode::Sync,
            NodeKind::Load => Opcode::Load,
            NodeKind::Store => Opcode::Store,
            NodeKind::Conv => Opcode::Conv,
        }
    }
}

impl Opcode {
    /// Pinned nodes stay in their block; only unpinned data computations may
    /// be shared across blocks in GCSE mode.
    #[must_use]
    pub const fn is_pinned(self) -> bool {
        !matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::And
                | Opcode::Or
                | Opcode::Eor
                | Opcode::Shl
                | Opcode::Shr
                | Opcode::Shrs
                | Opcode::Rotl
                | Opcode::Cmp
                | Opcode::Conv
                | Opcode::Mux
                | Opcode::Const
                | Opcode::SymConst
        )
    }

    /// Whether operand order is irrelevant for congruence.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(self, Opcode::Add | Opcode::Mul | Opcode::And | Opcode::Or | Opcode::Eor)
    }

    /// Two-operand arithmetic operations (comparison included).
    #[must_use]
    pub const fn is_binop(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::And
                | Opcode::Or
                | Opcode::Eor
                | Opcode::Shl
                | Opcode::Shr
                | Opcode::Shrs
                | Opcode::Rotl
                | Opcode::Cmp
        )
    }

    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Block => "block",
            Opcode::Start => "start",
            Opcode::End => "end",
            Opcode::Bad => "bad",
            Opcode::Unknown => "unknown",
            Opcode::Jmp => "jmp",
            Opcode::Cond => "cond",
            Opcode::Switch => "switch",
            Opcode::Proj => "proj",
            Opcode::Phi => "phi",
            Opcode::Const => "const",
            Opcode::SymConst => "symconst",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Eor => "eor",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Shrs => "shrs",
            Opcode::Rotl => "rotl",
            Opcode::Cmp => "cmp",
            Opcode::Confirm => "confirm",
            Opcode::Mux => "mux",
            Opcode::Call => "call",
            Opcode::Return => "return",
            Opcode::Sync => "sync",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Conv => "conv",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
