// src/ir/mode.rs

use std::fmt;

/// Represents the mode (value category and width) of an IR node.
///
/// Data modes describe machine-level value widths; the remaining modes mark
/// the non-data roles a node can play in the graph: control flow (`X`),
/// threaded memory state (`M`), tuples of results (`T`) and basic blocks
/// (`BB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    #[default]
    I32,
    /// 64-bit signed integer.
    I64,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 32-bit floating point.
    F32,
    /// 64-bit floating point.
    F64,
    /// Boolean, the result mode of comparisons.
    Bool,
    /// Pointer-sized address.
    P,
    /// Control flow.
    X,
    /// Memory state.
    M,
    /// Tuple of results (Start, Cond, Switch, Call, Load, ...).
    T,
    /// Basic block.
    BB,
}

impl Mode {
    /// Returns true for modes that describe a machine-level data value.
    #[must_use]
    pub const fn is_data(self) -> bool {
        !matches!(self, Mode::X | Mode::M | Mode::T | Mode::BB)
    }

    /// Returns true for integer modes (signed or unsigned, pointers excluded).
    #[must_use]
    pub const fn is_int(self) -> bool {
        matches!(
            self,
            Mode::I8 | Mode::I16 | Mode::I32 | Mode::I64 | Mode::U8 | Mode::U16 | Mode::U32 | Mode::U64
        )
    }

    /// Returns true for floating-point modes.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Mode::F32 | Mode::F64)
    }

    /// Returns true for modes with numeric arithmetic (integers and floats).
    #[must_use]
    pub const fn is_num(self) -> bool {
        self.is_int() || self.is_float()
    }

    /// Returns true for signed integer modes.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Mode::I8 | Mode::I16 | Mode::I32 | Mode::I64)
    }

    /// Bit width of a data mode; 0 for the non-data modes.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Mode::I8 | Mode::U8 => 8,
            Mode::I16 | Mode::U16 => 16,
            Mode::I32 | Mode::U32 | Mode::F32 => 32,
            Mode::I64 | Mode::U64 | Mode::F64 | Mode::P => 64,
            Mode::Bool => 1,
            Mode::X | Mode::M | Mode::T | Mode::BB => 0,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::I8 => "i8",
            Mode::I16 => "i16",
            Mode::I32 => "i32",
            Mode::I64 => "i64",
            Mode::U8 => "u8",
            Mode::U16 => "u16",
            Mode::U32 => "u32",
            Mode::U64 => "u64",
            Mode::F32 => "f32",
            Mode::F64 => "f64",
            Mode::Bool => "b",
            Mode::P => "p",
            Mode::X => "X",
            Mode::M => "M",
            Mode::T => "T",
            Mode::BB => "BB",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_classification() {
        assert!(Mode::I32.is_data());
        assert!(Mode::I32.is_int());
        assert!(Mode::I32.is_num());
        assert!(Mode::F64.is_float());
        assert!(!Mode::F64.is_int());
        assert!(!Mode::X.is_data());
        assert!(!Mode::M.is_data());
        assert!(Mode::P.is_data());
        assert!(!Mode::P.is_num());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::I32.to_string(), "i32");
        assert_eq!(Mode::Bool.to_string(), "b");
        assert_eq!(Mode::X.to_string(), "X");
    }
}
