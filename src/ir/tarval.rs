// src/ir/tarval.rs
//! Target values: compile-time constants tagged with their IR mode.
//!
//! All integer arithmetic wraps at the mode width (two's complement), so the
//! folded result matches what the target machine would compute. Floats carry
//! their bit pattern; equality and hashing are bitwise, which keeps NaN
//! payloads stable when target values are used as congruence-class keys.

use super::mode::Mode;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A compile-time constant value of a specific data mode.
#[derive(Debug, Clone, Copy)]
pub enum Tarval {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// Pointer-sized constant (e.g. a null pointer).
    P(u64),
}

impl Tarval {
    /// Gets the mode of this target value.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        match self {
            Tarval::I8(_) => Mode::I8,
            Tarval::I16(_) => Mode::I16,
            Tarval::I32(_) => Mode::I32,
            Tarval::I64(_) => Mode::I64,
            Tarval::U8(_) => Mode::U8,
            Tarval::U16(_) => Mode::U16,
            Tarval::U32(_) => Mode::U32,
            Tarval::U64(_) => Mode::U64,
            Tarval::F32(_) => Mode::F32,
            Tarval::F64(_) => Mode::F64,
            Tarval::Bool(_) => Mode::Bool,
            Tarval::P(_) => Mode::P,
        }
    }

    /// The raw bit pattern, zero-extended to 64 bits.
    #[must_use]
    pub fn bits(&self) -> u64 {
        match *self {
            Tarval::I8(v) => v as u8 as u64,
            Tarval::I16(v) => v as u16 as u64,
            Tarval::I32(v) => v as u32 as u64,
            Tarval::I64(v) => v as u64,
            Tarval::U8(v) => u64::from(v),
            Tarval::U16(v) => u64::from(v),
            Tarval::U32(v) => u64::from(v),
            Tarval::U64(v) => v,
            Tarval::F32(v) => u64::from(v.to_bits()),
            Tarval::F64(v) => v.to_bits(),
            Tarval::Bool(v) => u64::from(v),
            Tarval::P(v) => v,
        }
    }

    /// Rebuilds a value of `mode` from a 64-bit pattern, truncating to the
    /// mode width.
    #[must_use]
    pub fn from_bits(mode: Mode, bits: u64) -> Option<Tarval> {
        Some(match mode {
            Mode::I8 => Tarval::I8(bits as u8 as i8),
            Mode::I16 => Tarval::I16(bits as u16 as i16),
            Mode::I32 => Tarval::I32(bits as u32 as i32),
            Mode::I64 => Tarval::I64(bits as i64),
            Mode::U8 => Tarval::U8(bits as u8),
            Mode::U16 => Tarval::U16(bits as u16),
            Mode::U32 => Tarval::U32(bits as u32),
            Mode::U64 => Tarval::U64(bits),
            Mode::F32 => Tarval::F32(f32::from_bits(bits as u32)),
            Mode::F64 => Tarval::F64(f64::from_bits(bits)),
            Mode::Bool => Tarval::Bool(bits & 1 != 0),
            Mode::P => Tarval::P(bits),
            Mode::X | Mode::M | Mode::T | Mode::BB => return None,
        })
    }

    /// Builds an integer constant of `mode` from a signed 64-bit value,
    /// truncating to the mode width. Returns None for non-integer modes.
    #[must_use]
    pub fn from_i64(mode: Mode, value: i64) -> Option<Tarval> {
        if mode.is_int() || mode == Mode::P { Tarval::from_bits(mode, value as u64) } else { None }
    }

    /// The neutral element of addition for `mode` (also the all-zero pattern).
    #[must_use]
    pub fn null(mode: Mode) -> Option<Tarval> {
        match mode {
            Mode::F32 => Some(Tarval::F32(0.0)),
            Mode::F64 => Some(Tarval::F64(0.0)),
            Mode::Bool => Some(Tarval::Bool(false)),
            m if m.is_int() || m == Mode::P => Tarval::from_bits(m, 0),
            _ => None,
        }
    }

    /// The neutral element of multiplication for `mode`.
    #[must_use]
    pub fn one(mode: Mode) -> Option<Tarval> {
        match mode {
            Mode::F32 => Some(Tarval::F32(1.0)),
            Mode::F64 => Some(Tarval::F64(1.0)),
            Mode::Bool => Some(Tarval::Bool(true)),
            m if m.is_int() => Tarval::from_bits(m, 1),
            _ => None,
        }
    }

    /// The all-ones pattern of `mode`, the neutral element of And.
    /// Not defined for floating-point modes.
    #[must_use]
    pub fn all_one(mode: Mode) -> Option<Tarval> {
        match mode {
            Mode::Bool => Some(Tarval::Bool(true)),
            m if m.is_int() => Tarval::from_bits(m, u64::MAX),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        Tarval::null(self.mode()).is_some_and(|z| z == *self)
    }

    #[must_use]
    pub fn is_one(&self) -> bool {
        Tarval::one(self.mode()).is_some_and(|o| o == *self)
    }

    #[must_use]
    pub fn is_all_one(&self) -> bool {
        Tarval::all_one(self.mode()).is_some_and(|a| a == *self)
    }

    /// Attempts to extract a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Tarval::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn int_binop(&self, other: &Tarval, f: impl Fn(u64, u64) -> u64) -> Option<Tarval> {
        let mode = self.mode();
        if mode != other.mode() || !(mode.is_int() || mode == Mode::Bool) {
            return None;
        }
        Tarval::from_bits(mode, f(self.bits(), other.bits()))
    }

    fn float_binop(&self, other: &Tarval, f32_op: fn(f32, f32) -> f32, f64_op: fn(f64, f64) -> f64) -> Option<Tarval> {
        match (self, other) {
            (Tarval::F32(a), Tarval::F32(b)) => Some(Tarval::F32(f32_op(*a, *b))),
            (Tarval::F64(a), Tarval::F64(b)) => Some(Tarval::F64(f64_op(*a, *b))),
            _ => None,
        }
    }

    /// Wrapping addition. None on mode mismatch or non-numeric modes.
    #[must_use]
    pub fn add(&self, other: &Tarval) -> Option<Tarval> {
        if self.mode().is_float() {
            return self.float_binop(other, |a, b| a + b, |a, b| a + b);
        }
        self.int_binop(other, u64::wrapping_add)
    }

    /// Wrapping subtraction.
    #[must_use]
    pub fn sub(&self, other: &Tarval) -> Option<Tarval> {
        if self.mode().is_float() {
            return self.float_binop(other, |a, b| a - b, |a, b| a - b);
        }
        self.int_binop(other, u64::wrapping_sub)
    }

    /// Wrapping multiplication.
    #[must_use]
    pub fn mul(&self, other: &Tarval) -> Option<Tarval> {
        if self.mode().is_float() {
            return self.float_binop(other, |a, b| a * b, |a, b| a * b);
        }
        self.int_binop(other, u64::wrapping_mul)
    }

    /// Bitwise and. Integer and boolean modes only.
    #[must_use]
    pub fn and(&self, other: &Tarval) -> Option<Tarval> {
        self.int_binop(other, |a, b| a & b)
    }

    /// Bitwise or.
    #[must_use]
    pub fn or(&self, other: &Tarval) -> Option<Tarval> {
        self.int_binop(other, |a, b| a | b)
    }

    /// Bitwise exclusive or.
    #[must_use]
    pub fn eor(&self, other: &Tarval) -> Option<Tarval> {
        self.int_binop(other, |a, b| a ^ b)
    }

    fn shift_amount(count: &Tarval) -> Option<u64> {
        if count.mode().is_int() { Some(count.bits()) } else { None }
    }

    /// Left shift. Shifts of at least the mode width yield zero.
    #[must_use]
    pub fn shl(&self, count: &Tarval) -> Option<Tarval> {
        let mode = self.mode();
        if !mode.is_int() {
            return None;
        }
        let n = Tarval::shift_amount(count)?;
        let bits = if n >= u64::from(mode.bits()) { 0 } else { self.bits() << n };
        Tarval::from_bits(mode, bits)
    }

    /// Logical right shift. Shifts of at least the mode width yield zero.
    #[must_use]
    pub fn shr(&self, count: &Tarval) -> Option<Tarval> {
        let mode = self.mode();
        if !mode.is_int() {
            return None;
        }
        let n = Tarval::shift_amount(count)?;
        let bits = if n >= u64::from(mode.bits()) { 0 } else { self.bits() >> n };
        Tarval::from_bits(mode, bits)
    }

    /// Arithmetic right shift: the sign bit is replicated for signed modes.
    /// Shifts of at least the mode width fill with the sign.
    #[must_use]
    pub fn shrs(&self, count: &Tarval) -> Option<Tarval> {
        let mode = self.mode();
        if !mode.is_int() {
            return None;
        }
        let width = u64::from(mode.bits());
        let n = Tarval::shift_amount(count)?;
        let bits = if mode.is_signed() {
            // sign-extend to 64 bits, then shift arithmetically
            let shift = 64 - width;
            (((self.bits() << shift) as i64) >> shift >> n.min(width - 1)) as u64
        } else if n >= width {
            0
        } else {
            self.bits() >> n
        };
        Tarval::from_bits(mode, bits)
    }

    /// Left rotation by `count` modulo the mode width.
    #[must_use]
    pub fn rotl(&self, count: &Tarval) -> Option<Tarval> {
        let mode = self.mode();
        if !mode.is_int() {
            return None;
        }
        let width = u64::from(mode.bits());
        let n = Tarval::shift_amount(count)? % width;
        let v = self.bits();
        let bits = if n == 0 { v } else { (v << n) | (v >> (width - n)) };
        Tarval::from_bits(mode, bits)
    }

    /// Compares two values of the same mode. None when the modes differ or
    /// the comparison is unordered (NaN operands).
    #[must_use]
    pub fn compare(&self, other: &Tarval) -> Option<Ordering> {
        match (self, other) {
            (Tarval::I8(a), Tarval::I8(b)) => Some(a.cmp(b)),
            (Tarval::I16(a), Tarval::I16(b)) => Some(a.cmp(b)),
            (Tarval::I32(a), Tarval::I32(b)) => Some(a.cmp(b)),
            (Tarval::I64(a), Tarval::I64(b)) => Some(a.cmp(b)),
            (Tarval::U8(a), Tarval::U8(b)) => Some(a.cmp(b)),
            (Tarval::U16(a), Tarval::U16(b)) => Some(a.cmp(b)),
            (Tarval::U32(a), Tarval::U32(b)) => Some(a.cmp(b)),
            (Tarval::U64(a), Tarval::U64(b)) | (Tarval::P(a), Tarval::P(b)) => Some(a.cmp(b)),
            (Tarval::F32(a), Tarval::F32(b)) => a.partial_cmp(b),
            (Tarval::F64(a), Tarval::F64(b)) => a.partial_cmp(b),
            (Tarval::Bool(a), Tarval::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Converts this value to `to` (truncate/extend for integers, numeric
    /// casts between integers and floats). None for unsupported pairs.
    #[must_use]
    pub fn convert(&self, to: Mode) -> Option<Tarval> {
        let from = self.mode();
        if from == to {
            return Some(*self);
        }
        if (from.is_int() || from == Mode::P) && (to.is_int() || to == Mode::P) {
            // widen through the signed/unsigned interpretation of the source
            let wide = if from.is_signed() {
                let shift = 64 - from.bits();
                (((self.bits() << shift) as i64) >> shift) as u64
            } else {
                self.bits()
            };
            return Tarval::from_bits(to, wide);
        }
        let as_f64 = match *self {
            Tarval::F32(v) => Some(f64::from(v)),
            Tarval::F64(v) => Some(v),
            _ if from.is_signed() => {
                let shift = 64 - from.bits();
                Some((((self.bits() << shift) as i64) >> shift) as f64)
            }
            _ if from.is_int() => Some(self.bits() as f64),
            _ => None,
        }?;
        match to {
            Mode::F32 => Some(Tarval::F32(as_f64 as f32)),
            Mode::F64 => Some(Tarval::F64(as_f64)),
            m if m.is_int() => Tarval::from_bits(m, as_f64 as i64 as u64),
            _ => None,
        }
    }

    /// Parses a literal of the given mode, as written in the textual IR.
    #[must_use]
    pub fn parse(mode: Mode, text: &str) -> Option<Tarval> {
        match mode {
            Mode::Bool => match text {
                "true" | "1" => Some(Tarval::Bool(true)),
                "false" | "0" => Some(Tarval::Bool(false)),
                _ => None,
            },
            Mode::F32 => text.parse().ok().map(Tarval::F32),
            Mode::F64 => text.parse().ok().map(Tarval::F64),
            Mode::P => text.parse().ok().map(Tarval::P),
            m if m.is_int() => {
                // literals that do not fit the mode are rejected, not
                // truncated
                if let Ok(v) = text.parse::<i64>() {
                    let tv = Tarval::from_bits(m, v as u64)?;
                    let fits = if m.is_signed() {
                        let shift = 64 - m.bits();
                        (((v as u64) << shift) as i64) >> shift == v
                    } else {
                        v >= 0 && tv.bits() == v as u64
                    };
                    fits.then_some(tv)
                } else {
                    let v = text.parse::<u64>().ok()?;
                    let tv = Tarval::from_bits(m, v)?;
                    (tv.bits() == v).then_some(tv)
                }
            }
            _ => None,
        }
    }
}

// Bitwise equality keeps NaN == NaN and -0.0 != 0.0, which is what the
// congruence machinery needs from a key type.
impl PartialEq for Tarval {
    fn eq(&self, other: &Self) -> bool {
        self.mode() == other.mode() && self.bits() == other.bits()
    }
}

impl Eq for Tarval {}

impl Hash for Tarval {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mode().hash(state);
        self.bits().hash(state);
    }
}

impl fmt::Display for Tarval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Tarval::I8(v) => write!(f, "{v}"),
            Tarval::I16(v) => write!(f, "{v}"),
            Tarval::I32(v) => write!(f, "{v}"),
            Tarval::I64(v) => write!(f, "{v}"),
            Tarval::U8(v) => write!(f, "{v}"),
            Tarval::U16(v) => write!(f, "{v}"),
            Tarval::U32(v) => write!(f, "{v}"),
            Tarval::U64(v) => write!(f, "{v}"),
            Tarval::F32(v) => write!(f, "{v}"),
            Tarval::F64(v) => write!(f, "{v}"),
            Tarval::Bool(v) => write!(f, "{v}"),
            Tarval::P(v) => write!(f, "{v:#x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_add() {
        let a = Tarval::I8(120);
        let b = Tarval::I8(10);
        assert_eq!(a.add(&b), Some(Tarval::I8(-126)));
    }

    #[test]
    fn test_mode_mismatch_rejected() {
        assert_eq!(Tarval::I8(1).add(&Tarval::I16(1)), None);
    }

    #[test]
    fn test_shift_past_width() {
        assert_eq!(Tarval::U8(0xFF).shl(&Tarval::I32(8)), Some(Tarval::U8(0)));
        assert_eq!(Tarval::I8(-1).shrs(&Tarval::I32(20)), Some(Tarval::I8(-1)));
    }

    #[test]
    fn test_rotl() {
        assert_eq!(Tarval::U8(0b1000_0001).rotl(&Tarval::I32(1)), Some(Tarval::U8(0b0000_0011)));
    }

    #[test]
    fn test_neutral_elements() {
        assert!(Tarval::null(Mode::I32).unwrap().is_null());
        assert!(Tarval::one(Mode::U16).unwrap().is_one());
        assert!(Tarval::all_one(Mode::U8).unwrap().is_all_one());
        assert_eq!(Tarval::all_one(Mode::F32), None);
    }

    #[test]
    fn test_float_bitwise_equality() {
        assert_eq!(Tarval::F64(f64::NAN), Tarval::F64(f64::NAN));
        assert_ne!(Tarval::F64(0.0), Tarval::F64(-0.0));
    }

    #[test]
    fn test_compare_unordered() {
        assert_eq!(Tarval::F32(f32::NAN).compare(&Tarval::F32(1.0)), None);
        assert_eq!(Tarval::I32(3).compare(&Tarval::I32(7)), Some(Ordering::Less));
    }

    #[test]
    fn test_convert() {
        assert_eq!(Tarval::I32(-1).convert(Mode::I8), Some(Tarval::I8(-1)));
        assert_eq!(Tarval::I8(-1).convert(Mode::U32), Some(Tarval::U32(0xFFFF_FFFF)));
        assert_eq!(Tarval::I32(2).convert(Mode::F64), Some(Tarval::F64(2.0)));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Tarval::parse(Mode::I32, "-5"), Some(Tarval::I32(-5)));
        assert_eq!(Tarval::parse(Mode::Bool, "true"), Some(Tarval::Bool(true)));
        assert_eq!(Tarval::parse(Mode::U64, "18446744073709551615"), Some(Tarval::U64(u64::MAX)));
        assert_eq!(Tarval::parse(Mode::I32, "x"), None);
    }
}
