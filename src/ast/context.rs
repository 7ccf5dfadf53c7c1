//! Rounding contexts and host-embedded (foreign) values.
//!
//! A rounding context describes the precision and rounding mode under which arithmetic executes.
//! Contexts are lexically scoped in FPy programs (`with ctx:`) and appear as values, either as
//! constructor expressions like `IEEEContext(11, 64, RNE)` or as foreign values captured from the
//! host environment.

use std::{fmt, str::FromStr};

use num::{BigInt, BigRational, Signed, ToPrimitive, Zero};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// IEEE 754 and extended rounding modes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
pub enum RoundingMode {
    /// Round to nearest, ties to even
    RNE,
    /// Round to nearest, ties away from zero
    RNA,
    /// Round toward positive infinity
    RTP,
    /// Round toward negative infinity
    RTN,
    /// Round toward zero
    RTZ,
    /// Round away from zero
    RAZ,
    /// Round to odd
    RTO,
    /// Round to even
    RTE,
}

/// A statically describable rounding context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Context {
    /// Exact real arithmetic; nothing is rounded.
    Real,
    /// IEEE 754 binary format with `es` exponent bits and `nbits` total bits.
    Ieee {
        /// Exponent field width
        es: u32,
        /// Total storage width
        nbits: u32,
        /// Rounding mode
        rm: RoundingMode,
    },
    /// Arbitrary-precision floating point with `prec` significand bits and unbounded exponent.
    MpFloat {
        /// Significand precision
        prec: u32,
        /// Rounding mode
        rm: RoundingMode,
    },
    /// Unbounded fixed point whose least significant digit has weight `2^nmin + 1`.
    MpFixed {
        /// Position of the first unrepresentable digit
        nmin: i64,
        /// Rounding mode
        rm: RoundingMode,
    },
    /// Bounded fixed point.
    Fixed {
        /// Two's complement when set
        signed: bool,
        /// Weight exponent of the least significant bit
        scale: i64,
        /// Storage width
        nbits: u32,
        /// Rounding mode
        rm: RoundingMode,
    },
}

/// Statically known argument of a context constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtxArg {
    /// Integer argument
    Int(BigInt),
    /// Boolean argument
    Bool(bool),
    /// Rounding mode argument
    Rm(RoundingMode),
}

impl Context {
    /// IEEE 754 binary64 with round-to-nearest-even.
    #[must_use]
    pub const fn fp64() -> Self {
        Self::Ieee {
            es: 11,
            nbits: 64,
            rm: RoundingMode::RNE,
        }
    }

    /// IEEE 754 binary32 with round-to-nearest-even.
    #[must_use]
    pub const fn fp32() -> Self {
        Self::Ieee {
            es: 8,
            nbits: 32,
            rm: RoundingMode::RNE,
        }
    }

    /// Returns `true` for the exact real context.
    #[must_use]
    pub const fn is_real(&self) -> bool {
        matches!(self, Self::Real)
    }

    /// Name of the constructor that builds this context.
    #[must_use]
    pub const fn ctor_name(&self) -> &'static str {
        match self {
            Self::Real => "RealContext",
            Self::Ieee { .. } => "IEEEContext",
            Self::MpFloat { .. } => "MPFloatContext",
            Self::MpFixed { .. } => "MPFixedContext",
            Self::Fixed { .. } => "FixedContext",
        }
    }

    /// Evaluates a context constructor applied to statically known arguments.
    ///
    /// The trailing rounding mode of every constructor is optional and defaults to
    /// [`RoundingMode::RNE`]. Returns `None` for unknown constructors or malformed arguments.
    ///
    /// # Arguments
    ///
    /// * `ctor` - Constructor name, e.g. `IEEEContext`
    /// * `args` - Positional arguments in source order
    #[must_use]
    pub fn from_ctor(ctor: &str, args: &[CtxArg]) -> Option<Self> {
        fn int<T: TryFrom<i64>>(arg: Option<&CtxArg>) -> Option<T> {
            match arg? {
                CtxArg::Int(value) => T::try_from(value.to_i64()?).ok(),
                _ => None,
            }
        }

        fn rm(args: &[CtxArg], position: usize) -> Option<RoundingMode> {
            match args.get(position) {
                None => Some(RoundingMode::RNE),
                Some(CtxArg::Rm(rm)) if args.len() == position + 1 => Some(*rm),
                Some(_) => None,
            }
        }

        match ctor {
            "RealContext" if args.is_empty() => Some(Self::Real),
            "IEEEContext" => Some(Self::Ieee {
                es: int(args.first())?,
                nbits: int(args.get(1))?,
                rm: rm(args, 2)?,
            }),
            "MPFloatContext" => Some(Self::MpFloat {
                prec: int(args.first())?,
                rm: rm(args, 1)?,
            }),
            "MPFixedContext" => Some(Self::MpFixed {
                nmin: int(args.first())?,
                rm: rm(args, 1)?,
            }),
            "FixedContext" => {
                let CtxArg::Bool(signed) = args.first()? else {
                    return None;
                };
                Some(Self::Fixed {
                    signed: *signed,
                    scale: int(args.get(1))?,
                    nbits: int(args.get(2))?,
                    rm: rm(args, 3)?,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "RealContext()"),
            Self::Ieee { es, nbits, rm } => write!(f, "IEEEContext({es}, {nbits}, {rm})"),
            Self::MpFloat { prec, rm } => write!(f, "MPFloatContext({prec}, {rm})"),
            Self::MpFixed { nmin, rm } => write!(f, "MPFixedContext({nmin}, {rm})"),
            Self::Fixed {
                signed,
                scale,
                nbits,
                rm,
            } => {
                let signed = if *signed { "True" } else { "False" };
                write!(f, "FixedContext({signed}, {scale}, {nbits}, {rm})")
            }
        }
    }
}

/// A value embedded from the host environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ForeignValue {
    /// Boolean
    Bool(bool),
    /// Exact rational number
    Number(BigRational),
    /// Rounding context object
    Context(Context),
    /// Rounding mode constant
    RoundingMode(RoundingMode),
    /// Tuple of foreign values
    Tuple(Vec<ForeignValue>),
    /// Any other host object, identified by name only
    Opaque(super::Symbol),
}

impl ForeignValue {
    /// Wraps an integer.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::Number(BigRational::from_integer(BigInt::from(value)))
    }

    /// Returns the numeric value, if this is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<&BigRational> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ForeignValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Number(n) => fmt_rational(n, f),
            Self::Context(ctx) => ctx.fmt(f),
            Self::RoundingMode(rm) => rm.fmt(f),
            Self::Tuple(elts) => {
                f.write_str("(")?;
                for (i, elt) in elts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    elt.fmt(f)?;
                }
                if elts.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::Opaque(name) => write!(f, "<{name}>"),
        }
    }
}

fn fmt_rational(n: &BigRational, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_integer() {
        write!(f, "{}", n.numer())
    } else {
        write!(f, "rational({}, {})", n.numer(), n.denom())
    }
}

/// Parses a decimal literal such as `0.1`, `-2.5e-3` or `7` into an exact rational.
#[must_use]
pub fn parse_decnum(text: &str) -> Option<BigRational> {
    let text = text.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(pos) => (&text[..pos], i64::from_str(&text[pos + 1..]).ok()?),
        None => (text, 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let digits = format!("{int_part}{frac_part}");
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let m = BigInt::from_str(&digits).ok()?;
    let scale = exponent - i64::try_from(frac_part.len()).ok()?;
    let value = scale_by(BigRational::from_integer(m), &BigInt::from(10), scale)?;
    Some(if negative { -value } else { value })
}

/// Parses a C99 hexadecimal floating-point literal such as `0x1.8p3` into an exact rational.
#[must_use]
pub fn parse_hexnum(text: &str) -> Option<BigRational> {
    let text = text.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))?;
    let (mantissa, exponent) = match text.find(['p', 'P']) {
        Some(pos) => (&text[..pos], i64::from_str(&text[pos + 1..]).ok()?),
        None => (text, 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
        None => (mantissa, ""),
    };
    let digits = format!("{int_part}{frac_part}");
    if digits.is_empty() {
        return None;
    }
    let m = BigInt::parse_bytes(digits.as_bytes(), 16)?;
    let scale = exponent - 4 * i64::try_from(frac_part.len()).ok()?;
    let value = scale_by(BigRational::from_integer(m), &BigInt::from(2), scale)?;
    Some(if negative { -value } else { value })
}

/// Computes `m * b^e` exactly for the `digits(m, e, b)` literal form.
#[must_use]
pub fn digits_value(m: &BigInt, e: &BigInt, b: &BigInt) -> Option<BigRational> {
    if b.is_zero() || b.is_negative() {
        return None;
    }
    scale_by(BigRational::from_integer(m.clone()), b, e.to_i64()?)
}

fn scale_by(value: BigRational, base: &BigInt, exponent: i64) -> Option<BigRational> {
    let magnitude = u32::try_from(exponent.unsigned_abs()).ok()?;
    let factor = num::pow(base.clone(), magnitude as usize);
    if exponent >= 0 {
        Some(value * BigRational::from_integer(factor))
    } else {
        Some(value / BigRational::from_integer(factor))
    }
}

/// The exact value `p / q`, or `None` when `q` is zero.
#[must_use]
pub fn rational_value(p: &BigInt, q: &BigInt) -> Option<BigRational> {
    if q.is_zero() {
        None
    } else {
        Some(BigRational::new(p.clone(), q.clone()))
    }
}
