//! Fixed-point numbers.
//!
//! This module contains the [`Format`] of a fixed-point number, which gives
//! its number of integer and fraction bits and its signedness, and the
//! [`FixedPoint`] value type. Arithmetic between values never loses
//! information: additions and subtractions grow one integer bit and
//! multiplications keep all the bits of the product. Bits are only discarded
//! explicitly, with [`FixedPoint::reshape`].

use anyhow::{bail, Result};
use std::ops::{Add, Mul, Neg, Shr, Sub};

/// Maximum width of a fixed-point format in bits.
///
/// Values are stored in an `i128`, which can hold 127-bit signed and unsigned
/// numbers alike.
pub const MAX_WIDTH: u32 = 127;

/// Fixed-point format.
///
/// A format `Q(i, f)` has `i` integer bits and `f` fraction bits. The stored
/// integer `n` of a value in this format represents the number `n / 2^f`.
/// For signed formats the sign bit is counted as an integer bit.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Format {
    integer_bits: u32,
    fraction_bits: u32,
    signed: bool,
}

impl Format {
    /// Creates a new format.
    ///
    /// Fails if the format is signed and has no integer bits, if its width is
    /// zero, or if its width is larger than [`MAX_WIDTH`].
    pub fn new(integer_bits: u32, fraction_bits: u32, signed: bool) -> Result<Format> {
        if signed && integer_bits == 0 {
            bail!("signed fixed-point format needs at least 1 integer bit");
        }
        let Some(width) = integer_bits.checked_add(fraction_bits) else {
            bail!("fixed-point format Q({integer_bits}, {fraction_bits}) is too wide");
        };
        if width == 0 {
            bail!("fixed-point format cannot have zero width");
        }
        if width > MAX_WIDTH {
            bail!("fixed-point format width {width} is larger than {MAX_WIDTH} bits");
        }
        Ok(Format {
            integer_bits,
            fraction_bits,
            signed,
        })
    }

    /// Creates a new signed format.
    pub fn signed(integer_bits: u32, fraction_bits: u32) -> Result<Format> {
        Format::new(integer_bits, fraction_bits, true)
    }

    /// Creates a new unsigned format.
    pub fn unsigned(integer_bits: u32, fraction_bits: u32) -> Result<Format> {
        Format::new(integer_bits, fraction_bits, false)
    }

    /// Creates a signed integer format of the given width.
    pub fn integer(width: u32) -> Result<Format> {
        Format::signed(width, 0)
    }

    // Formats produced by arithmetic operators.
    fn derived(integer_bits: u32, fraction_bits: u32, signed: bool) -> Format {
        match Format::new(integer_bits, fraction_bits, signed) {
            Ok(format) => format,
            Err(err) => panic!("fixed-point arithmetic overflow: {err}"),
        }
    }

    /// Returns the number of integer bits.
    pub fn integer_bits(&self) -> u32 {
        self.integer_bits
    }

    /// Returns the number of fraction bits.
    pub fn fraction_bits(&self) -> u32 {
        self.fraction_bits
    }

    /// Returns `true` if the format is signed.
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Returns the total width in bits.
    pub fn width(&self) -> u32 {
        self.integer_bits + self.fraction_bits
    }

    /// Returns the same format with a different number of integer bits.
    pub fn with_integer_bits(&self, integer_bits: u32) -> Result<Format> {
        Format::new(integer_bits, self.fraction_bits, self.signed)
    }

    /// Smallest stored integer representable in this format.
    pub fn min_bits(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.width() - 1))
        } else {
            0
        }
    }

    /// Largest stored integer representable in this format.
    pub fn max_bits(&self) -> i128 {
        let magnitude_bits = if self.signed {
            self.width() - 1
        } else {
            self.width()
        };
        i128::MAX >> (127 - magnitude_bits)
    }

    /// Wraps an integer to this format by keeping its low `width` bits.
    pub fn wrap(&self, bits: i128) -> i128 {
        let shift = 128 - self.width();
        if self.signed {
            bits.wrapping_shl(shift) >> shift
        } else {
            ((bits as u128).wrapping_shl(shift) >> shift) as i128
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        let prefix = if self.signed { "" } else { "U" };
        write!(f, "{prefix}Q({}, {})", self.integer_bits, self.fraction_bits)
    }
}

impl From<Format> for dsp_json::Format {
    fn from(format: Format) -> dsp_json::Format {
        dsp_json::Format {
            integer_bits: format.integer_bits,
            fraction_bits: format.fraction_bits,
            signed: format.signed,
        }
    }
}

/// Rounding policy used when fraction bits are discarded.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Rounding {
    /// Drop the low bits (rounds towards negative infinity).
    #[default]
    Truncate,
    /// Round to nearest, with ties rounded towards positive infinity.
    RoundHalfUp,
}

/// Fixed-point value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FixedPoint {
    format: Format,
    bits: i128,
}

impl FixedPoint {
    /// Creates a value from its stored integer.
    ///
    /// The integer is wrapped to the width of the format.
    pub fn from_bits(format: Format, bits: i128) -> FixedPoint {
        FixedPoint {
            format,
            bits: format.wrap(bits),
        }
    }

    /// Creates a zero value.
    pub fn zero(format: Format) -> FixedPoint {
        FixedPoint { format, bits: 0 }
    }

    /// Quantizes a floating point constant.
    ///
    /// The constant is rounded to the nearest representable value and then
    /// wrapped to the width of the format.
    pub fn from_f64(value: f64, format: Format) -> FixedPoint {
        let scaled = (value * 2f64.powi(format.fraction_bits as i32)).round();
        FixedPoint::from_bits(format, scaled as i128)
    }

    /// Returns the numeric value as a float.
    pub fn to_f64(&self) -> f64 {
        self.bits as f64 / 2f64.powi(self.format.fraction_bits as i32)
    }

    /// Returns the format of the value.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the stored integer.
    pub fn bits(&self) -> i128 {
        self.bits
    }

    /// Converts the value to a different format.
    ///
    /// Adding fraction bits appends zeros. Removing fraction bits discards
    /// low bits according to `rounding`. Adding integer bits sign-extends or
    /// zero-extends. Removing integer bits discards the high bits silently,
    /// so values outside the range of the new format wrap around.
    pub fn reshape(&self, format: Format, rounding: Rounding) -> FixedPoint {
        let from = self.format.fraction_bits;
        let to = format.fraction_bits;
        let bits = if to >= from {
            self.bits.wrapping_shl(to - from)
        } else {
            let discard = from - to;
            match rounding {
                Rounding::Truncate => self.bits >> discard,
                Rounding::RoundHalfUp => (self.bits >> discard) + ((self.bits >> (discard - 1)) & 1),
            }
        };
        FixedPoint::from_bits(format, bits)
    }

    // Format of a sum or difference.
    fn sum_format(self, other: FixedPoint) -> Format {
        Format::derived(
            self.format.integer_bits.max(other.format.integer_bits) + 1,
            self.format.fraction_bits.max(other.format.fraction_bits),
            self.format.signed || other.format.signed,
        )
    }

    // Stored integer scaled to the fraction bits of `format`.
    fn aligned(self, format: Format) -> i128 {
        self.bits << (format.fraction_bits - self.format.fraction_bits)
    }
}

impl std::fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{} {}", self.to_f64(), self.format)
    }
}

/// Addition.
///
/// The result has one more integer bit than the widest operand.
///
/// # Panics
///
/// Panics if the result format would be wider than [`MAX_WIDTH`].
impl Add for FixedPoint {
    type Output = FixedPoint;

    fn add(self, rhs: FixedPoint) -> FixedPoint {
        let format = self.sum_format(rhs);
        FixedPoint::from_bits(format, self.aligned(format) + rhs.aligned(format))
    }
}

/// Subtraction.
///
/// The result has one more integer bit than the widest operand.
///
/// # Panics
///
/// Panics if the result format would be wider than [`MAX_WIDTH`].
impl Sub for FixedPoint {
    type Output = FixedPoint;

    fn sub(self, rhs: FixedPoint) -> FixedPoint {
        let format = self.sum_format(rhs);
        FixedPoint::from_bits(format, self.aligned(format) - rhs.aligned(format))
    }
}

/// Multiplication.
///
/// The integer and fraction bits of the result are the sums of those of the
/// operands.
///
/// # Panics
///
/// Panics if the result format would be wider than [`MAX_WIDTH`].
impl Mul for FixedPoint {
    type Output = FixedPoint;

    fn mul(self, rhs: FixedPoint) -> FixedPoint {
        let format = Format::derived(
            self.format.integer_bits + rhs.format.integer_bits,
            self.format.fraction_bits + rhs.format.fraction_bits,
            self.format.signed || rhs.format.signed,
        );
        FixedPoint::from_bits(format, self.bits * rhs.bits)
    }
}

/// Negation.
///
/// Signed values keep their format, so the most negative value wraps onto
/// itself. Unsigned values become signed and grow one integer bit.
impl Neg for FixedPoint {
    type Output = FixedPoint;

    fn neg(self) -> FixedPoint {
        let format = if self.format.signed {
            self.format
        } else {
            Format::derived(
                self.format.integer_bits + 1,
                self.format.fraction_bits,
                true,
            )
        };
        FixedPoint::from_bits(format, -self.bits)
    }
}

/// Arithmetic right shift, keeping the format.
impl Shr<u32> for FixedPoint {
    type Output = FixedPoint;

    fn shr(self, rhs: u32) -> FixedPoint {
        FixedPoint {
            format: self.format,
            bits: self.bits >> rhs.min(127),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn q(integer_bits: u32, fraction_bits: u32) -> Format {
        Format::signed(integer_bits, fraction_bits).unwrap()
    }

    #[test]
    fn invalid_formats() {
        assert!(Format::signed(0, 8).is_err());
        assert!(Format::unsigned(0, 0).is_err());
        assert!(Format::signed(100, 28).is_err());
        assert!(Format::unsigned(0, 8).is_ok());
        assert!(Format::signed(120, 7).is_ok());
    }

    #[test]
    fn wrap() {
        let format = q(4, 0);
        assert_eq!(format.wrap(7), 7);
        assert_eq!(format.wrap(8), -8);
        assert_eq!(format.wrap(-9), 7);
        let format = Format::unsigned(4, 0).unwrap();
        assert_eq!(format.wrap(-1), 15);
        assert_eq!(format.wrap(16), 0);
        let wide = Format::unsigned(127, 0).unwrap();
        assert_eq!(wide.wrap(-1), wide.max_bits());
    }

    #[test]
    fn add_sub_growth() {
        let a = FixedPoint::from_f64(0.75, q(1, 2));
        let b = FixedPoint::from_f64(0.875, q(2, 3));
        let sum = a + b;
        assert_eq!(sum.format(), q(3, 3));
        assert_eq!(sum.to_f64(), 1.625);
        let diff = a - b;
        assert_eq!(diff.format(), q(3, 3));
        assert_eq!(diff.to_f64(), -0.125);
        let u = FixedPoint::from_f64(3.0, Format::unsigned(2, 0).unwrap());
        assert_eq!((u + u).format(), Format::unsigned(3, 0).unwrap());
        assert_eq!((u + a).format(), q(3, 2));
    }

    #[test]
    fn mul_growth() {
        let a = FixedPoint::from_f64(-0.5, q(1, 3));
        let b = FixedPoint::from_f64(1.25, q(2, 2));
        let product = a * b;
        assert_eq!(product.format(), q(3, 5));
        assert_eq!(product.to_f64(), -0.625);
        // the most negative values do not overflow
        let m = FixedPoint::from_bits(q(1, 3), -8);
        assert_eq!((m * m).to_f64(), 1.0);
    }

    #[test]
    fn reshape_truncates_towards_negative_infinity() {
        let x = FixedPoint::from_bits(q(4, 2), -5); // -1.25
        assert_eq!(x.reshape(q(4, 0), Rounding::Truncate).bits(), -2);
        assert_eq!(x.reshape(q(4, 0), Rounding::RoundHalfUp).bits(), -1);
        let y = FixedPoint::from_bits(q(4, 2), 6); // 1.5
        assert_eq!(y.reshape(q(4, 0), Rounding::Truncate).bits(), 1);
        assert_eq!(y.reshape(q(4, 0), Rounding::RoundHalfUp).bits(), 2);
        let z = FixedPoint::from_bits(q(4, 2), 5); // 1.25
        assert_eq!(z.reshape(q(4, 0), Rounding::RoundHalfUp).bits(), 1);
    }

    #[test]
    fn reshape_integer_bits() {
        let x = FixedPoint::from_f64(-3.0, q(3, 0));
        assert_eq!(x.reshape(q(8, 0), Rounding::Truncate).bits(), -3);
        // 5 does not fit in Q(3, 0) and wraps
        let y = FixedPoint::from_f64(5.0, q(4, 0));
        assert_eq!(y.reshape(q(3, 0), Rounding::Truncate).bits(), -3);
    }

    #[test]
    fn widen_then_narrow_is_lossless() {
        for &(integer_bits, fraction_bits) in &[(1, 0), (1, 7), (3, 2), (8, 8)] {
            let format = q(integer_bits, fraction_bits);
            let wide = q(integer_bits + 5, fraction_bits + 3);
            for bits in format.min_bits()..=format.max_bits().min(300) {
                let x = FixedPoint::from_bits(format, bits);
                let back = x
                    .reshape(wide, Rounding::Truncate)
                    .reshape(format, Rounding::Truncate);
                assert_eq!(back, x);
            }
        }
    }

    #[test]
    fn negation() {
        let x = FixedPoint::from_bits(q(2, 1), -4);
        assert_eq!((-x).bits(), -4);
        let u = FixedPoint::from_bits(Format::unsigned(2, 1).unwrap(), 7);
        let n = -u;
        assert_eq!(n.format(), q(3, 1));
        assert_eq!(n.bits(), -7);
    }

    #[test]
    fn shift() {
        let x = FixedPoint::from_bits(q(5, 0), -7);
        assert_eq!((x >> 1).bits(), -4);
        assert_eq!((x >> 1).format(), q(5, 0));
    }

    #[test]
    fn constants() {
        let format = q(2, 11);
        assert_eq!(FixedPoint::from_f64(1.0, format).bits(), 2048);
        assert_eq!(
            FixedPoint::from_f64(std::f64::consts::FRAC_1_SQRT_2, format).bits(),
            1448
        );
        // out of range constants wrap
        assert_eq!(FixedPoint::from_f64(2.0, format).bits(), -4096);
        assert_eq!(format.to_string(), "Q(2, 11)");
    }
}
