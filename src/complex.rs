//! Complex fixed-point numbers.
//!
//! A [`Complex`] is a pair of [`FixedPoint`] lanes that always share the same
//! [`Format`]. The arithmetic follows the growth rules of the fixed-point
//! lanes, so a product has the format of `re * re - im * im`.

use crate::fixed_point::{FixedPoint, Format, Rounding};
use anyhow::{bail, Result};
use num_complex::Complex64;
use std::ops::{Add, Mul, Neg, Shr, Sub};

/// Complex fixed-point value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Complex {
    re: FixedPoint,
    im: FixedPoint,
}

impl Complex {
    /// Creates a complex value from its real and imaginary parts.
    ///
    /// Fails if both parts do not have the same format.
    pub fn new(re: FixedPoint, im: FixedPoint) -> Result<Complex> {
        if re.format() != im.format() {
            bail!(
                "complex lanes have different formats: {} and {}",
                re.format(),
                im.format()
            );
        }
        Ok(Complex { re, im })
    }

    /// Creates a complex value from the stored integers of its lanes.
    pub fn from_bits(format: Format, re: i128, im: i128) -> Complex {
        Complex {
            re: FixedPoint::from_bits(format, re),
            im: FixedPoint::from_bits(format, im),
        }
    }

    /// Creates a zero value.
    pub fn zero(format: Format) -> Complex {
        Complex::from_bits(format, 0, 0)
    }

    /// Quantizes a floating point complex constant.
    pub fn from_c64(value: Complex64, format: Format) -> Complex {
        Complex {
            re: FixedPoint::from_f64(value.re, format),
            im: FixedPoint::from_f64(value.im, format),
        }
    }

    /// Returns the numeric value as a floating point complex.
    pub fn to_c64(&self) -> Complex64 {
        Complex64::new(self.re.to_f64(), self.im.to_f64())
    }

    /// Returns the real part.
    pub fn re(&self) -> FixedPoint {
        self.re
    }

    /// Returns the imaginary part.
    pub fn im(&self) -> FixedPoint {
        self.im
    }

    /// Returns the format of both lanes.
    pub fn format(&self) -> Format {
        self.re.format()
    }

    /// Converts both lanes to a different format.
    pub fn reshape(&self, format: Format, rounding: Rounding) -> Complex {
        Complex {
            re: self.re.reshape(format, rounding),
            im: self.im.reshape(format, rounding),
        }
    }

    /// Multiplies by `-j`.
    ///
    /// This swaps the lanes and negates the new imaginary part, so no
    /// multiplier is needed. For signed formats the result keeps the format.
    pub fn mul_neg_j(&self) -> Complex {
        let im = -self.re;
        Complex {
            re: self.im.reshape(im.format(), Rounding::Truncate),
            im,
        }
    }
}

impl std::fmt::Display for Complex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.to_c64())
    }
}

impl Add for Complex {
    type Output = Complex;

    fn add(self, rhs: Complex) -> Complex {
        Complex {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl Sub for Complex {
    type Output = Complex;

    fn sub(self, rhs: Complex) -> Complex {
        Complex {
            re: self.re - rhs.re,
            im: self.im - rhs.im,
        }
    }
}

impl Mul for Complex {
    type Output = Complex;

    fn mul(self, rhs: Complex) -> Complex {
        Complex {
            re: self.re * rhs.re - self.im * rhs.im,
            im: self.re * rhs.im + self.im * rhs.re,
        }
    }
}

impl Neg for Complex {
    type Output = Complex;

    fn neg(self) -> Complex {
        Complex {
            re: -self.re,
            im: -self.im,
        }
    }
}

impl Shr<u32> for Complex {
    type Output = Complex;

    fn shr(self, rhs: u32) -> Complex {
        Complex {
            re: self.re >> rhs,
            im: self.im >> rhs,
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
    fn mismatched_lanes() {
        let re = FixedPoint::zero(q(1, 4));
        let im = FixedPoint::zero(q(2, 4));
        assert!(Complex::new(re, im).is_err());
        assert!(Complex::new(re, re).is_ok());
    }

    #[test]
    fn product() {
        let a = Complex::from_c64(Complex64::new(0.5, -0.25), q(1, 3));
        let b = Complex::from_c64(Complex64::new(-0.75, 0.5), q(1, 3));
        let p = a * b;
        assert_eq!(p.format(), q(3, 6));
        assert_eq!(p.to_c64(), Complex64::new(0.5, -0.25) * Complex64::new(-0.75, 0.5));
    }

    #[test]
    fn sum_and_difference() {
        let a = Complex::from_bits(q(3, 0), 3, -4);
        let b = Complex::from_bits(q(3, 0), -4, -4);
        assert_eq!(a + b, Complex::from_bits(q(4, 0), -1, -8));
        assert_eq!(a - b, Complex::from_bits(q(4, 0), 7, 0));
    }

    #[test]
    fn neg_j() {
        let a = Complex::from_bits(q(4, 2), 5, -3);
        let r = a.mul_neg_j();
        assert_eq!(r, Complex::from_bits(q(4, 2), -3, -5));
        assert_eq!(r.to_c64(), a.to_c64() * Complex64::new(0.0, -1.0));
    }

    #[test]
    fn reshape_and_shift() {
        let a = Complex::from_bits(q(4, 2), 7, -7);
        assert_eq!(
            a.reshape(q(4, 0), Rounding::Truncate),
            Complex::from_bits(q(4, 0), 1, -2)
        );
        assert_eq!(a >> 1, Complex::from_bits(q(4, 2), 3, -4));
    }
}
