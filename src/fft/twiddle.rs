//! Twiddle factor stages.
//!
//! Between the butterfly stages of a decimation-in-frequency FFT each sample
//! is rotated by a twiddle factor `exp(-j 2 pi k / N)` that depends on its
//! position in the block. [`R22TwiddleStage`] applies the trivial `-j`
//! rotations of a radix-2² decomposition, which need no multipliers.
//! [`TwiddleStage`] applies the general rotations, reading the factors from a
//! table indexed by a counter of accepted samples.

use crate::{
    complex::Complex,
    counter::ModCounter,
    fixed_point::{FixedPoint, Format, Rounding},
    stream::{Chain, Register, Registered, Stage},
};
use anyhow::{bail, Result};
pub use dsp_json::Rotator as RotatorKind;
use num_complex::Complex64;
use std::f64::consts::PI;

/// Twiddle factor indices of a radix-2² stage pair of size `n`.
///
/// Each element `(k, n)` stands for the factor `exp(-j 2 pi k / n)`.
pub fn radix22_twiddles(n: usize) -> Vec<(usize, usize)> {
    let mut factors = Vec::with_capacity(n);
    for k1 in 0..2 {
        for k2 in 0..2 {
            factors.extend((0..n / 4).map(|n3| (n3 * (k1 + 2 * k2), n)));
        }
    }
    factors
}

/// Twiddle factor indices of a radix-2 stage of size `n`.
pub fn radix2_twiddles(n: usize) -> Vec<(usize, usize)> {
    std::iter::repeat((0, n))
        .take(n / 2)
        .chain((0..n / 2).map(|k| (k, n)))
        .collect()
}

/// Trivial twiddle stage of a radix-2² FFT.
///
/// Multiplies the last quarter of each block of `N` samples by `-j`.
#[derive(Debug, Clone)]
pub struct R22TwiddleStage {
    counter: ModCounter,
    format: Format,
    output: Register<Complex>,
}

impl R22TwiddleStage {
    /// Creates a trivial twiddle stage for blocks of `size` samples.
    pub fn new(size: usize, format: Format) -> Result<R22TwiddleStage> {
        if size < 4 || !size.is_power_of_two() {
            bail!("radix-2² twiddle stage size {size} is not a power of two larger than 2");
        }
        if !format.is_signed() {
            bail!("radix-2² twiddle stage needs a signed format, got {format}");
        }
        Ok(R22TwiddleStage {
            counter: ModCounter::new(size),
            format,
            output: Register::new(),
        })
    }

    /// Returns the block size.
    pub fn size(&self) -> usize {
        self.counter.modulus()
    }

    /// Returns the sample format.
    pub fn format(&self) -> Format {
        self.format
    }
}

impl Stage for R22TwiddleStage {
    type Input = Complex;
    type Output = Complex;

    fn ready(&self, output_ready: bool) -> bool {
        self.output.produce(output_ready)
    }

    fn output(&self, _input: Option<&Complex>) -> Option<Complex> {
        self.output.output()
    }

    fn clock(&mut self, input: Option<&Complex>, output_ready: bool) {
        if !self.output.produce(output_ready) {
            return;
        }
        let last_quarter = self.counter.value() >= 3 * self.size() / 4;
        self.output.load(input.map(|x| if last_quarter { x.mul_neg_j() } else { *x }));
        if input.is_some() {
            self.counter.advance();
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Operands {
    x: Complex,
    w: Complex,
}

fn rotate(operands: &Operands) -> Complex {
    (operands.x * operands.w).reshape(operands.x.format(), Rounding::Truncate)
}

// Terms of the 3-multiplier product (a + jb)(c + jd):
//   k1 = b (c - d), k2 = c (a - b), k3 = d (a + b)
//   re = k1 + k2, im = k1 + k3
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct PreAdded {
    b: FixedPoint,
    c_minus_d: FixedPoint,
    c: FixedPoint,
    a_minus_b: FixedPoint,
    d: FixedPoint,
    a_plus_b: FixedPoint,
    format: Format,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Products {
    k1: FixedPoint,
    k2: FixedPoint,
    k3: FixedPoint,
    format: Format,
}

fn pre_add(operands: &Operands) -> PreAdded {
    let (a, b) = (operands.x.re(), operands.x.im());
    let (c, d) = (operands.w.re(), operands.w.im());
    PreAdded {
        b,
        c_minus_d: c - d,
        c,
        a_minus_b: a - b,
        d,
        a_plus_b: a + b,
        format: operands.x.format(),
    }
}

fn multiply(terms: &PreAdded) -> Products {
    Products {
        k1: terms.b * terms.c_minus_d,
        k2: terms.c * terms.a_minus_b,
        k3: terms.d * terms.a_plus_b,
        format: terms.format,
    }
}

fn post_add(products: &Products) -> Complex {
    let re = products.k1 + products.k2;
    let im = products.k1 + products.k3;
    Complex::from_bits(re.format(), re.bits(), im.bits())
        .reshape(products.format, Rounding::Truncate)
}

type ThreeMultiplier = Chain<
    Registered<Operands, PreAdded>,
    Chain<Registered<PreAdded, Products>, Registered<Products, Complex>>,
>;

// Registered complex multiplier.
#[derive(Debug, Clone)]
enum Rotator {
    // Four real multipliers and a single register stage.
    Direct(Registered<Operands, Complex>),
    // Three real multipliers with registered pre-adders and post-adders.
    // Bit-exact with Direct, with two more cycles of latency.
    ThreeMultiplier(ThreeMultiplier),
}

impl Rotator {
    fn new(kind: RotatorKind) -> Rotator {
        match kind {
            RotatorKind::Direct => Rotator::Direct(Registered::new(rotate)),
            RotatorKind::ThreeMultiplier => Rotator::ThreeMultiplier(Chain::new(
                Registered::new(pre_add),
                Chain::new(Registered::new(multiply), Registered::new(post_add)),
            )),
        }
    }

    fn kind(&self) -> RotatorKind {
        match self {
            Rotator::Direct(_) => RotatorKind::Direct,
            Rotator::ThreeMultiplier(_) => RotatorKind::ThreeMultiplier,
        }
    }
}

impl Stage for Rotator {
    type Input = Operands;
    type Output = Complex;

    fn ready(&self, output_ready: bool) -> bool {
        match self {
            Rotator::Direct(stage) => stage.ready(output_ready),
            Rotator::ThreeMultiplier(stage) => stage.ready(output_ready),
        }
    }

    fn output(&self, input: Option<&Operands>) -> Option<Complex> {
        match self {
            Rotator::Direct(stage) => stage.output(input),
            Rotator::ThreeMultiplier(stage) => stage.output(input),
        }
    }

    fn clock(&mut self, input: Option<&Operands>, output_ready: bool) {
        match self {
            Rotator::Direct(stage) => stage.clock(input, output_ready),
            Rotator::ThreeMultiplier(stage) => stage.clock(input, output_ready),
        }
    }
}

/// Twiddle stage.
///
/// Rotates each accepted sample by the next factor of a table, wrapping
/// around at the end of the table. The output keeps the input format.
#[derive(Debug, Clone)]
pub struct TwiddleStage {
    factors: Vec<Complex>,
    counter: ModCounter,
    format: Format,
    twiddle_format: Format,
    rotator: Rotator,
}

impl TwiddleStage {
    /// Creates a twiddle stage.
    ///
    /// `factors` lists the `(k, N)` pairs of the factors
    /// `exp(-j 2 pi k / N)`, which are quantized to `twiddle_format`.
    pub fn new(
        factors: &[(usize, usize)],
        format: Format,
        twiddle_format: Format,
        rotator: RotatorKind,
    ) -> Result<TwiddleStage> {
        if factors.is_empty() {
            bail!("twiddle table is empty");
        }
        if !twiddle_format.is_signed() || twiddle_format.integer_bits() < 2 {
            bail!("twiddle format {twiddle_format} cannot represent 1 and -1");
        }
        let factors = factors
            .iter()
            .map(|&(k, n)| {
                let angle = -2.0 * PI * k as f64 / n as f64;
                Complex::from_c64(Complex64::from_polar(1.0, angle), twiddle_format)
            })
            .collect::<Vec<_>>();
        Ok(TwiddleStage {
            counter: ModCounter::new(factors.len()),
            factors,
            format,
            twiddle_format,
            rotator: Rotator::new(rotator),
        })
    }

    /// Returns the quantized twiddle factors.
    pub fn factors(&self) -> &[Complex] {
        &self.factors
    }

    /// Returns the sample format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the twiddle factor format.
    pub fn twiddle_format(&self) -> Format {
        self.twiddle_format
    }

    /// Returns the multiplier architecture.
    pub fn rotator(&self) -> RotatorKind {
        self.rotator.kind()
    }

    fn operands(&self, input: Option<&Complex>) -> Option<Operands> {
        input.map(|&x| Operands {
            x,
            w: self.factors[self.counter.value()],
        })
    }
}

impl Stage for TwiddleStage {
    type Input = Complex;
    type Output = Complex;

    fn ready(&self, output_ready: bool) -> bool {
        self.rotator.ready(output_ready)
    }

    fn output(&self, input: Option<&Complex>) -> Option<Complex> {
        self.rotator.output(self.operands(input).as_ref())
    }

    fn clock(&mut self, input: Option<&Complex>, output_ready: bool) {
        let operands = self.operands(input);
        let consumed = self.rotator.consumes(operands.as_ref(), output_ready);
        self.rotator.clock(operands.as_ref(), output_ready);
        if consumed {
            self.counter.advance();
        }
    }
}
