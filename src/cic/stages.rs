//! CIC filter stages.
//!
//! All the stages work on complex integer samples. The combs, integrators and
//! rate changers have a registered output. The [`Requantizer`] is
//! combinational and adapts the width of the samples between stages.

use crate::{
    complex::Complex,
    counter::ModCounter,
    delay::Delay,
    fixed_point::{Format, Rounding},
    stream::{impl_stage_enum, Register, Stage},
};
use anyhow::Result;

/// Comb stage.
///
/// Computes `x[n] - x[n - M]`, where the delay `M` counts accepted samples.
#[derive(Debug, Clone)]
pub struct Comb {
    delay: Delay<Complex>,
    input_format: Format,
    output_format: Format,
    output: Register<Complex>,
}

impl Comb {
    /// Creates a comb stage with differential delay `M`.
    pub fn new(differential_delay: usize, input_format: Format, output_format: Format) -> Result<Comb> {
        Ok(Comb {
            delay: Delay::new(differential_delay, Complex::zero(input_format))?,
            input_format,
            output_format,
            output: Register::new(),
        })
    }

    /// Returns the differential delay.
    pub fn differential_delay(&self) -> usize {
        self.delay.depth()
    }

    /// Returns the input format.
    pub fn input_format(&self) -> Format {
        self.input_format
    }

    /// Returns the output format.
    pub fn output_format(&self) -> Format {
        self.output_format
    }
}

impl Stage for Comb {
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
        let difference =
            input.map(|&x| (x - *self.delay.oldest()).reshape(self.output_format, Rounding::Truncate));
        self.output.load(difference);
        if let Some(&x) = input {
            self.delay.shift(x);
        }
    }
}

/// Integrator stage.
///
/// Accumulates its input. The accumulator wraps around at the output width,
/// which is harmless as long as the following combs use modular arithmetic of
/// at least the same width.
#[derive(Debug, Clone)]
pub struct Integrator {
    accumulator: Complex,
    input_format: Format,
    output: Register<Complex>,
}

impl Integrator {
    /// Creates an integrator stage.
    pub fn new(input_format: Format, output_format: Format) -> Integrator {
        Integrator {
            accumulator: Complex::zero(output_format),
            input_format,
            output: Register::new(),
        }
    }

    /// Returns the input format.
    pub fn input_format(&self) -> Format {
        self.input_format
    }

    /// Returns the output format.
    pub fn output_format(&self) -> Format {
        self.accumulator.format()
    }
}

impl Stage for Integrator {
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
        match input {
            Some(&x) => {
                self.accumulator =
                    (self.accumulator + x).reshape(self.accumulator.format(), Rounding::Truncate);
                self.output.load(Some(self.accumulator));
            }
            None => self.output.load(None),
        }
    }
}

/// Zero-stuffing upsampler.
///
/// Each accepted sample is followed by `R - 1` zeros, during which the input
/// is not ready.
#[derive(Debug, Clone)]
pub struct Upsampler {
    counter: ModCounter,
    format: Format,
    output: Register<Complex>,
}

impl Upsampler {
    /// Creates an upsampler by a factor `rate`.
    pub fn new(rate: usize, format: Format) -> Upsampler {
        Upsampler {
            counter: ModCounter::new(rate),
            format,
            output: Register::new(),
        }
    }

    /// Returns the upsampling factor.
    pub fn rate(&self) -> usize {
        self.counter.modulus()
    }

    /// Returns the sample format.
    pub fn format(&self) -> Format {
        self.format
    }
}

impl Stage for Upsampler {
    type Input = Complex;
    type Output = Complex;

    fn ready(&self, output_ready: bool) -> bool {
        self.output.produce(output_ready) && self.counter.is_zero()
    }

    fn output(&self, _input: Option<&Complex>) -> Option<Complex> {
        self.output.output()
    }

    fn clock(&mut self, input: Option<&Complex>, output_ready: bool) {
        if !self.output.produce(output_ready) {
            return;
        }
        if self.counter.is_zero() {
            self.output.load(input.copied());
            if input.is_some() {
                self.counter.advance();
            }
        } else {
            self.output.load(Some(Complex::zero(self.format)));
            self.counter.advance();
        }
    }
}

/// Downsampler.
///
/// Accepts every sample and forwards one out of each `R`. The samples that
/// are dropped are accepted even if the output is stalled.
#[derive(Debug, Clone)]
pub struct Downsampler {
    counter: ModCounter,
    format: Format,
    output: Register<Complex>,
}

impl Downsampler {
    /// Creates a downsampler by a factor `rate`.
    pub fn new(rate: usize, format: Format) -> Downsampler {
        Downsampler {
            counter: ModCounter::new(rate),
            format,
            output: Register::new(),
        }
    }

    /// Returns the downsampling factor.
    pub fn rate(&self) -> usize {
        self.counter.modulus()
    }

    /// Returns the sample format.
    pub fn format(&self) -> Format {
        self.format
    }
}

impl Stage for Downsampler {
    type Input = Complex;
    type Output = Complex;

    fn ready(&self, output_ready: bool) -> bool {
        self.output.produce(output_ready) || !self.counter.is_zero()
    }

    fn output(&self, _input: Option<&Complex>) -> Option<Complex> {
        self.output.output()
    }

    fn clock(&mut self, input: Option<&Complex>, output_ready: bool) {
        let forward = self.counter.is_zero();
        if self.consumes(input, output_ready) {
            self.counter.advance();
        }
        if self.output.produce(output_ready) {
            self.output.load(input.copied().filter(|_| forward));
        }
    }
}

/// Requantizer.
///
/// Shifts the samples and wraps them to the output width. A positive shift
/// discards low bits (truncating) and a negative shift appends zero bits.
#[derive(Debug, Clone)]
pub struct Requantizer {
    shift: i32,
    input_format: Format,
    output_format: Format,
}

impl Requantizer {
    /// Creates a requantizer.
    pub fn new(shift: i32, input_format: Format, output_format: Format) -> Requantizer {
        Requantizer {
            shift,
            input_format,
            output_format,
        }
    }

    /// Returns the shift.
    pub fn shift(&self) -> i32 {
        self.shift
    }

    /// Returns the input format.
    pub fn input_format(&self) -> Format {
        self.input_format
    }

    /// Returns the output format.
    pub fn output_format(&self) -> Format {
        self.output_format
    }

    fn requantize(&self, x: &Complex) -> Complex {
        if self.shift >= 0 {
            (*x >> self.shift.unsigned_abs()).reshape(self.output_format, Rounding::Truncate)
        } else {
            let shift = self.shift.unsigned_abs();
            Complex::from_bits(
                self.output_format,
                x.re().bits().wrapping_shl(shift),
                x.im().bits().wrapping_shl(shift),
            )
        }
    }
}

impl Stage for Requantizer {
    type Input = Complex;
    type Output = Complex;

    fn ready(&self, output_ready: bool) -> bool {
        output_ready
    }

    fn output(&self, input: Option<&Complex>) -> Option<Complex> {
        input.map(|x| self.requantize(x))
    }

    fn clock(&mut self, _input: Option<&Complex>, _output_ready: bool) {}
}

/// CIC filter stage.
#[derive(Debug, Clone)]
pub enum CicStage {
    /// Comb stage.
    Comb(Comb),
    /// Integrator stage.
    Integrator(Integrator),
    /// Upsampler.
    Upsampler(Upsampler),
    /// Downsampler.
    Downsampler(Downsampler),
    /// Requantizer.
    Requantizer(Requantizer),
}

impl_stage_enum!(CicStage, Complex, Comb, Integrator, Upsampler, Downsampler, Requantizer);

impl CicStage {
    /// Returns a summary of the stage.
    pub fn summary(&self) -> dsp_json::StageSummary {
        let (name, input_format, output_format, detail) = match self {
            CicStage::Comb(s) => (
                "comb",
                s.input_format(),
                s.output_format(),
                Some(format!("differential delay {}", s.differential_delay())),
            ),
            CicStage::Integrator(s) => ("integrator", s.input_format(), s.output_format(), None),
            CicStage::Upsampler(s) => (
                "upsampler",
                s.format(),
                s.format(),
                Some(format!("rate {}", s.rate())),
            ),
            CicStage::Downsampler(s) => (
                "downsampler",
                s.format(),
                s.format(),
                Some(format!("rate {}", s.rate())),
            ),
            CicStage::Requantizer(s) => (
                "requantizer",
                s.input_format(),
                s.output_format(),
                Some(format!("shift {}", s.shift())),
            ),
        };
        dsp_json::StageSummary {
            name: name.to_string(),
            input_format: input_format.into(),
            output_format: output_format.into(),
            detail,
        }
    }
}
