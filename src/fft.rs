//! Serial FFT.
//!
//! The [`SerialFft`] is a single-path delay feedback (SDF) pipeline that
//! computes the DFT of consecutive blocks of `N` complex samples, accepting
//! one sample per clock cycle in steady state. It uses a radix-2²
//! decimation-in-frequency decomposition: pairs of radix-2 butterflies are
//! separated by a trivial `-j` rotation, and each pair is followed by a
//! twiddle multiplier. A last radix-2 butterfly is used when `log2(N)` is odd.
//!
//! The FFT is unscaled. Each butterfly adds an integer bit, so the output has
//! `log2(N)` more integer bits than the input. Twiddle multipliers keep the
//! format of their input. A rotation preserves the magnitude of a sample but
//! one lane can grow up to `sqrt(2)` times, so the output does not overflow
//! as long as the magnitude `|x|` of every input sample fits in one lane of
//! the input format. Inputs on the corners of the format, such as `(-1, -1)`
//! with one integer bit, may wrap. The output
//! is produced in bit-reversed order unless a [`SerialBitReversal`] is
//! appended to reorder it.
//!
//! References:
//!
//! - S. He and M. Torkelson, "A new approach to pipeline FFT processor",
//!   Proc. IPPS, 1996.

use crate::{
    bit_reversal::{SerialBitExchange, SerialBitReversal},
    complex::Complex,
    fixed_point::{Format, MAX_WIDTH},
    skid_buffer::SkidBuffer,
    stream::{impl_stage_enum, Pipeline, Stage},
};
use anyhow::{bail, Result};
use dsp_json::Rotator;

pub mod butterfly;
pub mod twiddle;

use butterfly::SdfRadix2Stage;
use twiddle::{radix22_twiddles, radix2_twiddles, R22TwiddleStage, TwiddleStage};

/// Serial FFT configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Config {
    /// FFT size (`N`).
    pub size: usize,
    /// Integer bits of the input samples.
    pub integer_bits: u32,
    /// Fraction bits of the input samples.
    pub fraction_bits: u32,
    /// Reorder the output into natural order.
    pub natural_order: bool,
    /// Integer bits of the twiddle factors.
    pub twiddle_integer_bits: u32,
    /// Fraction bits of the twiddle factors.
    pub twiddle_fraction_bits: u32,
    /// Twiddle multiplier architecture.
    pub rotator: Rotator,
    /// Insert a skid buffer after each twiddle multiplier.
    pub skid_buffers: bool,
}

impl Config {
    /// Default integer bits of the twiddle factors.
    pub const TWIDDLE_INTEGER_BITS: u32 = 2;
    /// Default fraction bits of the twiddle factors.
    pub const TWIDDLE_FRACTION_BITS: u32 = 11;

    /// Creates a configuration with natural output order and default
    /// twiddle factors.
    pub fn new(size: usize, integer_bits: u32, fraction_bits: u32) -> Config {
        Config {
            size,
            integer_bits,
            fraction_bits,
            natural_order: true,
            twiddle_integer_bits: Self::TWIDDLE_INTEGER_BITS,
            twiddle_fraction_bits: Self::TWIDDLE_FRACTION_BITS,
            rotator: Rotator::default(),
            skid_buffers: false,
        }
    }

    /// Sets the output order.
    pub fn with_natural_order(self, natural_order: bool) -> Config {
        Config {
            natural_order,
            ..self
        }
    }

    /// Sets the twiddle factor format.
    pub fn with_twiddle_format(self, integer_bits: u32, fraction_bits: u32) -> Config {
        Config {
            twiddle_integer_bits: integer_bits,
            twiddle_fraction_bits: fraction_bits,
            ..self
        }
    }

    /// Sets the twiddle multiplier architecture.
    pub fn with_rotator(self, rotator: Rotator) -> Config {
        Config { rotator, ..self }
    }

    /// Enables or disables the skid buffers after the twiddle multipliers.
    pub fn with_skid_buffers(self, skid_buffers: bool) -> Config {
        Config {
            skid_buffers,
            ..self
        }
    }

    /// Creates a configuration from a JSON design.
    pub fn from_design(design: &dsp_json::FftDesign) -> Result<Config> {
        let Ok(size) = usize::try_from(design.size) else {
            bail!("FFT size {} is too large", design.size);
        };
        Ok(Config::new(size, design.integer_bits, design.fraction_bits)
            .with_natural_order(design.natural_order.unwrap_or(true))
            .with_twiddle_format(
                design
                    .twiddle_integer_bits
                    .unwrap_or(Self::TWIDDLE_INTEGER_BITS),
                design
                    .twiddle_fraction_bits
                    .unwrap_or(Self::TWIDDLE_FRACTION_BITS),
            )
            .with_rotator(design.rotator.unwrap_or_default())
            .with_skid_buffers(design.skid_buffers.unwrap_or(false)))
    }

    /// Returns the number of butterfly levels, `log2(N)`.
    pub fn log2_size(&self) -> u32 {
        self.size.trailing_zeros()
    }
}

/// Serial FFT stage.
#[derive(Debug, Clone)]
pub enum FftStage {
    /// Radix-2 butterfly.
    Butterfly(SdfRadix2Stage),
    /// Radix-2² `-j` rotation.
    Quarter(R22TwiddleStage),
    /// Twiddle multiplier.
    Twiddle(TwiddleStage),
    /// Skid buffer.
    Skid(SkidBuffer<Complex>),
    /// Bit exchange of the output reordering.
    Exchange(SerialBitExchange<Complex>),
}

impl_stage_enum!(FftStage, Complex, Butterfly, Quarter, Twiddle, Skid, Exchange);

impl FftStage {
    /// Returns a summary of the stage given the format of its input.
    pub fn summary(&self, input_format: Format) -> dsp_json::StageSummary {
        let (name, output_format, detail) = match self {
            FftStage::Butterfly(s) => (
                "butterfly",
                s.output_format(),
                Some(format!("size {}", s.size())),
            ),
            FftStage::Quarter(s) => (
                "quarter rotation",
                s.format(),
                Some(format!("size {}", s.size())),
            ),
            FftStage::Twiddle(s) => (
                "twiddle",
                s.format(),
                Some(format!(
                    "{} factors in {}, {} rotator",
                    s.factors().len(),
                    s.twiddle_format(),
                    s.rotator()
                )),
            ),
            FftStage::Skid(_) => ("skid buffer", input_format, None),
            FftStage::Exchange(s) => {
                let (high, low) = s.bits();
                (
                    "bit exchange",
                    input_format,
                    Some(format!("bits {high} and {low}")),
                )
            }
        };
        dsp_json::StageSummary {
            name: name.to_string(),
            input_format: input_format.into(),
            output_format: output_format.into(),
            detail,
        }
    }
}

/// Serial FFT.
#[derive(Debug, Clone)]
pub struct SerialFft {
    config: Config,
    input_format: Format,
    output_format: Format,
    twiddle_format: Format,
    pipeline: Pipeline<FftStage>,
}

impl SerialFft {
    /// Creates a serial FFT.
    #[tracing::instrument(name = "SerialFft::new", level = "debug")]
    pub fn new(config: &Config) -> Result<SerialFft> {
        let size = config.size;
        if size < 2 || !size.is_power_of_two() {
            bail!("FFT size {size} is not a power of two larger than 1");
        }
        let input_format = Format::signed(config.integer_bits, config.fraction_bits)?;
        let twiddle_format =
            Format::signed(config.twiddle_integer_bits, config.twiddle_fraction_bits)?;
        if twiddle_format.integer_bits() < 2 {
            bail!("twiddle format {twiddle_format} cannot represent 1 and -1");
        }
        let output_width = input_format.width() + config.log2_size();
        if output_width + twiddle_format.width() + 2 > MAX_WIDTH {
            bail!(
                "FFT output width {} with twiddle width {} exceeds {} bits",
                output_width,
                twiddle_format.width(),
                MAX_WIDTH
            );
        }

        let mut stages = Vec::new();
        let mut format = input_format;
        let twiddle = |stages: &mut Vec<FftStage>, factors: &[(usize, usize)], format: Format| {
            stages.push(FftStage::Twiddle(TwiddleStage::new(
                factors,
                format,
                twiddle_format,
                config.rotator,
            )?));
            if config.skid_buffers {
                stages.push(FftStage::Skid(SkidBuffer::new()));
            }
            Ok::<(), anyhow::Error>(())
        };
        let butterfly = |stages: &mut Vec<FftStage>, size: usize, format: Format| {
            let stage = SdfRadix2Stage::new(size, format)?;
            let output_format = stage.output_format();
            stages.push(FftStage::Butterfly(stage));
            Ok::<Format, anyhow::Error>(output_format)
        };

        let mut n = size;
        // radix-2² stage pairs
        while n >= 4 {
            format = butterfly(&mut stages, n, format)?;
            stages.push(FftStage::Quarter(R22TwiddleStage::new(n, format)?));
            format = butterfly(&mut stages, n / 2, format)?;
            if n == 4 {
                n = 1;
                break;
            }
            twiddle(&mut stages, &radix22_twiddles(n), format)?;
            n /= 4;
        }
        // remaining radix-2 stages
        while n >= 2 {
            format = butterfly(&mut stages, n, format)?;
            if n == 2 {
                break;
            }
            twiddle(&mut stages, &radix2_twiddles(n), format)?;
            n /= 2;
        }
        if config.natural_order {
            let reversal = SerialBitReversal::<Complex>::new(size)?;
            stages.extend(reversal.exchanges().iter().cloned().map(FftStage::Exchange));
        }
        tracing::debug!(stages = stages.len(), output_format = %format, "FFT pipeline built");

        Ok(SerialFft {
            config: *config,
            input_format,
            output_format: format,
            twiddle_format,
            pipeline: Pipeline::new(stages),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the FFT size.
    pub fn size(&self) -> usize {
        self.config.size
    }

    /// Returns the input format.
    pub fn input_format(&self) -> Format {
        self.input_format
    }

    /// Returns the output format.
    pub fn output_format(&self) -> Format {
        self.output_format
    }

    /// Returns the twiddle factor format.
    pub fn twiddle_format(&self) -> Format {
        self.twiddle_format
    }

    /// Returns the pipeline stages.
    pub fn stages(&self) -> &[FftStage] {
        self.pipeline.stages()
    }

    /// Returns the summaries of the pipeline stages.
    pub fn stage_summaries(&self) -> Vec<dsp_json::StageSummary> {
        let mut format = self.input_format;
        self.stages()
            .iter()
            .map(|stage| {
                let summary = stage.summary(format);
                if let FftStage::Butterfly(s) = stage {
                    format = s.output_format();
                }
                summary
            })
            .collect()
    }

    /// Returns the number of output samples produced for a number of input
    /// samples.
    ///
    /// Only complete blocks are transformed.
    pub fn num_outputs(&self, num_inputs: usize) -> usize {
        num_inputs / self.size() * self.size()
    }

    /// Returns a summary of the FFT parameters.
    pub fn summary(&self) -> dsp_json::FftSummary {
        dsp_json::FftSummary {
            size: self.config.size as u32,
            natural_order: self.config.natural_order,
            twiddle_format: self.twiddle_format.into(),
            rotator: self.config.rotator,
        }
    }
}

impl Stage for SerialFft {
    type Input = Complex;
    type Output = Complex;

    fn ready(&self, output_ready: bool) -> bool {
        self.pipeline.ready(output_ready)
    }

    fn output(&self, input: Option<&Complex>) -> Option<Complex> {
        self.pipeline.output(input)
    }

    fn clock(&mut self, input: Option<&Complex>, output_ready: bool) {
        self.pipeline.clock(input, output_ready)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{bit_reversal::bit_reverse, sim::Simulator};
    use num_complex::Complex64;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rustfft::FftPlanner;

    fn reference(x: &[Complex64]) -> Vec<Complex64> {
        let mut buffer = x.to_vec();
        FftPlanner::new()
            .plan_fft_forward(buffer.len())
            .process(&mut buffer);
        buffer
    }

    fn transform(fft: &mut SerialFft, x: &[Complex64], idle: usize, stall: usize) -> Vec<Complex> {
        let format = fft.input_format();
        let inputs = x.iter().map(|&x| Complex::from_c64(x, format));
        Simulator::new()
            .with_input_idle_cycles(idle)
            .with_output_stall_cycles(stall)
            .run(fft, inputs, x.len())
            .unwrap()
            .outputs
    }

    fn max_error(output: &[Complex], expected: &[Complex64]) -> f64 {
        output
            .iter()
            .zip(expected)
            .map(|(x, y)| (x.to_c64() - y).norm())
            .fold(0.0, f64::max)
    }

    #[test]
    fn four_points() {
        let x = [0.0, 1.0, 2.0, 3.0].map(|x| Complex64::new(x, 0.0));
        let mut fft = SerialFft::new(&Config::new(4, 3, 0)).unwrap();
        assert_eq!(fft.output_format(), Format::signed(5, 0).unwrap());
        let output = transform(&mut fft, &x, 0, 0);
        let expected = [(6.0, 0.0), (-2.0, 2.0), (-2.0, 0.0), (-2.0, -2.0)]
            .map(|(re, im)| Complex64::new(re, im));
        assert_eq!(output.iter().map(|x| x.to_c64()).collect::<Vec<_>>(), expected);

        let mut fft = SerialFft::new(&Config::new(4, 3, 0).with_natural_order(false)).unwrap();
        let output = transform(&mut fft, &x, 0, 0);
        let expected = [(6.0, 0.0), (-2.0, 0.0), (-2.0, 2.0), (-2.0, -2.0)]
            .map(|(re, im)| Complex64::new(re, im));
        assert_eq!(output.iter().map(|x| x.to_c64()).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn ramp_with_stalls() {
        let size = 128;
        let x = (0..size)
            .map(|n| Complex64::new(n as f64 / size as f64, 0.0))
            .collect::<Vec<_>>();
        let expected = reference(&x);
        let mut outputs = Vec::new();
        for idle in 0..4 {
            for stall in 0..4 {
                let mut fft = SerialFft::new(&Config::new(size, 1, 10)).unwrap();
                assert_eq!(fft.output_format(), Format::signed(8, 10).unwrap());
                let output = transform(&mut fft, &x, idle, stall);
                assert!(max_error(&output, &expected) < 0.02);
                outputs.push(output);
            }
        }
        // the result does not depend on the handshake timing
        assert!(outputs.iter().all(|output| output == &outputs[0]));
    }

    #[test]
    fn full_scale_tones() {
        // tones with a magnitude close to the range of one input lane
        let size = 16;
        for bin in [0, 3, 5] {
            let x = (0..size)
                .map(|n| {
                    let phase = 2.0 * std::f64::consts::PI * (bin * n) as f64 / size as f64;
                    Complex64::from_polar(0.99, phase)
                })
                .collect::<Vec<_>>();
            let mut fft = SerialFft::new(&Config::new(size, 1, 10)).unwrap();
            let output = transform(&mut fft, &x, 1, 1);
            assert!(max_error(&output, &reference(&x)) < 0.02, "bin {bin}");
            assert!((output[bin].to_c64().norm() - 15.84).abs() < 0.02);
        }
    }

    #[test]
    fn odd_log2_sizes() {
        let mut rng = StdRng::seed_from_u64(3);
        for size in [2, 8, 32] {
            let x = (0..size)
                .map(|_| Complex64::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5)))
                .collect::<Vec<_>>();
            let mut fft = SerialFft::new(&Config::new(size, 1, 12)).unwrap();
            let output = transform(&mut fft, &x, 1, 2);
            assert!(max_error(&output, &reference(&x)) < 0.02, "size {size}");
        }
    }

    #[test]
    fn bit_reversed_order() {
        let size = 16;
        let mut rng = StdRng::seed_from_u64(11);
        let x = (0..size)
            .map(|_| Complex64::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5)))
            .collect::<Vec<_>>();
        let expected = reference(&x);
        let config = Config::new(size, 1, 12).with_natural_order(false);
        let mut fft = SerialFft::new(&config).unwrap();
        let output = transform(&mut fft, &x, 0, 1);
        let natural = (0..size)
            .map(|k| output[bit_reverse(k, 4)])
            .collect::<Vec<_>>();
        assert!(max_error(&natural, &expected) < 0.01);
    }

    #[test]
    fn rotators_and_skid_buffers_agree() {
        let size = 64;
        let mut rng = StdRng::seed_from_u64(5);
        let x = (0..2 * size)
            .map(|_| Complex64::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5)))
            .collect::<Vec<_>>();
        let mut direct = SerialFft::new(&Config::new(size, 1, 10)).unwrap();
        let expected = transform(&mut direct, &x, 0, 0);
        let config = Config::new(size, 1, 10)
            .with_rotator(Rotator::ThreeMultiplier)
            .with_skid_buffers(true);
        let mut fft = SerialFft::new(&config).unwrap();
        assert!(fft
            .stages()
            .iter()
            .any(|stage| matches!(stage, FftStage::Skid(_))));
        assert_eq!(transform(&mut fft, &x, 2, 1), expected);
        // both blocks are transformed independently
        assert!(max_error(&expected[size..], &reference(&x[size..])) < 0.02);
    }

    #[test]
    fn structure() {
        let fft = SerialFft::new(&Config::new(16, 1, 10)).unwrap();
        let names = fft
            .stage_summaries()
            .into_iter()
            .map(|s| s.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "butterfly",
                "quarter rotation",
                "butterfly",
                "twiddle",
                "butterfly",
                "quarter rotation",
                "butterfly",
                "bit exchange",
                "bit exchange",
            ]
        );
        let summaries = fft.stage_summaries();
        assert_eq!(summaries[3].input_format.integer_bits, 3);
        assert_eq!(summaries[8].output_format.integer_bits, 5);
        assert_eq!(fft.num_outputs(40), 32);
        assert_eq!(fft.summary().twiddle_format.fraction_bits, 11);
    }

    #[test]
    fn invalid_configs() {
        assert!(SerialFft::new(&Config::new(12, 1, 10)).is_err());
        assert!(SerialFft::new(&Config::new(1, 1, 10)).is_err());
        assert!(SerialFft::new(&Config::new(16, 1, 10).with_twiddle_format(1, 11)).is_err());
        assert!(SerialFft::new(&Config::new(1024, 1, 110)).is_err());
    }
}
