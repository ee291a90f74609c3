//! CIC filters.
//!
//! A CIC (cascaded integrator-comb) filter changes the sample rate of a
//! complex stream by an integer factor `R` using only adders. It is formed by
//! `N` integrators, a rate changer and `N` combs with differential delay `M`.
//! Its response is that of `N` cascaded moving sums of length `RM` at the
//! high sample rate.
//!
//! An interpolating filter ([`CicFilter::upsampling`]) places the combs at the
//! low rate input, followed by a zero-stuffing upsampler and the integrators.
//! Each stage is sized with the bit growth computed by
//! [`design::bit_growth`], and only the filter output is requantized.
//!
//! A decimating filter ([`CicFilter::downsampling`]) places the integrators at
//! the high rate input, followed by a downsampler and the combs. The low bits
//! of each stage are pruned according to [`design::truncation`].

use crate::{
    complex::Complex,
    fixed_point::{Format, MAX_WIDTH},
    stream::{Pipeline, Stage},
};
use anyhow::{bail, Result};
use dsp_json::{CicKind, FirstStageCorrection};

pub mod design;
pub mod stages;

use stages::{CicStage, Comb, Downsampler, Integrator, Requantizer, Upsampler};

/// CIC filter configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Config {
    /// Number of integrator/comb pairs (`N`).
    pub stages: u32,
    /// Rate change factor (`R`).
    pub rate: u32,
    /// Comb differential delay in low-rate samples (`M`).
    pub differential_delay: u32,
    /// Input width in bits.
    pub width_in: u32,
    /// Output width in bits. `None` selects the full-precision width.
    pub width_out: Option<u32>,
    /// Correction of the first stage truncation of decimators.
    pub first_stage_correction: FirstStageCorrection,
}

impl Config {
    /// Creates a configuration with a differential delay of 1 and a
    /// full-precision output.
    pub fn new(stages: u32, rate: u32, width_in: u32) -> Config {
        Config {
            stages,
            rate,
            differential_delay: 1,
            width_in,
            width_out: None,
            first_stage_correction: FirstStageCorrection::default(),
        }
    }

    /// Sets the differential delay.
    pub fn with_differential_delay(self, differential_delay: u32) -> Config {
        Config {
            differential_delay,
            ..self
        }
    }

    /// Sets the differential delay from the length of the moving sums at the
    /// high sample rate.
    ///
    /// Fails unless the length is a non-zero multiple of the rate.
    pub fn with_moving_sum_length(self, length: u32) -> Result<Config> {
        if self.rate == 0 {
            bail!("CIC rate must be at least 1");
        }
        if length == 0 || length % self.rate != 0 {
            bail!(
                "moving sum length {} is not a multiple of the rate {}",
                length,
                self.rate
            );
        }
        Ok(self.with_differential_delay(length / self.rate))
    }

    /// Sets the output width.
    pub fn with_width_out(self, width_out: u32) -> Config {
        Config {
            width_out: Some(width_out),
            ..self
        }
    }

    /// Sets the first stage truncation correction.
    pub fn with_first_stage_correction(self, first_stage_correction: FirstStageCorrection) -> Config {
        Config {
            first_stage_correction,
            ..self
        }
    }

    /// Creates a configuration from a JSON design.
    pub fn from_design(design: &dsp_json::CicDesign) -> Result<Config> {
        let mut config = Config::new(design.stages, design.rate, design.width_in)
            .with_first_stage_correction(design.first_stage_correction.unwrap_or_default());
        match (design.differential_delay, design.moving_sum_length) {
            (Some(_), Some(_)) => {
                bail!("differential_delay and moving_sum_length cannot be given together")
            }
            (Some(differential_delay), None) => {
                config = config.with_differential_delay(differential_delay)
            }
            (None, Some(length)) => config = config.with_moving_sum_length(length)?,
            (None, None) => (),
        }
        if let Some(width_out) = design.width_out {
            config = config.with_width_out(width_out);
        }
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.stages == 0 {
            bail!("CIC filter needs at least 1 stage");
        }
        if self.rate == 0 {
            bail!("CIC rate must be at least 1");
        }
        if self.differential_delay == 0 {
            bail!("CIC differential delay must be at least 1");
        }
        if self.width_in == 0 {
            bail!("CIC input width must be at least 1 bit");
        }
        if self.width_out == Some(0) {
            bail!("CIC output width must be at least 1 bit");
        }
        Ok(())
    }
}

/// CIC filter.
#[derive(Debug, Clone)]
pub struct CicFilter {
    kind: CicKind,
    config: Config,
    full_width: u32,
    bit_growth: Option<Vec<u32>>,
    truncation: Option<Vec<u32>>,
    input_format: Format,
    output_format: Format,
    pipeline: Pipeline<CicStage>,
}

impl CicFilter {
    /// Creates a CIC filter of the given kind.
    pub fn new(kind: CicKind, config: &Config) -> Result<CicFilter> {
        match kind {
            CicKind::Upsampling => CicFilter::upsampling(config),
            CicKind::Downsampling => CicFilter::downsampling(config),
        }
    }

    /// Creates an interpolating CIC filter.
    #[tracing::instrument(name = "CicFilter::upsampling", level = "debug")]
    pub fn upsampling(config: &Config) -> Result<CicFilter> {
        config.validate()?;
        let n = config.stages as usize;
        let growth = design::bit_growth(config.stages, config.rate, config.differential_delay)?;
        let full_width = config.width_in + growth[2 * n - 1];
        let width_out = config.width_out.unwrap_or(full_width);
        tracing::debug!(?growth, full_width, width_out, "interpolator bit growth");
        // width at the input of each stage
        let width = |j: usize| match j {
            0 => config.width_in,
            _ => config.width_in + growth[j - 1],
        };
        // combs and integrators add one bit to their widest operand
        let widest = (0..=2 * n).map(&width).max().unwrap_or(full_width);
        if widest + 1 > MAX_WIDTH {
            bail!(
                "CIC register width {} leaves no room for its sums within {} bits",
                widest,
                MAX_WIDTH
            );
        }

        let mut stages = Vec::with_capacity(2 * n + 2);
        for j in 0..n {
            stages.push(CicStage::Comb(Comb::new(
                config.differential_delay as usize,
                Format::integer(width(j))?,
                Format::integer(width(j) + 1)?,
            )?));
        }
        if config.rate > 1 {
            stages.push(CicStage::Upsampler(Upsampler::new(
                config.rate as usize,
                Format::integer(width(n))?,
            )));
        }
        for j in n..2 * n {
            stages.push(CicStage::Integrator(Integrator::new(
                Format::integer(width(j))?,
                Format::integer(width(j + 1))?,
            )));
        }
        stages.push(CicStage::Requantizer(Requantizer::new(
            full_width as i32 - width_out as i32,
            Format::integer(full_width)?,
            Format::integer(width_out)?,
        )));

        Ok(CicFilter {
            kind: CicKind::Upsampling,
            config: *config,
            full_width,
            bit_growth: Some(growth),
            truncation: None,
            input_format: Format::integer(config.width_in)?,
            output_format: Format::integer(width_out)?,
            pipeline: Pipeline::new(stages),
        })
    }

    /// Creates a decimating CIC filter.
    #[tracing::instrument(name = "CicFilter::downsampling", level = "debug")]
    pub fn downsampling(config: &Config) -> Result<CicFilter> {
        config.validate()?;
        let n = config.stages as usize;
        let truncation = design::truncation(
            config.stages,
            config.rate,
            config.differential_delay,
            config.width_in,
            config.width_out,
            config.first_stage_correction,
        )?;
        let full_width = truncation.full_width;
        let width_out = config.width_out.unwrap_or(full_width);
        if width_out > full_width {
            bail!(
                "CIC output width {} is larger than the full precision width {}",
                width_out,
                full_width
            );
        }
        if full_width + 1 > MAX_WIDTH {
            bail!(
                "CIC full precision width {} leaves no room for its sums within {} bits",
                full_width,
                MAX_WIDTH
            );
        }
        let bits = truncation.bits;
        tracing::debug!(?bits, full_width, width_out, "decimator truncation");

        let mut stages = Vec::with_capacity(4 * n + 2);
        let mut format = Format::integer(config.width_in)?;
        let mut discarded = 0;
        let mut requantizer = |stages: &mut Vec<CicStage>, format: Format, bits: u32| {
            let output_format = Format::integer(full_width - bits)?;
            stages.push(CicStage::Requantizer(Requantizer::new(
                bits as i32 - discarded as i32,
                format,
                output_format,
            )));
            discarded = bits;
            Ok::<Format, anyhow::Error>(output_format)
        };
        for &stage_bits in &bits[..n] {
            format = requantizer(&mut stages, format, stage_bits)?;
            stages.push(CicStage::Integrator(Integrator::new(format, format)));
        }
        if config.rate > 1 {
            stages.push(CicStage::Downsampler(Downsampler::new(
                config.rate as usize,
                format,
            )));
        }
        for &stage_bits in &bits[n..2 * n] {
            format = requantizer(&mut stages, format, stage_bits)?;
            stages.push(CicStage::Comb(Comb::new(
                config.differential_delay as usize,
                format,
                format,
            )?));
        }
        let output_format = requantizer(&mut stages, format, bits[2 * n])?;

        Ok(CicFilter {
            kind: CicKind::Downsampling,
            config: *config,
            full_width,
            bit_growth: None,
            truncation: Some(bits),
            input_format: Format::integer(config.width_in)?,
            output_format,
            pipeline: Pipeline::new(stages),
        })
    }

    /// Returns the filter kind.
    pub fn kind(&self) -> CicKind {
        self.kind
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the full-precision register width.
    pub fn full_width(&self) -> u32 {
        self.full_width
    }

    /// Returns the bit growth of each stage (interpolators only).
    pub fn bit_growth(&self) -> Option<&[u32]> {
        self.bit_growth.as_deref()
    }

    /// Returns the bits discarded at each stage (decimators only).
    pub fn truncation(&self) -> Option<&[u32]> {
        self.truncation.as_deref()
    }

    /// Returns the input format.
    pub fn input_format(&self) -> Format {
        self.input_format
    }

    /// Returns the output format.
    pub fn output_format(&self) -> Format {
        self.output_format
    }

    /// Returns the pipeline stages.
    pub fn stages(&self) -> &[CicStage] {
        self.pipeline.stages()
    }

    /// Returns the number of output samples produced for a number of input
    /// samples.
    pub fn num_outputs(&self, num_inputs: usize) -> usize {
        let rate = self.config.rate as usize;
        match self.kind {
            CicKind::Upsampling => num_inputs * rate,
            CicKind::Downsampling => num_inputs.div_ceil(rate),
        }
    }

    /// Returns a summary of the filter sizing.
    pub fn summary(&self) -> dsp_json::CicSummary {
        dsp_json::CicSummary {
            kind: self.kind,
            differential_delay: self.config.differential_delay,
            full_width: self.full_width,
            bit_growth: self.bit_growth.clone(),
            truncation: self.truncation.clone(),
        }
    }
}

impl Stage for CicFilter {
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
