//! dsp-json contains the JSON schemas used by dsp-sandbox.
//!
//! These schemas describe block designs (CIC filters and serial FFTs), the
//! structural summaries reported for a built block, and the sample files
//! consumed and produced by the `dsp-sandbox` command line application.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// Design JSON schema.
///
/// This JSON schema describes a block to build. The block type is selected by
/// the `"type"` field, which is either `"cic"` or `"fft"`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Design {
    /// CIC filter design.
    Cic(CicDesign),
    /// Serial FFT design.
    Fft(FftDesign),
}

/// CIC design JSON schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CicDesign {
    /// Interpolating or decimating filter.
    pub kind: CicKind,
    /// Number of integrator/comb pairs.
    pub stages: u32,
    /// Interpolation or decimation rate.
    pub rate: u32,
    /// Comb differential delay, in low-rate samples.
    ///
    /// This defaults to 1. It cannot be given together with
    /// `moving_sum_length`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub differential_delay: Option<u32>,
    /// Length of each moving sum, in high-rate samples.
    ///
    /// This must be a multiple of the rate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving_sum_length: Option<u32>,
    /// Input sample width in bits.
    pub width_in: u32,
    /// Output sample width in bits.
    ///
    /// This defaults to the full-precision width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width_out: Option<u32>,
    /// Correction applied to the truncation of the first decimator stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_stage_correction: Option<FirstStageCorrection>,
}

/// CIC filter kinds.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CicKind {
    /// Interpolating filter.
    Upsampling,
    /// Decimating filter.
    Downsampling,
}

/// First stage truncation correction for decimating CIC filters.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum FirstStageCorrection {
    /// Never truncate before the first integrator.
    #[default]
    Zero,
    /// Move a single bit of first stage truncation to the second stage.
    CreditNext,
}

/// Serial FFT design JSON schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct FftDesign {
    /// FFT size. Must be a power of two.
    pub size: u32,
    /// Integer bits of the input samples.
    pub integer_bits: u32,
    /// Fraction bits of the input samples.
    pub fraction_bits: u32,
    /// Reorder the output into natural order.
    ///
    /// This defaults to `true`. Otherwise the output is in bit-reversed
    /// order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_order: Option<bool>,
    /// Integer bits of the twiddle factors (default 2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twiddle_integer_bits: Option<u32>,
    /// Fraction bits of the twiddle factors (default 11).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twiddle_fraction_bits: Option<u32>,
    /// Twiddle rotator architecture (default `Direct`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotator: Option<Rotator>,
    /// Insert a skid buffer after each twiddle rotator (default `false`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skid_buffers: Option<bool>,
}

/// Twiddle rotator architectures.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Rotator {
    /// Single-cycle complex multiplier.
    #[default]
    Direct,
    /// Three real multipliers pipelined over three cycles.
    ThreeMultiplier,
}

macro_rules! impl_str_conv {
    ($ty:ty, $($s:expr => $v:ident),*) => {
        impl std::str::FromStr for $ty {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, ()> {
                Ok(match s {
                    $(
                        $s => <$ty>::$v,
                    )*
                        _ => return Err(()),
                })
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
                write!(f, "{}", match self {
                    $(
                        <$ty>::$v => $s,
                    )*
                })
            }
        }
    }
}

impl_str_conv!(CicKind,
               "upsampling" => Upsampling,
               "downsampling" => Downsampling);

impl_str_conv!(FirstStageCorrection,
               "zero" => Zero,
               "credit next" => CreditNext);

impl_str_conv!(Rotator,
               "direct" => Direct,
               "three multiplier" => ThreeMultiplier);

/// Fixed-point format JSON schema.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Format {
    /// Integer bits, including the sign bit for signed formats.
    pub integer_bits: u32,
    /// Fraction bits.
    pub fraction_bits: u32,
    /// Two's complement format.
    pub signed: bool,
}

/// Block summary JSON schema.
///
/// This JSON schema describes the structure of a built block: its interface
/// formats and the list of pipeline stages it is formed by.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Summary {
    /// Software versions.
    pub versions: Versions,
    /// Format of the input samples.
    pub input_format: Format,
    /// Format of the output samples.
    pub output_format: Format,
    /// Pipeline stages, from input to output.
    pub stages: Vec<StageSummary>,
    /// CIC sizing information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cic: Option<CicSummary>,
    /// FFT information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fft: Option<FftSummary>,
}

/// Pipeline stage summary JSON schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageSummary {
    /// Stage name.
    pub name: String,
    /// Format of the stage input.
    pub input_format: Format,
    /// Format of the stage output.
    pub output_format: Format,
    /// Structural parameters of the stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// CIC sizing JSON schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CicSummary {
    /// Filter kind.
    pub kind: CicKind,
    /// Comb differential delay.
    pub differential_delay: u32,
    /// Full-precision register width.
    pub full_width: u32,
    /// Bit growth at the output of each of the 2N stages (interpolators
    /// only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_growth: Option<Vec<u32>>,
    /// Bits discarded at the input of each of the 2N stages, followed by the
    /// bits discarded at the output (decimators only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Vec<u32>>,
}

/// FFT JSON schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct FftSummary {
    /// FFT size.
    pub size: u32,
    /// Output is in natural order.
    pub natural_order: bool,
    /// Twiddle factor format.
    pub twiddle_format: Format,
    /// Twiddle rotator architecture.
    pub rotator: Rotator,
}

/// Versions JSON schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Versions {
    /// Git version of dsp-sandbox.
    pub dsp_sandbox_git: String,
    /// Crate version of dsp-sandbox.
    pub dsp_sandbox_version: String,
}

/// Complex samples file JSON schema.
///
/// Samples are stored as `[re, im]` pairs.
pub type Samples = Vec<[f64; 2]>;

/// Processing result JSON schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    /// Format of the output samples.
    pub output_format: Format,
    /// Number of clock cycles simulated.
    pub cycles: u64,
    /// Output samples.
    pub samples: Samples,
}
