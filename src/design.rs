//! Block designs.
//!
//! This module builds a processing block from its JSON description. A block
//! is either a CIC filter or a serial FFT. Both have a single stream of
//! complex samples at their input and output.

use crate::{
    cic::{self, CicFilter},
    complex::Complex,
    fft::{self, SerialFft},
    fixed_point::Format,
    stream::Stage,
};
use anyhow::Result;

/// Processing block.
#[derive(Debug, Clone)]
pub enum Block {
    /// CIC filter.
    Cic(CicFilter),
    /// Serial FFT.
    Fft(SerialFft),
}

impl Block {
    /// Builds a block from its JSON design.
    pub fn from_design(design: &dsp_json::Design) -> Result<Block> {
        Ok(match design {
            dsp_json::Design::Cic(design) => {
                let config = cic::Config::from_design(design)?;
                Block::Cic(CicFilter::new(design.kind, &config)?)
            }
            dsp_json::Design::Fft(design) => {
                Block::Fft(SerialFft::new(&fft::Config::from_design(design)?)?)
            }
        })
    }

    /// Returns the input format.
    pub fn input_format(&self) -> Format {
        match self {
            Block::Cic(cic) => cic.input_format(),
            Block::Fft(fft) => fft.input_format(),
        }
    }

    /// Returns the output format.
    pub fn output_format(&self) -> Format {
        match self {
            Block::Cic(cic) => cic.output_format(),
            Block::Fft(fft) => fft.output_format(),
        }
    }

    /// Returns the number of output samples produced for a number of input
    /// samples.
    pub fn num_outputs(&self, num_inputs: usize) -> usize {
        match self {
            Block::Cic(cic) => cic.num_outputs(num_inputs),
            Block::Fft(fft) => fft.num_outputs(num_inputs),
        }
    }

    /// Returns a summary of the block structure.
    pub fn summary(&self) -> dsp_json::Summary {
        let (stages, cic, fft) = match self {
            Block::Cic(cic) => (
                cic.stages().iter().map(|stage| stage.summary()).collect(),
                Some(cic.summary()),
                None,
            ),
            Block::Fft(fft) => (fft.stage_summaries(), None, Some(fft.summary())),
        };
        dsp_json::Summary {
            versions: versions(),
            input_format: self.input_format().into(),
            output_format: self.output_format().into(),
            stages,
            cic,
            fft,
        }
    }
}

/// Returns the software versions.
pub fn versions() -> dsp_json::Versions {
    dsp_json::Versions {
        dsp_sandbox_git: git_version::git_version!(fallback = "unknown").to_string(),
        dsp_sandbox_version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

impl Stage for Block {
    type Input = Complex;
    type Output = Complex;

    fn ready(&self, output_ready: bool) -> bool {
        match self {
            Block::Cic(cic) => cic.ready(output_ready),
            Block::Fft(fft) => fft.ready(output_ready),
        }
    }

    fn output(&self, input: Option<&Complex>) -> Option<Complex> {
        match self {
            Block::Cic(cic) => cic.output(input),
            Block::Fft(fft) => fft.output(input),
        }
    }

    fn clock(&mut self, input: Option<&Complex>, output_ready: bool) {
        match self {
            Block::Cic(cic) => cic.clock(input, output_ready),
            Block::Fft(fft) => fft.clock(input, output_ready),
        }
    }
}
