//! dsp-sandbox application.
//!
//! This module contains a top-level structure [`App`] that represents the
//! whole dsp-sandbox application. It builds the block described by a design
//! file and either prints its structure or runs samples through it.

use crate::{
    args::{Args, Command},
    complex::Complex,
    design::Block,
    sim::Simulator,
};
use anyhow::{Context, Result};
use num_complex::Complex64;
use serde::Serialize;
use std::{io::Write, path::Path};

/// dsp-sandbox application.
#[derive(Debug)]
pub struct App {
    block: Block,
    command: Command,
}

impl App {
    /// Creates a new application.
    #[tracing::instrument(name = "App::new", level = "debug")]
    pub fn new(args: &Args) -> Result<App> {
        let design = match &args.command {
            Command::Summary { design } | Command::Process { design, .. } => design,
        };
        let block = Block::from_design(&read_design(design)?)
            .with_context(|| format!("invalid design {}", design.display()))?;
        Ok(App {
            block,
            command: args.command.clone(),
        })
    }

    /// Runs the application.
    pub fn run(mut self) -> Result<()> {
        match &self.command {
            Command::Summary { .. } => print_json(&self.block.summary()),
            Command::Process {
                input,
                input_idle_cycles,
                output_stall_cycles,
                max_cycles,
                ..
            } => {
                let samples: dsp_json::Samples = match input {
                    Some(path) => read_json(path)?,
                    None => serde_json::from_reader(std::io::stdin().lock())
                        .context("failed to parse samples from stdin")?,
                };
                let simulator = Simulator::new()
                    .with_input_idle_cycles(*input_idle_cycles)
                    .with_output_stall_cycles(*output_stall_cycles)
                    .with_max_cycles(*max_cycles);
                print_json(&process(&mut self.block, &samples, &simulator)?)
            }
        }
    }
}

/// Reads a design JSON file.
pub fn read_design(path: &Path) -> Result<dsp_json::Design> {
    read_json(path)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Runs samples through a block.
///
/// The samples are quantized to the input format of the block. Only the
/// samples that the block produces for this number of inputs are returned,
/// so an incomplete FFT block is discarded.
#[tracing::instrument(name = "process", level = "debug", skip_all, fields(samples = samples.len()))]
pub fn process(
    block: &mut Block,
    samples: &dsp_json::Samples,
    simulator: &Simulator,
) -> Result<dsp_json::ProcessOutput> {
    let format = block.input_format();
    let num_outputs = block.num_outputs(samples.len());
    let inputs = samples
        .iter()
        .map(|&[re, im]| Complex::from_c64(Complex64::new(re, im), format));
    let run = simulator.run(block, inputs, num_outputs)?;
    tracing::info!(
        outputs = run.outputs.len(),
        cycles = run.cycles,
        "processing finished"
    );
    Ok(dsp_json::ProcessOutput {
        output_format: block.output_format().into(),
        cycles: run.cycles as u64,
        samples: run
            .outputs
            .iter()
            .map(|x| {
                let x = x.to_c64();
                [x.re, x.im]
            })
            .collect(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn block(json: &str) -> Block {
        Block::from_design(&serde_json::from_str(json).unwrap()).unwrap()
    }

    #[test]
    fn process_fft() {
        let mut block = block(
            r#"{"type": "fft", "size": 4, "integer_bits": 3, "fraction_bits": 0}"#,
        );
        let samples = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [1.0, 1.0]];
        let output = process(&mut block, &samples, &Simulator::new()).unwrap();
        assert_eq!(
            output.samples,
            vec![[6.0, 0.0], [-2.0, 2.0], [-2.0, 0.0], [-2.0, -2.0]]
        );
        assert_eq!(output.output_format.integer_bits, 5);
        assert!(output.cycles > 4);
    }

    #[test]
    fn process_cic() {
        let mut block = block(
            r#"{"type": "cic", "kind": "Downsampling", "stages": 1, "rate": 4,
                "width_in": 8}"#,
        );
        let samples = vec![[1.0, -1.0]; 8];
        let simulator = Simulator::new().with_output_stall_cycles(1);
        let output = process(&mut block, &samples, &simulator).unwrap();
        // moving sums of length 4, starting from an empty state
        assert_eq!(output.samples, vec![[1.0, -1.0], [4.0, -4.0]]);
    }

    #[test]
    fn missing_design() {
        assert!(read_design(Path::new("/nonexistent/design.json")).is_err());
    }
}
