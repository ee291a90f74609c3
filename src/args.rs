//! dsp-sandbox CLI arguments.
//!
//! This module contains the definition of the CLI arguments for the
//! dsp-sandbox application.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dsp-sandbox CLI arguments.
#[derive(Parser, Debug, Clone, Eq, PartialEq, Hash)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Command to run
    #[clap(subcommand)]
    pub command: Command,
}

/// dsp-sandbox commands.
#[derive(Subcommand, Debug, Clone, Eq, PartialEq, Hash)]
pub enum Command {
    /// Print the structure of a design
    Summary {
        /// Design JSON file
        design: PathBuf,
    },
    /// Run samples through a design
    Process {
        /// Design JSON file
        design: PathBuf,
        /// Input samples JSON file (defaults to stdin)
        #[clap(long)]
        input: Option<PathBuf>,
        /// Idle cycles inserted by the source after each input sample
        #[clap(long, default_value_t = 0)]
        input_idle_cycles: usize,
        /// Stall cycles inserted by the sink after each ready cycle
        #[clap(long, default_value_t = 0)]
        output_stall_cycles: usize,
        /// Limit of simulated clock cycles
        #[clap(long, default_value_t = crate::sim::Simulator::DEFAULT_MAX_CYCLES)]
        max_cycles: usize,
    },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_process() {
        let args = Args::try_parse_from([
            "dsp-sandbox",
            "process",
            "fft.json",
            "--input",
            "samples.json",
            "--output-stall-cycles",
            "2",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Process {
                design: "fft.json".into(),
                input: Some("samples.json".into()),
                input_idle_cycles: 0,
                output_stall_cycles: 2,
                max_cycles: crate::sim::Simulator::DEFAULT_MAX_CYCLES,
            }
        );
    }

    #[test]
    fn parse_summary() {
        let args = Args::try_parse_from(["dsp-sandbox", "summary", "cic.json"]).unwrap();
        assert_eq!(
            args.command,
            Command::Summary {
                design: "cic.json".into()
            }
        );
        assert!(Args::try_parse_from(["dsp-sandbox", "summary"]).is_err());
    }
}
