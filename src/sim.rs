//! Cycle-by-cycle simulation of pipeline stages.
//!
//! The [`Simulator`] clocks a [`Stage`] with a source at its input and a sink
//! at its output. The source can insert idle cycles after each transferred
//! sample and the sink can stall its `ready` signal periodically, which
//! exercises the handshake logic of the stage under test.

use crate::stream::Stage;
use anyhow::{bail, Result};
use std::collections::VecDeque;

/// Clock cycle simulator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Simulator {
    input_idle_cycles: usize,
    output_stall_cycles: usize,
    max_cycles: usize,
}

/// Result of a simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Run<T> {
    /// Samples transferred out of the stage.
    pub outputs: Vec<T>,
    /// Number of clock cycles simulated.
    pub cycles: usize,
}

impl Simulator {
    /// Default limit of simulated clock cycles.
    pub const DEFAULT_MAX_CYCLES: usize = 1_000_000;

    /// Creates a simulator with no idle or stall cycles.
    pub fn new() -> Simulator {
        Simulator {
            input_idle_cycles: 0,
            output_stall_cycles: 0,
            max_cycles: Self::DEFAULT_MAX_CYCLES,
        }
    }

    /// Sets the number of cycles in which the source does not drive `valid`
    /// after each transferred sample.
    pub fn with_input_idle_cycles(self, input_idle_cycles: usize) -> Simulator {
        Simulator {
            input_idle_cycles,
            ..self
        }
    }

    /// Sets the number of cycles in which the sink does not drive `ready`
    /// after each cycle in which it does.
    pub fn with_output_stall_cycles(self, output_stall_cycles: usize) -> Simulator {
        Simulator {
            output_stall_cycles,
            ..self
        }
    }

    /// Sets the limit of simulated clock cycles.
    pub fn with_max_cycles(self, max_cycles: usize) -> Simulator {
        Simulator { max_cycles, ..self }
    }

    /// Runs a stage until it has produced `num_outputs` samples.
    ///
    /// Each input sample is held on the input link until the stage accepts
    /// it. Fails if the stage has not produced the requested number of
    /// samples within the cycle limit.
    pub fn run<S, I>(&self, stage: &mut S, inputs: I, num_outputs: usize) -> Result<Run<S::Output>>
    where
        S: Stage,
        I: IntoIterator<Item = S::Input>,
    {
        let mut source = inputs.into_iter().collect::<VecDeque<_>>();
        let mut outputs = Vec::with_capacity(num_outputs);
        let mut idle = 0;
        let mut stall_phase = 0;
        let mut cycles = 0;
        while outputs.len() < num_outputs {
            if cycles == self.max_cycles {
                bail!(
                    "stage produced {} of {} samples in {} cycles",
                    outputs.len(),
                    num_outputs,
                    cycles
                );
            }
            let output_ready = stall_phase == 0;
            stall_phase = (stall_phase + 1) % (self.output_stall_cycles + 1);
            let input = if idle > 0 { None } else { source.front() };
            let consumed = stage.consumes(input, output_ready);
            if output_ready {
                if let Some(output) = stage.output(input) {
                    outputs.push(output);
                }
            }
            stage.clock(input, output_ready);
            if consumed {
                tracing::trace!(cycles, "input transferred");
                source.pop_front();
                idle = self.input_idle_cycles;
            } else if input.is_none() && idle > 0 {
                idle -= 1;
            }
            cycles += 1;
        }
        tracing::debug!(cycles, outputs = outputs.len(), "simulation finished");
        Ok(Run { outputs, cycles })
    }
}

impl Default for Simulator {
    fn default() -> Simulator {
        Simulator::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::Registered;

    fn negate(x: &i64) -> i64 {
        -x
    }

    #[test]
    fn throughput() {
        let mut stage = Registered::new(negate);
        let run = Simulator::new().run(&mut stage, 1..=10, 10).unwrap();
        assert_eq!(run.outputs, (1..=10).map(|x| -x).collect::<Vec<_>>());
        assert_eq!(run.cycles, 11);
    }

    #[test]
    fn idle_and_stall() {
        for idle in 0..4 {
            for stall in 0..4 {
                let mut stage = Registered::new(negate);
                let run = Simulator::new()
                    .with_input_idle_cycles(idle)
                    .with_output_stall_cycles(stall)
                    .run(&mut stage, 1..=10, 10)
                    .unwrap();
                assert_eq!(run.outputs, (1..=10).map(|x| -x).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn cycle_limit() {
        let mut stage = Registered::new(negate);
        let sim = Simulator::new().with_max_cycles(20);
        assert!(sim.run(&mut stage, 1..=5, 6).is_err());
    }
}
