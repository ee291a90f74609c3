//! Single-path delay feedback radix-2 butterfly.

use crate::{
    complex::Complex,
    counter::ModCounter,
    delay::FifoDelay,
    fixed_point::{Format, Rounding},
    stream::Stage,
};
use anyhow::{bail, Result};

/// Operating mode of a butterfly stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Mode {
    /// Input samples are stored in the feedback FIFO, while the results of
    /// the previous block leave the stage.
    Feed,
    /// Input samples are combined with the samples stored in the feedback
    /// FIFO. Sums leave the stage and differences enter the FIFO.
    Combine,
}

// Feedback FIFO entry, tagged with the mode that produced it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Tagged {
    value: Complex,
    mode: Mode,
}

/// SDF radix-2 butterfly stage.
///
/// A stage of size `N` works on blocks of `N` samples. The first `N/2`
/// samples of a block are stored in a feedback FIFO of depth `N/2`. Each of
/// the last `N/2` samples is combined with the sample stored `N/2` samples
/// earlier: the sum is sent downstream and the difference is stored in the
/// FIFO, from which it is sent downstream while the first half of the next
/// block is being stored.
///
/// Each FIFO entry is tagged with the mode that produced it, so the stage
/// knows when a stored sample can leave without any global synchronization.
/// This lets the stage drain the differences of the last block without
/// further input, and lets the input and output stall independently.
#[derive(Debug, Clone)]
pub struct SdfRadix2Stage {
    feedback: FifoDelay<Tagged>,
    counter: ModCounter,
    input_format: Format,
    output_format: Format,
}

impl SdfRadix2Stage {
    /// Creates a butterfly stage of size `size`.
    ///
    /// The output has one more integer bit than the input.
    pub fn new(size: usize, input_format: Format) -> Result<SdfRadix2Stage> {
        if size < 2 || !size.is_power_of_two() {
            bail!("butterfly size {size} is not a power of two larger than 1");
        }
        let output_format = input_format.with_integer_bits(input_format.integer_bits() + 1)?;
        Ok(SdfRadix2Stage {
            feedback: FifoDelay::new(size / 2)?,
            counter: ModCounter::new(size),
            input_format,
            output_format,
        })
    }

    /// Returns the size.
    pub fn size(&self) -> usize {
        self.counter.modulus()
    }

    /// Returns the input format.
    pub fn input_format(&self) -> Format {
        self.input_format
    }

    /// Returns the output format.
    pub fn output_format(&self) -> Format {
        self.output_format
    }

    /// Returns the mode applied to the next input sample.
    pub fn mode(&self) -> Mode {
        if self.counter.value() < self.size() / 2 {
            Mode::Feed
        } else {
            Mode::Combine
        }
    }

    // Stored sample produced in the given mode, if it is at the FIFO front.
    fn front(&self, mode: Mode) -> Option<&Complex> {
        self.feedback
            .front()
            .filter(|entry| entry.mode == mode)
            .map(|entry| &entry.value)
    }
}

impl Stage for SdfRadix2Stage {
    type Input = Complex;
    type Output = Complex;

    fn ready(&self, output_ready: bool) -> bool {
        match self.mode() {
            Mode::Feed => {
                !self.feedback.is_full() || (self.front(Mode::Combine).is_some() && output_ready)
            }
            Mode::Combine => output_ready && self.front(Mode::Feed).is_some(),
        }
    }

    fn output(&self, input: Option<&Complex>) -> Option<Complex> {
        match self.mode() {
            Mode::Feed => self.front(Mode::Combine).copied(),
            Mode::Combine => {
                let stored = self.front(Mode::Feed)?;
                Some((*stored + *input?).reshape(self.output_format, Rounding::Truncate))
            }
        }
    }

    fn clock(&mut self, input: Option<&Complex>, output_ready: bool) {
        let consumed = self.consumes(input, output_ready);
        match self.mode() {
            Mode::Feed => {
                if output_ready && self.front(Mode::Combine).is_some() {
                    self.feedback.pop();
                }
                if let (Some(&x), true) = (input, consumed) {
                    self.feedback.push(Tagged {
                        value: x.reshape(self.output_format, Rounding::Truncate),
                        mode: Mode::Feed,
                    });
                    self.counter.advance();
                }
            }
            Mode::Combine => {
                if let (Some(&x), true) = (input, consumed) {
                    if let Some(stored) = self.feedback.pop() {
                        self.feedback.push(Tagged {
                            value: (stored.value - x)
                                .reshape(self.output_format, Rounding::Truncate),
                            mode: Mode::Combine,
                        });
                    }
                    self.counter.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::Simulator;

    fn real(values: &[i128]) -> Vec<Complex> {
        let format = Format::integer(4).unwrap();
        values
            .iter()
            .map(|&x| Complex::from_bits(format, x, 0))
            .collect()
    }

    #[test]
    fn four_point_butterfly() {
        let mut stage = SdfRadix2Stage::new(4, Format::integer(4).unwrap()).unwrap();
        let run = Simulator::new()
            .run(&mut stage, real(&[0, 1, 2, 3]), 4)
            .unwrap();
        let outputs = run.outputs.iter().map(|x| x.re().bits()).collect::<Vec<_>>();
        assert_eq!(outputs, vec![2, 4, -2, -2]);
        assert_eq!(run.outputs[0].format(), Format::integer(5).unwrap());
    }

    #[test]
    fn consecutive_blocks_with_stalls() {
        let inputs = real(&[0, 1, 2, 3, 3, -1, 5, -4, 7, 7, 7, 7]);
        let expected = vec![2, 4, -2, -2, 8, -5, -2, 3, 14, 14, 0, 0];
        for idle in 0..3 {
            for stall in 0..3 {
                let mut stage = SdfRadix2Stage::new(4, Format::integer(4).unwrap()).unwrap();
                let run = Simulator::new()
                    .with_input_idle_cycles(idle)
                    .with_output_stall_cycles(stall)
                    .run(&mut stage, inputs.clone(), 12)
                    .unwrap();
                let outputs = run.outputs.iter().map(|x| x.re().bits()).collect::<Vec<_>>();
                assert_eq!(outputs, expected);
            }
        }
    }

    #[test]
    fn modes() {
        let mut stage = SdfRadix2Stage::new(2, Format::integer(4).unwrap()).unwrap();
        assert_eq!(stage.mode(), Mode::Feed);
        let x = Complex::from_bits(Format::integer(4).unwrap(), 1, 0);
        stage.clock(Some(&x), true);
        assert_eq!(stage.mode(), Mode::Combine);
        // the stored sample cannot leave before it is combined
        assert_eq!(stage.output(None), None);
        assert!(!stage.ready(false));
        assert!(SdfRadix2Stage::new(6, Format::integer(4).unwrap()).is_err());
    }
}
