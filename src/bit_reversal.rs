//! Serial bit reversal.
//!
//! A radix-2 decimation-in-frequency FFT produces its output in bit-reversed
//! order: the `n`-th output sample of a block is the bin whose index is `n`
//! with its bits reversed. [`SerialBitReversal`] reorders a stream of blocks
//! into natural order.
//!
//! Reversing the bits of a `B`-bit index is the same as exchanging the bit
//! pairs `(B - 1, 0)`, `(B - 2, 1)`, ... in turn. A [`SerialBitExchange`]
//! exchanges a single pair of bits `(j, k)` of the sample indices using a FIFO
//! of `2^j - 2^k` samples. Samples whose index bits `j` and `k` are equal stay
//! in place, while the others are delayed or advanced by `2^j - 2^k`
//! positions.
//!
//! References:
//!
//! - M. Garrido, J. Grajal and O. Gustafsson, "Optimum Circuits for Bit
//!   Reversal", IEEE Trans. Circuits Syst. II, vol. 58, 2011.

use crate::{
    counter::ModCounter,
    delay::FifoDelay,
    stream::{Pipeline, Stage},
};
use anyhow::{bail, Result};

/// Reverses the low `bits` bits of `index`.
pub fn bit_reverse(index: usize, bits: u32) -> usize {
    if bits == 0 {
        return 0;
    }
    index.reverse_bits() >> (usize::BITS - bits)
}

// Input side switch. Samples either enter the FIFO or bypass it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
enum InputSide {
    Store,
    Bypass,
}

// Output side switch. The output is either the FIFO front or the bypass.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
enum OutputSide {
    Delay,
    Bypass,
}

/// Commutation state of a [`SerialBitExchange`].
///
/// The input and output switches follow separate counters, so under stalls
/// one side can change path before the other one.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Commutation {
    /// Both switches use the same path, either the FIFO or the bypass.
    Settled,
    /// One switch has changed path and waits for the other side.
    InFlight,
}

/// Serial exchange of two bits of the sample index.
///
/// Exchanges bits `j` and `k`, with `j > k`, of the index of each sample
/// within blocks of `2^(j + 1)` samples.
#[derive(Debug, Clone)]
pub struct SerialBitExchange<T> {
    fifo: FifoDelay<T>,
    high: u32,
    low: u32,
    // counts samples accepted at the input
    input_counter: ModCounter,
    // counts samples produced at the output
    output_counter: ModCounter,
}

impl<T: Clone> SerialBitExchange<T> {
    /// Creates a stage that exchanges bits `high` and `low`.
    pub fn new(high: u32, low: u32) -> Result<SerialBitExchange<T>> {
        if high <= low {
            bail!("bit exchange needs high bit {high} above low bit {low}");
        }
        if high >= usize::BITS - 2 {
            bail!("bit exchange of bit {high} is too large");
        }
        let block = 1 << (high + 1);
        Ok(SerialBitExchange {
            fifo: FifoDelay::new((1 << high) - (1 << low))?,
            high,
            low,
            input_counter: ModCounter::new(block),
            output_counter: ModCounter::new(block),
        })
    }

    /// Returns the pair of bits exchanged.
    pub fn bits(&self) -> (u32, u32) {
        (self.high, self.low)
    }

    /// Returns the FIFO depth.
    pub fn depth(&self) -> usize {
        self.fifo.depth()
    }

    /// Returns the commutation state.
    pub fn commutation(&self) -> Commutation {
        match (self.input_side(), self.output_side()) {
            (InputSide::Store, OutputSide::Delay) | (InputSide::Bypass, OutputSide::Bypass) => {
                Commutation::Settled
            }
            (InputSide::Store, OutputSide::Bypass) | (InputSide::Bypass, OutputSide::Delay) => {
                Commutation::InFlight
            }
        }
    }

    fn input_side(&self) -> InputSide {
        if self.input_counter.bit(self.high) && !self.input_counter.bit(self.low) {
            InputSide::Bypass
        } else {
            InputSide::Store
        }
    }

    fn output_side(&self) -> OutputSide {
        if !self.output_counter.bit(self.high) && self.output_counter.bit(self.low) {
            OutputSide::Bypass
        } else {
            OutputSide::Delay
        }
    }
}

impl<T: Clone> Stage for SerialBitExchange<T> {
    type Input = T;
    type Output = T;

    fn ready(&self, output_ready: bool) -> bool {
        match (self.commutation(), self.input_side()) {
            (Commutation::Settled, InputSide::Store) => {
                !self.fifo.is_full() || (!self.fifo.is_empty() && output_ready)
            }
            (Commutation::Settled, InputSide::Bypass) => output_ready,
            // the output waits for the next sample to cross over
            (Commutation::InFlight, InputSide::Store) => !self.fifo.is_full(),
            // the bypassed sample has to wait for its output slot
            (Commutation::InFlight, InputSide::Bypass) => false,
        }
    }

    fn output(&self, input: Option<&T>) -> Option<T> {
        match (self.input_side(), self.output_side()) {
            (_, OutputSide::Delay) => self.fifo.front().cloned(),
            (InputSide::Bypass, OutputSide::Bypass) => input.cloned(),
            (InputSide::Store, OutputSide::Bypass) => None,
        }
    }

    fn clock(&mut self, input: Option<&T>, output_ready: bool) {
        let consumed = self.consumes(input, output_ready);
        match (self.input_side(), self.output_side()) {
            (input_side, OutputSide::Delay) => {
                if output_ready && !self.fifo.is_empty() {
                    self.fifo.pop();
                    self.output_counter.advance();
                }
                if let (Some(x), true, InputSide::Store) = (input, consumed, input_side) {
                    self.fifo.push(x.clone());
                    self.input_counter.advance();
                }
            }
            (InputSide::Bypass, OutputSide::Bypass) => {
                // the delayed samples recirculate while the input crosses over
                if consumed {
                    self.fifo.rotate();
                    self.input_counter.advance();
                    self.output_counter.advance();
                }
            }
            (InputSide::Store, OutputSide::Bypass) => {
                if let (Some(x), true) = (input, consumed) {
                    self.fifo.push(x.clone());
                    self.input_counter.advance();
                }
            }
        }
    }
}

/// Serial bit reversal.
///
/// Reorders blocks of `2^bits` samples so that the sample at position `n` of
/// each input block leaves at position `bit_reverse(n, bits)` of the
/// corresponding output block. The reordering is its own inverse.
#[derive(Debug, Clone)]
pub struct SerialBitReversal<T> {
    bits: u32,
    pipeline: Pipeline<SerialBitExchange<T>>,
}

impl<T: Clone> SerialBitReversal<T> {
    /// Creates a bit reversal for blocks of `size` samples.
    pub fn new(size: usize) -> Result<SerialBitReversal<T>> {
        if size == 0 || !size.is_power_of_two() {
            bail!("bit reversal size {size} is not a power of two");
        }
        let bits = size.trailing_zeros();
        let mut exchanges = Vec::new();
        let (mut high, mut low) = (bits.saturating_sub(1), 0);
        while high > low {
            exchanges.push(SerialBitExchange::new(high, low)?);
            high -= 1;
            low += 1;
        }
        Ok(SerialBitReversal {
            bits,
            pipeline: Pipeline::new(exchanges),
        })
    }

    /// Returns the block size.
    pub fn size(&self) -> usize {
        1 << self.bits
    }

    /// Returns the bit exchange stages.
    pub fn exchanges(&self) -> &[SerialBitExchange<T>] {
        self.pipeline.stages()
    }
}

impl<T: Clone> Stage for SerialBitReversal<T> {
    type Input = T;
    type Output = T;

    fn ready(&self, output_ready: bool) -> bool {
        self.pipeline.ready(output_ready)
    }

    fn output(&self, input: Option<&T>) -> Option<T> {
        self.pipeline.output(input)
    }

    fn clock(&mut self, input: Option<&T>, output_ready: bool) {
        self.pipeline.clock(input, output_ready)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::Simulator;

    fn reordered(size: usize, blocks: usize) -> Vec<usize> {
        let bits = size.trailing_zeros();
        (0..blocks * size)
            .map(|n| n / size * size + bit_reverse(n % size, bits))
            .collect()
    }

    #[test]
    fn reverse_indices() {
        assert_eq!(bit_reverse(0b0011, 4), 0b1100);
        assert_eq!(bit_reverse(0b110, 3), 0b011);
        assert_eq!(bit_reverse(1, 1), 1);
        assert_eq!(bit_reverse(0, 0), 0);
    }

    #[test]
    fn single_exchange() {
        // exchanging bits 1 and 0 swaps the middle samples of each block of 4
        let mut exchange = SerialBitExchange::new(1, 0).unwrap();
        assert_eq!(exchange.depth(), 1);
        let run = Simulator::new().run(&mut exchange, 0..8, 8).unwrap();
        assert_eq!(run.outputs, vec![0, 2, 1, 3, 4, 6, 5, 7]);
    }

    #[test]
    fn commutation_in_flight() {
        let mut exchange = SerialBitExchange::new(1, 0).unwrap();
        assert_eq!(exchange.commutation(), Commutation::Settled);
        exchange.clock(Some(&0), true);
        assert_eq!(exchange.output(None), Some(0));
        // the delayed sample leaves while the source is idle
        exchange.clock(None, true);
        assert_eq!(exchange.commutation(), Commutation::InFlight);
        assert_eq!(exchange.output(None), None);
        assert!(exchange.ready(false));
        exchange.clock(Some(&1), false);
        // sample 2 now crosses straight to the output
        assert_eq!(exchange.commutation(), Commutation::Settled);
        assert!(!exchange.ready(false));
        assert_eq!(exchange.output(Some(&2)), Some(2));
    }

    #[test]
    fn reversal_with_stalls() {
        for size in [1, 2, 4, 8, 16, 64] {
            for idle in 0..3 {
                for stall in 0..3 {
                    let mut reversal = SerialBitReversal::new(size).unwrap();
                    let run = Simulator::new()
                        .with_input_idle_cycles(idle)
                        .with_output_stall_cycles(stall)
                        .run(&mut reversal, 0..2 * size, 2 * size)
                        .unwrap();
                    assert_eq!(run.outputs, reordered(size, 2), "size {size}");
                }
            }
        }
    }

    #[test]
    fn self_inverse() {
        let size = 32;
        let mut first = SerialBitReversal::new(size).unwrap();
        let once = Simulator::new()
            .with_output_stall_cycles(1)
            .run(&mut first, 0..3 * size, 3 * size)
            .unwrap();
        let mut second = SerialBitReversal::new(size).unwrap();
        let twice = Simulator::new()
            .with_input_idle_cycles(2)
            .run(&mut second, once.outputs, 3 * size)
            .unwrap();
        assert_eq!(twice.outputs, (0..3 * size).collect::<Vec<_>>());
    }

    #[test]
    fn invalid_sizes() {
        assert!(SerialBitReversal::<u32>::new(0).is_err());
        assert!(SerialBitReversal::<u32>::new(12).is_err());
        assert!(SerialBitExchange::<u32>::new(0, 1).is_err());
        assert_eq!(SerialBitReversal::<u32>::new(2).unwrap().exchanges().len(), 0);
        assert_eq!(SerialBitReversal::<u32>::new(16).unwrap().exchanges().len(), 2);
    }
}
