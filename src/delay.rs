//! Delay lines.
//!
//! This module contains three buffering primitives:
//!
//! - [`Delay`], a fixed delay line that returns the value shifted in `depth`
//!   shifts earlier. It can be built from a chain of registers or from a
//!   circular memory, with identical behaviour.
//! - [`FifoDelay`], a FIFO of bounded depth used for the feedback paths of the
//!   FFT butterflies and of the bit exchange stages. Unlike a fixed delay line,
//!   its occupancy can change, which lets the stages that use it stall without
//!   losing synchronization.
//! - [`StreamDelay`], a pipeline [`Stage`] that delays a stream by a number of
//!   clock cycles, honouring the handshake.

use crate::stream::{Register, Stage};
use anyhow::{bail, Result};
use std::collections::VecDeque;

/// Delay line implementation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DelayKind {
    /// Chain of registers.
    Registers,
    /// Circular buffer in a memory.
    Memory,
}

impl DelayKind {
    /// Depth above which a memory is used by [`Delay::new`].
    pub const REGISTERS_MAX_DEPTH: usize = 4;
}

/// Fixed delay line.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Delay<T> {
    kind: DelayKind,
    cells: Vec<T>,
    // next memory cell to read and write (unused by registers)
    address: usize,
}

impl<T: Clone> Delay<T> {
    /// Creates a delay line of the given depth, filled with `fill`.
    ///
    /// Short delay lines use registers and long ones use a memory.
    pub fn new(depth: usize, fill: T) -> Result<Delay<T>> {
        let kind = if depth <= DelayKind::REGISTERS_MAX_DEPTH {
            DelayKind::Registers
        } else {
            DelayKind::Memory
        };
        Delay::with_kind(kind, depth, fill)
    }

    /// Creates a delay line with a given implementation.
    pub fn with_kind(kind: DelayKind, depth: usize, fill: T) -> Result<Delay<T>> {
        if depth == 0 {
            bail!("delay line depth must be at least 1");
        }
        Ok(Delay {
            kind,
            cells: vec![fill; depth],
            address: 0,
        })
    }

    /// Returns the depth.
    pub fn depth(&self) -> usize {
        self.cells.len()
    }

    /// Returns the implementation.
    pub fn kind(&self) -> DelayKind {
        self.kind
    }

    /// Returns the value that the next shift will evict.
    pub fn oldest(&self) -> &T {
        match self.kind {
            DelayKind::Registers => &self.cells[self.cells.len() - 1],
            DelayKind::Memory => &self.cells[self.address],
        }
    }

    /// Shifts a value in, returning the oldest one.
    pub fn shift(&mut self, value: T) -> T {
        match self.kind {
            DelayKind::Registers => {
                self.cells.rotate_right(1);
                std::mem::replace(&mut self.cells[0], value)
            }
            DelayKind::Memory => {
                let oldest = std::mem::replace(&mut self.cells[self.address], value);
                self.address = (self.address + 1) % self.cells.len();
                oldest
            }
        }
    }
}

/// FIFO of bounded depth.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct FifoDelay<T> {
    entries: VecDeque<T>,
    depth: usize,
}

impl<T> FifoDelay<T> {
    /// Creates an empty FIFO.
    pub fn new(depth: usize) -> Result<FifoDelay<T>> {
        if depth == 0 {
            bail!("FIFO depth must be at least 1");
        }
        Ok(FifoDelay {
            entries: VecDeque::with_capacity(depth),
            depth,
        })
    }

    /// Returns the depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the FIFO holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the FIFO cannot accept more entries.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.depth
    }

    /// Returns the oldest entry.
    pub fn front(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Appends an entry.
    ///
    /// Pushing to a full FIFO breaks the handshake contract of the stage that
    /// owns it.
    pub fn push(&mut self, value: T) {
        debug_assert!(!self.is_full(), "push to a full FIFO");
        self.entries.push_back(value);
    }

    /// Removes the oldest entry.
    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    /// Moves the oldest entry to the back.
    pub fn rotate(&mut self) {
        if let Some(value) = self.entries.pop_front() {
            self.entries.push_back(value);
        }
    }
}

/// Stream delay stage.
///
/// The stage is a chain of output registers. When the output is never stalled
/// each sample appears at the output `depth` cycles after being accepted. A
/// stalled output fills the empty registers before the input is stalled.
#[derive(Debug, Clone)]
pub struct StreamDelay<T> {
    registers: Vec<Register<T>>,
}

impl<T: Clone> StreamDelay<T> {
    /// Creates a stream delay of the given depth.
    pub fn new(depth: usize) -> Result<StreamDelay<T>> {
        if depth == 0 {
            bail!("stream delay depth must be at least 1");
        }
        Ok(StreamDelay {
            registers: vec![Register::new(); depth],
        })
    }

    /// Returns the depth.
    pub fn depth(&self) -> usize {
        self.registers.len()
    }

    // Ready signal at the output of each register, ordered from input to
    // output.
    fn readies(&self, output_ready: bool) -> Vec<bool> {
        let mut readies = vec![output_ready; self.registers.len()];
        for n in (0..self.registers.len() - 1).rev() {
            readies[n] = self.registers[n + 1].produce(readies[n + 1]);
        }
        readies
    }
}

impl<T: Clone> Stage for StreamDelay<T> {
    type Input = T;
    type Output = T;

    fn ready(&self, output_ready: bool) -> bool {
        self.registers[0].produce(self.readies(output_ready)[0])
    }

    fn output(&self, _input: Option<&T>) -> Option<T> {
        self.registers[self.registers.len() - 1].output()
    }

    fn clock(&mut self, input: Option<&T>, output_ready: bool) {
        let readies = self.readies(output_ready);
        for n in (0..self.registers.len()).rev() {
            if self.registers[n].produce(readies[n]) {
                let value = match n {
                    0 => input.cloned(),
                    _ => self.registers[n - 1].output(),
                };
                self.registers[n].load(value);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn registers_and_memory_agree() {
        for depth in [1, 2, 3, 7] {
            let mut registers = Delay::with_kind(DelayKind::Registers, depth, 0).unwrap();
            let mut memory = Delay::with_kind(DelayKind::Memory, depth, 0).unwrap();
            for x in 1..50 {
                assert_eq!(registers.oldest(), memory.oldest());
                let a = registers.shift(x);
                let b = memory.shift(x);
                assert_eq!(a, b);
                let expected = if x > depth as i32 { x - depth as i32 } else { 0 };
                assert_eq!(a, expected);
            }
        }
    }

    #[test]
    fn delay_kind_selection() {
        assert_eq!(Delay::new(2, 0u8).unwrap().kind(), DelayKind::Registers);
        assert_eq!(Delay::new(32, 0u8).unwrap().kind(), DelayKind::Memory);
        assert!(Delay::new(0, 0u8).is_err());
    }

    #[test]
    fn fifo() {
        let mut fifo = FifoDelay::new(3).unwrap();
        assert!(fifo.is_empty());
        fifo.push(1);
        fifo.push(2);
        fifo.push(3);
        assert!(fifo.is_full());
        fifo.rotate();
        assert_eq!(fifo.pop(), Some(2));
        assert_eq!(fifo.front(), Some(&3));
        assert_eq!(fifo.len(), 2);
        assert!(FifoDelay::<u8>::new(0).is_err());
    }

    #[test]
    fn stream_delay_latency() {
        let mut delay = StreamDelay::new(3).unwrap();
        let mut outputs = Vec::new();
        for cycle in 0..8 {
            let input = (cycle < 4).then_some(cycle);
            if let Some(y) = delay.output(input.as_ref()) {
                outputs.push((cycle, y));
            }
            delay.clock(input.as_ref(), true);
        }
        assert_eq!(outputs, vec![(3, 0), (4, 1), (5, 2), (6, 3)]);
    }

    #[test]
    fn stream_delay_stall() {
        let mut delay = StreamDelay::new(2).unwrap();
        // fill both registers while stalled
        for x in [1, 2, 3] {
            let ready = delay.ready(false);
            delay.clock(Some(&x), false);
            assert_eq!(ready, x < 3);
        }
        assert_eq!(delay.output(None), Some(1));
        delay.clock(Some(&3), true);
        assert_eq!(delay.output(None), Some(2));
        delay.clock(None, true);
        assert_eq!(delay.output(None), Some(3));
    }
}
