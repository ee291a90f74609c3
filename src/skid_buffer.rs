//! Skid buffer.
//!
//! A skid buffer breaks the combinational `ready` path between two stages.
//! Its input `ready` only depends on its own state: it is asserted whenever
//! the internal slot is empty. If the downstream stage stalls in the same
//! cycle in which a sample is accepted, the sample is kept in the slot and
//! emitted once the downstream stage becomes ready again, so no sample is
//! dropped and the throughput is not reduced.

use crate::stream::{Handshake, Register, Stage};

/// Skid buffer stage.
#[derive(Debug, Clone)]
pub struct SkidBuffer<T> {
    buffer: Option<T>,
    // only used when the output is registered
    output: Option<Register<T>>,
}

impl<T: Clone> SkidBuffer<T> {
    /// Creates a skid buffer whose output is driven combinationally.
    pub fn new() -> SkidBuffer<T> {
        SkidBuffer {
            buffer: None,
            output: None,
        }
    }

    /// Creates a skid buffer whose output is driven by a register.
    ///
    /// This cuts the forward path as well as the `ready` path, at the cost of
    /// one cycle of latency.
    pub fn registered() -> SkidBuffer<T> {
        SkidBuffer {
            buffer: None,
            output: Some(Register::new()),
        }
    }

    /// Returns `true` if the output is registered.
    pub fn is_registered(&self) -> bool {
        self.output.is_some()
    }

    /// Returns `true` if the internal slot holds a sample.
    pub fn is_armed(&self) -> bool {
        self.buffer.is_some()
    }

    // Payload presented to the output (or to the output register).
    fn next_output(&self, input: Option<&T>) -> Option<T> {
        self.buffer.clone().or_else(|| input.cloned())
    }

    // Output valid of this cycle.
    fn output_valid(&self, input: Option<&T>) -> bool {
        match &self.output {
            Some(register) => register.is_valid(),
            None => self.buffer.is_some() || input.is_some(),
        }
    }
}

impl<T: Clone> Default for SkidBuffer<T> {
    fn default() -> SkidBuffer<T> {
        SkidBuffer::new()
    }
}

impl<T: Clone> Stage for SkidBuffer<T> {
    type Input = T;
    type Output = T;

    fn ready(&self, _output_ready: bool) -> bool {
        !self.is_armed()
    }

    fn output(&self, input: Option<&T>) -> Option<T> {
        match &self.output {
            Some(register) => register.output(),
            None => self.next_output(input),
        }
    }

    fn clock(&mut self, input: Option<&T>, output_ready: bool) {
        let input_handshake = Handshake::new(input.is_some(), !self.is_armed());
        let output_handshake = Handshake::new(self.output_valid(input), output_ready);
        let next_output = self.next_output(input);
        if let Some(register) = &mut self.output {
            if output_handshake.produce() {
                register.load(next_output);
            }
        }
        if input_handshake.consume() && !output_handshake.produce() {
            self.buffer = input.cloned();
        } else if output_ready {
            self.buffer = None;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(buffer: &mut SkidBuffer<u32>, stalls: &[bool], count: u32) -> Vec<u32> {
        let mut next = 0;
        let mut outputs = Vec::new();
        for &stall in stalls {
            let output_ready = !stall;
            let input = (next < count).then_some(next);
            if output_ready {
                outputs.extend(buffer.output(input.as_ref()));
            }
            if buffer.consumes(input.as_ref(), output_ready) {
                next += 1;
            }
            buffer.clock(input.as_ref(), output_ready);
        }
        outputs
    }

    #[test]
    fn passthrough() {
        let mut buffer = SkidBuffer::new();
        assert_eq!(run(&mut buffer, &[false; 5], 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn absorbs_stall() {
        let stalls = [false, true, false, false, true, true, false, false, false, false];
        let mut buffer = SkidBuffer::new();
        assert_eq!(run(&mut buffer, &stalls, 6), vec![0, 1, 2, 3, 4, 5]);
        let mut buffer = SkidBuffer::registered();
        assert_eq!(run(&mut buffer, &stalls, 6), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn ready_only_depends_on_state() {
        let mut buffer = SkidBuffer::new();
        assert!(buffer.ready(false));
        buffer.clock(Some(&7), false);
        assert!(buffer.is_armed());
        assert!(!buffer.ready(true));
        assert_eq!(buffer.output(Some(&8)), Some(7));
        buffer.clock(Some(&8), true);
        assert!(!buffer.is_armed());
        assert_eq!(buffer.output(Some(&8)), Some(8));
    }
}
