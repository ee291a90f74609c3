//! Stage-local modulo counters.
//!
//! Stages that change behaviour periodically (butterflies, rate changers,
//! bit exchanges) count the samples they transfer with a [`ModCounter`] and
//! derive their operating mode from its value.

/// Free-running modulo counter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ModCounter {
    value: usize,
    modulus: usize,
}

impl ModCounter {
    /// Creates a counter that counts from 0 to `modulus - 1`.
    ///
    /// A modulus of 0 is treated as 1.
    pub fn new(modulus: usize) -> ModCounter {
        ModCounter {
            value: 0,
            modulus: modulus.max(1),
        }
    }

    /// Returns the current value.
    pub fn value(&self) -> usize {
        self.value
    }

    /// Returns the modulus.
    pub fn modulus(&self) -> usize {
        self.modulus
    }

    /// Returns `true` if the counter is at 0.
    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Returns bit `n` of the current value.
    pub fn bit(&self, n: u32) -> bool {
        (self.value >> n) & 1 != 0
    }

    /// Advances the counter by one.
    pub fn advance(&mut self) {
        self.value += 1;
        if self.value == self.modulus {
            self.value = 0;
        }
    }
}
