//! dsp-sandbox is a cycle-accurate model of fixed-point streaming DSP blocks
//! intended for FPGA implementation. Samples travel between pipeline stages
//! over links with a valid/ready handshake, and every stage is evaluated once
//! per clock cycle, so that the effect of stalls and idle cycles on each
//! stage can be studied bit-exactly.
//!
//! The blocks available are CIC interpolators and decimators, with bit growth
//! and Hogenauer register pruning, and a radix-2² single-path delay feedback
//! FFT with an optional bit reversal network to produce its output in natural
//! order.

#![warn(missing_docs)]

pub mod app;
pub mod args;
pub mod bit_reversal;
pub mod cic;
pub mod complex;
pub mod counter;
pub mod delay;
pub mod design;
pub mod fft;
pub mod fixed_point;
pub mod sim;
pub mod skid_buffer;
pub mod stream;
