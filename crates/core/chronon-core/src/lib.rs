//! Core primitives shared by the chronon timer crates.
//!
//! Contains the interrupt-masking lock used to serialize the timer queue
//! against its own interrupt handler, and the leveled kernel log macros.
//! Host-testable: the CPU interrupt mask degrades to a no-op when not
//! running on bare metal.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod log;
pub mod sync;
