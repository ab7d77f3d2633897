//! Platform plumbing: screen capture, keyboard output, process interrupt.

pub mod capture;
pub mod keys;
pub mod signal;
