//! Framing
//!
//! Turns a continuous stream of interleaved samples into fixed-size,
//! hop-spaced, optionally windowed [`Frame`]s.

pub mod frame;
pub mod framer;
pub mod window;

pub use frame::Frame;
pub use framer::Framer;
