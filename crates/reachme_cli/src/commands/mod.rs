//! CLI command implementations.

pub mod decode;
pub mod inspect;
pub mod merge;
pub mod preview;
