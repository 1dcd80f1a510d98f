//! Command handlers

mod keys;
mod template;
mod verify;

pub use keys::*;
pub use template::*;
pub use verify::*;
