//! Common types shared by the distillation pipeline crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
