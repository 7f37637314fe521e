//! Network helpers - target resolution

mod resolve;

pub use resolve::{resolve, resolve_with};
