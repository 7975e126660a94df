pub mod cat;
mod dispatch;
pub mod parse;
pub mod patch;

pub use dispatch::dispatch;
