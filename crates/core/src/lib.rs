#![forbid(unsafe_code)]

pub mod codec;
pub mod gate;
pub mod model;
pub mod time;

pub use time::Clock;
