//! Domain types: symbols, resolutions, tick/payload types and bars.

pub mod bar;
pub mod resolution;
pub mod symbol;

pub use bar::MarketBar;
pub use resolution::{PayloadType, Resolution, TickType};
pub use symbol::{SecurityType, Symbol};
