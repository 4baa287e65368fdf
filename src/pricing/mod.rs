//! Fee & Sizing Model (§4.D).

pub mod fees;

pub use fees::{FeeCurve, FeeModel, SizingResult};
