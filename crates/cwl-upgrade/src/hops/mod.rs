//! Built-in hops

mod v1_0;
mod v1_1;

pub use v1_0::UpgradeV1_0;
pub use v1_1::UpgradeV1_1;
