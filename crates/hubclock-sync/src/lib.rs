#![doc = "Hardware tick counter to wall-clock timestamp synchronization."]

pub mod convert;
pub mod estimator;
pub mod policy;
pub mod sync;
pub mod tick_source;
pub mod wall_clock;

pub use convert::*;
pub use estimator::*;
pub use policy::*;
pub use sync::*;
pub use tick_source::*;
pub use wall_clock::*;
