#![doc = "Threading and power-management glue for the hubclock daemon."]

pub mod wakelock;
pub mod worker;

pub use wakelock::*;
pub use worker::*;
