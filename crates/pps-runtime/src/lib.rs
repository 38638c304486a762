#![doc = "Capture loop and report output for ppsstat."]

pub mod monitor;
pub mod report;

pub use monitor::*;
pub use report::*;
