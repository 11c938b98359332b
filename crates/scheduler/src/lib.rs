//! Background scheduler driving strategy ticks, the expiry sweep, and HR
//! sync on independent intervals (spec §5, §9 "global mutable state").

pub mod config;
pub mod processor;

pub use config::SchedulerConfig;
pub use processor::BackgroundProcessor;
