//! Test support: scripted processors and recording fakes.
//!
//! These are exported so downstream crates can exercise their plans without
//! real processors.

mod processors;

pub use processors::{
    FlakyProcessor, RecordingProcessor, ScriptedProcessor, SleepyProcessor, StaticProcessor,
};
