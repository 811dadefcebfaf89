// Live coding session engine: realtime channel, autosave snapshots and
// proctoring heuristics. Code execution goes through crate::judge.

pub mod controller;
pub mod proctor;
pub mod protocol;
pub mod registry;
pub mod snapshots;
pub mod ws;
