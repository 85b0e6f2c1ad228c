// src/feed/mod.rs
//! The bundle pipeline: event decoding, reassembly, one-at-a-time playback,
//! late verdicts, and the two side channels (investigation overlay, balance).
pub mod assembler;
pub mod balance;
pub mod bundle;
pub mod cache;
pub mod decisions;
pub mod engine;
pub mod event;
pub mod overlay;
pub mod scheduler;
mod session;

pub use session::{Session, SessionSettings, SessionStatus};
