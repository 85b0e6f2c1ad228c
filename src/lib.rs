//! Live bundle feed renderer: reassembles image bundles from a websocket
//! feed, scrolls them past a marking line, reveals verdicts, and runs an
//! investigation overlay and balance bar alongside.
pub mod app;
pub mod config;
pub mod core;
pub mod feed;
pub mod ui;
pub mod utils;
