//! rttcert-core: question bank, balanced selection, and scoring for RTT
//! certification exams.
//!
//! The bank is loaded once and shared read-only; `selector::select` draws a
//! balanced exam from it and `scorer` grades the candidate's answers into a
//! certification award. `engine` ties both to an attempt history.

pub mod bank;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod history;
pub mod model;
pub mod parser;
pub mod report;
pub mod results;
pub mod scorer;
pub mod selector;
pub mod statistics;
