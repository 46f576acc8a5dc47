//! Integration tests for behaviorbox.
//!
//! Drives the trial machine and whole sessions against mock hardware and
//! scripted sensor timelines.  Timings are scaled down to milliseconds;
//! assertions leave room for scheduler jitter.


mod ingest_tests;
mod session_tests;
mod trial_tests;
