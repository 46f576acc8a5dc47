//! Behavioral-training apparatus controller.
//!
//! Ingests beam-break events from the apparatus into a shared sensor
//! registry and runs timed trial protocols against it, commanding LEDs,
//! valves, a door and a rotating table over the same serial link.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod ingest;
pub mod policy;
pub mod sensors;
pub mod session;
pub mod stop;
pub mod trial;
