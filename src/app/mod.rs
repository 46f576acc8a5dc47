//! Application boundary.
//!
//! Trial and session logic never touch the serial link or the filesystem
//! directly.  Everything outbound goes through the **port traits** defined
//! in [`ports`], and every notable occurrence is described by an
//! [`events::AppEvent`], keeping the domain layer testable with mock
//! adapters.

pub mod events;
pub mod ports;
