//! Fuzz target: protocol plan loading
//!
//! Arbitrary text through `ProtocolPlan::from_json`:
//! - No panics, malformed input is a typed config error
//! - A plan that loads also passes validation on its own
//!
//! cargo fuzz run fuzz_protocol_json

#![no_main]

use behaviorbox::config::ProtocolPlan;
use behaviorbox::error::Error;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    match ProtocolPlan::from_json(text) {
        Ok(plan) => assert_eq!(plan.validate(), Ok(())),
        Err(e) => assert!(matches!(e, Error::Config(_) | Error::InvalidTablePosition(_))),
    }
});
