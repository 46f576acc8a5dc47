//! Fuzz target: serial line splitting and event parsing
//!
//! Feeds arbitrary bytes through `LineReader` in fuzz-chosen chunk sizes and
//! parses every line that comes out, verifying:
//! - No panics under arbitrary byte inputs
//! - Every line is ASCII and free of CR/LF
//! - Every accepted event line names a keyword and its state word
//!
//! cargo fuzz run fuzz_event_parser

#![no_main]

use std::io::Read;

use behaviorbox::adapters::serial::{LineReader, MAX_LINE};
use behaviorbox::app::ports::EventSource;
use behaviorbox::sensors::SensorState;
use behaviorbox::sensors::parse::parse_event;
use libfuzzer_sys::fuzz_target;

/// Hands out the input in chunks whose sizes come from the input itself.
struct Chunked<'a> {
    data: &'a [u8],
    step: usize,
}

impl Read for Chunked<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };

    let mut reader = LineReader::new(Chunked {
        data: rest,
        step: usize::from(first % 64) + 1,
    });

    // Every read consumes input, so this terminates.
    for _ in 0..=rest.len() {
        let Ok(Some(line)) = reader.read_line() else {
            continue;
        };
        assert!(line.is_ascii());
        assert!(!line.contains('\n') && !line.contains('\r'));
        assert!(line.len() <= MAX_LINE + 256);

        if let Some(event) = parse_event(&line) {
            let lower = line.to_ascii_lowercase();
            assert!(lower.contains("beambreak") || lower.contains("sensor"));
            let word = match event.state {
                SensorState::Triggered => "triggered",
                SensorState::Cleared => "cleared",
            };
            assert!(lower.contains(word));
        }
    }
});
