//! Fuzz target: engine input CSV encoding.
//!
//! Builds location rows from arbitrary bytes and checks the encoded file reads
//! back as one header plus one record per location, identifiers intact.

#![no_main]

use climgate_core::{Location, INPUT_HEADER};
use climgate_executor::encode_input;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let locations: Vec<Location> = text
        .split('\n')
        .take(64)
        .enumerate()
        .map(|(i, id)| Location::new(id, i.to_string(), 45.0, -100.0, f64::from(u8::try_from(i).unwrap_or(0))))
        .collect();

    let Ok(bytes) = encode_input(&locations) else {
        return;
    };

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(&bytes[..]);
    let header = reader.headers().map(|h| h.iter().map(str::to_owned).collect::<Vec<_>>());
    assert_eq!(header.ok().as_deref(), Some(&INPUT_HEADER.map(str::to_owned)[..]));

    let records: Vec<csv::StringRecord> = reader.records().filter_map(Result::ok).collect();
    assert_eq!(records.len(), locations.len());
    for (record, location) in records.iter().zip(&locations) {
        assert_eq!(&record[0], location.id1);
    }
});
