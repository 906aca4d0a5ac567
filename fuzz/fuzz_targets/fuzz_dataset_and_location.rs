//! Fuzz target: `ReferenceDataset::new` and `Location::validate`.
//!
//! The first 24 bytes become latitude, longitude and elevation; the rest is
//! tried as a dataset name. An accepted name must stay a bare file name and
//! an accepted location must sit inside the coordinate ranges.

#![no_main]

use climgate_core::{Location, ReferenceDataset};
use libfuzzer_sys::fuzz_target;

fn coord(bytes: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    f64::from_le_bytes(buf)
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 24 {
        return;
    }
    let (coords, rest) = data.split_at(24);

    let location = Location::new("a", "b", coord(&coords[0..8]), coord(&coords[8..16]), coord(&coords[16..24]));
    if location.validate().is_ok() {
        assert!((-90.0..=90.0).contains(&location.latitude));
        assert!((-180.0..=180.0).contains(&location.longitude));
        assert!(location.elevation.is_finite());
        let row = location.to_row();
        assert_eq!(row[2].parse::<f64>().ok(), Some(location.latitude), "latitude must round-trip");
    }

    let Ok(name) = std::str::from_utf8(rest) else {
        return;
    };
    if let Ok(dataset) = ReferenceDataset::new(name) {
        let accepted = dataset.as_str();
        assert!(!accepted.trim().is_empty());
        assert!(!accepted.contains(['/', '\\', ':']), "dataset name must not be a path: {accepted:?}");
        assert!(!accepted.contains(".."), "dataset name must not climb: {accepted:?}");
    }
});
