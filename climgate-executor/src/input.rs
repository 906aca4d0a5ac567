//! Engine input serialization.
//!
//! One header row followed by one row per location, CRLF-terminated, columns
//! in [`INPUT_HEADER`] order.

use std::path::Path;

use climgate_core::{Location, INPUT_HEADER};

use crate::ExecutorError;

/// Encode `locations` as engine input CSV.
///
/// # Errors
/// Returns [`ExecutorError::InputSerialization`] if the CSV writer fails.
pub fn encode_input(locations: &[Location]) -> Result<Vec<u8>, ExecutorError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(INPUT_HEADER).map_err(serialization)?;
    for location in locations {
        writer.write_record(location.to_row()).map_err(serialization)?;
    }

    writer
        .into_inner()
        .map_err(|e| ExecutorError::InputSerialization(e.to_string()))
}

/// Encode `locations` and write them to `path`.
///
/// # Errors
/// Returns [`ExecutorError::InputSerialization`] on encoding failure and
/// [`ExecutorError::Io`] if the file cannot be written.
pub async fn write_input(path: &Path, locations: &[Location]) -> Result<(), ExecutorError> {
    let bytes = encode_input(locations)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

fn serialization(e: csv::Error) -> ExecutorError {
    ExecutorError::InputSerialization(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(locations: &[Location]) -> String {
        match encode_input(locations) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(e) => panic!("input must be utf-8: {e}"),
            },
            Err(e) => panic!("encode failed: {e}"),
        }
    }

    #[test]
    fn header_then_one_line_per_location() {
        let text = encode(&[
            Location::new("a", "1", 49.5, -123.25, 100.0),
            Location::new("b", "2", 53.0, -118.0, 1200.5),
        ]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["id1,id2,lat,long,elev", "a,1,49.5,-123.25,100", "b,2,53,-118,1200.5"]);
        assert!(text.ends_with("\r\n"), "rows must be CRLF-terminated");
    }

    #[test]
    fn empty_batch_is_header_only() {
        assert_eq!(encode(&[]), "id1,id2,lat,long,elev\r\n");
    }

    #[test]
    fn identifiers_with_commas_are_quoted() {
        let text = encode(&[Location::new("plot, north", "q\"1", 50.0, -120.0, 0.0)]);
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let row = match reader.records().next() {
            Some(Ok(r)) => r,
            other => panic!("expected one record, got {other:?}"),
        };
        assert_eq!(&row[0], "plot, north");
        assert_eq!(&row[1], "q\"1");
    }

    #[tokio::test]
    async fn write_input_creates_file() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("tempdir: {e}"),
        };
        let path = dir.path().join("input.csv");
        let locations = [Location::new("a", "b", 1.0, 2.0, 3.0)];
        if let Err(e) = write_input(&path, &locations).await {
            panic!("write_input failed: {e}");
        }
        let written = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => panic!("read failed: {e}"),
        };
        assert_eq!(written, b"id1,id2,lat,long,elev\r\na,b,1,2,3\r\n");
    }

    proptest::proptest! {
        #[test]
        fn proptest_rows_round_trip_in_column_order(
            rows in proptest::collection::vec(
                ("[a-zA-Z0-9 ,\"]{0,12}", "[a-z0-9]{1,6}", -90.0f64..=90.0, -180.0f64..=180.0, -400.0f64..6000.0),
                0..40usize,
            ),
        ) {
            let locations: Vec<Location> = rows
                .iter()
                .map(|(a, b, lat, long, elev)| Location::new(a.clone(), b.clone(), *lat, *long, *elev))
                .collect();
            let bytes = match encode_input(&locations) {
                Ok(b) => b,
                Err(e) => panic!("encode failed: {e}"),
            };

            let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(&bytes[..]);
            let header = match reader.headers() {
                Ok(h) => h.clone(),
                Err(e) => panic!("header: {e}"),
            };
            proptest::prop_assert_eq!(header.iter().collect::<Vec<_>>(), INPUT_HEADER.to_vec());

            let records: Vec<csv::StringRecord> = reader.records().filter_map(Result::ok).collect();
            proptest::prop_assert_eq!(records.len(), locations.len());
            for (record, location) in records.iter().zip(&locations) {
                let expected = location.to_row();
                proptest::prop_assert_eq!(record.iter().collect::<Vec<_>>(), expected.iter().map(String::as_str).collect::<Vec<_>>());
                let lat: f64 = record[2].parse().unwrap_or(f64::NAN);
                proptest::prop_assert_eq!(lat, location.latitude);
            }
        }
    }
}
