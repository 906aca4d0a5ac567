//! Fuzz target: `POST /{variant}/query` body parsing and validation.
//!
//! Arbitrary bytes go through JSON decoding and `QueryBody::into_job`.
//! Rejections are expected; panics are not.

#![no_main]

use climgate_gateway::routes::QueryBody;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = serde_json::from_slice::<QueryBody>(data) else {
        return;
    };
    if let Ok(job) = body.into_job() {
        assert!(!job.locations.is_empty(), "an accepted job must have locations");
        for location in &job.locations {
            assert!(location.validate().is_ok(), "accepted locations must validate");
        }
        let name = job.reference_dataset.as_str();
        assert!(!name.contains(['/', '\\']), "dataset name must not be a path: {name}");
    }
});
