//! Fuzz target: bearer token verification.
//!
//! No byte string that was not signed with the authority's key may verify,
//! and verification must never panic.

#![no_main]

use std::sync::Arc;

use climgate_auth::{MemoryRevocations, RootSecret, TokenAuthority};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };
    let authority = TokenAuthority::new(
        b"fuzz-signing-key",
        RootSecret::new("fuzz-root"),
        Arc::new(MemoryRevocations::new()),
    );
    assert!(authority.verify(token).is_err(), "forged token verified: {token:?}");
});
