#![no_main]

//! Fuzz target for inbound signature verification.
//!
//! Header values are attacker controlled. Verification must reject garbage
//! without panicking and accept exactly what `sign` produces.

use leadrelay_api::crypto::{sign, verify_signature};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let split = data.first().map_or(0, |b| usize::from(*b)).min(data.len());
    let (head, body) = data.split_at(split);
    let Ok(candidate) = std::str::from_utf8(head) else {
        return;
    };

    for secret in ["whsec_fuzz", "s"] {
        let _ = verify_signature(body, candidate, secret);

        let signature = sign(body, secret);
        assert!(verify_signature(body, &signature, secret).is_ok());
        assert!(verify_signature(body, signature.trim_start_matches("sha256="), secret).is_ok());
    }

    assert!(verify_signature(body, candidate, "").is_err());
});
