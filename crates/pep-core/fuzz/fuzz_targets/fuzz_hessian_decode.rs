#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must either decode or error, never panic. A decoded
    // tree must re-encode, and the re-encoding must be a fixed point
    // (byte comparison, so NaN payloads don't trip structural equality).
    if let Ok(value) = pep_core::hessian::deserialize(data) {
        let bytes = pep_core::hessian::serialize(&value).expect("re-encoding a decoded tree");
        let again = pep_core::hessian::deserialize(&bytes).expect("decoding our own bytes");
        let bytes_again = pep_core::hessian::serialize(&again).expect("re-encoding again");
        assert_eq!(bytes, bytes_again);
    }
});
