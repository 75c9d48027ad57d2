#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Hostile response bytes must never panic or leak a partial graph.
    let _ = pep_core::unmarshal_response(data);
});
