#![no_main]

use http::HeaderMap;
use libfuzzer_sys::fuzz_target;
use odata_adapter::{Normalizer, ODataVersion, ResponseNormalizer};

fuzz_target!(|data: &[u8]| {
    // Limit input size to avoid OOM on pathological inputs
    if data.len() > 4096 {
        return;
    }
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(body) = std::str::from_utf8(rest) else {
        return;
    };

    let version = if selector & 1 == 0 {
        ODataVersion::V2
    } else {
        ODataVersion::V4
    };
    let normalizer = Normalizer::for_version(version);
    let headers = HeaderMap::new();

    // Errors are expected; panics are not. Failures must keep the raw body.
    match normalizer.parse_collection(body, &headers) {
        Ok(collection) => assert_eq!(collection.count(), collection.iter().count()),
        Err(e) => assert_eq!(e.raw_body(), Some(body)),
    }
    if let Err(e) = normalizer.parse_entity(body, &headers) {
        assert_eq!(e.raw_body(), Some(body));
    }
    let _ = normalizer.extract_next_link(body);
    let _ = normalizer.extract_inline_count(body);
});
