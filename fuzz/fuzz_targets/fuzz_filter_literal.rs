#![no_main]

use libfuzzer_sys::fuzz_target;
use odata_adapter::FilterBuilder;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 {
        return;
    }
    if let Ok(s) = std::str::from_utf8(data) {
        let filter = FilterBuilder::new()
            .not()
            .field("Name")
            .equals(s)
            .and_then(|b| b.and().func("length", [s]))
            .and_then(|b| b.greater_than(0));
        let built = filter.expect("string values always encode").build();
        assert!(built.starts_with("not (Name eq '"));
    }
});
