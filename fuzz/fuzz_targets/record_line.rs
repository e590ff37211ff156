#![no_main]

use libfuzzer_sys::fuzz_target;
use wafaudit_log_processor::parser::parse_record;

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = parse_record(data, 1) {
        let _ = record.rule_ids();
        if let Some(request) = &record.transaction.request {
            let _ = request.host_and_path();
        }
    }
});
