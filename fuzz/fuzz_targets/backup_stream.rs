#![no_main]

use std::io::Cursor;
use std::path::Path;

use libfuzzer_sys::fuzz_target;
use wafaudit_log_processor::parser::process_reader;
use wafaudit_log_processor::{AuditRecord, LogProcessorError};

// 작은 라인 제한으로 초과 라인 건너뛰기 경로까지 탐색
const MAX_LINE_BYTES: usize = 256;

fuzz_target!(|data: &[u8]| {
    let handler = |_record: &AuditRecord| Ok::<(), LogProcessorError>(());
    let _ = process_reader(
        Cursor::new(data),
        Path::new("fuzz/audit.log.0"),
        MAX_LINE_BYTES,
        &handler,
    );
});
