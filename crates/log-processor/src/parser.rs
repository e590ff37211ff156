//! 백업 파일 파서
//!
//! 백업 파일을 한 줄씩 읽어 [`AuditRecord`]로 역직렬화하고 핸들러에 전달합니다.
//!
//! # 라인 처리 규칙
//! - 공백만 있는 라인은 조용히 건너뜀
//! - `max_line_bytes`를 넘는 라인, UTF-8이 아닌 라인, 잘못된 JSON: 실패로 집계
//! - 핸들러 에러: 실패로 집계
//! - 실패가 있어도 다음 라인부터 계속 처리하고, 끝에 한 번에 보고
//! - 읽기 도중 I/O 에러는 즉시 중단 (치명적)

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use tracing::warn;

use wafaudit_core::metrics as m;

use crate::error::LogProcessorError;
use crate::handler::RecordHandler;
use crate::record::AuditRecord;

/// 파일 하나를 처리한 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    /// 핸들러에 성공적으로 전달된 레코드 수
    pub processed: usize,
    /// 건너뛴 빈 라인 수
    pub skipped_blank: usize,
}

/// 라인 하나를 레코드로 역직렬화합니다.
///
/// `line_no`는 에러 메시지에만 사용됩니다.
pub fn parse_record(line: &[u8], line_no: usize) -> Result<AuditRecord, LogProcessorError> {
    serde_json::from_slice(line).map_err(|e| LogProcessorError::Parse {
        line: line_no,
        reason: e.to_string(),
    })
}

/// 백업 파일을 열어 모든 레코드를 핸들러에 전달합니다.
pub fn process_file(
    path: &Path,
    max_line_bytes: usize,
    handler: &dyn RecordHandler,
) -> Result<ProcessSummary, LogProcessorError> {
    let file = File::open(path).map_err(|e| {
        LogProcessorError::io(format!("failed to open backup {}", path.display()), e)
    })?;
    process_reader(BufReader::new(file), path, max_line_bytes, handler)
}

/// 임의의 리더에서 레코드를 읽어 핸들러에 전달합니다.
///
/// `source`는 로그와 에러 메시지에 쓰이는 출처 경로입니다.
pub fn process_reader<R: BufRead>(
    mut reader: R,
    source: &Path,
    max_line_bytes: usize,
    handler: &dyn RecordHandler,
) -> Result<ProcessSummary, LogProcessorError> {
    let mut summary = ProcessSummary::default();
    let mut failed = 0usize;
    let mut line_no = 0usize;
    let mut buf = Vec::new();

    let read_err = |e| LogProcessorError::io(format!("failed to read {}", source.display()), e);
    let limit = u64::try_from(max_line_bytes).unwrap_or(u64::MAX).saturating_add(1);

    loop {
        buf.clear();
        let n = (&mut reader)
            .take(limit)
            .read_until(b'\n', &mut buf)
            .map_err(read_err)?;
        if n == 0 {
            break;
        }
        line_no += 1;

        let terminated = buf.last() == Some(&b'\n');
        if !terminated && n > max_line_bytes {
            skip_line(&mut reader).map_err(read_err)?;
            failed += 1;
            metrics::counter!(m::AUDIT_LOG_LINES_FAILED_TOTAL).increment(1);
            warn!(
                path = %source.display(),
                line = line_no,
                max_line_bytes,
                "audit log line exceeds maximum length, skipping"
            );
            continue;
        }

        let line = trim_ascii_whitespace(&buf);
        if line.is_empty() {
            summary.skipped_blank += 1;
            continue;
        }

        let result = parse_record(line, line_no).and_then(|record| handler.handle(&record));
        match result {
            Ok(()) => {
                summary.processed += 1;
                metrics::counter!(m::AUDIT_LOG_RECORDS_PROCESSED_TOTAL).increment(1);
            }
            Err(e) => {
                failed += 1;
                metrics::counter!(m::AUDIT_LOG_LINES_FAILED_TOTAL).increment(1);
                warn!(
                    path = %source.display(),
                    line = line_no,
                    error = %e,
                    "failed to process audit log line, skipping"
                );
            }
        }
    }

    if failed > 0 {
        return Err(LogProcessorError::RecordsFailed {
            path: source.to_path_buf(),
            failed,
            processed: summary.processed,
        });
    }

    Ok(summary)
}

/// 다음 개행 문자까지(포함) 버립니다.
fn skip_line<R: BufRead>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// 받은 트랜잭션 ID를 기록하는 테스트 핸들러
    #[derive(Default)]
    struct Collecting {
        ids: Mutex<Vec<String>>,
    }

    impl RecordHandler for Collecting {
        fn handle(&self, record: &AuditRecord) -> Result<(), LogProcessorError> {
            self.ids
                .lock()
                .unwrap()
                .push(record.transaction.id.clone());
            Ok(())
        }
    }

    fn run(input: &[u8], max: usize, handler: &dyn RecordHandler) -> Result<ProcessSummary, LogProcessorError> {
        process_reader(Cursor::new(input.to_vec()), &PathBuf::from("test.log"), max, handler)
    }

    #[test]
    fn parses_every_line_in_order() {
        let input = b"{\"transaction\":{\"id\":\"a\"}}\n{\"transaction\":{\"id\":\"b\"}}\n";
        let handler = Collecting::default();
        let summary = run(input, 1024, &handler).unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(*handler.ids.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn last_line_without_newline_is_processed() {
        let handler = Collecting::default();
        let summary = run(b"{\"transaction\":{\"id\":\"tail\"}}", 1024, &handler).unwrap();
        assert_eq!(summary.processed, 1);
    }

    #[test]
    fn blank_lines_are_skipped_silently() {
        let input = b"\n  \r\n{\"transaction\":{\"id\":\"a\"}}\r\n\n";
        let handler = Collecting::default();
        let summary = run(input, 1024, &handler).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped_blank, 3);
    }

    #[test]
    fn invalid_line_does_not_stop_processing() {
        let input = b"{\"transaction\":{\"id\":\"a\"}}\nnot json\n{\"transaction\":{\"id\":\"b\"}}\n";
        let handler = Collecting::default();
        let err = run(input, 1024, &handler).unwrap_err();
        assert!(matches!(
            err,
            LogProcessorError::RecordsFailed { failed: 1, processed: 2, .. }
        ));
        assert_eq!(*handler.ids.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn non_utf8_line_is_a_failure() {
        let mut input = b"{\"transaction\":{\"id\":\"\xff\xfe\"}}\n".to_vec();
        input.extend_from_slice(b"{\"transaction\":{\"id\":\"ok\"}}\n");
        let handler = Collecting::default();
        let err = run(&input, 1024, &handler).unwrap_err();
        assert!(matches!(err, LogProcessorError::RecordsFailed { failed: 1, processed: 1, .. }));
    }

    #[test]
    fn oversized_line_is_skipped_and_counted() {
        let long = format!("{{\"transaction\":{{\"id\":\"{}\"}}}}\n", "x".repeat(200));
        let mut input = long.into_bytes();
        input.extend_from_slice(b"{\"transaction\":{\"id\":\"short\"}}\n");

        let handler = Collecting::default();
        let err = run(&input, 64, &handler).unwrap_err();
        assert!(matches!(err, LogProcessorError::RecordsFailed { failed: 1, processed: 1, .. }));
        assert_eq!(*handler.ids.lock().unwrap(), vec!["short"]);
    }

    #[test]
    fn line_exactly_at_limit_is_accepted() {
        let line = b"{\"transaction\":{\"id\":\"edge\"}}";
        let mut input = line.to_vec();
        input.push(b'\n');
        let handler = Collecting::default();
        let summary = run(&input, line.len(), &handler).unwrap();
        assert_eq!(summary.processed, 1);
    }

    #[test]
    fn handler_errors_are_failures() {
        let handler = |record: &AuditRecord| {
            if record.transaction.id == "bad" {
                Err(LogProcessorError::Handler("rejected".to_owned()))
            } else {
                Ok(())
            }
        };
        let input = b"{\"transaction\":{\"id\":\"bad\"}}\n{\"transaction\":{\"id\":\"good\"}}\n";
        let err = run(input, 1024, &handler).unwrap_err();
        assert!(matches!(err, LogProcessorError::RecordsFailed { failed: 1, processed: 1, .. }));
    }

    #[test]
    fn empty_input_processes_nothing() {
        let handler = Collecting::default();
        assert_eq!(run(b"", 1024, &handler).unwrap(), ProcessSummary::default());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let handler = Collecting::default();
        let err = process_file(&dir.path().join("absent.log.1"), 1024, &handler).unwrap_err();
        assert!(matches!(err, LogProcessorError::Io { .. }));
    }

    #[test]
    fn parse_record_reports_line_number() {
        let err = parse_record(b"{", 7).unwrap_err();
        assert!(matches!(err, LogProcessorError::Parse { line: 7, .. }));
    }
}
