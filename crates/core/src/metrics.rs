//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 구성 요소는 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `wafaudit_`
//! - 구성 요소: `audit_log_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use wafaudit_core::metrics as m;
//!
//! metrics::counter!(m::AUDIT_LOG_ROTATIONS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 응답 상태 코드 레이블 키
pub const LABEL_STATUS_CODE: &str = "status_code";

/// HTTP 메서드 레이블 키
pub const LABEL_METHOD: &str = "method";

/// 요청 호스트 레이블 키
pub const LABEL_HOST: &str = "host";

/// 요청 경로 레이블 키
pub const LABEL_PATH: &str = "path";

/// 룰 식별자 레이블 키 (`<rule file>-<rule id>`)
pub const LABEL_RULE_ID: &str = "rule_id";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 값을 알 수 없을 때 사용하는 레이블 값
pub const UNKNOWN_LABEL_VALUE: &str = "unknown";

// ─── Audit Log 메트릭 ──────────────────────────────────────────────

/// Audit Log: 처리된 트랜잭션 수 (counter, labels: status_code, method, host, path)
pub const AUDIT_LOG_TRANSACTIONS_TOTAL: &str = "wafaudit_audit_log_transactions_total";

/// Audit Log: 룰 위반 수 (counter, labels: rule_id, method, host, path)
pub const AUDIT_LOG_RULE_VIOLATIONS_TOTAL: &str = "wafaudit_audit_log_rule_violations_total";

/// Audit Log: 로테이션 횟수 (counter, label: result)
pub const AUDIT_LOG_ROTATIONS_TOTAL: &str = "wafaudit_audit_log_rotations_total";

/// Audit Log: 핸들러로 전달된 레코드 수 (counter)
pub const AUDIT_LOG_RECORDS_PROCESSED_TOTAL: &str = "wafaudit_audit_log_records_processed_total";

/// Audit Log: 파싱/처리 실패 라인 수 (counter)
pub const AUDIT_LOG_LINES_FAILED_TOTAL: &str = "wafaudit_audit_log_lines_failed_total";

/// Audit Log: 만료로 삭제된 백업 파일 수 (counter)
pub const AUDIT_LOG_BACKUPS_EXPIRED_TOTAL: &str = "wafaudit_audit_log_backups_expired_total";

/// Audit Log: 백업 파일 하나를 처리하는 데 걸린 시간 (histogram, 초)
pub const AUDIT_LOG_PROCESSING_DURATION_SECONDS: &str =
    "wafaudit_audit_log_processing_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "wafaudit_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "wafaudit_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 백업 파일 처리 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 60s 범위 (파일 크기에 비례)
pub const PROCESSING_DURATION_BUCKETS: [f64; 10] =
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `wafaudit-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        AUDIT_LOG_TRANSACTIONS_TOTAL,
        "The total number of audit log transactions with rule violations processed"
    );
    describe_counter!(
        AUDIT_LOG_RULE_VIOLATIONS_TOTAL,
        "The total number of audit log rule violations"
    );
    describe_counter!(
        AUDIT_LOG_ROTATIONS_TOTAL,
        "Total number of live audit log rotations"
    );
    describe_counter!(
        AUDIT_LOG_RECORDS_PROCESSED_TOTAL,
        "Total number of audit records dispatched to the record handler"
    );
    describe_counter!(
        AUDIT_LOG_LINES_FAILED_TOTAL,
        "Total number of audit log lines that failed to parse or handle"
    );
    describe_counter!(
        AUDIT_LOG_BACKUPS_EXPIRED_TOTAL,
        "Total number of backup audit log files deleted by retention"
    );
    describe_histogram!(
        AUDIT_LOG_PROCESSING_DURATION_SECONDS,
        "Time to parse and handle a single backup audit log file in seconds"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "wafaudit daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
