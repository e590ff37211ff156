//! 감사 로그 프로세서 에러 타입
//!
//! [`LogProcessorError`]는 로테이션, 파싱, 만료, 작업 생명주기에서 발생하는
//! 모든 에러를 표현합니다. `From<LogProcessorError> for WafAuditError` 변환이
//! 구현되어 있어 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! # 전파 정책
//! - `Io`, `Parse`, `RecordsFailed`, `Handler`: 틱 단위로 로그만 남기고 계속 진행
//! - `Config`: 시작 시점에 호출자에게 전파 (치명적)
//! - `Timeout`: 종료 확인 실패 신호 (데이터 손상 아님)

use std::path::PathBuf;
use std::time::Duration;

use wafaudit_core::error::{ConfigError, ProcessorError, WafAuditError};

/// 감사 로그 프로세서 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogProcessorError {
    /// 파일 열기/생성/복사/절단/stat/디렉토리 조회 실패
    #[error("io error: {context}: {source}")]
    Io {
        /// 실패한 작업 설명 (예: "failed to open audit log /var/log/audit.log")
        context: String,
        /// 원인 I/O 에러
        #[source]
        source: std::io::Error,
    },

    /// 단일 라인 역직렬화 실패
    #[error("parse error at line {line}: {reason}")]
    Parse {
        /// 1부터 시작하는 라인 번호
        line: usize,
        /// 실패 사유
        reason: String,
    },

    /// 파일 처리 중 하나 이상의 라인이 실패함 (성공한 라인은 이미 전달됨)
    #[error("errors occurred during log processing: {path}: {failed} failed, {processed} processed")]
    RecordsFailed {
        /// 처리한 백업 파일 경로
        path: PathBuf,
        /// 실패한 라인 수
        failed: usize,
        /// 핸들러에 성공적으로 전달된 레코드 수
        processed: usize,
    },

    /// 레코드 핸들러 실패
    #[error("handler error: {0}")]
    Handler(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 이미 실행 중인 작업을 다시 시작하려 함
    #[error("{0} job already running")]
    AlreadyRunning(&'static str),

    /// 실행 중이 아님 (이중 정지)
    #[error("processor not running")]
    NotRunning,

    /// 이미 정지된 프로세서에서 작업을 시작하려 함
    #[error("processor already stopped; build a new processor to restart")]
    Stopped,

    /// 종료 대기 시간 초과
    #[error("shutdown timed out after {deadline:?}")]
    Timeout {
        /// 호출자가 지정한 대기 시간
        deadline: Duration,
    },

    /// 블로킹 태스크 join 실패
    #[error("task error: {0}")]
    Task(String),
}

impl LogProcessorError {
    /// 문맥 정보를 붙여 I/O 에러를 감쌉니다.
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<LogProcessorError> for WafAuditError {
    fn from(err: LogProcessorError) -> Self {
        match err {
            LogProcessorError::Config { field, reason } => {
                WafAuditError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogProcessorError::Timeout { deadline } => {
                WafAuditError::Processor(ProcessorError::ShutdownTimeout { deadline })
            }
            LogProcessorError::AlreadyRunning(job) => {
                WafAuditError::Processor(ProcessorError::AlreadyRunning(job.to_owned()))
            }
            LogProcessorError::NotRunning => WafAuditError::Processor(ProcessorError::NotRunning),
            LogProcessorError::Io { source, .. } => WafAuditError::Io(source),
            other => WafAuditError::Processor(ProcessorError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display_includes_context() {
        let err = LogProcessorError::io(
            "failed to truncate audit log /tmp/audit.log",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("truncate"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn records_failed_display() {
        let err = LogProcessorError::RecordsFailed {
            path: PathBuf::from("/tmp/audit.log.1700000000"),
            failed: 2,
            processed: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("errors occurred"));
        assert!(msg.contains("2 failed"));
        assert!(msg.contains("5 processed"));
    }

    #[test]
    fn timeout_converts_to_shutdown_timeout() {
        let err: WafAuditError = LogProcessorError::Timeout {
            deadline: Duration::from_millis(10),
        }
        .into();
        assert!(matches!(
            err,
            WafAuditError::Processor(ProcessorError::ShutdownTimeout { .. })
        ));
    }

    #[test]
    fn config_converts_to_config_error() {
        let err: WafAuditError = LogProcessorError::Config {
            field: "audit_log_path".to_owned(),
            reason: "must not be empty".to_owned(),
        }
        .into();
        assert!(matches!(err, WafAuditError::Config(_)));
    }
}
