//! 에러 타입 — 도메인별 에러 정의

use std::time::Duration;

/// wafaudit 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum WafAuditError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 감사 로그 프로세서 에러
    #[error("processor error: {0}")]
    Processor(#[from] ProcessorError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 필수 설정 누락
    #[error("missing required config field '{field}'")]
    MissingField { field: String },
}

/// 감사 로그 프로세서 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// 이미 실행 중인 작업을 다시 시작하려 함
    #[error("job already running: {0}")]
    AlreadyRunning(String),

    /// 실행 중이 아닌 프로세서를 정지하려 함
    #[error("processor not running")]
    NotRunning,

    /// 종료 대기 시간 초과 (작업은 백그라운드에서 계속 진행될 수 있음)
    #[error("shutdown not confirmed within {deadline:?}")]
    ShutdownTimeout { deadline: Duration },

    /// 초기화 실패
    #[error("processor init failed: {0}")]
    InitFailed(String),
}
