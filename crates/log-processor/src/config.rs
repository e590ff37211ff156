//! 프로세서 설정
//!
//! [`ProcessorConfig`]는 core의 [`AuditLogConfig`](wafaudit_core::config::AuditLogConfig)를
//! 프로세서 내부에서 쓰기 좋은 형태(경로는 `PathBuf`)로 옮긴 것입니다.
//!
//! # 사용 예시
//! ```ignore
//! use wafaudit_core::config::WafAuditConfig;
//! use wafaudit_log_processor::config::ProcessorConfig;
//!
//! let core_config = WafAuditConfig::load("/etc/wafaudit/wafaudit.toml").await?;
//! let config = ProcessorConfig::from_core(&core_config.audit_log);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LogProcessorError;

/// 기본 처리 주기
pub const DEFAULT_PROCESSING_INTERVAL: Duration = Duration::from_secs(10);
/// 기본 만료 검사 주기
pub const DEFAULT_EXPIRATION_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// 기본 백업 보존 기간
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
/// 기본 최대 라인 길이 (1 MiB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// 감사 로그 프로세서 설정
///
/// 기간 값이 0이면 해당 동작이 비활성화됩니다.
/// - `processing_interval` = 0: 처리 작업을 시작하지 않음
/// - `expiration_interval` 또는 `retention` = 0: 만료 작업을 시작하지 않음
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// 라이브 감사 로그 경로
    pub path: PathBuf,
    /// 로테이션+처리 주기
    pub processing_interval: Duration,
    /// 만료 검사 주기
    pub expiration_interval: Duration,
    /// 백업 보존 기간
    pub retention: Duration,
    /// 한 라인의 최대 바이트 수 (초과 라인은 실패로 집계)
    pub max_line_bytes: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            processing_interval: DEFAULT_PROCESSING_INTERVAL,
            expiration_interval: DEFAULT_EXPIRATION_INTERVAL,
            retention: DEFAULT_RETENTION,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl ProcessorConfig {
    /// core의 `AuditLogConfig`에서 프로세서 설정을 생성합니다.
    pub fn from_core(core: &wafaudit_core::config::AuditLogConfig) -> Self {
        Self {
            path: PathBuf::from(&core.path),
            processing_interval: core.processing_interval,
            expiration_interval: core.expiration_interval,
            retention: core.retention,
            max_line_bytes: core.max_line_bytes,
        }
    }

    /// 만료 작업이 활성화되어 있는지 확인합니다.
    pub fn expiration_enabled(&self) -> bool {
        !self.expiration_interval.is_zero() && !self.retention.is_zero()
    }

    /// 처리 작업이 활성화되어 있는지 확인합니다.
    pub fn processing_enabled(&self) -> bool {
        !self.processing_interval.is_zero()
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogProcessorError> {
        if self.path.as_os_str().is_empty() {
            return Err(LogProcessorError::Config {
                field: "path".to_owned(),
                reason: "audit log path must not be empty".to_owned(),
            });
        }

        if self.path.file_name().is_none() {
            return Err(LogProcessorError::Config {
                field: "path".to_owned(),
                reason: format!("'{}' does not name a file", self.path.display()),
            });
        }

        if self.max_line_bytes == 0 {
            return Err(LogProcessorError::Config {
                field: "max_line_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 프로세서 설정 빌더
#[derive(Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 라이브 감사 로그 경로를 설정합니다.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// 처리 주기를 설정합니다.
    pub fn processing_interval(mut self, interval: Duration) -> Self {
        self.config.processing_interval = interval;
        self
    }

    /// 만료 검사 주기를 설정합니다.
    pub fn expiration_interval(mut self, interval: Duration) -> Self {
        self.config.expiration_interval = interval;
        self
    }

    /// 보존 기간을 설정합니다.
    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_bytes(mut self, bytes: usize) -> Self {
        self.config.max_line_bytes = bytes;
        self
    }

    /// 설정을 검증하고 `ProcessorConfig`를 생성합니다.
    pub fn build(self) -> Result<ProcessorConfig, LogProcessorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
