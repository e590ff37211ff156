//! 설정 관리 — wafaudit.toml 파싱 및 런타임 설정
//!
//! [`WafAuditConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`WAFAUDIT_AUDIT_LOG_PATH=/var/log/waf/audit.log` 형식)
//! 3. 설정 파일 (`wafaudit.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! 시간 값은 humantime 형식 문자열(`"10s"`, `"1h"`, `"24h"`)로 표기합니다.
//! `"0s"`는 해당 동작을 비활성화합니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), wafaudit_core::error::WafAuditError> {
//! use wafaudit_core::config::WafAuditConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = WafAuditConfig::load("wafaudit.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = WafAuditConfig::parse("[audit_log]\npath = \"/tmp/audit.log\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, WafAuditError};

/// wafaudit 통합 설정
///
/// `wafaudit.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 구성 요소는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WafAuditConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 감사 로그 처리 설정
    #[serde(default)]
    pub audit_log: AuditLogConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl WafAuditConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WafAuditError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 및 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WafAuditError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WafAuditError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WafAuditError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, WafAuditError> {
        toml::from_str(toml_str).map_err(|e| {
            WafAuditError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `WAFAUDIT_{SECTION}_{FIELD}`
    /// 예: `WAFAUDIT_AUDIT_LOG_RETENTION=48h`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "WAFAUDIT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "WAFAUDIT_GENERAL_LOG_FORMAT");
        override_duration(
            &mut self.general.shutdown_timeout,
            "WAFAUDIT_GENERAL_SHUTDOWN_TIMEOUT",
        );

        // Audit log
        override_string(&mut self.audit_log.path, "WAFAUDIT_AUDIT_LOG_PATH");
        override_duration(
            &mut self.audit_log.processing_interval,
            "WAFAUDIT_AUDIT_LOG_PROCESSING_INTERVAL",
        );
        override_duration(
            &mut self.audit_log.expiration_interval,
            "WAFAUDIT_AUDIT_LOG_EXPIRATION_INTERVAL",
        );
        override_duration(&mut self.audit_log.retention, "WAFAUDIT_AUDIT_LOG_RETENTION");
        override_usize(
            &mut self.audit_log.max_line_bytes,
            "WAFAUDIT_AUDIT_LOG_MAX_LINE_BYTES",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "WAFAUDIT_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "WAFAUDIT_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "WAFAUDIT_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WafAuditError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.general.shutdown_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "general.shutdown_timeout".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        // 감사 로그 경로는 기본값 없이 반드시 지정해야 함
        if self.audit_log.path.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "audit_log.path".to_owned(),
            }
            .into());
        }

        if self.audit_log.max_line_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audit_log.max_line_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "metrics.port".to_owned(),
                    reason: "must be greater than 0 when metrics are enabled".to_owned(),
                }
                .into());
            }
            if !self.metrics.endpoint.starts_with('/') {
                return Err(ConfigError::InvalidValue {
                    field: "metrics.endpoint".to_owned(),
                    reason: "must start with '/'".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 종료 시 백그라운드 작업 대기 최대 시간
    #[serde(with = "humantime_duration")]
    pub shutdown_timeout: Duration,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// 감사 로그 처리 설정
///
/// `path`는 필수이며 나머지는 기본값이 있습니다.
/// 시간 값이 0이면 해당 작업이 비활성화됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditLogConfig {
    /// 검사 엔진이 기록하는 라이브 감사 로그 경로
    pub path: String,
    /// 처리(로테이션 + 파싱) 작업 주기
    #[serde(with = "humantime_duration")]
    pub processing_interval: Duration,
    /// 만료 작업 주기
    #[serde(with = "humantime_duration")]
    pub expiration_interval: Duration,
    /// 백업 파일 보존 기간
    #[serde(with = "humantime_duration")]
    pub retention: Duration,
    /// 한 줄 최대 길이 (바이트)
    pub max_line_bytes: usize,
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            processing_interval: Duration::from_secs(10),
            expiration_interval: Duration::from_secs(60 * 60),
            retention: Duration::from_secs(24 * 60 * 60),
            max_line_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 메트릭 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1".to_owned(),
            port: 8081,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// humantime 문자열 <-> `Duration` 직렬화
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_duration(target: &mut Duration, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match humantime::parse_duration(val.trim()) {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse duration from env var, ignoring"
            ),
        }
    }
}
