#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`record`]: 감사 로그 레코드 모델 (트랜잭션, 룰 매칭 메시지)
//! - [`parser`]: 백업 파일 스트리밍 파서 (라인 단위 장애 격리)
//! - [`backup`]: `<base>.<unix-seconds>` 백업 이름 규칙
//! - [`lock`]: 엔진과 로테이터가 공유하는 쓰기 잠금
//! - [`rotator`]: 잠금 하에서 복사 후 절단하는 로테이션
//! - [`expirer`]: 보존 기간이 지난 백업 삭제
//! - [`handler`]: 레코드 핸들러 trait 및 메트릭 기본 구현
//! - [`directives`]: 엔진 감사 로그 출력 지시문
//! - [`processor`]: 주기 작업 오케스트레이션 및 종료 조정
//! - [`config`]: 프로세서 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입

pub mod backup;
pub mod config;
pub mod directives;
pub mod error;
pub mod expirer;
pub mod handler;
pub mod lock;
pub mod parser;
pub mod processor;
pub mod record;
pub mod rotator;

// --- 주요 타입 re-export ---

// 프로세서
pub use processor::{LogProcessor, LogProcessorBuilder, ProcessorState};

// 설정
pub use config::{ProcessorConfig, ProcessorConfigBuilder};

// 에러
pub use error::LogProcessorError;

// 레코드
pub use record::{
    AuditRecord, Message, MessageData, RuleSeverity, Transaction, TransactionRequest,
    TransactionResponse,
};

// 파서 / 만료
pub use expirer::ExpireSummary;
pub use parser::ProcessSummary;

// 잠금 / 로테이션
pub use lock::{AuditLogGuard, AuditLogLock};
pub use rotator::Rotator;

// 핸들러
pub use handler::{MetricsRecordHandler, RecordHandler};

// 지시문
pub use directives::{DirectiveSet, EngineConfig};
