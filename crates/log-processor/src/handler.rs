//! 레코드 핸들러
//!
//! 파싱된 [`AuditRecord`]마다 호출되는 콜백입니다. 핸들러는 프로세서 생성
//! 시점에 주입되며 이후 변경할 수 없습니다. 처리 작업과 동시에 교체되는
//! 경쟁 상태를 피하기 위해서입니다.
//!
//! 기본 구현인 [`MetricsRecordHandler`]는 룰 위반이 있는 레코드에 대해
//! 경고 로그를 남기고 트랜잭션/룰 위반 카운터를 증가시킵니다.

use tracing::{debug, warn};

use wafaudit_core::metrics as m;

use crate::error::LogProcessorError;
use crate::record::AuditRecord;

/// 레코드 핸들러 trait
///
/// 에러를 반환하면 해당 라인은 실패로 집계되지만, 파일의 나머지 라인은
/// 계속 처리됩니다.
pub trait RecordHandler: Send + Sync {
    /// 레코드 하나를 처리합니다.
    fn handle(&self, record: &AuditRecord) -> Result<(), LogProcessorError>;
}

impl<F> RecordHandler for F
where
    F: Fn(&AuditRecord) -> Result<(), LogProcessorError> + Send + Sync,
{
    fn handle(&self, record: &AuditRecord) -> Result<(), LogProcessorError> {
        self(record)
    }
}

/// 메트릭 레이블 값 묶음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLabels {
    /// HTTP 메서드
    pub method: String,
    /// 요청 호스트
    pub host: String,
    /// 요청 경로
    pub path: String,
}

impl RequestLabels {
    /// 레코드에서 요청 레이블을 추출합니다.
    ///
    /// 요청 정보가 없으면 모두 `unknown`, URI를 해석할 수 없으면
    /// 호스트와 경로만 `unknown`입니다.
    pub fn from_record(record: &AuditRecord) -> Self {
        let unknown = || m::UNKNOWN_LABEL_VALUE.to_owned();
        match &record.transaction.request {
            Some(request) => {
                let (host, path) = request
                    .host_and_path()
                    .unwrap_or_else(|| (unknown(), unknown()));
                Self {
                    method: request.method.clone(),
                    host,
                    path,
                }
            }
            None => Self {
                method: unknown(),
                host: unknown(),
                path: unknown(),
            },
        }
    }
}

/// 응답 상태 코드 레이블 값 (응답 정보가 없으면 `unknown`)
pub fn status_code_label(record: &AuditRecord) -> String {
    record
        .transaction
        .response
        .as_ref()
        .map(|r| r.status.to_string())
        .unwrap_or_else(|| m::UNKNOWN_LABEL_VALUE.to_owned())
}

/// 기본 레코드 핸들러: 룰 위반 로그 + Prometheus 카운터
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecordHandler;

impl MetricsRecordHandler {
    /// 새 핸들러를 생성합니다.
    pub fn new() -> Self {
        Self
    }
}

impl RecordHandler for MetricsRecordHandler {
    fn handle(&self, record: &AuditRecord) -> Result<(), LogProcessorError> {
        let transaction = &record.transaction;
        debug!(
            id = %transaction.id,
            messages = record.messages.len(),
            "processing audit record"
        );

        if !record.has_violations() {
            return Ok(());
        }

        let labels = RequestLabels::from_record(record);
        let rules = record
            .messages
            .iter()
            .map(|msg| format!("rule_id={} message={:?}", msg.data.rule_id(), msg.data.msg))
            .collect::<Vec<_>>()
            .join(", ");

        match &transaction.request {
            Some(request) => warn!(
                id = %transaction.id,
                client_ip = %transaction.client_ip,
                method = %request.method,
                uri = %request.uri,
                protocol = %request.protocol,
                rules = %rules,
                "rule violations"
            ),
            None => warn!(
                id = %transaction.id,
                client_ip = %transaction.client_ip,
                rules = %rules,
                "rule violations"
            ),
        }

        metrics::counter!(
            m::AUDIT_LOG_TRANSACTIONS_TOTAL,
            m::LABEL_STATUS_CODE => status_code_label(record),
            m::LABEL_METHOD => labels.method.clone(),
            m::LABEL_HOST => labels.host.clone(),
            m::LABEL_PATH => labels.path.clone()
        )
        .increment(1);

        for msg in &record.messages {
            metrics::counter!(
                m::AUDIT_LOG_RULE_VIOLATIONS_TOTAL,
                m::LABEL_RULE_ID => msg.data.rule_id(),
                m::LABEL_METHOD => labels.method.clone(),
                m::LABEL_HOST => labels.host.clone(),
                m::LABEL_PATH => labels.path.clone()
            )
            .increment(1);
        }

        Ok(())
    }
}
