//! 프로세서 오케스트레이션 -- 로테이션/파싱/만료 작업과 종료를 관리합니다.
//!
//! [`LogProcessor`]는 설정, 공유 잠금, 레코드 핸들러, 두 개의 주기 작업을
//! 소유합니다. 두 작업은 서로 독립적인 tokio 태스크로 실행되며 하나의
//! [`CancellationToken`]으로 함께 정지됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! processing job:  tick -> live log non-empty? -> Rotator (lock held) -> parser -> RecordHandler
//! expiration job:  tick -> expire backups older than retention
//! ```
//!
//! # 상태 전이
//! ```text
//! Idle --start_*_job--> Running --stop--> Stopping --(jobs finished)--> Stopped
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wafaudit_core::metrics as m;

use crate::config::ProcessorConfig;
use crate::directives::{EngineConfig, audit_directives};
use crate::error::LogProcessorError;
use crate::expirer::{ExpireSummary, expire_backups};
use crate::handler::{MetricsRecordHandler, RecordHandler};
use crate::lock::AuditLogLock;
use crate::parser::{ProcessSummary, process_file};
use crate::rotator::Rotator;

/// 프로세서 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// 생성됨, 아직 작업을 시작하지 않음
    Idle,
    /// 하나 이상의 작업이 실행 중
    Running,
    /// 정지 신호를 보냈고 작업 종료를 기다리는 중 (또는 대기 시간 초과)
    Stopping,
    /// 모든 작업이 종료됨
    Stopped,
}

impl std::fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        })
    }
}

/// 주기 작업 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Processing,
    Expiration,
}

impl Job {
    fn name(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Expiration => "expiration",
        }
    }
}

/// 작업 태스크들이 공유하는 컨텍스트
struct JobContext {
    config: ProcessorConfig,
    rotator: Rotator,
    handler: Arc<dyn RecordHandler>,
}

impl JobContext {
    /// 처리 틱 본문: 데이터가 있으면 로테이션 후 백업을 파싱합니다.
    async fn process_once(&self) -> Result<Option<ProcessSummary>, LogProcessorError> {
        if !self.rotator.has_pending_data().await? {
            debug!(path = %self.config.path.display(), "audit log absent or empty, nothing to rotate");
            return Ok(None);
        }

        let backup = self.rotator.rotate().await?;
        let handler = Arc::clone(&self.handler);
        let max_line_bytes = self.config.max_line_bytes;
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            process_file(&backup, max_line_bytes, handler.as_ref())
        })
        .await
        .map_err(|e| LogProcessorError::Task(e.to_string()))?;

        metrics::histogram!(m::AUDIT_LOG_PROCESSING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        result.map(Some)
    }

    /// 만료 틱 본문
    async fn expire_once(&self) -> Result<ExpireSummary, LogProcessorError> {
        let live = self.config.path.clone();
        let retention = self.config.retention;
        tokio::task::spawn_blocking(move || expire_backups(&live, retention, SystemTime::now()))
            .await
            .map_err(|e| LogProcessorError::Task(e.to_string()))?
    }

    /// 틱 하나를 실행하고 결과를 로그로 남깁니다. 에러는 전파하지 않습니다.
    async fn tick(&self, job: Job) {
        match job {
            Job::Processing => match self.process_once().await {
                Ok(Some(summary)) => info!(
                    processed = summary.processed,
                    skipped_blank = summary.skipped_blank,
                    "audit log backup processed"
                ),
                Ok(None) => {}
                Err(e @ LogProcessorError::RecordsFailed { .. }) => {
                    warn!(error = %e, "audit log backup processed with errors");
                }
                Err(e) => error!(error = %e, "audit log processing tick failed"),
            },
            Job::Expiration => match self.expire_once().await {
                Ok(summary) => debug!(
                    scanned = summary.scanned,
                    deleted = summary.deleted,
                    failed = summary.failed,
                    "backup expiration sweep finished"
                ),
                Err(e) => error!(error = %e, "backup expiration tick failed"),
            },
        }
    }
}

/// 주기 작업 루프
///
/// 첫 번째 즉시 틱은 소비하므로 첫 실행은 한 주기 뒤입니다.
/// 진행 중인 틱은 취소로 중단되지 않습니다.
async fn run_job(ctx: Arc<JobContext>, job: Job, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;

    info!(job = job.name(), period = ?period, "job started");
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => ctx.tick(job).await,
        }
    }
    info!(job = job.name(), "job stopped");
}

/// 감사 로그 프로세서
///
/// # 사용 예시
/// ```ignore
/// use wafaudit_log_processor::{LogProcessorBuilder, DirectiveSet};
///
/// let mut processor = LogProcessorBuilder::new()
///     .config(config)
///     .build()?;
///
/// let engine_config = processor.apply_audit_directives(DirectiveSet::new());
/// processor.start_processing_job()?;
/// processor.start_expiration_job()?;
///
/// // ... 종료 신호 수신 후
/// processor.stop(Duration::from_secs(30)).await?;
/// ```
pub struct LogProcessor {
    /// 공유 작업 컨텍스트
    ctx: Arc<JobContext>,
    /// 엔진과 공유하는 잠금
    lock: AuditLogLock,
    /// 현재 상태
    state: ProcessorState,
    /// 작업 정지 신호 (한 번만 발생)
    cancel: CancellationToken,
    /// 처리 작업 태스크 핸들
    processing_task: Option<JoinHandle<()>>,
    /// 만료 작업 태스크 핸들
    expiration_task: Option<JoinHandle<()>>,
}

impl LogProcessor {
    /// 현재 상태를 반환합니다.
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// 설정을 반환합니다.
    pub fn config(&self) -> &ProcessorConfig {
        &self.ctx.config
    }

    /// 라이브 감사 로그 경로를 반환합니다.
    pub fn live_path(&self) -> &Path {
        &self.ctx.config.path
    }

    /// 요청 처리 경로와 공유할 잠금 핸들을 반환합니다.
    pub fn lock(&self) -> AuditLogLock {
        self.lock.clone()
    }

    /// 처리 작업이 실행 중인지 확인합니다.
    pub fn processing_job_running(&self) -> bool {
        self.processing_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// 만료 작업이 실행 중인지 확인합니다.
    pub fn expiration_job_running(&self) -> bool {
        self.expiration_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// 감사 로그 지시문 블록을 반환합니다.
    pub fn audit_directives(&self) -> String {
        audit_directives(&self.ctx.config.path)
    }

    /// 엔진 설정에 감사 로그 지시문을 덧붙여 반환합니다.
    pub fn apply_audit_directives<C: EngineConfig>(&self, config: C) -> C {
        config.with_directives(&self.audit_directives())
    }

    /// 처리 틱 본문을 즉시 한 번 실행합니다.
    ///
    /// 라이브 로그가 없거나 비어 있으면 `Ok(None)`입니다.
    pub async fn process_once(&self) -> Result<Option<ProcessSummary>, LogProcessorError> {
        self.ctx.process_once().await
    }

    /// 만료 틱 본문을 즉시 한 번 실행합니다.
    pub async fn expire_once(&self) -> Result<ExpireSummary, LogProcessorError> {
        self.ctx.expire_once().await
    }

    /// 처리 작업을 시작합니다.
    ///
    /// 처리 주기가 0이면 로그만 남기고 작업을 시작하지 않습니다.
    pub fn start_processing_job(&mut self) -> Result<(), LogProcessorError> {
        let period = self.ctx.config.processing_interval;
        if !self.ctx.config.processing_enabled() {
            self.ensure_startable()?;
            info!("processing interval is zero, processing job disabled");
            return Ok(());
        }
        self.spawn_job(Job::Processing, period)
    }

    /// 만료 작업을 시작합니다.
    ///
    /// 만료 주기나 보존 기간이 0이면 로그만 남기고 작업을 시작하지 않습니다.
    /// 이 경우 백업은 영구 보존됩니다.
    pub fn start_expiration_job(&mut self) -> Result<(), LogProcessorError> {
        let period = self.ctx.config.expiration_interval;
        if !self.ctx.config.expiration_enabled() {
            self.ensure_startable()?;
            info!("expiration interval or retention is zero, backups are kept forever");
            return Ok(());
        }
        self.spawn_job(Job::Expiration, period)
    }

    /// 모든 작업에 정지 신호를 보내고 `deadline`까지 종료를 기다립니다.
    ///
    /// 대기 시간이 지나면 [`LogProcessorError::Timeout`]을 반환하며,
    /// 작업은 백그라운드에서 현재 틱을 마저 끝냅니다.
    /// 시작한 적 없는 프로세서도 정지할 수 있습니다.
    pub async fn stop(&mut self, deadline: Duration) -> Result<(), LogProcessorError> {
        if matches!(self.state, ProcessorState::Stopping | ProcessorState::Stopped) {
            return Err(LogProcessorError::NotRunning);
        }

        info!(deadline = ?deadline, "stopping audit log processor");
        self.state = ProcessorState::Stopping;
        self.cancel.cancel();

        let tasks: Vec<_> = self
            .processing_task
            .take()
            .into_iter()
            .chain(self.expiration_task.take())
            .collect();

        let join_all = async {
            for task in tasks {
                if let Err(e) = task.await {
                    error!(error = %e, "job task terminated abnormally");
                }
            }
        };

        match tokio::time::timeout(deadline, join_all).await {
            Ok(()) => {
                self.state = ProcessorState::Stopped;
                info!("audit log processor stopped");
                Ok(())
            }
            Err(_) => {
                warn!(deadline = ?deadline, "audit log processor jobs did not finish before deadline");
                Err(LogProcessorError::Timeout { deadline })
            }
        }
    }

    fn ensure_startable(&self) -> Result<(), LogProcessorError> {
        match self.state {
            ProcessorState::Idle | ProcessorState::Running => Ok(()),
            ProcessorState::Stopping | ProcessorState::Stopped => Err(LogProcessorError::Stopped),
        }
    }

    fn spawn_job(&mut self, job: Job, period: Duration) -> Result<(), LogProcessorError> {
        self.ensure_startable()?;

        let slot = match job {
            Job::Processing => &mut self.processing_task,
            Job::Expiration => &mut self.expiration_task,
        };
        if slot.is_some() {
            return Err(LogProcessorError::AlreadyRunning(job.name()));
        }

        let ctx = Arc::clone(&self.ctx);
        let cancel = self.cancel.clone();
        *slot = Some(tokio::spawn(run_job(ctx, job, period, cancel)));

        self.state = ProcessorState::Running;
        Ok(())
    }
}

impl Drop for LogProcessor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// 감사 로그 프로세서 빌더
pub struct LogProcessorBuilder {
    config: ProcessorConfig,
    lock: Option<AuditLogLock>,
    handler: Option<Arc<dyn RecordHandler>>,
}

impl LogProcessorBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            lock: None,
            handler: None,
        }
    }

    /// 프로세서 설정을 지정합니다.
    pub fn config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// 외부에서 만든 잠금을 공유합니다.
    ///
    /// 설정하지 않으면 빌더가 새 잠금을 생성하며, [`LogProcessor::lock`]으로
    /// 꺼내 요청 처리 경로에 넘길 수 있습니다.
    pub fn lock(mut self, lock: AuditLogLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// 레코드 핸들러를 지정합니다. 기본값은 [`MetricsRecordHandler`]입니다.
    pub fn handler(mut self, handler: Arc<dyn RecordHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// 프로세서를 빌드합니다.
    pub fn build(self) -> Result<LogProcessor, LogProcessorError> {
        self.config.validate()?;

        let lock = self.lock.unwrap_or_default();
        let handler = self
            .handler
            .unwrap_or_else(|| Arc::new(MetricsRecordHandler::new()));
        let rotator = Rotator::new(self.config.path.clone(), lock.clone());

        Ok(LogProcessor {
            ctx: Arc::new(JobContext {
                config: self.config,
                rotator,
                handler,
            }),
            lock,
            state: ProcessorState::Idle,
            cancel: CancellationToken::new(),
            processing_task: None,
            expiration_task: None,
        })
    }
}

impl Default for LogProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::DirectiveSet;
    use std::path::PathBuf;

    fn config_for(dir: &Path) -> ProcessorConfig {
        ProcessorConfig {
            path: dir.join("audit.log"),
            ..Default::default()
        }
    }

    #[test]
    fn builder_rejects_missing_path() {
        let result = LogProcessorBuilder::new().build();
        assert!(matches!(result, Err(LogProcessorError::Config { .. })));
    }

    #[test]
    fn builder_uses_supplied_lock() {
        let lock = AuditLogLock::new();
        let processor = LogProcessorBuilder::new()
            .config(config_for(Path::new("/tmp")))
            .lock(lock.clone())
            .build()
            .unwrap();
        assert!(processor.lock().same_lock(&lock));
        assert_eq!(processor.state(), ProcessorState::Idle);
    }

    #[test]
    fn directives_are_applied_to_engine_config() {
        let processor = LogProcessorBuilder::new()
            .config(config_for(Path::new("/var/log")))
            .build()
            .unwrap();
        let set = processor.apply_audit_directives(DirectiveSet::new());
        assert_eq!(set.get("SecAuditLog"), Some("/var/log/audit.log"));
        assert_eq!(set.get("SecAuditEngine"), Some("On"));
        assert_eq!(processor.live_path(), PathBuf::from("/var/log/audit.log"));
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let mut processor = LogProcessorBuilder::new()
            .config(config_for(dir.path()))
            .build()
            .unwrap();

        processor.start_processing_job().unwrap();
        assert_eq!(processor.state(), ProcessorState::Running);
        assert!(processor.processing_job_running());
        assert!(matches!(
            processor.start_processing_job(),
            Err(LogProcessorError::AlreadyRunning("processing"))
        ));

        processor.start_expiration_job().unwrap();
        assert!(processor.expiration_job_running());

        processor.stop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(processor.state(), ProcessorState::Stopped);
        assert!(!processor.processing_job_running());

        assert!(matches!(
            processor.stop(Duration::from_secs(1)).await,
            Err(LogProcessorError::NotRunning)
        ));
        assert!(matches!(
            processor.start_processing_job(),
            Err(LogProcessorError::Stopped)
        ));
    }

    #[tokio::test]
    async fn zero_intervals_disable_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProcessorConfig {
            processing_interval: Duration::ZERO,
            retention: Duration::ZERO,
            ..config_for(dir.path())
        };
        let mut processor = LogProcessorBuilder::new().config(config).build().unwrap();

        processor.start_processing_job().unwrap();
        processor.start_expiration_job().unwrap();
        assert!(!processor.processing_job_running());
        assert!(!processor.expiration_job_running());
        assert_eq!(processor.state(), ProcessorState::Idle);

        processor.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(processor.state(), ProcessorState::Stopped);
    }

    #[tokio::test]
    async fn process_once_without_live_log_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let processor = LogProcessorBuilder::new()
            .config(config_for(dir.path()))
            .build()
            .unwrap();
        assert_eq!(processor.process_once().await.unwrap(), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn state_display() {
        assert_eq!(ProcessorState::Idle.to_string(), "idle");
        assert_eq!(ProcessorState::Stopping.to_string(), "stopping");
    }
}
