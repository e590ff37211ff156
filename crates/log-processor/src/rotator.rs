//! 라이브 감사 로그 로테이션
//!
//! 잠금을 잡은 상태에서 라이브 로그 전체를 새 백업 파일로 복사하고
//! 라이브 로그를 0바이트로 절단합니다. 여러 로테이션이 동시에 요청되면
//! 잠금에 의해 직렬화되고, 뒤따르는 호출은 빈 파일을 보고 빈 백업을 만듭니다.
//! 파일이 비어 있을 때 로테이션을 건너뛰는 판단은 호출자(처리 작업)의 몫입니다.
//!
//! 같은 초에 여러 번 로테이션해도 백업을 덮어쓰지 않습니다. 접미어는
//! `max(현재 초, 직전 접미어 + 1)`에서 시작하며, 이미 존재하는 이름이면
//! 빈 이름을 찾을 때까지 1씩 증가합니다.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use wafaudit_core::metrics as m;

use crate::backup::{backup_path, unix_seconds};
use crate::error::LogProcessorError;
use crate::lock::AuditLogLock;

/// 백업 이름 충돌 시 시도할 최대 접미어 개수
const MAX_SUFFIX_ATTEMPTS: u64 = 1024;

/// 라이브 감사 로그 로테이터
#[derive(Debug, Clone)]
pub struct Rotator {
    live: PathBuf,
    lock: AuditLogLock,
    last_suffix: Arc<AtomicU64>,
}

impl Rotator {
    /// 새 로테이터를 생성합니다.
    pub fn new(live: impl Into<PathBuf>, lock: AuditLogLock) -> Self {
        Self {
            live: live.into(),
            lock,
            last_suffix: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 라이브 로그 경로를 반환합니다.
    pub fn live_path(&self) -> &Path {
        &self.live
    }

    /// 라이브 로그에 로테이션할 데이터가 있는지 확인합니다.
    ///
    /// 파일이 없거나 크기가 0이면 `false`입니다.
    pub async fn has_pending_data(&self) -> Result<bool, LogProcessorError> {
        match tokio::fs::metadata(&self.live).await {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LogProcessorError::io(
                format!("failed to stat audit log {}", self.live.display()),
                e,
            )),
        }
    }

    /// 로테이션을 한 번 수행하고 생성된 백업 경로를 반환합니다.
    ///
    /// 잠금은 복사와 절단이 끝날 때까지 블로킹 스레드에서 유지됩니다.
    pub async fn rotate(&self) -> Result<PathBuf, LogProcessorError> {
        let guard = self.lock.lock().await;
        let live = self.live.clone();
        let last_suffix = Arc::clone(&self.last_suffix);

        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            rotate_blocking(&live, &last_suffix)
        })
        .await
        .map_err(|e| LogProcessorError::Task(e.to_string()))?;

        match &result {
            Ok((backup, bytes)) => {
                metrics::counter!(m::AUDIT_LOG_ROTATIONS_TOTAL, m::LABEL_RESULT => "success")
                    .increment(1);
                info!(backup = %backup.display(), bytes, "audit log rotated");
            }
            Err(e) => {
                metrics::counter!(m::AUDIT_LOG_ROTATIONS_TOTAL, m::LABEL_RESULT => "failure")
                    .increment(1);
                warn!(path = %self.live.display(), error = %e, "audit log rotation failed");
            }
        }

        result.map(|(backup, _)| backup)
    }
}

fn rotate_blocking(live: &Path, last_suffix: &AtomicU64) -> Result<(PathBuf, u64), LogProcessorError> {
    let mut source = OpenOptions::new()
        .read(true)
        .write(true)
        .open(live)
        .map_err(|e| {
            LogProcessorError::io(format!("failed to open audit log {}", live.display()), e)
        })?;

    let (backup, mut target) = create_backup(live, last_suffix)?;

    let copied = io::copy(&mut source, &mut target).and_then(|bytes| {
        target.sync_all()?;
        Ok(bytes)
    });
    let bytes = match copied {
        Ok(bytes) => bytes,
        Err(e) => {
            // 부분 백업이 남으면 다음 틱에 같은 레코드가 두 번 처리된다
            drop(target);
            if let Err(remove_err) = std::fs::remove_file(&backup) {
                warn!(backup = %backup.display(), error = %remove_err, "failed to remove partial backup");
            }
            return Err(LogProcessorError::io(
                format!("failed to copy audit log to {}", backup.display()),
                e,
            ));
        }
    };

    source.set_len(0).map_err(|e| {
        LogProcessorError::io(format!("failed to truncate audit log {}", live.display()), e)
    })?;

    Ok((backup, bytes))
}

fn create_backup(live: &Path, last_suffix: &AtomicU64) -> Result<(PathBuf, File), LogProcessorError> {
    let now = unix_seconds(SystemTime::now());
    let start = now.max(last_suffix.load(Ordering::Acquire).saturating_add(1));

    for suffix in start..start.saturating_add(MAX_SUFFIX_ATTEMPTS) {
        let path = backup_path(live, suffix);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                last_suffix.fetch_max(suffix, Ordering::AcqRel);
                return Ok((path, file));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(backup = %path.display(), "backup name taken, trying next suffix");
            }
            Err(e) => {
                return Err(LogProcessorError::io(
                    format!("failed to create backup {}", path.display()),
                    e,
                ));
            }
        }
    }

    Err(LogProcessorError::io(
        format!("failed to create backup for {}", live.display()),
        io::Error::new(ErrorKind::AlreadyExists, "no free backup suffix"),
    ))
}
