//! 백업 만료
//!
//! 라이브 로그 디렉토리에서 `<base>.<digits>` 형식의 일반 파일만 골라,
//! 이름에 기록된 시각으로부터 보존 기간이 지난 백업을 삭제합니다.
//! 디렉토리를 읽지 못하면 에러를 반환하지만, 개별 파일 삭제 실패는
//! 경고만 남기고 나머지 파일을 계속 처리합니다.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use wafaudit_core::metrics as m;

use crate::backup::{BackupFile, log_dir, parse_backup_timestamp};
use crate::error::LogProcessorError;

/// 만료 검사 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpireSummary {
    /// 발견한 백업 파일 수
    pub scanned: usize,
    /// 삭제한 백업 수
    pub deleted: usize,
    /// 삭제에 실패한 백업 수
    pub failed: usize,
}

/// 라이브 로그 옆에 있는 백업 파일 목록을 반환합니다.
pub fn list_backups(live: &Path) -> Result<Vec<BackupFile>, LogProcessorError> {
    let Some(base) = live.file_name().and_then(|n| n.to_str()) else {
        return Err(LogProcessorError::Config {
            field: "path".to_owned(),
            reason: format!("'{}' has no UTF-8 file name", live.display()),
        });
    };

    let dir = log_dir(live);
    let entries = fs::read_dir(&dir).map_err(|e| {
        LogProcessorError::io(format!("failed to read directory {}", dir.display()), e)
    })?;

    let mut backups = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            LogProcessorError::io(format!("failed to read directory {}", dir.display()), e)
        })?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let name = entry.file_name();
        let Some(timestamp) = name.to_str().and_then(|n| parse_backup_timestamp(base, n)) else {
            continue;
        };
        backups.push(BackupFile {
            path: entry.path(),
            timestamp,
        });
    }

    backups.sort_by_key(|b| b.timestamp);
    Ok(backups)
}

/// 보존 기간이 지난 백업을 삭제합니다.
///
/// 경과 시간이 `retention`보다 **큰** 백업만 삭제하며, 미래 시각의 백업은 유지합니다.
pub fn expire_backups(
    live: &Path,
    retention: Duration,
    now: SystemTime,
) -> Result<ExpireSummary, LogProcessorError> {
    let backups = list_backups(live)?;
    let mut summary = ExpireSummary {
        scanned: backups.len(),
        ..Default::default()
    };

    for backup in expired(&backups, retention, now) {
        match fs::remove_file(&backup.path) {
            Ok(()) => {
                summary.deleted += 1;
                metrics::counter!(m::AUDIT_LOG_BACKUPS_EXPIRED_TOTAL).increment(1);
                info!(backup = %backup.path.display(), "expired backup deleted");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(backup = %backup.path.display(), "backup already removed");
            }
            Err(e) => {
                summary.failed += 1;
                warn!(backup = %backup.path.display(), error = %e, "failed to delete expired backup");
            }
        }
    }

    Ok(summary)
}

fn expired<'a>(
    backups: &'a [BackupFile],
    retention: Duration,
    now: SystemTime,
) -> impl Iterator<Item = &'a BackupFile> {
    backups
        .iter()
        .filter(move |b| b.age(now).is_some_and(|age| age > retention))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{backup_path, unix_seconds};

    fn touch(path: &Path) {
        fs::write(path, b"{}\n").unwrap();
    }

    #[test]
    fn deletes_only_backups_past_retention() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("audit.log");
        let now = SystemTime::now();
        let now_secs = unix_seconds(now);

        let old = backup_path(&live, now_secs - 7200);
        let fresh = backup_path(&live, now_secs - 60);
        let future = backup_path(&live, now_secs + 3600);
        touch(&live);
        touch(&old);
        touch(&fresh);
        touch(&future);

        let summary = expire_backups(&live, Duration::from_secs(3600), now).unwrap();
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.failed, 0);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(future.exists());
        assert!(live.exists());
    }

    #[test]
    fn age_equal_to_retention_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("audit.log");
        let now_secs = 1_700_000_000;
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(now_secs);
        let edge = backup_path(&live, now_secs - 100);
        touch(&edge);

        let summary = expire_backups(&live, Duration::from_secs(100), now).unwrap();
        assert_eq!(summary.deleted, 0);
        assert!(edge.exists());
    }

    #[test]
    fn ignores_unrelated_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("audit.log");
        touch(&dir.path().join("audit.log.old"));
        touch(&dir.path().join("audit.log.100.gz"));
        touch(&dir.path().join("other.log.100"));
        fs::create_dir(dir.path().join("audit.log.200")).unwrap();
        touch(&dir.path().join("audit.log.300"));

        let backups = list_backups(&live).unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].timestamp, 300);

        let summary = expire_backups(&live, Duration::from_secs(1), SystemTime::now()).unwrap();
        assert_eq!(summary.deleted, 1);
        assert!(dir.path().join("audit.log.old").exists());
        assert!(dir.path().join("audit.log.100.gz").exists());
        assert!(dir.path().join("other.log.100").exists());
        assert!(dir.path().join("audit.log.200").is_dir());
    }

    #[test]
    fn unrepresentable_suffix_is_kept_and_sweep_continues() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("audit.log");
        let huge = backup_path(&live, u64::MAX);
        let old = backup_path(&live, 100);
        touch(&huge);
        touch(&old);

        let summary = expire_backups(&live, Duration::from_secs(3600), SystemTime::now()).unwrap();
        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.deleted, 1);
        assert!(huge.exists());
        assert!(!old.exists());
    }

    #[test]
    fn backups_are_sorted_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("audit.log");
        for ts in [30, 10, 20] {
            touch(&backup_path(&live, ts));
        }
        let timestamps: Vec<_> = list_backups(&live)
            .unwrap()
            .into_iter()
            .map(|b| b.timestamp)
            .collect();
        assert_eq!(timestamps, vec![10, 20, 30]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("gone").join("audit.log");
        let err = expire_backups(&live, Duration::from_secs(1), SystemTime::now()).unwrap_err();
        assert!(matches!(err, LogProcessorError::Io { .. }));
    }
}
