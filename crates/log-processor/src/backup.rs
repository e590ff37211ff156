//! 백업 파일 이름 규칙
//!
//! 로테이션된 백업은 라이브 로그와 같은 디렉토리에 `<base>.<unix-seconds>`
//! 이름으로 생성됩니다. 접미어가 10진수로만 이루어진 경우에만 백업으로
//! 인식하므로, `<base>.old`나 `<base>.1700000000.gz` 같은 파일은 만료 검사
//! 대상에서 제외됩니다.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 디렉토리에서 발견한 백업 파일
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    /// 백업 파일 경로
    pub path: PathBuf,
    /// 파일 이름에 기록된 Unix 타임스탬프(초)
    pub timestamp: u64,
}

impl BackupFile {
    /// `now` 기준으로 이 백업의 경과 시간을 반환합니다.
    ///
    /// 타임스탬프가 미래이거나 `SystemTime`으로 표현할 수 없으면 `None`을
    /// 반환합니다.
    pub fn age(&self, now: SystemTime) -> Option<Duration> {
        let created = UNIX_EPOCH.checked_add(Duration::from_secs(self.timestamp))?;
        now.duration_since(created).ok()
    }
}

/// 라이브 로그 경로와 타임스탬프로 백업 파일 경로를 만듭니다.
pub fn backup_path(live: &Path, timestamp: u64) -> PathBuf {
    let mut name = OsString::from(live.as_os_str());
    name.push(format!(".{timestamp}"));
    PathBuf::from(name)
}

/// 파일 이름이 `base`의 백업이면 타임스탬프를 반환합니다.
pub fn parse_backup_timestamp(base: &str, file_name: &str) -> Option<u64> {
    let suffix = file_name.strip_prefix(base)?.strip_prefix('.')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// 라이브 로그가 위치한 디렉토리를 반환합니다.
///
/// 상대 경로의 부모가 비어 있으면 현재 디렉토리를 뜻합니다.
pub fn log_dir(live: &Path) -> PathBuf {
    match live.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `SystemTime`을 Unix 초로 변환합니다. epoch 이전은 0입니다.
pub fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
