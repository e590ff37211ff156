//! 감사 로그 쓰기 잠금
//!
//! 검사 엔진(요청 처리 경로)과 로테이터는 같은 [`AuditLogLock`]을 공유합니다.
//! 엔진은 감사 로그 한 줄을 쓸 때마다 잠금을 잡고, 로테이터는 복사와 절단이
//! 끝날 때까지 잠금을 유지합니다. 따라서 로테이션 도중에는 요청 처리가
//! 잠시 블로킹되며, 이 구간의 길이는 라이브 로그 크기에 비례합니다.
//!
//! 엔진은 감사 로그를 append 모드로 열어야 합니다. 그래야 절단 이후의
//! 쓰기가 파일 앞부분부터 다시 채워집니다.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// 라이브 감사 로그에 대한 상호 배제 잠금
///
/// `Clone`은 같은 잠금을 공유하는 핸들을 만듭니다.
#[derive(Debug, Clone, Default)]
pub struct AuditLogLock {
    inner: Arc<Mutex<()>>,
}

/// 잠금 보유 가드. drop 시 잠금이 해제됩니다.
///
/// 소유형 가드이므로 `spawn_blocking` 클로저로 옮길 수 있습니다.
#[derive(Debug)]
pub struct AuditLogGuard {
    _guard: OwnedMutexGuard<()>,
}

impl AuditLogLock {
    /// 새 잠금을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 비동기 컨텍스트에서 잠금을 획득합니다.
    pub async fn lock(&self) -> AuditLogGuard {
        AuditLogGuard {
            _guard: Arc::clone(&self.inner).lock_owned().await,
        }
    }

    /// 동기 컨텍스트(엔진 쓰기 경로)에서 잠금을 획득합니다.
    ///
    /// 비동기 런타임 워커 스레드에서 호출하면 패닉이 발생하므로,
    /// 그런 경우에는 [`lock`](Self::lock)을 사용해야 합니다.
    pub fn blocking_lock(&self) -> AuditLogGuard {
        AuditLogGuard {
            _guard: Arc::clone(&self.inner).blocking_lock_owned(),
        }
    }

    /// 잠금을 즉시 획득할 수 있으면 획득합니다.
    pub fn try_lock(&self) -> Option<AuditLogGuard> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .ok()
            .map(|guard| AuditLogGuard { _guard: guard })
    }

    /// 두 핸들이 같은 잠금을 가리키는지 확인합니다.
    pub fn same_lock(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
