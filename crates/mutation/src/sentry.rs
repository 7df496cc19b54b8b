//! Sentry DSN 캐시
//!
//! 프로젝트 slug → DSN 매핑을 보관합니다. 요청 처리 중에는 읽기만 하며,
//! 갱신은 맵 전체를 새 `Arc`로 교체하는 방식으로만 이루어집니다.
//! 따라서 읽는 쪽은 절반만 채워진 맵을 볼 수 없습니다.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// 공유 DSN 캐시 핸들
///
/// `Clone`은 같은 캐시를 가리키는 핸들을 복제합니다.
#[derive(Debug, Clone, Default)]
pub struct DsnCache {
    inner: Arc<RwLock<Arc<HashMap<String, String>>>>,
}

impl DsnCache {
    /// 초기 매핑으로 캐시를 만듭니다.
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let cache = Self::default();
        cache.publish(entries.into_iter().collect());
        cache
    }

    /// 현재 매핑의 불변 스냅샷
    pub fn snapshot(&self) -> Arc<HashMap<String, String>> {
        self.inner
            .read()
            .ok()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_default()
    }

    /// 매핑 전체를 원자적으로 교체합니다.
    pub fn publish(&self, entries: HashMap<String, String>) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Arc::new(entries);
        }
    }

    /// slug에 해당하는 DSN. 없으면 빈 문자열
    pub fn lookup(&self, slug: &str) -> String {
        self.snapshot().get(slug).cloned().unwrap_or_default()
    }

    /// 등록된 프로젝트 수
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// 비어 있는지
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
