//! 템플릿 `Resolve` / `ResolveFallback` 함수가 사용하는 도메인 해석기

use std::collections::HashMap;
use std::net::ToSocketAddrs;

/// 도메인 이름을 IP 문자열로 해석합니다.
///
/// 템플릿 렌더링 중 동기적으로 호출되므로 블로킹 스레드에서 사용해야 합니다.
pub trait DomainResolver: Send + Sync {
    /// 첫 번째 주소를 반환합니다. 실패 시 사람이 읽을 수 있는 에러 메시지
    fn resolve(&self, domain: &str) -> Result<String, String>;
}

/// OS 리졸버(`getaddrinfo`) 기반 구현
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl DomainResolver for SystemResolver {
    fn resolve(&self, domain: &str) -> Result<String, String> {
        (domain, 0)
            .to_socket_addrs()
            .map_err(|e| format!("lookup {domain}: {e}"))?
            .next()
            .map(|addr| addr.ip().to_string())
            .ok_or_else(|| format!("lookup {domain}: no such host"))
    }
}

/// 고정 테이블 기반 해석기
///
/// 테스트와 `--test-pod` 같은 오프라인 실행에 사용합니다.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    hosts: HashMap<String, String>,
}

impl StaticResolver {
    /// 호스트 → IP 테이블로 생성
    pub fn new(hosts: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            hosts: hosts.into_iter().collect(),
        }
    }
}

impl DomainResolver for StaticResolver {
    fn resolve(&self, domain: &str) -> Result<String, String> {
        self.hosts
            .get(domain)
            .cloned()
            .ok_or_else(|| format!("lookup {domain}: no such host"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_resolver_resolves_ip_literal() {
        assert_eq!(SystemResolver.resolve("127.0.0.1").unwrap(), "127.0.0.1");
    }

    #[test]
    fn system_resolver_reports_failure() {
        let err = SystemResolver
            .resolve("name-that-does-not-exist.invalid")
            .unwrap_err();
        assert!(err.contains("name-that-does-not-exist.invalid"));
    }

    #[test]
    fn static_resolver_table() {
        let resolver = StaticResolver::new([("db.local".to_owned(), "10.0.0.5".to_owned())]);
        assert_eq!(resolver.resolve("db.local").unwrap(), "10.0.0.5");
        assert!(resolver.resolve("other.local").is_err());
    }
}
