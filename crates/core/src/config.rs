//! 설정 관리: pac.toml 파싱 및 런타임 설정
//!
//! [`PacConfig`]는 데몬 실행에 필요한 모든 설정을 담는 최상위 구조체입니다.
//! 변경 룰 자체는 `mutation.policy_path`가 가리키는 YAML 정책 파일에 있으며
//! `pac-mutation` 크레이트가 로딩합니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PAC_SERVER_LISTEN_ADDR=0.0.0.0:9443` 형식)
//! 3. 설정 파일 (`pac.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), pac_core::error::PacError> {
//! use pac_core::config::PacConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PacConfig::load("pac.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = PacConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, PacError};

/// 레거시 인그레스 접미사 환경변수
const LEGACY_INGRESS_SUFFIX_ENV: &str = "INGRESS_SUFFIX";

/// pod-admission-controller 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PacConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 웹훅 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 변경(mutation) 설정
    #[serde(default)]
    pub mutation: MutationConfig,
    /// Sentry DSN 캐시 설정
    #[serde(default)]
    pub sentry: SentryConfig,
}

impl PacConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PacError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PacError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PacError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PacError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PacError> {
        toml::from_str(toml_str).map_err(|e| {
            PacError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PAC_{SECTION}_{FIELD}`
    /// `mutation.ingress_suffix`가 비어 있으면 `INGRESS_SUFFIX`를 사용합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PAC_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PAC_GENERAL_LOG_FORMAT");

        // Server
        override_string(&mut self.server.listen_addr, "PAC_SERVER_LISTEN_ADDR");
        override_string(&mut self.server.cert_file, "PAC_SERVER_CERT_FILE");
        override_string(&mut self.server.key_file, "PAC_SERVER_KEY_FILE");
        override_u64(
            &mut self.server.grace_period_secs,
            "PAC_SERVER_GRACE_PERIOD_SECS",
        );
        override_u64(
            &mut self.server.request_timeout_secs,
            "PAC_SERVER_REQUEST_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "PAC_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "PAC_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "PAC_METRICS_PORT");

        // Mutation
        override_string(
            &mut self.mutation.policy_path,
            "PAC_MUTATION_POLICY_PATH",
        );
        override_string(
            &mut self.mutation.ingress_suffix,
            "PAC_MUTATION_INGRESS_SUFFIX",
        );
        override_u64(
            &mut self.mutation.secret_delay_secs,
            "PAC_MUTATION_SECRET_DELAY_SECS",
        );
        override_u64(
            &mut self.mutation.secret_timeout_secs,
            "PAC_MUTATION_SECRET_TIMEOUT_SECS",
        );
        if self.mutation.ingress_suffix.is_empty() {
            override_string(&mut self.mutation.ingress_suffix, LEGACY_INGRESS_SUFFIX_ENV);
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PacError> {
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

        if let Err(e) = self.server.listen_addr.parse::<SocketAddr>() {
            return Err(ConfigError::InvalidValue {
                field: "server.listen_addr".to_owned(),
                reason: e.to_string(),
            }
            .into());
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.request_timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.metrics.enabled && !self.metrics.endpoint.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "metrics.endpoint".to_owned(),
                reason: "must start with '/'".to_owned(),
            }
            .into());
        }

        if self.mutation.policy_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "mutation.policy_path".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
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
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 웹훅 HTTPS 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 수신 주소
    pub listen_addr: String,
    /// TLS 인증서 (PEM)
    pub cert_file: String,
    /// TLS 개인키 (PEM)
    pub key_file: String,
    /// 종료 시 진행 중인 요청을 기다리는 시간 (초)
    pub grace_period_secs: u64,
    /// 어드미션 요청 처리 제한 시간 (초)
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// 종료 유예 시간
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// 요청 처리 제한 시간
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8443".to_owned(),
            cert_file: "server.crt".to_owned(),
            key_file: "server.key".to_owned(),
            grace_period_secs: 5,
            request_timeout_secs: 5,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0".to_owned(),
            port: 31080,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// 변경(mutation) 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// 룰과 시크릿 목록을 담은 YAML 정책 파일 경로
    pub policy_path: String,
    /// 인그레스 호스트 기본 접미사 (빈 값이면 치환하지 않음)
    pub ingress_suffix: String,
    /// 네임스페이스 생성 후 시크릿 생성까지 대기 시간 (초)
    pub secret_delay_secs: u64,
    /// 시크릿 생성 작업 전체 제한 시간 (초)
    pub secret_timeout_secs: u64,
}

impl MutationConfig {
    /// 시크릿 생성 대기 시간
    pub fn secret_delay(&self) -> Duration {
        Duration::from_secs(self.secret_delay_secs)
    }

    /// 시크릿 생성 제한 시간
    pub fn secret_timeout(&self) -> Duration {
        Duration::from_secs(self.secret_timeout_secs)
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            policy_path: "/etc/pod-admission-controller/policy.yaml".to_owned(),
            ingress_suffix: String::new(),
            secret_delay_secs: 10,
            secret_timeout_secs: 60,
        }
    }
}

/// Sentry DSN 캐시 초기값
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentryConfig {
    /// 프로젝트 slug -> DSN
    pub dsn_cache: BTreeMap<String, String>,
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

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = PacConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.server.listen_addr, "0.0.0.0:8443");
        assert_eq!(config.server.grace_period(), Duration::from_secs(5));
        assert_eq!(config.metrics.port, 31080);
        assert!(config.mutation.ingress_suffix.is_empty());
        assert_eq!(config.mutation.secret_delay(), Duration::from_secs(10));
        assert_eq!(config.mutation.secret_timeout(), Duration::from_secs(60));
        assert!(config.sentry.dsn_cache.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        PacConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = PacConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.cert_file, "server.crt");
    }

    #[test]
    fn partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[mutation]
ingress_suffix = "dev.example.com"
"#;
        let config = PacConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.mutation.ingress_suffix, "dev.example.com");
        assert_eq!(config.mutation.secret_delay_secs, 10);
    }

    #[test]
    fn sentry_dsn_cache_parses_as_table() {
        let toml = r#"
[sentry.dsn_cache]
backend = "https://key@sentry.example.com/1"
"#;
        let config = PacConfig::parse(toml).unwrap();
        assert_eq!(
            config.sentry.dsn_cache.get("backend").map(String::as_str),
            Some("https://key@sentry.example.com/1")
        );
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let mut config = PacConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("general.log_level"));
    }

    #[test]
    fn invalid_listen_addr_fails_validation() {
        let mut config = PacConfig::default();
        config.server.listen_addr = ":8443".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.listen_addr"));
    }

    #[test]
    fn zero_request_timeout_fails_validation() {
        let mut config = PacConfig::default();
        config.server.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_policy_path_fails_validation() {
        let mut config = PacConfig::default();
        config.mutation.policy_path.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mutation.policy_path"));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = PacConfig::parse("[general\nlog_level = ").unwrap_err();
        assert!(matches!(
            err,
            PacError::Config(ConfigError::ParseFailed { .. })
        ));
    }
}
