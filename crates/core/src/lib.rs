//! pod-admission-controller 공통 크레이트
//!
//! 모든 크레이트가 공유하는 에러 타입, 데몬 설정, 메트릭 이름,
//! 어노테이션 상수를 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{AdmissionError, ConfigError, PacError, PolicyError};

// 설정
pub use config::{
    GeneralConfig, MetricsConfig, MutationConfig, PacConfig, SentryConfig, ServerConfig,
};
