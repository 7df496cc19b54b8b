//! 변경 룰 정책
//!
//! 정책 파일의 데이터 타입([`types`])과 로딩/검증([`loader`])을 제공합니다.

pub mod loader;
pub mod types;

pub use loader::PolicyLoader;
pub use types::{
    AddDefaultResources, AddLifecycle, AddTopologySpread, Condition, CreateSecret,
    MutationPolicy, Operator, ReplaceContainerImageHost, ReplaceUser, Rule, RunAsNonRoot,
};
