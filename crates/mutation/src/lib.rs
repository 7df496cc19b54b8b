//! pod-admission-controller 변경 엔진
//!
//! 어드미션 요청을 받아 룰을 평가하고 JSON Patch 연산을 생성합니다.
//!
//! # 처리 흐름
//!
//! ```text
//! AdmissionRequest
//!   -> Mutator (리소스 종류 판별)
//!        pods       -> ContainerInfo -> select_rules -> PatchGenerator x9 -> PatchSet
//!        namespaces -> 시크릿 프로비저닝 + 레이블/어노테이션
//!        ingresses  -> 호스트 접미사 치환
//!   -> AdmissionResponse
//! ```
//!
//! # 모듈
//!
//! - [`image`] -- 컨테이너 이미지 참조 해석
//! - [`template`] -- 룰 템플릿 렌더링 (헬퍼 함수 포함)
//! - [`condition`] -- 조건 평가와 룰 선택
//! - [`rule`] -- 정책 타입과 로더
//! - [`patch`] -- 패치 생성기
//! - [`pipeline`] -- 파드 단위 패치 파이프라인
//! - [`mutator`] -- 어드미션 요청 오케스트레이터
//! - [`client`], [`resolver`], [`sentry`] -- 외부 협력자

pub mod client;
pub mod condition;
pub mod context;
pub mod error;
pub mod image;
pub mod mutator;
pub mod patch;
pub mod pipeline;
pub mod quantity;
pub mod resolver;
pub mod rule;
pub mod sentry;
pub mod template;

pub use client::{KubeApiClient, KubeClient};
pub use context::{ContainerInfo, ContainerType};
pub use error::MutationError;
pub use image::ContainerImage;
pub use mutator::{Mutator, MutatorSettings, Outcome, ResourceKind};
pub use patch::{PatchGenerator, PatchOp, PatchOperation, PatchSet};
pub use pipeline::PatchPipeline;
pub use resolver::{DomainResolver, StaticResolver, SystemResolver};
pub use rule::{MutationPolicy, PolicyLoader, Rule};
pub use sentry::DsnCache;
pub use template::TemplateEngine;
