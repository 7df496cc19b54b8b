//! 변경 엔진 에러 타입
//!
//! [`MutationError`]는 룰 로딩부터 패치 생성, Kubernetes API 호출까지
//! 변경 엔진 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<MutationError> for PacError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use pac_core::error::{AdmissionError, PacError, PolicyError};

/// 변경 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// 정책 파일 로딩 실패
    #[error("policy load error: {path}: {reason}")]
    PolicyLoad {
        /// 정책 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 룰 유효성 검증 실패
    #[error("rule validation error: rule '{rule}': {reason}")]
    RuleValidation {
        /// 문제가 된 룰 이름
        rule: String,
        /// 검증 실패 사유
        reason: String,
    },

    /// 조건 평가 실패 (잘못된 연산자, 값 누락, 정규식 오류)
    #[error("condition error: {reason}")]
    Condition { reason: String },

    /// 템플릿 구문 오류
    #[error("error parsing template: {reason}")]
    TemplateParse { reason: String },

    /// 템플릿 실행 오류
    #[error("error executing template: {reason}")]
    TemplateExec { reason: String },

    /// 컨테이너 이미지 참조 해석 실패
    #[error("error parsing image name {image}: {reason}")]
    InvalidImageReference { image: String, reason: String },

    /// 패치 생성기 내부 실패
    #[error("error in {generator}: {reason}")]
    PatchGenerator {
        /// 생성기 이름 (env, nonroot, ...)
        generator: String,
        /// 실패 사유
        reason: String,
    },

    /// Kubernetes API 조회/생성/삭제 실패
    #[error("external lookup failed: {reason}")]
    ExternalLookup { reason: String },

    /// 어드미션 요청 오브젝트 해석 실패
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// 지원하지 않는 리소스 종류
    #[error("unknown resource type {resource}")]
    UnknownResource { resource: String },

    /// JSON 직렬화 실패
    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl MutationError {
    /// 생성기 이름을 붙여 에러를 감쌉니다.
    pub(crate) fn in_generator(self, generator: &str) -> Self {
        match self {
            MutationError::PatchGenerator { .. } => self,
            other => MutationError::PatchGenerator {
                generator: generator.to_owned(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<MutationError> for PacError {
    fn from(err: MutationError) -> Self {
        match &err {
            MutationError::PolicyLoad { path, reason } => PacError::Policy(PolicyError::LoadFailed {
                path: path.clone(),
                reason: reason.clone(),
            }),
            MutationError::RuleValidation { rule, reason } => {
                PacError::Policy(PolicyError::InvalidRule {
                    rule: rule.clone(),
                    reason: reason.clone(),
                })
            }
            MutationError::InvalidRequest { .. } | MutationError::UnknownResource { .. } => {
                PacError::Admission(AdmissionError::InvalidRequest(err.to_string()))
            }
            MutationError::ExternalLookup { .. } => {
                PacError::Admission(AdmissionError::ExternalLookup(err.to_string()))
            }
            MutationError::Condition { .. }
            | MutationError::TemplateParse { .. }
            | MutationError::TemplateExec { .. }
            | MutationError::InvalidImageReference { .. }
            | MutationError::PatchGenerator { .. }
            | MutationError::Serialization { .. } => {
                PacError::Admission(AdmissionError::Mutation(err.to_string()))
            }
        }
    }
}

impl From<serde_json::Error> for MutationError {
    fn from(err: serde_json::Error) -> Self {
        MutationError::Serialization {
            reason: err.to_string(),
        }
    }
}
