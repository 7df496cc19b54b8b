//! 에러 타입: 도메인별 에러 정의

/// pod-admission-controller 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum PacError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 변경 정책(룰) 로딩/검증 에러
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    /// 어드미션 요청 처리 에러
    #[error("admission error: {0}")]
    Admission(#[from] AdmissionError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 변경 정책 에러
///
/// 시작 시점에 발생하며 서버 기동을 막습니다.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// 정책 파일 로딩 실패
    #[error("failed to load policy {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// 룰 검증 실패
    #[error("invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },
}

/// 어드미션 요청 단위 에러
///
/// 해당 요청만 Failure 응답으로 끝나며 다른 요청에는 영향이 없습니다.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// 요청 본문 해석 실패
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// 조건/템플릿/이미지/패치 생성 실패
    #[error("mutation failed: {0}")]
    Mutation(String),

    /// Kubernetes API 조회/생성 실패
    #[error("external lookup failed: {0}")]
    ExternalLookup(String),
}
