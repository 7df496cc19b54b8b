//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `pod_admission_controller_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(pac_core::metrics::MUTATIONS_TOTAL, pac_core::metrics::LABEL_NAMESPACE => "default")
//!     .increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 네임스페이스 레이블 키
pub const LABEL_NAMESPACE: &str = "namespace";

/// 리소스 종류 레이블 키 (pod, namespace, ingress)
pub const LABEL_RESOURCE: &str = "resource";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Mutation 메트릭 ────────────────────────────────────────────────

/// 패치가 생성된 변경 요청 수 (counter, label: namespace)
pub const MUTATIONS_TOTAL: &str = "pod_admission_controller_mutations_total";

/// ignore 어노테이션으로 건너뛴 요청 수 (counter, label: namespace)
pub const MUTATIONS_IGNORED_TOTAL: &str = "pod_admission_controller_mutations_ignored_total";

/// 실패 응답으로 끝난 요청 수 (counter, label: namespace)
pub const MUTATIONS_ERRORED_TOTAL: &str = "pod_admission_controller_mutations_errored_total";

/// 요청 처리 시간 (histogram, 초, label: resource)
pub const MUTATION_DURATION_SECONDS: &str = "pod_admission_controller_mutation_duration_seconds";

/// 네임스페이스 시크릿 생성 결과 (counter, labels: namespace, result)
pub const SECRETS_PROVISIONED_TOTAL: &str = "pod_admission_controller_secrets_provisioned_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(MUTATIONS_TOTAL, "The total number of pod mutations");
    describe_counter!(
        MUTATIONS_IGNORED_TOTAL,
        "The total number of ignored mutations"
    );
    describe_counter!(
        MUTATIONS_ERRORED_TOTAL,
        "The total number of errored mutations"
    );
    describe_histogram!(
        MUTATION_DURATION_SECONDS,
        "Time to answer a single admission review in seconds"
    );
    describe_counter!(
        SECRETS_PROVISIONED_TOTAL,
        "The total number of namespace secret provisioning attempts"
    );
}
