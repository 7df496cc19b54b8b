//! 어노테이션/레이블 상수와 경고 메시지
//!
//! 모든 키는 `pod-admission-controller/` 접두어를 공유합니다.
//! 같은 키가 파드와 네임스페이스에 모두 있으면 파드 값이 우선합니다.

/// 어노테이션 접두어
pub const ANNOTATION_PREFIX: &str = "pod-admission-controller";

/// 관리 대상 네임스페이스 레이블
pub const LABEL_MANAGED: &str = "pod-admission-controller/managed";

/// 변경이 적용된 오브젝트에 기록하는 어노테이션
pub const ANNOTATION_INJECTED: &str = "pod-admission-controller/injected";

/// 값이 "true"(대소문자 무시)이면 변경을 건너뜀
pub const ANNOTATION_IGNORE: &str = "pod-admission-controller/ignore";

/// 환경변수 주입을 건너뛸 컨테이너 목록 (쉼표 구분)
pub const ANNOTATION_IGNORE_ENV: &str = "pod-admission-controller/ignoreEnv";

/// RunAsNonRoot 적용을 건너뛸 컨테이너 목록 (deprecated, `ignore-nonroot` 사용)
pub const ANNOTATION_IGNORE_RUN_AS_NON_ROOT: &str = "pod-admission-controller/ignoreRunAsNonRoot";

/// 기본 리소스 적용을 건너뛸 컨테이너 목록 (deprecated, `ignore-resources` 사용)
pub const ANNOTATION_IGNORE_ADD_DEFAULT_RESOURCES: &str =
    "pod-admission-controller/ignoreAddDefaultResources";

/// 기본 CPU 요청량
pub const ANNOTATION_DEFAULT_RESOURCES_CPU: &str = "pod-admission-controller/defaultResourcesCPU";

/// 기본 메모리 요청량
pub const ANNOTATION_DEFAULT_RESOURCES_MEMORY: &str =
    "pod-admission-controller/defaultResourcesMemory";

/// 인그레스 호스트 접미사
pub const ANNOTATION_INGRESS_SUFFIX: &str = "pod-admission-controller/ingressSuffix";

/// 패치 생성기별 ignore 어노테이션 접두어 (`ignore-<generator>`)
pub const ANNOTATION_IGNORE_GENERATOR_PREFIX: &str = "pod-admission-controller/ignore-";

/// ignore 어노테이션으로 변경을 건너뛸 때의 경고
pub const WARNING_IGNORED: &str =
    "pod-admission-controller: ignore mutation by annotation pod-admission-controller/ignore";

/// 생성된 패치가 없을 때의 경고
pub const WARNING_NO_PATCHES: &str = "pod-admission-controller. No patches found";

/// 생성한 시크릿에 붙이는 `app` 레이블 값
pub const SECRET_APP_LABEL: &str = "pod-admission-controller";

/// 패치 생성기별 ignore 어노테이션 키
pub fn generator_ignore_annotation(generator: &str) -> String {
    format!("{ANNOTATION_IGNORE_GENERATOR_PREFIX}{generator}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_share_prefix() {
        for key in [
            LABEL_MANAGED,
            ANNOTATION_INJECTED,
            ANNOTATION_IGNORE,
            ANNOTATION_IGNORE_ENV,
            ANNOTATION_DEFAULT_RESOURCES_CPU,
            ANNOTATION_DEFAULT_RESOURCES_MEMORY,
            ANNOTATION_INGRESS_SUFFIX,
        ] {
            assert!(key.starts_with(ANNOTATION_PREFIX));
        }
    }

    #[test]
    fn generator_annotation_key() {
        assert_eq!(
            generator_ignore_annotation("env"),
            "pod-admission-controller/ignore-env"
        );
    }

    #[test]
    fn ignored_warning_names_annotation() {
        assert!(WARNING_IGNORED.ends_with(ANNOTATION_IGNORE));
    }
}
