//! 어드미션 요청 변경 오케스트레이터
//!
//! [`Mutator`]는 `AdmissionRequest`의 리소스 종류를 한 번 판별한 뒤
//! 종류별 핸들러로 보냅니다.
//!
//! - `pods.v1` -- 룰 평가 + 패치 파이프라인 ([`pod`])
//! - `namespaces.v1` -- 시크릿 프로비저닝 + 레이블/어노테이션 주입 ([`namespace`])
//! - `ingresses.networking.k8s.io.v1` -- 호스트 접미사 치환 ([`ingress`])
//!
//! 요청 하나에는 항상 응답 하나가 돌아갑니다. 핸들러 에러는
//! 실패 응답(`allowed=false`)으로 바뀌며 호출자에게 전파되지 않습니다.

pub mod ingress;
pub mod namespace;
pub mod pod;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use k8s_openapi::api::core::v1::Namespace;
use kube::core::{DynamicObject, Status};
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use metrics::{counter, histogram};
use serde::de::DeserializeOwned;

use pac_core::config::MutationConfig;
use pac_core::metrics::{
    LABEL_NAMESPACE, LABEL_RESOURCE, MUTATION_DURATION_SECONDS, MUTATIONS_ERRORED_TOTAL,
    MUTATIONS_IGNORED_TOTAL,
};
use pac_core::types::{ANNOTATION_IGNORE, WARNING_IGNORED};

use crate::client::KubeClient;
use crate::error::MutationError;
use crate::patch::PatchOperation;
use crate::pipeline::PatchPipeline;
use crate::rule::MutationPolicy;
use crate::template::TemplateEngine;

/// 변경 대상 리소스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Pod,
    Namespace,
    Ingress,
}

impl ResourceKind {
    /// `resource[.group][.version]` 형식의 타입 문자열로 종류를 판별합니다.
    pub fn from_type(resource_type: &str) -> Result<Self, MutationError> {
        match resource_type {
            "pods.v1" => Ok(Self::Pod),
            "namespaces.v1" => Ok(Self::Namespace),
            "ingresses.networking.k8s.io.v1" => Ok(Self::Ingress),
            other => Err(MutationError::UnknownResource {
                resource: other.to_owned(),
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pod => "pod",
            Self::Namespace => "namespace",
            Self::Ingress => "ingress",
        }
    }
}

/// 요청의 리소스 타입 문자열 (`pods.v1`, `ingresses.networking.k8s.io.v1`)
pub fn resource_type(req: &AdmissionRequest<DynamicObject>) -> String {
    let mut result = req.resource.resource.clone();
    for part in [&req.resource.group, &req.resource.version] {
        if !part.is_empty() {
            result.push('.');
            result.push_str(part);
        }
    }
    result
}

/// 로그용 요청 식별자 (`type/operation/namespace/name/uid`)
pub fn object_name(req: &AdmissionRequest<DynamicObject>) -> String {
    let mut result = resource_type(req);
    result.push('/');
    result.push_str(&format!("{:?}", req.operation).to_uppercase());
    for part in [req.namespace.as_deref().unwrap_or_default(), &req.name, &req.uid] {
        if !part.is_empty() {
            result.push('/');
            result.push_str(part);
        }
    }
    result
}

/// 핸들러 결과
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 적용할 패치
    Patched(Vec<PatchOperation>),
    /// 변경 없이 허용 (경고 메시지 포함)
    Skipped(String),
}

/// 오케스트레이터 런타임 설정
#[derive(Debug, Clone)]
pub struct MutatorSettings {
    /// 인그레스 호스트 기본 접미사 (빈 문자열이면 치환하지 않음)
    pub ingress_suffix: String,
    /// 네임스페이스 생성 후 시크릿 생성까지 대기 시간
    pub secret_delay: Duration,
    /// 시크릿 생성 작업 전체 제한 시간
    pub secret_timeout: Duration,
}

impl Default for MutatorSettings {
    fn default() -> Self {
        Self::from(&MutationConfig::default())
    }
}

impl From<&MutationConfig> for MutatorSettings {
    fn from(config: &MutationConfig) -> Self {
        Self {
            ingress_suffix: config.ingress_suffix.clone(),
            secret_delay: config.secret_delay(),
            secret_timeout: config.secret_timeout(),
        }
    }
}

/// 어드미션 변경 오케스트레이터
///
/// 모든 상태는 읽기 전용 스냅샷(`Arc`)으로 주입되며 요청 간에 공유됩니다.
#[derive(Clone)]
pub struct Mutator {
    policy: Arc<MutationPolicy>,
    engine: Arc<TemplateEngine>,
    pipeline: Arc<PatchPipeline>,
    kube: Arc<dyn KubeClient>,
    settings: MutatorSettings,
}

impl Mutator {
    pub fn new(
        policy: Arc<MutationPolicy>,
        engine: Arc<TemplateEngine>,
        kube: Arc<dyn KubeClient>,
        settings: MutatorSettings,
    ) -> Self {
        Self {
            policy,
            engine,
            pipeline: Arc::new(PatchPipeline::new()),
            kube,
            settings,
        }
    }

    /// 어드미션 요청 하나를 처리해 응답을 만듭니다.
    pub async fn mutate(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let started = Instant::now();
        let object = object_name(req);
        tracing::info!(object = %object, "mutate");

        let resource = resource_type(req);
        let namespace = req.namespace.clone().unwrap_or_default();

        let result = match ResourceKind::from_type(&resource) {
            Ok(kind) => {
                let outcome = self.dispatch(kind, req).await;
                histogram!(MUTATION_DURATION_SECONDS, LABEL_RESOURCE => kind.as_str())
                    .record(started.elapsed().as_secs_f64());
                outcome
            }
            Err(e) => Err(e),
        };

        match result.and_then(|outcome| Self::respond(req, outcome)) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(object = %object, error = %e, "Error mutating");
                failure_response(req, &namespace, e.to_string())
            }
        }
    }

    async fn dispatch(
        &self,
        kind: ResourceKind,
        req: &AdmissionRequest<DynamicObject>,
    ) -> Result<Outcome, MutationError> {
        match kind {
            ResourceKind::Pod => {
                let pod = decode_object(req)?;
                self.mutate_pod(req.namespace.as_deref(), None, pod).await
            }
            ResourceKind::Namespace => {
                let namespace: Namespace = decode_object(req)?;
                self.mutate_namespace(&req.operation, namespace).await
            }
            ResourceKind::Ingress => {
                let ingress = decode_object(req)?;
                self.mutate_ingress(req.namespace.as_deref().unwrap_or_default(), ingress)
            }
        }
    }

    fn respond(
        req: &AdmissionRequest<DynamicObject>,
        outcome: Outcome,
    ) -> Result<AdmissionResponse, MutationError> {
        match outcome {
            Outcome::Skipped(warning) => {
                let mut response = AdmissionResponse::from(req);
                response.warnings = Some(vec![warning]);
                Ok(response)
            }
            Outcome::Patched(ops) => {
                let patch: json_patch::Patch =
                    serde_json::from_value(serde_json::to_value(&ops)?)?;
                tracing::debug!(patch = %serde_json::to_string(&ops)?, "patch");
                let mut response = AdmissionResponse::from(req);
                response.result = Status::success();
                response
                    .with_patch(patch)
                    .map_err(|e| MutationError::Serialization {
                        reason: e.to_string(),
                    })
            }
        }
    }

    /// ignore 어노테이션 처리: 지정되어 있으면 경고를 담은 [`Outcome`]을 돌려줍니다.
    fn check_ignored(
        annotations: Option<&BTreeMap<String, String>>,
        metric_namespace: &str,
        target: fmt::Arguments<'_>,
    ) -> Option<Outcome> {
        if !has_ignore_annotation(annotations) {
            return None;
        }
        counter!(MUTATIONS_IGNORED_TOTAL, LABEL_NAMESPACE => metric_namespace.to_owned())
            .increment(1);
        Some(Outcome::Skipped(format!("{WARNING_IGNORED}, {target}")))
    }
}

/// 실패 응답을 만들고 에러 메트릭을 올립니다.
///
/// `allowed=false`, `status: Failure`, 에러 메시지를 담습니다.
pub fn failure_response(
    req: &AdmissionRequest<DynamicObject>,
    namespace: &str,
    message: impl ToString,
) -> AdmissionResponse {
    counter!(MUTATIONS_ERRORED_TOTAL, LABEL_NAMESPACE => namespace.to_owned()).increment(1);
    let message = message.to_string();
    let mut response = AdmissionResponse::from(req).deny(&message);
    response.result = Status::failure(&message, "InternalError");
    response
}

/// `pod-admission-controller/ignore`가 "true"(대소문자 무시)인지
pub fn has_ignore_annotation(annotations: Option<&BTreeMap<String, String>>) -> bool {
    annotations
        .and_then(|a| a.get(ANNOTATION_IGNORE))
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// 요청 오브젝트를 구체 타입으로 변환합니다.
fn decode_object<T: DeserializeOwned>(
    req: &AdmissionRequest<DynamicObject>,
) -> Result<T, MutationError> {
    let object = req.object.as_ref().ok_or_else(|| MutationError::InvalidRequest {
        reason: "request has no object".to_owned(),
    })?;
    let value = serde_json::to_value(object)?;
    serde_json::from_value(value).map_err(|e| MutationError::InvalidRequest {
        reason: e.to_string(),
    })
}

/// 테스트용 어드미션 요청 생성기
#[cfg(test)]
pub(crate) mod test_support {
    use kube::core::DynamicObject;
    use kube::core::admission::{AdmissionRequest, AdmissionReview};
    use serde_json::json;

    pub fn request(
        group: &str,
        resource: &str,
        operation: &str,
        namespace: Option<&str>,
        object: serde_json::Value,
    ) -> AdmissionRequest<DynamicObject> {
        let mut request = json!({
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": { "group": group, "version": "v1", "kind": "Object" },
            "resource": { "group": group, "version": "v1", "resource": resource },
            "name": object["metadata"]["name"].clone(),
            "operation": operation,
            "userInfo": {},
            "object": object,
            "dryRun": false
        });
        if let Some(ns) = namespace {
            request["namespace"] = json!(ns);
        }
        let review: AdmissionReview<DynamicObject> = serde_json::from_value(json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": request
        }))
        .unwrap();
        review.try_into().unwrap()
    }
}
