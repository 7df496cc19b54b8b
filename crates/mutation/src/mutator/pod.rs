//! 파드 변경
//!
//! 네임스페이스를 확인하고 ignore 어노테이션을 검사한 뒤
//! 패치 파이프라인을 blocking 스레드 풀에서 실행합니다.
//! 템플릿의 DNS 조회가 async 런타임을 막지 않도록 하기 위함입니다.

use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use metrics::counter;

use pac_core::metrics::{LABEL_NAMESPACE, MUTATIONS_TOTAL};
use pac_core::types::WARNING_NO_PATCHES;

use crate::error::MutationError;
use crate::patch::PatchOperation;

use super::{Mutator, Outcome};

impl Mutator {
    /// 파드 변경 패치를 계산합니다.
    ///
    /// `namespace`가 주어지면 API 조회 없이 그대로 사용합니다.
    pub async fn mutate_pod(
        &self,
        request_namespace: Option<&str>,
        namespace: Option<Namespace>,
        pod: Pod,
    ) -> Result<Outcome, MutationError> {
        let namespace = match namespace {
            Some(ns) => ns,
            None => {
                let name = request_namespace.unwrap_or_default();
                self.kube.get_namespace(name).await.map_err(|e| {
                    MutationError::ExternalLookup {
                        reason: format!("namespace not found: {e}"),
                    }
                })?
            }
        };
        let ns_name = namespace.metadata.name.clone().unwrap_or_default();
        let pod_name = pod.metadata.name.clone().unwrap_or_default();

        if let Some(skipped) = Self::check_ignored(
            pod.metadata.annotations.as_ref(),
            &ns_name,
            format_args!("pod {ns_name}/{pod_name}"),
        ) {
            return Ok(skipped);
        }

        let ops = self.run_pipeline(namespace, pod).await?;
        if ops.is_empty() {
            return Ok(Outcome::Skipped(WARNING_NO_PATCHES.to_owned()));
        }

        counter!(MUTATIONS_TOTAL, LABEL_NAMESPACE => ns_name).increment(1);
        Ok(Outcome::Patched(ops))
    }

    async fn run_pipeline(
        &self,
        namespace: Namespace,
        pod: Pod,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let pipeline = self.pipeline.clone();
        let policy = self.policy.clone();
        let engine = self.engine.clone();

        tokio::task::spawn_blocking(move || pipeline.run(&namespace, &pod, &policy.rules, &engine))
            .await
            .map_err(|e| MutationError::PatchGenerator {
                generator: "pipeline".to_owned(),
                reason: e.to_string(),
            })?
    }

    /// 실행 중인 파드를 가져와 변경 패치를 계산합니다 (`--test-pod`).
    ///
    /// 네임스페이스는 이름만 가진 스텁을 사용합니다.
    /// 변경이 없으면 빈 목록을 돌려줍니다.
    pub async fn test_pod(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let pod = self.kube.get_pod(namespace, name).await?;
        let stub = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_owned()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };

        match self.mutate_pod(Some(namespace), Some(stub), pod).await? {
            Outcome::Patched(ops) => Ok(ops),
            Outcome::Skipped(warning) => {
                tracing::info!(warning = %warning, "no patch generated");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::MockKubeClient;
    use crate::context::test_support::{namespace, pod};
    use crate::mutator::MutatorSettings;
    use crate::patch::test_support::engine;
    use crate::rule::MutationPolicy;
    use mockall::predicate::eq;
    use serde_json::json;

    fn mutator(kube: MockKubeClient, yaml: &str) -> Mutator {
        Mutator::new(
            Arc::new(MutationPolicy::parse(yaml, "test.yaml").unwrap()),
            Arc::new(engine()),
            Arc::new(kube),
            MutatorSettings::default(),
        )
    }

    const ENV_POLICY: &str = r#"
Rules:
  - Name: env
    Env:
      - name: TEST1
        value: "{{ .ContainerName }}"
"#;

    #[tokio::test]
    async fn namespace_is_fetched_when_not_given() {
        let mut kube = MockKubeClient::new();
        kube.expect_get_namespace()
            .with(eq("prod"))
            .times(1)
            .returning(|_| Ok(namespace("prod", json!({}))));

        let p = pod(json!({
            "metadata": { "name": "web" },
            "spec": { "containers": [ { "name": "app", "image": "nginx" } ] }
        }));
        let outcome = mutator(kube, ENV_POLICY)
            .mutate_pod(Some("prod"), None, p)
            .await
            .unwrap();

        let Outcome::Patched(ops) = outcome else {
            panic!("expected patch");
        };
        assert_eq!(ops[0].path, "/spec/containers/0/env");
        assert_eq!(ops[0].value, Some(json!([{ "name": "TEST1", "value": "app" }])));
        assert_eq!(ops[1].path, "/metadata/annotations");
    }

    #[tokio::test]
    async fn missing_namespace_is_an_external_lookup_error() {
        let mut kube = MockKubeClient::new();
        kube.expect_get_namespace().returning(|_| {
            Err(MutationError::ExternalLookup {
                reason: "404".to_owned(),
            })
        });

        let p = pod(json!({
            "metadata": { "name": "web" },
            "spec": { "containers": [ { "name": "app", "image": "nginx" } ] }
        }));
        let err = mutator(kube, ENV_POLICY)
            .mutate_pod(Some("gone"), None, p)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("namespace not found"));
    }

    #[tokio::test]
    async fn ignored_pod_is_skipped_with_warning() {
        let p = pod(json!({
            "metadata": {
                "name": "web",
                "annotations": { "pod-admission-controller/ignore": "true" }
            },
            "spec": { "containers": [ { "name": "app", "image": "nginx" } ] }
        }));
        let outcome = mutator(MockKubeClient::new(), ENV_POLICY)
            .mutate_pod(None, Some(namespace("prod", json!({}))), p)
            .await
            .unwrap();

        let Outcome::Skipped(warning) = outcome else {
            panic!("expected warning");
        };
        assert!(warning.ends_with(", pod prod/web"));
    }

    #[tokio::test]
    async fn test_pod_uses_namespace_stub() {
        let mut kube = MockKubeClient::new();
        kube.expect_get_pod()
            .with(eq("staging"), eq("web-0"))
            .returning(|_, _| {
                Ok(pod(json!({
                    "metadata": { "name": "web-0" },
                    "spec": { "containers": [ { "name": "app", "image": "nginx" } ] }
                })))
            });
        kube.expect_get_namespace().never();

        let policy = r#"
Rules:
  - Name: staging-only
    Conditions:
      - Key: .Namespace
        Operator: equal
        Value: staging
    Env:
      - name: STAGE
        value: "1"
"#;
        let ops = mutator(kube, policy).test_pod("staging", "web-0").await.unwrap();
        assert_eq!(ops.len(), 2);
    }
}
