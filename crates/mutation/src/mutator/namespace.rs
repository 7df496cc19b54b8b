//! 네임스페이스 변경과 시크릿 프로비저닝
//!
//! 정책의 `CreateSecrets`를 네임스페이스마다 생성합니다.
//! 생성(Create) 요청에서는 네임스페이스가 실제로 만들어질 때까지 기다려야 하므로
//! 지연된 백그라운드 작업으로 실행하고, 갱신(Update) 요청에서는 즉시 실행합니다.
//! 어느 쪽이든 시크릿 실패는 로그로만 남고 응답을 바꾸지 않습니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::admission::Operation;
use metrics::counter;

use pac_core::metrics::{LABEL_NAMESPACE, LABEL_RESULT, SECRETS_PROVISIONED_TOTAL};
use pac_core::types::{LABEL_MANAGED, SECRET_APP_LABEL};

use crate::client::KubeClient;
use crate::error::MutationError;
use crate::patch::{PatchOperation, inject_annotation};
use crate::rule::CreateSecret;

use super::{Mutator, Outcome};

impl Mutator {
    /// 네임스페이스 변경 패치를 계산하고 시크릿 생성을 진행합니다.
    pub async fn mutate_namespace(
        &self,
        operation: &Operation,
        namespace: Namespace,
    ) -> Result<Outcome, MutationError> {
        let name = namespace.metadata.name.clone().unwrap_or_default();

        if let Some(skipped) = Self::check_ignored(
            namespace.metadata.annotations.as_ref(),
            &name,
            format_args!("namespace {name}"),
        ) {
            return Ok(skipped);
        }

        match operation {
            Operation::Create => self.schedule_secrets(name.clone()),
            Operation::Update => {
                create_secrets(self.kube.as_ref(), &name, &self.policy.create_secrets).await;
            }
            _ => {}
        }

        Ok(Outcome::Patched(vec![
            inject_annotation(namespace.metadata.annotations.as_ref())?,
            inject_labels(namespace.metadata.labels.as_ref())?,
        ]))
    }

    /// 요청과 분리된 작업으로 시크릿 생성을 예약합니다.
    ///
    /// 작업 시간은 요청 컨텍스트가 아니라 `secret_timeout`으로만 제한됩니다.
    fn schedule_secrets(&self, namespace: String) {
        if self.policy.create_secrets.is_empty() {
            return;
        }

        let kube = Arc::clone(&self.kube);
        let policy = Arc::clone(&self.policy);
        let delay = self.settings.secret_delay;
        let budget = self.settings.secret_timeout;

        tracing::info!(
            namespace = %namespace,
            delay_secs = delay.as_secs(),
            "scheduled secrets creation"
        );

        tokio::spawn(async move {
            let work = async {
                tokio::time::sleep(delay).await;
                create_secrets(kube.as_ref(), &namespace, &policy.create_secrets).await;
            };
            if tokio::time::timeout(budget, work).await.is_err() {
                tracing::error!(namespace = %namespace, "secrets creation timed out");
            }
        });
    }
}

/// 시크릿을 모두 생성합니다. 개별 실패는 로그로만 남깁니다.
pub async fn create_secrets(kube: &dyn KubeClient, namespace: &str, secrets: &[CreateSecret]) {
    for secret in secrets {
        let result = match create_secret(kube, namespace, secret).await {
            Ok(()) => "success",
            Err(e) => {
                tracing::error!(
                    namespace = %namespace,
                    secret = %secret.name,
                    error = %e,
                    "Error creating secret {namespace}/{}",
                    secret.name
                );
                "failure"
            }
        };
        counter!(
            SECRETS_PROVISIONED_TOTAL,
            LABEL_NAMESPACE => namespace.to_owned(),
            LABEL_RESULT => result
        )
        .increment(1);
    }
}

/// 시크릿 하나를 다시 만듭니다 (있으면 삭제 후 생성).
pub async fn create_secret(
    kube: &dyn KubeClient,
    namespace: &str,
    secret: &CreateSecret,
) -> Result<(), MutationError> {
    let wrap = |context: &str, e: MutationError| MutationError::ExternalLookup {
        reason: format!("{context}: {e}"),
    };

    let existing = kube
        .get_secret(namespace, &secret.name)
        .await
        .map_err(|e| wrap("error getting secret", e))?;

    if existing.is_some() {
        kube.delete_secret(namespace, &secret.name)
            .await
            .map_err(|e| wrap("error deleting secret", e))?;
    }

    let new_secret = Secret {
        metadata: ObjectMeta {
            name: Some(secret.name.clone()),
            labels: Some(BTreeMap::from([(
                "app".to_owned(),
                SECRET_APP_LABEL.to_owned(),
            )])),
            ..ObjectMeta::default()
        },
        type_: (!secret.secret_type.is_empty()).then(|| secret.secret_type.clone()),
        data: Some(secret.data.clone()),
        ..Secret::default()
    };

    kube.create_secret(namespace, new_secret)
        .await
        .map_err(|e| wrap("error creating secret", e))
}

/// 오브젝트 레이블에 managed 마커를 더한 `add /metadata/labels`
fn inject_labels(
    labels: Option<&BTreeMap<String, String>>,
) -> Result<PatchOperation, MutationError> {
    let mut labels = labels.cloned().unwrap_or_default();
    labels.insert(LABEL_MANAGED.to_owned(), "true".to_owned());
    PatchOperation::add("/metadata/labels", labels)
}
