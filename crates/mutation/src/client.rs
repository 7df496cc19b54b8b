//! Kubernetes API 협력자
//!
//! 변경 엔진이 필요로 하는 API 호출(네임스페이스/파드 조회, 시크릿 CRUD)을
//! [`KubeClient`] trait 뒤로 숨깁니다. 운영 환경에서는 [`KubeApiClient`]를,
//! 테스트에서는 목(mock) 구현을 주입합니다.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Pod, Secret};
use kube::Client;
use kube::api::{Api, DeleteParams, PostParams};

#[cfg(test)]
use mockall::automock;

use crate::error::MutationError;

/// 변경 엔진이 사용하는 Kubernetes API 호출
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// 이름으로 네임스페이스를 조회합니다.
    async fn get_namespace(&self, name: &str) -> Result<Namespace, MutationError>;

    /// 파드를 조회합니다.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, MutationError>;

    /// 시크릿을 조회합니다. 없으면 `None`.
    async fn get_secret(&self, namespace: &str, name: &str)
    -> Result<Option<Secret>, MutationError>;

    /// 시크릿을 삭제합니다.
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), MutationError>;

    /// 시크릿을 생성합니다.
    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<(), MutationError>;
}

/// `kube::Client` 기반 구현
#[derive(Clone)]
pub struct KubeApiClient {
    client: Client,
}

impl KubeApiClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// in-cluster 설정 또는 kubeconfig로 클라이언트를 만듭니다.
    pub async fn try_default() -> Result<Self, MutationError> {
        let client = Client::try_default().await.map_err(lookup_err)?;
        Ok(Self::new(client))
    }
}

fn lookup_err(err: kube::Error) -> MutationError {
    MutationError::ExternalLookup {
        reason: err.to_string(),
    }
}

#[async_trait]
impl KubeClient for KubeApiClient {
    async fn get_namespace(&self, name: &str) -> Result<Namespace, MutationError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.get(name).await {
            Ok(ns) => Ok(ns),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(MutationError::ExternalLookup {
                reason: format!("namespace not found: {name}"),
            }),
            Err(e) => Err(lookup_err(e)),
        }
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, MutationError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(lookup_err)
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, MutationError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(secret) => Ok(Some(secret)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(lookup_err(e)),
        }
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), MutationError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(lookup_err(e)),
        }
    }

    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<(), MutationError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), &secret)
            .await
            .map_err(lookup_err)?;
        Ok(())
    }
}
