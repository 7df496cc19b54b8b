//! 컨테이너 단위 평가 컨텍스트
//!
//! 요청마다, 컨테이너마다 하나씩 만들어지는 [`ContainerInfo`]는
//! 조건 평가와 템플릿 렌더링, 패치 생성기가 공유하는 입력입니다.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, Namespace, Pod};
use minijinja::{Value, context};
use serde::Serialize;

use crate::error::MutationError;
use crate::image::ContainerImage;
use crate::rule::Rule;

/// 컨테이너 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContainerType {
    #[serde(rename = "initContainer")]
    InitContainer,
    #[serde(rename = "container")]
    Container,
}

impl ContainerType {
    /// 템플릿에 노출되는 이름
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitContainer => "initContainer",
            Self::Container => "container",
        }
    }

    /// 파드 spec의 필드 이름
    pub fn spec_field(self) -> &'static str {
        match self {
            Self::InitContainer => "initContainers",
            Self::Container => "containers",
        }
    }
}

/// 컨테이너 하나에 대한 평가 컨텍스트
#[derive(Debug, Clone)]
pub struct ContainerInfo<'a> {
    pub pod: &'a Pod,
    pub namespace: &'a Namespace,
    pub container: &'a Container,
    pub container_type: ContainerType,
    /// 같은 종류 컨테이너 목록 내 위치
    pub order: usize,
    pub image: ContainerImage,
    /// 첫 번째 ownerReference
    pub owner_kind: String,
    pub owner_name: String,
    /// 조건이 매칭된 룰 (정의 순서)
    pub selected_rules: Vec<&'a Rule>,
    base: Value,
}

/// 템플릿에 노출되는 컨텍스트 (SelectedRules 제외)
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TemplateContext<'a> {
    owner_kind: &'a str,
    owner_name: &'a str,
    container_name: &'a str,
    container_type: ContainerType,
    namespace: &'a str,
    namespace_annotations: &'a BTreeMap<String, String>,
    namespace_labels: &'a BTreeMap<String, String>,
    image: &'a ContainerImage,
    pod_annotations: &'a BTreeMap<String, String>,
    pod_labels: &'a BTreeMap<String, String>,
    pod_container: PodContainerContext<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PodContainerContext<'a> {
    pod: &'a Pod,
    namespace: &'a Namespace,
    order: usize,
    #[serde(rename = "Type")]
    container_type: ContainerType,
    container: &'a Container,
    #[serde(rename = "PodPVCNames")]
    pod_pvc_names: Vec<String>,
    owner_kind: &'a str,
    container_path: String,
}

static EMPTY_MAP: BTreeMap<String, String> = BTreeMap::new();

impl<'a> ContainerInfo<'a> {
    /// 파드의 모든 컨테이너에 대한 컨텍스트를 만듭니다.
    ///
    /// 순서는 init 컨테이너(spec 순서) 다음 일반 컨테이너(spec 순서)입니다.
    pub fn from_pod(namespace: &'a Namespace, pod: &'a Pod) -> Result<Vec<Self>, MutationError> {
        let Some(spec) = pod.spec.as_ref() else {
            return Ok(Vec::new());
        };

        let init = spec
            .init_containers
            .iter()
            .flatten()
            .enumerate()
            .map(|(order, c)| (ContainerType::InitContainer, order, c));
        let regular = spec
            .containers
            .iter()
            .enumerate()
            .map(|(order, c)| (ContainerType::Container, order, c));

        init.chain(regular)
            .map(|(container_type, order, container)| {
                Self::new(namespace, pod, container, container_type, order)
            })
            .collect()
    }

    /// 단일 컨테이너 컨텍스트를 만듭니다.
    pub fn new(
        namespace: &'a Namespace,
        pod: &'a Pod,
        container: &'a Container,
        container_type: ContainerType,
        order: usize,
    ) -> Result<Self, MutationError> {
        let image = ContainerImage::parse(container.image.as_deref().unwrap_or_default())?;

        let (owner_kind, owner_name) = pod
            .metadata
            .owner_references
            .as_ref()
            .and_then(|refs| refs.first())
            .map(|r| (r.kind.clone(), r.name.clone()))
            .unwrap_or_default();

        let container_path = format!("/spec/{}/{order}", container_type.spec_field());

        let ctx = TemplateContext {
            owner_kind: &owner_kind,
            owner_name: &owner_name,
            container_name: &container.name,
            container_type,
            namespace: namespace.metadata.name.as_deref().unwrap_or_default(),
            namespace_annotations: namespace.metadata.annotations.as_ref().unwrap_or(&EMPTY_MAP),
            namespace_labels: namespace.metadata.labels.as_ref().unwrap_or(&EMPTY_MAP),
            image: &image,
            pod_annotations: pod.metadata.annotations.as_ref().unwrap_or(&EMPTY_MAP),
            pod_labels: pod.metadata.labels.as_ref().unwrap_or(&EMPTY_MAP),
            pod_container: PodContainerContext {
                pod,
                namespace,
                order,
                container_type,
                container,
                pod_pvc_names: pod_pvc_names(pod),
                owner_kind: &owner_kind,
                container_path,
            },
        };
        let base = Value::from_serialize(&ctx);

        Ok(Self {
            pod,
            namespace,
            container,
            container_type,
            order,
            image,
            owner_kind,
            owner_name,
            selected_rules: Vec::new(),
            base,
        })
    }

    /// 컨테이너 이름
    pub fn name(&self) -> &str {
        &self.container.name
    }

    /// 컨테이너 JSON 포인터 (`/spec/containers/0`)
    pub fn container_path(&self) -> String {
        format!("/spec/{}/{}", self.container_type.spec_field(), self.order)
    }

    /// 파드 어노테이션, 없으면 네임스페이스 어노테이션
    pub fn get_pod_annotation(&self, key: &str) -> Option<&'a str> {
        self.pod
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .or_else(|| {
                self.namespace
                    .metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(key))
            })
            .map(String::as_str)
    }

    /// 어노테이션의 쉼표 목록에 이 컨테이너가 있으면 `true`
    pub fn listed_in_annotation(&self, key: &str) -> bool {
        self.get_pod_annotation(key)
            .is_some_and(|value| value.split(',').any(|name| name == self.name()))
    }

    /// 조건을 만족하는 첫 번째 선택 룰
    ///
    /// 배타적 기능(NonRoot, Resources, ImageHost, Lifecycle, TopologySpread)은
    /// 첫 번째 룰만 적용하고 이후 매칭은 버립니다.
    pub fn first_rule(&self, pred: impl Fn(&Rule) -> bool) -> Option<&'a Rule> {
        self.selected_rules.iter().copied().find(|rule| pred(rule))
    }

    /// 템플릿 렌더링에 사용하는 값
    pub fn template_value(&self) -> Value {
        context! {
            SelectedRules => Value::from_serialize(&self.selected_rules),
            ..self.base.clone()
        }
    }

    /// 파드 레이블 (없으면 빈 맵)
    pub fn pod_labels(&self) -> &'a BTreeMap<String, String> {
        self.pod.metadata.labels.as_ref().unwrap_or(&EMPTY_MAP)
    }
}

/// 파드가 참조하는 PVC 이름 (중복 제거, 등장 순서)
fn pod_pvc_names(pod: &Pod) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let volumes = pod.spec.as_ref().and_then(|s| s.volumes.as_ref());

    for claim in volumes
        .into_iter()
        .flatten()
        .filter_map(|v| v.persistent_volume_claim.as_ref())
    {
        if !names.contains(&claim.claim_name) {
            names.push(claim.claim_name.clone());
        }
    }

    names
}
