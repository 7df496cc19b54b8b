//! 패치 생성기 -- 선택된 룰과 컨테이너 상태로 JSON Patch 연산을 만듭니다.
//!
//! 생성기는 고정된 순서로 실행됩니다:
//! env, nonroot, resources, imagehost, tolerations, pullsecrets,
//! lifecycle, topologyspread, custompatch.
//!
//! 파드(없으면 네임스페이스)에 `pod-admission-controller/ignore-<name>` 어노테이션이
//! `*`이거나 컨테이너 이름을 포함하면 해당 생성기를 건너뜁니다.

pub mod custom;
pub mod env;
pub mod imagehost;
pub mod lifecycle;
pub mod nonroot;
pub mod pullsecrets;
pub mod resources;
pub mod tolerations;
pub mod topology;

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pac_core::types::{ANNOTATION_INJECTED, generator_ignore_annotation};

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::template::TemplateEngine;

pub use custom::CustomPatchGenerator;
pub use env::EnvGenerator;
pub use imagehost::ImageHostGenerator;
pub use lifecycle::LifecycleGenerator;
pub use nonroot::NonRootGenerator;
pub use pullsecrets::PullSecretsGenerator;
pub use resources::ResourcesGenerator;
pub use tolerations::TolerationsGenerator;
pub use topology::TopologySpreadGenerator;

/// JSON Patch 연산 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

/// JSON Patch 연산 하나
///
/// 중복 판단은 (op, path, value) 전체의 깊은 비교입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: impl Serialize) -> Result<Self, MutationError> {
        Ok(Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(serde_json::to_value(value)?),
        })
    }

    pub fn replace(path: impl Into<String>, value: impl Serialize) -> Result<Self, MutationError> {
        Ok(Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(serde_json::to_value(value)?),
        })
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }
}

impl fmt::Display for PatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(e) => write!(f, "{e}"),
        }
    }
}

/// 중복 없는 순서 보존 패치 목록
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchSet {
    ops: Vec<PatchOperation>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 같은 연산이 없을 때만 추가합니다. 추가되면 `true`
    pub fn push(&mut self, op: PatchOperation) -> bool {
        if self.ops.contains(&op) {
            tracing::debug!(patch = %op, "patch already exists");
            return false;
        }
        self.ops.push(op);
        true
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = PatchOperation>) {
        for op in ops {
            self.push(op);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_vec(self) -> Vec<PatchOperation> {
        self.ops
    }
}

/// 패치 생성기 trait
///
/// 새로운 변경 기능을 추가하려면 이 trait을 구현하고
/// [`default_generators`]에 등록합니다.
pub trait PatchGenerator: Send + Sync {
    /// 생성기 이름 (`ignore-<name>` 어노테이션에 사용)
    fn name(&self) -> &'static str;

    /// deprecated 컨테이너 목록 어노테이션 (예: `ignoreEnv`)
    fn legacy_ignore_annotation(&self) -> Option<&'static str> {
        None
    }

    /// 컨테이너에 대한 패치 연산을 생성합니다.
    fn create(
        &self,
        info: &ContainerInfo<'_>,
        engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError>;
}

/// 고정 순서의 기본 생성기 목록
pub fn default_generators() -> Vec<Box<dyn PatchGenerator>> {
    vec![
        Box::new(EnvGenerator),
        Box::new(NonRootGenerator),
        Box::new(ResourcesGenerator),
        Box::new(ImageHostGenerator),
        Box::new(TolerationsGenerator),
        Box::new(PullSecretsGenerator),
        Box::new(LifecycleGenerator),
        Box::new(TopologySpreadGenerator),
        Box::new(CustomPatchGenerator),
    ]
}

/// 이 컨테이너에서 생성기를 건너뛰어야 하는지 판단합니다.
pub fn is_ignored(generator: &dyn PatchGenerator, info: &ContainerInfo<'_>) -> bool {
    let key = generator_ignore_annotation(generator.name());
    if info.get_pod_annotation(&key) == Some("*") || info.listed_in_annotation(&key) {
        return true;
    }

    generator
        .legacy_ignore_annotation()
        .is_some_and(|key| info.listed_in_annotation(key))
}

/// 생성기를 순서대로 실행해 컨테이너 하나의 패치를 만듭니다.
pub fn create_container_patches(
    generators: &[Box<dyn PatchGenerator>],
    info: &ContainerInfo<'_>,
    engine: &TemplateEngine,
) -> Result<Vec<PatchOperation>, MutationError> {
    let mut result = Vec::new();

    for generator in generators {
        if is_ignored(generator.as_ref(), info) {
            tracing::debug!(
                generator = generator.name(),
                container = %info.name(),
                "generator ignored by annotation"
            );
            continue;
        }

        let ops = generator
            .create(info, engine)
            .map_err(|e| e.in_generator(generator.name()))?;
        result.extend(ops);
    }

    Ok(result)
}

/// 오브젝트 어노테이션에 injected 마커를 더한 `add /metadata/annotations`
pub fn inject_annotation(
    annotations: Option<&BTreeMap<String, String>>,
) -> Result<PatchOperation, MutationError> {
    let mut annotations = annotations.cloned().unwrap_or_default();
    annotations.insert(ANNOTATION_INJECTED.to_owned(), "true".to_owned());
    PatchOperation::add("/metadata/annotations", annotations)
}

/// 값을 JSON으로 직렬화해 템플릿으로 렌더링한 뒤 다시 역직렬화합니다.
pub(crate) fn render_json<T>(
    value: &T,
    info: &ContainerInfo<'_>,
    engine: &TemplateEngine,
) -> Result<T, MutationError>
where
    T: Serialize + DeserializeOwned,
{
    let json = serde_json::to_string(value)?;
    let rendered = engine.render(&json, &info.template_value())?;
    Ok(serde_json::from_str(&rendered)?)
}
