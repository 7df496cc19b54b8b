//! 파드 패치 파이프라인
//!
//! 컨테이너마다 룰을 선택하고 생성기를 순서대로 실행한 뒤,
//! 파드 전체의 연산을 중복 없이 하나의 목록으로 모읍니다.

use k8s_openapi::api::core::v1::{Namespace, Pod};

use crate::condition::select_rules;
use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::patch::{
    PatchGenerator, PatchOperation, PatchSet, create_container_patches, default_generators,
    inject_annotation,
};
use crate::rule::Rule;
use crate::template::TemplateEngine;

/// 고정 순서 생성기 목록을 가진 파이프라인
pub struct PatchPipeline {
    generators: Vec<Box<dyn PatchGenerator>>,
}

impl Default for PatchPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchPipeline {
    pub fn new() -> Self {
        Self {
            generators: default_generators(),
        }
    }

    /// 파드 전체의 패치를 생성합니다.
    ///
    /// 결과가 비어 있지 않으면 마지막에 injected 어노테이션 연산을 붙입니다.
    /// 빈 결과는 변경할 것이 없다는 뜻입니다.
    pub fn run(
        &self,
        namespace: &Namespace,
        pod: &Pod,
        rules: &[Rule],
        engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let mut patches = PatchSet::new();

        for mut info in ContainerInfo::from_pod(namespace, pod)? {
            tracing::debug!(
                container = %info.name(),
                image = %info.image.name,
                domain = %info.image.domain,
                path = %info.image.path,
                "evaluating container"
            );

            info.selected_rules = select_rules(&info, rules, engine)?;
            if info.selected_rules.is_empty() {
                continue;
            }

            patches.extend(create_container_patches(&self.generators, &info, engine)?);
        }

        if patches.is_empty() {
            return Ok(Vec::new());
        }

        let mut ops = patches.into_vec();
        ops.push(inject_annotation(pod.metadata.annotations.as_ref())?);
        Ok(ops)
    }
}
