//! 룰에 정의된 임의 JSON Patch 연산
//!
//! 각 연산을 JSON으로 직렬화해 템플릿으로 렌더링합니다.
//! 존재하지 않는 필드에 대한 `remove`는 API 서버에서 실패하므로,
//! 알려진 경로(affinity, nodeSelector, 컨테이너 probe)에 한해 걸러냅니다.

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::template::TemplateEngine;

use super::{PatchGenerator, PatchOp, PatchOperation, render_json};

pub struct CustomPatchGenerator;

impl CustomPatchGenerator {
    /// 대상이 없는 알려진 `remove`인지
    fn is_noop_remove(op: &PatchOperation, info: &ContainerInfo<'_>) -> bool {
        if op.op != PatchOp::Remove {
            return false;
        }

        let spec = info.pod.spec.as_ref();
        let path = op.path.to_lowercase();
        let container_path = info.container_path().to_lowercase();

        if path == "/spec/affinity" {
            return spec.and_then(|s| s.affinity.as_ref()).is_none();
        }
        if path == "/spec/nodeselector" {
            return spec
                .and_then(|s| s.node_selector.as_ref())
                .is_none_or(|m| m.is_empty());
        }
        if path == format!("{container_path}/readinessprobe") {
            return info.container.readiness_probe.is_none();
        }
        if path == format!("{container_path}/livenessprobe") {
            return info.container.liveness_probe.is_none();
        }

        false
    }
}

impl PatchGenerator for CustomPatchGenerator {
    fn name(&self) -> &'static str {
        "custompatch"
    }

    fn create(
        &self,
        info: &ContainerInfo<'_>,
        engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let mut result = Vec::new();

        for rule in &info.selected_rules {
            for custom in &rule.custom_patches {
                let op = render_json(custom, info, engine)?;
                if Self::is_noop_remove(&op, info) {
                    rule.log(info.name(), format_args!("skip no-op patch {op}"));
                    continue;
                }
                result.push(op);
            }
        }

        Ok(result)
    }
}
