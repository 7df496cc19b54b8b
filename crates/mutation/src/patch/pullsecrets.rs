//! 이미지 pull secret 추가
//!
//! 파드의 기존 목록 뒤에 선택된 룰의 목록을 이어 붙여 통째로 교체합니다.

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::template::TemplateEngine;

use super::{PatchGenerator, PatchOperation};

pub struct PullSecretsGenerator;

impl PatchGenerator for PullSecretsGenerator {
    fn name(&self) -> &'static str {
        "pullsecrets"
    }

    fn create(
        &self,
        info: &ContainerInfo<'_>,
        _engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let existing = info
            .pod
            .spec
            .as_ref()
            .and_then(|s| s.image_pull_secrets.as_deref())
            .unwrap_or_default();

        let secrets: Vec<_> = existing
            .iter()
            .chain(
                info.selected_rules
                    .iter()
                    .flat_map(|rule| rule.image_pull_secrets.iter()),
            )
            .collect();

        if secrets.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![PatchOperation::add("/spec/imagePullSecrets", secrets)?])
    }
}
