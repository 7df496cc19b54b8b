//! 컨테이너 lifecycle 훅 추가 (첫 번째 룰만 적용)

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::template::TemplateEngine;

use super::{PatchGenerator, PatchOperation};

pub struct LifecycleGenerator;

impl PatchGenerator for LifecycleGenerator {
    fn name(&self) -> &'static str {
        "lifecycle"
    }

    fn create(
        &self,
        info: &ContainerInfo<'_>,
        _engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let Some(rule) = info.first_rule(|r| r.add_lifecycle.enabled) else {
            return Ok(Vec::new());
        };

        rule.log(info.name(), format_args!("add lifecycle"));

        Ok(vec![PatchOperation::add(
            format!("{}/lifecycle", info.container_path()),
            &rule.add_lifecycle.lifecycle,
        )?])
    }
}
