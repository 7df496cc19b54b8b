//! 파드 tolerations 추가

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::template::TemplateEngine;

use super::{PatchGenerator, PatchOperation};

pub struct TolerationsGenerator;

impl PatchGenerator for TolerationsGenerator {
    fn name(&self) -> &'static str {
        "tolerations"
    }

    fn create(
        &self,
        info: &ContainerInfo<'_>,
        _engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let tolerations: Vec<_> = info
            .selected_rules
            .iter()
            .flat_map(|rule| rule.tolerations.iter())
            .collect();

        if tolerations.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![PatchOperation::add("/spec/tolerations", tolerations)?])
    }
}
