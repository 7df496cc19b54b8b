//! 이미지 레지스트리 호스트 치환

use regex::Regex;

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::template::TemplateEngine;

use super::{PatchGenerator, PatchOperation};

pub struct ImageHostGenerator;

impl PatchGenerator for ImageHostGenerator {
    fn name(&self) -> &'static str {
        "imagehost"
    }

    fn create(
        &self,
        info: &ContainerInfo<'_>,
        engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let Some(rule) = info.first_rule(|r| r.replace_container_image_host.enabled) else {
            return Ok(Vec::new());
        };
        let settings = &rule.replace_container_image_host;

        let image = info.image.qualified_name();
        let from = if settings.from.is_empty() {
            regex::escape(&info.image.domain)
        } else {
            settings.from.clone()
        };

        let from_regex = Regex::new(&from).map_err(|e| MutationError::PatchGenerator {
            generator: self.name().to_owned(),
            reason: format!("invalid regexp '{from}': {e}"),
        })?;
        let to = engine.render(&settings.to, &info.template_value())?;

        let result = from_regex.replace_all(&image, to.as_str());
        rule.log(
            info.name(),
            format_args!("replace image host image={image} from={from} to={to} result={result}"),
        );

        Ok(vec![PatchOperation::replace(
            format!("{}/image", info.container_path()),
            result.as_ref(),
        )?])
    }
}
