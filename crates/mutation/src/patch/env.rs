//! 환경변수 주입
//!
//! 선택된 모든 룰의 `Env`를 순서대로 합치고 각 값을 템플릿으로 렌더링합니다.
//! 컨테이너에 이미 있는 이름은 건드리지 않습니다.

use std::collections::HashSet;

use k8s_openapi::api::core::v1::EnvVar;
use pac_core::types::ANNOTATION_IGNORE_ENV;

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::template::TemplateEngine;

use super::{PatchGenerator, PatchOperation};

pub struct EnvGenerator;

impl EnvGenerator {
    fn format_env(
        info: &ContainerInfo<'_>,
        engine: &TemplateEngine,
    ) -> Result<Vec<EnvVar>, MutationError> {
        let ctx = info.template_value();
        let mut formatted = Vec::new();

        for rule in &info.selected_rules {
            for var in &rule.env {
                let mut item = var.clone();
                let value = engine.render(var.value.as_deref().unwrap_or_default(), &ctx)?;
                rule.log(info.name(), format_args!("env {}={value}", var.name));
                item.value = (!value.is_empty()).then_some(value);
                formatted.push(item);
            }
        }

        Ok(formatted)
    }
}

impl PatchGenerator for EnvGenerator {
    fn name(&self) -> &'static str {
        "env"
    }

    fn legacy_ignore_annotation(&self) -> Option<&'static str> {
        Some(ANNOTATION_IGNORE_ENV)
    }

    fn create(
        &self,
        info: &ContainerInfo<'_>,
        engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let formatted = Self::format_env(info, engine)?;
        if formatted.is_empty() {
            return Ok(Vec::new());
        }

        let env_path = format!("{}/env", info.container_path());
        let existing = info.container.env.as_deref().unwrap_or_default();

        if existing.is_empty() {
            return Ok(vec![PatchOperation::add(env_path, formatted)?]);
        }

        let present: HashSet<&str> = existing.iter().map(|e| e.name.as_str()).collect();
        formatted
            .into_iter()
            .filter(|var| !present.contains(var.name.as_str()))
            .map(|var| PatchOperation::add(format!("{env_path}/-"), var))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{namespace, pod};
    use crate::patch::PatchOp;
    use crate::patch::test_support::engine;
    use crate::rule::Rule;
    use serde_json::json;

    fn env_rule(vars: serde_json::Value) -> Rule {
        Rule {
            name: "env".to_owned(),
            env: serde_json::from_value(vars).unwrap(),
            ..Rule::default()
        }
    }

    #[test]
    fn whole_list_when_container_has_no_env() {
        let ns = namespace("prod", json!({}));
        let p = pod(json!({
            "metadata": { "name": "p" },
            "spec": { "containers": [ { "name": "app", "image": "nginx" } ] }
        }));
        let rule = env_rule(json!([{ "name": "TEST1", "value": "{{ .ContainerName }}" }]));
        let mut infos = ContainerInfo::from_pod(&ns, &p).unwrap();
        infos[0].selected_rules.push(&rule);

        let ops = EnvGenerator.create(&infos[0], &engine()).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, PatchOp::Add);
        assert_eq!(ops[0].path, "/spec/containers/0/env");
        assert_eq!(ops[0].value, Some(json!([{ "name": "TEST1", "value": "app" }])));
    }

    #[test]
    fn existing_names_win() {
        let ns = namespace("prod", json!({}));
        let p = pod(json!({
            "metadata": { "name": "p" },
            "spec": { "containers": [ {
                "name": "app",
                "image": "nginx",
                "env": [ { "name": "KEEP", "value": "mine" } ]
            } ] }
        }));
        let first = env_rule(json!([
            { "name": "KEEP", "value": "theirs" },
            { "name": "NEW", "value": "{{ .Namespace }}" }
        ]));
        let second = env_rule(json!([{ "name": "NEW", "value": "again" }]));
        let mut infos = ContainerInfo::from_pod(&ns, &p).unwrap();
        infos[0].selected_rules.extend([&first, &second]);

        let ops = EnvGenerator.create(&infos[0], &engine()).unwrap();
        // 룰 간 중복 제거는 하지 않음
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|op| op.path == "/spec/containers/0/env/-"));
        assert_eq!(ops[0].value, Some(json!({ "name": "NEW", "value": "prod" })));
        assert_eq!(ops[1].value, Some(json!({ "name": "NEW", "value": "again" })));
    }

    #[test]
    fn value_from_is_preserved() {
        let ns = namespace("prod", json!({}));
        let p = pod(json!({
            "metadata": { "name": "p" },
            "spec": { "containers": [ { "name": "app", "image": "nginx" } ] }
        }));
        let rule = env_rule(json!([{
            "name": "NODE",
            "valueFrom": { "fieldRef": { "fieldPath": "spec.nodeName" } }
        }]));
        let mut infos = ContainerInfo::from_pod(&ns, &p).unwrap();
        infos[0].selected_rules.push(&rule);

        let ops = EnvGenerator.create(&infos[0], &engine()).unwrap();
        assert_eq!(
            ops[0].value,
            Some(json!([{ "name": "NODE", "valueFrom": { "fieldRef": { "fieldPath": "spec.nodeName" } } }]))
        );
    }

    #[test]
    fn no_env_rules_no_patch() {
        let ns = namespace("prod", json!({}));
        let p = pod(json!({
            "metadata": { "name": "p" },
            "spec": { "containers": [ { "name": "app", "image": "nginx" } ] }
        }));
        let rule = Rule::default();
        let mut infos = ContainerInfo::from_pod(&ns, &p).unwrap();
        infos[0].selected_rules.push(&rule);

        assert!(EnvGenerator.create(&infos[0], &engine()).unwrap().is_empty());
    }
}
