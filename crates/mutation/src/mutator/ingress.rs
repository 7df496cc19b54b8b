//! 인그레스 호스트 접미사 치환
//!
//! `.`으로 끝나는 호스트(예: `api.`)에 접미사를 붙여 완성합니다.
//! 접미사는 인그레스의 `ingressSuffix` 어노테이션이 있으면 그 값을,
//! 없으면 설정의 기본값을 사용합니다.

use k8s_openapi::api::networking::v1::Ingress;

use pac_core::types::ANNOTATION_INGRESS_SUFFIX;

use crate::error::MutationError;
use crate::patch::{PatchOperation, inject_annotation};

use super::{Mutator, Outcome};

impl Mutator {
    /// 인그레스 변경 패치를 계산합니다.
    pub fn mutate_ingress(
        &self,
        namespace: &str,
        ingress: Ingress,
    ) -> Result<Outcome, MutationError> {
        let name = ingress.metadata.name.clone().unwrap_or_default();

        if let Some(skipped) = Self::check_ignored(
            ingress.metadata.annotations.as_ref(),
            namespace,
            format_args!("ingress {name}"),
        ) {
            return Ok(skipped);
        }

        let suffix = self.ingress_suffix(&ingress);
        let mut ops = ingress_host_patches(&ingress, suffix)?;
        ops.push(inject_annotation(ingress.metadata.annotations.as_ref())?);

        Ok(Outcome::Patched(ops))
    }

    /// 유효 접미사. 빈 값의 어노테이션도 설정값보다 우선합니다.
    fn ingress_suffix<'a>(&'a self, ingress: &'a Ingress) -> &'a str {
        ingress
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(ANNOTATION_INGRESS_SUFFIX))
            .map_or(self.settings.ingress_suffix.as_str(), String::as_str)
    }
}

/// 규칙 호스트와 TLS 호스트의 `replace` 연산 목록
pub fn ingress_host_patches(
    ingress: &Ingress,
    suffix: &str,
) -> Result<Vec<PatchOperation>, MutationError> {
    let mut ops = Vec::new();
    if suffix.is_empty() {
        return Ok(ops);
    }

    let Some(spec) = ingress.spec.as_ref() else {
        return Ok(ops);
    };

    for (rule_id, rule) in spec.rules.iter().flatten().enumerate() {
        if let Some(host) = rule.host.as_deref().filter(|h| h.ends_with('.')) {
            ops.push(PatchOperation::replace(
                format!("/spec/rules/{rule_id}/host"),
                format!("{host}{suffix}"),
            )?);
        }
    }

    for (tls_id, tls) in spec.tls.iter().flatten().enumerate() {
        for (host_id, host) in tls.hosts.iter().flatten().enumerate() {
            if host.ends_with('.') {
                ops.push(PatchOperation::replace(
                    format!("/spec/tls/{tls_id}/hosts/{host_id}"),
                    format!("{host}{suffix}"),
                )?);
            }
        }
    }

    Ok(ops)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::MockKubeClient;
    use crate::mutator::MutatorSettings;
    use crate::patch::test_support::engine;
    use crate::rule::MutationPolicy;
    use serde_json::json;

    fn mutator(suffix: &str) -> Mutator {
        Mutator::new(
            Arc::new(MutationPolicy::default()),
            Arc::new(engine()),
            Arc::new(MockKubeClient::new()),
            MutatorSettings {
                ingress_suffix: suffix.to_owned(),
                ..MutatorSettings::default()
            },
        )
    }

    fn ingress(value: serde_json::Value) -> Ingress {
        serde_json::from_value(value).unwrap()
    }

    fn web_ingress(annotations: serde_json::Value) -> Ingress {
        ingress(json!({
            "metadata": { "name": "web", "annotations": annotations },
            "spec": {
                "rules": [ { "host": "api." }, { "host": "static.example.com" } ],
                "tls": [ { "hosts": [ "static.example.com", "api." ] } ]
            }
        }))
    }

    #[test]
    fn trailing_dot_hosts_get_default_suffix() {
        let outcome = mutator("prod.example.com")
            .mutate_ingress("prod", web_ingress(json!({})))
            .unwrap();
        let Outcome::Patched(ops) = outcome else {
            panic!("expected patch");
        };

        let expected = [
            PatchOperation::replace("/spec/rules/0/host", "api.prod.example.com").unwrap(),
            PatchOperation::replace("/spec/tls/0/hosts/1", "api.prod.example.com").unwrap(),
        ];
        assert_eq!(ops[..2], expected);
        assert_eq!(ops[2].path, "/metadata/annotations");
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn annotation_suffix_overrides_default() {
        let outcome = mutator("prod.example.com")
            .mutate_ingress(
                "prod",
                web_ingress(json!({ "pod-admission-controller/ingressSuffix": "dev.local" })),
            )
            .unwrap();
        let Outcome::Patched(ops) = outcome else {
            panic!("expected patch");
        };
        assert_eq!(ops[0].value, Some(json!("api.dev.local")));
    }

    #[test]
    fn empty_suffix_only_injects_annotation() {
        let outcome = mutator("prod.example.com")
            .mutate_ingress(
                "prod",
                web_ingress(json!({ "pod-admission-controller/ingressSuffix": "" })),
            )
            .unwrap();
        let Outcome::Patched(ops) = outcome else {
            panic!("expected patch");
        };
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path, "/metadata/annotations");
    }

    #[test]
    fn ignored_ingress_is_skipped() {
        let outcome = mutator("prod.example.com")
            .mutate_ingress(
                "prod",
                web_ingress(json!({ "pod-admission-controller/ignore": "true" })),
            )
            .unwrap();
        assert!(matches!(outcome, Outcome::Skipped(w) if w.ends_with(", ingress web")));
    }
}
