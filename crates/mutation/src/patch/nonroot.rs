//! 비루트 실행 강제

use k8s_openapi::api::core::v1::{Capabilities, SecurityContext};
use pac_core::types::ANNOTATION_IGNORE_RUN_AS_NON_ROOT;

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::template::TemplateEngine;

use super::{PatchGenerator, PatchOperation};

pub struct NonRootGenerator;

impl PatchGenerator for NonRootGenerator {
    fn name(&self) -> &'static str {
        "nonroot"
    }

    fn legacy_ignore_annotation(&self) -> Option<&'static str> {
        Some(ANNOTATION_IGNORE_RUN_AS_NON_ROOT)
    }

    fn create(
        &self,
        info: &ContainerInfo<'_>,
        _engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let Some(rule) = info.first_rule(|r| r.run_as_non_root.enabled) else {
            return Ok(Vec::new());
        };

        let pod_run_as_user = info
            .pod
            .spec
            .as_ref()
            .and_then(|s| s.security_context.as_ref())
            .and_then(|sc| sc.run_as_user);

        let mut security_context: SecurityContext =
            info.container.security_context.clone().unwrap_or_default();

        let mut run_as_user = security_context.run_as_user.or(pod_run_as_user);

        let replace = &rule.run_as_non_root.replace_user;
        if replace.enabled && run_as_user == Some(replace.from_user) {
            run_as_user = Some(replace.to_user);
        }

        rule.log(
            info.name(),
            format_args!("run as non root, runAsUser={run_as_user:?}"),
        );

        if run_as_user.is_some() {
            security_context.run_as_user = run_as_user;
        }
        security_context.run_as_non_root = Some(true);
        security_context.privileged = Some(false);
        security_context.allow_privilege_escalation = Some(false);

        let capabilities = security_context
            .capabilities
            .get_or_insert_with(Capabilities::default);
        capabilities.drop = Some(vec!["ALL".to_owned()]);

        Ok(vec![PatchOperation::add(
            format!("{}/securityContext", info.container_path()),
            security_context,
        )?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::{namespace, pod};
    use crate::patch::test_support::engine;
    use crate::rule::{ReplaceUser, Rule, RunAsNonRoot};
    use serde_json::json;

    fn rule(replace_user: ReplaceUser) -> Rule {
        Rule {
            name: "nonroot".to_owned(),
            run_as_non_root: RunAsNonRoot {
                enabled: true,
                replace_user,
            },
            ..Rule::default()
        }
    }

    fn run(pod_json: serde_json::Value, rules: &[&Rule]) -> Vec<PatchOperation> {
        let ns = namespace("prod", json!({}));
        let p = pod(pod_json);
        let mut infos = ContainerInfo::from_pod(&ns, &p).unwrap();
        infos[0].selected_rules.extend(rules.iter().copied());
        NonRootGenerator.create(&infos[0], &engine()).unwrap()
    }

    #[test]
    fn forces_restricted_context_and_keeps_added_caps() {
        let r = rule(ReplaceUser::default());
        let ops = run(
            json!({
                "metadata": { "name": "p" },
                "spec": { "containers": [ {
                    "name": "app",
                    "image": "nginx",
                    "securityContext": { "capabilities": { "add": ["NET_BIND_SERVICE"] } }
                } ] }
            }),
            &[&r],
        );

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path, "/spec/containers/0/securityContext");
        assert_eq!(
            ops[0].value,
            Some(json!({
                "allowPrivilegeEscalation": false,
                "capabilities": { "add": ["NET_BIND_SERVICE"], "drop": ["ALL"] },
                "privileged": false,
                "runAsNonRoot": true
            }))
        );
    }

    #[test]
    fn container_user_overrides_pod_user_then_replaced() {
        let r = rule(ReplaceUser {
            enabled: true,
            from_user: 0,
            to_user: 1000,
        });
        let ops = run(
            json!({
                "metadata": { "name": "p" },
                "spec": {
                    "securityContext": { "runAsUser": 5 },
                    "containers": [ {
                        "name": "app",
                        "image": "nginx",
                        "securityContext": { "runAsUser": 0 }
                    } ]
                }
            }),
            &[&r],
        );
        assert_eq!(ops[0].value.as_ref().unwrap()["runAsUser"], json!(1000));
    }

    #[test]
    fn pod_user_is_copied_to_container() {
        let r = rule(ReplaceUser::default());
        let ops = run(
            json!({
                "metadata": { "name": "p" },
                "spec": {
                    "securityContext": { "runAsUser": 33 },
                    "containers": [ { "name": "app", "image": "nginx" } ]
                }
            }),
            &[&r],
        );
        assert_eq!(ops[0].value.as_ref().unwrap()["runAsUser"], json!(33));
    }

    #[test]
    fn only_first_enabled_rule_applies() {
        let disabled = Rule::default();
        let first = rule(ReplaceUser {
            enabled: true,
            from_user: 0,
            to_user: 1,
        });
        let second = rule(ReplaceUser {
            enabled: true,
            from_user: 0,
            to_user: 2,
        });
        let ops = run(
            json!({
                "metadata": { "name": "p" },
                "spec": { "containers": [ {
                    "name": "app", "image": "nginx", "securityContext": { "runAsUser": 0 }
                } ] }
            }),
            &[&disabled, &first, &second],
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].value.as_ref().unwrap()["runAsUser"], json!(1));
    }
}
