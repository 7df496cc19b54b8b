//! 파드 topologySpreadConstraints 추가
//!
//! 제약 조건 전체를 JSON으로 직렬화해 템플릿으로 렌더링한 뒤,
//! labelSelector는 파드 레이블(컨트롤러가 붙이는 레이블 제외)로 고정합니다.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::TopologySpreadConstraint;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::template::TemplateEngine;

use super::{PatchGenerator, PatchOperation, render_json};

/// 파드마다 값이 달라 셀렉터에 넣으면 안 되는 레이블
const POD_LABELS_IGNORE: [&str; 4] = [
    "pod-template-hash",
    "controller-revision-hash",
    "statefulset.kubernetes.io/pod-name",
    "apps.kubernetes.io/pod-index",
];

pub struct TopologySpreadGenerator;

impl PatchGenerator for TopologySpreadGenerator {
    fn name(&self) -> &'static str {
        "topologyspread"
    }

    fn create(
        &self,
        info: &ContainerInfo<'_>,
        engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let Some(rule) = info.first_rule(|r| r.add_topology_spread.enabled) else {
            return Ok(Vec::new());
        };

        let match_labels: BTreeMap<String, String> = info
            .pod_labels()
            .iter()
            .filter(|(key, _)| !POD_LABELS_IGNORE.contains(&key.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut constraints: Vec<TopologySpreadConstraint> =
            render_json(&rule.add_topology_spread.topology_spread_constraints, info, engine)?;

        for constraint in &mut constraints {
            constraint.label_selector = Some(LabelSelector {
                match_labels: (!match_labels.is_empty()).then(|| match_labels.clone()),
                ..LabelSelector::default()
            });
        }

        rule.log(
            info.name(),
            format_args!("add {} topology spread constraints", constraints.len()),
        );

        Ok(vec![PatchOperation::add(
            "/spec/topologySpreadConstraints",
            constraints,
        )?])
    }
}
