//! 기본 리소스 요청/제한
//!
//! 기본값 우선순위: 파드 어노테이션 → 네임스페이스 어노테이션 → 내장 기본값.
//! 기본값은 컨테이너 자신의 요청값이 없거나 0일 때만 사용합니다.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use pac_core::types::{
    ANNOTATION_DEFAULT_RESOURCES_CPU, ANNOTATION_DEFAULT_RESOURCES_MEMORY,
    ANNOTATION_IGNORE_ADD_DEFAULT_RESOURCES,
};
use serde::Serialize;

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::quantity::Quantity;
use crate::template::TemplateEngine;

use super::{PatchGenerator, PatchOperation};

/// 내장 기본 CPU 요청량
pub const DEFAULT_CPU: &str = "100m";
/// 내장 기본 메모리 요청량
pub const DEFAULT_MEMORY: &str = "500Mi";

const CPU: &str = "cpu";
const MEMORY: &str = "memory";

type ResourceList = BTreeMap<String, K8sQuantity>;

/// 패치 값 (cpu/memory만 포함)
#[derive(Serialize)]
struct ResourceRequirements {
    requests: ResourceList,
    limits: ResourceList,
}

pub struct ResourcesGenerator;

impl ResourcesGenerator {
    /// 어노테이션 기본값. 해석할 수 없는 값은 로그를 남기고 무시합니다.
    fn default_request(info: &ContainerInfo<'_>, annotation: &str, builtin: &str) -> String {
        match info.get_pod_annotation(annotation) {
            Some(raw) => match Quantity::parse(raw) {
                Some(q) => q.as_str().to_owned(),
                None => {
                    tracing::error!(
                        annotation = annotation,
                        value = raw,
                        container = %info.name(),
                        "invalid default resource quantity, using built-in default"
                    );
                    builtin.to_owned()
                }
            },
            None => builtin.to_owned(),
        }
    }
}

/// 0이 아닌 값이면 복제
fn non_zero(list: Option<&ResourceList>, name: &str) -> Option<K8sQuantity> {
    list.and_then(|l| l.get(name))
        .filter(|q| Quantity::parse(&q.0).is_some_and(|q| !q.is_zero()))
        .cloned()
}

impl PatchGenerator for ResourcesGenerator {
    fn name(&self) -> &'static str {
        "resources"
    }

    fn legacy_ignore_annotation(&self) -> Option<&'static str> {
        Some(ANNOTATION_IGNORE_ADD_DEFAULT_RESOURCES)
    }

    fn create(
        &self,
        info: &ContainerInfo<'_>,
        _engine: &TemplateEngine,
    ) -> Result<Vec<PatchOperation>, MutationError> {
        let Some(rule) = info.first_rule(|r| r.add_default_resources.enabled) else {
            return Ok(Vec::new());
        };
        let settings = &rule.add_default_resources;
        let resources_path = format!("{}/resources", info.container_path());

        if settings.remove_resources {
            rule.log(info.name(), format_args!("remove resources"));
            return Ok(vec![PatchOperation::remove(resources_path)]);
        }

        let current = info.container.resources.as_ref();
        let requests = current.and_then(|r| r.requests.as_ref());
        let limits = current.and_then(|r| r.limits.as_ref());

        let request_cpu = non_zero(requests, CPU).unwrap_or_else(|| {
            K8sQuantity(Self::default_request(info, ANNOTATION_DEFAULT_RESOURCES_CPU, DEFAULT_CPU))
        });
        let request_memory = non_zero(requests, MEMORY).unwrap_or_else(|| {
            K8sQuantity(Self::default_request(
                info,
                ANNOTATION_DEFAULT_RESOURCES_MEMORY,
                DEFAULT_MEMORY,
            ))
        });

        let mut new_limits = ResourceList::new();
        match non_zero(limits, CPU) {
            Some(cpu) => {
                new_limits.insert(CPU.to_owned(), cpu);
            }
            None if settings.limit_cpu => {
                new_limits.insert(CPU.to_owned(), request_cpu.clone());
            }
            None => {}
        }
        new_limits.insert(
            MEMORY.to_owned(),
            non_zero(limits, MEMORY).unwrap_or_else(|| request_memory.clone()),
        );

        let new_requests = ResourceList::from([
            (CPU.to_owned(), request_cpu),
            (MEMORY.to_owned(), request_memory),
        ]);

        rule.log(
            info.name(),
            format_args!("default resources requests={new_requests:?} limits={new_limits:?}"),
        );

        Ok(vec![PatchOperation::add(
            resources_path,
            ResourceRequirements {
                requests: new_requests,
                limits: new_limits,
            },
        )?])
    }
}
