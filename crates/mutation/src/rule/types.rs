//! 변경 정책 데이터 타입
//!
//! YAML 정책 파일에서 역직렬화되는 구조체들을 정의합니다.
//! 최상위 키와 룰 필드는 PascalCase, 내장된 Kubernetes 오브젝트는
//! API 필드 이름(camelCase)을 그대로 사용합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{
    EnvVar, Lifecycle, LocalObjectReference, Toleration, TopologySpreadConstraint,
};
use serde::{Deserialize, Serialize};

use crate::error::MutationError;
use crate::patch::PatchOperation;

/// 변경 정책 -- 하나의 YAML 정책 파일에 대응합니다.
///
/// # YAML 스키마
/// ```yaml
/// Rules:
///   - Name: inject-env
///     Conditions:
///       - Key: .Namespace
///         Operator: NotIn
///         Values: [kube-system]
///     Env:
///       - name: SENTRY_DSN
///         value: "{{ .Image.Slug | GetSentryDSN }}"
/// CreateSecrets:
///   - Name: registry-credentials
///     Type: kubernetes.io/dockerconfigjson
///     Data:
///       .dockerconfigjson: e30=
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MutationPolicy {
    /// 정의 순서대로 평가되는 룰 목록
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// 네임스페이스마다 생성할 시크릿
    #[serde(default)]
    pub create_secrets: Vec<CreateSecret>,
}

/// 하나의 변경 룰
///
/// 조건이 비어 있으면 모든 컨테이너에 매칭됩니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Rule {
    pub name: String,
    /// 생성기 판단 로그를 info 레벨로 남김
    pub debug: bool,
    /// AND로 결합되는 조건 목록
    pub conditions: Vec<Condition>,
    pub env: Vec<EnvVar>,
    pub add_default_resources: AddDefaultResources,
    pub run_as_non_root: RunAsNonRoot,
    pub replace_container_image_host: ReplaceContainerImageHost,
    pub add_topology_spread: AddTopologySpread,
    pub add_lifecycle: AddLifecycle,
    pub tolerations: Vec<Toleration>,
    pub image_pull_secrets: Vec<LocalObjectReference>,
    pub custom_patches: Vec<PatchOperation>,
}

impl Rule {
    /// 룰 단위 로그
    ///
    /// `Debug: true`인 룰은 info, 그 외에는 debug 레벨로 기록합니다.
    pub(crate) fn log(&self, container: &str, message: fmt::Arguments<'_>) {
        if self.debug {
            tracing::info!(rule = %self.name, container = %container, "{message}");
        } else {
            tracing::debug!(rule = %self.name, container = %container, "{message}");
        }
    }
}

/// 조건 연산자 (대소문자 무시, 로딩 시 소문자로 정규화)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Regexp,
    NotRegexp,
    In,
    NotIn,
    Empty,
    NotEmpty,
}

impl Operator {
    /// 지원하는 연산자 이름
    pub const ALL: [&'static str; 8] = [
        "equal",
        "notequal",
        "regexp",
        "notregexp",
        "in",
        "notin",
        "empty",
        "notempty",
    ];

    /// 부정 연산자 여부
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            Self::NotEqual | Self::NotRegexp | Self::NotIn | Self::NotEmpty
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "notequal",
            Self::Regexp => "regexp",
            Self::NotRegexp => "notregexp",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Empty => "empty",
            Self::NotEmpty => "notempty",
        }
    }
}

impl FromStr for Operator {
    type Err = MutationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "equal" => Ok(Self::Equal),
            "notequal" => Ok(Self::NotEqual),
            "regexp" => Ok(Self::Regexp),
            "notregexp" => Ok(Self::NotRegexp),
            "in" => Ok(Self::In),
            "notin" => Ok(Self::NotIn),
            "empty" => Ok(Self::Empty),
            "notempty" => Ok(Self::NotEmpty),
            other => Err(MutationError::Condition {
                reason: format!(
                    "unknown operator {other}, valid operators {:?}",
                    Self::ALL
                ),
            }),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 룰 조건
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Condition {
    /// 템플릿 표현식 (`{{ }}` 없이, 예: `.Namespace`)
    pub key: String,
    pub operator: String,
    pub value: String,
    pub values: Vec<String>,
}

impl Condition {
    /// 연산자를 해석합니다.
    pub fn operator(&self) -> Result<Operator, MutationError> {
        self.operator.parse()
    }
}

/// 기본 리소스 요청/제한 추가
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AddDefaultResources {
    pub enabled: bool,
    /// limits.cpu를 요청값으로 채움
    #[serde(rename = "LimitCPU")]
    pub limit_cpu: bool,
    /// deprecated: 컨테이너 리소스를 통째로 제거
    pub remove_resources: bool,
}

/// 비루트 실행 강제
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RunAsNonRoot {
    pub enabled: bool,
    pub replace_user: ReplaceUser,
}

/// runAsUser 치환 (FromUser → ToUser)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReplaceUser {
    pub enabled: bool,
    pub from_user: i64,
    pub to_user: i64,
}

/// 이미지 레지스트리 호스트 치환
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReplaceContainerImageHost {
    pub enabled: bool,
    /// 정규식. 비어 있으면 이미지 자신의 도메인
    pub from: String,
    /// 치환 문자열 (템플릿)
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AddTopologySpread {
    pub enabled: bool,
    pub topology_spread_constraints: Vec<TopologySpreadConstraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AddLifecycle {
    pub enabled: bool,
    pub lifecycle: Lifecycle,
}

/// 네임스페이스에 생성할 시크릿
///
/// `Data` 값은 Kubernetes Secret과 같이 base64로 인코딩합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CreateSecret {
    pub name: String,
    #[serde(rename = "Type")]
    pub secret_type: String,
    pub data: BTreeMap<String, ByteString>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_parse_is_case_insensitive() {
        assert_eq!("NotIn".parse::<Operator>().unwrap(), Operator::NotIn);
        assert_eq!("EQUAL".parse::<Operator>().unwrap(), Operator::Equal);
        assert!("contains".parse::<Operator>().is_err());
    }

    #[test]
    fn negated_operators() {
        let negated: Vec<_> = Operator::ALL
            .iter()
            .filter_map(|s| s.parse::<Operator>().ok())
            .filter(|op| op.is_negated())
            .map(Operator::as_str)
            .collect();
        assert_eq!(negated, ["notequal", "notregexp", "notin", "notempty"]);
    }

    #[test]
    fn rule_defaults_from_minimal_yaml() {
        let rule: Rule = serde_yaml::from_str("Name: minimal").unwrap();
        assert_eq!(rule.name, "minimal");
        assert!(rule.conditions.is_empty());
        assert!(!rule.add_default_resources.enabled);
        assert!(rule.custom_patches.is_empty());
    }

    #[test]
    fn embedded_kubernetes_fields_keep_camel_case() {
        let yaml = r#"
Name: spread
AddTopologySpread:
  Enabled: true
  TopologySpreadConstraints:
    - maxSkew: 1
      topologyKey: topology.kubernetes.io/zone
      whenUnsatisfiable: ScheduleAnyway
Tolerations:
  - key: dedicated
    operator: Equal
    value: batch
    effect: NoSchedule
AddDefaultResources:
  Enabled: true
  LimitCPU: true
"#;
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        assert!(rule.add_topology_spread.enabled);
        assert_eq!(
            rule.add_topology_spread.topology_spread_constraints[0].topology_key,
            "topology.kubernetes.io/zone"
        );
        assert_eq!(rule.tolerations[0].key.as_deref(), Some("dedicated"));
        assert!(rule.add_default_resources.limit_cpu);
    }

    #[test]
    fn create_secret_data_is_base64() {
        let yaml = r#"
Name: creds
Type: Opaque
Data:
  token: aGVsbG8=
"#;
        let secret: CreateSecret = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(secret.secret_type, "Opaque");
        assert_eq!(secret.data["token"].0, b"hello");
    }
}
