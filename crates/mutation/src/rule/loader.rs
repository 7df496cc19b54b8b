//! 정책 파일 로더 -- YAML 변경 정책을 디스크에서 로드합니다.
//!
//! 로딩 시점에 모든 조건을 검증하며, 하나라도 잘못되면 전체 로딩이 실패합니다.
//! 잘못된 정책으로는 서버가 기동하지 않습니다.

use std::path::Path;

use regex::Regex;

use crate::error::MutationError;

use super::types::{Condition, MutationPolicy, Operator, Rule};

/// 정책 파일 최대 크기
const MAX_POLICY_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// 정책 파일 로더
pub struct PolicyLoader;

impl PolicyLoader {
    /// 파일에서 정책을 로드하고 검증합니다.
    ///
    /// # Errors
    /// - 파일을 읽을 수 없거나 너무 큰 경우 [`MutationError::PolicyLoad`]
    /// - YAML 파싱 실패 시 [`MutationError::PolicyLoad`]
    /// - 조건 검증 실패 시 [`MutationError::RuleValidation`]
    pub async fn load(path: impl AsRef<Path>) -> Result<MutationPolicy, MutationError> {
        let path = path.as_ref();
        let load_err = |reason: String| MutationError::PolicyLoad {
            path: path.display().to_string(),
            reason,
        };

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| load_err(format!("failed to read file metadata: {e}")))?;

        if metadata.len() > MAX_POLICY_FILE_SIZE {
            return Err(load_err(format!(
                "file too large: {} bytes (max: {MAX_POLICY_FILE_SIZE})",
                metadata.len()
            )));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_err(format!("failed to read file: {e}")))?;

        let policy = MutationPolicy::parse(&content, &path.display().to_string())?;

        tracing::info!(
            path = %path.display(),
            rules = policy.rules.len(),
            secrets = policy.create_secrets.len(),
            "loaded mutation policy"
        );

        Ok(policy)
    }
}

impl MutationPolicy {
    /// YAML 문자열을 파싱하고 연산자를 정규화한 뒤 검증합니다.
    pub fn parse(yaml: &str, source: &str) -> Result<Self, MutationError> {
        let mut policy: MutationPolicy =
            serde_yaml::from_str(yaml).map_err(|e| MutationError::PolicyLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        for rule in &mut policy.rules {
            for condition in &mut rule.conditions {
                condition.operator = condition.operator.to_lowercase();
            }
        }

        policy.validate()?;
        Ok(policy)
    }

    /// 모든 룰의 조건을 검증합니다.
    pub fn validate(&self) -> Result<(), MutationError> {
        self.rules.iter().try_for_each(Rule::validate)
    }
}

impl Rule {
    /// 조건 유효성 검증
    pub fn validate(&self) -> Result<(), MutationError> {
        let invalid = |reason: String| MutationError::RuleValidation {
            rule: self.name.clone(),
            reason,
        };

        for (idx, condition) in self.conditions.iter().enumerate() {
            validate_condition(condition)
                .map_err(|reason| invalid(format!("condition {idx}: {reason}")))?;
        }

        Ok(())
    }
}

fn validate_condition(condition: &Condition) -> Result<(), String> {
    if condition.key.is_empty() {
        return Err("empty key".to_owned());
    }

    let operator = condition.operator().map_err(|e| e.to_string())?;

    match operator {
        Operator::Equal | Operator::NotEqual if condition.value.is_empty() => {
            Err(format!("empty value for operator {operator}"))
        }
        Operator::Regexp | Operator::NotRegexp => {
            if condition.value.is_empty() {
                return Err(format!("empty value for operator {operator}"));
            }
            Regex::new(&condition.value)
                .map(|_| ())
                .map_err(|e| format!("error in regexp {}: {e}", condition.value))
        }
        Operator::In | Operator::NotIn if condition.values.is_empty() => {
            Err(format!("empty values for operator {operator}"))
        }
        _ => Ok(()),
    }
}
