//! 조건 평가 엔진
//!
//! 각 조건의 `Key`를 `{{ <key> }}` 템플릿으로 렌더링한 뒤 연산자를 적용합니다.
//! 모든 조건이 참이어야 매칭이며(AND), 빈 조건 목록은 항상 참입니다.

use regex::Regex;

use crate::context::ContainerInfo;
use crate::error::MutationError;
use crate::rule::{Condition, Operator, Rule};
use crate::template::TemplateEngine;

/// 조건 목록을 평가합니다.
///
/// 잘못된 연산자, 누락된 값, 컴파일되지 않는 정규식은 평가 전체를 실패시킵니다.
pub fn check(
    info: &ContainerInfo<'_>,
    conditions: &[Condition],
    engine: &TemplateEngine,
) -> Result<bool, MutationError> {
    if conditions.is_empty() {
        return Ok(true);
    }

    let ctx = info.template_value();
    let mut matched = true;

    for condition in conditions {
        if condition.key.is_empty() {
            return Err(condition_error("empty key".to_owned()));
        }

        let key = engine
            .render(&format!("{{{{ {} }}}}", condition.key), &ctx)
            .map_err(|e| condition_error(format!("error matching key: {e}")))?;

        let operator = condition.operator()?;
        let required = !operator.is_negated();

        let hit = match operator {
            Operator::Equal | Operator::NotEqual => {
                require_value(condition, operator)?;
                key == condition.value
            }
            Operator::Regexp | Operator::NotRegexp => {
                require_value(condition, operator)?;
                Regex::new(&condition.value)
                    .map_err(|e| condition_error(format!("error matching regexp: {e}")))?
                    .is_match(&key)
            }
            Operator::In | Operator::NotIn => {
                if condition.values.is_empty() {
                    return Err(condition_error(format!(
                        "empty values for operator {operator}"
                    )));
                }
                condition.values.contains(&key)
            }
            Operator::Empty | Operator::NotEmpty => key.is_empty(),
        };

        // 모든 조건을 검증하기 위해 첫 불일치에서 멈추지 않음
        if hit != required {
            matched = false;
        }
    }

    Ok(matched)
}

/// 조건이 매칭되는 룰을 정의 순서대로 선택합니다.
pub fn select_rules<'a>(
    info: &ContainerInfo<'a>,
    rules: &'a [Rule],
    engine: &TemplateEngine,
) -> Result<Vec<&'a Rule>, MutationError> {
    let mut selected = Vec::new();

    for rule in rules {
        if check(info, &rule.conditions, engine)? {
            rule.log(info.name(), format_args!("rule selected"));
            selected.push(rule);
        }
    }

    Ok(selected)
}

fn require_value(condition: &Condition, operator: Operator) -> Result<(), MutationError> {
    if condition.value.is_empty() {
        return Err(condition_error(format!("empty value for operator {operator}")));
    }
    Ok(())
}

fn condition_error(reason: String) -> MutationError {
    MutationError::Condition { reason }
}
