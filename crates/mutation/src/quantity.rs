//! Kubernetes 리소스 수량 (`100m`, `500Mi`, `1.5`, `2e3`)
//!
//! 기본 리소스 생성기가 "값이 없거나 0인가"를 판단하는 데 필요한 만큼만 해석합니다.
//! 원본 문자열을 그대로 보존하며 정규화(canonicalization)는 하지 않습니다.

use std::fmt;

const SUFFIXES: &[&str] = &[
    "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "m", "k", "M", "G", "T", "P", "E", "",
];

/// 해석된 리소스 수량
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    raw: String,
    zero: bool,
}

impl Quantity {
    /// 수량 문자열을 해석합니다. 형식이 맞지 않으면 `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let unsigned = trimmed
            .strip_prefix(['+', '-'])
            .unwrap_or(trimmed);

        let number = split_number(unsigned)?;
        let digits: String = number.chars().filter(|c| *c != '.').collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if number.matches('.').count() > 1 {
            return None;
        }

        Some(Self {
            raw: trimmed.to_owned(),
            zero: digits.chars().all(|c| c == '0'),
        })
    }

    /// 값이 0인지
    pub fn is_zero(&self) -> bool {
        self.zero
    }

    /// 원본 문자열
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// 접미사 또는 지수부를 떼어낸 숫자 부분을 반환합니다.
fn split_number(s: &str) -> Option<&str> {
    if s.ends_with('i') {
        return SUFFIXES[..6]
            .iter()
            .find_map(|suffix| s.strip_suffix(suffix))
            .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit() || c == '.'));
    }

    if let Some(pos) = s.find(['e', 'E']) {
        let (number, exponent) = s.split_at(pos);
        let exponent = &exponent[1..];
        let exponent = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        if !exponent.is_empty() && exponent.chars().all(|c| c.is_ascii_digit()) {
            return Some(number);
        }
        // "E" 단독은 엑사 접미사
        if exponent.is_empty() && s.ends_with('E') {
            return Some(number);
        }
        return None;
    }

    SUFFIXES
        .iter()
        .find_map(|suffix| s.strip_suffix(suffix).filter(|n| !n.is_empty()))
        .filter(|n| n.chars().all(|c| c.is_ascii_digit() || c == '.'))
}
