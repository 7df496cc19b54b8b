//! 컨테이너 이미지 참조 파서
//!
//! 레지스트리 참조 규칙에 따라 이미지 문자열을 정규화합니다.
//! - 도메인이 없으면 `docker.io`
//! - `docker.io`의 단일 경로 이미지는 `library/` 접두어
//! - 태그가 없으면 `latest`

use serde::Serialize;

use crate::error::MutationError;

/// 기본 레지스트리 도메인
pub const DEFAULT_DOMAIN: &str = "docker.io";

/// 기본 태그
pub const DEFAULT_TAG: &str = "latest";

const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";
const OFFICIAL_REPO_PREFIX: &str = "library/";
const NAME_TOTAL_LENGTH_MAX: usize = 255;
const TAG_LENGTH_MAX: usize = 128;

/// 정규화된 컨테이너 이미지 정보
///
/// 컨테이너마다 한 번 만들어지며 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerImage {
    /// 레지스트리 도메인 (예: `docker.io`)
    pub domain: String,
    /// 저장소 경로 (예: `library/nginx`)
    pub path: String,
    /// 원본 이미지 문자열
    pub name: String,
    /// 소문자 경로에서 영숫자가 아닌 구간을 `-`로 바꾼 값
    pub slug: String,
    /// 태그 (기본 `latest`)
    pub tag: String,
}

impl ContainerImage {
    /// 이미지 문자열을 해석합니다.
    pub fn parse(image: &str) -> Result<Self, MutationError> {
        let invalid = |reason: &str| MutationError::InvalidImageReference {
            image: image.to_owned(),
            reason: reason.to_owned(),
        };

        if image.is_empty() {
            return Err(invalid("repository name must have at least one component"));
        }

        if image.len() == 64 && image.chars().all(|c| matches!(c, 'a'..='f' | '0'..='9')) {
            return Err(invalid(
                "invalid repository name (cannot be 64-byte hexadecimal strings)",
            ));
        }

        let (domain, remainder) = split_domain(image);

        let remote_name = remainder
            .split_once(':')
            .map_or(remainder.as_str(), |(name, _)| name);
        if remote_name.to_lowercase() != remote_name {
            return Err(invalid("repository name must be lowercase"));
        }

        let (name_and_tag, digest) = match remainder.split_once('@') {
            Some((name, digest)) => (name, Some(digest)),
            None => (remainder.as_str(), None),
        };
        let (path, tag) = match name_and_tag.split_once(':') {
            Some((path, tag)) => (path, Some(tag)),
            None => (name_and_tag, None),
        };

        if !is_valid_domain(&domain) {
            return Err(invalid("invalid reference format"));
        }
        if path.is_empty() || !path.split('/').all(is_valid_path_component) {
            return Err(invalid("invalid reference format"));
        }
        if domain.len() + 1 + path.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(invalid("repository name must not be more than 255 characters"));
        }
        if let Some(tag) = tag {
            if !is_valid_tag(tag) {
                return Err(invalid("invalid tag format"));
            }
        }
        if let Some(digest) = digest {
            if !is_valid_digest(digest) {
                return Err(invalid("invalid digest format"));
            }
        }

        Ok(Self {
            slug: slugify(path),
            domain,
            path: path.to_owned(),
            name: image.to_owned(),
            tag: tag.unwrap_or(DEFAULT_TAG).to_owned(),
        })
    }

    /// 도메인이 붙은 형태의 이미지 문자열
    ///
    /// 원본에 도메인이 없으면 도메인(과 필요 시 `library/`)을 앞에 붙입니다.
    pub fn qualified_name(&self) -> String {
        if self.name.starts_with(&self.domain) {
            return self.name.clone();
        }

        if self.name.contains('/') {
            format!("{}/{}", self.domain, self.name)
        } else {
            format!("{}/{}{}", self.domain, OFFICIAL_REPO_PREFIX, self.name)
        }
    }
}

/// 첫 `/` 앞부분이 도메인처럼 보이면 분리하고, 아니면 기본 도메인을 사용합니다.
fn split_domain(name: &str) -> (String, String) {
    let (mut domain, mut remainder) = match name.split_once('/') {
        Some((head, rest))
            if head.contains('.')
                || head.contains(':')
                || head == "localhost"
                || head.to_lowercase() != head =>
        {
            (head.to_owned(), rest.to_owned())
        }
        _ => (DEFAULT_DOMAIN.to_owned(), name.to_owned()),
    };

    if domain == LEGACY_DEFAULT_DOMAIN {
        domain = DEFAULT_DOMAIN.to_owned();
    }
    if domain == DEFAULT_DOMAIN && !remainder.contains('/') {
        remainder = format!("{OFFICIAL_REPO_PREFIX}{remainder}");
    }

    (domain, remainder)
}

fn is_valid_domain(domain: &str) -> bool {
    let (host, port) = match domain.rsplit_once(':') {
        Some((host, port)) if !host.ends_with(':') && !port.contains(']') => (host, Some(port)),
        _ => (domain, None),
    };

    if let Some(port) = port {
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }

    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        return !inner.is_empty() && inner.chars().all(|c| c.is_ascii_hexdigit() || c == ':');
    }

    !host.is_empty() && host.split('.').all(is_valid_domain_component)
}

fn is_valid_domain_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

/// 경로 컴포넌트: `[a-z0-9]+` 를 `.`, `_`, `__`, `-+` 로 연결
fn is_valid_path_component(component: &str) -> bool {
    let is_alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();

    if !component.starts_with(is_alnum) || !component.ends_with(is_alnum) {
        return false;
    }

    let mut separator = String::new();
    for c in component.chars() {
        if is_alnum(c) {
            if !separator.is_empty() {
                let valid = separator == "."
                    || separator == "_"
                    || separator == "__"
                    || separator.chars().all(|s| s == '-');
                if !valid {
                    return false;
                }
                separator.clear();
            }
        } else if matches!(c, '.' | '_' | '-') {
            separator.push(c);
        } else {
            return false;
        }
    }

    true
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() || first == '_' => {}
        _ => return false,
    }
    tag.len() <= TAG_LENGTH_MAX
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn is_valid_digest(digest: &str) -> bool {
    let Some((algorithm, encoded)) = digest.split_once(':') else {
        return false;
    };

    let algorithm_ok = algorithm
        .split(['-', '_', '+', '.'])
        .all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric())
        });

    algorithm_ok && encoded.len() >= 32 && encoded.chars().all(|c| c.is_ascii_hexdigit())
}

/// 소문자화 후 영숫자가 아닌 연속 구간을 `-` 하나로 바꾸고 양끝 `-`를 제거합니다.
pub fn slugify(path: &str) -> String {
    let mut slug = String::with_capacity(path.len());
    let mut pending_dash = false;

    for c in path.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}
