//! 템플릿 엔진
//!
//! minijinja 기반이며 컨테이너 컨텍스트에 대해 문자열 템플릿을 렌더링합니다.
//!
//! - 변수 구분자 `{{ ... }}`, 블록 구분자 `{% ... %}`
//! - Go 템플릿 스타일의 선행 점 필드 접근(`{{ .ContainerName }}`) 허용
//! - 없는 필드는 빈 문자열로 렌더링
//! - 고정된 헬퍼 함수만 노출 (`regexp`, `indexUnknown`, `GetSentryDSN`,
//!   `Resolve`, `ResolveFallback`, `env`, `index`)

use std::sync::Arc;

use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value};
use regex::Regex;

use crate::error::MutationError;
use crate::resolver::DomainResolver;
use crate::sentry::DsnCache;

/// 범위를 벗어난 인덱스에 대한 `indexUnknown` 반환값
const UNKNOWN: &str = "unknown";

/// 컨테이너 컨텍스트용 템플릿 엔진
///
/// 한 번 만들어 모든 요청에서 공유합니다.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

impl TemplateEngine {
    /// DSN 캐시와 도메인 해석기를 주입해 엔진을 만듭니다.
    pub fn new(dsn_cache: DsnCache, resolver: Arc<dyn DomainResolver>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);

        env.add_function("regexp", regexp);
        env.add_function("indexUnknown", index_unknown);
        env.add_function("index", index);
        env.add_function("env", env_var);

        let cache = dsn_cache.clone();
        env.add_function("GetSentryDSN", move |slug: &str| cache.lookup(slug));
        env.add_filter("GetSentryDSN", move |slug: &str| dsn_cache.lookup(slug));

        let r = Arc::clone(&resolver);
        env.add_function("Resolve", move |domain: &str| resolve(r.as_ref(), domain));
        let r = Arc::clone(&resolver);
        env.add_filter("Resolve", move |domain: &str| resolve(r.as_ref(), domain));

        let r = Arc::clone(&resolver);
        env.add_function("ResolveFallback", move |domain: &str, fallback: &str| {
            resolve_fallback(r.as_ref(), domain, fallback)
        });
        env.add_filter("ResolveFallback", move |domain: &str, fallback: &str| {
            resolve_fallback(resolver.as_ref(), domain, fallback)
        });

        Self { env }
    }

    /// 템플릿을 렌더링합니다.
    ///
    /// 구문 오류는 [`MutationError::TemplateParse`], 실행 오류는
    /// [`MutationError::TemplateExec`]로 반환합니다.
    pub fn render(&self, template: &str, ctx: &Value) -> Result<String, MutationError> {
        let source = normalize_leading_dots(template);

        let tmpl = self
            .env
            .template_from_str(&source)
            .map_err(|e| MutationError::TemplateParse {
                reason: describe(&e),
            })?;

        tmpl.render(ctx).map_err(|e| match e.kind() {
            ErrorKind::SyntaxError => MutationError::TemplateParse {
                reason: describe(&e),
            },
            _ => MutationError::TemplateExec {
                reason: describe(&e),
            },
        })
    }
}

fn describe(err: &Error) -> String {
    match err.detail() {
        Some(detail) => format!("{}: {detail}", err.kind()),
        None => err.to_string(),
    }
}

/// 전체 매치와 그룹을 순서대로 반환합니다. 매치가 없으면 빈 목록
fn regexp(pattern: &str, value: &str) -> Result<Vec<String>, Error> {
    let re = Regex::new(pattern).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid regexp '{pattern}': {e}"),
        )
    })?;

    Ok(re
        .captures(value)
        .map(|caps| {
            caps.iter()
                .map(|m| m.map_or_else(String::new, |m| m.as_str().to_owned()))
                .collect()
        })
        .unwrap_or_default())
}

fn index_unknown(list: Vec<String>, part: i64) -> String {
    usize::try_from(part)
        .ok()
        .and_then(|i| list.get(i).cloned())
        .unwrap_or_else(|| UNKNOWN.to_owned())
}

fn index(collection: Value, key: Value) -> Result<Value, Error> {
    collection.get_item(&key)
}

fn env_var(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn resolve(resolver: &dyn DomainResolver, domain: &str) -> String {
    resolver
        .resolve(domain)
        .unwrap_or_else(|e| format!("error: {e}"))
}

fn resolve_fallback(resolver: &dyn DomainResolver, domain: &str, fallback: &str) -> String {
    resolver
        .resolve(domain)
        .unwrap_or_else(|_| fallback.to_owned())
}

/// `{{ }}` / `{% %}` 안에서 Go 스타일 선행 점(`.Field`)을 제거합니다.
///
/// 따옴표 안의 문자열과 숫자 리터럴(`0.5`)은 건드리지 않습니다.
pub(crate) fn normalize_leading_dots(template: &str) -> String {
    let mut result = String::with_capacity(template.len());
    let mut remaining = template;

    loop {
        let next = [("{{", "}}"), ("{%", "%}")]
            .into_iter()
            .filter_map(|(open, close)| remaining.find(open).map(|pos| (pos, open, close)))
            .min_by_key(|(pos, _, _)| *pos);

        let Some((start, open, close)) = next else {
            break;
        };

        result.push_str(&remaining[..start + open.len()]);
        remaining = &remaining[start + open.len()..];

        match remaining.find(close) {
            Some(end) => {
                result.push_str(&strip_expression_dots(&remaining[..end]));
                result.push_str(close);
                remaining = &remaining[end + close.len()..];
            }
            None => {
                result.push_str(remaining);
                remaining = "";
            }
        }
    }

    result.push_str(remaining);
    result
}

fn strip_expression_dots(expr: &str) -> String {
    let mut result = String::with_capacity(expr.len());
    let mut chars = expr.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(q), c) if c == q => {
                quote = None;
                result.push(c);
            }
            (Some(_), c) => result.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                result.push(ch);
            }
            (None, '.') => {
                let prev_is_operand = result.chars().last().is_some_and(|c| {
                    c.is_alphanumeric() || matches!(c, '_' | ')' | ']' | '.' | '\'' | '"')
                });
                let next_is_ident = chars
                    .peek()
                    .is_some_and(|c| c.is_alphabetic() || *c == '_');
                if prev_is_operand || !next_is_ident {
                    result.push('.');
                }
            }
            (None, c) => result.push(c),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;
    use minijinja::context;

    fn engine() -> TemplateEngine {
        let cache = DsnCache::new([("library-nginx".to_owned(), "https://k@sentry/7".to_owned())]);
        let resolver = StaticResolver::new([("db.local".to_owned(), "10.1.2.3".to_owned())]);
        TemplateEngine::new(cache, Arc::new(resolver))
    }

    fn ctx() -> Value {
        context! {
            ContainerName => "app",
            Image => context! { Name => "domain.com/a/b:e", Slug => "library-nginx" },
            NamespaceAnnotations => context! { ABC => "DEF" },
        }
    }

    #[test]
    fn renders_plain_and_dotted_fields() {
        let e = engine();
        assert_eq!(e.render("{{ ContainerName }}", &ctx()).unwrap(), "app");
        assert_eq!(e.render("{{ .ContainerName }}", &ctx()).unwrap(), "app");
        assert_eq!(
            e.render("x-{{ .NamespaceAnnotations.ABC }}", &ctx()).unwrap(),
            "x-DEF"
        );
    }

    #[test]
    fn missing_field_renders_empty() {
        let e = engine();
        assert_eq!(e.render("[{{ .Nope.Deeper }}]", &ctx()).unwrap(), "[]");
    }

    #[test]
    fn regexp_and_index_unknown() {
        let e = engine();
        assert_eq!(
            e.render("{{ regexp('/(.+):(.+)$', .Image.Name)[2] }}", &ctx())
                .unwrap(),
            "e"
        );
        assert_eq!(
            e.render("{{ indexUnknown(regexp('/(.+):(.+)$', .Image.Name), 3) }}", &ctx())
                .unwrap(),
            "unknown"
        );
        assert_eq!(
            e.render("{{ regexp('^zzz', .Image.Name) | length }}", &ctx())
                .unwrap(),
            "0"
        );
    }

    #[test]
    fn invalid_regexp_is_exec_error() {
        let err = engine().render("{{ regexp('(', 'x') }}", &ctx()).unwrap_err();
        assert!(matches!(err, MutationError::TemplateExec { .. }));
    }

    #[test]
    fn syntax_error_is_parse_error() {
        let err = engine().render("{{ ContainerName ", &ctx()).unwrap_err();
        assert!(matches!(err, MutationError::TemplateParse { .. }));
        assert!(err.to_string().starts_with("error parsing template"));
    }

    #[test]
    fn sentry_dsn_as_function_and_filter() {
        let e = engine();
        assert_eq!(
            e.render("{{ GetSentryDSN(.Image.Slug) }}", &ctx()).unwrap(),
            "https://k@sentry/7"
        );
        assert_eq!(
            e.render("{{ .Image.Slug | GetSentryDSN }}", &ctx()).unwrap(),
            "https://k@sentry/7"
        );
        assert_eq!(e.render("{{ GetSentryDSN('missing') }}", &ctx()).unwrap(), "");
    }

    #[test]
    fn resolve_never_faults() {
        let e = engine();
        assert_eq!(e.render("{{ Resolve('db.local') }}", &ctx()).unwrap(), "10.1.2.3");
        assert!(
            e.render("{{ Resolve('nowhere.local') }}", &ctx())
                .unwrap()
                .starts_with("error: ")
        );
        assert_eq!(
            e.render("{{ ResolveFallback('nowhere.local', '127.0.0.1') }}", &ctx())
                .unwrap(),
            "127.0.0.1"
        );
        assert_eq!(
            e.render("{{ 'db.local' | ResolveFallback('0.0.0.0') }}", &ctx())
                .unwrap(),
            "10.1.2.3"
        );
    }

    #[test]
    fn index_function() {
        let e = engine();
        assert_eq!(
            e.render("{{ index(.NamespaceAnnotations, 'ABC') }}", &ctx()).unwrap(),
            "DEF"
        );
    }

    #[test]
    #[serial_test::serial]
    fn env_function_with_filter() {
        // SAFETY: serial_test 로 직렬화된 테스트에서만 환경변수를 변경
        unsafe { std::env::set_var("PAC_TEMPLATE_TEST", "test-value") };
        let out = engine()
            .render("{{ env('PAC_TEMPLATE_TEST') | replace('te', 'de') }}", &ctx())
            .unwrap();
        unsafe { std::env::remove_var("PAC_TEMPLATE_TEST") };
        assert_eq!(out, "dest-value");
    }

    #[test]
    fn keeps_trailing_newline() {
        assert_eq!(engine().render("a\n", &ctx()).unwrap(), "a\n");
    }

    #[test]
    fn normalization_leaves_literals_alone() {
        assert_eq!(
            normalize_leading_dots("{{ .A.B }} . {{ 'x.y' }} {{ 0.5 }}"),
            "{{ A.B }} . {{ 'x.y' }} {{ 0.5 }}"
        );
        assert_eq!(
            normalize_leading_dots("{% if .Image.Tag == 'v1' %}{{ f(.A, .B) }}{% endif %}"),
            "{% if Image.Tag == 'v1' %}{{ f(A, B) }}{% endif %}"
        );
        assert_eq!(normalize_leading_dots("{{- .Name -}}"), "{{- Name -}}");
    }
}
