//! 변경 엔진 벤치마크
//!
//! 이미지 해석, 템플릿 렌더링, 파드 단위 패치 파이프라인 성능을 측정합니다.

use std::sync::Arc;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use pac_mutation::{
    ContainerImage, DsnCache, MutationPolicy, PatchPipeline, StaticResolver, TemplateEngine,
};
use serde_json::json;

const POLICY: &str = r#"
Rules:
  - Name: env
    Conditions:
      - Key: .Namespace
        Operator: Equal
        Value: prod
    Env:
      - name: CONTAINER
        value: "{{ .ContainerName }}"
      - name: REGISTRY
        value: "{{ .Image.Domain }}"
  - Name: resources
    AddDefaultResources:
      Enabled: true
  - Name: mirror
    ReplaceContainerImageHost:
      Enabled: true
      From: docker.io
      To: mirror.internal
  - Name: tolerations
    Tolerations:
      - key: dedicated
        operator: Equal
        value: batch
        effect: NoSchedule
"#;

fn engine() -> TemplateEngine {
    TemplateEngine::new(DsnCache::default(), Arc::new(StaticResolver::default()))
}

fn namespace() -> Namespace {
    serde_json::from_value(json!({ "metadata": { "name": "prod" } })).unwrap()
}

fn pod(containers: usize) -> Pod {
    let containers: Vec<_> = (0..containers)
        .map(|i| json!({ "name": format!("app-{i}"), "image": "nginx:1.25" }))
        .collect();
    serde_json::from_value(json!({
        "metadata": { "name": "web-0", "namespace": "prod" },
        "spec": {
            "initContainers": [ { "name": "init", "image": "busybox" } ],
            "containers": containers,
        }
    }))
    .unwrap()
}

fn bench_image_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_parse");
    group.throughput(Throughput::Elements(1));

    for (name, image) in [
        ("short", "nginx"),
        ("tagged", "nginx:1.25"),
        ("registry_port", "registry.local:5000/team/app:v2"),
        (
            "digest",
            "ghcr.io/org/app@sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
        ),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| ContainerImage::parse(black_box(image)))
        });
    }

    group.finish();
}

fn bench_template_render(c: &mut Criterion) {
    let engine = engine();
    let ctx = minijinja::context! {
        ContainerName => "app",
        Namespace => "prod",
        Image => minijinja::context! { Name => "docker.io/library/nginx:1.25" },
    };

    let mut group = c.benchmark_group("template_render");
    group.bench_function("plain", |b| {
        b.iter(|| engine.render(black_box("static-value"), &ctx))
    });
    group.bench_function("leading_dot_field", |b| {
        b.iter(|| engine.render(black_box("{{ .Namespace }}-{{ .ContainerName }}"), &ctx))
    });
    group.bench_function("regexp", |b| {
        b.iter(|| {
            engine.render(
                black_box("{{ indexUnknown(regexp('/(.+):(.+)$', .Image.Name), 2) }}"),
                &ctx,
            )
        })
    });
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let engine = engine();
    let policy = MutationPolicy::parse(POLICY, "bench.yaml").unwrap();
    let pipeline = PatchPipeline::new();
    let ns = namespace();

    let mut group = c.benchmark_group("pipeline");
    for containers in [1usize, 4, 16] {
        let pod = pod(containers);
        group.throughput(Throughput::Elements(containers as u64 + 1));
        group.bench_function(format!("containers_{containers}"), |b| {
            b.iter(|| pipeline.run(black_box(&ns), black_box(&pod), &policy.rules, &engine))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_image_parse,
    bench_template_render,
    bench_pipeline
);
criterion_main!(benches);
