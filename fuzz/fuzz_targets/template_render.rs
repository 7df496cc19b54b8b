#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pac_mutation::{DsnCache, StaticResolver, TemplateEngine};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    template: String,
    container_name: String,
    namespace: String,
}

fuzz_target!(|input: FuzzInput| {
    let engine = TemplateEngine::new(DsnCache::default(), Arc::new(StaticResolver::default()));
    let ctx = serde_json::json!({
        "ContainerName": input.container_name,
        "Namespace": input.namespace,
    });
    let _ = engine.render(&input.template, &minijinja::Value::from_serialize(&ctx));
});
