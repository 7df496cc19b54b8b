#![no_main]

use libfuzzer_sys::fuzz_target;
use pac_mutation::ContainerImage;

fuzz_target!(|data: &[u8]| {
    let Ok(image) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(parsed) = ContainerImage::parse(image) {
        // 해석에 성공한 참조는 항상 도메인과 태그를 가짐
        assert!(!parsed.domain.is_empty());
        assert!(!parsed.tag.is_empty());
        assert!(!parsed.slug.starts_with('-') && !parsed.slug.ends_with('-'));
        let _ = parsed.qualified_name();
    }
});
