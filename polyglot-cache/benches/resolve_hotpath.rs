use criterion::{criterion_group, criterion_main, Criterion};
use polyglot_cache::{compute_candidates, default_candidates, BundleResolver};
use polyglot_test_utils::fixtures::{default_control, french_materializer, locale, MESSAGES};
use polyglot_test_utils::{MapMaterializer, ScriptedControl, TestBundle};
use std::hint::black_box;
use std::sync::Arc;

fn bench_cached_resolution(c: &mut Criterion) {
    let resolver: BundleResolver<TestBundle> = BundleResolver::new();
    let control = default_control(Arc::new(french_materializer()), "en-US");
    let fr_ch = locale("fr-CH");
    resolver
        .get_bundle(MESSAGES, &fr_ch, None, &control)
        .expect("warm cache");

    c.bench_function("resolve/cached_fr_ch", |b| {
        b.iter(|| {
            let bundle = resolver
                .get_bundle(MESSAGES, black_box(&fr_ch), None, &control)
                .expect("cached bundle");
            black_box(bundle.lookup(|table| table.get("farewell").map(str::len)));
        });
    });
}

fn bench_tombstoned_resolution(c: &mut Criterion) {
    let resolver: BundleResolver<TestBundle> = BundleResolver::new();
    let materializer =
        MapMaterializer::new().with_bundle(MESSAGES, "und", &[("greeting", "Hello")]);
    let control = ScriptedControl::new(Arc::new(materializer));
    let de_at = locale("de-AT");

    c.bench_function("resolve/tombstoned_de_at", |b| {
        b.iter(|| {
            let bundle = resolver
                .get_bundle(MESSAGES, black_box(&de_at), None, &control)
                .expect("root bundle");
            black_box(bundle.locale().is_root());
        });
    });
}

fn bench_candidates(c: &mut Criterion) {
    let zh_tw = locale("zh-TW");
    let nb_no = locale("nb-NO");

    c.bench_function("candidates/compute_zh_tw", |b| {
        b.iter(|| black_box(compute_candidates(black_box(&zh_tw)).len()));
    });
    c.bench_function("candidates/memoized_nb_no", |b| {
        b.iter(|| black_box(default_candidates(black_box(&nb_no)).len()));
    });
}

criterion_group!(
    benches,
    bench_cached_resolution,
    bench_tombstoned_resolution,
    bench_candidates
);
criterion_main!(benches);
