//! Rendering benchmarks: initial list render and list re-render.

use std::collections::HashSet;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tinyvue_core::dom::run_animation_frame;
use tinyvue_core::{reactive, render_template, CustomComponents, TemplateRefs, Value};

const TEMPLATE: &str = r#"<ul><li v-for="(row, i) in rows" :class="{ odd: i % 2 }">{{ i }}: {{ row.label }}</li></ul>"#;

fn rows(count: usize) -> Value {
    Value::array((0..count).map(|i| Value::object([("label", Value::from(format!("row {i}")))])))
}

fn components() -> Arc<dyn CustomComponents> {
    Arc::new(HashSet::<String>::new())
}

fn bench_initial_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_render");
    for count in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let data = reactive([Value::object([("rows", rows(count))])]);
                let view = render_template(TEMPLATE, &data, &TemplateRefs::new(), components())
                    .ok()
                    .flatten();
                run_animation_frame();
                black_box(view)
            });
        });
    }
    group.finish();
}

fn bench_rerender(c: &mut Criterion) {
    let mut group = c.benchmark_group("rerender");
    for count in [10usize, 100, 1000] {
        let data = reactive([Value::object([("rows", rows(count))])]);
        let view = render_template(TEMPLATE, &data, &TemplateRefs::new(), components())
            .ok()
            .flatten();
        run_animation_frame();

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| data.set("rows", black_box(rows(count))));
        });
        drop(view);
    }
    group.finish();
}

fn bench_text_update(c: &mut Criterion) {
    let data = reactive([Value::object([("n", Value::from(0))])]);
    let _view = render_template("<p>{{ n * 2 }} / {{ n + 1 }}</p>", &data, &TemplateRefs::new(), components());
    let mut n = 0;
    c.bench_function("text_update", |b| {
        b.iter(|| {
            n += 1;
            data.set("n", Value::from(n));
        });
    });
}

criterion_group!(benches, bench_initial_render, bench_rerender, bench_text_update);
criterion_main!(benches);
