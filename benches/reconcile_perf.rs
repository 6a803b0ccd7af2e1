use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use meeting_lists::filter::{FilterDefinition, FilterOption, apply_definitions};
use meeting_lists::search::{SearchConfig, row_matches};
use meeting_lists::table::RowReconciler;
use serde_json::{Value, json};
use std::hint::black_box;

fn sample_rows(count: i64, revision: i64) -> Vec<Value> {
    (0..count)
        .map(|id| {
            json!({
                "id": id,
                "name": format!("Participant {id}"),
                "group_ids": [id % 5, (id + 1) % 7],
                "is_present": id % 3 == 0,
                "revision": revision,
            })
        })
        .collect()
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_data_table");
    for size in [1_000i64, 10_000] {
        // Live field update: every id survives, half of them selected.
        group.bench_with_input(BenchmarkId::new("reemit", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let table = RowReconciler::new();
                    table.build_data_table(sample_rows(size, 0));
                    for id in (0..size).step_by(2) {
                        table.toggle(id);
                    }
                    (table, sample_rows(size, 1))
                },
                |(table, next)| black_box(table.build_data_table(next)),
                BatchSize::LargeInput,
            );
        });

        // Window shift: a tenth of the rows leaves, a tenth arrives.
        group.bench_with_input(BenchmarkId::new("shift", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let table = RowReconciler::new();
                    table.build_data_table(sample_rows(size, 0));
                    let next: Vec<Value> = sample_rows(size + size / 10, 1)
                        .into_iter()
                        .skip((size / 10) as usize)
                        .collect();
                    (table, next)
                },
                |(table, next)| black_box(table.build_data_table(next)),
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_filter_and_search(c: &mut Criterion) {
    let rows = sample_rows(10_000, 0);
    let definitions = vec![
        FilterDefinition::new("group_ids", "Groups").with_options(vec![
            FilterOption::new(json!(2), "Delegates").active().into(),
            FilterOption::new(json!(4), "Guests").active().into(),
        ]),
        FilterDefinition::new("is_present", "Presence")
            .with_options(vec![FilterOption::new(json!(true), "Present").active().into()]),
    ];
    c.bench_function("apply_definitions_10k", |b| {
        b.iter(|| black_box(apply_definitions(&definitions, &rows)))
    });

    let config = SearchConfig::new(["name", "group_ids"]);
    c.bench_function("search_10k", |b| {
        b.iter(|| {
            black_box(
                rows.iter()
                    .filter(|row| row_matches(&config, *row, "participant 99"))
                    .count(),
            )
        })
    });
}

criterion_group!(reconcile_perf, bench_reconcile, bench_filter_and_search);
criterion_main!(reconcile_perf);
