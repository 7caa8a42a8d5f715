use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Allocate, ChangeBatchQuantity, CreateBatch};
use service::{Config, InMemoryCollaborators, MessageBus};

async fn seeded_bus(batches: usize) -> MessageBus {
    let mut bus = InMemoryCollaborators::new()
        .bus(&Config::default())
        .unwrap();
    for i in 0..batches {
        bus.handle(CreateBatch::new(format!("batch-{i:04}"), "BENCH-SKU", 1_000, None))
            .await
            .unwrap();
    }
    bus
}

fn bench_allocate_commands(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("messagebus/allocate_100_orders", |b| {
        b.to_async(&rt).iter(|| async {
            let mut bus = seeded_bus(10).await;
            for n in 0..100 {
                bus.handle(Allocate::new(format!("order-{n}"), "BENCH-SKU", 5))
                    .await
                    .unwrap();
            }
        });
    });
}

fn bench_reallocation_cascade(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("messagebus/evict_and_reallocate_50_lines", |b| {
        b.to_async(&rt).iter(|| async {
            let mut bus = seeded_bus(2).await;
            for n in 0..50 {
                bus.handle(Allocate::new(format!("order-{n}"), "BENCH-SKU", 10))
                    .await
                    .unwrap();
            }
            bus.handle(ChangeBatchQuantity::new("batch-0000", 0))
                .await
                .unwrap();
        });
    });
}

criterion_group!(benches, bench_allocate_commands, bench_reallocation_cascade);
criterion_main!(benches);
