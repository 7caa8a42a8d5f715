use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Allocated, AllocationEvent, Deallocated};
use projections::{AllocationsView, Projection};

fn allocation_events(orders: usize) -> Vec<AllocationEvent> {
    let mut events = Vec::with_capacity(orders * 2);
    for n in 0..orders {
        events.push(
            Allocated {
                order_id: format!("order-{n}").into(),
                sku: "BENCH-SKU".into(),
                quantity: 1,
                batch_reference: format!("batch-{}", n % 10).into(),
            }
            .into(),
        );
    }
    for n in (0..orders).step_by(2) {
        events.push(
            Deallocated {
                order_id: format!("order-{n}").into(),
                sku: "BENCH-SKU".into(),
                quantity: 1,
            }
            .into(),
        );
    }
    events
}

fn bench_apply(c: &mut Criterion, orders: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let events = allocation_events(orders);

    c.bench_function(&format!("projections/apply_{orders}_orders"), |b| {
        b.iter(|| {
            rt.block_on(async {
                let view = AllocationsView::new();
                for event in &events {
                    view.handle(event).await.unwrap();
                }
            });
        });
    });
}

fn bench_apply_100_orders(c: &mut Criterion) {
    bench_apply(c, 100);
}

fn bench_apply_1000_orders(c: &mut Criterion) {
    bench_apply(c, 1_000);
}

criterion_group!(benches, bench_apply_100_orders, bench_apply_1000_orders);
criterion_main!(benches);
