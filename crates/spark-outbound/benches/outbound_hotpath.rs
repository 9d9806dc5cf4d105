//! 出站热路径基准：入队 → 刷写 → 排空的闭环开销。
//!
//! 关注点是池化条目的复用与原子记账的摊销成本；每轮迭代结束时缓冲结构性归零，
//! 因此可以安全地跨迭代复用同一实例，测量的是稳态而非首轮分配。

use std::hint::black_box;
use std::sync::Arc;

use bytes::Bytes;
use criterion::{Criterion, criterion_group, criterion_main};
use spark_outbound::test_stubs::NoopWritabilityListener;
use spark_outbound::{OutboundBuffer, OutboundMessage, WritePromise};

const BATCH: usize = 64;
const PAYLOAD_LEN: usize = 128;

fn bench_add_flush_remove(c: &mut Criterion) {
    let payload = Bytes::from(vec![0x5Au8; PAYLOAD_LEN]);
    let mut buf = OutboundBuffer::with_defaults(Arc::new(NoopWritabilityListener));

    c.bench_function("outbound/add_flush_remove_64x128", |b| {
        b.iter(|| {
            for _ in 0..BATCH {
                let (promise, receipt) = WritePromise::pair();
                buf.add_message(OutboundMessage::from(payload.clone()), PAYLOAD_LEN, promise);
                black_box(receipt);
            }
            buf.add_flush();
            while buf.remove() {}
            debug_assert!(buf.is_empty());
        });
    });
}

fn bench_cancel_refund(c: &mut Criterion) {
    let payload = Bytes::from(vec![0x5Au8; PAYLOAD_LEN]);
    let mut buf = OutboundBuffer::with_defaults(Arc::new(NoopWritabilityListener));

    c.bench_function("outbound/cancel_refund_64x128", |b| {
        b.iter(|| {
            let tickets: Vec<_> = (0..BATCH)
                .map(|_| {
                    let (promise, receipt) = WritePromise::pair();
                    black_box(receipt);
                    buf.add_message(OutboundMessage::from(payload.clone()), PAYLOAD_LEN, promise)
                })
                .collect();
            for ticket in &tickets {
                black_box(buf.cancel(ticket));
            }
            buf.add_flush();
            while buf.remove() {}
        });
    });
}

criterion_group!(benches, bench_add_flush_remove, bench_cancel_refund);
criterion_main!(benches);
