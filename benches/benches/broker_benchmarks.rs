use std::{
    hint::black_box,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use blockbus::{
    BrokerConnector, Consumer, HandlerError, Headers, InMemoryBroker, OutboundMessage, Payload,
    Publisher, StaticConfigProvider,
};
use criterion::{criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

const BLOCKS: &str = r#"{
  "providers": { "orders": [{
    "block": { "kind": "service", "metadata": { "name": "billing" },
               "spec": { "consumers": [ { "metadata": { "name": "events" }, "spec": { "topic": "orders" } } ] } },
    "connections": [{ "provider": { "resourceName": "orders" }, "consumer": { "resourceName": "events" } }]
  }] },
  "consumers": { "orders": {
    "block": { "kind": "service", "metadata": { "name": "shop" },
               "spec": { "providers": [ { "metadata": { "name": "orders" },
                                          "spec": { "topic": "orders", "subscription": "orders-sub" } } ] } }
  } }
}"#;

fn bench_raw_publish(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    for fanout in [0usize, 1, 10] {
        let broker = InMemoryBroker::new();
        let client = rt.block_on(async {
            let client = broker.connector().connect().await.unwrap();
            client.create_topic("chan").await.unwrap();
            for i in 0..fanout {
                client
                    .create_subscription(&format!("sub-{i}"), "chan")
                    .await
                    .unwrap();
            }
            client
        });

        c.bench_function(&format!("raw_publish_{fanout}_subs"), |b| {
            b.iter(|| {
                rt.block_on(client.publish("chan", black_box(OutboundMessage::new(&b"x"[..]))))
                    .unwrap()
            })
        });
    }
}

fn bench_typed_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = StaticConfigProvider::from_json_str(BLOCKS).unwrap();
    let broker = InMemoryBroker::new();
    let handled = Arc::new(AtomicU64::new(0));

    let (publisher, consumer) = rt.block_on(async {
        let counter = handled.clone();
        let consumer = Consumer::<u64>::create(
            &config,
            &broker.connector(),
            "orders",
            move |_value: u64, _headers: Headers| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::Relaxed);
                    Ok::<(), HandlerError>(())
                }
            },
        )
        .await
        .unwrap();
        let publisher = Publisher::<u64>::create(&config, &broker.connector(), "orders")
            .await
            .unwrap();
        (publisher, Arc::new(consumer))
    });

    let cancel = CancellationToken::new();
    let receiving = {
        let consumer = consumer.clone();
        let cancel = cancel.clone();
        rt.spawn(async move { consumer.receive_messages(cancel).await })
    };

    c.bench_function("typed_publish_and_handle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let target = handled.load(Ordering::Relaxed) + 1;
                publisher.publish(Payload::new(black_box(7))).await.unwrap();
                while handled.load(Ordering::Relaxed) < target {
                    tokio::task::yield_now().await;
                }
            })
        })
    });

    cancel.cancel();
    rt.block_on(receiving).unwrap().unwrap();
}

criterion_group!(benches, bench_raw_publish, bench_typed_round_trip);
criterion_main!(benches);
