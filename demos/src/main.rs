//! Демо blockbus
//!
//! Поднимает in-memory брокер, создаёт Publisher и Consumer для одного
//! ресурса по статической конфигурации блоков, публикует несколько заказов
//! и останавливает приём по Ctrl+C или после обработки всех сообщений.

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use blockbus::{
    init_logging, Consumer, ConsumerFailure, Encoding, HandlerError, Headers, InMemoryBroker,
    LoggingConfig, Payload, Publisher, Settings, StaticConfigProvider,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const RESOURCE: &str = "orders";

/// Конфигурация блоков по умолчанию: магазин публикует заказы, биллинг их
/// получает.
const DEFAULT_BLOCKS: &str = r#"{
  "providers": {
    "orders": [{
      "instanceId": "billing-1",
      "block": {
        "kind": "core/block-type-service",
        "metadata": { "name": "billing" },
        "spec": { "consumers": [
          { "metadata": { "name": "order-events" }, "spec": { "topic": "orders-topic" } }
        ] }
      },
      "connections": [{
        "provider": { "blockId": "shop", "resourceName": "orders" },
        "consumer": { "blockId": "billing", "resourceName": "order-events" }
      }]
    }]
  },
  "consumers": {
    "orders": {
      "instanceId": "shop-1",
      "block": {
        "kind": "core/block-type-service",
        "metadata": { "name": "shop" },
        "spec": { "providers": [
          { "metadata": { "name": "orders" },
            "spec": { "topic": "orders-topic", "subscription": "orders-billing" } }
        ] }
      }
    }
  }
}"#;

#[derive(Parser)]
#[command(name = "blockbus-demo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish and consume typed orders through the in-memory broker", long_about = None)]
struct Cli {
    /// Сколько заказов опубликовать
    #[arg(short, long, default_value = "10")]
    messages: u64,
    /// Кодировка тела сообщений (переопределяет файл настроек)
    #[arg(short, long, value_enum)]
    encoding: Option<EncodingArg>,
    /// JSON-документ с конфигурацией блоков
    #[arg(long, env = "BLOCKBUS_BLOCKS")]
    blocks: Option<PathBuf>,
    /// Каждый N-й заказ обработчик отклоняет один раз
    #[arg(long, default_value = "0")]
    reject_every: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Json,
    MessagePack,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Json => Encoding::Json,
            EncodingArg::MessagePack => Encoding::MessagePack,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Order {
    id: u64,
    item: String,
    amount_cents: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let logging = init_logging(LoggingConfig::default()).context("failed to initialize logging")?;

    let mut settings = Settings::load().context("failed to load settings")?;
    if let Some(encoding) = cli.encoding {
        settings.encoding = encoding.into();
    }

    let config = match &cli.blocks {
        Some(path) => StaticConfigProvider::from_path(path)
            .with_context(|| format!("failed to read block configuration {}", path.display()))?,
        None => StaticConfigProvider::from_json_str(DEFAULT_BLOCKS)?,
    };

    let broker = InMemoryBroker::new();
    let handled = Arc::new(AtomicU64::new(0));
    let done = CancellationToken::new();

    let rejected = Arc::new(Mutex::new(HashSet::new()));

    let handler = {
        let handled = handled.clone();
        let done = done.clone();
        let expected = cli.messages;
        let reject_every = cli.reject_every;
        move |order: Order, headers: Headers| {
            let handled = handled.clone();
            let done = done.clone();
            let rejected = rejected.clone();
            async move {
                let reject = reject_every > 0
                    && order.id % reject_every == 0
                    && rejected
                        .lock()
                        .map(|mut ids| ids.insert(order.id))
                        .unwrap_or(false);
                if reject {
                    return Err::<(), HandlerError>(format!("order {} rejected", order.id).into());
                }
                info!(
                    id = order.id,
                    item = %order.item,
                    amount_cents = order.amount_cents,
                    source = headers.get("source").map(String::as_str).unwrap_or("-"),
                    "Order handled"
                );
                if handled.fetch_add(1, Ordering::SeqCst) + 1 >= expected {
                    done.cancel();
                }
                Ok(())
            }
        }
    };

    let consumer = Arc::new(
        Consumer::<Order>::create_with(&config, &broker.connector(), RESOURCE, handler, &settings)
            .await
            .context("failed to create consumer")?,
    );
    let (failures_tx, mut failures_rx) = mpsc::unbounded_channel();
    consumer.report_failures_to(failures_tx);
    tokio::spawn(async move {
        while let Some(failure) = failures_rx.recv().await {
            match failure {
                ConsumerFailure::Handler { message_id, reason } => {
                    warn!(%message_id, %reason, "Handler rejected message")
                }
                other => warn!(?other, "Consumer failure"),
            }
        }
    });

    let cancel = CancellationToken::new();
    let receiving = {
        let consumer = consumer.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { consumer.receive_messages(cancel).await })
    };

    let publisher = Publisher::<Order>::create_with(&config, &broker.connector(), RESOURCE, &settings)
        .await
        .context("failed to create publisher")?;
    for id in 1..=cli.messages {
        let order = Order {
            id,
            item: format!("item-{id}"),
            amount_cents: id * 250,
        };
        let message_id = publisher
            .publish(Payload::new(order).header("source", "blockbus-demo"))
            .await?;
        info!(id, %message_id, "Order published");
    }

    if cli.messages > 0 {
        tokio::select! {
            _ = done.cancelled() => info!("All orders handled"),
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            _ = tokio::time::sleep(Duration::from_secs(30)) => warn!("Timed out waiting for orders"),
        }
    }

    cancel.cancel();
    receiving.await??;

    if let Some(stats) = broker.stats(consumer.subscription()) {
        info!(
            delivered = stats.delivered,
            acked = stats.acked,
            nacked = stats.nacked,
            dead_lettered = stats.dead_lettered,
            "Subscription stats"
        );
    }

    publisher.close().await?;
    consumer.close().await?;
    logging.shutdown_async(Duration::from_secs(2)).await;
    Ok(())
}
