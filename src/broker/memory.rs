use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;
use tokio::{sync::Notify, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use uuid::Uuid;

use super::{
    AckHandler, BrokerClient, BrokerConnector, MessageStream, OutboundMessage, ReceivedMessage,
};
use crate::{
    error::{BrokerError, ResourceKind},
    model::Headers,
};

/// Брокер в памяти процесса.
///
/// Поддерживает:
/// - topic и subscription, привязанную к одному topic
/// - рассылку каждого сообщения во все subscription topic
/// - конкурирующих получателей одной subscription
/// - повторную доставку после nack с увеличенным номером попытки, не раньше
///   чем через [`DEFAULT_REDELIVERY_DELAY`]
/// - отбрасывание сообщения после `max_delivery_attempts` доставок
/// - счётчики публикаций и подтверждений
///
/// Клоны разделяют одно состояние. Клиенты создаются через
/// [`InMemoryBroker::connector`].
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

/// [`BrokerConnector`] поверх [`InMemoryBroker`].
#[derive(Clone)]
pub struct MemoryConnector {
    state: Arc<BrokerState>,
}

/// Снимок счётчиков одной subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionStats {
    pub topic: String,
    /// Ожидают доставки
    pub pending: usize,
    /// Выданы получателю и ещё не подтверждены
    pub in_flight: usize,
    pub delivered: u64,
    pub acked: u64,
    pub nacked: u64,
    /// Отброшены после исчерпания `max_delivery_attempts`
    pub dead_lettered: u64,
}

/// Пауза перед повторной доставкой отклонённого сообщения.
pub const DEFAULT_REDELIVERY_DELAY: Duration = Duration::from_millis(100);

/// Параметры повторной доставки, общие для всех subscription брокера.
struct Redelivery {
    delay_ms: AtomicU64,
    /// 0: без ограничения
    max_attempts: AtomicU32,
}

#[derive(Default)]
struct BrokerState {
    /// topic → subscriptions этого topic
    topics: DashMap<String, Vec<Arc<SubscriptionQueue>>>,
    subscriptions: DashMap<String, Arc<SubscriptionQueue>>,
    published: AtomicU64,
    open_clients: AtomicUsize,
    unavailable: AtomicBool,
    provisioning_denied: AtomicBool,
    failing_subscribes: AtomicU32,
    redelivery: Arc<Redelivery>,
}

struct Delivery {
    id: String,
    data: Bytes,
    attributes: Headers,
    attempt: u32,
    /// Не выдавать раньше этого момента
    not_before: Option<Instant>,
}

struct SubscriptionQueue {
    topic: String,
    pending: Mutex<VecDeque<Delivery>>,
    notify: Notify,
    /// Отменяется при удалении subscription; открытые потоки завершаются
    deleted: CancellationToken,
    redelivery: Arc<Redelivery>,
    in_flight: AtomicUsize,
    delivered: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
    dead_lettered: AtomicU64,
}

struct MemoryClient {
    state: Arc<BrokerState>,
    closed: CancellationToken,
    released: AtomicBool,
}

struct MemoryStream {
    queue: Arc<SubscriptionQueue>,
    client_closed: CancellationToken,
}

struct MemoryAck {
    queue: Arc<SubscriptionQueue>,
    delivery: Option<Delivery>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            state: self.state.clone(),
        }
    }

    /// Имена topic в алфавитном порядке.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.topics.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Имена subscription в алфавитном порядке.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .subscriptions
            .iter()
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn stats(
        &self,
        subscription: &str,
    ) -> Option<SubscriptionStats> {
        let queue = self.state.subscriptions.get(subscription)?.clone();
        Some(queue.stats())
    }

    /// Сколько сообщений принято к публикации.
    pub fn published(&self) -> u64 {
        self.state.published.load(Ordering::Relaxed)
    }

    /// Сколько клиентов создано и ещё не закрыто.
    pub fn open_clients(&self) -> usize {
        self.state.open_clients.load(Ordering::SeqCst)
    }

    /// Удаляет subscription. Открытые потоки завершаются (`Ok(None)`),
    /// недоставленные сообщения теряются.
    pub fn delete_subscription(
        &self,
        subscription: &str,
    ) -> bool {
        let Some((_, queue)) = self.state.subscriptions.remove(subscription) else {
            return false;
        };
        if let Some(mut subs) = self.state.topics.get_mut(&queue.topic) {
            subs.retain(|q| !Arc::ptr_eq(q, &queue));
        }
        queue.deleted.cancel();
        debug!(%subscription, "Deleted in-memory subscription");
        true
    }

    /// Переводит брокер в недоступное состояние: подключение и все операции
    /// клиентов завершаются транспортной ошибкой.
    pub fn set_available(
        &self,
        available: bool,
    ) {
        self.state.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Запрещает создание topic и subscription.
    pub fn deny_provisioning(
        &self,
        denied: bool,
    ) {
        self.state
            .provisioning_denied
            .store(denied, Ordering::SeqCst);
    }

    /// Пауза перед повторной доставкой после nack (по умолчанию
    /// [`DEFAULT_REDELIVERY_DELAY`]).
    pub fn set_redelivery_delay(
        &self,
        delay: Duration,
    ) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.redelivery.delay_ms.store(ms, Ordering::SeqCst);
    }

    /// После скольких доставок отклонённое сообщение отбрасывается
    /// (`None`: повторять без ограничения).
    pub fn set_max_delivery_attempts(
        &self,
        max_attempts: Option<u32>,
    ) {
        self.state
            .redelivery
            .max_attempts
            .store(max_attempts.unwrap_or(0), Ordering::SeqCst);
    }

    /// Следующие `count` вызовов `subscribe` завершатся ошибкой.
    pub fn fail_next_subscribes(
        &self,
        count: u32,
    ) {
        self.state
            .failing_subscribes
            .store(count, Ordering::SeqCst);
    }
}

impl Default for Redelivery {
    fn default() -> Self {
        Self {
            delay_ms: AtomicU64::new(DEFAULT_REDELIVERY_DELAY.as_millis() as u64),
            max_attempts: AtomicU32::new(0),
        }
    }
}

impl Redelivery {
    fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::SeqCst))
    }

    fn exhausted(
        &self,
        attempts: u32,
    ) -> bool {
        let max = self.max_attempts.load(Ordering::SeqCst);
        max > 0 && attempts >= max
    }
}

impl BrokerState {
    fn check_available(&self) -> Result<(), BrokerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Transport {
                reason: "in-memory broker is unavailable".into(),
            });
        }
        Ok(())
    }

    fn check_provisioning(&self) -> Result<(), BrokerError> {
        if self.provisioning_denied.load(Ordering::SeqCst) {
            return Err(BrokerError::Transport {
                reason: "provisioning is denied".into(),
            });
        }
        Ok(())
    }

    fn take_subscribe_failure(&self) -> bool {
        self.failing_subscribes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl SubscriptionQueue {
    fn new(
        topic: &str,
        redelivery: Arc<Redelivery>,
    ) -> Self {
        Self {
            topic: topic.to_string(),
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            deleted: CancellationToken::new(),
            redelivery,
            in_flight: AtomicUsize::new(0),
            delivered: AtomicU64::new(0),
            acked: AtomicU64::new(0),
            nacked: AtomicU64::new(0),
            dead_lettered: AtomicU64::new(0),
        }
    }

    fn push(
        &self,
        delivery: Delivery,
    ) {
        self.pending.lock().push_back(delivery);
        self.notify.notify_waiters();
    }

    /// Первое сообщение, готовое к выдаче. Если готовых нет, возвращает
    /// ближайший момент, когда одно из отложенных станет доступным.
    fn pop_ready(
        &self,
        now: Instant,
    ) -> Result<Delivery, Option<Instant>> {
        let mut pending = self.pending.lock();
        let ready = pending
            .iter()
            .position(|d| d.not_before.map_or(true, |at| at <= now));
        match ready.and_then(|pos| pending.remove(pos)) {
            Some(delivery) => Ok(delivery),
            None => Err(pending.iter().filter_map(|d| d.not_before).min()),
        }
    }

    fn deliver(
        self: &Arc<Self>,
        delivery: Delivery,
    ) -> ReceivedMessage {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.delivered.fetch_add(1, Ordering::Relaxed);
        ReceivedMessage::new(
            delivery.id.clone(),
            delivery.data.clone(),
            delivery.attributes.clone(),
            delivery.attempt,
            Box::new(MemoryAck {
                queue: self.clone(),
                delivery: Some(delivery),
            }),
        )
    }

    fn stats(&self) -> SubscriptionStats {
        SubscriptionStats {
            topic: self.topic.clone(),
            pending: self.pending.lock().len(),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            delivered: self.delivered.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

impl MemoryAck {
    fn settle(
        &mut self,
        ack: bool,
    ) {
        let Some(mut delivery) = self.delivery.take() else {
            return;
        };
        self.queue.in_flight.fetch_sub(1, Ordering::SeqCst);
        if ack {
            self.queue.acked.fetch_add(1, Ordering::Relaxed);
            trace!(id = %delivery.id, "Message acked");
        } else {
            self.queue.nacked.fetch_add(1, Ordering::Relaxed);
            trace!(id = %delivery.id, attempt = delivery.attempt, "Message nacked");
            if self.queue.deleted.is_cancelled() {
                return;
            }
            let redelivery = &self.queue.redelivery;
            if redelivery.exhausted(delivery.attempt) {
                self.queue.dead_lettered.fetch_add(1, Ordering::Relaxed);
                debug!(
                    id = %delivery.id,
                    attempts = delivery.attempt,
                    "Dropping message after max delivery attempts"
                );
                return;
            }
            delivery.attempt += 1;
            delivery.not_before = Some(Instant::now() + redelivery.delay());
            self.queue.push(delivery);
        }
    }
}

impl AckHandler for MemoryAck {
    fn ack(mut self: Box<Self>) {
        self.settle(true);
    }

    fn nack(mut self: Box<Self>) {
        self.settle(false);
    }
}

impl Drop for MemoryAck {
    fn drop(&mut self) {
        // Неподтверждённое сообщение возвращается в очередь
        self.settle(false);
    }
}

impl MemoryClient {
    fn check(&self) -> Result<(), BrokerError> {
        if self.closed.is_cancelled() {
            return Err(BrokerError::ClientClosed);
        }
        self.state.check_available()
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.closed.cancel();
            self.state.open_clients.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl BrokerConnector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn BrokerClient>, BrokerError> {
        self.state
            .check_available()
            .map_err(|e| BrokerError::Connect {
                reason: e.to_string(),
            })?;
        self.state.open_clients.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryClient {
            state: self.state.clone(),
            closed: CancellationToken::new(),
            released: AtomicBool::new(false),
        }))
    }
}

#[async_trait]
impl BrokerClient for MemoryClient {
    async fn topic_exists(
        &self,
        topic: &str,
    ) -> Result<bool, BrokerError> {
        self.check()?;
        Ok(self.state.topics.contains_key(topic))
    }

    async fn create_topic(
        &self,
        topic: &str,
    ) -> Result<(), BrokerError> {
        self.check()?;
        self.state.check_provisioning()?;
        match self.state.topics.entry(topic.to_string()) {
            Entry::Occupied(_) => Err(BrokerError::AlreadyExists {
                kind: ResourceKind::Topic,
                name: topic.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Vec::new());
                Ok(())
            }
        }
    }

    async fn subscription_exists(
        &self,
        subscription: &str,
    ) -> Result<bool, BrokerError> {
        self.check()?;
        Ok(self.state.subscriptions.contains_key(subscription))
    }

    async fn create_subscription(
        &self,
        subscription: &str,
        topic: &str,
    ) -> Result<(), BrokerError> {
        self.check()?;
        self.state.check_provisioning()?;
        if !self.state.topics.contains_key(topic) {
            return Err(BrokerError::TopicNotFound {
                topic: topic.to_string(),
            });
        }

        let queue = match self.state.subscriptions.entry(subscription.to_string()) {
            Entry::Occupied(_) => {
                return Err(BrokerError::AlreadyExists {
                    kind: ResourceKind::Subscription,
                    name: subscription.to_string(),
                })
            }
            Entry::Vacant(slot) => slot
                .insert(Arc::new(SubscriptionQueue::new(
                    topic,
                    self.state.redelivery.clone(),
                )))
                .clone(),
        };

        if let Some(mut subs) = self.state.topics.get_mut(topic) {
            subs.push(queue);
        }
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        message: OutboundMessage,
    ) -> Result<String, BrokerError> {
        self.check()?;
        let queues = match self.state.topics.get(topic) {
            Some(subs) => subs.value().clone(),
            None => {
                return Err(BrokerError::TopicNotFound {
                    topic: topic.to_string(),
                })
            }
        };

        let id = Uuid::new_v4().to_string();
        for queue in &queues {
            queue.push(Delivery {
                id: id.clone(),
                data: message.data.clone(),
                attributes: message.attributes.clone(),
                attempt: 1,
                not_before: None,
            });
        }
        self.state.published.fetch_add(1, Ordering::Relaxed);
        trace!(%topic, %id, fanout = queues.len(), "Published message");
        Ok(id)
    }

    async fn subscribe(
        &self,
        subscription: &str,
    ) -> Result<Box<dyn MessageStream>, BrokerError> {
        self.check()?;
        if self.state.take_subscribe_failure() {
            return Err(BrokerError::Subscribe {
                subscription: subscription.to_string(),
                reason: "stream could not be opened".into(),
            });
        }
        let queue = self
            .state
            .subscriptions
            .get(subscription)
            .map(|q| q.value().clone())
            .ok_or_else(|| BrokerError::SubscriptionNotFound {
                subscription: subscription.to_string(),
            })?;

        Ok(Box::new(MemoryStream {
            queue,
            client_closed: self.closed.clone(),
        }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.release();
        Ok(())
    }
}

#[async_trait]
impl MessageStream for MemoryStream {
    async fn next_message(&mut self) -> Result<Option<ReceivedMessage>, BrokerError> {
        loop {
            let notified = self.queue.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.client_closed.is_cancelled() {
                return Err(BrokerError::ClientClosed);
            }
            if self.queue.deleted.is_cancelled() {
                return Ok(None);
            }
            let wake_at = match self.queue.pop_ready(Instant::now()) {
                Ok(delivery) => return Ok(Some(self.queue.deliver(delivery))),
                Err(wake_at) => wake_at,
            };

            tokio::select! {
                _ = &mut notified => {}
                _ = self.client_closed.cancelled() => {}
                _ = self.queue.deleted.cancelled() => {}
                _ = sleep_until(wake_at) => {}
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
