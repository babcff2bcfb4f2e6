use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use backoff::backoff::Backoff;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use tokio::{
    sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore},
    task::{JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{Encoding, MessageHandler};
use crate::{
    broker::{
        ensure_subscription, ensure_topic, BrokerClient, BrokerConnector, MessageStream,
        ReceivedMessage,
    },
    config::{ConfigProvider, ConsumerSettings, Settings},
    error::{
        BrokerError, ClosedError, ConsumerError, EntryKind, PubSubError, PubSubResult,
        ResolutionError, SerializationError,
    },
    model::{EntryRole, TopicSubscriptionSpec},
    resolver::{decode_block, resolve_provider_topic_subscription},
};

const COMPONENT: &str = "consumer";

/// Этап жизненного цикла Consumer.
///
/// `Resolving` и `Provisioning` проходят внутри [`Consumer::create_with`] и
/// видны только в логах (поле `state`). Канал [`Consumer::watch_state`]
/// появляется вместе с готовым получателем и начинается с `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Создан: topic/subscription разрешены и подготовлены, приём не идёт
    Idle,
    Resolving,
    Provisioning,
    Receiving,
    /// Отмена получена, ждём завершения обработчиков
    Draining,
    Stopped,
}

/// Сбой, о котором Consumer сообщает через канал отчётов.
///
/// Ошибки отдельных сообщений не прерывают цикл приёма; транспортные
/// сбои повторяются согласно политике.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerFailure {
    /// Тело сообщения не декодируется в ожидаемый тип (сообщение отклонено)
    Decode {
        message_id: String,
        error: SerializationError,
    },
    /// Обработчик вернул ошибку (сообщение отклонено)
    Handler { message_id: String, reason: String },
    /// Подписка не открылась или поток сообщений оборвался
    Transport { attempt: u32, error: BrokerError },
}

/// Типизированный получатель одной subscription.
///
/// Topic и subscription берутся из provider-записи блока потребителя.
/// Владеет собственным клиентом брокера до вызова [`Consumer::close`].
pub struct Consumer<T> {
    resource_name: String,
    topic: String,
    subscription: String,
    settings: ConsumerSettings,
    client: Box<dyn BrokerClient>,
    dispatcher: Arc<Dispatcher<T>>,
    state: watch::Sender<ConsumerState>,
    receiving: AtomicBool,
    closed: AtomicBool,
}

/// Общая для задач обработки часть Consumer.
struct Dispatcher<T> {
    subscription: String,
    encoding: Encoding,
    handler: Arc<dyn MessageHandler<T>>,
    failures: Mutex<Option<mpsc::UnboundedSender<ConsumerFailure>>>,
}

/// Снимает флаг активного приёма при выходе из цикла.
struct ReceivingGuard<'a>(&'a AtomicBool);

enum PumpEnd {
    Cancelled,
    Failed(BrokerError),
}

impl fmt::Display for ConsumerState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Provisioning => "provisioning",
            Self::Receiving => "receiving",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

impl<T> Consumer<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Создаёт получателя с настройками по умолчанию.
    pub async fn create<P, C, H>(
        config: &P,
        connector: &C,
        resource_name: &str,
        handler: H,
    ) -> PubSubResult<Self>
    where
        P: ConfigProvider + ?Sized,
        C: BrokerConnector + ?Sized,
        H: MessageHandler<T>,
    {
        Self::create_with(config, connector, resource_name, handler, &Settings::default()).await
    }

    /// Разрешает topic/subscription и создаёт их у брокера при
    /// необходимости. Фоновая работа не запускается; при ошибке полученный
    /// клиент закрывается.
    pub async fn create_with<P, C, H>(
        config: &P,
        connector: &C,
        resource_name: &str,
        handler: H,
        settings: &Settings,
    ) -> PubSubResult<Self>
    where
        P: ConfigProvider + ?Sized,
        C: BrokerConnector + ?Sized,
        H: MessageHandler<T>,
    {
        debug!(resource = %resource_name, state = %ConsumerState::Resolving, "Resolving consumer");
        let spec = resolve(config, resource_name).await?;

        debug!(
            resource = %resource_name,
            state = %ConsumerState::Provisioning,
            topic = %spec.topic,
            subscription = %spec.subscription,
            "Provisioning consumer"
        );
        let client = connector.connect().await?;
        if let Err(err) = provision(client.as_ref(), &spec).await {
            if let Err(close_err) = client.close().await {
                warn!(subscription = %spec.subscription, error = %close_err, "Failed to release broker client");
            }
            return Err(err.into());
        }

        let (state, _) = watch::channel(ConsumerState::Idle);
        info!(
            resource = %resource_name,
            topic = %spec.topic,
            subscription = %spec.subscription,
            "Consumer created"
        );

        Ok(Self {
            resource_name: resource_name.to_string(),
            dispatcher: Arc::new(Dispatcher {
                subscription: spec.subscription.clone(),
                encoding: settings.encoding,
                handler: Arc::new(handler),
                failures: Mutex::new(None),
            }),
            topic: spec.topic,
            subscription: spec.subscription,
            settings: settings.consumer.clone(),
            client,
            state,
            receiving: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Цикл приёма сообщений до отмены `cancel`.
    ///
    /// Каждое сообщение обрабатывается в отдельной задаче (не больше
    /// `max_outstanding_messages` одновременно): ошибка декодирования или
    /// обработчика отклоняет сообщение, успех подтверждает. Сбои подписки
    /// повторяются с экспоненциальной задержкой; когда политика повторов
    /// исчерпана, возвращается `ConsumerError::RetriesExhausted`.
    ///
    /// После отмены обработчики получают `drain_timeout_ms` на завершение,
    /// затем прерываются. После возврата новых вызовов обработчика нет.
    pub async fn receive_messages(
        &self,
        cancel: CancellationToken,
    ) -> PubSubResult<()> {
        self.ensure_open()?;
        if self.receiving.swap(true, Ordering::SeqCst) {
            return Err(ConsumerError::AlreadyReceiving {
                subscription: self.subscription.clone(),
            }
            .into());
        }
        let _guard = ReceivingGuard(&self.receiving);

        self.set_state(ConsumerState::Receiving);
        info!(subscription = %self.subscription, "Receiving messages");

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency()));
        let mut tasks = JoinSet::new();
        let result = self.run(&cancel, &semaphore, &mut tasks).await;

        self.drain(&mut tasks).await;
        self.set_state(ConsumerState::Stopped);
        match &result {
            Ok(()) => info!(subscription = %self.subscription, "Stopped receiving messages"),
            Err(err) => error!(subscription = %self.subscription, error = %err, "Receive loop failed"),
        }
        result
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        semaphore: &Arc<Semaphore>,
        tasks: &mut JoinSet<()>,
    ) -> PubSubResult<()> {
        let policy = self.settings.retry;
        let mut backoff = policy.backoff();
        let mut failures: u32 = 0;

        loop {
            let subscribed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                res = self.client.subscribe(&self.subscription) => res,
            };

            let err = match subscribed {
                Ok(mut stream) => {
                    debug!(subscription = %self.subscription, "Subscribed");
                    backoff.reset();
                    failures = 0;
                    match self.pump(stream.as_mut(), cancel, semaphore, tasks).await {
                        PumpEnd::Cancelled => return Ok(()),
                        PumpEnd::Failed(err) => err,
                    }
                }
                Err(err) => err,
            };

            if err == BrokerError::ClientClosed {
                return Err(ClosedError::new(COMPONENT, &self.subscription).into());
            }

            failures = failures.saturating_add(1);
            self.dispatcher.report(ConsumerFailure::Transport {
                attempt: failures,
                error: err.clone(),
            });

            let delay = if policy.allows(failures) {
                backoff.next_backoff()
            } else {
                None
            };
            let Some(delay) = delay else {
                return Err(ConsumerError::RetriesExhausted {
                    subscription: self.subscription.clone(),
                    attempts: failures,
                    last_error: err,
                }
                .into());
            };

            warn!(
                subscription = %self.subscription,
                attempt = failures,
                error = %err,
                "Subscription failed, retrying in {delay:?}"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn pump(
        &self,
        stream: &mut dyn MessageStream,
        cancel: &CancellationToken,
        semaphore: &Arc<Semaphore>,
        tasks: &mut JoinSet<()>,
    ) -> PumpEnd {
        loop {
            while let Some(res) = tasks.try_join_next() {
                log_join_error(res);
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PumpEnd::Cancelled,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return PumpEnd::Cancelled,
                },
            };

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PumpEnd::Cancelled,
                next = stream.next_message() => next,
            };

            match next {
                Ok(Some(message)) => {
                    trace!(id = %message.id, attempt = message.delivery_attempt, "Dispatching message");
                    tasks.spawn(self.dispatcher.clone().dispatch(message, permit));
                }
                Ok(None) => {
                    return PumpEnd::Failed(BrokerError::Subscribe {
                        subscription: self.subscription.clone(),
                        reason: "message stream ended".into(),
                    })
                }
                Err(err) => return PumpEnd::Failed(err),
            }
        }
    }
}

impl<T> Consumer<T> {
    /// Подписывает канал на отчёты о сбоях (заменяет предыдущий).
    pub fn report_failures_to(
        &self,
        sender: mpsc::UnboundedSender<ConsumerFailure>,
    ) {
        *self.dispatcher.failures.lock() = Some(sender);
    }

    /// Освобождает клиент брокера. Повторный вызов возвращает `ClosedError`.
    pub async fn close(&self) -> PubSubResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ClosedError::new(COMPONENT, &self.subscription).into());
        }
        self.client
            .close()
            .await
            .map_err(|e| PubSubError::from(e).closed_as(COMPONENT, &self.subscription))?;
        info!(resource = %self.resource_name, subscription = %self.subscription, "Consumer closed");
        Ok(())
    }

    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), ClosedError> {
        if self.is_closed() {
            return Err(ClosedError::new(COMPONENT, &self.subscription));
        }
        Ok(())
    }

    fn set_state(
        &self,
        state: ConsumerState,
    ) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(subscription = %self.subscription, from = %previous, to = %state, "Consumer state changed");
        }
    }

    async fn drain(
        &self,
        tasks: &mut JoinSet<()>,
    ) {
        self.set_state(ConsumerState::Draining);
        if tasks.is_empty() {
            return;
        }

        let timeout = self.settings.drain_timeout();
        let drained = tokio::time::timeout(timeout, async {
            while let Some(res) = tasks.join_next().await {
                log_join_error(res);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                subscription = %self.subscription,
                remaining = tasks.len(),
                "Drain timeout elapsed, aborting in-flight handlers"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }
}

impl<T> Dispatcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn dispatch(
        self: Arc<Self>,
        mut message: ReceivedMessage,
        _permit: OwnedSemaphorePermit,
    ) {
        let data: T = match self.encoding.decode(&message.data) {
            Ok(data) => data,
            Err(error) => {
                warn!(subscription = %self.subscription, id = %message.id, %error, "Nacking undecodable message");
                let message_id = message.id.clone();
                message.nack();
                self.report(ConsumerFailure::Decode { message_id, error });
                return;
            }
        };

        let headers = std::mem::take(&mut message.attributes);
        match self.handler.handle(data, headers).await {
            Ok(()) => {
                trace!(id = %message.id, "Message handled");
                message.ack();
            }
            Err(err) => {
                warn!(subscription = %self.subscription, id = %message.id, error = %err, "Handler failed, nacking message");
                let message_id = message.id.clone();
                message.nack();
                self.report(ConsumerFailure::Handler {
                    message_id,
                    reason: err.to_string(),
                });
            }
        }
    }
}

impl<T> Dispatcher<T> {
    fn report(
        &self,
        failure: ConsumerFailure,
    ) {
        let mut slot = self.failures.lock();
        if let Some(sender) = slot.as_ref() {
            if sender.send(failure).is_err() {
                // Получатель закрыт, отчёты больше не нужны
                *slot = None;
            }
        }
    }
}

impl Drop for ReceivingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn resolve<P>(
    config: &P,
    resource_name: &str,
) -> Result<TopicSubscriptionSpec, ResolutionError>
where
    P: ConfigProvider + ?Sized,
{
    let instance = config
        .get_instance_for_consumer(resource_name)
        .await
        .map_err(|e| ResolutionError::provider(resource_name, e))?;
    let block = decode_block(resource_name, &instance.block)?;
    let spec = resolve_provider_topic_subscription(&block, resource_name)
        .require(resource_name, EntryKind::Provider)?;
    spec.validate(EntryRole::Subscribing)
        .map_err(|reason| ResolutionError::InvalidEntry {
            resource: resource_name.to_string(),
            reason: reason.to_string(),
        })?;
    Ok(spec)
}

async fn provision(
    client: &dyn BrokerClient,
    spec: &TopicSubscriptionSpec,
) -> Result<(), BrokerError> {
    ensure_topic(client, &spec.topic).await?;
    ensure_subscription(client, &spec.subscription, &spec.topic).await
}

fn log_join_error(res: Result<(), JoinError>) {
    if let Err(err) = res {
        if err.is_panic() {
            error!(error = %err, "Message handler panicked");
        }
    }
}
