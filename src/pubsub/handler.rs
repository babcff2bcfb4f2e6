use std::future::Future;

use async_trait::async_trait;

use crate::model::Headers;

/// Ошибка пользовательского обработчика: сообщение будет отклонено.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Обработчик сообщений Consumer.
///
/// Вызывается параллельно для разных сообщений, поэтому должен быть
/// потокобезопасным. `Ok` подтверждает сообщение, `Err` отклоняет его.
#[async_trait]
pub trait MessageHandler<T>: Send + Sync + 'static {
    async fn handle(
        &self,
        data: T,
        headers: Headers,
    ) -> Result<(), HandlerError>;
}

#[async_trait]
impl<T, F, Fut> MessageHandler<T> for F
where
    T: Send + 'static,
    F: Fn(T, Headers) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(
        &self,
        data: T,
        headers: Headers,
    ) -> Result<(), HandlerError> {
        (self)(data, headers).await
    }
}
