/// In-memory and trait-based broker layer: clients, streams, provisioning.
pub mod broker;
/// Block configuration providers and runtime settings.
pub mod config;
/// Unified error type over the error-crate taxonomy.
pub mod error;
/// Logging setup (filters, formatters, console and file sinks).
pub mod logging;
/// Resource model: block definitions, entries, payload envelope.
pub mod model;
/// Typed Publisher and Consumer.
pub mod pubsub;
/// Resource name → topic/subscription resolution.
pub mod resolver;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Broker contract and the in-memory backend.
pub use broker::{
    BrokerClient, BrokerConnector, InMemoryBroker, MemoryConnector, MessageStream,
    OutboundMessage, ReceivedMessage,
};
/// Configuration providers and settings.
pub use config::{
    BlockInstance, BlockInstanceDetails, ConfigProvider, Connection, ConsumerSettings,
    ResourceRef, RetryPolicy, Settings, StaticConfigProvider,
};
/// Operation errors and result types.
pub use error::{
    BrokerError, ClosedError, ConsumerError, ErrorExt, PubSubError, PubSubResult,
    ResolutionError, SerializationError, StatusCode,
};
/// Logging bootstrap.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Resource model.
pub use model::{BlockDefinition, EntryRole, Headers, Payload, ResourceEntry, TopicSubscriptionSpec};
/// Pub/Sub API.
pub use pubsub::{
    Consumer, ConsumerFailure, ConsumerState, Encoding, HandlerError, MessageHandler, Publisher,
};
/// Resolution outcome.
pub use resolver::Resolution;
