// tagsync-api: Wire protocol and transports for controller tag synchronization

pub mod error;
pub mod gateway;
pub mod protocol;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use gateway::GatewayClient;
pub use protocol::{
    ApiStatus, ClientIntent, InboundFrame, RawUpdate, ReadRequest, ReadResponse, ServerError,
    SingleUpdate, StatisticsResponse, SubscribeAck, UnsubscribeAck, UpdateBatch, WriteRequest,
    WriteResponse, now_secs,
};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ReconnectConfig, StreamHandle, TransportEvent};
