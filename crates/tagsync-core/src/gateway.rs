// ── Gateway seam ──
//
// The core talks to the request/response endpoints through this trait so
// tests can substitute an in-memory gateway.

use async_trait::async_trait;
use serde::Serialize;
use tagsync_api::{
    GatewayClient, ReadRequest, ReadResponse, StatisticsResponse, WriteRequest, WriteResponse,
};

use crate::error::CoreError;
use crate::value::TagValue;

/// Request/response access to controller variables.
#[async_trait]
pub trait VariableGateway: Send + Sync {
    async fn write(&self, request: WriteRequest) -> Result<WriteResponse, CoreError>;

    async fn read(&self, request: ReadRequest) -> Result<ReadResponse, CoreError>;

    async fn statistics(&self) -> Result<StatisticsResponse, CoreError>;
}

#[async_trait]
impl VariableGateway for GatewayClient {
    async fn write(&self, request: WriteRequest) -> Result<WriteResponse, CoreError> {
        Ok(GatewayClient::write(self, &request).await?)
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResponse, CoreError> {
        Ok(GatewayClient::read(self, &request).await?)
    }

    async fn statistics(&self) -> Result<StatisticsResponse, CoreError> {
        Ok(GatewayClient::statistics(self).await?)
    }
}

/// A successful read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadResult {
    pub value: TagValue,
    pub timestamp: f64,
    pub declared_type: String,
    /// Where the gateway got the value (`cache`, `plc`, ...).
    pub source: String,
}
