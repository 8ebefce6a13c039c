use async_trait::async_trait;
use tarpc::client;
use tarpc::context::Context;
use tarpc::tokio_serde::formats::Json;
use tracing::info;

use crate::error::Result;
use crate::{
    BulkGetRequest, BulkGetResponse, GetRequest, GetResponse, SetRequest, SetResponse,
    StorageServiceClient,
};

/// The remote operations the harness drives. The context carries the deadline.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn set(&self, ctx: Context, req: SetRequest) -> Result<SetResponse>;
    async fn get(&self, ctx: Context, req: GetRequest) -> Result<GetResponse>;
    async fn bulk_get(&self, ctx: Context, req: BulkGetRequest) -> Result<BulkGetResponse>;
}

#[async_trait]
impl Storage for StorageServiceClient {
    async fn set(&self, ctx: Context, req: SetRequest) -> Result<SetResponse> {
        Ok(StorageServiceClient::set(self, ctx, req).await?)
    }

    async fn get(&self, ctx: Context, req: GetRequest) -> Result<GetResponse> {
        Ok(StorageServiceClient::get(self, ctx, req).await?)
    }

    async fn bulk_get(&self, ctx: Context, req: BulkGetRequest) -> Result<BulkGetResponse> {
        Ok(StorageServiceClient::bulk_get(self, ctx, req).await?)
    }
}

/// Open the long-lived channel to the storage service.
pub async fn connect(addr: &str) -> Result<StorageServiceClient> {
    let transport = tarpc::serde_transport::tcp::connect(addr, Json::default).await?;
    info!("connected to storage service at {}", addr);
    Ok(StorageServiceClient::new(client::Config::default(), transport).spawn())
}
