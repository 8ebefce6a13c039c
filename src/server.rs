use anyhow::Result;
use clap::Parser;
use futures::future;
use futures_util::StreamExt;
use tarpc::server::{self, Channel};
use tarpc::tokio_serde::formats::Json;
use tracing::{info, warn};

use kv_harness::config::{init_tracing, ServerArgs};
use kv_harness::*;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = ServerArgs::parse();
    let store = Store::new();

    let mut listener = tarpc::serde_transport::tcp::listen(&args.listen, Json::default).await?;
    listener.config_mut().max_frame_length(usize::MAX);
    info!("storage service listening on {}", listener.local_addr());

    listener
        .filter_map(|r| {
            if let Err(e) = &r {
                warn!("accept failed: {}", e);
            }
            future::ready(r.ok())
        })
        .map(server::BaseChannel::with_defaults)
        .for_each(|channel| {
            let store = store.clone();
            async move {
                let peer = channel.transport().peer_addr().ok();
                info!("new connection from {:?}", peer);

                // serve() takes ownership, so each channel gets its own handle
                let fut = channel.execute(store.clone().serve());
                tokio::spawn(async move {
                    fut.await;
                    info!("client {:?} disconnected, {} keys stored", peer, store.len());
                });
            }
        })
        .await;

    Ok(())
}
