use std::sync::Arc;

use poem::{
    handler,
    web::{
        Data,
        sse::{Event, SSE},
    },
};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};

use crate::application::services::broadcast_hub::BroadcastHub;

/// Long-lived `text/event-stream` response. The hub writes the `connected`
/// handshake and heartbeats into the channel; the client is dropped from
/// the registry on its first failed write after disconnect.
#[handler]
pub async fn event_stream(Data(hub): Data<&Arc<BroadcastHub>>) -> SSE {
    let (client_id, receiver) = hub.open_client().await;
    tracing::info!(client_id = %client_id, "dashboard stream opened");

    let stream = ReceiverStream::new(receiver)
        .map(|frame| Event::message(frame.data.to_string()).event_type(frame.event));
    SSE::new(stream)
}
