use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::watch, time::MissedTickBehavior};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::ClientConfig,
    dto::ws::{ChannelSignal, HEARTBEAT_PAYLOAD, SessionEvent},
    error::{ClientError, ClientResult},
    services::require_non_empty,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Callback receiving every signal of one channel, in order.
pub type SignalHandler = Box<dyn FnMut(ChannelSignal) + Send>;

/// Handler slot shared between the socket task and the handle.
#[derive(Default)]
struct Delivery {
    handler: Option<SignalHandler>,
    opened: bool,
    closed: bool,
}

type SharedDelivery = Arc<Mutex<Delivery>>;

fn lock(delivery: &SharedDelivery) -> MutexGuard<'_, Delivery> {
    delivery.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hand `signal` to the handler while holding the slot lock.
///
/// Returns `false` once the handler has been detached. `Closed` is delivered at most once.
fn deliver(delivery: &SharedDelivery, signal: ChannelSignal) -> bool {
    let mut slot = lock(delivery);
    match signal {
        ChannelSignal::Opened => slot.opened = true,
        ChannelSignal::Closed if slot.closed => return false,
        ChannelSignal::Closed => slot.closed = true,
        ChannelSignal::Event(_) => {}
    }
    match slot.handler.as_mut() {
        Some(handler) => {
            handler(signal);
            true
        }
        None => false,
    }
}

/// Realtime URL for `session_id`: scheme upgraded from the REST base, path replaced by
/// `/planning/ws/{session_id}`, token in the `token` query parameter.
///
/// A base that does not parse as a URL keeps its path; only the scheme prefix is swapped.
pub fn realtime_endpoint(api_base: &str, session_id: &str, token: &str) -> ClientResult<Url> {
    require_non_empty("session id", session_id)?;
    require_non_empty("auth token", token)?;

    let mut url = match upgrade_base(api_base) {
        Some(url) => url,
        None => {
            let fallback = fallback_base(api_base);
            Url::parse(&fallback)
                .map_err(|err| ClientError::InvalidEndpoint(format!("`{fallback}`: {err}")))?
        }
    };
    url.path_segments_mut()
        .map_err(|()| ClientError::InvalidEndpoint(format!("`{api_base}` cannot be a base")))?
        .pop_if_empty()
        .extend(["planning", "ws", session_id]);
    url.query_pairs_mut().clear().append_pair("token", token);
    url.set_fragment(None);
    Ok(url)
}

fn upgrade_base(api_base: &str) -> Option<Url> {
    let mut url = Url::parse(api_base.trim_end_matches('/')).ok()?;
    if url.cannot_be_a_base() {
        return None;
    }
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme).ok()?;
    url.set_path("/");
    Some(url)
}

fn fallback_base(api_base: &str) -> String {
    let trimmed = api_base.trim_end_matches('/');
    match trimmed.strip_prefix("https://") {
        Some(rest) => format!("wss://{rest}"),
        None => format!(
            "ws://{}",
            trimmed.strip_prefix("http://").unwrap_or(trimmed)
        ),
    }
}

/// Open the realtime channel of `session_id`.
///
/// Arguments are checked before anything is spawned, so an empty id or token fails without
/// a connection attempt. The connection itself runs on a Tokio task; its outcome reaches
/// `handler` as [`ChannelSignal::Opened`] / [`ChannelSignal::Closed`].
pub fn open<F>(
    config: &ClientConfig,
    session_id: &str,
    token: &str,
    handler: F,
) -> ClientResult<ChannelHandle>
where
    F: FnMut(ChannelSignal) + Send + 'static,
{
    let url = realtime_endpoint(config.api_base_url(), session_id, token)?;

    let delivery: SharedDelivery = Arc::new(Mutex::new(Delivery {
        handler: Some(Box::new(handler)),
        ..Delivery::default()
    }));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (finished_tx, finished_rx) = watch::channel(false);

    tokio::spawn(run(
        url,
        session_id.to_string(),
        config.heartbeat_interval(),
        Arc::clone(&delivery),
        shutdown_rx,
        finished_tx,
    ));

    Ok(ChannelHandle {
        delivery,
        shutdown: shutdown_tx,
        finished: finished_rx,
    })
}

async fn run(
    url: Url,
    session_id: String,
    heartbeat: Duration,
    delivery: SharedDelivery,
    mut shutdown: watch::Receiver<bool>,
    finished: watch::Sender<bool>,
) {
    let connected = tokio::select! {
        result = connect_async(url.as_str()) => Some(result),
        _ = stop_requested(&mut shutdown) => None,
    };

    match connected {
        Some(Ok((socket, _response))) => {
            info!(session_id = %session_id, "realtime channel open");
            if deliver(&delivery, ChannelSignal::Opened) {
                drive(socket, &session_id, heartbeat, &delivery, &mut shutdown).await;
            }
        }
        Some(Err(err)) => {
            warn!(session_id = %session_id, error = %err, "realtime channel failed to connect");
        }
        None => debug!(session_id = %session_id, "realtime channel cancelled before connecting"),
    }

    deliver(&delivery, ChannelSignal::Closed);
    info!(session_id = %session_id, "realtime channel closed");
    finished.send_replace(true);
}

/// Resolves once a stop was requested or the handle is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn drive(
    socket: Socket,
    session_id: &str,
    heartbeat: Duration,
    delivery: &SharedDelivery,
    shutdown: &mut watch::Receiver<bool>,
) {
    let (mut sink, mut source) = socket.split();
    let mut ticker = tokio::time::interval(heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = stop_requested(shutdown) => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = sink.send(Message::Text(HEARTBEAT_PAYLOAD.into())).await {
                    debug!(session_id, error = %err, "heartbeat send failed");
                }
            }
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => match SessionEvent::from_json_str(text.as_str()) {
                    Some(event) => {
                        debug!(session_id, event = event.kind(), "realtime event");
                        if !deliver(delivery, ChannelSignal::Event(event)) {
                            break;
                        }
                    }
                    None => debug!(session_id, "discarding undecodable frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!(session_id, ?frame, "server closed realtime channel");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(session_id, error = %err, "realtime channel error");
                    break;
                }
                None => break,
            },
        }
    }
}

/// Owner side of an open channel. Dropping it disconnects.
pub struct ChannelHandle {
    delivery: SharedDelivery,
    shutdown: watch::Sender<bool>,
    finished: watch::Receiver<bool>,
}

impl ChannelHandle {
    /// Detach the handler, stop the heartbeat and close the transport.
    ///
    /// Once this returns no further signal reaches the handler, except a final
    /// [`ChannelSignal::Closed`] delivered synchronously here when the channel had opened and
    /// not yet reported its close. Calling it again is a no-op.
    pub fn disconnect(&self) {
        let (handler, notify) = {
            let mut slot = lock(&self.delivery);
            let notify = slot.opened && !slot.closed;
            slot.closed = true;
            (slot.handler.take(), notify)
        };
        if let (Some(mut handler), true) = (handler, notify) {
            handler(ChannelSignal::Closed);
        }
        self.shutdown.send_replace(true);
    }

    /// Whether the socket task has exited.
    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Wait until the socket task has exited.
    pub async fn closed(&self) {
        let mut finished = self.finished.clone();
        let _ = finished.wait_for(|done| *done).await;
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.disconnect();
    }
}
