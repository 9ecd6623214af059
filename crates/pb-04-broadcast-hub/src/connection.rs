//! # Observer Connection
//!
//! Two pumps per observer. The writer pump is the only task that writes to
//! the transport; the reader pump is the only task that reads from it.
//!
//! ```text
//!   hub buffer ──▶ write_pump ──▶ sink      (coalesced text, periodic pings, close)
//!   stream ──▶ read_pump                    (liveness deadline, size limit)
//! ```
//!
//! Whichever pump finishes first ends the connection and unregisters the
//! observer.

use crate::domain::config::HubConfig;
use crate::domain::errors::HubError;
use crate::domain::frame::Frame;
use crate::domain::observer::ObserverId;
use crate::ports::outbound::{FrameSink, FrameStream};
use crate::service::{HubHandle, Registration};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

async fn send_within<S: FrameSink>(sink: &mut S, frame: Frame, wait: Duration) -> Result<(), HubError> {
    tokio::time::timeout(wait, sink.send(frame))
        .await
        .map_err(|_| HubError::WriteTimeout)?
}

/// Drain an observer's buffer into the transport.
///
/// Everything queued when a write starts goes out as one text frame, joined
/// with `'\n'`. A ping goes out every `ping_period` regardless of traffic,
/// because only the observer's replies keep the reader's deadline alive.
/// When the hub closes the buffer, a close frame is sent and the pump
/// returns `Ok`.
pub async fn write_pump<S: FrameSink>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Arc<str>>,
    config: &HubConfig,
) -> Result<(), HubError> {
    let mut ping = tokio::time::interval_at(Instant::now() + config.ping_period, config.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(first) = next else {
                    let _ = send_within(&mut sink, Frame::Close, config.write_wait).await;
                    let _ = tokio::time::timeout(config.write_wait, sink.close()).await;
                    return Ok(());
                };

                let mut text = String::from(&*first);
                while let Ok(more) = outbound.try_recv() {
                    text.push('\n');
                    text.push_str(&more);
                }
                send_within(&mut sink, Frame::Text(text), config.write_wait).await?;
            }
            _ = ping.tick() => {
                send_within(&mut sink, Frame::Ping(Vec::new()), config.write_wait).await?;
            }
        }
    }
}

/// Read from the observer until it closes, errors or goes quiet.
///
/// Any frame pushes the liveness deadline out by `pong_wait`. Observers have
/// nothing to say to the hub, so frame contents are ignored.
pub async fn read_pump<R: FrameStream>(
    mut stream: R,
    config: &HubConfig,
    id: ObserverId,
) -> Result<(), HubError> {
    let mut deadline = Instant::now() + config.pong_wait;
    loop {
        let frame = match tokio::time::timeout_at(deadline, stream.next()).await {
            Err(_) => return Err(HubError::LivenessTimeout),
            Ok(None) => return Ok(()),
            Ok(Some(frame)) => frame?,
        };

        if frame.len() > config.max_message_size {
            return Err(HubError::MessageTooLarge {
                size: frame.len(),
                max: config.max_message_size,
            });
        }
        deadline = Instant::now() + config.pong_wait;

        match frame {
            Frame::Close => return Ok(()),
            Frame::Pong(_) => trace!(observer = %id, "Pong"),
            _ => {}
        }
    }
}

/// Register an observer and run both pumps until the connection ends.
///
/// Returns `Ok` on a clean close from either side, otherwise the error that
/// ended the connection.
pub async fn serve_connection<S: FrameSink, R: FrameStream>(
    hub: HubHandle,
    sink: S,
    stream: R,
    correlation_id: Option<String>,
) -> Result<(), HubError> {
    let Registration { id, receiver } = hub.register(correlation_id.clone()).await?;
    info!(observer = %id, correlation_id = ?correlation_id, "Observer connected");

    let config = hub.config().clone();
    let writer = write_pump(sink, receiver, &config);
    let reader = read_pump(stream, &config, id);
    tokio::pin!(writer);
    tokio::pin!(reader);

    let outcome = tokio::select! {
        read = &mut reader => {
            hub.unregister(id).await;
            // The hub closes the buffer, so the writer sends its close frame.
            if tokio::time::timeout(config.write_wait, &mut writer).await.is_err() {
                debug!(observer = %id, "Writer did not finish after unregister");
            }
            read
        }
        written = &mut writer => {
            hub.unregister(id).await;
            written
        }
    };

    match &outcome {
        Ok(()) => info!(observer = %id, "Observer disconnected"),
        Err(e) => info!(observer = %id, reason = %e, "Observer dropped"),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::inbound::Broadcaster;
    use crate::service::Hub;
    use futures::channel::mpsc as chan;
    use serde_json::json;

    fn frame_sink() -> (
        impl FrameSink,
        chan::UnboundedReceiver<Frame>,
    ) {
        let (tx, rx) = chan::unbounded::<Frame>();
        (tx.sink_map_err(|e| HubError::Transport(e.to_string())), rx)
    }

    #[tokio::test]
    async fn test_queued_messages_coalesce_into_one_frame() {
        let (tx, rx) = mpsc::channel(8);
        for m in ["a", "b", "c"] {
            tx.send(Arc::<str>::from(m)).await.unwrap();
        }
        drop(tx);

        let (sink, mut frames) = frame_sink();
        write_pump(sink, rx, &HubConfig::for_testing()).await.unwrap();

        assert_eq!(frames.next().await, Some(Frame::Text("a\nb\nc".into())));
        assert_eq!(frames.next().await, Some(Frame::Close));
        assert_eq!(frames.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_writer_pings() {
        let config = HubConfig::for_testing();
        let (tx, rx) = mpsc::channel::<Arc<str>>(8);
        let (sink, mut frames) = frame_sink();
        let pump = tokio::spawn(async move { write_pump(sink, rx, &config).await });

        let started = Instant::now();
        assert_eq!(frames.next().await, Some(Frame::Ping(Vec::new())));
        assert!(started.elapsed() >= HubConfig::for_testing().ping_period);

        drop(tx);
        assert_eq!(frames.next().await, Some(Frame::Close));
        pump.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_connection_keeps_pinging() {
        let config = HubConfig::for_testing();
        let (hub, _task) = Hub::spawn(config.clone());
        let (sink, mut outbound) = frame_sink();
        let (inbound_tx, inbound) = chan::unbounded();
        let conn = tokio::spawn(serve_connection(hub.clone(), sink, inbound, None));
        while hub.connection_count() == 0 {
            tokio::task::yield_now().await;
        }

        // The observer only ever answers pings.
        let observer = tokio::spawn(async move {
            let mut pings = 0;
            while let Some(frame) = outbound.next().await {
                if let Frame::Ping(payload) = frame {
                    pings += 1;
                    let _ = inbound_tx.unbounded_send(Ok(Frame::Pong(payload)));
                }
            }
            pings
        });

        let step = config.ping_period / 2;
        let mut elapsed = Duration::ZERO;
        while elapsed < config.pong_wait * 3 {
            hub.broadcast("job-progress", json!({"id": "job-1"})).unwrap();
            tokio::time::sleep(step).await;
            elapsed += step;
        }
        assert_eq!(hub.connection_count(), 1);
        assert!(!conn.is_finished());

        hub.shutdown().await;
        conn.await.unwrap().unwrap();
        assert!(observer.await.unwrap() >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_observer_misses_deadline() {
        let config = HubConfig::for_testing();
        let (_tx, stream) = chan::unbounded::<Result<Frame, HubError>>();

        let started = Instant::now();
        let result = read_pump(stream, &config, ObserverId(1)).await;
        assert_eq!(result, Err(HubError::LivenessTimeout));
        assert!(started.elapsed() >= config.pong_wait);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pongs_keep_observer_alive() {
        let config = HubConfig::for_testing();
        let (tx, stream) = chan::unbounded::<Result<Frame, HubError>>();
        tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(400)).await;
                tx.unbounded_send(Ok(Frame::Pong(Vec::new()))).unwrap();
            }
            tx.unbounded_send(Ok(Frame::Close)).unwrap();
        });

        let started = Instant::now();
        read_pump(stream, &config, ObserverId(1)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1200));
    }

    #[tokio::test]
    async fn test_oversized_inbound_frame_rejected() {
        let config = HubConfig::for_testing();
        let (tx, stream) = chan::unbounded();
        tx.unbounded_send(Ok(Frame::Text("x".repeat(513)))).unwrap();

        assert_eq!(
            read_pump(stream, &config, ObserverId(1)).await,
            Err(HubError::MessageTooLarge { size: 513, max: 512 })
        );
    }

    #[tokio::test]
    async fn test_serve_connection_delivers_and_unregisters() {
        let (hub, _task) = Hub::spawn(HubConfig::for_testing());
        let (sink, mut outbound) = frame_sink();
        let (inbound_tx, inbound) = chan::unbounded();

        let conn = tokio::spawn(serve_connection(
            hub.clone(),
            sink,
            inbound,
            Some("req-1".into()),
        ));
        while hub.connection_count() == 0 {
            tokio::task::yield_now().await;
        }

        hub.broadcast("job-completed", json!({"id": "job-1"})).unwrap();
        assert_eq!(
            outbound.next().await,
            Some(Frame::Text(r#"{"type":"job-completed","data":{"id":"job-1"}}"#.into()))
        );

        inbound_tx.unbounded_send(Ok(Frame::Close)).unwrap();
        conn.await.unwrap().unwrap();
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(outbound.next().await, Some(Frame::Close));
    }

    #[tokio::test]
    async fn test_hub_shutdown_closes_connection() {
        let (hub, _task) = Hub::spawn(HubConfig::for_testing());
        let (sink, mut outbound) = frame_sink();
        let (_inbound_tx, inbound) = chan::unbounded::<Result<Frame, HubError>>();

        let conn = tokio::spawn(serve_connection(hub.clone(), sink, inbound, None));
        while hub.connection_count() == 0 {
            tokio::task::yield_now().await;
        }

        hub.shutdown().await;
        conn.await.unwrap().unwrap();
        assert_eq!(outbound.next().await, Some(Frame::Close));
    }
}
