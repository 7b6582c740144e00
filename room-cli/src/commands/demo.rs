//! Walk an adapter through a session on the mock transport.
//!
//! The mock stands in for the room server: it assigns an identity,
//! acknowledges the join, reports occupants and relays one message.

use anyhow::{Context, Result};
use room_client::{AdapterConfig, MockTimeSource, MockTransport, NetworkAdapter};
use room_types::{Identity, JoinAck, OccupantSnapshot, Packet, TransportEvent};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

/// Run the demo command.
pub async fn run(room: &str) -> Result<()> {
    let transport = MockTransport::new();
    transport.assign_identity("demo-self");

    let config = AdapterConfig {
        room: room.to_string(),
        ..AdapterConfig::default()
    };
    let adapter = NetworkAdapter::new(config, transport.clone(), MockTimeSource::with_offset(250))?;

    let (joined_tx, mut joined) = mpsc::unbounded_channel();
    adapter.on_connect_success(move |me| {
        let _ = joined_tx.send(me.clone());
    });
    let (occupants_tx, mut occupants) = mpsc::unbounded_channel();
    adapter.on_occupants_changed(move |view| {
        let _ = occupants_tx.send(view.clone());
    });
    let (message_tx, mut messages) = mpsc::unbounded_channel();
    adapter.on_message(move |from, kind, data, _name, _avatar| {
        let _ = message_tx.send(format!("{} sent {:?}: {}", from, kind, data));
    });

    println!("Connecting to room {:?} (mock transport)...", room);
    adapter.connect().await?;

    transport.push_event(TransportEvent::JoinAcknowledged(JoinAck {
        joined_time: 1_000,
        room: room.to_string(),
    }));
    let me = wait_for(&mut joined, "join acknowledgement").await?;
    println!("Joined as {}", me);

    let mut raw = OccupantSnapshot::new();
    raw.insert(me.clone(), 1_000);
    raw.insert(Identity::new("peer-a"), 1_200);
    raw.insert(Identity::new("peer-b"), 1_500);
    transport.push_event(TransportEvent::OccupantsChanged(raw));
    let view = wait_for(&mut occupants, "occupant snapshot").await?;
    println!("Occupants (excluding self):");
    for (peer, joined_at) in &view {
        println!("  {} (joined {})", peer, joined_at);
    }

    transport.push_event(TransportEvent::Broadcast(Packet::broadcast(
        "peer-a".into(),
        "chat",
        json!("hello"),
    )));
    println!("{}", wait_for(&mut messages, "inbound message").await?);

    adapter
        .send_to(&"peer-a".into(), "chat", json!("hi back"))
        .await;
    adapter.broadcast("pos", json!({"x": 1, "y": 2})).await;
    println!(
        "Sent {} unicast, {} broadcast",
        transport.sent_unicasts().len(),
        transport.sent_broadcasts().len()
    );

    println!("Avg clock offset: {:+.1} ms", adapter.avg_time_offset());
    println!("Server time:      {}", adapter.server_time());

    adapter.disconnect().await;
    println!("Disconnected (room reset to {:?})", adapter.room());
    Ok(())
}

async fn wait_for<T>(rx: &mut mpsc::UnboundedReceiver<T>, what: &str) -> Result<T> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .with_context(|| format!("Timed out waiting for {}", what))?
        .with_context(|| format!("Listener for {} dropped", what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_session_completes() {
        run("lobby").await.unwrap();
    }

    #[tokio::test]
    async fn demo_runs_in_default_room() {
        run("default").await.unwrap();
    }
}
