//! WebSocket session handling for operator consoles and field displays.
//!
//! Every socket gets a dedicated writer task fed through an unbounded
//! channel, a subscription to every arena topic, and the producer-backed
//! initial frames so a fresh client renders current state before any
//! incremental update arrives. Operators additionally get their inbound
//! frames dispatched as commands; displays are read-only.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::arena::SharedArena;
use crate::dto::ws::{DisplayQuery, OperatorCommand};
use crate::error::ArenaError;
use crate::notify::EventFrame;

/// Handle the full lifecycle of one operator console connection.
pub async fn handle_operator_socket(arena: SharedArena, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps topic frames flowing while we await
    // inbound commands.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let (mut topics, initial) = subscribe_all(&arena);
    for frame in initial {
        if send_frame(&outbound_tx, &frame).is_err() {
            finalize(writer_task, outbound_tx).await;
            return;
        }
    }
    info!("operator connected");

    loop {
        tokio::select! {
            frame = topics.next() => {
                match frame {
                    Some((_, frame)) => {
                        if send_frame(&outbound_tx, &frame).is_err() {
                            break;
                        }
                    }
                    // Topics only end when the arena is gone.
                    None => break,
                }
            }
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_operator_frame(&arena, &text, &outbound_tx).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = outbound_tx.send(Message::Pong(payload));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let _ = outbound_tx.send(Message::Close(frame));
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "operator websocket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    info!("operator disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Handle the full lifecycle of one display connection.
///
/// The display is registered under the id it presents, or a fresh one when it
/// has none; the assigned id is echoed back in the first frame so the display
/// can persist it for reconnects.
pub async fn handle_display_socket(arena: SharedArena, socket: WebSocket, query: DisplayQuery) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let display_id = query.display_id.unwrap_or_else(Uuid::new_v4);
    let nickname = query.nickname.unwrap_or_default();
    arena.register_display(display_id, nickname);
    info!(%display_id, "display connected");

    let (mut topics, initial) = subscribe_all(&arena);
    let assigned = EventFrame {
        topic: "displayId",
        data: json!(display_id),
    };
    let mut open = send_frame(&outbound_tx, &assigned).is_ok();
    if open {
        for frame in initial {
            if send_frame(&outbound_tx, &frame).is_err() {
                open = false;
                break;
            }
        }
    }

    while open {
        tokio::select! {
            frame = topics.next() => {
                match frame {
                    Some((_, frame)) => {
                        if send_frame(&outbound_tx, &frame).is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = outbound_tx.send(Message::Pong(payload));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let _ = outbound_tx.send(Message::Close(frame));
                        break;
                    }
                    // Displays are read-only; anything else is dropped.
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%display_id, error = %err, "display websocket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    arena.deregister_display(display_id);
    info!(%display_id, "display disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Subscribe to every arena topic, returning the merged stream and the
/// initial frames to replay. Subscriptions are taken before the snapshots so
/// no update published in between can be missed.
fn subscribe_all(
    arena: &SharedArena,
) -> (
    StreamMap<&'static str, ReceiverStream<EventFrame>>,
    Vec<EventFrame>,
) {
    let mut topics = StreamMap::new();
    let mut initial = Vec::new();
    for notifier in arena.notifiers().all() {
        let subscription = notifier.listen();
        topics.insert(notifier.topic(), subscription.into_stream());
        if let Some(frame) = notifier.initial_frame() {
            initial.push(frame);
        }
    }
    (topics, initial)
}

async fn handle_operator_frame(
    arena: &SharedArena,
    text: &str,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) {
    let command = match serde_json::from_str::<OperatorCommand>(text) {
        Ok(command) => command,
        Err(err) => {
            warn!(error = %err, "failed to parse operator command");
            let _ = send_error(outbound_tx, &format!("malformed command: {err}"));
            return;
        }
    };
    if let Err(err) = dispatch_command(arena, command).await {
        info!(%err, "operator command rejected");
        let _ = send_error(outbound_tx, &err.to_string());
    }
}

async fn dispatch_command(
    arena: &SharedArena,
    command: OperatorCommand,
) -> Result<(), ArenaError> {
    match command {
        OperatorCommand::LoadMatch { match_id } => arena.load_match(match_id).await,
        OperatorCommand::LoadTestMatch => arena.load_test_match().await,
        OperatorCommand::LoadNextMatch {
            start_scheduled_break,
        } => arena.load_next_match(start_scheduled_break).await,
        OperatorCommand::SubstituteTeams { team_ids } => arena.substitute_teams(team_ids).await,
        OperatorCommand::StartMatch => arena.start_match(Instant::now()),
        OperatorCommand::AbortMatch => arena.abort_match(),
        OperatorCommand::ResetMatch => arena.reset_match(),
        OperatorCommand::StartTimeout {
            description,
            duration_sec,
        } => arena.start_timeout(description, Duration::from_secs(duration_sec), Instant::now()),
        OperatorCommand::SetAudienceDisplayMode { mode } => {
            arena.set_audience_display_mode(mode);
            Ok(())
        }
        OperatorCommand::SetAllianceStationDisplayMode { mode } => {
            arena.set_alliance_station_display_mode(mode);
            Ok(())
        }
        OperatorCommand::SetEstop { station, active } => {
            arena.set_station_estop(station, active);
            Ok(())
        }
        OperatorCommand::SetBypass { station, active } => {
            arena.set_station_bypass(station, active);
            Ok(())
        }
        OperatorCommand::CommitMatchScore => arena.commit_match_score().await,
        OperatorCommand::SetLeave {
            alliance,
            slot,
            left,
        } => arena.with_score(alliance, |score| score.set_leave(slot, left)),
        OperatorCommand::AdjustPieces {
            alliance,
            phase,
            delta,
        } => arena.with_score(alliance, |score| score.adjust_pieces(phase, delta)),
        OperatorCommand::SetEndgame {
            alliance,
            slot,
            status,
        } => arena.with_score(alliance, |score| score.set_endgame(slot, status)),
        OperatorCommand::AddFoul { alliance, foul } => {
            arena.with_score(alliance, |score| score.add_foul(foul))
        }
        OperatorCommand::RemoveFoul { alliance, index } => {
            arena.with_score(alliance, |score| score.remove_foul(index))
        }
        OperatorCommand::SetCard {
            alliance,
            team_id,
            card,
        } => arena.with_score(alliance, |score| score.set_card(team_id, card)),
        OperatorCommand::CommitAuto { alliance } => {
            arena.with_score(alliance, |score| score.commit_auto())
        }
        OperatorCommand::CommitTeleop { alliance } => arena.with_score(alliance, |score| {
            score.commit_teleop();
            Ok(())
        }),
        OperatorCommand::UncommitScore { alliance } => arena.uncommit_score(alliance),
        OperatorCommand::UndoScore { alliance } => arena.with_score(alliance, |score| score.undo()),
        OperatorCommand::UpdateAlliances { alliances } => arena.update_alliances(alliances).await,
        OperatorCommand::UpdateEventSettings { settings } => {
            arena.update_event_settings(settings).await
        }
        OperatorCommand::SetLowerThird { lower_third } => arena.set_lower_third(lower_third).await,
        OperatorCommand::SetSponsorSlide { slide } => arena.set_sponsor_slide(slide).await,
        OperatorCommand::SetDisplayNickname { id, nickname } => {
            arena.set_display_nickname(id, nickname)
        }
        OperatorCommand::ReloadDisplays => {
            arena.reload_displays();
            Ok(())
        }
        OperatorCommand::Unknown => Err(ArenaError::argument("unrecognized command type")),
    }
}

/// Serialize a topic frame onto the writer channel. A closed channel means
/// the connection is gone; a serialization failure is logged and skipped.
fn send_frame(tx: &mpsc::UnboundedSender<Message>, frame: &EventFrame) -> Result<(), ()> {
    match serde_json::to_string(frame) {
        Ok(payload) => tx.send(Message::Text(payload.into())).map_err(|_| ()),
        Err(err) => {
            warn!(error = %err, topic = frame.topic, "failed to serialize event frame");
            Ok(())
        }
    }
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, message: &str) -> Result<(), ()> {
    let frame = json!({ "type": "error", "data": message });
    tx.send(Message::Text(frame.to_string().into()))
        .map_err(|_| ())
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
