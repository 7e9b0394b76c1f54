//! The progress relay: one WebSocket session per client id.
//!
//! A session pairs the client-facing socket with a dedicated backend
//! event stream opened for the same client id. Job submissions arrive
//! as text commands on the client socket; backend events are
//! translated into the client vocabulary and pushed back through the
//! session's channel in the [`crate::registry::SessionRegistry`].
//!
//! Lifecycle: register, link to the backend, wait for a submission,
//! then monitor that one job to a terminal state. A session tracks at
//! most one job; any terminal outcome, either side disconnecting, or
//! the session being replaced by a reconnect tears the session down
//! and releases both channels.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

use iris_comfy::events::{EventTranslator, Relayed};
use iris_comfy::{ComfySocket, JobStatus};
use iris_core::progress::{ArtifactRef, ProgressEvent};
use iris_core::types::{JobHandle, JobRequest};

use crate::state::AppState;

/// Commands a client may send over its session socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Submit a generation job. The request fields sit at the top
    /// level of the JSON object alongside `type`.
    Prompt {
        #[serde(flatten)]
        request: JobRequest,
    },
}

/// Messages the relay pushes to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Backend link state for this session.
    ConnectionStatus {
        status: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// The backend accepted the job.
    PromptQueued { job_id: String, seed: u64 },
    /// Queue position broadcast while the job waits.
    Queued { queue_remaining: u32 },
    /// Node or step progress for the running job.
    Progress {
        #[serde(skip_serializing_if = "Option::is_none")]
        node: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_steps: Option<u32>,
    },
    /// Announces that the next binary frame is a preview image.
    Preview {
        #[serde(skip_serializing_if = "Option::is_none")]
        node: Option<String>,
    },
    /// The backend finished executing the job graph.
    ExecutionComplete { job_id: String },
    /// Final outcome with artifact references and the realized seed.
    Result {
        job_id: String,
        seed: u64,
        artifacts: Vec<ArtifactRef>,
    },
    /// A session- or job-level error.
    Error { message: String },
}

/// HTTP handler that upgrades `GET /ws/{client_id}` to a session.
pub async fn ws_handler(
    Path(client_id): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

/// Manage one session after the upgrade.
///
/// Registers the client (displacing any previous session for the id),
/// spawns a sender task draining the registry channel into the sink,
/// links to the backend event stream, and runs the relay loop on the
/// current task. Cleanup releases the registry entry, which closes the
/// channel and stops the sender task.
async fn handle_socket(socket: WebSocket, state: AppState, client_id: String) {
    tracing::info!(client_id, "Client session connected");

    let (mut rx, cancel, session_id) = state.registry.register(&client_id).await;
    let (mut sink, stream) = socket.split();

    let sender_client_id = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(client_id = %sender_client_id, "Client sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Link to the backend before accepting any commands; without the
    // event stream there is nothing to relay.
    match state.backend_events.connect(&client_id).await {
        Ok(backend) => {
            state
                .registry
                .send_json(
                    &client_id,
                    &ServerMessage::ConnectionStatus {
                        status: "connected",
                        detail: None,
                    },
                )
                .await;

            run_session(&state, &client_id, stream, backend, cancel).await;
        }
        Err(e) => {
            tracing::warn!(client_id, error = %e, "Backend link failed");
            state
                .registry
                .send_json(
                    &client_id,
                    &ServerMessage::ConnectionStatus {
                        status: "disconnected",
                        detail: Some(e.to_string()),
                    },
                )
                .await;
        }
    }

    // Guarded release: if a reconnect already displaced this session,
    // leave the replacement alone.
    state.registry.release_if(&client_id, session_id).await;
    let _ = send_task.await;
    tracing::info!(client_id, "Client session closed");
}

/// Linked state: wait for the submission command, drain backend
/// broadcasts meanwhile.
///
/// Backend frames received while no job is tracked (queue status
/// broadcasts, frames for other sessions' jobs) are consumed and
/// dropped so the stream never backs up. The first successful
/// submission moves the session into monitoring; when monitoring ends
/// the session is over.
async fn run_session(
    state: &AppState,
    client_id: &str,
    mut stream: SplitStream<WebSocket>,
    mut backend: ComfySocket,
    cancel: tokio_util::sync::CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,

            inbound = stream.next() => {
                let Some(Ok(msg)) = inbound else {
                    return;
                };
                match msg {
                    Message::Text(text) => {
                        let request = match parse_command(&text) {
                            Ok(request) => request,
                            Err(message) => {
                                state
                                    .registry
                                    .send_json(client_id, &ServerMessage::Error { message })
                                    .await;
                                continue;
                            }
                        };
                        match submit(state, client_id, &request).await {
                            Ok((handle, seed)) => {
                                monitor_job(
                                    state, &handle, &mut stream, &mut backend,
                                    &cancel, seed,
                                )
                                .await;
                                return;
                            }
                            Err(message) => {
                                state
                                    .registry
                                    .send_json(client_id, &ServerMessage::Error { message })
                                    .await;
                            }
                        }
                    }
                    Message::Close(_) => return,
                    // Ping/Pong/Binary from the client carry nothing.
                    _ => {}
                }
            }

            frame = backend.recv() => {
                match frame {
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => {
                        state
                            .registry
                            .send_json(
                                client_id,
                                &ServerMessage::ConnectionStatus {
                                    status: "disconnected",
                                    detail: Some("backend event stream closed".into()),
                                },
                            )
                            .await;
                        return;
                    }
                }
            }
        }
    }
}

/// Validate, instantiate, and submit one job.
///
/// Seed randomization happens here, at submission time, so the
/// announced seed is exactly what the backend received.
async fn submit(
    state: &AppState,
    client_id: &str,
    request: &JobRequest,
) -> Result<(JobHandle, u64), String> {
    request.validate().map_err(|e| e.to_string())?;

    let template = state
        .templates
        .get(request.workflow_name())
        .map_err(|e| e.to_string())?;

    let seed = request.seed_or_random();
    let graph = template.apply(request, seed).map_err(|e| e.to_string())?;

    let accepted = state
        .backend
        .submit_workflow(&graph, client_id)
        .await
        .map_err(|e| e.to_string())?;

    let handle = JobHandle::new(accepted.prompt_id, client_id);
    tracing::info!(
        client_id,
        job_id = %handle.job_id,
        seed,
        workflow = request.workflow_name(),
        "Job submitted",
    );

    state
        .registry
        .send_json(
            client_id,
            &ServerMessage::PromptQueued {
                job_id: handle.job_id.clone(),
                seed,
            },
        )
        .await;

    Ok((handle, seed))
}

/// Monitoring state: relay backend events for one job until it reaches
/// a terminal state or the session dies. The caller releases the
/// session when this returns; at most one job per session.
async fn monitor_job(
    state: &AppState,
    handle: &JobHandle,
    stream: &mut SplitStream<WebSocket>,
    backend: &mut ComfySocket,
    cancel: &tokio_util::sync::CancellationToken,
    seed: u64,
) {
    let client_id = handle.client_id.as_str();
    let job_id = handle.job_id.as_str();
    let mut translator = EventTranslator::new(job_id);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,

            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        // Client left mid-job; the backend keeps
                        // executing, nobody is listening.
                        tracing::debug!(client_id, job_id, "Client left during monitoring");
                        return;
                    }
                    Some(Ok(Message::Text(_))) => {
                        state
                            .registry
                            .send_json(
                                client_id,
                                &ServerMessage::Error {
                                    message: "a job is already in progress".into(),
                                },
                            )
                            .await;
                    }
                    Some(Ok(_)) => {}
                }
            }

            frame = backend.recv() => {
                match frame {
                    Ok(Some(frame)) => {
                        match translator.translate_frame(frame) {
                            Some(Relayed::Progress(event)) => {
                                let done = forward_event(state, client_id, &translator, event).await;
                                if done {
                                    // Exactly one error message, then the
                                    // session is released.
                                    return;
                                }
                            }
                            Some(Relayed::Finished) => {
                                complete_job(state, client_id, job_id, seed).await;
                                return;
                            }
                            None => {}
                        }
                    }
                    Ok(None) | Err(_) => {
                        state
                            .registry
                            .send_json(
                                client_id,
                                &ServerMessage::Error {
                                    message: "backend event stream closed mid-job".into(),
                                },
                            )
                            .await;
                        return;
                    }
                }
            }
        }
    }
}

/// Forward one translated event to the client. Returns true when the
/// event was terminal for the job.
async fn forward_event(
    state: &AppState,
    client_id: &str,
    translator: &EventTranslator,
    event: ProgressEvent,
) -> bool {
    match event {
        ProgressEvent::Queued { queue_remaining } => {
            state
                .registry
                .send_json(client_id, &ServerMessage::Queued { queue_remaining })
                .await;
            false
        }
        ProgressEvent::Executing {
            node,
            step,
            total_steps,
        } => {
            state
                .registry
                .send_json(
                    client_id,
                    &ServerMessage::Progress {
                        node,
                        step,
                        total_steps,
                    },
                )
                .await;
            false
        }
        ProgressEvent::Preview { payload } => {
            // Tagged with whichever node is executing; preview frames
            // do not name the node that rendered them.
            state
                .registry
                .send_json(
                    client_id,
                    &ServerMessage::Preview {
                        node: translator.current_node().map(str::to_string),
                    },
                )
                .await;
            state.registry.send_binary(client_id, payload).await;
            false
        }
        ProgressEvent::Failed { message } => {
            state
                .registry
                .send_json(client_id, &ServerMessage::Error { message })
                .await;
            true
        }
        // The translator reports Finished instead; the Completed event
        // is assembled from history in complete_job.
        ProgressEvent::Completed { .. } => false,
    }
}

/// On the finish signal, read the job's history once and report the
/// final result. The history entry can lag the finish signal by a
/// moment, so this reuses the bounded poll loop.
async fn complete_job(state: &AppState, client_id: &str, job_id: &str, seed: u64) {
    state
        .registry
        .send_json(
            client_id,
            &ServerMessage::ExecutionComplete {
                job_id: job_id.to_string(),
            },
        )
        .await;

    let outcome = match state.backend.poll(job_id).await {
        Ok(JobStatus::Done(entry)) => ProgressEvent::Completed {
            artifacts: entry.artifacts,
            seed: entry.seed,
        },
        Ok(JobStatus::Pending) => {
            match state
                .backend
                .wait_for_outputs(
                    job_id,
                    state.config.poll_max_attempts,
                    state.config.poll_interval,
                )
                .await
            {
                Ok(entry) => ProgressEvent::Completed {
                    artifacts: entry.artifacts,
                    seed: entry.seed,
                },
                Err(e) => ProgressEvent::Failed {
                    message: e.to_string(),
                },
            }
        }
        Ok(JobStatus::Failed { message }) => ProgressEvent::Failed { message },
        Err(e) => ProgressEvent::Failed {
            message: e.to_string(),
        },
    };

    let message = match outcome {
        ProgressEvent::Completed {
            artifacts,
            seed: realized,
        } => ServerMessage::Result {
            job_id: job_id.to_string(),
            // History may omit the seed; fall back to the one sent.
            seed: realized.unwrap_or(seed),
            artifacts,
        },
        ProgressEvent::Failed { message } => ServerMessage::Error { message },
        // Polling only ever concludes with Completed or Failed.
        _ => return,
    };

    state.registry.send_json(client_id, &message).await;
}

fn parse_command(text: &str) -> Result<JobRequest, String> {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::Prompt { request }) => Ok(request),
        Err(e) => Err(format!("unrecognized command: {e}")),
    }
}
