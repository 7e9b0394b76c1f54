//! Translation of native backend messages into the client-facing
//! progress vocabulary.
//!
//! One [`EventTranslator`] tracks exactly one job id for its lifetime.
//! It carries the small amount of state the native schema forces on
//! us: the node currently executing (step progress frames do not
//! always name their node) and whether a terminal signal has already
//! been seen, so nothing is emitted after `Finished` or `Failed`.
//!
//! The backend has no dedicated terminal message; an `executing` frame
//! whose `node` field is null for the tracked job is the documented
//! finish signal. On that signal the caller is expected to fetch the
//! job's history once and build the final `Completed` event from it --
//! the translator itself only reports [`Relayed::Finished`].

use iris_core::progress::ProgressEvent;

use crate::client::BackendFrame;
use crate::messages::ComfyMessage;

/// What one native message means for the tracked job.
#[derive(Debug, PartialEq)]
pub enum Relayed {
    /// Forward this event to the client.
    Progress(ProgressEvent),
    /// The job finished; fetch history and complete.
    Finished,
}

/// Per-job translation state.
pub struct EventTranslator {
    job_id: String,
    current_node: Option<String>,
    terminal: bool,
}

impl EventTranslator {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            current_node: None,
            terminal: false,
        }
    }

    /// The node last reported as executing, used to tag preview frames.
    pub fn current_node(&self) -> Option<&str> {
        self.current_node.as_deref()
    }

    /// True once a finish or failure signal has been observed.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Translate one decoded frame, binary previews included.
    ///
    /// The backend does not address preview frames to a job; they are
    /// attributed to the tracked one, and suppressed once it is
    /// terminal like every other frame.
    pub fn translate_frame(&mut self, frame: BackendFrame) -> Option<Relayed> {
        match frame {
            BackendFrame::Message(msg) => self.translate(&msg),
            BackendFrame::Preview(payload) => {
                if self.terminal {
                    return None;
                }
                Some(Relayed::Progress(ProgressEvent::Preview { payload }))
            }
        }
    }

    /// Translate one native message.
    ///
    /// Messages for other job ids yield `None`, as does everything
    /// after a terminal signal.
    pub fn translate(&mut self, msg: &ComfyMessage) -> Option<Relayed> {
        if self.terminal {
            return None;
        }

        match msg {
            ComfyMessage::Status(data) => Some(Relayed::Progress(ProgressEvent::Queued {
                queue_remaining: data.status.exec_info.queue_remaining,
            })),

            ComfyMessage::Executing(data) if data.prompt_id == self.job_id => {
                match &data.node {
                    Some(node) => {
                        self.current_node = Some(node.clone());
                        Some(Relayed::Progress(ProgressEvent::Executing {
                            node: Some(node.clone()),
                            step: None,
                            total_steps: None,
                        }))
                    }
                    // Null node for the tracked job: execution is done.
                    None => {
                        self.terminal = true;
                        Some(Relayed::Finished)
                    }
                }
            }

            ComfyMessage::Progress(data) => {
                // Older backends omit the prompt id on progress frames;
                // treat those as belonging to the tracked job.
                if data.prompt_id.as_deref().is_some_and(|id| id != self.job_id) {
                    return None;
                }
                let node = data.node.clone().or_else(|| self.current_node.clone());
                Some(Relayed::Progress(ProgressEvent::Executing {
                    node,
                    step: Some(data.value),
                    total_steps: Some(data.max),
                }))
            }

            ComfyMessage::ExecutionError(data) if data.prompt_id == self.job_id => {
                self.terminal = true;
                Some(Relayed::Progress(ProgressEvent::Failed {
                    message: data.exception_message.clone(),
                }))
            }

            // Start/cached/executed frames carry nothing the client
            // protocol expresses; outputs are read from history at the
            // finish signal instead.
            ComfyMessage::ExecutionStart(_)
            | ComfyMessage::ExecutionCached(_)
            | ComfyMessage::Executed(_) => None,

            // Frames addressed to other jobs.
            ComfyMessage::Executing(_) | ComfyMessage::ExecutionError(_) => None,
        }
    }
}
