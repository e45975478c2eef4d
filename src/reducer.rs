//! Pure chat reducer: (render cursor, event) → (render cursor, instructions).
//!
//! Nothing here touches a socket or a terminal. The session controller feeds
//! events in and hands the resulting [`RenderInstruction`]s to a
//! [`crate::render::Renderer`].

use serde::Serialize;

use crate::panels::PanelUpdate;
use crate::protocol::{HistoryEntry, InboundEvent, OutboundMessage, Role};

pub const HISTORY_START_MARKER: &str = "--- Previous conversation ---";
pub const HISTORY_END_MARKER: &str = "--- End of previous conversation ---";
pub const COUNCIL_NOTICE: &str = "Council activated: consulting with other models.";

/// Identity of one rendered bubble or progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BubbleId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BubbleKind {
    User,
    Assistant,
    /// Local, client-generated line (greeting, council notice).
    Notice,
    /// History start/end bracket.
    Marker,
    Error,
}

/// The accumulator currently receiving `text_chunk`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBubble {
    pub id: BubbleId,
    pub text: String,
}

/// Which accumulators are open, plus the id allocator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderCursor {
    assistant: Option<OpenBubble>,
    progress: Option<BubbleId>,
    next_id: u64,
}

impl RenderCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assistant(&self) -> Option<&OpenBubble> {
        self.assistant.as_ref()
    }

    pub fn progress(&self) -> Option<BubbleId> {
        self.progress
    }

    pub fn is_idle(&self) -> bool {
        self.assistant.is_none() && self.progress.is_none()
    }

    fn alloc(&mut self) -> BubbleId {
        let id = BubbleId(self.next_id);
        self.next_id += 1;
        id
    }

    fn take_progress(&mut self, out: &mut Vec<RenderInstruction>) {
        if let Some(id) = self.progress.take() {
            out.push(RenderInstruction::DismissProgress { id });
        }
    }

    /// Close both accumulators. The next chunk starts a new bubble.
    fn close_all(&mut self, out: &mut Vec<RenderInstruction>) {
        self.assistant = None;
        self.take_progress(out);
    }
}

/// One UI mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderInstruction {
    /// Append a finished, immutable bubble.
    AppendBubble {
        id: BubbleId,
        kind: BubbleKind,
        text: String,
    },
    /// Create the streaming assistant bubble with its first chunk.
    OpenAssistant { id: BubbleId, text: String },
    /// Append a chunk to an already opened assistant bubble.
    AppendChunk { id: BubbleId, text: String },
    /// Show a new transient progress line.
    ShowProgress { id: BubbleId, text: String },
    /// Replace the text of the open progress line.
    ReplaceProgress { id: BubbleId, text: String },
    DismissProgress { id: BubbleId },
    /// Collapsible tool result block.
    ToolBlock {
        id: BubbleId,
        tool_name: String,
        output: String,
    },
    /// Side-panel feed update. Never touches the chat cursor.
    Panel(PanelUpdate),
}

/// Result of one reducer step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub cursor: RenderCursor,
    pub instructions: Vec<RenderInstruction>,
}

/// Result of a user submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub cursor: RenderCursor,
    pub instructions: Vec<RenderInstruction>,
    pub outbound: OutboundMessage,
}

/// Apply one inbound event.
pub fn reduce(mut cursor: RenderCursor, event: &InboundEvent) -> Transition {
    let mut out = Vec::new();

    match event {
        InboundEvent::Text { text } => {
            cursor.close_all(&mut out);
            let id = cursor.alloc();
            out.push(RenderInstruction::AppendBubble {
                id,
                kind: BubbleKind::Assistant,
                text: text.clone(),
            });
        }
        InboundEvent::TextChunk { text } => {
            cursor.take_progress(&mut out);
            match cursor.assistant.as_mut() {
                Some(open) => {
                    open.text.push_str(text);
                    out.push(RenderInstruction::AppendChunk {
                        id: open.id,
                        text: text.clone(),
                    });
                }
                None => {
                    let id = cursor.alloc();
                    cursor.assistant = Some(OpenBubble {
                        id,
                        text: text.clone(),
                    });
                    out.push(RenderInstruction::OpenAssistant {
                        id,
                        text: text.clone(),
                    });
                }
            }
        }
        InboundEvent::Thinking { text } | InboundEvent::Status { text } => match cursor.progress {
            Some(id) => out.push(RenderInstruction::ReplaceProgress {
                id,
                text: text.clone(),
            }),
            None => {
                let id = cursor.alloc();
                cursor.progress = Some(id);
                out.push(RenderInstruction::ShowProgress {
                    id,
                    text: text.clone(),
                });
            }
        },
        InboundEvent::ToolOutput { tool_name, output } => {
            cursor.close_all(&mut out);
            let id = cursor.alloc();
            out.push(RenderInstruction::ToolBlock {
                id,
                tool_name: tool_name.clone(),
                output: output.clone(),
            });
        }
        InboundEvent::Error { text } => {
            cursor.close_all(&mut out);
            let id = cursor.alloc();
            out.push(RenderInstruction::AppendBubble {
                id,
                kind: BubbleKind::Error,
                text: text.clone(),
            });
        }
        InboundEvent::CouncilActivated => {
            let id = cursor.alloc();
            out.push(RenderInstruction::AppendBubble {
                id,
                kind: BubbleKind::Notice,
                text: COUNCIL_NOTICE.to_string(),
            });
        }
        InboundEvent::Unknown => {}
        panel_event => {
            if let Some(update) = PanelUpdate::from_event(panel_event) {
                out.push(RenderInstruction::Panel(update));
            }
        }
    }

    Transition {
        cursor,
        instructions: out,
    }
}

/// Validate and stage a user message.
///
/// Returns `None` for empty or whitespace-only input; nothing is rendered or
/// sent in that case. The outbound payload is the text exactly as typed.
pub fn submit(mut cursor: RenderCursor, raw: &str) -> Option<Submission> {
    if raw.trim().is_empty() {
        return None;
    }
    let mut out = Vec::new();
    cursor.close_all(&mut out);
    let id = cursor.alloc();
    out.push(RenderInstruction::AppendBubble {
        id,
        kind: BubbleKind::User,
        text: raw.to_string(),
    });
    Some(Submission {
        cursor,
        instructions: out,
        outbound: OutboundMessage {
            message: raw.to_string(),
        },
    })
}

/// Close every open accumulator (connection lost).
pub fn flush(mut cursor: RenderCursor) -> Transition {
    let mut out = Vec::new();
    cursor.close_all(&mut out);
    Transition {
        cursor,
        instructions: out,
    }
}

/// Append a client-side notice without touching the accumulators.
pub fn notice(mut cursor: RenderCursor, text: &str) -> Transition {
    let id = cursor.alloc();
    Transition {
        instructions: vec![RenderInstruction::AppendBubble {
            id,
            kind: BubbleKind::Notice,
            text: text.to_string(),
        }],
        cursor,
    }
}

/// Render past messages in order, bracketed by start/end markers.
///
/// An empty history renders nothing.
pub fn replay(mut cursor: RenderCursor, entries: &[HistoryEntry]) -> Transition {
    let mut out = Vec::new();
    if entries.is_empty() {
        return Transition {
            cursor,
            instructions: out,
        };
    }
    cursor.close_all(&mut out);

    let start = cursor.alloc();
    out.push(RenderInstruction::AppendBubble {
        id: start,
        kind: BubbleKind::Marker,
        text: HISTORY_START_MARKER.to_string(),
    });
    for entry in entries {
        let id = cursor.alloc();
        let kind = match entry.role {
            Role::User => BubbleKind::User,
            Role::Assistant => BubbleKind::Assistant,
        };
        out.push(RenderInstruction::AppendBubble {
            id,
            kind,
            text: entry.content.clone(),
        });
    }
    let end = cursor.alloc();
    out.push(RenderInstruction::AppendBubble {
        id: end,
        kind: BubbleKind::Marker,
        text: HISTORY_END_MARKER.to_string(),
    });

    Transition {
        cursor,
        instructions: out,
    }
}
