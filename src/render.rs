//! Renderers: the impure half of the reducer split.
//!
//! [`Transcript`] is an in-memory model of the chat window, used by tests and
//! anything that wants to inspect what a user would see. [`TerminalRenderer`]
//! prints the same instructions to a terminal with `colored`.

use std::io::Write;
use std::time::Duration;

use colored::*;

use crate::panels::{PanelBoard, PanelUpdate, Tab};
use crate::reducer::{BubbleId, BubbleKind, RenderInstruction};

/// Connection banner shown outside the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Connecting { attempt: u32 },
    Online,
    Offline,
    Reconnecting { attempt: u32, delay: Duration },
    /// Retry limit reached. Only a restart recovers.
    RefreshRequired,
}

/// Applies reducer output to some UI.
pub trait Renderer {
    fn apply(&mut self, instruction: &RenderInstruction);

    fn banner(&mut self, banner: &Banner);

    /// The active tab changed. `board` is the current panel state.
    fn select_tab(&mut self, tab: Tab, board: &PanelBoard);

    /// Show the most recent tool block in full.
    fn expand_last_tool(&mut self);
}

// -- In-memory transcript ---------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Bubble {
        id: BubbleId,
        kind: BubbleKind,
        text: String,
    },
    Tool {
        id: BubbleId,
        tool_name: String,
        output: String,
        collapsed: bool,
    },
}

impl Entry {
    pub fn id(&self) -> BubbleId {
        match self {
            Entry::Bubble { id, .. } | Entry::Tool { id, .. } => *id,
        }
    }

    /// What the bubble reads as, tool blocks included.
    pub fn display_text(&self) -> String {
        match self {
            Entry::Bubble { text, .. } => text.clone(),
            Entry::Tool {
                tool_name, output, ..
            } => format!("{} output: {}", tool_name, output),
        }
    }
}

/// Everything rendered so far, in order.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub entries: Vec<Entry>,
    pub progress: Option<(BubbleId, String)>,
    pub panels: PanelBoard,
    pub banners: Vec<Banner>,
    pub active_tab: Tab,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.entries.iter().map(Entry::display_text).collect()
    }

    /// Text of every bubble of `kind`, in order.
    pub fn texts_of(&self, kind: BubbleKind) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Entry::Bubble { kind: k, text, .. } if *k == kind => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Flip a tool block between collapsed and expanded. Returns the new
    /// collapsed state, or `None` if `id` is not a tool block.
    pub fn toggle_tool(&mut self, id: BubbleId) -> Option<bool> {
        self.entries.iter_mut().find_map(|e| match e {
            Entry::Tool {
                id: tid, collapsed, ..
            } if *tid == id => {
                *collapsed = !*collapsed;
                Some(*collapsed)
            }
            _ => None,
        })
    }

    fn bubble_mut(&mut self, id: BubbleId) -> Option<&mut String> {
        self.entries.iter_mut().rev().find_map(|e| match e {
            Entry::Bubble { id: bid, text, .. } if *bid == id => Some(text),
            _ => None,
        })
    }
}

impl Renderer for Transcript {
    fn apply(&mut self, instruction: &RenderInstruction) {
        match instruction {
            RenderInstruction::AppendBubble { id, kind, text } => self.entries.push(Entry::Bubble {
                id: *id,
                kind: *kind,
                text: text.clone(),
            }),
            RenderInstruction::OpenAssistant { id, text } => self.entries.push(Entry::Bubble {
                id: *id,
                kind: BubbleKind::Assistant,
                text: text.clone(),
            }),
            RenderInstruction::AppendChunk { id, text } => {
                if let Some(existing) = self.bubble_mut(*id) {
                    existing.push_str(text);
                }
            }
            RenderInstruction::ShowProgress { id, text }
            | RenderInstruction::ReplaceProgress { id, text } => {
                self.progress = Some((*id, text.clone()));
            }
            RenderInstruction::DismissProgress { id } => {
                if self.progress.as_ref().is_some_and(|(pid, _)| pid == id) {
                    self.progress = None;
                }
            }
            RenderInstruction::ToolBlock {
                id,
                tool_name,
                output,
            } => self.entries.push(Entry::Tool {
                id: *id,
                tool_name: tool_name.clone(),
                output: output.clone(),
                collapsed: true,
            }),
            RenderInstruction::Panel(update) => self.panels.apply(update),
        }
    }

    fn banner(&mut self, banner: &Banner) {
        self.banners.push(banner.clone());
    }

    fn select_tab(&mut self, tab: Tab, _board: &PanelBoard) {
        self.active_tab = tab;
    }

    fn expand_last_tool(&mut self) {
        let last = self.entries.iter_mut().rev().find_map(|e| match e {
            Entry::Tool { collapsed, .. } => Some(collapsed),
            _ => None,
        });
        if let Some(collapsed) = last {
            *collapsed = false;
        }
    }
}

// -- Terminal ---------------------------------------------------------------

/// Carriage return plus ANSI erase-line.
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Line-oriented terminal output.
///
/// Streamed assistant text is printed inline as chunks arrive. Any other
/// output first terminates the open line; a stream that resumes afterwards
/// gets a `Timmy: …` continuation prefix. Progress lines are transient:
/// drawn without a newline and erased in place. Tool blocks print at most
/// `tool_preview_lines` lines. Panel feeds print only while their tab is
/// active; vibe and pulse print from any tab.
pub struct TerminalRenderer<W: Write> {
    out: W,
    tool_preview_lines: usize,
    inline_open: bool,
    progress_open: bool,
    active_tab: Tab,
    last_tool: Option<(String, String)>,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout(tool_preview_lines: usize) -> Self {
        Self::new(std::io::stdout(), tool_preview_lines)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, tool_preview_lines: usize) -> Self {
        Self {
            out,
            tool_preview_lines,
            inline_open: false,
            progress_open: false,
            active_tab: Tab::Chat,
            last_tool: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Erase the transient progress line, if one is drawn.
    fn clear_progress(&mut self) {
        if self.progress_open {
            let _ = write!(self.out, "{}", CLEAR_LINE);
            self.progress_open = false;
        }
    }

    fn draw_progress(&mut self, text: &str) {
        self.end_inline();
        let _ = write!(self.out, "{}{}", CLEAR_LINE, format!("  ⋯ {}", text).dimmed());
        self.progress_open = true;
    }

    fn end_inline(&mut self) {
        self.clear_progress();
        if self.inline_open {
            let _ = writeln!(self.out);
            self.inline_open = false;
        }
    }

    fn line(&mut self, s: String) {
        let _ = writeln!(self.out, "{}", s);
    }

    fn tool_block(&mut self, tool_name: &str, output: &str) {
        let lines: Vec<&str> = output.lines().collect();
        self.line(format!("▸ {} output:", tool_name).bright_magenta().to_string());
        for l in lines.iter().take(self.tool_preview_lines) {
            self.line(format!("  {}", l));
        }
        if lines.len() > self.tool_preview_lines {
            let hidden = lines.len() - self.tool_preview_lines;
            self.line(
                format!("  … ({} more lines, /expand to show)", hidden)
                    .dimmed()
                    .to_string(),
            );
        }
        self.last_tool = Some((tool_name.to_string(), output.to_string()));
    }

    fn panel(&mut self, update: &PanelUpdate) {
        let visible = update.tab().map_or(true, |t| t == self.active_tab);
        if !visible {
            return;
        }
        let s = match update {
            PanelUpdate::Dream { text } => format!("[dream] {}", text).bright_blue(),
            PanelUpdate::Synapse { synapse } => format!(
                "[synapse] {} --{}--> {}",
                synapse.source, synapse.relationship, synapse.target
            )
            .bright_cyan(),
            PanelUpdate::Evolution { text } => format!("[evolution] {}", text).bright_green(),
            PanelUpdate::Market { text } => format!("[market] {}", text).bright_yellow(),
            PanelUpdate::Draft { text } => format!("[draft] {}", text).white(),
            PanelUpdate::Vibe { vibe } => format!("[vibe: {}]", vibe).dimmed(),
            PanelUpdate::Pulse { temp } => format!("[pulse: {:.1}°]", temp).dimmed(),
        };
        self.line(s.to_string());
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn apply(&mut self, instruction: &RenderInstruction) {
        match instruction {
            RenderInstruction::AppendChunk { text, .. } => {
                self.clear_progress();
                if !self.inline_open {
                    let _ = write!(self.out, "{} …", "Timmy:".bright_cyan().bold());
                    self.inline_open = true;
                }
                let _ = write!(self.out, "{}", text);
                let _ = self.out.flush();
                return;
            }
            RenderInstruction::OpenAssistant { text, .. } => {
                self.end_inline();
                let _ = write!(self.out, "{} {}", "Timmy:".bright_cyan().bold(), text);
                let _ = self.out.flush();
                self.inline_open = true;
                return;
            }
            RenderInstruction::DismissProgress { .. } => {
                self.clear_progress();
                let _ = self.out.flush();
                return;
            }
            RenderInstruction::ShowProgress { text, .. }
            | RenderInstruction::ReplaceProgress { text, .. } => {
                self.draw_progress(text);
                let _ = self.out.flush();
                return;
            }
            _ => self.end_inline(),
        }

        match instruction {
            RenderInstruction::AppendBubble { kind, text, .. } => {
                let s = match kind {
                    BubbleKind::User => format!("{} {}", "You:".bright_green().bold(), text),
                    BubbleKind::Assistant => format!("{} {}", "Timmy:".bright_cyan().bold(), text),
                    BubbleKind::Notice => text.bright_white().italic().to_string(),
                    BubbleKind::Marker => text.dimmed().to_string(),
                    BubbleKind::Error => format!("Error: {}", text).bright_red().to_string(),
                };
                self.line(s);
            }
            RenderInstruction::ToolBlock {
                tool_name, output, ..
            } => self.tool_block(tool_name, output),
            RenderInstruction::Panel(update) => self.panel(update),
            RenderInstruction::AppendChunk { .. }
            | RenderInstruction::OpenAssistant { .. }
            | RenderInstruction::ShowProgress { .. }
            | RenderInstruction::ReplaceProgress { .. }
            | RenderInstruction::DismissProgress { .. } => {}
        }
        let _ = self.out.flush();
    }

    fn banner(&mut self, banner: &Banner) {
        self.end_inline();
        let s = match banner {
            Banner::Connecting { attempt: 0 } => "● connecting…".yellow(),
            Banner::Connecting { attempt } => format!("● connecting (attempt {})…", attempt).yellow(),
            Banner::Online => "● online".bright_green(),
            Banner::Offline => "● disconnected".bright_red(),
            Banner::Reconnecting { attempt, delay } => format!(
                "● reconnecting in {:.1}s (attempt {})",
                delay.as_secs_f64(),
                attempt
            )
            .yellow(),
            Banner::RefreshRequired => {
                "● connection lost. Restart the client to reconnect.".bright_red().bold()
            }
        };
        self.line(s.to_string());
        let _ = self.out.flush();
    }

    fn select_tab(&mut self, tab: Tab, board: &PanelBoard) {
        self.end_inline();
        self.active_tab = tab;
        self.line(format!("── {} ──", tab).bold().to_string());
        let lines = board.lines(tab);
        if tab != Tab::Chat && lines.is_empty() {
            self.line("(empty)".dimmed().to_string());
        }
        for l in lines {
            self.line(format!("  {}", l));
        }
        let _ = self.out.flush();
    }

    fn expand_last_tool(&mut self) {
        self.end_inline();
        match self.last_tool.clone() {
            Some((name, output)) => {
                self.line(format!("▾ {} output:", name).bright_magenta().to_string());
                for l in output.lines() {
                    self.line(format!("  {}", l));
                }
            }
            None => self.line("(no tool output yet)".dimmed().to_string()),
        }
    }
}
