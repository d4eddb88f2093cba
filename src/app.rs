use anyhow::{anyhow, Result};
use tokio::task::JoinHandle;
use tracing::error;

use crate::gemini::{GeminiClient, GenerationOutcome, FALLBACK_ANSWER};
use crate::session::{Session, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Instruction,
    Transcript,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Transient marker for how the latest assistant turn arrived. Styles the
/// turn in the transcript until the next submit clears it; the turn text
/// itself is stored plain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    NoAnswer,
    Error,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub focus: FocusPane,
    pub input_mode: InputMode,

    // Conversation state
    pub session: Session,

    // Prompt input
    pub prompt_input: String,
    pub prompt_cursor: usize,

    // Instruction editing
    pub instruction_cursor: usize,

    // Transcript scroll state
    pub transcript_scroll: u16,
    pub transcript_height: u16, // inner height of the transcript, for scroll math
    pub transcript_width: u16,  // inner width of the transcript, for wrap math
    pub transcript_total_lines: u16,

    // In-flight request state
    pub waiting: bool,
    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub notice: Option<Notice>,
    pub generation_task: Option<JoinHandle<Result<GenerationOutcome>>>,

    pub client: GeminiClient,
}

impl App {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            should_quit: false,
            focus: FocusPane::Input,
            input_mode: InputMode::Editing,

            session: Session::new(),

            prompt_input: String::new(),
            prompt_cursor: 0,

            instruction_cursor: 0,

            transcript_scroll: 0,
            transcript_height: 0,
            transcript_width: 0,
            transcript_total_lines: 0,

            waiting: false,
            animation_frame: 0,
            notice: None,
            generation_task: None,

            client,
        }
    }

    /// Harvest the background request once it has completed. The task slot
    /// stays occupied until then, which is what blocks a second submit.
    pub async fn poll_generation(&mut self) {
        let finished = self
            .generation_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.generation_task.take() {
            let result = match task.await {
                Ok(result) => result,
                Err(err) => Err(anyhow!("generation task failed: {err}")),
            };
            self.finish_generation(result);
        }
    }

    /// Every completed request appends exactly one assistant turn: the
    /// answer, the fallback text, or the failure embedded as chat text.
    pub fn finish_generation(&mut self, result: Result<GenerationOutcome>) {
        self.waiting = false;

        match result {
            Ok(GenerationOutcome::Answer(text)) => {
                self.session.conversation.append(Turn::assistant(text));
            }
            Ok(GenerationOutcome::Empty) => {
                self.session
                    .conversation
                    .append(Turn::assistant(FALLBACK_ANSWER));
                self.notice = Some(Notice::NoAnswer);
            }
            Err(err) => {
                error!(error = %err, "generation failed");
                self.session.conversation.append(Turn::assistant(format!(
                    "An error occurred while generating the answer: {err:#}"
                )));
                self.notice = Some(Notice::Error);
            }
        }

        self.scroll_transcript_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.waiting {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_transcript_down(&mut self) {
        let max = self
            .transcript_total_lines
            .saturating_sub(self.transcript_height);
        if self.transcript_scroll < max {
            self.transcript_scroll += 1;
        }
    }

    pub fn scroll_transcript_up(&mut self) {
        self.transcript_scroll = self.transcript_scroll.saturating_sub(1);
    }

    /// Scroll the transcript so the newest turn (or "Thinking...") is visible.
    pub fn scroll_transcript_to_bottom(&mut self) {
        // Use actual transcript width for wrap calculation, default to 50 if not set
        let wrap_width = if self.transcript_width > 0 {
            self.transcript_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for turn in self.session.conversation.turns() {
            total_lines += 1; // Label line ("You:" or "Gemini:")
            for line in turn.text.lines() {
                // Character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after each turn
        }

        if self.waiting {
            total_lines += 2; // "Gemini:" + "Thinking..."
        }

        let visible_height = if self.transcript_height > 0 {
            self.transcript_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.transcript_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}
