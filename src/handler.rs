use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{App, FocusPane, InputMode};
use crate::session::Turn;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Ctrl-C quits from any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Tab => cycle_focus(app),

        // Re-enter the focused text field
        KeyCode::Char('i') | KeyCode::Enter => {
            if app.focus != FocusPane::Transcript {
                enter_editing(app);
            }
        }

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_transcript_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_transcript_up(),
        KeyCode::Char('g') => app.transcript_scroll = 0,
        KeyCode::Char('G') => app.scroll_transcript_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Tab => cycle_focus(app),
        KeyCode::Enter => match app.focus {
            FocusPane::Input => submit_prompt(app),
            // Instruction edits apply in place; Enter just leaves the field
            _ => app.input_mode = InputMode::Normal,
        },
        KeyCode::Backspace => {
            let (buffer, cursor) = edit_target(app);
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(buffer, *cursor);
                buffer.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let (buffer, cursor) = edit_target(app);
            if *cursor < buffer.chars().count() {
                let byte_pos = char_to_byte_index(buffer, *cursor);
                buffer.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            let (_, cursor) = edit_target(app);
            *cursor = cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let (buffer, cursor) = edit_target(app);
            let char_count = buffer.chars().count();
            *cursor = (*cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            let (_, cursor) = edit_target(app);
            *cursor = 0;
        }
        KeyCode::End => {
            let (buffer, cursor) = edit_target(app);
            *cursor = buffer.chars().count();
        }
        KeyCode::Char(c) => {
            let (buffer, cursor) = edit_target(app);
            let byte_pos = char_to_byte_index(buffer, *cursor);
            buffer.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => {}
    }
}

/// The text field the current focus edits, with its cursor.
fn edit_target(app: &mut App) -> (&mut String, &mut usize) {
    match app.focus {
        FocusPane::Instruction => (&mut app.session.instruction, &mut app.instruction_cursor),
        _ => (&mut app.prompt_input, &mut app.prompt_cursor),
    }
}

// Focus order: Instruction -> Transcript -> Input. Text panes auto-enter
// editing, the transcript drops back to normal mode for scrolling keys.
fn cycle_focus(app: &mut App) {
    app.focus = match app.focus {
        FocusPane::Instruction => FocusPane::Transcript,
        FocusPane::Transcript => FocusPane::Input,
        FocusPane::Input => FocusPane::Instruction,
    };

    match app.focus {
        FocusPane::Transcript => app.input_mode = InputMode::Normal,
        _ => enter_editing(app),
    }
}

fn enter_editing(app: &mut App) {
    app.input_mode = InputMode::Editing;
    // Cursor at end of the existing text
    match app.focus {
        FocusPane::Instruction => {
            app.instruction_cursor = app.session.instruction.chars().count();
        }
        _ => {
            app.prompt_cursor = app.prompt_input.chars().count();
        }
    }
}

/// Submit the prompt: snapshot the history first so the request carries
/// the new prompt only as its trailing block, then show the user turn
/// immediately and hand the call to a background task. A task already in
/// flight blocks the submit, so one request runs at a time.
fn submit_prompt(app: &mut App) {
    if app.prompt_input.is_empty() || app.generation_task.is_some() {
        return;
    }

    let prompt = app.prompt_input.clone();
    let history = app.session.conversation.snapshot();
    app.session.conversation.append(Turn::user(prompt.clone()));

    app.prompt_input.clear();
    app.prompt_cursor = 0;
    app.waiting = true;
    app.notice = None;

    // Scroll so "Thinking..." is visible
    app.scroll_transcript_to_bottom();

    let client = app.client.clone();
    let instruction = app.session.instruction.clone();
    app.generation_task = Some(tokio::spawn(async move {
        client.generate(&instruction, &history, &prompt).await
    }));
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => {
            for _ in 0..3 {
                app.scroll_transcript_down();
            }
        }
        MouseEventKind::ScrollUp => {
            for _ in 0..3 {
                app.scroll_transcript_up();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Notice;
    use crate::auth::ServiceCredential;
    use crate::gemini::GeminiClient;
    use crate::session::{TurnRole, DEFAULT_INSTRUCTION};

    fn test_app() -> App {
        let credential = ServiceCredential::from_json(
            r#"{"project_id": "demo-project", "api_key": "test-key"}"#,
        )
        .unwrap();
        App::new(GeminiClient::new(credential, "ds"))
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn char_to_byte_index_handles_multibyte() {
        assert_eq!(char_to_byte_index("abc", 0), 0);
        assert_eq!(char_to_byte_index("abc", 2), 2);
        assert_eq!(char_to_byte_index("héllo", 2), 3); // é is two bytes
        assert_eq!(char_to_byte_index("abc", 10), 3); // clamps to end
    }

    #[test]
    fn typing_edits_the_prompt_at_the_cursor() {
        let mut app = test_app();
        press(&mut app, KeyCode::Char('a'));
        press(&mut app, KeyCode::Char('é'));
        press(&mut app, KeyCode::Char('c'));
        assert_eq!(app.prompt_input, "aéc");

        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Backspace); // removes é
        assert_eq!(app.prompt_input, "ac");
        assert_eq!(app.prompt_cursor, 1);

        press(&mut app, KeyCode::Char('b'));
        assert_eq!(app.prompt_input, "abc");
    }

    #[test]
    fn tab_cycles_panes_and_modes() {
        let mut app = test_app();
        assert_eq!(app.focus, FocusPane::Input);
        assert_eq!(app.input_mode, InputMode::Editing);

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, FocusPane::Instruction);
        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(
            app.instruction_cursor,
            app.session.instruction.chars().count()
        );

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, FocusPane::Transcript);
        assert_eq!(app.input_mode, InputMode::Normal);

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, FocusPane::Input);
        assert_eq!(app.input_mode, InputMode::Editing);
    }

    #[test]
    fn instruction_is_editable_in_place() {
        let mut app = test_app();
        press(&mut app, KeyCode::Tab); // Instruction, cursor at end
        press(&mut app, KeyCode::Char(' '));
        press(&mut app, KeyCode::Char('S'));
        press(&mut app, KeyCode::Char('i'));

        assert_eq!(
            app.session.instruction,
            format!("{} Si", DEFAULT_INSTRUCTION)
        );
    }

    #[test]
    fn q_quits_in_normal_mode_but_types_in_editing() {
        let mut app = test_app();
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.should_quit);
        assert_eq!(app.prompt_input, "q");

        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn enter_submits_and_shows_the_user_turn_immediately() {
        let mut app = test_app();
        app.notice = Some(Notice::Error);
        app.prompt_input = "what is rust".to_string();
        app.prompt_cursor = app.prompt_input.chars().count();

        press(&mut app, KeyCode::Enter);

        let turns = app.session.conversation.turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[0].text, "what is rust");
        assert!(app.prompt_input.is_empty());
        assert!(app.waiting);
        assert_eq!(app.notice, None);
        assert!(app.generation_task.is_some());

        app.generation_task.take().unwrap().abort();
    }

    #[tokio::test]
    async fn a_pending_request_blocks_the_next_submit() {
        let mut app = test_app();
        app.prompt_input = "first".to_string();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.session.conversation.len(), 1);

        app.prompt_input = "second".to_string();
        press(&mut app, KeyCode::Enter);

        // Nothing moved: same single turn, input untouched.
        assert_eq!(app.session.conversation.len(), 1);
        assert_eq!(app.prompt_input, "second");

        app.generation_task.take().unwrap().abort();
    }

    #[tokio::test]
    async fn an_empty_prompt_is_not_submitted() {
        let mut app = test_app();
        press(&mut app, KeyCode::Enter);

        assert!(app.session.conversation.is_empty());
        assert!(app.generation_task.is_none());
        assert!(!app.waiting);
    }
}
