//! Input handling for the TUI.
//!
//! Processes keyboard events and updates application state.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::AppMode;
use crate::App;

/// Handle keyboard events.
pub fn handle_events(key: KeyEvent, app: &mut App) {
    match app.mode {
        AppMode::Chat => handle_chat_mode(key, app),
        AppMode::TitlePrompt => handle_title_mode(key, app),
        AppMode::ValidationDetails => handle_overlay_mode(key, app, 'v'),
        AppMode::History => handle_history_mode(key, app),
        AppMode::Help => handle_help_mode(key, app),
    }
}

fn is_ctrl(key: &KeyEvent, c: char) -> bool {
    key.code == KeyCode::Char(c) && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Handle input while chatting.
fn handle_chat_mode(key: KeyEvent, app: &mut App) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.quit(),
            KeyCode::Char('f') => app.request_finalize(),
            KeyCode::Char('p') => app.request_publish(),
            KeyCode::Char('r') => app.continue_exploring(),
            KeyCode::Char('v') => app.validation_key(),
            KeyCode::Char('h') => app.show_history(),
            KeyCode::Char('s') => app.cycle_sort(),
            KeyCode::Char('n') => app.new_conversation(),
            KeyCode::Char('u') => app.clear_input(),
            KeyCode::Char('a') => app.move_cursor_start(),
            KeyCode::Char('e') => app.move_cursor_end(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.quit(),
        KeyCode::Char('?') if app.input.is_empty() => app.show_help(),
        KeyCode::Enter => app.submit_input(),
        KeyCode::Char(c) => app.enter_char(c),
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_start(),
        KeyCode::End => app.move_cursor_end(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::PageDown => app.scroll_down(10),
        _ => {}
    }
}

/// Handle input in the project title prompt.
fn handle_title_mode(key: KeyEvent, app: &mut App) {
    if is_ctrl(&key, 'c') {
        app.quit();
        return;
    }
    match key.code {
        KeyCode::Esc => app.cancel_title(),
        KeyCode::Enter => app.confirm_title(),
        KeyCode::Backspace => {
            app.title_input.pop();
        }
        KeyCode::Char(c) => app.title_input.push(c),
        _ => {}
    }
}

/// Handle input in a read-only overlay that `toggle` (with Ctrl) closes.
fn handle_overlay_mode(key: KeyEvent, app: &mut App, toggle: char) {
    if is_ctrl(&key, 'c') {
        app.quit();
    } else if is_ctrl(&key, toggle) || matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Enter) {
        app.dismiss_overlay();
    }
}

/// Handle input in help mode.
fn handle_help_mode(key: KeyEvent, app: &mut App) {
    if key.code == KeyCode::Char('?') {
        app.dismiss_overlay();
    } else {
        handle_overlay_mode(key, app, 'h');
    }
}

/// Handle input in history mode.
fn handle_history_mode(key: KeyEvent, app: &mut App) {
    if is_ctrl(&key, 'c') {
        app.quit();
        return;
    }
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.dismiss_overlay(),
        KeyCode::Char('h') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.dismiss_overlay();
        }
        KeyCode::Up | KeyCode::Char('k') => app.history_previous(),
        KeyCode::Down | KeyCode::Char('j') => app.history_next(),
        KeyCode::Enter => app.use_history_entry(),
        KeyCode::Char('c') => app.clear_history(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::WorkflowState;

    fn create_key_event(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_events(create_key_event(KeyCode::Char(c), KeyModifiers::NONE), app);
        }
    }

    #[test]
    fn test_quit_on_escape() {
        let mut app = App::new_test();
        handle_events(create_key_event(KeyCode::Esc, KeyModifiers::NONE), &mut app);
        assert!(app.should_quit);
    }

    #[test]
    fn test_quit_on_ctrl_c() {
        let mut app = App::new_test();
        handle_events(create_key_event(KeyCode::Char('c'), KeyModifiers::CONTROL), &mut app);
        assert!(app.should_quit);
    }

    #[test]
    fn test_typing_and_backspace() {
        let mut app = App::new_test();
        type_text(&mut app, "sixes");
        handle_events(create_key_event(KeyCode::Backspace, KeyModifiers::NONE), &mut app);
        assert_eq!(app.input, "sixe");
    }

    #[test]
    fn test_question_mark_in_text() {
        let mut app = App::new_test();
        type_text(&mut app, "who?");
        assert_eq!(app.input, "who?");
        assert_eq!(app.mode, AppMode::Chat);
    }

    #[test]
    fn test_show_and_dismiss_help() {
        let mut app = App::new_test();
        handle_events(create_key_event(KeyCode::Char('?'), KeyModifiers::NONE), &mut app);
        assert_eq!(app.mode, AppMode::Help);

        handle_events(create_key_event(KeyCode::Char('?'), KeyModifiers::NONE), &mut app);
        assert_eq!(app.mode, AppMode::Chat);
    }

    #[test]
    fn test_enter_queues_query() {
        let mut app = App::new_test();
        type_text(&mut app, "Top run scorers");
        handle_events(create_key_event(KeyCode::Enter, KeyModifiers::NONE), &mut app);
        assert!(app.has_pending_work());
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_finalize_title_prompt() {
        let mut app = App::new_test();
        type_text(&mut app, "question");
        handle_events(create_key_event(KeyCode::Enter, KeyModifiers::NONE), &mut app);
        app.run_pending_work();

        handle_events(create_key_event(KeyCode::Char('f'), KeyModifiers::CONTROL), &mut app);
        assert_eq!(app.mode, AppMode::TitlePrompt);

        type_text(&mut app, "Spin Twins");
        assert_eq!(app.title_input, "Spin Twins");
        assert!(app.input.is_empty());

        handle_events(create_key_event(KeyCode::Enter, KeyModifiers::NONE), &mut app);
        assert_eq!(app.mode, AppMode::Chat);
        app.run_pending_work();
        assert_eq!(app.session.state(), WorkflowState::Validated);

        handle_events(create_key_event(KeyCode::Char('v'), KeyModifiers::CONTROL), &mut app);
        assert_eq!(app.mode, AppMode::ValidationDetails);
        handle_events(create_key_event(KeyCode::Char('v'), KeyModifiers::CONTROL), &mut app);
        assert_eq!(app.mode, AppMode::Chat);
    }

    #[test]
    fn test_title_prompt_escape() {
        let mut app = App::new_test();
        app.mode = AppMode::TitlePrompt;
        type_text(&mut app, "abc");
        handle_events(create_key_event(KeyCode::Esc, KeyModifiers::NONE), &mut app);
        assert_eq!(app.mode, AppMode::Chat);
        assert!(app.title_input.is_empty());
        assert!(!app.should_quit);
    }

    #[test]
    fn test_history_toggle() {
        let mut app = App::new_test();
        handle_events(create_key_event(KeyCode::Char('h'), KeyModifiers::CONTROL), &mut app);
        assert_eq!(app.mode, AppMode::History);
        handle_events(create_key_event(KeyCode::Char('h'), KeyModifiers::CONTROL), &mut app);
        assert_eq!(app.mode, AppMode::Chat);
    }
}
