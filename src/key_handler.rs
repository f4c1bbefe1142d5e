use crate::commands::Command;
use crate::controller::{Controller, Mode};
use crate::schema::Mark;
use crate::selection::{Motion, Selection};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

impl Controller {
    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::Edit => self.handle_edit_key(key),
            Mode::Command => self.handle_command_key(key),
            Mode::Dialog => self.handle_dialog_key(key),
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);

        if ctrl {
            match key.code {
                KeyCode::Char('b') => self.apply(Command::ToggleMark(Mark::Bold)),
                KeyCode::Char('i') => self.apply(Command::ToggleMark(Mark::Italic)),
                KeyCode::Char('u') => self.apply(Command::ToggleMark(Mark::Underline)),
                KeyCode::Char('z') => self.apply(Command::Undo),
                KeyCode::Char('y') => self.apply(Command::Redo),
                KeyCode::Char('v') => self.handle_paste(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char(':') => {
                self.mode = Mode::Command;
                self.command_buffer.clear();
            }
            KeyCode::Char(c) => self.apply(Command::InsertText(c.to_string())),
            KeyCode::Enter => self.apply(Command::SplitBlock),
            KeyCode::Backspace => self.apply(Command::DeleteBackward),
            KeyCode::Left => self.editor.move_cursor(Motion::Left, shift),
            KeyCode::Right => self.editor.move_cursor(Motion::Right, shift),
            KeyCode::Up => self.editor.move_cursor(Motion::Up, shift),
            KeyCode::Down => self.editor.move_cursor(Motion::Down, shift),
            KeyCode::Home => self.editor.move_cursor(Motion::LineStart, shift),
            KeyCode::End => self.editor.move_cursor(Motion::LineEnd, shift),
            KeyCode::PageUp => self.editor.move_cursor(Motion::DocStart, shift),
            KeyCode::PageDown => self.editor.move_cursor(Motion::DocEnd, shift),
            KeyCode::Esc => {
                // Collapse any range back to a caret.
                let head = self.editor.selection().head;
                self.editor.set_selection(Selection::caret(head));
            }
            _ => {}
        }
    }
}
