use crate::commands::Command;
use crate::controller::Controller;
use arboard::Clipboard;

impl Controller {
    pub fn handle_paste(&mut self) {
        let clipboard_text = match Clipboard::new().and_then(|mut c| c.get_text()) {
            Ok(text) => text,
            Err(e) => {
                self.status_message = format!("could not access clipboard: {e}");
                return;
            }
        };

        let sanitized = sanitize_paste_text(&clipboard_text);
        if sanitized.is_empty() {
            self.status_message = "nothing to paste".to_string();
            return;
        }

        // Newlines become block splits; everything else is literal text
        // routed through the engine like typed input.
        let char_count = sanitized.chars().filter(|c| *c != '\n').count();
        for (i, line) in sanitized.split('\n').enumerate() {
            if i > 0 {
                self.apply(Command::SplitBlock);
            }
            if !line.is_empty() {
                self.apply(Command::InsertText(line.to_string()));
            }
        }
        self.status_message = format!("{char_count} chars pasted");
    }
}

/// Strip null bytes and control characters (except tab and newline) that
/// clipboards sometimes carry, and trailing newlines they usually add.
fn sanitize_paste_text(text: &str) -> String {
    let trimmed = text.trim_end_matches('\n').trim_end_matches('\r');
    trimmed
        .chars()
        .filter(|c| *c != '\0' && (*c == '\t' || *c == '\n' || *c >= ' '))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_paste_text("a\0b\x01c"), "abc");
        assert_eq!(sanitize_paste_text("keep\ttabs\nand lines"), "keep\ttabs\nand lines");
    }

    #[test]
    fn test_sanitize_trims_trailing_newlines() {
        assert_eq!(sanitize_paste_text("hello\n\n"), "hello");
        assert_eq!(sanitize_paste_text("hello\r\n"), "hello");
    }
}
