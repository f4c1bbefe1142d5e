use crate::commands::Command;
use crate::controller::{Controller, Mode};
use crate::schema::Alignment;
use crate::serialize;
use crossterm::event::{KeyCode, KeyEvent};
use std::path::PathBuf;

impl Controller {
    pub fn handle_command_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => {
                self.command_buffer.push(c);
            }
            KeyCode::Backspace => {
                if self.command_buffer.pop().is_none() {
                    self.mode = Mode::Edit;
                }
            }
            KeyCode::Enter => {
                let input = self.command_buffer.clone();
                self.command_buffer.clear();
                self.mode = Mode::Edit;
                self.execute_command(input.trim());
            }
            KeyCode::Esc => {
                self.command_buffer.clear();
                self.mode = Mode::Edit;
            }
            _ => {}
        }
    }

    pub fn execute_command(&mut self, input: &str) {
        if input.is_empty() {
            return;
        }
        let mut parts = input.split_whitespace();
        let head = match parts.next() {
            Some(head) => head,
            None => return,
        };
        let rest: Vec<&str> = parts.collect();

        match head {
            "w" | "write" => self.handle_write_command(rest.first().copied()),
            "q" | "quit" => {
                if self.dirty {
                    self.status_message =
                        "No write since last change (use :q! to discard)".to_string();
                } else {
                    self.quit = true;
                }
            }
            "q!" => self.quit = true,
            "wq" => {
                self.handle_write_command(rest.first().copied());
                if !self.dirty {
                    self.quit = true;
                }
            }
            "chart" => self.apply(Command::InsertChart),
            "chartcfg" => self.open_chart_dialog(),
            "tag" => {
                if rest.is_empty() {
                    self.status_message = "usage: :tag <label>".to_string();
                } else {
                    // The sidebar inserts values bracketed, e.g. [12.5%].
                    let label = format!("[{}]", rest.join(" "));
                    self.apply(Command::InsertDataTag { label });
                }
            }
            "table" => {
                let (rows, cols) = match rest.first() {
                    Some(size) => match parse_table_size(size) {
                        Some(shape) => shape,
                        None => {
                            self.status_message = "usage: :table [ROWSxCOLS]".to_string();
                            return;
                        }
                    },
                    None => (self.config.table_rows, self.config.table_cols),
                };
                self.apply(Command::InsertTable {
                    rows,
                    cols,
                    with_header_row: self.config.table_header,
                });
            }
            "p" => self.apply(Command::SetParagraph),
            "align" => match rest.first().and_then(|s| Alignment::from_name(s)) {
                Some(align) => self.apply(Command::SetAlignment(align)),
                None => self.status_message = "usage: :align left|center|right".to_string(),
            },
            "list" => self.apply(Command::ToggleBulletList),
            "row" => self.apply(Command::InsertRow {
                before: rest.first() == Some(&"before"),
            }),
            "col" => self.apply(Command::InsertColumn {
                before: rest.first() == Some(&"before"),
            }),
            "delrow" => self.apply(Command::DeleteRow),
            "delcol" => self.apply(Command::DeleteColumn),
            "merge" => self.apply(Command::MergeCells),
            "splitcell" => self.apply(Command::SplitCell),
            "deltable" => self.apply(Command::DeleteTable),
            "undo" => self.apply(Command::Undo),
            "redo" => self.apply(Command::Redo),
            _ => {
                if let Some(level) = parse_heading(head) {
                    self.apply(Command::ToggleHeading { level });
                } else {
                    self.status_message = format!("unknown command: {head}");
                }
            }
        }
    }

    fn handle_write_command(&mut self, arg: Option<&str>) {
        let path = match arg {
            Some(arg) => Some(PathBuf::from(arg)),
            None => self.filename.clone(),
        };
        let path = match path {
            Some(path) => path,
            None => {
                self.status_message = "no file name (use :w <file>)".to_string();
                return;
            }
        };
        match serialize::save_to_file(self.editor.doc(), &path) {
            Ok(bytes) => {
                self.status_message = format!("\"{}\" {bytes} bytes written", path.display());
                self.filename = Some(path);
                self.dirty = false;
            }
            Err(e) => {
                self.status_message = format!("could not write file: {e}");
            }
        }
    }
}

fn parse_heading(word: &str) -> Option<u8> {
    let level = word.strip_prefix('h')?.parse::<u8>().ok()?;
    if (crate::schema::MIN_HEADING_LEVEL..=crate::schema::MAX_HEADING_LEVEL).contains(&level) {
        Some(level)
    } else {
        None
    }
}

fn parse_table_size(size: &str) -> Option<(usize, usize)> {
    let (rows, cols) = size.split_once('x')?;
    let rows = rows.parse::<usize>().ok()?;
    let cols = cols.parse::<usize>().ok()?;
    if (1..=20).contains(&rows) && (1..=20).contains(&cols) {
        Some((rows, cols))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RcConfig;
    use crate::schema::NodeType;

    fn controller() -> Controller {
        Controller::new(RcConfig::default(), None, false)
            .unwrap_or_else(|e| panic!("controller: {e}"))
    }

    #[test]
    fn test_parse_heading_levels() {
        assert_eq!(parse_heading("h1"), Some(1));
        assert_eq!(parse_heading("h6"), Some(6));
        assert_eq!(parse_heading("h7"), None);
        assert_eq!(parse_heading("x1"), None);
    }

    #[test]
    fn test_parse_table_size() {
        assert_eq!(parse_table_size("3x4"), Some((3, 4)));
        assert_eq!(parse_table_size("0x4"), None);
        assert_eq!(parse_table_size("axb"), None);
    }

    #[test]
    fn test_chart_command_inserts_chart() {
        let mut c = controller();
        c.execute_command("chart");
        let kinds: Vec<NodeType> = c
            .editor
            .doc()
            .root()
            .children()
            .iter()
            .map(|n| n.kind())
            .collect();
        assert!(kinds.contains(&NodeType::ChartBlock));
        assert!(c.dirty);
    }

    #[test]
    fn test_tag_command_brackets_label() {
        let mut c = controller();
        c.execute_command("tag 12.5%");
        let text = c.editor.doc().range_text(0, c.editor.doc().content_size());
        assert!(text.contains("[12.5%]"));
    }

    #[test]
    fn test_table_command_uses_config_defaults() {
        let mut c = controller();
        c.execute_command("table");
        let table = c
            .editor
            .doc()
            .root()
            .children()
            .iter()
            .find(|n| n.kind() == NodeType::Table)
            .cloned()
            .unwrap_or_else(|| panic!("no table inserted"));
        assert_eq!(table.child_count(), 3);
        assert_eq!(table.child(0).child(0).kind(), NodeType::TableHeaderCell);
    }

    #[test]
    fn test_unknown_command_reports() {
        let mut c = controller();
        c.execute_command("frobnicate");
        assert!(c.status_message.contains("unknown command"));
    }

    #[test]
    fn test_quit_refuses_when_dirty() {
        let mut c = controller();
        c.execute_command("chart");
        c.execute_command("q");
        assert!(!c.quit);
        c.execute_command("q!");
        assert!(c.quit);
    }

    #[test]
    fn test_readonly_blocks_edits() {
        let mut c = Controller::new(RcConfig::default(), None, true)
            .unwrap_or_else(|e| panic!("controller: {e}"));
        let before = c.editor.doc().clone();
        c.execute_command("chart");
        assert_eq!(*c.editor.doc(), before);
        assert!(c.status_message.contains("read-only"));
    }

    #[test]
    fn test_write_and_quit_round_trip() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("out.json");
        let mut c = controller();
        c.execute_command("chart");
        c.execute_command(&format!("w {}", path.display()));
        assert!(!c.dirty);
        assert!(path.exists());
        c.execute_command("q");
        assert!(c.quit);
    }
}
