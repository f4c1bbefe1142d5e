use crate::commands::Command;
use crate::config::RcConfig;
use crate::dialog::ChartDialog;
use crate::document::Document;
use crate::editor::Editor;
use crate::serialize;
use crate::view::{RenderParams, View, ViewModel};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, stdout};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Edit,
    Command,
    Dialog,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Edit => "EDIT",
            Mode::Command => "COMMAND",
            Mode::Dialog => "CHART",
        }
    }
}

/// The reference host: one cooperative event loop. Each input event is
/// translated into a command, dispatched through the editor, and fully
/// committed before the next event is read; the views only ever see
/// completed documents.
pub struct Controller {
    pub editor: Editor,
    pub view: View,
    pub mode: Mode,
    pub command_buffer: String,
    pub status_message: String,
    pub dialog: Option<ChartDialog>,
    pub filename: Option<PathBuf>,
    pub readonly: bool,
    pub config: RcConfig,
    pub dirty: bool,
    pub quit: bool,
}

impl Controller {
    pub fn new(
        config: RcConfig,
        filename: Option<PathBuf>,
        readonly: bool,
    ) -> io::Result<Controller> {
        let (doc, status_message) = match &filename {
            Some(path) if path.exists() => {
                let report = serialize::load_from_file(path)?;
                let status = if report.warnings.is_empty() {
                    format!("\"{}\" loaded", path.display())
                } else {
                    format!(
                        "\"{}\" loaded, {} node(s) substituted",
                        path.display(),
                        report.warnings.len()
                    )
                };
                (report.doc, status)
            }
            Some(path) => (Document::empty(), format!("\"{}\" [new file]", path.display())),
            None => (Document::seed(), String::new()),
        };
        Ok(Controller {
            editor: Editor::new(doc, config.history_depth, config.coalesce),
            view: View::new(),
            mode: Mode::Edit,
            command_buffer: String::new(),
            status_message,
            dialog: None,
            filename,
            readonly,
            config,
            dirty: false,
            quit: false,
        })
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        execute!(stdout(), EnterAlternateScreen)?;
        enable_raw_mode()?;

        // Restore the terminal even if the loop panics.
        struct TerminalGuard;
        impl Drop for TerminalGuard {
            fn drop(&mut self) {
                let _ = disable_raw_mode();
                let _ = execute!(stdout(), LeaveAlternateScreen);
            }
        }
        let _guard = TerminalGuard;

        self.run_loop()
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        while !self.quit {
            self.render()?;
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    self.handle_key(key);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn render(&mut self) -> io::Result<()> {
        let vm = ViewModel::build(self.editor.doc());
        let bottom = self.bottom_line();
        let filename = self
            .filename
            .as_ref()
            .map(|p| p.display().to_string());
        let marks_label: String = [
            (crate::schema::Mark::Bold, 'B'),
            (crate::schema::Mark::Italic, 'I'),
            (crate::schema::Mark::Underline, 'U'),
        ]
        .iter()
        .map(|(mark, letter)| {
            if self.editor.mark_active(*mark) {
                *letter
            } else {
                '-'
            }
        })
        .collect();
        let params = RenderParams {
            mode_label: self.mode.label(),
            bottom_line: &bottom,
            status_message: &self.status_message,
            marks_label: &marks_label,
            char_count: self.editor.char_count(),
            version: self.editor.doc().version(),
            filename: filename.as_deref(),
            modified: self.dirty,
        };
        self.view.render(&vm, self.editor.selection(), &params)
    }

    fn bottom_line(&self) -> String {
        match self.mode {
            Mode::Command => format!(":{}", self.command_buffer),
            Mode::Dialog => self
                .dialog
                .as_ref()
                .map(|d| d.prompt_line())
                .unwrap_or_default(),
            Mode::Edit => String::new(),
        }
    }

    /// Route a command through the editor. A rejected command leaves the
    /// document untouched and only reports on the status line.
    pub fn apply(&mut self, command: Command) {
        if self.readonly {
            self.status_message = "document is read-only".to_string();
            return;
        }
        match self.editor.dispatch(&command) {
            Ok(()) => {
                self.dirty = true;
                self.status_message.clear();
            }
            Err(e) => {
                self.status_message = e.to_string();
            }
        }
    }
}
