use crate::commands::Command;
use crate::controller::{Controller, Mode};
use crate::schema::{Attrs, MAX_CHART_PERIODS, MIN_CHART_PERIODS};
use crossterm::event::{KeyCode, KeyEvent};

/// State of the chart settings form. The form edits a private copy of the
/// chart's attrs; nothing reaches the document until the user confirms, and
/// the confirmation travels through the engine as a regular command.
#[derive(Debug, Clone)]
pub struct ChartDialog {
    pub chart_pos: usize,
    pub title: String,
    pub period_count: u32,
    pub editing_title: bool,
}

impl ChartDialog {
    pub fn prompt_line(&self) -> String {
        let (title_marker, periods_marker) = if self.editing_title {
            (">", " ")
        } else {
            (" ", ">")
        };
        format!(
            "chart settings  {title_marker}title: {}  {periods_marker}periods: {} (+/-)  [Tab switch, Enter apply, Esc cancel]",
            self.title, self.period_count
        )
    }
}

impl Controller {
    /// Open the settings form on the chart nearest the cursor.
    pub fn open_chart_dialog(&mut self) {
        let (chart_pos, chart) = match self.editor.nearest_chart() {
            Some(found) => found,
            None => {
                self.status_message = "no chart in document".to_string();
                return;
            }
        };
        let (title, period_count) = match chart.attrs() {
            Attrs::Chart {
                title,
                period_count,
            } => (title.clone(), *period_count),
            _ => return,
        };
        self.dialog = Some(ChartDialog {
            chart_pos,
            title,
            period_count,
            editing_title: true,
        });
        self.mode = Mode::Dialog;
    }

    pub fn handle_dialog_key(&mut self, key: KeyEvent) {
        let dialog = match self.dialog.as_mut() {
            Some(dialog) => dialog,
            None => {
                self.mode = Mode::Edit;
                return;
            }
        };
        match key.code {
            KeyCode::Esc => {
                // Cancellation commits nothing.
                self.dialog = None;
                self.mode = Mode::Edit;
                self.status_message = "chart settings unchanged".to_string();
            }
            KeyCode::Enter => {
                let command = Command::SetChartSettings {
                    pos: dialog.chart_pos,
                    title: dialog.title.clone(),
                    period_count: dialog
                        .period_count
                        .clamp(MIN_CHART_PERIODS, MAX_CHART_PERIODS),
                };
                self.dialog = None;
                self.mode = Mode::Edit;
                self.apply(command);
            }
            KeyCode::Tab => {
                dialog.editing_title = !dialog.editing_title;
            }
            KeyCode::Backspace if dialog.editing_title => {
                dialog.title.pop();
            }
            KeyCode::Char(c) if dialog.editing_title => {
                dialog.title.push(c);
            }
            KeyCode::Char('+') | KeyCode::Right | KeyCode::Up => {
                dialog.period_count = (dialog.period_count + 1).min(MAX_CHART_PERIODS);
            }
            KeyCode::Char('-') | KeyCode::Left | KeyCode::Down => {
                dialog.period_count = dialog.period_count.saturating_sub(1).max(MIN_CHART_PERIODS);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RcConfig;
    use crossterm::event::{KeyEvent, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn controller_with_chart() -> Controller {
        let mut c = Controller::new(RcConfig::default(), None, false)
            .unwrap_or_else(|e| panic!("controller: {e}"));
        c.execute_command("chart");
        c
    }

    #[test]
    fn test_dialog_opens_on_nearest_chart() {
        let mut c = controller_with_chart();
        c.open_chart_dialog();
        assert_eq!(c.mode, Mode::Dialog);
        let dialog = c.dialog.as_ref().unwrap_or_else(|| panic!("no dialog"));
        assert_eq!(dialog.title, "Trend analysis");
        assert_eq!(dialog.period_count, 5);
    }

    #[test]
    fn test_cancel_commits_nothing() {
        let mut c = controller_with_chart();
        let before = c.editor.doc().clone();
        c.open_chart_dialog();
        c.handle_dialog_key(key(KeyCode::Char('x')));
        c.handle_dialog_key(key(KeyCode::Esc));
        assert_eq!(*c.editor.doc(), before);
        assert_eq!(c.mode, Mode::Edit);
    }

    #[test]
    fn test_commit_patches_chart_attrs() {
        let mut c = controller_with_chart();
        c.open_chart_dialog();
        c.handle_dialog_key(key(KeyCode::Char('!')));
        c.handle_dialog_key(key(KeyCode::Tab));
        c.handle_dialog_key(key(KeyCode::Char('+')));
        c.handle_dialog_key(key(KeyCode::Char('+')));
        c.handle_dialog_key(key(KeyCode::Enter));
        let (_, chart) = c
            .editor
            .nearest_chart()
            .unwrap_or_else(|| panic!("no chart"));
        match chart.attrs() {
            Attrs::Chart {
                title,
                period_count,
            } => {
                assert_eq!(title, "Trend analysis!");
                assert_eq!(*period_count, 7);
            }
            other => panic!("unexpected attrs: {other:?}"),
        }
    }

    #[test]
    fn test_periods_clamped_to_range() {
        let mut c = controller_with_chart();
        c.open_chart_dialog();
        c.handle_dialog_key(key(KeyCode::Tab));
        for _ in 0..40 {
            c.handle_dialog_key(key(KeyCode::Char('+')));
        }
        assert_eq!(
            c.dialog.as_ref().map(|d| d.period_count),
            Some(MAX_CHART_PERIODS)
        );
        for _ in 0..40 {
            c.handle_dialog_key(key(KeyCode::Char('-')));
        }
        assert_eq!(
            c.dialog.as_ref().map(|d| d.period_count),
            Some(MIN_CHART_PERIODS)
        );
    }
}
