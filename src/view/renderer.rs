use super::view_model::{DisplayLine, LineKind, ViewModel};
use crate::schema::{Alignment, Mark};
use crate::selection::Selection;
use crossterm::{
    cursor, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{size, Clear, ClearType},
};
use std::io::{self, stdout, Write};

#[derive(Clone)]
pub struct RenderParams<'a> {
    pub mode_label: &'a str,
    pub bottom_line: &'a str,
    pub status_message: &'a str,
    pub marks_label: &'a str,
    pub char_count: usize,
    pub version: u64,
    pub filename: Option<&'a str>,
    pub modified: bool,
}

/// Full-frame terminal renderer. Draws the document area, a status line and
/// a command/dialog line into the alternate screen on every frame; the
/// document is small enough that diffing buys nothing here.
pub struct View {
    scroll_offset: usize,
}

impl View {
    pub fn new() -> Self {
        Self { scroll_offset: 0 }
    }

    pub fn reset_scroll(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn render(
        &mut self,
        vm: &ViewModel,
        selection: Selection,
        params: &RenderParams,
    ) -> io::Result<()> {
        let (width, height) = size()?;
        let width = width as usize;
        let text_rows = (height as usize).saturating_sub(2).max(1);

        let cursor_loc = vm.locate(selection.head);
        if let Some(loc) = cursor_loc {
            if loc.line < self.scroll_offset {
                self.scroll_offset = loc.line;
            } else if loc.line >= self.scroll_offset + text_rows {
                self.scroll_offset = loc.line + 1 - text_rows;
            }
        }

        let mut out = stdout();
        queue!(out, cursor::Hide, Clear(ClearType::All))?;

        let mut cursor_screen: (u16, u16) = (0, 0);
        for (screen_row, line) in vm
            .lines
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(text_rows)
            .map(|(i, l)| (i - self.scroll_offset, l))
        {
            let line_index = screen_row + self.scroll_offset;
            let origin = self.draw_line(&mut out, line, screen_row as u16, width, selection)?;
            if let Some(loc) = cursor_loc {
                if loc.line == line_index {
                    let seg_col = line
                        .segments
                        .get(loc.segment)
                        .map(|s| s.start_col)
                        .unwrap_or(0);
                    cursor_screen = (
                        (origin + seg_col + loc.col_offset).min(width.saturating_sub(1)) as u16,
                        screen_row as u16,
                    );
                }
            }
        }

        self.draw_status(&mut out, params, height.saturating_sub(2), width)?;
        queue!(
            out,
            cursor::MoveTo(0, height.saturating_sub(1)),
            Clear(ClearType::CurrentLine),
            Print(truncate(params.bottom_line, width)),
        )?;

        queue!(
            out,
            cursor::MoveTo(cursor_screen.0, cursor_screen.1),
            cursor::Show
        )?;
        out.flush()
    }

    /// Draw one display line; returns the column where segment columns
    /// start (alignment padding plus prefix).
    fn draw_line(
        &self,
        out: &mut impl Write,
        line: &DisplayLine,
        row: u16,
        width: usize,
        selection: Selection,
    ) -> io::Result<usize> {
        queue!(out, cursor::MoveTo(0, row), Clear(ClearType::CurrentLine))?;

        match line.kind {
            LineKind::Chart => {
                let pad = align_pad(Alignment::Center, line.literal.chars().count(), width);
                queue!(
                    out,
                    cursor::MoveTo(pad as u16, row),
                    SetForegroundColor(Color::Magenta),
                    Print(truncate(&line.literal, width)),
                    ResetColor
                )?;
                Ok(pad)
            }
            LineKind::TableRule => {
                queue!(
                    out,
                    SetForegroundColor(Color::DarkGrey),
                    Print(truncate(&line.literal, width)),
                    ResetColor
                )?;
                Ok(0)
            }
            LineKind::TableRow => {
                let limit = width.saturating_sub(1);
                queue!(out, SetForegroundColor(Color::DarkGrey), Print("|"), ResetColor)?;
                let mut row_end = 1usize;
                for segment in &line.segments {
                    let frame_col = segment.start_col.saturating_sub(1).min(limit);
                    queue!(out, cursor::MoveTo(frame_col as u16, row))?;
                    queue!(out, SetForegroundColor(Color::DarkGrey), Print("|"), ResetColor)?;
                    queue!(out, cursor::MoveTo(segment.start_col.min(limit) as u16, row))?;
                    self.draw_units(out, &segment.units, selection)?;
                    row_end = row_end.max(segment.start_col + segment.width() + 1);
                }
                queue!(out, cursor::MoveTo(row_end.min(limit) as u16, row))?;
                queue!(out, SetForegroundColor(Color::DarkGrey), Print("|"), ResetColor)?;
                Ok(0)
            }
            LineKind::Heading(_) | LineKind::Paragraph | LineKind::ListItem(_) => {
                let prefix = match line.kind {
                    LineKind::ListItem(depth) => format!("{}• ", "  ".repeat(depth + 1)),
                    _ => String::new(),
                };
                let content_width: usize =
                    prefix.chars().count() + line.segments.iter().map(|s| s.width()).sum::<usize>();
                let pad = align_pad(line.align, content_width, width);
                queue!(out, cursor::MoveTo(pad as u16, row))?;
                if !prefix.is_empty() {
                    queue!(out, SetForegroundColor(Color::DarkGrey), Print(&prefix), ResetColor)?;
                }
                if let LineKind::Heading(level) = line.kind {
                    queue!(out, SetAttribute(Attribute::Bold))?;
                    if level == 1 {
                        queue!(out, SetAttribute(Attribute::Underlined))?;
                    }
                }
                for segment in &line.segments {
                    self.draw_units(out, &segment.units, selection)?;
                }
                if matches!(line.kind, LineKind::Heading(_)) {
                    queue!(out, SetAttribute(Attribute::Reset))?;
                }
                Ok(pad + prefix.chars().count())
            }
        }
    }

    fn draw_units(
        &self,
        out: &mut impl Write,
        units: &[super::view_model::Unit],
        selection: Selection,
    ) -> io::Result<()> {
        let (from, to) = (selection.from(), selection.to());
        for unit in units {
            let selected = !selection.is_collapsed() && unit.pos >= from && unit.pos < to;
            if selected {
                queue!(out, SetAttribute(Attribute::Reverse))?;
            }
            if unit.is_tag {
                queue!(
                    out,
                    SetForegroundColor(Color::Blue),
                    Print(&unit.text),
                    ResetColor
                )?;
            } else {
                if unit.marks.contains(Mark::Bold) {
                    queue!(out, SetAttribute(Attribute::Bold))?;
                }
                if unit.marks.contains(Mark::Italic) {
                    queue!(out, SetAttribute(Attribute::Italic))?;
                }
                if unit.marks.contains(Mark::Underline) {
                    queue!(out, SetAttribute(Attribute::Underlined))?;
                }
                queue!(out, Print(&unit.text))?;
                if !unit.marks.is_empty() {
                    queue!(out, SetAttribute(Attribute::Reset))?;
                }
            }
            if selected {
                queue!(out, SetAttribute(Attribute::NoReverse))?;
            }
        }
        Ok(())
    }

    fn draw_status(
        &self,
        out: &mut impl Write,
        params: &RenderParams,
        row: u16,
        width: usize,
    ) -> io::Result<()> {
        let name = params.filename.unwrap_or("[No Name]");
        let modified = if params.modified { " [+]" } else { "" };
        let left = format!(" {} | {}{}", params.mode_label, name, modified);
        let right = format!(
            "{} | {} chars | v{} | {} ",
            params.marks_label, params.char_count, params.version, params.status_message
        );
        let gap = width.saturating_sub(left.chars().count() + right.chars().count());
        let bar = format!("{left}{}{right}", " ".repeat(gap));
        queue!(
            out,
            cursor::MoveTo(0, row),
            Clear(ClearType::CurrentLine),
            SetAttribute(Attribute::Reverse),
            Print(truncate(&bar, width)),
            SetAttribute(Attribute::NoReverse)
        )?;
        Ok(())
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

fn align_pad(align: Alignment, content_width: usize, total_width: usize) -> usize {
    match align {
        Alignment::Left => 0,
        Alignment::Center => total_width.saturating_sub(content_width) / 2,
        Alignment::Right => total_width.saturating_sub(content_width),
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
