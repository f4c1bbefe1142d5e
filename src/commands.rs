use crate::schema::{Alignment, Mark};

/// The discrete command surface the host drives the editor with: each
/// variant is a (type, params) pair applying to the current selection,
/// with no ordering requirement between commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    InsertText(String),
    InsertDataTag { label: String },
    InsertChart,
    InsertTable { rows: usize, cols: usize, with_header_row: bool },
    ToggleMark(Mark),
    ToggleHeading { level: u8 },
    SetParagraph,
    SetAlignment(Alignment),
    ToggleBulletList,
    SplitBlock,
    DeleteBackward,
    SetChartSettings { pos: usize, title: String, period_count: u32 },
    InsertRow { before: bool },
    InsertColumn { before: bool },
    DeleteRow,
    DeleteColumn,
    MergeCells,
    SplitCell,
    DeleteTable,
    Undo,
    Redo,
}
