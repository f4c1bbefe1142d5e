//! Projection of a document snapshot into display lines. The view model is
//! read-only over the document: it renders from immutable state and knows
//! nothing about input. Dispatch over the node tag is total, so every node
//! type has exactly one presentation.

use crate::document::Document;
use crate::node::Node;
use crate::schema::{Alignment, Attrs, MarkSet, NodeType};
use crate::table_commands::GridMap;
use std::rc::Rc;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// One cursor-addressable unit of a line: a character or an atomic inline
/// token. `pos` is the document position immediately before the unit.
#[derive(Debug, Clone)]
pub struct Unit {
    pub text: String,
    pub width: usize,
    pub marks: MarkSet,
    pub is_tag: bool,
    pub pos: usize,
}

/// A run of units belonging to one textblock, drawn starting at
/// `start_col` within the line.
#[derive(Debug, Clone)]
pub struct Segment {
    pub start_col: usize,
    pub content_start: usize,
    pub content_end: usize,
    pub units: Vec<Unit>,
}

impl Segment {
    pub fn width(&self) -> usize {
        self.units.iter().map(|u| u.width).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading(u8),
    Paragraph,
    ListItem(usize),
    Chart,
    TableRule,
    TableRow,
}

#[derive(Debug, Clone)]
pub struct DisplayLine {
    pub kind: LineKind,
    /// Literal text for chart and table-rule lines.
    pub literal: String,
    pub segments: Vec<Segment>,
    pub align: Alignment,
}

#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub line: usize,
    pub segment: usize,
    /// Display-width offset inside the segment.
    pub col_offset: usize,
}

pub struct ViewModel {
    pub lines: Vec<DisplayLine>,
}

impl ViewModel {
    pub fn build(doc: &Document) -> ViewModel {
        let mut lines = Vec::new();
        walk_blocks(doc.root(), 0, 0, &mut lines);
        ViewModel { lines }
    }

    /// Map a document position to a drawn location, falling back to the
    /// nearest addressable unit when the position has no direct cell.
    pub fn locate(&self, pos: usize) -> Option<Location> {
        let mut best: Option<(usize, Location)> = None;
        for (li, line) in self.lines.iter().enumerate() {
            for (si, segment) in line.segments.iter().enumerate() {
                if pos >= segment.content_start && pos <= segment.content_end {
                    let mut col = 0usize;
                    for unit in &segment.units {
                        if unit.pos >= pos {
                            break;
                        }
                        col += unit.width;
                    }
                    return Some(Location {
                        line: li,
                        segment: si,
                        col_offset: col,
                    });
                }
                let dist = if pos < segment.content_start {
                    segment.content_start - pos
                } else {
                    pos - segment.content_end
                };
                let candidate = Location {
                    line: li,
                    segment: si,
                    col_offset: 0,
                };
                if best.map(|(d, _)| dist < d).unwrap_or(true) {
                    best = Some((dist, candidate));
                }
            }
        }
        best.map(|(_, loc)| loc)
    }
}

fn walk_blocks(node: &Rc<Node>, content_start: usize, indent: usize, lines: &mut Vec<DisplayLine>) {
    let mut acc = content_start;
    for child in node.children() {
        let start = acc;
        match child.kind() {
            NodeType::Heading | NodeType::Paragraph => {
                lines.push(textblock_line(child, start + 1));
            }
            NodeType::ChartBlock => {
                lines.push(chart_line(child));
            }
            NodeType::Table => {
                table_lines(child, start, lines);
            }
            NodeType::BulletList => {
                walk_list(child, start + 1, indent, lines);
            }
            _ => {}
        }
        acc = start + child.size();
    }
}

fn walk_list(list: &Rc<Node>, content_start: usize, indent: usize, lines: &mut Vec<DisplayLine>) {
    let mut acc = content_start;
    for item in list.children() {
        let mut inner = acc + 1;
        for block in item.children() {
            match block.kind() {
                NodeType::Paragraph | NodeType::Heading => {
                    let mut line = textblock_line(block, inner + 1);
                    line.kind = LineKind::ListItem(indent);
                    lines.push(line);
                }
                NodeType::BulletList => {
                    walk_list(block, inner + 1, indent + 1, lines);
                }
                _ => {}
            }
            inner += block.size();
        }
        acc += item.size();
    }
}

fn textblock_line(block: &Rc<Node>, content_start: usize) -> DisplayLine {
    let kind = match block.attrs() {
        Attrs::Heading { level, .. } => LineKind::Heading(*level),
        _ => LineKind::Paragraph,
    };
    let segment = inline_segment(block, content_start, 0);
    DisplayLine {
        kind,
        literal: String::new(),
        segments: vec![segment],
        align: block.attrs().align().unwrap_or_default(),
    }
}

fn inline_segment(block: &Rc<Node>, content_start: usize, start_col: usize) -> Segment {
    let mut units = Vec::new();
    let mut pos = content_start;
    for child in block.children() {
        match (child.kind(), child.attrs()) {
            (NodeType::Text, _) => {
                for ch in child.text().chars() {
                    units.push(Unit {
                        text: ch.to_string(),
                        width: ch.width().unwrap_or(0).max(1),
                        marks: child.marks(),
                        is_tag: false,
                        pos,
                    });
                    pos += 1;
                }
            }
            (NodeType::DataTag, Attrs::DataTag { label }) => {
                units.push(Unit {
                    text: label.clone(),
                    width: label.width().max(1),
                    marks: MarkSet::empty(),
                    is_tag: true,
                    pos,
                });
                pos += 1;
            }
            _ => {}
        }
    }
    Segment {
        start_col,
        content_start,
        content_end: content_start + block.content_size(),
        units,
    }
}

fn chart_line(chart: &Rc<Node>) -> DisplayLine {
    let literal = match chart.attrs() {
        Attrs::Chart {
            title,
            period_count,
        } => format!("▦ {title} · last {period_count} periods"),
        _ => "▦ chart".to_string(),
    };
    DisplayLine {
        kind: LineKind::Chart,
        literal,
        segments: Vec::new(),
        align: Alignment::Center,
    }
}

const MIN_COLUMN_WIDTH: usize = 4;

fn table_lines(table: &Rc<Node>, table_start: usize, lines: &mut Vec<DisplayLine>) {
    let map = match GridMap::build(table) {
        Ok(map) => map,
        // An invalid grid cannot exist behind the engine, but the view
        // must not panic either way.
        Err(_) => return,
    };

    // Column widths come from the unit cells anchored in each column.
    let mut col_widths = vec![MIN_COLUMN_WIDTH; map.width];
    for (r, row) in table.children().iter().enumerate() {
        for (i, cell) in row.children().iter().enumerate() {
            let (_, col_span) = cell.attrs().spans();
            if col_span != 1 {
                continue;
            }
            if let Some((_, c0)) = map.coords_of(r, i) {
                col_widths[c0] = col_widths[c0].max(cell_text_width(cell));
            }
        }
    }

    lines.push(rule_line(&col_widths));
    for (r, row) in table.children().iter().enumerate() {
        let row_start = table_start
            + 1
            + table.children()[..r].iter().map(|x| x.size()).sum::<usize>();
        let mut segments = Vec::new();
        let mut cell_acc = row_start + 1;
        for (i, cell) in row.children().iter().enumerate() {
            if let Some((_, c0)) = map.coords_of(r, i) {
                let start_col = 1 + col_widths[..c0].iter().map(|w| w + 1).sum::<usize>();
                if let Some(first_block) = cell.children().first() {
                    let block_content_start = cell_acc + 2;
                    segments.push(inline_segment(first_block, block_content_start, start_col));
                }
            }
            cell_acc += cell.size();
        }
        lines.push(DisplayLine {
            kind: LineKind::TableRow,
            literal: String::new(),
            segments,
            align: Alignment::Left,
        });
        lines.push(rule_line(&col_widths));
    }
}

fn cell_text_width(cell: &Rc<Node>) -> usize {
    cell.children()
        .first()
        .map(|block| block.inline_text().width())
        .unwrap_or(0)
}

fn rule_line(col_widths: &[usize]) -> DisplayLine {
    let mut literal = String::from("+");
    for w in col_widths {
        literal.push_str(&"-".repeat(*w));
        literal.push('+');
    }
    DisplayLine {
        kind: LineKind::TableRule,
        literal,
        segments: Vec::new(),
        align: Alignment::Left,
    }
}
