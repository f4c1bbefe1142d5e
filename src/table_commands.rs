//! Structural grid operations over the table containing the selection.
//! Every command rebuilds the table node, re-validates the rectangular grid
//! invariant, and splices the result in through the transaction engine; a
//! command that cannot keep the grid rectangular is rejected outright.

use crate::document::Document;
use crate::node::Node;
use crate::position::resolve;
use crate::schema::{Attrs, NodeType};
use crate::selection::Selection;
use crate::transaction::{Builder, EditError, Step, Transaction};
use std::collections::HashSet;
use std::rc::Rc;

/// A fresh rows x cols table; the first row holds header cells when asked.
/// Every cell starts with one empty paragraph.
pub fn build_table(rows: usize, cols: usize, with_header_row: bool) -> Rc<Node> {
    let table_rows: Vec<Rc<Node>> = (0..rows)
        .map(|r| {
            let kind = if with_header_row && r == 0 {
                NodeType::TableHeaderCell
            } else {
                NodeType::TableCell
            };
            let cells: Vec<Rc<Node>> = (0..cols).map(|_| empty_cell(kind)).collect();
            Node::element(NodeType::TableRow, Attrs::None, cells)
        })
        .collect();
    Node::element(NodeType::Table, Attrs::None, table_rows)
}

fn empty_cell(kind: NodeType) -> Rc<Node> {
    Node::element(
        kind,
        Attrs::Cell {
            row_span: 1,
            col_span: 1,
        },
        vec![Node::empty_paragraph()],
    )
}

/// Row-major map of the cell grid. `grid[r][c]` names the anchor cell
/// (tableRow child index, cell child index) covering that slot, so merged
/// cells appear once per covered slot.
pub struct GridMap {
    pub width: usize,
    pub height: usize,
    grid: Vec<Vec<(usize, usize)>>,
}

impl GridMap {
    pub fn build(table: &Rc<Node>) -> Result<GridMap, String> {
        let height = table.child_count();
        if height == 0 {
            return Err("table has no rows".to_string());
        }
        let width: usize = table
            .child(0)
            .children()
            .iter()
            .map(|c| c.attrs().spans().1)
            .sum();
        if width == 0 {
            return Err("table has no columns".to_string());
        }
        let mut grid = vec![vec![None; width]; height];
        for (r, row) in table.children().iter().enumerate() {
            let mut c = 0usize;
            for (i, cell) in row.children().iter().enumerate() {
                while c < width && grid[r][c].is_some() {
                    c += 1;
                }
                let (row_span, col_span) = cell.attrs().spans();
                if c + col_span > width || r + row_span > height {
                    return Err("cell span overflows the grid".to_string());
                }
                for dr in 0..row_span {
                    for dc in 0..col_span {
                        if grid[r + dr][c + dc].is_some() {
                            return Err("overlapping cell spans".to_string());
                        }
                        grid[r + dr][c + dc] = Some((r, i));
                    }
                }
                c += col_span;
            }
        }
        let mut filled = Vec::with_capacity(height);
        for (r, row) in grid.into_iter().enumerate() {
            let mut cells = Vec::with_capacity(width);
            for (c, slot) in row.into_iter().enumerate() {
                match slot {
                    Some(anchor) => cells.push(anchor),
                    None => return Err(format!("row {r} does not cover column {c}")),
                }
            }
            filled.push(cells);
        }
        Ok(GridMap {
            width,
            height,
            grid: filled,
        })
    }

    pub fn anchor_at(&self, r: usize, c: usize) -> (usize, usize) {
        self.grid[r][c]
    }

    /// Grid coordinates of a cell's top-left slot.
    pub fn coords_of(&self, row_index: usize, cell_index: usize) -> Option<(usize, usize)> {
        for r in 0..self.height {
            for c in 0..self.width {
                if self.grid[r][c] == (row_index, cell_index) {
                    return Some((r, c));
                }
            }
        }
        None
    }
}

/// Where in the document the cursor's table lives.
struct TableContext {
    table: Rc<Node>,
    table_start: usize,
    row_index: usize,
    cell_index: usize,
}

fn locate(doc: &Document, pos: usize) -> Result<TableContext, EditError> {
    let resolved = resolve(doc.root(), pos);
    for (depth, step) in resolved.path.iter().enumerate() {
        if step.node.kind() == NodeType::Table {
            let row_index = step.index;
            let cell_index = resolved
                .path
                .get(depth + 1)
                .map(|s| s.index)
                .unwrap_or(0);
            return Ok(TableContext {
                table: step.node.clone(),
                table_start: step.content_start - 1,
                row_index,
                cell_index,
            });
        }
    }
    Err(EditError::CommandRejected(
        "cursor is not inside a table".to_string(),
    ))
}

/// Content position of the first block inside cell (r, i) of a table whose
/// opening boundary sits at `table_start`. Indices are clamped; the caller
/// snaps the result, so a span-covered (empty) row is harmless.
fn cell_content_pos(table_start: usize, table: &Rc<Node>, r: usize, i: usize) -> usize {
    let r = r.min(table.child_count().saturating_sub(1));
    let row = table.child(r);
    let row_start = table_start
        + 1
        + table.children()[..r].iter().map(|x| x.size()).sum::<usize>();
    if row.child_count() == 0 {
        return row_start + 1;
    }
    let i = i.min(row.child_count() - 1);
    let cell_start = row_start
        + 1
        + row.children()[..i].iter().map(|x| x.size()).sum::<usize>();
    cell_start + 2
}

/// Splice the rebuilt table in, re-checking the grid invariant first.
fn replace_table(
    doc: &Document,
    ctx: &TableContext,
    rows: Vec<Rc<Node>>,
    caret_cell: (usize, usize),
) -> Result<Transaction, EditError> {
    let new_table = Node::element(NodeType::Table, Attrs::None, rows);
    new_table
        .validate_deep()
        .map_err(EditError::CommandRejected)?;
    GridMap::build(&new_table).map_err(EditError::CommandRejected)?;
    let mut b = Builder::new(doc);
    b.apply(Step::ReplaceBlocks {
        at: ctx.table_start,
        count: 1,
        content: vec![new_table.clone()],
    })?;
    let caret = cell_content_pos(ctx.table_start, &new_table, caret_cell.0, caret_cell.1);
    let caret = crate::position::resolve_cursor(b.root(), caret);
    Ok(b.finish(Selection::caret(caret), false))
}

fn patched_cell(cell: &Rc<Node>, row_span: usize, col_span: usize) -> Rc<Node> {
    cell.with_attrs(Attrs::Cell { row_span, col_span })
}

/// Insert a row above or below the cursor's row. Cells spanning across the
/// insertion boundary grow by one row; the other columns get fresh empty
/// cells.
pub fn insert_row(doc: &Document, sel: Selection, before: bool) -> Result<Transaction, EditError> {
    let ctx = locate(doc, sel.head)?;
    let map = GridMap::build(&ctx.table).map_err(EditError::SchemaViolation)?;
    let ir = if before {
        ctx.row_index
    } else {
        ctx.row_index + 1
    };

    let mut grown: HashSet<(usize, usize)> = HashSet::new();
    let mut new_cells: Vec<Rc<Node>> = Vec::new();
    let mut c = 0usize;
    while c < map.width {
        if ir > 0 && ir < map.height && map.anchor_at(ir - 1, c) == map.anchor_at(ir, c) {
            let anchor = map.anchor_at(ir, c);
            grown.insert(anchor);
            let (_, col_span) = ctx.table.child(anchor.0).child(anchor.1).attrs().spans();
            c += col_span;
        } else {
            new_cells.push(empty_cell(NodeType::TableCell));
            c += 1;
        }
    }
    let mut rows: Vec<Rc<Node>> = Vec::with_capacity(map.height + 1);
    for (r, row) in ctx.table.children().iter().enumerate() {
        let cells: Vec<Rc<Node>> = row
            .children()
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if grown.contains(&(r, i)) {
                    let (rs, cs) = cell.attrs().spans();
                    patched_cell(cell, rs + 1, cs)
                } else {
                    cell.clone()
                }
            })
            .collect();
        rows.push(Node::element(NodeType::TableRow, Attrs::None, cells));
    }
    rows.insert(ir, Node::element(NodeType::TableRow, Attrs::None, new_cells));
    replace_table(doc, &ctx, rows, (ir, 0))
}

/// Remove the cursor's row. Rejected on the last remaining row. Cells
/// anchored here that span further down re-anchor onto the next row with
/// their content; cells spanning across from above shrink by one.
pub fn delete_row(doc: &Document, sel: Selection) -> Result<Transaction, EditError> {
    let ctx = locate(doc, sel.head)?;
    let map = GridMap::build(&ctx.table).map_err(EditError::SchemaViolation)?;
    if map.height <= 1 {
        return Err(EditError::CommandRejected(
            "cannot delete the last table row".to_string(),
        ));
    }
    let r = ctx.row_index;

    // Cells anchored in the removed row that continue below it.
    let mut demoted: Vec<(usize, Rc<Node>)> = Vec::new();
    for (i, cell) in ctx.table.child(r).children().iter().enumerate() {
        let (row_span, col_span) = cell.attrs().spans();
        if row_span > 1 {
            if let Some((_, c0)) = map.coords_of(r, i) {
                demoted.push((c0, patched_cell(cell, row_span - 1, col_span)));
            }
        }
    }

    let mut rows: Vec<Rc<Node>> = Vec::with_capacity(map.height - 1);
    for (ri, row) in ctx.table.children().iter().enumerate() {
        if ri == r {
            continue;
        }
        let mut cells: Vec<(usize, Rc<Node>)> = row
            .children()
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let col = map.coords_of(ri, i).map(|(_, c)| c).unwrap_or(0);
                let (row_span, col_span) = cell.attrs().spans();
                // Spans crossing the removed row shrink.
                let crosses = ri < r && ri + row_span > r;
                let cell = if crosses {
                    patched_cell(cell, row_span - 1, col_span)
                } else {
                    cell.clone()
                };
                (col, cell)
            })
            .collect();
        if ri == r + 1 {
            cells.extend(demoted.iter().cloned());
            cells.sort_by_key(|(col, _)| *col);
        }
        let cells: Vec<Rc<Node>> = cells.into_iter().map(|(_, cell)| cell).collect();
        rows.push(Node::element(NodeType::TableRow, Attrs::None, cells));
    }
    let caret_row = r.min(rows.len() - 1);
    replace_table(doc, &ctx, rows, (caret_row, ctx.cell_index))
}

/// Insert a column left or right of the cursor's cell. Cells spanning
/// across the insertion boundary grow by one column; every other row gets
/// a fresh cell matching its neighbours' header-ness.
pub fn insert_column(
    doc: &Document,
    sel: Selection,
    before: bool,
) -> Result<Transaction, EditError> {
    let ctx = locate(doc, sel.head)?;
    let map = GridMap::build(&ctx.table).map_err(EditError::SchemaViolation)?;
    let (_, c0) = map
        .coords_of(ctx.row_index, ctx.cell_index)
        .unwrap_or((0, 0));
    let (_, cursor_span) = ctx
        .table
        .child(ctx.row_index)
        .child(ctx.cell_index)
        .attrs()
        .spans();
    let ic = if before { c0 } else { c0 + cursor_span };

    let mut grown: HashSet<(usize, usize)> = HashSet::new();
    let mut rows: Vec<Rc<Node>> = Vec::with_capacity(map.height);
    let mut caret_cell = (ctx.row_index, ctx.cell_index);
    for (r, row) in ctx.table.children().iter().enumerate() {
        if ic > 0 && ic < map.width && map.anchor_at(r, ic - 1) == map.anchor_at(r, ic) {
            // A span crosses the boundary in this row: widen its anchor once.
            let anchor = map.anchor_at(r, ic);
            let cells: Vec<Rc<Node>> = row
                .children()
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    if (anchor == (r, i)) && grown.insert(anchor) {
                        let (rs, cs) = cell.attrs().spans();
                        patched_cell(cell, rs, cs + 1)
                    } else {
                        cell.clone()
                    }
                })
                .collect();
            rows.push(Node::element(NodeType::TableRow, Attrs::None, cells));
            continue;
        }
        // Index where the new cell slots into this row's children.
        let insert_index = row
            .children()
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                map.coords_of(r, *i)
                    .map(|(_, col)| col < ic)
                    .unwrap_or(false)
            })
            .count();
        let reference_col = if ic < map.width { ic } else { map.width - 1 };
        let (ar, ai) = map.anchor_at(r, reference_col);
        let kind = ctx.table.child(ar).child(ai).kind();
        let mut cells = row.children().to_vec();
        cells.insert(insert_index, empty_cell(kind));
        if r == ctx.row_index {
            caret_cell = (r, insert_index);
        }
        rows.push(Node::element(NodeType::TableRow, Attrs::None, cells));
    }
    replace_table(doc, &ctx, rows, caret_cell)
}

/// Remove the cursor cell's column. Rejected on the last remaining column.
/// Cells spanning the removed column narrow by one and keep their content.
pub fn delete_column(doc: &Document, sel: Selection) -> Result<Transaction, EditError> {
    let ctx = locate(doc, sel.head)?;
    let map = GridMap::build(&ctx.table).map_err(EditError::SchemaViolation)?;
    if map.width <= 1 {
        return Err(EditError::CommandRejected(
            "cannot delete the last table column".to_string(),
        ));
    }
    let (_, c0) = map
        .coords_of(ctx.row_index, ctx.cell_index)
        .unwrap_or((0, 0));

    let mut rows: Vec<Rc<Node>> = Vec::with_capacity(map.height);
    for (r, row) in ctx.table.children().iter().enumerate() {
        let mut cells: Vec<Rc<Node>> = Vec::with_capacity(row.child_count());
        for (i, cell) in row.children().iter().enumerate() {
            let col = match map.coords_of(r, i) {
                Some((_, col)) => col,
                None => continue,
            };
            let (row_span, col_span) = cell.attrs().spans();
            if col <= c0 && c0 < col + col_span {
                if col_span > 1 {
                    cells.push(patched_cell(cell, row_span, col_span - 1));
                }
                // A one-wide cell in the deleted column vanishes.
            } else {
                cells.push(cell.clone());
            }
        }
        rows.push(Node::element(NodeType::TableRow, Attrs::None, cells));
    }
    replace_table(doc, &ctx, rows, (ctx.row_index, ctx.cell_index))
}

/// Merge the rectangular run of unit cells between the selection's ends
/// into one spanning cell, concatenating contents row-major. Rejected when
/// the covered region is not rectangular unit cells, or is a single cell.
pub fn merge_cells(doc: &Document, sel: Selection) -> Result<Transaction, EditError> {
    let ctx_from = locate(doc, sel.from())?;
    let ctx_to = locate(doc, sel.to())?;
    if ctx_from.table_start != ctx_to.table_start {
        return Err(EditError::CommandRejected(
            "selection spans different tables".to_string(),
        ));
    }
    let ctx = ctx_from;
    let map = GridMap::build(&ctx.table).map_err(EditError::SchemaViolation)?;
    let a = map
        .coords_of(ctx.row_index, ctx.cell_index)
        .unwrap_or((0, 0));
    let b_coords = map
        .coords_of(ctx_to.row_index, ctx_to.cell_index)
        .unwrap_or((0, 0));
    let (r0, r1) = (a.0.min(b_coords.0), a.0.max(b_coords.0));
    let (c0, c1) = (a.1.min(b_coords.1), a.1.max(b_coords.1));
    if r0 == r1 && c0 == c1 {
        return Err(EditError::CommandRejected(
            "selection covers a single cell".to_string(),
        ));
    }
    // Every covered slot must be its own unit cell; a span reaching into
    // (or out of) the region shows up here as a non-unit anchor.
    for r in r0..=r1 {
        for c in c0..=c1 {
            let (ar, ai) = map.anchor_at(r, c);
            let (row_span, col_span) = ctx.table.child(ar).child(ai).attrs().spans();
            if row_span != 1 || col_span != 1 {
                return Err(EditError::CommandRejected(
                    "merge region is not a block of unmerged cells".to_string(),
                ));
            }
        }
    }

    // Content concatenates row-major; empty paragraphs drop out unless
    // nothing else remains.
    let mut content: Vec<Rc<Node>> = Vec::new();
    for r in r0..=r1 {
        for c in c0..=c1 {
            let (ar, ai) = map.anchor_at(r, c);
            for block in ctx.table.child(ar).child(ai).children() {
                if !(block.kind() == NodeType::Paragraph && block.content_size() == 0) {
                    content.push(block.clone());
                }
            }
        }
    }
    if content.is_empty() {
        content.push(Node::empty_paragraph());
    }

    let mut rows: Vec<Rc<Node>> = Vec::with_capacity(map.height);
    let mut caret_cell = (r0, 0usize);
    for (r, row) in ctx.table.children().iter().enumerate() {
        let mut cells: Vec<Rc<Node>> = Vec::with_capacity(row.child_count());
        for (i, cell) in row.children().iter().enumerate() {
            let col = match map.coords_of(r, i) {
                Some((_, col)) => col,
                None => continue,
            };
            let covered = r0 <= r && r <= r1 && c0 <= col && col <= c1;
            if covered {
                if (r, col) == (r0, c0) {
                    caret_cell = (r, cells.len());
                    cells.push(Node::element(
                        cell.kind(),
                        Attrs::Cell {
                            row_span: r1 - r0 + 1,
                            col_span: c1 - c0 + 1,
                        },
                        content.clone(),
                    ));
                }
                // Other covered cells vanish into the merge.
            } else {
                cells.push(cell.clone());
            }
        }
        rows.push(Node::element(NodeType::TableRow, Attrs::None, cells));
    }
    replace_table(doc, &ctx, rows, caret_cell)
}

/// Split a spanning cell back into unit cells: content stays in the
/// top-left cell, the newly exposed slots get empty cells of the same
/// kind. Rejected on a unit cell.
pub fn split_cell(doc: &Document, sel: Selection) -> Result<Transaction, EditError> {
    let ctx = locate(doc, sel.head)?;
    let map = GridMap::build(&ctx.table).map_err(EditError::SchemaViolation)?;
    let cell = ctx.table.child(ctx.row_index).child(ctx.cell_index).clone();
    let (row_span, col_span) = cell.attrs().spans();
    if row_span == 1 && col_span == 1 {
        return Err(EditError::CommandRejected(
            "cell is not merged".to_string(),
        ));
    }
    let (r0, c0) = map
        .coords_of(ctx.row_index, ctx.cell_index)
        .unwrap_or((0, 0));

    let mut rows: Vec<Rc<Node>> = Vec::with_capacity(map.height);
    let mut caret_index = 0usize;
    for (r, row) in ctx.table.children().iter().enumerate() {
        let mut cells: Vec<(usize, Rc<Node>)> = row
            .children()
            .iter()
            .enumerate()
            .filter(|(i, _)| !(r == r0 && *i == ctx.cell_index))
            .map(|(i, c)| {
                let col = map.coords_of(r, i).map(|(_, col)| col).unwrap_or(0);
                (col, c.clone())
            })
            .collect();
        if r == r0 {
            cells.push((c0, patched_cell(&cell, 1, 1)));
            for dc in 1..col_span {
                cells.push((c0 + dc, empty_cell(cell.kind())));
            }
        } else if r > r0 && r < r0 + row_span {
            for dc in 0..col_span {
                cells.push((c0 + dc, empty_cell(cell.kind())));
            }
        }
        cells.sort_by_key(|(col, _)| *col);
        if r == r0 {
            caret_index = cells.iter().position(|(col, _)| *col == c0).unwrap_or(0);
        }
        let cells: Vec<Rc<Node>> = cells.into_iter().map(|(_, c)| c).collect();
        rows.push(Node::element(NodeType::TableRow, Attrs::None, cells));
    }
    replace_table(doc, &ctx, rows, (r0, caret_index))
}

/// Remove the whole table, leaving an empty paragraph in its place.
pub fn delete_table(doc: &Document, sel: Selection) -> Result<Transaction, EditError> {
    let ctx = locate(doc, sel.head)?;
    let mut b = Builder::new(doc);
    b.apply(Step::ReplaceBlocks {
        at: ctx.table_start,
        count: 1,
        content: vec![Node::empty_paragraph()],
    })?;
    Ok(b.finish(Selection::caret(ctx.table_start + 1), false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MarkSet;

    fn text_cell(kind: NodeType, text: &str, row_span: usize, col_span: usize) -> Rc<Node> {
        Node::element(
            kind,
            Attrs::Cell { row_span, col_span },
            vec![Node::paragraph(vec![Node::text_node(text, MarkSet::empty())])],
        )
    }

    fn doc_with_table(table: Rc<Node>) -> Document {
        Document::new(
            Node::element(NodeType::Doc, Attrs::None, vec![table, Node::empty_paragraph()]),
            0,
        )
    }

    fn grid_is_valid(doc: &Document) -> bool {
        GridMap::build(doc.root().child(0)).is_ok()
    }

    fn first_cell_caret() -> Selection {
        // table open 0, row open 1, cell open 2, paragraph open 3.
        Selection::caret(4)
    }

    #[test]
    fn test_build_table_shape() {
        let table = build_table(3, 3, true);
        let map = GridMap::build(&table).unwrap();
        assert_eq!(map.width, 3);
        assert_eq!(map.height, 3);
        assert_eq!(table.child(0).child(0).kind(), NodeType::TableHeaderCell);
        assert_eq!(table.child(1).child(0).kind(), NodeType::TableCell);
    }

    #[test]
    fn test_grid_map_with_spans() {
        // [ a(1x2) ][ b ]
        // [ c ][ d ][ b ] with b spanning two rows in the last column.
        let table = Node::element(
            NodeType::Table,
            Attrs::None,
            vec![
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "a", 1, 2),
                        text_cell(NodeType::TableCell, "b", 2, 1),
                    ],
                ),
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "c", 1, 1),
                        text_cell(NodeType::TableCell, "d", 1, 1),
                    ],
                ),
            ],
        );
        let map = GridMap::build(&table).unwrap();
        assert_eq!(map.width, 3);
        assert_eq!(map.height, 2);
        assert_eq!(map.anchor_at(0, 0), (0, 0));
        assert_eq!(map.anchor_at(0, 1), (0, 0));
        assert_eq!(map.anchor_at(0, 2), (0, 1));
        assert_eq!(map.anchor_at(1, 2), (0, 1));
        assert_eq!(map.anchor_at(1, 0), (1, 0));
    }

    #[test]
    fn test_grid_map_rejects_ragged_rows() {
        let table = Node::element(
            NodeType::Table,
            Attrs::None,
            vec![
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "a", 1, 1),
                        text_cell(NodeType::TableCell, "b", 1, 1),
                    ],
                ),
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![text_cell(NodeType::TableCell, "c", 1, 1)],
                ),
            ],
        );
        assert!(GridMap::build(&table).is_err());
    }

    #[test]
    fn test_insert_row_after() {
        let doc = doc_with_table(build_table(2, 2, false));
        let txn = insert_row(&doc, first_cell_caret(), false).unwrap();
        let table = txn.doc.root().child(0);
        assert_eq!(table.child_count(), 3);
        assert!(grid_is_valid(&txn.doc));
        // The new row is empty cells.
        assert_eq!(table.child(1).child(0).char_count(), 0);
    }

    #[test]
    fn test_insert_row_grows_crossing_span() {
        // Column 0 merged across both rows; inserting between them must
        // grow the span, not add a cell under it.
        let table = Node::element(
            NodeType::Table,
            Attrs::None,
            vec![
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "tall", 2, 1),
                        text_cell(NodeType::TableCell, "b", 1, 1),
                    ],
                ),
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![text_cell(NodeType::TableCell, "d", 1, 1)],
                ),
            ],
        );
        let doc = doc_with_table(table);
        let txn = insert_row(&doc, first_cell_caret(), false).unwrap();
        let new_table = txn.doc.root().child(0);
        assert_eq!(new_table.child_count(), 3);
        assert_eq!(new_table.child(0).child(0).attrs().spans(), (3, 1));
        // The inserted row has a single cell (the other column is covered).
        assert_eq!(new_table.child(1).child_count(), 1);
        assert!(grid_is_valid(&txn.doc));
    }

    #[test]
    fn test_delete_row_rejects_last() {
        let doc = doc_with_table(build_table(1, 3, false));
        let err = delete_row(&doc, first_cell_caret()).unwrap_err();
        assert!(matches!(err, EditError::CommandRejected(_)));
        // Untouched by construction: the command never built a transaction.
    }

    #[test]
    fn test_delete_row_demotes_span_anchor() {
        let table = Node::element(
            NodeType::Table,
            Attrs::None,
            vec![
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "tall", 2, 1),
                        text_cell(NodeType::TableCell, "b", 1, 1),
                    ],
                ),
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![text_cell(NodeType::TableCell, "d", 1, 1)],
                ),
            ],
        );
        let doc = doc_with_table(table);
        let txn = delete_row(&doc, first_cell_caret()).unwrap();
        let new_table = txn.doc.root().child(0);
        assert_eq!(new_table.child_count(), 1);
        // The span anchor moved down, keeping its content.
        assert_eq!(new_table.child(0).child(0).inline_text(), "tall");
        assert_eq!(new_table.child(0).child(0).attrs().spans(), (1, 1));
        assert!(grid_is_valid(&txn.doc));
    }

    #[test]
    fn test_insert_column_before_and_after() {
        let doc = doc_with_table(build_table(2, 2, true));
        let txn = insert_column(&doc, first_cell_caret(), false).unwrap();
        let table = txn.doc.root().child(0);
        let map = GridMap::build(table).unwrap();
        assert_eq!(map.width, 3);
        // Header row gained a header cell.
        assert_eq!(table.child(0).child(1).kind(), NodeType::TableHeaderCell);
        assert_eq!(table.child(1).child(1).kind(), NodeType::TableCell);
        assert!(grid_is_valid(&txn.doc));
    }

    #[test]
    fn test_delete_column_rejects_last() {
        let doc = doc_with_table(build_table(3, 1, false));
        let err = delete_column(&doc, first_cell_caret()).unwrap_err();
        assert!(matches!(err, EditError::CommandRejected(_)));
    }

    #[test]
    fn test_delete_column_narrows_span() {
        // [ wide(1x2) ][ b ]
        // [ c ][ d ][ e ]
        let table = Node::element(
            NodeType::Table,
            Attrs::None,
            vec![
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "wide", 1, 2),
                        text_cell(NodeType::TableCell, "b", 1, 1),
                    ],
                ),
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "c", 1, 1),
                        text_cell(NodeType::TableCell, "d", 1, 1),
                        text_cell(NodeType::TableCell, "e", 1, 1),
                    ],
                ),
            ],
        );
        let doc = doc_with_table(table);
        let txn = delete_column(&doc, first_cell_caret()).unwrap();
        let new_table = txn.doc.root().child(0);
        let map = GridMap::build(new_table).unwrap();
        assert_eq!(map.width, 2);
        assert_eq!(new_table.child(0).child(0).inline_text(), "wide");
        assert_eq!(new_table.child(0).child(0).attrs().spans(), (1, 1));
        assert!(grid_is_valid(&txn.doc));
    }

    #[test]
    fn test_merge_cells_rectangular() {
        let doc = doc_with_table(build_table(2, 2, false));
        // Anchor in the first cell, head in the last: a 2x2 merge.
        let table = doc.root().child(0);
        let last_cell_pos = cell_content_pos(0, table, 1, 1);
        let sel = Selection {
            anchor: 4,
            head: last_cell_pos,
        };
        let txn = merge_cells(&doc, sel).unwrap();
        let new_table = txn.doc.root().child(0);
        assert_eq!(new_table.child(0).child_count(), 1);
        assert_eq!(new_table.child(0).child(0).attrs().spans(), (2, 2));
        assert!(grid_is_valid(&txn.doc));
    }

    #[test]
    fn test_merge_cells_rejects_single_and_merged() {
        let doc = doc_with_table(build_table(2, 2, false));
        let err = merge_cells(&doc, first_cell_caret()).unwrap_err();
        assert!(matches!(err, EditError::CommandRejected(_)));

        // Merge once, then try to merge a region overlapping the result.
        let table = doc.root().child(0);
        let sel = Selection {
            anchor: 4,
            head: cell_content_pos(0, table, 1, 1),
        };
        let merged = merge_cells(&doc, sel).unwrap();
        let again = merge_cells(
            &merged.doc,
            Selection {
                anchor: 4,
                head: 4,
            },
        );
        assert!(again.is_err());
    }

    #[test]
    fn test_merge_concatenates_row_major() {
        let table = Node::element(
            NodeType::Table,
            Attrs::None,
            vec![
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "a", 1, 1),
                        text_cell(NodeType::TableCell, "b", 1, 1),
                    ],
                ),
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "c", 1, 1),
                        text_cell(NodeType::TableCell, "d", 1, 1),
                    ],
                ),
            ],
        );
        let doc = doc_with_table(table);
        let t = doc.root().child(0);
        let sel = Selection {
            anchor: 4,
            head: cell_content_pos(0, t, 1, 1),
        };
        let txn = merge_cells(&doc, sel).unwrap();
        let merged_cell = txn.doc.root().child(0).child(0).child(0);
        let texts: Vec<String> = merged_cell
            .children()
            .iter()
            .map(|b| b.inline_text())
            .collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_split_cell_restores_units() {
        let table = Node::element(
            NodeType::Table,
            Attrs::None,
            vec![
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "a", 1, 1),
                        text_cell(NodeType::TableCell, "b", 1, 1),
                    ],
                ),
                Node::element(
                    NodeType::TableRow,
                    Attrs::None,
                    vec![
                        text_cell(NodeType::TableCell, "c", 1, 1),
                        text_cell(NodeType::TableCell, "d", 1, 1),
                    ],
                ),
            ],
        );
        let doc = doc_with_table(table);
        let t = doc.root().child(0);
        let sel = Selection {
            anchor: 4,
            head: cell_content_pos(0, t, 1, 1),
        };
        let merged = merge_cells(&doc, sel).unwrap();
        let txn = split_cell(&merged.doc, merged.selection).unwrap();
        let new_table = txn.doc.root().child(0);
        let map = GridMap::build(new_table).unwrap();
        assert_eq!(map.width, 2);
        assert_eq!(map.height, 2);
        assert_eq!(new_table.child(0).child_count(), 2);
        assert_eq!(new_table.child(1).child_count(), 2);
        // Content stayed in the top-left cell, the rest are empty.
        assert_eq!(new_table.child(0).child(0).inline_text(), "abcd");
        assert_eq!(new_table.child(1).child(0).char_count(), 0);
        assert!(grid_is_valid(&txn.doc));
    }

    #[test]
    fn test_split_cell_rejects_unit() {
        let doc = doc_with_table(build_table(2, 2, false));
        let err = split_cell(&doc, first_cell_caret()).unwrap_err();
        assert!(matches!(err, EditError::CommandRejected(_)));
    }

    #[test]
    fn test_delete_table_leaves_paragraph() {
        let doc = doc_with_table(build_table(2, 2, false));
        let txn = delete_table(&doc, first_cell_caret()).unwrap();
        assert_eq!(txn.doc.root().child(0).kind(), NodeType::Paragraph);
        assert_eq!(txn.doc.root().child(0).content_size(), 0);
        assert_eq!(txn.selection, Selection::caret(1));
    }

    #[test]
    fn test_grid_invariant_across_command_sequence() {
        let mut doc = doc_with_table(build_table(2, 2, false));
        let caret = first_cell_caret();
        for step in 0..4 {
            let result = match step {
                0 => insert_row(&doc, caret, false),
                1 => insert_column(&doc, caret, false),
                2 => delete_row(&doc, caret),
                _ => delete_column(&doc, caret),
            };
            let txn = result.unwrap();
            assert!(grid_is_valid(&txn.doc), "grid broken after step {step}");
            doc = txn.doc;
        }
    }
}
