//! The transaction engine's editing operations. Every function takes the
//! current document and selection plus declarative parameters and returns a
//! complete transaction, or an error with the document untouched. Nothing
//! here mutates in place.

use crate::document::Document;
use crate::node::{self, Node};
use crate::position::{resolve, textblock_ranges, textblocks_in_range};
use crate::schema::{Alignment, Attrs, Mark, MarkSet, NodeType};
use crate::selection::Selection;
use crate::transaction::{Builder, EditError, Step, Transaction};
use std::rc::Rc;

/// Replace the selection with literal text carrying the active marks.
/// Single-character insertions at a collapsed cursor are coalescible so a
/// typing burst undoes as one unit.
pub fn insert_text(
    doc: &Document,
    sel: Selection,
    marks: MarkSet,
    text: &str,
) -> Result<Transaction, EditError> {
    if text.is_empty() {
        return Err(EditError::CommandRejected("nothing to insert".to_string()));
    }
    let mut b = Builder::new(doc);
    let at = collapse_selection(&mut b, sel)?;
    let len = text.chars().count();
    b.apply(Step::ReplaceInline {
        from: at,
        to: at,
        content: vec![Node::text_node(text, marks)],
    })?;
    let coalesce = sel.is_collapsed() && len == 1;
    Ok(b.finish(Selection::caret(at + len), coalesce))
}

/// Insert an inline data tag at the cursor. No block splitting: the tag
/// sits in the text flow as a single atomic unit.
pub fn insert_data_tag(
    doc: &Document,
    sel: Selection,
    label: &str,
) -> Result<Transaction, EditError> {
    let mut b = Builder::new(doc);
    let at = collapse_selection(&mut b, sel)?;
    b.apply(Step::ReplaceInline {
        from: at,
        to: at,
        content: vec![Node::leaf(
            NodeType::DataTag,
            Attrs::DataTag {
                label: label.to_string(),
            },
        )],
    })?;
    Ok(b.finish(Selection::caret(at + 1), false))
}

/// Insert a chart block. The surrounding textblock is split so the chart
/// becomes its own sibling; the block after it receives the cursor, and
/// when the trailing remainder is empty a fresh empty paragraph takes its
/// place.
pub fn insert_chart(
    doc: &Document,
    sel: Selection,
    attrs: Attrs,
) -> Result<Transaction, EditError> {
    crate::schema::validate_attrs(NodeType::ChartBlock, &attrs)
        .map_err(EditError::SchemaViolation)?;
    let chart = Node::leaf(NodeType::ChartBlock, attrs);
    let mut b = Builder::new(doc);
    let at = collapse_selection(&mut b, sel)?;
    let (_, after_start) = insert_block_at(&mut b, at, chart)?;
    Ok(b.finish(Selection::caret(after_start), false))
}

/// Insert a fresh rows x cols table (optionally with a header row) and put
/// the cursor in its first cell.
pub fn insert_table(
    doc: &Document,
    sel: Selection,
    rows: usize,
    cols: usize,
    with_header_row: bool,
) -> Result<Transaction, EditError> {
    if rows == 0 || cols == 0 {
        return Err(EditError::CommandRejected(
            "table needs at least one row and column".to_string(),
        ));
    }
    let table = crate::table_commands::build_table(rows, cols, with_header_row);
    let mut b = Builder::new(doc);
    let at = collapse_selection(&mut b, sel)?;
    let (table_start, _) = insert_block_at(&mut b, at, table)?;
    // table open, first row open, first cell open, paragraph open.
    Ok(b.finish(Selection::caret(table_start + 4), false))
}

/// Idempotent mark toggle over a range: if every character in the selection
/// already carries the mark it is removed, otherwise it is applied to the
/// whole range. Collapsed selections are handled by the editor's stored
/// mark set, not here.
pub fn toggle_mark(doc: &Document, sel: Selection, mark: Mark) -> Result<Transaction, EditError> {
    if sel.is_collapsed() {
        return Err(EditError::CommandRejected(
            "mark toggle needs a range".to_string(),
        ));
    }
    let (from, to) = (sel.from(), sel.to());
    if !range_has_text(doc.root(), from, to) {
        return Err(EditError::CommandRejected(
            "no text in selection".to_string(),
        ));
    }
    let on = !range_fully_marked(doc.root(), from, to, mark);
    let mut b = Builder::new(doc);
    b.apply(Step::SetMark { from, to, mark, on })?;
    Ok(b.finish(sel, false))
}

/// Retag every textblock intersecting the selection.
pub fn set_block_type(
    doc: &Document,
    sel: Selection,
    kind: NodeType,
    attrs: Attrs,
) -> Result<Transaction, EditError> {
    let blocks = textblocks_in_range(doc.root(), sel.from(), sel.to());
    if blocks.is_empty() {
        return Err(EditError::CommandRejected(
            "no textblock in selection".to_string(),
        ));
    }
    let mut b = Builder::new(doc);
    for (content_start, _) in &blocks {
        b.apply(Step::SetBlockKind {
            pos: *content_start,
            kind,
            attrs: attrs.clone(),
        })?;
    }
    Ok(b.finish(sel, false))
}

/// Patch the alignment of every textblock intersecting the selection,
/// leaving kind and level untouched.
pub fn set_alignment(
    doc: &Document,
    sel: Selection,
    align: Alignment,
) -> Result<Transaction, EditError> {
    let blocks = textblocks_in_range(doc.root(), sel.from(), sel.to());
    if blocks.is_empty() {
        return Err(EditError::CommandRejected(
            "no textblock in selection".to_string(),
        ));
    }
    let mut b = Builder::new(doc);
    for (content_start, block) in &blocks {
        b.apply(Step::SetBlockKind {
            pos: *content_start,
            kind: block.kind(),
            attrs: block.attrs().with_align(align),
        })?;
    }
    Ok(b.finish(sel, false))
}

/// Patch an atomic node's attrs in place (the chart settings commit path).
pub fn set_node_attrs(
    doc: &Document,
    sel: Selection,
    pos: usize,
    attrs: Attrs,
) -> Result<Transaction, EditError> {
    let mut b = Builder::new(doc);
    b.apply(Step::SetAttrs { pos, attrs })?;
    Ok(b.finish(sel, false))
}

/// Enter: end the current block and open a new one of the same kind right
/// after it, carrying the remainder of the content forward.
pub fn split_block(doc: &Document, sel: Selection) -> Result<Transaction, EditError> {
    let mut b = Builder::new(doc);
    let at = collapse_selection(&mut b, sel)?;
    b.apply(Step::SplitBlock { pos: at })?;
    Ok(b.finish(Selection::caret(at + 2), false))
}

/// Backspace. At a collapsed cursor this deletes the unit before it: a
/// character, an inline tag, a preceding chart block, or the block
/// boundary (merging into the previous textblock). An empty non-sole block
/// is removed outright. The document never drops below one block.
pub fn delete_backward(doc: &Document, sel: Selection) -> Result<Transaction, EditError> {
    let mut b = Builder::new(doc);
    if !sel.is_collapsed() {
        let at = delete_range(&mut b, sel.from(), sel.to())?;
        return Ok(b.finish(Selection::caret(at), false));
    }
    let pos = sel.head;
    let resolved = resolve(doc.root(), pos);
    if !resolved.in_textblock() {
        return Err(EditError::CommandRejected(
            "cursor is not in a textblock".to_string(),
        ));
    }
    if resolved.offset() > 0 {
        // A character or an atomic inline unit; both occupy one position.
        b.apply(Step::ReplaceInline {
            from: pos - 1,
            to: pos,
            content: Vec::new(),
        })?;
        return Ok(b.finish(Selection::caret(pos - 1), false));
    }

    let block = resolved.parent().clone();
    let path = resolved.parent_path();
    let (index, container) = match (path.last(), resolved.find_ancestor(|n| !n.kind().is_textblock()))
    {
        (Some(&index), Some((_, container, _))) => (index, container),
        _ => {
            return Err(EditError::CommandRejected(
                "cannot delete at document start".to_string(),
            ))
        }
    };
    let (block_start, _) = resolved.parent_span();

    if index > 0 {
        let prev = container.child(index - 1).clone();
        match prev.kind() {
            NodeType::ChartBlock => {
                // Delete the atomic block as a single unit.
                b.apply(Step::ReplaceBlocks {
                    at: block_start - 1,
                    count: 1,
                    content: Vec::new(),
                })?;
                Ok(b.finish(Selection::caret(pos - 1), false))
            }
            NodeType::Heading | NodeType::Paragraph => {
                b.apply(Step::JoinBlocks { pos: block_start })?;
                Ok(b.finish(Selection::caret(block_start - 1), false))
            }
            NodeType::BulletList => {
                let (merged, caret_offset) = append_to_last_textblock(&prev, block.children());
                let list_start = block_start - prev.size();
                b.apply(Step::ReplaceBlocks {
                    at: list_start,
                    count: 2,
                    content: vec![merged],
                })?;
                Ok(b.finish(Selection::caret(list_start + caret_offset), false))
            }
            _ => Err(EditError::CommandRejected(
                "cannot merge into the previous block".to_string(),
            )),
        }
    } else {
        // First block of its container.
        if block.content_size() > 0 {
            return Err(EditError::CommandRejected(
                "at start of document".to_string(),
            ));
        }
        if container.child_count() == 1 {
            return Err(EditError::CommandRejected(
                "cannot delete the only remaining block".to_string(),
            ));
        }
        b.apply(Step::ReplaceBlocks {
            at: block_start,
            count: 1,
            content: Vec::new(),
        })?;
        if textblock_ranges(b.root()).is_empty() {
            return Err(EditError::CommandRejected(
                "no textblock would remain".to_string(),
            ));
        }
        let caret = crate::position::resolve_cursor(b.root(), block_start);
        Ok(b.finish(Selection::caret(caret), false))
    }
}

/// Wrap the blocks under the selection into a bullet list, or unwrap the
/// list the cursor currently sits in.
pub fn toggle_bullet_list(doc: &Document, sel: Selection) -> Result<Transaction, EditError> {
    let resolved = resolve(doc.root(), sel.head);
    if let Some((depth, list, list_content_start)) =
        resolved.find_ancestor(|n| n.kind() == NodeType::BulletList)
    {
        return unwrap_bullet_list(doc, sel, &resolved, depth, &list, list_content_start);
    }
    wrap_in_bullet_list(doc, sel)
}

fn wrap_in_bullet_list(doc: &Document, sel: Selection) -> Result<Transaction, EditError> {
    let resolved = resolve(doc.root(), sel.from());
    if !resolved.in_textblock() {
        return Err(EditError::CommandRejected(
            "no textblock in selection".to_string(),
        ));
    }
    let (container, container_start) =
        match resolved.find_ancestor(|n| !n.kind().is_textblock()) {
            Some((_, container, start)) => (container, start),
            None => {
                return Err(EditError::CommandRejected(
                    "no container around selection".to_string(),
                ))
            }
        };
    if !container.kind().valid_child(NodeType::BulletList) {
        return Err(EditError::CommandRejected(
            "a list is not allowed here".to_string(),
        ));
    }

    // Sibling index range intersecting the selection.
    let (from, to) = (sel.from(), sel.to());
    let mut acc = container_start;
    let mut first: Option<usize> = None;
    let mut last = 0usize;
    let mut wrap_start = 0usize;
    for (i, child) in container.children().iter().enumerate() {
        let start = acc;
        let end = acc + child.size();
        if start <= to && end >= from {
            if !child.kind().is_textblock() {
                return Err(EditError::CommandRejected(
                    "selection covers non-text blocks".to_string(),
                ));
            }
            if first.is_none() {
                first = Some(i);
                wrap_start = start;
            }
            last = i;
        }
        acc = end;
    }
    let first = match first {
        Some(i) => i,
        None => {
            return Err(EditError::CommandRejected(
                "no textblock in selection".to_string(),
            ))
        }
    };

    let wrapped: Vec<Rc<Node>> = container.children()[first..=last]
        .iter()
        .map(|block| {
            let align = block.attrs().align().unwrap_or_default();
            let para = Node::element(
                NodeType::Paragraph,
                Attrs::Paragraph { align },
                block.children().to_vec(),
            );
            Node::element(NodeType::ListItem, Attrs::None, vec![para])
        })
        .collect();
    let count = wrapped.len();
    let list = Node::element(NodeType::BulletList, Attrs::None, wrapped);
    let caret = map_caret_into_list(&container, first, wrap_start, sel.head);

    let mut b = Builder::new(doc);
    b.apply(Step::ReplaceBlocks {
        at: wrap_start,
        count,
        content: vec![list],
    })?;
    Ok(b.finish(Selection::caret(caret), false))
}

/// New absolute position of `pos` after blocks `[first..]` starting at
/// `wrap_start` were wrapped into list items. Relative to `wrap_start`, the
/// cursor gains the list open token plus, per preceding item, the two
/// wrapper tokens a list item adds around its paragraph.
fn map_caret_into_list(
    container: &Rc<Node>,
    first: usize,
    wrap_start: usize,
    pos: usize,
) -> usize {
    let mut acc = wrap_start;
    let mut items_before = 0usize;
    let mut sizes_before = 0usize;
    for child in container.children()[first..].iter() {
        let end = acc + child.size();
        if pos < end {
            let offset_in_block = pos.saturating_sub(acc + 1);
            // list open + preceding items + item open + paragraph open.
            return wrap_start + 1 + sizes_before + 2 * items_before + 2 + offset_in_block;
        }
        acc = end;
        sizes_before += child.size();
        items_before += 1;
    }
    wrap_start + 3
}

fn unwrap_bullet_list(
    doc: &Document,
    sel: Selection,
    resolved: &crate::position::Resolved,
    depth: usize,
    list: &Rc<Node>,
    list_content_start: usize,
) -> Result<Transaction, EditError> {
    let list_start = list_content_start - 1;
    let mut lifted: Vec<Rc<Node>> = Vec::new();
    for item in list.children() {
        for block in item.children() {
            lifted.push(block.clone());
        }
    }

    // Locate the lifted block holding the cursor to keep its offset.
    let item_index = resolved.path[depth].index;
    let block_index = resolved.path[depth + 1].index;
    let blocks_before: usize = list.children()[..item_index]
        .iter()
        .map(|item| item.child_count())
        .sum::<usize>()
        + block_index;
    let item = list.child(item_index);
    let item_content_start = resolved.path[depth + 1].content_start;
    let block_abs_start = item_content_start
        + item.children()[..block_index]
            .iter()
            .map(|c| c.size())
            .sum::<usize>();
    let offset_in_block = sel.head - block_abs_start;
    let new_block_start = list_start
        + lifted[..blocks_before]
            .iter()
            .map(|c| c.size())
            .sum::<usize>();
    let caret = new_block_start + offset_in_block;

    let mut b = Builder::new(doc);
    b.apply(Step::ReplaceBlocks {
        at: list_start,
        count: 1,
        content: lifted,
    })?;
    Ok(b.finish(Selection::caret(caret), false))
}

/// Collapse a (possibly ranged) selection by deleting its content,
/// returning the caret position in the builder's evolving tree.
fn collapse_selection(b: &mut Builder, sel: Selection) -> Result<usize, EditError> {
    if sel.is_collapsed() {
        Ok(sel.head)
    } else {
        delete_range(b, sel.from(), sel.to())
    }
}

/// Delete `[from, to)`. Within one textblock this is a plain inline splice;
/// across sibling textblocks the head and tail blocks are trimmed, the
/// blocks between them removed, and the remnants joined. Ranges that cross
/// into different containers (out of a cell, into a list) are rejected.
fn delete_range(b: &mut Builder, from: usize, to: usize) -> Result<usize, EditError> {
    let r_from = resolve(b.root(), from);
    let r_to = resolve(b.root(), to);
    if !r_from.in_textblock() || !r_to.in_textblock() {
        return Err(EditError::CommandRejected(
            "selection ends outside text".to_string(),
        ));
    }
    if r_from.parent_start() == r_to.parent_start() {
        b.apply(Step::ReplaceInline {
            from,
            to,
            content: Vec::new(),
        })?;
        return Ok(from);
    }
    let path_from = r_from.parent_path();
    let path_to = r_to.parent_path();
    if path_from[..path_from.len() - 1] != path_to[..path_to.len() - 1] {
        return Err(EditError::CommandRejected(
            "selection crosses structure boundaries".to_string(),
        ));
    }
    let i1 = path_from[path_from.len() - 1];
    let i2 = path_to[path_to.len() - 1];
    let t1_content_end = r_from.parent_start() + r_from.parent().content_size();
    let (_, t1_end) = r_from.parent_span();
    let t2_content_start = r_to.parent_start();

    // Back to front so earlier targets stay put.
    if to > t2_content_start {
        b.apply(Step::ReplaceInline {
            from: t2_content_start,
            to,
            content: Vec::new(),
        })?;
    }
    if i2 > i1 + 1 {
        b.apply(Step::ReplaceBlocks {
            at: t1_end,
            count: i2 - i1 - 1,
            content: Vec::new(),
        })?;
    }
    if t1_content_end > from {
        b.apply(Step::ReplaceInline {
            from,
            to: t1_content_end,
            content: Vec::new(),
        })?;
    }
    b.apply(Step::JoinBlocks { pos: from + 1 })?;
    Ok(from)
}

/// Split point insertion of a block-level node: the textblock around `at`
/// is cut in two, the node slides between the halves, empty halves are
/// dropped, and an empty paragraph stands in for an empty trailing half.
/// Returns (node start, content start of the following textblock).
fn insert_block_at(
    b: &mut Builder,
    at: usize,
    node: Rc<Node>,
) -> Result<(usize, usize), EditError> {
    let resolved = resolve(b.root(), at);
    if !resolved.in_textblock() {
        return Err(EditError::CommandRejected(
            "cursor is not in a textblock".to_string(),
        ));
    }
    let container = match resolved.find_ancestor(|n| !n.kind().is_textblock()) {
        Some((_, container, _)) => container,
        None => {
            return Err(EditError::CommandRejected(
                "no container around cursor".to_string(),
            ))
        }
    };
    if !container.kind().valid_child(node.kind()) {
        return Err(EditError::CommandRejected(format!(
            "{} is not allowed inside {}",
            node.kind().name(),
            container.kind().name()
        )));
    }
    let block = resolved.parent().clone();
    let (block_start, _) = resolved.parent_span();
    let offset = resolved.offset();
    let (before, after) = node::split_inline(block.children(), offset);

    let mut pieces: Vec<Rc<Node>> = Vec::new();
    if !before.is_empty() {
        pieces.push(Node::element(block.kind(), block.attrs().clone(), before));
    }
    let node_size = node.size();
    pieces.push(node);
    if after.is_empty() {
        pieces.push(Node::empty_paragraph());
    } else {
        pieces.push(Node::element(block.kind(), block.attrs().clone(), after));
    }

    let before_size = pieces[0].size();
    let node_start = if pieces.len() == 3 {
        block_start + before_size
    } else {
        block_start
    };
    let after_start = node_start + node_size + 1;

    b.apply(Step::ReplaceBlocks {
        at: block_start,
        count: 1,
        content: pieces,
    })?;
    Ok((node_start, after_start))
}

/// Append inline content to the last textblock inside `node`, returning the
/// rebuilt node and the caret offset (relative to the node's opening
/// boundary) of the old content end.
fn append_to_last_textblock(node: &Rc<Node>, inline: &[Rc<Node>]) -> (Rc<Node>, usize) {
    if node.kind().is_textblock() {
        let mut children = node.children().to_vec();
        let caret = 1 + node.content_size();
        children.extend(inline.iter().cloned());
        return (
            Node::element(node.kind(), node.attrs().clone(), node::merge_inline(children)),
            caret,
        );
    }
    let last = node.child_count() - 1;
    let (rebuilt, inner_offset) = append_to_last_textblock(node.child(last), inline);
    let prefix: usize = node.children()[..last].iter().map(|c| c.size()).sum();
    let mut children = node.children().to_vec();
    children[last] = rebuilt;
    (
        Node::element(node.kind(), node.attrs().clone(), children),
        1 + prefix + inner_offset,
    )
}

fn range_has_text(root: &Rc<Node>, from: usize, to: usize) -> bool {
    for (content_start, block) in textblocks_in_range(root, from, to) {
        let mut acc = content_start;
        for child in block.children() {
            let start = acc;
            let end = acc + child.size();
            if child.is_text() && start < to && end > from {
                return true;
            }
            acc = end;
        }
    }
    false
}

/// True when every text character in `[from, to)` carries `mark`.
fn range_fully_marked(root: &Rc<Node>, from: usize, to: usize, mark: Mark) -> bool {
    for (content_start, block) in textblocks_in_range(root, from, to) {
        let mut acc = content_start;
        for child in block.children() {
            let start = acc;
            let end = acc + child.size();
            if child.is_text() && start < to && end > from && !child.marks().contains(mark) {
                return false;
            }
            acc = end;
        }
    }
    true
}
