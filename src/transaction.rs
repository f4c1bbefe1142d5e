use crate::document::Document;
use crate::node::{self, Node};
use crate::position::resolve;
use crate::schema::{Attrs, Mark, NodeType};
use crate::selection::Selection;
use std::fmt;
use std::rc::Rc;

/// Why a command did not produce a transaction. Every failure leaves the
/// document and selection untouched; the host surfaces it (or stays silent)
/// but never crashes.
#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    /// The command would have produced a tree the schema forbids.
    SchemaViolation(String),
    /// Structurally possible but disallowed by policy (last table row, sole
    /// remaining block, non-rectangular merge region).
    CommandRejected(String),
    /// Externally supplied content could not be understood.
    MalformedInput(String),
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::SchemaViolation(msg) => write!(f, "schema violation: {msg}"),
            EditError::CommandRejected(msg) => write!(f, "command rejected: {msg}"),
            EditError::MalformedInput(msg) => write!(f, "malformed input: {msg}"),
        }
    }
}

impl std::error::Error for EditError {}

/// A range of the old token stream replaced by new tokens: (start, old
/// length, new length). Selections are re-anchored through these.
pub type MapEntry = (usize, usize, usize);

/// Map a position through a sequence of edits. Insertions at or before the
/// position shift it forward; a deletion spanning it collapses it to the
/// deletion point (to the end of the replacement when one was inserted).
pub fn map_pos(pos: usize, entries: &[MapEntry]) -> usize {
    let mut pos = pos;
    for &(start, old_len, new_len) in entries {
        if pos <= start {
            continue;
        }
        if pos >= start + old_len {
            pos = pos - old_len + new_len;
        } else {
            pos = start + new_len;
        }
    }
    pos
}

/// One structural edit. Steps are the only way a document changes; each one
/// applies against an immutable tree and yields a new root plus the map
/// entries describing how positions moved.
#[derive(Debug, Clone)]
pub enum Step {
    /// Replace inline content `[from, to)` within a single textblock.
    ReplaceInline {
        from: usize,
        to: usize,
        content: Vec<Rc<Node>>,
    },
    /// Replace `count` sibling blocks starting at the child boundary `at`.
    ReplaceBlocks {
        at: usize,
        count: usize,
        content: Vec<Rc<Node>>,
    },
    /// Split the textblock containing `pos` in two at that offset.
    SplitBlock { pos: usize },
    /// Join the block starting at boundary `pos` into its previous sibling.
    JoinBlocks { pos: usize },
    /// Patch the attrs of the node whose opening boundary is `pos`.
    SetAttrs { pos: usize, attrs: Attrs },
    /// Retag the textblock containing `pos` (paragraph <-> heading).
    SetBlockKind {
        pos: usize,
        kind: NodeType,
        attrs: Attrs,
    },
    /// Add or remove a mark across `[from, to)`.
    SetMark {
        from: usize,
        to: usize,
        mark: Mark,
        on: bool,
    },
}

impl Step {
    pub fn apply(&self, root: &Rc<Node>) -> Result<(Rc<Node>, Vec<MapEntry>), EditError> {
        match self {
            Step::ReplaceInline { from, to, content } => {
                apply_replace_inline(root, *from, *to, content)
            }
            Step::ReplaceBlocks { at, count, content } => {
                apply_replace_blocks(root, *at, *count, content)
            }
            Step::SplitBlock { pos } => apply_split_block(root, *pos),
            Step::JoinBlocks { pos } => apply_join_blocks(root, *pos),
            Step::SetAttrs { pos, attrs } => apply_set_attrs(root, *pos, attrs),
            Step::SetBlockKind { pos, kind, attrs } => {
                apply_set_block_kind(root, *pos, *kind, attrs)
            }
            Step::SetMark { from, to, mark, on } => apply_set_mark(root, *from, *to, *mark, *on),
        }
    }
}

fn apply_replace_inline(
    root: &Rc<Node>,
    from: usize,
    to: usize,
    content: &[Rc<Node>],
) -> Result<(Rc<Node>, Vec<MapEntry>), EditError> {
    if to < from || to > root.content_size() {
        return Err(EditError::SchemaViolation("inline range out of bounds".to_string()));
    }
    let r_from = resolve(root, from);
    let r_to = resolve(root, to);
    if !r_from.in_textblock() {
        return Err(EditError::SchemaViolation(
            "inline edit outside a textblock".to_string(),
        ));
    }
    if r_from.parent_start() != r_to.parent_start() || r_from.parent_path() != r_to.parent_path() {
        return Err(EditError::SchemaViolation(
            "inline range crosses block boundaries".to_string(),
        ));
    }
    let parent = r_from.parent().clone();
    for piece in content {
        if !parent.kind().valid_child(piece.kind()) {
            return Err(EditError::SchemaViolation(format!(
                "{} is not inline content",
                piece.kind().name()
            )));
        }
        piece
            .validate_deep()
            .map_err(EditError::SchemaViolation)?;
    }
    let new_len: usize = content.iter().map(|c| c.size()).sum();
    let local_from = from - r_from.parent_start();
    let local_to = to - r_from.parent_start();
    let children = node::splice_inline(parent.children(), local_from, local_to, content.to_vec());
    let new_root = node::update_at(root, &r_from.parent_path(), |tb| {
        Ok(Node::element(tb.kind(), tb.attrs().clone(), children))
    })?;
    Ok((new_root, vec![(from, to - from, new_len)]))
}

fn apply_replace_blocks(
    root: &Rc<Node>,
    at: usize,
    count: usize,
    content: &[Rc<Node>],
) -> Result<(Rc<Node>, Vec<MapEntry>), EditError> {
    let resolved = resolve(root, at);
    let parent = resolved.parent().clone();
    let index = resolved.index();
    let boundary: usize = parent.children()[..index].iter().map(|c| c.size()).sum();
    if boundary != resolved.offset() {
        return Err(EditError::SchemaViolation(
            "block edit is not at a child boundary".to_string(),
        ));
    }
    if index + count > parent.child_count() {
        return Err(EditError::SchemaViolation(
            "block range out of bounds".to_string(),
        ));
    }
    for piece in content {
        if !parent.kind().valid_child(piece.kind()) {
            return Err(EditError::SchemaViolation(format!(
                "{} is not a valid child of {}",
                piece.kind().name(),
                parent.kind().name()
            )));
        }
        piece
            .validate_deep()
            .map_err(EditError::SchemaViolation)?;
    }
    if parent.kind().requires_content()
        && parent.child_count() - count + content.len() == 0
    {
        return Err(EditError::SchemaViolation(format!(
            "{} must not be left empty",
            parent.kind().name()
        )));
    }
    let old_len: usize = parent.children()[index..index + count]
        .iter()
        .map(|c| c.size())
        .sum();
    let new_len: usize = content.iter().map(|c| c.size()).sum();
    let mut children = parent.children().to_vec();
    children.splice(index..index + count, content.iter().cloned());
    let new_root = node::update_at(root, &resolved.parent_path(), |p| {
        Ok(Node::element(p.kind(), p.attrs().clone(), children))
    })?;
    Ok((new_root, vec![(at, old_len, new_len)]))
}

fn apply_split_block(root: &Rc<Node>, pos: usize) -> Result<(Rc<Node>, Vec<MapEntry>), EditError> {
    let resolved = resolve(root, pos);
    if !resolved.in_textblock() {
        return Err(EditError::SchemaViolation(
            "split outside a textblock".to_string(),
        ));
    }
    let block = resolved.parent().clone();
    let offset = resolved.offset();
    let (before, after) = node::split_inline(block.children(), offset);
    let first = Node::element(block.kind(), block.attrs().clone(), before);
    let second = Node::element(block.kind(), block.attrs().clone(), after);
    let path = resolved.parent_path();
    let new_root = update_parent_children(root, &path, |siblings, index| {
        let mut out = siblings.to_vec();
        out.splice(index..index + 1, [first.clone(), second.clone()]);
        out
    })?;
    Ok((new_root, vec![(pos, 0, 2)]))
}

fn apply_join_blocks(root: &Rc<Node>, pos: usize) -> Result<(Rc<Node>, Vec<MapEntry>), EditError> {
    let resolved = resolve(root, pos);
    let parent = resolved.parent().clone();
    let index = resolved.index();
    let boundary: usize = parent.children()[..index].iter().map(|c| c.size()).sum();
    if boundary != resolved.offset() || index == 0 || index >= parent.child_count() {
        return Err(EditError::SchemaViolation(
            "join is not at an inner block boundary".to_string(),
        ));
    }
    let left = parent.child(index - 1).clone();
    let right = parent.child(index).clone();
    if !left.kind().is_textblock() || !right.kind().is_textblock() {
        return Err(EditError::SchemaViolation(
            "only textblocks can be joined".to_string(),
        ));
    }
    let mut children = left.children().to_vec();
    children.extend(right.children().iter().cloned());
    let merged = Node::element(left.kind(), left.attrs().clone(), node::merge_inline(children));
    let mut siblings = parent.children().to_vec();
    siblings.splice(index - 1..index + 1, [merged]);
    let new_root = node::update_at(root, &resolved.parent_path(), |p| {
        Ok(Node::element(p.kind(), p.attrs().clone(), siblings))
    })?;
    Ok((new_root, vec![(pos - 1, 2, 0)]))
}

fn apply_set_attrs(
    root: &Rc<Node>,
    pos: usize,
    attrs: &Attrs,
) -> Result<(Rc<Node>, Vec<MapEntry>), EditError> {
    let resolved = resolve(root, pos);
    let parent = resolved.parent().clone();
    let index = resolved.index();
    let boundary: usize = parent.children()[..index].iter().map(|c| c.size()).sum();
    if boundary != resolved.offset() || index >= parent.child_count() {
        return Err(EditError::SchemaViolation(
            "no node starts at this position".to_string(),
        ));
    }
    let target = parent.child(index).clone();
    crate::schema::validate_attrs(target.kind(), attrs).map_err(EditError::SchemaViolation)?;
    let mut path = resolved.parent_path();
    path.push(index);
    let attrs = attrs.clone();
    let new_root = node::update_at(root, &path, move |n| Ok(n.with_attrs(attrs)))?;
    Ok((new_root, Vec::new()))
}

fn apply_set_block_kind(
    root: &Rc<Node>,
    pos: usize,
    kind: NodeType,
    attrs: &Attrs,
) -> Result<(Rc<Node>, Vec<MapEntry>), EditError> {
    let resolved = resolve(root, pos);
    if !resolved.in_textblock() {
        return Err(EditError::SchemaViolation(
            "no textblock at this position".to_string(),
        ));
    }
    if !kind.is_textblock() {
        return Err(EditError::SchemaViolation(format!(
            "{} is not a textblock type",
            kind.name()
        )));
    }
    crate::schema::validate_attrs(kind, attrs).map_err(EditError::SchemaViolation)?;
    // The grandparent must accept the new kind (cells allow headings, list
    // items do not).
    let path = resolved.parent_path();
    if let Some((_, container, _)) = resolved.find_ancestor(|n| !n.kind().is_textblock()) {
        if !container.kind().valid_child(kind) {
            return Err(EditError::SchemaViolation(format!(
                "{} is not allowed inside {}",
                kind.name(),
                container.kind().name()
            )));
        }
    }
    let attrs = attrs.clone();
    let new_root = node::update_at(root, &path, move |tb| Ok(tb.with_kind(kind, attrs)))?;
    Ok((new_root, Vec::new()))
}

fn apply_set_mark(
    root: &Rc<Node>,
    from: usize,
    to: usize,
    mark: Mark,
    on: bool,
) -> Result<(Rc<Node>, Vec<MapEntry>), EditError> {
    if to < from || to > root.content_size() {
        return Err(EditError::SchemaViolation("mark range out of bounds".to_string()));
    }
    let blocks = crate::position::textblocks_in_range(root, from, to);
    let mut new_root = root.clone();
    for (content_start, block) in blocks {
        let content_end = content_start + block.content_size();
        if to <= content_start || from >= content_end {
            continue;
        }
        let local_from = from.saturating_sub(content_start);
        let local_to = to.min(content_end) - content_start;
        if local_from >= local_to {
            continue;
        }
        // Re-resolve against the evolving root: mark edits never change
        // sizes, so positions stay stable across iterations.
        let resolved = resolve(&new_root, content_start);
        let path = resolved.parent_path();
        let (before, rest) = node::split_inline(block.children(), local_from);
        let (middle, after) = node::split_inline(&rest, local_to - local_from);
        let mut children = before;
        for piece in middle {
            if piece.is_text() {
                let marks = if on {
                    piece.marks().with(mark)
                } else {
                    piece.marks().without(mark)
                };
                children.push(piece.with_marks(marks));
            } else {
                children.push(piece);
            }
        }
        children.extend(after);
        let children = node::merge_inline(children);
        new_root = node::update_at(&new_root, &path, |tb| {
            Ok(Node::element(tb.kind(), tb.attrs().clone(), children))
        })?;
    }
    Ok((new_root, Vec::new()))
}

/// Rebuild the children of the container at `path_to_child`'s parent via a
/// closure receiving (siblings, child index). Used by the split step, which
/// replaces one child with two.
fn update_parent_children<F>(
    root: &Rc<Node>,
    path_to_child: &[usize],
    f: F,
) -> Result<Rc<Node>, EditError>
where
    F: FnOnce(&[Rc<Node>], usize) -> Vec<Rc<Node>>,
{
    match path_to_child.split_last() {
        None => Err(EditError::SchemaViolation(
            "cannot restructure the document root".to_string(),
        )),
        Some((&index, parent_path)) => node::update_at(root, parent_path, |parent| {
            let children = f(parent.children(), index);
            Ok(Node::element(parent.kind(), parent.attrs().clone(), children))
        }),
    }
}

/// The unit of document mutation: base version, the ordered edits, the
/// resulting document and selection, and whether the entry may coalesce
/// with the previous one in history.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub base_version: u64,
    #[allow(dead_code)]
    pub steps: Vec<Step>,
    /// Position deltas for consumers re-anchoring selections they held
    /// against the base document.
    #[allow(dead_code)]
    pub maps: Vec<MapEntry>,
    pub doc: Document,
    pub selection: Selection,
    pub coalesce: bool,
}

/// Accumulates steps against an evolving tree. All-or-nothing: any failing
/// step aborts the whole build and the caller's document is untouched.
pub struct Builder {
    base: Document,
    root: Rc<Node>,
    steps: Vec<Step>,
    maps: Vec<MapEntry>,
}

impl Builder {
    pub fn new(doc: &Document) -> Builder {
        Builder {
            base: doc.clone(),
            root: doc.root().clone(),
            steps: Vec::new(),
            maps: Vec::new(),
        }
    }

    pub fn apply(&mut self, step: Step) -> Result<(), EditError> {
        let (root, mut maps) = step.apply(&self.root)?;
        self.root = root;
        self.steps.push(step);
        self.maps.append(&mut maps);
        Ok(())
    }

    pub fn root(&self) -> &Rc<Node> {
        &self.root
    }

    pub fn finish(self, selection: Selection, coalesce: bool) -> Transaction {
        let version = self.base.version() + 1;
        Transaction {
            base_version: self.base.version(),
            doc: self.base.with_root(self.root, version),
            steps: self.steps,
            maps: self.maps,
            selection,
            coalesce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MarkSet;

    fn doc_of(blocks: Vec<Rc<Node>>) -> Document {
        Document::new(Node::element(NodeType::Doc, Attrs::None, blocks), 0)
    }

    fn para(text: &str) -> Rc<Node> {
        Node::paragraph(vec![Node::text_node(text, MarkSet::empty())])
    }

    #[test]
    fn test_map_pos() {
        // Insertion of 3 units at 5.
        assert_eq!(map_pos(4, &[(5, 0, 3)]), 4);
        assert_eq!(map_pos(5, &[(5, 0, 3)]), 5);
        assert_eq!(map_pos(6, &[(5, 0, 3)]), 9);
        // Deletion of [2, 6) collapses interior positions to 2.
        assert_eq!(map_pos(4, &[(2, 4, 0)]), 2);
        assert_eq!(map_pos(8, &[(2, 4, 0)]), 4);
        // Replacement lands interior positions after the new content.
        assert_eq!(map_pos(3, &[(2, 4, 1)]), 3);
    }

    #[test]
    fn test_replace_inline_inserts_text() {
        let doc = doc_of(vec![para("helo")]);
        let step = Step::ReplaceInline {
            from: 3,
            to: 3,
            content: vec![Node::text_node("l", MarkSet::empty())],
        };
        let (root, maps) = step.apply(doc.root()).unwrap();
        assert_eq!(root.child(0).inline_text(), "hello");
        assert_eq!(maps, vec![(3, 0, 1)]);
    }

    #[test]
    fn test_replace_inline_rejects_cross_block() {
        let doc = doc_of(vec![para("ab"), para("cd")]);
        let step = Step::ReplaceInline {
            from: 2,
            to: 6,
            content: Vec::new(),
        };
        assert!(step.apply(doc.root()).is_err());
    }

    #[test]
    fn test_split_and_join_are_inverse_shapes() {
        let doc = doc_of(vec![para("hello")]);
        let (split_root, maps) = Step::SplitBlock { pos: 3 }.apply(doc.root()).unwrap();
        assert_eq!(split_root.child_count(), 2);
        assert_eq!(split_root.child(0).inline_text(), "he");
        assert_eq!(split_root.child(1).inline_text(), "llo");
        assert_eq!(maps, vec![(3, 0, 2)]);

        // The new block starts at boundary 4 after the split.
        let (joined, maps) = Step::JoinBlocks { pos: 4 }.apply(&split_root).unwrap();
        assert_eq!(joined.child_count(), 1);
        assert_eq!(joined.child(0).inline_text(), "hello");
        assert_eq!(maps, vec![(3, 2, 0)]);
    }

    #[test]
    fn test_replace_blocks_validates_children() {
        let doc = doc_of(vec![para("a")]);
        let bad = Step::ReplaceBlocks {
            at: 0,
            count: 0,
            content: vec![Node::element(NodeType::ListItem, Attrs::None, vec![para("x")])],
        };
        assert!(bad.apply(doc.root()).is_err());

        let good = Step::ReplaceBlocks {
            at: 0,
            count: 0,
            content: vec![Node::leaf(
                NodeType::ChartBlock,
                Attrs::default_for(NodeType::ChartBlock),
            )],
        };
        let (root, maps) = good.apply(doc.root()).unwrap();
        assert_eq!(root.child(0).kind(), NodeType::ChartBlock);
        assert_eq!(maps, vec![(0, 0, 1)]);
    }

    #[test]
    fn test_replace_blocks_refuses_to_empty_doc() {
        let doc = doc_of(vec![para("a")]);
        let step = Step::ReplaceBlocks {
            at: 0,
            count: 1,
            content: Vec::new(),
        };
        assert!(step.apply(doc.root()).is_err());
    }

    #[test]
    fn test_set_mark_range() {
        let doc = doc_of(vec![para("hello")]);
        let step = Step::SetMark {
            from: 2,
            to: 4,
            mark: Mark::Bold,
            on: true,
        };
        let (root, maps) = step.apply(doc.root()).unwrap();
        assert!(maps.is_empty());
        let children = root.child(0).children();
        assert_eq!(children.len(), 3);
        assert_eq!(children[1].text(), "el");
        assert!(children[1].marks().contains(Mark::Bold));
        assert!(!children[0].marks().contains(Mark::Bold));
    }

    #[test]
    fn test_set_attrs_patches_chart() {
        let chart = Node::leaf(NodeType::ChartBlock, Attrs::default_for(NodeType::ChartBlock));
        let doc = doc_of(vec![para("a"), chart]);
        let step = Step::SetAttrs {
            pos: 3,
            attrs: Attrs::Chart {
                title: "Monthly".to_string(),
                period_count: 9,
            },
        };
        let (root, _) = step.apply(doc.root()).unwrap();
        match root.child(1).attrs() {
            Attrs::Chart { title, period_count } => {
                assert_eq!(title, "Monthly");
                assert_eq!(*period_count, 9);
            }
            other => panic!("unexpected attrs: {other:?}"),
        }
        // Out-of-domain periods are a schema violation.
        let bad = Step::SetAttrs {
            pos: 3,
            attrs: Attrs::Chart {
                title: "Monthly".to_string(),
                period_count: 21,
            },
        };
        assert!(bad.apply(doc.root()).is_err());
    }

    #[test]
    fn test_set_block_kind() {
        let doc = doc_of(vec![para("title")]);
        let step = Step::SetBlockKind {
            pos: 1,
            kind: NodeType::Heading,
            attrs: Attrs::default_for(NodeType::Heading),
        };
        let (root, _) = step.apply(doc.root()).unwrap();
        assert_eq!(root.child(0).kind(), NodeType::Heading);
        assert_eq!(root.child(0).inline_text(), "title");
    }
}
