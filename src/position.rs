use crate::node::Node;
use std::rc::Rc;

/// One level of a resolved position: the container at that depth, the index
/// of the child the position points at or into, and the absolute position
/// where the container's content begins.
#[derive(Debug, Clone)]
pub struct PathStep {
    pub node: Rc<Node>,
    pub index: usize,
    pub content_start: usize,
}

/// A document position resolved into its chain of ancestors. The last step
/// holds the deepest container: a textblock for cursor positions, some other
/// container for block boundaries.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub pos: usize,
    pub path: Vec<PathStep>,
}

impl Resolved {
    pub fn parent(&self) -> &Rc<Node> {
        &self.path.last().unwrap_or_else(|| unreachable!()).node
    }

    pub fn parent_start(&self) -> usize {
        self.path.last().map(|s| s.content_start).unwrap_or(0)
    }

    /// Offset of the position within the parent's content.
    pub fn offset(&self) -> usize {
        self.pos - self.parent_start()
    }

    /// Index of the child the position points before (or, for a position
    /// inside a text node, the index of that text node).
    pub fn index(&self) -> usize {
        self.path.last().map(|s| s.index).unwrap_or(0)
    }

    /// Child indices from the root down to the parent container.
    pub fn parent_path(&self) -> Vec<usize> {
        self.path[..self.path.len() - 1]
            .iter()
            .map(|s| s.index)
            .collect()
    }

    pub fn in_textblock(&self) -> bool {
        self.parent().kind().is_textblock()
    }

    /// Absolute span `[start, end)` of the parent node's own tokens.
    pub fn parent_span(&self) -> (usize, usize) {
        let start = self.parent_start().saturating_sub(1);
        (start, start + self.parent().size())
    }

    /// Locate the nearest enclosing node of the given predicate, returning
    /// (depth, node clone, absolute start of its content).
    pub fn find_ancestor<F>(&self, pred: F) -> Option<(usize, Rc<Node>, usize)>
    where
        F: Fn(&Node) -> bool,
    {
        self.path
            .iter()
            .enumerate()
            .rev()
            .find(|(_, step)| pred(&step.node))
            .map(|(depth, step)| (depth, step.node.clone(), step.content_start))
    }
}

/// Resolve an absolute position against the tree rooted at `root` (the doc
/// node). The position is clamped into `0..=content_size`. Atomic nodes have
/// size 1, so no position can land strictly inside one; the resolver only
/// ever descends into real containers.
pub fn resolve(root: &Rc<Node>, pos: usize) -> Resolved {
    let pos = pos.min(root.content_size());
    let mut path = Vec::new();
    let mut node = root.clone();
    let mut content_start = 0usize;

    loop {
        let offset = pos - content_start;
        let mut acc = 0usize;
        let mut index = node.child_count();
        let mut descend: Option<Rc<Node>> = None;

        for (i, child) in node.children().iter().enumerate() {
            if offset <= acc {
                index = i;
                break;
            }
            let end = acc + child.size();
            if offset < end {
                index = i;
                if !child.is_text() && !child.kind().is_atomic() {
                    descend = Some(child.clone());
                }
                break;
            }
            acc = end;
        }

        path.push(PathStep {
            node: node.clone(),
            index,
            content_start,
        });

        match descend {
            Some(child) => {
                content_start += acc + 1;
                node = child;
            }
            None => break,
        }
    }

    Resolved { pos, path }
}

/// Content ranges `(start, end)` of every textblock, in traversal order.
/// These are exactly the valid cursor positions of the document.
pub fn textblock_ranges(root: &Rc<Node>) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    collect_textblocks(root, 0, &mut out);
    out
}

fn collect_textblocks(node: &Rc<Node>, content_start: usize, out: &mut Vec<(usize, usize)>) {
    let mut acc = content_start;
    for child in node.children() {
        if child.kind().is_textblock() {
            out.push((acc + 1, acc + 1 + child.content_size()));
        } else if !child.is_text() && !child.kind().is_atomic() {
            collect_textblocks(child, acc + 1, out);
        }
        acc += child.size();
    }
}

/// Snap a raw position to the nearest valid cursor position: a position
/// whose parent is a textblock. Resolving onto an atomic node's edge yields
/// the boundary immediately before or after it, never an interior.
pub fn resolve_cursor(root: &Rc<Node>, raw: usize) -> usize {
    let pos = raw.min(root.content_size());
    let resolved = resolve(root, pos);
    if resolved.in_textblock() {
        return pos;
    }
    let ranges = textblock_ranges(root);
    let mut best = 0usize;
    let mut best_dist = usize::MAX;
    for (start, end) in ranges {
        let candidate = pos.clamp(start, end);
        let dist = candidate.abs_diff(pos);
        // Prefer the later position on ties so a boundary snaps forward.
        if dist < best_dist || (dist == best_dist && candidate > best) {
            best = candidate;
            best_dist = dist;
        }
    }
    if best_dist == usize::MAX { 0 } else { best }
}

/// Textblocks whose content intersects `[from, to]`, as (content_start,
/// node) pairs in traversal order.
pub fn textblocks_in_range(root: &Rc<Node>, from: usize, to: usize) -> Vec<(usize, Rc<Node>)> {
    let mut out = Vec::new();
    collect_in_range(root, 0, from, to, &mut out);
    out
}

fn collect_in_range(
    node: &Rc<Node>,
    content_start: usize,
    from: usize,
    to: usize,
    out: &mut Vec<(usize, Rc<Node>)>,
) {
    let mut acc = content_start;
    for child in node.children() {
        let start = acc;
        let end = acc + child.size();
        if start <= to && end >= from {
            if child.kind().is_textblock() {
                out.push((start + 1, child.clone()));
            } else if !child.is_text() && !child.kind().is_atomic() {
                collect_in_range(child, start + 1, from, to, out);
            }
        }
        acc = end;
    }
}

/// Chart blocks with the absolute position of their opening boundary.
pub fn chart_positions(root: &Rc<Node>) -> Vec<(usize, Rc<Node>)> {
    let mut out = Vec::new();
    collect_charts(root, 0, &mut out);
    out
}

fn collect_charts(node: &Rc<Node>, content_start: usize, out: &mut Vec<(usize, Rc<Node>)>) {
    let mut acc = content_start;
    for child in node.children() {
        if child.kind() == crate::schema::NodeType::ChartBlock {
            out.push((acc, child.clone()));
        } else if !child.is_text() && !child.kind().is_atomic() {
            collect_charts(child, acc + 1, out);
        }
        acc += child.size();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attrs, MarkSet, NodeType};

    fn sample_doc() -> Rc<Node> {
        // doc(paragraph("ab"), chartBlock, paragraph("cd"))
        Node::element(
            NodeType::Doc,
            Attrs::None,
            vec![
                Node::paragraph(vec![Node::text_node("ab", MarkSet::empty())]),
                Node::leaf(NodeType::ChartBlock, Attrs::default_for(NodeType::ChartBlock)),
                Node::paragraph(vec![Node::text_node("cd", MarkSet::empty())]),
            ],
        )
    }

    #[test]
    fn test_resolve_inside_text() {
        let doc = sample_doc();
        // Positions: 0 p-open, 1..=3 "ab" content, 3 p-close.., chart at 4,
        // second paragraph content at 6..=8.
        let r = resolve(&doc, 2);
        assert!(r.in_textblock());
        assert_eq!(r.offset(), 1);
        assert_eq!(r.parent_path(), vec![0]);
    }

    #[test]
    fn test_resolve_block_boundary() {
        let doc = sample_doc();
        let r = resolve(&doc, 4);
        assert_eq!(r.parent().kind(), NodeType::Doc);
        assert_eq!(r.index(), 1);
        assert!(!r.in_textblock());
    }

    #[test]
    fn test_textblock_ranges() {
        let doc = sample_doc();
        assert_eq!(textblock_ranges(&doc), vec![(1, 3), (6, 8)]);
    }

    #[test]
    fn test_cursor_never_resolves_into_atomic() {
        let doc = sample_doc();
        // Position 4 is the chart's opening boundary and 5 its closing one;
        // both snap to an adjacent textblock position.
        for raw in [4usize, 5] {
            let snapped = resolve_cursor(&doc, raw);
            let r = resolve(&doc, snapped);
            assert!(r.in_textblock(), "raw {raw} snapped to {snapped}");
        }
        assert_eq!(resolve_cursor(&doc, 4), 3);
        assert_eq!(resolve_cursor(&doc, 5), 6);
    }

    #[test]
    fn test_cursor_snaps_inline_tag_edges() {
        // paragraph("x", dataTag, "y"): every position is already valid.
        let doc = Node::element(
            NodeType::Doc,
            Attrs::None,
            vec![Node::paragraph(vec![
                Node::text_node("x", MarkSet::empty()),
                Node::leaf(
                    NodeType::DataTag,
                    Attrs::DataTag {
                        label: "[5%]".to_string(),
                    },
                ),
                Node::text_node("y", MarkSet::empty()),
            ])],
        );
        // Content spans 1..=4; the tag occupies the single unit [2, 3).
        for pos in 1..=4 {
            assert_eq!(resolve_cursor(&doc, pos), pos);
            assert!(resolve(&doc, pos).in_textblock());
        }
    }

    #[test]
    fn test_clamp_past_end() {
        let doc = sample_doc();
        assert_eq!(resolve_cursor(&doc, 999), 8);
    }

    #[test]
    fn test_chart_positions() {
        let doc = sample_doc();
        let charts = chart_positions(&doc);
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].0, 4);
    }
}
