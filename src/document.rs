use crate::node::Node;
use crate::position::{resolve, resolve_cursor};
use crate::schema::{Attrs, MarkSet, NodeType};
use std::rc::Rc;

/// The document: a `doc` root plus a version counter. Owned exclusively by
/// the editor; everyone else holds immutable snapshots. The version is
/// monotonically increasing across every produced document, including the
/// ones undo and redo restore, so equality compares content, not version.
#[derive(Debug, Clone)]
pub struct Document {
    root: Rc<Node>,
    version: u64,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl Document {
    pub fn new(root: Rc<Node>, version: u64) -> Document {
        Document { root, version }
    }

    /// A document holding a single empty paragraph.
    pub fn empty() -> Document {
        Document::new(
            Node::element(NodeType::Doc, Attrs::None, vec![Node::empty_paragraph()]),
            0,
        )
    }

    /// The content a fresh editor opens with when the host supplies none:
    /// a level-2 heading and two body paragraphs.
    pub fn seed() -> Document {
        let heading = Node::element(
            NodeType::Heading,
            Attrs::default_for(NodeType::Heading),
            vec![Node::text_node("Quality briefing", MarkSet::empty())],
        );
        let body1 = Node::paragraph(vec![Node::text_node(
            "This is body text. Click anywhere and start editing.",
            MarkSet::empty(),
        )]);
        let body2 = Node::paragraph(vec![Node::text_node(
            "Press Enter to open a new paragraph, or use the toolbar commands to restyle the text.",
            MarkSet::empty(),
        )]);
        Document::new(
            Node::element(NodeType::Doc, Attrs::None, vec![heading, body1, body2]),
            0,
        )
    }

    pub fn root(&self) -> &Rc<Node> {
        &self.root
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn with_root(&self, root: Rc<Node>, version: u64) -> Document {
        Document { root, version }
    }

    pub fn content_size(&self) -> usize {
        self.root.content_size()
    }

    /// Count of characters across all text nodes, for host-side display.
    pub fn char_count(&self) -> usize {
        self.root.char_count()
    }

    /// The node whose opening boundary sits at `pos`, or the text node
    /// covering `pos` when it falls inside one.
    #[allow(dead_code)]
    pub fn node_at(&self, pos: usize) -> Option<Rc<Node>> {
        if pos >= self.content_size() {
            return None;
        }
        let resolved = resolve(&self.root, pos);
        let parent = resolved.parent();
        let index = resolved.index();
        if index < parent.child_count() {
            Some(parent.child(index).clone())
        } else {
            None
        }
    }

    #[allow(dead_code)]
    pub fn is_atomic_at(&self, pos: usize) -> bool {
        self.node_at(pos)
            .map(|n| n.kind().is_atomic())
            .unwrap_or(false)
    }

    /// Text between two positions; atomic inline nodes contribute their
    /// label, block boundaries a newline.
    #[allow(dead_code)]
    pub fn range_text(&self, from: usize, to: usize) -> String {
        let mut out = String::new();
        collect_range_text(&self.root, 0, from.min(to), from.max(to), &mut out);
        out
    }

    pub fn resolve_cursor(&self, raw: usize) -> usize {
        resolve_cursor(&self.root, raw)
    }

    /// First valid cursor position of the document.
    pub fn start_position(&self) -> usize {
        self.resolve_cursor(0)
    }
}

fn collect_range_text(
    node: &Rc<Node>,
    content_start: usize,
    from: usize,
    to: usize,
    out: &mut String,
) {
    let mut acc = content_start;
    for child in node.children() {
        let start = acc;
        let end = acc + child.size();
        if start < to && end > from {
            match (child.kind(), child.attrs()) {
                (NodeType::Text, _) => {
                    let skip = from.saturating_sub(start);
                    let take = to.min(end) - start - skip;
                    out.extend(child.text().chars().skip(skip).take(take));
                }
                (NodeType::DataTag, Attrs::DataTag { label }) => {
                    out.push_str(label);
                }
                _ => {
                    if child.kind().is_block() && !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    if !child.kind().is_atomic() {
                        collect_range_text(child, start + 1, from, to, out);
                    }
                }
            }
        }
        acc = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_shape() {
        let doc = Document::empty();
        assert_eq!(doc.root().child_count(), 1);
        assert_eq!(doc.root().child(0).kind(), NodeType::Paragraph);
        assert_eq!(doc.char_count(), 0);
        assert_eq!(doc.content_size(), 2);
    }

    #[test]
    fn test_seed_is_schema_valid() {
        let doc = Document::seed();
        assert!(doc.root().validate_deep().is_ok());
        assert_eq!(doc.root().child(0).kind(), NodeType::Heading);
    }

    #[test]
    fn test_char_count_ignores_structure() {
        let doc = Document::new(
            Node::element(
                NodeType::Doc,
                Attrs::None,
                vec![
                    Node::paragraph(vec![Node::text_node("abc", MarkSet::empty())]),
                    Node::leaf(NodeType::ChartBlock, Attrs::default_for(NodeType::ChartBlock)),
                    Node::paragraph(vec![Node::text_node("de", MarkSet::empty())]),
                ],
            ),
            0,
        );
        assert_eq!(doc.char_count(), 5);
    }

    #[test]
    fn test_node_at_and_atomic() {
        let doc = Document::new(
            Node::element(
                NodeType::Doc,
                Attrs::None,
                vec![
                    Node::paragraph(vec![Node::text_node("ab", MarkSet::empty())]),
                    Node::leaf(NodeType::ChartBlock, Attrs::default_for(NodeType::ChartBlock)),
                ],
            ),
            0,
        );
        assert_eq!(doc.node_at(0).map(|n| n.kind()), Some(NodeType::Paragraph));
        assert_eq!(doc.node_at(4).map(|n| n.kind()), Some(NodeType::ChartBlock));
        assert!(doc.is_atomic_at(4));
        assert!(!doc.is_atomic_at(0));
    }

    #[test]
    fn test_range_text() {
        let doc = Document::new(
            Node::element(
                NodeType::Doc,
                Attrs::None,
                vec![Node::paragraph(vec![
                    Node::text_node("rate ", MarkSet::empty()),
                    Node::leaf(
                        NodeType::DataTag,
                        Attrs::DataTag {
                            label: "[12.5%]".to_string(),
                        },
                    ),
                ])],
            ),
            0,
        );
        assert_eq!(doc.range_text(1, 7), "rate [12.5%]");
        assert_eq!(doc.range_text(2, 4), "at");
    }
}
