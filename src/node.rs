use crate::schema::{Attrs, MarkSet, NodeType};
use crate::transaction::EditError;
use std::rc::Rc;

/// One node of the document tree. Nodes are immutable after construction and
/// shared via `Rc`: an edit rebuilds only the spine from the root down to the
/// touched node and reuses every untouched subtree.
///
/// Sizes follow the flattened token stream: a text node is one unit per
/// `char`, an atomic node is exactly one unit, and every other node is its
/// content plus an opening and a closing boundary token.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: NodeType,
    attrs: Attrs,
    marks: MarkSet,
    text: String,
    children: Vec<Rc<Node>>,
    size: usize,
}

impl Node {
    pub fn text_node(text: impl Into<String>, marks: MarkSet) -> Rc<Node> {
        let text = text.into();
        let size = text.chars().count();
        Rc::new(Node {
            kind: NodeType::Text,
            attrs: Attrs::None,
            marks,
            text,
            children: Vec::new(),
            size,
        })
    }

    pub fn element(kind: NodeType, attrs: Attrs, children: Vec<Rc<Node>>) -> Rc<Node> {
        let size = if kind.is_atomic() {
            1
        } else {
            children.iter().map(|c| c.size).sum::<usize>() + 2
        };
        Rc::new(Node {
            kind,
            attrs,
            marks: MarkSet::empty(),
            text: String::new(),
            children,
            size,
        })
    }

    pub fn leaf(kind: NodeType, attrs: Attrs) -> Rc<Node> {
        Node::element(kind, attrs, Vec::new())
    }

    pub fn paragraph(children: Vec<Rc<Node>>) -> Rc<Node> {
        Node::element(
            NodeType::Paragraph,
            Attrs::default_for(NodeType::Paragraph),
            children,
        )
    }

    pub fn empty_paragraph() -> Rc<Node> {
        Node::paragraph(Vec::new())
    }

    pub fn kind(&self) -> NodeType {
        self.kind
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn marks(&self) -> MarkSet {
        self.marks
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[Rc<Node>] {
        &self.children
    }

    pub fn child(&self, index: usize) -> &Rc<Node> {
        &self.children[index]
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Size of the content between the opening and closing boundary tokens.
    pub fn content_size(&self) -> usize {
        match self.kind {
            NodeType::Text => self.size,
            _ if self.kind.is_atomic() => 0,
            _ => self.size - 2,
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeType::Text
    }

    pub fn char_count(&self) -> usize {
        if self.is_text() {
            self.size
        } else {
            self.children.iter().map(|c| c.char_count()).sum()
        }
    }

    /// Concatenated text of the subtree; atomic inline nodes contribute
    /// their label.
    pub fn inline_text(&self) -> String {
        match (self.kind, &self.attrs) {
            (NodeType::Text, _) => self.text.clone(),
            (NodeType::DataTag, Attrs::DataTag { label }) => label.clone(),
            _ => {
                let mut out = String::new();
                for child in &self.children {
                    out.push_str(&child.inline_text());
                }
                out
            }
        }
    }

    pub fn with_attrs(&self, attrs: Attrs) -> Rc<Node> {
        if self.is_text() {
            Node::text_node(self.text.clone(), self.marks)
        } else {
            Node::element(self.kind, attrs, self.children.clone())
        }
    }

    pub fn with_kind(&self, kind: NodeType, attrs: Attrs) -> Rc<Node> {
        Node::element(kind, attrs, self.children.clone())
    }

    pub fn with_marks(&self, marks: MarkSet) -> Rc<Node> {
        Node::text_node(self.text.clone(), marks)
    }

    /// Shallow structural validation: children allowed by the content rules,
    /// required containers non-empty.
    pub fn validate_shallow(&self) -> Result<(), String> {
        crate::schema::validate_attrs(self.kind, &self.attrs)?;
        if self.kind.requires_content() && self.children.is_empty() {
            return Err(format!("{} must not be empty", self.kind.name()));
        }
        for child in &self.children {
            if !self.kind.valid_child(child.kind) {
                return Err(format!(
                    "{} is not a valid child of {}",
                    child.kind.name(),
                    self.kind.name()
                ));
            }
        }
        if self.is_text() && self.text.is_empty() {
            return Err("empty text node".to_string());
        }
        Ok(())
    }

    pub fn validate_deep(&self) -> Result<(), String> {
        self.validate_shallow()?;
        for child in &self.children {
            child.validate_deep()?;
        }
        Ok(())
    }
}

/// Rebuild the spine from `node` down along `path` (child indices), applying
/// `f` to the node at the end of the path. Everything off the path is shared.
pub fn update_at<F>(node: &Rc<Node>, path: &[usize], f: F) -> Result<Rc<Node>, EditError>
where
    F: FnOnce(&Rc<Node>) -> Result<Rc<Node>, EditError>,
{
    match path.split_first() {
        None => f(node),
        Some((&index, rest)) => {
            if index >= node.child_count() {
                return Err(EditError::SchemaViolation(
                    "path points past end of children".to_string(),
                ));
            }
            let mut children = node.children().to_vec();
            children[index] = update_at(&children[index], rest, f)?;
            Ok(Node::element(node.kind(), node.attrs().clone(), children))
        }
    }
}

/// Split a run of inline children at a content offset, cutting a text node
/// in two if the offset falls inside one.
pub fn split_inline(children: &[Rc<Node>], offset: usize) -> (Vec<Rc<Node>>, Vec<Rc<Node>>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut acc = 0usize;
    for child in children {
        let end = acc + child.size();
        if end <= offset {
            before.push(child.clone());
        } else if acc >= offset {
            after.push(child.clone());
        } else {
            // Offset inside this child: only text nodes have interior
            // positions, so a split here is a char split.
            let cut = offset - acc;
            let head: String = child.text().chars().take(cut).collect();
            let tail: String = child.text().chars().skip(cut).collect();
            if !head.is_empty() {
                before.push(Node::text_node(head, child.marks()));
            }
            if !tail.is_empty() {
                after.push(Node::text_node(tail, child.marks()));
            }
        }
        acc = end;
    }
    (before, after)
}

/// Join adjacent text nodes that carry the same mark set. Keeps the inline
/// run in canonical form so repeated edits do not fragment it.
pub fn merge_inline(children: Vec<Rc<Node>>) -> Vec<Rc<Node>> {
    let mut out: Vec<Rc<Node>> = Vec::with_capacity(children.len());
    for child in children {
        if child.is_text() && child.text().is_empty() {
            continue;
        }
        if let Some(last) = out.last() {
            if last.is_text() && child.is_text() && last.marks() == child.marks() {
                let merged = format!("{}{}", last.text(), child.text());
                let marks = last.marks();
                out.pop();
                out.push(Node::text_node(merged, marks));
                continue;
            }
        }
        out.push(child);
    }
    out
}

/// Replace the inline range `[from, to)` (content offsets) with `content`.
pub fn splice_inline(
    children: &[Rc<Node>],
    from: usize,
    to: usize,
    content: Vec<Rc<Node>>,
) -> Vec<Rc<Node>> {
    let (before, _) = split_inline(children, from);
    let (_, after) = split_inline(children, to);
    let mut out = before;
    out.extend(content);
    out.extend(after);
    merge_inline(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Mark;

    fn plain(text: &str) -> Rc<Node> {
        Node::text_node(text, MarkSet::empty())
    }

    #[test]
    fn test_sizes() {
        let text = plain("hello");
        assert_eq!(text.size(), 5);

        let tag = Node::leaf(
            NodeType::DataTag,
            Attrs::DataTag {
                label: "[12.5%]".to_string(),
            },
        );
        assert_eq!(tag.size(), 1);

        let para = Node::paragraph(vec![text, tag]);
        assert_eq!(para.content_size(), 6);
        assert_eq!(para.size(), 8);

        let chart = Node::leaf(NodeType::ChartBlock, Attrs::default_for(NodeType::ChartBlock));
        assert_eq!(chart.size(), 1);

        let doc = Node::element(NodeType::Doc, Attrs::None, vec![para, chart]);
        assert_eq!(doc.content_size(), 9);
    }

    #[test]
    fn test_split_inline_mid_text() {
        let children = vec![plain("hello"), plain("world")];
        let (before, after) = split_inline(&children, 7);
        assert_eq!(before.len(), 2);
        assert_eq!(before[1].text(), "wo");
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].text(), "rld");
    }

    #[test]
    fn test_splice_inline_replaces_range() {
        let children = vec![plain("hello world")];
        let spliced = splice_inline(&children, 6, 11, vec![plain("there")]);
        assert_eq!(spliced.len(), 1);
        assert_eq!(spliced[0].text(), "hello there");
    }

    #[test]
    fn test_merge_inline_respects_marks() {
        let bold = MarkSet::empty().with(Mark::Bold);
        let merged = merge_inline(vec![
            plain("a"),
            plain("b"),
            Node::text_node("c", bold),
            Node::text_node("d", bold),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].text(), "ab");
        assert_eq!(merged[1].text(), "cd");
        assert!(merged[1].marks().contains(Mark::Bold));
    }

    #[test]
    fn test_update_at_shares_siblings() {
        let a = Node::paragraph(vec![plain("a")]);
        let b = Node::paragraph(vec![plain("b")]);
        let doc = Node::element(NodeType::Doc, Attrs::None, vec![a, b.clone()]);
        let updated = update_at(&doc, &[0], |p| {
            Ok(Node::paragraph(splice_inline(p.children(), 0, 0, vec![plain("x")])))
        })
        .unwrap();
        assert_eq!(updated.child(0).inline_text(), "xa");
        // The untouched sibling is the same allocation.
        assert!(Rc::ptr_eq(updated.child(1), &b));
    }

    #[test]
    fn test_validate_rejects_bad_child() {
        let bad = Node::element(
            NodeType::Paragraph,
            Attrs::default_for(NodeType::Paragraph),
            vec![Node::empty_paragraph()],
        );
        assert!(bad.validate_shallow().is_err());
    }
}
