//! JSON tree (de)serialization for host handoff. Encoding is canonical:
//! attrs are always present for types that define them, marks appear sorted
//! and only when non-empty, content only when non-empty. Decoding never
//! aborts: a malformed node is replaced per-node with a safe fallback and
//! the load continues, collecting warnings for the status line.

use crate::document::Document;
use crate::node::Node;
use crate::schema::{
    Alignment, Attrs, Mark, MarkSet, NodeType, MAX_CHART_PERIODS, MAX_HEADING_LEVEL,
    MIN_CHART_PERIODS, MIN_HEADING_LEVEL,
};
use crate::table_commands::GridMap;
use crate::transaction::EditError;
use serde_json::{json, Map, Value};
use std::io;
use std::path::Path;
use std::rc::Rc;

pub struct LoadReport {
    pub doc: Document,
    pub warnings: Vec<String>,
}

pub fn document_to_value(doc: &Document) -> Value {
    node_to_value(doc.root())
}

pub fn node_to_value(node: &Rc<Node>) -> Value {
    if node.is_text() {
        let mut obj = Map::new();
        obj.insert("type".to_string(), json!("text"));
        obj.insert("text".to_string(), json!(node.text()));
        if !node.marks().is_empty() {
            let marks: Vec<Value> = node.marks().iter().map(|m| json!(m.name())).collect();
            obj.insert("marks".to_string(), Value::Array(marks));
        }
        return Value::Object(obj);
    }
    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(node.kind().name()));
    if let Some(attrs) = attrs_to_value(node.attrs()) {
        obj.insert("attrs".to_string(), attrs);
    }
    if node.child_count() > 0 {
        let content: Vec<Value> = node.children().iter().map(node_to_value).collect();
        obj.insert("content".to_string(), Value::Array(content));
    }
    Value::Object(obj)
}

fn attrs_to_value(attrs: &Attrs) -> Option<Value> {
    match attrs {
        Attrs::None => None,
        Attrs::Heading { level, align } => Some(json!({
            "level": level,
            "align": align.name(),
        })),
        Attrs::Paragraph { align } => Some(json!({ "align": align.name() })),
        Attrs::Chart {
            title,
            period_count,
        } => Some(json!({
            "title": title,
            "periodCount": period_count,
        })),
        Attrs::DataTag { label } => Some(json!({ "label": label })),
        Attrs::Cell { row_span, col_span } => Some(json!({
            "rowSpan": row_span,
            "colSpan": col_span,
        })),
    }
}

/// Decode a document tree. Whatever happens, a usable document comes back.
pub fn document_from_value(value: &Value) -> LoadReport {
    let mut warnings = Vec::new();
    let obj = match value.as_object() {
        Some(obj) if obj.get("type").and_then(Value::as_str) == Some("doc") => obj,
        _ => {
            warnings.push(
                EditError::MalformedInput("root is not a doc node; starting empty".to_string())
                    .to_string(),
            );
            return LoadReport {
                doc: Document::empty(),
                warnings,
            };
        }
    };
    let mut blocks = Vec::new();
    if let Some(content) = obj.get("content").and_then(Value::as_array) {
        for child in content {
            if let Some(block) = decode_block(child, NodeType::Doc, &mut warnings) {
                blocks.push(block);
            }
        }
    }
    if blocks.is_empty() {
        blocks.push(Node::empty_paragraph());
    }
    LoadReport {
        doc: Document::new(Node::element(NodeType::Doc, Attrs::None, blocks), 0),
        warnings,
    }
}

fn type_of(value: &Value) -> Option<NodeType> {
    value
        .as_object()
        .and_then(|o| o.get("type"))
        .and_then(Value::as_str)
        .and_then(NodeType::from_name)
}

/// Decode one block-context child. Unknown or misplaced nodes fall back to
/// a paragraph holding whatever inline content was salvageable.
fn decode_block(value: &Value, parent: NodeType, warnings: &mut Vec<String>) -> Option<Rc<Node>> {
    let kind = match type_of(value) {
        Some(kind) if parent.valid_child(kind) => kind,
        Some(kind) => {
            warnings.push(format!(
                "{} is not allowed inside {}; replaced with a paragraph",
                kind.name(),
                parent.name()
            ));
            return Some(fallback_paragraph(value, warnings));
        }
        None => {
            warnings.push("unrecognized block node; replaced with a paragraph".to_string());
            return Some(fallback_paragraph(value, warnings));
        }
    };
    match kind {
        NodeType::Paragraph => Some(Node::element(
            NodeType::Paragraph,
            Attrs::Paragraph {
                align: decode_align(value),
            },
            decode_inline_content(value, warnings),
        )),
        NodeType::Heading => {
            let level = match attr_u64(value, "level") {
                Some(level)
                    if (MIN_HEADING_LEVEL as u64..=MAX_HEADING_LEVEL as u64).contains(&level) =>
                {
                    level as u8
                }
                Some(level) => {
                    warnings.push(format!("heading level {level} out of range; using 2"));
                    2
                }
                None => 2,
            };
            Some(Node::element(
                NodeType::Heading,
                Attrs::Heading {
                    level,
                    align: decode_align(value),
                },
                decode_inline_content(value, warnings),
            ))
        }
        NodeType::ChartBlock => {
            let title = attr_str(value, "title")
                .unwrap_or_else(|| match Attrs::default_for(NodeType::ChartBlock) {
                    Attrs::Chart { title, .. } => title,
                    _ => String::new(),
                });
            let period_count = match attr_u64(value, "periodCount") {
                Some(n) => {
                    let clamped = (n as u32).clamp(MIN_CHART_PERIODS, MAX_CHART_PERIODS);
                    if clamped as u64 != n {
                        warnings.push(format!("chart period count {n} clamped to {clamped}"));
                    }
                    clamped
                }
                None => 5,
            };
            Some(Node::leaf(
                NodeType::ChartBlock,
                Attrs::Chart {
                    title,
                    period_count,
                },
            ))
        }
        NodeType::BulletList => {
            let mut items = Vec::new();
            for child in content_array(value) {
                if type_of(child) == Some(NodeType::ListItem) {
                    items.push(decode_list_item(child, warnings));
                } else {
                    warnings.push("list child is not a list item; dropped".to_string());
                }
            }
            if items.is_empty() {
                warnings.push("empty bullet list dropped".to_string());
                return None;
            }
            Some(Node::element(NodeType::BulletList, Attrs::None, items))
        }
        NodeType::Table => decode_table(value, warnings),
        other => {
            warnings.push(format!(
                "{} is not usable here; replaced with a paragraph",
                other.name()
            ));
            Some(fallback_paragraph(value, warnings))
        }
    }
}

fn decode_list_item(value: &Value, warnings: &mut Vec<String>) -> Rc<Node> {
    let mut blocks = Vec::new();
    for child in content_array(value) {
        if let Some(block) = decode_block(child, NodeType::ListItem, warnings) {
            blocks.push(block);
        }
    }
    if blocks.is_empty() {
        blocks.push(Node::empty_paragraph());
    }
    Node::element(NodeType::ListItem, Attrs::None, blocks)
}

fn decode_table(value: &Value, warnings: &mut Vec<String>) -> Option<Rc<Node>> {
    let mut rows = Vec::new();
    for row_value in content_array(value) {
        if type_of(row_value) != Some(NodeType::TableRow) {
            warnings.push("table child is not a row; dropped".to_string());
            continue;
        }
        let mut cells = Vec::new();
        for cell_value in content_array(row_value) {
            let kind = match type_of(cell_value) {
                Some(kind) if kind.is_cell() => kind,
                _ => {
                    warnings.push("row child is not a cell; dropped".to_string());
                    continue;
                }
            };
            let row_span = attr_u64(cell_value, "rowSpan").unwrap_or(1).max(1) as usize;
            let col_span = attr_u64(cell_value, "colSpan").unwrap_or(1).max(1) as usize;
            let mut blocks = Vec::new();
            for child in content_array(cell_value) {
                if let Some(block) = decode_block(child, kind, warnings) {
                    blocks.push(block);
                }
            }
            if blocks.is_empty() {
                blocks.push(Node::empty_paragraph());
            }
            cells.push(Node::element(
                kind,
                Attrs::Cell { row_span, col_span },
                blocks,
            ));
        }
        rows.push(cells);
    }
    if rows.iter().all(|r| r.is_empty()) {
        warnings.push("table with no cells dropped".to_string());
        return None;
    }

    let table = Node::element(
        NodeType::Table,
        Attrs::None,
        rows.iter()
            .map(|cells| Node::element(NodeType::TableRow, Attrs::None, cells.clone()))
            .collect(),
    );
    if GridMap::build(&table).is_ok() {
        return Some(table);
    }

    // The grid is broken (ragged rows, bad spans): rebuild it as a plain
    // rectangular grid of unit cells, padding short rows.
    warnings.push("table grid was not rectangular; repaired".to_string());
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(1);
    let repaired: Vec<Rc<Node>> = rows
        .into_iter()
        .map(|cells| {
            let mut unit_cells: Vec<Rc<Node>> = cells
                .into_iter()
                .map(|cell| {
                    Node::element(
                        cell.kind(),
                        Attrs::Cell {
                            row_span: 1,
                            col_span: 1,
                        },
                        cell.children().to_vec(),
                    )
                })
                .collect();
            while unit_cells.len() < width {
                unit_cells.push(Node::element(
                    NodeType::TableCell,
                    Attrs::Cell {
                        row_span: 1,
                        col_span: 1,
                    },
                    vec![Node::empty_paragraph()],
                ));
            }
            Node::element(NodeType::TableRow, Attrs::None, unit_cells)
        })
        .collect();
    Some(Node::element(NodeType::Table, Attrs::None, repaired))
}

fn decode_inline_content(value: &Value, warnings: &mut Vec<String>) -> Vec<Rc<Node>> {
    let mut out = Vec::new();
    for child in content_array(value) {
        match type_of(child) {
            Some(NodeType::Text) => {
                let text = child
                    .as_object()
                    .and_then(|o| o.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if text.is_empty() {
                    warnings.push("empty text node dropped".to_string());
                    continue;
                }
                out.push(Node::text_node(text, decode_marks(child, warnings)));
            }
            Some(NodeType::DataTag) => match attr_str(child, "label") {
                Some(label) if !label.is_empty() => {
                    out.push(Node::leaf(NodeType::DataTag, Attrs::DataTag { label }));
                }
                _ => {
                    warnings.push("data tag without a label dropped".to_string());
                }
            },
            _ => {
                // Salvage any text payload from an unknown inline node.
                let text = child
                    .as_object()
                    .and_then(|o| o.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if text.is_empty() {
                    warnings.push("unrecognized inline node dropped".to_string());
                } else {
                    warnings.push("unrecognized inline node kept as plain text".to_string());
                    out.push(Node::text_node(text, MarkSet::empty()));
                }
            }
        }
    }
    crate::node::merge_inline(out)
}

fn decode_marks(value: &Value, warnings: &mut Vec<String>) -> MarkSet {
    let mut set = MarkSet::empty();
    if let Some(marks) = value.as_object().and_then(|o| o.get("marks")).and_then(Value::as_array) {
        for mark in marks {
            match mark.as_str().and_then(Mark::from_name) {
                Some(mark) => set = set.with(mark),
                None => warnings.push(format!("unknown mark {mark} dropped")),
            }
        }
    }
    set
}

fn fallback_paragraph(value: &Value, warnings: &mut Vec<String>) -> Rc<Node> {
    Node::paragraph(decode_inline_content(value, warnings))
}

fn decode_align(value: &Value) -> Alignment {
    attr_str(value, "align")
        .and_then(|s| Alignment::from_name(&s))
        .unwrap_or_default()
}

fn content_array(value: &Value) -> impl Iterator<Item = &Value> {
    value
        .as_object()
        .and_then(|o| o.get("content"))
        .and_then(Value::as_array)
        .map(|a| a.iter())
        .unwrap_or_default()
}

fn attrs_obj(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object()?.get("attrs")?.as_object()
}

fn attr_str(value: &Value, key: &str) -> Option<String> {
    attrs_obj(value)?.get(key)?.as_str().map(str::to_string)
}

fn attr_u64(value: &Value, key: &str) -> Option<u64> {
    attrs_obj(value)?.get(key)?.as_u64()
}

pub fn save_to_file(doc: &Document, path: &Path) -> io::Result<usize> {
    let value = document_to_value(doc);
    let content = serde_json::to_string_pretty(&value).map_err(io::Error::other)?;
    let byte_count = content.len();
    std::fs::write(path, content)?;
    Ok(byte_count)
}

pub fn load_from_file(path: &Path) -> io::Result<LoadReport> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(LoadReport {
            doc: Document::empty(),
            warnings: Vec::new(),
        });
    }
    match serde_json::from_str::<Value>(&content) {
        Ok(value) => Ok(document_from_value(&value)),
        Err(e) => Ok(LoadReport {
            doc: Document::empty(),
            warnings: vec![
                EditError::MalformedInput(format!("could not parse document: {e}")).to_string(),
            ],
        }),
    }
}
