//! The editor facade: sole owner of the live document. Hosts feed it
//! commands; it routes them through the transaction engine, records the
//! results in history, and hands out immutable snapshots. One command is
//! processed completely before the next is accepted, so no locking exists
//! anywhere in the engine.

use crate::commands::Command;
use crate::document::Document;
use crate::edit_commands;
use crate::position::{chart_positions, resolve};
use crate::schema::{Attrs, Mark, MarkSet, NodeType};
use crate::selection::{Motion, Selection};
use crate::table_commands;
use crate::transaction::{EditError, Transaction};
use crate::undo::HistoryManager;
use std::rc::Rc;

pub struct Editor {
    doc: Document,
    selection: Selection,
    history: HistoryManager,
    stored_marks: Option<MarkSet>,
    coalesce_enabled: bool,
    version_counter: u64,
}

impl Editor {
    pub fn new(doc: Document, history_depth: usize, coalesce_enabled: bool) -> Editor {
        let selection = Selection::caret(doc.start_position());
        Editor {
            doc,
            selection,
            history: HistoryManager::new(history_depth),
            stored_marks: None,
            coalesce_enabled,
            version_counter: 0,
        }
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn char_count(&self) -> usize {
        self.doc.char_count()
    }

    #[allow(dead_code)]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[allow(dead_code)]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Marks that would apply to newly typed text: an explicit toggle at a
    /// collapsed cursor wins, otherwise the marks of the character before
    /// the cursor.
    pub fn active_marks(&self) -> MarkSet {
        if let Some(marks) = self.stored_marks {
            return marks;
        }
        self.marks_at_cursor()
    }

    fn marks_at_cursor(&self) -> MarkSet {
        let resolved = resolve(self.doc.root(), self.selection.head);
        if !resolved.in_textblock() {
            return MarkSet::empty();
        }
        let parent = resolved.parent().clone();
        let offset = resolved.offset();
        let mut acc = 0usize;
        for child in parent.children() {
            let end = acc + child.size();
            // The character just before the cursor sets the tone.
            if child.is_text() && offset > acc && offset <= end {
                return child.marks();
            }
            acc = end;
        }
        MarkSet::empty()
    }

    /// Move the cursor. Pure selection changes are not transactions and
    /// leave history untouched, but they do end any typing burst.
    pub fn move_cursor(&mut self, motion: Motion, extend: bool) {
        self.selection = self.selection.moved(&self.doc, motion, extend);
        self.stored_marks = None;
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.resolve(&self.doc);
        self.stored_marks = None;
    }

    /// Dispatch one host command. On success the new document and selection
    /// are committed and recorded; on error nothing observable changes.
    pub fn dispatch(&mut self, command: &Command) -> Result<(), EditError> {
        match command {
            Command::Undo => {
                if let Some((doc, sel)) = self.history.undo() {
                    self.install(doc, sel);
                }
                self.stored_marks = None;
                Ok(())
            }
            Command::Redo => {
                if let Some((doc, sel)) = self.history.redo() {
                    self.install(doc, sel);
                }
                self.stored_marks = None;
                Ok(())
            }
            Command::ToggleMark(mark) if self.selection.is_collapsed() => {
                self.stored_marks = Some(self.active_marks().toggled(*mark));
                Ok(())
            }
            _ => {
                let txn = self.build_transaction(command)?;
                self.commit(txn);
                Ok(())
            }
        }
    }

    fn build_transaction(&self, command: &Command) -> Result<Transaction, EditError> {
        let doc = &self.doc;
        let sel = self.selection;
        match command {
            Command::InsertText(text) => {
                edit_commands::insert_text(doc, sel, self.active_marks(), text)
            }
            Command::InsertDataTag { label } => edit_commands::insert_data_tag(doc, sel, label),
            Command::InsertChart => {
                edit_commands::insert_chart(doc, sel, Attrs::default_for(NodeType::ChartBlock))
            }
            Command::InsertTable {
                rows,
                cols,
                with_header_row,
            } => edit_commands::insert_table(doc, sel, *rows, *cols, *with_header_row),
            Command::ToggleMark(mark) => edit_commands::toggle_mark(doc, sel, *mark),
            Command::ToggleHeading { level } => {
                if self.all_selected_blocks_are_heading(*level) {
                    edit_commands::set_block_type(
                        doc,
                        sel,
                        NodeType::Paragraph,
                        Attrs::default_for(NodeType::Paragraph),
                    )
                } else {
                    edit_commands::set_block_type(
                        doc,
                        sel,
                        NodeType::Heading,
                        Attrs::Heading {
                            level: *level,
                            align: crate::schema::Alignment::Left,
                        },
                    )
                }
            }
            Command::SetParagraph => edit_commands::set_block_type(
                doc,
                sel,
                NodeType::Paragraph,
                Attrs::default_for(NodeType::Paragraph),
            ),
            Command::SetAlignment(align) => edit_commands::set_alignment(doc, sel, *align),
            Command::ToggleBulletList => edit_commands::toggle_bullet_list(doc, sel),
            Command::SplitBlock => edit_commands::split_block(doc, sel),
            Command::DeleteBackward => edit_commands::delete_backward(doc, sel),
            Command::SetChartSettings {
                pos,
                title,
                period_count,
            } => edit_commands::set_node_attrs(
                doc,
                sel,
                *pos,
                Attrs::Chart {
                    title: title.clone(),
                    period_count: *period_count,
                },
            ),
            Command::InsertRow { before } => table_commands::insert_row(doc, sel, *before),
            Command::InsertColumn { before } => table_commands::insert_column(doc, sel, *before),
            Command::DeleteRow => table_commands::delete_row(doc, sel),
            Command::DeleteColumn => table_commands::delete_column(doc, sel),
            Command::MergeCells => table_commands::merge_cells(doc, sel),
            Command::SplitCell => table_commands::split_cell(doc, sel),
            Command::DeleteTable => table_commands::delete_table(doc, sel),
            Command::Undo | Command::Redo => unreachable!("handled in dispatch"),
        }
    }

    fn commit(&mut self, mut txn: Transaction) {
        debug_assert_eq!(txn.base_version, self.doc.version());
        if !self.coalesce_enabled {
            txn.coalesce = false;
        }
        self.history.record(&self.doc, self.selection, &txn);
        let keep_marks = txn.coalesce;
        self.version_counter += 1;
        self.doc = txn.doc.with_root(txn.doc.root().clone(), self.version_counter);
        self.selection = txn.selection;
        if !keep_marks {
            self.stored_marks = None;
        }
    }

    /// Install a document restored by undo/redo under a fresh version
    /// number: the counter stays monotonic even when content goes back.
    fn install(&mut self, doc: Document, sel: Selection) {
        self.version_counter += 1;
        self.doc = doc.with_root(doc.root().clone(), self.version_counter);
        self.selection = sel.resolve(&self.doc);
    }

    fn all_selected_blocks_are_heading(&self, level: u8) -> bool {
        let blocks = crate::position::textblocks_in_range(
            self.doc.root(),
            self.selection.from(),
            self.selection.to(),
        );
        !blocks.is_empty()
            && blocks.iter().all(|(_, block)| {
                matches!(block.attrs(), Attrs::Heading { level: l, .. } if *l == level)
            })
    }

    /// The chart nearest the cursor: the first one at or after it, else the
    /// last one before it. Hosts with precise pointing pass positions
    /// straight to `SetChartSettings`.
    pub fn nearest_chart(&self) -> Option<(usize, Rc<crate::node::Node>)> {
        let charts = chart_positions(self.doc.root());
        if charts.is_empty() {
            return None;
        }
        let head = self.selection.head;
        charts
            .iter()
            .find(|(pos, _)| *pos >= head)
            .or_else(|| charts.last())
            .cloned()
    }

    /// True when every character in the selection carries the mark (used
    /// for toolbar state).
    pub fn mark_active(&self, mark: Mark) -> bool {
        if self.selection.is_collapsed() {
            self.active_marks().contains(mark)
        } else {
            // A range is "active" when toggling it would remove the mark.
            let doc = &self.doc;
            crate::position::textblocks_in_range(doc.root(), self.selection.from(), self.selection.to())
                .iter()
                .all(|(content_start, block)| {
                    let mut acc = *content_start;
                    for child in block.children() {
                        let end = acc + child.size();
                        if child.is_text()
                            && acc < self.selection.to()
                            && end > self.selection.from()
                            && !child.marks().contains(mark)
                        {
                            return false;
                        }
                        acc = end;
                    }
                    true
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> Editor {
        Editor::new(Document::empty(), 100, true)
    }

    fn type_str(ed: &mut Editor, text: &str) {
        for ch in text.chars() {
            ed.dispatch(&Command::InsertText(ch.to_string()))
                .unwrap_or_else(|e| panic!("type failed: {e}"));
        }
    }

    #[test]
    fn test_typing_and_char_count() {
        let mut ed = editor();
        type_str(&mut ed, "hello");
        assert_eq!(ed.char_count(), 5);
        assert_eq!(ed.doc().root().child(0).inline_text(), "hello");
    }

    #[test]
    fn test_undo_redo_inverse_law() {
        let mut ed = editor();
        let original = ed.doc().clone();
        let original_sel = ed.selection();

        // A mixed burst of transactions: words, a split, a chart, a tag.
        ed.dispatch(&Command::InsertText("alpha".to_string())).unwrap_or_else(|e| panic!("{e}"));
        ed.dispatch(&Command::SplitBlock).unwrap_or_else(|e| panic!("{e}"));
        ed.dispatch(&Command::InsertText("beta".to_string())).unwrap_or_else(|e| panic!("{e}"));
        ed.dispatch(&Command::InsertChart).unwrap_or_else(|e| panic!("{e}"));
        ed.dispatch(&Command::InsertDataTag {
            label: "[9%]".to_string(),
        })
        .unwrap_or_else(|e| panic!("{e}"));
        let final_doc = ed.doc().clone();
        let final_sel = ed.selection();

        for _ in 0..5 {
            ed.dispatch(&Command::Undo).unwrap_or_else(|e| panic!("{e}"));
        }
        assert_eq!(*ed.doc(), original);
        assert_eq!(ed.selection(), original_sel);

        for _ in 0..5 {
            ed.dispatch(&Command::Redo).unwrap_or_else(|e| panic!("{e}"));
        }
        assert_eq!(*ed.doc(), final_doc);
        assert_eq!(ed.selection(), final_sel);
    }

    #[test]
    fn test_undo_on_empty_history_is_noop() {
        let mut ed = editor();
        let doc = ed.doc().clone();
        let sel = ed.selection();
        ed.dispatch(&Command::Undo).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(*ed.doc(), doc);
        assert_eq!(ed.selection(), sel);
    }

    #[test]
    fn test_version_stays_monotonic_through_undo() {
        let mut ed = editor();
        type_str(&mut ed, "a");
        let v1 = ed.doc().version();
        ed.dispatch(&Command::Undo).unwrap_or_else(|e| panic!("{e}"));
        assert!(ed.doc().version() > v1);
    }

    #[test]
    fn test_typing_burst_undoes_as_one() {
        let mut ed = editor();
        type_str(&mut ed, "hey");
        ed.dispatch(&Command::Undo).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(ed.char_count(), 0);
    }

    #[test]
    fn test_stored_marks_apply_to_typed_text() {
        let mut ed = editor();
        ed.dispatch(&Command::ToggleMark(Mark::Bold)).unwrap_or_else(|e| panic!("{e}"));
        type_str(&mut ed, "hi");
        let text = ed.doc().root().child(0).child(0);
        assert!(text.marks().contains(Mark::Bold));
    }

    #[test]
    fn test_toggle_heading_reverts() {
        let mut ed = editor();
        type_str(&mut ed, "title");
        ed.dispatch(&Command::ToggleHeading { level: 1 }).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(ed.doc().root().child(0).kind(), NodeType::Heading);
        ed.dispatch(&Command::ToggleHeading { level: 1 }).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(ed.doc().root().child(0).kind(), NodeType::Paragraph);
    }

    #[test]
    fn test_rejected_command_changes_nothing() {
        let mut ed = editor();
        let doc = ed.doc().clone();
        let err = ed.dispatch(&Command::DeleteRow).unwrap_err();
        assert!(matches!(err, EditError::CommandRejected(_)));
        assert_eq!(*ed.doc(), doc);
    }

    #[test]
    fn test_chart_settings_round_trip() {
        let mut ed = editor();
        ed.dispatch(&Command::InsertChart).unwrap_or_else(|e| panic!("{e}"));
        let (pos, _) = ed.nearest_chart().unwrap_or_else(|| panic!("no chart"));
        ed.dispatch(&Command::SetChartSettings {
            pos,
            title: "Quarterly".to_string(),
            period_count: 9,
        })
        .unwrap_or_else(|e| panic!("{e}"));
        let (_, chart) = ed.nearest_chart().unwrap_or_else(|| panic!("no chart"));
        match chart.attrs() {
            Attrs::Chart {
                title,
                period_count,
            } => {
                assert_eq!(title, "Quarterly");
                assert_eq!(*period_count, 9);
            }
            other => panic!("unexpected attrs: {other:?}"),
        }
    }

    #[test]
    fn test_table_flow_end_to_end() {
        let mut ed = editor();
        ed.dispatch(&Command::InsertTable {
            rows: 2,
            cols: 2,
            with_header_row: true,
        })
        .unwrap_or_else(|e| panic!("{e}"));
        type_str(&mut ed, "cell");
        ed.dispatch(&Command::InsertRow { before: false }).unwrap_or_else(|e| panic!("{e}"));
        ed.dispatch(&Command::InsertColumn { before: false }).unwrap_or_else(|e| panic!("{e}"));
        let table = ed.doc().root().child(0);
        assert_eq!(table.kind(), NodeType::Table);
        assert_eq!(table.child_count(), 3);
        ed.dispatch(&Command::DeleteTable).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(ed.doc().root().child(0).kind(), NodeType::Paragraph);
    }
}
