use crate::document::Document;
use crate::selection::Selection;
use crate::transaction::Transaction;

/// One undoable unit: the document/selection pair before the transaction
/// and the pair after it. Snapshots share structure with the live tree, so
/// an entry costs two pointers, and inverting is exact by construction.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub before_doc: Document,
    pub before_sel: Selection,
    pub after_doc: Document,
    pub after_sel: Selection,
}

/// Undo/redo stacks over history entries. Consecutive coalescible
/// transactions within one uninterrupted typing burst merge into a single
/// entry, so rapid typing undoes as a burst rather than per keystroke.
pub struct HistoryManager {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    burst_open: bool,
    max_depth: usize,
}

impl HistoryManager {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            burst_open: false,
            max_depth: max_depth.max(1),
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    #[allow(dead_code)]
    pub fn depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Record a committed transaction. Clears the redo stack; merges into
    /// the top entry instead of pushing when the transaction continues the
    /// current typing burst.
    pub fn record(&mut self, before_doc: &Document, before_sel: Selection, txn: &Transaction) {
        self.redo_stack.clear();
        if txn.coalesce && self.burst_open {
            if let Some(top) = self.undo_stack.last_mut() {
                top.after_doc = txn.doc.clone();
                top.after_sel = txn.selection;
                return;
            }
        }
        self.undo_stack.push(HistoryEntry {
            before_doc: before_doc.clone(),
            before_sel,
            after_doc: txn.doc.clone(),
            after_sel: txn.selection,
        });
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.burst_open = txn.coalesce;
    }

    /// Step back one entry. Returns the document/selection to restore, or
    /// `None` when the stack is empty (a defined no-op, never an error).
    pub fn undo(&mut self) -> Option<(Document, Selection)> {
        self.burst_open = false;
        let entry = self.undo_stack.pop()?;
        let restore = (entry.before_doc.clone(), entry.before_sel);
        self.redo_stack.push(entry);
        Some(restore)
    }

    /// Step forward again. `None` on an empty redo stack.
    pub fn redo(&mut self) -> Option<(Document, Selection)> {
        self.burst_open = false;
        let entry = self.redo_stack.pop()?;
        let restore = (entry.after_doc.clone(), entry.after_sel);
        self.undo_stack.push(entry);
        Some(restore)
    }

    #[allow(dead_code)]
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.burst_open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit_commands::insert_text;
    use crate::schema::MarkSet;

    fn type_char(doc: &Document, sel: Selection, ch: char) -> Transaction {
        insert_text(doc, sel, MarkSet::empty(), &ch.to_string())
            .unwrap_or_else(|e| panic!("insert failed: {e}"))
    }

    #[test]
    fn test_undo_restores_exact_state() {
        let doc = Document::empty();
        let sel = Selection::caret(1);
        let mut history = HistoryManager::new(100);

        let txn = type_char(&doc, sel, 'x');
        history.record(&doc, sel, &txn);

        let (restored_doc, restored_sel) = history.undo().unwrap_or_else(|| panic!("undo"));
        assert_eq!(restored_doc, doc);
        assert_eq!(restored_sel, sel);
        assert!(history.can_redo());
    }

    #[test]
    fn test_undo_empty_stack_is_noop() {
        let mut history = HistoryManager::new(100);
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_typing_burst_coalesces() {
        let doc = Document::empty();
        let mut sel = Selection::caret(1);
        let mut history = HistoryManager::new(100);
        let mut current = doc.clone();

        for ch in ['h', 'e', 'y'] {
            let txn = type_char(&current, sel, ch);
            history.record(&current, sel, &txn);
            sel = txn.selection;
            current = txn.doc;
        }
        // Three keystrokes, one history entry.
        assert_eq!(history.depth(), 1);
        let (restored, _) = history.undo().unwrap_or_else(|| panic!("undo"));
        assert_eq!(restored, doc);
    }

    #[test]
    fn test_undo_interrupts_burst() {
        let doc = Document::empty();
        let sel = Selection::caret(1);
        let mut history = HistoryManager::new(100);

        let txn = type_char(&doc, sel, 'a');
        history.record(&doc, sel, &txn);

        let (u_doc, u_sel) = history.undo().unwrap_or_else(|| panic!("undo"));

        // Typing after an undo starts a fresh burst (and clears redo).
        let txn = type_char(&u_doc, u_sel, 'b');
        history.record(&u_doc, u_sel, &txn);
        assert!(!history.can_redo());
        assert_eq!(history.depth(), 1);
    }

    #[test]
    fn test_depth_cap_evicts_oldest() {
        let doc = Document::empty();
        let mut history = HistoryManager::new(2);
        let mut current = doc.clone();
        let mut sel = Selection::caret(1);

        // Whole words do not coalesce, so nothing merges.
        for word in ["one", "two", "three"] {
            let txn = insert_text(&current, sel, MarkSet::empty(), word)
                .unwrap_or_else(|e| panic!("insert failed: {e}"));
            history.record(&current, sel, &txn);
            sel = txn.selection;
            current = txn.doc;
        }
        assert_eq!(history.depth(), 2);
    }

    #[test]
    fn test_redo_cleared_on_new_record() {
        let doc = Document::empty();
        let sel = Selection::caret(1);
        let mut history = HistoryManager::new(100);

        let txn = type_char(&doc, sel, 'a');
        history.record(&doc, sel, &txn);
        history.undo();
        assert!(history.can_redo());

        let txn = type_char(&doc, sel, 'b');
        history.record(&doc, sel, &txn);
        assert!(!history.can_redo());
    }
}
