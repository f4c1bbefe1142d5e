use crate::document::Document;
use crate::position::textblock_ranges;
use crate::transaction::{map_pos, MapEntry};

/// A pair of positions over the document; collapsed means a plain cursor.
/// Neither end may rest inside an atomic node; `resolve` guarantees both
/// ends sit at valid textblock boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    Up,
    Down,
    LineStart,
    LineEnd,
    DocStart,
    DocEnd,
}

impl Selection {
    pub fn caret(pos: usize) -> Selection {
        Selection {
            anchor: pos,
            head: pos,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    /// Snap both ends to valid cursor positions in `doc`.
    pub fn resolve(&self, doc: &Document) -> Selection {
        Selection {
            anchor: doc.resolve_cursor(self.anchor),
            head: doc.resolve_cursor(self.head),
        }
    }

    /// Re-anchor this selection after the structural edits of a
    /// transaction shifted positions around it (feed it the transaction's
    /// `maps`).
    #[allow(dead_code)]
    pub fn map_through(&self, entries: &[MapEntry]) -> Selection {
        Selection {
            anchor: map_pos(self.anchor, entries),
            head: map_pos(self.head, entries),
        }
    }

    /// Move the head (and, unless extending, the anchor). Horizontal moves
    /// skip atomic inline nodes as single units and hop across block
    /// boundaries; vertical moves jump between textblocks keeping the
    /// offset when possible.
    pub fn moved(&self, doc: &Document, motion: Motion, extend: bool) -> Selection {
        let ranges = textblock_ranges(doc.root());
        if ranges.is_empty() {
            return *self;
        }
        let head = self.head;
        let current = range_index(&ranges, head);
        let new_head = match motion {
            Motion::Left => {
                if !extend && !self.is_collapsed() {
                    self.from()
                } else if head > ranges[current].0 {
                    head - 1
                } else if current > 0 {
                    ranges[current - 1].1
                } else {
                    head
                }
            }
            Motion::Right => {
                if !extend && !self.is_collapsed() {
                    self.to()
                } else if head < ranges[current].1 {
                    head + 1
                } else if current + 1 < ranges.len() {
                    ranges[current + 1].0
                } else {
                    head
                }
            }
            Motion::Up => {
                if current > 0 {
                    let offset = head.saturating_sub(ranges[current].0);
                    let (start, end) = ranges[current - 1];
                    (start + offset).min(end)
                } else {
                    ranges[current].0
                }
            }
            Motion::Down => {
                if current + 1 < ranges.len() {
                    let offset = head.saturating_sub(ranges[current].0);
                    let (start, end) = ranges[current + 1];
                    (start + offset).min(end)
                } else {
                    ranges[current].1
                }
            }
            Motion::LineStart => ranges[current].0,
            Motion::LineEnd => ranges[current].1,
            Motion::DocStart => ranges[0].0,
            Motion::DocEnd => ranges[ranges.len() - 1].1,
        };
        if extend {
            Selection {
                anchor: self.anchor,
                head: new_head,
            }
        } else {
            Selection::caret(new_head)
        }
    }
}

/// Index of the textblock range containing (or nearest to) `pos`.
fn range_index(ranges: &[(usize, usize)], pos: usize) -> usize {
    let mut best = 0usize;
    let mut best_dist = usize::MAX;
    for (i, (start, end)) in ranges.iter().enumerate() {
        if pos >= *start && pos <= *end {
            return i;
        }
        let dist = if pos < *start { start - pos } else { pos - end };
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}
