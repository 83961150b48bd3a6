use crate::arena::RecordList;
use crate::record::Record;
use std::rc::Rc;

/// A cursor never stores a pointer or index into a list directly — only
/// the id of the record it last pointed at. Every use re-resolves that id
/// against the current list via binary search, which is how eviction
/// becomes detectable (the remembered id is simply no longer >= the
/// list's front id) without the cursor ever dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Never positioned; `rewind`/`seek_last` must run first.
    Unstarted,
    /// Remembers the id of a record that matched when last visited.
    At(u64),
    /// Ran off one end of the list.
    End,
}

impl Cursor {
    pub fn current<'a>(&self, list: &'a RecordList) -> Option<&'a Rc<Record>> {
        match self {
            Cursor::At(id) => match list.position_of(*id) {
                Ok(idx) => list.records().get(idx),
                Err(_) => None,
            },
            _ => None,
        }
    }

    /// True if the record this cursor remembers has been evicted from the
    /// front of `list` since it was last resolved.
    pub fn was_evicted(&self, list: &RecordList) -> bool {
        match self {
            Cursor::At(id) => match list.front_id() {
                Some(front_id) => *id < front_id,
                None => true,
            },
            _ => false,
        }
    }

    pub fn set_at(&mut self, id: u64) {
        *self = Cursor::At(id);
    }

    pub fn set_end(&mut self) {
        *self = Cursor::End;
    }

    /// One step forward in `list`, landing on `End` if there is no next
    /// record.
    pub fn advance(&mut self, list: &RecordList) {
        let next_id = match self {
            Cursor::At(id) => match list.position_of(*id) {
                Ok(idx) => list.records().get(idx + 1).map(|r| r.id),
                Err(insertion_point) => list.records().get(insertion_point).map(|r| r.id),
            },
            Cursor::Unstarted => list.front_id(),
            Cursor::End => None,
        };
        match next_id {
            Some(id) => *self = Cursor::At(id),
            None => *self = Cursor::End,
        }
    }

    /// One step backward, landing on `Unstarted` if there is no previous
    /// record (used by `seek_last`'s reverse scan).
    pub fn retreat(&mut self, list: &RecordList) {
        let prev_id = match self {
            Cursor::At(id) => match list.position_of(*id) {
                Ok(idx) if idx > 0 => list.records().get(idx - 1).map(|r| r.id),
                _ => None,
            },
            _ => None,
        };
        match prev_id {
            Some(id) => *self = Cursor::At(id),
            None => *self = Cursor::Unstarted,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::Unstarted
    }
}
