use std::cell::RefCell;
use std::rc::Rc;

use crate::arena::{AllRecords, RecordList};
use crate::per_site::PerSite;

/// Which record list a [`crate::selection::Selection`] is iterating:
/// either the global chronological list or one site's sub-list.
///
/// Cloning a `ListHandle` clones the underlying `Rc`, which for the
/// `Site` variant is the shared lease that keeps a site alive: as long as
/// a `Selection` holds one, `Database`'s own `compress`/`clear` pass will
/// see `Rc::strong_count() > 1` and leave the site entry alone even if
/// its list is otherwise empty.
#[derive(Clone)]
pub enum ListHandle {
    All(Rc<RefCell<AllRecords>>),
    Site(Rc<RefCell<PerSite>>),
}

impl ListHandle {
    pub fn with_list<R>(&self, f: impl FnOnce(&RecordList) -> R) -> R {
        match self {
            ListHandle::All(all) => f(all.borrow().list()),
            ListHandle::Site(site) => f(site.borrow().list()),
        }
    }

    pub fn with_list_mut<R>(&self, f: impl FnOnce(&mut RecordList) -> R) -> R {
        match self {
            ListHandle::All(all) => f(all.borrow_mut().list_mut()),
            ListHandle::Site(site) => f(site.borrow_mut().list_mut()),
        }
    }

    pub fn site_name(&self) -> Option<String> {
        match self {
            ListHandle::All(_) => None,
            ListHandle::Site(site) => Some(site.borrow().site().to_owned()),
        }
    }
}

impl std::fmt::Debug for ListHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListHandle::All(_) => write!(f, "ListHandle::All"),
            ListHandle::Site(s) => write!(f, "ListHandle::Site({})", s.borrow().site()),
        }
    }
}
