//! The value type describing a conjunction of predicates over records, and
//! the two-stage evaluation strategy: a cheap pass over [`Summary`] and,
//! only if finer-grained predicates are configured, a full pass over the
//! decoded [`LogDatagram`].

use std::collections::HashSet;

use compact_str::CompactString;

use crate::datagram::LogDatagram;
use crate::http_method::HttpMethodMask;
use crate::log_type::LogType;
use crate::summary::Summary;
use crate::time::TimePoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpStatusRange {
    pub begin: u16,
    pub end: u16,
}

impl HttpStatusRange {
    pub fn contains(self, status: u16) -> bool {
        status >= self.begin && status < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampWindow {
    pub since: TimePoint,
    pub until: TimePoint,
}

impl Default for TimestampWindow {
    fn default() -> Self {
        TimestampWindow {
            since: TimePoint::MIN,
            until: TimePoint::MAX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub sites: HashSet<CompactString>,
    pub hosts: HashSet<CompactString>,
    pub generators: HashSet<CompactString>,
    pub http_uri_starts_with: Option<CompactString>,
    pub http_uri_equals: Option<CompactString>,
    pub http_status: Option<HttpStatusRange>,
    pub http_method_mask: Option<HttpMethodMask>,
    pub http_method_unsafe: bool,
    pub duration_longer: Option<crate::time::Micros>,
    pub timestamp: TimestampWindow,
    pub log_type: LogType,
}

impl Filter {
    /// True when this filter names exactly one site, the optimization
    /// `Database::select` uses to route straight into a `PerSite` list.
    pub fn single_site(&self) -> Option<&CompactString> {
        if self.sites.len() == 1 {
            self.sites.iter().next()
        } else {
            None
        }
    }

    fn needs_full_parse(&self) -> bool {
        !self.hosts.is_empty()
            || !self.generators.is_empty()
            || self.http_uri_starts_with.is_some()
            || self.http_uri_equals.is_some()
            || self.http_status.is_some()
            || self.http_method_mask.is_some()
            || self.http_method_unsafe
            || self.duration_longer.is_some()
    }

    /// Stage one: site, type, timestamp — answerable from the cheap
    /// [`Summary`] alone. Returns `false` as soon as any cheap predicate
    /// fails, before ever touching the raw datagram.
    pub fn matches_summary(&self, summary: &Summary) -> bool {
        if !self.sites.is_empty() {
            match &summary.site {
                Some(site) => {
                    if !self.sites.contains(site.as_str()) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        if !summary.log_type.matches_filter(self.log_type) {
            return false;
        }

        // A record with no timestamp only matches the default (wide-open)
        // window; a narrowed window always excludes it.
        match summary.timestamp {
            Some(ts) => {
                if ts < self.timestamp.since || ts > self.timestamp.until {
                    return false;
                }
            }
            None => {
                if self.timestamp != TimestampWindow::default() {
                    return false;
                }
            }
        }

        true
    }

    /// Stage two: only invoked when `needs_full_parse()` is true, on a
    /// datagram that already passed `matches_summary`.
    pub fn matches_full(&self, datagram: &LogDatagram) -> bool {
        if !self.needs_full_parse() {
            return true;
        }

        if !self.hosts.is_empty() {
            match &datagram.host {
                Some(h) if self.hosts.contains(h.as_str()) => {}
                _ => return false,
            }
        }

        if !self.generators.is_empty() {
            match &datagram.generator {
                Some(g) if self.generators.contains(g.as_str()) => {}
                _ => return false,
            }
        }

        if let Some(prefix) = &self.http_uri_starts_with {
            match &datagram.http_uri {
                Some(uri) if uri.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }

        if let Some(exact) = &self.http_uri_equals {
            match &datagram.http_uri {
                Some(uri) if uri == exact => {}
                _ => return false,
            }
        }

        if let Some(range) = self.http_status {
            match datagram.http_status {
                Some(status) if range.contains(status) => {}
                _ => return false,
            }
        }

        if let Some(mask) = self.http_method_mask {
            match datagram.http_method {
                Some(method) if mask.contains(method) => {}
                _ => return false,
            }
        }

        if self.http_method_unsafe {
            match datagram.http_method {
                Some(method) if method.is_unsafe() => {}
                _ => return false,
            }
        }

        if let Some(min_dur) = self.duration_longer {
            match datagram.duration {
                Some(d) if d > min_dur => {}
                _ => return false,
            }
        }

        true
    }

    /// Full evaluation: summary stage, then full-parse stage if needed.
    pub fn matches(&self, summary: &Summary, datagram_for_full: impl FnOnce() -> LogDatagram) -> bool {
        if !self.matches_summary(summary) {
            return false;
        }
        if !self.needs_full_parse() {
            return true;
        }
        self.matches_full(&datagram_for_full())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_method::HttpMethod;
    use bytes::Bytes;

    fn datagram() -> LogDatagram {
        LogDatagram {
            timestamp: Some(TimePoint::from_micros(100)),
            site: Some("a".into()),
            log_type: LogType::HttpAccess,
            host: Some("host-a".into()),
            generator: None,
            http_uri: Some("/foo/bar".into()),
            http_method: Some(HttpMethod::Get),
            http_status: Some(404),
            duration: Some(crate::time::Micros::from_micros(500)),
            message: Bytes::new(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let f = Filter::default();
        let d = datagram();
        assert!(f.matches(&d.summary(), || d.clone()));
    }

    #[test]
    fn site_filter_is_cheap_and_exclusive() {
        let mut f = Filter::default();
        f.sites.insert("b".into());
        let d = datagram();
        assert!(!f.matches_summary(&d.summary()));
    }

    #[test]
    fn narrowing_never_increases_matches() {
        let d = datagram();
        let base = Filter::default();
        assert!(base.matches(&d.summary(), || d.clone()));

        let mut narrowed = base.clone();
        narrowed.http_status = Some(HttpStatusRange { begin: 500, end: 600 });
        assert!(!narrowed.matches(&d.summary(), || d.clone()));
    }

    #[test]
    fn uri_prefix_requires_full_parse() {
        let mut f = Filter::default();
        f.http_uri_starts_with = Some("/foo".into());
        let d = datagram();
        assert!(f.matches(&d.summary(), || d.clone()));

        let mut f2 = Filter::default();
        f2.http_uri_starts_with = Some("/baz".into());
        assert!(!f2.matches(&d.summary(), || d.clone()));
    }
}
