use crate::store::{Record, RecordKind, Watermark};
use std::fmt;
use std::str::FromStr;

/// Page size used when no configuration overrides it.
pub const BASE_PAGE_SIZE: usize = 30;

/// Largest page the engine requests. Stores must return at least
/// `MAX_PAGE_SIZE + 1` rows per query or the lookahead row is lost.
pub const MAX_PAGE_SIZE: usize = 1000;

// ============================================================================
// Filter
// ============================================================================

/// Which slice of the history the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    All,
    Kind(RecordKind),
    Favorite,
}

impl KindFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            KindFilter::All => "all",
            KindFilter::Kind(kind) => kind.as_str(),
            KindFilter::Favorite => "favorite",
        }
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KindFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(KindFilter::All),
            "favorite" | "favorites" => Ok(KindFilter::Favorite),
            other => other.parse::<RecordKind>().map(KindFilter::Kind),
        }
    }
}

/// Keyword plus kind filter. Every full reload is tagged with the filter it
/// was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filter {
    keyword: String,
    kind: KindFilter,
}

impl Filter {
    /// Build a filter. Image records are not keyword-searchable, so choosing
    /// the image kind discards the keyword.
    pub fn new(keyword: impl Into<String>, kind: KindFilter) -> Self {
        let keyword = match kind {
            KindFilter::Kind(RecordKind::Image) => String::new(),
            _ => keyword.into(),
        };
        Self { keyword, kind }
    }

    /// The keyword, or `None` when empty.
    pub fn keyword(&self) -> Option<&str> {
        if self.keyword.is_empty() {
            None
        } else {
            Some(&self.keyword)
        }
    }

    pub fn kind(&self) -> KindFilter {
        self.kind
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// Parameters for one paged query against the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub limit: usize,
    pub keyword: Option<String>,
    pub kind: Option<RecordKind>,
    pub favorite_only: bool,
    pub watermark: Option<Watermark>,
}

impl Cursor {
    fn for_filter(filter: &Filter, limit: usize, watermark: Option<Watermark>) -> Self {
        let (kind, favorite_only) = match filter.kind() {
            KindFilter::All => (None, false),
            KindFilter::Kind(kind) => (Some(kind), false),
            KindFilter::Favorite => (None, true),
        };
        Self {
            limit,
            keyword: filter.keyword().map(str::to_string),
            kind,
            favorite_only,
            watermark,
        }
    }

    /// Fresh cursor for a full reload.
    ///
    /// Asks for one record past `page_size`; the extra row only tells the
    /// window whether more pages exist.
    pub fn first_page(filter: &Filter, page_size: usize) -> Self {
        Self::for_filter(filter, page_size.max(1) + 1, None)
    }

    /// Cursor for the page strictly older than `watermark`.
    pub fn next_page(filter: &Filter, page_size: usize, watermark: Watermark) -> Self {
        Self::for_filter(filter, page_size.max(1) + 1, Some(watermark))
    }

    /// Cursor that fetches only the current head record.
    pub fn head_probe(filter: &Filter) -> Self {
        Self::for_filter(filter, 1, None)
    }

    /// Whether `record` satisfies this cursor's filter and watermark.
    ///
    /// Stores that filter in memory use this directly; the SQLite store
    /// expresses the same predicate in SQL. Keyword matching folds ASCII case
    /// only, as SQLite's `LIKE` does, so "É" does not match "é" in either.
    pub fn admits(&self, record: &Record) -> bool {
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }
        if self.favorite_only && !record.favorite {
            return false;
        }
        if let Some(keyword) = &self.keyword {
            if record.kind == RecordKind::Image {
                return false;
            }
            if !record
                .value
                .to_ascii_lowercase()
                .contains(&keyword.to_ascii_lowercase())
            {
                return false;
            }
        }
        match self.watermark {
            Some(watermark) => record.is_older_than(watermark),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, kind: RecordKind, value: &str, updated_at: i64) -> Record {
        Record {
            id,
            kind,
            value: value.to_string(),
            thumbnail: None,
            size: None,
            image_dimensions: None,
            created_at: updated_at,
            updated_at,
            favorite: false,
            soft_deleted: false,
        }
    }

    #[test]
    fn test_image_filter_clears_keyword() {
        let filter = Filter::new("cat", KindFilter::Kind(RecordKind::Image));
        assert_eq!(filter.keyword(), None);

        let filter = Filter::new("cat", KindFilter::Kind(RecordKind::Text));
        assert_eq!(filter.keyword(), Some("cat"));
    }

    #[test]
    fn test_first_page_has_lookahead_and_no_watermark() {
        let cursor = Cursor::first_page(&Filter::new("", KindFilter::Favorite), 30);
        assert_eq!(cursor.limit, 31);
        assert_eq!(cursor.watermark, None);
        assert!(cursor.favorite_only);
        assert_eq!(cursor.keyword, None);
    }

    #[test]
    fn test_head_probe_limit_one() {
        let cursor = Cursor::head_probe(&Filter::new("x", KindFilter::All));
        assert_eq!(cursor.limit, 1);
        assert_eq!(cursor.keyword.as_deref(), Some("x"));
    }

    #[test]
    fn test_admits_keyword_case_insensitive() {
        let cursor = Cursor::first_page(&Filter::new("HeLLo", KindFilter::All), 10);
        assert!(cursor.admits(&record(1, RecordKind::Text, "say hello world", 1)));
        assert!(!cursor.admits(&record(2, RecordKind::Text, "goodbye", 1)));
        assert!(!cursor.admits(&record(3, RecordKind::Image, "hello.png", 1)));
    }

    #[test]
    fn test_admits_folds_ascii_case_only() {
        let cursor = Cursor::first_page(&Filter::new("CAFÉ", KindFilter::All), 10);
        assert!(cursor.admits(&record(1, RecordKind::Text, "le cafÉ", 1)));
        assert!(!cursor.admits(&record(2, RecordKind::Text, "le café", 1)));
    }

    #[test]
    fn test_admits_respects_watermark() {
        let watermark = Watermark {
            updated_at: 100,
            id: 5,
        };
        let cursor = Cursor::next_page(&Filter::default(), 10, watermark);
        assert!(cursor.admits(&record(4, RecordKind::Text, "a", 100)));
        assert!(!cursor.admits(&record(5, RecordKind::Text, "a", 100)));
        assert!(!cursor.admits(&record(1, RecordKind::Text, "a", 101)));
        assert!(cursor.admits(&record(9, RecordKind::Text, "a", 99)));
    }

    #[test]
    fn test_kind_filter_parse() {
        assert_eq!("all".parse::<KindFilter>(), Ok(KindFilter::All));
        assert_eq!("favorite".parse::<KindFilter>(), Ok(KindFilter::Favorite));
        assert_eq!(
            "image".parse::<KindFilter>(),
            Ok(KindFilter::Kind(RecordKind::Image))
        );
        assert!("audio".parse::<KindFilter>().is_err());
    }
}
