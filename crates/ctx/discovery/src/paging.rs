//! Paged query results.
//!
//! A query whose result set exceeds the requested page size leaves the rest
//! behind a cursor; `queryNext` drains it page by page. Results are a
//! snapshot taken when the query ran.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use ctx_types::{ComponentSummary, DataObject, DecodeError, FromDataObject, ToDataObject};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DiscoveryError, DiscoveryResult};

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPage {
    pub components: Vec<ComponentSummary>,
    /// Present while more results are pending.
    pub cursor: Option<String>,
    pub remaining: usize,
}

impl QueryPage {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl ToDataObject for QueryPage {
    fn to_data_object(&self) -> DataObject {
        let mut page = DataObject::new("components")
            .with_children(self.components.iter().map(ToDataObject::to_data_object))
            .with_child(DataObject::leaf("remaining", self.remaining));
        if let Some(cursor) = &self.cursor {
            page.push(DataObject::leaf("cursor", cursor));
        }
        page
    }
}

impl FromDataObject for QueryPage {
    fn from_data_object(data: &DataObject) -> Result<Self, DecodeError> {
        data.expect_name("components")?;
        Ok(Self {
            components: data
                .children_named("componentSummary")
                .map(ComponentSummary::from_data_object)
                .collect::<Result<_, _>>()?,
            cursor: data.value_of("cursor").map(str::to_string),
            remaining: data.parse_optional("remaining")?.unwrap_or(0),
        })
    }
}

struct PendingResults {
    rest: VecDeque<ComponentSummary>,
    page_size: usize,
    serial: u64,
}

/// Open cursors over pending query results.
pub struct CursorTable {
    cursors: DashMap<String, PendingResults>,
    max_cursors: usize,
    opened: AtomicU64,
}

impl CursorTable {
    pub fn new(max_cursors: usize) -> Self {
        Self {
            cursors: DashMap::new(),
            max_cursors: max_cursors.max(1),
            opened: AtomicU64::new(0),
        }
    }

    /// Split `results` into a first page and, when needed, a cursor.
    ///
    /// `page_size == 0` returns everything at once.
    pub fn open(&self, results: Vec<ComponentSummary>, page_size: usize) -> QueryPage {
        if page_size == 0 || results.len() <= page_size {
            return QueryPage {
                components: results,
                cursor: None,
                remaining: 0,
            };
        }

        let mut rest: VecDeque<_> = results.into();
        let components: Vec<_> = rest.drain(..page_size).collect();

        self.make_room();
        let cursor = format!("cursor:{}", Uuid::new_v4());
        let remaining = rest.len();
        self.cursors.insert(
            cursor.clone(),
            PendingResults {
                rest,
                page_size,
                serial: self.opened.fetch_add(1, Ordering::Relaxed),
            },
        );
        debug!(cursor = %cursor, remaining, "Query cursor opened");

        QueryPage {
            components,
            cursor: Some(cursor),
            remaining,
        }
    }

    /// Next page behind `cursor`. The cursor closes once drained.
    pub fn next(&self, cursor: &str) -> DiscoveryResult<QueryPage> {
        let mut pending = self
            .cursors
            .get_mut(cursor)
            .ok_or_else(|| DiscoveryError::QueryNotFound(cursor.to_string()))?;

        let take = pending.page_size.min(pending.rest.len());
        let components: Vec<_> = pending.rest.drain(..take).collect();
        let remaining = pending.rest.len();
        drop(pending);

        if remaining == 0 {
            self.cursors.remove(cursor);
            debug!(cursor, "Query cursor drained");
            return Ok(QueryPage {
                components,
                cursor: None,
                remaining: 0,
            });
        }

        Ok(QueryPage {
            components,
            cursor: Some(cursor.to_string()),
            remaining,
        })
    }

    pub fn close(&self, cursor: &str) -> bool {
        self.cursors.remove(cursor).is_some()
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    fn make_room(&self) {
        while self.cursors.len() >= self.max_cursors {
            let oldest = self
                .cursors
                .iter()
                .min_by_key(|entry| entry.serial)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(cursor) => {
                    debug!(cursor = %cursor, "Evicting oldest query cursor");
                    self.cursors.remove(&cursor);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_types::{ComponentDescription, ComponentType};

    fn summaries(n: usize) -> Vec<ComponentSummary> {
        (0..n)
            .map(|i| ComponentDescription::new(format!("w{i:02}"), ComponentType::Widget).basic())
            .collect()
    }

    #[test]
    fn test_small_result_has_no_cursor() {
        let table = CursorTable::new(4);
        let page = table.open(summaries(3), 5);
        assert_eq!(page.components.len(), 3);
        assert!(page.cursor.is_none());
        assert!(table.is_empty());

        let unpaged = table.open(summaries(30), 0);
        assert_eq!(unpaged.components.len(), 30);
        assert!(table.is_empty());
    }

    #[test]
    fn test_cursor_drains_in_pages() {
        let table = CursorTable::new(4);
        let all = summaries(7);
        let first = table.open(all.clone(), 3);
        assert_eq!(first.components, all[..3]);
        assert_eq!(first.remaining, 4);
        let cursor = first.cursor.unwrap();

        let second = table.next(&cursor).unwrap();
        assert_eq!(second.components, all[3..6]);
        assert_eq!(second.remaining, 1);
        assert_eq!(second.cursor.as_deref(), Some(cursor.as_str()));

        let last = table.next(&cursor).unwrap();
        assert_eq!(last.components, all[6..]);
        assert!(last.cursor.is_none());

        assert!(matches!(
            table.next(&cursor),
            Err(DiscoveryError::QueryNotFound(_))
        ));
    }

    #[test]
    fn test_oldest_cursor_is_evicted() {
        let table = CursorTable::new(2);
        let first = table.open(summaries(4), 1).cursor.unwrap();
        let second = table.open(summaries(4), 1).cursor.unwrap();
        let third = table.open(summaries(4), 1).cursor.unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.next(&first).is_err());
        assert!(table.next(&second).is_ok());
        assert!(table.next(&third).is_ok());
    }

    #[test]
    fn test_page_message_form() {
        let page = CursorTable::new(1).open(summaries(3), 2);
        let decoded = QueryPage::from_data_object(&page.to_data_object()).unwrap();
        assert_eq!(decoded, page);
    }
}
