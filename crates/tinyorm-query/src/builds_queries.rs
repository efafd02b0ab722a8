//! Paging helpers shared by the query builder and the model builder.
//!
//! Implementors only say how to fetch one page of `Item`s; chunking, per-item
//! iteration and `sole` come for free.

use tinyorm_core::{Error, Result, Row};

use crate::builder::Builder;

/// Chunked iteration over a query.
pub trait BuildsQueries: Clone {
    /// What one result row becomes (a `Row`, a model).
    type Item;

    /// Whether an order is set; chunking without one is rejected.
    fn has_orders(&self) -> bool;

    /// Table name used in "not found" errors.
    fn source_name(&self) -> &str;

    /// Fetch `per_page` items of the 1-indexed `page`.
    fn fetch_page(&self, page: u64, per_page: u64) -> Result<Vec<Self::Item>>;

    /// Feed `count`-sized pages to `callback` until a page comes back short or
    /// the callback returns `false`. Returns `false` when the callback stopped
    /// the iteration.
    fn chunk<F>(&self, count: u64, mut callback: F) -> Result<bool>
    where
        F: FnMut(Vec<Self::Item>, u64) -> Result<bool>,
    {
        if !self.has_orders() {
            return Err(Error::invalid_argument(
                "You must specify an orderBy clause when using this function.",
            ));
        }
        if count == 0 {
            return Ok(true);
        }

        let mut page = 1;
        loop {
            let items = self.fetch_page(page, count)?;
            let fetched = items.len() as u64;
            if fetched == 0 {
                break;
            }
            tracing::trace!(target: "tinyorm::query", page, fetched, "Fetched chunk");
            if !callback(items, page)? {
                return Ok(false);
            }
            if fetched < count {
                break;
            }
            page += 1;
        }
        Ok(true)
    }

    /// Call `callback` with each item and its index, chunking by `count`.
    fn each<F>(&self, mut callback: F, count: u64) -> Result<bool>
    where
        F: FnMut(Self::Item, usize) -> Result<bool>,
    {
        let mut index = 0usize;
        self.chunk(count, |items, _| {
            for item in items {
                if !callback(item, index)? {
                    return Ok(false);
                }
                index += 1;
            }
            Ok(true)
        })
    }

    /// The only matching item; errors when there are none or several.
    fn sole(&self) -> Result<Self::Item> {
        let mut items = self.fetch_page(1, 2)?;
        match items.len() {
            0 => Err(Error::RecordsNotFound(self.source_name().to_string())),
            1 => Ok(items.remove(0)),
            n => Err(Error::MultipleRecordsFound(n)),
        }
    }

    /// Run `callback` on the query and hand it back.
    fn tap<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(&mut Self),
    {
        callback(self);
        self
    }
}

impl BuildsQueries for Builder<'_> {
    type Item = Row;

    fn has_orders(&self) -> bool {
        !self.get_orders().is_empty()
    }

    fn source_name(&self) -> &str {
        self.get_from()
    }

    fn fetch_page(&self, page: u64, per_page: u64) -> Result<Vec<Row>> {
        let mut query = self.clone();
        query.for_page(page, per_page);
        query.get(&["*"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseConnection;
    use crate::testing::MockConnection;
    use crate::wheres::BuildsWheres;

    fn rows(ids: &[i32]) -> Vec<Row> {
        ids.iter().map(|id| Row::from_pairs([("id", *id)])).collect()
    }

    #[test]
    fn test_chunk_requires_order() {
        let db = DatabaseConnection::new(MockConnection::new());
        let err = db.table("torrents").chunk(10, |_, _| Ok(true)).unwrap_err();
        assert!(err.to_string().contains("orderBy"));
    }

    #[test]
    fn test_chunk_stops_on_short_page() {
        let mock = MockConnection::new();
        mock.push_rows(rows(&[1, 2]));
        mock.push_rows(rows(&[3]));
        let executed = mock.executed();
        let db = DatabaseConnection::new(mock);

        let mut pages = Vec::new();
        let mut q = db.table("torrents");
        q.order_by_asc("id");
        let finished = q
            .chunk(2, |items, page| {
                pages.push((page, items.len()));
                Ok(true)
            })
            .unwrap();

        assert!(finished);
        assert_eq!(pages, vec![(1, 2), (2, 1)]);
        let executed = executed.borrow();
        assert_eq!(executed.len(), 2);
        assert_eq!(
            executed[1].0,
            r#"select * from "torrents" order by "id" asc limit 2 offset 2"#
        );
    }

    #[test]
    fn test_each_can_stop_early() {
        let mock = MockConnection::new();
        mock.push_rows(rows(&[1, 2, 3]));
        let db = DatabaseConnection::new(mock);
        let mut seen = Vec::new();
        let mut q = db.table("torrents");
        q.order_by_asc("id");
        let finished = q
            .each(
                |row, index| {
                    seen.push((index, row.get("id").cloned()));
                    Ok(index < 1)
                },
                10,
            )
            .unwrap();
        assert!(!finished);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_sole() {
        let mock = MockConnection::new();
        mock.push_rows(rows(&[1]));
        mock.push_rows(Vec::new());
        mock.push_rows(rows(&[1, 2]));
        let db = DatabaseConnection::new(mock);
        let mut q = db.table("torrents");
        q.where_eq("size", 1);

        assert!(q.sole().is_ok());
        assert!(matches!(q.sole(), Err(Error::RecordsNotFound(t)) if t == "torrents"));
        assert!(matches!(q.sole(), Err(Error::MultipleRecordsFound(2))));
    }

    #[test]
    fn test_tap() {
        let db = DatabaseConnection::new(MockConnection::new());
        let mut q = db.table("torrents");
        q.tap(|q| {
            q.where_eq("id", 1);
        });
        assert_eq!(q.wheres().len(), 1);
    }
}
