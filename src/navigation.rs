use serde::Serialize;

use crate::catalog::{BookId, Catalog, VolumeId};

/// Where a location hash (`#`, `#V`, `#V:B`, `#V:B:C`) leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    Home,
    Volume { volume_id: VolumeId },
    Book { book_id: BookId },
    Chapter { book_id: BookId, chapter: u32 },
}

impl Route {
    /// Resolves `hash` against the catalog. Every shape or id that does not
    /// resolve lands on `Home`.
    pub fn resolve(hash: &str, catalog: &Catalog) -> Self {
        let ids = hash_ids(hash);
        let route = match ids.as_slice() {
            [] => Self::Home,
            [volume] => Self::volume(volume, catalog),
            [_, book] => Self::book(book, catalog),
            [_, book, chapter] => Self::chapter(book, chapter, catalog),
            _ => Self::Home,
        };
        tracing::debug!(hash, ?route, "resolved hash");
        route
    }

    fn volume(raw: &str, catalog: &Catalog) -> Self {
        let (Some(id), Some(first), Some(last)) = (
            parse_id(raw),
            catalog.first_volume_id(),
            catalog.last_volume_id(),
        ) else {
            return Self::Home;
        };
        if id < i64::from(first) || id > i64::from(last) {
            return Self::Home;
        }
        match VolumeId::try_from(id) {
            Ok(volume_id) => Self::Volume { volume_id },
            Err(_) => Self::Home,
        }
    }

    fn book(raw: &str, catalog: &Catalog) -> Self {
        let Some(book) = parse_id(raw).and_then(|id| catalog.book_from_raw(id)) else {
            return Self::Home;
        };
        if book.num_chapters <= 1 {
            return Self::Chapter {
                book_id: book.id,
                chapter: book.num_chapters,
            };
        }
        Self::Book { book_id: book.id }
    }

    fn chapter(raw_book: &str, raw_chapter: &str, catalog: &Catalog) -> Self {
        let Some(book) = parse_id(raw_book).and_then(|id| catalog.book_from_raw(id)) else {
            return Self::Home;
        };
        let Some(chapter) = parse_id(raw_chapter) else {
            return Self::Home;
        };
        if !catalog.book_chapter_valid(i64::from(book.id), chapter) {
            return Self::Home;
        }
        match u32::try_from(chapter) {
            Ok(chapter) => Self::Chapter {
                book_id: book.id,
                chapter,
            },
            Err(_) => Self::Home,
        }
    }
}

fn hash_ids(hash: &str) -> Vec<&str> {
    let body = hash.strip_prefix('#').unwrap_or(hash);
    if body.is_empty() {
        return Vec::new();
    }
    body.split(':').collect()
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// Builds the hash for a navigation target. Later parts are dropped when an
/// earlier one is missing.
pub fn hash_for(volume_id: Option<i64>, book_id: Option<i64>, chapter: Option<i64>) -> String {
    let mut hash = String::from("#");
    if let Some(volume_id) = volume_id {
        hash.push_str(&volume_id.to_string());
        if let Some(book_id) = book_id {
            hash.push_str(&format!(":{book_id}"));
            if let Some(chapter) = chapter {
                hash.push_str(&format!(":{chapter}"));
            }
        }
    }
    hash
}
