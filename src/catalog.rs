use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type BookId = u32;
pub type VolumeId = u32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub full_name: String,
    pub toc_name: String,
    pub grid_name: String,
    /// Owning volume. The upstream API names this field `parentBookId`.
    #[serde(rename = "parentBookId")]
    pub parent_volume_id: VolumeId,
    pub num_chapters: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: VolumeId,
    pub full_name: String,
    pub min_book_id: BookId,
    pub max_book_id: BookId,
    /// Filled once by [`Catalog::from_parts`].
    #[serde(skip)]
    pub books: Vec<Book>,
}

/// A chapter reachable through the next/previous controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
    pub book_id: BookId,
    pub chapter: u32,
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    books: BTreeMap<BookId, Book>,
    volumes: Vec<Volume>,
}

impl Catalog {
    /// Joins the book table and the volume table, filling every volume's
    /// book list from its inclusive id range.
    pub fn from_parts(
        books: BTreeMap<BookId, Book>,
        mut volumes: Vec<Volume>,
    ) -> anyhow::Result<Self> {
        volumes.sort_by_key(|volume| volume.id);

        for (index, volume) in volumes.iter_mut().enumerate() {
            let expected_id = VolumeId::try_from(index + 1)?;
            if volume.id != expected_id {
                anyhow::bail!(
                    "volume ids must be contiguous from 1: expected {expected_id}, found {}",
                    volume.id
                );
            }
            if volume.min_book_id > volume.max_book_id {
                anyhow::bail!(
                    "volume {} has an empty book range {}..={}",
                    volume.id,
                    volume.min_book_id,
                    volume.max_book_id
                );
            }

            let mut volume_books = Vec::new();
            for book_id in volume.min_book_id..=volume.max_book_id {
                let Some(book) = books.get(&book_id) else {
                    anyhow::bail!("volume {} references unknown book {book_id}", volume.id);
                };
                volume_books.push(book.clone());
            }
            volume.books = volume_books;
        }

        tracing::debug!(
            books = books.len(),
            volumes = volumes.len(),
            "catalog cached"
        );
        Ok(Self { books, volumes })
    }

    pub fn book(&self, book_id: BookId) -> Option<&Book> {
        self.books.get(&book_id)
    }

    /// Looks up a book from an untrusted id, e.g. one parsed from a hash.
    pub fn book_from_raw(&self, raw_id: i64) -> Option<&Book> {
        BookId::try_from(raw_id).ok().and_then(|id| self.book(id))
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn volume(&self, volume_id: VolumeId) -> Option<&Volume> {
        let index = usize::try_from(volume_id).ok()?.checked_sub(1)?;
        self.volumes.get(index)
    }

    pub fn volume_for_book(&self, book: &Book) -> Option<&Volume> {
        self.volume(book.parent_volume_id)
    }

    pub fn first_volume_id(&self) -> Option<VolumeId> {
        self.volumes.first().map(|volume| volume.id)
    }

    pub fn last_volume_id(&self) -> Option<VolumeId> {
        self.volumes.last().map(|volume| volume.id)
    }

    /// True when `chapter` addresses a real chapter of `book_id`. Books with
    /// no chapters are addressed as chapter 0.
    pub fn book_chapter_valid(&self, book_id: i64, chapter: i64) -> bool {
        let Some(book) = self.book_from_raw(book_id) else {
            return false;
        };
        if chapter < 0 || chapter > i64::from(book.num_chapters) {
            return false;
        }
        !(chapter == 0 && book.num_chapters > 0)
    }

    pub fn next_chapter(&self, book_id: BookId, chapter: u32) -> Option<ChapterRef> {
        let book = self.book(book_id)?;
        if chapter < book.num_chapters {
            return Some(ChapterRef {
                book_id,
                chapter: chapter + 1,
                title: title_for_book_chapter(book, chapter + 1),
            });
        }

        let next_book = self.book(book_id.checked_add(1)?)?;
        let chapter = if next_book.num_chapters > 0 { 1 } else { 0 };
        Some(ChapterRef {
            book_id: next_book.id,
            chapter,
            title: title_for_book_chapter(next_book, chapter),
        })
    }

    pub fn previous_chapter(&self, book_id: BookId, chapter: u32) -> Option<ChapterRef> {
        let book = self.book(book_id)?;
        if chapter > 1 {
            return Some(ChapterRef {
                book_id,
                chapter: chapter - 1,
                title: title_for_book_chapter(book, chapter - 1),
            });
        }

        let previous_book = self.book(book_id.checked_sub(1)?)?;
        Some(ChapterRef {
            book_id: previous_book.id,
            chapter: previous_book.num_chapters,
            title: title_for_book_chapter(previous_book, previous_book.num_chapters),
        })
    }
}

pub fn title_for_book_chapter(book: &Book, chapter: u32) -> String {
    if chapter > 0 {
        format!("{} {chapter}", book.toc_name)
    } else {
        book.toc_name.clone()
    }
}
