//! Markup fragments for the navigation grids, breadcrumbs and chapter controls.

use std::fmt::Display;

use crate::catalog::{Book, ChapterRef, Volume, VolumeId};
use crate::transition::Direction;

pub const CLASS_BOOKS: &str = "books";
pub const CLASS_BUTTON: &str = "btn";
pub const CLASS_CHAPTER: &str = "chapter";
pub const CLASS_ICON: &str = "material-icons";
pub const CLASS_NEXT_PREVIOUS: &str = "nextprev";
pub const CLASS_VOLUME: &str = "volume";
pub const DIV_NAVIGATOR: &str = "scripnav";
pub const ICON_NEXT: &str = "skip_next";
pub const ICON_PREVIOUS: &str = "skip_previous";
pub const TEXT_TOP_LEVEL: &str = "The Scriptures";

const BOTTOM_PADDING: &str = "<br /><br />";
const TAG_ITALICS: &str = "i";
const TAG_LIST_ITEM: &str = "li";
const TAG_UNORDERED_LIST: &str = "ul";
const TAG_VOLUME_HEADER: &str = "h5";

#[derive(Debug, Clone, Copy, Default)]
pub struct Div<'a> {
    pub id: Option<&'a str>,
    pub class: Option<&'a str>,
    pub content: &'a str,
}

impl Div<'_> {
    pub fn render(&self) -> String {
        let mut out = String::from("<div");
        push_attr(&mut out, "id", self.id);
        push_attr(&mut out, "class", self.class);
        out.push('>');
        out.push_str(self.content);
        out.push_str("</div>");
        out
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Link<'a> {
    pub id: Option<&'a str>,
    pub class: Option<&'a str>,
    pub href: Option<&'a str>,
    pub onclick: Option<&'a str>,
    pub title: Option<&'a str>,
    pub content: &'a str,
}

impl Link<'_> {
    pub fn render(&self) -> String {
        let mut out = String::from("<a");
        push_attr(&mut out, "id", self.id);
        push_attr(&mut out, "class", self.class);
        push_attr(&mut out, "href", self.href);
        push_attr(&mut out, "onclick", self.onclick);
        push_attr(&mut out, "title", self.title);
        out.push('>');
        out.push_str(self.content);
        out.push_str("</a>");
        out
    }
}

fn push_attr(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        out.push_str(&format!(" {name}=\"{}\"", escape(value)));
    }
}

/// Escapes text for use inside element content or a quoted attribute.
pub fn escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn element(tag: &str, content: impl Display, class: Option<&str>) -> String {
    match class {
        Some(class) => format!("<{tag} class=\"{}\">{content}</{tag}>", escape(class)),
        None => format!("<{tag}>{content}</{tag}>"),
    }
}

/// A link that navigates through `changeHash(args)` instead of an href.
pub fn hash_link(hash_args: &str, content: &str, title: Option<&str>) -> String {
    let onclick = format!("changeHash({hash_args})");
    Link {
        href: Some("javascript:void(0)"),
        onclick: Some(&onclick),
        title,
        content,
        ..Link::default()
    }
    .render()
}

pub fn navigator_div(content: &str) -> String {
    Div {
        id: Some(DIV_NAVIGATOR),
        content,
        ..Div::default()
    }
    .render()
}

pub fn breadcrumbs(volume: Option<&Volume>, book: Option<&Book>, chapter: Option<u32>) -> String {
    let mut crumbs = String::new();

    match volume {
        None => crumbs.push_str(&element(TAG_LIST_ITEM, TEXT_TOP_LEVEL, None)),
        Some(volume) => {
            let volume_name = escape(&volume.full_name);
            crumbs.push_str(&element(
                TAG_LIST_ITEM,
                hash_link("", TEXT_TOP_LEVEL, None),
                None,
            ));

            match book {
                None => crumbs.push_str(&element(TAG_LIST_ITEM, &volume_name, None)),
                Some(book) => {
                    let book_name = escape(&book.toc_name);
                    crumbs.push_str(&element(
                        TAG_LIST_ITEM,
                        hash_link(&volume.id.to_string(), &volume_name, None),
                        None,
                    ));

                    match chapter.filter(|chapter| *chapter > 0) {
                        None => crumbs.push_str(&element(TAG_LIST_ITEM, &book_name, None)),
                        Some(chapter) => {
                            crumbs.push_str(&element(
                                TAG_LIST_ITEM,
                                hash_link(&format!("{},{}", volume.id, book.id), &book_name, None),
                                None,
                            ));
                            crumbs.push_str(&element(TAG_LIST_ITEM, chapter, None));
                        }
                    }
                }
            }
        }
    }

    element(TAG_UNORDERED_LIST, crumbs, None)
}

pub fn books_grid(volume: &Volume) -> String {
    let mut content = String::new();
    for book in &volume.books {
        let id = book.id.to_string();
        let href = format!("#{}:{}", volume.id, book.id);
        let name = escape(&book.grid_name);
        content.push_str(
            &Link {
                id: Some(&id),
                class: Some(CLASS_BUTTON),
                href: Some(&href),
                content: &name,
                ..Link::default()
            }
            .render(),
        );
    }

    Div {
        class: Some(CLASS_BOOKS),
        content: &content,
        ..Div::default()
    }
    .render()
}

pub fn chapters_grid(book: &Book) -> String {
    let header = element(TAG_VOLUME_HEADER, escape(&book.full_name), None);
    let class = format!("{CLASS_BUTTON} {CLASS_CHAPTER}");

    let mut content = String::new();
    for chapter in 1..=book.num_chapters {
        let id = chapter.to_string();
        let href = format!("#0:{}:{chapter}", book.id);
        content.push_str(
            &Link {
                id: Some(&id),
                class: Some(&class),
                href: Some(&href),
                content: &id,
                ..Link::default()
            }
            .render(),
        );
    }

    let mut out = Div {
        class: Some(CLASS_VOLUME),
        content: &header,
        ..Div::default()
    }
    .render();
    out.push_str(
        &Div {
            class: Some(CLASS_BOOKS),
            content: &content,
            ..Div::default()
        }
        .render(),
    );
    out
}

/// All volumes with their book grids, or only `only` when given.
pub fn volumes_grid(volumes: &[Volume], only: Option<VolumeId>) -> String {
    let mut content = String::new();
    for volume in volumes {
        if only.is_some_and(|id| id != volume.id) {
            continue;
        }

        let header = format!(
            "<a name=\"v{}\" />{}",
            volume.id,
            element(TAG_VOLUME_HEADER, escape(&volume.full_name), None)
        );
        content.push_str(
            &Div {
                class: Some(CLASS_VOLUME),
                content: &header,
                ..Div::default()
            }
            .render(),
        );
        content.push_str(&books_grid(volume));
    }

    content.push_str(BOTTOM_PADDING);
    content
}

pub fn next_previous_markup(target: &ChapterRef, direction: Direction) -> String {
    let icon = match direction {
        Direction::Backward => ICON_PREVIOUS,
        _ => ICON_NEXT,
    };
    hash_link(
        &format!(
            "0, {}, {}, {}",
            target.book_id,
            target.chapter,
            direction.flag()
        ),
        &element(TAG_ITALICS, icon, Some(CLASS_ICON)),
        Some(&target.title),
    )
}

pub fn next_previous_container(controls: &str) -> String {
    Div {
        class: Some(CLASS_NEXT_PREVIOUS),
        content: controls,
        ..Div::default()
    }
    .render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures;

    #[test]
    fn link_renders_attributes_in_fixed_order() {
        let link = Link {
            id: Some("7"),
            class: Some("btn"),
            href: Some("#1:7"),
            title: Some("Seven"),
            content: "Gen",
            ..Link::default()
        };
        assert_eq!(
            link.render(),
            r##"<a id="7" class="btn" href="#1:7" title="Seven">Gen</a>"##
        );
    }

    #[test]
    fn home_breadcrumb_is_plain_text() {
        assert_eq!(breadcrumbs(None, None, None), "<ul><li>The Scriptures</li></ul>");
    }

    #[test]
    fn chapter_breadcrumb_links_every_level_but_the_last() {
        let catalog = fixtures::catalog();
        let book = catalog.book(2).unwrap();
        let volume = catalog.volume_for_book(book).unwrap();

        let crumbs = breadcrumbs(Some(volume), Some(book), Some(3));
        assert_eq!(
            crumbs,
            concat!(
                "<ul>",
                r#"<li><a href="javascript:void(0)" onclick="changeHash()">The Scriptures</a></li>"#,
                r#"<li><a href="javascript:void(0)" onclick="changeHash(1)">Old Testament</a></li>"#,
                r#"<li><a href="javascript:void(0)" onclick="changeHash(1,2)">Exodus</a></li>"#,
                "<li>3</li>",
                "</ul>"
            )
        );
    }

    #[test]
    fn chapter_zero_breadcrumb_ends_at_book() {
        let catalog = fixtures::catalog();
        let book = catalog.book(3).unwrap();
        let volume = catalog.volume_for_book(book).unwrap();

        let crumbs = breadcrumbs(Some(volume), Some(book), Some(0));
        assert!(crumbs.ends_with("<li>Preface</li></ul>"));
        assert!(!crumbs.contains("changeHash(1,3)"));
    }

    #[test]
    fn chapters_grid_links_every_chapter() {
        let catalog = fixtures::catalog();
        let grid = chapters_grid(catalog.book(6).unwrap());
        assert!(grid.starts_with(r#"<div class="volume"><h5>The Book of Revelation</h5></div>"#));
        assert_eq!(grid.matches("class=\"btn chapter\"").count(), 22);
        assert!(grid.contains(r##"<a id="22" class="btn chapter" href="#0:6:22">22</a>"##));
    }

    #[test]
    fn volumes_grid_filters_to_one_volume() {
        let catalog = fixtures::catalog();
        let all = volumes_grid(catalog.volumes(), None);
        assert!(all.contains(r#"<a name="v1" />"#));
        assert!(all.contains(r#"<a name="v2" />"#));
        assert!(all.ends_with("<br /><br />"));

        let one = volumes_grid(catalog.volumes(), Some(2));
        assert!(!one.contains(r#"<a name="v1" />"#));
        assert!(one.contains(r##"<a id="4" class="btn" href="#2:4">Matt</a>"##));
    }

    #[test]
    fn next_previous_markup_carries_direction_flag_and_title() {
        let target = ChapterRef {
            book_id: 2,
            chapter: 1,
            title: "Exodus 1".to_string(),
        };
        let next = next_previous_markup(&target, Direction::Forward);
        assert!(next.contains("changeHash(0, 2, 1, 0)"));
        assert!(next.contains(r#"title="Exodus 1""#));
        assert!(next.contains(ICON_NEXT));

        let previous = next_previous_markup(&target, Direction::Backward);
        assert!(previous.contains("changeHash(0, 2, 1, 1)"));
        assert!(previous.contains(ICON_PREVIOUS));
    }

    #[test]
    fn catalog_names_are_escaped_in_text_and_attributes() {
        let catalog = fixtures::catalog();
        let mut book = catalog.book(2).unwrap().clone();
        book.toc_name = r#"Ex "2" <b>"#.to_string();
        book.grid_name = "A&B".to_string();
        let volume = catalog.volume_for_book(catalog.book(2).unwrap()).unwrap();

        let crumbs = breadcrumbs(Some(volume), Some(&book), None);
        assert!(crumbs.ends_with("<li>Ex &quot;2&quot; &lt;b&gt;</li></ul>"));

        let mut volume = volume.clone();
        volume.books = vec![book];
        assert!(books_grid(&volume).contains(">A&amp;B</a>"));

        let target = ChapterRef {
            book_id: 2,
            chapter: 1,
            title: r#"Jacob's "Ladder""#.to_string(),
        };
        let next = next_previous_markup(&target, Direction::Forward);
        assert!(next.contains(r#"title="Jacob&#39;s &quot;Ladder&quot;""#));
    }
}
