//! List and search page bodies, shared by the commands that show page 1 and
//! the callbacks that navigate.

use crate::{
    domain::{page_count, PAGE_SIZE},
    format,
    reply::{Button, Keyboard},
    token::TokenKind,
    Result,
};

use super::callback::CallbackData;
use super::HandlerDeps;

pub async fn list_page(deps: &HandlerDeps, page: usize) -> Result<(String, Keyboard)> {
    let (notes, total) = deps
        .store
        .recent_notes((page - 1) * PAGE_SIZE, PAGE_SIZE)
        .await?;
    let pages = page_count(total);

    let mut text = format::list_header();
    for note in &notes {
        let url = deps.preview_url(TokenKind::View, note.id.0);
        text.push_str(&format::note_line(note, &url));
    }
    text.push_str(&format::pagination(page, pages, total));

    Ok((text, nav_row(page, pages, |p| CallbackData::list(p))))
}

pub async fn search_page(
    deps: &HandlerDeps,
    query: &str,
    page: usize,
) -> Result<(String, Keyboard)> {
    let keywords = deps.segmenter.tokenize(query);
    let (notes, total) = deps
        .store
        .search_notes(&keywords, (page - 1) * PAGE_SIZE, PAGE_SIZE)
        .await?;
    let pages = page_count(total);

    let mut text = format::search_header(query);
    for note in &notes {
        let url = deps.preview_url(TokenKind::View, note.id.0);
        text.push_str(&format::note_line(note, &url));
    }
    text.push_str(&format::pagination(page, pages, total));

    let query = query.to_string();
    Ok((
        text,
        nav_row(page, pages, move |p| CallbackData::search(&query, p)),
    ))
}

fn nav_row(page: usize, pages: usize, data: impl Fn(usize) -> CallbackData) -> Keyboard {
    let mut row = Vec::new();
    if page > 1 {
        row.push(Button::callback("Prev", data(page - 1).encode()));
    }
    if pages > page {
        row.push(Button::callback("Next", data(page + 1).encode()));
    }
    Keyboard::single_row(row)
}
