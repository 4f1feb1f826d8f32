pub mod html;

use scraper::{ElementRef, Html};
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::errors::{PipelineError, PipelineResult};
use crate::http::HttpClient;
use crate::models::document::Document;
use html::convert_html_to_markdown;

/// Fetches web pages and turns them into [`Document`]s
#[derive(Clone)]
pub struct DocumentService {
    http: HttpClient,
}

impl DocumentService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn web_page_as_document(&self, url: &str) -> PipelineResult<Document> {
        let page = Url::parse(url).map_err(|e| PipelineError::execution("Parse URL", e))?;
        let body = self.http.get_text(url).await?;
        let document = html_to_document(url, &page, &body);
        info!(url, title = %document.title, links = document.links.len(), "Fetched document");
        Ok(document)
    }
}

fn find_element<'a>(html: &'a Html, name: &str) -> Option<ElementRef<'a>> {
    html.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == name)
}

/// Relative links are resolved against the page origin, e.g. `https://host/`
fn origin(page: &Url) -> Option<Url> {
    Url::parse(&page.origin().ascii_serialization()).ok()
}

fn html_to_document(url: &str, page: &Url, body: &str) -> Document {
    let html = Html::parse_document(body);

    let title = find_element(&html, "title")
        .map(|title| title.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let base = origin(page);
    let root = find_element(&html, "body").unwrap_or_else(|| html.root_element());
    let conversion = convert_html_to_markdown(root, base.as_ref());

    Document {
        id: Uuid::new_v4().to_string(),
        url: url.to_string(),
        title,
        content: conversion.markdown,
        links: conversion.links,
    }
}
