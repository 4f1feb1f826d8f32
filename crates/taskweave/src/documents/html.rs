//! HTML to markdown conversion that collects the links it renders.
use scraper::{ElementRef, Node};
use url::Url;
use uuid::Uuid;

use crate::models::document::{LinkData, LinkKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub markdown: String,
    pub links: Vec<LinkData>,
}

/// Convert an element subtree, resolving relative URLs against `base` when given
pub fn convert_html_to_markdown(root: ElementRef<'_>, base: Option<&Url>) -> Conversion {
    let mut converter = Converter {
        base,
        links: Vec::new(),
    };
    let raw = converter.children(root);
    Conversion {
        markdown: normalize(&raw),
        links: converter.links,
    }
}

struct Converter<'u> {
    base: Option<&'u Url>,
    links: Vec<LinkData>,
}

impl Converter<'_> {
    fn children(&mut self, element: ElementRef<'_>) -> String {
        let mut rendered = String::new();
        for node in element.children() {
            match node.value() {
                Node::Text(text) => rendered.push_str(&collapse_whitespace(text)),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(node) {
                        rendered.push_str(&self.element(child));
                    }
                }
                _ => {}
            }
        }
        rendered
    }

    fn element(&mut self, element: ElementRef<'_>) -> String {
        let name = element.value().name();
        match name {
            "script" | "style" | "head" | "noscript" | "template" => String::new(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = self.children(element);
                format!("\n\n{} {}\n\n", "#".repeat(level), text.trim())
            }
            "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "nav"
            | "aside" | "form" | "table" | "tr" | "blockquote" => {
                let inner = self.children(element);
                if name == "blockquote" {
                    let quoted = inner
                        .trim()
                        .lines()
                        .map(|line| format!("> {}", line))
                        .collect::<Vec<_>>()
                        .join("\n");
                    format!("\n\n{}\n\n", quoted)
                } else {
                    format!("\n\n{}\n\n", inner)
                }
            }
            "br" => "  \n".to_string(),
            "hr" => "\n\n* * *\n\n".to_string(),
            "strong" | "b" => wrap_inline(&self.children(element), "**"),
            "em" | "i" => wrap_inline(&self.children(element), "_"),
            "code" => wrap_inline(&element.text().collect::<String>(), "`"),
            "pre" => format!(
                "\n\n```\n{}\n```\n\n",
                element.text().collect::<String>().trim_end()
            ),
            "ul" | "ol" => self.list(element, name == "ol"),
            "td" | "th" => format!("{} ", self.children(element).trim()),
            "a" => self.link(element),
            "img" => self.image(element),
            "audio" => self.audio(element),
            _ => self.children(element),
        }
    }

    fn list(&mut self, element: ElementRef<'_>, ordered: bool) -> String {
        let items: Vec<String> = element
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "li")
            .enumerate()
            .map(|(index, item)| {
                let marker = if ordered {
                    format!("{}.", index + 1)
                } else {
                    "-".to_string()
                };
                format!("{} {}", marker, normalize(&self.children(item)))
            })
            .collect();
        format!("\n\n{}\n\n", items.join("\n"))
    }

    fn resolve(&self, target: &str) -> String {
        match self.base {
            Some(base) => base
                .join(target)
                .map(|url| url.to_string())
                .unwrap_or_else(|_| target.to_string()),
            None => target.to_string(),
        }
    }

    fn collect(&mut self, url: &str, description: &str, kind: LinkKind) {
        self.links.push(LinkData {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            description: description.to_string(),
            kind,
        });
    }

    fn link(&mut self, element: ElementRef<'_>) -> String {
        let content = self.children(element);
        let href = element.value().attr("href").unwrap_or_default();
        let description = element
            .value()
            .attr("title")
            .filter(|title| !title.is_empty())
            .map(String::from)
            .or_else(|| Some(content.trim().to_string()).filter(|text| !text.is_empty()))
            .unwrap_or_else(|| "Link".to_string());
        let url = self.resolve(href);
        self.collect(&url, &description, LinkKind::Link);
        format!("[{}]({})", description, url)
    }

    fn image(&mut self, element: ElementRef<'_>) -> String {
        let src = element.value().attr("src").unwrap_or_default();
        let alt = element.value().attr("alt").unwrap_or_default();
        let url = self.resolve(src);
        self.collect(&url, alt, LinkKind::Image);
        format!("![{}]({})", alt, url)
    }

    fn audio(&mut self, element: ElementRef<'_>) -> String {
        let alt = element.value().attr("alt").unwrap_or_default().to_string();

        let sources: Vec<String> = match element.value().attr("src") {
            Some(src) => vec![src.to_string()],
            None => element
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == "source")
                .filter_map(|source| source.value().attr("src").map(String::from))
                .filter(|src| !src.is_empty())
                .collect(),
        };

        if sources.is_empty() {
            return "[Audio Not Available]".to_string();
        }

        sources
            .iter()
            .map(|src| {
                let url = self.resolve(src);
                self.collect(&url, &alt, LinkKind::Audio);
                format!("[{}]({})", alt, url)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn collapse_whitespace(text: &str) -> String {
    if text.trim().is_empty() {
        return if text.is_empty() { String::new() } else { " ".to_string() };
    }
    let mut collapsed = String::new();
    if text.starts_with(char::is_whitespace) {
        collapsed.push(' ');
    }
    collapsed.push_str(&text.split_whitespace().collect::<Vec<_>>().join(" "));
    if text.ends_with(char::is_whitespace) {
        collapsed.push(' ');
    }
    collapsed
}

fn wrap_inline(text: &str, marker: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{marker}{trimmed}{marker}")
    }
}

/// Trim every line and keep at most one blank line between blocks
fn normalize(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in raw.lines() {
        let line = line.trim_end();
        let line = if line.trim_start().is_empty() { "" } else { line.trim_start_matches(' ') };
        if line.is_empty() && lines.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
