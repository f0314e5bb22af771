//! HTML rendering of listing pages

use percent_encoding::utf8_percent_encode;

use crate::app::store::path::PATH_SEGMENT;
use crate::constants::paths;

use super::IndexEntry;

/// Per-request rendering parameters
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Project being listed
    pub project: &'a str,
}

impl<'a> RenderContext<'a> {
    pub fn new(project: &'a str) -> Self {
        Self { project }
    }

    /// Render the simple-index page of the project
    pub fn render(&self, entries: &[IndexEntry]) -> String {
        let mut links = String::new();
        for entry in entries {
            let href = match &entry.fragment {
                Some(fragment) => format!("{}#{}", entry.href, fragment),
                None => entry.href.clone(),
            };
            links.push_str(&format!(
                "<a href=\"{}\">{}</a><br>\n",
                escape_html(&href),
                escape_html(&entry.filename)
            ));
        }
        page(&format!("Links for {}", self.project), &links)
    }
}

/// Render the root page listing every stored project
///
/// With a project URL template, each project also links to its home page.
pub fn render_root(projects: &[String], project_url: Option<&str>) -> String {
    let mut links = String::new();
    for project in projects {
        let encoded = utf8_percent_encode(project, PATH_SEGMENT);
        let name = escape_html(project);
        links.push_str(&format!(
            "<a href=\"{}/{}/\">{}</a>",
            paths::SIMPLE,
            encoded,
            name
        ));
        if project_url.is_some() {
            links.push_str(&format!(
                " (<a href=\"{}/{}\">home</a>)",
                paths::PROJECT,
                encoded
            ));
        }
        links.push_str("<br>\n");
    }
    page("Simple index", &links)
}

fn page(title: &str, body: &str) -> String {
    let title = escape_html(title);
    format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head><body>\n\
         <h1>{title}</h1>\n{body}</body></html>\n"
    )
}

/// Escape text for use in element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
