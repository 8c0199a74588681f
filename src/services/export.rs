//! Document export.
//!
//! Markdown, HTML and LaTeX are rendered in-process from the report's
//! markdown. Word, PowerPoint and PDF are produced by an external
//! renderer behind [`BinaryRenderer`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::ExportConfig;
use crate::error::{Error, Result};

// ============================================================================
// Formats
// ============================================================================

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Word,
    Ppt,
    Pdf,
    Markdown,
    Html,
    Latex,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "word" => Some(Self::Word),
            "ppt" => Some(Self::Ppt),
            "pdf" => Some(Self::Pdf),
            "markdown" => Some(Self::Markdown),
            "html" => Some(Self::Html),
            "latex" => Some(Self::Latex),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Ppt => "ppt",
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Latex => "latex",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Word => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Ppt => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Pdf => "application/pdf",
            Self::Markdown => "text/markdown",
            Self::Html => "text/html",
            Self::Latex => "application/x-latex",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Word => "docx",
            Self::Ppt => "pptx",
            Self::Pdf => "pdf",
            Self::Markdown => "md",
            Self::Html => "html",
            Self::Latex => "tex",
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Word | Self::Ppt | Self::Pdf)
    }
}

// ============================================================================
// Binary rendering
// ============================================================================

/// A presentation slide parsed from markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slide {
    pub title: String,
    pub content: Vec<String>,
}

/// Request sent to a binary renderer.
#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest<'a> {
    pub format: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slides: Option<Vec<Slide>>,
}

/// Produces docx, pptx and pdf bytes.
#[async_trait]
pub trait BinaryRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<u8>>;
}

/// Renderer that posts the document to an HTTP rendering service.
pub struct HttpDocumentRenderer {
    client: Client,
    url: String,
}

impl HttpDocumentRenderer {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl BinaryRenderer for HttpDocumentRenderer {
    async fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<u8>> {
        debug!(format = request.format, url = %self.url, "Rendering binary document");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Renderer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Renderer(format!(
                "renderer returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Renderer(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

// ============================================================================
// Export service
// ============================================================================

/// A rendered document ready to send as an attachment.
#[derive(Debug, Clone)]
pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub filename: String,
    pub etag: String,
}

impl ExportedDocument {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

/// Dispatches exports by format.
#[derive(Clone, Default)]
pub struct ExportService {
    renderer: Option<Arc<dyn BinaryRenderer>>,
}

impl ExportService {
    pub fn new(renderer: Option<Arc<dyn BinaryRenderer>>) -> Self {
        Self { renderer }
    }

    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        let renderer = match &config.renderer_url {
            Some(url) => {
                info!(url = %url, "Binary document renderer configured");
                Some(Arc::new(HttpDocumentRenderer::new(url)?) as Arc<dyn BinaryRenderer>)
            }
            None => None,
        };
        Ok(Self::new(renderer))
    }

    pub async fn export(&self, format: &str, title: &str, content: &str) -> Result<ExportedDocument> {
        let format = ExportFormat::from_str(format)
            .ok_or_else(|| Error::Validation(format!("Unsupported export format: {}", format)))?;

        let bytes = match format {
            ExportFormat::Markdown => render_markdown(title, content).into_bytes(),
            ExportFormat::Html => {
                let date = Utc::now().format("%Y-%m-%d").to_string();
                render_html(title, content, &date).into_bytes()
            }
            ExportFormat::Latex => render_latex(title, content).into_bytes(),
            ExportFormat::Word | ExportFormat::Ppt | ExportFormat::Pdf => {
                let renderer = self.renderer.as_ref().ok_or_else(|| {
                    Error::NotImplemented(format!(
                        "{} export requires a document renderer",
                        format.as_str()
                    ))
                })?;
                let slides = (format == ExportFormat::Ppt).then(|| parse_slides(content));
                renderer
                    .render(&RenderRequest {
                        format: format.as_str(),
                        title,
                        content,
                        slides,
                    })
                    .await?
            }
        };

        let etag = format!("\"{}\"", hex::encode(Sha256::digest(&bytes)));
        let filename = format!("{}.{}", urlencoding::encode(title), format.extension());

        Ok(ExportedDocument {
            bytes,
            mime_type: format.mime_type(),
            filename,
            etag,
        })
    }
}

// ============================================================================
// Text renderers
// ============================================================================

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[(.*?)\]\((.+?)\)").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.+?)\]\((.+?)\)").unwrap());
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").unwrap());
static RE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.+?)`").unwrap());
static RE_SLIDE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#{2,4}\s*(Slide\s*\d+|第\s*\d+\s*页|封面|目录|.*页[:：])").unwrap()
});
static RE_SLIDE_TITLE_AFTER_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"[:：]\s*(.+)").unwrap());
static RE_HEADING_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{2,4}\s*(.+)").unwrap());

/// `# {title}` followed by the content.
pub fn render_markdown(title: &str, content: &str) -> String {
    format!("# {}\n\n{}", title, content)
}

/// Standalone HTML document.
pub fn render_html(title: &str, content: &str, date: &str) -> String {
    let title = escape_html(title);
    let body = markdown_to_html(content);
    format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <meta name="generator" content="DeepDive Engine">
  <title>{title}</title>
  <style>
    body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Arial, sans-serif; line-height: 1.8; max-width: 900px; margin: 0 auto; padding: 60px 40px; color: #1f2937; }}
    h1, h2, h3, h4 {{ line-height: 1.3; margin: 1.5em 0 0.5em; }}
    code {{ background: #f3f4f6; padding: 0.1em 0.3em; border-radius: 3px; }}
    img {{ max-width: 100%; }}
    .footer {{ margin-top: 3em; color: #6b7280; font-size: 0.9em; border-top: 1px solid #e5e7eb; padding-top: 1em; }}
  </style>
</head>
<body>
  <h1>{title}</h1>
{body}
  <div class="footer">
    <p>Generated by DeepDive Engine · {date}</p>
  </div>
</body>
</html>"#
    )
}

/// LaTeX `article` document.
pub fn render_latex(title: &str, content: &str) -> String {
    let title = escape_latex(title);
    let body = markdown_to_latex(content);
    format!(
        r"\documentclass[12pt,a4paper]{{article}}

\usepackage[UTF8]{{ctex}}
\usepackage[margin=2.5cm]{{geometry}}
\usepackage{{amsmath, amssymb}}
\usepackage{{hyperref}}
\usepackage{{enumitem}}
\usepackage{{listings}}

\title{{\textbf{{{title}}}}}
\author{{DeepDive Engine}}
\date{{\today}}

\begin{{document}}

\maketitle

\tableofcontents
\newpage

{body}

\end{{document}}
"
    )
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Split a `#`..`####` heading into its level and text.
fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if (1..=4).contains(&level) {
        line[level..].strip_prefix(' ').map(|text| (level, text.trim()))
    } else {
        None
    }
}

fn list_item(line: &str) -> Option<&str> {
    line.strip_prefix("- ").or_else(|| line.strip_prefix("* "))
}

fn inline_html(escaped: &str) -> String {
    let s = RE_CODE.replace_all(escaped, "<code>${1}</code>");
    let s = RE_BOLD.replace_all(&s, "<strong>${1}</strong>");
    let s = RE_ITALIC.replace_all(&s, "<em>${1}</em>");
    let s = RE_IMAGE.replace_all(&s, r#"<img src="${2}" alt="${1}" />"#);
    let s = RE_LINK.replace_all(&s, r#"<a href="${2}">${1}</a>"#);
    s.into_owned()
}

fn inline_latex(escaped: &str) -> String {
    let s = RE_CODE.replace_all(escaped, r"\texttt{${1}}");
    let s = RE_BOLD.replace_all(&s, r"\textbf{${1}}");
    let s = RE_ITALIC.replace_all(&s, r"\textit{${1}}");
    s.into_owned()
}

/// Convert the markdown subset used by reports to HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_list = false;

    for raw in markdown.lines() {
        let line = raw.trim();

        if let Some(item) = list_item(line) {
            if !in_list {
                out.push("<ul>".to_string());
                in_list = true;
            }
            out.push(format!("<li>{}</li>", inline_html(&escape_html(item))));
            continue;
        }
        if in_list {
            out.push("</ul>".to_string());
            in_list = false;
        }

        if line == "---" {
            out.push("<hr>".to_string());
        } else if let Some((level, text)) = heading(line) {
            out.push(format!(
                "<h{level}>{}</h{level}>",
                inline_html(&escape_html(text))
            ));
        } else if !line.is_empty() {
            out.push(format!("<p>{}</p>", inline_html(&escape_html(line))));
        }
    }

    if in_list {
        out.push("</ul>".to_string());
    }

    out.join("\n")
}

/// Convert the markdown subset used by reports to a LaTeX body.
pub fn markdown_to_latex(markdown: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_list = false;

    for raw in markdown.lines() {
        let line = raw.trim();

        if let Some(item) = list_item(line) {
            if !in_list {
                out.push(r"\begin{itemize}".to_string());
                in_list = true;
            }
            out.push(format!(r"\item {}", inline_latex(&escape_latex(item))));
            continue;
        }
        if in_list {
            out.push(r"\end{itemize}".to_string());
            in_list = false;
        }

        if line == "---" {
            out.push(r"\hrulefill".to_string());
        } else if let Some((level, text)) = heading(line) {
            let command = match level {
                1 => r"\section*",
                2 => r"\section",
                3 => r"\subsection",
                _ => r"\subsubsection",
            };
            out.push(format!("{}{{{}}}", command, inline_latex(&escape_latex(text))));
        } else {
            out.push(inline_latex(&escape_latex(line)));
        }
    }

    if in_list {
        out.push(r"\end{itemize}".to_string());
    }

    out.join("\n")
}

/// Split presentation markdown into slides.
pub fn parse_slides(markdown: &str) -> Vec<Slide> {
    let mut slides = Vec::new();
    let mut current: Option<Slide> = None;

    for raw in markdown.lines() {
        let line = raw.trim();

        if RE_SLIDE_HEADER.is_match(line) {
            if let Some(slide) = current.take() {
                slides.push(slide);
            }
            let title = RE_SLIDE_TITLE_AFTER_COLON
                .captures(line)
                .or_else(|| RE_HEADING_TEXT.captures(line))
                .map(|c| c[1].trim().to_string())
                .unwrap_or_else(|| line.trim_start_matches('#').trim().to_string());
            current = Some(Slide {
                title,
                content: Vec::new(),
            });
        } else if line == "---" {
            if let Some(slide) = current.take() {
                slides.push(slide);
            }
        } else if let Some(slide) = current.as_mut() {
            if !line.is_empty() && !RE_IMAGE.is_match(line) {
                slide.content.push(line.to_string());
            }
        } else if !line.is_empty() && !line.starts_with('#') {
            current = Some(Slide {
                title: format!("Slide {}", slides.len() + 1),
                content: vec![line.to_string()],
            });
        }
    }

    if let Some(slide) = current {
        slides.push(slide);
    }

    slides
}
