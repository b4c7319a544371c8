//! Markdown → PDF rendering.
//!
//! Rendering happens in two steps:
//!
//! 1. [`parse_blocks`] and [`layout`] are pure: they turn Markdown into
//!    positioned lines of text on A4 pages. All wrapping and pagination
//!    decisions live here and are unit tested without pdfium.
//! 2. [`render_blocking`] replays those lines as pdfium text objects on the
//!    engine thread and serialises the document.
//!
//! Only the Markdown a review actually contains is supported: ATX headings,
//! bullet and numbered lists, paragraphs, block quotes, fenced code, tables
//! (drawn as monospace rows) and thematic breaks. Inline emphasis, code
//! ticks and link syntax are stripped to their text.

use crate::error::AssistantError;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

// ── Block parsing ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// `#` … `######`; level is clamped to 1–3 for styling.
    Heading(u8),
    Paragraph,
    /// Nesting depth from leading indentation (0 = top level).
    Bullet(u8),
    /// Marker text such as `"3."`.
    Numbered(String),
    Quote,
    /// One line of a fenced block or table.
    Code,
    Rule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
}

impl Block {
    fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*?)\s*#*\s*$").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)[-*+]\s+(.*)$").unwrap());
static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{1,3}[.)])\s+(.*)$").unwrap());
static RE_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{0,3}(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$").unwrap());

/// Split Markdown into renderable blocks.
pub fn parse_blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut in_fence = false;

    let flush = |paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>| {
        if !paragraph.is_empty() {
            blocks.push(Block::new(BlockKind::Paragraph, strip_inline(&paragraph.join(" "))));
            paragraph.clear();
        }
    };

    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            flush(&mut paragraph, &mut blocks);
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            blocks.push(Block::new(BlockKind::Code, line.trim_end()));
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut paragraph, &mut blocks);
            continue;
        }

        if RE_RULE.is_match(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::new(BlockKind::Rule, ""));
        } else if let Some(caps) = RE_HEADING.captures(trimmed) {
            flush(&mut paragraph, &mut blocks);
            let level = caps[1].len().min(3) as u8;
            blocks.push(Block::new(BlockKind::Heading(level), strip_inline(&caps[2])));
        } else if let Some(caps) = RE_BULLET.captures(line) {
            flush(&mut paragraph, &mut blocks);
            let depth = (caps[1].replace('\t', "    ").len() / 2).min(3) as u8;
            blocks.push(Block::new(BlockKind::Bullet(depth), strip_inline(&caps[2])));
        } else if let Some(caps) = RE_NUMBERED.captures(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::new(
                BlockKind::Numbered(caps[1].to_string()),
                strip_inline(&caps[2]),
            ));
        } else if trimmed.starts_with('|') {
            flush(&mut paragraph, &mut blocks);
            if !is_table_separator(trimmed) {
                blocks.push(Block::new(BlockKind::Code, strip_inline(trimmed)));
            }
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::new(BlockKind::Quote, strip_inline(rest.trim())));
        } else {
            paragraph.push(trimmed);
        }
    }
    flush(&mut paragraph, &mut blocks);
    blocks
}

fn is_table_separator(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap());
static RE_STRONG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").unwrap());
static RE_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\s][^*]*)\*").unwrap());
static RE_CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());

/// Remove inline Markdown syntax, keeping the visible text.
pub fn strip_inline(text: &str) -> String {
    let s = RE_IMAGE.replace_all(text, "$1");
    let s = RE_LINK.replace_all(&s, "$1");
    let s = RE_STRONG.replace_all(&s, "$1$2");
    let s = RE_EMPHASIS.replace_all(&s, "$1");
    let s = RE_CODE_SPAN.replace_all(&s, "$1");
    s.trim().to_string()
}

// ── Layout ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontRole {
    Regular,
    Bold,
    Mono,
}

/// A single line of text at an absolute position (PDF points, origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub font: FontRole,
    pub size: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub lines: Vec<PlacedLine>,
}

/// Page size and margins in points.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl PageGeometry {
    pub fn a4() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
            margin: 56.0,
        }
    }

    fn text_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }
}

struct Style {
    font: FontRole,
    size: f32,
    indent: f32,
    space_before: f32,
}

fn style_for(kind: &BlockKind) -> Style {
    match kind {
        BlockKind::Heading(1) => Style { font: FontRole::Bold, size: 18.0, indent: 0.0, space_before: 14.0 },
        BlockKind::Heading(2) => Style { font: FontRole::Bold, size: 15.0, indent: 0.0, space_before: 11.0 },
        BlockKind::Heading(_) => Style { font: FontRole::Bold, size: 13.0, indent: 0.0, space_before: 9.0 },
        BlockKind::Paragraph => Style { font: FontRole::Regular, size: 11.0, indent: 0.0, space_before: 6.0 },
        BlockKind::Bullet(depth) => Style {
            font: FontRole::Regular,
            size: 11.0,
            indent: 14.0 * (*depth as f32 + 1.0),
            space_before: 2.0,
        },
        BlockKind::Numbered(_) => Style { font: FontRole::Regular, size: 11.0, indent: 18.0, space_before: 2.0 },
        BlockKind::Quote => Style { font: FontRole::Regular, size: 11.0, indent: 18.0, space_before: 4.0 },
        BlockKind::Code => Style { font: FontRole::Mono, size: 9.5, indent: 8.0, space_before: 0.0 },
        BlockKind::Rule => Style { font: FontRole::Regular, size: 11.0, indent: 0.0, space_before: 10.0 },
    }
}

const LEADING: f32 = 1.35;

/// Approximate advance width of `ch` in ems for the built-in fonts.
fn char_em(ch: char, font: FontRole) -> f32 {
    if is_wide(ch) {
        return 1.0;
    }
    match font {
        FontRole::Mono => 0.6,
        FontRole::Bold => 0.58,
        FontRole::Regular => 0.52,
    }
}

/// CJK and other full-width characters.
fn is_wide(ch: char) -> bool {
    matches!(ch as u32, 0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF | 0xFE30..=0xFE4F | 0xFF00..=0xFF60 | 0xFFE0..=0xFFE6)
}

fn measure(text: &str, font: FontRole, size: f32) -> f32 {
    text.chars().map(|c| char_em(c, font)).sum::<f32>() * size
}

/// Greedy word wrap. Over-long words (and unspaced CJK runs) are split by character.
pub fn wrap(text: &str, font: FontRole, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    let push_piece = |piece: &str, current: &mut String, lines: &mut Vec<String>| {
        for ch in piece.chars() {
            let mut candidate = current.clone();
            candidate.push(ch);
            if !current.is_empty() && measure(&candidate, font, size) > max_width {
                lines.push(std::mem::take(current));
            }
            current.push(ch);
        }
    };

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if measure(&candidate, font, size) <= max_width {
            current = candidate;
        } else if measure(word, font, size) <= max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current.push_str(word);
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            push_piece(word, &mut current, &mut lines);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Position every block on A4-sized pages. Always returns at least one page.
pub fn layout(blocks: &[Block], geometry: &PageGeometry) -> Vec<PageLayout> {
    let mut pages = vec![PageLayout::default()];
    let top = geometry.height - geometry.margin;
    let mut y = top;

    for block in blocks {
        let style = style_for(&block.kind);
        if y < top {
            y -= style.space_before;
        }
        if block.kind == BlockKind::Rule {
            continue;
        }

        let (prefix, hang) = match &block.kind {
            BlockKind::Bullet(_) => ("\u{2022} ".to_string(), measure("\u{2022} ", style.font, style.size)),
            BlockKind::Numbered(marker) => {
                let p = format!("{marker} ");
                let w = measure(&p, style.font, style.size);
                (p, w)
            }
            _ => (String::new(), 0.0),
        };

        let max_width = geometry.text_width() - style.indent - hang;
        let wrapped = if block.kind == BlockKind::Code {
            wrap_code(&block.text, style.size, max_width)
        } else {
            wrap(&block.text, style.font, style.size, max_width)
        };

        let line_height = style.size * LEADING;
        for (i, text) in wrapped.into_iter().enumerate() {
            if y - line_height < geometry.margin {
                pages.push(PageLayout::default());
                y = top;
            }
            y -= line_height;

            let (x, text) = if i == 0 && !prefix.is_empty() {
                (geometry.margin + style.indent, format!("{prefix}{text}"))
            } else {
                (geometry.margin + style.indent + hang, text)
            };

            if let Some(page) = pages.last_mut() {
                page.lines.push(PlacedLine {
                    x,
                    y,
                    text,
                    font: style.font,
                    size: style.size,
                });
            }
        }
    }
    pages
}

/// Code keeps its spacing; only hard-wrap at the page edge.
fn wrap_code(text: &str, size: f32, max_width: f32) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![String::from(" ")];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        let mut candidate = current.clone();
        candidate.push(ch);
        if !current.is_empty() && measure(&candidate, FontRole::Mono, size) > max_width {
            lines.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    lines.push(current);
    lines
}

// ── pdfium output ────────────────────────────────────────────────────────────

struct FontSet {
    regular: PdfFontToken,
    bold: PdfFontToken,
    mono: PdfFontToken,
}

impl FontSet {
    fn load(document: &mut PdfDocument<'_>, custom: Option<&Path>) -> Result<Self, AssistantError> {
        let fonts = document.fonts_mut();
        match custom {
            Some(path) => {
                let token = fonts.load_true_type_from_file(path, true).map_err(|e| {
                    AssistantError::RenderFailure(format!(
                        "failed to load font '{}': {:?}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Self {
                    regular: token,
                    bold: token,
                    mono: token,
                })
            }
            None => Ok(Self {
                regular: fonts.helvetica(),
                bold: fonts.helvetica_bold(),
                mono: fonts.courier(),
            }),
        }
    }

    fn get(&self, role: FontRole) -> PdfFontToken {
        match role {
            FontRole::Regular => self.regular,
            FontRole::Bold => self.bold,
            FontRole::Mono => self.mono,
        }
    }
}

fn render_err(e: PdfiumError) -> AssistantError {
    AssistantError::RenderFailure(format!("{:?}", e))
}

/// Blocking render; call only from the engine thread.
pub(crate) fn render_blocking(
    pdfium: &Pdfium,
    markdown: &str,
    font: Option<&Path>,
) -> Result<Vec<u8>, AssistantError> {
    if markdown.trim().is_empty() {
        return Err(AssistantError::RenderFailure(
            "nothing to render: markdown is empty".into(),
        ));
    }

    let blocks = parse_blocks(markdown);
    let pages = layout(&blocks, &PageGeometry::a4());
    debug!("Laid out {} blocks on {} pages", blocks.len(), pages.len());

    let mut document = pdfium.create_new_pdf().map_err(render_err)?;
    let fonts = FontSet::load(&mut document, font)?;

    for page_layout in &pages {
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .map_err(render_err)?;
        for line in &page_layout.lines {
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(line.x),
                    PdfPoints::new(line.y),
                    &line.text,
                    fonts.get(line.font),
                    PdfPoints::new(line.size),
                )
                .map_err(render_err)?;
        }
    }

    let bytes = document.save_to_bytes().map_err(render_err)?;
    info!("Rendered PDF: {} pages, {} bytes", pages.len(), bytes.len());
    Ok(bytes)
}
