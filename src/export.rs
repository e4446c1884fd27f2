//! ZIP bundles of downloaded chapters
//!
//! A bundle holds an index page plus one file per downloaded chapter, named
//! `0001-<slug>.txt` (or `.html`) after the chapter's position and title.
//! Chapters that failed to download are listed in the index as unavailable.

use crate::bulk::BulkChapter;
use crate::error::{Error, Result};
use crate::types::Work;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::{Seek, Write};
use std::sync::LazyLock;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

static NON_SLUG: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+"));
static PARAGRAPH_BREAK: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\r?\n\s*\r?\n"));

const MAX_SLUG_LEN: usize = 48;

/// Bundle file format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Plain `.txt` files
    #[default]
    Text,
    /// Minimal `.html` pages
    Html,
}

impl ExportFormat {
    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Html => "html",
        }
    }
}

fn pattern(
    regex: &'static LazyLock<std::result::Result<Regex, regex::Error>>,
) -> Result<&'static Regex> {
    regex
        .as_ref()
        .map_err(|e| Error::Other(format!("export pattern failed to compile: {e}")))
}

/// Lowercase ASCII slug of `title`, or `"chapter"` if nothing survives
pub fn slugify(title: &str) -> Result<String> {
    let lowered = title.to_lowercase();
    let slug = pattern(&NON_SLUG)?.replace_all(&lowered, "-");
    let mut slug = slug.trim_matches('-').to_string();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    if slug.is_empty() {
        slug.push_str("chapter");
    }
    Ok(slug)
}

/// Escape `&`, `<`, `>`, `"` and `'` for HTML text and attributes
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

fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n",
        title = escape_html(title),
    )
}

fn html_paragraphs(text: &str) -> Result<String> {
    let mut body = String::new();
    for paragraph in pattern(&PARAGRAPH_BREAK)?.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let lines: Vec<String> = paragraph.lines().map(|line| escape_html(line.trim())).collect();
        body.push_str("<p>");
        body.push_str(&lines.join("<br>\n"));
        body.push_str("</p>\n");
    }
    Ok(body)
}

/// Bundle file name of a chapter
fn chapter_file_name(chapter: &BulkChapter, format: ExportFormat) -> Result<String> {
    Ok(format!(
        "{:04}-{}.{}",
        chapter.number,
        slugify(&chapter.chapter.title)?,
        format.extension()
    ))
}

fn render_index(
    work: &Work,
    chapters: &[BulkChapter],
    names: &[Option<String>],
    format: ExportFormat,
) -> String {
    let title = work.display_title();
    match format {
        ExportFormat::Text => {
            let mut index = format!("{title}\n{}\n\n", "=".repeat(title.chars().count()));
            for (chapter, name) in chapters.iter().zip(names) {
                match name {
                    Some(name) => index.push_str(&format!(
                        "{:>4}. {} ({name})\n",
                        chapter.number, chapter.chapter.title
                    )),
                    None => index.push_str(&format!(
                        "{:>4}. {} (unavailable)\n",
                        chapter.number, chapter.chapter.title
                    )),
                }
            }
            index
        }
        ExportFormat::Html => {
            let mut list = String::from("<ol>\n");
            for (chapter, name) in chapters.iter().zip(names) {
                let title = escape_html(&chapter.chapter.title);
                match name {
                    Some(name) => list.push_str(&format!(
                        "<li value=\"{}\"><a href=\"{}\">{title}</a></li>\n",
                        chapter.number,
                        escape_html(name)
                    )),
                    None => list.push_str(&format!(
                        "<li value=\"{}\">{title} <em>(unavailable)</em></li>\n",
                        chapter.number
                    )),
                }
            }
            list.push_str("</ol>\n");
            html_page(title, &list)
        }
    }
}

/// Write a ZIP bundle of `chapters` to `writer`, returning the writer
///
/// # Errors
///
/// Fails on ZIP or I/O errors from `writer`. Chapters that failed to
/// download never fail the export.
pub fn write_zip<W: Write + Seek>(
    work: &Work,
    chapters: &[BulkChapter],
    format: ExportFormat,
    writer: W,
) -> Result<W> {
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    let mut names = Vec::with_capacity(chapters.len());
    for chapter in chapters {
        let Some(content) = chapter.content() else {
            names.push(None);
            continue;
        };

        let name = chapter_file_name(chapter, format)?;
        let body = match format {
            ExportFormat::Text => format!("{}\n\n{}\n", chapter.chapter.title, content.trim_end()),
            ExportFormat::Html => html_page(&chapter.chapter.title, &html_paragraphs(content)?),
        };

        zip.start_file(name.as_str(), options)?;
        zip.write_all(body.as_bytes())?;
        names.push(Some(name));
    }

    let index = render_index(work, chapters, &names, format);
    zip.start_file(format!("index.{}", format.extension()), options)?;
    zip.write_all(index.as_bytes())?;

    let written = names.iter().flatten().count();
    tracing::info!(
        work_id = %work.id,
        format = format.extension(),
        written,
        unavailable = chapters.len() - written,
        "Exported chapter bundle"
    );

    Ok(zip.finish()?)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::types::{CachedChapterRecord, ChapterRef, ChapterSource};
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn loaded(number: usize, title: &str, content: &str) -> BulkChapter {
        BulkChapter {
            number,
            chapter: ChapterRef::new(number.to_string(), title),
            result: Ok((ChapterSource::Network, CachedChapterRecord::new(content))),
        }
    }

    fn missing(number: usize, title: &str) -> BulkChapter {
        BulkChapter {
            number,
            chapter: ChapterRef::new(number.to_string(), title),
            result: Err(Error::Fetch(FetchError::EmptyBody {
                url: "https://example.com".into(),
            })),
        }
    }

    fn export(chapters: &[BulkChapter], format: ExportFormat) -> ZipArchive<Cursor<Vec<u8>>> {
        let work = Work::new("w", "site", Vec::new()).with_title("A <Tale>");
        let cursor = write_zip(&work, chapters, format, Cursor::new(Vec::new())).unwrap();
        ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap()
    }

    fn read(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut text = String::new();
        archive
            .by_name(name)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        text
    }

    #[test]
    fn slugs_are_lowercase_ascii() {
        assert_eq!(slugify("Chapter 1: The Beginning!").unwrap(), "chapter-1-the-beginning");
        assert_eq!(slugify("  --  ").unwrap(), "chapter");
        assert_eq!(slugify("第一章").unwrap(), "chapter");
        assert!(slugify(&"long title ".repeat(20)).unwrap().len() <= MAX_SLUG_LEN);
    }

    #[test]
    fn html_escaping() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn text_bundle_has_index_and_numbered_files() {
        let chapters = vec![
            loaded(1, "Prologue", "Once upon a time."),
            missing(2, "Lost Chapter"),
            loaded(12, "The End", "Fin."),
        ];
        let mut archive = export(&chapters, ExportFormat::Text);

        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["0001-prologue.txt", "0012-the-end.txt", "index.txt"]);

        assert_eq!(read(&mut archive, "0001-prologue.txt"), "Prologue\n\nOnce upon a time.\n");
        let index = read(&mut archive, "index.txt");
        assert!(index.starts_with("A <Tale>\n"));
        assert!(index.contains("2. Lost Chapter (unavailable)"));
        assert!(index.contains("12. The End (0012-the-end.txt)"));
    }

    #[test]
    fn html_bundle_escapes_and_wraps_paragraphs() {
        let chapters = vec![loaded(1, "One & Two", "First <line>\nsame para\n\nSecond")];
        let mut archive = export(&chapters, ExportFormat::Html);

        let page = read(&mut archive, "0001-one-two.html");
        assert!(page.contains("<title>One &amp; Two</title>"));
        assert!(page.contains("<p>First &lt;line&gt;<br>\nsame para</p>\n<p>Second</p>"));

        let index = read(&mut archive, "index.html");
        assert!(index.contains("<h1>A &lt;Tale&gt;</h1>"));
        assert!(index.contains("<a href=\"0001-one-two.html\">One &amp; Two</a>"));
    }

    #[test]
    fn entries_are_deflated() {
        let chapters = vec![loaded(1, "Long", &"words ".repeat(500))];
        let mut archive = export(&chapters, ExportFormat::Text);

        let entry = archive.by_name("0001-long.txt").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        assert!(entry.compressed_size() < entry.size());
    }
}
