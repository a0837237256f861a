//! Import of browser-exported bookmark files (the Netscape `DL`/`DT`/`H3`/`A`
//! format every major browser writes).

use crate::colors::generate_pastel_color;
use crate::state::{AppError, NoteStore, TagStore};
use rand::Rng;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

pub const UNTITLED_BOOKMARK: &str = "Untitled Bookmark";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bookmark {
    pub title: String,
    pub url: Option<String>,
    /// Innermost enclosing folder, if any.
    pub folder: Option<String>,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ImportError {
    #[error("No bookmarks list found in the file.")]
    NoBookmarksList,

    #[error("No bookmarks found in the file. Make sure you exported your bookmarks as HTML.")]
    NoBookmarks,

    #[error("You must be signed in to import bookmarks.")]
    AuthRequired,

    #[error("Failed to import any bookmarks. Check the log for details.")]
    NothingImported,
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(/?)(dl|dt|h3|a)\b([^>]*)>").expect("valid regex")
});

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid regex")
});

static ANY_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid regex")
});

/// Decode the named entities browsers emit plus numeric references.
/// Unknown entities are left as written.
pub fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match name {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn element_text(raw: &str) -> String {
    let text = decode_entities(&ANY_TAG_RE.replace_all(raw, ""));
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn href(attrs: &str) -> Option<String> {
    let caps = HREF_RE.captures(attrs)?;
    let value = caps.get(1).or(caps.get(2)).or(caps.get(3))?.as_str();
    let value = decode_entities(value.trim());
    (!value.is_empty()).then_some(value)
}

/// Parse a bookmark export into a flat list in document order.
///
/// Missing close tags are tolerated; a `</DL>` without an open list ends the
/// parse.
pub fn parse_bookmarks(html: &str) -> Result<Vec<Bookmark>, ImportError> {
    let tokens: Vec<_> = TAG_RE.captures_iter(html).collect();
    let start = tokens
        .iter()
        .position(|c| c[1].is_empty() && c[2].eq_ignore_ascii_case("dl"))
        .ok_or(ImportError::NoBookmarksList)?;

    let text_after = |i: usize| -> &str {
        let from = tokens[i].get(0).map_or(0, |m| m.end());
        let to = tokens
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map_or(html.len(), |m| m.start());
        &html[from..to]
    };

    // One entry per open list: the folder it belongs to.
    let mut lists: Vec<Option<String>> = Vec::new();
    let mut pending_folder: Option<Option<String>> = None;
    let mut bookmarks = Vec::new();

    for i in start..tokens.len() {
        let closing = !tokens[i][1].is_empty();
        let name = tokens[i][2].to_ascii_lowercase();
        match (name.as_str(), closing) {
            ("dl", false) => {
                let inherited = lists.last().cloned().flatten();
                let folder = pending_folder.take().unwrap_or(inherited);
                lists.push(folder);
            }
            ("dl", true) => {
                lists.pop();
                pending_folder = None;
                if lists.is_empty() {
                    break;
                }
            }
            ("h3", false) => {
                let name = element_text(text_after(i));
                pending_folder = Some((!name.is_empty()).then_some(name));
            }
            ("a", false) => {
                let title = element_text(text_after(i));
                bookmarks.push(Bookmark {
                    title: if title.is_empty() {
                        UNTITLED_BOOKMARK.to_string()
                    } else {
                        title
                    },
                    url: href(&tokens[i][3]),
                    folder: lists.last().cloned().flatten(),
                });
            }
            _ => {}
        }
    }

    Ok(bookmarks)
}

/// Folder names in order of first appearance.
pub fn distinct_folders(bookmarks: &[Bookmark]) -> Vec<String> {
    let mut seen = Vec::new();
    for folder in bookmarks.iter().filter_map(|b| b.folder.as_ref()) {
        if !seen.contains(folder) {
            seen.push(folder.clone());
        }
    }
    seen
}

/// Progress of a running import, in the order it happens.
#[derive(Clone, Debug, PartialEq)]
pub enum ImportEvent {
    Parsed { bookmarks: usize },
    CreatingTags { count: usize },
    TagCreated { name: String },
    TagFailed { name: String, error: String },
    Skipped,
    Imported { title: String, count: usize },
    Tagged { title: String, folder: String },
    Failed { title: String, error: String },
}

impl fmt::Display for ImportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportEvent::Parsed { bookmarks } => write!(f, "Found {bookmarks} bookmarks"),
            ImportEvent::CreatingTags { count } => write!(f, "Creating {count} folder tags..."),
            ImportEvent::TagCreated { name } => write!(f, "Created tag: {name}"),
            ImportEvent::TagFailed { name, error } => {
                write!(f, "Error creating tag {name}: {error}")
            }
            ImportEvent::Skipped => write!(f, "Skipping bookmark without URL"),
            ImportEvent::Imported { title, .. } => write!(f, "Imported: {title}"),
            ImportEvent::Tagged { title, folder } => {
                write!(f, "Assigned tag \"{folder}\" to note \"{title}\"")
            }
            ImportEvent::Failed { title, error } => write!(f, "Error with bookmark {title}: {error}"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportReport {
    pub bookmarks_found: usize,
    pub tags_created: usize,
    /// Note rows inserted, whether or not their folder tag was attached.
    pub notes_created: usize,
    pub notes_tagged: usize,
    /// Bookmarks fully imported: note created and, if filed in a folder, tagged.
    pub imported: usize,
    /// Titles of bookmarks whose note exists but whose folder tag could not be attached.
    pub partially_imported: Vec<String>,
    pub skipped: usize,
    /// Title and message of every bookmark or folder that failed.
    pub failures: Vec<(String, String)>,
    /// Set when the session ended mid-import.
    pub aborted: Option<String>,
}

pub async fn import_bookmarks<R>(
    notes: &NoteStore,
    tags: &TagStore,
    html: &str,
    rng: &mut R,
) -> Result<ImportReport, ImportError>
where
    R: Rng + ?Sized,
{
    import_bookmarks_with_progress(notes, tags, html, rng, |_| {}).await
}

/// Create one tag per folder, then one note per bookmark with a URL, tagged
/// with its folder's tag.
pub async fn import_bookmarks_with_progress<R, F>(
    notes: &NoteStore,
    tags: &TagStore,
    html: &str,
    rng: &mut R,
    mut on_event: F,
) -> Result<ImportReport, ImportError>
where
    R: Rng + ?Sized,
    F: FnMut(&ImportEvent),
{
    let bookmarks = parse_bookmarks(html)?;
    on_event(&ImportEvent::Parsed {
        bookmarks: bookmarks.len(),
    });
    if bookmarks.is_empty() {
        return Err(ImportError::NoBookmarks);
    }

    let mut report = ImportReport {
        bookmarks_found: bookmarks.len(),
        ..Default::default()
    };

    let folders = distinct_folders(&bookmarks);
    on_event(&ImportEvent::CreatingTags {
        count: folders.len(),
    });
    let mut folder_tags: HashMap<String, String> = HashMap::new();
    for name in folders {
        match tags.create(&name, &generate_pastel_color(rng)).await {
            Ok(tag) => {
                report.tags_created += 1;
                on_event(&ImportEvent::TagCreated { name: name.clone() });
                folder_tags.insert(name, tag.id);
            }
            Err(e) if e.is_auth() => {
                log::warn!("bookmark import stopped: {e}");
                return Err(ImportError::AuthRequired);
            }
            Err(e) => {
                log::error!("Error creating tag: {e}");
                on_event(&ImportEvent::TagFailed {
                    name: name.clone(),
                    error: e.to_string(),
                });
                report.failures.push((name, e.to_string()));
            }
        }
    }

    for bookmark in &bookmarks {
        let Some(url) = bookmark.url.as_deref() else {
            report.skipped += 1;
            on_event(&ImportEvent::Skipped);
            continue;
        };

        let note = match notes.create(&bookmark.title, url).await {
            Ok(note) => note,
            Err(e) => {
                log::error!("Error importing bookmark: {e}");
                on_event(&ImportEvent::Failed {
                    title: bookmark.title.clone(),
                    error: e.to_string(),
                });
                report.failures.push((bookmark.title.clone(), e.to_string()));
                if matches!(e, AppError::AuthRequired(_)) {
                    report.aborted = Some(ImportError::AuthRequired.to_string());
                    break;
                }
                continue;
            }
        };
        report.notes_created += 1;

        let tag_id = bookmark
            .folder
            .as_ref()
            .and_then(|folder| folder_tags.get(folder).map(|id| (folder, id)));
        if let Some((folder, tag_id)) = tag_id {
            if let Err(e) = tags.add_tag_to_note(&note.id, tag_id).await {
                log::error!("Error tagging imported note: {e}");
                on_event(&ImportEvent::Failed {
                    title: bookmark.title.clone(),
                    error: e.to_string(),
                });
                report.failures.push((bookmark.title.clone(), e.to_string()));
                report.partially_imported.push(bookmark.title.clone());
                continue;
            }
            report.notes_tagged += 1;
            on_event(&ImportEvent::Tagged {
                title: bookmark.title.clone(),
                folder: folder.clone(),
            });
        }

        report.imported += 1;
        on_event(&ImportEvent::Imported {
            title: bookmark.title.clone(),
            count: report.imported,
        });
    }

    if report.notes_created == 0 {
        return Err(if report.aborted.is_some() {
            ImportError::AuthRequired
        } else {
            ImportError::NothingImported
        });
    }

    log::info!(
        "imported {} bookmarks into {} tags",
        report.imported,
        report.tags_created
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemoryService;
    use crate::api::{NOTES_TABLE, NOTE_TAGS_TABLE};
    use crate::state::Stores;
    use futures::executor::block_on;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::rc::Rc;

    const EXPORT: &str = r#"<!DOCTYPE NETSCAPE-Bookmark-file-1>
<META HTTP-EQUIV="Content-Type" CONTENT="text/html; charset=UTF-8">
<TITLE>Bookmarks</TITLE>
<H1>Bookmarks</H1>
<DL><p>
    <DT><A HREF="https://x.com" ADD_DATE="1700000000">Home</A>
    <DT><H3 ADD_DATE="1700000000">Work</H3>
    <DL><p>
        <DT><A HREF="https://mail.com">Mail</A>
    </DL><p>
</DL><p>
"#;

    fn signed_in() -> (Rc<MemoryService>, Stores) {
        let service = Rc::new(MemoryService::new());
        service.add_account("ada@example.com", "hunter22");
        let stores = Stores::new(service.clone());
        block_on(stores.session.sign_in("ada@example.com", "hunter22")).unwrap();
        (service, stores)
    }

    #[test]
    fn test_parse_assigns_folders() {
        let bookmarks = parse_bookmarks(EXPORT).unwrap();
        assert_eq!(
            bookmarks,
            vec![
                Bookmark {
                    title: "Home".into(),
                    url: Some("https://x.com".into()),
                    folder: None,
                },
                Bookmark {
                    title: "Mail".into(),
                    url: Some("https://mail.com".into()),
                    folder: Some("Work".into()),
                },
            ]
        );
    }

    #[test]
    fn test_parse_nested_folder_uses_innermost_name() {
        let html = r#"<DL>
            <DT><H3>Outer</H3>
            <DL>
                <DT><H3>Inner</H3>
                <DL><DT><A HREF="https://deep.example">Deep</A></DL>
                <DT><A HREF="https://shallow.example">Shallow</A>
            </DL>
            <DT><A HREF="https://top.example">Top</A>
        </DL>"#;
        let bookmarks = parse_bookmarks(html).unwrap();
        let folders: Vec<Option<&str>> = bookmarks.iter().map(|b| b.folder.as_deref()).collect();
        assert_eq!(folders, vec![Some("Inner"), Some("Outer"), None]);
        assert_eq!(distinct_folders(&bookmarks), vec!["Inner", "Outer"]);
    }

    #[test]
    fn test_parse_titles_and_urls() {
        let html = r#"<dl>
            <dt><a href='https://a.example/?x=1&amp;y=2'>Tom &amp; Jerry&#39;s <b>page</b></a>
            <dt><a href="https://b.example">   </a>
            <dt><a name="no-href">Orphan</a>
        </dl>"#;
        let bookmarks = parse_bookmarks(html).unwrap();
        assert_eq!(bookmarks[0].title, "Tom & Jerry's page");
        assert_eq!(bookmarks[0].url.as_deref(), Some("https://a.example/?x=1&y=2"));
        assert_eq!(bookmarks[1].title, UNTITLED_BOOKMARK);
        assert_eq!(bookmarks[2].url, None);
    }

    #[test]
    fn test_parse_requires_a_list() {
        assert_eq!(
            parse_bookmarks("<html><body>nothing</body></html>"),
            Err(ImportError::NoBookmarksList)
        );
        assert_eq!(parse_bookmarks("<DL></DL>"), Ok(vec![]));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &#x41;&#66; &bogus;"), "a <b> AB &bogus;");
    }

    #[test]
    fn test_import_creates_folder_tag_and_notes() {
        let (service, stores) = signed_in();
        let mut rng = StdRng::seed_from_u64(1);
        let mut log = Vec::new();

        let report = block_on(import_bookmarks_with_progress(
            &stores.notes,
            &stores.tags,
            EXPORT,
            &mut rng,
            |e| log.push(e.to_string()),
        ))
        .unwrap();

        assert_eq!(report.tags_created, 1);
        assert_eq!(report.notes_created, 2);
        assert_eq!(report.notes_tagged, 1);
        assert_eq!(report.imported, 2);
        assert!(report.partially_imported.is_empty());

        let tags = stores.tags.snapshot().tags;
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "Work");
        assert!(tags[0].color.starts_with("hsl("));

        let notes = stores.notes.snapshot().notes;
        assert_eq!(notes.len(), 2);
        let mail = notes.iter().find(|n| n.title == "Mail").unwrap();
        let home = notes.iter().find(|n| n.title == "Home").unwrap();
        assert_eq!(mail.content, "https://mail.com");
        assert_eq!(home.content, "https://x.com");

        let links = service.rows(NOTE_TAGS_TABLE);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0]["note_id"], serde_json::json!(mail.id));
        assert_eq!(links[0]["tag_id"], serde_json::json!(tags[0].id));

        assert_eq!(log[0], "Found 2 bookmarks");
        assert!(log.contains(&"Assigned tag \"Work\" to note \"Mail\"".to_string()));
    }

    #[test]
    fn test_untagged_folder_bookmark_is_reported_as_partial() {
        let (service, stores) = signed_in();
        service.fail_next("insert", NOTE_TAGS_TABLE);
        let mut counts = Vec::new();

        let report = block_on(import_bookmarks_with_progress(
            &stores.notes,
            &stores.tags,
            EXPORT,
            &mut StdRng::seed_from_u64(4),
            |e| {
                if let ImportEvent::Imported { count, .. } = e {
                    counts.push(*count);
                }
            },
        ))
        .unwrap();

        assert_eq!(report.notes_created, 2);
        assert_eq!(report.notes_tagged, 0);
        assert_eq!(report.imported, 1);
        assert_eq!(report.partially_imported, vec!["Mail".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(counts, vec![1]);
        assert!(service.rows(NOTE_TAGS_TABLE).is_empty());
    }

    #[test]
    fn test_import_skips_bookmarks_without_url() {
        let (_, stores) = signed_in();
        let html = r#"<DL><DT><A>No link</A><DT><A HREF="https://ok.example">Ok</A></DL>"#;
        let report = block_on(import_bookmarks(
            &stores.notes,
            &stores.tags,
            html,
            &mut StdRng::seed_from_u64(2),
        ))
        .unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.notes_created, 1);
    }

    #[test]
    fn test_import_signed_out_fails() {
        let service = Rc::new(MemoryService::new());
        let stores = Stores::new(service.clone());
        let result = block_on(import_bookmarks(
            &stores.notes,
            &stores.tags,
            EXPORT,
            &mut StdRng::seed_from_u64(3),
        ));
        assert_eq!(result, Err(ImportError::AuthRequired));
        assert!(service.rows(NOTES_TABLE).is_empty());
    }

    #[test]
    fn test_import_with_only_failures_is_an_error() {
        let (service, stores) = signed_in();
        let html = r#"<DL><DT><A HREF="https://one.example">One</A></DL>"#;
        service.fail_next("insert", NOTES_TABLE);
        let result = block_on(import_bookmarks(
            &stores.notes,
            &stores.tags,
            html,
            &mut StdRng::seed_from_u64(4),
        ));
        assert_eq!(result, Err(ImportError::NothingImported));
    }

    #[test]
    fn test_import_empty_list_is_an_error() {
        let (_, stores) = signed_in();
        let result = block_on(import_bookmarks(
            &stores.notes,
            &stores.tags,
            "<DL><p></DL>",
            &mut StdRng::seed_from_u64(5),
        ));
        assert_eq!(result, Err(ImportError::NoBookmarks));
    }
}
