//! HTML page rendering.
//!
//! Pages are [upon] templates embedded into the binary with
//! [`rust-embed`](rust_embed). Every value is HTML-escaped on output; upon
//! has no equality operators, so each tree row carries the flags the template
//! branches on.

use crate::error::{ErrorKind, Result};
use bucketview_storage::key::DELIMITER;
use bucketview_tree::{Row, TreeNode, format_size};
use exn::{OptionExt, ResultExt};
use rocket::http::RawStr;
use rust_embed::Embed;
use serde::Serialize;
use tracing::instrument;
use upon::{Engine, Template};

const INDEX: &str = "index.html";

#[derive(Embed)]
#[folder = "assets/templates/"]
struct Templates;
impl Templates {
    fn load(name: &'static str) -> Result<String> {
        let file = Self::get(name).ok_or_raise(|| ErrorKind::AssetNotFound(name))?;
        String::from_utf8(file.data.into_owned()).or_raise(|| ErrorKind::Template)
    }
}

pub struct Renderer {
    engine: Engine<'static>,
    index: Template<'static>,
}
impl Renderer {
    /// Compiles the embedded templates.
    pub fn new() -> Result<Self> {
        let mut engine = Engine::new();
        engine.set_default_formatter(&upon::fmt::escape_html);
        let index = engine.compile(Templates::load(INDEX)?).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, index })
    }

    /// The bucket browser page.
    #[instrument(skip_all, fields(bucket = %bucket))]
    pub fn index(&self, title: &str, bucket: &str, tree: &TreeNode) -> Result<String> {
        let context = IndexContext {
            title,
            bucket,
            file_count: tree.file_count(),
            folder_count: tree.folder_count(),
            total_size: format_size(tree.total_size()),
            rows: tree.rows().into_iter().enumerate().map(RowView::from).collect(),
        };
        self.index.render(&self.engine, &context).to_string().or_raise(|| ErrorKind::Template)
    }
}

#[derive(Serialize)]
struct IndexContext<'a> {
    title: &'a str,
    bucket: &'a str,
    file_count: usize,
    folder_count: usize,
    total_size: String,
    rows: Vec<RowView>,
}

/// One row of the tree. Exactly one of `file`/`folder` is set, or neither
/// for the row closing a folder.
#[derive(Serialize)]
struct RowView {
    file: Option<FileView>,
    folder: Option<FolderView>,
}

#[derive(Serialize)]
struct FileView {
    name: String,
    href: String,
    size: String,
}

#[derive(Serialize)]
struct FolderView {
    id: String,
    name: String,
    path: String,
}

impl From<(usize, Row<'_>)> for RowView {
    fn from((position, row): (usize, Row<'_>)) -> Self {
        match row {
            Row::File { entry, .. } => Self {
                file: Some(FileView {
                    name: entry.name.clone(),
                    href: format!("/download/{}", encode_key(&entry.key)),
                    size: format_size(entry.size),
                }),
                folder: None,
            },
            Row::FolderStart { name, path, .. } => Self {
                file: None,
                folder: Some(FolderView { id: format!("folder-{position}"), name: name.to_string(), path }),
            },
            Row::FolderEnd { .. } => Self { file: None, folder: None },
        }
    }
}

/// Percent-encodes each segment of a key for use in a URL path.
fn encode_key(key: &str) -> String {
    key.split(DELIMITER).map(|segment| RawStr::new(segment).percent_encode().to_string()).collect::<Vec<_>>().join("/")
}
