use bucketview_storage::ObjectRecord;
use bucketview_storage::key::DELIMITER;
use std::collections::BTreeMap;
use tracing::instrument;

/// A file shown in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Final key segment.
    pub name: String,
    /// Full object key, used to address downloads.
    pub key: String,
    pub size: u64,
}

/// One folder level of the virtual hierarchy.
///
/// The root is a `TreeNode` with an implicit empty name. Subfolders are keyed
/// by their segment name in a [`BTreeMap`] so they iterate in lexicographic
/// order; files are sorted by full key once construction finishes. A tree is
/// built fresh from one listing and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNode {
    pub files: Vec<FileEntry>,
    pub folders: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    /// Builds the folder hierarchy implied by a flat listing.
    ///
    /// Every key is split on the delimiter; all segments but the last name a
    /// chain of folders (created on first use, reused afterwards) and the last
    /// segment becomes a file in the deepest folder. A key ending in the
    /// delimiter is a folder marker: it creates its folder chain but adds no
    /// file. Construction is total; odd keys (empty, leading or doubled
    /// delimiters) just produce oddly named folders.
    ///
    /// ```
    /// use bucketview_storage::ObjectRecord;
    /// use bucketview_tree::TreeNode;
    ///
    /// let tree = TreeNode::build(&[ObjectRecord::new("a/b.txt", 10), ObjectRecord::new("root.txt", 5)]);
    /// assert_eq!(tree.files[0].name, "root.txt");
    /// assert_eq!(tree.folders["a"].files[0].key, "a/b.txt");
    /// ```
    #[instrument(skip_all)]
    pub fn build<'r>(records: impl IntoIterator<Item = &'r ObjectRecord>) -> Self {
        let mut root = Self::default();
        let mut count: usize = 0;
        for record in records {
            let segments: Vec<&str> = record.key.split(DELIMITER).collect();
            root.insert(&segments, record);
            count += 1;
        }
        root.sort();
        tracing::debug!(records = count, folders = root.folder_count(), "Folder tree built");
        root
    }

    fn insert(&mut self, segments: &[&str], record: &ObjectRecord) {
        match segments {
            [] => {},
            [name] => {
                if !name.is_empty() {
                    self.files.push(FileEntry { name: name.to_string(), key: record.key.clone(), size: record.size });
                }
            },
            [folder, rest @ ..] => self.folder_mut(folder).insert(rest, record),
        }
    }

    /// The only structural mutation: look a subfolder up, creating it if new.
    fn folder_mut(&mut self, name: &str) -> &mut TreeNode {
        self.folders.entry(name.to_string()).or_default()
    }

    fn sort(&mut self) {
        self.files.sort_by(|a, b| a.key.cmp(&b.key));
        self.folders.values_mut().for_each(TreeNode::sort);
    }

    /// Number of files at this level and below.
    pub fn file_count(&self) -> usize {
        self.files.len() + self.folders.values().map(TreeNode::file_count).sum::<usize>()
    }

    /// Number of folders below this level (not counting itself).
    pub fn folder_count(&self) -> usize {
        self.folders.len() + self.folders.values().map(TreeNode::folder_count).sum::<usize>()
    }

    /// Total size of all files at this level and below.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum::<u64>() + self.folders.values().map(TreeNode::total_size).sum::<u64>()
    }

    /// Follows a `/`-separated folder path down from this node.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        path.split(DELIMITER).filter(|s| !s.is_empty()).try_fold(self, |node, segment| node.folders.get(segment))
    }

    /// Flattens the tree into display order: this level's files, then each
    /// subfolder by name, recursing depth-first. Every folder is bracketed by a
    /// [`Row::FolderStart`] / [`Row::FolderEnd`] pair.
    pub fn rows(&self) -> Vec<Row<'_>> {
        let mut rows = Vec::new();
        self.push_rows(&mut rows, "", 0);
        rows
    }

    fn push_rows<'t>(&'t self, rows: &mut Vec<Row<'t>>, parent: &str, depth: usize) {
        rows.extend(self.files.iter().map(|entry| Row::File { depth, entry }));
        for (name, folder) in &self.folders {
            let path = match parent.is_empty() {
                true => name.clone(),
                false => format!("{parent}{DELIMITER}{name}"),
            };
            rows.push(Row::FolderStart { depth, name: name.as_str(), path: path.clone() });
            folder.push_rows(rows, &path, depth + 1);
            rows.push(Row::FolderEnd { depth });
        }
    }
}

/// One step of a depth-first walk over a [`TreeNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row<'t> {
    File { depth: usize, entry: &'t FileEntry },
    FolderStart { depth: usize, name: &'t str, path: String },
    FolderEnd { depth: usize },
}
