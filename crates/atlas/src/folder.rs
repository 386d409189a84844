//! Hierarchical folder layout for on-disk record storage.
//!
//! Every index root (`by-name`, `by-position`, ...) is a [`FolderTree`]
//! whose subfolders are addressed by a [`FolderKey`]: an ordered list of path
//! components produced by a deterministic bucket function. Stores only touch
//! disk through [`Folder`].

use crate::error::{AtlasError, Result};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Ordered path components identifying one leaf folder under an index root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FolderKey(Vec<String>);

impl FolderKey {
    /// Creates a key from its components.
    ///
    /// Components are used verbatim as directory names; callers derive them
    /// from bucket functions that only emit filesystem-safe text.
    pub fn new(components: Vec<String>) -> Self {
        Self(components)
    }

    /// Creates a key from string slices.
    pub fn from_parts(parts: &[&str]) -> Self {
        Self(parts.iter().map(|part| part.to_string()).collect())
    }

    /// The key components in order.
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Returns true if `prefix` matches the leading components of this key.
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        prefix.len() <= self.0.len() && prefix.iter().zip(&self.0).all(|(a, b)| *a == b)
    }
}

impl fmt::Display for FolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// A directory tree addressed by [`FolderKey`]s.
///
/// # Examples
/// ```rust,ignore
/// use alopex_atlas::folder::{FolderKey, FolderTree};
///
/// let tree = FolderTree::new("/data/atlas").subtree("by-position");
/// let folder = tree.create_hierarchical_folder(&FolderKey::from_parts(&["10", "0", "+2", "0"]))?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderTree {
    root: PathBuf,
}

impl FolderTree {
    /// Creates a tree rooted at `root`. Nothing is created on disk.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the tree rooted at the child directory `name`.
    pub fn subtree(&self, name: &str) -> FolderTree {
        FolderTree::new(self.root.join(name))
    }

    /// Returns the direct child folder `name`, which may not exist yet.
    pub fn get_folder(&self, name: &str) -> Folder {
        Folder {
            path: self.root.join(name),
            hierarchy: vec![name.to_string()],
        }
    }

    /// Creates (if needed) and returns the folder addressed by `key`.
    pub fn create_hierarchical_folder(&self, key: &FolderKey) -> Result<Folder> {
        let folder = self.folder_at(key);
        fs::create_dir_all(&folder.path)?;
        Ok(folder)
    }

    /// Returns the existing folder addressed by `key`.
    ///
    /// # Errors
    ///
    /// Returns `FolderNotFound` if the folder does not exist.
    pub fn get_hierarchical_folder(&self, key: &FolderKey) -> Result<Folder> {
        let folder = self.folder_at(key);
        if !folder.is_folder() {
            return Err(AtlasError::FolderNotFound(folder.path));
        }
        Ok(folder)
    }

    /// Returns the folder addressed by `key` if it exists.
    pub fn find_hierarchical_folder(&self, key: &FolderKey) -> Option<Folder> {
        let folder = self.folder_at(key);
        folder.is_folder().then_some(folder)
    }

    /// Removes the whole tree from disk. A missing root is not an error.
    pub fn discard(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn folder_at(&self, key: &FolderKey) -> Folder {
        let mut path = self.root.clone();
        for component in key.components() {
            path.push(component);
        }
        Folder {
            path,
            hierarchy: key.components().to_vec(),
        }
    }
}

/// One directory of a [`FolderTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    path: PathBuf,
    hierarchy: Vec<String>,
}

impl Folder {
    /// Filesystem path of this folder.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Components leading from the tree root to this folder.
    pub fn hierarchy(&self) -> &[String] {
        &self.hierarchy
    }

    /// The hierarchy as a [`FolderKey`].
    pub fn key(&self) -> FolderKey {
        FolderKey::new(self.hierarchy.clone())
    }

    /// Returns true if something exists at this path.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns true if this path is a directory.
    pub fn is_folder(&self) -> bool {
        self.path.is_dir()
    }

    /// Lists direct subfolders, sorted by name. A missing folder lists empty.
    pub fn list(&self) -> Result<Vec<Folder>> {
        let mut folders = Vec::new();
        for (name, path) in self.entries()? {
            if path.is_dir() {
                let mut hierarchy = self.hierarchy.clone();
                hierarchy.push(name);
                folders.push(Folder { path, hierarchy });
            }
        }
        Ok(folders)
    }

    /// Lists the names of regular files, sorted by name.
    pub fn list_files(&self) -> Result<Vec<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|(_, path)| path.is_file())
            .map(|(name, _)| name)
            .collect())
    }

    /// Size in bytes of the file `name`, or `None` if it does not exist.
    pub fn file_size(&self, name: &str) -> Result<Option<u64>> {
        match fs::metadata(self.path.join(name)) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads the whole file `name`.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path.join(name))?)
    }

    /// Replaces the file `name` with `bytes`.
    ///
    /// The content goes to `<name>.tmp` first and is renamed into place, so
    /// readers never see a half-written file.
    pub fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let final_path = self.path.join(name);
        let tmp_path = self.path.join(format!("{name}.tmp"));
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    /// Removes the file `name`. A missing file is not an error.
    pub fn remove_file(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path.join(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// This folder and every folder below it that directly holds files,
    /// in depth-first name order.
    pub fn folders_with_files(&self) -> Result<Vec<Folder>> {
        let mut found = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(folder) = stack.pop() {
            if !folder.list_files()?.is_empty() {
                found.push(folder.clone());
            }
            let mut children = folder.list()?;
            children.reverse();
            stack.extend(children);
        }
        Ok(found)
    }

    fn entries(&self) -> Result<Vec<(String, PathBuf)>> {
        let read_dir = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let name = match entry.file_name().to_str() {
                Some(name) => name.to_string(),
                None => continue,
            };
            entries.push((name, entry.path()));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}
