use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Suffix of in-flight downloads; never counts as an existing save.
pub const PART_SUFFIX: &str = ".part";

/// Strip characters that are invalid in filenames on common filesystems.
pub fn clean_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect()
}

/// Every saved rendition of a photo starts with `{account}.{photo}.`.
pub fn file_prefix(account_id: &str, photo_id: &str) -> String {
    format!("{}.{}.", clean_filename(account_id), clean_filename(photo_id))
}

pub fn local_save_path(directory: &Path, account_id: &str, photo_id: &str, ext: &str) -> PathBuf {
    directory.join(format!(
        "{}{}",
        file_prefix(account_id, photo_id),
        clean_filename(ext)
    ))
}

pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

/// Snapshot of the file names in the output directory, taken once per sweep.
#[derive(Debug, Default)]
pub struct ExistingFiles {
    names: BTreeSet<String>,
}

impl ExistingFiles {
    pub async fn scan(directory: &Path) -> std::io::Result<Self> {
        let mut names = BTreeSet::new();
        let mut entries = tokio::fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if !name.ends_with(PART_SUFFIX) {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(Self { names })
    }

    /// First file whose name starts with `prefix`, whatever its extension.
    pub fn find(&self, prefix: &str) -> Option<&str> {
        self.names
            .range(prefix.to_string()..)
            .next()
            .filter(|name| name.starts_with(prefix))
            .map(String::as_str)
    }

    pub fn insert(&mut self, name: String) {
        self.names.insert(name);
    }
}
