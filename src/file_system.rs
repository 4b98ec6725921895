use crate::models::FileEntry;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;

/// Files are read with this much concurrency when building a listing.
const READ_CONCURRENCY: usize = 16;

pub fn natural_compare(a: &str, b: &str) -> std::cmp::Ordering {
    natord::compare(a, b)
}

/// Every file under `dir`, depth first, folders before files and names in
/// natural order at each level. Directories themselves are not returned, and
/// symlinks are skipped so the listing never leaves the storage root.
pub fn collect_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    debug!("Collecting files under: {}", dir.display());
    let mut dirents = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_symlink() {
            debug!("Skipping symlink: {}", entry.path().display());
            continue;
        }
        dirents.push(entry);
    }

    dirents.sort_by(|a, b| {
        let a_is_dir = a.file_type().map_or(false, |ft| ft.is_dir());
        let b_is_dir = b.file_type().map_or(false, |ft| ft.is_dir());
        if a_is_dir != b_is_dir {
            return b_is_dir.cmp(&a_is_dir);
        }
        natural_compare(&a.file_name().to_string_lossy(), &b.file_name().to_string_lossy())
    });

    let mut files = Vec::new();
    for entry in dirents {
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            files.extend(collect_files(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}

/// Client-facing path: `<root_name>/<relative path>` with `/` separators.
pub fn listing_path(root: &Path, root_name: &str, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", root_name, joined.replace('\\', "/"))
}

/// Lists every file under the storage root with its content, so a client can
/// rebuild its file tree from what is actually on disk.
pub async fn list_files(root: &Path, root_name: &str) -> io::Result<Vec<FileEntry>> {
    let walk_root = root.to_path_buf();
    let paths = tokio::task::spawn_blocking(move || collect_files(&walk_root))
        .await
        .map_err(io::Error::other)??;
    debug!("Listing {} files under {}", paths.len(), root.display());

    stream::iter(paths)
        .map(|path| async move {
            let bytes = tokio_fs::read(&path).await?;
            Ok::<_, io::Error>(FileEntry {
                path: listing_path(root, root_name, &path),
                content: String::from_utf8_lossy(&bytes).into_owned(),
            })
        })
        .buffered(READ_CONCURRENCY)
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[actix_rt::test]
    async fn lists_files_with_prefixed_paths() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("tea_site/css")).unwrap();
        fs::create_dir_all(root.join("empty_folder")).unwrap();
        fs::write(root.join("tea_site/index.html"), "<html></html>").unwrap();
        fs::write(root.join("tea_site/css/style.css"), "body {}").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let files = list_files(root, "server").await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "server/tea_site/css/style.css",
                "server/tea_site/index.html",
                "server/notes.txt",
            ]
        );
        assert_eq!(files[1].content, "<html></html>");
        assert_eq!(files[2].content, "");
    }

    #[test]
    fn natural_order_within_a_folder() {
        let dir = TempDir::new().unwrap();
        for name in ["page10.html", "page2.html", "page1.html"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let names: Vec<_> = collect_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["page1.html", "page2.html", "page10.html"]);
    }

    #[cfg(unix)]
    #[actix_rt::test]
    async fn symlinks_are_not_listed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("server");
        let outside = dir.path().join("outside");
        fs::create_dir_all(root.join("site")).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "secret").unwrap();
        fs::write(root.join("site/index.html"), "<p>").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("dir_link")).unwrap();
        std::os::unix::fs::symlink(outside.join("secret.txt"), root.join("site/file_link.txt"))
            .unwrap();

        let files = list_files(&root, "server").await.unwrap();
        assert_eq!(
            files,
            vec![FileEntry {
                path: "server/site/index.html".to_string(),
                content: "<p>".to_string(),
            }]
        );
    }

    #[actix_rt::test]
    async fn missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(list_files(&dir.path().join("gone"), "server").await.is_err());
    }
}
