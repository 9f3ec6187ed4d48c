//! Serving a document root.

use futures_util::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::HeadError;
use crate::heads::HandlerFuture;
use crate::model::Response;

const DEFAULT_INDEX_FILES: [&str; 4] = ["index.html", "index.htm", "home.html", "home.htm"];

/// Serves files under `document_root` for requests below the head's mount path.
#[derive(Debug, Clone)]
pub struct FilesystemHead {
    document_root: PathBuf,
    index_files: Arc<Vec<String>>,
}

impl FilesystemHead {
    pub fn new(document_root: impl Into<PathBuf>) -> Self {
        Self {
            document_root: document_root.into(),
            index_files: Arc::new(DEFAULT_INDEX_FILES.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn with_index_files(mut self, index_files: Vec<String>) -> Self {
        self.index_files = Arc::new(index_files);
        self
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    /// Serve `relative` (the request path below the mount point).
    pub(crate) fn serve(&self, relative: String, res: Response) -> HandlerFuture {
        let root = self.document_root.clone();
        let index_files = self.index_files.clone();

        async move {
            let Some(mut target) = resolve(&root, &relative) else {
                tracing::warn!(path = %relative, "Rejected path traversal");
                res.set_status(403);
                res.send("Forbidden")?;
                return Ok(());
            };

            let is_dir = match tokio::fs::metadata(&target).await {
                Ok(meta) => meta.is_dir(),
                Err(_) => return not_found(&res),
            };
            if is_dir {
                let mut index = None;
                for name in index_files.iter() {
                    let candidate = target.join(name);
                    if tokio::fs::metadata(&candidate)
                        .await
                        .is_ok_and(|m| m.is_file())
                    {
                        index = Some(candidate);
                        break;
                    }
                }
                match index {
                    Some(found) => target = found,
                    None => return not_found(&res),
                }
            }

            let body = tokio::fs::read(&target).await?;
            tracing::debug!(file = %target.display(), bytes = body.len(), "Serving file");
            res.set_header("content-type", content_type_for(&target));
            res.send(body)?;
            Ok(())
        }
        .boxed()
    }
}

fn not_found(res: &Response) -> Result<(), HeadError> {
    res.set_status(404);
    res.send("Not Found")?;
    Ok(())
}

/// Join `relative` onto `root`, refusing any `..` segment.
fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') => return None,
            s => path.push(s),
        }
    }
    Some(path)
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fetch(head: &FilesystemHead, relative: &str) -> Response {
        let res = Response::new();
        res.on_end(|_| {});
        head.serve(relative.to_string(), res.clone()).await.unwrap();
        res
    }

    #[tokio::test]
    async fn test_serves_file_with_content_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.css"), "body{}").unwrap();
        let head = FilesystemHead::new(dir.path());

        let res = fetch(&head, "/app.css").await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.header("content-type").as_deref(), Some("text/css"));
        assert_eq!(&res.body()[..], b"body{}");
    }

    #[tokio::test]
    async fn test_directory_uses_index_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/home.html"), "<h1>home</h1>").unwrap();
        let head = FilesystemHead::new(dir.path());

        let res = fetch(&head, "/docs").await;
        assert_eq!(res.header("content-type").as_deref(), Some("text/html"));
        assert_eq!(&res.body()[..], b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let head = FilesystemHead::new(dir.path());

        let res = fetch(&head, "/nope.txt").await;
        assert_eq!(res.status(), 404);
        assert_eq!(&res.body()[..], b"Not Found");
    }

    #[tokio::test]
    async fn test_traversal_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let head = FilesystemHead::new(dir.path());

        let res = fetch(&head, "/../etc/passwd").await;
        assert_eq!(res.status(), 403);
    }

    #[test]
    fn test_resolve_skips_empty_segments() {
        let root = Path::new("/srv");
        assert_eq!(resolve(root, "//a/./b"), Some(PathBuf::from("/srv/a/b")));
        assert_eq!(resolve(root, ""), Some(PathBuf::from("/srv")));
        assert_eq!(resolve(root, "/a/../b"), None);
    }
}
