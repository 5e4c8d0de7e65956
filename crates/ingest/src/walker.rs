//! C7 — Source Walker: breadth-first enumeration over the external
//! Drive-like source, never downloading bytes (spec.md §4.7).

use clients::{DriveChild, SourceClient};
use common_types::Result;
use std::collections::VecDeque;

/// A file (not a folder) discovered by the walker.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: Option<u64>,
}

const FOLDER_MIME: &str = "application/vnd.folder";
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "heif"];

/// Breadth-first walk starting at `root_folder_id`. Folders are
/// descended; files matching an image extension or `.zip` are yielded.
/// Paging within a folder is followed to completion by the `SourceClient`
/// implementation itself (spec.md §6 `list_children`).
pub async fn walk_folder(
    client: &dyn SourceClient,
    access_token: &str,
    root_folder_id: &str,
) -> Result<Vec<WalkedFile>> {
    let mut queue: VecDeque<String> = VecDeque::from([root_folder_id.to_string()]);
    let mut out = Vec::new();

    while let Some(folder_id) = queue.pop_front() {
        let children = client.list_children(&folder_id, access_token).await?;
        for child in children {
            if is_folder(&child) {
                queue.push_back(child.id);
            } else if is_relevant_file(&child) {
                out.push(WalkedFile {
                    id: child.id,
                    name: child.name,
                    mime_type: child.mime_type,
                    size: child.size,
                });
            }
        }
    }

    Ok(out)
}

fn is_folder(child: &DriveChild) -> bool {
    child.mime_type == FOLDER_MIME
}

fn is_relevant_file(child: &DriveChild) -> bool {
    if child.name.to_lowercase().ends_with(".zip") {
        return true;
    }
    child
        .name
        .rsplit('.')
        .next()
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_images_and_zips_by_extension() {
        let zip = DriveChild {
            id: "1".into(),
            name: "archive.ZIP".into(),
            mime_type: "application/zip".into(),
            size: Some(10),
        };
        let jpg = DriveChild {
            id: "2".into(),
            name: "photo.JPG".into(),
            mime_type: "image/jpeg".into(),
            size: Some(10),
        };
        let txt = DriveChild {
            id: "3".into(),
            name: "notes.txt".into(),
            mime_type: "text/plain".into(),
            size: Some(10),
        };
        assert!(is_relevant_file(&zip));
        assert!(is_relevant_file(&jpg));
        assert!(!is_relevant_file(&txt));
    }

    #[test]
    fn folder_mime_is_not_a_relevant_file() {
        let folder = DriveChild {
            id: "1".into(),
            name: "vacation".into(),
            mime_type: FOLDER_MIME.into(),
            size: None,
        };
        assert!(is_folder(&folder));
    }
}
