use crate::invoker::InvokerError;
use std::path::Path;

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "webp", "tif", "tiff"];

/// What to run detection on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    SingleFile(String),
    MultipleFiles(Vec<String>),
    Directory(String),
}

impl SourceSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceSpec::SingleFile(_) => "single_file",
            SourceSpec::MultipleFiles(_) => "multiple_files",
            SourceSpec::Directory(_) => "directory",
        }
    }

    /// Expands the source into the image paths the engine will read.
    ///
    /// Explicit paths are kept verbatim so callers can match results against
    /// what they sent. A directory pattern that matches nothing resolves to an
    /// empty list.
    pub fn resolve(&self) -> Result<Vec<String>, InvokerError> {
        match self {
            SourceSpec::SingleFile(path) => Ok(vec![path.clone()]),
            SourceSpec::MultipleFiles(paths) => Ok(paths.clone()),
            SourceSpec::Directory(pattern) => expand_pattern(pattern),
        }
    }
}

fn expand_pattern(pattern: &str) -> Result<Vec<String>, InvokerError> {
    let pattern = if Path::new(pattern).is_dir() && !has_glob_meta(pattern) {
        format!("{}/*", pattern.trim_end_matches('/'))
    } else {
        pattern.to_string()
    };

    let mut images = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Skipping unreadable glob entry: {}", e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        if is_image(&path) {
            images.push(path.to_string_lossy().into_owned());
        } else {
            tracing::debug!("Skipping non-image file {}", path.display());
        }
    }

    if images.is_empty() {
        tracing::warn!("No images found for pattern {}", pattern);
    }

    Ok(images)
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_explicit_paths_are_kept_verbatim() {
        let single = SourceSpec::SingleFile("./frames/../a.jpg".into());
        assert_eq!(single.resolve().unwrap(), vec!["./frames/../a.jpg"]);

        let many = SourceSpec::MultipleFiles(vec!["b.jpg".into(), "a.jpg".into()]);
        assert_eq!(many.resolve().unwrap(), vec!["b.jpg", "a.jpg"]);
    }

    #[test]
    fn test_glob_keeps_only_images() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "frame_1.jpg");
        touch(dir.path(), "frame_2.PNG");
        touch(dir.path(), "labels.txt");
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let pattern = format!("{}/*", dir.path().display());
        let resolved = SourceSpec::Directory(pattern).resolve().unwrap();

        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().any(|p| p.ends_with("frame_1.jpg")));
        assert!(resolved.iter().any(|p| p.ends_with("frame_2.PNG")));
    }

    #[test]
    fn test_plain_directory_is_listed() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "frame_3.jpg");

        let resolved = SourceSpec::Directory(dir.path().display().to_string())
            .resolve()
            .unwrap();

        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].ends_with("frame_3.jpg"));
    }

    #[test]
    fn test_pattern_without_matches_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.jpg", dir.path().display());

        assert!(SourceSpec::Directory(pattern).resolve().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let result = SourceSpec::Directory("frames/[*.jpg".into()).resolve();
        assert!(matches!(result, Err(InvokerError::Pattern(_))));
    }
}
