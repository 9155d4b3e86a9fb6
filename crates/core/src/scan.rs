//! Scanner module for discovering image files under the input root.
//!
//! This module provides functionality to recursively scan the input directory
//! for supported image files, filtering by extension and skipping hidden
//! directories. Enumeration order is deterministic (sorted by file name) so
//! that checkpoint cadence and resume behavior are reproducible for an
//! unchanged directory.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Image file extensions supported by the scanner (case-insensitive matching).
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".tiff", ".bmp"];

/// Checks if a file has a supported image extension (case-insensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = format!(".{}", ext.to_lowercase());
            IMAGE_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// Scans the input root for candidate image files.
///
/// This function:
/// - Recursively walks the input root in sorted order
/// - Skips hidden directories (names starting with `.`)
/// - Filters files by supported image extensions (case-insensitive)
pub fn scan_inputs(root: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if !root.exists() {
        return candidates;
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            // Skip hidden directories, but allow the root even if it starts with '.'
            if entry.file_type().is_dir() && entry.depth() > 0 {
                if let Some(name) = entry.file_name().to_str() {
                    if name.starts_with('.') {
                        return false;
                    }
                }
            }
            true
        });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        if !is_image_file(entry.path()) {
            continue;
        }

        candidates.push(entry.path().to_path_buf());
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    #[test]
    fn test_image_extensions_defined() {
        assert!(IMAGE_EXTENSIONS.contains(&".jpg"));
        assert!(IMAGE_EXTENSIONS.contains(&".jpeg"));
        assert!(IMAGE_EXTENSIONS.contains(&".png"));
        assert!(IMAGE_EXTENSIONS.contains(&".webp"));
        assert!(IMAGE_EXTENSIONS.contains(&".tiff"));
        assert!(IMAGE_EXTENSIONS.contains(&".bmp"));
        assert_eq!(IMAGE_EXTENSIONS.len(), 6);
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("/photos/cat.png")));
        assert!(is_image_file(Path::new("/photos/cat.PNG"))); // case-insensitive
        assert!(is_image_file(Path::new("/photos/cat.Jpeg")));
        assert!(is_image_file(Path::new("/photos/cat.webp")));
        assert!(!is_image_file(Path::new("/photos/cat.txt")));
        assert!(!is_image_file(Path::new("/photos/cat.mkv")));
        assert!(!is_image_file(Path::new("/photos/cat"))); // no extension
    }

    #[test]
    fn test_scan_nonexistent_root_is_empty() {
        let candidates = scan_inputs(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_scan_order_is_deterministic_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        // Created out of order on purpose
        File::create(root.join("c.png")).unwrap();
        File::create(root.join("a.png")).unwrap();
        File::create(root.join("b.png")).unwrap();

        let first = scan_inputs(root);
        let second = scan_inputs(root);

        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![root.join("a.png"), root.join("b.png"), root.join("c.png")]
        );
    }

    // *For any* file path, the scanner includes it as a candidate if and only
    // if its extension (case-insensitive) is a supported image extension.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_image_extension_filtering(
            basename in "[a-zA-Z0-9_-]{1,20}",
            ext in prop_oneof![
                // Image extensions (should pass)
                Just("jpg"), Just("JPG"), Just("Jpg"),
                Just("jpeg"), Just("JPEG"), Just("Jpeg"),
                Just("png"), Just("PNG"), Just("Png"),
                Just("webp"), Just("WEBP"), Just("Webp"),
                Just("tiff"), Just("TIFF"), Just("Tiff"),
                Just("bmp"), Just("BMP"), Just("Bmp"),
                // Non-image extensions (should fail)
                Just("txt"), Just("pdf"), Just("mkv"), Just("mp4"),
                Just("doc"), Just("exe"), Just("zip"), Just("svg"),
            ],
        ) {
            let path = PathBuf::from(format!("/photos/{}.{}", basename, ext));
            let is_image = is_image_file(&path);

            let ext_lower = ext.to_lowercase();
            let expected = matches!(
                ext_lower.as_str(),
                "jpg" | "jpeg" | "png" | "webp" | "tiff" | "bmp"
            );

            prop_assert_eq!(
                is_image, expected,
                "Extension '{}' should {} be recognized as an image",
                ext, if expected { "" } else { "not" }
            );
        }
    }

    // *For any* directory tree, the scanner never returns files that are
    // descendants of directories whose names start with `.`.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_hidden_directory_exclusion(
            visible_dir in "[a-zA-Z0-9]{1,10}",
            hidden_dir in "\\.[a-zA-Z0-9]{1,10}",
            filename in "[a-zA-Z0-9]{1,10}",
        ) {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path();

            let visible_path = root.join(&visible_dir);
            fs::create_dir_all(&visible_path).unwrap();
            let visible_image = visible_path.join(format!("{}.png", filename));
            File::create(&visible_image).unwrap();

            let hidden_path = root.join(&hidden_dir);
            fs::create_dir_all(&hidden_path).unwrap();
            let hidden_image = hidden_path.join(format!("{}.png", filename));
            File::create(&hidden_image).unwrap();

            let candidates = scan_inputs(root);

            prop_assert!(
                candidates.contains(&visible_image),
                "Image in visible directory should be found: {:?}",
                visible_image
            );
            prop_assert!(
                !candidates.contains(&hidden_image),
                "Image in hidden directory should NOT be found: {:?}",
                hidden_image
            );
        }
    }
}
