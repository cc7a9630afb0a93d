use std::path::{Path, PathBuf};

use anyhow::Context;
use keepscope::classfile::ClassFile;

/// Read and parse a class file.
pub fn load_class(path: &Path) -> anyhow::Result<ClassFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read: {}", path.display()))?;
    ClassFile::parse(&bytes).with_context(|| format!("failed to parse class file: {}", path.display()))
}

/// Collect all `.class` files recursively from a directory.
pub fn collect_classes(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_classes_recursive(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_classes_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_classes_recursive(&path, files)?;
        } else if is_class_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Returns true if the path has a `.class` extension.
pub fn is_class_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("class")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_nested_class_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("com/foo")).unwrap();
        std::fs::write(dir.path().join("com/foo/Bar.class"), b"").unwrap();
        std::fs::write(dir.path().join("com/A.class"), b"").unwrap();
        std::fs::write(dir.path().join("com/readme.txt"), b"").unwrap();

        let files = collect_classes(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("com/A.class"), dir.path().join("com/foo/Bar.class")]
        );
    }
}
