//! Corpus directory scanner.
//!
//! Walks the corpus root and returns the files matching the include globs
//! (default `*.txt`, top level only) minus the exclude globs, sorted by
//! relative path so every run visits files in the same order.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::decode::display_name;
use crate::error::IngestError;
use crate::models::CorpusFile;

/// List the corpus files.
///
/// A missing root is [`IngestError::CorpusMissing`]; an empty result is not
/// an error here, the pipeline reports it.
pub fn scan_corpus(config: &CorpusConfig) -> Result<Vec<CorpusFile>> {
    let root = &config.root;
    if !root.is_dir() {
        return Err(IngestError::CorpusMissing(root.clone()).into());
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(CorpusFile {
            path: path.to_path_buf(),
            name: display_name(path),
            relative: rel_str,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// `*` does not cross `/`, so `*.txt` only matches the top level and
/// `**/*.txt` is needed to recurse.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &std::path::Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            ..CorpusConfig::default()
        }
    }

    #[test]
    fn lists_top_level_txt_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "b").unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();
        fs::write(tmp.path().join("notes.md"), "skip").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/c.txt"), "nested").unwrap();

        let files = scan_corpus(&config(tmp.path())).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(files[0].name, "a.txt");
    }

    #[test]
    fn recursive_and_excluded_globs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/c.txt"), "nested").unwrap();
        fs::write(tmp.path().join("draft.txt"), "draft").unwrap();
        fs::write(tmp.path().join("final.txt"), "final").unwrap();

        let cfg = CorpusConfig {
            include_globs: vec!["**/*.txt".to_string()],
            exclude_globs: vec!["draft*".to_string()],
            ..config(tmp.path())
        };
        let files = scan_corpus(&cfg).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["final.txt", "sub/c.txt"]);
    }

    #[test]
    fn missing_root_is_corpus_missing() {
        let err = scan_corpus(&config(std::path::Path::new("/no/such/corpus"))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::CorpusMissing(_))
        ));
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(scan_corpus(&config(tmp.path())).unwrap().is_empty());
    }
}
