use std::fs;
use std::path::{Path, PathBuf};

use crate::Error;

/// Resolves an input path to the ordered set of `.proto` files beneath it.
///
/// A file input must itself end in `.proto`; a directory input is walked
/// recursively. Results are absolute, deduplicated, and lexicographically
/// ordered, so discovery is deterministic for a fixed tree.
pub fn discover(input: &Path) -> Result<Vec<PathBuf>, Error> {
    let input = dunce::canonicalize(input).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(input.to_path_buf())
        } else {
            Error::Io(err)
        }
    })?;

    let mut files = Vec::new();
    if input.is_file() {
        if is_proto(&input) {
            files.push(input);
        }
        return Ok(files);
    }

    walk(&input, &mut files)?;
    files.sort();
    files.dedup();
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), Error> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            walk(&entry, files)?;
        } else if is_proto(&entry) {
            files.push(entry);
        }
    }
    Ok(())
}

fn is_proto(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "proto")
}

/// Whether `path` falls under any of the absolute exclude prefixes.
pub(crate) fn is_excluded(path: &Path, excludes: &[PathBuf]) -> bool {
    excludes.iter().any(|exclude| path.starts_with(exclude))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    #[test]
    fn walks_recursively_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        touch(&tmp.path().join("b/second.proto"));
        touch(&tmp.path().join("a/first.proto"));
        touch(&tmp.path().join("a/readme.md"));
        touch(&tmp.path().join("top.proto"));

        let files = discover(tmp.path()).unwrap();
        assert_eq!(files, discover(tmp.path()).unwrap());
        let names: Vec<String> = files
            .iter()
            .map(|file| {
                file.strip_prefix(dunce::canonicalize(tmp.path()).unwrap())
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["a/first.proto", "b/second.proto", "top.proto"]);
    }

    #[test]
    fn single_file_input() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("only.proto");
        touch(&file);
        let files = discover(&file).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("only.proto"));
    }

    #[test]
    fn missing_input_is_not_found() {
        let err = discover(Path::new("/no/such/dir")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn exclude_prefix_matches() {
        assert!(is_excluded(
            Path::new("/work/vendor/foo.proto"),
            &[PathBuf::from("/work/vendor")]
        ));
        assert!(!is_excluded(
            Path::new("/work/src/foo.proto"),
            &[PathBuf::from("/work/vendor")]
        ));
    }
}
