use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::discovery::is_excluded;
use crate::settings::{Settings, CONFIG_FILE_JSON, CONFIG_FILE_YAML};
use crate::Error;

/// Files sharing a governing config. Each group is processed as a unit, one
/// `protoc` invocation per group.
#[derive(Clone, Debug)]
pub struct FileGroup {
    /// Directory the governing config was found in (or the walk root when no
    /// config exists anywhere above the files).
    pub config_dir: PathBuf,
    pub settings: Arc<Settings>,
    /// Absolute paths, lexicographically ordered.
    pub files: Vec<PathBuf>,
}

/// Resolves governing configs for discovered files, caching per directory.
///
/// Inline config data, when set, overrides every on-disk config for the run.
pub struct Resolver {
    config_data: Option<String>,
    cache: HashMap<PathBuf, Option<PathBuf>>,
}

impl Resolver {
    pub fn new(config_data: Option<String>) -> Resolver {
        Resolver {
            config_data,
            cache: HashMap::new(),
        }
    }

    /// Walks from `dir` upward and returns the directory containing the
    /// nearest `prototool.yaml` or `prototool.json`, if any.
    pub fn governing_dir(&mut self, dir: &Path) -> Option<PathBuf> {
        if let Some(found) = self.cache.get(dir) {
            return found.clone();
        }
        let mut current = Some(dir.to_path_buf());
        let mut visited = Vec::new();
        let mut found = None;
        while let Some(candidate) = current {
            if let Some(cached) = self.cache.get(&candidate) {
                found = cached.clone();
                break;
            }
            visited.push(candidate.clone());
            if candidate.join(CONFIG_FILE_YAML).is_file()
                || candidate.join(CONFIG_FILE_JSON).is_file()
            {
                found = Some(candidate);
                break;
            }
            current = candidate.parent().map(Path::to_path_buf);
        }
        for dir in visited {
            self.cache.insert(dir, found.clone());
        }
        found
    }

    /// Groups discovered files by governing config and applies each group's
    /// excludes. Group order follows the lexicographic order of the config
    /// directories; file order within a group is preserved from discovery.
    pub fn group(&mut self, files: Vec<PathBuf>, fallback_dir: &Path) -> Result<Vec<FileGroup>, Error> {
        let mut settings_cache: HashMap<PathBuf, Arc<Settings>> = HashMap::new();
        let mut groups: HashMap<PathBuf, FileGroup> = HashMap::new();

        for file in files {
            let parent = file
                .parent()
                .ok_or_else(|| Error::internal(format!("{} has no parent", file.display())))?
                .to_path_buf();
            let config_dir = self
                .governing_dir(&parent)
                .unwrap_or_else(|| fallback_dir.to_path_buf());

            let settings = match settings_cache.get(&config_dir) {
                Some(settings) => settings.clone(),
                None => {
                    let settings = Arc::new(self.load(&config_dir)?);
                    settings_cache.insert(config_dir.clone(), settings.clone());
                    settings
                }
            };

            if is_excluded(&file, &settings.excludes) {
                log::debug!("excluding {}", file.display());
                continue;
            }

            groups
                .entry(config_dir.clone())
                .or_insert_with(|| FileGroup {
                    config_dir,
                    settings,
                    files: Vec::new(),
                })
                .files
                .push(file);
        }

        let mut groups: Vec<FileGroup> = groups.into_values().collect();
        groups.sort_by(|a, b| a.config_dir.cmp(&b.config_dir));
        Ok(groups)
    }

    /// Loads the settings governing `config_dir`, honoring inline overrides.
    pub fn load(&self, config_dir: &Path) -> Result<Settings, Error> {
        if let Some(data) = &self.config_data {
            return Settings::from_data(data, config_dir);
        }
        Ok(Settings::load_dir(config_dir)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn nearest_ancestor_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("prototool.yaml"), "{}").unwrap();
        fs::write(root.join("a/b/prototool.yaml"), "{}").unwrap();

        let mut resolver = Resolver::new(None);
        assert_eq!(
            resolver.governing_dir(&root.join("a/b/c")),
            Some(root.join("a/b"))
        );
        assert_eq!(resolver.governing_dir(&root.join("a")), Some(root.clone()));
    }

    #[test]
    fn groups_by_config_and_applies_excludes() {
        let tmp = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        fs::create_dir_all(root.join("idl/vendor")).unwrap();
        fs::create_dir_all(root.join("other")).unwrap();
        fs::write(
            root.join("idl/prototool.yaml"),
            "excludes:\n  - vendor\n",
        )
        .unwrap();
        fs::write(root.join("idl/a.proto"), "").unwrap();
        fs::write(root.join("idl/vendor/b.proto"), "").unwrap();
        fs::write(root.join("other/c.proto"), "").unwrap();

        let files = vec![
            root.join("idl/a.proto"),
            root.join("idl/vendor/b.proto"),
            root.join("other/c.proto"),
        ];
        let mut resolver = Resolver::new(None);
        let groups = resolver.group(files, &root).unwrap();
        assert_eq!(groups.len(), 2);

        let idl = groups
            .iter()
            .find(|group| group.config_dir == root.join("idl"))
            .unwrap();
        assert_eq!(idl.files, vec![root.join("idl/a.proto")]);

        let fallback = groups
            .iter()
            .find(|group| group.config_dir == root)
            .unwrap();
        assert_eq!(fallback.files, vec![root.join("other/c.proto")]);
    }

    #[test]
    fn inline_data_overrides_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        fs::write(root.join("prototool.yaml"), "protoc:\n  version: 3.9.1\n").unwrap();

        let resolver = Resolver::new(Some("protoc:\n  version: 3.11.4\n".to_string()));
        let settings = resolver.load(&root).unwrap();
        assert_eq!(settings.protoc.version, "3.11.4");
    }
}
