use std::env;
use std::fmt;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use zip::ZipArchive;

use prototool_config::Error;

/// Release URL template. `{version}` and `{platform}` are substituted.
const DEFAULT_URL_TEMPLATE: &str =
    "https://github.com/protocolbuffers/protobuf/releases/download/v{version}/protoc-{version}-{platform}.zip";

/// A protoc release platform, named the way release archives are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    LinuxX86_64,
    LinuxAarch64,
    MacX86_64,
    MacAarch64,
    Win64,
}

impl Platform {
    /// The platform of the running process.
    pub fn current() -> Result<Platform, Error> {
        match (env::consts::OS, env::consts::ARCH) {
            ("linux", "x86_64") => Ok(Platform::LinuxX86_64),
            ("linux", "aarch64") => Ok(Platform::LinuxAarch64),
            ("macos", "x86_64") => Ok(Platform::MacX86_64),
            ("macos", "aarch64") => Ok(Platform::MacAarch64),
            ("windows", _) => Ok(Platform::Win64),
            (os, arch) => Err(Error::internal(format!(
                "no protoc release for platform {os}-{arch}"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::LinuxX86_64 => "linux-x86_64",
            Platform::LinuxAarch64 => "linux-aarch_64",
            Platform::MacX86_64 => "osx-x86_64",
            Platform::MacAarch64 => "osx-aarch_64",
            Platform::Win64 => "win64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An installed toolchain. Never mutated after creation; the directory it
/// points into is adopted atomically via rename.
#[derive(Clone, Debug)]
pub struct ToolchainEntry {
    pub version: String,
    pub platform: Platform,
    pub binary_path: PathBuf,
    pub wkt_include_path: PathBuf,
    pub fetched_at: SystemTime,
}

/// The on-disk toolchain cache, laid out as
/// `<root>/<version>/<platform>/{bin/protoc, include/**}`.
pub struct ToolchainCache {
    root: PathBuf,
    url_template: String,
    is_default_root: bool,
}

/// Resolves the default cache root: `$XDG_CACHE_HOME/prototool`, else the
/// platform cache directory under `$HOME`.
pub fn default_cache_root() -> Result<PathBuf, Error> {
    if let Some(xdg) = env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join("prototool"));
    }
    let home = env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::internal("neither XDG_CACHE_HOME nor HOME is set"))?;
    let home = PathBuf::from(home);
    if cfg!(target_os = "macos") {
        Ok(home.join("Library/Caches/prototool"))
    } else {
        Ok(home.join(".cache/prototool"))
    }
}

impl ToolchainCache {
    /// A cache at an explicit root (`--cache-path`).
    pub fn at(root: PathBuf, url_template: Option<String>) -> ToolchainCache {
        ToolchainCache {
            root,
            url_template: url_template.unwrap_or_else(|| DEFAULT_URL_TEMPLATE.to_string()),
            is_default_root: false,
        }
    }

    /// A cache at the default root.
    pub fn new(url_template: Option<String>) -> Result<ToolchainCache, Error> {
        Ok(ToolchainCache {
            root: default_cache_root()?,
            url_template: url_template.unwrap_or_else(|| DEFAULT_URL_TEMPLATE.to_string()),
            is_default_root: true,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensures `version` is installed for `platform`, downloading on first
    /// demand. Idempotent and safe to race across processes: installation
    /// lands in a staging directory and is adopted with one `rename`; a loser
    /// of that race discards its staging copy and uses the winner's.
    pub fn ensure(&self, version: &str, platform: Platform) -> Result<ToolchainEntry, Error> {
        let final_dir = self.root.join(version).join(platform.as_str());
        if let Some(entry) = self.entry_at(&final_dir, version, platform) {
            log::debug!("toolchain cache hit: {}", final_dir.display());
            return Ok(entry);
        }

        let version_dir = self.root.join(version);
        fs::create_dir_all(&version_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!("{}.tmp-", platform.as_str()))
            .tempdir_in(&version_dir)?;

        let url = self.url(version, platform);
        log::debug!("fetching protoc {version} from {url}");
        let archive = fetch(&url)?;
        unpack(&archive, staging.path())?;
        self.verify(staging.path(), &url)?;

        // Adopt the staging directory. If another ensure() won the race the
        // rename fails with an existing target; the winner's install is the
        // one we use and the losing staging copy is removed.
        let staging_path = staging.into_path();
        match fs::rename(&staging_path, &final_dir) {
            Ok(()) => {}
            Err(err) => {
                let _ = fs::remove_dir_all(&staging_path);
                if !final_dir.exists() {
                    return Err(Error::Io(err));
                }
                log::debug!("toolchain install raced, adopting {}", final_dir.display());
            }
        }

        self.entry_at(&final_dir, version, platform).ok_or_else(|| {
            Error::ToolchainCorrupt(format!(
                "{} is missing bin/protoc after install",
                final_dir.display()
            ))
        })
    }

    /// Removes the cache root. Only the default root may be deleted; an
    /// explicit `--cache-path` is the user's directory, not ours.
    pub fn delete(&self) -> Result<(), Error> {
        if !self.is_default_root {
            return Err(Error::internal(
                "refusing to delete a non-default cache path",
            ));
        }
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    fn url(&self, version: &str, platform: Platform) -> String {
        self.url_template
            .replace("{version}", version)
            .replace("{platform}", platform.as_str())
    }

    fn entry_at(
        &self,
        dir: &Path,
        version: &str,
        platform: Platform,
    ) -> Option<ToolchainEntry> {
        let binary_path = dir.join("bin").join(protoc_binary_name());
        if !binary_path.is_file() {
            return None;
        }
        let fetched_at = fs::metadata(dir)
            .and_then(|meta| meta.modified())
            .unwrap_or_else(|_| SystemTime::now());
        Some(ToolchainEntry {
            version: version.to_string(),
            platform,
            binary_path,
            wkt_include_path: dir.join("include"),
            fetched_at,
        })
    }

    fn verify(&self, dir: &Path, url: &str) -> Result<(), Error> {
        let binary = dir.join("bin").join(protoc_binary_name());
        if !binary.is_file() {
            return Err(Error::ToolchainCorrupt(format!(
                "archive from {url} did not contain bin/protoc"
            )));
        }
        Ok(())
    }
}

fn protoc_binary_name() -> &'static str {
    if cfg!(windows) {
        "protoc.exe"
    } else {
        "protoc"
    }
}

fn fetch(url: &str) -> Result<Vec<u8>, Error> {
    let response = reqwest::blocking::get(url).map_err(|err| Error::Network(err.to_string()))?;
    if !response.status().is_success() {
        return Err(Error::Network(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }
    let bytes = response
        .bytes()
        .map_err(|err| Error::Network(err.to_string()))?;
    Ok(bytes.to_vec())
}

/// Unpacks a release zip into `target`, restoring unix modes so the protoc
/// binary stays executable.
fn unpack(archive: &[u8], target: &Path) -> Result<(), Error> {
    let mut archive = ZipArchive::new(Cursor::new(archive))
        .map_err(|err| Error::ToolchainCorrupt(err.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| Error::ToolchainCorrupt(err.to_string()))?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(Error::ToolchainCorrupt(format!(
                "archive entry {:?} escapes the install directory",
                entry.name()
            )));
        };
        let path = target.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&path)?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut dest = fs::File::create(&path)?;
        io::copy(&mut entry, &mut dest)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fake_archive() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let exec = zip::write::FileOptions::default().unix_permissions(0o755);
            writer.start_file("bin/protoc", exec).unwrap();
            writer.write_all(b"#!/bin/sh\nexit 0\n").unwrap();
            let plain = zip::write::FileOptions::default();
            writer
                .start_file("include/google/protobuf/empty.proto", plain)
                .unwrap();
            writer.write_all(b"syntax = \"proto3\";\n").unwrap();
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn unpacks_binary_and_includes() {
        let tmp = tempfile::tempdir().unwrap();
        unpack(&fake_archive(), tmp.path()).unwrap();
        let binary = tmp.path().join("bin/protoc");
        assert!(binary.is_file());
        assert!(tmp
            .path()
            .join("include/google/protobuf/empty.proto")
            .is_file());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&binary).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn rejects_escaping_entries() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer
                .start_file("../escape", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(b"nope").unwrap();
            writer.finish().unwrap();
        }
        let tmp = tempfile::tempdir().unwrap();
        let err = unpack(&buf.into_inner(), tmp.path()).unwrap_err();
        assert!(matches!(err, Error::ToolchainCorrupt(_)));
    }

    #[test]
    fn url_substitution() {
        let cache = ToolchainCache::at(PathBuf::from("/cache"), None);
        assert_eq!(
            cache.url("3.11.4", Platform::LinuxX86_64),
            "https://github.com/protocolbuffers/protobuf/releases/download/v3.11.4/protoc-3.11.4-linux-x86_64.zip"
        );
    }

    #[test]
    fn ensure_is_idempotent_once_installed() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ToolchainCache::at(tmp.path().to_path_buf(), None);

        // Pre-install so no download happens.
        let final_dir = tmp.path().join("3.11.4/linux-x86_64");
        unpack(&fake_archive(), &final_dir).unwrap();

        let first = cache.ensure("3.11.4", Platform::LinuxX86_64).unwrap();
        let second = cache.ensure("3.11.4", Platform::LinuxX86_64).unwrap();
        assert_eq!(first.binary_path, second.binary_path);
        assert_eq!(first.binary_path, final_dir.join("bin/protoc"));
        assert_eq!(first.wkt_include_path, final_dir.join("include"));
    }

    #[test]
    fn concurrent_ensure_agrees_on_one_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        unpack(&fake_archive(), &root.join("3.11.4/linux-x86_64")).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let root = root.clone();
                std::thread::spawn(move || {
                    ToolchainCache::at(root, None)
                        .ensure("3.11.4", Platform::LinuxX86_64)
                        .unwrap()
                        .binary_path
                })
            })
            .collect();
        let paths: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(paths.windows(2).all(|pair| pair[0] == pair[1]));

        // No staging leftovers next to the installed platform directory.
        let entries: Vec<_> = fs::read_dir(root.join("3.11.4"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("linux-x86_64")]);
    }

    #[test]
    fn delete_refuses_explicit_root() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = ToolchainCache::at(tmp.path().to_path_buf(), None);
        assert!(cache.delete().is_err());
        assert!(tmp.path().exists());
    }
}
