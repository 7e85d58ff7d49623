//! Workspace manager: stages configuration inputs for the embedded server.

use super::layout::{CONFIG_DIR, MESH_CONFIG_DIR, MESH_CONFIG_FILE};
use super::{WorkspaceError, WorkspaceLayout, WorkspaceResult};
use crate::config::WorkspaceSettings;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use mockable::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

/// Private directory tree read by one server instance.
///
/// The tree lives under a uniquely named temp root that is removed when the
/// workspace is dropped.
#[derive(Debug)]
pub struct Workspace {
    layout: WorkspaceLayout,
    config_dir: Dir,
    mesh_config_dir: Dir,
    last_token: AtomicU64,
    // Dropped last so the directory handles close before the tree is removed.
    _root: TempDir,
}

impl Workspace {
    /// Allocates a fresh temp root and creates the workspace layout in it.
    ///
    /// On failure the partially created tree is removed.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when any directory or file cannot be created.
    pub fn initialize(settings: &WorkspaceSettings) -> WorkspaceResult<Self> {
        let prefix = format!("{}-", settings.prefix);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let root = match settings.base_dir.as_deref() {
            Some(base) => builder
                .tempdir_in(base)
                .map_err(WorkspaceError::io("create workspace root in", base))?,
            None => builder.tempdir().map_err(|source| WorkspaceError::Io {
                action: "create workspace root in",
                path: Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap_or_default(),
                source,
            })?,
        };

        let root_path = Utf8PathBuf::from_path_buf(root.path().to_path_buf())
            .map_err(WorkspaceError::NonUtf8Path)?;
        let layout = WorkspaceLayout::under(root_path);
        debug!(root = %layout.root(), "galley home dir");

        let root_dir = Dir::open_ambient_dir(layout.root(), ambient_authority())
            .map_err(WorkspaceError::io("open", layout.root()))?;

        root_dir
            .create_dir_all(CONFIG_DIR)
            .map_err(WorkspaceError::io("create", layout.config_dir()))?;
        let config_dir = root_dir
            .open_dir(CONFIG_DIR)
            .map_err(WorkspaceError::io("open", layout.config_dir()))?;
        debug!(config_dir = %layout.config_dir(), "galley config dir");

        root_dir
            .create_dir_all(MESH_CONFIG_DIR)
            .map_err(WorkspaceError::io("create", layout.mesh_config_dir()))?;
        let mesh_config_dir = root_dir
            .open_dir(MESH_CONFIG_DIR)
            .map_err(WorkspaceError::io("open", layout.mesh_config_dir()))?;
        debug!(mesh_config_dir = %layout.mesh_config_dir(), "galley mesh config dir");

        mesh_config_dir
            .write(MESH_CONFIG_FILE, b"")
            .map_err(WorkspaceError::io("write", layout.mesh_config_file()))?;

        Ok(Self {
            layout,
            config_dir,
            mesh_config_dir,
            last_token: AtomicU64::new(0),
            _root: root,
        })
    }

    /// Returns the workspace paths.
    #[must_use]
    pub const fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    /// Writes `yaml` as a new fragment in the config directory.
    ///
    /// File names embed a strictly increasing, zero-padded token derived from
    /// the clock, so they sort in creation order and never collide. The file
    /// is staged under a hidden name and renamed into place so watchers
    /// never observe a partial write.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when the write fails or the target name
    /// already exists.
    pub fn apply_config_text(&self, clock: &impl Clock, yaml: &str) -> WorkspaceResult<Utf8PathBuf> {
        let token = self.next_token(clock);
        let file_name = format!("cfg-{token:020}.yaml");
        let staging_name = format!(".{file_name}.tmp");
        let target = self.layout.config_dir().join(&file_name);

        if self.config_dir.exists(&file_name) {
            return Err(WorkspaceError::Io {
                action: "write",
                path: target,
                source: std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            });
        }

        self.config_dir
            .write(&staging_name, yaml)
            .map_err(WorkspaceError::io("write", &self.layout.config_dir().join(&staging_name)))?;
        self.config_dir
            .rename(&staging_name, &self.config_dir, &file_name)
            .map_err(WorkspaceError::io("rename into", &target))?;

        debug!(path = %target, "applied config text");
        Ok(target)
    }

    /// Mirrors `source` into the config directory.
    ///
    /// Relative paths and directory structure are preserved and file bytes
    /// are copied verbatim. Symbolic links are followed, including links that
    /// leave `source`, and their targets are copied as regular entries. The
    /// walk stops at the first failure, leaving any files already copied in
    /// place.
    ///
    /// Files land one at a time. The local server only distributes a scan
    /// once it has settled, so a mirror normally shows up as one snapshot per
    /// collection; other servers may observe the intermediate states.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] on any read, copy, or directory creation
    /// failure.
    pub fn apply_config_dir(&self, source: &Utf8Path) -> WorkspaceResult<()> {
        // Rejects a missing or non-directory source before anything is copied.
        Dir::open_ambient_dir(source, ambient_authority())
            .map_err(WorkspaceError::io("open", source))?;

        for walked in WalkDir::new(source)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = walked.map_err(|err| {
                let path = err
                    .path()
                    .and_then(Utf8Path::from_path)
                    .unwrap_or(source)
                    .to_owned();
                WorkspaceError::Io {
                    action: "walk",
                    path,
                    source: std::io::Error::from(err),
                }
            })?;
            let entry_path = Utf8Path::from_path(entry.path())
                .ok_or_else(|| WorkspaceError::NonUtf8Path(entry.path().to_path_buf()))?;
            let relative = entry_path.strip_prefix(source).map_err(|err| WorkspaceError::Io {
                action: "resolve",
                path: entry_path.to_owned(),
                source: std::io::Error::other(err),
            })?;
            let target = self.layout.config_dir().join(relative);

            if entry.file_type().is_dir() {
                debug!(path = %target, "making dir");
                self.config_dir
                    .create_dir_all(relative)
                    .map_err(WorkspaceError::io("create", &target))?;
            } else {
                debug!(path = %target, linked = entry.path_is_symlink(), "copying file");
                let contents =
                    std::fs::read(entry_path).map_err(WorkspaceError::io("read", entry_path))?;
                self.config_dir
                    .write(relative, contents)
                    .map_err(WorkspaceError::io("write", &target))?;
            }
        }
        Ok(())
    }

    /// Removes every top-level entry of the config directory.
    ///
    /// Directories are removed with their contents. Entries are removed one
    /// at a time; the local server waits for its scans to settle before
    /// distributing, so the clear is normally seen as a single change.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when listing or any removal fails.
    pub fn clear_config(&self) -> WorkspaceResult<()> {
        let config_path = self.layout.config_dir();
        let entries = self
            .config_dir
            .entries()
            .map_err(WorkspaceError::io("list", config_path))?;

        let mut doomed = Vec::new();
        for listed in entries {
            let entry = listed.map_err(WorkspaceError::io("list", config_path))?;
            let name = entry
                .file_name()
                .map_err(WorkspaceError::io("read entry name in", config_path))?;
            let is_dir = entry
                .file_type()
                .map_err(WorkspaceError::io("inspect", &config_path.join(&name)))?
                .is_dir();
            doomed.push((name, is_dir));
        }

        for (name, is_dir) in doomed {
            let target = config_path.join(&name);
            let removal = if is_dir {
                self.config_dir.remove_dir_all(&name)
            } else {
                self.config_dir.remove_file(&name)
            };
            removal.map_err(WorkspaceError::io("remove", &target))?;
        }
        debug!(config_dir = %config_path, "cleared config");
        Ok(())
    }

    /// Replaces the mesh config file content.
    ///
    /// The server reads this file only at startup; callers must restart it
    /// for the change to take effect.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when the write fails.
    pub fn set_mesh_config(&self, yaml: &str) -> WorkspaceResult<()> {
        self.mesh_config_dir
            .write(MESH_CONFIG_FILE, yaml)
            .map_err(WorkspaceError::io("write", self.layout.mesh_config_file()))
    }

    /// Reads the current mesh config file content.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when the read fails.
    pub fn mesh_config(&self) -> WorkspaceResult<String> {
        self.mesh_config_dir
            .read_to_string(MESH_CONFIG_FILE)
            .map_err(WorkspaceError::io("read", self.layout.mesh_config_file()))
    }

    /// Lists the top-level entry names of the config directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when listing fails.
    pub fn config_entries(&self) -> WorkspaceResult<Vec<String>> {
        let config_path = self.layout.config_dir();
        let mut names = Vec::new();
        for listed in self
            .config_dir
            .entries()
            .map_err(WorkspaceError::io("list", config_path))?
        {
            let entry = listed.map_err(WorkspaceError::io("list", config_path))?;
            names.push(
                entry
                    .file_name()
                    .map_err(WorkspaceError::io("read entry name in", config_path))?,
            );
        }
        names.sort();
        Ok(names)
    }

    fn next_token(&self, clock: &impl Clock) -> u64 {
        let now = clock
            .utc()
            .timestamp_nanos_opt()
            .and_then(|nanos| u64::try_from(nanos).ok())
            .unwrap_or_default();
        let previous = self
            .last_token
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(advance_token(last, now))
            })
            .unwrap_or_else(|last| last);
        advance_token(previous, now)
    }
}

/// Returns a token strictly greater than `last`, preferring `now`.
const fn advance_token(last: u64, now: u64) -> u64 {
    let successor = last.saturating_add(1);
    if now > successor { now } else { successor }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockable::DefaultClock;
    use rstest::{fixture, rstest};

    #[fixture]
    fn workspace() -> Workspace {
        Workspace::initialize(&WorkspaceSettings::default()).expect("workspace should initialize")
    }

    fn read_config_file(workspace: &Workspace, relative: &str) -> String {
        std::fs::read_to_string(workspace.layout().config_dir().join(relative))
            .expect("config file should be readable")
    }

    #[rstest]
    fn initialize_creates_empty_layout(workspace: Workspace) {
        let layout = workspace.layout();

        assert!(layout.config_dir().is_dir());
        assert!(layout.mesh_config_dir().is_dir());
        assert_eq!(workspace.mesh_config().expect("mesh config readable"), "");
        assert!(workspace.config_entries().expect("listing works").is_empty());
        assert!(
            layout
                .root()
                .file_name()
                .is_some_and(|name| name.starts_with("galley-workdir-"))
        );
    }

    #[rstest]
    fn initialize_allocates_distinct_roots(workspace: Workspace) {
        let other = Workspace::initialize(&WorkspaceSettings::default())
            .expect("second workspace should initialize");

        assert_ne!(workspace.layout().root(), other.layout().root());
    }

    #[rstest]
    fn dropping_workspace_removes_tree() {
        let workspace = Workspace::initialize(&WorkspaceSettings::default())
            .expect("workspace should initialize");
        let root = workspace.layout().root().to_owned();

        drop(workspace);

        assert!(!root.exists());
    }

    #[rstest]
    fn apply_config_text_never_overwrites(workspace: Workspace) {
        let clock = DefaultClock;

        let first = workspace
            .apply_config_text(&clock, "first: 1\n")
            .expect("first write should succeed");
        let second = workspace
            .apply_config_text(&clock, "second: 2\n")
            .expect("second write should succeed");

        assert_ne!(first, second);
        assert!(first < second, "names should sort in creation order");
        assert_eq!(
            workspace.config_entries().expect("listing works").len(),
            2
        );
        let first_name = first.file_name().expect("file name");
        assert_eq!(read_config_file(&workspace, first_name), "first: 1\n");
    }

    #[rstest]
    #[case(0, 5, 5)]
    #[case(5, 5, 6)]
    #[case(9, 3, 10)]
    #[case(u64::MAX, 1, u64::MAX)]
    fn advance_token_is_strictly_increasing(
        #[case] last: u64,
        #[case] now: u64,
        #[case] expected: u64,
    ) {
        assert_eq!(advance_token(last, now), expected);
    }

    #[rstest]
    fn apply_config_dir_mirrors_nested_tree(workspace: Workspace) {
        let source = tempfile::tempdir().expect("source dir");
        std::fs::create_dir_all(source.path().join("networking/gateways"))
            .expect("nested dir");
        std::fs::create_dir_all(source.path().join("empty")).expect("empty dir");
        std::fs::write(source.path().join("root.yaml"), b"root: true\n").expect("root file");
        std::fs::write(
            source.path().join("networking/gateways/ingress.yaml"),
            b"gateway: ingress\n",
        )
        .expect("nested file");
        let source_path = Utf8Path::from_path(source.path()).expect("utf-8 temp path");

        workspace
            .apply_config_dir(source_path)
            .expect("mirroring should succeed");

        assert_eq!(read_config_file(&workspace, "root.yaml"), "root: true\n");
        assert_eq!(
            read_config_file(&workspace, "networking/gateways/ingress.yaml"),
            "gateway: ingress\n"
        );
        assert!(workspace.layout().config_dir().join("empty").is_dir());
    }

    #[cfg(unix)]
    #[rstest]
    fn apply_config_dir_follows_links_out_of_the_tree(workspace: Workspace) {
        use std::os::unix::fs::symlink;

        let outside = tempfile::tempdir().expect("outside dir");
        std::fs::write(outside.path().join("shared.yaml"), b"shared: true\n")
            .expect("outside file");
        std::fs::create_dir_all(outside.path().join("linked")).expect("outside nested dir");
        std::fs::write(outside.path().join("linked/inner.yaml"), b"inner: true\n")
            .expect("outside nested file");
        let source = tempfile::tempdir().expect("source dir");
        symlink(
            outside.path().join("shared.yaml"),
            source.path().join("shared.yaml"),
        )
        .expect("file link");
        symlink(outside.path().join("linked"), source.path().join("linked")).expect("dir link");
        let source_path = Utf8Path::from_path(source.path()).expect("utf-8 temp path");

        workspace
            .apply_config_dir(source_path)
            .expect("mirroring should follow links");

        assert_eq!(read_config_file(&workspace, "shared.yaml"), "shared: true\n");
        assert_eq!(read_config_file(&workspace, "linked/inner.yaml"), "inner: true\n");
        let copied = std::fs::symlink_metadata(workspace.layout().config_dir().join("shared.yaml"))
            .expect("copied file metadata");
        assert!(copied.file_type().is_file());
    }

    #[rstest]
    fn apply_config_dir_reports_missing_source(workspace: Workspace) {
        let missing = workspace.layout().root().join("does-not-exist");

        let result = workspace.apply_config_dir(&missing);

        assert_eq!(
            result.err().and_then(|err| err.io_kind()),
            Some(std::io::ErrorKind::NotFound)
        );
    }

    #[rstest]
    fn clear_config_removes_files_and_directories(workspace: Workspace) {
        let clock = DefaultClock;
        workspace
            .apply_config_text(&clock, "a: 1\n")
            .expect("write should succeed");
        std::fs::create_dir_all(workspace.layout().config_dir().join("nested/deeper"))
            .expect("nested dir");
        std::fs::write(
            workspace.layout().config_dir().join("nested/deeper/file.yaml"),
            b"b: 2\n",
        )
        .expect("nested file");

        workspace.clear_config().expect("clear should succeed");

        assert!(workspace.config_entries().expect("listing works").is_empty());
        assert!(workspace.layout().config_dir().is_dir());
    }

    #[rstest]
    fn set_mesh_config_replaces_content(workspace: Workspace) {
        workspace
            .set_mesh_config("ingressClass: istio\nmixerCheckServer: a\n")
            .expect("first write should succeed");
        workspace
            .set_mesh_config("ingressClass: other\n")
            .expect("second write should succeed");

        assert_eq!(
            workspace.mesh_config().expect("mesh config readable"),
            "ingressClass: other\n"
        );
    }
}
