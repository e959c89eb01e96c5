#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use manuscript::{ProjectConfig, ProjectHandle, RichTextCodec, RtfCodec};
use tempfile::TempDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Binder used by most specs:
///
/// ```text
/// Draft
///   Ch1          (include)
///   Ch2          (exclude)
///   Part Two
///     Scene 1
///     Ch1        (second item with the same title)
/// Research
///   Notes on Ch1
///   Map          (Image)
/// Trash
/// ```
pub const SAMPLE_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<ScrivenerProject Template="NO" Version="2.0" Identifier="4F1B7E3C-0000-4000-8000-000000000001">
    <Binder>
        <BinderItem UUID="DRAFT" Type="DraftFolder" Created="2024-03-01 09:00:00 +0100" Modified="2024-03-02 10:30:00 +0100">
            <Title>Draft</Title>
            <Children>
                <BinderItem UUID="CH1" Type="Text" Created="2024-03-01 09:05:00 +0100" Modified="2024-03-01 09:05:00 +0100">
                    <Title>Ch1</Title>
                    <MetaData>
                        <IncludeInCompile>Yes</IncludeInCompile>
                    </MetaData>
                </BinderItem>
                <BinderItem UUID="CH2" Type="Text">
                    <Title>Ch2</Title>
                    <MetaData>
                        <IncludeInCompile>No</IncludeInCompile>
                    </MetaData>
                </BinderItem>
                <BinderItem UUID="PART" Type="Folder">
                    <Title>Part Two</Title>
                    <Children>
                        <BinderItem UUID="SC1" Type="Text">
                            <Title>Scene 1</Title>
                        </BinderItem>
                        <BinderItem UUID="SC2" Type="Text">
                            <Title>Ch1</Title>
                        </BinderItem>
                    </Children>
                </BinderItem>
            </Children>
        </BinderItem>
        <BinderItem UUID="RESEARCH" Type="ResearchFolder">
            <Title>Research</Title>
            <Children>
                <BinderItem UUID="NOTE1" Type="Text">
                    <Title>Notes on Ch1</Title>
                </BinderItem>
                <BinderItem UUID="IMG" Type="Image">
                    <Title>Map</Title>
                </BinderItem>
            </Children>
        </BinderItem>
        <BinderItem UUID="TRASH" Type="TrashFolder">
            <Title>Trash</Title>
        </BinderItem>
    </Binder>
    <ProjectSettings>
        <Setting Key="kept">verbatim</Setting>
    </ProjectSettings>
</ScrivenerProject>
"#;

pub const CH1_BODY: &str = "It was a dark and stormy night.";
pub const CH2_BODY: &str = "Cut material.";
pub const SC1_BODY: &str = "The dragon slept under the hill.";
pub const NOTE1_BODY: &str = "Dragons prefer caves.";
pub const NOTE1_SYNOPSIS: &str = "dragon lore";

/// Install a test subscriber once per test binary. Set `RUST_LOG` to see output.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "manuscript=debug".into()),
    );
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// A package in a temporary directory.
pub struct Fixture {
    pub dir: TempDir,
    pub root: PathBuf,
}

impl Fixture {
    /// The sample binder with bodies for Ch1, Ch2, Scene 1 and the research note.
    pub fn sample() -> Self {
        let fixture = Self::with_manifest(SAMPLE_MANIFEST);
        fixture.write_body_text("CH1", CH1_BODY);
        fixture.write_body_text("CH2", CH2_BODY);
        fixture.write_body_text("SC1", SC1_BODY);
        fixture.write_body_text("NOTE1", NOTE1_BODY);
        fixture.write_sidecar("NOTE1", "synopsis.txt", NOTE1_SYNOPSIS.as_bytes());
        fixture
    }

    pub fn with_manifest(manifest: &str) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path().join("Novel.scriv");
        fs::create_dir_all(root.join("Files").join("Data")).expect("Failed to create package");
        fs::write(root.join("manifest.xml"), manifest).expect("Failed to write manifest");
        Self { dir, root }
    }

    pub fn open(&self) -> ProjectHandle {
        ProjectHandle::open_with(&self.root, ProjectConfig::default())
            .expect("Failed to open project")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.xml")
    }

    pub fn manifest_text(&self) -> String {
        fs::read_to_string(self.manifest_path()).expect("Failed to read manifest")
    }

    pub fn node_dir(&self, id: &str) -> PathBuf {
        self.root.join("Files").join("Data").join(id)
    }

    pub fn sidecar(&self, id: &str, file: &str) -> PathBuf {
        self.node_dir(id).join(file)
    }

    pub fn write_sidecar(&self, id: &str, file: &str, bytes: &[u8]) {
        fs::create_dir_all(self.node_dir(id)).expect("Failed to create node dir");
        fs::write(self.sidecar(id, file), bytes).expect("Failed to write sidecar");
    }

    pub fn write_body_text(&self, id: &str, text: &str) {
        let rtf = RtfCodec.encode(text).expect("Failed to encode body");
        self.write_sidecar(id, "body.rtf", &rtf);
    }

    pub fn read_sidecar(&self, id: &str, file: &str) -> Vec<u8> {
        fs::read(self.sidecar(id, file)).expect("Failed to read sidecar")
    }

    pub fn lock(&self) {
        fs::write(self.root.join("user.lock"), b"").expect("Failed to write lock marker");
    }

    pub fn unlock(&self) {
        fs::remove_file(self.root.join("user.lock")).expect("Failed to remove lock marker");
    }

    pub fn snapshot_dir(&self, owner: &str) -> PathBuf {
        self.root.join("Snapshots").join(owner)
    }

    pub fn snapshot_count(&self, owner: &str) -> usize {
        count_files(&self.snapshot_dir(owner))
    }

    /// Put a regular file where the snapshot directory belongs.
    pub fn block_snapshots(&self) {
        fs::write(self.root.join("Snapshots"), b"").expect("Failed to write blocker");
    }

    /// Make the package root read-only while leaving its subdirectories writable.
    ///
    /// Returns false (and undoes the change) when the process can still write
    /// there anyway, as a privileged user can.
    pub fn seal_root(&self) -> bool {
        fs::create_dir_all(self.root.join("Snapshots")).expect("Failed to create snapshot dir");
        set_mode(&self.root, 0o555);
        let check = self.root.join(".write-check");
        if fs::write(&check, b"").is_ok() {
            let _ = fs::remove_file(&check);
            self.unseal_root();
            return false;
        }
        true
    }

    pub fn unseal_root(&self) {
        set_mode(&self.root, 0o755);
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("Failed to set permissions");
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) {
    let mut permissions = fs::metadata(path).expect("Failed to stat").permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, permissions).expect("Failed to set permissions");
}

pub fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Split `after` into the bytes shared with `before` and the inserted middle.
///
/// Returns `None` unless `after` is `before` with exactly one contiguous insertion.
pub fn single_insertion<'a>(before: &str, after: &'a str) -> Option<&'a str> {
    let prefix = before
        .bytes()
        .zip(after.bytes())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = before
        .bytes()
        .rev()
        .zip(after.bytes().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(before.len() - prefix);
    if prefix + suffix != before.len() {
        return None;
    }
    after.get(prefix..after.len() - suffix)
}
