// tests/change_detection.rs

use std::path::Path;
use std::sync::{Arc, Mutex};

use monobuild::changes::{
    changed_artifacts, BuildMarker, ChangeDetector, ChangeSet, FileMarkerStore, Fingerprint,
    MarkerStore, MemoryMarkerStore, MARKER_FILE_PATH,
};
use monobuild::fs::mock::MockFileSystem;
use monobuild::fs::RealFileSystem;
use monobuild::types::Artifact;
use monobuild_test_utils::builders::{artifacts, names};
use monobuild_test_utils::fake_vcs::FakeVcs;
use monobuild_test_utils::init_tracing;

const REPO: &str = "/repo";

struct Fixture {
    fs: MockFileSystem,
    vcs: FakeVcs,
    detector: ChangeDetector,
    artifacts: Vec<Artifact>,
}

impl Fixture {
    fn new() -> Self {
        init_tracing();

        let fs = MockFileSystem::new();
        fs.add_file("/repo/packages/a/index.js", "a v1");
        fs.add_file("/repo/packages/b/index.js", "b v1");

        let vcs = FakeVcs::new();
        let markers: Box<dyn MarkerStore> = Box::new(MemoryMarkerStore::new());
        let detector = ChangeDetector::new(
            Arc::new(vcs.clone()),
            Arc::new(fs.clone()),
            Arc::new(Mutex::new(markers)),
        );

        Self {
            fs,
            vcs,
            detector,
            artifacts: artifacts(&[("a", &[]), ("b", &["a"])]),
        }
    }

    async fn build_all(&self) {
        for artifact in &self.artifacts {
            self.detector
                .record_successful_build(Path::new(REPO), artifact)
                .await
                .unwrap();
        }
    }

    async fn detect(&self) -> ChangeSet {
        self.detector.detect(Path::new(REPO), &self.artifacts).await
    }
}

fn blake3_hex(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

#[tokio::test]
async fn artifacts_without_marker_are_changed() {
    let fx = Fixture::new();
    let change_set = fx.detect().await;

    assert!(change_set.get("packages/a").is_none());
    assert_eq!(changed_artifacts(&change_set, &fx.artifacts), names(&["a", "b"]));
}

#[tokio::test]
async fn clean_rebuild_at_same_commit_is_unchanged() {
    let fx = Fixture::new();
    fx.build_all().await;

    let change_set = fx.detect().await;
    assert_eq!(change_set.get("packages/a").map(|f| f.len()), Some(0));
    assert!(changed_artifacts(&change_set, &fx.artifacts).is_empty());
}

#[tokio::test]
async fn new_commit_reports_touched_files_of_that_artifact_only() {
    let fx = Fixture::new();
    fx.build_all().await;

    fx.fs.add_file("/repo/packages/a/src/util.js", "export {}");
    fx.vcs.commit("c1", &["packages/a/src/util.js", "README.md"]);

    let change_set = fx.detect().await;
    let a = change_set.get("packages/a").unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a["src/util.js"], Fingerprint::Hash(blake3_hex("export {}")));
    assert_eq!(change_set.get("packages/b").map(|f| f.len()), Some(0));
    assert_eq!(changed_artifacts(&change_set, &fx.artifacts), names(&["a"]));
}

#[tokio::test]
async fn file_changed_and_reverted_in_history_still_counts() {
    let fx = Fixture::new();
    fx.build_all().await;

    fx.fs.add_file("/repo/packages/a/index.js", "a v2");
    fx.vcs.commit("c1", &["packages/a/index.js"]);
    fx.fs.add_file("/repo/packages/a/index.js", "a v1");
    fx.vcs.commit("c2", &["packages/a/index.js"]);

    let change_set = fx.detect().await;
    assert_eq!(
        change_set.get("packages/a").unwrap()["index.js"],
        Fingerprint::Hash(blake3_hex("a v1"))
    );
    assert_eq!(changed_artifacts(&change_set, &fx.artifacts), names(&["a"]));
}

#[tokio::test]
async fn files_removed_since_last_build_are_marked_deleted() {
    let fx = Fixture::new();
    fx.build_all().await;

    fx.fs.remove_file("/repo/packages/b/index.js");
    fx.vcs.commit("c1", &["packages/b/index.js"]);

    let change_set = fx.detect().await;
    let b = change_set.get("packages/b").unwrap();
    assert_eq!(b["index.js"], Fingerprint::Deleted);
    assert!(b["index.js"].is_deleted());
}

#[tokio::test]
async fn workspace_edits_compare_against_recorded_hashes() {
    let fx = Fixture::new();
    fx.vcs.set_workspace(&["packages/a/index.js"]);
    fx.build_all().await;
    assert!(changed_artifacts(&fx.detect().await, &fx.artifacts).is_empty());

    fx.fs.add_file("/repo/packages/a/index.js", "a v2");
    let change_set = fx.detect().await;
    assert_eq!(
        change_set.get("packages/a").unwrap()["index.js"],
        Fingerprint::Hash(blake3_hex("a v2"))
    );

    // back to the content that was built
    fx.fs.add_file("/repo/packages/a/index.js", "a v1");
    assert!(changed_artifacts(&fx.detect().await, &fx.artifacts).is_empty());
}

#[tokio::test]
async fn recorded_file_deleted_in_workspace_is_a_change() {
    let fx = Fixture::new();
    fx.vcs.set_workspace(&["packages/a/index.js"]);
    fx.build_all().await;

    fx.fs.remove_file("/repo/packages/a/index.js");
    let change_set = fx.detect().await;
    assert_eq!(
        change_set.get("packages/a").unwrap()["index.js"],
        Fingerprint::Deleted
    );
}

#[tokio::test]
async fn new_workspace_file_is_a_change() {
    let fx = Fixture::new();
    fx.build_all().await;

    fx.fs.add_file("/repo/packages/b/new.js", "new");
    fx.vcs.set_workspace(&["packages/b/new.js"]);

    assert_eq!(changed_artifacts(&fx.detect().await, &fx.artifacts), names(&["b"]));
}

#[tokio::test]
async fn ignore_files_apply_root_first_and_closest_wins() {
    let fx = Fixture::new();
    fx.fs.add_file("/repo/.monobuildignore", "# docs never trigger builds\n*.md\n");
    fx.build_all().await;

    fx.fs.add_file("/repo/packages/a/README.md", "docs");
    fx.fs.add_file("/repo/packages/b/CHANGELOG.md", "docs");
    fx.vcs.commit("c1", &["packages/a/README.md", "packages/b/CHANGELOG.md"]);
    assert!(changed_artifacts(&fx.detect().await, &fx.artifacts).is_empty());

    // a re-includes its README
    fx.fs.add_file("/repo/packages/a/.monobuildignore", "!README.md\n");
    let change_set = fx.detect().await;
    assert_eq!(changed_artifacts(&change_set, &fx.artifacts), names(&["a"]));
    assert!(change_set.get("packages/a").unwrap().contains_key("README.md"));
}

#[tokio::test]
async fn anchored_ignore_patterns_only_match_below_their_directory() {
    let fx = Fixture::new();
    fx.fs.add_file("/repo/packages/a/.monobuildignore", "/generated\n");
    fx.build_all().await;

    fx.fs.add_file("/repo/packages/a/generated/api.js", "x");
    fx.fs.add_file("/repo/packages/b/generated/api.js", "x");
    fx.vcs.commit(
        "c1",
        &["packages/a/generated/api.js", "packages/b/generated/api.js"],
    );

    assert_eq!(changed_artifacts(&fx.detect().await, &fx.artifacts), names(&["b"]));
}

#[tokio::test]
async fn custom_ignore_file_name() {
    let mut fx = Fixture::new();
    fx.detector = fx.detector.clone().with_ignore_file(".buildignore");
    fx.fs.add_file("/repo/.buildignore", "*.txt\n");
    fx.fs.add_file("/repo/.monobuildignore", "*.js\n");
    fx.build_all().await;

    fx.fs.add_file("/repo/packages/a/notes.txt", "x");
    fx.fs.add_file("/repo/packages/b/main.js", "x");
    fx.vcs.commit("c1", &["packages/a/notes.txt", "packages/b/main.js"]);

    assert_eq!(changed_artifacts(&fx.detect().await, &fx.artifacts), names(&["b"]));
}

#[tokio::test]
async fn vcs_failure_assumes_everything_changed() {
    let fx = Fixture::new();
    fx.build_all().await;
    fx.vcs.break_it();

    let change_set = fx.detect().await;
    assert!(change_set.is_empty());
    assert_eq!(changed_artifacts(&change_set, &fx.artifacts), names(&["a", "b"]));
}

#[tokio::test]
async fn unknown_marker_commit_assumes_changed() {
    let fx = Fixture::new();
    let marker = BuildMarker {
        commit: "rewritten-away".to_string(),
        ..BuildMarker::default()
    };
    // b's marker points at a commit the history no longer has
    let markers: Box<dyn MarkerStore> = {
        let mut store = MemoryMarkerStore::new();
        store.save("b", &marker).unwrap();
        Box::new(store)
    };
    let detector = ChangeDetector::new(
        Arc::new(fx.vcs.clone()),
        Arc::new(fx.fs.clone()),
        Arc::new(Mutex::new(markers)),
    );

    let change_set = detector.detect(Path::new(REPO), &fx.artifacts).await;
    assert_eq!(changed_artifacts(&change_set, &fx.artifacts), names(&["a", "b"]));
    assert!(change_set.get("packages/b").is_none());
}

#[tokio::test]
async fn pruned_markers_are_forgotten() {
    let fx = Fixture::new();
    fx.build_all().await;

    let only_b: Vec<Artifact> = fx.artifacts.iter().filter(|a| a.name == "b").cloned().collect();
    fx.detector.prune_markers(&only_b).unwrap();

    assert_eq!(changed_artifacts(&fx.detect().await, &fx.artifacts), names(&["a"]));
}

#[test]
fn file_marker_store_persists_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let fs = Arc::new(RealFileSystem);
    let marker = BuildMarker {
        commit: "abc123".to_string(),
        files: [("index.js".to_string(), Fingerprint::Deleted)].into_iter().collect(),
    };

    let mut store = FileMarkerStore::new(fs.clone(), dir.path());
    store.save("a", &marker).unwrap();
    assert!(dir.path().join(MARKER_FILE_PATH).is_file());

    let reopened = FileMarkerStore::new(fs, dir.path());
    assert_eq!(reopened.load("a").unwrap(), Some(marker));
    assert_eq!(reopened.load("b").unwrap(), None);

    let json = std::fs::read_to_string(dir.path().join(MARKER_FILE_PATH)).unwrap();
    assert!(json.contains("\"deleted\""));
}
