//! End-to-end tests for the file index against real directories.

use hashdex::{
    Blake3Fingerprinter, FileIndex, Fingerprint, Fingerprinter, ImportOptions, IndexError,
    IndexOptions, Outcome, Result,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use tempfile::TempDir;

/// Fingerprint is the trimmed file content; distance is the absolute
/// difference of the two numbers. Content "bad" fails to fingerprint.
struct NumericFingerprinter;

impl Fingerprinter for NumericFingerprinter {
    fn fingerprint(&self, content: &[u8]) -> Result<Fingerprint> {
        let text = String::from_utf8_lossy(content).trim().to_string();
        if text == "bad" {
            return Err(IndexError::Fingerprint("refusing 'bad'".into()));
        }
        Ok(Fingerprint::new(text))
    }

    fn distance(&self, a: &Fingerprint, b: &Fingerprint) -> Result<u32> {
        let parse = |f: &Fingerprint| {
            f.as_str()
                .parse::<i64>()
                .map_err(|e| IndexError::Fingerprint(e.to_string()))
        };
        Ok((parse(a)? - parse(b)?).unsigned_abs() as u32)
    }

    fn name(&self) -> &'static str {
        "numeric"
    }
}

/// blake3, except that while `broken` is set, content "fatal" fails with an
/// error that is not tied to the file.
struct BreakableFingerprinter {
    broken: AtomicBool,
}

impl Fingerprinter for BreakableFingerprinter {
    fn fingerprint(&self, content: &[u8]) -> Result<Fingerprint> {
        if self.broken.load(Ordering::SeqCst) && content == b"fatal" {
            return Err(IndexError::Config("fingerprinter unavailable".into()));
        }
        Blake3Fingerprinter.fingerprint(content)
    }

    fn distance(&self, a: &Fingerprint, b: &Fingerprint) -> Result<u32> {
        Blake3Fingerprinter.distance(a, b)
    }

    fn name(&self) -> &'static str {
        "breakable"
    }
}

struct Fixture {
    tmp: TempDir,
    index: FileIndex,
}

impl Fixture {
    async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let index = FileIndex::open(tmp.path().join("index.db")).await.unwrap();
        Self { tmp, index }
    }

    async fn numeric() -> Self {
        let mut fixture = Self::new().await;
        fixture.index = fixture
            .index
            .with_fingerprinter(Arc::new(NumericFingerprinter));
        fixture
    }

    fn root(&self) -> PathBuf {
        self.tmp.path().join("files")
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    async fn index_root(&self, options: &IndexOptions) -> hashdex::IndexSummary {
        self.index
            .index_files(&[self.root()], options, None)
            .await
            .unwrap()
    }

    async fn file_count(&self) -> i64 {
        self.index.stats().await.unwrap().files
    }
}

fn dir_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn indexing_twice_reuses_everything() {
    let fx = Fixture::new().await;
    fx.write("a.txt", "alpha");
    fx.write("sub/b.txt", "beta");
    fx.write("sub/deeper/c.txt", "gamma");

    let first = fx.index_root(&IndexOptions::default()).await;
    assert_eq!(first.hashed, 3);
    assert_eq!(first.reused, 0);
    assert_eq!(first.indexed.len(), 3);

    let second = fx.index_root(&IndexOptions::default()).await;
    assert_eq!(second.hashed, 0);
    assert_eq!(second.moved, 0);
    assert_eq!(second.reused, 3);
    assert!(second.indexed.iter().all(|f| f.outcome == Outcome::Reused));

    assert_eq!(fx.file_count().await, 3);
}

#[tokio::test]
async fn processing_order_is_sorted_by_name() {
    let fx = Fixture::new().await;
    fx.write("b.txt", "2");
    fx.write("a.txt", "1");
    fx.write("c/z.txt", "3");

    let summary = fx.index_root(&IndexOptions::default()).await;
    let names: Vec<String> = summary
        .indexed
        .iter()
        .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "z.txt"]);
}

#[tokio::test]
async fn changed_file_is_rehashed_in_place() {
    let fx = Fixture::new().await;
    let path = fx.write("a.txt", "short");
    fx.index_root(&IndexOptions::default()).await;
    let before = fx.index.query_by_name("a.txt").await.unwrap();

    std::fs::write(&path, "a much longer body").unwrap();
    filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    let summary = fx.index_root(&IndexOptions::default()).await;
    assert_eq!(summary.hashed, 1);

    let after = fx.index.query_by_name("a.txt").await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, before[0].id);
    assert_ne!(after[0].hash, before[0].hash);
    assert_eq!(after[0].timestamp, 1_600_000_000_000);
}

#[tokio::test]
async fn moved_files_keep_their_fingerprint() {
    let fx = Fixture::new().await;
    fx.write("old/one.bin", "first");
    fx.write("old/two.bin", "second");
    fx.index_root(&IndexOptions::default()).await;

    // rename keeps size and mtime
    std::fs::rename(fx.root().join("old"), fx.root().join("new")).unwrap();

    let options = IndexOptions {
        move_detection: true,
        ..IndexOptions::default()
    };
    let summary = fx.index_root(&options).await;
    assert_eq!(summary.moved, 2);
    assert_eq!(summary.hashed, 0);

    // Old records linger until purged
    assert_eq!(fx.file_count().await, 4);
    let purged = fx.index.purge().await.unwrap();
    assert_eq!(purged, 2);

    let moved = fx.index.query_by_name("one.bin").await.unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].dir, dir_str(&fx.root().join("new")));
}

#[tokio::test]
async fn without_move_detection_moved_files_are_rehashed() {
    let fx = Fixture::new().await;
    fx.write("old/one.bin", "first");
    fx.index_root(&IndexOptions::default()).await;

    std::fs::rename(fx.root().join("old"), fx.root().join("new")).unwrap();

    let summary = fx.index_root(&IndexOptions::default()).await;
    assert_eq!(summary.moved, 0);
    assert_eq!(summary.hashed, 1);
}

#[tokio::test]
async fn purge_option_counts_removed_records() {
    let fx = Fixture::new().await;
    fx.write("keep.txt", "k");
    let doomed = fx.write("gone.txt", "g");
    fx.index_root(&IndexOptions::default()).await;

    std::fs::remove_file(doomed).unwrap();

    let options = IndexOptions {
        purge: true,
        ..IndexOptions::default()
    };
    let summary = fx.index_root(&options).await;
    assert_eq!(summary.purged, 1);
    assert_eq!(fx.file_count().await, 1);

    // Nothing left to purge
    assert_eq!(fx.index.purge().await.unwrap(), 0);
}

#[tokio::test]
async fn exclude_rules_last_match_wins() {
    let fx = Fixture::new().await;
    fx.write("a.tmp", "x");
    fx.write("keep.tmp", "y");
    fx.write("b.txt", "z");
    fx.write("cache/deep/c.txt", "w");

    let options = IndexOptions {
        exclude: vec!["*.tmp".into(), "!keep.tmp".into(), "**/cache/**".into()],
        ..IndexOptions::default()
    };
    let summary = fx.index_root(&options).await;

    let mut names: Vec<String> = fx
        .index
        .query("*", false)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["b.txt", "keep.tmp"]);
    assert_eq!(summary.hashed, 2);
}

#[tokio::test]
async fn invalid_exclude_pattern_fails_before_indexing() {
    let fx = Fixture::new().await;
    fx.write("a.txt", "x");

    let options = IndexOptions {
        exclude: vec!["broken[]".into()],
        ..IndexOptions::default()
    };
    let result = fx.index.index_files(&[fx.root()], &options, None).await;
    assert!(matches!(result, Err(IndexError::Pattern(_))));
    assert_eq!(fx.file_count().await, 0);
}

#[tokio::test]
async fn per_file_failures_do_not_stop_the_run() {
    let fx = Fixture::numeric().await;
    fx.write("a.txt", "1");
    fx.write("b.txt", "bad");
    fx.write("c.txt", "3");

    let summary = fx.index_root(&IndexOptions::default()).await;
    assert_eq!(summary.hashed, 2);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].path.ends_with("b.txt"));
    assert_eq!(fx.file_count().await, 2);
}

#[tokio::test]
async fn small_batches_commit_everything() {
    let mut fx = Fixture::new().await;
    fx.index = fx.index.with_batch_size(1);
    for i in 0..5 {
        fx.write(&format!("f{i}.txt"), &format!("content {i}"));
    }

    let summary = fx.index_root(&IndexOptions::default()).await;
    assert_eq!(summary.hashed, 5);
    assert_eq!(fx.file_count().await, 5);
}

#[tokio::test]
async fn fatal_error_keeps_committed_batches() {
    let mut fx = Fixture::new().await;
    let fingerprinter = Arc::new(BreakableFingerprinter {
        broken: AtomicBool::new(true),
    });
    fx.index = fx
        .index
        .with_batch_size(2)
        .with_fingerprinter(fingerprinter.clone());
    fx.write("a.txt", "1");
    fx.write("b.txt", "2");
    fx.write("c.txt", "3");
    fx.write("d.txt", "fatal");
    fx.write("e.txt", "5");

    let result = fx
        .index
        .index_files(&[fx.root()], &IndexOptions::default(), None)
        .await;
    assert!(matches!(result, Err(IndexError::Config(_))));

    // a and b were committed; c shared the failed batch with d
    let mut names: Vec<String> = fx
        .index
        .query("*", false)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.txt", "b.txt"]);

    fingerprinter.broken.store(false, Ordering::SeqCst);
    let rerun = fx.index_root(&IndexOptions::default()).await;
    assert_eq!(rerun.reused, 2);
    assert_eq!(rerun.hashed, 3);
    assert_eq!(fx.file_count().await, 5);

    let settled = fx.index_root(&IndexOptions::default()).await;
    assert_eq!(settled.reused, 5);
    assert_eq!(settled.hashed, 0);
}

#[tokio::test]
async fn progress_reports_every_candidate() {
    let fx = Fixture::new().await;
    fx.write("a.txt", "1");
    fx.write("b.txt", "2");

    let (tx, rx) = mpsc::channel();
    fx.index
        .index_files(&[fx.root()], &IndexOptions::default(), Some(tx))
        .await
        .unwrap();

    let updates: Vec<_> = rx.iter().collect();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].position, 0);
    assert_eq!(updates[1].position, 1);
    assert!(updates.iter().all(|u| u.total == 2));
}

#[tokio::test]
async fn remap_stops_at_directory_boundary() {
    let fx = Fixture::new().await;
    fx.write("data/a.txt", "a");
    fx.write("data/sub/b.txt", "b");
    fx.write("database/c.txt", "c");
    fx.index_root(&IndexOptions::default()).await;

    let from = format!("{}{}", dir_str(&fx.root().join("data")), std::path::MAIN_SEPARATOR);
    let to = dir_str(&fx.root().join("archive"));
    let changed = fx.index.remap(&from, &to).await.unwrap();
    assert_eq!(changed, 2);

    let c = fx.index.query_by_name("c.txt").await.unwrap();
    assert_eq!(c[0].dir, dir_str(&fx.root().join("database")));
    let b = fx.index.query_by_name("b.txt").await.unwrap();
    assert_eq!(b[0].dir, dir_str(&fx.root().join("archive").join("sub")));
}

#[tokio::test]
async fn delete_dir_stops_at_directory_boundary() {
    let fx = Fixture::new().await;
    fx.write("data/a.txt", "a");
    fx.write("data/sub/b.txt", "b");
    fx.write("database/c.txt", "c");
    fx.index_root(&IndexOptions::default()).await;

    let deleted = fx
        .index
        .delete_dir(&dir_str(&fx.root().join("data")))
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(fx.file_count().await, 1);
}

#[tokio::test]
async fn similar_files_rank_by_distance() {
    let fx = Fixture::numeric().await;
    fx.write("a.txt", "0");
    fx.write("b.txt", "5");
    fx.write("c.txt", "2");
    fx.write("d.txt", "2");
    fx.write("e.txt", "not a number");
    fx.index_root(&IndexOptions::default()).await;

    let similar = fx
        .index
        .query_similar(&Fingerprint::new("0"))
        .await
        .unwrap();
    let ranked: Vec<(&str, u32)> = similar
        .iter()
        .map(|s| (s.record.name.as_str(), s.distance))
        .collect();
    // Ties keep insertion order; incomparable records are skipped
    assert_eq!(ranked, vec![("a.txt", 0), ("c.txt", 2), ("d.txt", 2), ("b.txt", 5)]);
}

#[tokio::test]
async fn similar_results_are_limited() {
    let mut fx = Fixture::numeric().await;
    fx.index = fx.index.with_similar_limit(2);
    for i in 0..5 {
        fx.write(&format!("{i}.txt"), &i.to_string());
    }
    fx.index_root(&IndexOptions::default()).await;

    let similar = fx.index.query_similar(&Fingerprint::new("4")).await.unwrap();
    let distances: Vec<u32> = similar.iter().map(|s| s.distance).collect();
    assert_eq!(distances, vec![0, 1]);
}

#[tokio::test]
async fn glob_queries_match_full_paths() {
    let fx = Fixture::new().await;
    fx.write("photos/2019/beach.JPG", "1");
    fx.write("photos/2020/city.jpg", "2");
    fx.write("docs/readme.txt", "3");
    fx.index_root(&IndexOptions::default()).await;

    assert_eq!(fx.index.query("photos/**/*.jpg", false).await.unwrap().len(), 1);
    assert_eq!(fx.index.query("photos/**/*.jpg", true).await.unwrap().len(), 2);
    assert_eq!(fx.index.query("**/docs/*", false).await.unwrap().len(), 1);
    assert!(fx.index.query("*.png", false).await.unwrap().is_empty());
}

#[tokio::test]
async fn same_content_is_found_by_hash() {
    let fx = Fixture::new().await;
    fx.write("one/copy.txt", "same bytes");
    fx.write("two/other-name.txt", "same bytes");
    fx.write("three/copy.txt", "different");
    fx.index_root(&IndexOptions::default()).await;

    let first = &fx.index.query_by_name("copy.txt").await.unwrap()[0];
    let same_content = fx.index.query_by_hash(&first.hash).await.unwrap();
    assert_eq!(same_content.len(), 2);
    assert_eq!(fx.index.query_by_name("copy.txt").await.unwrap().len(), 2);
}

#[tokio::test]
async fn directory_listing_collapses_under_roots() {
    let fx = Fixture::new().await;
    fx.write("a/1.txt", "1");
    fx.write("a/b/2.txt", "2");
    fx.write("a/b/3.txt", "3");
    fx.write("a-side/4.txt", "4");
    fx.index_root(&IndexOptions::default()).await;

    let all = fx.index.directories(false).await.unwrap();
    assert_eq!(all.len(), 3);

    let roots = fx.index.directories(true).await.unwrap();
    let summary: Vec<(String, i64)> = roots.into_iter().map(|d| (d.dir, d.file_count)).collect();
    assert_eq!(
        summary,
        vec![
            (dir_str(&fx.root().join("a")), 3),
            (dir_str(&fx.root().join("a-side")), 1),
        ]
    );
}

#[tokio::test]
async fn import_merges_another_index() {
    let other = Fixture::new().await;
    other.write("theirs.txt", "t");
    other.index_root(&IndexOptions::default()).await;
    let other_db = other.index.path().to_path_buf();

    let fx = Fixture::new().await;
    fx.write("mine.txt", "m");
    fx.index_root(&IndexOptions::default()).await;

    let summary = fx
        .index
        .import(&other_db, ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.imported, 1);
    assert_eq!(fx.file_count().await, 2);
}

#[tokio::test]
async fn failed_import_changes_nothing() {
    let fx = Fixture::new().await;
    fx.write("mine.txt", "m");
    fx.index_root(&IndexOptions::default()).await;

    let missing = fx.tmp.path().join("missing.db");
    let result = fx.index.import(&missing, ImportOptions::default()).await;
    assert!(matches!(result, Err(IndexError::ImportFailure { .. })));

    let not_an_index = fx.tmp.path().join("junk.db");
    std::fs::write(&not_an_index, "definitely not sqlite").unwrap();
    let result = fx.index.import(&not_an_index, ImportOptions::default()).await;
    assert!(matches!(result, Err(IndexError::ImportFailure { .. })));

    assert_eq!(fx.file_count().await, 1);
}

#[tokio::test]
async fn reset_removes_the_index() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("index.db");
    let index = FileIndex::open(&db).await.unwrap();
    index.close().await;

    assert!(FileIndex::reset(&db).unwrap());
    assert!(!db.exists());
}
