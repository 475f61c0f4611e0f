use archive_graph::config::default_db_path;
use archive_graph::indexer::{BuildError, BuildOptions, Indexer};
use archive_graph::model::{EdgeKind, NodeKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_repo_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("archive-graph-build-{label}-{nanos}-{counter}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

const APP_PY: &str = "\
def foo():
    x = 1
    return x

class Bar:
    def baz(self):
        pass
        return None

    other = 2
";

fn build(root: &Path) -> (Indexer, archive_graph::model::BuildStats) {
    let mut indexer = Indexer::new(root.to_path_buf(), default_db_path(root)).unwrap();
    let stats = indexer.build().unwrap();
    (indexer, stats)
}

#[test]
fn class_methods_are_contained_by_their_class() {
    let repo_root = temp_repo_dir("scenario");
    write(&repo_root, "app.py", APP_PY);
    let (indexer, stats) = build(&repo_root);
    assert_eq!(stats.indexed, 1);
    assert_eq!(stats.entities, 3);

    let db = indexer.db();
    let nodes = db.nodes_in_file("app.py").unwrap();
    let find = |name: &str| nodes.iter().find(|n| n.name == name).unwrap().clone();
    let file = find("app.py");
    let foo = find("foo");
    let bar = find("Bar");
    let baz = find("baz");
    assert_eq!(file.kind, NodeKind::File);
    assert_eq!((foo.kind, foo.start_line, foo.end_line), (NodeKind::Function, 0, 2));
    assert_eq!((bar.kind, bar.start_line, bar.end_line), (NodeKind::Class, 4, 9));
    assert_eq!((baz.kind, baz.start_line, baz.end_line), (NodeKind::Method, 5, 7));

    let from_file: Vec<i64> = db
        .edges_from(file.id)
        .unwrap()
        .iter()
        .map(|e| e.target_id)
        .collect();
    assert!(from_file.contains(&foo.id));
    assert!(from_file.contains(&bar.id));
    assert!(!from_file.contains(&baz.id));

    let from_bar = db.edges_from(bar.id).unwrap();
    assert_eq!(from_bar.len(), 1);
    assert_eq!(from_bar[0].target_id, baz.id);
    assert_eq!(from_bar[0].kind, EdgeKind::Contains);

    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn rebuilding_an_unchanged_tree_is_idempotent() {
    let repo_root = temp_repo_dir("idempotent");
    write(&repo_root, "app.py", APP_PY);
    write(&repo_root, "web/main.js", "class View {\n  draw() {}\n}\nfunction boot() {}\n");
    write(&repo_root, "cmd/main.go", "package main\n\nfunc main() {}\n");

    let (indexer, first) = build(&repo_root);
    let digest = indexer.db().digest().unwrap();
    let counts = indexer.db().counts().unwrap();
    drop(indexer);

    let (indexer, second) = build(&repo_root);
    assert_eq!(indexer.db().counts().unwrap(), counts);
    assert_eq!(indexer.db().digest().unwrap(), digest);
    assert_eq!(first.nodes_total, second.nodes_total);
    assert_eq!(first.edges_total, second.edges_total);
    assert_eq!(second.edges, 0);
    assert_eq!(second.entities, first.entities);

    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn containment_forms_a_tree_per_file() {
    let repo_root = temp_repo_dir("tree");
    write(
        &repo_root,
        "src/shapes.rs",
        "\
struct Circle;

impl Circle {
    fn area(&self) -> f64 { 0.0 }
    fn scale(&mut self) {
        fn clamp() {}
    }
}

fn main() {}
",
    );
    let (indexer, stats) = build(&repo_root);
    let db = indexer.db();
    let nodes = db.nodes_in_file("src/shapes.rs").unwrap();
    let file = nodes.iter().find(|n| n.kind == NodeKind::File).unwrap();

    let mut seen = HashSet::from([file.id]);
    let mut frontier = vec![file.id];
    let mut edge_count = 0;
    while let Some(id) = frontier.pop() {
        for edge in db.edges_from(id).unwrap() {
            edge_count += 1;
            assert!(seen.insert(edge.target_id), "node reached twice");
            frontier.push(edge.target_id);
        }
    }
    // One edge per recognized construct, every node reachable.
    assert_eq!(edge_count, stats.entities);
    assert_eq!(seen.len(), nodes.len());

    let clamp = nodes.iter().find(|n| n.name == "clamp").unwrap();
    assert_eq!(clamp.kind, NodeKind::Function);

    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn bad_files_are_skipped_not_fatal() {
    let repo_root = temp_repo_dir("skip");
    write(&repo_root, "good.py", "def ok():\n    return 1\n");
    write(&repo_root, "broken.py", "def broken(:\n    return (\n");
    write(&repo_root, "notes.txt", "def not_code():\n");
    write(&repo_root, "data.bin", "\u{0}\u{1}\u{2}");

    let (indexer, stats) = build(&repo_root);
    assert_eq!(stats.scanned, 4);
    assert_eq!(stats.unsupported, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.indexed, 2);

    let files: Vec<String> = indexer
        .db()
        .list_file_nodes()
        .unwrap()
        .into_iter()
        .map(|n| n.file_path)
        .collect();
    assert_eq!(files, vec!["broken.py", "good.py"]);
    let good = indexer.db().nodes_in_file("good.py").unwrap();
    assert!(good.iter().any(|n| n.name == "ok" && n.kind == NodeKind::Function));

    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn non_utf8_names_do_not_abort_the_file() {
    let repo_root = temp_repo_dir("latin1");
    let mut bytes = b"def caf".to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(b"():\n    pass\n\ndef plain():\n    pass\n");
    std::fs::write(repo_root.join("odd.py"), bytes).unwrap();

    let (indexer, stats) = build(&repo_root);
    assert_eq!(stats.failed, 0);
    let nodes = indexer.db().nodes_in_file("odd.py").unwrap();
    assert!(nodes.iter().any(|n| n.name == "plain"));

    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn excluded_directories_are_never_indexed() {
    let repo_root = temp_repo_dir("exclude");
    write(&repo_root, "src/app.py", "def run():\n    pass\n");
    write(&repo_root, "node_modules/dep/index.js", "function dep() {}\n");
    write(&repo_root, ".git/hooks/hook.py", "def hook():\n    pass\n");
    write(&repo_root, "pkg/__pycache__/cached.py", "def cached():\n    pass\n");

    let (indexer, stats) = build(&repo_root);
    assert_eq!(stats.indexed, 1);
    let files = indexer.db().list_file_nodes().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_path, "src/app.py");

    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn fresh_build_drops_removed_files() {
    let repo_root = temp_repo_dir("fresh");
    write(&repo_root, "a.py", "def a():\n    pass\n");
    write(&repo_root, "b.py", "def b():\n    pass\n");
    let (indexer, _) = build(&repo_root);
    drop(indexer);

    std::fs::remove_file(repo_root.join("b.py")).unwrap();

    // Appending keeps what was indexed before.
    let (indexer, _) = build(&repo_root);
    assert_eq!(indexer.db().list_file_nodes().unwrap().len(), 2);
    drop(indexer);

    let options = BuildOptions {
        fresh: true,
        ..BuildOptions::default()
    };
    let mut indexer =
        Indexer::new_with_options(repo_root.clone(), default_db_path(&repo_root), options)
            .unwrap();
    indexer.build().unwrap();
    let files = indexer.db().list_file_nodes().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "a.py");

    let _ = std::fs::remove_dir_all(&repo_root);
}

#[test]
fn missing_root_is_rejected() {
    let repo_root = temp_repo_dir("missing");
    let gone = repo_root.join("does-not-exist");
    let result = Indexer::new(gone.clone(), default_db_path(&gone));
    assert!(matches!(result, Err(BuildError::InvalidRoot(_))));

    let _ = std::fs::remove_dir_all(&repo_root);
}
