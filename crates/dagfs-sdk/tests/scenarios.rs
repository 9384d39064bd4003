//! End-to-end behaviour of a node through its public API.

use dagfs_sdk::{
    to_v0, to_v1, AbortOptions, AddOptions, BlockPutOptions, ChmodOptions, Cid, CidVersion, Codec,
    CpOptions, ErrorKind, ImportEntry, Layout, LsOptions, MkdirOptions, ModeSpec, MvOptions, Node,
    NodeConfig, NodeKind, PinAddOptions, ReadOptions, StatOptions, WriteOptions,
};

async fn node() -> Node {
    Node::in_memory().await.unwrap()
}

async fn read(node: &Node, path: &str) -> Vec<u8> {
    node.files()
        .read_all(path, &ReadOptions::default())
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn block_put_then_get_returns_same_bytes() {
    let node = node().await;
    let cid = node
        .block()
        .put(&b"blorb"[..], &BlockPutOptions::default())
        .await
        .unwrap();
    let data = node.block().get(&cid, &AbortOptions::new()).await.unwrap();
    assert_eq!(&data[..], b"blorb");
}

#[tokio::test]
async fn v0_and_v1_address_the_same_block() {
    let node = node().await;
    let v0 = node
        .block()
        .put(
            vec![0x0a, 0x02, 0x08, 0x01],
            &BlockPutOptions::default().with_codec(Codec::DagPb),
        )
        .await
        .unwrap();
    let v1 = to_v1(&v0);
    assert_eq!(to_v0(&v1).unwrap(), v0);

    let a = node.block().get(&v0, &AbortOptions::new()).await.unwrap();
    let b = node.block().get(&v1, &AbortOptions::new()).await.unwrap();
    assert_eq!(a, b);

    let reparsed: Cid = dagfs_sdk::parse_cid(&v1.to_string()).unwrap();
    assert_eq!(reparsed, v1);
    assert!(v1.to_string().starts_with('b'));
}

// ---------------------------------------------------------------------------
// MFS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chmod_on_new_directory() {
    let node = node().await;
    let files = node.files();
    files.mkdir("/foo", &MkdirOptions::default()).await.unwrap();
    let stat = files.stat("/foo", &StatOptions::default()).await.unwrap();
    assert_eq!(stat.mode, 0o755);

    let mode: ModeSpec = "0777".parse().unwrap();
    files
        .chmod("/foo", &mode, &ChmodOptions::default())
        .await
        .unwrap();
    let stat = files.stat("/foo", &StatOptions::default()).await.unwrap();
    assert_eq!(stat.mode, 0o777);
}

#[tokio::test]
async fn sharded_directory_lists_plain_entries() {
    let node = node().await;
    let files = node.files();
    let layout = Layout::default().with_shard_split_threshold(0);
    files
        .mkdir(
            "/sharded",
            &MkdirOptions::default().with_layout(layout),
        )
        .await
        .unwrap();
    for i in 0..11 {
        files
            .write(
                &format!("/sharded/file-{i}"),
                format!("content {i}"),
                &WriteOptions::create().with_layout(layout),
            )
            .await
            .unwrap();
    }
    for dir in ["/sharded/sub-a", "/sharded/sub-b"] {
        files
            .mkdir(dir, &MkdirOptions::default().with_layout(layout))
            .await
            .unwrap();
    }

    let stat = files.stat("/sharded", &StatOptions::default()).await.unwrap();
    assert_eq!(stat.kind, NodeKind::HamtShardedDirectory);
    assert_eq!(stat.entry_type, "directory");

    let entries = files.ls("/sharded", &LsOptions::default()).await.unwrap();
    assert_eq!(entries.len(), 13);
    let file_count = entries.iter().filter(|e| e.entry_type == "file").count();
    assert_eq!(file_count, 11);
    let mut names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    names.sort_unstable();
    assert!(names.contains(&"file-10"));
    assert!(names.contains(&"sub-b"));
    assert_eq!(read(&node, "/sharded/file-7").await, b"content 7");
}

#[tokio::test]
async fn mv_moves_content() {
    let node = node().await;
    let files = node.files();
    files
        .write("/a", "moving content", &WriteOptions::create())
        .await
        .unwrap();
    let before = read(&node, "/a").await;

    files.mv(&["/a"], "/b", &MvOptions::default()).await.unwrap();

    let err = files.stat("/a", &StatOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("does not exist"));
    files.stat("/b", &StatOptions::default()).await.unwrap();
    assert_eq!(read(&node, "/b").await, before);
}

#[tokio::test]
async fn zero_length_write_and_read_past_end() {
    let node = node().await;
    let files = node.files();
    files
        .write(
            "/empty",
            "ignored content",
            &WriteOptions::create().with_length(0),
        )
        .await
        .unwrap();
    let stat = files.stat("/empty", &StatOptions::default()).await.unwrap();
    assert_eq!(stat.size, 0);

    files
        .write("/short", "abc", &WriteOptions::create())
        .await
        .unwrap();
    let tail = files
        .read_all("/short", &ReadOptions::range(10, None))
        .await
        .unwrap();
    assert!(tail.is_empty());
}

#[tokio::test]
async fn mfs_can_copy_from_imported_content() {
    let node = node().await;
    let out = node
        .add_all(
            vec![ImportEntry::file("site/index.html", "<html>")],
            &AddOptions::default(),
        )
        .await
        .unwrap();
    let site = out.iter().find(|e| e.path == "site").unwrap().cid;
    node.files()
        .cp(&[format!("/ipfs/{site}")], "/site", &CpOptions::default())
        .await
        .unwrap();
    assert_eq!(read(&node, "/site/index.html").await, b"<html>");
}

// ---------------------------------------------------------------------------
// Pins
// ---------------------------------------------------------------------------

#[tokio::test]
async fn indirect_pins_cannot_be_removed() {
    let node = node().await;
    let out = node
        .add_all(
            vec![ImportEntry::file("x/child", "child data")],
            &AddOptions::unpinned(),
        )
        .await
        .unwrap();
    let x = out.iter().find(|e| e.path == "x").unwrap().cid;
    let child = out.iter().find(|e| e.path == "x/child").unwrap().cid;

    node.pin().add(&x, &PinAddOptions::recursive()).await.unwrap();

    let err = node
        .pin()
        .rm(&child, true, &AbortOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PinnedIndirectly);
    assert!(err.to_string().contains("pinned indirectly"));

    // A direct pin on the child is allowed alongside the recursive parent.
    node.pin()
        .add(&child, &PinAddOptions::direct())
        .await
        .unwrap();
}

#[tokio::test]
async fn recursive_pin_twice_keeps_one_entry() {
    let node = node().await;
    let added = node.add("twice", &AddOptions::unpinned()).await.unwrap();
    for _ in 0..2 {
        node.pin()
            .add(&added.cid, &PinAddOptions::recursive())
            .await
            .unwrap();
    }
    assert_eq!(node.pinner().snapshot().len(), 1);
}

#[tokio::test]
async fn direct_pin_over_recursive_is_rejected() {
    let node = node().await;
    let added = node.add("content", &AddOptions::default()).await.unwrap();
    let err = node
        .pin()
        .add(&added.cid, &PinAddOptions::direct())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyPinnedRecursively);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn on_disk_node_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = NodeConfig::default();
    config.unixfs.cid_version = CidVersion::V1;
    config.unixfs.raw_leaves = true;
    let (root, pinned) = {
        let node = Node::init(dir.path(), config).await.unwrap();
        node.files()
            .write("/docs/a.txt", "persisted", &WriteOptions::create().with_parents())
            .await
            .unwrap();
        let added = node.add("pinned", &AddOptions::default()).await.unwrap();
        (node.files().root(), added.cid)
    };

    let node = Node::open_repo(dir.path()).await.unwrap();
    assert_eq!(node.config().unixfs.cid_version, CidVersion::V1);
    assert_eq!(node.files().root(), root);
    assert_eq!(read(&node, "/docs/a.txt").await, b"persisted");
    assert!(node
        .pin()
        .is_pinned(&pinned, &AbortOptions::new())
        .await
        .unwrap()
        .is_some());
}
