//! Many callers hammering one filesystem.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use memfs_kernel::{CallerContext, FsError, FsOps, MemFs};

const WORKERS: usize = 8;
const ROUNDS: usize = 50;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_open_unlink_close_from_many_threads() {
    init_tracing();
    let fs = MemFs::default();
    let ctx = CallerContext::root();

    let threads: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let fs = fs.clone();
            std::thread::spawn(move || {
                for round in 0..ROUNDS {
                    let path = format!("/w{worker}-{round}");
                    let payload = path.as_bytes();
                    let handle = fs.create(&ctx, &path, 0o644).unwrap();
                    handle.write(payload, 0).unwrap();
                    let second = fs.open(&ctx, &path).unwrap();
                    fs.unlink(&ctx, &path).unwrap();
                    assert_eq!(second.read(payload.len(), 0).unwrap(), payload);
                    drop(handle);
                    drop(second);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let st = fs.statfs().unwrap();
    assert_eq!(fs.inode_count(), 1);
    assert_eq!(st.ffree, st.files - 1);
}

#[test]
fn test_shared_file_survives_racing_unlinks() {
    init_tracing();
    let fs = MemFs::default();
    let ctx = CallerContext::root();
    fs.write_all(&ctx, "/shared", b"contents").unwrap();
    for i in 1..WORKERS {
        fs.link(&ctx, "/shared", &format!("/alias{i}")).unwrap();
    }

    let removed = Arc::new(AtomicUsize::new(0));
    let threads: Vec<_> = (0..WORKERS)
        .map(|i| {
            let fs = fs.clone();
            let removed = removed.clone();
            std::thread::spawn(move || {
                let path = if i == 0 {
                    "/shared".to_string()
                } else {
                    format!("/alias{i}")
                };
                let handle = fs.open(&ctx, &path).unwrap();
                fs.unlink(&ctx, &path).unwrap();
                removed.fetch_add(1, Ordering::SeqCst);
                assert_eq!(handle.read(8, 0).unwrap(), b"contents");
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(removed.load(Ordering::SeqCst), WORKERS);
    assert_eq!(fs.inode_count(), 1);
}

#[test]
fn test_racing_mkdir_exactly_one_wins() {
    init_tracing();
    let fs = MemFs::default();
    let ctx = CallerContext::root();
    let wins = Arc::new(AtomicUsize::new(0));

    let threads: Vec<_> = (0..WORKERS)
        .map(|_| {
            let fs = fs.clone();
            let wins = wins.clone();
            std::thread::spawn(move || match fs.mkdir(&ctx, "/contested", 0o755) {
                Ok(_) => {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
                Err(FsError::AlreadyExists(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(wins.load(Ordering::SeqCst), 1);
    assert_eq!(fs.getattr(&ctx, "/").unwrap().nlink, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_blocking_tasks_share_namespace() {
    init_tracing();
    let fs = MemFs::default();
    let ctx = CallerContext::root();
    fs.mkdir(&ctx, "/dirs", 0o755).unwrap();

    let mut tasks = Vec::new();
    for worker in 0..WORKERS {
        let fs = fs.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            for round in 0..ROUNDS {
                let dir = format!("/dirs/d{worker}-{round}");
                fs.mkdir(&ctx, &dir, 0o755).unwrap();
                fs.write_all(&ctx, &format!("{dir}/f"), b"x").unwrap();
                let moved = format!("/dirs/m{worker}-{round}");
                fs.rename(&ctx, &dir, &moved).unwrap();
                fs.unlink(&ctx, &format!("{moved}/f")).unwrap();
                if round % 2 == 0 {
                    fs.rmdir(&ctx, &moved).unwrap();
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let kept = WORKERS * ROUNDS / 2;
    let dirs = fs.getattr(&ctx, "/dirs").unwrap();
    assert_eq!(dirs.nlink as usize, 2 + kept);
    assert_eq!(dirs.size as usize, 2 + kept);
    assert_eq!(fs.inode_count(), 2 + kept);
}
