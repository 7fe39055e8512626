//! Wire round-trips: a remote backend talking to an in-process daemon.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flowq_core::backend::{Connect, Queue, QueueList};
use flowq_core::net::server::serve;
use flowq_core::{running_as_super_user, Error, LocalConnect, RemoteConnect, Task};
use tokio::net::TcpListener;

/// Serve a fresh local backend on an ephemeral port.
async fn spawn_daemon(dir: &std::path::Path) -> SocketAddr {
    let connect = LocalConnect::new();
    connect
        .start_connect(dir.to_str().unwrap(), 0)
        .await
        .unwrap();
    let list = connect.open_queue_list().await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = serve(listener, Arc::clone(&list)).await;
    });
    addr
}

async fn remote_list(addr: SocketAddr) -> Arc<dyn QueueList> {
    let connect = RemoteConnect::new();
    connect
        .start_connect("127.0.0.1", addr.port())
        .await
        .unwrap();
    connect.open_queue_list().await.unwrap()
}

#[tokio::test]
async fn test_queue_lifecycle_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_daemon(dir.path()).await;
    let list = remote_list(addr).await;

    list.create_queue("wire").await.unwrap();
    assert_eq!(list.list_queue().await.unwrap(), vec!["wire".to_string()]);
    assert!(matches!(
        list.create_queue("wire").await,
        Err(Error::AlreadyExists(_))
    ));

    list.rename_queue("wire", "renamed").await.unwrap();
    assert_eq!(list.list_queue().await.unwrap(), vec!["renamed".to_string()]);

    list.delete_queue("renamed").await.unwrap();
    assert!(list.list_queue().await.unwrap().is_empty());
    assert!(matches!(
        list.delete_queue("renamed").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_task_round_trip_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_daemon(dir.path()).await;
    let list = remote_list(addr).await;

    list.create_queue("jobs").await.unwrap();
    let queue = list.get_queue("jobs").await.unwrap();
    assert_eq!(queue.name(), "jobs");

    let spec = Task::new("/bin/echo", vec!["over".into(), "".into()], "/tmp");
    let id = queue.add_task(spec.clone()).await.unwrap();

    assert_eq!(queue.list_pending().await.unwrap(), vec![id]);
    let details = queue.pending_details(id).await.unwrap();
    assert_eq!(details.id, id);
    assert_eq!(details.exec_name, spec.exec_name);
    assert_eq!(details.args, spec.args);
    assert_eq!(details.work_dir, spec.work_dir);

    queue.remove_task(id).await.unwrap();
    assert!(queue.list_pending().await.unwrap().is_empty());
    list.return_queue(queue).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_task_over_the_wire() {
    if running_as_super_user() {
        eprintln!("skipped: running as super-user");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_daemon(dir.path()).await;
    let list = remote_list(addr).await;

    list.create_queue("run").await.unwrap();
    let queue = list.get_queue("run").await.unwrap();
    let id = queue
        .add_task(Task::new("/bin/echo", vec!["streamed".into()], "."))
        .await
        .unwrap();

    queue.start().await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(20);
    let mut output = Vec::new();
    loop {
        for chunk in queue.read_current_output().await.unwrap() {
            output.extend_from_slice(&chunk);
        }
        if !queue.is_running().await.unwrap() {
            break;
        }
        assert!(Instant::now() < deadline, "remote queue did not go idle");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(queue.list_finished().await.unwrap(), vec![id]);
    let finished = queue.finished_details(id).await.unwrap();
    assert_eq!(finished.exit_code, 0);
    assert!(finished.is_success);
    assert!(String::from_utf8_lossy(&output).contains("streamed"));
}

#[tokio::test]
async fn test_errors_keep_their_kind_across_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_daemon(dir.path()).await;
    let list = remote_list(addr).await;

    // Unknown queue: the stub is created eagerly, the server rejects calls.
    let ghost = list.get_queue("ghost").await.unwrap();
    assert!(matches!(
        ghost.list_pending().await,
        Err(Error::NotFound(_))
    ));

    list.create_queue("q").await.unwrap();
    let queue = list.get_queue("q").await.unwrap();
    assert!(matches!(
        queue.pending_details(404).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(queue.current_task().await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_connect_timeout_maps_to_timeout_error() {
    // RFC 5737 TEST-NET-1 address: connection attempts hang until the
    // deadline trips.
    let connect = RemoteConnect::new();
    let result = connect.start_connect("192.0.2.1", 9).await;
    assert!(matches!(
        result,
        Err(Error::Timeout(_)) | Err(Error::Os(_))
    ));
}
