//! Drive a local queue end to end: enqueue a few commands, run them one at
//! a time and stream their PTY output.
//!
//! Usage: `cargo run --example local_demo [data-dir]`

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use flowq_core::backend::{Connect, Queue, QueueList};
use flowq_core::{LocalConnect, Task};

#[tokio::main]
async fn main() -> Result<()> {
    flowq_core::init();

    let data_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| ".".to_string());

    let connect = LocalConnect::new();
    connect.start_connect(&data_dir, 0).await?;
    let list = connect.open_queue_list().await?;

    if !list.list_queue().await?.contains(&"demo".to_string()) {
        list.create_queue("demo").await?;
    }
    let queue: Arc<dyn Queue> = list.get_queue("demo").await?;

    queue
        .add_task(Task::new("/bin/echo", vec!["hello from flowq".into()], "."))
        .await?;
    queue
        .add_task(Task::new(
            "/bin/sh",
            vec!["-c".into(), "for i in 1 2 3; do echo step $i; done".into()],
            ".",
        ))
        .await?;

    println!("pending: {:?}", queue.list_pending().await?);
    queue.start().await?;

    while queue.is_running().await? {
        for chunk in queue.read_current_output().await? {
            print!("{}", String::from_utf8_lossy(&chunk));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    for id in queue.list_finished().await? {
        let task = queue.finished_details(id).await?;
        println!(
            "task {} ({}) -> exit {} success={}",
            task.id, task.exec_name, task.exit_code, task.is_success
        );
    }

    list.return_queue(queue).await;
    Ok(())
}
