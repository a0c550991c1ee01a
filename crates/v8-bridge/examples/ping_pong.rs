//! Ping/pong between the host and a worker
//!
//! Run with: cargo run -p v8-bridge --example ping_pong

use v8_bridge::{MessageHost, Worker, WorkerConfig, WorkerId};

const SCRIPT: &str = r#"
$recv(msg => {
    $print("worker got", msg);
    if (msg === "ping") $send("pong");
});

$recvSync(msg => {
    const time = $sendSync("time?");
    return msg.toUpperCase() + " at " + time;
});
"#;

struct Console;

impl MessageHost for Console {
    fn on_message(&self, worker: WorkerId, message: &str) {
        println!("  host got {:?} from worker {}", message, worker);
    }

    fn on_message_sync(&self, _worker: WorkerId, message: &str) -> Option<String> {
        (message == "time?").then(|| "noon".to_string())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    v8_bridge::init()?;
    println!("=== V8 {} ===", v8_bridge::version());

    let worker = Worker::with_config(1, Console, &WorkerConfig::default())?;
    worker.load("ping_pong.js", SCRIPT)?;

    println!("\n=== Async ===");
    worker.send_message("ping")?;

    println!("\n=== Sync ===");
    println!("  reply: {}", worker.send_message_sync("hello"));

    println!("\n=== Errors ===");
    if let Err(err) = worker.load("broken.js", "this is not javascript") {
        print!("{}", err);
    }

    worker.dispose();
    v8_bridge::teardown()?;
    Ok(())
}
