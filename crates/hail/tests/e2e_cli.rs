use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serial_test::serial;

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_hail")
}

fn seed(db: &Path, name: &str, title: &str, description: &str) {
    let status = Command::new(bin())
        .arg("seed")
        .arg("--name")
        .arg(name)
        .arg("--title")
        .arg(title)
        .arg("--description")
        .arg(description)
        .arg("--db-path")
        .arg(db)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success(), "seed failed");
}

struct Chain {
    child: Child,
    orchestrator: u16,
    directory: u16,
    formatter: u16,
}

fn spawn_all(db: &Path) -> Chain {
    let orchestrator = free_port();
    let directory = free_port();
    let formatter = free_port();

    let child = Command::new(bin())
        .arg("run")
        .arg("all")
        .arg("--db-path")
        .arg(db)
        .arg("--orchestrator-addr")
        .arg(format!("127.0.0.1:{orchestrator}"))
        .arg("--directory-addr")
        .arg(format!("127.0.0.1:{directory}"))
        .arg("--formatter-addr")
        .arg(format!("127.0.0.1:{formatter}"))
        .arg("--directory-url")
        .arg(format!("http://127.0.0.1:{directory}"))
        .arg("--formatter-url")
        .arg(format!("http://127.0.0.1:{formatter}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    Chain {
        child,
        orchestrator,
        directory,
        formatter,
    }
}

// Ready as soon as any HTTP response comes back, whatever the status.
async fn wait_http_ready(url: &str, child: &mut Child) {
    let client = reqwest::Client::new();
    let mut ready = false;
    for _ in 0..100 {
        assert!(child.try_wait().unwrap().is_none(), "hail exited early");
        if client.get(url).send().await.is_ok() {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(ready, "service not ready at {url}");
}

#[tokio::test]
#[serial]
async fn e2e_full_chain_over_http() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("hail.duckdb");
    seed(&db, "Ada", "Dr.", "pioneer of computing");

    let mut chain = spawn_all(&db);
    // The orchestrator binds last, so once it answers all three are up.
    wait_http_ready(
        &format!("http://127.0.0.1:{}/sayHello/warmup", chain.orchestrator),
        &mut chain.child,
    )
    .await;

    let greeting = reqwest::get(format!(
        "http://127.0.0.1:{}/sayHello/Ada",
        chain.orchestrator
    ))
    .await
    .unwrap();
    assert!(greeting.status().is_success());
    assert_eq!(
        greeting.text().await.unwrap(),
        "Hello, Dr. Ada! pioneer of computing"
    );

    let fallback = reqwest::get(format!(
        "http://127.0.0.1:{}/sayHello/Bob",
        chain.orchestrator
    ))
    .await
    .unwrap()
    .text()
    .await
    .unwrap();
    assert_eq!(fallback, "Hello, Bob!");

    let person: serde_json::Value = reqwest::get(format!(
        "http://127.0.0.1:{}/getPerson/Ada",
        chain.directory
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(person["name"], "Ada");
    assert_eq!(person["title"], "Dr.");

    let rendered = reqwest::get(format!(
        "http://127.0.0.1:{}/formatGreeting?title=&name=Zo&description=",
        chain.formatter
    ))
    .await
    .unwrap()
    .text()
    .await
    .unwrap();
    assert_eq!(rendered, "Hello, Zo!");

    let _ = chain.child.kill();
    let _ = chain.child.wait();
}

#[tokio::test]
#[serial]
async fn e2e_mono_topology_serves_the_same_greetings() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("hail.duckdb");
    seed(&db, "Ada", "Dr.", "pioneer of computing");

    let port = free_port();
    let mut child = Command::new(bin())
        .arg("run")
        .arg("mono")
        .arg("--db-path")
        .arg(&db)
        .arg("--orchestrator-addr")
        .arg(format!("127.0.0.1:{port}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    wait_http_ready(
        &format!("http://127.0.0.1:{port}/sayHello/warmup"),
        &mut child,
    )
    .await;

    let greeting = reqwest::get(format!("http://127.0.0.1:{port}/sayHello/Ada"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(greeting, "Hello, Dr. Ada! pioneer of computing");

    let fallback = reqwest::get(format!("http://127.0.0.1:{port}/sayHello/Bob"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(fallback, "Hello, Bob!");

    let _ = child.kill();
    let _ = child.wait();
}

#[tokio::test]
#[serial]
async fn e2e_orchestrator_reports_downstream_failure() {
    let port = free_port();
    let dead = free_port();
    let mut child = Command::new(bin())
        .arg("run")
        .arg("orchestrator")
        .arg("--orchestrator-addr")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--directory-url")
        .arg(format!("http://127.0.0.1:{dead}"))
        .arg("--formatter-url")
        .arg(format!("http://127.0.0.1:{dead}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    wait_http_ready(
        &format!("http://127.0.0.1:{port}/sayHello/warmup"),
        &mut child,
    )
    .await;

    let response = reqwest::get(format!("http://127.0.0.1:{port}/sayHello/Ada"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    let _ = child.kill();
    let _ = child.wait();
}
