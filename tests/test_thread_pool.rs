use staticd::config::{Config, Mode, ServerConfig, StaticFilesConfig};
use staticd::pool::{Pool, ThreadPool, WorkerPool};
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::fd::OwnedFd;
use tempfile::TempDir;

fn site(pages: usize) -> (TempDir, StaticFilesConfig) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), b"<h1>hi</h1>\n").unwrap();
    for i in 0..pages {
        fs::write(dir.path().join(format!("page{i}.txt")), format!("page number {i}")).unwrap();
    }
    let cfg = StaticFilesConfig {
        root_dir: dir.path().to_path_buf(),
        ..StaticFilesConfig::default()
    };
    (dir, cfg)
}

fn server(workers: usize) -> ServerConfig {
    ServerConfig {
        workers,
        read_timeout_ms: 2000,
        ..ServerConfig::default()
    }
}

fn round_trip(pool: &dyn WorkerPool, listener: &TcpListener, request: &[u8]) -> String {
    let mut client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    client.write_all(request).unwrap();

    let (accepted, _) = listener.accept().unwrap();
    pool.notify(OwnedFd::from(accepted)).unwrap();

    let mut buf = Vec::new();
    client.read_to_end(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

#[test]
fn test_sequential_handoffs_are_each_served_once() {
    let (_dir, static_files) = site(5);
    let mut pool = ThreadPool::create(&server(2), &static_files).unwrap();
    pool.start().unwrap();
    assert_eq!(pool.live_workers(), 2);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    for i in 0..5 {
        let request = format!("GET /page{i}.txt HTTP/1.0\r\n\r\n");
        let text = round_trip(&pool, &listener, request.as_bytes());

        assert_eq!(text.matches("HTTP/1.0 ").count(), 1);
        assert!(text.ends_with(&format!("\r\n\r\npage number {i}")));
    }

    pool.stop().unwrap();
}

#[test]
fn test_missing_pages_yield_server_error() {
    let (_dir, static_files) = site(0);
    let mut pool = ThreadPool::create(&server(1), &static_files).unwrap();
    pool.start().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let text = round_trip(&pool, &listener, b"GET /missing HTTP/1.0\r\n\r\n");

    assert!(text.starts_with("HTTP/1.0 500 Internal Server Error\r\n"));
    assert!(!text.contains("Content-Length"));
    assert!(text.ends_with("\r\n\r\n"));

    pool.stop().unwrap();
}

#[test]
fn test_stop_joins_every_worker() {
    let (_dir, static_files) = site(0);
    let mut pool = ThreadPool::create(&server(3), &static_files).unwrap();
    pool.start().unwrap();

    pool.stop().unwrap();

    assert!(!pool.is_running());
    assert_eq!(pool.live_workers(), 0);
    pool.stop().unwrap();

    let (a, _b) = std::os::unix::net::UnixStream::pair().unwrap();
    assert!(pool.notify(OwnedFd::from(a)).is_err());
}

#[test]
fn test_pool_selects_backend_from_mode() {
    let (_dir, static_files) = site(1);
    let mut cfg = Config::default();
    cfg.server = server(2);
    cfg.server.mode = Mode::Thread;
    cfg.static_files = static_files;

    let mut pool = Pool::create(&cfg).unwrap();
    assert_eq!(pool.mode(), Mode::Thread);
    pool.start().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let text = round_trip(&pool, &listener, b"GET /page0.txt HTTP/1.0\r\n\r\n");
    assert!(text.ends_with("page number 0"));

    pool.destroy().unwrap();
}
