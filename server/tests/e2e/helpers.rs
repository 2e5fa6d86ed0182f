//! Test helpers for e2e tests

use std::net::SocketAddr;

use tokio::net::TcpListener;

use server::{build_router, AppState};

/// Serve the real router on an ephemeral local port.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn speech_url(addr: SocketAddr) -> String {
    format!("http://{addr}/api/speech")
}
