//! In-process stand-in for the planning backend, served by axum on an ephemeral port.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    Form, Json, Router,
    extract::{
        Path, Query, Request, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tokio::{net::TcpListener, task::JoinHandle};

#[derive(Default)]
struct Recorded {
    requests: Vec<String>,
    sockets: Vec<String>,
    pings: usize,
}

#[derive(Clone)]
struct Backend {
    recorded: Arc<Mutex<Recorded>>,
    frames: Arc<Vec<String>>,
    hold_open: bool,
}

/// Fake REST + realtime backend. Aborted on drop.
pub(crate) struct FakeBackend {
    addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
    task: JoinHandle<()>,
}

impl FakeBackend {
    /// Backend whose realtime endpoint pushes nothing and keeps sockets open.
    pub(crate) async fn spawn() -> Self {
        Self::spawn_with(Vec::new(), true).await
    }

    /// Backend whose realtime endpoint pushes `frames` to every new socket, then either
    /// keeps the socket open or closes it.
    pub(crate) async fn spawn_with(frames: Vec<String>, hold_open: bool) -> Self {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let backend = Backend {
            recorded: Arc::clone(&recorded),
            frames: Arc::new(frames),
            hold_open,
        };

        let app = Router::new()
            .route("/planning/sessions", post(create_session))
            .route("/planning/sessions/{id}", get(find_session))
            .route("/planning/sessions/{id}/vote", post(submit_vote))
            .route("/planning/sessions/{id}/reveal", post(reveal))
            .route("/planning/sessions/{id}/estimate", put(set_estimate))
            .route("/planning/ws/{id}", get(realtime))
            .route("/users/login", post(login))
            .route("/users/register", post(register))
            .layer(middleware::from_fn_with_state(backend.clone(), record))
            .with_state(backend);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend address");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            recorded,
            task,
        }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `"METHOD path bearer=token"` for every REST request, in arrival order.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.lock()
            .requests
            .iter()
            .filter(|line| !line.contains("/planning/ws/"))
            .cloned()
            .collect()
    }

    /// `"session token"` for every accepted realtime socket.
    pub(crate) fn sockets(&self) -> Vec<String> {
        self.lock().sockets.clone()
    }

    /// Heartbeat frames received across all sockets.
    pub(crate) fn pings(&self) -> usize {
        self.lock().pings
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().expect("fake backend lock")
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn record(State(backend): State<Backend>, request: Request, next: Next) -> Response {
    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or("-")
        .to_string();
    let line = format!("{} {} bearer={bearer}", request.method(), request.uri().path());
    backend.recorded.lock().expect("record").requests.push(line);
    next.run(request).await
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn session_json(id: &str) -> Value {
    json!({
        "id": id,
        "story_id": "story-1",
        "created_by": "u1",
        "status": "voting",
        "scale": "fibonacci",
        "created_at": "2024-05-01T10:00:00.123456",
        "vote_count": 0,
        "votes_revealed": false
    })
}

async fn create_session(Json(body): Json<Value>) -> Response {
    let mut session = session_json("S-new");
    session["story_id"] = body["story_id"].clone();
    session["scale"] = body["scale"].clone();
    (StatusCode::CREATED, Json(session)).into_response()
}

async fn find_session(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "missing" => detail(StatusCode::NOT_FOUND, "Planning session not found"),
        "expired" => detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"),
        _ => Json(session_json(&id)).into_response(),
    }
}

async fn submit_vote(Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    let value = body["value"].as_str().unwrap_or_default();
    if value == "99" {
        return detail(StatusCode::BAD_REQUEST, "Invalid vote value for this scale");
    }
    Json(json!({
        "id": "v1",
        "session_id": id,
        "user_id": "u1",
        "username": "alice",
        "value": value,
        "created_at": "2024-05-01T10:05:00"
    }))
    .into_response()
}

async fn reveal(Path(id): Path<String>) -> Response {
    if id == "locked" {
        return detail(
            StatusCode::FORBIDDEN,
            "Only the session creator or a facilitator can reveal votes",
        );
    }
    Json(json!({
        "session_id": id,
        "votes": [
            {"id": "v1", "session_id": id, "user_id": "u1", "username": "alice", "value": "3"},
            {"id": "v2", "session_id": id, "user_id": "u2", "username": "bob", "value": "5"}
        ],
        "average": 4.0,
        "median": "4.0"
    }))
    .into_response()
}

async fn set_estimate(Json(body): Json<Value>) -> Response {
    Json(json!({
        "message": "Final estimate set",
        "final_estimate": body["final_estimate"].clone()
    }))
    .into_response()
}

async fn login(Form(form): Form<HashMap<String, String>>) -> Response {
    let username = form.get("username").cloned().unwrap_or_default();
    if form.get("password").map(String::as_str) != Some("secret") {
        return detail(StatusCode::UNAUTHORIZED, "Incorrect username or password");
    }
    Json(json!({
        "access_token": format!("tok-{username}"),
        "token_type": "bearer"
    }))
    .into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["username"] == "taken" {
        return detail(StatusCode::BAD_REQUEST, "Username already registered");
    }
    Json(json!({
        "id": "new-user",
        "username": body["username"].clone(),
        "role": body["role"].clone()
    }))
    .into_response()
}

async fn realtime(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let token = query.get("token").cloned().unwrap_or_default();
    backend
        .recorded
        .lock()
        .expect("record socket")
        .sockets
        .push(format!("{id} {token}"));
    upgrade.on_upgrade(move |socket| serve_socket(backend, socket))
}

async fn serve_socket(backend: Backend, mut socket: WebSocket) {
    for frame in backend.frames.iter() {
        if socket
            .send(Message::Text(frame.clone().into()))
            .await
            .is_err()
        {
            return;
        }
    }

    if !backend.hold_open {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) if text.as_str() == "ping" => {
                backend.recorded.lock().expect("record ping").pings += 1;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}
