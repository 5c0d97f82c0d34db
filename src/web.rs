//! Local web UI. One page plus JSON endpoints; every action runs to completion
//! inside its request and replies with a `{status, message}` object.
//!
//! Each browser gets its own session through a cookie, so the last report and
//! detected topic of one visitor are never shown to another.

use crate::connect::ResearchConnect;
use crate::mail::{parse_recipients, report_subject, MailRequest};
use crate::paper::TopicOutcome;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const MAX_LOG_LINES: usize = 500;
const MAX_SESSIONS: usize = 256;
const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;
const SESSION_COOKIE: &str = "rc_session";

#[derive(Debug, Serialize, PartialEq)]
struct StatusMessage {
    status: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
}

impl StatusMessage {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            report: None,
            topic: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            ..Self::ok(message)
        }
    }
}

#[derive(Debug, Deserialize)]
struct FindRequest {
    topic: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    recipients: String,
    #[serde(default)]
    body: String,
}

/// What one visitor last looked up or uploaded.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
struct SessionView {
    report: Option<String>,
    topic: Option<String>,
    detected_topic: Option<String>,
    subject: Option<String>,
    body: Option<String>,
}

/// Session views keyed by cookie id. Past `MAX_SESSIONS` the oldest is dropped.
#[derive(Default)]
struct SessionStore {
    views: HashMap<String, SessionView>,
    order: VecDeque<String>,
}

impl SessionStore {
    fn get(&self, id: &str) -> SessionView {
        self.views.get(id).cloned().unwrap_or_default()
    }

    fn entry(&mut self, id: &str) -> &mut SessionView {
        if !self.views.contains_key(id) {
            if self.order.len() >= MAX_SESSIONS {
                if let Some(oldest) = self.order.pop_front() {
                    self.views.remove(&oldest);
                }
            }
            self.order.push_back(id.to_string());
        }
        self.views.entry(id.to_string()).or_default()
    }
}

/// Keeps a well-formed cookie id, otherwise starts a new session.
fn session_id_or_new(cookie: Option<String>) -> String {
    cookie
        .filter(|id| Uuid::parse_str(id).is_ok())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn with_session_cookie(reply: impl Reply, session_id: &str) -> impl Reply {
    warp::reply::with_header(
        reply,
        "set-cookie",
        format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Strict"),
    )
}

/// Timestamped activity lines shown on the Logs tab.
#[derive(Clone, Default)]
struct ActivityLog {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl ActivityLog {
    fn push(&self, message: &str) {
        let timestamp = Local::now().format("%H:%M:%S");
        let entry = format!("[{}] {}", timestamp, message);

        if let Ok(mut lines) = self.lines.lock() {
            lines.push_back(entry);
            if lines.len() > MAX_LOG_LINES {
                lines.pop_front();
            }
        }
        info!("{}", message);
    }

    fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Clone)]
struct AppState {
    connect: Arc<ResearchConnect>,
    sessions: Arc<Mutex<SessionStore>>,
    logs: ActivityLog,
}

impl AppState {
    fn new(connect: ResearchConnect) -> Self {
        Self {
            connect: Arc::new(connect),
            sessions: Arc::new(Mutex::new(SessionStore::default())),
            logs: ActivityLog::default(),
        }
    }

    fn session(&self, session_id: &str) -> SessionView {
        self.sessions
            .lock()
            .map(|s| s.get(session_id))
            .unwrap_or_default()
    }

    fn update_session(&self, session_id: &str, update: impl FnOnce(&mut SessionView)) {
        if let Ok(mut sessions) = self.sessions.lock() {
            update(sessions.entry(session_id));
        }
    }

    async fn find(&self, session_id: &str, request: FindRequest) -> StatusMessage {
        self.logs.push(&format!("Looking up researchers for: {}", request.topic.trim()));

        match self.connect.find_researchers(&request.topic, request.top_k).await {
            Ok(lookup) => {
                self.logs.push(&format!("Lookup finished for: {}", lookup.topic));
                let subject = report_subject(lookup.top_k, &lookup.topic);
                let body = self.connect.mail.report_body(&lookup.topic, &lookup.report);
                self.update_session(session_id, |session| {
                    session.subject = Some(subject);
                    session.body = Some(body);
                    session.report = Some(lookup.report.clone());
                    session.topic = Some(lookup.topic.clone());
                });
                StatusMessage {
                    report: Some(lookup.report),
                    topic: Some(lookup.topic),
                    ..StatusMessage::ok("Fetched top researchers successfully!")
                }
            }
            Err(e) => {
                self.logs.push(&format!("Error fetching researchers: {}", e));
                StatusMessage::error(format!("Error fetching researchers: {}", e))
            }
        }
    }

    async fn analyze(&self, session_id: &str, upload: Vec<u8>) -> StatusMessage {
        if upload.is_empty() {
            return StatusMessage::error("Please upload a PDF first.");
        }
        self.logs.push(&format!("Analyzing uploaded paper ({} bytes)", upload.len()));

        match self.connect.analyze_pdf_bytes(upload).await {
            Ok(outcome @ TopicOutcome::Found(_)) => {
                let topic = outcome.topic().map(str::to_string);
                self.update_session(session_id, |session| session.detected_topic = topic.clone());
                self.logs.push(&format!("Detected topic: {}", topic.as_deref().unwrap_or_default()));
                StatusMessage {
                    report: Some(outcome.render()),
                    topic,
                    ..StatusMessage::ok("Paper analyzed successfully!")
                }
            }
            Ok(outcome) => {
                self.logs.push(&outcome.render());
                StatusMessage::error(outcome.render())
            }
            Err(e) => {
                self.logs.push(&format!("Error analyzing paper: {}", e));
                StatusMessage::error(format!("Error analyzing paper: {}", e))
            }
        }
    }

    async fn send(&self, request: SendRequest) -> StatusMessage {
        let recipients = match parse_recipients(&request.recipients) {
            Ok(recipients) => recipients,
            Err(e) => return StatusMessage::error(e.to_string()),
        };
        self.logs.push(&format!("Sending report to {} recipient(s)", recipients.len()));

        let mail = MailRequest {
            subject: request.subject,
            body: request.body,
            recipients,
        };
        match self.connect.send_report(mail).await {
            Ok(report) => {
                self.logs.push(&report.message());
                StatusMessage::ok(report.message())
            }
            Err(e) => {
                self.logs.push(&format!("Error sending email: {}", e));
                StatusMessage::error(format!("Error sending email: {}", e))
            }
        }
    }
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn find_handler(request: FindRequest, session_id: String, state: AppState) -> Result<impl Reply, Rejection> {
    let reply = state.find(&session_id, request).await;
    Ok(with_session_cookie(warp::reply::json(&reply), &session_id))
}

async fn analyze_handler(upload: bytes::Bytes, session_id: String, state: AppState) -> Result<impl Reply, Rejection> {
    let reply = state.analyze(&session_id, upload.to_vec()).await;
    Ok(with_session_cookie(warp::reply::json(&reply), &session_id))
}

async fn send_handler(request: SendRequest, state: AppState) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&state.send(request).await))
}

fn rejection_reply(err: &Rejection) -> (StatusCode, String) {
    if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found.".to_string())
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request: {}", e))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "The uploaded file is larger than 25 MiB.".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.".to_string())
    } else {
        (StatusCode::BAD_REQUEST, "Could not process the request.".to_string())
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = rejection_reply(&err);
    warn!(%status, ?err, "Request rejected");
    Ok(warp::reply::with_status(
        warp::reply::json(&StatusMessage::error(message)),
        status,
    ))
}

fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let session = warp::cookie::optional::<String>(SESSION_COOKIE).map(session_id_or_new);

    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(index_html()));

    let find = warp::path("researchers")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(session.clone())
        .and(with_state(state.clone()))
        .and_then(find_handler);

    let analyze = warp::path("analyze")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_UPLOAD_BYTES))
        .and(warp::body::bytes())
        .and(session.clone())
        .and(with_state(state.clone()))
        .and_then(analyze_handler);

    let send = warp::path("send")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(send_handler);

    let session_view = warp::path("session")
        .and(warp::path::end())
        .and(warp::get())
        .and(session)
        .and(with_state(state.clone()))
        .map(|session_id: String, state: AppState| {
            with_session_cookie(warp::reply::json(&state.session(&session_id)), &session_id)
        });

    let logs = warp::path("logs")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .map(|state: AppState| warp::reply::json(&state.logs.lines()));

    index
        .or(find)
        .or(analyze)
        .or(send)
        .or(session_view)
        .or(logs)
        .recover(handle_rejection)
}

pub async fn start_web_server(connect: ResearchConnect, port: u16) {
    let routes = routes(AppState::new(connect));

    info!("Web interface running on http://localhost:{}", port);
    warp::serve(routes).run(([127, 0, 0, 1], port)).await;
}

fn index_html() -> &'static str {
    r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Research Connect</title>
    <style>
        body { font-family: Arial; margin: 20px; background: #f5f5f5; }
        h1 { color: #333; }

        .status-message { padding: 10px; margin: 10px 0; display: none; }
        .status-message.success { background: #d4edda; color: #155724; border: 1px solid #c3e6cb; }
        .status-message.error { background: #f8d7da; color: #721c24; border: 1px solid #f5c6cb; }

        input[type="text"], input[type="number"], textarea { padding: 8px; margin: 5px 0; width: 100%; box-sizing: border-box; }
        textarea { font-family: 'Courier New', monospace; }

        button { padding: 8px 16px; background: rgb(100, 149, 237); color: white; border: none; cursor: pointer; margin-right: 5px; }
        button:hover { background: #5a8dd4; }
        button:disabled { background: #aaa; cursor: wait; }

        .tabs { margin: 20px 0; border-bottom: 2px solid #ddd; }
        .tab { display: inline-block; padding: 10px 20px; cursor: pointer; background: #e9ecef; margin-right: 5px; }
        .tab.active { background: white; border: 1px solid #ddd; border-bottom: none; }
        .tab-content { display: none; }
        .tab-content.active { display: block; }

        .panel { background: white; padding: 20px; max-width: 900px; }
        .panel label { display: block; margin: 10px 0 5px 0; font-weight: bold; }
        .form-row { display: grid; grid-template-columns: 3fr 1fr; gap: 15px; }

        .output { margin-top: 15px; padding: 10px; background: #f9f9f9; border-left: 3px solid #007bff; white-space: pre-wrap; font-family: 'Courier New', monospace; font-size: 13px; }

        .log-container { background: #1e1e1e; color: #d4d4d4; padding: 15px; max-height: 500px; overflow-y: auto; font-family: 'Courier New', monospace; font-size: 13px; margin-top: 15px; }
        .log-entry { margin: 3px 0; }
    </style>
</head>
<body>
    <h1>Research Connect</h1>
    <p>Find top researchers on a topic, or detect the topic of a paper, and mail the results.</p>

    <div id="status-message" class="status-message"></div>

    <div class="tabs">
        <div class="tab active" onclick="showTab(event, 'find')">Find</div>
        <div class="tab" onclick="showTab(event, 'paper')">Paper</div>
        <div class="tab" onclick="showTab(event, 'send')">Send</div>
        <div class="tab" onclick="showTab(event, 'logs')">Logs</div>
    </div>

    <div id="find-tab" class="tab-content active">
        <div class="panel">
            <div class="form-row">
                <div>
                    <label>Research topic:</label>
                    <input type="text" id="topic" placeholder="e.g. Graph Neural Networks">
                </div>
                <div>
                    <label>Top K:</label>
                    <input type="number" id="top_k" value="3" min="0">
                </div>
            </div>
            <button id="find_button" onclick="findResearchers()">Find Top Researchers</button>
            <div id="find_output" class="output" style="display: none;"></div>
        </div>
    </div>

    <div id="paper-tab" class="tab-content">
        <div class="panel">
            <label>Upload a research paper (PDF):</label>
            <input type="file" id="paper" accept="application/pdf">
            <br><br>
            <button id="analyze_button" onclick="analyzePaper()">Detect Topic</button>
            <button id="use_topic_button" onclick="useDetectedTopic()" style="display: none;">Search This Topic</button>
            <div id="paper_output" class="output" style="display: none;"></div>
        </div>
    </div>

    <div id="send-tab" class="tab-content">
        <div class="panel">
            <label>Email subject:</label>
            <input type="text" id="subject" value="Top Researchers - Auto Update">
            <label>Receiver email IDs (comma-separated):</label>
            <textarea id="recipients" rows="2" placeholder="e.g. alice@gmail.com, bob@iitk.ac.in"></textarea>
            <label>Email body:</label>
            <textarea id="body" rows="16"></textarea>
            <button id="send_button" onclick="sendMail()">Send Email</button>
        </div>
    </div>

    <div id="logs-tab" class="tab-content">
        <button onclick="loadLogs()">Refresh Logs</button>
        <div class="log-container" id="log-container"></div>
    </div>

    <script>
        let detectedTopic = null;

        function showStatusMessage(message, isSuccess) {
            const element = document.getElementById('status-message');
            element.textContent = message;
            element.className = 'status-message ' + (isSuccess ? 'success' : 'error');
            element.style.display = 'block';
            setTimeout(() => { element.style.display = 'none'; }, 6000);
        }

        function showTab(e, tabId) {
            document.querySelectorAll('.tab').forEach(t => t.classList.remove('active'));
            document.querySelectorAll('.tab-content').forEach(c => c.classList.remove('active'));
            e.target.classList.add('active');
            document.getElementById(tabId + '-tab').classList.add('active');
            if (tabId === 'logs') {
                loadLogs();
            }
        }

        function busy(buttonId, isBusy) {
            document.getElementById(buttonId).disabled = isBusy;
        }

        function showOutput(id, text) {
            const output = document.getElementById(id);
            output.textContent = text;
            output.style.display = 'block';
        }

        function postJson(path, payload) {
            return fetch(path, {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify(payload)
            }).then(r => r.json());
        }

        function findResearchers() {
            const topic = document.getElementById('topic').value;
            if (!topic.trim()) {
                showStatusMessage('Please enter a topic before searching.', false);
                return;
            }
            const topK = parseInt(document.getElementById('top_k').value);
            busy('find_button', true);
            postJson('/researchers', { topic: topic, top_k: isNaN(topK) ? null : topK })
                .then(data => {
                    showStatusMessage(data.message, data.status === 'ok');
                    if (data.status === 'ok') {
                        showOutput('find_output', data.report);
                        loadSession();
                    }
                })
                .catch(err => showStatusMessage('Something went wrong: ' + err, false))
                .finally(() => busy('find_button', false));
        }

        function analyzePaper() {
            const file = document.getElementById('paper').files[0];
            if (!file) {
                showStatusMessage('Please upload a PDF first.', false);
                return;
            }
            busy('analyze_button', true);
            fetch('/analyze', {
                method: 'POST',
                headers: { 'Content-Type': 'application/pdf' },
                body: file
            })
            .then(r => r.json())
            .then(data => {
                showStatusMessage(data.message, data.status === 'ok');
                showOutput('paper_output', data.report || data.message);
                detectedTopic = data.topic || null;
                document.getElementById('use_topic_button').style.display = detectedTopic ? 'inline-block' : 'none';
            })
            .catch(err => showStatusMessage('Something went wrong: ' + err, false))
            .finally(() => busy('analyze_button', false));
        }

        function useDetectedTopic() {
            if (!detectedTopic) {
                return;
            }
            document.getElementById('topic').value = detectedTopic;
            document.querySelectorAll('.tab')[0].click();
            findResearchers();
        }

        function sendMail() {
            busy('send_button', true);
            postJson('/send', {
                subject: document.getElementById('subject').value,
                recipients: document.getElementById('recipients').value,
                body: document.getElementById('body').value
            })
            .then(data => showStatusMessage(data.message, data.status === 'ok'))
            .catch(err => showStatusMessage('Something went wrong: ' + err, false))
            .finally(() => busy('send_button', false));
        }

        function loadSession() {
            fetch('/session')
                .then(r => r.json())
                .then(session => {
                    if (session.subject) {
                        document.getElementById('subject').value = session.subject;
                    }
                    if (session.body) {
                        document.getElementById('body').value = session.body;
                    }
                    if (session.report) {
                        showOutput('find_output', session.report);
                    }
                    if (session.detected_topic) {
                        detectedTopic = session.detected_topic;
                        document.getElementById('use_topic_button').style.display = 'inline-block';
                        showOutput('paper_output', 'Detected topic: ' + detectedTopic);
                    }
                });
        }

        function loadLogs() {
            fetch('/logs')
                .then(r => r.json())
                .then(logs => {
                    const container = document.getElementById('log-container');
                    container.innerHTML = '';
                    if (logs.length === 0) {
                        container.innerHTML = '<div class="log-entry">No activity yet.</div>';
                        return;
                    }
                    logs.forEach(log => {
                        const div = document.createElement('div');
                        div.className = 'log-entry';
                        div.textContent = log;
                        container.appendChild(div);
                    });
                    container.scrollTop = container.scrollHeight;
                });
        }

        loadSession();
    </script>
</body>
</html>"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::tests::{connect_with, smith_records};
    use crate::connect::LookupSettings;
    use crate::fakes::{FakeCompletion, FakeMailer, FakeSearch};
    use crate::mail::MailSettings;
    use crate::search::SearchOutcome;

    const ALICE: &str = "alice-session";
    const BOB: &str = "bob-session";

    fn state() -> AppState {
        AppState::new(connect_with(
            Arc::new(FakeSearch::returning(SearchOutcome::Records(smith_records()))),
            Arc::new(FakeCompletion::replying(r#"{"topic": "Optics", "keywords": ["lasers"]}"#)),
            false,
        ))
    }

    fn find_request(topic: &str, top_k: Option<usize>) -> FindRequest {
        FindRequest {
            topic: topic.to_string(),
            top_k,
        }
    }

    fn json_body(response: &warp::http::Response<bytes::Bytes>) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn test_find_fills_session() {
        let state = state();
        let reply = state.find(ALICE, find_request("optics", Some(1))).await;
        assert_eq!(reply.status, "ok");
        assert!(reply.report.as_deref().unwrap().contains("| 1 | A Smith |"));

        let session = state.session(ALICE);
        assert_eq!(session.topic.as_deref(), Some("optics"));
        assert_eq!(session.subject.as_deref(), Some("Top 1 Researchers in optics"));
        assert!(session.body.as_deref().unwrap().contains("| 1 | A Smith |"));
        assert!(state.logs.lines().iter().any(|l| l.contains("Looking up researchers for: optics")));
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_results() {
        let state = state();
        state.find(ALICE, find_request("secret topic", None)).await;
        state.find(BOB, find_request("optics", None)).await;

        assert_eq!(state.session(ALICE).topic.as_deref(), Some("secret topic"));
        assert_eq!(state.session(BOB).topic.as_deref(), Some("optics"));
        assert_eq!(state.session("carol-session"), SessionView::default());
    }

    #[test]
    fn test_session_store_drops_oldest() {
        let mut store = SessionStore::default();
        for i in 0..=MAX_SESSIONS {
            store.entry(&format!("s{i}")).topic = Some(format!("t{i}"));
        }
        assert_eq!(store.views.len(), MAX_SESSIONS);
        assert_eq!(store.get("s0"), SessionView::default());
        assert_eq!(store.get(&format!("s{MAX_SESSIONS}")).topic, Some(format!("t{MAX_SESSIONS}")));
    }

    #[test]
    fn test_session_id_keeps_only_wellformed_cookies() {
        let id = Uuid::new_v4().to_string();
        assert_eq!(session_id_or_new(Some(id.clone())), id);
        let fresh = session_id_or_new(Some("../../etc".to_string()));
        assert!(Uuid::parse_str(&fresh).is_ok());
        assert_ne!(session_id_or_new(None), session_id_or_new(None));
    }

    #[tokio::test]
    async fn test_session_cookie_scopes_last_result() {
        let routes = routes(state());
        let response = warp::test::request()
            .method("POST")
            .path("/researchers")
            .json(&serde_json::json!({ "topic": "optics", "top_k": 1 }))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(&response)["status"], "ok");
        let cookie = response.headers()["set-cookie"]
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("rc_session="));

        let mine = warp::test::request()
            .path("/session")
            .header("cookie", cookie.as_str())
            .reply(&routes)
            .await;
        assert_eq!(json_body(&mine)["topic"], "optics");

        let stranger = warp::test::request().path("/session").reply(&routes).await;
        assert!(json_body(&stranger)["topic"].is_null());
        assert!(json_body(&stranger)["report"].is_null());
    }

    #[tokio::test]
    async fn test_malformed_body_replies_with_status_message() {
        let routes = routes(state());
        for body in ["{not json", r#"{"top_k": 3}"#] {
            let response = warp::test::request()
                .method("POST")
                .path("/researchers")
                .header("content-type", "application/json")
                .body(body)
                .reply(&routes)
                .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let reply = json_body(&response);
            assert_eq!(reply["status"], "error");
            assert!(reply["message"].as_str().unwrap().starts_with("Invalid request"));
        }

        let missing = warp::test::request().path("/nowhere").reply(&routes).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(&missing)["status"], "error");
    }

    #[tokio::test]
    async fn test_find_error_is_reported_not_raised() {
        let state = AppState::new(connect_with(
            Arc::new(FakeSearch::missing_key()),
            Arc::new(FakeCompletion::replying("")),
            false,
        ));
        let reply = state.find(ALICE, find_request("optics", None)).await;
        assert_eq!(reply.status, "error");
        assert_eq!(reply.message, "Error fetching researchers: SERPAPI_KEY is not configured");
        assert_eq!(state.session(ALICE), SessionView::default());
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_and_unreadable_uploads() {
        let state = state();
        assert_eq!(state.analyze(ALICE, Vec::new()).await, StatusMessage::error("Please upload a PDF first."));

        let reply = state.analyze(ALICE, b"plain text, not a pdf".to_vec()).await;
        assert_eq!(reply.status, "error");
        assert_eq!(reply.message, crate::paper::NO_READABLE_TEXT);
        assert_eq!(state.session(ALICE).detected_topic, None);
    }

    #[tokio::test]
    async fn test_send_reports_invalid_recipients() {
        let reply = state()
            .send(SendRequest {
                subject: "s".to_string(),
                recipients: "alice@gmail.com, bob".to_string(),
                body: "b".to_string(),
            })
            .await;
        assert_eq!(reply, StatusMessage::error("Invalid recipient address: bob"));
    }

    #[tokio::test]
    async fn test_send_success_message() {
        let state = AppState::new(ResearchConnect::new(
            Arc::new(FakeSearch::returning(SearchOutcome::NoResults)),
            Arc::new(FakeCompletion::replying("")),
            Arc::new(FakeMailer::default()),
            LookupSettings::default(),
            MailSettings::default(),
        ));
        let reply = state
            .send(SendRequest {
                subject: "Top 3 Researchers in optics".to_string(),
                recipients: "alice@gmail.com bob@iitk.ac.in".to_string(),
                body: "table".to_string(),
            })
            .await;
        assert_eq!(reply, StatusMessage::ok("Emails sent successfully to: alice@gmail.com, bob@iitk.ac.in"));
    }

    #[test]
    fn test_activity_log_is_bounded() {
        let log = ActivityLog::default();
        for i in 0..(MAX_LOG_LINES + 10) {
            log.push(&format!("line {i}"));
        }
        let lines = log.lines();
        assert_eq!(lines.len(), MAX_LOG_LINES);
        assert!(lines[0].ends_with("line 10"));
    }

    #[test]
    fn test_status_message_omits_empty_fields() {
        let json = serde_json::to_value(StatusMessage::ok("done")).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "ok", "message": "done" }));
    }
}
