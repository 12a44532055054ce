use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use streamrpc::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailParams {
    file: String,
    lines: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    n: usize,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    lines: usize,
}

fn line(file: &str, n: usize) -> Line {
    Line { n, text: format!("{file}: line {n}") }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Answers `ping`, streams `tail` to completion, and streams `follow`
/// until the client aborts it.
async fn serve(mut peer: Peer<MemoryConnection>) -> Result<(), StreamRpcError> {
    loop {
        let msg = match peer.recv::<Value>().await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(err @ StreamRpcError::Protocol(_)) => {
                tracing::warn!(error = %err, "bad envelope");
                peer.report(&err, Id::Null).await?;
                continue;
            }
            Err(err) => return Err(err),
        };

        match msg {
            Message::Request(req) => {
                let id = req.id().cloned().unwrap_or(Id::Null);
                if req.method() == "ping" {
                    peer.send(builders::response(json!("pong"), id)).await?;
                } else {
                    let err = ErrorContext::not_found()
                        .with_message(format!("no method `{}`", req.method()));
                    peer.send(builders::error_response(err, id)).await?;
                }
            }
            Message::StreamRequest(req) if req.is_abort() => {
                let stream_id = req.stream_id();
                let live = peer
                    .stream_state(&stream_id)
                    .is_some_and(|s| !s.is_terminal());
                if live {
                    peer.send(builders::stream_abort(stream_id)).await?;
                }
            }
            Message::StreamRequest(req) => {
                let stream_id = req.stream_id();
                let method = req.method().to_owned();
                let params = req
                    .into_params()
                    .map(serde_json::from_value::<TailParams>)
                    .transpose();

                let params = match params {
                    Ok(Some(params)) => params,
                    Ok(None) | Err(_) => {
                        let err = ErrorContext::invalid_request()
                            .with_code(ErrorCode::RpcInvalidParams)
                            .with_title(ErrorCode::RpcInvalidParams.title())
                            .with_message("expected { file, lines }");
                        peer.send(builders::stream_error(err, stream_id)).await?;
                        continue;
                    }
                };

                for n in 1..=params.lines {
                    let frame = builders::stream_data(line(&params.file, n), stream_id.clone());
                    peer.send(frame).await?;
                }
                if method == "tail" {
                    let done = builders::stream_done(
                        Summary { lines: params.lines },
                        stream_id,
                    );
                    peer.send(done).await?;
                }
            }
            other => {
                tracing::debug!(kind = %other.kind(), "ignoring envelope");
            }
        }
    }

    tracing::info!(stats = ?peer.stats(), "service finished");
    Ok(())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// What the client saw, for printing and for tests.
#[derive(Debug, Default, PartialEq)]
pub struct Report {
    pong: Option<Value>,
    tailed: Vec<Line>,
    summary: Option<Summary>,
    followed: usize,
    aborted: bool,
}

async fn next(peer: &mut Peer<MemoryConnection>) -> Result<Message, StreamRpcError> {
    peer.recv().await?.ok_or_else(|| {
        TransportError::ConnectionClosed("service went away".into()).into()
    })
}

async fn run_client(mut peer: Peer<MemoryConnection>) -> Result<Report, StreamRpcError> {
    let mut report = Report::default();

    peer.send(builders::request("ping", Value::Null, 1)).await?;
    if let Message::Success(resp) = next(&mut peer).await? {
        report.pong = Some(resp.into_result());
    }

    let params = json!({ "file": "app.log", "lines": 3 });
    peer.send(builders::stream_request("tail", params, "tail-1")).await?;
    loop {
        match next(&mut peer).await? {
            Message::StreamData(frame) => {
                if let Some(data) = frame.into_data() {
                    report.tailed.push(decode(data)?);
                }
            }
            Message::StreamDone(done) => {
                report.summary = Some(decode(done.into_result())?);
                break;
            }
            other => tracing::warn!(kind = %other.kind(), "unexpected envelope"),
        }
    }

    let params = json!({ "file": "app.log", "lines": 2 });
    peer.send(builders::stream_request("follow", params, "follow-1")).await?;
    loop {
        match next(&mut peer).await? {
            Message::StreamData(_) => {
                report.followed += 1;
                if report.followed == 2 {
                    peer.send(builders::abort_request("follow", "follow-1")).await?;
                }
            }
            Message::StreamAbort(abort) => {
                tracing::info!(stream_id = %abort.stream_id(), "follow aborted");
                report.aborted = true;
                break;
            }
            other => tracing::warn!(kind = %other.kind(), "unexpected envelope"),
        }
    }

    tracing::info!(stats = ?peer.stats(), "client finished");
    peer.close().await?;
    Ok(report)
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, StreamRpcError> {
    serde_json::from_value(value)
        .map_err(|e| StreamRpcError::Protocol(ProtocolError::Decode(e)))
}

async fn run() -> Result<Report, StreamRpcError> {
    let (client, service) = MemoryConnection::pair();
    let service = tokio::spawn(serve(Peer::new(service)));

    let report = run_client(Peer::new(client)).await?;

    match service.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "service task failed"),
    }
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let report = run().await?;
    for l in &report.tailed {
        println!("{}", l.text);
    }
    println!(
        "tail done: {:?}, follow aborted after {} lines",
        report.summary, report.followed
    );
    Ok(())
}
