use std::net::SocketAddr;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::Response,
    routing::get,
};
use clap::Parser;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use turn_clock::{
    ClientRequest, ServerMessage,
    config::{SessionArgs, SessionConfig},
    coordinator::{Coordinator, EndReason, SelectOutcome, SessionReport},
    display::{self, DisplayEvent},
    error::CoordinatorError,
    logic::Side,
    move_log::LogEntry,
};

#[derive(Parser, Debug)]
#[command(about = "Hosts one turn-clock session per WebSocket connection")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    #[command(flatten)]
    session: SessionArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = SessionConfig::from(&args.session);
    config.validate()?;

    let app = Router::new()
        .route("/game", get(websocket_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(config);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!("Server running on http://{}", args.bind);
    info!("WebSocket endpoint: ws://{}/game", args.bind);

    axum::serve(listener, app).await?;

    Ok(())
}

// Every connection gets its own session; the connection is the session's input layer and renderer.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(config): State<SessionConfig>,
) -> Result<Response, StatusCode> {
    Ok(ws.on_upgrade(move |socket| async move {
        info!("New WebSocket connection established");
        if let Err(e) = serve_connection(socket, config).await {
            error!("Session connection failed: {}", e);
        }
    }))
}

/// Awaits the setup packet and returns the player's name.
async fn await_setup(connection: &mut WebSocket) -> anyhow::Result<String> {
    match connection.recv().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str(&text)? {
            ClientRequest::InitialSetup { player_name } => Ok(player_name),
            _ => Err(anyhow::anyhow!(
                "Expected InitialSetup message, got different message"
            )),
        },
        Some(Ok(_)) => Err(anyhow::anyhow!(
            "Expected text message for setup, got different message"
        )),
        Some(Err(e)) => Err(anyhow::anyhow!("WebSocket error during setup: {}", e)),
        None => Err(anyhow::anyhow!("Connection closed during setup")),
    }
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> anyhow::Result<()> {
    sink.send(Message::text(serde_json::to_string(message)?))
        .await?;
    Ok(())
}

/// Sends a display event on and keeps a copy of every logged move.
async fn forward(
    sink: &mut SplitSink<WebSocket, Message>,
    event: DisplayEvent,
    forwarded: &mut Vec<LogEntry>,
) -> anyhow::Result<()> {
    if let DisplayEvent::MoveLogged { side, notation } = &event {
        forwarded.push(LogEntry {
            side: *side,
            notation: notation.clone(),
        });
    }
    send(sink, &ServerMessage::Display(event)).await
}

/// Closing message for a session. A failed session reports the moves the client already saw.
fn game_over(
    outcome: &Result<SessionReport, CoordinatorError>,
    forwarded: Vec<LogEntry>,
) -> ServerMessage {
    match outcome {
        Ok(report) => ServerMessage::GameOver {
            reason: report.reason.clone(),
            log: report.log.clone(),
        },
        Err(_) => ServerMessage::GameOver {
            reason: EndReason::Abandoned,
            log: forwarded,
        },
    }
}

async fn serve_connection(mut connection: WebSocket, config: SessionConfig) -> anyhow::Result<()> {
    let player_name = await_setup(&mut connection).await?;

    let (display, mut display_rx) = display::channel();
    let (coordinator, handle) = Coordinator::from_config(&config, display)?;
    let first_mover = coordinator.first_mover();
    info!("Starting session for {} ({} moves first)", player_name, first_mover);

    let (mut sink, mut stream) = connection.split();
    send(
        &mut sink,
        &ServerMessage::InitialSetup {
            first_mover,
            opponent_name: "Opponent".to_string(),
        },
    )
    .await?;

    let mut session = tokio::spawn(coordinator.run());
    let mut input_open = true;
    let mut forwarded = Vec::new();

    let outcome = loop {
        tokio::select! {
            result = &mut session => break result?,
            Some(event) = display_rx.recv(), if input_open => {
                forward(&mut sink, event, &mut forwarded).await?;
            }
            request = stream.next(), if input_open => {
                let request = match request {
                    Some(Ok(Message::Text(text))) => serde_json::from_str::<ClientRequest>(&text),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("{} disconnected", player_name);
                        input_open = false;
                        handle.end(EndReason::Abandoned);
                        continue;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", player_name, e);
                        input_open = false;
                        handle.end(EndReason::Abandoned);
                        continue;
                    }
                };
                match request {
                    Ok(ClientRequest::SelectSquare(square)) => match handle.select_square(square) {
                        Ok(SelectOutcome::Ignored) => {
                            send(&mut sink, &ServerMessage::Rejected {
                                reason: format!("{square}: not your turn"),
                            })
                            .await?;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            send(&mut sink, &ServerMessage::Rejected {
                                reason: format!("{square}: {e}"),
                            })
                            .await?;
                        }
                    },
                    Ok(ClientRequest::Resign) => handle.end(EndReason::Resigned { side: Side::Local }),
                    Ok(ClientRequest::InitialSetup { .. }) => {
                        warn!("Unexpected second setup from {}", player_name);
                    }
                    Err(e) => warn!("Malformed request from {}: {}", player_name, e),
                }
            }
        }
    };

    if !input_open {
        return Ok(());
    }
    // Flush whatever the session emitted on its way out.
    while let Ok(event) = display_rx.try_recv() {
        forward(&mut sink, event, &mut forwarded).await?;
    }

    send(&mut sink, &game_over(&outcome, forwarded)).await?;
    outcome?;
    Ok(())
}
