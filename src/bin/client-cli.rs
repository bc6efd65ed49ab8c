use std::{
    io::{self, Write},
    time::Duration,
};

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use turn_clock::{
    ClientRequest, ServerMessage,
    clock::format_elapsed,
    config::{SessionArgs, SessionConfig},
    coordinator::{Coordinator, EndReason, SelectOutcome},
    display::{self, DisplayEvent},
    logic::{Side, Square},
    machine::Phase,
    move_log::LogEntry,
};

#[derive(Parser, Debug)]
#[command(about = "Terminal front end for turn-clock sessions")]
struct Args {
    /// Server to connect to.
    #[arg(long, default_value = "ws://localhost:3000/game")]
    url: String,

    /// Player name sent to the server. Prompted for when missing.
    #[arg(long)]
    name: Option<String>,

    /// Run the session in-process instead of connecting to a server.
    #[arg(long)]
    offline: bool,

    #[command(flatten)]
    session: SessionArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they don't trample the board prompt.
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let args = Args::parse();

    println!("♟️  Turn Clock");
    println!("=============");

    if args.offline {
        play_offline(SessionConfig::from(&args.session)).await
    } else {
        let name = match args.name {
            Some(name) => name,
            None => prompt_for_input("Enter your username: ")?,
        };
        play_online(&args.url, name).await
    }
}

enum Command {
    Select(Square),
    Resign,
}

fn parse_command(input: &str) -> Option<Command> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("resign") {
        return Some(Command::Resign);
    }
    match input.parse() {
        Ok(square) => Some(Command::Select(square)),
        Err(e) => {
            println!("  Invalid input: {e}. Type a square like E2, or `resign`.");
            None
        }
    }
}

/// Terminal rendering of the display stream.
struct View {
    clocks: [String; 2],
    status_open: bool,
}

impl View {
    fn new() -> Self {
        Self {
            clocks: [format_elapsed(Duration::ZERO), format_elapsed(Duration::ZERO)],
            status_open: false,
        }
    }

    fn line(&mut self, text: impl AsRef<str>) {
        if self.status_open {
            println!();
            self.status_open = false;
        }
        println!("{}", text.as_ref());
    }

    fn apply(&mut self, event: &DisplayEvent) {
        match event {
            DisplayEvent::ClockTick { side, elapsed } => self.clocks[side.index()] = elapsed.clone(),
            DisplayEvent::ClockHighlight { .. } => {}
            DisplayEvent::Status { text } => {
                // Overwrite the status line in place, like a window title.
                print!("\r\x1b[2K  {text}");
                let _ = io::stdout().flush();
                self.status_open = true;
            }
            DisplayEvent::MoveLogged { side, notation } => {
                let who = match side {
                    Side::Local => "🟢 You     ",
                    Side::Remote => "🔵 Opponent",
                };
                self.line(format!("{who} {notation}"));
            }
            DisplayEvent::PhaseChanged { phase } => {
                let clocks = format!(
                    "[you {} | opponent {}]",
                    self.clocks[Side::Local.index()],
                    self.clocks[Side::Remote.index()]
                );
                match phase {
                    Phase::AwaitingOrigin => self.line(format!("💭 Your turn! Pick a piece {clocks}")),
                    Phase::AwaitingDestination => self.line("🎯 Now pick where it goes"),
                    Phase::OpponentTurn => self.line(format!("⏳ Opponent's turn {clocks}")),
                }
            }
            DisplayEvent::SessionEnded { reason } => self.line(format!("🏁 {}", describe(reason))),
        }
    }
}

fn describe(reason: &EndReason) -> String {
    match reason {
        EndReason::Checkmate { winner: Side::Local } => "Checkmate, you win!".into(),
        EndReason::Checkmate { winner: Side::Remote } => "Checkmate, you lose.".into(),
        EndReason::Resigned { side: Side::Local } => "You resigned.".into(),
        EndReason::Resigned { side: Side::Remote } => "Opponent resigned.".into(),
        EndReason::Abandoned => "Game abandoned.".into(),
        EndReason::InputClosed => "Input closed.".into(),
    }
}

fn print_log(log: &[LogEntry]) {
    println!("\n  Moves:");
    for (i, entry) in log.iter().enumerate() {
        println!("  {:>3}. {:<8} {}", i + 1, entry.side.to_string(), entry.notation);
    }
}

async fn play_online(url: &str, player_name: String) -> anyhow::Result<()> {
    println!("📡 Connecting to {url}...");
    let (ws_stream, _) = connect_async(url).await?;
    println!("✅ Connected!");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let setup_json = serde_json::to_string(&ClientRequest::InitialSetup {
        player_name: player_name.clone(),
    })?;
    ws_sender.send(Message::Text(setup_json.into())).await?;
    println!("📨 Sent setup with username: {player_name}");

    let mut view = View::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            message = ws_receiver.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        view.line("❌ Server closed connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };
                match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(ServerMessage::InitialSetup { first_mover, opponent_name }) => {
                        let who = match first_mover {
                            Side::Local => "You move".to_string(),
                            Side::Remote => format!("{opponent_name} moves"),
                        };
                        view.line(format!("🎲 {who} first"));
                    }
                    Ok(ServerMessage::Display(event)) => view.apply(&event),
                    Ok(ServerMessage::Rejected { reason }) => view.line(format!("⚠️  {reason}")),
                    Ok(ServerMessage::GameOver { log, .. }) => {
                        print_log(&log);
                        break;
                    }
                    Err(e) => view.line(format!("❌ Unexpected message from server: {e}")),
                }
            }
            line = lines.next_line(), if stdin_open => {
                let request = match line? {
                    Some(line) => match parse_command(&line) {
                        Some(Command::Select(square)) => ClientRequest::SelectSquare(square),
                        Some(Command::Resign) => ClientRequest::Resign,
                        None => continue,
                    },
                    None => {
                        stdin_open = false;
                        ClientRequest::Resign
                    }
                };
                ws_sender
                    .send(Message::Text(serde_json::to_string(&request)?.into()))
                    .await?;
            }
        }
    }

    println!("Thanks for playing.");
    Ok(())
}

async fn play_offline(config: SessionConfig) -> anyhow::Result<()> {
    let (display, mut display_rx) = display::channel();
    let (coordinator, handle) = Coordinator::from_config(&config, display)?;
    let mut view = View::new();
    match coordinator.first_mover() {
        Side::Local => view.line("🎲 You move first"),
        Side::Remote => view.line("🎲 Opponent moves first"),
    }

    let mut session = tokio::spawn(coordinator.run());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let report = loop {
        tokio::select! {
            result = &mut session => break result??,
            Some(event) = display_rx.recv() => view.apply(&event),
            line = lines.next_line(), if stdin_open => {
                let command = match line? {
                    Some(line) => parse_command(&line),
                    None => {
                        stdin_open = false;
                        Some(Command::Resign)
                    }
                };
                match command {
                    Some(Command::Select(square)) => match handle.select_square(square) {
                        Ok(SelectOutcome::Ignored) => view.line(format!("⚠️  {square}: not your turn")),
                        Ok(_) => {}
                        Err(e) => view.line(format!("⚠️  {square}: {e}")),
                    },
                    Some(Command::Resign) => handle.end(EndReason::Resigned { side: Side::Local }),
                    None => {}
                }
            }
        }
    };

    while let Ok(event) = display_rx.try_recv() {
        view.apply(&event);
    }
    print_log(&report.log);
    println!(
        "  Time used: you {}, opponent {}",
        format_elapsed(report.elapsed(Side::Local)),
        format_elapsed(report.elapsed(Side::Remote))
    );
    Ok(())
}

fn prompt_for_input(prompt: &str) -> io::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
