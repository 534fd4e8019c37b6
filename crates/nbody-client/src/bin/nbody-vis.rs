//! N-Body Visualization Client
//!
//! Connects to a simulation server and drives a session from stdin.
//!
//! Usage:
//!   nbody-vis [--url <ws-url>] [--bodies <n>] [--gravity <g>] [--zoom <0-100>] [--close-on-stop]
//!
//! Commands (one per line):
//!   bodies <n>         Edit the body count field
//!   gravity <g>        Edit the gravity field
//!   start [<n> <g>]    Start a run with the given or edited values
//!   update [<n> <g>]   Change parameters of the running simulation
//!   stop               Stop the run
//!   zoom <0-100>       Move the zoom slider
//!   quit               Disconnect and exit

use std::env;
use std::sync::Arc;

use nbody_client::{
    ClientConfig, Frame, Intent, ParameterForm, SessionController, WsConnector, ZoomSetting,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log one frame summary out of this many.
const FRAME_LOG_INTERVAL: u64 = 60;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nbody_vis=info,nbody_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut config = ClientConfig::from_env()?;
    let mut form = ParameterForm::default();
    apply_args(&args, &mut config, &mut form)?;
    config.validate()?;

    println!("N-Body Visualization Client");
    println!("===========================");
    println!("Server: {}", config.server_url);
    println!("Type `start`, `update <n> <g>`, `stop`, `zoom <0-100>` or `quit`.");
    println!();

    let mut session = SessionController::with_connector(&config, Arc::new(WsConnector::new()));

    let connection = session.connection_mut();
    connection.on_open(|| tracing::info!("ready to start"));
    connection.on_error(|e| tracing::warn!("transport error: {}", e));
    connection.on_close(|reason| {
        tracing::warn!("disconnected ({}); restart to reconnect", reason.unwrap_or("no reason"))
    });

    let mut rendered = 0u64;
    session.set_scene_sink(move |frame| {
        rendered += 1;
        if frame.is_empty() || rendered % FRAME_LOG_INTERVAL == 1 {
            tracing::info!("frame {}: {}", rendered, summarize(frame));
        }
    });

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(read_intents(form, tx));

    let stats = session.run(rx).await;

    println!();
    println!("Session complete:");
    println!("  Commands sent: {}", stats.commands_sent);
    println!("  Send failures: {}", stats.send_failures);
    println!("  Snapshots applied: {}", stats.snapshots_applied);
    println!("  Stale snapshots dropped: {}", stats.snapshots_stale);
    println!("  Decode errors: {}", stats.decode_errors);
    println!("  Frames rendered: {}", stats.frames_rendered);

    Ok(())
}

fn apply_args(
    args: &[String],
    config: &mut ClientConfig,
    form: &mut ParameterForm,
) -> Result<(), String> {
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("missing value for {}", flag))
        };
        match flag.as_str() {
            "--url" => config.server_url = value()?,
            "--bodies" => form.set_num_bodies(value()?),
            "--gravity" => form.set_gravity(value()?),
            "--zoom" => {
                let raw = value()?;
                config.session.initial_zoom = raw
                    .parse()
                    .map_err(|_| format!("invalid zoom: {}", raw))?;
            }
            "--close-on-stop" => config.session.close_on_stop = true,
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(())
}

/// Read stdin line by line until `quit` or end of input.
async fn read_intents(mut form: ParameterForm, tx: mpsc::Sender<Intent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("failed to read stdin: {}", e);
                break;
            }
        };
        match parse_line(&line, &mut form) {
            Ok(Some(intent)) => {
                if let Intent::Zoom(slider) = intent {
                    println!("{}", zoom_status(slider));
                }
                let quit = intent == Intent::Teardown;
                if tx.send(intent).await.is_err() || quit {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("{}", e),
        }
    }
    let _ = tx.send(Intent::Teardown).await;
}

/// Turn one input line into an intent. Field edits only touch the form.
fn parse_line(line: &str, form: &mut ParameterForm) -> Result<Option<Intent>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((command, rest)) = words.split_first() else {
        return Ok(None);
    };

    match (*command, rest) {
        ("bodies", [n]) => {
            form.set_num_bodies(*n);
            Ok(None)
        }
        ("gravity", [g]) => {
            form.set_gravity(*g);
            Ok(None)
        }
        ("start", fields) | ("update", fields) => {
            match fields {
                [] => {}
                [n, g] => {
                    form.set_num_bodies(*n);
                    form.set_gravity(*g);
                }
                _ => return Err(format!("usage: {} [<bodies> <gravity>]", command)),
            }
            let raw = form.raw();
            Ok(Some(if *command == "start" {
                Intent::Start(raw)
            } else {
                Intent::Update(raw)
            }))
        }
        ("stop", []) => Ok(Some(Intent::Stop)),
        ("zoom", [s]) => s
            .parse()
            .map(|slider| Some(Intent::Zoom(slider)))
            .map_err(|_| format!("invalid zoom: {}", s)),
        ("quit", []) | ("exit", []) => Ok(Some(Intent::Teardown)),
        _ => Err(format!("unknown command: {}", line.trim())),
    }
}

fn zoom_status(slider: u8) -> String {
    let zoom = ZoomSetting::new(slider);
    format!("zoom {} (slider {})", zoom.label(), zoom.slider())
}

fn summarize(frame: &Frame) -> String {
    if frame.is_empty() {
        return "empty".to_string();
    }
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for d in &frame.drawables {
        min_x = min_x.min(d.scene_x);
        max_x = max_x.max(d.scene_x);
        min_y = min_y.min(d.scene_y);
        max_y = max_y.max(d.scene_y);
    }
    format!(
        "{} bodies in [{:.2}, {:.2}] x [{:.2}, {:.2}], camera z {:.1}",
        frame.drawables.len(),
        min_x,
        max_x,
        min_y,
        max_y,
        frame.camera.position[2]
    )
}
