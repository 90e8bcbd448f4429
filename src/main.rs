use clap::{ArgAction, Parser, ValueEnum};
use h2trickle::h2::ChunkingPolicy;
use h2trickle::utils::DEFAULT_PUSH_PATH;
use h2trickle::{Session, SessionConfig, SessionTimeouts, DEFAULT_PORT, DEFAULT_STREAM_ID};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "h2trickle",
    version,
    about = "Streams one POST over a hand-driven HTTP/2 connection and reports every frame the server sends back"
)]
struct Cli {
    /// Server address
    #[arg(long)]
    host: String,

    /// Bearer token
    #[arg(long)]
    token: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = DEFAULT_PUSH_PATH)]
    path: String,

    /// How the body is cut into DATA frames
    #[arg(long, value_enum, default_value_t = Chunking::Whole)]
    chunking: Chunking,

    /// Delay between DATA frames for byte/line chunking
    #[arg(long, default_value_t = 1)]
    pacing_ms: u64,

    /// Set END_STREAM on the last DATA frame
    #[arg(long, action = ArgAction::SetTrue)]
    end_stream: bool,

    #[arg(long, default_value_t = DEFAULT_STREAM_ID)]
    stream_id: u32,

    /// Request body; defaults to a sample line-protocol point
    #[arg(long)]
    body: Option<String>,

    #[arg(long)]
    content_type: Option<String>,

    /// Skip server certificate verification
    #[arg(long, action = ArgAction::SetTrue)]
    insecure: bool,

    /// Seconds, 0 disables
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Seconds, 0 disables
    #[arg(long, default_value_t = 10)]
    handshake_timeout: u64,

    /// Seconds, 0 disables
    #[arg(long, default_value_t = 60)]
    session_timeout: u64,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbosity: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Chunking {
    Whole,
    Byte,
    Line,
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

impl Cli {
    fn into_config(self) -> SessionConfig {
        let pacing = Duration::from_millis(self.pacing_ms);
        let chunking = match self.chunking {
            Chunking::Whole => ChunkingPolicy::Whole,
            Chunking::Byte => ChunkingPolicy::PerByte { pacing },
            Chunking::Line => ChunkingPolicy::PerLine { pacing },
        };

        let mut config = SessionConfig::new(self.host, self.token)
            .port(self.port)
            .path(self.path)
            .stream_id(self.stream_id)
            .chunking(chunking)
            .end_stream(self.end_stream)
            .insecure(self.insecure)
            .timeouts(SessionTimeouts {
                connect: seconds(self.connect_timeout),
                handshake: seconds(self.handshake_timeout),
                session: seconds(self.session_timeout),
            });

        if let Some(body) = self.body {
            config = config.body(body);
        }
        if let Some(content_type) = self.content_type {
            config = config.content_type(content_type);
        }
        config
    }
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbosity);

    let config = cli.into_config();
    let report_stream_id = config.stream_id;
    let session = Session::new(config);
    match session.run().await {
        Ok(report) => {
            info!(
                events = report.events.len(),
                response_bytes = report.response_body(report_stream_id).len(),
                "{}",
                report.termination
            );
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
