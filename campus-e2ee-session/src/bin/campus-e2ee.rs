//! campus-e2ee CLI: operate a file-backed E2EE session from the shell
//!
//! Usage:
//!   campus-e2ee --user <id> init
//!   campus-e2ee --user <id> pubkey
//!   campus-e2ee --user <id> trust <peer> <public-key>
//!   campus-e2ee --user <id> send <peer> [message]
//!   campus-e2ee --user <id> recv <peer> [payload]
//!   campus-e2ee inspect [payload]
//!   campus-e2ee --user <id> clear

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use campus_e2ee::wire;
use campus_e2ee_session::{
    FileKeyDirectory, FileKeyStore, InitOutcome, KeyExchange, PeerId, SessionConfig, SessionManager,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

struct Options {
    data_dir: PathBuf,
    directory: Option<PathBuf>,
    user: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let log_format = std::env::var("CAMPUS_E2EE_LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campus_e2ee_session=warn".into());
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (options, rest) = match parse_options(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("error: {}", e);
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let Some(command) = rest.first() else {
        print_usage();
        return ExitCode::from(1);
    };

    let result = match command.as_str() {
        "init" => cmd_init(&options).await,
        "pubkey" => cmd_pubkey(&options).await,
        "trust" => cmd_trust(&options, &rest[1..]).await,
        "send" => cmd_send(&options, &rest[1..]).await,
        "recv" => cmd_recv(&options, &rest[1..]).await,
        "inspect" => cmd_inspect(&rest[1..]),
        "clear" => cmd_clear(&options).await,
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" => {
            println!("campus-e2ee {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        cmd => {
            eprintln!("error: unknown command '{}'", cmd);
            print_usage();
            Err("unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!(
        r#"campus-e2ee: end-to-end encrypted chat session tooling

USAGE:
    campus-e2ee [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    init                      Restore or create this user's identity and publish it
    pubkey                    Print this user's public key
    trust <peer> <key>        Exchange keys with a peer
    send <peer> [message]     Encrypt a message (reads stdin if omitted)
    recv <peer> [payload]     Decrypt a payload (reads stdin if omitted)
    inspect [payload]         Show envelope sizes without decrypting
    clear                     Delete this user's identity and peer keys

OPTIONS:
    --user <id>               Local user id (or CAMPUS_E2EE_USER)
    --data-dir <dir>          Per-user key store root [default: ./campus-e2ee-data]
    --directory <dir>         Shared public-key directory [default: <data-dir>/directory]
    -h, --help                Print help
    -V, --version             Print version

ENVIRONMENT:
    CAMPUS_E2EE_PASSWORD      Password protecting the stored private key
    CAMPUS_E2EE_FALLBACK      open | closed
    CAMPUS_E2EE_RECOVERY      regenerate | strict
    CAMPUS_E2EE_PEER_KEY_CHANGE  accept | reject
    CAMPUS_E2EE_LOG_FORMAT    pretty | json
"#
    );
}

fn parse_options(args: &[String]) -> Result<(Options, Vec<String>), Box<dyn std::error::Error>> {
    let mut options = Options {
        data_dir: PathBuf::from("./campus-e2ee-data"),
        directory: None,
        user: std::env::var("CAMPUS_E2EE_USER").ok(),
    };
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" | "-d" => {
                i += 1;
                options.data_dir = PathBuf::from(args.get(i).ok_or("missing data dir")?);
            }
            "--directory" => {
                i += 1;
                options.directory = Some(PathBuf::from(args.get(i).ok_or("missing directory path")?));
            }
            "--user" | "-u" => {
                i += 1;
                options.user = Some(args.get(i).ok_or("missing user id")?.clone());
            }
            other => rest.push(other.to_string()),
        }
        i += 1;
    }

    Ok((options, rest))
}

fn read_arg_or_stdin(args: &[String], index: usize) -> Result<String, Box<dyn std::error::Error>> {
    match args.get(index) {
        Some(value) => Ok(value.clone()),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}

fn user(options: &Options) -> Result<&str, Box<dyn std::error::Error>> {
    options
        .user
        .as_deref()
        .ok_or_else(|| "no user: pass --user or set CAMPUS_E2EE_USER".into())
}

fn open_session(options: &Options) -> Result<SessionManager, Box<dyn std::error::Error>> {
    let user = user(options)?;
    let store = FileKeyStore::new(options.data_dir.join(user))?;
    let directory_path = options
        .directory
        .clone()
        .unwrap_or_else(|| options.data_dir.join("directory"));
    let directory = FileKeyDirectory::new(directory_path)?;
    let config = SessionConfig::from_env()?;

    Ok(SessionManager::new(user, Arc::new(store), Arc::new(directory)).with_config(config))
}

async fn ready_session(options: &Options) -> Result<(SessionManager, InitOutcome), Box<dyn std::error::Error>> {
    let password = std::env::var("CAMPUS_E2EE_PASSWORD")
        .map_err(|_| "CAMPUS_E2EE_PASSWORD is not set")?;
    let session = open_session(options)?;
    let outcome = session.initialize(&password).await?;
    Ok((session, outcome))
}

async fn cmd_init(options: &Options) -> CliResult {
    let (session, outcome) = ready_session(options).await?;

    let status = match outcome {
        InitOutcome::Restored => "restored",
        InitOutcome::Generated => "generated",
        InitOutcome::Regenerated => "regenerated (previous identity could not be unlocked)",
        InitOutcome::AlreadyReady => "ready",
    };
    eprintln!("Identity {}", status);
    eprintln!("  User:        {}", session.user());
    eprintln!("  Fingerprint: {}", session.fingerprint().unwrap_or_default());
    if !session.is_persistent() {
        eprintln!("  Warning:     key store unavailable; identity will not survive this run");
    }
    println!("{}", session.get_public_key()?);
    Ok(())
}

async fn cmd_pubkey(options: &Options) -> CliResult {
    let (session, _) = ready_session(options).await?;
    println!("{}", session.get_public_key()?);
    Ok(())
}

async fn cmd_trust(options: &Options, args: &[String]) -> CliResult {
    let peer = PeerId::new(args.first().ok_or("missing peer id")?.as_str());
    let key = read_arg_or_stdin(args, 1)?;
    let (session, _) = ready_session(options).await?;

    match session.exchange_keys(&peer, &key).await? {
        KeyExchange::Established => eprintln!("Established shared key with {}", peer),
        KeyExchange::Unchanged => eprintln!("Key for {} unchanged", peer),
        KeyExchange::Rekeyed {
            previous_fingerprint,
            current_fingerprint,
        } => {
            eprintln!("WARNING: public key for {} changed", peer);
            eprintln!("  Previous: {}", previous_fingerprint);
            eprintln!("  Current:  {}", current_fingerprint);
        }
    }
    Ok(())
}

async fn cmd_send(options: &Options, args: &[String]) -> CliResult {
    let peer = PeerId::new(args.first().ok_or("missing peer id")?.as_str());
    let message = read_arg_or_stdin(args, 1)?;
    let (session, _) = ready_session(options).await?;

    let payload = session.encrypt_for_user(&peer, &message).await?;
    if !wire::is_encrypted(&payload) {
        eprintln!("warning: no shared key with {}; message NOT encrypted", peer);
    }
    println!("{}", payload);
    Ok(())
}

async fn cmd_recv(options: &Options, args: &[String]) -> CliResult {
    let peer = PeerId::new(args.first().ok_or("missing peer id")?.as_str());
    let payload = read_arg_or_stdin(args, 1)?;
    let (session, _) = ready_session(options).await?;

    let text = session.decrypt_from_user(&peer, &payload).await?;
    if wire::is_encrypted(&text) {
        eprintln!("warning: could not decrypt message from {}", peer);
    }
    println!("{}", text);
    Ok(())
}

fn cmd_inspect(args: &[String]) -> CliResult {
    let payload = read_arg_or_stdin(args, 0)?;

    if !wire::is_encrypted(&payload) {
        println!("Plaintext ({} bytes)", payload.len());
        return Ok(());
    }

    let envelope = wire::parse(&payload)?;
    println!("Encrypted envelope");
    println!("  Ciphertext: {} bytes", envelope.ciphertext().len());
    println!("  Nonce:      {}", hex::encode(envelope.nonce()));
    println!("  Tag:        {}", hex::encode(envelope.tag()));
    Ok(())
}

async fn cmd_clear(options: &Options) -> CliResult {
    let session = open_session(options)?;
    session.clear_keys().await?;
    eprintln!("Cleared keys for {}", session.user());
    Ok(())
}
