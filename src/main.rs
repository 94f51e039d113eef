//! Purpose: `remodel` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Errors are emitted as a JSON envelope on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Connection parameters fall back to the session file by URL.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use remodel::api::{
    ApiResult, Client, Domain, Error, ErrorKind, SearchOptions, SessionStore, to_exit_code,
};
use serde_json::{Map, Value, json};
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "remodel", version, about = "Client for remote model stores over JSON-RPC")]
struct Cli {
    /// Server base URL, e.g. https://erp.example.com
    #[arg(long, global = true)]
    url: Option<String>,

    /// Database name; falls back to the session file entry for the URL.
    #[arg(long, global = true)]
    db: Option<String>,

    /// Login; falls back to the session file entry for the URL.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Password; falls back to the REMODEL_PASSWORD environment variable.
    #[arg(long, global = true)]
    password: Option<String>,

    /// Remember the database and login for this URL.
    #[arg(long, global = true)]
    save_session: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print field metadata for a model.
    Fields { model: String },
    /// Read fields for a comma-separated id list.
    Read {
        model: String,
        ids: String,
        #[arg(short = 'f', long = "field", required = true)]
        fields: Vec<String>,
    },
    /// Search ids matching a JSON domain (default `[]`).
    Search {
        model: String,
        domain: Option<String>,
        #[arg(long)]
        count: bool,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        order: Option<String>,
    },
    /// Call an arbitrary model method; arguments are parsed as JSON.
    Call {
        model: String,
        method: String,
        args: Vec<String>,
    },
    /// List saved sessions.
    Sessions,
    /// Emit shell completions.
    Completions { shell: Shell },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => {}
        Err(err) => {
            let envelope = json!({
                "error": {
                    "kind": format!("{:?}", err.kind()),
                    "message": err.to_string(),
                }
            });
            eprintln!("{envelope}");
            std::process::exit(to_exit_code(err.kind()));
        }
    }
}

fn run(cli: Cli) -> ApiResult<()> {
    match &cli.command {
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "remodel", &mut std::io::stdout());
            Ok(())
        }
        Command::Sessions => {
            let sessions = SessionStore::open_default().load()?;
            emit(&serde_json::to_value(sessions).unwrap_or(Value::Null));
            Ok(())
        }
        Command::Fields { model } => {
            let client = connect(&cli)?;
            let handle = client.model(model)?;
            let fields = serde_json::to_value(&handle.schema().fields).map_err(|err| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("failed to encode field metadata")
                    .with_source(err)
            })?;
            emit(&fields);
            Ok(())
        }
        Command::Read { model, ids, fields } => {
            let client = connect(&cli)?;
            let handle = client.model(model)?;
            let ids = parse_ids(ids)?;
            let collection = handle.browse(&ids);
            let paths: Vec<&str> = fields.iter().map(String::as_str).collect();
            collection.prefetch(&paths)?;
            let mut rows = Vec::with_capacity(collection.len());
            for record in collection.records() {
                let mut row = Map::new();
                row.insert("id".to_string(), json!(record.id()));
                for field in fields {
                    row.insert(field.clone(), record.get(field)?);
                }
                rows.push(Value::Object(row));
            }
            emit(&Value::Array(rows));
            Ok(())
        }
        Command::Search {
            model,
            domain,
            count,
            limit,
            order,
        } => {
            let client = connect(&cli)?;
            let handle = client.model(model)?;
            let domain = match domain {
                Some(text) => Domain::from_json(parse_json(text)?)?,
                None => Domain::new(),
            };
            if *count {
                emit(&json!({ "count": handle.search_count(&domain)? }));
                return Ok(());
            }
            let options = SearchOptions {
                limit: *limit,
                order: order.clone(),
                ..SearchOptions::default()
            };
            let found = handle.search(&domain, &options)?;
            emit(&json!({ "ids": found.ids() }));
            Ok(())
        }
        Command::Call {
            model,
            method,
            args,
        } => {
            let client = connect(&cli)?;
            let handle = client.model(model)?;
            let args: Vec<Value> = args
                .iter()
                .map(|arg| parse_json(arg))
                .collect::<ApiResult<_>>()?;
            let result = handle.call(method, args, Map::new())?;
            emit(&result);
            Ok(())
        }
    }
}

fn connect(cli: &Cli) -> ApiResult<Client> {
    let url = cli
        .url
        .as_deref()
        .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("--url is required"))?;
    let store = SessionStore::open_default();
    let session = store.lookup(url)?;
    let database = cli
        .db
        .clone()
        .or_else(|| session.as_ref().map(|entry| entry.database.clone()))
        .ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("--db is required (no session for url)")
        })?;
    let username = cli
        .user
        .clone()
        .or_else(|| session.as_ref().map(|entry| entry.username.clone()))
        .ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("--user is required (no session for url)")
        })?;
    let password = cli
        .password
        .clone()
        .or_else(|| std::env::var("REMODEL_PASSWORD").ok())
        .ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("--password or REMODEL_PASSWORD is required")
        })?;
    let client = Client::connect(url, &database, &username, &password)?;
    if cli.save_session {
        store.save(url, &database, &username)?;
    }
    Ok(client)
}

fn parse_ids(text: &str) -> ApiResult<Vec<i64>> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid id: {part}"))
                    .with_source(err)
            })
        })
        .collect()
}

fn parse_json(text: &str) -> ApiResult<Value> {
    serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid JSON argument: {text}"))
            .with_source(err)
    })
}

fn emit(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}
