use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use serde_json::Value;
use tracing_subscriber::EnvFilter;

use lesson_core::codec;
use lesson_core::model::LessonId;
use services::session::{LessonSession, LessonView, Panel, QuizView, SessionView};
use services::{AppServices, CatalogService, UnlockOutcome};

/// Lesson fields that carry obfuscation payloads once a lesson is locked.
const ENCODED_FIELDS: &[&str] = &["concept", "concept_extra", "pine_code", "python_code"];

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    EmptyKey,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::EmptyKey => write!(f, "--key must not be empty"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- view   [--db <sqlite_url>] [--data <url_or_path>]");
    eprintln!("  cargo run -p app -- encode [--input <path>] [--output <path>] [--key <key>]");
    eprintln!();
    eprintln!("Defaults for view:");
    eprintln!("  --db sqlite://pinestudy.sqlite3");
    eprintln!("  --data data/lessons.json");
    eprintln!();
    eprintln!("Defaults for encode:");
    eprintln!("  --input data/lessons.json");
    eprintln!("  --output data/lessons.enc.json");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PS_DB_URL, PS_DATA_URL, PS_ENCODE_KEY");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    View,
    Encode,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "view" => Some(Self::View),
            "encode" => Some(Self::Encode),
            _ => None,
        }
    }
}

struct ViewArgs {
    db_url: String,
    data: String,
}

impl ViewArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("PS_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://pinestudy.sqlite3".into(), normalize_sqlite_url);
        let mut data = std::env::var("PS_DATA_URL")
            .ok()
            .unwrap_or_else(|| "data/lessons.json".into());

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--data" => data = require_value(args, "--data")?,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, data })
    }
}

struct EncodeArgs {
    input: PathBuf,
    output: PathBuf,
    key: String,
}

impl EncodeArgs {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut input = PathBuf::from("data/lessons.json");
        let mut output = PathBuf::from("data/lessons.enc.json");
        let mut key = std::env::var("PS_ENCODE_KEY")
            .ok()
            .unwrap_or_else(|| "pinegood888".into());

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--input" => input = PathBuf::from(require_value(args, "--input")?),
                "--output" => output = PathBuf::from(require_value(args, "--output")?),
                "--key" => key = require_value(args, "--key")?,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if key.is_empty() {
            return Err(ArgsError::EmptyKey);
        }
        Ok(Self { input, output, key })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

//
// ─── ENCODE COMMAND ────────────────────────────────────────────────────────────
//

/// Obfuscate the gated fields of every locked lesson in a catalog document.
///
/// Works on raw JSON so fields the viewer does not model pass through
/// untouched. Already-encoded fields are left alone, so re-running over an
/// encoded file is a no-op.
fn encode_document(document: &mut Value, key: &str) -> Result<usize, Box<dyn std::error::Error>> {
    let lessons = document
        .get_mut("lessons")
        .and_then(Value::as_array_mut)
        .ok_or("catalog document has no \"lessons\" array")?;

    let mut encoded = 0;
    for lesson in lessons.iter_mut() {
        let locked = lesson
            .get("isLocked")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !locked {
            continue;
        }
        for field in ENCODED_FIELDS {
            let Some(text) = lesson.get(*field).and_then(Value::as_str).map(str::to_string)
            else {
                continue;
            };
            lesson[*field] = Value::String(codec::encode_field(&text, key)?);
        }
        lesson["isEncrypted"] = Value::Bool(true);
        encoded += 1;
    }
    Ok(encoded)
}

fn run_encode(args: &EncodeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&args.input)?;
    let mut document: Value = serde_json::from_str(&text)?;
    let encoded = encode_document(&mut document, &args.key)?;
    std::fs::write(&args.output, serde_json::to_string_pretty(&document)?)?;
    println!(
        "encoded {encoded} locked lesson(s) from {} into {}",
        args.input.display(),
        args.output.display()
    );
    Ok(())
}

//
// ─── VIEW COMMAND ──────────────────────────────────────────────────────────────
//

enum ReplAction {
    Repaint,
    Silent,
    Quit,
}

fn print_help() {
    println!("Commands:");
    println!("  list             repaint the lesson list");
    println!("  open <id>        select a lesson");
    println!("  panel <name>     switch panel: concept, code, quiz");
    println!("  answer <n>       submit choice n for the current question");
    println!("  next             advance to the next question");
    println!("  unlock <code>    submit a paid-content unlock code");
    println!("  reset            clear all progress and re-lock paid content");
    println!("  help             show this help");
    println!("  quit             exit");
}

async fn dispatch(session: &mut LessonSession, line: &str) -> Result<ReplAction, String> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "" => Ok(ReplAction::Silent),
        "list" => Ok(ReplAction::Repaint),
        "open" => {
            if rest.is_empty() {
                return Err("usage: open <id>".to_string());
            }
            session
                .select_lesson(&LessonId::new(rest))
                .await
                .map_err(|err| err.to_string())?;
            Ok(ReplAction::Repaint)
        }
        "panel" => {
            let panel = match rest {
                "concept" => Panel::Concept,
                "code" => Panel::Code,
                "quiz" => Panel::Quiz,
                other => return Err(format!("unknown panel: {other}")),
            };
            session.switch_panel(panel).map_err(|err| err.to_string())?;
            Ok(ReplAction::Repaint)
        }
        "answer" => {
            // A missing or zero argument submits no selection, which the
            // quiz reports as its own error.
            let choice = rest.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
            session
                .submit_answer(choice)
                .await
                .map_err(|err| err.to_string())?;
            Ok(ReplAction::Repaint)
        }
        "next" => {
            session.advance_quiz().await.map_err(|err| err.to_string())?;
            Ok(ReplAction::Repaint)
        }
        "unlock" => {
            let outcome = session
                .submit_code(rest)
                .await
                .map_err(|err| err.to_string())?;
            match outcome {
                UnlockOutcome::Accepted(_) => {
                    println!("unlock code accepted");
                    Ok(ReplAction::Repaint)
                }
                UnlockOutcome::Rejected(rejection) => Err(rejection.to_string()),
            }
        }
        "reset" => {
            session.reset().await.map_err(|err| err.to_string())?;
            println!("progress cleared");
            Ok(ReplAction::Repaint)
        }
        "help" => {
            print_help();
            Ok(ReplAction::Silent)
        }
        "quit" | "exit" => Ok(ReplAction::Quit),
        other => Err(format!("unknown command: {other} (try \"help\")")),
    }
}

fn paint(view: &SessionView) {
    println!();
    println!("Lessons  ({} complete)", view.percent_label);
    for item in &view.items {
        if let Some(header) = &item.header {
            println!("── {header} ──");
        }
        let marker = if item.is_active { ">" } else { " " };
        let gate = if item.is_gated { "  [paid]" } else { "" };
        println!("{marker} {}  {}  ({}){gate}", item.id, item.title, item.mark);
    }
    if let Some(lesson) = &view.lesson {
        paint_lesson(lesson);
    }
}

fn paint_lesson(lesson: &LessonView) {
    println!();
    println!("=== {} ===", lesson.title);
    if !lesson.subtitle.is_empty() {
        println!("{}", lesson.subtitle);
    }
    if lesson.locked {
        println!();
        println!("This lesson is paid content. Enter: unlock <code>");
        return;
    }

    match lesson.panel {
        Panel::Concept => {
            if let Some(content) = &lesson.content {
                println!();
                println!("{}", content.concept);
                if !content.concept_extra.is_empty() {
                    println!();
                    println!("{}", content.concept_extra);
                }
                if !content.summary.is_empty() {
                    println!();
                    for point in &content.summary {
                        println!("  * {point}");
                    }
                }
            }
        }
        Panel::Code => {
            if let Some(content) = &lesson.content {
                if !content.pine_code.is_empty() {
                    println!();
                    println!("--- Pine Script ---");
                    println!("{}", content.pine_code);
                }
                if !content.python_code.is_empty() {
                    println!();
                    println!("--- Python ---");
                    println!("{}", content.python_code);
                }
            }
        }
        Panel::Quiz => {
            if let Some(quiz) = &lesson.quiz {
                paint_quiz(quiz);
            }
        }
    }
}

fn paint_quiz(quiz: &QuizView) {
    println!();
    println!("Quiz  {}", quiz.progress_label);
    println!("{}", quiz.title);
    for (index, choice) in quiz.choices.iter().enumerate() {
        println!("  {}. {choice}", index + 1);
    }
    if let Some(feedback) = &quiz.feedback {
        println!();
        println!("{}", if feedback.correct { "Correct!" } else { "Not quite." });
        if !feedback.explain.is_empty() {
            println!("{}", feedback.explain);
        }
    }
    if quiz.can_submit {
        println!("(answer <n> to submit)");
    }
    if quiz.can_advance {
        println!("(next to continue)");
    }
}

fn print_prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

async fn run_view(args: &ViewArgs) -> Result<(), Box<dyn std::error::Error>> {
    prepare_sqlite_file(&args.db_url)?;

    let catalog = if args.data.starts_with("http://") || args.data.starts_with("https://") {
        CatalogService::over_http(&args.data)
    } else {
        CatalogService::from_path(&args.data)
    };
    let services = AppServices::new_sqlite(&args.db_url, catalog).await?;
    let mut session = services.open_session().await;

    paint(&session.snapshot());
    print_help();
    print_prompt();

    for line in io::stdin().lock().lines() {
        let line = line?;
        match dispatch(&mut session, line.trim()).await {
            Ok(ReplAction::Repaint) => paint(&session.snapshot()),
            Ok(ReplAction::Silent) => {}
            Ok(ReplAction::Quit) => break,
            Err(message) => println!("{message}"),
        }
        print_prompt();
    }
    Ok(())
}

//
// ─── ENTRY POINT ───────────────────────────────────────────────────────────────
//

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: the interactive viewer when no subcommand is given.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::View,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::View,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    match cmd {
        Command::View => {
            let args = ViewArgs::parse(&mut iter).map_err(|e| {
                eprintln!("{e}");
                print_usage();
                e
            })?;
            run_view(&args).await
        }
        Command::Encode => {
            let args = EncodeArgs::parse(&mut iter).map_err(|e| {
                eprintln!("{e}");
                print_usage();
                e
            })?;
            run_encode(&args)
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_leaves_full_urls_alone() {
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/a.sqlite3".into()),
            "sqlite:///tmp/a.sqlite3"
        );
    }

    #[test]
    fn normalize_absolutizes_bare_paths() {
        let url = normalize_sqlite_url("pinestudy.sqlite3".into());
        assert!(url.starts_with("sqlite://"));
        assert!(url.ends_with("pinestudy.sqlite3"));
    }

    #[test]
    fn encode_document_touches_only_locked_lessons() {
        let mut document = json!({
            "lessons": [
                {"id": "free", "title": "Free", "concept": "open text"},
                {"id": "paid", "title": "Paid", "isLocked": true,
                 "concept": "secret", "pine_code": "plot(close)"}
            ]
        });

        let encoded = encode_document(&mut document, "pinegood888").unwrap();
        assert_eq!(encoded, 1);

        let lessons = document["lessons"].as_array().unwrap();
        assert_eq!(lessons[0]["concept"], "open text");
        assert!(lessons[0].get("isEncrypted").is_none());

        let concept = lessons[1]["concept"].as_str().unwrap();
        assert!(concept.starts_with(codec::ENCODED_MARKER));
        assert_eq!(lessons[1]["isEncrypted"], true);
        assert_eq!(
            codec::decode_field(concept, "pinegood888"),
            "secret"
        );
    }

    #[test]
    fn encode_document_is_idempotent() {
        let mut document = json!({
            "lessons": [{"id": "p", "title": "P", "isLocked": true, "concept": "secret"}]
        });
        encode_document(&mut document, "k").unwrap();
        let first = document["lessons"][0]["concept"].clone();
        encode_document(&mut document, "k").unwrap();
        assert_eq!(document["lessons"][0]["concept"], first);
    }

    #[test]
    fn encode_document_preserves_unknown_fields() {
        let mut document = json!({
            "lessons": [{"id": "p", "title": "P", "isLocked": true,
                         "concept": "secret", "customField": 42}]
        });
        encode_document(&mut document, "k").unwrap();
        assert_eq!(document["lessons"][0]["customField"], 42);
    }

    #[test]
    fn encode_document_rejects_shapeless_input() {
        let mut document = json!({"not_lessons": []});
        assert!(encode_document(&mut document, "k").is_err());
    }
}
