fn is_robot_mode_args() -> bool {
    std::env::args().any(|arg| arg == "--json" || arg == "--robot")
}

fn report(err: &meeting_lists::CliError) {
    if is_robot_mode_args() {
        let payload = serde_json::json!({
            "error": {
                "code": err.code,
                "kind": err.kind,
                "message": err.message,
                "hint": err.hint,
                "retryable": err.retryable,
            }
        });
        eprintln!("{payload}");
    } else {
        eprintln!("{}", err.message);
        if let Some(hint) = &err.hint {
            eprintln!("hint: {hint}");
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let raw_args: Vec<String> = std::env::args().collect();
    let parsed = match meeting_lists::parse_cli(raw_args) {
        Ok(parsed) => parsed,
        Err(err) => {
            report(&err);
            std::process::exit(err.code);
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match runtime.block_on(meeting_lists::run_with_parsed(parsed)) {
        Ok(()) => Ok(()),
        Err(err) => {
            report(&err);
            std::process::exit(err.code);
        }
    }
}
