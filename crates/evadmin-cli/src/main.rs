// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, bail};
use config::Config;
use evadmin_app::{AppState, ImportReport};
use evadmin_backend::{FaceClient, RestClient};
use evadmin_db::Store;
use evadmin_tui::AppRuntime;
use logging::LogTarget;
use runtime::AdminRuntime;
use std::env;
use std::fmt::Write as _;
use std::path::PathBuf;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    if let Some(path) = &options.write_template {
        evadmin_sheet::write_user_template(path)?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `evadmin --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let headless = options.check_only || options.import_path.is_some();
    if headless {
        logging::start_logging(config.log_level(), LogTarget::Stderr)?;
    } else {
        let log_file = config.log_file()?;
        logging::start_logging(config.log_level(), LogTarget::File(&log_file))?;
    }

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or EVADMIN_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;

    let mut runtime = if options.demo {
        runtime::seed_demo_data(&store)?;
        AdminRuntime::local(store)?
    } else {
        let Some(backend) = config.backend()? else {
            bail!(
                "no backend configured in {}; set [backend].url and anon_key, or run `evadmin --demo`",
                options.config_path.display()
            );
        };
        let client = RestClient::new(&backend.url, &backend.anon_key, backend.timeout)
            .with_context(|| {
                format!(
                    "invalid [backend] config in {}; fix url/anon_key/timeout values",
                    options.config_path.display()
                )
            })?;
        let face = if config.face_api_enabled() {
            Some(
                FaceClient::new(config.face_api_url(), config.face_api_timeout()?).with_context(
                    || {
                        format!(
                            "invalid [face_api] config in {}; fix base_url/timeout values",
                            options.config_path.display()
                        )
                    },
                )?,
            )
        } else {
            None
        };
        AdminRuntime::remote(store, client)?
            .with_face_client(face)
            .with_avatar_storage(config.avatar_bucket(), config.avatar_folder())
    };
    runtime = runtime.with_template_dir(env::current_dir().context("resolve working directory")?);

    if options.check_only {
        tracing::info!(db = %db_path.display(), "configuration ok");
        return Ok(());
    }

    if let Some(path) = &options.import_path {
        if options.demo {
            runtime.sign_in(runtime::DEMO_OPERATOR_EMAIL, runtime::DEMO_OPERATOR_PASSWORD)?;
        } else if runtime.restored_user().is_none() {
            bail!("no saved session; sign in once with `evadmin` and retry the import");
        }
        let report = runtime.import_users(path, &mut |progress| {
            tracing::info!(
                row = progress.index + 1,
                total = progress.total,
                "{}",
                progress.step
            );
        })?;
        print!("{}", format_import_report(&report));
        return Ok(());
    }

    let mut state = AppState::default();
    evadmin_tui::run_app(&mut state, &mut runtime, config.page_size())
}

/// Every failed row and warning, never truncated.
fn format_import_report(report: &ImportReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report.summary());
    for error in &report.errors {
        let _ = writeln!(out, "row {}: {}", error.row, error.error);
        for (field, value) in &error.data {
            if !value.is_empty() {
                let _ = writeln!(out, "    {field} = {value}");
            }
        }
    }
    for warning in &report.warnings {
        let _ = writeln!(out, "row {}: warning: {}", warning.row, warning.message);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    import_path: Option<PathBuf>,
    write_template: Option<PathBuf>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        import_path: None,
        write_template: None,
        show_help: false,
    };

    let mut iter = args.into_iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--import" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--import requires a spreadsheet path"))?;
                options.import_path = Some(PathBuf::from(value.as_ref()));
            }
            "--write-template" => {
                let value = iter.next_if(|next: &S| !AsRef::<str>::as_ref(next).starts_with("--"));
                let path = match value {
                    Some(value) => PathBuf::from(value.as_ref()),
                    None => PathBuf::from(evadmin_sheet::TEMPLATE_FILE_NAME),
                };
                options.write_template = Some(path);
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("evadmin");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!(
        "  --demo                   Launch with seeded demo data (in-memory); sign in as {} / {}",
        runtime::DEMO_OPERATOR_EMAIL,
        runtime::DEMO_OPERATOR_PASSWORD
    );
    println!("  --check                  Validate config + DB + backend settings");
    println!("  --import <file>          Import users from an .xlsx/.xls file and print the report");
    println!(
        "  --write-template [path]  Write the user import template (default {})",
        evadmin_sheet::TEMPLATE_FILE_NAME
    );
    println!("  --help                   Show this help");
}
