//! Purpose: Hold top-level CLI command dispatch for `powereditor`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every pre-flight problem is collected before a single usage error is raised.
//! Invariants: No shop client is built until pre-flight validation passes.

use super::*;

use powereditor::api::ShopifyClient;
use powereditor::config::{ConfigFile, ConfigLayer, Section, Settings};
use powereditor::core::bundle::ExportBundle;
use powereditor::export::{ExportOptions, export_collection};
use powereditor::import::{ImportOptions, PrimaryKey, import_bundle};

pub(super) fn dispatch_command(
    command: Command,
    global: GlobalArgs,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "powereditor", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Collection {
            command:
                CollectionCommand::Export {
                    collection_id,
                    include_product_info,
                },
        } => {
            let mut problems = Vec::new();
            let settings = resolve_settings(&global, Section::Export, &mut problems);
            let collection_id = parse_collection_id(collection_id.as_deref(), &mut problems);
            let (Some(settings), Some(collection_id), true) =
                (settings, collection_id, problems.is_empty())
            else {
                return Err(preflight_failed(&problems));
            };

            let client = shop_client(&settings)?;
            let options = ExportOptions {
                namespace: settings.namespace.clone(),
                include_product_info,
            };
            let report = export_collection(&client, collection_id, &options);
            report.bundle.write_to(&global.output)?;
            tracing::info!(
                exported = report.bundle.products.len(),
                output = %global.output.display(),
                "export written"
            );

            emit_json(
                json!({
                    "collection": collection_id,
                    "exported": report.bundle.products.len(),
                    "scanned": report.scanned,
                    "output": global.output.display().to_string(),
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Import {
            file,
            primary_key,
            metafields_only,
        } => {
            let mut problems = Vec::new();
            let settings = resolve_settings(&global, Section::Import, &mut problems);
            let primary_key = match primary_key.parse::<PrimaryKey>() {
                Ok(key) => Some(key),
                Err(err) => {
                    problems.push(error_message(&err));
                    None
                }
            };
            let bundle = match file {
                Some(path) => match ExportBundle::read_from(&path) {
                    Ok(bundle) => Some(bundle),
                    Err(err) => {
                        problems.push(format!("Can't access file. {}", problem_text(&err)));
                        None
                    }
                },
                None => {
                    problems.push("path to data file required as an argument".to_string());
                    None
                }
            };
            let (Some(settings), Some(primary_key), Some(bundle), true) =
                (settings, primary_key, bundle, problems.is_empty())
            else {
                return Err(preflight_failed(&problems));
            };

            let client = shop_client(&settings)?;
            let options = ImportOptions {
                namespace: settings.namespace.clone(),
                primary_key,
                metafields_only,
            };
            let report = import_bundle(&client, &bundle, &options);

            for skipped in &report.skipped {
                let notice = notice_for("skip", "import", &skipped.label, &skipped.reason);
                emit_notice(&notice, color_mode);
            }
            for failed in &report.failed {
                let mut notice =
                    notice_for("update_failed", "import", &failed.label, &failed.reason);
                notice
                    .details
                    .insert("product_id".to_string(), json!(failed.product_id));
                emit_notice(&notice, color_mode);
            }
            tracing::info!(
                updated = report.updated.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "import finished"
            );

            emit_json(
                json!({
                    "updated": report.updated.len(),
                    "skipped": report.skipped.len(),
                    "failed": report.failed.len(),
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
    }
}

/// Layers CLI flags over the config file section over `POWEREDITOR_*` variables.
fn resolve_settings(
    global: &GlobalArgs,
    section: Section,
    problems: &mut Vec<String>,
) -> Option<Settings> {
    let cli = ConfigLayer {
        key: global.key.clone(),
        password: global.password.clone(),
        store: global.store.clone(),
        namespace: global.namespace.clone(),
        api_version: global.api_version.clone(),
    };
    let file = match ConfigFile::load(global.config.as_deref()) {
        Ok(Some((path, file))) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            file.layer(section)
        }
        Ok(None) => ConfigLayer::default(),
        Err(err) => {
            problems.push(problem_text(&err));
            ConfigLayer::default()
        }
    };
    let env = ConfigLayer::from_env(|name| std::env::var(name).ok());

    match Settings::resolve(&[&cli, &file, &env]) {
        Ok(settings) => Some(settings),
        Err(missing) => {
            problems.extend(missing);
            None
        }
    }
}

fn parse_collection_id(raw: Option<&str>, problems: &mut Vec<String>) -> Option<u64> {
    let Some(raw) = raw else {
        problems.push("a collection ID is required as an argument".to_string());
        return None;
    };
    match raw.trim().parse::<u64>() {
        Ok(id) => Some(id),
        Err(_) => {
            problems.push(format!("collection ID '{raw}' is not a number"));
            None
        }
    }
}

fn preflight_failed(problems: &[String]) -> Error {
    Error::from_problems(problems)
        .map(|err| err.with_hint("Run `powereditor --help` for flags and config file keys."))
        .unwrap_or_else(|| {
            Error::new(ErrorKind::Internal).with_message("pre-flight validation failed")
        })
}

fn shop_client(settings: &Settings) -> Result<ShopifyClient, Error> {
    let client = ShopifyClient::new(&settings.store, settings.api_version.clone())?
        .with_basic_auth(&settings.key, &settings.password);
    tracing::debug!(
        origin = %client.origin(),
        api_version = %settings.api_version,
        "shop client ready"
    );
    Ok(client)
}
