// SPDX-License-Identifier: PMPL-1.0-or-later

//! nbs-qr: manage IPS QR payment templates and talk to the NBS QR service

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use nbs_qr::api::QrClient;
use nbs_qr::config::Config;
use nbs_qr::i18n::{ChangeOutcome, Lang, LanguageCoordinator, Notifier};
use nbs_qr::payload;
use nbs_qr::report::{OutputFormat, ReportFormatter};
use nbs_qr::storage::FileStore;
use nbs_qr::templates::{TemplateError, TemplateManager, Unsaved};
use nbs_qr::types::{Endpoint, ImportOptions, PaymentFields, TemplateUpdate, DEFAULT_METHOD};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nbs-qr")]
#[command(version)]
#[command(about = "IPS QR payment templates and NBS QR service client")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory for templates and preferences
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Interface language for this run (sr, en)
    #[arg(long, global = true, value_name = "CODE")]
    lang: Option<String>,

    /// Output format for listings
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved payment templates
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Build or parse payload text locally
    #[command(subcommand)]
    Payload(PayloadCommand),

    /// Call the NBS QR service
    #[command(subcommand)]
    Qr(QrCommand),

    /// Show or change the interface language
    #[command(subcommand)]
    Lang(LangCommand),
}

#[derive(Subcommand)]
enum TemplateCommand {
    /// Save a new template
    Add {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Target operation: gen, generate, validate or upload
        #[arg(long, value_parser = parse_endpoint)]
        endpoint: Endpoint,

        #[arg(long, default_value = DEFAULT_METHOD)]
        method: String,

        /// Payment field, e.g. --field R=845000000040484987
        #[arg(long = "field", value_name = "K=V", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// List all templates
    List,

    /// Show one template
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Change fields of a template
    Update {
        #[arg(value_name = "ID")]
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_parser = parse_endpoint)]
        endpoint: Option<Endpoint>,

        #[arg(long)]
        method: Option<String>,

        /// Replace the payment fields
        #[arg(long = "field", value_name = "K=V", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Delete a template
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Case-insensitive search in name, description and endpoint
    Search {
        #[arg(value_name = "QUERY")]
        query: String,
    },

    /// Templates targeting one operation
    Filter {
        #[arg(value_name = "ENDPOINT", value_parser = parse_endpoint)]
        endpoint: Endpoint,
    },

    /// Load a template and count the use
    Use {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Write all templates as a JSON document
    Export {
        /// Destination file (stdout when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Merge templates from an exported JSON document
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Replace duplicates instead of skipping them
        #[arg(long)]
        overwrite: bool,
    },

    /// Delete every template
    Clear {
        #[arg(long)]
        yes: bool,
    },

    /// Usage statistics
    Stats,
}

#[derive(Subcommand)]
enum PayloadCommand {
    /// Build payload text from fields
    Build {
        #[arg(long = "field", value_name = "K=V", value_parser = parse_field, required = true)]
        fields: Vec<(String, String)>,
    },

    /// Split payload text into fields
    Parse {
        #[arg(value_name = "TEXT")]
        text: String,
    },
}

#[derive(Subcommand)]
enum QrCommand {
    /// Render a PNG from payment fields
    Gen(QrSource),

    /// Generate from payload text
    Generate(QrSource),

    /// Validate payload text
    Validate(QrSource),

    /// Validate a QR code image
    Upload {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },
}

#[derive(Args)]
struct QrSource {
    /// Use the fields of a saved template
    #[arg(long, conflicts_with_all = ["fields", "text"])]
    template: Option<String>,

    #[arg(long = "field", value_name = "K=V", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Raw payload text
    #[arg(long, conflicts_with = "fields")]
    text: Option<String>,

    /// Write the image here
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum LangCommand {
    Show,
    Set {
        #[arg(value_name = "CODE")]
        code: String,
    },
    List,
}

/// Prints the change confirmation to the terminal.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str) {
        println!("{}", message.green());
    }
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (code, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected K=V, got {:?}", raw))?;
    let code = code.trim();
    if code.is_empty() {
        return Err(format!("empty field code in {:?}", raw));
    }
    Ok((code.to_ascii_uppercase(), value.to_string()))
}

fn parse_endpoint(raw: &str) -> Result<Endpoint, String> {
    Endpoint::from_path(raw).ok_or_else(|| {
        let known: Vec<&str> = Endpoint::all().iter().map(|e| e.path()).collect();
        format!("unknown endpoint {:?}, expected one of {}", raw, known.join(", "))
    })
}

fn collect_fields(pairs: Vec<(String, String)>) -> PaymentFields {
    pairs.into_iter().collect()
}

struct App {
    config: Config,
    templates: TemplateManager,
    language: LanguageCoordinator,
    format: OutputFormat,
    session_lang: Option<Lang>,
}

impl App {
    fn lang(&self) -> Lang {
        self.session_lang.unwrap_or_else(|| self.language.current())
    }

    fn formatter(&self) -> ReportFormatter {
        ReportFormatter::new(self.lang())
    }

    fn text(&self, key: &str) -> &'static str {
        nbs_qr::i18n::t(self.lang(), key)
    }

    fn client(&self) -> Result<QrClient> {
        Ok(QrClient::new(&self.config.api_base_url, self.config.timeout())?)
    }

    /// Print `value` in the structured format, or fall back to `text`.
    fn emit<T: serde::Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        match self.format.serialize(value)? {
            Some(out) => println!("{}", out.trim_end()),
            None => print!("{}", text()),
        }
        Ok(())
    }

    /// Unwrap a manager result. A failed save is retried once; the change
    /// stays applied in memory either way and comes back as `Err(Unsaved)`.
    fn saved<T>(&mut self, result: Result<T, TemplateError>) -> Result<Result<T, Unsaved>> {
        match result {
            Ok(value) => Ok(Ok(value)),
            Err(TemplateError::Persist { source, unsaved }) => {
                if let Err(retry) = self.templates.flush() {
                    tracing::debug!(error = %retry, "retrying the save failed");
                }
                if self.templates.is_dirty() {
                    eprintln!("{}: {}", self.text("template.storage_failed").red(), source);
                } else {
                    tracing::info!(error = %source, "templates saved on retry");
                }
                Ok(Err(unsaved))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("nbs_qr=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    let session_lang = cli
        .lang
        .as_deref()
        .map(|code| Lang::from_code(code).ok_or_else(|| anyhow!("unsupported language: {:?}", code)))
        .transpose()?;

    let store = Arc::new(FileStore::new(config.data_dir.clone()));
    let templates = TemplateManager::load(store.clone())?;
    let language = LanguageCoordinator::new(store, Arc::new(TerminalNotifier), config.default_language);

    let mut app = App {
        config,
        templates,
        language,
        format: cli.format,
        session_lang,
    };

    match cli.command {
        Commands::Template(command) => run_template(&mut app, command),
        Commands::Payload(command) => run_payload(&app, command),
        Commands::Qr(command) => run_qr(&mut app, command).await,
        Commands::Lang(command) => run_lang(&mut app, command),
    }
}

fn run_template(app: &mut App, command: TemplateCommand) -> Result<()> {
    match command {
        TemplateCommand::Add {
            name,
            description,
            endpoint,
            method,
            fields,
        } => {
            let result = app
                .templates
                .add(&name, &description, collect_fields(fields), endpoint, &method);
            let template = match app.saved(result)? {
                Ok(template) => template,
                Err(Unsaved::Added(template)) => *template,
                Err(_) => return Ok(()),
            };
            println!("{}: {}", app.text("template.saved").green(), template.id);
        }

        TemplateCommand::List => {
            let list = app.templates.list();
            app.emit(&list, || app.formatter().template_list(&list))?;
        }

        TemplateCommand::Show { id } => {
            let template = app
                .templates
                .get(&id)
                .ok_or_else(|| anyhow!("{}: {}", app.text("template.not_found"), id))?;
            app.emit(&template, || app.formatter().template_detail(&template))?;
        }

        TemplateCommand::Update {
            id,
            name,
            description,
            endpoint,
            method,
            fields,
        } => {
            let update = TemplateUpdate {
                name,
                description,
                data: (!fields.is_empty()).then(|| collect_fields(fields)),
                endpoint,
                method,
            };
            if update.is_empty() {
                bail!("nothing to update");
            }
            let result = app.templates.update(&id, update);
            if let Ok(None) = app.saved(result)? {
                bail!("{}: {}", app.text("template.not_found"), id);
            }
            println!("{}", app.text("template.updated").green());
        }

        TemplateCommand::Delete { id } => {
            let result = app.templates.delete(&id);
            if let Ok(false) = app.saved(result)? {
                bail!("{}: {}", app.text("template.not_found"), id);
            }
            println!("{}", app.text("template.deleted").green());
        }

        TemplateCommand::Search { query } => {
            let found = app.templates.search(&query);
            app.emit(&found, || app.formatter().template_list(&found))?;
        }

        TemplateCommand::Filter { endpoint } => {
            let found = app.templates.filter_by_endpoint(endpoint);
            app.emit(&found, || app.formatter().template_list(&found))?;
        }

        TemplateCommand::Use { id } => {
            let template = app
                .templates
                .get(&id)
                .ok_or_else(|| anyhow!("{}: {}", app.text("template.not_found"), id))?;
            let result = app.templates.increment_usage(&id);
            let _ = app.saved(result)?;
            println!("{}: {}", app.text("template.loaded").green(), template.name);
            app.emit(&template.data, || app.formatter().fields(&template.data))?;
        }

        TemplateCommand::Export { file } => match file {
            Some(path) => {
                app.templates.export_to_file(&path)?;
                println!("{}: {}", app.text("template.exported").green(), path.display());
            }
            None => println!("{}", serde_json::to_string_pretty(&app.templates.export())?),
        },

        TemplateCommand::Import { file, overwrite } => {
            let result = app.templates.import_file(&file, ImportOptions { overwrite });
            let summary = match app.saved(result)? {
                Ok(summary) | Err(Unsaved::Imported(summary)) => summary,
                Err(_) => return Ok(()),
            };
            app.emit(&summary, || app.formatter().import_summary(&summary))?;
        }

        TemplateCommand::Clear { yes } => {
            if !yes {
                bail!("{}", app.text("template.confirm_clear"));
            }
            let result = app.templates.clear();
            let _ = app.saved(result)?;
            println!("{}", app.text("template.cleared").green());
        }

        TemplateCommand::Stats => {
            let stats = app.templates.statistics();
            let top = app.templates.most_used(5);
            let recent = app.templates.recently_used(5);
            app.emit(&stats, || app.formatter().statistics(&stats, &top, &recent))?;
        }
    }
    Ok(())
}

fn run_payload(app: &App, command: PayloadCommand) -> Result<()> {
    match command {
        PayloadCommand::Build { fields } => {
            println!("{}", payload::build(&collect_fields(fields))?);
        }
        PayloadCommand::Parse { text } => {
            let fields = payload::parse(&text)?;
            app.emit(&fields, || app.formatter().fields(&fields))?;
        }
    }
    Ok(())
}

/// Resolve the fields a QR command works on, counting template use.
fn source_fields(app: &mut App, source: &QrSource) -> Result<PaymentFields> {
    if let Some(id) = &source.template {
        let template = app
            .templates
            .get(id)
            .ok_or_else(|| anyhow!("{}: {}", app.text("template.not_found"), id))?;
        let result = app.templates.increment_usage(id);
        let _ = app.saved(result)?;
        return Ok(template.data);
    }
    if source.fields.is_empty() {
        bail!("one of --template, --field or --text is required");
    }
    Ok(source.fields.iter().cloned().collect())
}

fn source_text(app: &mut App, source: &QrSource) -> Result<String> {
    match &source.text {
        Some(text) => Ok(text.clone()),
        None => Ok(payload::build(&source_fields(app, source)?)?),
    }
}

async fn run_qr(app: &mut App, command: QrCommand) -> Result<()> {
    let size = app.config.image_size;
    match command {
        QrCommand::Gen(source) => {
            let fields = match &source.text {
                Some(text) => payload::parse(text)?,
                None => source_fields(app, &source)?,
            };
            let image = app.client()?.generate_image(&fields, size).await?;
            let output = source.output.unwrap_or_else(|| PathBuf::from("qr.png"));
            write_image(&output, &image)?;
            println!("{}: {}", app.text("qr.saved_to").green(), output.display());
        }

        QrCommand::Generate(source) => {
            let text = source_text(app, &source)?;
            let response = app.client()?.generate(&text, size).await?;
            app.emit(&response, || app.formatter().generated(&response))?;
            if let Some(output) = &source.output {
                let image = response
                    .image()
                    .context("decoding image from QR service")?
                    .ok_or_else(|| anyhow!("QR service returned no image"))?;
                write_image(output, &image)?;
                println!("{}: {}", app.text("qr.saved_to").green(), output.display());
            }
        }

        QrCommand::Validate(source) => {
            let text = source_text(app, &source)?;
            let response = app.client()?.validate(&text).await?;
            app.emit(&response, || app.formatter().validation(&response))?;
        }

        QrCommand::Upload { image } => {
            let response = app.client()?.upload_file(&image).await?;
            app.emit(&response, || app.formatter().validation(&response))?;
        }
    }
    Ok(())
}

fn write_image(path: &Path, image: &[u8]) -> Result<()> {
    std::fs::write(path, image).with_context(|| format!("writing {}", path.display()))
}

fn run_lang(app: &mut App, command: LangCommand) -> Result<()> {
    match command {
        LangCommand::Show => {
            let lang = app.lang();
            println!("{}: {} ({})", app.text("lang.current"), lang.native_name(), lang.code());
        }
        LangCommand::List => {
            println!("{}:", app.text("lang.available"));
            for lang in Lang::all() {
                let marker = if *lang == app.lang() { "*" } else { " " };
                println!(" {} {}  {}", marker, lang.code(), lang.native_name());
            }
        }
        LangCommand::Set { code } => {
            // An explicit --lang must not mask the new preference.
            app.session_lang = None;
            match app.language.change_language(&code)? {
                ChangeOutcome::Changed { persisted: false, .. } => {
                    eprintln!("{}", app.text("template.storage_failed").red());
                }
                ChangeOutcome::Changed { .. } => {}
                ChangeOutcome::Unchanged => {
                    println!("{}: {}", app.text("lang.current"), app.lang().native_name());
                }
                ChangeOutcome::Debounced => bail!("language change already in progress"),
            }
        }
    }
    Ok(())
}
