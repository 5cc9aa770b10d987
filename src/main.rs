use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, Context};
use clap::{CommandFactory, Parser};

use docx_templater::config::{find_default_config, init_default_config, load_config, AppConfig};
use docx_templater::job::Job;
use docx_templater::logging::{ConsoleLog, LogSink};
use docx_templater::TemplateProcessor;

#[derive(Parser, Debug)]
#[command(name = "docx-templater")]
#[command(about = "Fill $markers$ in .docx templates: text, table rows, lists, images, charts, checkboxes", long_about = None)]
struct Args {
    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file to (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Template .docx
    #[arg(value_name = "TEMPLATE")]
    template: Option<PathBuf>,

    /// Output .docx (default: <template_stem>_filled.docx)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// JSON job with the values to substitute
    #[arg(long, value_name = "JSON")]
    job: Option<PathBuf>,

    /// Marker delimiter (default: $)
    #[arg(long, value_name = "SYMBOL")]
    symbol: Option<String>,

    /// Config file path (default: search for docx-templater.toml upwards)
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Print the markers found in the template, then exit
    #[arg(long)]
    list_variables: bool,

    /// Only report errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let template = match args.template {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  docx-templater <template.docx> --job values.json [-o out.docx]\n\nTIPS:\n  - Run with --list-variables to see which markers a template uses.\n  - Default config search: docx-templater.toml (upwards), or set DOCX_TEMPLATER_CONFIG.\n"
            );
            return Ok(());
        }
    };

    let workdir = template
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let cfg = match args.config.clone().or_else(|| find_default_config(&workdir)) {
        Some(path) => load_config(&path)?,
        None => AppConfig::default(),
    };
    let job = args.job.as_deref().map(Job::load).transpose()?.unwrap_or_default();

    let mut options = cfg.template_options(args.symbol.as_deref());
    for name in &job.variables {
        if !options.variables.contains(name) {
            options.variables.push(name.clone());
        }
    }

    let log = Rc::new(ConsoleLog::new(!args.quiet));
    let mut session = TemplateProcessor::load_with_log(&template, options, Box::new(Rc::clone(&log)))
        .with_context(|| format!("load template: {}", template.display()))?;

    if args.list_variables {
        for name in session.template_variables() {
            println!("{name}");
        }
        return Ok(());
    }
    if cfg.repair_all() {
        let found = session.template_variables();
        if session.repair(&found) {
            log.info(&format!("repaired split markers: {}", found.join(", ")));
        }
    }

    let output = match args.output {
        Some(p) => p,
        None => {
            let stem = template
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output")
                .to_string();
            template.with_file_name(format!("{stem}_filled.docx"))
        }
    };
    if output.exists() && !cfg.overwrite() {
        return Err(anyhow!(
            "output exists and [output] overwrite = false: {}",
            output.display()
        ));
    }

    let report = job.apply(&mut session)?;
    log.info(&format!(
        "text={} list_paragraphs={} table_rows={} images={} charts={} checkboxes={}",
        report.text, report.list_paragraphs, report.table_rows, report.images, report.charts, report.checkboxes
    ));

    let written = session
        .generate(&output.to_string_lossy())
        .with_context(|| format!("write output: {}", output.display()))?;
    log.info(&format!("done: {}", written.display()));
    Ok(())
}
