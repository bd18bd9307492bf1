//! Command-line entry points next to the HTTP server.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::Config;
use crate::llm_client::{GeneratorFactory, ModelSelection};
use crate::tailoring::{self, Preview, TailoringRequest, TailoringResult, OUTPUT_FILE_NAME};

#[derive(Parser)]
#[command(name = "tailor")]
#[command(about = "Tailor the Summary and Skills sections of a .docx resume to a job description")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web interface (default)
    Serve {
        /// Port to listen on; overrides PORT
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Tailor a resume from the command line
    Tailor(TailorArgs),

    /// Parse a resume and print the paragraphs and located sections
    CheckParser {
        /// Path to the .docx resume
        resume: PathBuf,
    },

    /// Send a short prompt to a provider and report whether it answered
    CheckLlm {
        /// Provider name or model id (groq, local, gpt-4, ollama:mistral, ...)
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
pub struct TailorArgs {
    /// Path to the .docx resume
    #[arg(short, long)]
    pub resume: PathBuf,

    /// Path to a text file with the job description
    #[arg(long, conflicts_with = "jd_text", required_unless_present = "jd_text")]
    pub jd: Option<PathBuf>,

    /// Job description given inline
    #[arg(long)]
    pub jd_text: Option<String>,

    /// Where to write the tailored resume
    #[arg(short, long, default_value = OUTPUT_FILE_NAME)]
    pub out: PathBuf,

    /// Provider name or model id; defaults to DEFAULT_MODEL
    #[arg(short, long)]
    pub model: Option<String>,
}

fn selection(model: Option<&str>, config: &Config) -> Result<ModelSelection> {
    match model {
        Some(m) => ModelSelection::parse(m).with_context(|| format!("unknown model '{m}'")),
        None => Ok(config.default_model.clone()),
    }
}

/// `tailor tailor`: runs the pipeline and writes the output file.
pub async fn run_tailor(
    args: &TailorArgs,
    config: &Config,
    generators: &dyn GeneratorFactory,
) -> Result<TailoringResult> {
    let resume = std::fs::read(&args.resume)
        .with_context(|| format!("failed to read resume {}", args.resume.display()))?;
    let job_description = match (&args.jd, &args.jd_text) {
        (_, Some(text)) => text.clone(),
        (Some(path), None) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read job description {}", path.display()))?,
        (None, None) => bail!("either --jd or --jd-text is required"),
    };
    if job_description.trim().is_empty() {
        bail!("the job description is empty");
    }

    let request = TailoringRequest {
        resume: Bytes::from(resume),
        job_description,
        selection: selection(args.model.as_deref(), config)?,
        api_key: None,
    };
    info!(model = %request.selection, "tailoring {}", args.resume.display());

    let result = tailoring::tailor(
        &request,
        generators,
        &config.locator(),
        &config.tailor_options(),
    )
    .await?;

    std::fs::write(&args.out, &result.document)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    for report in &result.sections {
        println!("{:<8} {:?}", report.kind.label(), report.outcome);
    }
    println!("wrote {}", args.out.display());
    Ok(result)
}

/// `tailor check-parser`: fails when the file cannot be read as a resume.
pub fn run_check_parser(path: &Path, config: &Config) -> Result<Preview> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let preview = tailoring::preview(Bytes::from(bytes), &config.locator())?;

    println!("{} paragraphs", preview.paragraphs);
    if preview.sections.is_empty() {
        println!("no Summary or Skills heading found");
    }
    for section in &preview.sections {
        println!(
            "{} \"{}\" paragraphs {}..{}{}",
            section.kind.label(),
            section.heading,
            section.start,
            section.end,
            if section.is_list { " (list)" } else { "" }
        );
        for line in section.text.lines() {
            println!("    {line}");
        }
    }
    Ok(preview)
}

/// `tailor check-llm`: one round trip through the selected provider.
pub async fn run_check_llm(
    model: Option<&str>,
    config: &Config,
    generators: &dyn GeneratorFactory,
) -> Result<()> {
    let selection = selection(model, config)?;
    let generator = generators.build(&selection, None)?;
    generator
        .test_connection()
        .await
        .with_context(|| format!("{selection} did not answer"))?;
    println!("{selection}: ok");

    if selection.provider.is_local() {
        let models = generator.list_models().await?;
        println!("installed models: {}", models.join(", "));
    }
    Ok(())
}
