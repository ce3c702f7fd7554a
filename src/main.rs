use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pagebuilder::{
    resolve_layout, BuilderConfig, Compositor, PageConfig, PageDocument, PageInputs,
    SectionRegistry, SessionProvider, TemplateRenderer,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pagebuilder")]
#[command(version, about = "Compose landing pages from templated sections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a host document and write the result
    Render {
        /// Host HTML document
        input: PathBuf,

        /// Output path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        blocks: BlockOverrides,

        /// Publish this session id on <body>
        #[arg(long)]
        session_id: Option<String>,

        /// Fail templates that reference missing fields
        #[arg(long)]
        strict_fields: bool,

        /// Never render the debug overlay
        #[arg(long)]
        no_debug: bool,

        /// Id of the element sections are appended to
        #[arg(long, default_value = "page-root")]
        root_id: String,

        /// Print the render state as JSON on stderr
        #[arg(long)]
        state: bool,
    },

    /// Report layout keys without a template and templates that fail to evaluate
    Check {
        /// Host HTML document
        input: PathBuf,

        #[command(flatten)]
        blocks: BlockOverrides,
    },
}

/// Files replacing the blocks embedded in the host document
#[derive(Args)]
struct BlockOverrides {
    /// Page config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Section registry JSON
    #[arg(long)]
    sections: Option<PathBuf>,

    /// Base style sheet
    #[arg(long)]
    css: Option<PathBuf>,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_inputs(html: &str, blocks: &BlockOverrides) -> Result<PageInputs> {
    let mut inputs = PageInputs::from_html(html).context("failed to read input blocks")?;
    if let Some(path) = &blocks.config {
        inputs.config = PageConfig::from_json(&read(path)?)
            .with_context(|| format!("invalid page config in {}", path.display()))?;
    }
    if let Some(path) = &blocks.sections {
        inputs.registry = SectionRegistry::from_json(&read(path)?)
            .with_context(|| format!("invalid section registry in {}", path.display()))?;
    }
    if let Some(path) = &blocks.css {
        inputs.base_css = read(path)?;
    }
    Ok(inputs)
}

fn check(inputs: &PageInputs) -> usize {
    let renderer = TemplateRenderer::default();
    let layout = resolve_layout(inputs.config.layout.as_deref(), &inputs.registry);
    let mut problems = 0;

    for key in layout.unknown_keys(&inputs.registry) {
        println!("unknown section: {}", key);
        problems += 1;
    }
    for key in &layout.keys {
        let Some(section) = inputs.registry.get(key) else {
            continue;
        };
        let customization = inputs.config.customization(key);
        if let Err(e) = renderer.try_render(&section.markup, customization.fields()) {
            println!("template error in {}: {}", key, e);
            problems += 1;
        }
    }
    println!(
        "{} sections in layout, {} problems",
        layout.keys.len(),
        problems
    );
    problems
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::Render {
            input,
            output,
            blocks,
            session_id,
            strict_fields,
            no_debug,
            root_id,
            state,
        } => {
            let html = read(&input)?;
            let inputs = load_inputs(&html, &blocks)?;
            let config = BuilderConfig {
                root_id,
                strict_fields,
                enable_debug_overlay: !no_debug,
                ..Default::default()
            };

            let mut document = PageDocument::parse(&html);
            let mut compositor = Compositor::new(config, inputs);
            if let Some(id) = session_id {
                compositor = compositor.with_session(SessionProvider::shared(Some(id)));
            }
            let render_state = compositor.compose(&mut document)?;
            if !render_state.root_found {
                log::warn!("{}: render root not found, output is unchanged", input.display());
            }
            if state {
                eprintln!("{}", serde_json::to_string_pretty(&render_state)?);
            }

            let rendered = document.to_html();
            match output {
                Some(path) => std::fs::write(&path, rendered)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{}", rendered),
            }
        }
        Commands::Check { input, blocks } => {
            let html = read(&input)?;
            let inputs = load_inputs(&html, &blocks)?;
            if check(&inputs) > 0 {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
