use std::path::{Path, PathBuf};

use clap::Parser;
use weft::token::lexer::Lexer;
use weft::{Config, Engine, IoOutput, MapContext, Value};
use weft_stdext::color::Colorize;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = cli.run() {
        if !err.is_empty() {
            eprintln!("{err}");
        }
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

/// Render and inspect Weft templates.
#[derive(Debug, Parser)]
#[command(
    name = "weft",
    version = "0.1",
    about,
    long_about,
    max_term_width(100)
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a JSON file with engine configuration.
    ///
    /// Fields that are not present keep their default values, for example
    ///
    ///     {"strict": true, "max_foreach_iterations": 1000}
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print more logging; repeat for more detail.
    ///
    /// Diagnostics about undefined references are logged at the debug level,
    ///     so `-vv` shows them.
    /// The `RUST_LOG` environment variable overrides this flag.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

impl Cli {
    fn run(self) -> Result<(), String> {
        let config = match &self.config {
            None => Config::default(),
            Some(path) => read_config(path)?,
        };
        match self.command {
            Command::Render(render) => render.run(config),
            Command::Check(check) => check.run(config),
            Command::Tokens(tokens) => tokens.run(),
            Command::Tree(tree) => tree.run(),
        }
    }
}

#[derive(Clone, Debug, clap::Subcommand)]
enum Command {
    /// Render a template.
    ///
    /// The template is loaded by name from its directory, which also serves as the
    ///     root for `#include` and `#parse`:
    ///
    ///     $ weft render pages/index.wft --data data.json
    ///
    /// The data file must contain a JSON object.
    /// Each of its entries becomes a variable of the context; JSON null values
    ///     are skipped, so references to them are undefined.
    Render(Render),

    /// Check that templates compile.
    ///
    /// Every template is compiled and any errors are printed.
    /// The command fails if at least one template has an error.
    Check(Check),

    /// Print the tokens of a template, one per line.
    ///
    /// This is used to debug the lexer.
    /// Each line contains the position of the token, its kind and its text.
    Tokens(Tokens),

    /// Print the syntax tree of a template.
    Tree(Tree),
}

#[derive(Clone, Debug, Parser)]
struct Render {
    /// Path to the template to render.
    path: PathBuf,

    /// Path to a JSON file with the variables of the context.
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Fail on undefined references instead of rendering their literal text.
    #[arg(long)]
    strict: bool,

    /// Write the output to this file instead of standard out.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Render {
    fn run(&self, mut config: Config) -> Result<(), String> {
        if self.strict {
            config.strict = true;
        }
        let (root, name) = split_template_path(&self.path)?;
        config.template_root = Some(root);
        let engine = Engine::builder().config(config).build();
        let template = engine.get_template(&name).map_err(|err| err.to_string())?;
        let mut ctx = match &self.data {
            None => MapContext::new(),
            Some(path) => read_data(path)?,
        };
        match &self.output {
            None => {
                let stdout = std::io::stdout();
                let mut out = IoOutput::new(stdout.lock());
                engine
                    .render(&template, &mut ctx, &mut out)
                    .map_err(|err| err.to_string())
            }
            Some(path) => {
                let file = std::fs::File::create(path).map_err(|err| {
                    format!("Failed to create output file {}: {err}", path.display())
                })?;
                let mut out = IoOutput::new(std::io::BufWriter::new(file));
                engine
                    .render(&template, &mut ctx, &mut out)
                    .map_err(|err| err.to_string())?;
                std::io::Write::flush(&mut out.into_inner()).map_err(|err| {
                    format!("Failed to write output file {}: {err}", path.display())
                })
            }
        }
    }
}

#[derive(Clone, Debug, Parser)]
struct Check {
    /// Paths to the templates to check.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

impl Check {
    fn run(&self, config: Config) -> Result<(), String> {
        let engine = Engine::builder().config(config).build();
        let mut num_errors = 0_usize;
        for path in &self.paths {
            let source = read_source(path)?;
            match engine.compile(&path.display().to_string(), &source) {
                Ok(template) => {
                    log::info!("{}: ok ({} macros)", path.display(), template.macro_names().len());
                }
                Err(err) => {
                    num_errors += 1;
                    eprintln!("{err}");
                }
            }
        }
        match num_errors {
            0 => Ok(()),
            1 => Err(format!("{}", "Check failure: 1 template has errors".bold())),
            n => Err(format!("{}", format!("Check failure: {n} templates have errors").as_str().bold())),
        }
    }
}

#[derive(Clone, Debug, Parser)]
struct Tokens {
    /// Path to the template.
    path: PathBuf,

    /// Also print text that the lexer skips, such as whitespace inside directives.
    #[arg(short, long)]
    all: bool,
}

impl Tokens {
    fn run(&self) -> Result<(), String> {
        let source = read_source(&self.path)?;
        let tokens = Lexer::tokenize(&source).map_err(|err| err.to_string())?;
        for token in &tokens {
            if self.all {
                if let Some(special) = &token.special {
                    print_token(special, true);
                }
            }
            print_token(token, false);
        }
        Ok(())
    }
}

fn print_token(token: &weft::token::Token, skipped: bool) {
    let position = format!("{}:{}", token.line, token.column);
    let kind = format!("{:?}", token.kind);
    if skipped {
        println!("{:>8} {:<16} {:?}", position.as_str().dimmed(), kind.as_str().dimmed(), token.text);
    } else {
        println!("{:>8} {:<16} {:?}", position, kind.as_str().bright_cyan(), token.text);
    }
}

#[derive(Clone, Debug, Parser)]
struct Tree {
    /// Path to the template.
    path: PathBuf,
}

impl Tree {
    fn run(&self) -> Result<(), String> {
        let source = read_source(&self.path)?;
        let ast = weft::parse::parse(&source).map_err(|err| err.to_string())?;
        print!("{}", ast.dump());
        Ok(())
    }
}

fn read_source(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {err}", path.display()))
}

fn read_config(path: &Path) -> Result<Config, String> {
    let source = read_source(path)?;
    serde_json::from_str(&source)
        .map_err(|err| format!("Invalid configuration in {}: {err}", path.display()))
}

fn read_data(path: &Path) -> Result<MapContext, String> {
    let source = read_source(path)?;
    let json: serde_json::Value = serde_json::from_str(&source)
        .map_err(|err| format!("Invalid JSON in {}: {err}", path.display()))?;
    match json {
        serde_json::Value::Object(object) => {
            let map = weft::value::json_object(object);
            log::debug!("loaded {} variables from {}", map.len(), path.display());
            Ok(MapContext::from(map))
        }
        other => Err(format!(
            "The data in {} must be a JSON object, found {}",
            path.display(),
            Value::from_json(other).map_or("null".to_string(), |v| v.type_name())
        )),
    }
}

/// Split a template path into the directory that serves as the template root and the
///     template name relative to it.
fn split_template_path(path: &Path) -> Result<(PathBuf, String), String> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format!("Invalid template path {}", path.display()))?;
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((root, name.to_string()))
}
