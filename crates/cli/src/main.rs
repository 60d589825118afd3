use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use argh::FromArgs;
use mimalloc::MiMalloc;
use nodewire_dotfile::{Dotfile, WeaverConfig};
use nodewire_io::{Listing, Module};
use nodewire_weaver::{WeaverSettings, transform};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// nodewire command line interface
#[derive(Debug, FromArgs)]
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Weave(WeaveOpts),
    Dump(DumpOpts),
}

/// wire marked members of a compiled module
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "weave")]
struct WeaveOpts {
    /// path to an input module
    #[argh(option, short = 'i')]
    input: PathBuf,
    /// path to an output module
    #[argh(option, short = 'o')]
    output: PathBuf,
    /// directory containing a .nodewire file, defaults to the directory of the input
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
    /// print every weaving step
    #[argh(switch, short = 'v')]
    verbose: bool,
    /// class all wired classes derive from
    #[argh(option)]
    root_class: Option<String>,
    /// method that receives the wiring code
    #[argh(option)]
    lifecycle_method: Option<String>,
    /// attribute marking the members to wire
    #[argh(option)]
    marker_attribute: Option<String>,
    /// method of the root class used to look up nodes
    #[argh(option)]
    lookup_method: Option<String>,
    /// class thrown when a node cannot be resolved
    #[argh(option)]
    exception_class: Option<String>,
    /// name of the string type
    #[argh(option)]
    string_type: Option<String>,
    /// name of the generated helper class
    #[argh(option)]
    helper_class: Option<String>,
    /// name of the generated resolution method
    #[argh(option)]
    helper_method: Option<String>,
    /// prefix of the messages thrown by the generated code
    #[argh(option)]
    message_namespace: Option<String>,
}

impl WeaveOpts {
    fn settings(&self, config: WeaverConfig) -> WeaverSettings {
        let mut settings = WeaverSettings::default();
        override_with(&mut settings.root_class, &self.root_class, config.root_class);
        override_with(
            &mut settings.lifecycle_method,
            &self.lifecycle_method,
            config.lifecycle_method,
        );
        override_with(
            &mut settings.marker_attribute,
            &self.marker_attribute,
            config.marker_attribute,
        );
        override_with(
            &mut settings.lookup_method,
            &self.lookup_method,
            config.lookup_method,
        );
        override_with(
            &mut settings.exception_class,
            &self.exception_class,
            config.exception_class,
        );
        override_with(&mut settings.string_type, &self.string_type, config.string_type);
        override_with(&mut settings.helper_class, &self.helper_class, config.helper_class);
        override_with(
            &mut settings.helper_method,
            &self.helper_method,
            config.helper_method,
        );
        override_with(
            &mut settings.message_namespace,
            &self.message_namespace,
            config.message_namespace,
        );
        settings
    }
}

/// print the instructions of every method in a compiled module
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "dump")]
struct DumpOpts {
    /// path to an input module
    #[argh(option, short = 'i')]
    input: PathBuf,
}

fn main() -> anyhow::Result<ExitCode> {
    let args: Args = argh::from_env();

    let level = match &args.command {
        Command::Weave(opts) if opts.verbose => log::LevelFilter::Debug,
        _ => log::LevelFilter::Info,
    };
    let colors = fern::colors::ColoredLevelConfig::default();
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let level = colors.color(record.level());
            out.finish(format_args!("[{}] {}", level, message));
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;

    match args.command {
        Command::Weave(opts) => weave(opts),
        Command::Dump(opts) => dump(opts),
    }
}

fn weave(opts: WeaveOpts) -> anyhow::Result<ExitCode> {
    let config_dir = match &opts.config {
        Some(dir) => dir.clone(),
        None => opts.input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    let dotfile = Dotfile::load_or_default(&config_dir).with_context(|| {
        format!("failed to load the configuration in {}", config_dir.display())
    })?;
    let settings = opts.settings(dotfile.weaver);

    let bytes = read_input(&opts.input)?;
    let mut module = Module::from_bytes(&bytes)
        .with_context(|| format!("failed to decode {}", opts.input.display()))?;

    match transform(&mut module, &settings) {
        Ok(result) => {
            result.diagnostics.dump();
            let output = if result.found_mappings {
                module.to_bytes()?
            } else {
                bytes
            };
            fs::write(&opts.output, output)
                .with_context(|| format!("failed to write {}", opts.output.display()))?;
            log::info!("Weaving successful");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            log::error!("{err}");
            log::info!("Weaving failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn dump(opts: DumpOpts) -> anyhow::Result<ExitCode> {
    let bytes = read_input(&opts.input)?;
    let module = Module::from_bytes(&bytes)
        .with_context(|| format!("failed to decode {}", opts.input.display()))?;

    for (index, method) in module.methods() {
        if method.body().is_empty() {
            continue;
        }
        if let Some(listing) = Listing::new(&module, index) {
            println!("{listing}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn override_with(value: &mut String, flag: &Option<String>, config: Option<String>) {
    if let Some(new) = flag.clone().or(config) {
        *value = new;
    }
}
