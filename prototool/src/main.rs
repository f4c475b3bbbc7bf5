//! The prototool command surface: argument parsing, command dispatch, output
//! formatting, and exit-code policy. Exit 0 means clean, 1 means diagnostic
//! failures were printed, 2 means an operational error stopped the command.

mod commands;
mod output;
mod template;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use prototool_config::Error;

#[derive(Parser)]
#[command(name = "prototool", version, about = "Protobuf developer tooling")]
struct Cli {
    #[command(flatten)]
    globals: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone)]
struct GlobalArgs {
    /// Toolchain cache root; defaults to the platform cache directory.
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    /// Inline configuration, overriding any prototool.yaml/.json on disk.
    #[arg(long, global = true)]
    config_data: Option<String>,

    /// Failure output format.
    #[arg(long, global = true, value_enum, default_value = "default")]
    error_format: ErrorFormat,

    /// Shorthand for --error-format json.
    #[arg(long, global = true)]
    json: bool,

    /// URL template for protoc release archives.
    #[arg(long, global = true)]
    protoc_url: Option<String>,

    /// Use this protoc binary instead of the cached one.
    #[arg(long, global = true)]
    protoc_bin_path: Option<PathBuf>,

    /// Use this well-known-types include directory instead of the cached one.
    #[arg(long, global = true)]
    protoc_wkt_path: Option<PathBuf>,

    /// Log debug detail, including raw protoc stderr.
    #[arg(long, global = true)]
    debug: bool,
}

impl GlobalArgs {
    fn json_output(&self) -> bool {
        self.json || self.error_format == ErrorFormat::Json
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ErrorFormat {
    Default,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Compile, lint, and check formatting in one pass.
    All {
        dir_or_file: Option<PathBuf>,
    },
    /// Compile with protoc and report failures.
    Compile {
        dir_or_file: Option<PathBuf>,
        /// Print the protoc invocation instead of running it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate code with the configured protoc plugins.
    Generate {
        dir_or_file: Option<PathBuf>,
        /// Print the protoc invocation instead of running it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Lint files against the configured rule set.
    Lint {
        dir_or_file: Option<PathBuf>,
        /// List every known linter and exit.
        #[arg(long)]
        list_all_linters: bool,
        /// List the linters in effect for the config and exit.
        #[arg(long)]
        list_linters: bool,
        /// List the known lint groups and exit.
        #[arg(long)]
        list_all_lint_groups: bool,
        /// List the linters in the given group and exit.
        #[arg(long, value_name = "GROUP")]
        list_lint_group: Option<String>,
        /// Diff two lint groups, e.g. uber1,uber2.
        #[arg(long, value_name = "GROUP1,GROUP2")]
        diff_lint_groups: Option<String>,
    },
    /// Print, rewrite, or check the canonical formatting of files.
    Format {
        dir_or_file: Option<PathBuf>,
        /// Apply autofixes (the configured file header) while formatting.
        #[arg(long)]
        fix: bool,
        /// Write formatted files back in place.
        #[arg(long)]
        overwrite: bool,
        /// Print a unified diff of unformatted files.
        #[arg(long)]
        diff_mode: bool,
        /// Report a failure per unformatted file.
        #[arg(long)]
        lint_mode: bool,
    },
    /// Scaffold new .proto files with computed package names.
    Create {
        files: Vec<PathBuf>,
        /// Override the computed package.
        #[arg(long)]
        package: Option<String>,
    },
    /// Print the files a command would operate on.
    Files {
        dir_or_file: Option<PathBuf>,
    },
    /// Backwards-compatibility checks against another revision.
    #[command(subcommand, name = "break")]
    Break(BreakCommand),
    /// Manage the protoc toolchain cache.
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Manage prototool configuration files.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect compiled schemas.
    #[command(subcommand)]
    Inspect(InspectCommand),
    /// Invoke a gRPC method with a dynamically compiled schema.
    Grpc {
        dir_or_file: Option<PathBuf>,
        /// host:port to dial.
        #[arg(long)]
        address: String,
        /// Fully qualified method, package.Service/Method.
        #[arg(long)]
        method: String,
        /// One JSON request message.
        #[arg(long)]
        data: Option<String>,
        /// Read line-delimited JSON request messages from stdin.
        #[arg(long)]
        stdin: bool,
        /// Headers as key:value, repeatable.
        #[arg(long = "headers", value_name = "KEY:VALUE")]
        headers: Vec<String>,
        /// Total call deadline in seconds.
        #[arg(long, default_value_t = 60)]
        call_timeout: u64,
        /// Dial deadline in seconds.
        #[arg(long, default_value_t = 10)]
        connect_timeout: u64,
        /// HTTP/2 keepalive ping interval in seconds.
        #[arg(long)]
        keepalive_time: Option<u64>,
    },
    /// Print version information.
    Version,
}

#[derive(Subcommand)]
enum BreakCommand {
    /// Compare the current schema against a git ref.
    Check {
        dir_or_file: Option<PathBuf>,
        /// Baseline branch.
        #[arg(long, conflicts_with = "git_tag")]
        git_branch: Option<String>,
        /// Baseline tag.
        #[arg(long)]
        git_tag: Option<String>,
        /// Also flag removals of beta packages.
        #[arg(long)]
        include_beta: bool,
        /// Allow stable packages to import beta packages.
        #[arg(long)]
        allow_beta_deps: bool,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Download the configured protoc version into the cache.
    Update {
        dir_or_file: Option<PathBuf>,
    },
    /// Remove the default cache root.
    Delete,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a commented prototool.yaml template.
    Init {
        dir: Option<PathBuf>,
        /// Write the template with every option uncommented.
        #[arg(long)]
        uncomment: bool,
    },
}

#[derive(Subcommand)]
enum InspectCommand {
    /// List packages in the compiled schema.
    Packages {
        dir_or_file: Option<PathBuf>,
    },
    /// List the packages a package depends on.
    PackageDeps {
        dir_or_file: Option<PathBuf>,
        #[arg(long)]
        name: String,
    },
    /// List the packages that import a package.
    PackageImporters {
        dir_or_file: Option<PathBuf>,
        #[arg(long)]
        name: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.globals.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(outcome) => outcome.into(),
        Err(err) => {
            eprintln!("prototool: {err}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<output::Outcome, Error> {
    let context = commands::Context::new(cli.globals.clone())?;
    match cli.command {
        Command::All { dir_or_file } => commands::all(&context, dir_or_file.as_deref()),
        Command::Compile {
            dir_or_file,
            dry_run,
        } => commands::compile(&context, dir_or_file.as_deref(), dry_run),
        Command::Generate {
            dir_or_file,
            dry_run,
        } => commands::generate(&context, dir_or_file.as_deref(), dry_run),
        Command::Lint {
            dir_or_file,
            list_all_linters,
            list_linters,
            list_all_lint_groups,
            list_lint_group,
            diff_lint_groups,
        } => commands::lint(
            &context,
            dir_or_file.as_deref(),
            commands::LintLists {
                list_all_linters,
                list_linters,
                list_all_lint_groups,
                list_lint_group,
                diff_lint_groups,
            },
        ),
        Command::Format {
            dir_or_file,
            fix,
            overwrite,
            diff_mode,
            lint_mode,
        } => commands::format(
            &context,
            dir_or_file.as_deref(),
            commands::FormatMode {
                fix,
                overwrite,
                diff_mode,
                lint_mode,
            },
        ),
        Command::Create { files, package } => {
            commands::create(&context, &files, package.as_deref())
        }
        Command::Files { dir_or_file } => commands::files(&context, dir_or_file.as_deref()),
        Command::Break(BreakCommand::Check {
            dir_or_file,
            git_branch,
            git_tag,
            include_beta,
            allow_beta_deps,
        }) => {
            let git_ref = git_branch.or(git_tag).ok_or_else(|| {
                Error::config_invalid("break check requires --git-branch or --git-tag")
            })?;
            commands::break_check(
                &context,
                dir_or_file.as_deref(),
                &git_ref,
                prototool_check::breaking::BreakOptions {
                    include_beta,
                    allow_beta_deps,
                },
            )
        }
        Command::Cache(CacheCommand::Update { dir_or_file }) => {
            commands::cache_update(&context, dir_or_file.as_deref())
        }
        Command::Cache(CacheCommand::Delete) => commands::cache_delete(&context),
        Command::Config(ConfigCommand::Init { dir, uncomment }) => {
            commands::config_init(&context, dir.as_deref(), uncomment)
        }
        Command::Inspect(InspectCommand::Packages { dir_or_file }) => {
            commands::inspect_packages(&context, dir_or_file.as_deref())
        }
        Command::Inspect(InspectCommand::PackageDeps { dir_or_file, name }) => {
            commands::inspect_package_deps(&context, dir_or_file.as_deref(), &name)
        }
        Command::Inspect(InspectCommand::PackageImporters { dir_or_file, name }) => {
            commands::inspect_package_importers(&context, dir_or_file.as_deref(), &name)
        }
        Command::Grpc {
            dir_or_file,
            address,
            method,
            data,
            stdin,
            headers,
            call_timeout,
            connect_timeout,
            keepalive_time,
        } => {
            let input = match (data, stdin) {
                (Some(data), false) => prototool_grpc::InvokeInput::Data(data),
                (None, true) => prototool_grpc::InvokeInput::Stream(Box::new(
                    std::io::BufReader::new(std::io::stdin()),
                )),
                _ => {
                    return Err(Error::config_invalid(
                        "grpc requires exactly one of --data or --stdin",
                    ))
                }
            };
            commands::grpc(
                &context,
                dir_or_file.as_deref(),
                prototool_grpc::InvokeRequest {
                    address,
                    method,
                    headers: commands::parse_headers(&headers)?,
                    input,
                    call_timeout: Duration::from_secs(call_timeout),
                    connect_timeout: Duration::from_secs(connect_timeout),
                    keepalive: keepalive_time.map(Duration::from_secs),
                },
            )
        }
        Command::Version => commands::version(),
    }
}
