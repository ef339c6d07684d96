//! Command-line argument parsing and processing.
//!
//! Parsing never fails: anything unrecognized is reported and turned into
//! [`CliAction::ShowHelpDueToError`]. `--help` and `--version` win over any
//! subcommand, with version taking precedence over help.

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the daemon against the real display
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Drive the engine with accelerated time against in-memory monitors
    Simulate {
        debug_enabled: bool,
        start_time: String,
        end_time: String,
        /// 0 = fast-forward
        multiplier: f64,
        monitors: u32,
        json: bool,
        log_to_file: bool,
        config_dir: Option<String>,
    },
    /// Print the solar schedule for one date
    Solar {
        debug_enabled: bool,
        date: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
        config_dir: Option<String>,
    },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

pub const DEFAULT_SIMULATION_MULTIPLIER: f64 = 3600.0;
pub const DEFAULT_SIMULATION_MONITORS: u32 = 2;
const MAXIMUM_SIMULATION_MONITORS: u32 = 8;

/// Basic "YYYY-MM-DD HH:MM:SS" shape check; full parsing happens in the command.
fn looks_like_datetime(s: &str) -> bool {
    s.len() == 19
        && s.chars().nth(4) == Some('-')
        && s.chars().nth(7) == Some('-')
        && s.chars().nth(10) == Some(' ')
        && s.chars().nth(13) == Some(':')
        && s.chars().nth(16) == Some(':')
}

fn looks_like_date(s: &str) -> bool {
    s.len() == 10 && s.chars().nth(4) == Some('-') && s.chars().nth(7) == Some('-')
}

/// Cursor over the arguments following a subcommand.
struct Options<'a> {
    args: &'a [String],
    idx: usize,
    failed: bool,
}

impl<'a> Options<'a> {
    fn new(args: &'a [String]) -> Self {
        Self {
            args,
            idx: 0,
            failed: false,
        }
    }

    fn next_flag(&mut self) -> Option<&'a str> {
        let arg = self.args.get(self.idx)?;
        self.idx += 1;
        Some(arg.as_str())
    }

    /// Value following `flag`, or a logged failure if it is missing.
    fn value(&mut self, flag: &str, usage: &str) -> Option<&'a str> {
        match self.args.get(self.idx) {
            Some(value) if !value.starts_with("--") => {
                self.idx += 1;
                Some(value.as_str())
            }
            _ => {
                log_warning!("Missing value for {flag}. Usage: {flag} {usage}");
                self.failed = true;
                None
            }
        }
    }

    fn parsed<T: std::str::FromStr>(&mut self, flag: &str, usage: &str) -> Option<T> {
        let raw = self.value(flag, usage)?;
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                log_warning!("Invalid value for {flag}: {raw}");
                self.failed = true;
                None
            }
        }
    }
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// # Arguments
    /// * `args` - Iterator over command-line arguments (typically from std::env::args())
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // Convert to vector for easier indexed access
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        // Version and help take precedence wherever they appear
        if args_vec
            .iter()
            .any(|arg| arg == "--version" || arg == "-V" || arg == "-v")
        {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if args_vec.iter().any(|arg| arg == "--help" || arg == "-h") {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        // Global flags first, then at most one subcommand and its options
        let mut debug_enabled = false;
        let mut config_dir: Option<String> = None;
        let mut command: Option<String> = None;
        let mut rest: Vec<String> = Vec::new();
        let mut unknown_arg_found = false;

        let mut i = 0;
        while i < args_vec.len() {
            let arg = &args_vec[i];
            match arg.as_str() {
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => {
                    // Parse: --config <directory>
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        config_dir = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing directory for --config. Usage: --config <directory>");
                        unknown_arg_found = true;
                    }
                }
                _ if command.is_some() => rest.push(arg.clone()),
                _ if arg.starts_with('-') => {
                    log_warning!("Unknown option: {arg}");
                    unknown_arg_found = true;
                }
                _ => command = Some(arg.clone()),
            }
            i += 1;
        }

        if unknown_arg_found {
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }

        let action = match command.as_deref() {
            None | Some("run") => {
                if let Some(extra) = rest.first() {
                    log_warning!("Unexpected argument for run: {extra}");
                    CliAction::ShowHelpDueToError
                } else {
                    CliAction::Run {
                        debug_enabled,
                        config_dir,
                    }
                }
            }
            Some("help") => CliAction::ShowHelp,
            Some("simulate") => parse_simulate(&rest, debug_enabled, config_dir),
            Some("solar") => parse_solar(&rest, debug_enabled, config_dir),
            Some(unknown) => {
                log_warning!("Unknown command: {unknown}");
                CliAction::ShowHelpDueToError
            }
        };

        ParsedArgs { action }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn parse_simulate(args: &[String], debug_enabled: bool, config_dir: Option<String>) -> CliAction {
    let mut options = Options::new(args);
    let mut start_time = None;
    let mut end_time = None;
    let mut multiplier = DEFAULT_SIMULATION_MULTIPLIER;
    let mut monitors = DEFAULT_SIMULATION_MONITORS;
    let mut json = false;
    let mut log_to_file = false;

    while let Some(flag) = options.next_flag() {
        match flag {
            "--from" => {
                start_time = options.value(flag, "\"YYYY-MM-DD HH:MM:SS\"").map(String::from)
            }
            "--to" => end_time = options.value(flag, "\"YYYY-MM-DD HH:MM:SS\"").map(String::from),
            "--multiplier" => {
                if let Some(value) = options.parsed::<f64>(flag, "<factor>") {
                    // 0 selects fast-forward
                    if value == 0.0 || (0.1..=3600.0).contains(&value) {
                        multiplier = value;
                    } else {
                        log_error!("Invalid multiplier: {value}. Must be 0 or between 0.1 and 3600.");
                        options.failed = true;
                    }
                }
            }
            "--fast-forward" => multiplier = 0.0,
            "--monitors" => {
                if let Some(value) = options.parsed::<u32>(flag, "<count>") {
                    if (1..=MAXIMUM_SIMULATION_MONITORS).contains(&value) {
                        monitors = value;
                    } else {
                        log_error!(
                            "Invalid monitor count: {value}. Must be between 1 and {MAXIMUM_SIMULATION_MONITORS}."
                        );
                        options.failed = true;
                    }
                }
            }
            "--json" => json = true,
            "--log" => log_to_file = true,
            other => {
                log_warning!("Unknown option for simulate: {other}");
                options.failed = true;
            }
        }
    }

    if options.failed {
        return CliAction::ShowHelpDueToError;
    }

    match (start_time, end_time) {
        (Some(start), Some(end)) => {
            for (label, value) in [("start", &start), ("end", &end)] {
                if !looks_like_datetime(value) {
                    log_error!("Invalid {label} time format: '{value}'. Use YYYY-MM-DD HH:MM:SS");
                    return CliAction::ShowHelpDueToError;
                }
            }
            CliAction::Simulate {
                debug_enabled,
                start_time: start,
                end_time: end,
                multiplier,
                monitors,
                json,
                log_to_file,
                config_dir,
            }
        }
        _ => {
            log_warning!(
                "Missing --from or --to. Usage: duskshift simulate --from \"YYYY-MM-DD HH:MM:SS\" --to \"YYYY-MM-DD HH:MM:SS\""
            );
            CliAction::ShowHelpDueToError
        }
    }
}

fn parse_solar(args: &[String], debug_enabled: bool, config_dir: Option<String>) -> CliAction {
    let mut options = Options::new(args);
    let mut date = None;
    let mut latitude = None;
    let mut longitude = None;

    while let Some(flag) = options.next_flag() {
        match flag {
            "--date" => {
                if let Some(value) = options.value(flag, "YYYY-MM-DD") {
                    if looks_like_date(value) {
                        date = Some(value.to_string());
                    } else {
                        log_error!("Invalid date format: '{value}'. Use YYYY-MM-DD");
                        options.failed = true;
                    }
                }
            }
            // Negative coordinates start with '-', so values are taken as-is
            "--lat" => latitude = options.parsed::<f64>(flag, "<degrees>"),
            "--lon" => longitude = options.parsed::<f64>(flag, "<degrees>"),
            other => {
                log_warning!("Unknown option for solar: {other}");
                options.failed = true;
            }
        }
    }

    if options.failed {
        return CliAction::ShowHelpDueToError;
    }

    if latitude.is_some() != longitude.is_some() {
        log_warning!("--lat and --lon must be given together");
        return CliAction::ShowHelpDueToError;
    }

    CliAction::Solar {
        debug_enabled,
        date,
        latitude,
        longitude,
        config_dir,
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("duskshift [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("run                    Follow the sun on every monitor (default)");
    log_indented!("simulate               Run with accelerated time on simulated monitors");
    log_indented!("  --from <datetime>    Start, \"YYYY-MM-DD HH:MM:SS\" local to the location");
    log_indented!("  --to <datetime>      End, same format");
    log_indented!("  --multiplier <n>     Time acceleration (default 3600, 0 = fast-forward)");
    log_indented!("  --monitors <n>       Simulated monitor count (default 2)");
    log_indented!("  --json               Print diagnostics as JSON when done");
    log_indented!("  --log                Write output to a log file");
    log_indented!("solar                  Print sunrise, solar noon and sunset");
    log_indented!("  --date <YYYY-MM-DD>  Date to compute (default today)");
    log_indented!("  --lat <deg> --lon <deg>  Coordinates (default from config)");
    log_indented!("help                   Print this message");
    log_end!();
}
