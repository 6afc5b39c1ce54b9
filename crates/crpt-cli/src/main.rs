#![deny(warnings)]
#![deny(clippy::all)]

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crpt_core::crypto::BLOCK_LEN;
use crpt_core::{resolve_unique_path, CrptError};
use crpt_format::{
    decrypt_file, encrypt_file, read_header, FormatError, Observer, RenameNotice,
    CONTAINER_EXTENSION,
};
use indicatif::{ProgressBar, ProgressStyle};
use rpassword::prompt_password;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

const EXIT_SUCCESS: i32 = 0;
const EXIT_USAGE: i32 = 2;
const EXIT_FORMAT: i32 = 3;
const EXIT_IO: i32 = 4;
const EXIT_DECRYPT: i32 = 5;
const EXIT_CANCELLED: i32 = 130;

const PASSWORD_ENV: &str = "CRPT_PASSWORD";
const PASSWORD_CONFIRM_ENV: &str = "CRPT_PASSWORD_CONFIRM";
const DECRYPTED_SUFFIX: &str = "_decrypted";

#[derive(Parser, Debug)]
#[command(name = "crpt", version, about = "Password-based AES-256-CBC file encryption")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file into a .crpt container
    Enc {
        input: PathBuf,
        /// Container path; defaults to the input with a .crpt extension
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Decrypt a .crpt container, restoring the original extension
    Dec {
        input: PathBuf,
        /// Output path without extension; the stored extension is appended
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print the header of a container
    Inspect { path: PathBuf },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Do not draw a progress bar
    #[arg(long)]
    quiet: bool,
    /// Cancel the operation after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Format(#[from] FormatError),
    #[error("{0}")]
    Core(#[from] CrptError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Usage(String),
}

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
        }
    };

    let result = match cli.command {
        Commands::Enc { input, output, run } => cmd_enc(&input, output, &run),
        Commands::Dec { input, output, run } => cmd_dec(&input, output, &run),
        Commands::Inspect { path } => cmd_inspect(&path),
    };

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            report_error(&err);
            map_exit_code(&err)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn report_error(err: &CliError) {
    error!(error = %err, "command failed");
    eprintln!("error: {err}");
}

fn map_exit_code(err: &CliError) -> i32 {
    match err {
        CliError::Usage(_) => EXIT_USAGE,
        CliError::Io(_) | CliError::Core(_) => EXIT_IO,
        CliError::Format(FormatError::Io(_)) | CliError::Format(FormatError::Core(_)) => EXIT_IO,
        CliError::Format(FormatError::DecryptionFailed) => EXIT_DECRYPT,
        CliError::Format(FormatError::Cancelled) => EXIT_CANCELLED,
        CliError::Format(_) => EXIT_FORMAT,
    }
}

/// Progress, deadline and cleanup bookkeeping for one enc/dec run.
struct OperationState {
    started: Instant,
    deadline: Option<Instant>,
    bar: ProgressBar,
    output: Option<PathBuf>,
}

impl OperationState {
    fn new(total: u64, run: &RunArgs) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: run.timeout.map(|secs| started + Duration::from_secs(secs)),
            bar: make_progress_bar(total, run.quiet),
            output: None,
        }
    }

    fn succeed(self) {
        self.bar.finish_and_clear();
        info!(
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "operation finished"
        );
    }

    /// Removes whatever the failed operation managed to write.
    fn fail(mut self) {
        self.bar.abandon();
        if let Some(path) = self.output.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => info!(path = %path.display(), "removed partial output"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => error!(path = %path.display(), error = %err, "could not remove partial output"),
            }
        }
    }
}

impl Observer for OperationState {
    fn report(&mut self, fraction: f64) {
        let total = self.bar.length().unwrap_or(0);
        self.bar.set_position((fraction * total as f64).round() as u64);
    }

    fn is_cancelled(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn renamed(&mut self, notice: &RenameNotice) {
        self.bar.suspend(|| eprintln!("{notice}"));
    }

    fn output_opened(&mut self, path: &Path) {
        self.output = Some(path.to_path_buf());
    }
}

fn make_progress_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner} [{bar:40}] {percent:>3}% {bytes}/{total_bytes} eta {eta}",
    )
    .map(|style| style.progress_chars("=>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

fn has_container_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION))
}

/// `dir/report.crpt` -> `dir/report`; anything else -> `dir/<name>_decrypted`.
fn default_decrypt_base(input: &Path) -> PathBuf {
    if has_container_extension(input) {
        return input.with_extension("");
    }
    let mut name = input.file_name().unwrap_or_default().to_os_string();
    name.push(DECRYPTED_SUFFIX);
    input.with_file_name(name)
}

fn read_password(confirm: bool) -> Result<Zeroizing<String>, CliError> {
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => {
            let password = Zeroizing::new(password);
            if confirm {
                if let Ok(confirm_pw) = std::env::var(PASSWORD_CONFIRM_ENV) {
                    if confirm_pw != *password {
                        return Err(CliError::Usage("passwords do not match".to_string()));
                    }
                }
            }
            password
        }
        Err(_) => {
            let password = Zeroizing::new(prompt_password("Enter password: ")?);
            if confirm {
                let confirm_pw = Zeroizing::new(prompt_password("Confirm password: ")?);
                if password.as_str() != confirm_pw.as_str() {
                    return Err(CliError::Usage("passwords do not match".to_string()));
                }
            }
            password
        }
    };

    if password.trim().is_empty() {
        return Err(CliError::Usage("password must not be empty".to_string()));
    }
    Ok(password)
}

fn cmd_enc(input: &Path, output: Option<PathBuf>, run: &RunArgs) -> Result<(), CliError> {
    if has_container_extension(input) {
        return Err(CliError::Usage(format!(
            "{} is already a .{CONTAINER_EXTENSION} container",
            input.display()
        )));
    }

    let requested = output.unwrap_or_else(|| input.with_extension(CONTAINER_EXTENSION));
    let output = resolve_unique_path(&requested)?;
    if output != requested {
        eprintln!(
            "{}",
            RenameNotice {
                requested,
                resolved: output.clone(),
            }
        );
    }

    let total = std::fs::metadata(input)?.len();
    let password = read_password(true)?;

    info!(
        input = %input.display(),
        output = %output.display(),
        "encrypting file"
    );

    let mut state = OperationState::new(total, run);
    match encrypt_file(input, &output, password.as_str(), &mut state) {
        Ok(_) => {
            state.succeed();
            println!("{}", output.display());
            Ok(())
        }
        Err(err) => {
            state.fail();
            Err(err.into())
        }
    }
}

fn cmd_dec(input: &Path, output: Option<PathBuf>, run: &RunArgs) -> Result<(), CliError> {
    let base = output.unwrap_or_else(|| default_decrypt_base(input));
    let total = std::fs::metadata(input)?.len();
    let password = read_password(false)?;

    info!(
        input = %input.display(),
        base = %base.display(),
        "decrypting file"
    );

    let mut state = OperationState::new(total, run);
    match decrypt_file(input, &base, password.as_str(), &mut state) {
        Ok(written) => {
            state.succeed();
            println!("{}", written.display());
            Ok(())
        }
        Err(err) => {
            state.fail();
            Err(err.into())
        }
    }
}

fn cmd_inspect(path: &Path) -> Result<(), CliError> {
    info!(path = %path.display(), "reading container");

    let mut file = File::open(path)?;
    let container_len = file.metadata()?.len();
    let (header, header_len) = read_header(&mut file)?;
    let ciphertext_len = container_len.saturating_sub(header_len);

    println!("crpt container");
    println!("  Path: {}", path.display());
    if header.extension.is_empty() {
        println!("  Extension: (none)");
    } else {
        println!("  Extension: {}", header.extension);
    }
    println!("  IV: {}", hex::encode(header.iv));
    println!("  Header length: {header_len} bytes");
    println!("  Ciphertext length: {ciphertext_len} bytes");
    println!(
        "  Block aligned: {}",
        if ciphertext_len > 0 && ciphertext_len % BLOCK_LEN as u64 == 0 {
            "yes"
        } else {
            "no"
        }
    );

    Ok(())
}
