use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use securetf::{
    pipeline::{DEFAULT_KEY_PATH, DEFAULT_PUBKEY_PATH},
    policy::DEFAULT_POLICY_PATH,
    provenance::DEFAULT_ATTESTATION_TYPE,
    toolcheck, AttestRequest, Outcome, Pipeline, SystemExecutor, Toolchain, VerifyRequest,
};
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::EnvFilter;

const WORKTREE_DIRTY_MSG: &str = "Verification failed: git worktree is not clean.";

#[derive(Parser)]
#[command(
    name = "securetf",
    about = "Secure Terraform enforcement using Sigstore DSSE attestations.",
    version
)]
struct Cli {
    /// Path to policy.yml
    #[arg(long, global = true, default_value = DEFAULT_POLICY_PATH)]
    policy: PathBuf,

    /// Log every external command to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    tools: ToolArgs,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args)]
struct ToolArgs {
    /// git binary
    #[arg(long = "git-bin", env = "SECURETF_GIT", default_value = "git", global = true)]
    git: String,

    /// cosign binary
    #[arg(
        long = "cosign-bin",
        env = "SECURETF_COSIGN",
        default_value = "cosign",
        global = true
    )]
    cosign: String,

    /// terraform binary
    #[arg(
        long = "terraform-bin",
        env = "SECURETF_TERRAFORM",
        default_value = "terraform",
        global = true
    )]
    terraform: String,
}

impl From<ToolArgs> for Toolchain {
    fn from(a: ToolArgs) -> Self {
        Self {
            git: a.git,
            cosign: a.cosign,
            terraform: a.terraform,
        }
    }
}

#[derive(Args)]
struct GateArgs {
    /// Path to Terraform file (default from policy)
    artifact: Option<String>,

    /// Cosign public key path
    #[arg(long, default_value = DEFAULT_PUBKEY_PATH)]
    pubkey: String,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a DSSE attestation bundle for a Terraform artifact
    Attest {
        /// Path to Terraform file (default from policy)
        artifact: Option<String>,

        /// Cosign private key path
        #[arg(long, default_value = DEFAULT_KEY_PATH)]
        key: String,

        /// Predicate JSON file. If omitted, a default one is generated
        #[arg(long)]
        predicate: Option<String>,

        /// Attestation type
        #[arg(long = "type", default_value = DEFAULT_ATTESTATION_TYPE)]
        attestation_type: String,
    },

    /// Verify the DSSE attestation for a Terraform artifact
    Verify(GateArgs),

    /// Verify the attestation, then run terraform plan/apply according to policy
    Apply(GateArgs),

    /// Check that git, cosign and terraform can be launched
    Doctor,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("warning: {e}");
    }
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("initialising logging: {e}"))
}

fn run(cli: Cli) -> Result<ExitCode> {
    let tools = Toolchain::from(cli.tools);
    let pipeline = Pipeline::new(SystemExecutor, tools.clone(), ".");

    match cli.cmd {
        Cmd::Attest {
            artifact,
            key,
            predicate,
            attestation_type,
        } => {
            let report = pipeline.attest(&AttestRequest {
                policy: cli.policy,
                artifact,
                key,
                predicate,
                attestation_type,
            })?;
            println!("Attestation created for: {}", report.artifact);
            println!("Predicate file: {}", report.predicate);
            println!("Bundle file: {}", report.bundle);
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Verify(args) => {
            let outcome = pipeline.verify(&gate_request(cli.policy, args))?;
            report_gate(outcome);
            Ok(ExitCode::from(outcome.exit_code()))
        }
        Cmd::Apply(args) => {
            let report = pipeline.apply(&gate_request(cli.policy, args))?;
            report_gate(report.outcome);
            if report.planned {
                println!("Terraform plan complete.");
            }
            if report.applied {
                println!("Terraform apply complete.");
            }
            Ok(ExitCode::from(report.outcome.exit_code()))
        }
        Cmd::Doctor => {
            let found = toolcheck::detect_tools(&tools);
            for (name, ok) in [
                (&tools.git, found.git),
                (&tools.cosign, found.cosign),
                (&tools.terraform, found.terraform),
            ] {
                if ok {
                    println!("✓ {name}");
                }
            }
            for line in found.missing_tools_report() {
                eprintln!("✗ {line}");
            }
            Ok(if found.all_available() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn gate_request(policy: PathBuf, args: GateArgs) -> VerifyRequest {
    VerifyRequest {
        policy,
        artifact: args.artifact,
        pubkey: args.pubkey,
    }
}

fn report_gate(outcome: Outcome) {
    match outcome {
        Outcome::Verified => println!("Verification OK."),
        Outcome::WorktreeDirty => eprintln!("{WORKTREE_DIRTY_MSG}"),
    }
}
