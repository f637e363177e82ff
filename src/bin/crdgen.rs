//! # CRD Generator
//!
//! Prints the CustomResourceDefinition YAML of the operator's kinds.
//!
//! ## Usage
//!
//! ```bash
//! # All CRDs
//! cargo run --bin crdgen > config/crd/all.yaml
//!
//! # One kind, applied directly
//! cargo run --bin crdgen -- model | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kube::CustomResourceExt;
use llm_operator::crd::{all_crds, to_yaml, Llm, Model, Prompt, Worker};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    All,
    Llm,
    Model,
    Prompt,
    Worker,
}

/// Print LLM operator CRDs as YAML
#[derive(Debug, Parser)]
#[command(name = "crdgen", about = "Print LLM operator CRDs as YAML", long_about = None)]
struct Cli {
    /// Kind to print
    #[arg(value_enum, default_value_t = Kind::All)]
    kind: Kind,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let crds = match cli.kind {
        Kind::All => all_crds(),
        Kind::Llm => vec![Llm::crd()],
        Kind::Model => vec![Model::crd()],
        Kind::Prompt => vec![Prompt::crd()],
        Kind::Worker => vec![Worker::crd()],
    };

    let yaml = to_yaml(&crds).context("Failed to serialize CRD to YAML")?;
    print!("{yaml}");
    Ok(())
}
