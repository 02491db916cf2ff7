//! docsmith CLI — template-driven document processing with a chat model.
//!
//! Reads every document in `doc/`, merges it with the template, background
//! knowledge and rolling context summary, and writes the model's output to
//! `result/`.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
