mod command_controller;
mod commands;
mod config;
mod controller;
mod dialog;
mod document;
mod edit_commands;
mod editor;
mod key_handler;
mod node;
mod paste_handler;
mod position;
mod schema;
mod selection;
mod serialize;
mod table_commands;
mod transaction;
mod undo;
mod view;

use clap::Parser;
use config::RcLoader;
use controller::Controller;
use std::path::PathBuf;

/// Block-structured report document editor.
#[derive(Parser)]
#[command(name = "blockpad", version, about)]
struct Args {
    /// Document to open (JSON tree); created on first :w when missing
    file: Option<PathBuf>,

    /// Open read-only: editing commands are ignored
    #[arg(long)]
    readonly: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = RcLoader::load_config();
    let mut controller = Controller::new(config, args.file, args.readonly)?;
    controller.run()
}
