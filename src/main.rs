use log::info;

use notedesk::{Config, Workspace};

pub fn initialize_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

fn main() {
    initialize_logger();

    info!("Application starting up");

    let config = Config::default();
    match Workspace::open(&config) {
        Ok(workspace) => {
            println!(
                "Workspace at {}: {} root folders, {} notes, {} tags",
                config.database_path().display(),
                workspace.folders.roots().len(),
                workspace.notes.notes().len(),
                workspace.tags.tags().len()
            );
        }
        Err(e) => {
            // The store must be openable for the app to function at all.
            eprintln!("Failed to open workspace: {e}");
            std::process::exit(1);
        }
    }

    info!("Application shutting down");
}
