use crate::cli::GlobalArgs;
use crate::error::Result;
use crate::settings::{save_settings, Settings};

pub fn run(global: &GlobalArgs, force: bool) -> Result<()> {
    let path = &global.config;
    if path.exists() && !force {
        println!("Keeping existing config at {}", path.display());
    } else {
        save_settings(path, &Settings::default())?;
        println!("Wrote {}", path.display());
    }

    // Directory flags and environment still apply to the layout we create.
    let ws = global.load_settings()?.workspace();
    ws.ensure_dirs()?;
    std::fs::create_dir_all(&ws.input_dir)?;
    println!("Snapshots in {}", ws.snapshot_dir.display());
    println!("Exports in   {}", ws.output_dir.display());
    Ok(())
}
