//! Inspect or clear persona memory.

use clap::Subcommand;
use hearth_gateway::store_limits;
use hearth_memory::MemoryStore;

#[derive(Subcommand)]
pub enum MemoryCommand {
    /// Print a persona's conversation memory
    Show {
        /// Persona id (defaults to the first available persona)
        #[arg(short, long)]
        persona: Option<String>,
    },

    /// Delete all of a persona's memory and generated images
    Clear {
        /// Persona id (defaults to the first available persona)
        #[arg(short, long)]
        persona: Option<String>,
    },
}

pub async fn run(command: MemoryCommand) -> anyhow::Result<()> {
    let config = super::load_config()?;
    match command {
        MemoryCommand::Show { persona } => {
            let persona = super::resolve_persona(&config, persona.as_deref())?;
            let store = MemoryStore::new(
                &persona.memory_path,
                &config.personas_dir,
                store_limits(&config),
            );
            let entries = store.load_all().await?;
            if entries.is_empty() {
                println!("No memory for {}", persona.id);
                return Ok(());
            }
            for entry in entries {
                println!("[{}] {}: {}", entry.timestamp, entry.speaker(), entry.content);
            }
        }
        MemoryCommand::Clear { persona } => {
            let persona = super::resolve_persona(&config, persona.as_deref())?;
            let store = MemoryStore::new(
                &persona.memory_path,
                &config.personas_dir,
                store_limits(&config),
            );
            store.clear().await?;
            println!("Cleared memory for {}", persona.id);
        }
    }
    Ok(())
}
