//! List available personas.

use hearth_config::{default_persona_id, list_personas};

pub fn run() -> anyhow::Result<()> {
    let config = super::load_config()?;
    let personas = list_personas(&config.personas_dir, false);
    if personas.is_empty() {
        println!(
            "No personas found in {}",
            config.personas_dir.display()
        );
        return Ok(());
    }

    let default = default_persona_id(&config.personas_dir);
    for persona in personas {
        let marker = if persona.id == default { "*" } else { " " };
        let visibility = if persona.public { "public" } else { "private" };
        println!("{marker} {:<20} {:<24} {visibility}", persona.id, persona.name);
    }
    println!("\n* default persona");
    Ok(())
}
