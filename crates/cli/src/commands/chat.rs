//! Interactive and single-message chat.

use anyhow::Context;
use hearth_agent::{TurnRequest, TurnRunner};
use hearth_core::{Persona, TurnEvent};
use hearth_gateway::AppState;
use std::io::Write;

pub async fn run(message: Option<String>, persona_id: Option<String>) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let persona = super::resolve_persona(&config, persona_id.as_deref())?;
    let state = AppState::from_config(config);

    match message {
        Some(message) => run_turn(&state.runner, persona, message).await,
        None => interactive(&state.runner, persona).await,
    }
}

async fn interactive(runner: &TurnRunner, persona: Persona) -> anyhow::Result<()> {
    println!("Chatting with {} (empty line or \"exit\" to quit)", persona.name);
    loop {
        print!("> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;
        let mut line = String::new();
        let read = std::io::stdin()
            .read_line(&mut line)
            .context("Failed to read stdin")?;
        let message = line.trim();
        if read == 0 || message.is_empty() || message == "exit" || message == "quit" {
            return Ok(());
        }
        run_turn(runner, persona.clone(), message.to_string()).await?;
    }
}

async fn run_turn(runner: &TurnRunner, persona: Persona, message: String) -> anyhow::Result<()> {
    let mut rx = runner.stream(persona, TurnRequest::question(message));
    let mut printed_tokens = false;
    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::Searching => eprintln!("Searching the web..."),
            TurnEvent::Thinking { .. } => {}
            TurnEvent::Token { content } => {
                printed_tokens = true;
                print!("{content}");
                std::io::stdout().flush().context("Failed to flush stdout")?;
            }
            TurnEvent::Done {
                sources,
                final_text,
                error,
                image_generating,
                ..
            } => {
                if printed_tokens {
                    println!();
                } else if let Some(text) = final_text {
                    println!("{text}");
                }
                if let Some(error) = error {
                    eprintln!("Error: {error}");
                }
                if image_generating {
                    println!("(image generation continues in the background)");
                }
                if !sources.is_empty() {
                    println!("\nWeb sources:");
                    for url in sources {
                        println!("  {url}");
                    }
                }
            }
        }
    }
    Ok(())
}
