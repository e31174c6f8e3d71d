//! `toolpilot tools` — Show the tools the model is offered.

use toolpilot_config::AppConfig;

pub fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = toolpilot_tools::default_registry(&config.tools)?;

    println!();
    println!("  {} tools registered", registry.len());
    for def in registry.definitions() {
        println!();
        println!("  {}", def.name);
        println!("    {}", def.description);
        let schema = serde_json::to_string_pretty(&def.parameters)?;
        for line in schema.lines() {
            println!("    {line}");
        }
    }
    println!();
    Ok(())
}
