//! `replyline scenarios`: List the built-in demo scenarios.

use replyline_pipeline::SCENARIOS;

pub fn run() {
    println!("Built-in scenarios (run with `replyline run --scenario N`):\n");
    for (index, scenario) in SCENARIOS.iter().enumerate() {
        println!("  [{index}] {} ({})", scenario.description, scenario.name);
        println!("      \"{}\"\n", scenario.text);
    }
}
