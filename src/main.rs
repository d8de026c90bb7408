use anyhow::Context;
use class_slots::{SchedulingInput, schedule_input};
use log::error;
use std::io::Read;

fn read_input() -> anyhow::Result<String> {
    let mut raw = String::new();
    match std::env::args().nth(1) {
        Some(path) if path != "-" => {
            raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        }
        _ => {
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("reading standard input")?;
        }
    }
    Ok(raw)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let input: SchedulingInput =
        serde_json::from_str(&read_input()?).context("parsing scheduling input")?;

    let result = match schedule_input(&input) {
        Ok(result) => result,
        Err(e) => {
            for issue in e.input_errors() {
                error!("{issue}");
            }
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
