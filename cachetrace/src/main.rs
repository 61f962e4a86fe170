use std::collections::HashMap;
use std::env;
use std::error::Error;

use cachetrace_core::{Cache, STORE_OPERATION, Settings, Value, replay};
use tracing::{error, info};

mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

/// Integers and floats are stored as numbers, anything else as text.
fn parse_value(arg: &str) -> Value {
    if let Ok(i) = arg.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = arg.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Str(arg.to_owned())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let vars: HashMap<String, String> = env::vars().collect();
    let settings: Settings = vars.try_into()?;
    info!(?settings, "Starting with settings");

    let cache = Cache::connect(&settings).await;

    // logs go to stderr, keys and the replay go to stdout
    for arg in env::args().skip(1) {
        let key = cache.store(parse_value(&arg)).await;
        println!("{key}");
    }

    replay(&cache, STORE_OPERATION).await;
    Ok(())
}
