/// `stowage key` command implementation
///
/// Prints the exact key and fallbacks that `run` would use for the same
/// components.
use anyhow::Result;
use serde_json::json;

use stowage::cache::{escape_component, CacheKey, KeyBuilder};

use crate::cli::KeyArgs;

pub fn run(args: &KeyArgs) -> Result<()> {
    let key = derive(&args.components)?;

    if args.json {
        let value = json!({
            "exact": key.exact,
            "fallbacks": key.fallbacks,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", key.exact);
        for fallback in key.fallbacks.iter().rev() {
            println!("{}", fallback);
        }
    }

    Ok(())
}

/// Free-form components made safe to join
pub(crate) fn escaped(components: &[String]) -> Vec<String> {
    components.iter().map(|c| escape_component(c)).collect()
}

fn derive(components: &[String]) -> Result<CacheKey> {
    Ok(KeyBuilder::build_strict(&escaped(components))?)
}
