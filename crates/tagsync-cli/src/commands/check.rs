use anyhow::Result;

use super::QueryFiles;

/// Execute the `check` command: parse and validate both query files.
pub fn execute(files: &QueryFiles) -> Result<()> {
    let tags = files.load_tags()?;
    if tags.is_empty() {
        println!("Tag queries:       NONE (tag sync will be skipped)");
    } else {
        println!("Tag queries:       OK ({})", tags.len());
    }
    for query in &tags {
        let resync = if query.continuous_resync { "on" } else { "off" };
        println!(
            "  {:24} identity {}  initial marker '{}'  continuous resync {}",
            query.name,
            query.identity(),
            query.initial_sync_marker,
            resync
        );
    }

    match files.load_activity_type()? {
        Some(query) => {
            println!("Activity types:    OK ({} strategy)", query.strategy());
            println!("  identity {}", query.identity());
        }
        None if files.activity_types.is_some() => {
            println!("Activity types:    NONE (activity type sync will be skipped)");
        }
        None => println!("Activity types:    not configured"),
    }

    println!("\nAll checks passed.");
    Ok(())
}
