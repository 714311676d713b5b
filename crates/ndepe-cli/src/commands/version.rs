use ndepe_core::version::{version_string, SCHEMA_VERSION, VERSION};
use miette::Result;
use serde_json::json;

pub fn run(json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            json!({ "version": VERSION, "schema_version": SCHEMA_VERSION })
        );
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
