//! OpenAPI Specification Generator Binary
//!
//! Prints the Canto OpenAPI document as JSON to stdout.
//!
//! Usage:
//!   cargo run -p canto-api --bin generate-openapi --features openapi > openapi.json

use canto_api::ApiDoc;
use utoipa::OpenApi;

fn main() {
    let spec = ApiDoc::openapi();

    match serde_json::to_string_pretty(&spec) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
