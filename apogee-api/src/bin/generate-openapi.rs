//! OpenAPI Specification Generator Binary
//!
//! Generates the APOGEE OpenAPI specification as JSON to stdout.
//!
//! Usage:
//!   cargo run -p apogee-api --bin generate-openapi --features openapi > openapi.json

use apogee_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
