//! OpenAPI Specification Generator Binary
//!
//! Prints the ECL OpenAPI specification as JSON to stdout.
//!
//! Usage:
//!   cargo run -p ecl-api --bin generate-openapi --features openapi > openapi.json

use ecl_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI spec: {}", e);
            std::process::exit(1);
        }
    }
}
