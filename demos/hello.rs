//! Smallest useful server: the default stack plus nothing else.
//!
//! ```text
//! cargo run --example hello
//! curl -i localhost:8080/health
//! ```

use scopeline::{App, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app = App::from_settings(Settings::default())?.with_defaults()?;
    app.run().await?;
    Ok(())
}
