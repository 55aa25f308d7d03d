/*
 * Responsibility
 * - tokio runtime startup
 * - Calls app::run() (no logic here)
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    token_gate::app::run().await
}
