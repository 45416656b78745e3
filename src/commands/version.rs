use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("espmon version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
