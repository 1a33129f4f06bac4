use anyhow::Result;
use moodle_gateway::RenderedResponse;

pub mod call;
pub mod check;
pub mod init;
pub mod tool;
pub mod tools;

/// Print the body, then turn a failure diagnostic into a non-zero exit.
pub fn emit(response: &RenderedResponse) -> Result<()> {
    println!("{}", response.body);
    if response.failed {
        anyhow::bail!("Backend call failed");
    }
    Ok(())
}
