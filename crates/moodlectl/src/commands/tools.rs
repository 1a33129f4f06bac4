use anyhow::Result;

/// List catalog tools with their inputs.
pub fn execute() -> Result<()> {
    let registry = moodle_tools::default_registry()?;
    for spec in registry.specs() {
        let marker = if spec.mutating { " [write]" } else { "" };
        println!("{}{}\n  {}", spec.name, marker, spec.description);
        for param in spec.params {
            let required = if param.required { "required" } else { "optional" };
            println!("    {} ({}): {}", param.name, required, param.description);
        }
        if spec.pagination {
            println!("    offset, limit (optional): paging window");
        }
        println!("    format (optional): json or markdown");
    }
    Ok(())
}
