//! Markdown reference of the values every component records.

use super::component::ManagedComponent;
use std::fmt::Write;

/// Render `# Documentation` with one `##` section per component and one `###`
/// entry per documented result field.
pub fn markdown(components: &[(String, ManagedComponent)]) -> String {
    let mut text = String::from("# Documentation\n");
    for (name, component) in components {
        let _ = writeln!(text, "## {}: {}", component.kind(), name);
        for (variable, description) in component.variable_documentation() {
            let _ = writeln!(text, "### {variable}\n{description}");
        }
    }
    text
}
