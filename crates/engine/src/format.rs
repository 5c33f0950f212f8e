//! Render a [`ContextBundle`] as text for a model prompt.

use ctxmesh_core::ContextBundle;
use std::path::Path;

/// Separator placed between rendered sections.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Render `bundle` as markdown sections in a fixed order: code, files,
/// project memory, language server information, then one section per
/// additional source in bundle order. Empty sections are omitted; an empty
/// bundle renders as `""`.
pub fn format_for_model(bundle: &ContextBundle) -> String {
    let mut sections: Vec<String> = Vec::new();

    if !bundle.code_context.is_empty() {
        sections.push(list_section("Relevant Code", &bundle.code_context));
    }

    if !bundle.file_contents.is_empty() {
        let files: Vec<String> = bundle
            .file_contents
            .iter()
            .map(|(path, content)| file_block(path, content))
            .collect();
        sections.push(format!("## File Contents\n\n{}", files.join("\n\n")));
    }

    if !bundle.memory_context.is_empty() {
        sections.push(list_section("Project Memory", &bundle.memory_context));
    }

    if !bundle.lsp_context.is_empty() {
        sections.push(list_section(
            "Language Server Information",
            &bundle.lsp_context,
        ));
    }

    for (source, items) in &bundle.additional_info {
        if !items.is_empty() {
            sections.push(list_section(source, items));
        }
    }

    sections.join(SECTION_SEPARATOR)
}

fn list_section(title: &str, items: &[String]) -> String {
    format!("## {title}\n\n{}", items.join("\n\n"))
}

fn file_block(path: &str, content: &str) -> String {
    let fence = fence_for(content);
    let lang = language_hint(path);
    format!(
        "### {path}\n\n{fence}{lang}\n{}\n{fence}",
        content.trim_end_matches(['\n', '\r'])
    )
}

/// A backtick fence longer than any backtick run inside `content`.
fn fence_for(content: &str) -> String {
    let mut longest = 0usize;
    let mut run = 0usize;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

fn language_hint(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("ts" | "tsx") => "typescript",
        Some("js" | "jsx" | "mjs") => "javascript",
        Some("go") => "go",
        Some("java") => "java",
        Some("c" | "h") => "c",
        Some("cpp" | "cc" | "hpp") => "cpp",
        Some("toml") => "toml",
        Some("json") => "json",
        Some("yaml" | "yml") => "yaml",
        Some("md") => "markdown",
        Some("sh") => "bash",
        Some("sql") => "sql",
        _ => "",
    }
}
