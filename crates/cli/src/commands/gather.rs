//! `ctxmesh gather` — Gather a context bundle for a query.

use ctxmesh_config::AppConfig;
use ctxmesh_core::GatherOptions;
use ctxmesh_engine::format_for_model;

pub struct GatherArgs {
    pub query: String,
    pub max_tokens: Option<usize>,
    pub sources: Vec<String>,
    pub no_files: bool,
    pub json: bool,
}

pub async fn run(config: &AppConfig, args: GatherArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::build_engine(config);
    let budget = args.max_tokens.unwrap_or(config.context.default_max_tokens);
    let options = options_for(&args);

    let bundle = engine.gather_context(&args.query, options).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&bundle)?);
    } else {
        let text = format_for_model(&bundle);
        if !text.is_empty() {
            println!("{text}");
        }
    }

    let used: Vec<&str> = bundle.sources_used.iter().map(String::as_str).collect();
    eprintln!(
        "{} chunks, {}/{} tokens ({}), sources: {}",
        bundle.chunk_count(),
        bundle.total_tokens,
        budget,
        engine.estimator().mode_name(),
        if used.is_empty() { "none".to_string() } else { used.join(", ") }
    );

    Ok(())
}

fn options_for(args: &GatherArgs) -> GatherOptions {
    let mut options = GatherOptions::new();
    if let Some(max_tokens) = args.max_tokens {
        options = options.with_max_tokens(max_tokens);
    }
    if !args.sources.is_empty() {
        options = options.with_preferred_sources(args.sources.iter().cloned());
    }
    if args.no_files {
        options = options.with_file_content(false);
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> GatherArgs {
        GatherArgs {
            query: "q".into(),
            max_tokens: None,
            sources: Vec::new(),
            no_files: false,
            json: false,
        }
    }

    #[test]
    fn defaults_leave_options_unset() {
        let options = options_for(&args());
        assert_eq!(options.max_tokens, None);
        assert!(options.preferred().is_none());
        assert_eq!(options.include_file_content, None);
    }

    #[test]
    fn flags_map_onto_options() {
        let options = options_for(&GatherArgs {
            max_tokens: Some(500),
            sources: vec!["memory".into(), "lsp".into()],
            no_files: true,
            ..args()
        });
        assert_eq!(options.max_tokens, Some(500));
        assert_eq!(options.preferred(), Some(&["memory".to_string(), "lsp".to_string()][..]));
        assert_eq!(options.include_file_content, Some(false));
    }
}
