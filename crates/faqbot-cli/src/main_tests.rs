//! CLI argument tests

use super::*;
use clap::CommandFactory;

#[test]
fn test_cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn test_ask_parses_pipeline_flags() {
    let cli = Cli::try_parse_from([
        "faqbot",
        "ask",
        "How do refunds work?",
        "--knowledge",
        "faq.json",
        "--language",
        "de",
        "--timeout-ms",
        "250",
        "--offline",
        "--format",
        "json",
    ])
    .unwrap();

    assert!(cli.format == OutputFormat::Json);
    match cli.command {
        Commands::Ask {
            message, pipeline, ..
        } => {
            assert_eq!(message, "How do refunds work?");
            assert_eq!(pipeline.knowledge, Some(PathBuf::from("faq.json")));
            assert_eq!(pipeline.language, "de");
            assert_eq!(pipeline.timeout_ms, Some(250));
            assert!(pipeline.offline);
        }
        _ => panic!("expected ask"),
    }
}

#[test]
fn test_ask_rejects_zero_timeout() {
    let err = Cli::try_parse_from(["faqbot", "ask", "hi", "--timeout-ms", "0"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    assert!(Cli::try_parse_from(["faqbot", "search", "refund", "--timeout-ms", "1"]).is_ok());
}

#[test]
fn test_search_defaults() {
    let cli = Cli::try_parse_from(["faqbot", "search", "refund"]).unwrap();
    match cli.command {
        Commands::Search {
            limit,
            category,
            pipeline,
            ..
        } => {
            assert_eq!(limit, 5);
            assert_eq!(category, None);
            assert_eq!(pipeline.language, "en");
        }
        _ => panic!("expected search"),
    }
}

#[test]
fn test_config_requires_action() {
    assert!(Cli::try_parse_from(["faqbot", "config"]).is_err());
    assert!(Cli::try_parse_from(["faqbot", "config", "get", "retrieval.top_k"]).is_ok());
}

#[test]
fn test_timeout_override() {
    let config = Config::default();
    let pipeline = PipelineArgs {
        knowledge: None,
        language: "en".to_string(),
        timeout_ms: None,
        offline: false,
    };
    assert_eq!(timeout_for(&pipeline, &config), config.generation.timeout());

    let pipeline = PipelineArgs {
        timeout_ms: Some(50),
        ..pipeline
    };
    assert_eq!(timeout_for(&pipeline, &config), Duration::from_millis(50));
}

#[test]
fn test_display_list() {
    assert_eq!(display_list(&[]), "none");
    assert_eq!(
        display_list(&["hosted".to_string(), "local".to_string()]),
        "hosted, local"
    );
}
