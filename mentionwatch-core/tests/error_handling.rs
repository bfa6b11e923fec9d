use mentionwatch_core::{
    ClassificationError, ConfigError, CoreError, DatabaseError, ErrorExt, ErrorReporter, LlmError,
    RedditApiError,
};
use std::time::Duration;

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::RequestTimeout);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let db_error = CoreError::Database(DatabaseError::DatabaseLocked);
    assert_eq!(db_error.error_code(), "DATABASE");

    let llm_error = CoreError::Llm(LlmError::InvalidApiKey {
        provider: "openai".to_string(),
    });
    assert_eq!(llm_error.error_code(), "LLM");

    let classification_error = CoreError::Classification(ClassificationError::UnknownLabel {
        label: "mixed".to_string(),
    });
    assert_eq!(classification_error.error_code(), "CLASSIFICATION");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "tracking.terms".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");
}

#[test]
fn test_retryable_errors() {
    let retryable_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable_error.is_retryable());

    let classification_error = CoreError::Classification(ClassificationError::MissingField {
        field: "label".to_string(),
    });
    assert!(!classification_error.is_retryable());

    let non_retryable_error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "OPENAI_API_KEY".to_string(),
    });
    assert!(!non_retryable_error.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limit_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(
        rate_limit_error.retry_after(),
        Some(Duration::from_secs(60))
    );

    let llm_limit = CoreError::Llm(LlmError::RateLimitExceeded {
        provider: "claude".to_string(),
        retry_after: 12,
    });
    assert_eq!(llm_limit.retry_after(), Some(Duration::from_secs(12)));

    let not_found = CoreError::NotFound {
        resource: "mention t3_x".to_string(),
    };
    assert_eq!(not_found.retry_after(), None);
}

#[test]
fn test_user_friendly_messages() {
    let config_error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "ANTHROPIC_API_KEY".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("ANTHROPIC_API_KEY"));

    let not_found = CoreError::NotFound {
        resource: "mention t1_abc".to_string(),
    };
    assert!(not_found.user_friendly_message().contains("t1_abc"));
}

#[test]
fn test_classification_error_messages() {
    let err = ClassificationError::ConfidenceOutOfRange { value: 1.5 };
    assert_eq!(err.to_string(), "Confidence 1.5 is outside [0, 1]");

    let wrapped: CoreError = err.into();
    assert!(wrapped.to_string().starts_with("Classification error:"));
}

#[test]
fn test_error_reporter() {
    let reporter = ErrorReporter::new()
        .with_error_reporting(true)
        .with_warning_reporting(true);
    let error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });

    // Only checks that reporting does not panic
    reporter.report_error(&error);
    reporter.report_warning(&error);
}
