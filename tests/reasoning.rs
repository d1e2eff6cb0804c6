use std::sync::Arc;

use mcr_rs::{
    reasoning::{ReasonOptions, ReasoningOutcome},
    session::{Session, SessionOptions},
    tests_cfg::{self, ScriptedGenerator},
    translation::{AgentAction, TranslationError},
    Error, Mcr,
};

async fn session(mcr: &Mcr) -> Arc<Session> {
    mcr.create_session(
        SessionOptions::new()
            .with_ontology(tests_cfg::ontology::animals())
            .with_program(tests_cfg::ontology::canary_program())
            .with_max_reasoning_steps(5),
    )
    .await
    .expect("session")
}

fn manager(generator: Arc<ScriptedGenerator>) -> Mcr {
    Mcr::new(tests_cfg::config::test_config())
        .expect("manager")
        .with_generator(generator)
}

#[tokio::test]
async fn stops_inconclusive_after_the_step_bound() {
    let generator = Arc::new(ScriptedGenerator::repeating(
        r#"{"type":"query","content":"bird(X)"}"#,
    ));
    let mcr = manager(generator.clone());
    let session = session(&mcr).await;

    let result = session
        .reason("Which birds exist?", ReasonOptions::default().with_max_steps(3))
        .await
        .expect("reasoning");

    assert_eq!(result.outcome, ReasoningOutcome::Inconclusive);
    assert_eq!(result.answer(), None);
    assert_eq!(result.steps.len(), 3);
    assert_eq!(generator.call_count(), 3);
    assert!(result.steps.iter().all(|step| step.success));
    assert_eq!(result.steps[0].outcome, "query succeeded: X = tweety");
}

#[tokio::test]
async fn concludes_with_accumulated_bindings() {
    let generator = Arc::new(ScriptedGenerator::new([
        r#"{"type":"query","content":"has_wings(X)"}"#,
        r#"{"type":"conclude","answer":"Tweety has wings.","explanation":"Tweety is a canary."}"#,
    ]));
    let mcr = manager(generator.clone());
    let session = session(&mcr).await;

    let result = session
        .reason("Does anything have wings?", ReasonOptions::default())
        .await
        .expect("reasoning");

    assert!(result.is_concluded());
    assert_eq!(result.answer(), Some("Tweety has wings."));
    assert_eq!(result.steps.len(), 2);
    assert_eq!(
        result.steps[1].action,
        Some(AgentAction::Conclude {
            answer: "Tweety has wings.".to_string(),
            explanation: Some("Tweety is a canary.".to_string()),
        })
    );

    let prompts = generator.prompts();
    assert!(prompts[0].contains("Original Task: \"Does anything have wings?\""));
    assert!(prompts[0].contains("canary(tweety)."));
    assert!(prompts[1].contains("Accumulated Bindings: X = tweety"));
    assert!(prompts[1].contains("Step 1: query `has_wings(X)` -> query succeeded: X = tweety"));
}

#[tokio::test]
async fn failed_assertion_is_reported_back() {
    let generator = Arc::new(ScriptedGenerator::new([
        r#"{"type":"assert","content":"robot(r2)."}"#,
        r#"{"type":"assert","content":"penguin(pingu)."}"#,
        r#"{"type":"conclude","answer":"Done."}"#,
    ]));
    let mcr = manager(generator.clone());
    let session = session(&mcr).await;

    let result = session
        .reason("Record a penguin", ReasonOptions::default())
        .await
        .expect("reasoning");

    assert!(!result.steps[0].success);
    assert!(result.steps[0].outcome.starts_with("assertion failed:"));
    assert!(result.steps[1].success);
    assert_eq!(result.steps[1].outcome, "assertion successful");
    assert!(generator.prompts()[1].contains("Result of the last step: assertion failed:"));

    let program = session.program().await;
    assert!(program.contains(&"penguin(pingu).".to_string()));
    assert!(!program.contains(&"robot(r2).".to_string()));
}

#[tokio::test]
async fn unusable_actions_still_consume_steps() {
    let generator = Arc::new(ScriptedGenerator::new([
        "I think we should look at birds.",
        r#"{"type":"conclude","answer":"Unknown."}"#,
    ]));
    let mcr = manager(generator);
    let session = session(&mcr).await;

    let result = session
        .reason("Which birds exist?", ReasonOptions::default())
        .await
        .expect("reasoning");

    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.steps[0].action, None);
    assert!(!result.steps[0].success);
    assert_eq!(result.answer(), Some("Unknown."));
}

#[tokio::test]
async fn failed_query_is_reported_back() {
    let generator = Arc::new(ScriptedGenerator::new([
        r#"{"type":"query","content":"penguin(X)"}"#,
        r#"{"type":"conclude","answer":"No penguins."}"#,
    ]));
    let mcr = manager(generator);
    let session = session(&mcr).await;

    let result = session
        .reason("Are there penguins?", ReasonOptions::default())
        .await
        .expect("reasoning");

    assert!(!result.steps[0].success);
    assert!(result.steps[0].outcome.starts_with("query failed:"));
}

#[tokio::test]
async fn session_bound_applies_by_default() {
    let generator = Arc::new(ScriptedGenerator::repeating(
        r#"{"type":"query","content":"canary(X)"}"#,
    ));
    let mcr = manager(generator.clone());
    let session = session(&mcr).await;
    assert_eq!(session.max_reasoning_steps(), 5);

    let result = session
        .reason("Which canaries exist?", ReasonOptions::default())
        .await
        .expect("reasoning");

    assert_eq!(result.steps.len(), 5);
    assert_eq!(generator.call_count(), 5);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let generator = Arc::new(ScriptedGenerator::repeating("{}"));
    let mcr = manager(generator.clone());
    let session = session(&mcr).await;

    assert!(matches!(
        session.reason("  ", ReasonOptions::default()).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        session
            .reason("task", ReasonOptions::default().with_max_steps(0))
            .await,
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(generator.call_count(), 0);

    let without_generator = Mcr::new(tests_cfg::config::test_config()).expect("manager");
    let session = without_generator
        .create_session(SessionOptions::new())
        .await
        .expect("session");
    assert!(matches!(
        session.reason("task", ReasonOptions::default()).await,
        Err(Error::Translation(TranslationError::MissingGenerator))
    ));
}
