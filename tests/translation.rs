use std::{sync::Arc, time::Duration};

use mcr_rs::{
    ai::GenerationError,
    engine::InMemoryEngine,
    errors::ErrorKind,
    logic::ClauseKind,
    session::{QueryOptions, SessionOptions},
    tests_cfg::{self, ScriptedGenerator},
    translation::{Strategy, TranslationError, TranslationPipeline},
    Mcr,
};
use tokio_util::sync::CancellationToken;

const GARBAGE: &str = "??? no idea";

#[tokio::test]
async fn each_round_tries_every_strategy_once() {
    let generator = ScriptedGenerator::repeating(GARBAGE);
    let pipeline = TranslationPipeline::new(vec![Strategy::Direct, Strategy::Structured], 2);

    let err = pipeline
        .translate(
            &generator,
            &InMemoryEngine::default(),
            "Tweety is a bird",
            &[],
            &CancellationToken::new(),
        )
        .await
        .expect_err("every attempt fails");

    assert_eq!(generator.call_count(), 4);
    match err {
        TranslationError::Exhausted {
            attempts,
            last_feedback,
        } => {
            assert_eq!(attempts, 2);
            assert!(last_feedback.contains("no JSON object found"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn rejected_output_is_fed_back() {
    let generator = ScriptedGenerator::new([GARBAGE, "bird(tweety)."]);
    let pipeline = TranslationPipeline::new(vec![Strategy::Direct], 2);
    let terms = vec!["bird".to_string()];

    let result = pipeline
        .translate(
            &generator,
            &InMemoryEngine::default(),
            "Tweety is a bird",
            &terms,
            &CancellationToken::new(),
        )
        .await
        .expect("second attempt succeeds");

    assert_eq!(result.content, "bird(tweety).");
    assert_eq!(result.kind, ClauseKind::Fact);
    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Available ontology terms: bird"));
    assert!(!prompts[0].contains("previous answer was rejected"));
    assert!(prompts[1].contains(&format!(
        "previous output `{GARBAGE}` is not valid Prolog syntax"
    )));
}

#[tokio::test]
async fn later_strategy_rescues_the_round() {
    let generator = ScriptedGenerator::new([
        GARBAGE,
        r#"Sure: {"type":"rule","head":{"predicate":"has_wings","args":["X"]},"body":[{"predicate":"bird","args":["X"]}]}"#,
    ]);
    let pipeline = TranslationPipeline::new(vec![Strategy::Direct, Strategy::Structured], 1);

    let result = pipeline
        .translate(
            &generator,
            &InMemoryEngine::default(),
            "Birds have wings",
            &[],
            &CancellationToken::new(),
        )
        .await
        .expect("structured succeeds");

    assert_eq!(result.strategy, Strategy::Structured);
    assert_eq!(result.kind, ClauseKind::Rule);
    assert_eq!(result.content, "has_wings(X) :- bird(X).");
}

#[tokio::test]
async fn provider_errors_count_as_attempts() {
    let generator = ScriptedGenerator::failing(GenerationError::Provider("rate limited".into()));
    let pipeline = TranslationPipeline::new(vec![Strategy::FewShot], 3);

    let err = pipeline
        .translate(
            &generator,
            &InMemoryEngine::default(),
            "Tweety is a bird",
            &[],
            &CancellationToken::new(),
        )
        .await
        .expect_err("provider keeps failing");

    assert_eq!(generator.call_count(), 3);
    assert!(matches!(
        err,
        TranslationError::Exhausted { ref last_feedback, .. } if last_feedback.contains("rate limited")
    ));
}

#[tokio::test]
async fn cancellation_interrupts_generation() {
    let generator = ScriptedGenerator::repeating("bird(tweety).").with_delay(Duration::from_secs(30));
    let pipeline = TranslationPipeline::new(vec![Strategy::Direct], 1);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = pipeline
        .translate(
            &generator,
            &InMemoryEngine::default(),
            "Tweety is a bird",
            &[],
            &cancel,
        )
        .await
        .expect_err("cancelled");

    assert_eq!(err, TranslationError::Cancelled);
}

#[tokio::test]
async fn cancellation_interrupts_retry_delay() {
    let generator = ScriptedGenerator::repeating(GARBAGE);
    let pipeline = TranslationPipeline::new(vec![Strategy::Direct], 3)
        .with_retry_delay(Duration::from_secs(30));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = pipeline
        .translate(
            &generator,
            &InMemoryEngine::default(),
            "Tweety is a bird",
            &[],
            &cancel,
        )
        .await
        .expect_err("cancelled");

    assert_eq!(err, TranslationError::Cancelled);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn operation_timeout_cancels() {
    let generator = ScriptedGenerator::repeating("bird(tweety).").with_delay(Duration::from_secs(60));
    let pipeline = TranslationPipeline::new(vec![Strategy::Direct], 1)
        .with_operation_timeout(Duration::from_millis(100));

    let err = pipeline
        .translate(
            &generator,
            &InMemoryEngine::default(),
            "Tweety is a bird",
            &[],
            &CancellationToken::new(),
        )
        .await
        .expect_err("timed out");

    assert_eq!(err, TranslationError::Cancelled);
}

#[tokio::test]
async fn session_translation_respects_configured_bounds() {
    let generator = Arc::new(ScriptedGenerator::repeating(GARBAGE));
    let mcr = Mcr::new(tests_cfg::config::test_config())
        .expect("manager")
        .with_generator(generator.clone());
    let session = mcr
        .create_session(
            SessionOptions::new()
                .with_ontology(tests_cfg::ontology::animals())
                .with_strategies(["direct", "json"])
                .with_max_attempts(2),
        )
        .await
        .expect("session");

    let result = session.assert_statement("Tweety is a bird").await;

    assert_eq!(generator.call_count(), 4);
    assert_eq!(
        result.error.expect("error").kind,
        ErrorKind::TranslationExhausted
    );
    assert!(session.program().await.is_empty());
    assert_eq!(session.usage().calls, 4);
}

#[tokio::test]
async fn cancel_pending_stops_in_flight_translation() {
    let generator = Arc::new(
        ScriptedGenerator::repeating("has_wings(X)").with_delay(Duration::from_secs(30)),
    );
    let mcr = Mcr::new(tests_cfg::config::test_config())
        .expect("manager")
        .with_generator(generator);
    let session = mcr
        .create_session(
            SessionOptions::new()
                .with_ontology(tests_cfg::ontology::animals())
                .with_program(tests_cfg::ontology::canary_program()),
        )
        .await
        .expect("session");

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            session
                .nquery("What has wings?", QueryOptions::default())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.cancel_pending();

    let result = pending.await.expect("join");
    assert_eq!(result.error.expect("error").kind, ErrorKind::Cancelled);

    let after = session.query("has_wings(X)", QueryOptions::default()).await;
    assert!(after.success);
}
