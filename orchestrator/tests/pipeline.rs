//! End-to-end pipeline runs against the scripted model

mod common;

use qag_orchestrator::{PipelineError, QagPipeline, RetryPolicy};

use common::scripted_team;

fn pipeline(model: std::sync::Arc<qag_agent::llm::ScriptedModel>) -> QagPipeline {
    QagPipeline::new(model).with_policy(RetryPolicy::without_delay())
}

#[tokio::test]
async fn test_full_run_aligns_answers_with_questions() {
    let model = scripted_team();
    let context = "  City Y is the capital of Country X. It has two rivers.  ";

    let result = pipeline(model.clone()).run(context).await.unwrap();

    assert_eq!(result.context, context);
    assert_eq!(result.questions, vec!["Question 1?", "Question 3?"]);
    assert_eq!(result.answers.len(), result.questions.len());
    for (question, answer) in result.questions.iter().zip(&result.answers) {
        assert_eq!(answer.answer, format!("answer to {}", question));
        assert_eq!(answer.explanation, "stated in the context");
    }
}

#[tokio::test]
async fn test_answer_phase_starts_from_preamble() {
    let model = scripted_team();

    pipeline(model.clone())
        .run("City Y is the capital of Country X.")
        .await
        .unwrap();

    let answer_calls: Vec<_> = model
        .calls()
        .into_iter()
        .filter(|c| c.tool_names == vec!["AnswerGeneration"])
        .collect();
    assert_eq!(answer_calls.len(), 2);

    for call in &answer_calls {
        // system, context, question, closing instruction
        assert_eq!(call.messages.len(), 4);
        assert_eq!(
            call.messages[1].content,
            "### Context:\n\nCity Y is the capital of Country X."
        );
        assert!(call.messages[2].content.starts_with("### Question:\n\n"));
        assert!(call.messages.iter().all(|m| m.name.as_deref() != Some(common::FIRST)));
    }
}

#[tokio::test]
async fn test_question_workers_report_to_supervisor_log() {
    let model = scripted_team();

    pipeline(model.clone()).run("Some context.").await.unwrap();

    // The last routing call sees every worker summary in order
    let last_route = model
        .calls()
        .into_iter()
        .filter(|c| c.tool_names == vec!["Router"])
        .last()
        .unwrap();
    let summaries: Vec<_> = last_route
        .messages
        .iter()
        .filter_map(|m| m.name.clone())
        .collect();
    assert_eq!(
        summaries,
        vec![common::FIRST, common::NEXT, common::NEXT, common::CHECKER]
    );

    let checker = last_route
        .messages
        .iter()
        .find(|m| m.name.as_deref() == Some(common::CHECKER))
        .unwrap();
    assert!(checker.content.starts_with("[Checked questions]\n\n"));
    assert!(checker.content.contains("- Question 2?"));
    assert!(!checker.content.contains("Recommendation:"));
}

#[tokio::test]
async fn test_service_failure_fails_the_run() {
    let model = scripted_team();

    let err = pipeline(model).run("This context will FAIL.").await.unwrap_err();

    assert!(matches!(err, PipelineError::Llm(_)));
}
