//! End-to-end pipelines over the scripted model
//!
//! These tests compose chains, memory, agents and evaluators the way an
//! application would, using only the public API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use catena_core::prelude::*;

fn doc(text: &str) -> Document {
    Document::new(text)
}

#[tokio::test]
async fn test_summarize_then_translate() {
    let summarizer_model = Arc::new(FakeModel::new(["Rust is fast and safe."]));
    let translator_model = Arc::new(FakeModel::new(["Rust est rapide et sûr."]));

    let summarize = StuffDocumentsChain::new(Arc::new(
        LlmChain::new(
            summarizer_model.clone(),
            PromptTemplate::new("Summarize:\n{{context}}").unwrap(),
        )
        .with_output_key("summary"),
    ));
    let translate = LlmChain::new(
        translator_model.clone(),
        PromptTemplate::new("Translate to {{language}}: {{summary}}").unwrap(),
    )
    .with_output_key("translation");

    let chains: Vec<Arc<dyn Chain>> = vec![Arc::new(summarize), Arc::new(translate)];
    let pipeline = SequentialChain::new(
        chains,
        vec!["inputDocuments".into(), "language".into()],
    )
    .unwrap()
    .with_return_all();

    let inputs = ChainValues::new()
        .with(
            "inputDocuments",
            vec![doc("Rust has no GC."), doc("Rust prevents data races.")],
        )
        .with("language", "French");

    let outputs = chain::call(&pipeline, inputs, &RunContext::new())
        .await
        .unwrap();

    assert_eq!(outputs.get_string("summary").unwrap(), "Rust is fast and safe.");
    assert_eq!(
        outputs.get_string("translation").unwrap(),
        "Rust est rapide et sûr."
    );
    assert_eq!(
        summarizer_model.prompts()[0].to_text(),
        "Summarize:\nRust has no GC.\n\nRust prevents data races."
    );
    assert_eq!(
        translator_model.prompts()[0].to_text(),
        "Translate to French: Rust is fast and safe."
    );
}

#[tokio::test]
async fn test_map_reduce_summaries() {
    let map_model = Arc::new(FakeModel::new(["point one", "point two", "point three"]));
    let reduce_model = Arc::new(FakeModel::new(["three points"]));

    let map_chain = Arc::new(LlmChain::new(
        map_model.clone(),
        PromptTemplate::new("Key point of: {{context}}").unwrap(),
    ));
    let reduce_chain = StuffDocumentsChain::new(Arc::new(LlmChain::new(
        reduce_model.clone(),
        PromptTemplate::new("Combine:\n{{context}}").unwrap(),
    )));
    let chain = MapReduceDocumentsChain::new(map_chain, reduce_chain);

    let outputs = chain::call(
        &chain,
        ChainValues::new().with("inputDocuments", vec![doc("a"), doc("b"), doc("c")]),
        &RunContext::new(),
    )
    .await
    .unwrap();

    assert_eq!(outputs.get_string("text").unwrap(), "three points");
    assert_eq!(map_model.call_count(), 3);
    assert_eq!(
        reduce_model.prompts()[0].to_text(),
        "Combine:\npoint one\n\npoint two\n\npoint three"
    );
}

#[tokio::test]
async fn test_conversation_keeps_history_in_chat_prompt() {
    let model = Arc::new(FakeModel::new(["Nice to meet you, Ada.", "Your name is Ada."]));
    let memory = Arc::new(ConversationBufferMemory::new().with_return_messages(true));

    let prompt = ChatPromptTemplate::new()
        .system("You are a friendly assistant.")
        .unwrap()
        .human("{{history}}\n{{input}}")
        .unwrap();
    let chain = LlmChain::new(model.clone(), prompt)
        .with_output_key("response")
        .with_memory(memory.clone());
    let ctx = RunContext::new();

    chain::predict(&chain, ChainValues::from([("input", "I am Ada.")]), &ctx)
        .await
        .unwrap();
    let reply = chain::predict(&chain, ChainValues::from([("input", "Who am I?")]), &ctx)
        .await
        .unwrap();

    assert_eq!(reply, "Your name is Ada.");
    let messages = memory.messages().await;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3], ChatMessage::ai("Your name is Ada."));

    let second_prompt = model.prompts()[1].to_messages();
    assert!(second_prompt[1].text().contains("AI: Nice to meet you, Ada."));
    assert!(second_prompt[1].text().ends_with("Who am I?"));
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

#[async_trait]
impl Callback for EventLog {
    async fn on_chain_start(&self, chain_type: &str, _inputs: &ChainValues) -> CallbackResult {
        self.0.lock().unwrap().push(format!("chain_start:{}", chain_type));
        Ok(())
    }

    async fn on_agent_action(&self, action: &AgentAction) -> CallbackResult {
        self.0.lock().unwrap().push(format!("action:{}", action.tool));
        Ok(())
    }

    async fn on_agent_finish(&self, _finish: &AgentFinish) -> CallbackResult {
        self.0.lock().unwrap().push("finish".to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_agent_uses_tool_then_answers() {
    let model = Arc::new(FakeModel::new([
        "I need to add the numbers.\nAction: add\nAction Input: 2 3",
        "I now know the final answer\nFinal Answer: 5",
    ]));
    let add = FnTool::new("add", "Adds two space-separated integers", |input| {
        let sum = input
            .split_whitespace()
            .map(|n| {
                n.parse::<i64>()
                    .map_err(|e| CatenaError::Tool {
                        tool: "add".into(),
                        message: e.to_string(),
                    })
            })
            .sum::<Result<i64>>()?;
        Ok(sum.to_string())
    });
    let tools = ToolRegistry::from_tools([Arc::new(add) as Arc<dyn Tool>]).unwrap();
    let agent = ZeroShotReactAgent::new(model.clone(), &tools).unwrap();
    let executor = AgentExecutor::new(Arc::new(agent), tools).with_config(
        AgentExecutorConfig::new()
            .with_max_iterations(Some(5))
            .with_return_intermediate_steps(true),
    );

    let events = Arc::new(EventLog::default());
    let ctx = RunContext::new().with_callbacks(CallbackManager::new().with(events.clone()));

    let outputs = chain::call(
        &executor,
        ChainValues::from([("input", "What is 2 + 3?")]),
        &ctx,
    )
    .await
    .unwrap();

    assert_eq!(outputs.get_string("output").unwrap(), "5");
    assert!(outputs.contains_key("intermediateSteps"));

    let first_prompt = model.prompts()[0].to_text();
    assert!(first_prompt.contains("add: Adds two space-separated integers"));
    assert!(first_prompt.contains("should be one of [add]"));
    assert!(model.prompts()[1].to_text().contains("Observation: 5\nThought:"));

    let log = events.0.lock().unwrap().clone();
    assert_eq!(log.first().map(String::as_str), Some("chain_start:agent_executor"));
    assert!(log.contains(&"action:add".to_string()));
    assert_eq!(log.last().map(String::as_str), Some("finish"));
}

#[tokio::test]
async fn test_agent_without_final_answer_hits_cap() {
    let model = Arc::new(FakeModel::new(["Action: lookup\nAction Input: again"]));
    let tools = ToolRegistry::new();
    let agent = ZeroShotReactAgent::new(model.clone(), &tools).unwrap();
    let executor = AgentExecutor::new(Arc::new(agent), tools)
        .with_config(AgentExecutorConfig::new().with_max_iterations(Some(2)));

    let err = chain::run(&executor, "loop forever", &RunContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CatenaError::MaxIterations(2)));
    assert_eq!(model.call_count(), 2);
}

#[tokio::test]
async fn test_grade_agent_answers() {
    let answers = Arc::new(FakeModel::new(["Final Answer: Paris", "Final Answer: Berlin"]));
    let tools = ToolRegistry::new();
    let executor = AgentExecutor::new(
        Arc::new(ZeroShotReactAgent::new(answers, &tools).unwrap()),
        tools,
    );

    let examples: Vec<HashMap<String, String>> = [
        ("Capital of France?", "Paris"),
        ("Capital of Spain?", "Madrid"),
    ]
    .iter()
    .map(|(q, a)| {
        [("query", *q), ("answer", *a)]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    })
    .collect();

    let ctx = RunContext::new();
    let mut predictions: Vec<HashMap<String, String>> = Vec::new();
    for example in &examples {
        let result = chain::run(&executor, &example["query"], &ctx).await.unwrap();
        predictions.push([("result".to_string(), result)].into_iter().collect());
    }

    let grader = QaEvalChain::new(Arc::new(FakeModel::new(["CORRECT", "INCORRECT"])))
        .unwrap()
        .with_grade_parser();
    let graded = grader.evaluate(&examples, &predictions, &ctx).await.unwrap();

    assert_eq!(
        EvalSummary::from_results(&graded, grader.output_key()),
        EvalSummary {
            correct: 1,
            incorrect: 1,
            ungraded: 0
        }
    );
}

#[tokio::test]
async fn test_cancelled_run_never_reaches_model() {
    let model = Arc::new(FakeModel::new(["unused"]));
    let chain = LlmChain::new(model.clone(), PromptTemplate::new("{{q}}").unwrap());
    let ctx = RunContext::new();
    ctx.cancel();

    let err = chain::run(&chain, "x", &ctx).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(model.call_count(), 0);
}
