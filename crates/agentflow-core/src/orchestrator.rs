//! Agent execution engine.
//!
//! Walks a validated `AgentDef` through the per-run state machine:
//! `Initializing -> ResolvingVariables -> ExecutingSteps(i) ->
//! ResolvingOutputs -> Completed`, with `Failed` reachable from any step.
//!
//! # Execution flow
//!
//! 1. Refuse definitions that cannot run (missing trigger, no steps).
//! 2. Resolve secrets through the injected `SecretResolver`, then declared
//!    variables (fail fast on missing required ones).
//! 3. Steps in declared order: render `when` and skip on falsy; otherwise
//!    up to `retries + 1` attempts with exponential backoff sleeps of
//!    `2^(attempt-1)` seconds between failures and a per-attempt timeout.
//! 4. `save` stores the raw result into context state for later templates.
//! 5. Render declared outputs against the final context; unresolved
//!    references degrade to the literal template text.
//!
//! An execution either completes with resolved outputs or fails outright;
//! there is no partial-success contract.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use agentflow_types::ast::{AgentDef, Step, StepKind, VarSource};
use agentflow_types::capability::{CapabilityKind, CapabilityRequest};
use dashmap::DashMap;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::context::{ExecutionContext, is_falsy};
use crate::error::{ExecError, StepError};
use crate::functions;
use crate::http::{HttpFetcher, HttpStepRequest};
use crate::provider::CapabilityProvider;
use crate::secrets::SecretResolver;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// HTTP method used when an http step declares none.
const DEFAULT_HTTP_METHOD: &str = "GET";

/// Upper bound on the response body excerpt carried in failures.
const BODY_EXCERPT_LEN: usize = 256;

// ---------------------------------------------------------------------------
// ExecutionOutcome
// ---------------------------------------------------------------------------

/// The result of one completed execution.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionOutcome {
    pub run_id: Uuid,
    /// Rendered output templates, keyed by declared name.
    pub outputs: BTreeMap<String, String>,
    /// Ids of steps that actually ran (skipped steps are absent).
    pub completed_steps: Vec<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives agent executions against injected capability, HTTP, and secret
/// backends. Cheap to share; executions are independent.
pub struct Orchestrator<P, H, S> {
    provider: Arc<P>,
    http: Arc<H>,
    secrets: Arc<S>,
    /// Cancellation tokens for in-flight runs, keyed by run id.
    cancellations: DashMap<Uuid, CancellationToken>,
}

impl<P, H, S> Orchestrator<P, H, S>
where
    P: CapabilityProvider,
    H: HttpFetcher,
    S: SecretResolver,
{
    pub fn new(provider: Arc<P>, http: Arc<H>, secrets: Arc<S>) -> Self {
        Self {
            provider,
            http,
            secrets,
            cancellations: DashMap::new(),
        }
    }

    /// Run ids of executions currently in flight.
    pub fn running(&self) -> Vec<Uuid> {
        self.cancellations.iter().map(|e| *e.key()).collect()
    }

    /// Cancel an in-flight execution. No-op for unknown ids.
    pub fn cancel(&self, run_id: Uuid) {
        if let Some(entry) = self.cancellations.get(&run_id) {
            entry.cancel();
        }
    }

    /// Execute a definition against caller-supplied input.
    pub async fn execute(
        &self,
        def: &AgentDef,
        input: Value,
    ) -> Result<ExecutionOutcome, ExecError> {
        self.execute_cancellable(def, input, CancellationToken::new())
            .await
    }

    /// Execute with a caller-owned cancellation token.
    pub async fn execute_cancellable(
        &self,
        def: &AgentDef,
        input: Value,
        cancel: CancellationToken,
    ) -> Result<ExecutionOutcome, ExecError> {
        let run_id = Uuid::now_v7();
        self.cancellations.insert(run_id, cancel.clone());
        let result = self.run(def, input, run_id, cancel).await;
        self.cancellations.remove(&run_id);
        match &result {
            Ok(outcome) => tracing::info!(
                agent = %def.id,
                %run_id,
                steps = outcome.completed_steps.len(),
                "execution completed"
            ),
            Err(err) => tracing::warn!(agent = %def.id, %run_id, error = %err, "execution failed"),
        }
        result
    }

    async fn run(
        &self,
        def: &AgentDef,
        input: Value,
        run_id: Uuid,
        cancel: CancellationToken,
    ) -> Result<ExecutionOutcome, ExecError> {
        tracing::debug!(agent = %def.id, %run_id, "initializing");
        refuse_unrunnable(def)?;

        let mut ctx = ExecutionContext::new(&def.id, run_id, input);

        // ResolvingVariables: secrets first, then declared vars, all before
        // any step runs.
        tracing::debug!(agent = %def.id, %run_id, "resolving variables");
        ctx.secrets = self
            .secrets
            .resolve(&def.secrets)
            .await
            .map_err(|e| ExecError::Configuration(e.to_string()))?;
        resolve_vars(def, &mut ctx)?;

        let mut completed_steps = Vec::new();
        for (index, step) in def.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ExecError::Cancelled);
            }
            tracing::debug!(agent = %def.id, %run_id, step = %step.id, index, "executing step");

            if let Some(when) = &step.when {
                let rendered = ctx.render(when);
                if is_falsy(&rendered) {
                    tracing::debug!(step = %step.id, %rendered, "condition falsy, skipping");
                    continue;
                }
            }

            let value = self.run_step(step, &ctx, &cancel).await?;
            if let Some(save) = &step.save {
                ctx.state.insert(save.clone(), value);
            }
            completed_steps.push(step.id.clone());
        }

        tracing::debug!(agent = %def.id, %run_id, "resolving outputs");
        let outputs = def
            .outputs
            .iter()
            .map(|o| (o.name.clone(), ctx.render(&o.template)))
            .collect();

        Ok(ExecutionOutcome {
            run_id,
            outputs,
            completed_steps,
        })
    }

    /// One step, including its retry/backoff/timeout envelope.
    async fn run_step(
        &self,
        step: &Step,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<Value, ExecError> {
        let retries = step.retries();
        let timeout = Duration::from_millis(step.timeout_ms());

        let mut attempt = 1;
        loop {
            let attempt_result = tokio::select! {
                _ = cancel.cancelled() => return Err(ExecError::Cancelled),
                timed = tokio::time::timeout(timeout, self.dispatch(step, ctx)) => {
                    timed.unwrap_or(Err(StepError::Timeout {
                        ms: step.timeout_ms(),
                    }))
                }
            };

            match attempt_result {
                Ok(value) => return Ok(value),
                Err(err) if attempt <= retries && err.is_retryable() => {
                    let backoff = Duration::from_secs(2u64.saturating_pow(attempt - 1));
                    tracing::warn!(
                        step = %step.id,
                        attempt,
                        error = %err,
                        backoff_secs = backoff.as_secs(),
                        "step attempt failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ExecError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    attempt += 1;
                }
                Err(err) => {
                    return Err(ExecError::StepFailed {
                        step: step.id.clone(),
                        attempts: attempt,
                        source: err,
                    });
                }
            }
        }
    }

    /// Dispatch one attempt by step kind, with every string field rendered
    /// against the current context.
    async fn dispatch(&self, step: &Step, ctx: &ExecutionContext) -> Result<Value, StepError> {
        match &step.kind {
            StepKind::Llm {
                provider,
                model,
                prompt,
            } => {
                let request = CapabilityRequest {
                    kind: CapabilityKind::Llm,
                    provider: provider.clone(),
                    model: model.clone(),
                    input: json!({ "prompt": ctx.render(prompt) }),
                };
                Ok(self.provider.execute(request).await?)
            }
            StepKind::Vision {
                provider,
                model,
                prompt,
                image,
            } => {
                let request = CapabilityRequest {
                    kind: CapabilityKind::Vision,
                    provider: provider.clone(),
                    model: model.clone(),
                    input: json!({
                        "prompt": ctx.render(prompt),
                        "image": image.as_deref().map(|i| ctx.render(i)),
                    }),
                };
                Ok(self.provider.execute(request).await?)
            }
            StepKind::Audio {
                provider,
                model,
                prompt,
                source,
            } => {
                let request = CapabilityRequest {
                    kind: CapabilityKind::Audio,
                    provider: provider.clone(),
                    model: model.clone(),
                    input: json!({
                        "prompt": prompt.as_deref().map(|p| ctx.render(p)),
                        "source": source.as_deref().map(|s| ctx.render(s)),
                    }),
                };
                Ok(self.provider.execute(request).await?)
            }
            StepKind::VectorDb {
                operation,
                backend,
                collection,
                payload,
            } => {
                let payload = payload.as_deref().map(|p| ctx.render(p));
                let request = CapabilityRequest {
                    kind: CapabilityKind::VectorDb,
                    provider: backend.clone(),
                    model: None,
                    input: json!({
                        "operation": operation,
                        "collection": collection,
                        "payload": payload.as_deref().map(parse_or_string),
                    }),
                };
                Ok(self.provider.execute(request).await?)
            }
            StepKind::Finetune {
                provider,
                model,
                dataset,
            } => {
                let request = CapabilityRequest {
                    kind: CapabilityKind::Finetune,
                    provider: provider.clone(),
                    model: model.clone(),
                    input: json!({ "dataset": ctx.render(dataset) }),
                };
                Ok(self.provider.execute(request).await?)
            }
            StepKind::Http {
                url,
                method,
                headers,
                body,
            } => {
                let request = HttpStepRequest {
                    url: ctx.render(url),
                    method: method
                        .clone()
                        .unwrap_or_else(|| DEFAULT_HTTP_METHOD.to_string()),
                    headers: headers
                        .iter()
                        .map(|(k, v)| (k.clone(), ctx.render(v)))
                        .collect(),
                    body: body.as_deref().map(|b| ctx.render(b)),
                };
                let response = self
                    .http
                    .fetch(request)
                    .await
                    .map_err(|e| StepError::HttpTransport(e.to_string()))?;
                if !response.is_success() {
                    let mut body = response.body;
                    body.truncate(BODY_EXCERPT_LEN);
                    return Err(StepError::HttpStatus {
                        status: response.status,
                        body,
                    });
                }
                Ok(parse_or_string(&response.body))
            }
            StepKind::Function { name, args } => {
                let rendered: Vec<Value> = args
                    .iter()
                    .map(|a| Value::String(ctx.render(a)))
                    .collect();
                Ok(functions::call(name, &rendered)?)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

/// An execution whose definition failed validation must not start. The
/// guards here cover the structurally unrunnable cases even when the
/// caller skipped validation.
fn refuse_unrunnable(def: &AgentDef) -> Result<(), ExecError> {
    if def.id.is_empty() {
        return Err(ExecError::InvalidDefinition("agent has no id".into()));
    }
    if def.trigger.is_missing() {
        return Err(ExecError::InvalidDefinition("agent has no trigger".into()));
    }
    if def.steps.is_empty() {
        return Err(ExecError::InvalidDefinition("agent has no steps".into()));
    }
    Ok(())
}

/// Resolve declared variables into the context. Every missing required
/// variable is reported in one error.
fn resolve_vars(def: &AgentDef, ctx: &mut ExecutionContext) -> Result<(), ExecError> {
    let mut missing = Vec::new();
    for decl in &def.vars {
        let resolved = match &decl.source {
            VarSource::Input { path } if path.is_empty() => Some(ctx.input.clone()),
            VarSource::Input { path } => path
                .split('.')
                .try_fold(&ctx.input, |value, segment| {
                    value.as_object().and_then(|o| o.get(segment))
                })
                .cloned(),
            VarSource::Env { name } => std::env::var(name).ok().map(Value::String),
            VarSource::Literal { value } => Some(Value::String(value.clone())),
        };
        let resolved = resolved.or_else(|| decl.default.clone().map(Value::String));
        match resolved {
            Some(value) => {
                ctx.vars.insert(decl.name.clone(), value);
            }
            None if decl.required => missing.push(decl.name.clone()),
            None => {}
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ExecError::Configuration(format!(
            "missing required variables: {}",
            missing.join(", ")
        )))
    }
}

/// Response bodies that parse as JSON become structured values; anything
/// else stays a string.
fn parse_or_string(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use agentflow_types::ast::SecretDecl;
    use agentflow_types::capability::ProviderError;
    use serde_json::json;

    use super::*;
    use crate::http::{HttpStepResponse, HttpTransportError};
    use crate::secrets::SecretError;

    // -- stubs -------------------------------------------------------------

    /// Succeeds with a fixed reply after `fail_first` transient failures.
    struct StubProvider {
        reply: Value,
        fail_first: u32,
        calls: AtomicU32,
    }

    impl StubProvider {
        fn replying(reply: Value) -> Self {
            Self {
                reply,
                fail_first: 0,
                calls: AtomicU32::new(0),
            }
        }

        fn failing_first(fail_first: u32, reply: Value) -> Self {
            Self {
                reply,
                fail_first,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CapabilityProvider for StubProvider {
        async fn execute(&self, _request: CapabilityRequest) -> Result<Value, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(ProviderError::Unavailable("stub outage".into()))
            } else {
                Ok(self.reply.clone())
            }
        }
    }

    struct StubHttp {
        status: u16,
        body: String,
    }

    impl HttpFetcher for StubHttp {
        async fn fetch(
            &self,
            _request: HttpStepRequest,
        ) -> Result<HttpStepResponse, HttpTransportError> {
            Ok(HttpStepResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    struct StubSecrets(HashMap<String, String>);

    impl SecretResolver for StubSecrets {
        async fn resolve(
            &self,
            decls: &[SecretDecl],
        ) -> Result<HashMap<String, String>, SecretError> {
            let mut resolved = HashMap::new();
            for decl in decls {
                match self.0.get(&decl.name) {
                    Some(value) => {
                        resolved.insert(decl.name.clone(), value.clone());
                    }
                    None => {
                        return Err(SecretError {
                            name: decl.name.clone(),
                            reason: "not in stub".into(),
                        });
                    }
                }
            }
            Ok(resolved)
        }
    }

    fn orchestrator(
        provider: StubProvider,
    ) -> Orchestrator<StubProvider, StubHttp, StubSecrets> {
        Orchestrator::new(
            Arc::new(provider),
            Arc::new(StubHttp {
                status: 200,
                body: "{}".into(),
            }),
            Arc::new(StubSecrets(HashMap::new())),
        )
    }

    fn parse_def(source: &str) -> AgentDef {
        let result = agentflow_lang::parse(source);
        assert!(result.validation.valid(), "{:?}", result.validation.errors);
        result.def
    }

    const HELLO: &str = "@agent hi v1\n\
                         trigger http POST /hi\n\
                         var m = input.message\n\
                         step s:\n  \
                           kind llm\n  \
                           provider openai\n  \
                           model gpt-4o\n  \
                           prompt \"\"\"Hello {m}\"\"\"\n  \
                           save r\n\
                         output r\n\
                         @end\n";

    // -- scenarios ---------------------------------------------------------

    #[tokio::test]
    async fn hello_agent_end_to_end() {
        let def = parse_def(HELLO);
        let orch = orchestrator(StubProvider::replying(json!("Hello world!")));
        let outcome = orch
            .execute(&def, json!({"message": "world"}))
            .await
            .unwrap();
        assert_eq!(
            outcome.outputs.get("result").map(String::as_str),
            Some("Hello world!")
        );
        assert_eq!(outcome.completed_steps, vec!["s"]);
    }

    #[tokio::test]
    async fn missing_trigger_is_refused() {
        let src = "@agent a v1\n\
                   step s:\n  kind llm\n  provider openai\n  model gpt-4o\n  \
                   prompt \"\"\"hi\"\"\"\n  save r\n\
                   output r\n\
                   @end\n";
        let result = agentflow_lang::parse(src);
        let orch = orchestrator(StubProvider::replying(json!("never")));
        let err = orch.execute(&result.def, json!({})).await.unwrap_err();
        assert!(matches!(err, ExecError::InvalidDefinition(_)));
    }

    #[tokio::test]
    async fn missing_required_var_fails_before_any_step() {
        let def = parse_def(HELLO);
        let orch = orchestrator(StubProvider::replying(json!("never")));
        let err = orch.execute(&def, json!({})).await.unwrap_err();
        assert!(matches!(err, ExecError::Configuration(_)));
        // Fail fast: the provider was never called.
        assert_eq!(orch.provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_bound_and_backoff() {
        let src = "@agent a v1\ntrigger manual\n\
                   step s:\n  kind llm\n  provider openai\n  model gpt-4o\n  \
                   prompt \"\"\"hi\"\"\"\n  save r\n  retries 3\n\
                   output r\n\
                   @end\n";
        let def = parse_def(src);
        let orch = orchestrator(StubProvider::failing_first(u32::MAX, json!("never")));
        let started = tokio::time::Instant::now();
        let err = orch.execute(&def, json!({})).await.unwrap_err();
        match err {
            ExecError::StepFailed { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(orch.provider.calls(), 4);
        // Backoff sleeps: 1 + 2 + 4 seconds.
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_recover_within_budget() {
        let src = "@agent a v1\ntrigger manual\n\
                   step s:\n  kind llm\n  provider openai\n  model gpt-4o\n  \
                   prompt \"\"\"hi\"\"\"\n  save r\n  retries 2\n\
                   output r\n\
                   @end\n";
        let def = parse_def(src);
        let orch = orchestrator(StubProvider::failing_first(2, json!("third time lucky")));
        let outcome = orch.execute(&def, json!({})).await.unwrap();
        assert_eq!(orch.provider.calls(), 3);
        assert_eq!(
            outcome.outputs.get("result").map(String::as_str),
            Some("third time lucky")
        );
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        struct AuthFail(AtomicU32);
        impl CapabilityProvider for AuthFail {
            async fn execute(
                &self,
                _request: CapabilityRequest,
            ) -> Result<Value, ProviderError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::AuthFailure("bad key".into()))
            }
        }
        let src = "@agent a v1\ntrigger manual\n\
                   step s:\n  kind llm\n  provider openai\n  model gpt-4o\n  \
                   prompt \"\"\"hi\"\"\"\n  save r\n  retries 5\n\
                   output r\n\
                   @end\n";
        let def = parse_def(src);
        let provider = Arc::new(AuthFail(AtomicU32::new(0)));
        let orch = Orchestrator::new(
            provider.clone(),
            Arc::new(StubHttp {
                status: 200,
                body: "{}".into(),
            }),
            Arc::new(StubSecrets(HashMap::new())),
        );
        let err = orch.execute(&def, json!({})).await.unwrap_err();
        assert!(matches!(err, ExecError::StepFailed { attempts: 1, .. }));
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempts_time_out_and_retry() {
        struct Stalled(AtomicU32);
        impl CapabilityProvider for Stalled {
            async fn execute(
                &self,
                _request: CapabilityRequest,
            ) -> Result<Value, ProviderError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                std::future::pending().await
            }
        }
        let src = "@agent a v1\ntrigger manual\n\
                   step s:\n  kind llm\n  provider openai\n  model gpt-4o\n  \
                   prompt \"\"\"hi\"\"\"\n  save r\n  retries 1\n  timeout 50\n\
                   output r\n\
                   @end\n";
        let def = parse_def(src);
        let provider = Arc::new(Stalled(AtomicU32::new(0)));
        let orch = Orchestrator::new(
            provider.clone(),
            Arc::new(StubHttp {
                status: 200,
                body: "{}".into(),
            }),
            Arc::new(StubSecrets(HashMap::new())),
        );
        let started = tokio::time::Instant::now();
        let err = orch.execute(&def, json!({})).await.unwrap_err();
        match err {
            ExecError::StepFailed {
                attempts,
                source: StepError::Timeout { ms },
                ..
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(ms, 50);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(provider.0.load(Ordering::SeqCst), 2);
        // Two 50ms attempts plus the 1s backoff between them.
        assert_eq!(started.elapsed(), Duration::from_millis(1100));
    }

    #[tokio::test]
    async fn falsy_condition_skips_without_state() {
        let src = "@agent a v1\ntrigger manual\n\
                   var flag = input.flag\n\
                   step gated:\n  \
                     kind llm\n  provider openai\n  model gpt-4o\n  \
                     prompt \"\"\"hi\"\"\"\n  when {flag}\n  save r\n\
                   output result = {r}\n\
                   @end\n";
        let def = parse_def(src);
        let orch = orchestrator(StubProvider::replying(json!("never")));
        let outcome = orch.execute(&def, json!({"flag": false})).await.unwrap();
        assert_eq!(orch.provider.calls(), 0);
        assert!(outcome.completed_steps.is_empty());
        // No state entry was written, so the output stays literal.
        assert_eq!(
            outcome.outputs.get("result").map(String::as_str),
            Some("{r}")
        );
    }

    #[tokio::test]
    async fn http_step_posts_and_parses_json() {
        let src = "@agent a v1\ntrigger manual\n\
                   var city = input.city\n\
                   step fetch:\n  \
                     kind http\n  url https://example.com/api\n  method POST\n  \
                     body \"\"\"{\"city\": \"{city}\"}\"\"\"\n  save data\n\
                   output result = {data.temp}\n\
                   @end\n";
        let def = parse_def(src);
        let orch = Orchestrator::new(
            Arc::new(StubProvider::replying(json!("unused"))),
            Arc::new(StubHttp {
                status: 200,
                body: r#"{"temp": 21}"#.into(),
            }),
            Arc::new(StubSecrets(HashMap::new())),
        );
        let outcome = orch.execute(&def, json!({"city": "paris"})).await.unwrap();
        assert_eq!(
            outcome.outputs.get("result").map(String::as_str),
            Some("21")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_2xx_http_fails_the_step() {
        let src = "@agent a v1\ntrigger manual\n\
                   step fetch:\n  \
                     kind http\n  url https://example.com/api\n  save data\n  retries 1\n\
                   output result = {data}\n\
                   @end\n";
        let def = parse_def(src);
        let orch = Orchestrator::new(
            Arc::new(StubProvider::replying(json!("unused"))),
            Arc::new(StubHttp {
                status: 503,
                body: "unavailable".into(),
            }),
            Arc::new(StubSecrets(HashMap::new())),
        );
        let err = orch.execute(&def, json!({})).await.unwrap_err();
        match err {
            ExecError::StepFailed {
                attempts,
                source: StepError::HttpStatus { status, .. },
                ..
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(status, 503);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn function_step_and_chaining() {
        let src = "@agent a v1\ntrigger manual\n\
                   var a = input.a\n\
                   step sum:\n  kind function\n  name add\n  arg {a}\n  arg 10\n  save total\n\
                   step doubled:\n  kind function\n  name mul\n  arg {total}\n  arg 2\n  save big\n\
                   output result = {big}\n\
                   @end\n";
        let def = parse_def(src);
        let orch = orchestrator(StubProvider::replying(json!("unused")));
        let outcome = orch.execute(&def, json!({"a": 5})).await.unwrap();
        assert_eq!(
            outcome.outputs.get("result").map(String::as_str),
            Some("30")
        );
        assert_eq!(outcome.completed_steps, vec!["sum", "doubled"]);
    }

    #[tokio::test]
    async fn missing_secret_is_a_configuration_error() {
        let src = "@agent a v1\ntrigger manual\n\
                   secret KEY=env:NOPE\n\
                   step s:\n  kind llm\n  provider openai\n  model gpt-4o\n  \
                   prompt \"\"\"use {KEY}\"\"\"\n  save r\n\
                   output r\n\
                   @end\n";
        let def = parse_def(src);
        let orch = orchestrator(StubProvider::replying(json!("never")));
        let err = orch.execute(&def, json!({})).await.unwrap_err();
        assert!(matches!(err, ExecError::Configuration(_)));
    }

    #[tokio::test]
    async fn pre_cancelled_token_stops_before_any_step() {
        let def = parse_def(HELLO);
        let orch = orchestrator(StubProvider::replying(json!("never")));
        let token = CancellationToken::new();
        token.cancel();
        let err = orch
            .execute_cancellable(&def, json!({"message": "world"}), token)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
        assert_eq!(orch.provider.calls(), 0);
    }

    #[tokio::test]
    async fn in_flight_execution_can_be_cancelled_by_run_id() {
        struct Hanging;
        impl CapabilityProvider for Hanging {
            async fn execute(
                &self,
                _request: CapabilityRequest,
            ) -> Result<Value, ProviderError> {
                std::future::pending().await
            }
        }
        let orch = Arc::new(Orchestrator::new(
            Arc::new(Hanging),
            Arc::new(StubHttp {
                status: 200,
                body: "{}".into(),
            }),
            Arc::new(StubSecrets(HashMap::new())),
        ));
        let task = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.execute(&parse_def(HELLO), json!({"message": "world"}))
                    .await
            })
        };
        // Wait for the run to register, then cancel it.
        let running = loop {
            let running = orch.running();
            if !running.is_empty() {
                break running;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        for run_id in running {
            orch.cancel(run_id);
        }
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
    }
}
