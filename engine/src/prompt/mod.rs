//! Prompt Builder (spec §4.4): renders a step's templates against sources, options,
//! and prior step outputs. Rendering is pure and best-effort: a template that fails
//! to parse or execute falls back to its raw text rather than failing the step.

use std::collections::HashMap;

use serde_json::Value;
use tera::{Context, Tera};

use crate::model::{Job, ResultItem, StepDef};

/// Renders `step.prompt.{system,user}` against a context exposing `job`, `step`,
/// `sources`, `options`, and `previous` (step id -> items produced by that step so
/// far), then returns `trim(system + "\n" + user)`.
pub fn build_prompt(step: &StepDef, job: &Job, outputs: &HashMap<String, Vec<ResultItem>>) -> String {
    let context = build_context(step, job, outputs);
    let system = render(&step.prompt.system, &context);
    let user = render(&step.prompt.user, &context);
    format!("{system}\n{user}").trim().to_string()
}

fn build_context(step: &StepDef, job: &Job, outputs: &HashMap<String, Vec<ResultItem>>) -> Context {
    let mut context = Context::new();
    context.insert("job", &job_to_value(job));
    context.insert("step", step);
    context.insert("sources", &job.input.sources);
    context.insert("options", &job.input.options);
    context.insert("previous", outputs);
    context
}

/// Strips `step_executions`/`result` before exposing the job to templates: prompts
/// only ever need identity and input fields, and excluding the rest keeps context
/// construction cheap even for long-running jobs with many chunks.
fn job_to_value(job: &Job) -> Value {
    serde_json::json!({
        "id": job.id,
        "pipeline_type": job.pipeline_type,
        "pipeline_version": job.pipeline_version,
        "status": job.status,
        "input": job.input,
    })
}

fn render(template: &str, context: &Context) -> String {
    if template.is_empty() {
        return String::new();
    }
    match Tera::one_off(template, context, false) {
        Ok(rendered) => rendered,
        Err(_) => template.to_string(),
    }
}
