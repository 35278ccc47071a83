use anyhow::{anyhow, Context, Result};
use dagger_element::{
    BufferingEventSink, ElementConfig, ElementContext, ElementError, ElementGraph, ElementId,
    EventSink, FunctionElement, GraphRunner, LoggingAspect, ParamManager, RunnerConfig, Status,
    ThreadPool, WorkerPool,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
struct Pipeline {
    runner: RunnerConfig,
    elements: Vec<Stage>,
}

#[derive(Debug, Deserialize)]
struct Stage {
    #[serde(flatten)]
    config: ElementConfig,
    #[serde(default)]
    depends: Vec<String>,
}

fn params<'a>(ctx: &'a ElementContext<'_>) -> dagger_element::Result<&'a Arc<ParamManager>> {
    ctx.params()
        .ok_or_else(|| ElementError::failed(ctx.name(), "no parameters bound"))
}

fn read_number(ctx: &ElementContext<'_>, key: &str) -> dagger_element::Result<f64> {
    params(ctx)?
        .get::<f64>(key)?
        .ok_or_else(|| ElementError::failed(ctx.name(), format!("input '{}' not found", key)))
}

fn store(ctx: &ElementContext<'_>, key: &str, value: f64) -> Status {
    params(ctx)?.set(key, value)?;
    ctx.emit("stored", json!({ "key": key, "value": value }));
    Ok(())
}

// Example behaviours, looked up by element name
fn add_stage(graph: &mut ElementGraph, name: &str) -> Result<ElementId> {
    let id = match name {
        "add" => graph.add_element(FunctionElement::new(|ctx| {
            let sum = read_number(ctx, "num1")? + read_number(ctx, "num2")?;
            store(ctx, "result", sum)
        }))?,
        "square" => graph.add_element(FunctionElement::new(|ctx| {
            let num = read_number(ctx, "result")?;
            store(ctx, "squared_result", num * num)
        }))?,
        "triple" => graph.add_element(FunctionElement::new(|ctx| {
            let iteration = ctx.local().get::<u32>("iteration").unwrap_or(0) + 1;
            ctx.local().insert("iteration", iteration);
            let base = if iteration == 1 {
                read_number(ctx, "result")?
            } else {
                read_number(ctx, "tripled_result")?
            };
            store(ctx, "tripled_result", base * 3.0)
        }))?,
        "report" => graph.add_element(FunctionElement::new(|ctx| {
            let squared = read_number(ctx, "squared_result")?;
            let tripled = read_number(ctx, "tripled_result")?;
            info!(squared, tripled, "Pipeline finished on thread slot {}", ctx.thread_index());
            Ok(())
        }))?,
        other => return Err(anyhow!("no behaviour registered for '{}'", other)),
    };
    Ok(id)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let pipeline: Pipeline =
        serde_yaml::from_str(include_str!("../pipeline.yaml")).context("invalid pipeline.yaml")?;
    pipeline.runner.validate()?;

    let params = Arc::new(ParamManager::new());
    params.set("num1", 10.0)?;
    params.set("num2", 20.0)?;
    let events = Arc::new(BufferingEventSink::new());
    let pool: Arc<dyn ThreadPool> = Arc::new(WorkerPool::new(&pipeline.runner.pool)?);

    let mut graph = ElementGraph::new();
    let mut ids = Vec::with_capacity(pipeline.elements.len());
    for stage in &pipeline.elements {
        stage.config.validate()?;
        let id = add_stage(&mut graph, &stage.config.name)?;
        // Name early so later stages can resolve their dependencies by name
        graph.get_mut(id)?.set_name(&stage.config.name)?;
        ids.push(id);
    }

    for (stage, &id) in pipeline.elements.iter().zip(&ids) {
        let depends = stage
            .depends
            .iter()
            .map(|dep| {
                graph.find_by_name(dep).ok_or_else(|| {
                    anyhow!("'{}' depends on unknown element '{}'", stage.config.name, dep)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let sink: Arc<dyn EventSink> = events.clone();
        graph.set_element_info(
            id,
            &depends,
            &stage.config.name,
            stage.config.loop_count,
            Some(Arc::clone(&params)),
            Some(sink),
        )?;
        graph
            .get_mut(id)?
            .set_level(stage.config.level)?
            .set_visible(stage.config.visible)?
            .add_aspect(Box::new(LoggingAspect))?;
    }

    graph.bind_thread_pool(Arc::clone(&pool))?;
    graph.finalize()?;
    println!("{}", graph.to_dot());

    let runner = GraphRunner::new(graph, pool, pipeline.runner)?;
    runner.init()?;
    let report = runner.run();
    runner.destroy()?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("events: {:?}", events.keys());
    for key in ["result", "squared_result", "tripled_result"] {
        if let Some(value) = params.get_value(key) {
            println!("{} = {}", key, value);
        }
    }

    if !report.success {
        return Err(anyhow!(
            "pipeline failed: {}",
            report.error.unwrap_or_default()
        ));
    }
    Ok(())
}
