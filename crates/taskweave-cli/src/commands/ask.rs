use std::path::PathBuf;

use anyhow::Result;
use cliclack::spinner;
use console::style;
use taskweave::pipeline::to_outcome;

use crate::context::Context;

pub async fn execute(config: Option<PathBuf>, question: &str) -> Result<()> {
    let context = Context::load(config)?;
    let assistant = context.assistant();

    let spin = spinner();
    spin.start("awaiting reply");
    let answer = context
        .tracer
        .with_trace("Ask assistant", |trace| async move {
            assistant.answer(question, Some(&trace)).await
        })
        .await;
    spin.stop("");

    println!("{}\n{}", style(question).dim(), to_outcome(answer)?);
    Ok(())
}
