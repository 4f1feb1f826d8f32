use include_dir::{include_dir, Dir};
use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

use crate::errors::{PipelineError, PipelineResult};

static PROMPTS: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Render one of the prompt templates bundled with the crate, e.g. `next_action.md`
pub fn load_prompt_file<T: Serialize>(name: &str, context_data: &T) -> Result<String, TeraError> {
    let template = PROMPTS
        .get_file(name)
        .and_then(|file| file.contents_utf8())
        .ok_or_else(|| TeraError::msg(format!("Prompt template `{}` not found", name)))?;
    load_prompt(template, context_data)
}

/// [`load_prompt_file`] with the failure lifted into the pipeline error
pub fn render_prompt<T: Serialize>(name: &str, context_data: &T) -> PipelineResult<String> {
    load_prompt_file(name, context_data)
        .map_err(|err| PipelineError::execution(format!("Render prompt {}", name), err))
}
