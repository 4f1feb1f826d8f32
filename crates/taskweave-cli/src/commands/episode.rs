use std::path::PathBuf;

use anyhow::Result;
use cliclack::spinner;
use console::style;
use taskweave::episodes::{
    censorship, connections, database, recalibration, robot, robotid, softo, testimonials,
    vectors, whereabouts,
};
use taskweave::headquarters::ReportAck;
use taskweave::pipeline::to_outcome;
use tracing::info;

use crate::context::Context;

pub enum Episode {
    Robot,
    Recalibrate,
    Censor,
    RobotId,
    Testimonials { dir: PathBuf, transcribe: bool },
    Vectors { dir: PathBuf },
    Connections { from: String, to: String },
    Softo,
    Database,
    Whereabouts,
}

impl Episode {
    fn title(&self) -> &'static str {
        match self {
            Episode::Robot => "robot verification",
            Episode::Recalibrate => recalibration::TASK,
            Episode::Censor => censorship::TASK,
            Episode::RobotId => robotid::TASK,
            Episode::Testimonials { .. } => testimonials::TASK,
            Episode::Vectors { .. } => vectors::TASK,
            Episode::Connections { .. } => connections::TASK,
            Episode::Softo => softo::TASK,
            Episode::Database => database::TASK,
            Episode::Whereabouts => "whereabouts",
        }
    }
}

pub async fn execute(config: Option<PathBuf>, episode: Episode) -> Result<()> {
    let context = Context::load(config)?;

    info!(episode = episode.title(), "Starting episode");
    let spin = spinner();
    spin.start(format!("running {}", episode.title()));
    let result = run(&context, episode).await;
    spin.stop("");

    match result? {
        Outcome::Flag(text) => println!("{} {}", style("flag").bold().green(), text),
        Outcome::Answer(text) => println!("{} {}", style("answer").bold().green(), text),
        Outcome::Report(ack) => print_ack(&ack),
    }
    Ok(())
}

enum Outcome {
    Flag(String),
    Answer(String),
    Report(ReportAck),
}

async fn run(context: &Context, episode: Episode) -> Result<Outcome> {
    let llm = context.llm.as_ref();
    let tracer = &context.tracer;

    let ack = match episode {
        Episode::Robot => {
            let endpoint = &context.settings.robot()?.url;
            let message = to_outcome(
                robot::talk_with_robot(&context.http, llm, endpoint, robot::TURN_LIMIT).await,
            )?;
            return Ok(Outcome::Flag(message.text));
        }
        Episode::Recalibrate => {
            let headquarters = context.headquarters()?;
            to_outcome(
                recalibration::recalibrate(&context.http, llm, &headquarters, tracer).await,
            )?
        }
        Episode::Censor => {
            let headquarters = context.headquarters()?;
            let (local_llm, model) = context.local_llm()?;
            to_outcome(
                censorship::censor(&context.http, &local_llm, &model, &headquarters, tracer)
                    .await,
            )?
        }
        Episode::RobotId => {
            let headquarters = context.headquarters()?;
            let model = &context.settings.openai.image_model;
            to_outcome(robotid::solve(&context.http, llm, model, &headquarters, tracer).await)?
        }
        Episode::Testimonials { dir, transcribe } => {
            let headquarters = context.headquarters()?;
            let model = transcribe.then_some(context.settings.openai.transcription_model.as_str());
            to_outcome(testimonials::solve(llm, &headquarters, tracer, &dir, model).await)?
        }
        Episode::Vectors { dir } => {
            let headquarters = context.headquarters()?;
            let chunks = context.chunks();
            let vector_store = context.vectors()?;
            to_outcome(vectors::solve(&chunks, &vector_store, &headquarters, tracer, &dir).await)?
        }
        Episode::Connections { from, to } => {
            let headquarters = context.headquarters()?;
            let neo4j = context.settings.neo4j()?;
            to_outcome(connections::solve(&context.http, &headquarters, neo4j, &from, &to).await)?
        }
        Episode::Softo => {
            let headquarters = context.headquarters()?;
            let assistant = context.assistant();
            to_outcome(softo::solve(&context.http, &assistant, &headquarters, tracer).await)?
        }
        Episode::Database => {
            let headquarters = context.headquarters()?;
            let model = &context.settings.openai.chat_model;
            to_outcome(database::solve(&context.http, &headquarters, llm, model, tracer).await)?
        }
        Episode::Whereabouts => {
            let headquarters = context.headquarters()?;
            let model = &context.settings.openai.chat_model;
            let city = to_outcome(
                whereabouts::find_location(&context.http, &headquarters, llm, model, tracer).await,
            )?;
            return Ok(Outcome::Answer(city));
        }
    };
    Ok(Outcome::Report(ack))
}

fn print_ack(ack: &ReportAck) {
    let code = if ack.code < 0 {
        style(ack.code.to_string()).bold().red()
    } else {
        style(ack.code.to_string()).bold().green()
    };
    println!("{} {} {}", style("headquarters").dim(), code, ack.message);
}
