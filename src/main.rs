use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{builder::ValueParser, Arg, ArgAction, ArgMatches, Command};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use util::config::{PipelineFiles, CAPTURE_TEMPLATE_FILE, DEFAULT_PIPELINE_FILE};
use util::{validator, ErrorKind};
use video::gst::{DisplayWindow, FileWriter};
use video::playback::{FrameLoop, Outcome};
use video::resolver::{self, Source};
use video::{Error, FrameSink, StopFlag, ViewerContext};

fn command() -> Command {
    Command::new("vidview")
        .about("Show a video file, image, capture card or pipeline in a window")
        .arg(
            Arg::new("source")
                .value_name("SOURCE [DEVICE_INDEX]")
                .help("Video file, image file, or capture-card keyword followed by a device index")
                .num_args(0..)
                .allow_hyphen_values(true)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .env("VIDVIEW_OUTPUT")
                .help("Record shown frames to this mp4, avi or webm file; put it before SOURCE")
                .value_parser(ValueParser::new(validator::parse_output_path))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("default-pipeline")
                .long("default-pipeline")
                .env("VIDVIEW_DEFAULT_PIPELINE")
                .default_value(DEFAULT_PIPELINE_FILE)
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("capture-template")
                .long("capture-template")
                .env("VIDVIEW_CAPTURE_TEMPLATE")
                .default_value(CAPTURE_TEMPLATE_FILE)
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
}

fn main() -> ExitCode {
    // RUST_LOG overrides the default level, e.g. RUST_LOG=video=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let matches = command().get_matches();

    match run(&matches) {
        Ok(outcome) => {
            info!(?outcome, "Viewer finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(matches: &ArgMatches) -> Result<Outcome, Error> {
    let program = env::args().next().unwrap_or_else(|| "vidview".to_string());
    let spec = validator::parse_source(&program, &source_tokens(matches))?;
    let files = pipeline_files(matches);

    let stop = StopFlag::new();
    let handler_flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.request()) {
        warn!(%e, "Unable to install interrupt handler, Ctrl+C will not stop playback cleanly");
    }
    let context = ViewerContext::new(stop);

    let mut source = resolver::plan(&spec, &files)?.open()?;
    let title = if spec.is_default() { "vidview" } else { spec.name.as_str() };
    let mut window = DisplayWindow::open(title)?;
    let mut writer = matches
        .get_one::<PathBuf>("output")
        .map(|path| FileWriter::open(path))
        .transpose()?;

    let frame_loop = FrameLoop::new(&context);
    let sink = writer.as_mut().map(|w| w as &mut dyn FrameSink);
    let outcome = match &mut source {
        Source::Stream(capture) => frame_loop.run(capture, &mut window, sink),
        Source::Still(frame) => frame_loop.show_still(frame, &mut window, sink),
    };

    let released = release(writer, window, source);
    let outcome = outcome?;
    released?;
    Ok(outcome)
}

fn source_tokens(matches: &ArgMatches) -> Vec<String> {
    matches
        .get_many::<String>("source")
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

// both paths carry clap defaults
fn pipeline_files(matches: &ArgMatches) -> PipelineFiles {
    let path = |id: &str| matches.get_one::<PathBuf>(id).cloned().unwrap_or_default();
    PipelineFiles {
        default_pipeline: path("default-pipeline"),
        capture_template: path("capture-template"),
    }
}

/// Release in reverse order of acquisition, reporting the first failure.
fn release(
    writer: Option<FileWriter>,
    mut window: DisplayWindow,
    source: Source,
) -> Result<(), Error> {
    let mut result = Ok(());
    if let Some(mut writer) = writer {
        result = result.and(writer.close());
    }
    result = result.and(window.close());
    if let Source::Stream(mut capture) = source {
        result = result.and(capture.close());
    }
    result
}

fn report(e: &Error) {
    error!("{}", failure_message(e));
}

fn failure_message(e: &Error) -> String {
    match e.kind() {
        ErrorKind::InvalidArgument => format!("Invalid argument: {}", e),
        ErrorKind::OutOfRange => format!("Out of range error: {}", e),
        ErrorKind::Runtime => format!("Runtime error: {}", e),
        ErrorKind::Generic => format!("An error occurred: {}", e),
    }
}
