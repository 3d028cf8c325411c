use clap::{Parser, Subcommand};
use nalgebra as na;
use passthrough_anchors::gateway::{InferenceResponse, Prediction, RecordedReply};
use passthrough_anchors::camera_model::PinholeParams;
use passthrough_anchors::io::{object_from_json, object_to_json};
use passthrough_anchors::visualization::LogRenderHost;
use passthrough_anchors::{
    FrameSampler, HttpInferenceGateway, InferenceGateway, PinholeCamera, PipelineConfig,
    PlaneRaycaster, ReplayGateway, StillImageSource, StreamingController,
};
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded inference replies against a synthetic camera and floor
    Replay {
        /// Pipeline configuration JSON
        #[arg(short, long)]
        config: String,

        /// Recorded replies JSON
        #[arg(short, long)]
        recording: String,

        /// Live camera width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Live camera height
        #[arg(long, default_value = "960")]
        height: u32,

        /// Horizontal field of view in degrees
        #[arg(long, default_value = "80")]
        hfov: f32,

        /// Pinhole intrinsics JSON, overrides width/height/hfov
        #[arg(long)]
        intrinsics: Option<String>,

        /// Camera height above the floor in meters
        #[arg(long, default_value = "1.6")]
        eye_height: f32,

        /// Camera pitch in degrees, negative looks down
        #[arg(long, default_value = "-35", allow_hyphen_values = true)]
        pitch: f32,

        /// Stop after this many cycles (defaults to one per recorded reply)
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Send one image to the configured inference service
    Probe {
        /// Pipeline configuration JSON
        #[arg(short, long)]
        config: String,

        /// Image file to send
        #[arg(short, long)]
        image: String,

        /// Append the reply to a recording usable by `replay`
        #[arg(long)]
        record: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Commands::Replay {
            config,
            recording,
            width,
            height,
            hfov,
            intrinsics,
            eye_height,
            pitch,
            cycles,
        } => {
            let camera = match intrinsics {
                Some(path) => {
                    let params: PinholeParams = object_from_json(&path)?;
                    PinholeCamera::from_params(&params)
                }
                None => PinholeCamera::from_fov(hfov.to_radians(), width, height),
            };
            replay(&config, &recording, camera, eye_height, pitch, cycles)
        }
        Commands::Probe {
            config,
            image,
            record,
        } => probe(&config, &image, record.as_deref()),
    }
}

fn replay(
    config_path: &str,
    recording_path: &str,
    camera: PinholeCamera,
    eye_height: f32,
    pitch_deg: f32,
    cycles: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::load(config_path)?;
    let gateway = ReplayGateway::load(recording_path)?;
    let cycles = cycles.unwrap_or(gateway.remaining());

    // camera frame is y-down/z-forward; the world is y-up with -z forward
    let rotation = na::UnitQuaternion::from_axis_angle(
        &na::Vector3::x_axis(),
        std::f32::consts::PI + pitch_deg.to_radians(),
    );
    let pose = na::Isometry3::from_parts(
        na::Translation3::new(0.0, eye_height, 0.0),
        rotation,
    );
    let source = StillImageSource::blank(camera.with_pose(pose));

    let mut controller = StreamingController::new(
        &config,
        source,
        gateway,
        PlaneRaycaster::floor(0.0),
        LogRenderHost::default(),
    )?;
    controller.schedule_auto_start(Instant::now());
    if config.auto_start_delay().is_none() {
        controller.start();
    } else {
        while !controller.is_active() {
            controller.tick(Instant::now());
            std::thread::sleep(config.cycle_interval());
        }
    }
    let ran = controller.run(Some(cycles));
    controller.stop();

    println!("ran {} cycles", ran);
    for marker in controller.registry().markers() {
        println!(
            "{:>4} {:<16} last label {:?} at ({:.3}, {:.3}, {:.3}){}",
            marker.class_id,
            marker.label,
            marker.label_text,
            marker.position.x,
            marker.position.y,
            marker.position.z,
            if marker.last_seen_at.is_some() {
                ""
            } else {
                " (never seen)"
            }
        );
    }
    Ok(())
}

fn probe(
    config_path: &str,
    image_path: &str,
    record_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::load(config_path)?;
    let img = image::open(image_path)?.to_rgb8();
    let mut sampler = FrameSampler::new(config.encoded_size());
    let frame = sampler.encode(&img)?;

    let mut gateway = HttpInferenceGateway::new(&config.service);
    log::info!("sending {} to {}", image_path, gateway.url());
    let detections = gateway.infer(&config.model_id, &frame.image_base64)?;

    for d in &detections {
        println!(
            "{:>4} {:<16} {:.2} at ({:.1}, {:.1}) size {:.1}x{:.1}{}",
            d.class_id,
            d.label,
            d.confidence,
            d.center_x,
            d.center_y,
            d.width,
            d.height,
            if d.confidence >= config.min_confidence {
                ""
            } else {
                " (below threshold)"
            }
        );
    }

    if let Some(path) = record_path {
        let mut replies: Vec<RecordedReply> = if std::path::Path::new(path).exists() {
            object_from_json(path)?
        } else {
            Vec::new()
        };
        replies.push(RecordedReply::Response(InferenceResponse {
            predictions: detections.into_iter().map(Prediction::from).collect(),
            ..Default::default()
        }));
        object_to_json(path, &replies)?;
        println!("recorded {} replies in {}", replies.len(), path);
    }
    Ok(())
}
