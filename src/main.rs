//! Hermes demo: synthetic color and depth streams published over in-process channels

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::Result;
use flume::Receiver;
use hermes::capture::SyntheticHost;
use hermes::transport::{ChannelPublisher, Envelope, OwnedMessage, Publisher};
use hermes::{
    ColorCodec, ColorPipeline, DepthCodec, DepthPipeline, Publishers, StreamConfig, StreamKind,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hermes=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Hermes launching...");

    // Load configuration
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = hermes::load_config(path.as_deref())?;

    let (tx, rx) = flume::bounded::<Envelope>(64);
    let publishers = |kind: StreamKind, stream: &StreamConfig| -> Publishers {
        let topic = |name: &str| -> Arc<dyn Publisher> {
            Arc::new(ChannelPublisher::new(name, tx.clone()))
        };
        Publishers {
            image: topic(&stream.image_topic),
            camera_info: Some(topic(&stream.camera_info_topic)),
            transform: config
                .publishes_transform(kind)
                .then(|| topic(&stream.tf_topic)),
        }
    };

    let color = if config.color.enabled {
        let publishers = publishers(StreamKind::Color, &config.color);
        let pipeline = ColorPipeline::start(config.color.clone(), ColorCodec, publishers)?;
        Some(Arc::new(pipeline))
    } else {
        None
    };
    let depth = if config.depth.enabled {
        let publishers = publishers(StreamKind::Depth, &config.depth);
        let pipeline = DepthPipeline::start(config.depth.clone(), DepthCodec, publishers)?;
        Some(Arc::new(pipeline))
    } else {
        None
    };
    // Pipelines hold the remaining senders; the drain ends once they are gone
    drop(tx);

    let drain = tokio::spawn(drain_messages(rx));

    // Spawn the periodic scheduler standing in for the host's frame tick
    let stop = Arc::new(AtomicBool::new(false));
    let scheduler = std::thread::Builder::new()
        .name("hermes-scheduler".into())
        .spawn({
            let scheduler = Scheduler {
                color: color.clone(),
                depth: depth.clone(),
                color_host: SyntheticHost::new(config.color.width, config.color.height),
                depth_host: SyntheticHost::new(config.depth.width, config.depth.height),
                period: Duration::from_secs_f64(1.0 / f64::from(config.scheduler.tick_hz)),
                stop: Arc::clone(&stop),
            };
            move || scheduler.run()
        })?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    // Stop the scheduler first, then release anything it may be blocked on
    stop.store(true, Ordering::Release);
    if let Some(pipeline) = &color {
        pipeline.stop();
    }
    if let Some(pipeline) = &depth {
        pipeline.stop();
    }
    if scheduler.join().is_err() {
        tracing::error!("scheduler thread panicked");
    }
    drop((color, depth));

    let totals = drain.await?;
    for (topic, count) in totals {
        info!("{topic}: {count} messages");
    }

    info!("Hermes shutting down");
    Ok(())
}

struct Scheduler {
    color: Option<Arc<ColorPipeline>>,
    depth: Option<Arc<DepthPipeline>>,
    color_host: SyntheticHost,
    depth_host: SyntheticHost,
    period: Duration,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    /// Trigger every stream, then emit every stream, once per period.
    fn run(mut self) {
        info!(period = ?self.period, "scheduler started");
        let mut next = Instant::now();

        while !self.stop.load(Ordering::Acquire) {
            self.color_host.advance();
            self.depth_host.advance();

            if let Some(pipeline) = &self.color {
                pipeline.on_trigger(&mut self.color_host);
            }
            if let Some(pipeline) = &self.depth {
                pipeline.on_trigger(&mut self.depth_host);
            }
            if let Some(pipeline) = &self.color {
                pipeline.on_emit();
            }
            if let Some(pipeline) = &self.depth {
                pipeline.on_emit();
            }

            next += self.period;
            match next.checked_duration_since(Instant::now()) {
                Some(wait) => std::thread::sleep(wait),
                // Fell behind; don't try to catch up with a burst
                None => next = Instant::now(),
            }
        }

        info!("scheduler stopped");
    }
}

/// Consume published messages until every publisher is dropped, logging
/// throughput periodically. Returns the per-topic message totals.
async fn drain_messages(rx: Receiver<Envelope>) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::<String, u64>::new();
    let mut ticker = tokio::time::interval(STATS_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            received = rx.recv_async() => {
                let Ok(envelope) = received else { break };
                if let OwnedMessage::Image(image) = &envelope.message {
                    debug!(
                        topic = %envelope.topic,
                        encoding = image.encoding,
                        bytes = image.data.len(),
                        stamp = image.header.stamp.as_nanos(),
                        "image received"
                    );
                }
                *totals.entry(envelope.topic).or_default() += 1;
            }
            _ = ticker.tick() => {
                info!("published so far: {totals:?}");
            }
        }
    }

    totals
}
