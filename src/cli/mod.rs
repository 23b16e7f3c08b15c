//! CLI Module
//!
//! Command-line interface for soxframe.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{
    Alignment, DecoderKind, FinalFrame, Hop, SampleFormat, StreamConfig, Window,
};
use crate::error::Result;

/// soxframe - read audio files as a stream of fixed-size frames
#[derive(Parser, Debug)]
#[command(name = "soxframe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a file and print one line per frame
    #[command(name = "frames")]
    Frames {
        /// Audio file to read
        path: PathBuf,

        #[command(flatten)]
        stream: StreamArgs,

        /// Print frames as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show channel count, sample rate and duration of a file
    #[command(name = "info")]
    Info {
        /// Audio file to inspect
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report which decoders can be run
    #[command(name = "check")]
    Check,
}

/// Stream configuration flags; anything unset keeps the config file's value
#[derive(Args, Debug, Default)]
pub struct StreamArgs {
    /// JSON stream configuration to start from
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Target sample rate in Hz
    #[arg(short = 'r', long)]
    pub rate: Option<u32>,

    /// Target channel count
    #[arg(short, long)]
    pub channels: Option<u16>,

    /// Sample format: s8, s16, s24, s32, f32
    #[arg(long)]
    pub format: Option<SampleFormat>,

    /// Samples per channel in each frame
    #[arg(short = 'n', long)]
    pub frame_size: Option<usize>,

    /// Hop between frames in samples
    #[arg(long, conflicts_with_all = ["overlap", "frame_rate"])]
    pub hop: Option<usize>,

    /// Overlap between neighbouring frames, in [0, 1)
    #[arg(long, conflicts_with = "frame_rate")]
    pub overlap: Option<f64>,

    /// Frames per second
    #[arg(long)]
    pub frame_rate: Option<f64>,

    /// Last frame policy: zero-pad, short, discard
    #[arg(long)]
    pub final_frame: Option<FinalFrame>,

    /// Analysis window: rectangular, hann, hamming, blackman, nuttall, triangular
    #[arg(long)]
    pub window: Option<Window>,

    /// Frame alignment around each hop position: left, center, right
    #[arg(long)]
    pub alignment: Option<Alignment>,

    /// Shift every frame by this many seconds (may be negative)
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<f64>,

    /// Decoder: sox, ffmpeg, native-wav, auto
    #[arg(long)]
    pub decoder: Option<DecoderKind>,

    /// Per-read timeout in milliseconds (0 disables it)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl StreamArgs {
    /// Build the stream config: file (or defaults) first, then flags
    pub fn to_config(&self) -> Result<StreamConfig> {
        let mut config = match &self.config {
            Some(path) => StreamConfig::from_json_file(path)?,
            None => StreamConfig::default(),
        };

        if let Some(rate) = self.rate {
            config.sample_rate = rate;
        }
        if let Some(channels) = self.channels {
            config.channels = channels;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(frame_size) = self.frame_size {
            config.frame_size = frame_size;
        }
        if let Some(hop) = self.hop {
            config.hop = Hop::Samples(hop);
        } else if let Some(overlap) = self.overlap {
            config.hop = Hop::Overlap(overlap);
        } else if let Some(frame_rate) = self.frame_rate {
            config.hop = Hop::FrameRate(frame_rate);
        }
        if let Some(final_frame) = self.final_frame {
            config.final_frame = final_frame;
        }
        if let Some(window) = self.window {
            config.window = window;
        }
        if let Some(alignment) = self.alignment {
            config.alignment = alignment;
        }
        if let Some(offset) = self.offset {
            config.offset_secs = offset;
        }
        if let Some(decoder) = self.decoder {
            config.decoder = decoder;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.read_timeout_ms = (timeout_ms > 0).then_some(timeout_ms);
        }

        Ok(config)
    }
}
