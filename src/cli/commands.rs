// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `evaluate`, `history`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, PathBuf, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train (or resume training) a relation classifier
    Train(TrainArgs),

    /// Score a trained run on its test set
    Evaluate(EvaluateArgs),

    /// Show the per-epoch metrics recorded for a run
    History(HistoryArgs),
}

/// Compute device. Selected explicitly per call, never from
/// process-wide state.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    /// ndarray backend on the CPU
    Cpu,
    /// wgpu backend on the default GPU adapter
    Wgpu,
}

/// Flags shared by every subcommand that addresses one run.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory with checkpoints, metric buffers and relations.json
    #[arg(long, default_value = "data")]
    pub base_dir: PathBuf,

    /// Run id embedded in every file name of the run
    #[arg(long, default_value_t = 0)]
    pub model_no: u32,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// JSON Lines file of pre-tokenised training samples
    #[arg(long, default_value = "data/train.jsonl")]
    pub train_path: PathBuf,

    /// Separate test set; when omitted the training file is split
    #[arg(long)]
    pub test_path: Option<PathBuf>,

    /// Relation map ({"idx2rel": {...}}) to install as the run's
    /// relations.json; when omitted the existing one is used
    #[arg(long)]
    pub relations: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = DeviceKind::Cpu)]
    pub device: DeviceKind,

    /// Seed for the train/test split and batch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Share of samples kept for training when splitting
    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Total number of epochs, including any already completed
    #[arg(long, default_value_t = 11)]
    pub epochs: usize,

    #[arg(long, default_value_t = 7e-5)]
    pub lr: f64,

    /// Epochs at which the learning rate is multiplied by gamma
    #[arg(long, value_delimiter = ',', default_value = "2,4,6,8,12,15,18,20,22,24,26,30")]
    pub milestones: Vec<usize>,

    #[arg(long, default_value_t = 0.8)]
    pub gamma: f64,

    /// Maximum gradient norm; 0 disables clipping
    #[arg(long, default_value_t = 1.0)]
    pub grad_clip: f32,

    /// Hidden dimension of the encoder
    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 6)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Size of the tokenizer vocabulary the samples were encoded with
    #[arg(long, default_value_t = 30522)]
    pub vocab_size: usize,

    #[arg(long, default_value_t = 512)]
    pub max_seq_len: usize,

    /// Token id used for padding
    #[arg(long, default_value_t = 0)]
    pub pad_id: u32,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_path:     a.train_path,
            test_path:      a.test_path,
            base_dir:       a.run.base_dir,
            relations_path: a.relations,
            model_no:       a.run.model_no,
            seed:           a.seed,
            train_fraction: a.train_fraction,
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            lr:             a.lr,
            milestones:     a.milestones,
            gamma:          a.gamma,
            grad_clip:      (a.grad_clip > 0.0).then_some(a.grad_clip),
            d_model:        a.d_model,
            num_heads:      a.num_heads,
            num_layers:     a.num_layers,
            d_ff:           a.d_ff,
            dropout:        a.dropout,
            vocab_size:     a.vocab_size,
            max_seq_len:    a.max_seq_len,
            pad_id:         a.pad_id,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Score this JSON Lines file instead of the run's test set
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Use the latest checkpoint even when a best one exists
    #[arg(long)]
    pub latest: bool,

    #[arg(long, value_enum, default_value_t = DeviceKind::Cpu)]
    pub device: DeviceKind,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Also write the scalar columns to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Print the per-relation report of this epoch (1-based)
    #[arg(long)]
    pub report: Option<usize>,
}
