// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`    — trains or resumes a run
//   2. `evaluate` — restores a checkpoint and scores the test set
//   3. `history`  — prints the per-epoch metric buffers
//
// The --device flag is resolved to a concrete burn backend here
// and nowhere else.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::backend::{
    ndarray::NdArrayDevice,
    wgpu::WgpuDevice,
    Autodiff, NdArray, Wgpu,
};
use clap::Parser;
use commands::{Commands, DeviceKind, EvaluateArgs, HistoryArgs, RunArgs, TrainArgs};

use crate::domain::metrics::{
    ClassificationReport, EvaluationOutcome, ACCURACY_KEY, MACRO_AVG_KEY, WEIGHTED_AVG_KEY,
};
use crate::infra::{metrics::ResultsBuffer, paths::RunPaths};

#[derive(Parser, Debug)]
#[command(
    name = "relex",
    version,
    about = "Train and evaluate an entity-marker relation classifier."
)]
pub struct Cli {
    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl RunArgs {
    fn paths(&self) -> RunPaths {
        RunPaths::new(&self.base_dir, self.model_no)
    }
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::History(args)  => run_history(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let device = args.device;
    tracing::info!("Training on samples from: {}", args.train_path.display());

    let use_case = TrainUseCase::new(args.into());
    let summary  = match device {
        DeviceKind::Cpu  => use_case.execute::<Autodiff<NdArray>>(NdArrayDevice::Cpu)?,
        DeviceKind::Wgpu => use_case.execute::<Autodiff<Wgpu>>(WgpuDevice::default())?,
    };

    println!(
        "Training complete: {} new epochs, {} recorded, best test F1 {:.3}",
        summary.epochs_run,
        summary.results.len(),
        summary.best_metric
    );
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let use_case = EvaluateUseCase::new(args.run.paths(), args.data_path, !args.latest);
    let outcome  = match args.device {
        DeviceKind::Cpu  => use_case.execute::<NdArray>(NdArrayDevice::Cpu)?,
        DeviceKind::Wgpu => use_case.execute::<Wgpu>(WgpuDevice::default())?,
    };

    print_outcome(&outcome);
    Ok(())
}

fn run_history(args: HistoryArgs) -> Result<()> {
    use crate::application::history_use_case::HistoryUseCase;

    let results = HistoryUseCase::new(args.run.paths(), args.csv).execute()?;
    print_history(&results);

    if let Some(epoch) = args.report {
        let report = epoch
            .checked_sub(1)
            .and_then(|i| results.reports().get(i))
            .ok_or_else(|| {
                anyhow::anyhow!("No report for epoch {} ({} recorded)", epoch, results.len())
            })?;
        println!("\nEpoch {epoch}");
        print_report(report);
    }
    Ok(())
}

fn print_outcome(outcome: &EvaluationOutcome) {
    let r = &outcome.results;
    println!("\naccuracy (batch mean) = {:.3}", r.accuracy);
    println!("span P/R/F1           = {:.3} / {:.3} / {:.3}", r.precision, r.recall, r.f1);
    println!(
        "micro  P/R/F1         = {:.3} / {:.3} / {:.3}",
        outcome.micro.precision, outcome.micro.recall, outcome.micro.f1
    );
    println!(
        "macro  P/R/F1         = {:.3} / {:.3} / {:.3}",
        outcome.macro_avg.precision, outcome.macro_avg.recall, outcome.macro_avg.f1
    );

    print_report(&outcome.report);
}

fn print_report(report: &ClassificationReport) {
    println!("\n{:<40} {:>9} {:>9} {:>9} {:>8}", "relation", "precision", "recall", "f1-score", "support");
    for (name, row) in &report.classes {
        println!(
            "{:<40} {:>9.3} {:>9.3} {:>9.3} {:>8}",
            name, row.precision, row.recall, row.f1_score, row.support
        );
    }
    println!("\n{:<40} {:>9} {:>9} {:>9.3}", ACCURACY_KEY, "", "", report.accuracy);
    for key in [MACRO_AVG_KEY, WEIGHTED_AVG_KEY] {
        if let Some(row) = report.row(key) {
            println!(
                "{:<40} {:>9.3} {:>9.3} {:>9.3} {:>8}",
                key, row.precision, row.recall, row.f1_score, row.support
            );
        }
    }
}

fn print_history(results: &ResultsBuffer) {
    if results.is_empty() {
        println!("No epochs recorded.");
        return;
    }

    println!(
        "{:>5} {:>10} {:>9} {:>8} {:>8} {:>8} {:>8} {:>7} {:>7} {:>7} {:>7}",
        "epoch", "loss", "train_acc", "test_f1", "f1_mic", "f1_mac", "test_acc",
        "p_mic", "r_mic", "p_mac", "r_mac"
    );
    for i in 0..results.len() {
        let micro = &results.precision_recall_micro()[i];
        let macro_avg = &results.precision_recall_macro()[i];
        println!(
            "{:>5} {:>10.4} {:>9.3} {:>8.3} {:>8.3} {:>8.3} {:>8.3} {:>7.3} {:>7.3} {:>7.3} {:>7.3}",
            i + 1,
            results.losses()[i],
            results.train_accuracy()[i],
            results.f1()[i],
            results.f1_micro()[i],
            results.f1_macro()[i],
            results.test_accuracy()[i],
            micro.precision,
            micro.recall,
            macro_avg.precision,
            macro_avg.recall,
        );
    }
}
