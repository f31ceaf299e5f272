use hog_pairdict::config::train::{self as cfg, TrainToolConfig};
use hog_pairdict::learner::OnlineDictionaryLearner;
use hog_pairdict::stream::FileStream;
use hog_pairdict::{PairDictTrainer, PairedDictionary};
use std::env;
use std::path::Path;
use std::time::Instant;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = cfg::load_config(Path::new(&config_path))?;

    let stream = FileStream::from_spec(&config.input).map_err(|e| e.to_string())?;
    println!("Resolved {} training image(s)", stream.paths().len());

    let mut trainer = build_trainer(&config)?;
    let start = Instant::now();
    let model = trainer.train(&stream).map_err(|e| e.to_string())?;
    let elapsed = start.elapsed().as_secs_f64();

    model
        .save_json(&config.output.model_json)
        .map_err(|e| e.to_string())?;
    print_summary(&model, elapsed);
    println!(
        "Wrote paired dictionary to {}",
        config.output.model_json.display()
    );
    Ok(())
}

fn usage() -> String {
    "Usage: train_pairdict <config.json>".to_string()
}

fn build_trainer(config: &TrainToolConfig) -> Result<PairDictTrainer, String> {
    let whitening = config.whitening.resolve()?;
    let params = config.training.resolve(whitening);
    let solver = OnlineDictionaryLearner::new(config.solver.resolve());
    Ok(PairDictTrainer::new(params).with_solver(solver))
}

fn print_summary(model: &PairedDictionary, elapsed_s: f64) {
    println!("Training finished in {:.1} s", elapsed_s);
    println!(
        "  atoms={} gray={}x{} hog={}x{}",
        model.k,
        model.dgray.nrows(),
        model.dgray.ncols(),
        model.dhog.nrows(),
        model.dhog.ncols()
    );
    println!(
        "  patch={}x{} sbin={} lambda={} whitened={} fast={}",
        model.patch.ny, model.patch.nx, model.sbin, model.lambda, model.whitened, model.fast
    );
    println!("  images used: {}", model.images.len());
}
