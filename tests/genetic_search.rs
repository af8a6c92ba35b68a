use anyhow::Result;
use nichegarp::config::GarpConfig;
use nichegarp::data::InMemorySampleProvider;
use nichegarp::engines::evaluation::PerfIndex;
use nichegarp::engines::generation::{
    ChannelProgressCallback, GeneticSearch, LogProgressCallback, NoProgress, ProgressMessage, SearchState,
};
use nichegarp::{GarpError, Sample};
use std::sync::mpsc::channel;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Presences on the right half of the first feature, absences on the left.
/// The second feature is noise shared by both groups.
fn separable_provider() -> Result<InMemorySampleProvider> {
    let noise = |i: usize| ((i * 37) % 21) as f64 / 10.0 - 1.0;
    let presences = (0..60)
        .map(|i| Sample::presence(vec![0.3 + (i % 11) as f64 * 0.05, noise(i)]))
        .collect();
    let absences = (0..60)
        .map(|i| Sample::absence(vec![-0.8 + (i % 11) as f64 * 0.05, noise(i + 5)]))
        .collect();
    Ok(InMemorySampleProvider::new(presences, absences)?)
}

fn small_config(seed: u64) -> GarpConfig {
    GarpConfig::default()
        .with_population_size(20)
        .with_max_generations(30)
        .with_resamples(400)
        .with_seed(seed)
}

#[test]
fn test_search_learns_separable_data() -> Result<()> {
    init_logger();
    let provider = separable_provider()?;
    let mut search = GeneticSearch::new(small_config(42))?;
    let result = search.run(&provider, &mut LogProgressCallback)?;

    assert!(search.state().is_terminal());
    assert_eq!(result.converged, search.state() == SearchState::Converged);
    assert!(result.generations_run >= 1 && result.generations_run <= 30);
    assert!(!result.fittest.is_empty());
    assert!(result
        .fittest
        .iter()
        .all(|r| r.perf(PerfIndex::Significance) >= 2.70));
    assert_eq!(search.get_progress(), 1.0);

    let correct = provider
        .presences()
        .iter()
        .chain(provider.absences())
        .filter(|s| (search.get_value(s) - s.label().value()).abs() < 1e-12)
        .count();
    let accuracy = correct as f64 / 120.0;
    assert!(accuracy > 0.75, "accuracy {}", accuracy);
    Ok(())
}

#[test]
fn test_same_seed_same_rules() -> Result<()> {
    let provider = separable_provider()?;

    let mut serial = GeneticSearch::new(small_config(7))?;
    let a = serial.run(&provider, &mut NoProgress)?;

    let mut parallel = GeneticSearch::new(small_config(7).with_parallel_evaluation(true))?;
    let b = parallel.run(&provider, &mut NoProgress)?;

    assert_eq!(a.generations_run, b.generations_run);
    assert_eq!(a.fittest.num_rules(), b.fittest.num_rules());
    for (x, y) in a.fittest.iter().zip(b.fittest.iter()) {
        assert_eq!(x.kind(), y.kind());
        assert_eq!(x.genes(), y.genes());
        assert_eq!(x.performance(), y.performance());
    }
    Ok(())
}

#[test]
fn test_progress_reports_are_monotonic() -> Result<()> {
    let provider = separable_provider()?;
    let (tx, rx) = channel();
    let mut callback = ChannelProgressCallback::new(tx);

    let mut search = GeneticSearch::new(small_config(3))?;
    let result = search.run(&provider, &mut callback)?;
    drop(callback);

    let statuses: Vec<_> = rx
        .iter()
        .filter_map(|m| match m {
            ProgressMessage::GenerationComplete(status) => Some(status),
            _ => None,
        })
        .collect();

    assert_eq!(statuses.len(), result.generations_run);
    let mut last = 0.0;
    for (i, status) in statuses.iter().enumerate() {
        assert_eq!(status.generation, i + 1);
        assert!((0.0..=1.0).contains(&status.progress));
        assert!(status.progress >= last);
        assert!(status.best >= status.avg && status.avg >= status.worst);
        last = status.progress;
    }
    Ok(())
}

#[test]
fn test_presence_free_data_is_rejected() -> Result<()> {
    let absences = (0..10).map(|i| Sample::absence(vec![i as f64 / 10.0])).collect();
    let provider = InMemorySampleProvider::new(Vec::new(), absences)?;
    let mut search = GeneticSearch::new(small_config(1))?;
    let result = search.run(&provider, &mut NoProgress);
    assert!(matches!(result, Err(GarpError::Data(_))));
    Ok(())
}

#[test]
fn test_presence_only_data_without_background_is_rejected() -> Result<()> {
    let presences = (0..40).map(|i| Sample::presence(vec![i as f64 / 40.0, 0.0])).collect();
    let provider = InMemorySampleProvider::new(presences, Vec::new())?;
    let mut search = GeneticSearch::new(small_config(3))?;
    let result = search.run(&provider, &mut NoProgress);
    assert!(matches!(result, Err(GarpError::Data(_))));
    assert!(search.samples().is_empty());
    Ok(())
}

#[test]
fn test_time_limit_stops_long_search() -> Result<()> {
    let provider = separable_provider()?;
    let config = GarpConfig::default()
        .with_population_size(200)
        .with_resamples(20_000)
        .with_max_generations(100_000)
        .with_convergence_limit(0.0)
        .with_time_limit_ms(1)
        .with_seed(11);
    let mut search = GeneticSearch::new(config)?;
    let result = search.run(&provider, &mut NoProgress);
    assert!(matches!(result, Err(GarpError::Timeout(1))));
    Ok(())
}
