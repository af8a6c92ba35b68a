use anyhow::Result;
use nichegarp::engines::evaluation::PerfIndex;
use nichegarp::engines::generation::{Rule, RuleKind};
use nichegarp::{Label, Sample};
use rand::rngs::StdRng;
use rand::SeedableRng;

const TOLERANCE: f64 = 1e-9;

fn grid_value(i: usize) -> f64 {
    (i as f64 - 10.0) / 10.0
}

/// 84 rows: 42 absences then 42 presences, every grid value twice per label,
/// both columns equal.
fn balanced_fixture() -> Vec<Sample> {
    let mut rows = Vec::with_capacity(84);
    for label in [Label::Absence, Label::Presence] {
        for i in 0..21 {
            for _ in 0..2 {
                let v = grid_value(i);
                rows.push(Sample::new(vec![v, v], label));
            }
        }
    }
    rows
}

/// 63 rows: 21 single absences then 42 duplicated presences.
fn presence_heavy_fixture() -> Vec<Sample> {
    let mut rows: Vec<Sample> = (0..21)
        .map(|i| Sample::absence(vec![grid_value(i), grid_value(i)]))
        .collect();
    for i in 0..21 {
        for _ in 0..2 {
            rows.push(Sample::presence(vec![grid_value(i), grid_value(i)]));
        }
    }
    rows
}

fn evaluated(kind: RuleKind, bound: f64, prediction: Label, samples: &[Sample]) -> Result<Rule> {
    let mut rule = Rule::with_genes(kind, vec![-bound, bound, -bound, bound], prediction)?;
    rule.ensure_evaluated(samples)?;
    Ok(rule)
}

#[test]
fn test_range_rule_on_balanced_fixture() -> Result<()> {
    let samples = balanced_fixture();
    assert_eq!(samples.len(), 84);

    for prediction in [Label::Presence, Label::Absence] {
        let rule = evaluated(RuleKind::Range, 0.51, prediction, &samples)?;
        assert!((rule.perf(PerfIndex::PriorStrength) - 0.5238095238).abs() < TOLERANCE);
        assert!((rule.perf(PerfIndex::PriorProbability) - 0.5).abs() < TOLERANCE);
    }
    Ok(())
}

#[test]
fn test_negated_rule_on_balanced_fixture() -> Result<()> {
    let samples = balanced_fixture();
    for prediction in [Label::Presence, Label::Absence] {
        let rule = evaluated(RuleKind::NegatedRange, 0.51, prediction, &samples)?;
        assert!((rule.perf(PerfIndex::PriorStrength) - 0.4761904762).abs() < TOLERANCE);
        assert!((rule.perf(PerfIndex::PriorProbability) - 0.5).abs() < TOLERANCE);
    }
    Ok(())
}

#[test]
fn test_range_rule_on_presence_heavy_fixture() -> Result<()> {
    let samples = presence_heavy_fixture();
    assert_eq!(samples.len(), 63);

    let rule = evaluated(RuleKind::Range, 0.51, Label::Presence, &samples)?;
    assert!((rule.perf(PerfIndex::PriorStrength) - 33.0 / 63.0).abs() < TOLERANCE);
    assert!((rule.perf(PerfIndex::PriorProbability) - 0.6666666667).abs() < TOLERANCE);

    let rule = evaluated(RuleKind::Range, 0.51, Label::Absence, &samples)?;
    assert!((rule.perf(PerfIndex::PriorStrength) - 33.0 / 63.0).abs() < TOLERANCE);
    assert!((rule.perf(PerfIndex::PriorProbability) - 0.3333333333).abs() < TOLERANCE);

    let everything = evaluated(RuleKind::Range, 1.01, Label::Presence, &samples)?;
    assert!((everything.perf(PerfIndex::PriorStrength) - 1.0).abs() < TOLERANCE);
    Ok(())
}

#[test]
fn test_repeated_evaluation_is_idempotent() -> Result<()> {
    let samples = balanced_fixture();
    let mut rule = evaluated(RuleKind::Range, 0.51, Label::Presence, &samples)?;
    let first = *rule.performance();
    assert!(!rule.needs_evaluation());

    let second = *rule.ensure_evaluated(&samples)?;
    assert_eq!(first, second);

    let mut rng = StdRng::seed_from_u64(8);
    rule.mutate(1.0, &mut rng);
    assert!(rule.needs_evaluation());
    rule.ensure_evaluated(&samples)?;
    assert!(!rule.needs_evaluation());
    Ok(())
}

#[test]
fn test_significance_needs_enough_selections() -> Result<()> {
    let samples: Vec<Sample> = (0..4)
        .map(|i| Sample::presence(vec![i as f64 / 10.0, 0.0]))
        .chain((0..4).map(|i| Sample::absence(vec![-(i as f64) / 10.0 - 0.1, 0.0])))
        .collect();
    let rule = evaluated(RuleKind::Range, 0.51, Label::Presence, &samples)?;
    assert_eq!(rule.perf(PerfIndex::Significance), 0.0);
    Ok(())
}
