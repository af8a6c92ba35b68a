use super::rule::Rule;
use super::ruleset::RuleSet;
use super::seeding::SeedingPriors;
use crate::engines::evaluation::performance::PerfIndex;
use crate::error::{GarpError, Result};
use crate::types::Sample;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;

/// Fill `ruleset` up to `num_rules` with freshly seeded rules, picking the
/// kind uniformly among the four variants.
pub fn colonize<R: Rng>(ruleset: &mut RuleSet, num_rules: usize, priors: &SeedingPriors, rng: &mut R) {
    let target = num_rules.min(ruleset.size());
    while ruleset.num_rules() < target {
        let rule = random_rule(priors, rng);
        if ruleset.add(rule) == 0 {
            break;
        }
    }
}

/// Generate one rule of a random kind.
pub fn random_rule<R: Rng>(priors: &SeedingPriors, rng: &mut R) -> Rule {
    match rng.gen_range(0..4) {
        0 => priors.range_rule(rng),
        1 => priors.negated_rule(rng),
        2 => priors.logit_rule(rng),
        _ => priors.atomic_rule(rng),
    }
}

/// Evaluate every rule whose cached performance is stale.
pub fn evaluate_population(ruleset: &mut RuleSet, samples: &[Sample], parallel: bool) -> Result<()> {
    if parallel {
        ruleset
            .rules_mut()
            .par_iter_mut()
            .try_for_each(|rule| rule.ensure_evaluated(samples).map(|_| ()))
    } else {
        for rule in ruleset.iter_mut() {
            rule.ensure_evaluated(samples)?;
        }
        Ok(())
    }
}

/// Stochastic universal sampling: breed `ceil(gap_size * pop_size)` clones
/// from `source` into the cleared `target`, with expected copies
/// proportional to how far each rule's `index` exceeds the worst one.
pub fn select<R: Rng>(
    source: &RuleSet,
    target: &mut RuleSet,
    index: PerfIndex,
    pop_size: usize,
    gap_size: f64,
    rng: &mut R,
) -> Result<()> {
    target.clear();
    let n = source.num_rules();
    if n == 0 || pop_size == 0 {
        return Ok(());
    }

    let summary = source.performance_summary(index);
    let spread = summary.avg - summary.worst;
    let factor = if spread != 0.0 { 1.0 / spread } else { 1.0 };

    let mut picks: Vec<usize> = (0..pop_size).map(|i| i % n).collect();
    let mut pointer = rng.gen::<f64>();
    let mut sum = 0.0;
    let mut k = 0;
    for (i, rule) in source.iter().enumerate() {
        sum += (rule.perf(index) - summary.worst) * factor;
        while sum > pointer && k < pop_size {
            picks[k] = i;
            k += 1;
            pointer += 1.0;
        }
    }
    picks.shuffle(rng);

    let size = ((pop_size as f64) * gap_size).ceil() as usize;
    for &pick in picks.iter().take(size.min(pop_size)) {
        let Some(rule) = source.get(pick) else { continue };
        let mut clone = rule.clone();
        clone.force_evaluation();
        if target.add(clone) == 0 {
            return Err(GarpError::Algorithm(
                "Offspring rule set is full during selection".to_string(),
            ));
        }
    }
    Ok(())
}

/// Mutate each rule with probability `rate`. Returns the number mutated.
pub fn mutate_population<R: Rng>(ruleset: &mut RuleSet, temperature: f64, rate: f64, rng: &mut R) -> usize {
    let mut mutated = 0;
    for rule in ruleset.iter_mut() {
        if rng.gen::<f64>() < rate {
            rule.mutate(temperature, rng);
            mutated += 1;
        }
    }
    mutated
}

/// Cross random pairs of rules, `rate * n / 2` attempts in total. Pairs of
/// different kinds are skipped. Returns the number of pairs that changed.
pub fn crossover_population<R: Rng>(ruleset: &mut RuleSet, rate: f64, rng: &mut R) -> Result<usize> {
    let n = ruleset.num_rules();
    if n < 2 {
        return Ok(0);
    }
    let genes = ruleset.get(0).map(|r| r.dimension()).unwrap_or(0);
    if genes == 0 {
        return Ok(0);
    }

    let last = (rate * n as f64) as usize;
    let mut changed = 0;
    for _ in (0..last).step_by(2) {
        let mom = rng.gen_range(0..n);
        let mut dad = rng.gen_range(0..n);
        if dad == mom {
            dad = (dad + 1) % n;
        }
        let locus1 = rng.gen_range(0..genes);
        let locus2 = rng.gen_range(0..genes);

        if let Some((a, b)) = ruleset.pair_mut(mom, dad) {
            if !a.kind().same_variant(&b.kind()) {
                continue;
            }
            if a.crossover(b, locus1, locus2)? {
                changed += 1;
            }
        }
    }
    Ok(changed)
}

/// Merge evaluated `source` rules into the sorted `target`.
///
/// A rule occupying the niche of an existing one replaces it only when it
/// scores higher on `index`; otherwise new niches are inserted in order.
/// Returns how many candidates hit an existing niche.
pub fn keep_fittest(source: &RuleSet, target: &mut RuleSet, index: PerfIndex) -> Result<usize> {
    let mut hits = 0;
    for candidate in source {
        match target.find_similar(candidate) {
            Some(i) => {
                hits += 1;
                let better = target
                    .get(i)
                    .map(|existing| candidate.perf(index) > existing.perf(index))
                    .unwrap_or(false);
                if better {
                    target.remove(i);
                    insert_clone(target, index, candidate)?;
                }
            }
            None => insert_clone(target, index, candidate)?,
        }
    }
    Ok(hits)
}

fn insert_clone(target: &mut RuleSet, index: PerfIndex, rule: &Rule) -> Result<()> {
    target
        .insert_sorted(index, rule.clone())
        .map(|_| ())
        .map_err(|_| GarpError::Algorithm("Fittest rule set is full".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::rule::RuleKind;
    use crate::types::Label;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rule(genes: Vec<f64>, sig: f64) -> Rule {
        let mut r = Rule::with_genes(RuleKind::Range, genes, Label::Presence).unwrap();
        r.set_performance(PerfIndex::Significance, sig);
        r
    }

    #[test]
    fn test_keep_fittest_replaces_similar_only_when_better() {
        let mut fittest = RuleSet::new(10);
        fittest.add(rule(vec![-0.5, 0.5, -1.0, 1.0], 5.0));

        let mut offspring = RuleSet::new(10);
        offspring.add(rule(vec![-0.4, 0.4, -1.0, 1.0], 3.0));
        offspring.add(rule(vec![-0.3, 0.3, -1.0, 1.0], 8.0));
        offspring.add(rule(vec![-1.0, 1.0, -0.2, 0.2], 1.0));

        let hits = keep_fittest(&offspring, &mut fittest, PerfIndex::Significance).unwrap();
        assert_eq!(hits, 2);
        assert_eq!(fittest.num_rules(), 2);
        assert_eq!(fittest.get(0).unwrap().perf(PerfIndex::Significance), 8.0);
        assert_eq!(fittest.get(1).unwrap().perf(PerfIndex::Significance), 1.0);
    }

    #[test]
    fn test_select_breeds_gap_share() {
        let mut source = RuleSet::new(20);
        for i in 0..10 {
            source.add(rule(vec![-0.5, 0.5], i as f64));
        }
        let mut target = RuleSet::new(20);
        let mut rng = StdRng::seed_from_u64(2);
        select(&source, &mut target, PerfIndex::Significance, 10, 0.5, &mut rng).unwrap();
        assert_eq!(target.num_rules(), 5);
        assert!(target.iter().all(|r| r.needs_evaluation()));
        // the worst rule has zero expected copies
        assert!(target.iter().all(|r| r.perf(PerfIndex::Significance) > 0.0));
    }

    #[test]
    fn test_crossover_population_on_single_rule_is_noop() {
        let mut rs = RuleSet::new(2);
        rs.add(rule(vec![-0.5, 0.5], 1.0));
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(crossover_population(&mut rs, 1.0, &mut rng).unwrap(), 0);
    }
}
