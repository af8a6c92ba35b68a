use super::rule::Rule;
use crate::engines::evaluation::performance::PerfIndex;
use crate::types::Sample;

/// Best, worst and average of one performance statistic over a rule set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceSummary {
    pub best: f64,
    pub worst: f64,
    pub avg: f64,
}

/// Bounded, order-preserving population of rules.
///
/// Live rules always occupy a contiguous prefix; removals compact the set.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
    capacity: usize,
}

impl RuleSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            rules: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Capacity of the set.
    pub fn size(&self) -> usize {
        self.capacity
    }

    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.rules.len() >= self.capacity
    }

    /// Append `rule` and return its 1-based position, or 0 when the set is
    /// full or the rule has no genes.
    pub fn add(&mut self, rule: Rule) -> usize {
        if rule.is_empty() || self.is_full() {
            return 0;
        }
        self.rules.push(rule);
        self.rules.len()
    }

    pub fn get(&self, i: usize) -> Option<&Rule> {
        self.rules.get(i)
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Rule> {
        self.rules.get_mut(i)
    }

    /// Keep the first `n` rules.
    pub fn trim(&mut self, n: usize) {
        self.rules.truncate(n);
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Remove every rule whose `index` statistic is below `threshold`.
    pub fn filter(&mut self, index: PerfIndex, threshold: f64) {
        self.rules.retain(|r| r.perf(index) >= threshold);
    }

    /// Replace the rule at `i`. Fails without changes if `i` is not a live
    /// position or `rule` has no genes.
    pub fn replace(&mut self, i: usize, rule: Rule) -> bool {
        if rule.is_empty() || i >= self.rules.len() {
            return false;
        }
        self.rules[i] = rule;
        true
    }

    /// Insert keeping the set sorted in descending order of `index`. The rule
    /// goes before the first rule it strictly beats. Gives the rule back if
    /// the set is full.
    pub fn insert_sorted(&mut self, index: PerfIndex, rule: Rule) -> Result<usize, Rule> {
        if rule.is_empty() || self.is_full() {
            return Err(rule);
        }
        let value = rule.perf(index);
        let pos = self
            .rules
            .iter()
            .position(|r| value > r.perf(index))
            .unwrap_or(self.rules.len());
        self.rules.insert(pos, rule);
        Ok(pos)
    }

    /// Remove and return the rule at `i`, shifting later rules up.
    pub fn remove(&mut self, i: usize) -> Option<Rule> {
        if i < self.rules.len() {
            Some(self.rules.remove(i))
        } else {
            None
        }
    }

    /// Position of the first rule occupying the same niche as `rule`.
    pub fn find_similar(&self, rule: &Rule) -> Option<usize> {
        self.rules.iter().position(|r| r.similar(rule))
    }

    /// Prediction of the first rule that applies to `sample`, 0 otherwise.
    pub fn get_value(&self, sample: &Sample) -> f64 {
        self.rules
            .iter()
            .find(|r| r.applies(sample))
            .map(|r| r.prediction().value())
            .unwrap_or(0.0)
    }

    /// Best, worst and mean of `index` over the live rules; all zero when
    /// the set is empty.
    pub fn performance_summary(&self, index: PerfIndex) -> PerformanceSummary {
        if self.rules.is_empty() {
            return PerformanceSummary::default();
        }
        let mut best = f64::NEG_INFINITY;
        let mut worst = f64::INFINITY;
        let mut sum = 0.0;
        for rule in &self.rules {
            let v = rule.perf(index);
            best = best.max(v);
            worst = worst.min(v);
            sum += v;
        }
        PerformanceSummary {
            best,
            worst,
            avg: sum / self.rules.len() as f64,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Rule> {
        self.rules.iter_mut()
    }

    pub(crate) fn rules_mut(&mut self) -> &mut [Rule] {
        &mut self.rules
    }

    /// Mutable access to two distinct rules at once.
    pub(crate) fn pair_mut(&mut self, a: usize, b: usize) -> Option<(&mut Rule, &mut Rule)> {
        if a == b || a >= self.rules.len() || b >= self.rules.len() {
            return None;
        }
        if a < b {
            let (left, right) = self.rules.split_at_mut(b);
            Some((&mut left[a], &mut right[0]))
        } else {
            let (left, right) = self.rules.split_at_mut(a);
            Some((&mut right[0], &mut left[b]))
        }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
