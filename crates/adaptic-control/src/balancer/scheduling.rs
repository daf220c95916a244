// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ordering of pending tasks per scheduling strategy.

use super::config::{DynamicWeights, SchedulingStrategy};
use super::task::{Task, TaskId};
use adaptic_core::workload::Priority;
use std::cmp::Ordering;

/// The part of a pending task the scheduler orders by.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Task id.
    pub id: TaskId,
    /// Task priority.
    pub priority: Priority,
    /// Queue position.
    pub sequence: i64,
    /// Time the task last entered the queue.
    pub queued_at_ms: u64,
    /// Absolute deadline.
    pub deadline_at_ms: Option<u64>,
    /// Units the task asks for.
    pub required_capacity: u32,
}

impl From<&Task> for Candidate {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            priority: task.priority,
            sequence: task.sequence,
            queued_at_ms: task.queued_at_ms,
            deadline_at_ms: task.deadline_at_ms,
            required_capacity: task.estimate.capacity,
        }
    }
}

/// Inputs shared by every comparison of one scheduling pass.
#[derive(Debug, Clone, Copy)]
pub struct SchedulingContext {
    /// Time of the pass.
    pub now_ms: u64,
    /// Units free at the start of the pass.
    pub available_capacity: u32,
    /// Age at which a task times out; normalizes waiting time.
    pub max_task_age_ms: u64,
    /// Time to deadline at which urgency is one half.
    pub deadline_horizon_ms: u64,
    /// Dynamic score weights.
    pub weights: DynamicWeights,
    /// Index of the class the fair strategy starts from.
    pub fair_cursor: usize,
}

fn by_priority(a: &Candidate, b: &Candidate) -> Ordering {
    b.priority.cmp(&a.priority)
}

fn by_sequence(a: &Candidate, b: &Candidate) -> Ordering {
    a.sequence.cmp(&b.sequence).then(a.id.cmp(&b.id))
}

fn by_deadline(a: &Candidate, b: &Candidate) -> Ordering {
    match (a.deadline_at_ms, b.deadline_at_ms) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Leftover units after placing the candidate; candidates that do not fit
/// sort after every fitting one.
fn fit_key(candidate: &Candidate, available: u32) -> (bool, u32) {
    if candidate.required_capacity <= available {
        (false, available - candidate.required_capacity)
    } else {
        (true, candidate.required_capacity - available)
    }
}

/// Weighted score of the dynamic strategy; higher runs first.
///
/// `w1·priority + w2·(1/time_to_deadline) + w3·resource_fit + w4·waiting_time`,
/// each term normalized to 0–1. Urgency is `h / (h + time_to_deadline)` for
/// the deadline horizon `h`, so it keeps ordering deadlines of any distance
/// and reaches 1 once a task is overdue.
pub fn dynamic_score(candidate: &Candidate, ctx: &SchedulingContext) -> f64 {
    let w = &ctx.weights;
    let priority = candidate.priority.weight() / Priority::Critical.weight();
    let urgency = candidate
        .deadline_at_ms
        .map(|deadline| {
            let left = (deadline as f64 - ctx.now_ms as f64).max(0.0);
            let horizon = ctx.deadline_horizon_ms.max(1) as f64;
            horizon / (horizon + left)
        })
        .unwrap_or(0.0);
    let fit = if candidate.required_capacity <= ctx.available_capacity && ctx.available_capacity > 0
    {
        candidate.required_capacity as f64 / ctx.available_capacity as f64
    } else {
        0.0
    };
    let waited = ctx.now_ms.saturating_sub(candidate.queued_at_ms) as f64;
    let waiting = (waited / ctx.max_task_age_ms.max(1) as f64).min(1.0);

    w.priority * priority + w.deadline * urgency + w.resource_fit * fit + w.waiting_time * waiting
}

/// Interleaves priority classes, taking one task per class in turn and
/// starting at the class selected by the cursor.
fn fair_order(mut candidates: Vec<Candidate>, cursor: usize) -> Vec<Candidate> {
    candidates.sort_by(by_sequence);
    let classes = Priority::CLASSES.len();
    let mut queues: Vec<Vec<Candidate>> = (0..classes)
        .map(|offset| {
            let class = Priority::CLASSES[(cursor + offset) % classes];
            candidates
                .iter()
                .filter(|c| c.priority == class)
                .cloned()
                .rev()
                .collect()
        })
        .collect();

    let mut ordered = Vec::with_capacity(candidates.len());
    while ordered.len() < candidates.len() {
        for queue in queues.iter_mut() {
            if let Some(next) = queue.pop() {
                ordered.push(next);
            }
        }
    }
    ordered
}

/// Returns `candidates` in the order they should be offered for admission.
pub fn order(
    strategy: SchedulingStrategy,
    mut candidates: Vec<Candidate>,
    ctx: &SchedulingContext,
) -> Vec<Candidate> {
    match strategy {
        SchedulingStrategy::Fifo => candidates.sort_by(by_sequence),
        SchedulingStrategy::Priority => {
            candidates.sort_by(|a, b| by_priority(a, b).then_with(|| by_sequence(a, b)))
        }
        SchedulingStrategy::DeadlineFirst => candidates.sort_by(|a, b| {
            by_deadline(a, b)
                .then_with(|| by_priority(a, b))
                .then_with(|| by_sequence(a, b))
        }),
        SchedulingStrategy::ResourceEfficiency => candidates.sort_by(|a, b| {
            fit_key(a, ctx.available_capacity)
                .cmp(&fit_key(b, ctx.available_capacity))
                .then_with(|| by_priority(a, b))
                .then_with(|| by_sequence(a, b))
        }),
        SchedulingStrategy::Dynamic => candidates.sort_by(|a, b| {
            dynamic_score(b, ctx)
                .total_cmp(&dynamic_score(a, ctx))
                .then_with(|| by_sequence(a, b))
        }),
        SchedulingStrategy::Fair => return fair_order(candidates, ctx.fair_cursor),
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u64, priority: Priority) -> Candidate {
        Candidate {
            id: TaskId(id),
            priority,
            sequence: id as i64,
            queued_at_ms: 0,
            deadline_at_ms: None,
            required_capacity: 1,
        }
    }

    fn ctx(now_ms: u64, available_capacity: u32) -> SchedulingContext {
        SchedulingContext {
            now_ms,
            available_capacity,
            max_task_age_ms: 10_000,
            deadline_horizon_ms: 10_000,
            weights: DynamicWeights::default(),
            fair_cursor: 0,
        }
    }

    fn ids(ordered: &[Candidate]) -> Vec<u64> {
        ordered.iter().map(|c| c.id.0).collect()
    }

    #[test]
    fn test_fifo_and_priority() {
        let candidates = vec![
            candidate(1, Priority::Low),
            candidate(2, Priority::High),
            candidate(3, Priority::Normal),
            candidate(4, Priority::High),
        ];
        let c = ctx(0, 8);
        assert_eq!(
            ids(&order(SchedulingStrategy::Fifo, candidates.clone(), &c)),
            vec![1, 2, 3, 4]
        );
        assert_eq!(
            ids(&order(SchedulingStrategy::Priority, candidates, &c)),
            vec![2, 4, 3, 1]
        );
    }

    #[test]
    fn test_deadline_dominates_priority() {
        let mut urgent_low = candidate(1, Priority::Low);
        urgent_low.deadline_at_ms = Some(5);
        let mut later_high = candidate(2, Priority::High);
        later_high.deadline_at_ms = Some(10);
        let no_deadline = candidate(3, Priority::Critical);
        let ordered = order(
            SchedulingStrategy::DeadlineFirst,
            vec![no_deadline, later_high, urgent_low],
            &ctx(0, 8),
        );
        assert_eq!(ids(&ordered), vec![1, 2, 3]);
    }

    #[test]
    fn test_resource_efficiency_prefers_best_fit() {
        let mut small = candidate(1, Priority::Normal);
        small.required_capacity = 2;
        let mut exact = candidate(2, Priority::Normal);
        exact.required_capacity = 6;
        let mut too_big = candidate(3, Priority::Critical);
        too_big.required_capacity = 9;
        let ordered = order(
            SchedulingStrategy::ResourceEfficiency,
            vec![small, exact, too_big],
            &ctx(0, 6),
        );
        assert_eq!(ids(&ordered), vec![2, 1, 3]);
    }

    #[test]
    fn test_dynamic_score_rewards_urgency_and_waiting() {
        let c = ctx(5_000, 8);
        let fresh = Candidate {
            queued_at_ms: 5_000,
            ..candidate(1, Priority::Normal)
        };
        let waited = Candidate {
            queued_at_ms: 0,
            ..candidate(2, Priority::Normal)
        };
        assert!(dynamic_score(&waited, &c) > dynamic_score(&fresh, &c));

        let urgent = Candidate {
            id: TaskId(3),
            sequence: 3,
            deadline_at_ms: Some(5_500),
            ..fresh.clone()
        };
        assert!(dynamic_score(&urgent, &c) > dynamic_score(&fresh, &c));
        let ordered = order(SchedulingStrategy::Dynamic, vec![fresh, urgent], &c);
        assert_eq!(ids(&ordered), vec![3, 1]);
    }

    #[test]
    fn test_dynamic_urgency_orders_sub_second_deadlines() {
        let c = ctx(1_000, 8);
        let due = |id: u64, deadline: u64| Candidate {
            deadline_at_ms: Some(deadline),
            ..candidate(id, Priority::Normal)
        };
        let later = due(1, 1_900);
        let sooner = due(2, 1_100);
        let overdue = due(3, 900);

        assert!(dynamic_score(&sooner, &c) > dynamic_score(&later, &c));
        assert!(dynamic_score(&overdue, &c) > dynamic_score(&sooner, &c));
        let ordered = order(SchedulingStrategy::Dynamic, vec![later, sooner, overdue], &c);
        assert_eq!(ids(&ordered), vec![3, 2, 1]);
    }

    #[test]
    fn test_fair_round_robin_rotates() {
        let candidates = vec![
            candidate(1, Priority::High),
            candidate(2, Priority::High),
            candidate(3, Priority::Low),
            candidate(4, Priority::Low),
        ];
        let mut c = ctx(0, 8);
        assert_eq!(
            ids(&order(SchedulingStrategy::Fair, candidates.clone(), &c)),
            vec![1, 3, 2, 4]
        );
        // Cursor 3 starts at the Low class.
        c.fair_cursor = 3;
        assert_eq!(
            ids(&order(SchedulingStrategy::Fair, candidates, &c)),
            vec![3, 1, 4, 2]
        );
    }
}
