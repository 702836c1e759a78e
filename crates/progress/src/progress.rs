//! Feature completion.

use std::collections::HashMap;

use roadmap_core::{Feature, ProgressMethod, Task, TaskId};

/// Completion percentage of a feature, in `[0, 100]`.
///
/// Only member tasks present in `tasks` count. A zero denominator yields 0.
pub fn compute_progress(feature: &Feature, tasks: &[Task], method: ProgressMethod) -> f64 {
    let pool = index(tasks);
    progress_in(feature, &pool, method)
}

/// Set `progress_percent` on every feature.
pub fn apply_progress(features: &mut [Feature], tasks: &[Task], method: ProgressMethod) {
    let pool = index(tasks);
    for feature in features.iter_mut() {
        feature.progress_percent = progress_in(feature, &pool, method);
    }
}

fn index(tasks: &[Task]) -> HashMap<&TaskId, &Task> {
    tasks.iter().map(|t| (&t.id, t)).collect()
}

fn progress_in(feature: &Feature, pool: &HashMap<&TaskId, &Task>, method: ProgressMethod) -> f64 {
    let members = feature.task_ids.iter().filter_map(|id| pool.get(id).copied());

    let (done, total) = match method {
        ProgressMethod::TaskCount => members.fold((0.0, 0.0), |(done, total), t| {
            (if t.status.is_done() { done + 1.0 } else { done }, total + 1.0)
        }),
        ProgressMethod::StoryPoints => members.fold((0.0, 0.0), |(done, total), t| {
            let points = t.story_points.unwrap_or(0.0);
            (if t.status.is_done() { done + points } else { done }, total + points)
        }),
    };

    if total <= 0.0 {
        return 0.0;
    }
    (100.0 * done / total).clamp(0.0, 100.0)
}
