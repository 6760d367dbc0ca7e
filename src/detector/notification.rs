//! Evaluación pura de reglas: construcción de notificaciones y recorrido de
//! expresiones. No toca stores ni configuración.

use crate::model::{Clause, Event, Expression, MonitorPoint, Notification};
use std::collections::VecDeque;

/// Builds one notification for every run of `threshold.count` consecutive
/// type-matching events whose span fits in the threshold interval.
/// `events` must be sorted ascending by timestamp; the result is sorted
/// ascending by end time.
pub fn build_notifications(events: &[Event], points: &[&MonitorPoint]) -> Vec<Notification> {
    let mut notifications = Vec::new();

    for point in points {
        let threshold = match point.threshold {
            Some(t) if t.count > 0 => t,
            _ => {
                tracing::warn!("Monitor point {} has no usable threshold, ignoring", point);
                continue;
            }
        };
        let count = threshold.count as usize;
        let interval_ms = threshold.interval.to_millis();

        let mut queue: VecDeque<&Event> = VecDeque::with_capacity(count);
        for event in events.iter().filter(|e| e.detection_point.type_matches(point)) {
            queue.push_back(event);

            if queue.len() >= count {
                if let (Some(head), Some(tail)) = (queue.front(), queue.back()) {
                    if (tail.timestamp - head.timestamp).num_milliseconds() <= interval_ms {
                        notifications.push(Notification::new(head.timestamp, tail.timestamp, (*point).clone()));
                    }
                }
                queue.pop_front();
            }
        }
    }

    notifications.sort_by_key(|n| n.end_time());
    notifications
}

/// Walks `expressions` in order over the notification queue and reports
/// whether every expression was satisfied in sequence.
pub fn evaluate_expressions(expressions: &[Expression], mut queue: VecDeque<Notification>) -> bool {
    let mut stages = expressions.iter();
    let mut window: Vec<Notification> = Vec::new();

    let Some(mut current) = stages.next() else {
        return false;
    };

    while let Some(next) = queue.pop_front() {
        let tail_end = next.end_time();
        let at = window.partition_point(|n| n.start_time <= next.start_time);
        window.insert(at, next);

        if let Some(expression_window) = current.window {
            let cutoff = expression_window.before(tail_end);
            window.retain(|n| n.start_time >= cutoff);
        }

        if !check_expression(current, &window) {
            continue;
        }

        match stages.next() {
            None => return true,
            Some(following) => {
                current = following;
                window.clear();
                queue.retain(|n| n.start_time > tail_end);
            }
        }
    }

    false
}

/// Alguna cláusula satisfecha
pub fn check_expression(expression: &Expression, window: &[Notification]) -> bool {
    expression.clauses.iter().any(|clause| check_clause(clause, window))
}

/// Todos los puntos de la cláusula presentes en la ventana
pub fn check_clause(clause: &Clause, window: &[Notification]) -> bool {
    clause
        .monitor_points
        .iter()
        .all(|point| window.iter().any(|n| n.detection_point == *point))
}
