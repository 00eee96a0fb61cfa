use crate::escalation;
use crate::priority::{calculate, weight_sum, PriorityBand, PriorityFactors};
use crate::queue;
use chrono::{Duration, Utc};
use oxdesk_common::types::{EscalationLevel, Priority, TicketSnapshot, TicketStatus};

fn uniform_factors(value: f64) -> PriorityFactors {
    PriorityFactors {
        business_impact: value,
        customer_value: value,
        urgency: value,
        complexity: value,
        resource_availability: value,
        sla_risk: value,
    }
}

fn make_ticket(id: &str, priority: Priority, status: TicketStatus, mins_ago: i64) -> TicketSnapshot {
    TicketSnapshot {
        id: id.to_string(),
        priority,
        status,
        created_at: Utc::now() - Duration::minutes(mins_ago),
    }
}

// ---- Priority calculator ----

#[test]
fn weights_sum_to_one() {
    assert!((weight_sum() - 1.0).abs() < 1e-9);
}

#[test]
fn final_score_stays_in_range_for_any_input() {
    for raw in [-10.0, -0.1, 0.0, 2.5, 5.0, 5.1, 99.0, f64::NAN] {
        let score = calculate(&uniform_factors(raw));
        assert!(
            (0.0..=5.0).contains(&score.final_score),
            "score {} out of range for factor {}",
            score.final_score,
            raw
        );
    }
}

#[test]
fn uniform_factors_score_themselves() {
    let score = calculate(&uniform_factors(3.0));
    assert!((score.final_score - 3.0).abs() < 1e-9);
    assert_eq!(score.band, PriorityBand::High);
    assert_eq!(score.priority, Priority::High);
}

#[test]
fn band_thresholds_match_observed_behavior() {
    assert_eq!(calculate(&uniform_factors(4.5)).band, PriorityBand::Critical);
    assert_eq!(calculate(&uniform_factors(3.8)).band, PriorityBand::Urgent);
    assert_eq!(calculate(&uniform_factors(2.5)).band, PriorityBand::High);
    assert_eq!(calculate(&uniform_factors(1.5)).band, PriorityBand::Medium);
    assert_eq!(calculate(&uniform_factors(0.5)).band, PriorityBand::Low);
}

#[test]
fn critical_band_collapses_to_urgent_ticket_priority() {
    let score = calculate(&uniform_factors(5.0));
    assert_eq!(score.band, PriorityBand::Critical);
    assert_eq!(score.priority, Priority::Urgent);
}

#[test]
fn out_of_range_factors_are_clamped_not_rejected() {
    let factors = PriorityFactors {
        business_impact: 50.0,
        customer_value: -3.0,
        urgency: 5.0,
        complexity: 0.0,
        resource_availability: 0.0,
        sla_risk: 0.0,
    };
    let score = calculate(&factors);
    // 5*0.25 + 0*0.20 + 5*0.20 = 2.25
    assert!((score.final_score - 2.25).abs() < 1e-9);
}

#[test]
fn tight_factor_cluster_scores_higher_confidence_than_wide_spread() {
    let tight = calculate(&uniform_factors(3.0));
    let wide = calculate(&PriorityFactors {
        business_impact: 5.0,
        customer_value: 0.0,
        urgency: 5.0,
        complexity: 0.0,
        resource_availability: 5.0,
        sla_risk: 0.0,
    });
    assert!(tight.confidence > wide.confidence);
    assert_eq!(tight.confidence, 100);
    assert_eq!(wide.confidence, 70);
}

#[test]
fn priority_calculation_is_idempotent() {
    let factors = uniform_factors(3.7);
    let a = calculate(&factors);
    let b = calculate(&factors);
    assert_eq!(a.final_score, b.final_score);
    assert_eq!(a.band, b.band);
    assert_eq!(a.confidence, b.confidence);
}

// ---- Escalation stepper ----

#[test]
fn deadline_in_the_past_always_steps_to_breach() {
    let now = Utc::now();
    let deadline = now - Duration::minutes(30);
    for current in [
        EscalationLevel::None,
        EscalationLevel::Watch,
        EscalationLevel::Elevated,
        EscalationLevel::Critical,
    ] {
        let step = escalation::step(current, deadline, now).expect("should step");
        assert_eq!(step.level, EscalationLevel::Breach);
        assert_eq!(step.action, "deadline_breached");
        assert!(step.hours_remaining < 0.0);
    }
}

#[test]
fn thresholds_map_to_expected_levels() {
    let now = Utc::now();
    let cases = [
        (Duration::minutes(30), EscalationLevel::Critical),
        (Duration::minutes(90), EscalationLevel::Elevated),
        (Duration::hours(3), EscalationLevel::Watch),
    ];
    for (remaining, expected) in cases {
        let step = escalation::step(EscalationLevel::None, now + remaining, now)
            .expect("should step");
        assert_eq!(step.level, expected);
        assert_eq!(step.action, "threshold_crossed");
    }
}

#[test]
fn no_step_when_deadline_is_far_out() {
    let now = Utc::now();
    let deadline = now + Duration::hours(8);
    assert!(escalation::step(EscalationLevel::None, deadline, now).is_none());
}

#[test]
fn level_never_moves_backward() {
    let now = Utc::now();
    // 3h remaining maps to watch, but the record is already critical.
    let deadline = now + Duration::hours(3);
    assert!(escalation::step(EscalationLevel::Critical, deadline, now).is_none());
}

#[test]
fn level_is_monotonic_as_time_passes() {
    let start = Utc::now();
    let deadline = start + Duration::hours(5);
    let mut current = EscalationLevel::None;
    let mut seen = vec![current];

    // Walk past the deadline in 30-minute ticks.
    for tick in 0..12 {
        let now = start + Duration::minutes(30 * tick);
        if let Some(step) = escalation::step(current, deadline, now) {
            assert!(step.level > current, "level dropped at tick {tick}");
            current = step.level;
            seen.push(current);
        }
    }

    assert_eq!(*seen.last().unwrap(), EscalationLevel::Breach);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn stepping_is_idempotent_for_fixed_inputs() {
    let now = Utc::now();
    let deadline = now + Duration::minutes(45);
    let a = escalation::step(EscalationLevel::None, deadline, now);
    let b = escalation::step(EscalationLevel::None, deadline, now);
    assert_eq!(a, b);
}

#[test]
fn managers_notified_from_critical_on() {
    assert!(!EscalationLevel::Elevated.notifies_managers());
    assert!(EscalationLevel::Critical.notifies_managers());
    assert!(EscalationLevel::Breach.notifies_managers());
}

// ---- Queue estimator ----

#[test]
fn three_ticket_backlog_places_new_high_third() {
    let open = vec![
        make_ticket("t1", Priority::Urgent, TicketStatus::Open, 60),
        make_ticket("t2", Priority::High, TicketStatus::Open, 30),
        make_ticket("t3", Priority::Low, TicketStatus::Open, 10),
    ];
    assert_eq!(queue::queue_position(&open, Priority::High), 3);
}

#[test]
fn resolved_tickets_do_not_occupy_queue_slots() {
    let open = vec![
        make_ticket("t1", Priority::Urgent, TicketStatus::Resolved, 60),
        make_ticket("t2", Priority::High, TicketStatus::Closed, 30),
        make_ticket("t3", Priority::Medium, TicketStatus::InProgress, 10),
    ];
    assert_eq!(queue::queue_position(&open, Priority::Medium), 2);
}

#[test]
fn empty_backlog_yields_position_one() {
    assert_eq!(queue::queue_position(&[], Priority::Low), 1);
}

#[test]
fn queue_order_is_priority_desc_then_oldest_first() {
    let mut tickets = vec![
        make_ticket("young-high", Priority::High, TicketStatus::Open, 5),
        make_ticket("old-high", Priority::High, TicketStatus::Open, 120),
        make_ticket("urgent", Priority::Urgent, TicketStatus::Open, 1),
        make_ticket("low", Priority::Low, TicketStatus::Open, 300),
    ];
    queue::queue_order(&mut tickets);
    let ids: Vec<&str> = tickets.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["urgent", "old-high", "young-high", "low"]);
}

#[test]
fn no_agents_medium_ten_hour_average_waits_fourteen() {
    // 0 online agents, medium priority, 10h history average -> 10 + 4 = 14h.
    let wait = queue::estimate_wait_hours(10.0, Priority::Medium, 0);
    assert_eq!(wait, 14.0);
}

#[test]
fn single_agent_stretches_estimate() {
    let wait = queue::estimate_wait_hours(10.0, Priority::Medium, 1);
    assert!((wait - 12.0).abs() < 1e-9);
}

#[test]
fn priority_multipliers_scale_the_average() {
    assert_eq!(queue::estimate_wait_hours(8.0, Priority::Urgent, 2), 2.0);
    assert_eq!(queue::estimate_wait_hours(8.0, Priority::High, 2), 4.0);
    assert_eq!(queue::estimate_wait_hours(8.0, Priority::Medium, 2), 8.0);
    assert_eq!(queue::estimate_wait_hours(8.0, Priority::Low, 2), 12.0);
}

#[test]
fn missing_history_degrades_to_default_average() {
    let estimate = queue::estimate(&[], Priority::Medium, &[], 3);
    assert_eq!(
        estimate.average_resolution_hours,
        queue::DEFAULT_AVG_RESOLUTION_HOURS
    );
    assert_eq!(estimate.estimated_wait_hours, 24.0);
}

#[test]
fn history_is_capped_at_sample_size() {
    // 40 samples: first 30 average to 10h, the tail of 100h entries must
    // not leak in.
    let mut samples = vec![10.0; 30];
    samples.extend(vec![100.0; 10]);
    let estimate = queue::estimate(&[], Priority::Medium, &samples, 2);
    assert!((estimate.average_resolution_hours - 10.0).abs() < 1e-9);
}

#[test]
fn queue_estimate_is_idempotent() {
    let open = vec![
        make_ticket("t1", Priority::Urgent, TicketStatus::Open, 60),
        make_ticket("t2", Priority::Medium, TicketStatus::Open, 30),
    ];
    let samples = vec![6.0, 8.0, 10.0];
    let a = queue::estimate(&open, Priority::High, &samples, 2);
    let b = queue::estimate(&open, Priority::High, &samples, 2);
    assert_eq!(a.position, b.position);
    assert_eq!(a.estimated_wait_hours, b.estimated_wait_hours);
}
