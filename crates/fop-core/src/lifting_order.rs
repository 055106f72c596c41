//! Who lifts next.
//!
//! The order is a stable sort over the group with a fixed precedence of
//! keys; the head of the order is the current athlete while it still has an
//! attempt left. Finished athletes sink to the bottom, best total first.

use std::cmp::Ordering;

use crate::athlete::Athlete;

/// Compare two athletes for the lifting order.
pub fn compare(a: &Athlete, b: &Athlete, gender_order: bool) -> Ordering {
    // Pinned athletes first.
    b.forced_as_current
        .cmp(&a.forced_as_current)
        .then_with(|| match (a.is_done(), b.is_done()) {
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => b
                .total()
                .cmp(&a.total())
                .then_with(|| tie_break(a, b)),
            (false, false) => compare_competing(a, b, gender_order),
        })
}

fn compare_competing(a: &Athlete, b: &Athlete, gender_order: bool) -> Ordering {
    a.lift_type()
        .cmp(&b.lift_type())
        .then_with(|| {
            if gender_order {
                a.gender.cmp(&b.gender)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| requested(a).cmp(&requested(b)))
        .then_with(|| a.attempts_done().cmp(&b.attempts_done()))
        .then_with(|| progression(a, b))
        .then_with(|| tie_break(a, b))
}

/// An athlete with nothing requested yet waits behind every real weight.
fn requested(a: &Athlete) -> (bool, u32) {
    let w = a.next_requested_weight();
    (w == 0, w)
}

/// Same weight, same attempt count: whoever lifted earlier goes first, then
/// whoever declared the weight earlier.
fn progression(a: &Athlete, b: &Athlete) -> Ordering {
    let key = |x: &Athlete| {
        let t = x.previous_lift_time();
        (t.is_none(), t)
    };
    key(a)
        .cmp(&key(b))
        .then_with(|| a.next_declared_seq().cmp(&b.next_declared_seq()))
}

fn tie_break(a: &Athlete, b: &Athlete) -> Ordering {
    let key = |x: &Athlete| (x.start_number.unwrap_or(u32::MAX), x.lot_number, x.id);
    key(a).cmp(&key(b))
}

/// Sorted copy of the roster.
pub fn lifting_order(athletes: &[Athlete], gender_order: bool) -> Vec<Athlete> {
    let mut order = athletes.to_vec();
    order.sort_by(|a, b| compare(a, b, gender_order));
    order
}

/// Head of the order, if it still has an attempt to take.
pub fn current_athlete(order: &[Athlete]) -> Option<&Athlete> {
    order.first().filter(|a| !a.is_done())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::athlete::{AthleteId, ChangeField};
    use crate::types::Gender;
    use chrono::{Duration, TimeZone, Utc};

    fn lifter(id: u64, gender: Gender, snatch: u32) -> Athlete {
        let mut a = Athlete::new(id, "A", format!("L{id}"), gender);
        a.start_number = Some(id as u32);
        a.lot_number = 100 - id as u32;
        a.attempts[0].declaration = Some(snatch);
        a.attempts[3].declaration = Some(snatch + 20);
        a
    }

    fn ids(order: &[Athlete]) -> Vec<u64> {
        order.iter().map(|a| a.id.0).collect()
    }

    #[test]
    fn lower_weight_first_and_change_reorders() {
        let mut group = vec![
            lifter(1, Gender::M, 100),
            lifter(2, Gender::M, 105),
            lifter(3, Gender::M, 110),
        ];
        assert_eq!(ids(&lifting_order(&group, false)), vec![1, 2, 3]);

        group[0].apply_change(1, ChangeField::Change1, 120, 1);
        let order = lifting_order(&group, false);
        assert_eq!(ids(&order), vec![2, 3, 1]);
        assert_eq!(
            order.iter().map(Athlete::next_requested_weight).collect::<Vec<_>>(),
            vec![105, 110, 120]
        );
    }

    #[test]
    fn sorting_is_idempotent() {
        let group = vec![
            lifter(4, Gender::F, 90),
            lifter(2, Gender::M, 90),
            lifter(3, Gender::M, 80),
            lifter(1, Gender::F, 95),
        ];
        let once = lifting_order(&group, true);
        let twice = lifting_order(&once, true);
        assert_eq!(once, twice);
    }

    #[test]
    fn forced_athlete_always_first() {
        let mut group = vec![lifter(1, Gender::M, 80), lifter(2, Gender::M, 150)];
        group[1].forced_as_current = true;
        let order = lifting_order(&group, false);
        assert_eq!(current_athlete(&order).unwrap().id, AthleteId(2));
        assert_eq!(order[1].id, AthleteId(1));
    }

    #[test]
    fn snatch_before_clean_and_jerk() {
        let mut ahead = lifter(1, Gender::M, 60);
        for _ in 0..3 {
            ahead.record_lift(true, Utc::now());
        }
        let behind = lifter(2, Gender::M, 140);
        let order = lifting_order(&[ahead, behind], false);
        assert_eq!(ids(&order), vec![2, 1]);
    }

    #[test]
    fn gender_only_when_enabled() {
        let group = vec![lifter(1, Gender::M, 70), lifter(2, Gender::F, 80)];
        assert_eq!(ids(&lifting_order(&group, false)), vec![1, 2]);
        assert_eq!(ids(&lifting_order(&group, true)), vec![2, 1]);
    }

    #[test]
    fn fewer_attempts_first_at_same_weight() {
        let mut first = lifter(1, Gender::M, 100);
        first.record_lift(false, Utc::now());
        // Second athlete opens at the weight the first one missed.
        let second = lifter(2, Gender::M, 100);
        let order = lifting_order(&[first, second], false);
        assert_eq!(ids(&order), vec![2, 1]);
    }

    #[test]
    fn earlier_lifter_goes_first_on_progression_tie() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut a = lifter(1, Gender::M, 100);
        let mut b = lifter(2, Gender::M, 100);
        b.record_lift(true, t0);
        a.record_lift(true, t0 + Duration::minutes(2));
        let order = lifting_order(&[a, b], false);
        assert_eq!(ids(&order), vec![2, 1]);
    }

    #[test]
    fn missing_request_waits_behind_real_weights() {
        let mut undeclared = lifter(1, Gender::M, 100);
        undeclared.attempts[0].declaration = None;
        let heavy = lifter(2, Gender::M, 180);
        let order = lifting_order(&[undeclared, heavy], false);
        assert_eq!(ids(&order), vec![2, 1]);
    }

    #[test]
    fn decline_does_not_jump_the_queue() {
        let mut decliner = lifter(1, Gender::M, 100);
        decliner.apply_change(1, ChangeField::Change1, 0, 1);
        let lighter = lifter(2, Gender::M, 95);
        let order = lifting_order(&[decliner, lighter], false);
        assert_eq!(ids(&order), vec![2, 1]);
        assert_eq!(order[1].next_requested_weight(), 100);
        assert_eq!(order[1].next_attempt(), Some(2));
    }

    #[test]
    fn finished_athletes_last_by_total() {
        let mut done_low = lifter(1, Gender::M, 80);
        let mut done_high = lifter(2, Gender::M, 90);
        for _ in 0..6 {
            done_low.record_lift(true, Utc::now());
            done_high.record_lift(true, Utc::now());
        }
        let still_lifting = lifter(3, Gender::M, 200);
        let order = lifting_order(&[done_low, done_high, still_lifting], false);
        assert_eq!(ids(&order), vec![3, 2, 1]);
        assert!(order[1].is_done());

        let only_done = lifting_order(&order[1..], false);
        assert!(current_athlete(&only_done).is_none());
    }
}
