//! Property-based tests over the pure pieces of the pricing and
//! reconciliation core: money rounding, phone canonicalization, the
//! order transition table and the payment status ladder.

use proptest::prelude::*;
use rust_decimal::Decimal;

use dukkan_api::entities::{OrderStatus, PaymentStatus};
use dukkan_api::gateway::GatewayPaymentState;
use dukkan_api::services::customers::normalize_phone;
use dukkan_api::services::pricing::round_money;

fn decimal_strategy() -> impl Strategy<Value = Decimal> {
    // Mantissa and scale wide enough to cover sub-fils noise from
    // percentage math.
    (-1_000_000_000i64..1_000_000_000, 0u32..9)
        .prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

fn all_order_statuses() -> Vec<OrderStatus> {
    vec![
        OrderStatus::Pending,
        OrderStatus::AwaitingPayment,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ]
}

fn payment_status_strategy() -> impl Strategy<Value = PaymentStatus> {
    prop_oneof![
        Just(PaymentStatus::Initiated),
        Just(PaymentStatus::Failed),
        Just(PaymentStatus::Paid),
    ]
}

// Property: money rounding lands on at most 3 decimal places and is stable
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn rounded_money_has_at_most_three_decimals(amount in decimal_strategy()) {
        let rounded = round_money(amount);
        prop_assert!(rounded.scale() <= 3, "scale {} for {}", rounded.scale(), rounded);
    }

    #[test]
    fn rounding_is_idempotent(amount in decimal_strategy()) {
        let once = round_money(amount);
        prop_assert_eq!(once, round_money(once));
    }

    #[test]
    fn rounding_moves_by_less_than_one_fil(amount in decimal_strategy()) {
        let diff = (round_money(amount) - amount).abs();
        prop_assert!(diff <= Decimal::new(5, 4), "moved {} for {}", diff, amount);
    }
}

// Property: accepted phone numbers come out canonical
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn normalized_phones_are_canonical(raw in "\\+?[0-9][0-9 ().-]{7,18}") {
        if let Ok(normalized) = normalize_phone(&raw) {
            let digits = normalized.strip_prefix('+').unwrap_or(&normalized);
            prop_assert!(digits.chars().all(|c| c.is_ascii_digit()), "got {}", normalized);
            prop_assert!((8..=15).contains(&digits.len()), "got {}", normalized);
            // Running the output back through changes nothing.
            prop_assert_eq!(normalize_phone(&normalized).unwrap(), normalized);
        }
    }

    #[test]
    fn letters_never_survive_normalization(raw in "[0-9]{4}[a-z]{1,3}[0-9]{4}") {
        prop_assert!(normalize_phone(&raw).is_err(), "accepted {}", raw);
    }
}

// Property: the order transition table has no escape from terminal states
// and no self-loops
proptest! {
    #[test]
    fn terminal_states_have_no_outgoing_transitions(index in 0usize..7) {
        let statuses = all_order_statuses();
        let from = statuses[index];
        if from.is_terminal() {
            for to in &statuses {
                prop_assert!(!from.can_transition_to(*to), "{} escaped to {}", from, to);
            }
        }
    }

    #[test]
    fn no_status_transitions_to_itself(index in 0usize..7) {
        let status = all_order_statuses()[index];
        prop_assert!(!status.can_transition_to(status));
    }
}

// Property: folding any report sequence over the ladder never loses rank,
// and ends at the highest rank seen
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn the_payment_ladder_only_climbs(reports in prop::collection::vec(payment_status_strategy(), 0..12)) {
        let mut current = PaymentStatus::Initiated;
        let mut highest = current.rank();

        for incoming in reports {
            let before = current.rank();
            if incoming.rank() > current.rank() {
                current = incoming;
            }
            prop_assert!(current.rank() >= before, "rank dropped from {} to {}", before, current.rank());
            highest = highest.max(incoming.rank());
        }
        prop_assert_eq!(current.rank(), highest);
    }
}

// Property: provider labels are read case-insensitively
proptest! {
    #[test]
    fn provider_labels_are_case_insensitive(label in "[a-zA-Z_]{1,20}") {
        prop_assert_eq!(
            GatewayPaymentState::from_provider_label(&label),
            GatewayPaymentState::from_provider_label(&label.to_uppercase())
        );
    }
}
