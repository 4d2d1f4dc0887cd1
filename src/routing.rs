// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Routing Key Matching
//!
//! Deterministic binding-key matching for the supported exchange types, so
//! callers can predict which bindings a routing key reaches without a broker
//! round-trip. Direct exchanges require exact equality, fanout exchanges
//! match everything, and topic exchanges match dot-delimited patterns where
//! `*` stands for exactly one token and `#` for zero or more tokens.

use crate::exchange::ExchangeKind;

/// Returns whether a message published with `routing_key` is routed to a
/// queue bound with `binding_key` on an exchange of the given kind.
pub fn matches(kind: ExchangeKind, binding_key: &str, routing_key: &str) -> bool {
    match kind {
        ExchangeKind::Direct => binding_key == routing_key,
        ExchangeKind::Fanout => true,
        ExchangeKind::Topic => topic_matches(binding_key, routing_key),
    }
}

/// Validates a binding key: non-empty, no empty dot-delimited tokens.
pub fn binding_key_is_valid(binding_key: &str) -> bool {
    !binding_key.is_empty() && binding_key.split('.').all(|token| !token.is_empty())
}

fn topic_matches(binding_key: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = binding_key.split('.').collect();
    let tokens: Vec<&str> = routing_key.split('.').collect();
    topic_match_at(&pattern, &tokens)
}

// Backtracking over `#`: the hash may absorb any number of tokens, so try
// every split point of the remaining routing key.
fn topic_match_at(pattern: &[&str], tokens: &[&str]) -> bool {
    match pattern.split_first() {
        None => tokens.is_empty(),
        Some((&"#", rest)) => (0..=tokens.len()).any(|n| topic_match_at(rest, &tokens[n..])),
        Some((&"*", rest)) => !tokens.is_empty() && topic_match_at(rest, &tokens[1..]),
        Some((literal, rest)) => {
            tokens.first() == Some(literal) && topic_match_at(rest, &tokens[1..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_requires_exact_equality() {
        assert!(matches(ExchangeKind::Direct, "orders.created", "orders.created"));
        assert!(!matches(ExchangeKind::Direct, "orders.created", "orders.cancelled"));
        assert!(!matches(ExchangeKind::Direct, "orders.#", "orders.created"));
    }

    #[test]
    fn fanout_ignores_routing_key() {
        assert!(matches(ExchangeKind::Fanout, "", "orders.created"));
        assert!(matches(ExchangeKind::Fanout, "whatever", ""));
    }

    #[test]
    fn topic_hash_matches_zero_or_more_tokens() {
        assert!(matches(ExchangeKind::Topic, "a.#", "a.b.c"));
        assert!(matches(ExchangeKind::Topic, "a.#", "a"));
        assert!(matches(ExchangeKind::Topic, "#", "a.b.c"));
        assert!(!matches(ExchangeKind::Topic, "x.#", "a.b.c"));
    }

    #[test]
    fn topic_star_matches_exactly_one_token() {
        assert!(matches(ExchangeKind::Topic, "a.*.c", "a.b.c"));
        assert!(!matches(ExchangeKind::Topic, "a.*.c", "a.c"));
        assert!(!matches(ExchangeKind::Topic, "a.*", "a.b.c"));
    }

    #[test]
    fn topic_literal_prefix_does_not_match_shorter_key() {
        assert!(!matches(ExchangeKind::Topic, "a.#", "x.b"));
        assert!(!matches(ExchangeKind::Topic, "a.b.c", "a.b"));
    }

    #[test]
    fn topic_hash_in_the_middle() {
        assert!(matches(ExchangeKind::Topic, "a.#.c", "a.c"));
        assert!(matches(ExchangeKind::Topic, "a.#.c", "a.b.x.c"));
        assert!(!matches(ExchangeKind::Topic, "a.#.c", "a.b.x"));
    }

    #[test]
    fn binding_key_validation() {
        assert!(binding_key_is_valid("orders.created"));
        assert!(binding_key_is_valid("#"));
        assert!(!binding_key_is_valid(""));
        assert!(!binding_key_is_valid("orders..created"));
    }
}
